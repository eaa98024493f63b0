mod markup;
mod variables;
mod whitespace;
mod xliff_guard;

pub use markup::{LtGtDecode, MarkupToPlaceholder, PlaceholderToMarkup};
pub use variables::{
    DoubleSquareToPh, PercentagesToPh, RubyOnRailsToPh, SprintfToPh, TwigToPh,
};
pub use whitespace::{
    ControlCharStrip, CrlfTabDecode, CrlfTabEncode, UiSentinelDecode, UiSentinelEncode,
};
pub use xliff_guard::{XliffTagProtect, XliffTagRestore};
