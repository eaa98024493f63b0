//! Segment layer conversion for a computer-assisted-translation pipeline.
//!
//! Segments move between three representations: Layer0 (persisted raw XML),
//! Layer1 (safe for external MT/TM services), and Layer2 (safe for UI
//! rendering). Protected content such as markup, format placeholders, and
//! data references travels as neutral `<ph/>` tokens carrying a base64
//! payload; the conversion is exactly reversible for protected content and
//! leaves ordinary text untouched.

pub mod chain;
pub mod config;
pub mod dataref;
pub mod handlers;
pub mod layers;
pub mod placeholder;
pub mod realign;
pub mod sentinels;
pub mod tokenizer;

pub use chain::{ChainContext, Handler, Pipeline};
pub use dataref::DataRefMap;
pub use layers::LayerBridge;
pub use realign::realign;
