use once_cell::sync::Lazy;
use regex::Regex;

/// Bracket-substitution marks. Literal XLIFF inline tags are rewritten to
/// `##LESSTHAN##g id="1"##GREATERTHAN##` before the generic tag scanner runs,
/// so the scanner never re-interprets them. The marks contain no angle
/// brackets and survive entity escaping untouched.
pub const LT_MARK: &str = "##LESSTHAN##";
pub const GT_MARK: &str = "##GREATERTHAN##";

/// UI-layer stand-ins for characters the editor cannot show as-is.
pub const UI_NBSP: &str = "##$_A0$##";
pub const UI_TAB: &str = "##$_09$##";
pub const UI_CR: &str = "##$_0D$##";
pub const UI_LF: &str = "##$_0A$##";

/// Public placeholder ids are `mtc_<n>`, numbered 1.. in left-to-right order
/// of the final string. Private ids `__mtc_<n>` exist only inside one chain
/// run and are guaranteed to be renumbered before the chain returns.
pub const PUBLIC_ID_PREFIX: &str = "mtc_";
pub const PRIVATE_ID_PREFIX: &str = "__mtc_";

pub fn private_id(n: usize) -> String {
    format!("{PRIVATE_ID_PREFIX}{n}")
}

pub fn public_id(n: usize) -> String {
    format!("{PUBLIC_ID_PREFIX}{n}")
}

pub static PRIVATE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__mtc_\d+").expect("private id regex"));

pub static GUARDED_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"##LESSTHAN##(.*?)##GREATERTHAN##").expect("guarded tag regex"));

#[inline]
pub fn has_guard_marks(text: &str) -> bool {
    text.contains(LT_MARK) || text.contains(GT_MARK)
}
