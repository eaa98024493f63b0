//! Reversible bracket substitution for literal XLIFF inline tags.
//!
//! The generic tag scanner would otherwise swallow `<g>`, `<x/>`, `<ph/>`
//! and friends; guarding their brackets first keeps them literal through
//! Layer1 and lets the scanner treat everything else normally.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::chain::{ChainContext, Handler};
use crate::sentinels::{GT_MARK, GUARDED_TAG_RE, LT_MARK};

static XLIFF_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(/?)((?:bpt|ept|mrk|ph|it|sc|ec|pc|g|x)(?:\s[^<>]*)?)(/?)>")
        .expect("xliff tag regex")
});

pub struct XliffTagProtect;

impl Handler for XliffTagProtect {
    fn name(&self) -> &'static str {
        "xliff-tag-protect"
    }

    fn transform(&self, segment: &str, _ctx: &ChainContext) -> String {
        XLIFF_TAG_RE
            .replace_all(segment, |caps: &Captures<'_>| {
                format!("{LT_MARK}{}{}{}{GT_MARK}", &caps[1], &caps[2], &caps[3])
            })
            .into_owned()
    }
}

pub struct XliffTagRestore;

impl Handler for XliffTagRestore {
    fn name(&self) -> &'static str {
        "xliff-tag-restore"
    }

    fn transform(&self, segment: &str, _ctx: &ChainContext) -> String {
        GUARDED_TAG_RE
            .replace_all(segment, |caps: &Captures<'_>| format!("<{}>", &caps[1]))
            .into_owned()
    }
}
