//! Whitespace and control-character boundaries: the raw-file edge of Layer0
//! and the UI edge of Layer2.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::chain::{ChainContext, Handler};
use crate::sentinels::{UI_CR, UI_LF, UI_NBSP, UI_TAB};

static NCR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(?:x([0-9a-fA-F]{1,4})|([0-9]{1,5}));").expect("ncr regex"));

fn ncr_code(caps: &Captures<'_>) -> Option<u32> {
    if let Some(hex) = caps.get(1) {
        u32::from_str_radix(hex.as_str(), 16).ok()
    } else {
        caps.get(2).and_then(|dec| dec.as_str().parse().ok())
    }
}

fn is_disallowed_control(code: u32) -> bool {
    code < 0x20 && !matches!(code, 0x09 | 0x0A | 0x0D)
}

/// Drops ASCII control characters below 0x20 (except CR/LF/TAB), both as
/// literal characters and as numeric character references.
pub struct ControlCharStrip;

impl Handler for ControlCharStrip {
    fn name(&self) -> &'static str {
        "control-char-strip"
    }

    fn transform(&self, segment: &str, _ctx: &ChainContext) -> String {
        let cleaned = NCR_RE.replace_all(segment, |caps: &Captures<'_>| {
            match ncr_code(caps) {
                Some(code) if is_disallowed_control(code) => String::new(),
                _ => caps[0].to_string(),
            }
        });
        cleaned
            .chars()
            .filter(|&ch| !is_disallowed_control(ch as u32))
            .collect()
    }
}

/// Encodes literal CR/LF/TAB as numeric character references so Layer0
/// survives XML persistence.
pub struct CrlfTabEncode;

impl Handler for CrlfTabEncode {
    fn name(&self) -> &'static str {
        "crlf-tab-encode"
    }

    fn transform(&self, segment: &str, _ctx: &ChainContext) -> String {
        let mut out = String::with_capacity(segment.len());
        for ch in segment.chars() {
            match ch {
                '\r' => out.push_str("&#13;"),
                '\n' => out.push_str("&#10;"),
                '\t' => out.push_str("&#9;"),
                _ => out.push(ch),
            }
        }
        out
    }
}

/// Decodes the CR/LF/TAB references back to literal characters at the raw
/// boundary. Decimal and hex forms are both accepted.
pub struct CrlfTabDecode;

impl Handler for CrlfTabDecode {
    fn name(&self) -> &'static str {
        "crlf-tab-decode"
    }

    fn transform(&self, segment: &str, _ctx: &ChainContext) -> String {
        NCR_RE
            .replace_all(segment, |caps: &Captures<'_>| match ncr_code(caps) {
                Some(0x09) => "\t".to_string(),
                Some(0x0A) => "\n".to_string(),
                Some(0x0D) => "\r".to_string(),
                _ => caps[0].to_string(),
            })
            .into_owned()
    }
}

/// Layer1 -> Layer2: literal angle brackets and invisible whitespace become
/// UI sentinels the editor can render.
pub struct UiSentinelEncode;

impl Handler for UiSentinelEncode {
    fn name(&self) -> &'static str {
        "ui-sentinel-encode"
    }

    fn transform(&self, segment: &str, _ctx: &ChainContext) -> String {
        let mut out = String::with_capacity(segment.len());
        for ch in segment.chars() {
            match ch {
                // `&` first-class too, so entities already literal in Layer1
                // survive the round trip.
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '\u{00A0}' => out.push_str(UI_NBSP),
                '\t' => out.push_str(UI_TAB),
                '\r' => out.push_str(UI_CR),
                '\n' => out.push_str(UI_LF),
                _ => out.push(ch),
            }
        }
        out
    }
}

/// Exact inverse of [`UiSentinelEncode`].
pub struct UiSentinelDecode;

impl Handler for UiSentinelDecode {
    fn name(&self) -> &'static str {
        "ui-sentinel-decode"
    }

    fn transform(&self, segment: &str, _ctx: &ChainContext) -> String {
        segment
            .replace(UI_NBSP, "\u{00A0}")
            .replace(UI_TAB, "\t")
            .replace(UI_CR, "\r")
            .replace(UI_LF, "\n")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&")
    }
}
