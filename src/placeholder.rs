//! Placeholder codec: decides whether a scanned `<...>` buffer is a
//! well-formed tag, encodes accepted buffers into neutral `<ph/>` tokens
//! carrying a base64 payload, and parses such tokens back out of a segment.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::sentinels::{has_guard_marks, private_id, GT_MARK, LT_MARK};

/// Wire format of a placeholder token:
/// `<ph id="..." ctype="..." [x-orig="BASE64"] equiv-text="base64:BASE64"/>`.
pub const EQUIV_PREFIX: &str = "base64:";

static TAG_GRAMMAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^</?[a-zA-Z_:][a-zA-Z0-9._:\-]*(?:\s+[a-zA-Z0-9._:\-]+(?:\s*=\s*(?:"[^"]*"|'[^']*'))?)*\s*/?>$"#,
    )
    .expect("tag grammar regex")
});

static TAG_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^</?\s*([a-zA-Z_:][a-zA-Z0-9._:\-]*)").expect("tag name regex"));

static PH_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<ph(?:\s+[a-zA-Z0-9._:\-]+\s*=\s*"[^"]*")+\s*/>"#).expect("ph token regex")
});

static PH_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([a-zA-Z0-9._:\-]+)\s*=\s*"([^"]*)""#).expect("ph attr regex")
});

const HTML_TAGS: &[&str] = &[
    "a", "abbr", "address", "area", "article", "aside", "audio", "b", "bdi", "bdo", "blockquote",
    "body", "br", "button", "canvas", "caption", "cite", "code", "col", "colgroup", "data",
    "datalist", "dd", "del", "details", "dfn", "dialog", "div", "dl", "dt", "em", "embed",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "head", "header", "hr", "html", "i", "iframe", "img", "input", "ins", "kbd", "label",
    "legend", "li", "link", "main", "map", "mark", "meta", "meter", "nav", "noscript", "object",
    "ol", "optgroup", "option", "output", "p", "param", "picture", "pre", "progress", "q", "rp",
    "rt", "ruby", "s", "samp", "script", "section", "select", "small", "source", "span",
    "strong", "style", "sub", "summary", "sup", "table", "tbody", "td", "template", "textarea",
    "tfoot", "th", "thead", "time", "title", "tr", "track", "u", "ul", "var", "video", "wbr",
];

pub fn b64_encode(text: &str) -> String {
    B64.encode(text.as_bytes())
}

pub fn b64_decode(encoded: &str) -> Option<String> {
    let bytes = B64.decode(encoded.as_bytes()).ok()?;
    String::from_utf8(bytes).ok()
}

/// Accepts a scanned buffer as a tag when it matches the tag grammar and
/// carries no unresolved guard marks (a guarded buffer means an inner tag
/// has not been restored yet and must not be double-encoded).
pub fn is_acceptable_tag(buffer: &str) -> bool {
    !has_guard_marks(buffer) && TAG_GRAMMAR_RE.is_match(buffer)
}

/// Whether the tag name belongs to the known HTML vocabulary. Affects only
/// the emitted ctype, never acceptance.
pub fn is_known_html_tag(buffer: &str) -> bool {
    TAG_NAME_RE
        .captures(buffer)
        .map(|caps| {
            let name = caps[1].to_ascii_lowercase();
            HTML_TAGS.contains(&name.as_str())
        })
        .unwrap_or(false)
}

/// Collapses double-entity-encoded attribute values to single encoding.
/// The literal `<`/`>` delimiters are masked first so decoding cannot
/// corrupt them; a buffer quick-xml cannot unescape is kept as-is.
pub fn normalize_entities(buffer: &str) -> String {
    let masked = buffer.replace('<', LT_MARK).replace('>', GT_MARK);
    let decoded = match quick_xml::escape::unescape(&masked) {
        Ok(cow) => cow.into_owned(),
        Err(_) => masked,
    };
    decoded.replace(LT_MARK, "<").replace(GT_MARK, ">")
}

/// Builds the placeholder token for an arbitrary payload. The id is minted
/// by the chain and arrives here in private form.
pub fn ph_token(id: usize, ctype: &str, payload: &str) -> String {
    format!(
        r#"<ph id="{}" ctype="{ctype}" equiv-text="{EQUIV_PREFIX}{}"/>"#,
        private_id(id),
        b64_encode(payload)
    )
}

/// Encodes an accepted tag buffer: entity normalization first, then a `ph`
/// token whose ctype records whether the source was HTML or generic XML.
pub fn encode_tag(buffer: &str, id: usize) -> String {
    let normalized = normalize_entities(buffer);
    let ctype = if is_known_html_tag(buffer) { "html" } else { "xml" };
    ph_token(id, ctype, &normalized)
}

/// Encodes a comment or script/style block verbatim.
pub fn encode_block(buffer: &str, id: usize) -> String {
    ph_token(id, "html", buffer)
}

/// Escapes the angle brackets of a rejected buffer so the original
/// characters stay recoverable as literal text.
pub fn escape_rejected(buffer: &str) -> String {
    buffer.replace('<', "&lt;").replace('>', "&gt;")
}

/// A `<ph/>` token located in a segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhToken {
    pub start: usize,
    pub end: usize,
    pub id: String,
    pub ctype: Option<String>,
    pub x_orig: Option<String>,
    /// Payload with the `base64:` prefix stripped.
    pub equiv_b64: Option<String>,
}

/// Recognizes a complete placeholder token (used to avoid re-encoding
/// tokens an earlier pass already produced).
pub fn is_ph_token(buffer: &str) -> bool {
    PH_TOKEN_RE
        .find(buffer)
        .map(|m| m.start() == 0 && m.end() == buffer.len())
        .unwrap_or(false)
}

/// Extracts all placeholder tokens of `text` in left-to-right order.
pub fn find_ph_tokens(text: &str) -> Vec<PhToken> {
    let mut tokens = Vec::new();
    for m in PH_TOKEN_RE.find_iter(text) {
        let mut id = String::new();
        let mut ctype = None;
        let mut x_orig = None;
        let mut equiv_b64 = None;
        for attr in PH_ATTR_RE.captures_iter(m.as_str()) {
            let value = attr[2].to_string();
            match &attr[1] {
                "id" => id = value,
                "ctype" => ctype = Some(value),
                "x-orig" => x_orig = Some(value),
                "equiv-text" => {
                    equiv_b64 = Some(
                        value
                            .strip_prefix(EQUIV_PREFIX)
                            .map(|v| v.to_string())
                            .unwrap_or(value),
                    )
                }
                _ => {}
            }
        }
        tokens.push(PhToken {
            start: m.start(),
            end: m.end(),
            id,
            ctype,
            x_orig,
            equiv_b64,
        });
    }
    tokens
}
