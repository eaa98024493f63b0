//! Flattens XLIFF inline elements carrying external data references into
//! neutral `<ph/>` placeholders, and restores them exactly.
//!
//! `<ph/>`, `<sc/>`, `<ec/>` elements referencing a map entry become a single
//! placeholder; `<pc>...</pc>` pairs split into two independent placeholders
//! so the payload can survive reordering during translation. Closing tags are
//! textually indistinguishable from one another, so the rewrite collects an
//! ordered splice list by tree traversal first and applies it left to right.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::chain::{ChainContext, Handler};
use crate::placeholder::{b64_decode, b64_encode, find_ph_tokens};

/// Reference key to replacement value; `None` is the explicit null-marker.
pub type DataRefMap = HashMap<String, Option<String>>;

/// Flattened stand-in for a null-valued map entry.
const NULL_VALUE: &str = "NULL";

static INLINE_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"<(/?)([a-zA-Z_][a-zA-Z0-9._:\-]*)((?:\s+[a-zA-Z0-9._:\-]+\s*=\s*(?:"[^"]*"|'[^']*'))*)\s*(/?)\s*>"#,
    )
    .expect("inline tag regex")
});

static INLINE_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([a-zA-Z0-9._:\-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("inline attr regex")
});

#[derive(Clone, Copy, Debug)]
struct Span {
    start: usize,
    end: usize,
}

#[derive(Debug)]
struct InlineElement {
    name: String,
    attrs: Vec<(String, String)>,
    self_closed: bool,
    /// Open tag span; the whole element when self-closed.
    open: Span,
    close: Option<Span>,
    children: Vec<usize>,
}

#[derive(Debug)]
enum InlineNode {
    Element(InlineElement),
    Text(Span),
}

/// Arena with index-based child references; nodes never outlive one rewrite.
#[derive(Debug, Default)]
struct InlineTree {
    nodes: Vec<InlineNode>,
    roots: Vec<usize>,
}

struct Splice {
    start: usize,
    end: usize,
    replacement: String,
}

fn attach(tree: &mut InlineTree, stack: &[usize], id: usize) {
    if let Some(&parent) = stack.last() {
        if let InlineNode::Element(el) = &mut tree.nodes[parent] {
            el.children.push(id);
        }
    } else {
        tree.roots.push(id);
    }
}

fn parse_attrs(raw: &str) -> Vec<(String, String)> {
    INLINE_ATTR_RE
        .captures_iter(raw)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or("");
            (caps[1].to_string(), value.to_string())
        })
        .collect()
}

/// Builds the element tree, or `None` when the nesting cannot be resolved
/// (unmatched or crossed tags). Content that is not a well-formed tag is
/// kept as text, so stray brackets never abort the parse.
fn parse_inline(segment: &str) -> Option<InlineTree> {
    let mut tree = InlineTree::default();
    let mut stack: Vec<usize> = Vec::new();
    let mut pos = 0usize;

    for caps in INLINE_TAG_RE.captures_iter(segment) {
        let whole = caps.get(0).unwrap();
        if whole.start() > pos {
            let id = tree.nodes.len();
            tree.nodes.push(InlineNode::Text(Span {
                start: pos,
                end: whole.start(),
            }));
            attach(&mut tree, &stack, id);
        }
        let closing = !caps[1].is_empty();
        let name = caps[2].to_string();
        let self_closed = !caps[4].is_empty();
        if closing {
            let top = stack.pop()?;
            let InlineNode::Element(el) = &mut tree.nodes[top] else {
                return None;
            };
            if el.name != name {
                return None;
            }
            el.close = Some(Span {
                start: whole.start(),
                end: whole.end(),
            });
        } else {
            let id = tree.nodes.len();
            tree.nodes.push(InlineNode::Element(InlineElement {
                name,
                attrs: parse_attrs(caps.get(3).map(|m| m.as_str()).unwrap_or("")),
                self_closed,
                open: Span {
                    start: whole.start(),
                    end: whole.end(),
                },
                close: None,
                children: Vec::new(),
            }));
            attach(&mut tree, &stack, id);
            if !self_closed {
                stack.push(id);
            }
        }
        pos = whole.end();
    }

    if pos < segment.len() {
        let id = tree.nodes.len();
        tree.nodes.push(InlineNode::Text(Span {
            start: pos,
            end: segment.len(),
        }));
        attach(&mut tree, &stack, id);
    }

    if !stack.is_empty() {
        return None;
    }
    Some(tree)
}

fn attr<'a>(el: &'a InlineElement, key: &str) -> Option<&'a str> {
    el.attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn resolve(map: &DataRefMap, key: &str) -> String {
    match map.get(key) {
        Some(Some(value)) => value.clone(),
        _ => NULL_VALUE.to_string(),
    }
}

/// Start/end reference keys of a `pc` element; a missing side is inferred
/// from the other.
fn pc_keys(el: &InlineElement) -> Option<(String, String)> {
    match (attr(el, "dataRefStart"), attr(el, "dataRefEnd")) {
        (Some(start), Some(end)) => Some((start.to_string(), end.to_string())),
        (Some(start), None) => Some((start.to_string(), start.to_string())),
        (None, Some(end)) => Some((end.to_string(), end.to_string())),
        (None, None) => None,
    }
}

fn data_ref_ph(id: &str, remove_id: bool, ctype: &str, original: &str, value: &str) -> String {
    let remove = if remove_id { r#" x-removeId="yes""# } else { "" };
    format!(
        r#"<ph id="{id}"{remove} ctype="{ctype}" x-orig="{}" equiv-text="base64:{}"/>"#,
        b64_encode(original),
        b64_encode(value)
    )
}

fn standalone_splice(segment: &str, el: &InlineElement, map: &DataRefMap) -> Option<Splice> {
    let key = attr(el, "dataRef")?;
    if !map.contains_key(key) {
        return None;
    }
    let value = resolve(map, key);
    let (id, remove_id) = match attr(el, "id") {
        Some(id) => (id.to_string(), false),
        None => (key.to_string(), true),
    };
    let original = &segment[el.open.start..el.open.end];
    let ctype = format!("x-{}_data_ref", el.name);
    Some(Splice {
        start: el.open.start,
        end: el.open.end,
        replacement: data_ref_ph(&id, remove_id, &ctype, original, &value),
    })
}

fn pc_splices(segment: &str, el: &InlineElement, map: &DataRefMap, out: &mut Vec<Splice>) {
    let Some((start_key, end_key)) = pc_keys(el) else {
        return;
    };
    if !map.contains_key(&start_key) || !map.contains_key(&end_key) {
        return;
    }
    let start_value = resolve(map, &start_key);
    let (base_id, remove_id) = match attr(el, "id") {
        Some(id) => (id.to_string(), false),
        None => (start_key.clone(), true),
    };
    let open_text = &segment[el.open.start..el.open.end];

    if el.self_closed {
        out.push(Splice {
            start: el.open.start,
            end: el.open.end,
            replacement: data_ref_ph(
                &base_id,
                remove_id,
                "x-pc_self_close_data_ref",
                open_text,
                &start_value,
            ),
        });
        return;
    }

    let Some(close) = el.close else {
        return;
    };
    out.push(Splice {
        start: el.open.start,
        end: el.open.end,
        replacement: data_ref_ph(
            &format!("{base_id}_1"),
            remove_id,
            "x-pc_open_data_ref",
            open_text,
            &start_value,
        ),
    });
    let end_value = resolve(map, &end_key);
    let close_text = &segment[close.start..close.end];
    out.push(Splice {
        start: close.start,
        end: close.end,
        replacement: data_ref_ph(
            &format!("{base_id}_2"),
            remove_id,
            "x-pc_close_data_ref",
            close_text,
            &end_value,
        ),
    });
}

/// Depth-first descriptor collection: inner `pc` close tags land in the
/// splice list before the outer close tag is resolved, matched to their
/// owner by traversal order.
fn collect_splices(
    segment: &str,
    tree: &InlineTree,
    id: usize,
    map: &DataRefMap,
    out: &mut Vec<Splice>,
) {
    let InlineNode::Element(el) = &tree.nodes[id] else {
        return;
    };
    match el.name.as_str() {
        "ph" | "sc" | "ec" if el.self_closed => {
            if let Some(splice) = standalone_splice(segment, el, map) {
                out.push(splice);
            }
        }
        "pc" => {
            pc_splices(segment, el, map, out);
            for &child in &el.children {
                collect_splices(segment, tree, child, map, out);
            }
        }
        _ => {
            for &child in &el.children {
                collect_splices(segment, tree, child, map, out);
            }
        }
    }
}

fn apply_splices(segment: &str, mut splices: Vec<Splice>) -> String {
    splices.sort_by_key(|s| s.start);
    let mut out = String::with_capacity(segment.len());
    let mut pos = 0usize;
    for s in splices {
        out.push_str(&segment[pos..s.start]);
        out.push_str(&s.replacement);
        pos = s.end;
    }
    out.push_str(&segment[pos..]);
    out
}

/// Rewrites reference-carrying inline elements into flat placeholders.
/// No-op when the map is empty, when the segment holds no reference
/// attribute, or when the markup cannot be resolved into a tree.
pub fn flatten(segment: &str, data_refs: &DataRefMap) -> String {
    if data_refs.is_empty() || !segment.contains("dataRef") {
        return segment.to_string();
    }
    let Some(tree) = parse_inline(segment) else {
        return segment.to_string();
    };
    let mut splices = Vec::new();
    for &root in &tree.roots {
        collect_splices(segment, &tree, root, data_refs, &mut splices);
    }
    if splices.is_empty() {
        return segment.to_string();
    }
    apply_splices(segment, splices)
}

/// Exact inverse of [`flatten`]: every placeholder carrying `x-orig` is
/// substituted by its base64-decoded original markup, re-assembling split
/// `pc` pairs in place.
pub fn restore(segment: &str, data_refs: &DataRefMap) -> String {
    if data_refs.is_empty() || !segment.contains("x-orig") {
        return segment.to_string();
    }
    let mut out = String::with_capacity(segment.len());
    let mut pos = 0usize;
    for tok in find_ph_tokens(segment) {
        let Some(encoded) = tok.x_orig.as_deref() else {
            continue;
        };
        let Some(original) = b64_decode(encoded) else {
            continue;
        };
        out.push_str(&segment[pos..tok.start]);
        out.push_str(&original);
        pos = tok.end;
    }
    out.push_str(&segment[pos..]);
    out
}

pub struct DataRefFlatten;

impl Handler for DataRefFlatten {
    fn name(&self) -> &'static str {
        "dataref-flatten"
    }

    fn transform(&self, segment: &str, ctx: &ChainContext) -> String {
        flatten(segment, &ctx.data_refs)
    }
}

pub struct DataRefRestore;

impl Handler for DataRefRestore {
    fn name(&self) -> &'static str {
        "dataref-restore"
    }

    fn transform(&self, segment: &str, ctx: &ChainContext) -> String {
        restore(segment, &ctx.data_refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, Option<&str>)]) -> DataRefMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(|s| s.to_string())))
            .collect()
    }

    #[test]
    fn pc_pair_splits_into_open_and_close_placeholders() {
        let refs = map(&[("d1", Some("_"))]);
        let src = r#"<pc id="1" dataRefStart="d1" dataRefEnd="d1">x</pc>"#;
        let flat = flatten(src, &refs);
        let expected_open = format!(
            r#"<ph id="1_1" ctype="x-pc_open_data_ref" x-orig="{}" equiv-text="base64:Xw=="/>"#,
            b64_encode(r#"<pc id="1" dataRefStart="d1" dataRefEnd="d1">"#)
        );
        let expected_close = format!(
            r#"<ph id="1_2" ctype="x-pc_close_data_ref" x-orig="{}" equiv-text="base64:Xw=="/>"#,
            b64_encode("</pc>")
        );
        assert_eq!(flat, format!("{expected_open}x{expected_close}"));
        assert_eq!(restore(&flat, &refs), src);
    }

    #[test]
    fn nested_pc_pairs_keep_traversal_order() {
        let refs = map(&[("d1", Some("<b>")), ("d2", Some("<i>"))]);
        let src = r#"<pc id="1" dataRefStart="d1" dataRefEnd="d1">a<pc id="2" dataRefStart="d2" dataRefEnd="d2">b</pc>c</pc>"#;
        let flat = flatten(src, &refs);

        let order: Vec<String> = find_ph_tokens(&flat).into_iter().map(|t| t.id).collect();
        assert_eq!(order, vec!["1_1", "2_1", "2_2", "1_2"]);
        // The outer close sits after the inner close.
        assert!(flat.find(r#"id="2_2""#).unwrap() < flat.find(r#"id="1_2""#).unwrap());
        assert_eq!(restore(&flat, &refs), src);
    }

    #[test]
    fn standalone_ph_with_data_ref() {
        let refs = map(&[("d1", Some("[img]"))]);
        let src = r#"before <ph id="p1" dataRef="d1"/> after"#;
        let flat = flatten(src, &refs);
        let tokens = find_ph_tokens(&flat);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].id, "p1");
        assert_eq!(tokens[0].ctype.as_deref(), Some("x-ph_data_ref"));
        assert_eq!(
            b64_decode(tokens[0].equiv_b64.as_deref().unwrap()).unwrap(),
            "[img]"
        );
        assert_eq!(restore(&flat, &refs), src);
    }

    #[test]
    fn sc_and_ec_elements_flatten() {
        let refs = map(&[("s1", Some("{b}")), ("e1", Some("{/b}"))]);
        let src = r#"<sc id="a" dataRef="s1"/>bold<ec id="b" dataRef="e1"/>"#;
        let flat = flatten(src, &refs);
        assert!(flat.contains(r#"ctype="x-sc_data_ref""#));
        assert!(flat.contains(r#"ctype="x-ec_data_ref""#));
        assert_eq!(restore(&flat, &refs), src);
    }

    #[test]
    fn null_value_becomes_literal_null_payload() {
        let refs = map(&[("d1", None)]);
        let src = r#"<ph id="p1" dataRef="d1"/>"#;
        let flat = flatten(src, &refs);
        assert!(flat.contains(r#"equiv-text="base64:TlVMTA==""#));
        assert_eq!(restore(&flat, &refs), src);
    }

    #[test]
    fn missing_data_ref_end_is_inferred_from_start() {
        let refs = map(&[("d1", Some("*"))]);
        let src = r#"<pc id="3" dataRefStart="d1">t</pc>"#;
        let flat = flatten(src, &refs);
        let tokens = find_ph_tokens(&flat);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].equiv_b64, tokens[1].equiv_b64);
        assert_eq!(restore(&flat, &refs), src);
    }

    #[test]
    fn self_closed_pc() {
        let refs = map(&[("d1", Some("_"))]);
        let src = r#"<pc id="4" dataRefStart="d1"/>"#;
        let flat = flatten(src, &refs);
        assert!(flat.contains(r#"ctype="x-pc_self_close_data_ref""#));
        assert_eq!(restore(&flat, &refs), src);
    }

    #[test]
    fn synthesized_id_is_marked_for_removal() {
        let refs = map(&[("d1", Some("_"))]);
        let src = r#"<ph dataRef="d1"/>"#;
        let flat = flatten(src, &refs);
        assert!(flat.contains(r#"id="d1" x-removeId="yes""#));
        assert_eq!(restore(&flat, &refs), src);
    }

    #[test]
    fn unknown_key_leaves_element_untouched() {
        let refs = map(&[("d1", Some("_"))]);
        let src = r#"<ph id="p" dataRef="zz"/>"#;
        assert_eq!(flatten(src, &refs), src);
    }

    #[test]
    fn empty_map_is_a_no_op() {
        let src = r#"<ph id="p" dataRef="d1"/>"#;
        assert_eq!(flatten(src, &DataRefMap::new()), src);
        assert_eq!(restore(src, &DataRefMap::new()), src);
    }

    #[test]
    fn unresolvable_markup_is_left_untouched() {
        let refs = map(&[("d1", Some("_"))]);
        let src = r#"<pc id="1" dataRefStart="d1">x"#;
        assert_eq!(flatten(src, &refs), src);
        let crossed = r#"<pc id="1" dataRefStart="d1">x</g>"#;
        assert_eq!(flatten(crossed, &refs), crossed);
    }

    #[test]
    fn flatten_is_idempotent() {
        let refs = map(&[("d1", Some("_"))]);
        let src = r#"<pc id="1" dataRefStart="d1" dataRefEnd="d1">x</pc> and <ph id="p" dataRef="d1"/>"#;
        let once = flatten(src, &refs);
        assert_eq!(flatten(&once, &refs), once);
    }

    #[test]
    fn inner_references_flatten_even_when_outer_pc_has_none() {
        let refs = map(&[("d2", Some("<i>"))]);
        let src = r#"<pc id="1">a<pc id="2" dataRefStart="d2" dataRefEnd="d2">b</pc>c</pc>"#;
        let flat = flatten(src, &refs);
        assert!(flat.starts_with(r#"<pc id="1">a"#));
        assert!(flat.contains(r#"id="2_1""#));
        assert_eq!(restore(&flat, &refs), src);
    }
}
