//! Cross-segment placeholder id realignment.
//!
//! Ids are assigned independently per segment during translation, but
//! downstream consumers expect the target's ids to mirror the source's
//! whenever the payload is unchanged; the source enumeration is
//! authoritative.

use crate::placeholder::find_ph_tokens;

/// Rewrites the target's placeholder ids to match the source's, matching by
/// payload content in left-to-right order. A token count mismatch signals a
/// tag problem a human must resolve, so the target is returned unchanged.
/// A target payload absent from the source keeps its own id.
pub fn realign(source: &str, target: &str) -> String {
    let src_tokens = find_ph_tokens(source);
    let tgt_tokens = find_ph_tokens(target);
    if src_tokens.len() != tgt_tokens.len() {
        return target.to_string();
    }

    let mut consumed = vec![false; src_tokens.len()];
    let mut out = String::with_capacity(target.len());
    let mut pos = 0usize;
    for tok in &tgt_tokens {
        out.push_str(&target[pos..tok.start]);
        let text = &target[tok.start..tok.end];
        let matched = src_tokens
            .iter()
            .enumerate()
            .find(|(i, src)| !consumed[*i] && src.equiv_b64 == tok.equiv_b64);
        match matched {
            Some((i, src)) => {
                // Consume the source token so a duplicate payload matches
                // the next source occurrence, not the same one twice.
                consumed[i] = true;
                if src.id == tok.id {
                    out.push_str(text);
                } else {
                    out.push_str(&text.replacen(
                        &format!("id=\"{}\"", tok.id),
                        &format!("id=\"{}\"", src.id),
                        1,
                    ));
                }
            }
            None => out.push_str(text),
        }
        pos = tok.end;
    }
    out.push_str(&target[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_the_source_enumeration() {
        let source = r#"a <ph id="mtc_1" ctype="x-sprintf" equiv-text="base64:JTEkcw=="/> b <ph id="mtc_2" ctype="x-sprintf" equiv-text="base64:JTIkcw=="/>"#;
        let target = r#"x <ph id="mtc_6" ctype="x-sprintf" equiv-text="base64:JTIkcw=="/> y <ph id="mtc_5" ctype="x-sprintf" equiv-text="base64:JTEkcw=="/>"#;
        let realigned = realign(source, target);
        assert_eq!(
            realigned,
            r#"x <ph id="mtc_2" ctype="x-sprintf" equiv-text="base64:JTIkcw=="/> y <ph id="mtc_1" ctype="x-sprintf" equiv-text="base64:JTEkcw=="/>"#
        );
    }

    #[test]
    fn duplicate_payloads_consume_sources_in_order() {
        let source = r#"<ph id="mtc_1" equiv-text="base64:JTEkcw=="/> <ph id="mtc_2" equiv-text="base64:JTEkcw=="/>"#;
        let target = r#"<ph id="mtc_5" equiv-text="base64:JTEkcw=="/> <ph id="mtc_6" equiv-text="base64:JTEkcw=="/>"#;
        assert_eq!(
            realign(source, target),
            r#"<ph id="mtc_1" equiv-text="base64:JTEkcw=="/> <ph id="mtc_2" equiv-text="base64:JTEkcw=="/>"#
        );
    }

    #[test]
    fn count_mismatch_returns_target_unchanged() {
        let source = r#"<ph id="mtc_1" equiv-text="base64:JTEkcw=="/>"#;
        let target = r#"<ph id="mtc_5" equiv-text="base64:JTEkcw=="/> <ph id="mtc_6" equiv-text="base64:JTEkcw=="/>"#;
        assert_eq!(realign(source, target), target);
    }

    #[test]
    fn unknown_payload_keeps_its_id() {
        let source = r#"<ph id="mtc_1" equiv-text="base64:JTEkcw=="/> <ph id="mtc_2" equiv-text="base64:YWFh"/>"#;
        let target = r#"<ph id="mtc_5" equiv-text="base64:JTEkcw=="/> <ph id="mtc_6" equiv-text="base64:emV0"/>"#;
        assert_eq!(
            realign(source, target),
            r#"<ph id="mtc_1" equiv-text="base64:JTEkcw=="/> <ph id="mtc_6" equiv-text="base64:emV0"/>"#
        );
    }

    #[test]
    fn segments_without_tokens_are_untouched() {
        assert_eq!(realign("plain", "nur text"), "nur text");
    }
}
