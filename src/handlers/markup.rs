//! Tokenizer-driven markup encoding and the generic reverse decode.

use crate::chain::{ChainContext, Handler};
use crate::placeholder::{
    b64_decode, encode_block, encode_tag, escape_rejected, find_ph_tokens, is_acceptable_tag,
    is_ph_token,
};
use crate::tokenizer::{scan, MarkupSink};

/// Feeds the scanner's classified spans through the placeholder codec,
/// minting ids from the shared chain counter.
struct CodecSink<'a> {
    ctx: &'a ChainContext,
}

impl MarkupSink for CodecSink<'_> {
    fn on_plain_text(&mut self, buffer: &str) -> String {
        buffer.to_string()
    }

    fn is_tag_valid(&mut self, buffer: &str) -> bool {
        is_acceptable_tag(buffer)
    }

    fn on_tag(&mut self, buffer: &str) -> String {
        // A token produced by an earlier pass passes through untouched.
        if is_ph_token(buffer) {
            return buffer.to_string();
        }
        encode_tag(buffer, self.ctx.next_id())
    }

    fn on_rejected(&mut self, buffer: &str) -> String {
        escape_rejected(buffer)
    }

    fn on_block(&mut self, buffer: &str) -> String {
        encode_block(buffer, self.ctx.next_id())
    }
}

pub struct MarkupToPlaceholder;

impl Handler for MarkupToPlaceholder {
    fn name(&self) -> &'static str {
        "markup-to-placeholder"
    }

    fn transform(&self, segment: &str, ctx: &ChainContext) -> String {
        let mut sink = CodecSink { ctx };
        scan(segment, &mut sink)
    }
}

/// Decodes every placeholder that carries a payload and no `x-orig`
/// attribute back to its original span. Tokens restored from data
/// references are left to the dataref stage.
pub struct PlaceholderToMarkup;

impl Handler for PlaceholderToMarkup {
    fn name(&self) -> &'static str {
        "placeholder-to-markup"
    }

    fn transform(&self, segment: &str, _ctx: &ChainContext) -> String {
        let tokens = find_ph_tokens(segment);
        if tokens.is_empty() {
            return segment.to_string();
        }
        let mut out = String::with_capacity(segment.len());
        let mut pos = 0usize;
        for tok in tokens {
            if tok.x_orig.is_some() {
                continue;
            }
            let Some(payload) = tok.equiv_b64.as_deref().and_then(b64_decode) else {
                continue;
            };
            out.push_str(&segment[pos..tok.start]);
            out.push_str(&payload);
            pos = tok.end;
        }
        out.push_str(&segment[pos..]);
        out
    }
}

/// Reverses the escaped angle brackets of the tag-rejection path.
pub struct LtGtDecode;

impl Handler for LtGtDecode {
    fn name(&self) -> &'static str {
        "ltgt-decode"
    }

    fn transform(&self, segment: &str, _ctx: &ChainContext) -> String {
        segment.replace("&lt;", "<").replace("&gt;", ">")
    }
}
