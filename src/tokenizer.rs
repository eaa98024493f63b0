//! Streaming scanner that classifies a character stream into plain text,
//! tag, comment, and script/style spans without building a DOM.
//!
//! Input may be deliberately malformed or already carry placeholder tokens
//! from earlier stages, so every unrecognized construct degrades to escaped
//! literal text instead of failing.

/// Consumer of classified spans. One method per callback; the scanner holds
/// only this interface, never a concrete filter type.
pub trait MarkupSink {
    /// Replacement for a run of plain text.
    fn on_plain_text(&mut self, buffer: &str) -> String;

    /// Decides whether a completed `<...>` buffer is a real tag.
    fn is_tag_valid(&mut self, buffer: &str) -> bool;

    /// Replacement for a buffer accepted by `is_tag_valid`.
    fn on_tag(&mut self, buffer: &str) -> String;

    /// Fallback for buffers that are not tags; the original characters stay
    /// recoverable as escaped literal text.
    fn on_rejected(&mut self, buffer: &str) -> String;

    /// Replacement for a complete comment or script/style block.
    fn on_block(&mut self, buffer: &str) -> String;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    PlainText,
    Tag,
    Comment,
    ScriptOrStyle,
}

/// Returns the closing token to wait for when `lower` opens a script or
/// style element, e.g. `<script src="x">`.
fn script_or_style_closer(lower: &str) -> Option<&'static str> {
    for (open, close) in [("<script", "script>"), ("<style", "style>")] {
        if let Some(rest) = lower.strip_prefix(open) {
            match rest.chars().next() {
                Some('>') | Some(' ') | Some('\t') | Some('\n') | Some('/') => return Some(close),
                _ => {}
            }
        }
    }
    None
}

/// Scans `input` and rewrites it span by span through `sink`.
pub fn scan(input: &str, sink: &mut dyn MarkupSink) -> String {
    let mut out = String::with_capacity(input.len());
    let mut state = State::PlainText;
    let mut plain = String::new();
    let mut markup = String::new();
    let mut in_quotes: Option<char> = None;
    let mut block_closer = "";

    for ch in input.chars() {
        match state {
            State::PlainText => match ch {
                '<' => {
                    if !plain.is_empty() {
                        out.push_str(&sink.on_plain_text(&plain));
                        plain.clear();
                    }
                    markup.clear();
                    markup.push('<');
                    in_quotes = None;
                    state = State::Tag;
                }
                '>' => {
                    // Stray closing bracket, kept as an escaped literal.
                    if !plain.is_empty() {
                        out.push_str(&sink.on_plain_text(&plain));
                        plain.clear();
                    }
                    out.push_str(&sink.on_rejected(">"));
                }
                _ => plain.push(ch),
            },
            State::Tag => {
                if let Some(q) = in_quotes {
                    markup.push(ch);
                    if ch == q {
                        in_quotes = None;
                    }
                    continue;
                }
                match ch {
                    '"' | '\'' => {
                        markup.push(ch);
                        in_quotes = Some(ch);
                    }
                    '<' => {
                        // The previous `<` did not open a real tag.
                        out.push_str(&sink.on_rejected(&markup));
                        markup.clear();
                        markup.push('<');
                    }
                    '>' => {
                        markup.push('>');
                        let lower = markup.to_ascii_lowercase();
                        if let Some(closer) = script_or_style_closer(&lower) {
                            block_closer = closer;
                            state = State::ScriptOrStyle;
                        } else {
                            if sink.is_tag_valid(&markup) {
                                out.push_str(&sink.on_tag(&markup));
                            } else {
                                out.push_str(&sink.on_rejected(&markup));
                            }
                            markup.clear();
                            state = State::PlainText;
                        }
                    }
                    '-' if markup == "<!-" => {
                        markup.push('-');
                        state = State::Comment;
                    }
                    ' ' | '\n' if markup == "<" => {
                        // A bare `<` followed by whitespace never starts a tag.
                        markup.push(ch);
                        out.push_str(&sink.on_rejected(&markup));
                        markup.clear();
                        state = State::PlainText;
                    }
                    _ => markup.push(ch),
                }
            }
            State::Comment => {
                markup.push(ch);
                if markup.ends_with("-->") {
                    out.push_str(&sink.on_block(&markup));
                    markup.clear();
                    state = State::PlainText;
                }
            }
            State::ScriptOrStyle => {
                markup.push(ch);
                if markup.to_ascii_lowercase().ends_with(block_closer) {
                    out.push_str(&sink.on_block(&markup));
                    markup.clear();
                    state = State::PlainText;
                }
            }
        }
    }

    // End of input flushes whatever buffer is open. A dangling tag, comment,
    // or script buffer degrades to escaped literal text.
    match state {
        State::PlainText => {
            if !plain.is_empty() {
                out.push_str(&sink.on_plain_text(&plain));
            }
        }
        State::Tag | State::Comment | State::ScriptOrStyle => {
            if !markup.is_empty() {
                out.push_str(&sink.on_rejected(&markup));
            }
        }
    }

    out
}
