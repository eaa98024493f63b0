//! Variable-syntax filters. Each one is a stateless regex substitution that
//! locks a family of format placeholders behind `ph` tokens so external
//! services cannot damage them. Decoding happens in the generic
//! placeholder-to-markup stage.

use once_cell::sync::{Lazy, OnceCell};
use regex::{Captures, Regex};

use crate::chain::{ChainContext, Handler};
use crate::placeholder::ph_token;

static TWIG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{[^{}\r\n]{1,200}\}\}|\{%[^{}\r\n]{1,200}%\}").expect("twig regex")
});

static RAILS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%\{[^{}\r\n]{1,100}\}").expect("rails regex"));

static PERCENTAGES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%%[^%\r\n]{1,100}%%").expect("percentages regex"));

static DOUBLE_SQUARE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[[^\[\]\r\n]{1,100}\]\]").expect("double square regex"));

static SPRINTF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%(?:\d+\$)?[+\-#0]*\d*(?:\.\d+)?[bcdeEfFgGiosuxX]").expect("sprintf regex")
});

fn encode_with(
    re: &Regex,
    ctype: &str,
    segment: &str,
    ctx: &ChainContext,
    skip: impl Fn(&str) -> bool,
) -> String {
    if !re.is_match(segment) {
        return segment.to_string();
    }
    re.replace_all(segment, |caps: &Captures<'_>| {
        let matched = caps.get(0).unwrap().as_str();
        if skip(matched) {
            return matched.to_string();
        }
        ph_token(ctx.next_id(), ctype, matched)
    })
    .into_owned()
}

pub struct TwigToPh;

impl Handler for TwigToPh {
    fn name(&self) -> &'static str {
        "twig-to-ph"
    }

    fn transform(&self, segment: &str, ctx: &ChainContext) -> String {
        encode_with(&TWIG_RE, "x-twig", segment, ctx, |_| false)
    }
}

pub struct RubyOnRailsToPh;

impl Handler for RubyOnRailsToPh {
    fn name(&self) -> &'static str {
        "ruby-on-rails-to-ph"
    }

    fn transform(&self, segment: &str, ctx: &ChainContext) -> String {
        encode_with(&RAILS_RE, "x-ruby-on-rails", segment, ctx, |_| false)
    }
}

pub struct PercentagesToPh;

impl Handler for PercentagesToPh {
    fn name(&self) -> &'static str {
        "percentages-to-ph"
    }

    fn transform(&self, segment: &str, ctx: &ChainContext) -> String {
        encode_with(&PERCENTAGES_RE, "x-percentages", segment, ctx, |_| false)
    }
}

pub struct DoubleSquareToPh;

impl Handler for DoubleSquareToPh {
    fn name(&self) -> &'static str {
        "double-square-to-ph"
    }

    fn transform(&self, segment: &str, ctx: &ChainContext) -> String {
        encode_with(&DOUBLE_SQUARE_RE, "x-double-square", segment, ctx, |_| false)
    }
}

/// Specifier forms that read as ordinary prose in a locale and must stay
/// translatable there.
fn not_allowed_for(lang: &str) -> &'static [&'static str] {
    let primary = lang.split(['-', '_']).next().unwrap_or(lang);
    match primary {
        "hu" => &["%-d", "%-e"],
        "tr" => &["%d"],
        _ => &[],
    }
}

/// Locks sprintf-style specifiers. The not-allowed list depends on the
/// language pair and is built lazily once per handler instance.
pub struct SprintfToPh {
    not_allowed: OnceCell<Vec<&'static str>>,
}

impl SprintfToPh {
    pub fn new() -> Self {
        Self {
            not_allowed: OnceCell::new(),
        }
    }

    fn not_allowed(&self, ctx: &ChainContext) -> &[&'static str] {
        self.not_allowed.get_or_init(|| {
            let mut list: Vec<&'static str> = Vec::new();
            for lang in [ctx.source_lang.as_deref(), ctx.target_lang.as_deref()]
                .into_iter()
                .flatten()
            {
                for &spec in not_allowed_for(lang) {
                    if !list.contains(&spec) {
                        list.push(spec);
                    }
                }
            }
            list
        })
    }
}

impl Default for SprintfToPh {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for SprintfToPh {
    fn name(&self) -> &'static str {
        "sprintf-to-ph"
    }

    fn transform(&self, segment: &str, ctx: &ChainContext) -> String {
        let not_allowed = self.not_allowed(ctx);
        encode_with(&SPRINTF_RE, "x-sprintf", segment, ctx, |m| {
            not_allowed.iter().any(|&spec| spec == m)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataref::DataRefMap;
    use crate::handlers::PlaceholderToMarkup;
    use crate::placeholder::{b64_decode, find_ph_tokens};

    fn ctx() -> ChainContext {
        ChainContext::new(None, None, DataRefMap::new())
    }

    fn roundtrip(handler: &dyn Handler, src: &str) -> (String, String) {
        let ctx = ctx();
        let encoded = handler.transform(src, &ctx);
        let decoded = PlaceholderToMarkup.transform(&encoded, &ctx);
        (encoded, decoded)
    }

    #[test]
    fn twig_variables_lock_and_unlock() {
        let (encoded, decoded) = roundtrip(&TwigToPh, "Hi {{ user.name }}, {% if a %}");
        let tokens = find_ph_tokens(&encoded);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].ctype.as_deref(), Some("x-twig"));
        assert_eq!(decoded, "Hi {{ user.name }}, {% if a %}");
    }

    #[test]
    fn rails_variables() {
        let (encoded, decoded) = roundtrip(&RubyOnRailsToPh, "Bonjour %{name}!");
        assert_eq!(find_ph_tokens(&encoded).len(), 1);
        assert_eq!(decoded, "Bonjour %{name}!");
    }

    #[test]
    fn percentages_and_double_square() {
        let (encoded, _) = roundtrip(&PercentagesToPh, "set %%amount%% now");
        assert!(encoded.contains(r#"ctype="x-percentages""#));
        let (encoded, decoded) = roundtrip(&DoubleSquareToPh, "see [[page title]]");
        assert!(encoded.contains(r#"ctype="x-double-square""#));
        assert_eq!(decoded, "see [[page title]]");
    }

    #[test]
    fn sprintf_specifiers() {
        let (encoded, decoded) = roundtrip(&SprintfToPh::new(), "%1$s has %d items (%.2f)");
        let tokens = find_ph_tokens(&encoded);
        assert_eq!(tokens.len(), 3);
        assert_eq!(
            b64_decode(tokens[0].equiv_b64.as_deref().unwrap()).unwrap(),
            "%1$s"
        );
        assert_eq!(decoded, "%1$s has %d items (%.2f)");
    }

    #[test]
    fn not_allowed_specifiers_stay_literal() {
        let ctx = ChainContext::new(Some("hu-HU".to_string()), Some("en".to_string()), DataRefMap::new());
        let handler = SprintfToPh::new();
        let encoded = handler.transform("kb. %-d %s", &ctx);
        assert!(encoded.contains("%-d"));
        assert!(!encoded.contains("%s"));
    }

    #[test]
    fn plain_text_passes_through() {
        let ctx = ctx();
        assert_eq!(TwigToPh.transform("no variables here", &ctx), "no variables here");
        assert_eq!(
            SprintfToPh::new().transform("100% sure", &ctx),
            "100% sure"
        );
    }
}
