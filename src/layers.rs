//! Assembles the handler chains for every layer transition.
//!
//! Each method builds a fresh [`Pipeline`]; callers that need to splice in
//! optional stages take the pipeline form, mutate it with the chain
//! operations, and run `transform` themselves.

use crate::chain::{ChainContext, Pipeline};
use crate::dataref::{DataRefFlatten, DataRefMap, DataRefRestore};
use crate::handlers::{
    ControlCharStrip, CrlfTabDecode, CrlfTabEncode, DoubleSquareToPh, LtGtDecode,
    MarkupToPlaceholder, PercentagesToPh, PlaceholderToMarkup, RubyOnRailsToPh, SprintfToPh,
    TwigToPh, UiSentinelDecode, UiSentinelEncode, XliffTagProtect, XliffTagRestore,
};

pub struct LayerBridge {
    source_lang: Option<String>,
    target_lang: Option<String>,
    data_refs: DataRefMap,
}

impl LayerBridge {
    pub fn new(
        source_lang: Option<String>,
        target_lang: Option<String>,
        data_refs: DataRefMap,
    ) -> Self {
        Self {
            source_lang,
            target_lang,
            data_refs,
        }
    }

    fn context(&self) -> ChainContext {
        ChainContext::new(
            self.source_lang.clone(),
            self.target_lang.clone(),
            self.data_refs.clone(),
        )
    }

    pub fn raw_to_layer0_pipeline(&self) -> Pipeline {
        let mut p = Pipeline::new(self.context());
        p.add_last(Box::new(ControlCharStrip));
        p.add_last(Box::new(CrlfTabEncode));
        p
    }

    pub fn layer0_to_raw_pipeline(&self) -> Pipeline {
        let mut p = Pipeline::new(self.context());
        p.add_last(Box::new(CrlfTabDecode));
        p
    }

    /// Layer0 -> Layer1: flatten data references, guard literal XLIFF tags,
    /// encode remaining markup, lock variables, then drop the guard.
    pub fn layer0_to_layer1_pipeline(&self) -> Pipeline {
        let mut p = Pipeline::new(self.context());
        p.add_last(Box::new(DataRefFlatten));
        p.add_last(Box::new(XliffTagProtect));
        p.add_last(Box::new(MarkupToPlaceholder));
        p.add_last(Box::new(TwigToPh));
        p.add_last(Box::new(RubyOnRailsToPh));
        p.add_last(Box::new(PercentagesToPh));
        p.add_last(Box::new(DoubleSquareToPh));
        p.add_last(Box::new(SprintfToPh::new()));
        p.add_last(Box::new(XliffTagRestore));
        p
    }

    pub fn layer1_to_layer0_pipeline(&self) -> Pipeline {
        let mut p = Pipeline::new(self.context());
        p.add_last(Box::new(LtGtDecode));
        p.add_last(Box::new(PlaceholderToMarkup));
        p.add_last(Box::new(DataRefRestore));
        p
    }

    pub fn layer1_to_layer2_pipeline(&self) -> Pipeline {
        let mut p = Pipeline::new(self.context());
        p.add_last(Box::new(UiSentinelEncode));
        p
    }

    pub fn layer2_to_layer1_pipeline(&self) -> Pipeline {
        let mut p = Pipeline::new(self.context());
        p.add_last(Box::new(UiSentinelDecode));
        p
    }

    pub fn from_raw_to_layer0(&self, segment: &str) -> String {
        self.raw_to_layer0_pipeline().transform(segment)
    }

    pub fn from_layer0_to_raw(&self, segment: &str) -> String {
        self.layer0_to_raw_pipeline().transform(segment)
    }

    pub fn from_layer0_to_layer1(&self, segment: &str) -> String {
        self.layer0_to_layer1_pipeline().transform(segment)
    }

    pub fn from_layer1_to_layer0(&self, segment: &str) -> String {
        self.layer1_to_layer0_pipeline().transform(segment)
    }

    pub fn from_layer1_to_layer2(&self, segment: &str) -> String {
        self.layer1_to_layer2_pipeline().transform(segment)
    }

    pub fn from_layer2_to_layer1(&self, segment: &str) -> String {
        self.layer2_to_layer1_pipeline().transform(segment)
    }

    pub fn from_layer0_to_layer2(&self, segment: &str) -> String {
        self.from_layer1_to_layer2(&self.from_layer0_to_layer1(segment))
    }

    pub fn from_layer2_to_layer0(&self, segment: &str) -> String {
        self.from_layer1_to_layer0(&self.from_layer2_to_layer1(segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholder::find_ph_tokens;

    fn bridge() -> LayerBridge {
        LayerBridge::new(None, None, DataRefMap::new())
    }

    fn bridge_with_refs(entries: &[(&str, Option<&str>)]) -> LayerBridge {
        let refs = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(|s| s.to_string())))
            .collect();
        LayerBridge::new(None, None, refs)
    }

    #[test]
    fn html_markup_becomes_sequential_placeholders() {
        let b = bridge();
        let layer1 = b.from_layer0_to_layer1("The <b>bold</b> move");
        assert_eq!(
            layer1,
            r#"The <ph id="mtc_1" ctype="html" equiv-text="base64:PGI+"/>bold<ph id="mtc_2" ctype="html" equiv-text="base64:PC9iPg=="/> move"#
        );
        assert_eq!(b.from_layer1_to_layer0(&layer1), "The <b>bold</b> move");
    }

    #[test]
    fn public_ids_match_textual_order() {
        let b = bridge();
        let layer1 = b.from_layer0_to_layer1("{{ v }} then <i>x</i> and %s");
        let ids: Vec<String> = find_ph_tokens(&layer1).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["mtc_1", "mtc_2", "mtc_3", "mtc_4"]);
    }

    #[test]
    fn literal_xliff_tags_survive_layer1() {
        let b = bridge();
        let src = r#"a <g id="1">x</g> <x id="2"/> b"#;
        let layer1 = b.from_layer0_to_layer1(src);
        assert_eq!(layer1, src);
        assert_eq!(b.from_layer1_to_layer0(&layer1), src);
    }

    #[test]
    fn layer0_to_layer1_is_idempotent() {
        let b = bridge();
        let once = b.from_layer0_to_layer1("mix <b>of</b> {{ var }} and <g id='1'>tags</g>");
        let twice = b.from_layer0_to_layer1(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn variables_and_markup_roundtrip() {
        let b = bridge();
        let src = "Dear %1$s, see <a href=\"x\">this</a> and {{ page }} or [[Home]]";
        let layer1 = b.from_layer0_to_layer1(src);
        assert!(find_ph_tokens(&layer1).len() >= 4);
        assert_eq!(b.from_layer1_to_layer0(&layer1), src);
    }

    #[test]
    fn data_refs_flatten_on_the_way_in_and_out()  {
        let b = bridge_with_refs(&[("d1", Some("_"))]);
        let src = r#"go <pc id="1" dataRefStart="d1" dataRefEnd="d1">here</pc>"#;
        let layer1 = b.from_layer0_to_layer1(src);
        assert!(layer1.contains(r#"ctype="x-pc_open_data_ref""#));
        assert!(layer1.contains(r#"ctype="x-pc_close_data_ref""#));
        // Flattened tokens pass the generic scanner untouched.
        assert!(!layer1.contains("&lt;ph"));
        assert_eq!(b.from_layer1_to_layer0(&layer1), src);
    }

    #[test]
    fn ui_layer_roundtrip() {
        let b = bridge();
        let layer1 = b.from_layer0_to_layer1("stray > and\ttab <b>x</b>");
        let layer2 = b.from_layer1_to_layer2(&layer1);
        assert!(layer2.contains("##$_09$##"));
        assert!(!layer2.contains('<'));
        assert_eq!(b.from_layer2_to_layer1(&layer2), layer1);
    }

    #[test]
    fn raw_boundary_strips_and_encodes() {
        let b = bridge();
        let layer0 = b.from_raw_to_layer0("a\u{0007}b\r\nc\td");
        assert_eq!(layer0, "ab&#13;&#10;c&#9;d");
        assert_eq!(b.from_layer0_to_raw(&layer0), "ab\r\nc\td");
    }

    #[test]
    fn layer0_to_layer2_composition() {
        let b = bridge();
        let layer2 = b.from_layer0_to_layer2("a <b>x</b>");
        assert!(layer2.starts_with("a &lt;ph"));
        assert_eq!(b.from_layer2_to_layer0(&layer2), "a <b>x</b>");
    }

    #[test]
    fn optional_stages_can_be_spliced() {
        let b = bridge();
        let mut p = b.layer0_to_layer1_pipeline();
        assert!(p.contains("twig-to-ph"));
        p.remove("twig-to-ph");
        assert!(!p.contains("twig-to-ph"));
        let layer1 = p.transform("keep {{ raw }} but <b>x</b>");
        assert!(layer1.contains("{{ raw }}"));
        assert!(layer1.contains(r#"ctype="html""#));
    }
}
