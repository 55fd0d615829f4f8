//! Summary struct - the finished, display-ready result of one request.

use crate::source::ContentCategory;
use serde::Serialize;
use std::sync::Arc;

/// Marked filler used when short key point lists are padded.
pub const KEY_POINT_PLACEHOLDER: &str = "[no further key points]";

const WORDS_PER_MINUTE: usize = 200;

/// Structured summary of one source file.
///
/// Built once by the summary parser and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// One or two sentences
    tl_dr: String,
    /// Ordered highlights, within the configured bounds
    key_points: Vec<String>,
    /// One paragraph
    full_summary: String,
    /// Set when the model output was reconstructed rather than read as-is
    low_confidence: bool,
    category: ContentCategory,
    /// Normalized source text, for "view source"
    #[serde(skip)]
    source_text: Arc<str>,
}

impl Summary {
    /// Create a new summary
    pub fn new(
        tl_dr: String,
        key_points: Vec<String>,
        full_summary: String,
        low_confidence: bool,
        category: ContentCategory,
    ) -> Self {
        Self {
            tl_dr,
            key_points,
            full_summary,
            low_confidence,
            category,
            source_text: Arc::from(""),
        }
    }

    /// Attach the normalized text the summary was made from.
    pub(crate) fn with_source(mut self, source_text: Arc<str>) -> Self {
        self.source_text = source_text;
        self
    }

    pub fn tl_dr(&self) -> &str {
        &self.tl_dr
    }

    pub fn key_points(&self) -> &[String] {
        &self.key_points
    }

    pub fn full_summary(&self) -> &str {
        &self.full_summary
    }

    pub fn is_low_confidence(&self) -> bool {
        self.low_confidence
    }

    pub fn category(&self) -> ContentCategory {
        self.category
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// Estimated minutes to read the source text, at least one.
    pub fn reading_minutes(&self) -> usize {
        let words = self.source_text.split_whitespace().count();
        words.div_ceil(WORDS_PER_MINUTE).max(1)
    }

    /// Check if the summary has any content
    pub fn is_empty(&self) -> bool {
        self.tl_dr.is_empty() && self.key_points.is_empty() && self.full_summary.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> Summary {
        Summary::new(
            "Short.".to_string(),
            vec!["one".to_string()],
            "Longer text.".to_string(),
            false,
            ContentCategory::Text,
        )
    }

    #[test]
    fn reading_time_rounds_up() {
        let s = summary().with_source(Arc::from("word ".repeat(401).as_str()));
        assert_eq!(s.reading_minutes(), 3);
        assert_eq!(summary().reading_minutes(), 1);
    }

    #[test]
    fn source_text_is_not_serialized() {
        let s = summary().with_source(Arc::from("secret source"));
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains(r#""tl_dr":"Short.""#));
        assert!(json.contains(r#""category":"text""#));
        assert!(!json.contains("secret source"));
        assert_eq!(s.source_text(), "secret source");
    }

    #[test]
    fn empty_when_every_section_is_empty() {
        let s = Summary::new(String::new(), vec![], String::new(), true, ContentCategory::Pdf);
        assert!(s.is_empty());
        assert!(!summary().is_empty());
    }
}
