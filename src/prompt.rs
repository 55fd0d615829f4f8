//! Prompt construction for the structured summary layout.
//!
//! The model is asked for three marked sections. The parser tolerates drift
//! from this layout, but asking for it exactly keeps drift rare.

use crate::config::SummaryConfig;
use crate::extract::ExtractionResult;
use crate::selector::PromptTemplate;
use crate::source::ContentCategory;

pub const TLDR_MARKER: &str = "**TL;DR:**";
pub const KEY_POINTS_MARKER: &str = "**KEY POINTS:**";
pub const FULL_SUMMARY_MARKER: &str = "**FULL SUMMARY:**";

const SYSTEM_PROMPT: &str = "You write summaries for readers who benefit from clear, \
low-clutter structure, including people with ADHD and dyslexia. Use plain words and short \
sentences. Never invent facts that are not in the content.";

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Build the prompt for one request.
pub fn build_prompt(
    template: PromptTemplate,
    extraction: &ExtractionResult,
    summary: &SummaryConfig,
) -> Prompt {
    let mut user = String::new();
    user.push_str(intro(extraction.category));
    user.push('\n');

    if template == PromptTemplate::LongForm {
        user.push_str(
            "The content is long. Cover the whole arc, not just the opening, and keep the \
             key points to the ideas that matter most.\n",
        );
    }
    if extraction.confidence.truncated {
        user.push_str("The content was cut off for length; summarize what is shown.\n");
    }
    if let Some(language) = &extraction.metadata.language {
        user.push_str(&format!(
            "The content language code is \"{language}\". Write the summary in that language.\n"
        ));
    }

    let points = if summary.min_key_points == summary.max_key_points {
        summary.min_key_points.to_string()
    } else {
        format!("{} to {}", summary.min_key_points, summary.max_key_points)
    };

    user.push_str(&format!(
        "\nRespond with exactly these three sections and nothing else:\n\n\
         {TLDR_MARKER} one or two sentences with the main message.\n\n\
         {KEY_POINTS_MARKER}\n\
         - {points} short bullet points, one idea each\n\n\
         {FULL_SUMMARY_MARKER} one paragraph of complete sentences.\n\n\
         Content to analyze:\n{}",
        extraction.text
    ));

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

fn intro(category: ContentCategory) -> &'static str {
    match category {
        ContentCategory::Pdf => "Summarize the key information from this PDF document.",
        ContentCategory::Video => {
            "Summarize this video transcript. Focus on the main points and anything the \
             viewer should act on. Timestamps appear as [MM:SS]; do not repeat them."
        }
        ContentCategory::Audio => {
            "Summarize this audio transcript. Focus on the main points and anything the \
             listener should act on. Timestamps appear as [MM:SS]; do not repeat them."
        }
        ContentCategory::Text | ContentCategory::Document => "Summarize this text.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ContentMetadata, ExtractionConfidence};

    fn extraction(category: ContentCategory, truncated: bool) -> ExtractionResult {
        ExtractionResult {
            text: "Memory is reconstructive.".to_string(),
            category,
            metadata: ContentMetadata {
                language: Some("en".to_string()),
                ..ContentMetadata::default()
            },
            confidence: ExtractionConfidence {
                truncated,
                ..ExtractionConfidence::default()
            },
        }
    }

    #[test]
    fn prompt_carries_markers_and_content() {
        let prompt = build_prompt(
            PromptTemplate::ShortForm,
            &extraction(ContentCategory::Text, false),
            &SummaryConfig::default(),
        );
        for marker in [TLDR_MARKER, KEY_POINTS_MARKER, FULL_SUMMARY_MARKER] {
            assert!(prompt.user.contains(marker));
        }
        assert!(prompt.user.contains("3 to 5 short bullet points"));
        assert!(prompt.user.ends_with("Memory is reconstructive."));
        assert!(!prompt.user.contains("cut off"));
    }

    #[test]
    fn long_form_and_truncation_add_notes() {
        let prompt = build_prompt(
            PromptTemplate::LongForm,
            &extraction(ContentCategory::Video, true),
            &SummaryConfig::default(),
        );
        assert!(prompt.user.starts_with("Summarize this video transcript."));
        assert!(prompt.user.contains("Cover the whole arc"));
        assert!(prompt.user.contains("cut off for length"));
    }

    #[test]
    fn fixed_key_point_count_is_stated_once() {
        let summary = SummaryConfig {
            min_key_points: 4,
            max_key_points: 4,
            ..SummaryConfig::default()
        };
        let prompt = build_prompt(
            PromptTemplate::ShortForm,
            &extraction(ContentCategory::Pdf, false),
            &summary,
        );
        assert!(prompt.user.contains("- 4 short bullet points"));
    }
}
