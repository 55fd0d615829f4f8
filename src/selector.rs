//! Model selection: which model variant and prompt template a request gets.

use crate::config::{Config, ModelConfig};
use crate::extract::ContentMetadata;
use crate::source::ContentCategory;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Small,
    Large,
}

impl ModelTier {
    pub fn opposite(self) -> Self {
        match self {
            ModelTier::Small => ModelTier::Large,
            ModelTier::Large => ModelTier::Small,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Small => "small",
            ModelTier::Large => "large",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptTemplate {
    ShortForm,
    LongForm,
}

/// A concrete model identifier plus generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSpec {
    pub id: String,
    pub tier: ModelTier,
    pub temperature: f32,
    pub max_tokens: u32,
    pub context_window: u32,
}

impl ModelSpec {
    fn from_config(tier: ModelTier, model: &ModelConfig) -> Self {
        Self {
            id: model.name.clone(),
            tier,
            temperature: model.temperature,
            max_tokens: model.max_tokens,
            context_window: model.context_window,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelChoice {
    pub primary: ModelSpec,
    /// Always the opposite tier of `primary`.
    pub fallback: ModelSpec,
    pub template: PromptTemplate,
}

/// Routing policy, fixed at construction.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    small: ModelSpec,
    large: ModelSpec,
    page_threshold: usize,
}

impl ModelSelector {
    pub fn from_config(config: &Config) -> Self {
        Self {
            small: ModelSpec::from_config(ModelTier::Small, &config.models.small),
            large: ModelSpec::from_config(ModelTier::Large, &config.models.large),
            page_threshold: config.routing.long_form_page_threshold,
        }
    }

    /// Audio, video and long PDFs get the large model and the long-form
    /// template. Everything else, including a PDF without a page count, gets
    /// the small one.
    pub fn select(&self, category: ContentCategory, metadata: &ContentMetadata) -> ModelChoice {
        let long_form = match category {
            ContentCategory::Video | ContentCategory::Audio => true,
            ContentCategory::Pdf => metadata
                .page_count
                .is_some_and(|pages| pages > self.page_threshold),
            ContentCategory::Text | ContentCategory::Document => false,
        };

        let (tier, template) = if long_form {
            (ModelTier::Large, PromptTemplate::LongForm)
        } else {
            (ModelTier::Small, PromptTemplate::ShortForm)
        };

        ModelChoice {
            primary: self.spec(tier).clone(),
            fallback: self.spec(tier.opposite()).clone(),
            template,
        }
    }

    pub fn spec(&self, tier: ModelTier) -> &ModelSpec {
        match tier {
            ModelTier::Small => &self.small,
            ModelTier::Large => &self.large,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> ModelSelector {
        ModelSelector::from_config(&Config::default())
    }

    fn pages(count: usize) -> ContentMetadata {
        ContentMetadata {
            page_count: Some(count),
            ..ContentMetadata::default()
        }
    }

    #[test]
    fn short_pdf_gets_small_model() {
        let choice = selector().select(ContentCategory::Pdf, &pages(2));
        assert_eq!(choice.primary.id, "gemma3n:e2b");
        assert_eq!(choice.fallback.id, "gemma3n:e4b");
        assert_eq!(choice.template, PromptTemplate::ShortForm);
    }

    #[test]
    fn threshold_is_exclusive() {
        let s = selector();
        assert_eq!(s.select(ContentCategory::Pdf, &pages(10)).primary.tier, ModelTier::Small);
        assert_eq!(s.select(ContentCategory::Pdf, &pages(11)).primary.tier, ModelTier::Large);
    }

    #[test]
    fn media_is_always_long_form() {
        let s = selector();
        let brief = ContentMetadata {
            duration_secs: Some(12.0),
            approx_tokens: 20,
            ..ContentMetadata::default()
        };
        for category in [ContentCategory::Video, ContentCategory::Audio] {
            let choice = s.select(category, &brief);
            assert_eq!(choice.primary.tier, ModelTier::Large);
            assert_eq!(choice.fallback.tier, ModelTier::Small);
            assert_eq!(choice.template, PromptTemplate::LongForm);
        }
    }

    #[test]
    fn missing_metadata_defaults_to_small() {
        let choice = selector().select(ContentCategory::Pdf, &ContentMetadata::default());
        assert_eq!(choice.primary.tier, ModelTier::Small);
    }

    #[test]
    fn text_ignores_length() {
        let huge = ContentMetadata {
            page_count: Some(500),
            approx_tokens: 100_000,
            ..ContentMetadata::default()
        };
        let choice = selector().select(ContentCategory::Text, &huge);
        assert_eq!(choice.primary.tier, ModelTier::Small);
    }

    #[test]
    fn selection_is_deterministic() {
        let s = selector();
        let meta = pages(42);
        assert_eq!(
            s.select(ContentCategory::Pdf, &meta),
            s.select(ContentCategory::Pdf, &meta)
        );
    }

    #[test]
    fn custom_threshold_is_honored() {
        let mut config = Config::default();
        config.routing.long_form_page_threshold = 1;
        let choice = ModelSelector::from_config(&config).select(ContentCategory::Pdf, &pages(2));
        assert_eq!(choice.primary.tier, ModelTier::Large);
    }
}
