//! Content extraction: turn a [`SourceFile`] into normalized text plus metadata.
//!
//! The extractor family is closed. [`Extractor::for_category`] resolves the
//! variant once per request; each variant delegates to its format module
//! (`text`, `pdf`, `media`). All variants cap the normalized text at the
//! configured character limit and flag the result as truncated instead of
//! failing.

use crate::engines::ExtractionEngines;
use crate::language::detect_language;
use crate::source::{ContentCategory, SourceFile};
use crate::{media, pdf, text};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("file could not be read: {0}")]
    UnreadableFile(String),
    #[error("unsupported file type: .{0}")]
    UnsupportedFileType(String),
    #[error("file is {size} bytes, above the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("unsupported media: {0}")]
    UnsupportedMedia(String),
    #[error("OCR failed: {0}")]
    OcrFailed(String),
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
}

/// Structural facts about the extracted content.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContentMetadata {
    /// PDF page count.
    pub page_count: Option<usize>,
    /// Audio/video running time.
    pub duration_secs: Option<f64>,
    /// ISO 639-1 code, when it could be detected.
    pub language: Option<String>,
    /// Rough token estimate (four characters per token).
    pub approx_tokens: usize,
    pub char_count: usize,
}

/// How trustworthy the extracted text is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionConfidence {
    /// PDF pages whose text came from OCR, 1-based.
    pub ocr_pages: Vec<usize>,
    pub transcribed: bool,
    pub truncated: bool,
    pub empty_content: bool,
}

impl ExtractionConfidence {
    pub fn ocr_used(&self) -> bool {
        !self.ocr_pages.is_empty()
    }

    /// True when a lossy path (OCR, transcription, truncation) produced the text.
    pub fn is_lossy(&self) -> bool {
        self.ocr_used() || self.transcribed || self.truncated
    }
}

/// Normalized text and metadata for one request.
///
/// `text` is non-empty unless `confidence.empty_content` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    pub category: ContentCategory,
    pub metadata: ContentMetadata,
    pub confidence: ExtractionConfidence,
}

/// What a format module hands back before capping and bookkeeping.
#[derive(Debug, Default)]
pub(crate) struct Draft {
    pub text: String,
    pub page_count: Option<usize>,
    pub duration_secs: Option<f64>,
    pub language: Option<String>,
    pub ocr_pages: Vec<usize>,
    pub transcribed: bool,
}

impl Draft {
    pub(crate) fn text(text: String) -> Self {
        Self {
            text,
            ..Self::default()
        }
    }

    fn finish(self, category: ContentCategory, max_chars: usize) -> ExtractionResult {
        let (text, truncated) = cap_chars(self.text, max_chars);
        let char_count = text.chars().count();
        let empty_content = text.trim().is_empty();
        let language = self.language.or_else(|| detect_language(&text));

        ExtractionResult {
            metadata: ContentMetadata {
                page_count: self.page_count,
                duration_secs: self.duration_secs,
                language,
                approx_tokens: char_count.div_ceil(4),
                char_count,
            },
            confidence: ExtractionConfidence {
                ocr_pages: self.ocr_pages,
                transcribed: self.transcribed,
                truncated,
                empty_content,
            },
            text,
            category,
        }
    }
}

/// Cut `text` to at most `max_chars` characters.
fn cap_chars(mut text: String, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            text.truncate(idx);
            let kept = text.trim_end().len();
            text.truncate(kept);
            (text, true)
        }
        None => (text, false),
    }
}

/// The closed set of extractors, one per content family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    PlainText,
    RichDocument,
    Pdf,
    AudioVideo,
}

impl Extractor {
    pub fn for_category(category: ContentCategory) -> Self {
        match category {
            ContentCategory::Text => Extractor::PlainText,
            ContentCategory::Document => Extractor::RichDocument,
            ContentCategory::Pdf => Extractor::Pdf,
            ContentCategory::Video | ContentCategory::Audio => Extractor::AudioVideo,
        }
    }

    /// Whether this extractor handles files with `extension`.
    pub fn supports(&self, extension: &str) -> bool {
        ContentCategory::from_extension(extension).map(Self::for_category) == Some(*self)
    }

    /// Extract normalized text from `source`.
    pub async fn extract(
        &self,
        source: &SourceFile,
        engines: &ExtractionEngines,
        max_chars: usize,
    ) -> Result<ExtractionResult, ExtractError> {
        let draft = match self {
            Extractor::PlainText => {
                let path = source.path().to_path_buf();
                run_blocking(move || text::read_plain(&path).map(Draft::text)).await?
            }
            Extractor::RichDocument => {
                let path = source.path().to_path_buf();
                let extension = source.extension().to_string();
                run_blocking(move || text::read_rich(&path, &extension).map(Draft::text)).await?
            }
            Extractor::Pdf => pdf::extract_pdf(source.path(), engines).await?,
            Extractor::AudioVideo => media::extract_media(source.path(), engines).await?,
        };

        let result = draft.finish(source.category(), max_chars);
        debug!(
            file = %source.path().display(),
            chars = result.metadata.char_count,
            truncated = result.confidence.truncated,
            ocr_pages = result.confidence.ocr_pages.len(),
            "extraction finished"
        );
        Ok(result)
    }
}

/// Run blocking extraction work off the async executor.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, ExtractError>
where
    F: FnOnce() -> Result<T, ExtractError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ExtractError::UnreadableFile(format!("extraction task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extractor_resolution_covers_every_category() {
        assert_eq!(Extractor::for_category(ContentCategory::Text), Extractor::PlainText);
        assert_eq!(
            Extractor::for_category(ContentCategory::Document),
            Extractor::RichDocument
        );
        assert_eq!(Extractor::for_category(ContentCategory::Pdf), Extractor::Pdf);
        assert_eq!(Extractor::for_category(ContentCategory::Video), Extractor::AudioVideo);
        assert_eq!(Extractor::for_category(ContentCategory::Audio), Extractor::AudioVideo);
    }

    #[test]
    fn supports_matches_extension_table() {
        assert!(Extractor::PlainText.supports("txt"));
        assert!(Extractor::RichDocument.supports("DOCX"));
        assert!(Extractor::Pdf.supports("pdf"));
        assert!(Extractor::AudioVideo.supports("mkv"));
        assert!(Extractor::AudioVideo.supports("mp3"));
        assert!(!Extractor::Pdf.supports("txt"));
        assert!(!Extractor::PlainText.supports("exe"));
    }

    #[test]
    fn cap_keeps_short_text_untouched() {
        let (text, truncated) = cap_chars("short".to_string(), 10);
        assert_eq!(text, "short");
        assert!(!truncated);
    }

    #[test]
    fn cap_truncates_on_char_boundary() {
        let (text, truncated) = cap_chars("héllo wörld".to_string(), 7);
        assert_eq!(text, "héllo w");
        assert!(truncated);
    }

    #[test]
    fn finish_sets_truncated_and_counts() {
        let draft = Draft::text("a".repeat(100));
        let result = draft.finish(ContentCategory::Text, 40);
        assert!(result.confidence.truncated);
        assert_eq!(result.metadata.char_count, 40);
        assert_eq!(result.metadata.approx_tokens, 10);
        assert!(!result.confidence.empty_content);
    }

    #[test]
    fn finish_flags_empty_content() {
        let result = Draft::text(String::new()).finish(ContentCategory::Text, 40);
        assert!(result.confidence.empty_content);
        assert!(!result.confidence.is_lossy());
    }

    #[tokio::test]
    async fn plain_text_extraction_normalizes_paragraphs() {
        use std::io::Write;
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "  First line  \r\nsecond   line\r\n\r\n\r\n\r\nNext paragraph\n").unwrap();

        let source = SourceFile::open(file.path(), 1 << 20).unwrap();
        let engines = ExtractionEngines::disabled();
        let result = Extractor::PlainText
            .extract(&source, &engines, 10_000)
            .await
            .unwrap();

        assert_eq!(result.text, "First line\nsecond line\n\nNext paragraph");
        assert_eq!(result.category, ContentCategory::Text);
        assert!(!result.confidence.truncated);
    }
}
