//! Source files and the content categories they route to.
//!
//! A [`SourceFile`] is created once at the start of a request and never
//! mutated. Its category decides which extractor runs and, later, which model
//! tier the selector picks.

use crate::extract::ExtractError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Broad family of content a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Text,
    Document,
    Pdf,
    Video,
    Audio,
}

impl ContentCategory {
    /// Look up the category for a file extension (case-insensitive, no dot).
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(ext, _, _)| *ext == extension)
            .map(|(_, category, _)| *category)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Text => "text",
            ContentCategory::Document => "document",
            ContentCategory::Pdf => "pdf",
            ContentCategory::Video => "video",
            ContentCategory::Audio => "audio",
        }
    }

    /// Audio and video both go through transcription.
    pub fn is_media(&self) -> bool {
        matches!(self, ContentCategory::Video | ContentCategory::Audio)
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension, category and MIME type for every supported format.
const EXTENSIONS: &[(&str, ContentCategory, &str)] = &[
    ("txt", ContentCategory::Text, "text/plain"),
    ("md", ContentCategory::Text, "text/markdown"),
    ("markdown", ContentCategory::Text, "text/markdown"),
    ("log", ContentCategory::Text, "text/plain"),
    (
        "docx",
        ContentCategory::Document,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("rtf", ContentCategory::Document, "application/rtf"),
    ("html", ContentCategory::Document, "text/html"),
    ("htm", ContentCategory::Document, "text/html"),
    ("pdf", ContentCategory::Pdf, "application/pdf"),
    ("mp4", ContentCategory::Video, "video/mp4"),
    ("avi", ContentCategory::Video, "video/x-msvideo"),
    ("mov", ContentCategory::Video, "video/quicktime"),
    ("mkv", ContentCategory::Video, "video/x-matroska"),
    ("wmv", ContentCategory::Video, "video/x-ms-wmv"),
    ("webm", ContentCategory::Video, "video/webm"),
    ("mp3", ContentCategory::Audio, "audio/mpeg"),
    ("wav", ContentCategory::Audio, "audio/wav"),
    ("m4a", ContentCategory::Audio, "audio/mp4"),
    ("flac", ContentCategory::Audio, "audio/flac"),
    ("ogg", ContentCategory::Audio, "audio/ogg"),
    ("aac", ContentCategory::Audio, "audio/aac"),
];

/// All supported extensions with their category, in table order.
pub fn supported_extensions() -> impl Iterator<Item = (&'static str, ContentCategory)> {
    EXTENSIONS.iter().map(|(ext, category, _)| (*ext, *category))
}

/// An input file, validated and classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    path: PathBuf,
    extension: String,
    size_bytes: u64,
    category: ContentCategory,
    mime: &'static str,
}

impl SourceFile {
    /// Validate and classify `path`.
    ///
    /// The path must name an existing regular file with a supported extension
    /// and must not be larger than `max_size_bytes`.
    pub fn open(path: &Path, max_size_bytes: u64) -> Result<Self, ExtractError> {
        let absolute = std::path::absolute(path)
            .map_err(|e| ExtractError::UnreadableFile(e.to_string()))?;

        let metadata = std::fs::metadata(&absolute).map_err(|e| {
            ExtractError::UnreadableFile(format!("{}: {}", absolute.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(ExtractError::UnreadableFile(format!(
                "{} is not a regular file",
                absolute.display()
            )));
        }

        let extension = absolute
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        let (category, mime) = EXTENSIONS
            .iter()
            .find(|(ext, _, _)| *ext == extension)
            .map(|(_, category, mime)| (*category, *mime))
            .ok_or_else(|| ExtractError::UnsupportedFileType(extension.clone()))?;

        let size_bytes = metadata.len();
        if size_bytes > max_size_bytes {
            return Err(ExtractError::FileTooLarge {
                size: size_bytes,
                limit: max_size_bytes,
            });
        }

        Ok(Self {
            path: absolute,
            extension,
            size_bytes,
            category,
            mime,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercase extension without the leading dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn category(&self) -> ContentCategory {
        self.category
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(ContentCategory::from_extension("PDF"), Some(ContentCategory::Pdf));
        assert_eq!(ContentCategory::from_extension(".Mp4"), Some(ContentCategory::Video));
        assert_eq!(ContentCategory::from_extension("docx"), Some(ContentCategory::Document));
        assert_eq!(ContentCategory::from_extension("exe"), None);
    }

    #[test]
    fn opens_and_classifies_text_file() {
        let mut file = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
        writeln!(file, "# Notes").unwrap();

        let source = SourceFile::open(file.path(), 1024).unwrap();
        assert_eq!(source.category(), ContentCategory::Text);
        assert_eq!(source.extension(), "md");
        assert_eq!(source.mime(), "text/markdown");
        assert!(source.path().is_absolute());
        assert_eq!(source.size_bytes(), 8);
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        let err = SourceFile::open(file.path(), 1024).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFileType(ext) if ext == "bin"));
    }

    #[test]
    fn rejects_oversized_file() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(&[b'a'; 64]).unwrap();
        let err = SourceFile::open(file.path(), 10).unwrap_err();
        assert!(matches!(err, ExtractError::FileTooLarge { size: 64, limit: 10 }));
    }

    #[test]
    fn rejects_missing_file_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SourceFile::open(&dir.path().join("gone.txt"), 1024),
            Err(ExtractError::UnreadableFile(_))
        ));
        assert!(matches!(
            SourceFile::open(dir.path(), 1024),
            Err(ExtractError::UnreadableFile(_))
        ));
    }

    #[test]
    fn every_table_entry_round_trips_through_lookup() {
        for (ext, category) in supported_extensions() {
            assert_eq!(ContentCategory::from_extension(ext), Some(category));
        }
    }
}
