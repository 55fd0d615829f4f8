//! Request-level errors returned by the content processor.

use crate::extract::ExtractError;
use crate::inference::InferenceError;
use crate::parser::ParseError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a request ended without a summary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("{}: {source}", file.display())]
    Extraction { file: PathBuf, source: ExtractError },
    #[error("{}: no text could be extracted", file.display())]
    EmptyContent { file: PathBuf },
    #[error("{}: {source}", file.display())]
    Inference { file: PathBuf, source: InferenceError },
    #[error("{}: primary model failed ({primary}), fallback model failed ({fallback})", file.display())]
    InferenceExhausted {
        file: PathBuf,
        primary: InferenceError,
        fallback: InferenceError,
    },
    #[error("{}: {source}", file.display())]
    Parse { file: PathBuf, source: ParseError },
    #[error("{}: cancelled", file.display())]
    Cancelled { file: PathBuf },
}

/// Flat error taxonomy for the display layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnreadableFile,
    UnsupportedMedia,
    UnsupportedFileType,
    FileTooLarge,
    EmptyContent,
    OcrFailed,
    TranscriptionFailed,
    InferenceUnavailable,
    InferenceTimeout,
    ModelNotFound,
    EmptyModelOutput,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnreadableFile => "unreadable_file",
            ErrorKind::UnsupportedMedia => "unsupported_media",
            ErrorKind::UnsupportedFileType => "unsupported_file_type",
            ErrorKind::FileTooLarge => "file_too_large",
            ErrorKind::EmptyContent => "empty_content",
            ErrorKind::OcrFailed => "ocr_failed",
            ErrorKind::TranscriptionFailed => "transcription_failed",
            ErrorKind::InferenceUnavailable => "inference_unavailable",
            ErrorKind::InferenceTimeout => "inference_timeout",
            ErrorKind::ModelNotFound => "model_not_found",
            ErrorKind::EmptyModelOutput => "empty_model_output",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ExtractError> for ErrorKind {
    fn from(e: &ExtractError) -> Self {
        match e {
            ExtractError::UnreadableFile(_) => ErrorKind::UnreadableFile,
            ExtractError::UnsupportedFileType(_) => ErrorKind::UnsupportedFileType,
            ExtractError::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            ExtractError::UnsupportedMedia(_) => ErrorKind::UnsupportedMedia,
            ExtractError::OcrFailed(_) => ErrorKind::OcrFailed,
            ExtractError::TranscriptionFailed(_) => ErrorKind::TranscriptionFailed,
        }
    }
}

impl From<&InferenceError> for ErrorKind {
    fn from(e: &InferenceError) -> Self {
        match e {
            InferenceError::Unavailable(_) => ErrorKind::InferenceUnavailable,
            InferenceError::Timeout(_) => ErrorKind::InferenceTimeout,
            InferenceError::ModelNotFound(_) => ErrorKind::ModelNotFound,
        }
    }
}

impl ProcessingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessingError::Extraction { source, .. } => source.into(),
            ProcessingError::EmptyContent { .. } => ErrorKind::EmptyContent,
            ProcessingError::Inference { source, .. } => source.into(),
            ProcessingError::InferenceExhausted { .. } => ErrorKind::InferenceUnavailable,
            ProcessingError::Parse { source, .. } => match source {
                ParseError::EmptyModelOutput => ErrorKind::EmptyModelOutput,
            },
            ProcessingError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// The file the request was for.
    pub fn file(&self) -> &Path {
        match self {
            ProcessingError::Extraction { file, .. }
            | ProcessingError::EmptyContent { file }
            | ProcessingError::Inference { file, .. }
            | ProcessingError::InferenceExhausted { file, .. }
            | ProcessingError::Parse { file, .. }
            | ProcessingError::Cancelled { file } => file,
        }
    }

    /// The cause without the file prefix.
    pub fn cause(&self) -> String {
        match self {
            ProcessingError::Extraction { source, .. } => source.to_string(),
            ProcessingError::EmptyContent { .. } => "no text could be extracted".to_string(),
            ProcessingError::Inference { source, .. } => source.to_string(),
            ProcessingError::InferenceExhausted { primary, fallback, .. } => {
                format!("primary model failed ({primary}), fallback model failed ({fallback})")
            }
            ProcessingError::Parse { source, .. } => source.to_string(),
            ProcessingError::Cancelled { .. } => "cancelled".to_string(),
        }
    }
}
