//! # Lucid
//!
//! Accessible summaries of documents, PDFs, audio and video, produced by a
//! locally hosted language model.
//!
//! ## Pipeline
//!
//! - **Extraction**: plain text, DOCX/RTF/HTML, PDF (with per-page OCR) and
//!   audio/video (with transcription) become normalized text plus metadata
//! - **Selection**: long PDFs and media go to the large model, everything else
//!   to the small one
//! - **Inference**: bounded, timed calls to Ollama with one fallback attempt
//! - **Parsing**: tolerant reading of the TL;DR / key points / full summary layout

pub mod config;
pub mod engines;
pub mod error;
pub mod extract;
pub mod health;
pub mod inference;
pub mod language;
pub mod media;
pub mod ollama;
pub mod orchestrator;
pub mod parser;
pub mod pdf;
pub mod prompt;
pub mod selector;
pub mod source;
pub mod summary;
pub mod text;
pub mod ui;

pub use config::Config;
pub use error::{ErrorKind, ProcessingError};
pub use orchestrator::{ContentProcessor, RequestTrace, Stage};
pub use source::{ContentCategory, SourceFile};
pub use summary::Summary;
