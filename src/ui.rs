//! Terminal rendering of summaries and errors.
//!
//! Short sections, generous spacing and one idea per line. Colors come from
//! `colored` and are turned off by the binary when stdout is not a terminal.

use crate::error::{ErrorKind, ProcessingError};
use crate::health::{CheckStatus, HealthReport};
use crate::source::ContentCategory;
use crate::summary::{Summary, KEY_POINT_PLACEHOLDER};
use colored::Colorize;
use std::fmt::Write;
use std::path::Path;

/// A summary as terminal text.
pub fn render_summary(file: &Path, summary: &Summary, show_source: bool) -> String {
    let mut out = String::new();
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let _ = writeln!(
        out,
        "{} {}  {}",
        icon(summary.category()),
        name.bold(),
        format!("~{} min read", summary.reading_minutes()).dimmed()
    );
    if summary.is_low_confidence() {
        let _ = writeln!(
            out,
            "{}",
            "⚠️  The model's answer was incomplete, so parts of this summary were reconstructed."
                .yellow()
        );
    }

    let _ = writeln!(out, "\n{}", "💡 TL;DR".cyan().bold());
    let _ = writeln!(out, "  {}", summary.tl_dr());

    if !summary.key_points().is_empty() {
        let _ = writeln!(out, "\n{}", "📌 Key Points".cyan().bold());
        for point in summary.key_points() {
            if point == KEY_POINT_PLACEHOLDER {
                let _ = writeln!(out, "  • {}", point.dimmed());
            } else {
                let _ = writeln!(out, "  • {point}");
            }
        }
    }

    let _ = writeln!(out, "\n{}", "📖 Full Summary".cyan().bold());
    let _ = writeln!(out, "  {}", summary.full_summary());

    if show_source {
        let _ = writeln!(out, "\n{}", "📄 Source Text".cyan().bold());
        for line in summary.source_text().lines() {
            let _ = writeln!(out, "  {}", line.dimmed());
        }
    }

    out
}

/// Health check results, one line per check.
pub fn render_health(report: &HealthReport) -> String {
    let mut out = String::new();
    for check in &report.checks {
        let mark = match check.status {
            CheckStatus::Ok => "✓".green().bold(),
            CheckStatus::Warning => "⚠".yellow().bold(),
            CheckStatus::Failed => "✗".red().bold(),
        };
        let _ = writeln!(out, "{mark} {:<20} {}", check.name, check.detail.dimmed());
    }
    out
}

/// A processing error as terminal text.
pub fn render_error(err: &ProcessingError) -> String {
    format!(
        "{} {}\n  {}\n  {}",
        "✗".red().bold(),
        err.file().display().to_string().bold(),
        error_message(err.kind()),
        err.cause().dimmed()
    )
}

/// Plain-language explanation for each error kind.
pub fn error_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::UnreadableFile => "This file could not be read. It may be damaged or password protected.",
        ErrorKind::UnsupportedMedia => "This media file has no audio that could be used.",
        ErrorKind::UnsupportedFileType => "This type of file is not supported. Run `lucid formats` to see what is.",
        ErrorKind::FileTooLarge => "This file is larger than the configured limit.",
        ErrorKind::EmptyContent => "No text was found in this file.",
        ErrorKind::OcrFailed => "The scanned pages could not be read.",
        ErrorKind::TranscriptionFailed => "The audio could not be transcribed.",
        ErrorKind::InferenceUnavailable => "The local AI model is not responding. Is Ollama running?",
        ErrorKind::InferenceTimeout => "The local AI model took too long to answer.",
        ErrorKind::ModelNotFound => "The configured model is not installed. Run `lucid models` to check.",
        ErrorKind::EmptyModelOutput => "The AI model returned an empty answer.",
        ErrorKind::Cancelled => "Cancelled.",
    }
}

fn icon(category: ContentCategory) -> &'static str {
    match category {
        ContentCategory::Text | ContentCategory::Document => "📝",
        ContentCategory::Pdf => "📕",
        ContentCategory::Video => "🎬",
        ContentCategory::Audio => "🎧",
    }
}
