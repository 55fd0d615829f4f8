//! PDF extraction: embedded text per page, OCR for pages without a text layer.

use crate::engines::{ExtractionEngines, PdfTextLayer};
use crate::extract::{run_blocking, Draft, ExtractError};
use crate::text::normalize;
use std::path::Path;
use tracing::{debug, warn};

/// PDF text layer backed by the pdf-extract crate.
/// Handles digital PDFs with embedded text.
pub struct PdfExtractText;

impl PdfTextLayer for PdfExtractText {
    fn page_texts(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
        pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
            .map_err(|e| ExtractError::UnreadableFile(format!("PDF parsing failed: {e}")))
    }
}

/// Extract a PDF page by page.
///
/// Pages with no embedded text are sent through OCR individually. The
/// document is unreadable only when every page needed OCR and OCR failed on
/// every one of them.
pub(crate) async fn extract_pdf(
    path: &Path,
    engines: &ExtractionEngines,
) -> Result<Draft, ExtractError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ExtractError::UnreadableFile(format!("{}: {}", path.display(), e)))?;
    let layer = engines.pdf.clone();
    let pages = run_blocking(move || layer.page_texts(&bytes)).await?;
    let page_count = pages.len();

    let mut sections = Vec::with_capacity(page_count);
    let mut ocr_pages = Vec::new();
    let mut ocr_failures = 0usize;
    let mut last_ocr_error = None;

    for (index, embedded) in pages.iter().enumerate() {
        let page_number = index + 1;
        let text = if embedded.trim().is_empty() {
            debug!(page = page_number, "no text layer, attempting OCR");
            match engines.ocr.recognize_page(path, page_number).await {
                Ok(recognized) => {
                    ocr_pages.push(page_number);
                    normalize(&recognized)
                }
                Err(e) => {
                    warn!(page = page_number, error = %e, "OCR failed for page");
                    ocr_failures += 1;
                    last_ocr_error = Some(e);
                    continue;
                }
            }
        } else {
            normalize(embedded)
        };

        if !text.is_empty() {
            sections.push(format!("--- Page {page_number} ---\n{text}"));
        }
    }

    if page_count > 0 && ocr_failures == page_count {
        let cause = last_ocr_error.map(|e| e.to_string()).unwrap_or_default();
        return Err(ExtractError::UnreadableFile(format!(
            "no page has a text layer and OCR failed on all {page_count} pages ({cause})"
        )));
    }

    Ok(Draft {
        text: sections.join("\n\n"),
        page_count: Some(page_count),
        ocr_pages,
        ..Draft::default()
    })
}
