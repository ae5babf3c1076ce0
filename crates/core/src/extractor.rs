use crate::chunking::truncate_chars;
use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Non-blank pages of one PDF, in page order.
#[derive(Debug, Clone)]
pub struct ExtractedPdf {
    pub source: String,
    pub total_pages: u32,
    pub pages: Vec<PageText>,
}

#[derive(Debug, Clone, Copy)]
pub struct ExtractionLimits {
    pub max_page_chars: usize,
    pub progress_every: u32,
}

pub trait PdfExtractor {
    fn extract(&self, path: &Path, limits: ExtractionLimits) -> Result<ExtractedPdf, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract(&self, path: &Path, limits: ExtractionLimits) -> Result<ExtractedPdf, IngestError> {
        info!(path = %path.display(), "opening pdf");
        let document = Document::load(path).map_err(|error| {
            IngestError::PdfParse(format!("{}: {error}", path.display()))
        })?;

        let source = source_stem(path)?;
        let page_numbers = document.get_pages().into_keys().collect::<Vec<_>>();
        let total_pages = page_numbers.len() as u32;
        info!(path = %path.display(), total_pages, "pdf loaded");

        let mut pages = Vec::new();
        for (position, page_no) in page_numbers.into_iter().enumerate() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(format!("page {page_no}: {error}")))?;

            if let Some(page) = keep_page(page_no, &text, limits.max_page_chars) {
                pages.push(page);
            }

            let processed = position as u32 + 1;
            if limits.progress_every > 0 && processed % limits.progress_every == 0 {
                info!(processed, total_pages, "extracting pages");
            }
        }

        info!(
            source = %source,
            kept = pages.len(),
            total_pages,
            "extracted non-empty pages"
        );

        Ok(ExtractedPdf {
            source,
            total_pages,
            pages,
        })
    }
}

/// Drops blank pages and caps the rest at `max_chars` characters.
pub fn keep_page(number: u32, text: &str, max_chars: usize) -> Option<PageText> {
    if text.trim().is_empty() {
        return None;
    }

    Some(PageText {
        number,
        text: truncate_chars(text, max_chars).to_string(),
    })
}

pub fn source_stem(path: &Path) -> Result<String, IngestError> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))
}
