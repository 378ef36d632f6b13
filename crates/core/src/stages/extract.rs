//! Text extraction stage.

use lopdf::Document;
use tracing::debug;

use super::types::StageError;

/// Extracts text from a document.
///
/// Extraction is CPU bound, so the runner calls it on the blocking pool.
pub trait TextExtractor: Send + Sync {
    /// Extract the document text with page order preserved.
    fn extract(&self, document: &[u8]) -> Result<String, StageError>;
}

/// PDF text extractor backed by `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, document: &[u8]) -> Result<String, StageError> {
        let doc = Document::load_mem(document)
            .map_err(|e| StageError::Parse(format!("unreadable PDF: {}", e)))?;

        // get_pages is keyed by page number, so iteration is in page order
        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(StageError::Parse("PDF has no pages".to_string()));
        }

        let mut texts = Vec::with_capacity(pages.len());
        for page_number in pages.keys() {
            let text = doc.extract_text(&[*page_number]).map_err(|e| {
                StageError::Parse(format!("failed to read page {}: {}", page_number, e))
            })?;
            texts.push(text);
        }

        debug!("Extracted text from {} pages", texts.len());
        Ok(join_pages(texts))
    }
}

/// Concatenate page texts in page order.
///
/// Page texts are taken as extracted: nothing is trimmed and no separator is
/// inserted, so any line breaks come from the pages themselves.
pub fn join_pages<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pages.into_iter().fold(String::new(), |mut text, page| {
        text.push_str(page.as_ref());
        text
    })
}
