//! Mock text extractor for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::stages::{join_pages, StageError, TextExtractor};

const HEADER: &str = "%MOCK-PDF\n";
const PAGE_BREAK: &str = "\u{c}";

/// Mock implementation of the TextExtractor trait.
///
/// Understands the simple page format produced by [`MockExtractor::document`]
/// and rejects everything else as unparseable.
#[derive(Debug, Clone, Default)]
pub struct MockExtractor {
    calls: Arc<AtomicUsize>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document with the given page texts.
    pub fn document(pages: &[&str]) -> Vec<u8> {
        format!("{}{}", HEADER, pages.join(PAGE_BREAK)).into_bytes()
    }

    /// Number of documents extracted so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextExtractor for MockExtractor {
    fn extract(&self, document: &[u8]) -> Result<String, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let text = std::str::from_utf8(document)
            .map_err(|e| StageError::Parse(format!("not a mock document: {}", e)))?;
        let body = text
            .strip_prefix(HEADER)
            .ok_or_else(|| StageError::Parse("missing mock document header".to_string()))?;

        Ok(join_pages(body.split(PAGE_BREAK)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_document_round_trip() {
        let extractor = MockExtractor::new();
        let doc = MockExtractor::document(&["Page1", "Page2"]);
        assert_eq!(extractor.extract(&doc).unwrap(), "Page1Page2");
        assert!(extractor.extract(b"garbage").is_err());
        assert_eq!(extractor.call_count(), 2);
    }
}
