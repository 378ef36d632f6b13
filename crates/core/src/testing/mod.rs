//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the pipeline's collaborator
//! traits, allowing end-to-end tests without network access or real PDFs.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfpipe_core::testing::{MockEngine, MockExtractor, MockFetcher};
//!
//! let fetcher = MockFetcher::new();
//! fetcher.add_document("http://host/a.pdf", MockExtractor::document(&["Page1", "Page2"])).await;
//!
//! let engine = MockEngine::new();
//! engine.fail_next(vec![EngineError::Network("refused".into())]).await;
//! ```

mod mock_engine;
mod mock_extractor;
mod mock_fetcher;

pub use mock_engine::MockEngine;
pub use mock_extractor::MockExtractor;
pub use mock_fetcher::MockFetcher;

use std::sync::atomic::{AtomicU64, Ordering};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::gateway::IdGenerator;

/// Deterministic id generator.
#[derive(Debug)]
pub struct SequenceIdGenerator {
    prefix: String,
    next: AtomicU64,
    repeat: bool,
}

impl SequenceIdGenerator {
    /// Generates `<prefix>_1`, `<prefix>_2`, ...
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            next: AtomicU64::new(1),
            repeat: false,
        }
    }

    /// Generates the same id every time (for duplicate-id tests).
    pub fn repeating(id: &str) -> Self {
        Self {
            prefix: id.to_string(),
            next: AtomicU64::new(0),
            repeat: true,
        }
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn next_id(&self) -> String {
        if self.repeat {
            return self.prefix.clone();
        }
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}_{}", self.prefix, n)
    }
}

/// Build a real PDF with one line of text per page.
pub fn sample_pdf(pages: &[&str]) -> Result<Vec<u8>, lopdf::Error> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::from(page_id));
    }

    let page_count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}
