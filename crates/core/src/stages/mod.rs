//! Pipeline stages.
//!
//! A run executes four stages in a fixed order:
//! - Download the source document ([`Fetcher`])
//! - Extract its text ([`TextExtractor`])
//! - Convert the text to markdown ([`convert_markdown`])
//! - Save the markdown as an artifact ([`ArtifactStore`])
//!
//! The [`StageRunner`] drives them and stops at the first failure.

mod artifact;
pub mod codec;
mod config;
mod download;
mod extract;
mod markdown;
mod runner;
mod types;

pub use artifact::{artifact_file_name, validate_task_id, ArtifactStore, FsArtifactStore};
pub use config::PipelineConfig;
pub use download::{Fetcher, HttpFetcher};
pub use extract::{join_pages, PdfTextExtractor, TextExtractor};
pub use markdown::convert_markdown;
pub use runner::{RunReport, StageRecord, StageRunner};
pub use types::{RunState, StageError, StageName, StagePayload, StageResult};
