//! Submission gateway: validates requests, allocates job ids and enqueues jobs.

mod ids;
mod service;

pub use ids::{IdGenerator, UuidIdGenerator};
pub use service::{validate_pdf_url, GatewayError, SubmissionGateway, SubmitRequest, MISSING_PDF_URL};
