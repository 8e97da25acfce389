mod deck;
mod pdf;

use async_trait::async_trait;
use slidegrab_common::frame::SlideRecord;
use std::path::PathBuf;

pub use deck::DeckSink;

/// Receives accepted slides, strictly in sequence order, and assembles the
/// final document when the session ends.
///
/// `finalize` is called exactly once per session, after the last record.
/// Per-slide persistence and final-document assembly are independent
/// failure domains: a failed finalize must leave already-stored slides
/// intact.
#[async_trait]
pub trait OutputSink: Send {
    async fn store(&mut self, record: &SlideRecord) -> Result<(), SinkError>;

    async fn finalize(&mut self) -> Result<DocumentHandle, SinkError>;
}

/// Outcome of finalizing a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentHandle {
    /// The assembled document and how many pages it holds.
    Written { path: PathBuf, pages: usize },
    /// Nothing was captured; no document was produced. Not an error.
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode slide {seq} as JPEG: {source}")]
    Encode {
        seq: u64,
        source: image::ImageError,
    },
    #[error("failed to write slide image {path}: {source}")]
    WriteImage {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("slide {got} delivered out of order, expected {expected}")]
    OutOfOrder { expected: u64, got: u64 },
    #[error("failed to assemble PDF: {0}")]
    Pdf(String),
}
