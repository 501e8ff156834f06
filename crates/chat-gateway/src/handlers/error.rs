//! Handler error types

use crate::protocol::FrameError;
use chat_core::DomainError;
use thiserror::Error;

/// Why an inbound frame produced no message.
///
/// Neither variant closes the connection.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Frame could not be decoded; dropped
    #[error("Bad frame: {0}")]
    BadFrame(#[from] FrameError),

    /// Message repository failed; the message is dropped without retry
    #[error("Persistence failed: {0}")]
    Persistence(#[from] DomainError),
}

impl IngestError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadFrame(_) => "BAD_FRAME",
            Self::Persistence(_) => "PERSISTENCE_FAILURE",
        }
    }
}

/// Ingest result; `Ok(None)` is a silent drop
pub type IngestResult<T> = Result<T, IngestError>;
