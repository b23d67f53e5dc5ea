//! Error taxonomy for the ingestion pipeline.
//!
//! Write-path errors (`Persistence`, `NotFound`, `Decode`, `Embedding`,
//! `Chunking`) always propagate to the caller. `StoreState` marks a store
//! in a damaged or uninitialized condition; the service's listing and
//! lookup paths treat store-read failures as advisory and degrade to an
//! empty result instead of failing the request.

use thiserror::Error;

/// Errors produced by ingestion, deletion, and store access.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Durable flush of the backing stores failed. The batch that was being
    /// written is not durably committed and must not be treated as such.
    #[error("failed to persist stores: {0}")]
    Persistence(String),

    /// A store was queried in an unexpected or uninitialized state (for
    /// example a corrupt on-disk snapshot). Recoverable on read paths only.
    #[error("store state invalid: {0}")]
    StoreState(String),

    /// The referenced document ID is absent from the document store.
    #[error("document '{0}' not found")]
    NotFound(String),

    /// Unsupported or malformed file content for the selected reader.
    #[error("failed to decode '{file_name}': {reason}")]
    Decode { file_name: String, reason: String },

    /// The embedding provider failed or returned a malformed batch.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Sentence segmentation or tokenizer setup failed.
    #[error("chunking failed: {0}")]
    Chunking(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Convenience constructor for [`IngestError::Decode`].
    pub fn decode(file_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            file_name: file_name.into(),
            reason: reason.into(),
        }
    }
}
