//! Language-model capability.
//!
//! The ingestion pipeline holds an optional model handle so downstream
//! query layers can share one composition root; the chunking and storage
//! paths never call it.

use async_trait::async_trait;

use crate::errors::IngestError;

/// Capability interface for text completion.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, IngestError>;

    /// Identifier for logs and telemetry.
    fn id(&self) -> &str;
}
