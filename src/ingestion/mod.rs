//! Ingestion orchestration.
//!
//! * [`pipeline`] — the ingestion component: read → chunk → embed → store →
//!   persist, plus deletion with store consistency.
//! * [`service`] — the thin adaptation layer for text and binary uploads,
//!   listing, and filename lookups.

pub mod pipeline;
pub mod service;

pub use pipeline::{IngestionPipeline, IngestionPipelineBuilder};
pub use service::IngestService;
