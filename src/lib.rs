//! ```text
//! Upload (text/bytes/file) ──► ingestion::service ──► temp materialization
//!                                      │
//!                                      ▼
//!                       ingestion::pipeline.ingest / bulk_ingest
//!                                      │
//!                 readers (extension dispatch) ──► Documents
//!                                      │
//!              chunking::SafeSemanticSplitter ──► Nodes
//!                   │  semantic breakpoints, fixed-size fallback
//!                   ▼
//!          embeddings::EmbeddingProvider (vector attachment)
//!                   │
//!                   ▼
//!        stores::StorageContext {doc, index, vector} ──► persist(dir)
//!
//! Listing / deletion read back through StorageContext only.
//! ```

pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod ingestion;
pub mod llm;
pub mod metadata;
pub mod readers;
pub mod stores;
pub mod types;

pub use chunking::{SafeSemanticSplitter, SentenceWindowSplitter, WindowedChunk};
pub use config::ChunkingConfig;
pub use embeddings::{EmbeddingProvider, MockEmbeddingProvider};
pub use errors::IngestError;
pub use ingestion::{IngestService, IngestionPipeline, IngestionPipelineBuilder};
pub use llm::LanguageModel;
pub use metadata::curate_metadata;
pub use readers::{DocumentReader, ReaderRegistry};
pub use stores::{DocumentStore, IndexStore, StorageContext, VectorStore};
pub use types::{ContentKind, Document, IngestedDoc, Metadata, Node, RefDocInfo};
