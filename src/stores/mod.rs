//! Persistent storage for documents, node indexes, and vectors.
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │  StorageContext  │
//!                  │ (aggregate handle)│
//!                  └───┬─────┬─────┬──┘
//!                      │     │     │
//!              ┌───────▼─┐ ┌─▼───────┐ ┌─▼─────────┐
//!              │ document│ │  index  │ │  vector   │
//!              │  store  │ │  store  │ │  store    │
//!              └─────────┘ └─────────┘ └───────────┘
//! ```
//!
//! The three store traits are the seams for alternative backends; the
//! [`simple`] module provides the default in-memory implementations that
//! load from and flush to JSON snapshots under one base directory.

pub mod simple;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::IngestError;
use crate::types::{Document, Node, RefDocInfo};

pub use simple::{SimpleDocumentStore, SimpleIndexStore, SimpleVectorStore};

/// Persisted mapping from document/node ID to content and metadata.
///
/// Owns provenance: every accepted node must carry a `ref_doc_id`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Adds document entries. Re-adding an ID overwrites it.
    async fn add_documents(&self, documents: &[Document]) -> Result<(), IngestError>;

    /// Adds nodes. Rejects any node lacking a `ref_doc_id`.
    async fn add_nodes(&self, nodes: &[Node]) -> Result<(), IngestError>;

    /// Snapshot of all stored nodes, in insertion order.
    async fn nodes(&self) -> Result<Vec<Node>, IngestError>;

    /// Per-document aggregates for every document with at least one node.
    /// Empty mapping when the store is empty.
    async fn get_all_ref_doc_info(&self) -> Result<HashMap<String, RefDocInfo>, IngestError>;

    /// Removes the document entry and all its nodes, returning the removed
    /// node IDs. `Err(NotFound)` when the document is absent.
    async fn delete_ref_doc(&self, doc_id: &str) -> Result<Vec<String>, IngestError>;

    /// Flushes in-memory state to a snapshot under `dir`.
    async fn persist(&self, dir: &Path) -> Result<(), IngestError>;
}

/// Persisted structural index over nodes: per-document node ordering,
/// independent of vector data.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Records the ordered node IDs belonging to `doc_id`.
    async fn put_entry(&self, doc_id: &str, node_ids: Vec<String>) -> Result<(), IngestError>;

    /// Ordered node IDs for `doc_id`, if indexed.
    async fn get_entry(&self, doc_id: &str) -> Result<Option<Vec<String>>, IngestError>;

    /// Drops the entry for `doc_id`; absent entries are a no-op.
    async fn delete_entry(&self, doc_id: &str) -> Result<(), IngestError>;

    async fn persist(&self, dir: &Path) -> Result<(), IngestError>;
}

/// Persisted mapping from node ID to embedding vector.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Stores `(node_id, embedding)` pairs.
    async fn add_embeddings(&self, entries: Vec<(String, Vec<f32>)>) -> Result<(), IngestError>;

    /// Embedding for a node, if present.
    async fn get_embedding(&self, node_id: &str) -> Result<Option<Vec<f32>>, IngestError>;

    /// Removes entries for the given node IDs; unknown IDs are a no-op.
    async fn delete_embeddings(&self, node_ids: &[String]) -> Result<(), IngestError>;

    async fn persist(&self, dir: &Path) -> Result<(), IngestError>;
}

/// Aggregate handle over the three backing stores.
///
/// Construction performs no cross-store validation. Writes for one
/// ingestion call are logically atomic from the caller's point of view: a
/// successful return from the pipeline implies the document, its nodes, and
/// its vectors are all present.
#[derive(Clone)]
pub struct StorageContext {
    doc_store: Arc<dyn DocumentStore>,
    index_store: Arc<dyn IndexStore>,
    vector_store: Arc<dyn VectorStore>,
}

impl StorageContext {
    /// Aggregates three already-initialized stores.
    pub fn new(
        doc_store: Arc<dyn DocumentStore>,
        index_store: Arc<dyn IndexStore>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            doc_store,
            index_store,
            vector_store,
        }
    }

    /// Builds the default simple stores, loading any snapshots under `dir`.
    ///
    /// Missing snapshot files yield empty stores; corrupt snapshots surface
    /// as [`IngestError::StoreState`].
    pub async fn from_defaults(dir: impl AsRef<Path>) -> Result<Self, IngestError> {
        let dir = dir.as_ref();
        Ok(Self::new(
            Arc::new(SimpleDocumentStore::from_persist_dir(dir).await?),
            Arc::new(SimpleIndexStore::from_persist_dir(dir).await?),
            Arc::new(SimpleVectorStore::from_persist_dir(dir).await?),
        ))
    }

    pub fn doc_store(&self) -> &Arc<dyn DocumentStore> {
        &self.doc_store
    }

    pub fn index_store(&self) -> &Arc<dyn IndexStore> {
        &self.index_store
    }

    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Flushes all three stores to durable snapshots under `dir`.
    ///
    /// A failure here means the current batch of writes is not durably
    /// committed; callers must not treat the batch as persisted.
    pub async fn persist(&self, dir: &Path) -> Result<(), IngestError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|err| IngestError::Persistence(err.to_string()))?;
        self.doc_store.persist(dir).await?;
        self.index_store.persist(dir).await?;
        self.vector_store.persist(dir).await?;
        Ok(())
    }

    /// Per-document aggregates from the document store.
    pub async fn get_all_ref_doc_info(
        &self,
    ) -> Result<HashMap<String, RefDocInfo>, IngestError> {
        self.doc_store.get_all_ref_doc_info().await
    }
}
