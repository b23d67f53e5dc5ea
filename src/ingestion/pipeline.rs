//! The ingestion component: orchestrates chunking, embedding attachment,
//! and storage-context writes for single-file and bulk ingestion.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::chunking::SafeSemanticSplitter;
use crate::config::ChunkingConfig;
use crate::embeddings::EmbeddingProvider;
use crate::errors::IngestError;
use crate::llm::LanguageModel;
use crate::readers::ReaderRegistry;
use crate::stores::StorageContext;
use crate::types::{DOC_ID_KEY, Document, Node};

/// One async mutex per document ID, created on demand.
///
/// Serializes in-flight writes (ingest persist, delete) touching the same
/// document so concurrent callers cannot interleave store mutations for one
/// ID.
#[derive(Default)]
struct WriteLockRegistry {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl WriteLockRegistry {
    async fn lock(&self, doc_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            // Entries whose only owner is the map are no longer held by any
            // in-flight call; drop them so the map does not grow unbounded.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(
                locks
                    .entry(doc_id.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    async fn lock_all(&self, doc_ids: impl Iterator<Item = &str>) -> Vec<OwnedMutexGuard<()>> {
        let mut guards = Vec::new();
        for doc_id in doc_ids {
            guards.push(self.lock(doc_id).await);
        }
        guards
    }
}

/// Orchestrator for all ingestion entry points.
///
/// Owns the chunker, the embedding capability, the reader registry, and the
/// storage context; every write path ends with a flush of all three stores
/// to the configured persist directory.
pub struct IngestionPipeline {
    chunker: SafeSemanticSplitter,
    embedder: Arc<dyn EmbeddingProvider>,
    storage: StorageContext,
    readers: ReaderRegistry,
    llm: Option<Arc<dyn LanguageModel>>,
    persist_dir: PathBuf,
    write_locks: WriteLockRegistry,
}

impl IngestionPipeline {
    pub fn builder() -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::default()
    }

    pub fn storage(&self) -> &StorageContext {
        &self.storage
    }

    /// The language-model capability, if one was wired in. Unused by the
    /// chunking and storage paths; exposed for downstream query layers.
    pub fn llm(&self) -> Option<&Arc<dyn LanguageModel>> {
        self.llm.as_ref()
    }

    /// Ingests one file: read, chunk, embed, store, persist.
    ///
    /// A single file may expand into several documents (multi-record
    /// formats); each receives a fresh unique ID, mirrored into its
    /// metadata. Returns the ingested documents.
    pub async fn ingest(
        &self,
        file_name: &str,
        path: &Path,
    ) -> Result<Vec<Document>, IngestError> {
        let documents = self.load_documents(file_name, path).await?;
        let _guards = self
            .write_locks
            .lock_all(documents.iter().map(|doc| doc.doc_id.as_str()))
            .await;
        let node_count = self.save_documents(&documents).await?;
        self.storage.persist(&self.persist_dir).await?;
        info!(
            file_name,
            documents = documents.len(),
            nodes = node_count,
            "ingested file"
        );
        Ok(documents)
    }

    /// Ingests many files with exactly one persist at the end.
    ///
    /// Semantically equivalent to calling [`ingest`](Self::ingest) once per
    /// file, but the stores are flushed only once. When any file in the
    /// batch fails, the batch's store writes are rolled back before the
    /// error returns: no document from the failed batch stays visible to
    /// listing or lookup, and earlier calls' durable state is untouched.
    pub async fn bulk_ingest(
        &self,
        files: &[(String, PathBuf)],
    ) -> Result<Vec<Document>, IngestError> {
        let mut all_documents = Vec::new();
        let mut all_guards = Vec::new();
        let mut node_count = 0usize;
        for (file_name, path) in files {
            let documents = match self.load_documents(file_name, path).await {
                Ok(documents) => documents,
                Err(err) => {
                    self.rollback_batch(&all_documents).await;
                    return Err(err);
                }
            };
            all_guards.extend(
                self.write_locks
                    .lock_all(documents.iter().map(|doc| doc.doc_id.as_str()))
                    .await,
            );
            match self.save_documents(&documents).await {
                Ok(count) => node_count += count,
                Err(err) => {
                    // include the failing file's documents: its store writes
                    // may have partially landed before the error
                    all_documents.extend(documents);
                    self.rollback_batch(&all_documents).await;
                    return Err(err);
                }
            }
            all_documents.extend(documents);
        }
        self.storage.persist(&self.persist_dir).await?;
        info!(
            files = files.len(),
            documents = all_documents.len(),
            nodes = node_count,
            "bulk ingested files"
        );
        Ok(all_documents)
    }

    /// Removes a failed batch's store writes so none of its documents stay
    /// visible. Best-effort: documents never written surface as `NotFound`
    /// and are skipped; any other failure is logged and the sweep continues.
    async fn rollback_batch(&self, documents: &[Document]) {
        for document in documents {
            let doc_id = document.doc_id.as_str();
            match self.storage.doc_store().delete_ref_doc(doc_id).await {
                Ok(removed) => {
                    if let Err(err) = self.storage.index_store().delete_entry(doc_id).await {
                        warn!(doc_id, error = %err, "rollback left a stale index entry");
                    }
                    if let Err(err) = self
                        .storage
                        .vector_store()
                        .delete_embeddings(&removed)
                        .await
                    {
                        warn!(doc_id, error = %err, "rollback left stale vector entries");
                    }
                }
                Err(IngestError::NotFound(_)) => {}
                Err(err) => warn!(doc_id, error = %err, "rollback failed for document"),
            }
        }
    }

    /// Deletes a document and every trace of it: its document-store entry,
    /// all its nodes, its index entry, and its vector entries.
    ///
    /// Returns [`IngestError::NotFound`] when `doc_id` is absent, including
    /// on a second delete of the same ID.
    pub async fn delete(&self, doc_id: &str) -> Result<(), IngestError> {
        let _guard = self.write_locks.lock(doc_id).await;
        let removed_node_ids = self.storage.doc_store().delete_ref_doc(doc_id).await?;
        self.storage.index_store().delete_entry(doc_id).await?;
        self.storage
            .vector_store()
            .delete_embeddings(&removed_node_ids)
            .await?;
        self.storage.persist(&self.persist_dir).await?;
        info!(doc_id, nodes = removed_node_ids.len(), "deleted document");
        Ok(())
    }

    /// Reads a file into documents and stamps each with its own ID.
    async fn load_documents(
        &self,
        file_name: &str,
        path: &Path,
    ) -> Result<Vec<Document>, IngestError> {
        let mut documents = self.readers.read(file_name, path).await?;
        for document in &mut documents {
            document
                .metadata
                .insert(DOC_ID_KEY.into(), document.doc_id.clone().into());
        }
        Ok(documents)
    }

    /// Chunks, embeds, and writes one batch of documents to the stores.
    ///
    /// Embedding attachment happens strictly after chunking and before any
    /// store write, so no node is ever persisted without its embedding.
    /// Does not persist; callers own the flush. Returns the node count.
    async fn save_documents(&self, documents: &[Document]) -> Result<usize, IngestError> {
        let mut nodes = self.chunker.parse_documents(documents).await?;
        self.attach_embeddings(&mut nodes).await?;

        self.storage.doc_store().add_documents(documents).await?;
        self.storage.doc_store().add_nodes(&nodes).await?;

        for document in documents {
            let node_ids: Vec<String> = nodes
                .iter()
                .filter(|node| node.ref_doc_id.as_deref() == Some(document.doc_id.as_str()))
                .map(|node| node.node_id.clone())
                .collect();
            self.storage
                .index_store()
                .put_entry(&document.doc_id, node_ids)
                .await?;
        }

        let entries: Vec<(String, Vec<f32>)> = nodes
            .iter()
            .filter_map(|node| {
                node.embedding
                    .clone()
                    .map(|embedding| (node.node_id.clone(), embedding))
            })
            .collect();
        self.storage.vector_store().add_embeddings(entries).await?;
        Ok(nodes.len())
    }

    /// Embeds every text node in place; raw nodes are skipped.
    async fn attach_embeddings(&self, nodes: &mut [Node]) -> Result<(), IngestError> {
        let text_indices: Vec<usize> = nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_text())
            .map(|(i, _)| i)
            .collect();
        if text_indices.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = text_indices
            .iter()
            .map(|&i| nodes[i].text.clone())
            .collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(IngestError::Embedding(format!(
                "provider '{}' returned {} vectors for {} nodes",
                self.embedder.id(),
                vectors.len(),
                texts.len()
            )));
        }
        for (i, vector) in text_indices.into_iter().zip(vectors) {
            nodes[i].embedding = Some(vector);
        }
        Ok(())
    }
}

/// Builder for [`IngestionPipeline`].
#[derive(Default)]
pub struct IngestionPipelineBuilder {
    storage: Option<StorageContext>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    readers: Option<ReaderRegistry>,
    config: Option<ChunkingConfig>,
    llm: Option<Arc<dyn LanguageModel>>,
    persist_dir: Option<PathBuf>,
}

impl IngestionPipelineBuilder {
    /// Storage context holding the three backing stores. Required.
    #[must_use]
    pub fn storage(mut self, storage: StorageContext) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Embedding capability used for breakpoints and node vectors. Required.
    #[must_use]
    pub fn embedding_provider(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Base directory the stores flush to. Required.
    #[must_use]
    pub fn persist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persist_dir = Some(dir.into());
        self
    }

    /// Reader registry. Defaults to [`ReaderRegistry::with_defaults`].
    #[must_use]
    pub fn readers(mut self, readers: ReaderRegistry) -> Self {
        self.readers = Some(readers);
        self
    }

    /// Chunking configuration. Defaults to [`ChunkingConfig::default`].
    #[must_use]
    pub fn chunking_config(mut self, config: ChunkingConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Optional language-model capability to hold for downstream layers.
    #[must_use]
    pub fn language_model(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Builds the pipeline.
    ///
    /// # Panics
    ///
    /// Panics if `storage`, `embedding_provider`, or `persist_dir` was not
    /// set. Returns an error only when tokenizer setup fails.
    pub fn build(self) -> Result<IngestionPipeline, IngestError> {
        let storage = self.storage.expect("IngestionPipelineBuilder requires storage");
        let embedder = self
            .embedder
            .expect("IngestionPipelineBuilder requires an embedding provider");
        let persist_dir = self
            .persist_dir
            .expect("IngestionPipelineBuilder requires a persist dir");
        let config = self.config.unwrap_or_default();
        let chunker = SafeSemanticSplitter::new(Arc::clone(&embedder), config)?;
        Ok(IngestionPipeline {
            chunker,
            embedder,
            storage,
            readers: self.readers.unwrap_or_default(),
            llm: self.llm,
            persist_dir,
            write_locks: WriteLockRegistry::default(),
        })
    }
}
