//! Default in-memory stores with JSON snapshot persistence.
//!
//! Each store keeps its state behind a `parking_lot::RwLock` and flushes to
//! a named JSON file under the base data directory on `persist`. Loading
//! tolerates a missing snapshot (empty store) but reports a corrupt one as
//! [`IngestError::StoreState`] so callers can distinguish "new" from
//! "damaged".

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::errors::IngestError;
use crate::stores::{DocumentStore, IndexStore, VectorStore};
use crate::types::{Document, Node, RefDocInfo};

pub const DOCSTORE_FILE: &str = "docstore.json";
pub const INDEX_STORE_FILE: &str = "index_store.json";
pub const VECTOR_STORE_FILE: &str = "vector_store.json";

async fn load_snapshot<T: DeserializeOwned + Default>(path: &Path) -> Result<T, IngestError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let data = fs::read_to_string(path).await?;
    serde_json::from_str(&data).map_err(|err| {
        IngestError::StoreState(format!("corrupt snapshot {}: {err}", path.display()))
    })
}

async fn write_snapshot<T: Serialize>(path: &Path, state: &T) -> Result<(), IngestError> {
    let serialized = serde_json::to_string(state)
        .map_err(|err| IngestError::Persistence(err.to_string()))?;
    fs::write(path, serialized)
        .await
        .map_err(|err| IngestError::Persistence(format!("{}: {err}", path.display())))?;
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DocStoreState {
    docs: HashMap<String, Document>,
    /// Nodes in insertion order; scans and ref-doc grouping read this.
    nodes: Vec<Node>,
}

/// In-memory document store flushed to [`DOCSTORE_FILE`].
#[derive(Debug)]
pub struct SimpleDocumentStore {
    state: RwLock<DocStoreState>,
}

impl SimpleDocumentStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DocStoreState::default()),
        }
    }

    /// Loads a snapshot from `dir`, or starts empty when none exists.
    pub async fn from_persist_dir(dir: &Path) -> Result<Self, IngestError> {
        let state = load_snapshot(&dir.join(DOCSTORE_FILE)).await?;
        Ok(Self {
            state: RwLock::new(state),
        })
    }
}

impl Default for SimpleDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for SimpleDocumentStore {
    async fn add_documents(&self, documents: &[Document]) -> Result<(), IngestError> {
        let mut state = self.state.write();
        for document in documents {
            state.docs.insert(document.doc_id.clone(), document.clone());
        }
        Ok(())
    }

    async fn add_nodes(&self, nodes: &[Node]) -> Result<(), IngestError> {
        let mut state = self.state.write();
        for node in nodes {
            let Some(ref_doc_id) = node.ref_doc_id.as_deref() else {
                return Err(IngestError::StoreState(format!(
                    "node '{}' has no ref_doc_id",
                    node.node_id
                )));
            };
            if !state.docs.contains_key(ref_doc_id) {
                return Err(IngestError::StoreState(format!(
                    "node '{}' references unknown document '{ref_doc_id}'",
                    node.node_id
                )));
            }
            state.nodes.push(node.clone());
        }
        Ok(())
    }

    async fn nodes(&self) -> Result<Vec<Node>, IngestError> {
        Ok(self.state.read().nodes.clone())
    }

    async fn get_all_ref_doc_info(&self) -> Result<HashMap<String, RefDocInfo>, IngestError> {
        let state = self.state.read();
        let mut info: HashMap<String, RefDocInfo> = HashMap::new();
        for node in &state.nodes {
            let Some(ref_doc_id) = node.ref_doc_id.as_deref() else {
                continue;
            };
            let entry = info.entry(ref_doc_id.to_string()).or_insert_with(|| {
                let metadata = state
                    .docs
                    .get(ref_doc_id)
                    .map(|doc| doc.metadata.clone())
                    .unwrap_or_default();
                RefDocInfo {
                    metadata,
                    node_ids: Vec::new(),
                }
            });
            entry.node_ids.push(node.node_id.clone());
        }
        Ok(info)
    }

    async fn delete_ref_doc(&self, doc_id: &str) -> Result<Vec<String>, IngestError> {
        let mut state = self.state.write();
        if state.docs.remove(doc_id).is_none() {
            return Err(IngestError::NotFound(doc_id.to_string()));
        }
        let mut removed = Vec::new();
        state.nodes.retain(|node| {
            if node.ref_doc_id.as_deref() == Some(doc_id) {
                removed.push(node.node_id.clone());
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn persist(&self, dir: &Path) -> Result<(), IngestError> {
        let snapshot = self.state.read().clone();
        write_snapshot(&dir.join(DOCSTORE_FILE), &snapshot).await
    }
}

/// In-memory index store flushed to [`INDEX_STORE_FILE`].
#[derive(Debug)]
pub struct SimpleIndexStore {
    entries: RwLock<HashMap<String, Vec<String>>>,
}

impl SimpleIndexStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn from_persist_dir(dir: &Path) -> Result<Self, IngestError> {
        let entries = load_snapshot(&dir.join(INDEX_STORE_FILE)).await?;
        Ok(Self {
            entries: RwLock::new(entries),
        })
    }
}

impl Default for SimpleIndexStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexStore for SimpleIndexStore {
    async fn put_entry(&self, doc_id: &str, node_ids: Vec<String>) -> Result<(), IngestError> {
        self.entries.write().insert(doc_id.to_string(), node_ids);
        Ok(())
    }

    async fn get_entry(&self, doc_id: &str) -> Result<Option<Vec<String>>, IngestError> {
        Ok(self.entries.read().get(doc_id).cloned())
    }

    async fn delete_entry(&self, doc_id: &str) -> Result<(), IngestError> {
        self.entries.write().remove(doc_id);
        Ok(())
    }

    async fn persist(&self, dir: &Path) -> Result<(), IngestError> {
        let snapshot = self.entries.read().clone();
        write_snapshot(&dir.join(INDEX_STORE_FILE), &snapshot).await
    }
}

/// In-memory vector store flushed to [`VECTOR_STORE_FILE`].
#[derive(Debug)]
pub struct SimpleVectorStore {
    vectors: RwLock<HashMap<String, Vec<f32>>>,
}

impl SimpleVectorStore {
    pub fn new() -> Self {
        Self {
            vectors: RwLock::new(HashMap::new()),
        }
    }

    pub async fn from_persist_dir(dir: &Path) -> Result<Self, IngestError> {
        let vectors = load_snapshot(&dir.join(VECTOR_STORE_FILE)).await?;
        Ok(Self {
            vectors: RwLock::new(vectors),
        })
    }
}

impl Default for SimpleVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for SimpleVectorStore {
    async fn add_embeddings(&self, entries: Vec<(String, Vec<f32>)>) -> Result<(), IngestError> {
        let mut vectors = self.vectors.write();
        for (node_id, embedding) in entries {
            vectors.insert(node_id, embedding);
        }
        Ok(())
    }

    async fn get_embedding(&self, node_id: &str) -> Result<Option<Vec<f32>>, IngestError> {
        Ok(self.vectors.read().get(node_id).cloned())
    }

    async fn delete_embeddings(&self, node_ids: &[String]) -> Result<(), IngestError> {
        let mut vectors = self.vectors.write();
        for node_id in node_ids {
            vectors.remove(node_id);
        }
        Ok(())
    }

    async fn persist(&self, dir: &Path) -> Result<(), IngestError> {
        let snapshot = self.vectors.read().clone();
        write_snapshot(&dir.join(VECTOR_STORE_FILE), &snapshot).await
    }
}

/// File path helpers used by tests and tooling.
pub fn snapshot_paths(dir: &Path) -> [PathBuf; 3] {
    [
        dir.join(DOCSTORE_FILE),
        dir.join(INDEX_STORE_FILE),
        dir.join(VECTOR_STORE_FILE),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentKind, Metadata, Node};
    use tempfile::tempdir;

    fn doc(text: &str) -> Document {
        Document::new(text, Metadata::new())
    }

    fn node_for(document: &Document, text: &str) -> Node {
        Node::new(ContentKind::Text, text, &document.doc_id, Metadata::new())
    }

    #[tokio::test]
    async fn ref_doc_info_groups_nodes_by_document() {
        let store = SimpleDocumentStore::new();
        let a = doc("alpha");
        let b = doc("beta");
        store.add_documents(&[a.clone(), b.clone()]).await.unwrap();
        store
            .add_nodes(&[
                node_for(&a, "alpha one"),
                node_for(&a, "alpha two"),
                node_for(&b, "beta one"),
            ])
            .await
            .unwrap();

        let info = store.get_all_ref_doc_info().await.unwrap();
        assert_eq!(info.len(), 2);
        assert_eq!(info[&a.doc_id].node_ids.len(), 2);
        assert_eq!(info[&b.doc_id].node_ids.len(), 1);
    }

    #[tokio::test]
    async fn nodes_without_known_document_are_rejected() {
        let store = SimpleDocumentStore::new();
        let orphan = Node::new(ContentKind::Text, "stray", "no-such-doc", Metadata::new());
        let err = store.add_nodes(&[orphan]).await.unwrap_err();
        assert!(matches!(err, IngestError::StoreState(_)));
    }

    #[tokio::test]
    async fn delete_is_not_found_the_second_time() {
        let store = SimpleDocumentStore::new();
        let a = doc("alpha");
        store.add_documents(&[a.clone()]).await.unwrap();
        store.add_nodes(&[node_for(&a, "alpha one")]).await.unwrap();

        let removed = store.delete_ref_doc(&a.doc_id).await.unwrap();
        assert_eq!(removed.len(), 1);

        let err = store.delete_ref_doc(&a.doc_id).await.unwrap_err();
        assert!(matches!(err, IngestError::NotFound(_)));
    }

    #[tokio::test]
    async fn snapshots_round_trip_through_disk() {
        let dir = tempdir().unwrap();
        let store = SimpleDocumentStore::new();
        let a = doc("alpha");
        store.add_documents(&[a.clone()]).await.unwrap();
        store.add_nodes(&[node_for(&a, "alpha one")]).await.unwrap();
        store.persist(dir.path()).await.unwrap();

        let reloaded = SimpleDocumentStore::from_persist_dir(dir.path())
            .await
            .unwrap();
        let info = reloaded.get_all_ref_doc_info().await.unwrap();
        assert!(info.contains_key(&a.doc_id));
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_a_store_state_error() {
        let dir = tempdir().unwrap();
        for file in [DOCSTORE_FILE, INDEX_STORE_FILE, VECTOR_STORE_FILE] {
            tokio::fs::write(dir.path().join(file), "{not json")
                .await
                .unwrap();
        }

        let err = SimpleDocumentStore::from_persist_dir(dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::StoreState(_)));

        let err = SimpleIndexStore::from_persist_dir(dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::StoreState(_)));

        let err = SimpleVectorStore::from_persist_dir(dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::StoreState(_)));
    }

    #[tokio::test]
    async fn vector_store_deletes_are_idempotent() {
        let store = SimpleVectorStore::new();
        store
            .add_embeddings(vec![("n1".into(), vec![0.1, 0.2])])
            .await
            .unwrap();
        assert!(store.get_embedding("n1").await.unwrap().is_some());

        let ids = vec!["n1".to_string(), "missing".to_string()];
        store.delete_embeddings(&ids).await.unwrap();
        store.delete_embeddings(&ids).await.unwrap();
        assert!(store.get_embedding("n1").await.unwrap().is_none());
    }
}
