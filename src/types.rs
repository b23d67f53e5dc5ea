//! Core data model: documents, nodes, and their derived projections.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Freeform per-document metadata mapping.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata key holding the logical file name of the source upload.
pub const FILE_NAME_KEY: &str = "file_name";
/// Metadata key mirroring the owning document's ID (written at ingestion).
pub const DOC_ID_KEY: &str = "doc_id";
/// Metadata key holding the sentence-window context around a fallback chunk.
pub const WINDOW_KEY: &str = "window";
/// Metadata key holding a fallback chunk's own text before windowing.
pub const ORIGINAL_TEXT_KEY: &str = "original_text";

/// Whether a piece of content is splittable text or an opaque payload.
///
/// Raw content passes through chunking as a single node: it is never
/// measured against the token ceiling and never embedded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    #[default]
    Text,
    Raw,
}

/// A unit of ingested content, transient until the storage context owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique ID, assigned when the document is materialized from a source.
    pub doc_id: String,
    /// Full raw text of the document.
    pub text: String,
    /// Freeform metadata. Always carries [`FILE_NAME_KEY`]; after ingestion
    /// also carries [`DOC_ID_KEY`].
    pub metadata: Metadata,
    #[serde(default)]
    pub kind: ContentKind,
}

impl Document {
    /// Creates a text document with a fresh UUID.
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            doc_id: Uuid::new_v4().to_string(),
            text: text.into(),
            metadata,
            kind: ContentKind::Text,
        }
    }

    /// Sets the content kind.
    #[must_use]
    pub fn with_kind(mut self, kind: ContentKind) -> Self {
        self.kind = kind;
        self
    }
}

/// A retrieval unit produced by chunking a [`Document`].
///
/// Nodes are immutable once embedded; they are only ever removed as a group
/// sharing the same `ref_doc_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub node_id: String,
    pub kind: ContentKind,
    pub text: String,
    /// Embedding vector, attached after chunking and before any store write.
    pub embedding: Option<Vec<f32>>,
    /// Back-reference to the originating document. Always `Some` for nodes
    /// accepted by the document store.
    pub ref_doc_id: Option<String>,
    pub prev_node_id: Option<String>,
    pub next_node_id: Option<String>,
    /// Metadata inherited from the document, possibly augmented by the
    /// splitter (window bookkeeping).
    pub metadata: Metadata,
}

impl Node {
    /// Creates an unembedded, unlinked node referencing `ref_doc_id`.
    pub fn new(
        kind: ContentKind,
        text: impl Into<String>,
        ref_doc_id: &str,
        metadata: Metadata,
    ) -> Self {
        Self {
            node_id: Uuid::new_v4().to_string(),
            kind,
            text: text.into(),
            embedding: None,
            ref_doc_id: Some(ref_doc_id.to_string()),
            prev_node_id: None,
            next_node_id: None,
            metadata,
        }
    }

    /// Returns `true` for text nodes, the only kind measured and embedded.
    pub fn is_text(&self) -> bool {
        self.kind == ContentKind::Text
    }
}

/// Per-document aggregate exposed by the document store: the document's
/// metadata plus the IDs of all nodes derived from it. Computed on demand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefDocInfo {
    pub metadata: Metadata,
    pub node_ids: Vec<String>,
}

/// Service-facing projection of an ingested document: its ID and curated
/// metadata. Never persisted independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestedDoc {
    pub doc_id: String,
    pub doc_metadata: Option<Metadata>,
}
