//! Chunking: turning documents into retrieval nodes.
//!
//! * [`semantic`] — embedding-similarity splitting at percentile breakpoints.
//! * [`window`] — deterministic fixed-size sentence-window splitting.
//! * [`SafeSemanticSplitter`] — semantic first, with an all-or-nothing
//!   fallback to the fixed-size split when any chunk breaches the token
//!   ceiling.

pub mod semantic;
pub mod window;

use std::sync::Arc;

use tiktoken_rs::CoreBPE;
use tracing::debug;

pub use semantic::SemanticSplitter;
pub use window::{SentenceWindowSplitter, WindowedChunk};

use crate::config::ChunkingConfig;
use crate::embeddings::EmbeddingProvider;
use crate::errors::IngestError;
use crate::types::{ContentKind, Document, Node, ORIGINAL_TEXT_KEY, WINDOW_KEY};

/// Semantic splitter with a bounded-size safety net.
///
/// Semantic splitting has no hard upper bound on chunk size, while embedding
/// models have fixed context limits. After the semantic pass, every text
/// node is measured; if any one exceeds the configured ceiling the semantic
/// result for the whole batch is discarded and the original documents are
/// re-split with the fixed-size sentence-window splitter. The fallback is
/// per batch, never a per-node patch, so a batch is always chunked by
/// exactly one strategy.
///
/// Raw (non-text) documents pass through as single unmeasured nodes and
/// never trigger the fallback.
pub struct SafeSemanticSplitter {
    semantic: SemanticSplitter,
    window: SentenceWindowSplitter,
    tokenizer: Arc<CoreBPE>,
    config: ChunkingConfig,
}

impl SafeSemanticSplitter {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        config: ChunkingConfig,
    ) -> Result<Self, IngestError> {
        let tokenizer = Arc::new(
            tiktoken_rs::cl100k_base().map_err(|err| IngestError::Chunking(err.to_string()))?,
        );
        let window = SentenceWindowSplitter::with_tokenizer(
            Arc::clone(&tokenizer),
            config.safety_chunk_size,
            config.chunk_overlap,
        );
        Ok(Self {
            semantic: SemanticSplitter::new(embedder, config.clone()),
            window,
            tokenizer,
            config,
        })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    fn token_len(&self, text: &str) -> usize {
        self.tokenizer.encode_with_special_tokens(text).len()
    }

    /// Chunks a batch of documents into linked, unembedded nodes.
    pub async fn parse_documents(&self, documents: &[Document]) -> Result<Vec<Node>, IngestError> {
        let mut nodes = Vec::new();
        for document in documents {
            nodes.extend(self.semantic_nodes(document).await?);
        }

        let oversized = nodes
            .iter()
            .find(|node| node.is_text() && self.token_len(&node.text) > self.config.safety_chunk_size);
        let Some(culprit) = oversized else {
            return Ok(nodes);
        };

        debug!(
            tokens = self.token_len(&culprit.text),
            limit = self.config.safety_chunk_size,
            "semantic chunk breached token ceiling, re-splitting batch with sentence windows"
        );

        let mut nodes = Vec::new();
        for document in documents {
            nodes.extend(self.window_nodes(document));
        }
        Ok(nodes)
    }

    async fn semantic_nodes(&self, document: &Document) -> Result<Vec<Node>, IngestError> {
        if document.kind == ContentKind::Raw {
            return Ok(vec![raw_node(document)]);
        }
        let chunks = self.semantic.split(&document.text).await?;
        let mut nodes: Vec<Node> = chunks
            .into_iter()
            .map(|chunk| {
                Node::new(
                    ContentKind::Text,
                    chunk,
                    &document.doc_id,
                    document.metadata.clone(),
                )
            })
            .collect();
        link_neighbors(&mut nodes);
        Ok(nodes)
    }

    fn window_nodes(&self, document: &Document) -> Vec<Node> {
        if document.kind == ContentKind::Raw {
            return vec![raw_node(document)];
        }
        let mut nodes: Vec<Node> = self
            .window
            .split(&document.text)
            .into_iter()
            .map(|chunk| {
                let mut metadata = document.metadata.clone();
                metadata.insert(WINDOW_KEY.into(), chunk.window.into());
                metadata.insert(ORIGINAL_TEXT_KEY.into(), chunk.text.clone().into());
                Node::new(ContentKind::Text, chunk.text, &document.doc_id, metadata)
            })
            .collect();
        link_neighbors(&mut nodes);
        nodes
    }
}

fn raw_node(document: &Document) -> Node {
    Node::new(
        ContentKind::Raw,
        document.text.clone(),
        &document.doc_id,
        document.metadata.clone(),
    )
}

/// Links prev/next IDs between consecutive nodes of one document.
fn link_neighbors(nodes: &mut [Node]) {
    for i in 1..nodes.len() {
        let prev_id = nodes[i - 1].node_id.clone();
        let next_id = nodes[i].node_id.clone();
        nodes[i].prev_node_id = Some(prev_id);
        nodes[i - 1].next_node_id = Some(next_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddingProvider;
    use crate::types::Metadata;

    fn splitter() -> SafeSemanticSplitter {
        SafeSemanticSplitter::new(
            Arc::new(MockEmbeddingProvider::new()),
            ChunkingConfig::default(),
        )
        .unwrap()
    }

    fn doc(text: &str) -> Document {
        Document::new(text, Metadata::new())
    }

    #[tokio::test]
    async fn small_document_keeps_semantic_split() {
        let nodes = splitter()
            .parse_documents(&[doc("The cat sat on the mat.")])
            .await
            .unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].is_text());
        // semantic path attaches no window bookkeeping
        assert!(!nodes[0].metadata.contains_key(WINDOW_KEY));
    }

    #[tokio::test]
    async fn oversized_chunk_forces_whole_batch_fallback() {
        let chunker = splitter();
        let big: String = (0..80)
            .map(|i| {
                format!(
                    "Sentence {i} elaborates at length on subject {} using many \
                     additional descriptive words so that every sentence carries \
                     a substantial number of tokens for the ceiling check.",
                    i % 5
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        let small = "A tiny document.";

        let documents = vec![doc(&big), doc(small)];
        let nodes = chunker.parse_documents(&documents).await.unwrap();

        // one oversized chunk re-splits the entire batch, small doc included
        for node in &nodes {
            assert!(
                node.metadata.contains_key(WINDOW_KEY),
                "all nodes should come from the sentence-window fallback"
            );
            assert!(
                chunker.token_len(&node.text) <= chunker.config().safety_chunk_size,
                "fallback nodes must respect the token ceiling"
            );
        }
    }

    #[tokio::test]
    async fn raw_documents_never_trigger_fallback() {
        let chunker = splitter();
        // a raw payload far beyond the token ceiling
        let blob = "blob ".repeat(5000);
        let documents = vec![doc("One short sentence."), doc(&blob).with_kind(ContentKind::Raw)];

        let nodes = chunker.parse_documents(&documents).await.unwrap();
        let raw: Vec<_> = nodes.iter().filter(|n| !n.is_text()).collect();
        assert_eq!(raw.len(), 1);
        // semantic result kept: no window bookkeeping anywhere
        assert!(nodes.iter().all(|n| !n.metadata.contains_key(WINDOW_KEY)));
    }

    #[tokio::test]
    async fn nodes_are_linked_within_a_document() {
        let chunker = SafeSemanticSplitter::new(
            Arc::new(MockEmbeddingProvider::new()),
            ChunkingConfig {
                safety_chunk_size: 40,
                chunk_overlap: 5,
                ..Default::default()
            },
        )
        .unwrap();
        let text: String = (0..20)
            .map(|i| format!("Sentence number {i} adds more material to the document."))
            .collect::<Vec<_>>()
            .join(" ");
        let nodes = chunker.parse_documents(&[doc(&text)]).await.unwrap();
        assert!(nodes.len() > 1);

        assert!(nodes[0].prev_node_id.is_none());
        assert!(nodes.last().unwrap().next_node_id.is_none());
        for pair in nodes.windows(2) {
            assert_eq!(pair[0].next_node_id.as_ref(), Some(&pair[1].node_id));
            assert_eq!(pair[1].prev_node_id.as_ref(), Some(&pair[0].node_id));
        }
    }
}
