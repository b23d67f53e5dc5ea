//! Chunking configuration.

use serde::{Deserialize, Serialize};

/// Tuning knobs for the safe semantic splitter.
///
/// Defaults follow the pipeline's production settings: semantic breakpoints
/// at the 95th percentile of sentence-embedding distances, with a 384-token
/// safety ceiling and 50 tokens of overlap for the fixed-size fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Percentile (as a fraction in `0.0..=1.0`) of consecutive
    /// sentence-embedding distances above which a breakpoint is placed.
    pub breakpoint_percentile: f64,
    /// Token ceiling for text nodes. Any semantic chunk exceeding this
    /// discards the semantic split for the whole batch.
    pub safety_chunk_size: usize,
    /// Token overlap carried between consecutive fallback chunks.
    pub chunk_overlap: usize,
    /// Number of neighboring sentences on each side included when embedding
    /// a sentence for breakpoint detection.
    pub buffer_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            breakpoint_percentile: 0.95,
            safety_chunk_size: 384,
            chunk_overlap: 50,
            buffer_size: 1,
        }
    }
}
