//! Semantic-boundary splitting.
//!
//! Sentences are embedded with a small window of neighboring sentences for
//! context, then breakpoints are placed wherever the cosine distance between
//! consecutive embeddings exceeds a percentile threshold. Sentence groups
//! between breakpoints become chunks. There is no hard upper bound on chunk
//! size here; the caller enforces one via the fallback policy.

use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::embeddings::EmbeddingProvider;
use crate::errors::IngestError;

/// Splits `text` into trimmed, non-empty sentences.
pub(crate) fn split_sentences(text: &str) -> Vec<String> {
    text.unicode_sentences()
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .map(String::from)
        .collect()
}

/// Embedding-similarity splitter with percentile breakpoints.
pub struct SemanticSplitter {
    embedder: Arc<dyn EmbeddingProvider>,
    config: ChunkingConfig,
}

impl SemanticSplitter {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, config: ChunkingConfig) -> Self {
        Self { embedder, config }
    }

    /// Produces chunk texts for a single document.
    ///
    /// Zero or one sentences pass through unsplit. Otherwise each sentence is
    /// embedded together with `buffer_size` neighbors on each side and the
    /// distance series between consecutive embeddings decides the breaks.
    pub async fn split(&self, text: &str) -> Result<Vec<String>, IngestError> {
        let sentences = split_sentences(text);
        if sentences.len() <= 1 {
            return Ok(sentences);
        }

        let windows: Vec<String> = (0..sentences.len())
            .map(|i| {
                let start = i.saturating_sub(self.config.buffer_size);
                let end = (i + self.config.buffer_size + 1).min(sentences.len());
                sentences[start..end].join(" ")
            })
            .collect();

        let embeddings = self.embedder.embed_batch(&windows).await?;
        if embeddings.len() != windows.len() {
            return Err(IngestError::Embedding(format!(
                "provider '{}' returned {} vectors for {} inputs",
                self.embedder.id(),
                embeddings.len(),
                windows.len()
            )));
        }

        let distances: Vec<f64> = embeddings
            .windows(2)
            .map(|pair| 1.0 - cosine_similarity(&pair[0], &pair[1]))
            .collect();
        let threshold = percentile(&distances, self.config.breakpoint_percentile);

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for (i, sentence) in sentences.iter().enumerate() {
            current.push(sentence);
            // A distance strictly above the threshold breaks after sentence i.
            if i < distances.len() && distances[i] > threshold {
                chunks.push(current.join(" "));
                current.clear();
            }
        }
        if !current.is_empty() {
            chunks.push(current.join(" "));
        }
        Ok(chunks)
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Nearest-rank percentile over an unsorted sample; `fraction` in `0.0..=1.0`.
pub(crate) fn percentile(values: &[f64], fraction: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = ((sorted.len() - 1) as f64 * fraction.clamp(0.0, 1.0)).floor() as usize;
    sorted[rank]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddingProvider;

    #[test]
    fn sentence_split_trims_and_drops_empties() {
        let sentences = split_sentences("The cat sat.  The dog ran!   ");
        assert_eq!(sentences, vec!["The cat sat.", "The dog ran!"]);
    }

    #[test]
    fn percentile_nearest_rank() {
        let values = vec![0.1, 0.5, 0.2, 0.9, 0.3];
        assert_eq!(percentile(&values, 0.0), 0.1);
        assert_eq!(percentile(&values, 1.0), 0.9);
        assert_eq!(percentile(&values, 0.5), 0.3);
        assert_eq!(percentile(&[], 0.95), 0.0);
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3_f32, -0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&v, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn single_sentence_passes_through() {
        let splitter = SemanticSplitter::new(
            std::sync::Arc::new(MockEmbeddingProvider::new()),
            ChunkingConfig::default(),
        );
        let chunks = splitter.split("The cat sat on the mat.").await.unwrap();
        assert_eq!(chunks, vec!["The cat sat on the mat."]);

        let empty = splitter.split("   ").await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn chunks_cover_all_sentences_in_order() {
        let splitter = SemanticSplitter::new(
            std::sync::Arc::new(MockEmbeddingProvider::new()),
            ChunkingConfig::default(),
        );
        let text = "Alpha is first. Beta follows alpha. Gamma is third. \
                    Delta comes next. Epsilon closes the sequence.";
        let chunks = splitter.split(text).await.unwrap();
        let rejoined = chunks.join(" ");
        for sentence in split_sentences(text) {
            assert!(rejoined.contains(&sentence));
        }
    }
}
