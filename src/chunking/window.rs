//! Fixed-size sentence-window splitting.
//!
//! The deterministic fallback for when semantic splitting produces chunks
//! too large for the embedding model's context. Sentences are accumulated
//! greedily up to a token budget, with a configurable token overlap carried
//! between consecutive chunks. Each chunk also records a `window` of
//! neighboring-sentence context for retrieval-time expansion.

use std::sync::Arc;

use tiktoken_rs::CoreBPE;

use crate::chunking::semantic::split_sentences;
use crate::errors::IngestError;

/// A fallback chunk plus its surrounding-sentence window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedChunk {
    /// The chunk's own text span.
    pub text: String,
    /// The span widened by one sentence of context on each side.
    pub window: String,
}

/// Token-bounded sentence accumulator.
pub struct SentenceWindowSplitter {
    tokenizer: Arc<CoreBPE>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SentenceWindowSplitter {
    /// Builds a splitter with its own cl100k tokenizer.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IngestError> {
        let tokenizer =
            tiktoken_rs::cl100k_base().map_err(|err| IngestError::Chunking(err.to_string()))?;
        Ok(Self::with_tokenizer(
            Arc::new(tokenizer),
            chunk_size,
            chunk_overlap,
        ))
    }

    pub(crate) fn with_tokenizer(
        tokenizer: Arc<CoreBPE>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            tokenizer,
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    fn token_len(&self, text: &str) -> usize {
        self.tokenizer.encode_with_special_tokens(text).len()
    }

    /// Splits `text` into token-bounded chunks.
    ///
    /// Every chunk stays within `chunk_size` tokens as long as no single
    /// whitespace-delimited word exceeds the budget on its own. The split is
    /// fully deterministic for a given input and configuration.
    pub fn split(&self, text: &str) -> Vec<WindowedChunk> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Vec::new();
        }

        // Oversized sentences are pre-split at word boundaries so the greedy
        // accumulation below never sees a unit above the budget.
        let mut units: Vec<String> = Vec::new();
        for sentence in sentences {
            if self.token_len(&sentence) > self.chunk_size {
                units.extend(self.hard_split(&sentence));
            } else {
                units.push(sentence);
            }
        }

        let mut groups: Vec<Vec<String>> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_tokens = 0usize;
        // Whether `current` holds anything beyond overlap carried from the
        // previous group; pure-overlap groups must never be flushed.
        let mut has_new = false;

        for unit in units {
            let unit_tokens = self.token_len(&unit);
            if has_new && current_tokens + unit_tokens > self.chunk_size {
                groups.push(std::mem::take(&mut current));
                let tail = self.overlap_tail(groups.last().map(Vec::as_slice).unwrap_or(&[]));
                current_tokens = tail.iter().map(|s| self.token_len(s)).sum();
                current = tail;
                has_new = false;
            }
            if !has_new && !current.is_empty() && current_tokens + unit_tokens > self.chunk_size {
                current.clear();
                current_tokens = 0;
            }
            current_tokens += unit_tokens;
            current.push(unit);
            has_new = true;
        }
        if has_new && !current.is_empty() {
            groups.push(current);
        }

        let texts: Vec<String> = groups.iter().map(|group| group.join(" ")).collect();
        (0..groups.len())
            .map(|i| {
                let mut window_parts: Vec<&str> = Vec::new();
                if i > 0 {
                    if let Some(prev_last) = groups[i - 1].last() {
                        window_parts.push(prev_last);
                    }
                }
                window_parts.push(&texts[i]);
                if i + 1 < groups.len() {
                    if let Some(next_first) = groups[i + 1].first() {
                        window_parts.push(next_first);
                    }
                }
                WindowedChunk {
                    text: texts[i].clone(),
                    window: window_parts.join(" "),
                }
            })
            .collect()
    }

    /// Trailing sentences of `group` totaling at most `chunk_overlap` tokens.
    fn overlap_tail(&self, group: &[String]) -> Vec<String> {
        let mut tail: Vec<String> = Vec::new();
        let mut tokens = 0usize;
        for sentence in group.iter().rev() {
            let sentence_tokens = self.token_len(sentence);
            if tokens + sentence_tokens > self.chunk_overlap {
                break;
            }
            tokens += sentence_tokens;
            tail.insert(0, sentence.clone());
        }
        tail
    }

    /// Word-boundary split for a sentence that alone exceeds the budget.
    fn hard_split(&self, sentence: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0usize;
        for word in sentence.split_whitespace() {
            let word_tokens = self.token_len(word);
            if !current.is_empty() && current_tokens + word_tokens > self.chunk_size {
                pieces.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_tokens += word_tokens;
        }
        if !current.is_empty() {
            pieces.push(current);
        }
        pieces
    }
}
