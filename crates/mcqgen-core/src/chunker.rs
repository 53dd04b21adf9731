//! Sentence-aligned, token-bounded chunking with sentence overlap.

use std::sync::Arc;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::text::split_sentences;
use crate::traits::SpanTokenizer;
use crate::types::ChunkText;

pub struct Chunker {
    tokenizer: Arc<dyn SpanTokenizer>,
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(tokenizer: Arc<dyn SpanTokenizer>, config: ChunkingConfig) -> Result<Self> {
        if config.max_tokens == 0 {
            return Err(Error::InvalidConfig("chunking.max_tokens must be greater than 0".into()));
        }
        Ok(Self { tokenizer, config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split `text` into chunks of at most `max_tokens` tokens.
    ///
    /// Sentences are packed greedily. The next chunk re-starts
    /// `overlap_sentences` sentences before the previous chunk's end but
    /// always at least one sentence after its start. A sentence that alone
    /// exceeds the budget is cut into consecutive windows of exactly
    /// `max_tokens` tokens (the last window may be shorter).
    pub fn chunk(&self, text: &str) -> Result<Vec<ChunkText>> {
        let max = self.config.max_tokens;
        let overlap = self.config.overlap_sentences;

        let sentences = split_sentences(text);
        let spans = sentences
            .iter()
            .map(|s| self.tokenizer.token_spans(s))
            .collect::<Result<Vec<_>>>()?;
        let lens: Vec<usize> = spans.iter().map(Vec::len).collect();

        let n = sentences.len();
        let mut chunks = Vec::new();
        let mut i = 0;
        while i < n {
            let mut j = i;
            let mut used = 0;
            while j < n && used + lens[j] <= max {
                used += lens[j];
                j += 1;
            }

            if j == i {
                let sentence = &sentences[i];
                for window in spans[i].chunks(max) {
                    let (Some(first), Some(last)) = (window.first(), window.last()) else {
                        continue;
                    };
                    let piece = sentence[first.start..last.end].trim();
                    if !piece.is_empty() {
                        let token_length = window.len();
                        chunks.push(ChunkText { text: piece.to_string(), token_length });
                    }
                }
                i += 1;
                continue;
            }

            chunks.push(ChunkText { text: sentences[i..j].join(" "), token_length: used });
            if j == n {
                break;
            }
            i = if overlap == 0 { j } else { j.saturating_sub(overlap).max(i + 1) };
        }

        tracing::debug!(sentences = n, chunks = chunks.len(), "chunked text");
        Ok(chunks)
    }
}
