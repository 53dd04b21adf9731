use std::ops::Range;

/// Maps text to fixed-dimension dense vectors. Used identically for chunk
/// text at ingestion and for retrieval queries.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> crate::Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()])?;
        out.pop()
            .ok_or_else(|| crate::Error::Embedding("embedder returned no vector".into()))
    }
}

/// Tokenizes text without special tokens, reporting the byte range each
/// token covers in the input.
pub trait SpanTokenizer: Send + Sync {
    fn token_spans(&self, text: &str) -> crate::Result<Vec<Range<usize>>>;

    fn count_tokens(&self, text: &str) -> crate::Result<usize> {
        Ok(self.token_spans(text)?.len())
    }
}

/// One token per whitespace-delimited word.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTokenizer;

impl SpanTokenizer for WhitespaceTokenizer {
    fn token_spans(&self, text: &str) -> crate::Result<Vec<Range<usize>>> {
        let mut spans = Vec::new();
        let mut start = None;
        for (i, c) in text.char_indices() {
            match (c.is_whitespace(), start) {
                (true, Some(s)) => {
                    spans.push(s..i);
                    start = None;
                }
                (false, None) => start = Some(i),
                _ => {}
            }
        }
        if let Some(s) = start {
            spans.push(s..text.len());
        }
        Ok(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_spans_cover_words() {
        let text = "  alpha beta\tgamma ";
        let spans = WhitespaceTokenizer.token_spans(text).unwrap();
        let words: Vec<&str> = spans.iter().map(|r| &text[r.clone()]).collect();
        assert_eq!(words, ["alpha", "beta", "gamma"]);
        assert_eq!(WhitespaceTokenizer.count_tokens("").unwrap(), 0);
    }
}
