use std::ops::Range;
use std::path::Path;

use candle_core::{Device, Tensor};
use mcqgen_core::traits::SpanTokenizer;
use mcqgen_core::{Error, Result};
use tokenizers::Tokenizer;

pub(crate) fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(|e| Error::Tokenizer(format!("failed to load {}: {e}", path.display())))
}

/// Subword tokenizer used to measure and slice text for chunking.
///
/// Truncation and padding from `tokenizer.json` are disabled so counts
/// reflect the whole input.
pub struct HfSpanTokenizer {
    inner: Tokenizer,
}

impl HfSpanTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut inner = load_tokenizer(path)?;
        inner
            .with_truncation(None)
            .map_err(|e| Error::Tokenizer(e.to_string()))?;
        inner.with_padding(None);
        Ok(Self { inner })
    }
}

impl SpanTokenizer for HfSpanTokenizer {
    fn token_spans(&self, text: &str) -> Result<Vec<Range<usize>>> {
        let enc = self
            .inner
            .encode(text, false)
            .map_err(|e| Error::Tokenizer(format!("tokenization failed: {e}")))?;
        Ok(enc.get_offsets().iter().map(|&(start, end)| start..end).collect())
    }
}

/// Encode `texts` with special tokens, truncate each to `max_len`, and pad
/// the batch to its longest row. Returns `(input_ids, attention_mask)`.
pub fn tokenize_batch_on_device(
    tokenizer: &Tokenizer,
    texts: &[String],
    max_len: usize,
    pad_id: u32,
    device: &Device,
) -> Result<(Tensor, Tensor)> {
    let mut rows = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer
            .encode(text.as_str(), true)
            .map_err(|e| Error::Tokenizer(format!("tokenization failed: {e}")))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        if ids.len() > max_len {
            ids.truncate(max_len);
            mask.truncate(max_len);
        }
        rows.push((ids, mask));
    }

    let width = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);
    let mut flat_ids = Vec::with_capacity(rows.len() * width);
    let mut flat_mask = Vec::with_capacity(rows.len() * width);
    for (mut ids, mut mask) in rows {
        let pad = width - ids.len();
        ids.extend(std::iter::repeat(pad_id).take(pad));
        mask.extend(std::iter::repeat(0).take(pad));
        flat_ids.extend(ids);
        flat_mask.extend(mask);
    }

    let batch = texts.len();
    let input_ids = Tensor::from_vec(flat_ids, (batch, width), device).map_err(crate::candle_err)?;
    let attention_mask =
        Tensor::from_vec(flat_mask, (batch, width), device).map_err(crate::candle_err)?;
    Ok((input_ids, attention_mask))
}
