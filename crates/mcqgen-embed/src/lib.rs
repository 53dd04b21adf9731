//! Embedding backends and the subword tokenizer used for chunking.

mod bert;
mod device;
mod fake;
mod pool;
mod tokenize;

use std::sync::Arc;

use mcqgen_core::config::{AppConfig, EmbeddingBackend};
use mcqgen_core::traits::{Embedder, SpanTokenizer, WhitespaceTokenizer};
use mcqgen_core::{Error, Result};

pub use bert::BertEmbedder;
pub use device::select_device;
pub use fake::FakeEmbedder;
pub use pool::masked_mean_l2;
pub use tokenize::{tokenize_batch_on_device, HfSpanTokenizer};

pub(crate) fn candle_err(e: candle_core::Error) -> Error {
    Error::Embedding(e.to_string())
}

/// Build the embedder selected by `config.embedding.backend`.
pub fn get_default_embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>> {
    match config.embedding.backend {
        EmbeddingBackend::Fake => {
            tracing::info!(dim = config.embedding.fake_dim, "using fake embedder");
            Ok(Arc::new(FakeEmbedder::new(config.embedding.fake_dim)))
        }
        EmbeddingBackend::Bert => Ok(Arc::new(BertEmbedder::load(&config.model_dir())?)),
    }
}

/// Tokenizer matching the configured embedder, for sizing chunks.
pub fn get_span_tokenizer(config: &AppConfig) -> Result<Arc<dyn SpanTokenizer>> {
    match config.embedding.backend {
        EmbeddingBackend::Fake => Ok(Arc::new(WhitespaceTokenizer)),
        EmbeddingBackend::Bert => {
            let path = config.model_dir().join("tokenizer.json");
            Ok(Arc::new(HfSpanTokenizer::from_file(&path)?))
        }
    }
}
