use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use mcqgen_core::traits::Embedder;
use mcqgen_core::{Error, Result};
use serde::Deserialize;
use tokenizers::Tokenizer;

use crate::candle_err;
use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::{load_tokenizer, tokenize_batch_on_device};

/// Window the sentence-transformers MiniLM checkpoints were trained on.
const MAX_SEQ_LEN: usize = 256;

#[derive(Deserialize)]
struct ModelShape {
    hidden_size: usize,
    max_position_embeddings: usize,
}

/// Sentence embedder over a local BERT-family checkpoint
/// (`config.json`, `tokenizer.json`, and `model.safetensors` or
/// `pytorch_model.bin`). Output is the masked mean of the last hidden
/// state, L2-normalized.
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    pad_id: u32,
}

impl BertEmbedder {
    pub fn load(model_dir: &Path) -> Result<Self> {
        if !model_dir.is_dir() {
            return Err(Error::InvalidConfig(format!(
                "embedding model directory not found: {}",
                model_dir.display()
            )));
        }
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading embedding model");

        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"))?;

        let config_text = std::fs::read_to_string(model_dir.join("config.json"))?;
        let config: BertConfig = serde_json::from_str(&config_text)?;
        let shape: ModelShape = serde_json::from_str(&config_text)?;

        let vb = load_weights(model_dir, &device)?;
        let model = BertModel::load(vb, &config).map_err(candle_err)?;

        let pad_id = tokenizer
            .get_padding()
            .map(|p| p.pad_id)
            .or_else(|| tokenizer.token_to_id("[PAD]"))
            .unwrap_or(0);

        tracing::info!(dim = shape.hidden_size, "embedding model loaded");
        Ok(Self {
            model,
            tokenizer,
            device,
            dim: shape.hidden_size,
            max_len: shape.max_position_embeddings.min(MAX_SEQ_LEN),
            pad_id,
        })
    }

    fn forward(&self, texts: &[String]) -> candle_core::Result<Tensor> {
        let (input_ids, attention_mask) = tokenize_batch_on_device(
            &self.tokenizer,
            texts,
            self.max_len,
            self.pad_id,
            &self.device,
        )
        .map_err(|e| candle_core::Error::Msg(e.to_string()))?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        masked_mean_l2(&hidden, &attention_mask)?.to_device(&Device::Cpu)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        // SAFETY: the file is memory-mapped read-only and not modified while the model lives.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DTYPE, device) };
        return vb.map_err(candle_err);
    }
    let bin = model_dir.join("pytorch_model.bin");
    if bin.exists() {
        let weights = candle_core::pickle::read_all(&bin).map_err(candle_err)?;
        let weights: HashMap<String, Tensor> = weights.into_iter().collect();
        return Ok(VarBuilder::from_tensors(weights, DTYPE, device));
    }
    Err(Error::InvalidConfig(format!(
        "no model.safetensors or pytorch_model.bin in {}",
        model_dir.display()
    )))
}

impl Embedder for BertEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let out = self.forward(texts).map_err(candle_err)?;
        let vectors: Vec<Vec<f32>> = out.to_vec2().map_err(candle_err)?;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(batch = texts.len(), elapsed_ms, "embedded batch");
        Ok(vectors)
    }
}
