use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::types::Difficulty;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model_name: String,
    pub endpoint_url: String,
    pub timeout_seconds: u64,
    pub temperature: f32,
    pub max_tries: usize,
    /// Upper bound on topics processed concurrently against the endpoint.
    pub max_concurrency: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model_name: "llama3.1".to_string(),
            endpoint_url: "http://localhost:11434/api/generate".to_string(),
            timeout_seconds: 200,
            temperature: 0.3,
            max_tries: 3,
            max_concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local sentence-embedding model loaded from `model_dir`.
    Bert,
    /// Deterministic hashing embedder; no model files needed.
    Fake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    /// Hub-style name; the model is read from `models/<last path segment>`
    /// unless `model_dir` is set.
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<String>,
    pub batch_size: usize,
    /// Only used by the fake backend; the model backend reads it from config.json.
    pub fake_dim: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Bert,
            model_name: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_dir: None,
            batch_size: 32,
            fake_dim: 384,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_sentences: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        // Stays under the 256-token window of MiniLM-class encoders.
        Self { max_tokens: 240, overlap_sentences: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Inner product on unit vectors; higher is better.
    Cosine,
    /// Squared Euclidean distance; lower is better.
    L2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunksPerDifficulty {
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
}

impl ChunksPerDifficulty {
    pub fn for_difficulty(&self, difficulty: Difficulty) -> usize {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

impl Default for ChunksPerDifficulty {
    fn default() -> Self {
        Self { easy: 2, medium: 3, hard: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub index_dir: String,
    pub metric: Metric,
    pub chunks_per_difficulty: ChunksPerDifficulty,
    /// Optional cap on the number of chunks retrieved for one topic.
    pub top_k_per_topic: Option<usize>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_dir: "data/vector_store".to_string(),
            metric: Metric::Cosine,
            chunks_per_difficulty: ChunksPerDifficulty::default(),
            top_k_per_topic: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Fixes the final shuffle; unset draws the permutation from entropy.
    pub shuffle_seed: Option<u64>,
}

impl AppConfig {
    /// Merge defaults, `mcqgen.toml`, `mcqgen.<env>.toml` and `MCQGEN_*` env vars.
    ///
    /// The environment comes from `RUST_ENV` (default `dev`). Nested keys use a
    /// double underscore, e.g. `MCQGEN_LLM__MODEL_NAME=mistral`.
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let config: Self = Self::figment(&env_name)
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn figment(env_name: &str) -> Figment {
        let env_file = match env_name {
            "dev" | "development" => Some("mcqgen.dev.toml"),
            "prod" | "production" => Some("mcqgen.prod.toml"),
            "test" | "testing" => Some("mcqgen.test.toml"),
            _ => None,
        };
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file("mcqgen.toml"));
        if let Some(file) = env_file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed("MCQGEN_").split("__"))
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));
        if self.chunking.max_tokens == 0 {
            return invalid("chunking.max_tokens must be greater than 0");
        }
        if self.llm.max_tries == 0 {
            return invalid("llm.max_tries must be greater than 0");
        }
        if self.llm.max_concurrency == 0 {
            return invalid("llm.max_concurrency must be greater than 0");
        }
        if self.llm.timeout_seconds == 0 {
            return invalid("llm.timeout_seconds must be greater than 0");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return invalid("llm.temperature must be within [0, 2]");
        }
        if self.llm.model_name.trim().is_empty() || self.llm.endpoint_url.trim().is_empty() {
            return invalid("llm.model_name and llm.endpoint_url must be set");
        }
        if self.embedding.model_dir.is_none() && self.embedding.model_name.trim().is_empty() {
            return invalid("embedding.model_name or embedding.model_dir must be set");
        }
        if self.embedding.batch_size == 0 {
            return invalid("embedding.batch_size must be greater than 0");
        }
        if self.retrieval.top_k_per_topic == Some(0) {
            return invalid("retrieval.top_k_per_topic must be greater than 0 when set");
        }
        Ok(())
    }

    pub fn index_dir(&self) -> PathBuf {
        expand_path(&self.retrieval.index_dir)
    }

    pub fn model_dir(&self) -> PathBuf {
        if let Some(dir) = &self.embedding.model_dir {
            return expand_path(dir);
        }
        let name = self.embedding.model_name.trim_end_matches('/');
        let leaf = name.rsplit('/').next().unwrap_or(name);
        PathBuf::from("models").join(leaf)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
