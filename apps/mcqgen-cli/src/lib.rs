//! Wiring shared by the `mcqgen` and `mcqgen-indexer` binaries.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use mcqgen_core::config::AppConfig;
use mcqgen_core::traits::Embedder;
use mcqgen_core::types::Topic;
use mcqgen_generate::{Orchestrator, OllamaClient, Retriever};
use mcqgen_vector::IndexHandle;
use tracing_subscriber::EnvFilter;

/// Log to stderr; `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config() -> Result<AppConfig> {
    AppConfig::load().context("loading configuration")
}

pub fn build_retriever(config: &AppConfig) -> Result<Arc<Retriever>> {
    let embedder = mcqgen_embed::get_default_embedder(config).context("loading embedder")?;
    let handle =
        Arc::new(IndexHandle::new(config.index_dir(), embedder.dim(), config.retrieval.metric));
    Ok(Arc::new(Retriever::new(handle, embedder)))
}

pub fn build_orchestrator(config: &AppConfig) -> Result<Orchestrator> {
    let retriever = build_retriever(config)?;
    let model = Arc::new(OllamaClient::new(&config.llm)?);
    Ok(Orchestrator::new(retriever, model, config.clone()))
}

/// Apply `NAME=DESCRIPTION` overrides to the parsed topic list.
pub fn apply_descriptions(topics: &mut [Topic], overrides: &[String]) -> Result<()> {
    for raw in overrides {
        let Some((name, description)) = raw.split_once('=') else {
            bail!("topic description must look like NAME=DESCRIPTION, got {raw:?}");
        };
        let name = name.trim();
        let Some(topic) = topics.iter_mut().find(|t| t.name == name) else {
            bail!("description given for unknown topic {name:?}");
        };
        topic.description = Some(description.trim().to_string());
    }
    Ok(())
}
