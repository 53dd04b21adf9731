use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use mcqgen_cli::{init_tracing, load_config};
use mcqgen_core::chunker::Chunker;
use mcqgen_core::config::expand_path;
use mcqgen_core::traits::Embedder;
use mcqgen_embed::{get_default_embedder, get_span_tokenizer};
use mcqgen_vector::{Ingestor, VectorIndex};

#[derive(Parser)]
#[command(name = "mcqgen-indexer", about = "Chunk, embed and index .txt documents")]
struct Args {
    /// A .txt file or a directory searched recursively for .txt files.
    input: PathBuf,
    /// Overrides retrieval.index_dir.
    #[arg(long)]
    index_dir: Option<String>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = load_config()?;
    let index_dir = args.index_dir.map(expand_path).unwrap_or_else(|| config.index_dir());

    let embedder = get_default_embedder(&config).context("loading embedder")?;
    let tokenizer = get_span_tokenizer(&config).context("loading tokenizer")?;
    let chunker = Chunker::new(tokenizer, config.chunking.clone())?;
    let mut index = VectorIndex::new(embedder.dim(), config.retrieval.metric);

    let start = Instant::now();
    let ingestor =
        Ingestor::new(chunker, embedder, config.embedding.batch_size).with_progress(true);
    let stats = ingestor
        .build(&args.input, &mut index, &index_dir)
        .with_context(|| format!("indexing {}", args.input.display()))?;

    println!(
        "Indexed {} chunks from {} files into {} ({} records total, {:.1}s)",
        stats.chunks,
        stats.files,
        index_dir.display(),
        index.len(),
        start.elapsed().as_secs_f32()
    );
    Ok(())
}
