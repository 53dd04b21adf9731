use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use mcqgen_core::chunker::Chunker;
use mcqgen_core::text::clean_text;
use mcqgen_core::traits::Embedder;
use mcqgen_core::types::ChunkText;
use mcqgen_core::{Error, Result};
use walkdir::WalkDir;

use crate::index::VectorIndex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub files: usize,
    pub chunks: usize,
}

/// Text files under `path`, sorted. A single file is returned as-is.
pub fn collect_text_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input path not found: {}", path.display()),
        )));
    }
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("txt")))
        .collect();
    files.sort();
    Ok(files)
}

/// Clean, chunk, embed and append documents to a [`VectorIndex`].
pub struct Ingestor {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    show_progress: bool,
}

impl Ingestor {
    pub fn new(chunker: Chunker, embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self { chunker, embedder, batch_size: batch_size.max(1), show_progress: false }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn chunk_document(&self, raw: &str) -> Result<Vec<ChunkText>> {
        self.chunker.chunk(&clean_text(raw))
    }

    /// Chunk every file, then embed chunks in batches of `batch_size` and
    /// append them to `index`. Nothing is written to disk here.
    pub fn ingest_files(&self, index: &mut VectorIndex, files: &[PathBuf]) -> Result<IngestStats> {
        let mut pending = Vec::new();
        for path in files {
            let bytes = fs::read(path)?;
            let chunks = self.chunk_document(&String::from_utf8_lossy(&bytes))?;
            tracing::debug!(file = %path.display(), chunks = chunks.len(), "chunked document");
            pending.extend(chunks);
        }
        tracing::info!(files = files.len(), chunks = pending.len(), "embedding chunks");

        let pb = self.progress_bar(pending.len() as u64);
        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;
            index.add(&vectors, batch)?;
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();

        Ok(IngestStats { files: files.len(), chunks: pending.len() })
    }

    /// Load any existing index in `index_dir`, append everything under
    /// `input`, and persist the result.
    pub fn build(
        &self,
        input: &Path,
        index: &mut VectorIndex,
        index_dir: &Path,
    ) -> Result<IngestStats> {
        if index.load(index_dir)? {
            tracing::info!(records = index.len(), "appending to existing index");
        }
        let files = collect_text_files(input)?;
        if files.is_empty() {
            tracing::warn!(input = %input.display(), "no .txt files found");
        }
        let stats = self.ingest_files(index, &files)?;
        index.save(index_dir)?;
        Ok(stats)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] \
                 {pos}/{len} chunks ({percent}%)",
            )
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
