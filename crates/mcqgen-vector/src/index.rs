use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use bincode::Options;
use mcqgen_core::config::Metric;
use mcqgen_core::types::{Chunk, ChunkId, ChunkText, SearchHit};
use mcqgen_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

pub const VECTORS_FILE: &str = "vectors.bin";
pub const METADATA_FILE: &str = "metadata.json";

const FORMAT_VERSION: u32 = 2;

/// Contents of `vectors.bin`: row-major unit vectors, one row per id.
#[derive(Serialize, Deserialize)]
struct VectorFile {
    version: u32,
    dim: usize,
    metric: Metric,
    ids: Vec<ChunkId>,
    vectors: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct MetadataEntry {
    text: String,
    token_length: usize,
}

#[derive(Serialize, Deserialize)]
struct MetadataFile {
    dim: usize,
    metric: Metric,
    chunks: BTreeMap<String, MetadataEntry>,
}

/// Exhaustive-scan index of unit-normalized vectors plus the chunk each one
/// was computed from.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dim: usize,
    metric: Metric,
    ids: Vec<ChunkId>,
    vectors: Vec<f32>,
    chunks: HashMap<ChunkId, Chunk>,
    next_id: ChunkId,
}

impl VectorIndex {
    pub fn new(dim: usize, metric: Metric) -> Self {
        Self {
            dim,
            metric,
            ids: Vec::new(),
            vectors: Vec::new(),
            chunks: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn next_id(&self) -> ChunkId {
        self.next_id
    }

    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(&id)
    }

    /// Append one record per `(vector, text)` pair and return the new ids.
    /// Inputs are checked before anything is stored.
    pub fn add(&mut self, vectors: &[Vec<f32>], texts: &[ChunkText]) -> Result<Vec<ChunkId>> {
        if vectors.len() != texts.len() {
            return Err(Error::LengthMismatch { vectors: vectors.len(), texts: texts.len() });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(Error::DimensionMismatch { expected: self.dim, got: bad.len() });
        }

        let mut assigned = Vec::with_capacity(vectors.len());
        for (vector, text) in vectors.iter().zip(texts) {
            let id = self.next_id;
            self.next_id += 1;
            self.ids.push(id);
            self.vectors.extend(normalized(vector));
            let chunk = Chunk { id, text: text.text.clone(), token_length: text.token_length };
            self.chunks.insert(id, chunk);
            assigned.push(id);
        }
        Ok(assigned)
    }

    /// Up to `k` hits, best first. Cosine scores descend, L2 distances
    /// ascend; equal scores fall back to the lower id. Records without a
    /// chunk entry are never returned.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, got: query.len() });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let query = normalized(query);

        let mut hits: Vec<SearchHit> = self
            .ids
            .iter()
            .zip(self.vectors.chunks_exact(self.dim))
            .filter(|(id, _)| self.chunks.contains_key(id))
            .map(|(&id, v)| {
                let score = match self.metric {
                    Metric::Cosine => v.iter().zip(&query).map(|(a, b)| a * b).sum(),
                    Metric::L2 => v.iter().zip(&query).map(|(a, b)| (a - b) * (a - b)).sum(),
                };
                SearchHit { id, score }
            })
            .collect();

        let metric = self.metric;
        hits.sort_by(|a, b| {
            let by_score = match metric {
                Metric::Cosine => b.score.partial_cmp(&a.score),
                Metric::L2 => a.score.partial_cmp(&b.score),
            };
            by_score.unwrap_or(Ordering::Equal).then(a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Write both sidecar files into `dir`, replacing any previous ones.
    /// The metadata file is written last; readers key reloads on it.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let vectors = VectorFile {
            version: FORMAT_VERSION,
            dim: self.dim,
            metric: self.metric,
            ids: self.ids.clone(),
            vectors: self.vectors.clone(),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut w = BufWriter::new(tmp.as_file_mut());
            bincode::serialize_into(&mut w, &vectors).map_err(std::io::Error::other)?;
            w.flush()?;
        }
        tmp.persist(dir.join(VECTORS_FILE)).map_err(|e| e.error)?;

        let chunks = self
            .chunks
            .values()
            .map(|c| {
                let entry = MetadataEntry { text: c.text.clone(), token_length: c.token_length };
                (c.id.to_string(), entry)
            })
            .collect();
        let meta = MetadataFile { dim: self.dim, metric: self.metric, chunks };
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut w = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut w, &meta)?;
            w.flush()?;
        }
        tmp.persist(dir.join(METADATA_FILE)).map_err(|e| e.error)?;

        tracing::info!(records = self.len(), dir = %dir.display(), "saved vector index");
        Ok(())
    }

    /// Replace this index's contents with the artifacts in `dir`.
    ///
    /// Returns `false`, leaving the index untouched, when either file is
    /// missing.
    pub fn load(&mut self, dir: &Path) -> Result<bool> {
        let vectors_path = dir.join(VECTORS_FILE);
        let metadata_path = dir.join(METADATA_FILE);
        if !vectors_path.exists() || !metadata_path.exists() {
            return Ok(false);
        }

        let meta: MetadataFile =
            serde_json::from_reader(BufReader::new(File::open(&metadata_path)?))?;
        if meta.dim != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, got: meta.dim });
        }
        if meta.metric != self.metric {
            tracing::warn!(
                stored = ?meta.metric,
                configured = ?self.metric,
                "index was built with a different metric"
            );
        }
        let mut chunks = HashMap::with_capacity(meta.chunks.len());
        for (key, entry) in meta.chunks {
            let id: ChunkId = key
                .trim()
                .parse()
                .map_err(|_| {
                    Error::CorruptIndex(format!("metadata key {key:?} is not a chunk id"))
                })?;
            chunks.insert(id, Chunk { id, text: entry.text, token_length: entry.token_length });
        }

        let (ids, vectors) = read_vectors(&vectors_path, self.dim)?;
        let missing = ids.iter().filter(|id| !chunks.contains_key(id)).count();
        if missing > 0 {
            tracing::warn!(
                missing,
                "vectors without chunk metadata will be skipped at search time"
            );
        }

        let next_id = ids.iter().chain(chunks.keys()).max().map_or(0, |m| m + 1);
        self.ids = ids;
        self.vectors = vectors;
        self.chunks = chunks;
        self.next_id = next_id;
        tracing::debug!(records = self.len(), next_id, "loaded vector index");
        Ok(true)
    }
}

fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

fn read_vectors(path: &Path, dim: usize) -> Result<(Vec<ChunkId>, Vec<f32>)> {
    let corrupt = |what: String| Error::CorruptIndex(format!("{}: {what}", path.display()));
    let file = File::open(path)?;
    let limit = file.metadata()?.len();

    // Lengths inside the file are untrusted; decoding stops at the file size.
    let stored: VectorFile = bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(limit)
        .deserialize_from(BufReader::new(file))
        .map_err(|e| corrupt(e.to_string()))?;

    if stored.version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported format version {}", stored.version)));
    }
    if stored.dim != dim {
        return Err(Error::DimensionMismatch { expected: dim, got: stored.dim });
    }
    if stored.vectors.len() != stored.ids.len() * dim {
        return Err(corrupt(format!(
            "{} floats for {} records of dim {dim}",
            stored.vectors.len(),
            stored.ids.len()
        )));
    }
    Ok((stored.ids, stored.vectors))
}
