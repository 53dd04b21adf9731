use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use mcqgen_core::config::Metric;
use mcqgen_core::{Error, Result};

use crate::index::{VectorIndex, METADATA_FILE};

/// Identifies one written generation of the metadata sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    modified: SystemTime,
    len: u64,
}

struct Loaded {
    stamp: Stamp,
    index: Arc<VectorIndex>,
}

/// Shared read-side access to an index directory.
///
/// `current()` hands out the loaded index and reloads it only when the
/// metadata file has been rewritten since the last load. A new index is
/// fully loaded before it replaces the old one, so readers never observe a
/// partial index.
pub struct IndexHandle {
    dir: PathBuf,
    dim: usize,
    metric: Metric,
    state: RwLock<Option<Loaded>>,
}

impl IndexHandle {
    pub fn new(dir: impl Into<PathBuf>, dim: usize, metric: Metric) -> Self {
        Self { dir: dir.into(), dim, metric, state: RwLock::new(None) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current(&self) -> Result<Arc<VectorIndex>> {
        let stamp = self.stamp()?;
        {
            let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(loaded) = guard.as_ref().filter(|l| l.stamp == stamp) {
                return Ok(Arc::clone(&loaded.index));
            }
        }

        let mut index = VectorIndex::new(self.dim, self.metric);
        match index.load(&self.dir) {
            Ok(true) => {}
            Ok(false) => return Err(self.unavailable()),
            Err(e) => {
                return Err(Error::RetrievalUnavailable(format!(
                    "cannot read vector index in {}: {e}",
                    self.dir.display()
                )))
            }
        }
        let index = Arc::new(index);
        tracing::info!(records = index.len(), dir = %self.dir.display(), "vector index (re)loaded");

        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Loaded { stamp, index: Arc::clone(&index) });
        Ok(index)
    }

    fn stamp(&self) -> Result<Stamp> {
        let meta = fs::metadata(self.dir.join(METADATA_FILE)).map_err(|_| self.unavailable())?;
        Ok(Stamp { modified: meta.modified()?, len: meta.len() })
    }

    fn unavailable(&self) -> Error {
        Error::RetrievalUnavailable(format!("no vector index found in {}", self.dir.display()))
    }
}
