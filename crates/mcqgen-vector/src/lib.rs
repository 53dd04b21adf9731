//! Flat vector index over document chunks, its on-disk sidecar format, a
//! shared reloading handle and the ingestion pipeline that fills it.

pub mod handle;
pub mod index;
pub mod ingest;

pub use handle::IndexHandle;
pub use index::{VectorIndex, METADATA_FILE, VECTORS_FILE};
pub use ingest::{collect_text_files, IngestStats, Ingestor};
