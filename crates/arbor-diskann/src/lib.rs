//! Disk-resident approximate-nearest-neighbor index for Arbor.
//!
//! The index is a navigable graph in the DiskANN family: every row owns one
//! fixed-size block holding its vector plus a bounded, distance-sorted edge
//! list, and each edge carries a (possibly compressed) copy of the neighbor's
//! vector so greedy search ranks candidates without extra block reads.
//!
//! # Architecture
//!
//! ```text
//! create_index/open_index           ShadowStore (host seam)
//!        |                               |
//!   IndexParams  <--- params blob -------+
//!        |                               |
//!  DiskAnnIndex --- BlobSpot reads/writes + rowid<->key mapping
//!        |
//!   NodeFormat (block layout) + arbor-vector (distances, codecs)
//! ```
//!
//! Storage is abstract: the [`ShadowStore`] trait is the only thing the
//! engine talks to, so the same graph code runs against a database shadow
//! table or the bundled in-memory [`MemStore`].

mod blobspot;
mod engine;
mod index;
mod node;
mod params;
mod store;

pub use blobspot::BlobSpot;
pub use engine::{DiskAnnIndex, SearchResult};
pub use index::{create_index, drop_index, open_index};
pub use node::NodeFormat;
pub use params::{param, IndexParams, PARAMS_BUF_SIZE};
pub use store::{
    IndexKey, KeyDescriptor, KeyValue, MemStore, ShadowStore, MAX_KEY_COLUMNS,
};

pub use arbor_vector::{distance, DistanceMetric, Vector, VectorType};

/// Error type for index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("row not found: rowid={0}")]
    RowNotFound(u64),

    #[error("stored block size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("unsupported index format version {found} (supported: {min}..={max})")]
    FormatVersionMismatch { found: u64, min: u64, max: u64 },

    #[error("index not found in store")]
    NotFound,

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Vector(#[from] arbor_vector::VectorError),
}

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;
