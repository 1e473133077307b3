//! Vector values for Arbor.
//!
//! This crate owns everything about a vector *value*: its in-memory
//! representation, the on-disk blob codec, text parsing, conversion between
//! encodings, and the distance kernels the index is built on.
//!
//! # Architecture
//!
//! ```text
//! text "[1,2,3]" --parse--> Vector --encode--> blob (self-describing)
//!                              |
//!                         convert_to (f32 <-> f64/f16/bf16/int8/1-bit)
//!                              |
//!                          distance (cosine / l2)
//! ```
//!
//! Six encodings are supported. Float32 is the canonical one: conversions
//! between any other pair route through it, and it is the only encoding whose
//! blob form carries no trailing type tag (an even-length blob is float32 by
//! definition; every other encoding pads itself to an odd length).
//!
//! # Example
//!
//! ```
//! use arbor_vector::{DistanceMetric, Vector, VectorType};
//!
//! let a = Vector::from_text(VectorType::Float32, "[1, 0, 0]").unwrap();
//! let b = Vector::from_text(VectorType::Float32, "[0, 1, 0]").unwrap();
//! let d = arbor_vector::distance(&a, &b, DistanceMetric::Cosine).unwrap();
//! assert!((d - 1.0).abs() < 1e-6);
//! ```

pub mod blob;
mod convert;
mod distance;
pub mod f16;
mod text;
mod types;

pub use blob::{decode_blob, encode_blob};
pub use distance::{distance, DistanceMetric};
pub use types::{Vector, VectorType, MAX_DIMS};

/// Error type for vector operations.
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("invalid vector: {0}")]
    InvalidArgument(String),

    #[error("unsupported vector encoding: type tag {0}")]
    UnsupportedEncoding(u8),

    #[error("vector text parse error at byte {pos}: {reason}")]
    Parse { pos: usize, reason: String },
}

/// Result type for vector operations.
pub type Result<T> = std::result::Result<T, VectorError>;
