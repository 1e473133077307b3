//! Vector encodings and the owned vector value.

use crate::{Result, VectorError};

/// Hard cap on vector dimensionality.
pub const MAX_DIMS: usize = 65536;

/// Pads a quantized payload to a 4-byte boundary.
pub(crate) fn align4(n: usize) -> usize {
    (n + 3) & !3
}

/// Vector element encoding.
///
/// The discriminants are wire values: they appear as the trailing type tag of
/// serialized blobs and as the `vector_type` / `compress_neighbors` index
/// parameters, so they must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VectorType {
    /// 32-bit IEEE-754 floats, 4 bytes per component.
    Float32 = 1,
    /// 64-bit IEEE-754 floats, 8 bytes per component.
    Float64 = 2,
    /// Sign-only 1-bit quantization, 8 components per byte.
    Bit1 = 3,
    /// Affine u8 quantization with per-vector `alpha` scale and `shift` offset.
    Float8 = 4,
    /// IEEE-754 binary16, 2 bytes per component.
    Float16 = 5,
    /// bfloat16 (truncated binary32 exponent range), 2 bytes per component.
    BFloat16 = 6,
}

impl VectorType {
    /// Wire tag for this encoding.
    pub const fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(VectorType::Float32),
            2 => Ok(VectorType::Float64),
            3 => Ok(VectorType::Bit1),
            4 => Ok(VectorType::Float8),
            5 => Ok(VectorType::Float16),
            6 => Ok(VectorType::BFloat16),
            _ => Err(VectorError::UnsupportedEncoding(tag)),
        }
    }

    /// Size in bytes of the raw component payload for `dims` components,
    /// excluding any blob metadata.
    ///
    /// For [`VectorType::Float8`] this includes the 8 bytes of `alpha` and
    /// `shift` that travel with the quantized codes.
    pub fn data_size(self, dims: usize) -> usize {
        match self {
            VectorType::Float32 => dims * 4,
            VectorType::Float64 => dims * 8,
            VectorType::Bit1 => dims.div_ceil(8),
            VectorType::Float8 => align4(dims) + 8,
            VectorType::Float16 | VectorType::BFloat16 => dims * 2,
        }
    }
}

/// An owned vector value in one of the six supported encodings.
///
/// Half-precision components are kept as raw bits (`u16`) and only widened
/// when a kernel needs real arithmetic. Float8 keeps the quantized codes plus
/// the affine parameters; Bit1 packs sign bits LSB-first.
#[derive(Debug, Clone, PartialEq)]
pub enum Vector {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Float16(Vec<u16>),
    BFloat16(Vec<u16>),
    Float8 {
        /// Quantized codes, one per component. Component `i` decodes as
        /// `alpha * codes[i] + shift`.
        codes: Vec<u8>,
        alpha: f32,
        shift: f32,
    },
    Bit1 {
        /// Packed sign bits, LSB-first within each byte.
        bits: Vec<u8>,
        dims: usize,
    },
}

impl Vector {
    pub fn vector_type(&self) -> VectorType {
        match self {
            Vector::Float32(_) => VectorType::Float32,
            Vector::Float64(_) => VectorType::Float64,
            Vector::Float16(_) => VectorType::Float16,
            Vector::BFloat16(_) => VectorType::BFloat16,
            Vector::Float8 { .. } => VectorType::Float8,
            Vector::Bit1 { .. } => VectorType::Bit1,
        }
    }

    pub fn dims(&self) -> usize {
        match self {
            Vector::Float32(v) => v.len(),
            Vector::Float64(v) => v.len(),
            Vector::Float16(v) | Vector::BFloat16(v) => v.len(),
            Vector::Float8 { codes, .. } => codes.len(),
            Vector::Bit1 { dims, .. } => *dims,
        }
    }

    /// Raw payload size in bytes, excluding blob metadata.
    pub fn data_size(&self) -> usize {
        self.vector_type().data_size(self.dims())
    }
}
