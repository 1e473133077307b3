//! Conversion between encodings.
//!
//! All conversions route through f32 components. Narrowing is lossy by
//! design: float8 picks a fresh min/max affine quantization per vector and
//! 1-bit keeps only the sign.

use crate::f16;
use crate::{Vector, VectorType};

impl Vector {
    /// Widens every component to f32.
    ///
    /// Float64 components are narrowed; use [`Vector::Float64`] directly when
    /// full precision matters.
    pub fn to_f32_components(&self) -> Vec<f32> {
        match self {
            Vector::Float32(values) => values.clone(),
            Vector::Float64(values) => values.iter().map(|&v| v as f32).collect(),
            Vector::Float16(values) => values.iter().map(|&v| f16::f16_to_f32(v)).collect(),
            Vector::BFloat16(values) => values.iter().map(|&v| f16::bf16_to_f32(v)).collect(),
            Vector::Float8 { codes, alpha, shift } => codes
                .iter()
                .map(|&c| alpha * f32::from(c) + shift)
                .collect(),
            Vector::Bit1 { bits, dims } => (0..*dims)
                .map(|i| {
                    if bits[i / 8] & (1 << (i % 8)) != 0 {
                        1.0
                    } else {
                        -1.0
                    }
                })
                .collect(),
        }
    }

    /// Converts to another encoding, preserving the dimension count.
    pub fn convert_to(&self, target: VectorType) -> Vector {
        if self.vector_type() == target {
            return self.clone();
        }
        let components = self.to_f32_components();
        match target {
            VectorType::Float32 => Vector::Float32(components),
            VectorType::Float64 => {
                Vector::Float64(components.iter().map(|&c| f64::from(c)).collect())
            }
            VectorType::Float16 => {
                Vector::Float16(components.iter().map(|&c| f16::f16_from_f32(c)).collect())
            }
            VectorType::BFloat16 => {
                Vector::BFloat16(components.iter().map(|&c| f16::bf16_from_f32(c)).collect())
            }
            VectorType::Float8 => quantize_f8(&components),
            VectorType::Bit1 => {
                let dims = components.len();
                let mut bits = vec![0u8; dims.div_ceil(8)];
                for (i, &c) in components.iter().enumerate() {
                    if c > 0.0 {
                        bits[i / 8] |= 1 << (i % 8);
                    }
                }
                Vector::Bit1 { bits, dims }
            }
        }
    }
}

/// Min/max affine quantization to u8 codes: `component = alpha * code + shift`.
fn quantize_f8(components: &[f32]) -> Vector {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &c in components {
        min = min.min(c);
        max = max.max(c);
    }
    let shift = min;
    let alpha = (max - min) / 255.0;
    let codes = components
        .iter()
        .map(|&c| {
            if alpha == 0.0 {
                0
            } else {
                (((c - shift) / alpha + 0.5) as i32).clamp(0, 255) as u8
            }
        })
        .collect();
    Vector::Float8 {
        codes,
        alpha,
        shift,
    }
}
