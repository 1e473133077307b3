//! Distance kernels.
//!
//! Two metrics are exposed. Cosine distance is `1 - cos(a, b)` for float
//! encodings and degrades to normalized Hamming distance for 1-bit vectors,
//! where angles are meaningless but sign agreement is not. L2 is the
//! euclidean distance and is rejected for 1-bit vectors.
//!
//! Float8 never dequantizes: both kernels expand algebraically over the raw
//! u8 codes so the inner loops run on integer sums, with the affine `alpha`/
//! `shift` terms applied once at the end.

use crate::f16;
use crate::{Result, Vector, VectorError};

/// Distance metric. Discriminants are the persisted `metric` parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DistanceMetric {
    Cosine = 1,
    L2 = 2,
}

impl DistanceMetric {
    pub const fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(DistanceMetric::Cosine),
            2 => Ok(DistanceMetric::L2),
            _ => Err(VectorError::InvalidArgument(format!(
                "unknown distance metric: {tag}"
            ))),
        }
    }
}

/// Computes the distance between two vectors of the same encoding and
/// dimension count.
pub fn distance(a: &Vector, b: &Vector, metric: DistanceMetric) -> Result<f64> {
    if a.vector_type() != b.vector_type() {
        return Err(VectorError::InvalidArgument(format!(
            "vector type mismatch: {:?} vs {:?}",
            a.vector_type(),
            b.vector_type()
        )));
    }
    if a.dims() != b.dims() {
        return Err(VectorError::InvalidArgument(format!(
            "dimension mismatch: {} vs {}",
            a.dims(),
            b.dims()
        )));
    }
    match (a, b) {
        (Vector::Float32(x), Vector::Float32(y)) => Ok(float_distance(x, y, metric)),
        (Vector::Float64(x), Vector::Float64(y)) => Ok(f64_distance(x, y, metric)),
        (Vector::Float16(x), Vector::Float16(y)) => {
            Ok(half_distance(x, y, f16::f16_to_f32, metric))
        }
        (Vector::BFloat16(x), Vector::BFloat16(y)) => {
            Ok(half_distance(x, y, f16::bf16_to_f32, metric))
        }
        (
            Vector::Float8 {
                codes: xq,
                alpha: xa,
                shift: xs,
            },
            Vector::Float8 {
                codes: yq,
                alpha: ya,
                shift: ys,
            },
        ) => Ok(f8_distance(
            xq,
            f64::from(*xa),
            f64::from(*xs),
            yq,
            f64::from(*ya),
            f64::from(*ys),
            metric,
        )),
        (Vector::Bit1 { bits: x, dims }, Vector::Bit1 { bits: y, .. }) => match metric {
            DistanceMetric::Cosine => Ok(hamming(x, y) / *dims as f64),
            DistanceMetric::L2 => Err(VectorError::InvalidArgument(
                "l2 distance is not defined for 1-bit vectors".into(),
            )),
        },
        _ => unreachable!("type equality checked above"),
    }
}

fn float_distance(a: &[f32], b: &[f32], metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Cosine => {
            let mut dot = 0.0f32;
            let mut norm_a = 0.0f32;
            let mut norm_b = 0.0f32;
            for (x, y) in a.iter().zip(b) {
                dot += x * y;
                norm_a += x * x;
                norm_b += y * y;
            }
            let denom = (norm_a * norm_b).sqrt();
            if denom <= f32::EPSILON {
                return 1.0;
            }
            f64::from(1.0 - dot / denom)
        }
        DistanceMetric::L2 => {
            let mut sum = 0.0f32;
            for (x, y) in a.iter().zip(b) {
                let d = x - y;
                sum += d * d;
            }
            f64::from(sum.sqrt())
        }
    }
}

fn f64_distance(a: &[f64], b: &[f64], metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Cosine => {
            let mut dot = 0.0;
            let mut norm_a = 0.0;
            let mut norm_b = 0.0;
            for (x, y) in a.iter().zip(b) {
                dot += x * y;
                norm_a += x * x;
                norm_b += y * y;
            }
            let denom = (norm_a * norm_b).sqrt();
            if denom <= f64::EPSILON {
                return 1.0;
            }
            1.0 - dot / denom
        }
        DistanceMetric::L2 => {
            let mut sum = 0.0;
            for (x, y) in a.iter().zip(b) {
                let d = x - y;
                sum += d * d;
            }
            sum.sqrt()
        }
    }
}

fn half_distance(a: &[u16], b: &[u16], widen: fn(u16) -> f32, metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Cosine => {
            let mut dot = 0.0f32;
            let mut norm_a = 0.0f32;
            let mut norm_b = 0.0f32;
            for (&xb, &yb) in a.iter().zip(b) {
                let x = widen(xb);
                let y = widen(yb);
                dot += x * y;
                norm_a += x * x;
                norm_b += y * y;
            }
            let denom = (norm_a * norm_b).sqrt();
            if denom <= f32::EPSILON {
                return 1.0;
            }
            f64::from(1.0 - dot / denom)
        }
        DistanceMetric::L2 => {
            let mut sum = 0.0f32;
            for (&xb, &yb) in a.iter().zip(b) {
                let d = widen(xb) - widen(yb);
                sum += d * d;
            }
            f64::from(sum.sqrt())
        }
    }
}

/// Distance over raw u8 codes.
///
/// With `x[i] = xa * xq[i] + xs` and `y[i] = ya * yq[i] + ys`, every term of
/// dot product, squared norm and squared difference expands into the three
/// integer sums below plus closed-form corrections, so no component is ever
/// dequantized.
fn f8_distance(
    xq: &[u8],
    xa: f64,
    xs: f64,
    yq: &[u8],
    ya: f64,
    ys: f64,
    metric: DistanceMetric,
) -> f64 {
    let mut sum_x = 0u64;
    let mut sum_y = 0u64;
    let mut sum_xx = 0u64;
    let mut sum_yy = 0u64;
    let mut sum_xy = 0u64;
    for (&qx, &qy) in xq.iter().zip(yq) {
        let qx = u64::from(qx);
        let qy = u64::from(qy);
        sum_x += qx;
        sum_y += qy;
        sum_xx += qx * qx;
        sum_yy += qy * qy;
        sum_xy += qx * qy;
    }
    let n = xq.len() as f64;
    let (sum_x, sum_y) = (sum_x as f64, sum_y as f64);
    let (sum_xx, sum_yy, sum_xy) = (sum_xx as f64, sum_yy as f64, sum_xy as f64);

    match metric {
        DistanceMetric::Cosine => {
            let dot = xa * ya * sum_xy + xa * ys * sum_x + ya * xs * sum_y + n * xs * ys;
            let norm_x = xa * xa * sum_xx + 2.0 * xa * xs * sum_x + n * xs * xs;
            let norm_y = ya * ya * sum_yy + 2.0 * ya * ys * sum_y + n * ys * ys;
            let denom = (norm_x * norm_y).max(0.0).sqrt();
            if denom <= f64::EPSILON {
                return 1.0;
            }
            1.0 - dot / denom
        }
        DistanceMetric::L2 => {
            let dshift = xs - ys;
            let sum = xa * xa * sum_xx + ya * ya * sum_yy - 2.0 * xa * ya * sum_xy
                + 2.0 * dshift * (xa * sum_x - ya * sum_y)
                + n * dshift * dshift;
            sum.max(0.0).sqrt()
        }
    }
}

fn hamming(a: &[u8], b: &[u8]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| u32::from(x ^ y).count_ones())
        .sum::<u32>() as f64
}
