//! Blob serialization.
//!
//! Two layers live here. `encode_blob`/`decode_blob` implement the
//! self-describing wire format: the component payload followed by per-type
//! metadata and a trailing type tag. Float32 is special-cased for
//! compatibility with plain float arrays: its blob carries no tag and is
//! always even-length, while every other encoding pads itself to an odd
//! total length so the parser can tell them apart by parity alone.
//!
//! `write_data`/`read_data` handle only the fixed-size component payload and
//! are used for the vector slots inside index node blocks, where type and
//! dimension count are known from the index parameters.

use crate::types::align4;
use crate::{Result, Vector, VectorError, VectorType, MAX_DIMS};

fn check_dims(dims: usize) -> Result<usize> {
    if dims == 0 {
        return Err(VectorError::InvalidArgument(
            "vector must have at least one component".into(),
        ));
    }
    if dims > MAX_DIMS {
        return Err(VectorError::InvalidArgument(format!(
            "vector has too many components: {dims} (max {MAX_DIMS})"
        )));
    }
    Ok(dims)
}

/// Writes the raw component payload of `vector` into `out`.
///
/// `out` must be exactly [`Vector::data_size`] bytes. All multi-byte values
/// are little-endian.
pub fn write_data(vector: &Vector, out: &mut [u8]) {
    assert_eq!(out.len(), vector.data_size());
    match vector {
        Vector::Float32(values) => {
            for (chunk, v) in out.chunks_exact_mut(4).zip(values) {
                chunk.copy_from_slice(&v.to_le_bytes());
            }
        }
        Vector::Float64(values) => {
            for (chunk, v) in out.chunks_exact_mut(8).zip(values) {
                chunk.copy_from_slice(&v.to_le_bytes());
            }
        }
        Vector::Float16(values) | Vector::BFloat16(values) => {
            for (chunk, v) in out.chunks_exact_mut(2).zip(values) {
                chunk.copy_from_slice(&v.to_le_bytes());
            }
        }
        Vector::Float8 { codes, alpha, shift } => {
            let padded = align4(codes.len());
            out[..codes.len()].copy_from_slice(codes);
            out[codes.len()..padded].fill(0);
            out[padded..padded + 4].copy_from_slice(&alpha.to_le_bytes());
            out[padded + 4..].copy_from_slice(&shift.to_le_bytes());
        }
        Vector::Bit1 { bits, .. } => out.copy_from_slice(bits),
    }
}

/// Reads a raw component payload written by [`write_data`].
///
/// `data` must be exactly `vtype.data_size(dims)` bytes.
pub fn read_data(vtype: VectorType, dims: usize, data: &[u8]) -> Vector {
    assert_eq!(data.len(), vtype.data_size(dims));
    match vtype {
        VectorType::Float32 => Vector::Float32(
            data.chunks_exact(4)
                .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
                .collect(),
        ),
        VectorType::Float64 => Vector::Float64(
            data.chunks_exact(8)
                .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
                .collect(),
        ),
        VectorType::Float16 | VectorType::BFloat16 => {
            let values: Vec<u16> = data
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes(c.try_into().unwrap()))
                .collect();
            if vtype == VectorType::Float16 {
                Vector::Float16(values)
            } else {
                Vector::BFloat16(values)
            }
        }
        VectorType::Float8 => {
            let padded = align4(dims);
            Vector::Float8 {
                codes: data[..dims].to_vec(),
                alpha: f32::from_le_bytes(data[padded..padded + 4].try_into().unwrap()),
                shift: f32::from_le_bytes(data[padded + 4..].try_into().unwrap()),
            }
        }
        VectorType::Bit1 => Vector::Bit1 {
            bits: data.to_vec(),
            dims,
        },
    }
}

/// Serializes a vector to its self-describing blob form.
pub fn encode_blob(vector: &Vector) -> Vec<u8> {
    let data_size = vector.data_size();
    let dims = vector.dims();
    let vtype = vector.vector_type();

    // Metadata: nothing for float32; for bit-packed and quantized encodings a
    // trailing-count byte (plus a pad byte when needed to keep the total odd);
    // a type tag byte for everything but float32.
    let meta_size = match vtype {
        VectorType::Float32 => 0,
        VectorType::Float64 | VectorType::Float16 | VectorType::BFloat16 => 1,
        VectorType::Bit1 => {
            if data_size % 2 == 0 {
                3
            } else {
                2
            }
        }
        VectorType::Float8 => 3,
    };

    let mut blob = vec![0u8; data_size + meta_size];
    write_data(vector, &mut blob[..data_size]);
    match vtype {
        VectorType::Float32 => {}
        VectorType::Float64 | VectorType::Float16 | VectorType::BFloat16 => {
            blob[data_size] = vtype.tag();
        }
        VectorType::Bit1 => {
            let n = blob.len() - 1;
            blob[n - 1] = (8 * n - dims) as u8;
            blob[n] = vtype.tag();
        }
        VectorType::Float8 => {
            let n = blob.len() - 1;
            blob[n - 1] = (align4(dims) - dims) as u8;
            blob[n] = vtype.tag();
        }
    }
    blob
}

/// Parses a self-describing blob produced by [`encode_blob`].
pub fn decode_blob(blob: &[u8]) -> Result<Vector> {
    if blob.len() % 2 == 0 {
        // No tag byte: a plain little-endian float32 array.
        if blob.is_empty() || blob.len() % 4 != 0 {
            return Err(VectorError::InvalidArgument(format!(
                "float32 blob length must be a non-zero multiple of 4, got {}",
                blob.len()
            )));
        }
        let dims = check_dims(blob.len() / 4)?;
        return Ok(read_data(VectorType::Float32, dims, blob));
    }

    let vtype = VectorType::from_tag(blob[blob.len() - 1])?;
    let payload = &blob[..blob.len() - 1];
    match vtype {
        VectorType::Float32 => {
            if payload.is_empty() || payload.len() % 4 != 0 {
                return Err(VectorError::InvalidArgument(
                    "malformed float32 blob".into(),
                ));
            }
            let dims = check_dims(payload.len() / 4)?;
            Ok(read_data(vtype, dims, payload))
        }
        VectorType::Float64 => {
            if payload.is_empty() || payload.len() % 8 != 0 {
                return Err(VectorError::InvalidArgument(
                    "malformed float64 blob".into(),
                ));
            }
            let dims = check_dims(payload.len() / 8)?;
            Ok(read_data(vtype, dims, payload))
        }
        VectorType::Float16 | VectorType::BFloat16 => {
            if payload.is_empty() || payload.len() % 2 != 0 {
                return Err(VectorError::InvalidArgument(
                    "malformed float16 blob".into(),
                ));
            }
            let dims = check_dims(payload.len() / 2)?;
            Ok(read_data(vtype, dims, payload))
        }
        VectorType::Bit1 => {
            if payload.len() < 2 || payload.len() % 2 != 0 {
                return Err(VectorError::InvalidArgument("malformed 1-bit blob".into()));
            }
            let trailing = payload[payload.len() - 1] as usize;
            let dims = check_dims(
                (8 * payload.len())
                    .checked_sub(trailing)
                    .ok_or_else(|| VectorError::InvalidArgument("malformed 1-bit blob".into()))?,
            )?;
            let data_size = VectorType::Bit1.data_size(dims);
            if data_size > payload.len() - 1 {
                return Err(VectorError::InvalidArgument("malformed 1-bit blob".into()));
            }
            Ok(read_data(vtype, dims, &payload[..data_size]))
        }
        VectorType::Float8 => {
            if payload.len() < 14 || payload.len() % 2 != 0 {
                return Err(VectorError::InvalidArgument(
                    "malformed float8 blob".into(),
                ));
            }
            let trailing = payload[payload.len() - 1] as usize;
            let dims = check_dims(
                (payload.len() - 2)
                    .checked_sub(8 + trailing)
                    .ok_or_else(|| VectorError::InvalidArgument("malformed float8 blob".into()))?,
            )?;
            let data_size = VectorType::Float8.data_size(dims);
            if data_size != payload.len() - 2 {
                return Err(VectorError::InvalidArgument(
                    "malformed float8 blob".into(),
                ));
            }
            Ok(read_data(vtype, dims, &payload[..data_size]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float32_blob_has_no_tag() {
        let v = Vector::Float32(vec![1.0, -2.5, 3.25]);
        let blob = encode_blob(&v);
        assert_eq!(blob.len(), 12);
        assert_eq!(decode_blob(&blob).unwrap(), v);
    }

    #[test]
    fn test_tagged_blobs_are_odd_length() {
        let vectors = [
            Vector::Float64(vec![1.0, 2.0]),
            Vector::Float16(vec![0x3c00, 0x4000, 0xbc00]),
            Vector::BFloat16(vec![0x3f80]),
            Vector::Float8 {
                codes: vec![0, 128, 255],
                alpha: 0.5,
                shift: -1.0,
            },
            Vector::Bit1 {
                bits: vec![0b1010_1101],
                dims: 8,
            },
            Vector::Bit1 {
                bits: vec![0xff, 0x01],
                dims: 9,
            },
        ];
        for v in vectors {
            let blob = encode_blob(&v);
            assert_eq!(blob.len() % 2, 1, "{v:?}");
            assert_eq!(blob[blob.len() - 1], v.vector_type().tag());
            assert_eq!(decode_blob(&blob).unwrap(), v, "{v:?}");
        }
    }

    #[test]
    fn test_decode_rejects_malformed() {
        // Even length that is not a whole number of f32s.
        assert!(decode_blob(&[0u8; 6]).is_err());
        // Empty.
        assert!(decode_blob(&[]).is_err());
        // Unknown type tag.
        assert!(decode_blob(&[0, 0, 9]).is_err());
        // Float64 payload not a multiple of 8.
        assert!(decode_blob(&[0, 0, 0, 0, 2]).is_err());
        // Float8 too short to hold alpha and shift.
        assert!(decode_blob(&[0, 0, 0, 0, 0, 0, 4]).is_err());
    }

    #[test]
    fn test_node_payload_round_trip() {
        let v = Vector::Float8 {
            codes: vec![1, 2, 3, 4, 5],
            alpha: 0.25,
            shift: 2.0,
        };
        let mut buf = vec![0u8; v.data_size()];
        write_data(&v, &mut buf);
        assert_eq!(read_data(VectorType::Float8, 5, &buf), v);
    }
}
