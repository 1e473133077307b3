//! Persisted index parameters.
//!
//! Parameters travel as a small append-only blob of `(u8 tag, u64 le)`
//! records, capped at [`PARAMS_BUF_SIZE`] bytes. Updates append a new record
//! rather than rewriting; readers scan the whole blob and the last occurrence
//! of a tag wins. Floating-point values are stored as the raw bits of an f64.

use crate::{IndexError, Result};

/// Maximum size in bytes of the serialized parameter blob.
pub const PARAMS_BUF_SIZE: usize = 128;

const RECORD_SIZE: usize = 9;

/// Parameter tags. Persisted; never renumber.
pub mod param {
    pub const FORMAT_VERSION: u8 = 1;
    pub const INDEX_TYPE: u8 = 2;
    pub const VECTOR_TYPE: u8 = 3;
    pub const DIMS: u8 = 4;
    pub const METRIC: u8 = 5;
    pub const BLOCK_SIZE: u8 = 6;
    pub const PRUNING_ALPHA: u8 = 7;
    pub const INSERT_L: u8 = 8;
    pub const SEARCH_L: u8 = 9;
    pub const MAX_NEIGHBORS: u8 = 10;
    pub const COMPRESS_NEIGHBORS: u8 = 11;
}

/// The parameter record blob.
#[derive(Debug, Clone)]
pub struct IndexParams {
    buf: [u8; PARAMS_BUF_SIZE],
    len: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            buf: [0; PARAMS_BUF_SIZE],
            len: 0,
        }
    }
}

impl IndexParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(blob: &[u8]) -> Result<Self> {
        if blob.len() > PARAMS_BUF_SIZE {
            return Err(IndexError::InvalidArgument(format!(
                "parameter blob too large: {} bytes (max {PARAMS_BUF_SIZE})",
                blob.len()
            )));
        }
        if blob.len() % RECORD_SIZE != 0 {
            return Err(IndexError::InvalidArgument(format!(
                "parameter blob length {} is not a whole number of records",
                blob.len()
            )));
        }
        let mut params = Self::new();
        params.buf[..blob.len()].copy_from_slice(blob);
        params.len = blob.len();
        Ok(params)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Returns the last value recorded for `tag`, or 0 if absent.
    pub fn get_u64(&self, tag: u8) -> u64 {
        let mut value = 0;
        for record in self.buf[..self.len].chunks_exact(RECORD_SIZE) {
            if record[0] == tag {
                value = u64::from_le_bytes(record[1..].try_into().unwrap());
            }
        }
        value
    }

    pub fn get_f64(&self, tag: u8) -> f64 {
        f64::from_bits(self.get_u64(tag))
    }

    /// Appends a record for `tag`. Fails only when the blob is full.
    pub fn put_u64(&mut self, tag: u8, value: u64) -> Result<()> {
        if self.len + RECORD_SIZE > PARAMS_BUF_SIZE {
            return Err(IndexError::InvalidArgument(
                "parameter blob is full".into(),
            ));
        }
        self.buf[self.len] = tag;
        self.buf[self.len + 1..self.len + RECORD_SIZE].copy_from_slice(&value.to_le_bytes());
        self.len += RECORD_SIZE;
        Ok(())
    }

    pub fn put_f64(&mut self, tag: u8, value: f64) -> Result<()> {
        self.put_u64(tag, value.to_bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_tag_reads_zero() {
        let params = IndexParams::new();
        assert_eq!(params.get_u64(param::DIMS), 0);
        assert_eq!(params.get_f64(param::PRUNING_ALPHA), 0.0);
    }

    #[test]
    fn test_last_occurrence_wins() {
        let mut params = IndexParams::new();
        params.put_u64(param::DIMS, 128).unwrap();
        params.put_u64(param::METRIC, 1).unwrap();
        params.put_u64(param::DIMS, 256).unwrap();
        assert_eq!(params.get_u64(param::DIMS), 256);
        assert_eq!(params.get_u64(param::METRIC), 1);
        assert_eq!(params.as_bytes().len(), 27);
    }

    #[test]
    fn test_f64_round_trip() {
        let mut params = IndexParams::new();
        params.put_f64(param::PRUNING_ALPHA, 1.2).unwrap();
        assert_eq!(params.get_f64(param::PRUNING_ALPHA), 1.2);
    }

    #[test]
    fn test_capacity_limit() {
        let mut params = IndexParams::new();
        for _ in 0..14 {
            params.put_u64(param::DIMS, 1).unwrap();
        }
        // 15th record would cross 128 bytes.
        assert!(params.put_u64(param::DIMS, 1).is_err());
    }

    #[test]
    fn test_from_bytes_round_trip() {
        let mut params = IndexParams::new();
        params.put_u64(param::VECTOR_TYPE, 1).unwrap();
        params.put_f64(param::PRUNING_ALPHA, 1.5).unwrap();
        let restored = IndexParams::from_bytes(params.as_bytes()).unwrap();
        assert_eq!(restored.get_u64(param::VECTOR_TYPE), 1);
        assert_eq!(restored.get_f64(param::PRUNING_ALPHA), 1.5);

        assert!(IndexParams::from_bytes(&[0u8; 130]).is_err());
        assert!(IndexParams::from_bytes(&[0u8; 10]).is_err());
    }
}
