//! Index lifecycle: create, open, drop.
//!
//! An index definition is just its parameter blob. `create_index` validates
//! and completes the caller's parameters, derives the block size, and sets up
//! the backing relation; `open_index` rebuilds the runtime state from the
//! persisted blob alone.

use arbor_vector::{DistanceMetric, VectorType, MAX_DIMS};
use tracing::debug;

use crate::engine::DiskAnnIndex;
use crate::node::NodeFormat;
use crate::params::{param, IndexParams};
use crate::store::{KeyDescriptor, ShadowStore};
use crate::{IndexError, Result};

const INDEX_TYPE_DISKANN: u64 = 1;

const MIN_FORMAT_VERSION: u64 = 2;
const MAX_FORMAT_VERSION: u64 = 3;
const DEFAULT_FORMAT_VERSION: u64 = 3;

const DEFAULT_PRUNING_ALPHA: f64 = 1.2;
const DEFAULT_INSERT_L: u64 = 70;
const DEFAULT_SEARCH_L: u64 = 200;

const MIN_BLOCK_SIZE: usize = 256;
const MAX_BLOCK_SIZE: usize = 128 * 1024 * 1024;
// Stored block sizes of at most 128 are legacy values in 512-byte units.
const BLOCK_SIZE_SHIFT: u32 = 9;

const EDGE_META_SIZE: usize = 16;

fn node_overhead(format_version: u64, node_type: VectorType, dims: usize) -> usize {
    let header = if format_version <= 2 { 10 } else { 16 };
    header + node_type.data_size(dims)
}

fn edge_overhead(edge_type: VectorType, dims: usize) -> usize {
    edge_type.data_size(dims) + EDGE_META_SIZE
}

fn default_max_neighbors(node_overhead: usize, edge_overhead: usize, dims: usize) -> usize {
    let by_dims = 3 * ((dims as f64).sqrt() as usize + 1);
    let by_size = 50 * node_overhead / edge_overhead + 1;
    by_dims.min(by_size)
}

fn validated_types(params: &IndexParams) -> Result<(VectorType, VectorType, DistanceMetric, usize)> {
    let node_type = VectorType::from_tag(params.get_u64(param::VECTOR_TYPE) as u8)?;
    let dims = params.get_u64(param::DIMS) as usize;
    if dims == 0 || dims > MAX_DIMS {
        return Err(IndexError::InvalidArgument(format!(
            "dimension count must be in 1..={MAX_DIMS}, got {dims}"
        )));
    }
    let metric = DistanceMetric::from_tag(params.get_u64(param::METRIC) as u8)?;
    if node_type == VectorType::Bit1 && metric == DistanceMetric::L2 {
        return Err(IndexError::InvalidArgument(
            "l2 metric is not defined for 1-bit vectors".into(),
        ));
    }
    let edge_type = match params.get_u64(param::COMPRESS_NEIGHBORS) {
        0 => node_type,
        tag => {
            let t = VectorType::from_tag(tag as u8)?;
            if t == VectorType::Bit1 && metric != DistanceMetric::Cosine {
                return Err(IndexError::InvalidArgument(
                    "1-bit neighbor compression requires the cosine metric".into(),
                ));
            }
            t
        }
    };
    Ok((node_type, edge_type, metric, dims))
}

/// Creates an index in `store`.
///
/// `params` must carry at least the vector type and dimension count;
/// everything else is defaulted in place, so the caller sees the effective
/// configuration after the call.
pub fn create_index<S: ShadowStore>(
    store: &mut S,
    key: &KeyDescriptor,
    params: &mut IndexParams,
) -> Result<()> {
    params.put_u64(param::INDEX_TYPE, INDEX_TYPE_DISKANN)?;

    let format_version = match params.get_u64(param::FORMAT_VERSION) {
        0 => {
            params.put_u64(param::FORMAT_VERSION, DEFAULT_FORMAT_VERSION)?;
            DEFAULT_FORMAT_VERSION
        }
        v if (MIN_FORMAT_VERSION..=MAX_FORMAT_VERSION).contains(&v) => v,
        v => {
            return Err(IndexError::FormatVersionMismatch {
                found: v,
                min: MIN_FORMAT_VERSION,
                max: MAX_FORMAT_VERSION,
            })
        }
    };
    if params.get_u64(param::METRIC) == 0 {
        params.put_u64(param::METRIC, u64::from(DistanceMetric::Cosine.tag()))?;
    }
    let (node_type, edge_type, _, dims) = validated_types(params)?;

    let node_overhead = node_overhead(format_version, node_type, dims);
    let edge_overhead = edge_overhead(edge_type, dims);
    let max_neighbors = match params.get_u64(param::MAX_NEIGHBORS) {
        0 => {
            let n = default_max_neighbors(node_overhead, edge_overhead, dims) as u64;
            params.put_u64(param::MAX_NEIGHBORS, n)?;
            n
        }
        n => n,
    } as usize;
    if max_neighbors == 0 {
        return Err(IndexError::InvalidArgument(
            "max neighbors must be positive".into(),
        ));
    }

    let block_size = node_overhead + max_neighbors * edge_overhead;
    if block_size > MAX_BLOCK_SIZE {
        return Err(IndexError::InvalidArgument(format!(
            "node block of {block_size} bytes exceeds the {MAX_BLOCK_SIZE} byte limit"
        )));
    }
    let block_size = block_size.max(MIN_BLOCK_SIZE);
    params.put_u64(param::BLOCK_SIZE, block_size as u64)?;

    if params.get_f64(param::PRUNING_ALPHA) == 0.0 {
        params.put_f64(param::PRUNING_ALPHA, DEFAULT_PRUNING_ALPHA)?;
    }
    if params.get_u64(param::INSERT_L) == 0 {
        params.put_u64(param::INSERT_L, DEFAULT_INSERT_L)?;
    }
    if params.get_u64(param::SEARCH_L) == 0 {
        params.put_u64(param::SEARCH_L, DEFAULT_SEARCH_L)?;
    }

    store.create_relation(key)?;
    store.save_params(params.as_bytes())?;
    debug!(dims, block_size, max_neighbors, "created index");
    Ok(())
}

/// Opens the index persisted in `store`.
pub fn open_index<S: ShadowStore>(store: S) -> Result<DiskAnnIndex<S>> {
    let blob = store.load_params()?.ok_or(IndexError::NotFound)?;
    let params = IndexParams::from_bytes(&blob)?;

    let format_version = params.get_u64(param::FORMAT_VERSION);
    if !(MIN_FORMAT_VERSION..=MAX_FORMAT_VERSION).contains(&format_version) {
        return Err(IndexError::FormatVersionMismatch {
            found: format_version,
            min: MIN_FORMAT_VERSION,
            max: MAX_FORMAT_VERSION,
        });
    }
    let (node_type, edge_type, metric, dims) = validated_types(&params)?;

    let mut block_size = params.get_u64(param::BLOCK_SIZE) as usize;
    if block_size == 0 {
        return Err(IndexError::InvalidArgument("block size is not set".into()));
    }
    if block_size <= 128 {
        block_size <<= BLOCK_SIZE_SHIFT;
    }

    let format = NodeFormat::new(format_version, node_type, edge_type, dims, block_size);
    if format.max_edges() == 0 {
        return Err(IndexError::InvalidArgument(format!(
            "block size {block_size} cannot hold a single edge"
        )));
    }

    let pruning_alpha = match params.get_f64(param::PRUNING_ALPHA) {
        a if a == 0.0 => DEFAULT_PRUNING_ALPHA,
        a => a,
    };
    let insert_l = match params.get_u64(param::INSERT_L) {
        0 => DEFAULT_INSERT_L,
        l => l,
    } as usize;
    let search_l = match params.get_u64(param::SEARCH_L) {
        0 => DEFAULT_SEARCH_L,
        l => l,
    } as usize;

    debug!(dims, block_size, format_version, "opened index");
    Ok(DiskAnnIndex::new(
        store,
        format,
        metric,
        pruning_alpha,
        insert_l,
        search_l,
    ))
}

/// Drops the index and everything it stored.
pub fn drop_index<S: ShadowStore>(store: &mut S) -> Result<()> {
    store.drop_relation()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn base_params(vtype: VectorType, dims: u64) -> IndexParams {
        let mut params = IndexParams::new();
        params.put_u64(param::VECTOR_TYPE, u64::from(vtype.tag())).unwrap();
        params.put_u64(param::DIMS, dims).unwrap();
        params
    }

    #[test]
    fn test_create_fills_defaults() {
        let mut store = MemStore::new();
        let mut params = base_params(VectorType::Float32, 2);
        create_index(&mut store, &KeyDescriptor::new(1).unwrap(), &mut params).unwrap();

        assert_eq!(params.get_u64(param::FORMAT_VERSION), 3);
        assert_eq!(params.get_u64(param::METRIC), 1);
        // 3 * (floor(sqrt(2)) + 1) = 6 beats the size-derived bound of 51.
        assert_eq!(params.get_u64(param::MAX_NEIGHBORS), 6);
        // 24 + 6 * 24 = 168, padded up to the minimum block.
        assert_eq!(params.get_u64(param::BLOCK_SIZE), 256);
        assert_eq!(params.get_f64(param::PRUNING_ALPHA), 1.2);
        assert_eq!(params.get_u64(param::INSERT_L), 70);
        assert_eq!(params.get_u64(param::SEARCH_L), 200);
    }

    #[test]
    fn test_create_open_round_trip() {
        let mut store = MemStore::new();
        let mut params = base_params(VectorType::Float32, 4);
        params.put_u64(param::METRIC, 2).unwrap();
        create_index(&mut store, &KeyDescriptor::new(1).unwrap(), &mut params).unwrap();

        let index = open_index(store).unwrap();
        assert_eq!(index.metric(), DistanceMetric::L2);
        assert_eq!(index.format().dims(), 4);
        assert_eq!(index.format().node_type(), VectorType::Float32);
        assert_eq!(index.format().edge_type(), VectorType::Float32);
        // 3 * (floor(sqrt(4)) + 1) = 9 neighbors, 32 + 9 * 32 bytes.
        assert_eq!(index.format().block_size(), 320);
        assert_eq!(index.format().max_edges(), 9);
    }

    #[test]
    fn test_create_validation() {
        let key = KeyDescriptor::new(1).unwrap();

        // Missing vector type.
        let mut params = IndexParams::new();
        params.put_u64(param::DIMS, 4).unwrap();
        assert!(create_index(&mut MemStore::new(), &key, &mut params).is_err());

        // Missing dims.
        let mut params = IndexParams::new();
        params.put_u64(param::VECTOR_TYPE, 1).unwrap();
        assert!(create_index(&mut MemStore::new(), &key, &mut params).is_err());

        // 1-bit vectors cannot use l2.
        let mut params = base_params(VectorType::Bit1, 64);
        params.put_u64(param::METRIC, 2).unwrap();
        assert!(create_index(&mut MemStore::new(), &key, &mut params).is_err());

        // 1-bit edge compression requires cosine.
        let mut params = base_params(VectorType::Float32, 8);
        params.put_u64(param::METRIC, 2).unwrap();
        params
            .put_u64(param::COMPRESS_NEIGHBORS, u64::from(VectorType::Bit1.tag()))
            .unwrap();
        assert!(create_index(&mut MemStore::new(), &key, &mut params).is_err());

        // Unsupported format version.
        let mut params = base_params(VectorType::Float32, 8);
        params.put_u64(param::FORMAT_VERSION, 1).unwrap();
        assert!(matches!(
            create_index(&mut MemStore::new(), &key, &mut params),
            Err(IndexError::FormatVersionMismatch { found: 1, .. })
        ));
    }

    #[test]
    fn test_open_missing_and_bad_version() {
        assert!(matches!(
            open_index(MemStore::new()),
            Err(IndexError::NotFound)
        ));

        let mut store = MemStore::new();
        let mut params = base_params(VectorType::Float32, 2);
        create_index(&mut store, &KeyDescriptor::new(1).unwrap(), &mut params).unwrap();
        // Corrupt the stored version.
        let mut params = IndexParams::from_bytes(&store.load_params().unwrap().unwrap()).unwrap();
        params.put_u64(param::FORMAT_VERSION, 9).unwrap();
        store.save_params(params.as_bytes()).unwrap();
        assert!(matches!(
            open_index(store),
            Err(IndexError::FormatVersionMismatch { found: 9, .. })
        ));
    }

    #[test]
    fn test_legacy_block_size_units() {
        let mut store = MemStore::new();
        let mut params = base_params(VectorType::Float32, 2);
        create_index(&mut store, &KeyDescriptor::new(1).unwrap(), &mut params).unwrap();
        let mut params = IndexParams::from_bytes(&store.load_params().unwrap().unwrap()).unwrap();
        // 1 unit of 512 bytes.
        params.put_u64(param::BLOCK_SIZE, 1).unwrap();
        store.save_params(params.as_bytes()).unwrap();
        let index = open_index(store).unwrap();
        assert_eq!(index.format().block_size(), 512);
    }

    #[test]
    fn test_drop_index() {
        let mut store = MemStore::new();
        let mut params = base_params(VectorType::Float32, 2);
        create_index(&mut store, &KeyDescriptor::new(1).unwrap(), &mut params).unwrap();
        drop_index(&mut store).unwrap();
        assert!(matches!(open_index(store), Err(IndexError::NotFound)));
    }
}
