//! Node block layout.
//!
//! Every indexed row owns one fixed-size block:
//!
//! ```text
//! +--------+-------------+--------------------------+------------------------+
//! | header | node vector | edge vectors (max slots) | edge metadata (16B ea) |
//! +--------+-------------+--------------------------+------------------------+
//! ```
//!
//! The format 3 header is 16 bytes: rowid (u64 le), edge count (u16 le), 6
//! bytes reserved. Format 2 blocks use the older 10-byte header with no
//! padding. Each edge metadata entry is 4 reserved bytes, the stored distance
//! (f32 le) and the neighbor rowid (u64 le); entry `i` pairs with edge vector
//! slot `i`. Edges are kept sorted by ascending stored distance.
//!
//! All operations here work on a raw block buffer; callers hand in
//! `BlobSpot` buffers. Slot bounds are caller bugs and panic.

use arbor_vector::blob::{read_data, write_data};
use arbor_vector::{Vector, VectorType};

const EDGE_META_SIZE: usize = 16;

/// Geometry of a node block, fixed per index.
#[derive(Debug, Clone, Copy)]
pub struct NodeFormat {
    format_version: u64,
    node_type: VectorType,
    edge_type: VectorType,
    dims: usize,
    block_size: usize,
}

impl NodeFormat {
    pub fn new(
        format_version: u64,
        node_type: VectorType,
        edge_type: VectorType,
        dims: usize,
        block_size: usize,
    ) -> Self {
        Self {
            format_version,
            node_type,
            edge_type,
            dims,
            block_size,
        }
    }

    pub fn node_type(&self) -> VectorType {
        self.node_type
    }

    pub fn edge_type(&self) -> VectorType {
        self.edge_type
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn header_size(&self) -> usize {
        if self.format_version <= 2 {
            10
        } else {
            16
        }
    }

    fn node_vector_size(&self) -> usize {
        self.node_type.data_size(self.dims)
    }

    fn edge_vector_size(&self) -> usize {
        self.edge_type.data_size(self.dims)
    }

    /// How many edges fit in one block.
    pub fn max_edges(&self) -> usize {
        (self.block_size - self.header_size() - self.node_vector_size())
            / (self.edge_vector_size() + EDGE_META_SIZE)
    }

    fn edge_vector_offset(&self, slot: usize) -> usize {
        self.header_size() + self.node_vector_size() + slot * self.edge_vector_size()
    }

    fn edge_meta_offset(&self, slot: usize) -> usize {
        self.header_size()
            + self.node_vector_size()
            + self.max_edges() * self.edge_vector_size()
            + slot * EDGE_META_SIZE
    }

    /// Initializes a zeroed block for a fresh row with no edges.
    pub fn init(&self, block: &mut [u8], rowid: u64, vector: &Vector) {
        debug_assert_eq!(block.len(), self.block_size);
        debug_assert_eq!(vector.vector_type(), self.node_type);
        debug_assert_eq!(vector.dims(), self.dims);
        block.fill(0);
        block[0..8].copy_from_slice(&rowid.to_le_bytes());
        let off = self.header_size();
        write_data(vector, &mut block[off..off + self.node_vector_size()]);
    }

    pub fn rowid(&self, block: &[u8]) -> u64 {
        u64::from_le_bytes(block[0..8].try_into().unwrap())
    }

    pub fn vector(&self, block: &[u8]) -> Vector {
        let off = self.header_size();
        read_data(self.node_type, self.dims, &block[off..off + self.node_vector_size()])
    }

    pub fn edge_count(&self, block: &[u8]) -> usize {
        u16::from_le_bytes(block[8..10].try_into().unwrap()) as usize
    }

    fn set_edge_count(&self, block: &mut [u8], count: usize) {
        debug_assert!(count <= self.max_edges());
        block[8..10].copy_from_slice(&(count as u16).to_le_bytes());
    }

    pub fn edge_rowid(&self, block: &[u8], slot: usize) -> u64 {
        assert!(slot < self.edge_count(block));
        let off = self.edge_meta_offset(slot) + 8;
        u64::from_le_bytes(block[off..off + 8].try_into().unwrap())
    }

    pub fn edge_distance(&self, block: &[u8], slot: usize) -> f32 {
        assert!(slot < self.edge_count(block));
        let off = self.edge_meta_offset(slot) + 4;
        f32::from_le_bytes(block[off..off + 4].try_into().unwrap())
    }

    pub fn edge_vector(&self, block: &[u8], slot: usize) -> Vector {
        assert!(slot < self.edge_count(block));
        let off = self.edge_vector_offset(slot);
        read_data(self.edge_type, self.dims, &block[off..off + self.edge_vector_size()])
    }

    /// Finds the slot holding an edge to `rowid`.
    pub fn find_edge(&self, block: &[u8], rowid: u64) -> Option<usize> {
        (0..self.edge_count(block)).find(|&slot| self.edge_rowid(block, slot) == rowid)
    }

    /// Slot at which an edge with `distance` belongs, keeping the list sorted.
    pub fn edge_insert_slot(&self, block: &[u8], distance: f32) -> usize {
        (0..self.edge_count(block))
            .find(|&slot| distance < self.edge_distance(block, slot))
            .unwrap_or_else(|| self.edge_count(block))
    }

    /// Inserts an edge at `slot`, shifting later edges right. When the list
    /// is full the farthest edge falls off the end.
    ///
    /// Panics if `slot` is past the current tail or outside the block.
    pub fn insert_edge(&self, block: &mut [u8], slot: usize, rowid: u64, distance: f32, vector: &Vector) {
        let count = self.edge_count(block);
        let max = self.max_edges();
        assert!(slot <= count && slot < max);
        debug_assert_eq!(vector.vector_type(), self.edge_type);

        let new_count = (count + 1).min(max);
        let last = new_count - 1;
        if last > slot {
            let vec_size = self.edge_vector_size();
            let src = self.edge_vector_offset(slot);
            block.copy_within(src..src + (last - slot) * vec_size, src + vec_size);
            let src = self.edge_meta_offset(slot);
            block.copy_within(
                src..src + (last - slot) * EDGE_META_SIZE,
                src + EDGE_META_SIZE,
            );
        }

        let off = self.edge_vector_offset(slot);
        write_data(vector, &mut block[off..off + self.edge_vector_size()]);
        let off = self.edge_meta_offset(slot);
        block[off..off + 4].fill(0);
        block[off + 4..off + 8].copy_from_slice(&distance.to_le_bytes());
        block[off + 8..off + 16].copy_from_slice(&rowid.to_le_bytes());
        self.set_edge_count(block, new_count);
    }

    /// Removes the edge at `slot`, shifting later edges left.
    pub fn delete_edge(&self, block: &mut [u8], slot: usize) {
        let count = self.edge_count(block);
        assert!(slot < count);
        if slot + 1 < count {
            let vec_size = self.edge_vector_size();
            let src = self.edge_vector_offset(slot + 1);
            block.copy_within(src..src + (count - slot - 1) * vec_size, src - vec_size);
            let src = self.edge_meta_offset(slot + 1);
            block.copy_within(
                src..src + (count - slot - 1) * EDGE_META_SIZE,
                src - EDGE_META_SIZE,
            );
        }
        self.set_edge_count(block, count - 1);
    }

    /// Truncates the edge list to its first `keep` edges.
    pub fn prune_edges(&self, block: &mut [u8], keep: usize) {
        assert!(keep <= self.edge_count(block));
        self.set_edge_count(block, keep);
    }
}
