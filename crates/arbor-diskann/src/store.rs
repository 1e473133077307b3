//! The host-storage seam.
//!
//! The index never touches a database directly. Everything it needs from the
//! host is behind [`ShadowStore`]: a relation mapping an application key to a
//! rowid plus one fixed-size data block, a side slot for the serialized
//! parameter blob, and a way to pick a uniformly random row as the search
//! entry point.
//!
//! [`MemStore`] is the bundled in-memory implementation, used by the test
//! suite and by embedders that want an index without a database underneath.

use std::collections::BTreeMap;

use rand::Rng;

use crate::{IndexError, Result};

/// Maximum number of columns in an index key.
pub const MAX_KEY_COLUMNS: usize = 16;

/// One column of an index key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// A composite application key identifying one indexed row.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexKey(Vec<KeyValue>);

impl IndexKey {
    pub fn new(values: Vec<KeyValue>) -> Result<Self> {
        if values.is_empty() || values.len() > MAX_KEY_COLUMNS {
            return Err(IndexError::InvalidArgument(format!(
                "index key must have 1..={MAX_KEY_COLUMNS} columns, got {}",
                values.len()
            )));
        }
        Ok(Self(values))
    }

    /// Single-column integer key, the common case for rowid tables.
    pub fn from_rowid(id: i64) -> Self {
        Self(vec![KeyValue::Integer(id)])
    }

    pub fn values(&self) -> &[KeyValue] {
        &self.0
    }

    pub fn as_rowid(&self) -> Option<i64> {
        match self.0.as_slice() {
            [KeyValue::Integer(id)] => Some(*id),
            _ => None,
        }
    }
}

/// Shape of the key columns backing an index.
#[derive(Debug, Clone)]
pub struct KeyDescriptor {
    pub columns: usize,
}

impl KeyDescriptor {
    pub fn new(columns: usize) -> Result<Self> {
        if columns == 0 || columns > MAX_KEY_COLUMNS {
            return Err(IndexError::InvalidArgument(format!(
                "key must have 1..={MAX_KEY_COLUMNS} columns, got {columns}"
            )));
        }
        Ok(Self { columns })
    }
}

/// Host storage for one index.
///
/// Rowids are assigned by the store and never reused while a row is live.
/// Blocks are fixed-size and zero-filled on row creation.
pub trait ShadowStore {
    /// Creates the backing relation. Fails if it already exists.
    fn create_relation(&mut self, key: &KeyDescriptor) -> Result<()>;

    /// Drops the backing relation and the parameter blob.
    fn drop_relation(&mut self) -> Result<()>;

    /// Removes every row, keeping the relation and parameters.
    fn clear_relation(&mut self) -> Result<()>;

    /// Persists the serialized parameter blob.
    fn save_params(&mut self, blob: &[u8]) -> Result<()>;

    /// Loads the parameter blob, or `None` if no index was created here.
    fn load_params(&self) -> Result<Option<Vec<u8>>>;

    /// Inserts a row with a zero-filled block and returns its rowid. Fails
    /// with `InvalidArgument` if the key is already present.
    fn insert_row(&mut self, key: &IndexKey, block_size: usize) -> Result<u64>;

    fn delete_row(&mut self, rowid: u64) -> Result<()>;

    fn rowid_for_key(&self, key: &IndexKey) -> Result<Option<u64>>;

    fn key_for_rowid(&self, rowid: u64) -> Result<Option<IndexKey>>;

    fn has_row(&self, rowid: u64) -> Result<bool> {
        Ok(self.key_for_rowid(rowid)?.is_some())
    }

    /// A uniformly random live rowid, or `None` when the relation is empty.
    fn random_rowid(&mut self) -> Result<Option<u64>>;

    /// Fills `buf` from the row's block. Fails with `RowNotFound` for a
    /// missing row and `SizeMismatch` when the stored block is smaller than
    /// `buf`.
    fn read_block(&self, rowid: u64, buf: &mut [u8]) -> Result<()>;

    /// Overwrites the row's block with `data`.
    fn write_block(&mut self, rowid: u64, data: &[u8]) -> Result<()>;

    fn row_count(&self) -> Result<u64>;
}

#[derive(Debug)]
struct MemRow {
    key: IndexKey,
    block: Vec<u8>,
}

/// In-memory [`ShadowStore`].
#[derive(Debug, Default)]
pub struct MemStore {
    rows: BTreeMap<u64, MemRow>,
    params: Option<Vec<u8>>,
    created: bool,
    next_rowid: u64,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn row(&self, rowid: u64) -> Result<&MemRow> {
        self.rows.get(&rowid).ok_or(IndexError::RowNotFound(rowid))
    }
}

impl ShadowStore for MemStore {
    fn create_relation(&mut self, _key: &KeyDescriptor) -> Result<()> {
        if self.created {
            return Err(IndexError::InvalidArgument(
                "index relation already exists".into(),
            ));
        }
        self.created = true;
        self.next_rowid = 1;
        Ok(())
    }

    fn drop_relation(&mut self) -> Result<()> {
        self.rows.clear();
        self.params = None;
        self.created = false;
        Ok(())
    }

    fn clear_relation(&mut self) -> Result<()> {
        self.rows.clear();
        Ok(())
    }

    fn save_params(&mut self, blob: &[u8]) -> Result<()> {
        self.params = Some(blob.to_vec());
        Ok(())
    }

    fn load_params(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.params.clone())
    }

    fn insert_row(&mut self, key: &IndexKey, block_size: usize) -> Result<u64> {
        if self.rowid_for_key(key)?.is_some() {
            return Err(IndexError::InvalidArgument(
                "duplicate index key".into(),
            ));
        }
        let rowid = self.next_rowid;
        self.next_rowid += 1;
        self.rows.insert(
            rowid,
            MemRow {
                key: key.clone(),
                block: vec![0u8; block_size],
            },
        );
        Ok(rowid)
    }

    fn delete_row(&mut self, rowid: u64) -> Result<()> {
        self.rows
            .remove(&rowid)
            .map(|_| ())
            .ok_or(IndexError::RowNotFound(rowid))
    }

    fn rowid_for_key(&self, key: &IndexKey) -> Result<Option<u64>> {
        Ok(self
            .rows
            .iter()
            .find(|(_, row)| row.key == *key)
            .map(|(&rowid, _)| rowid))
    }

    fn key_for_rowid(&self, rowid: u64) -> Result<Option<IndexKey>> {
        Ok(self.rows.get(&rowid).map(|row| row.key.clone()))
    }

    fn random_rowid(&mut self) -> Result<Option<u64>> {
        if self.rows.is_empty() {
            return Ok(None);
        }
        let nth = rand::thread_rng().gen_range(0..self.rows.len());
        Ok(self.rows.keys().nth(nth).copied())
    }

    fn read_block(&self, rowid: u64, buf: &mut [u8]) -> Result<()> {
        let row = self.row(rowid)?;
        if row.block.len() < buf.len() {
            return Err(IndexError::SizeMismatch {
                expected: buf.len(),
                actual: row.block.len(),
            });
        }
        buf.copy_from_slice(&row.block[..buf.len()]);
        Ok(())
    }

    fn write_block(&mut self, rowid: u64, data: &[u8]) -> Result<()> {
        let row = self
            .rows
            .get_mut(&rowid)
            .ok_or(IndexError::RowNotFound(rowid))?;
        if row.block.len() < data.len() {
            return Err(IndexError::SizeMismatch {
                expected: data.len(),
                actual: row.block.len(),
            });
        }
        row.block[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn row_count(&self) -> Result<u64> {
        Ok(self.rows.len() as u64)
    }
}
