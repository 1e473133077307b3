//! Reusable one-row block buffers.
//!
//! A `BlobSpot` owns a buffer sized to the index block size and can be
//! repointed from row to row, so a whole search reuses one allocation (plus
//! one per node held for the insert write-back pass). A failed reload leaves
//! the spot aborted; the next reload resets it, mirroring a closed-and-
//! reopened incremental blob handle.

use crate::store::ShadowStore;
use crate::Result;

/// A block buffer bound to one row at a time.
#[derive(Debug)]
pub struct BlobSpot {
    rowid: u64,
    buf: Vec<u8>,
    writable: bool,
    initialized: bool,
    aborted: bool,
}

impl BlobSpot {
    /// Binds a new spot to `rowid` without reading it.
    ///
    /// The buffer starts zeroed and uninitialized; callers either `reload` to
    /// see the stored block or initialize it in place for a fresh row. Fails
    /// with `RowNotFound` if the row does not exist.
    pub fn create<S: ShadowStore>(
        store: &S,
        rowid: u64,
        buf_size: usize,
        writable: bool,
    ) -> Result<Self> {
        if !store.has_row(rowid)? {
            return Err(crate::IndexError::RowNotFound(rowid));
        }
        Ok(Self {
            rowid,
            buf: vec![0u8; buf_size],
            writable,
            initialized: false,
            aborted: false,
        })
    }

    pub fn rowid(&self) -> u64 {
        self.rowid
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    pub fn buffer_mut(&mut self) -> &mut [u8] {
        debug_assert!(self.writable);
        // Writing into the buffer makes its content authoritative.
        self.initialized = true;
        &mut self.buf
    }

    /// Points the spot at `rowid` and fills the buffer from the store.
    ///
    /// Reloading the row the spot already holds is a no-op. On a failed read
    /// the spot is marked aborted and stays safe to reload again.
    pub fn reload<S: ShadowStore>(&mut self, store: &S, rowid: u64) -> Result<()> {
        if self.rowid == rowid && self.initialized && !self.aborted {
            return Ok(());
        }
        self.rowid = rowid;
        self.initialized = false;
        self.aborted = false;
        match store.read_block(rowid, &mut self.buf) {
            Ok(()) => {
                self.initialized = true;
                Ok(())
            }
            Err(err) => {
                self.aborted = true;
                Err(err)
            }
        }
    }

    /// Writes the whole buffer back to the spot's row.
    pub fn flush<S: ShadowStore>(&mut self, store: &mut S) -> Result<()> {
        debug_assert!(self.writable && !self.aborted);
        match store.write_block(self.rowid, &self.buf) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.aborted = true;
                Err(err)
            }
        }
    }
}
