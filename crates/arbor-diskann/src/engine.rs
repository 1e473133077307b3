//! Graph search, insert and delete.
//!
//! Search is greedy best-first over the disk graph: a distance-sorted
//! candidate list capped at L entries, seeded from a random row, repeatedly
//! visiting the closest unvisited candidate and ranking its out-edges by the
//! vector copies stored inline in the block. Every visited node lands in a
//! visited pool; inserts run the same traversal in writable mode so the pool
//! keeps each node's block for the reciprocal-edge write-back.
//!
//! Deleted rows are never rewired. A forward edge pointing at a removed row
//! is a zombie: search drops the candidate when the block read comes back
//! `RowNotFound` and moves on.

use tracing::{debug, trace};

use arbor_vector::{distance, DistanceMetric, Vector};

use crate::blobspot::BlobSpot;
use crate::node::NodeFormat;
use crate::store::{IndexKey, ShadowStore};
use crate::{IndexError, Result};

/// One search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub rowid: u64,
    pub key: IndexKey,
    pub distance: f64,
}

struct Candidate {
    rowid: u64,
    /// Distance to the query in the edge-vector domain (exact for the entry
    /// point).
    distance: f64,
    visited: bool,
    /// Pre-loaded block, only for the entry point.
    spot: Option<BlobSpot>,
}

struct VisitedNode {
    rowid: u64,
    /// Exact distance to the query, in the node-vector domain.
    distance: f64,
    vector: Vector,
    /// Held in writable traversals for the insert write-back pass.
    spot: Option<BlobSpot>,
}

/// Traversal state for one search or insert.
struct SearchCtx {
    query: Vector,
    /// Query converted to the edge encoding; `None` when edges are not
    /// compressed.
    edge_query: Option<Vector>,
    candidates: Vec<Candidate>,
    visited: Vec<VisitedNode>,
    limit: usize,
    writable: bool,
}

impl SearchCtx {
    fn new(query: Vector, format: &NodeFormat, limit: usize, writable: bool) -> Self {
        let edge_query = (format.edge_type() != format.node_type())
            .then(|| query.convert_to(format.edge_type()));
        Self {
            query,
            edge_query,
            candidates: Vec::new(),
            visited: Vec::new(),
            limit,
            writable,
        }
    }

    fn edge_query(&self) -> &Vector {
        self.edge_query.as_ref().unwrap_or(&self.query)
    }

    fn seen(&self, rowid: u64) -> bool {
        self.candidates.iter().any(|c| c.rowid == rowid)
            || self.visited.iter().any(|v| v.rowid == rowid)
    }

    /// Inserts a candidate keeping the list sorted and capped at `limit`.
    fn push_candidate(&mut self, candidate: Candidate) {
        let slot = self
            .candidates
            .iter()
            .position(|c| candidate.distance < c.distance)
            .unwrap_or(self.candidates.len());
        if self.candidates.len() == self.limit {
            if slot == self.candidates.len() {
                return;
            }
            self.candidates.pop();
        }
        self.candidates.insert(slot, candidate);
    }

    fn next_unvisited(&self) -> Option<usize> {
        self.candidates.iter().position(|c| !c.visited)
    }
}

/// An open disk graph index.
pub struct DiskAnnIndex<S: ShadowStore> {
    store: S,
    format: NodeFormat,
    metric: DistanceMetric,
    pruning_alpha: f64,
    insert_l: usize,
    search_l: usize,
    reads: u64,
    writes: u64,
}

impl<S: ShadowStore> DiskAnnIndex<S> {
    pub(crate) fn new(
        store: S,
        format: NodeFormat,
        metric: DistanceMetric,
        pruning_alpha: f64,
        insert_l: usize,
        search_l: usize,
    ) -> Self {
        Self {
            store,
            format,
            metric,
            pruning_alpha,
            insert_l,
            search_l,
            reads: 0,
            writes: 0,
        }
    }

    pub fn format(&self) -> &NodeFormat {
        &self.format
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Node blocks read since the index was opened.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Node blocks written since the index was opened.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn row_count(&self) -> Result<u64> {
        self.store.row_count()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn check_vector(&self, vector: &Vector) -> Result<()> {
        if vector.vector_type() != self.format.node_type() {
            return Err(IndexError::InvalidArgument(format!(
                "vector type mismatch: index stores {:?}, got {:?}",
                self.format.node_type(),
                vector.vector_type()
            )));
        }
        if vector.dims() != self.format.dims() {
            return Err(IndexError::InvalidArgument(format!(
                "dimension mismatch: index stores {}, got {}",
                self.format.dims(),
                vector.dims()
            )));
        }
        Ok(())
    }

    /// Greedy traversal from `start`. Fills the context's candidate list and
    /// visited pool.
    fn search_graph(&mut self, ctx: &mut SearchCtx, start: u64) -> Result<()> {
        let block_size = self.format.block_size();

        let mut entry = BlobSpot::create(&self.store, start, block_size, ctx.writable)?;
        entry.reload(&self.store, start)?;
        self.reads += 1;
        let entry_vector = self.format.vector(entry.buffer());
        let entry_distance = distance(&ctx.query, &entry_vector, self.metric)?;
        ctx.push_candidate(Candidate {
            rowid: start,
            distance: entry_distance,
            visited: false,
            spot: Some(entry),
        });

        // One reusable buffer serves every read-only block load.
        let mut reusable: Option<BlobSpot> = None;

        while let Some(i) = ctx.next_unvisited() {
            let rowid = ctx.candidates[i].rowid;
            let approx = ctx.candidates[i].distance;
            let preloaded = ctx.candidates[i].spot.take();

            let spot = match preloaded {
                Some(spot) => Some(spot),
                None => {
                    let created = match (ctx.writable, reusable.take()) {
                        (false, Some(spot)) => Ok(spot),
                        _ => BlobSpot::create(&self.store, rowid, block_size, ctx.writable),
                    };
                    match created {
                        Ok(mut spot) => match spot.reload(&self.store, rowid) {
                            Ok(()) => {
                                self.reads += 1;
                                Some(spot)
                            }
                            Err(IndexError::RowNotFound(_)) => {
                                if !ctx.writable {
                                    reusable = Some(spot);
                                }
                                None
                            }
                            Err(err) => return Err(err),
                        },
                        Err(IndexError::RowNotFound(_)) => None,
                        Err(err) => return Err(err),
                    }
                }
            };
            let Some(spot) = spot else {
                // Zombie edge: the row is gone, drop the candidate.
                trace!(rowid, "dropping candidate for deleted row");
                ctx.candidates.remove(i);
                continue;
            };

            let node_vector = self.format.vector(spot.buffer());
            let exact = if ctx.edge_query.is_some() {
                // The candidate distance came from a compressed edge copy;
                // recompute against the full-precision node vector.
                distance(&ctx.query, &node_vector, self.metric)?
            } else {
                approx
            };

            let mut discovered = Vec::new();
            let block = spot.buffer();
            for slot in 0..self.format.edge_count(block) {
                let edge_rowid = self.format.edge_rowid(block, slot);
                if ctx.seen(edge_rowid) {
                    continue;
                }
                let edge_vector = self.format.edge_vector(block, slot);
                let d = distance(ctx.edge_query(), &edge_vector, self.metric)?;
                discovered.push((edge_rowid, d));
            }

            ctx.candidates[i].visited = true;
            let spot = if ctx.writable {
                Some(spot)
            } else {
                reusable = Some(spot);
                None
            };
            ctx.visited.push(VisitedNode {
                rowid,
                distance: exact,
                vector: node_vector,
                spot,
            });

            for (edge_rowid, d) in discovered {
                ctx.push_candidate(Candidate {
                    rowid: edge_rowid,
                    distance: d,
                    visited: false,
                    spot: None,
                });
            }
        }
        Ok(())
    }

    /// Returns up to `k` nearest rows, closest first.
    ///
    /// The traversal visits at most `search_l` candidates, so asking for more
    /// than that truncates the result rather than erroring; callers needing
    /// `k` rows should configure `search_l >= k`.
    pub fn search(&mut self, query: &Vector, k: usize) -> Result<Vec<SearchResult>> {
        self.check_vector(query)?;
        let Some(start) = self.store.random_rowid()? else {
            return Ok(Vec::new());
        };
        let mut ctx = SearchCtx::new(query.clone(), &self.format, self.search_l, false);
        self.search_graph(&mut ctx, start)?;

        ctx.visited
            .sort_by(|a, b| a.distance.total_cmp(&b.distance));
        let mut results = Vec::with_capacity(k.min(ctx.visited.len()));
        for node in ctx.visited.iter().take(k) {
            let key = self
                .store
                .key_for_rowid(node.rowid)?
                .ok_or(IndexError::RowNotFound(node.rowid))?;
            results.push(SearchResult {
                rowid: node.rowid,
                key,
                distance: node.distance,
            });
        }
        debug!(
            k,
            found = results.len(),
            visited = ctx.visited.len(),
            "search finished"
        );
        Ok(results)
    }

    /// Inserts a new row and wires it into the graph.
    pub fn insert(&mut self, key: &IndexKey, vector: &Vector) -> Result<()> {
        self.check_vector(vector)?;
        if self.store.rowid_for_key(key)?.is_some() {
            return Err(IndexError::InvalidArgument("duplicate index key".into()));
        }

        // Traverse before creating the row so the new node can never become
        // its own entry point or neighbor.
        let entry = self.store.random_rowid()?;
        let mut ctx = SearchCtx::new(vector.clone(), &self.format, self.insert_l, true);
        if let Some(start) = entry {
            self.search_graph(&mut ctx, start)?;
        }

        let rowid = self.store.insert_row(key, self.format.block_size())?;
        let mut node_spot =
            BlobSpot::create(&self.store, rowid, self.format.block_size(), true)?;
        self.format.init(node_spot.buffer_mut(), rowid, vector);

        let edge_type = self.format.edge_type();
        let compressed = ctx.edge_query.is_some();

        // Offer closest nodes first: a near edge accepted early rejects the
        // far nodes it covers, instead of the reverse.
        ctx.visited
            .sort_by(|a, b| a.distance.total_cmp(&b.distance));

        // First pass: offer every visited node, ascending by exact distance,
        // as an out-edge of the new node.
        let mut edges = 0;
        for node in &ctx.visited {
            let repr = if compressed {
                node.vector.convert_to(edge_type)
            } else {
                node.vector.clone()
            };
            if self.try_add_edge(node_spot.buffer_mut(), node.rowid, &repr)? {
                edges += 1;
            }
        }

        // Second pass: offer the new node as an edge of every visited node,
        // flushing the ones that take it.
        let new_repr = if compressed {
            vector.convert_to(edge_type)
        } else {
            vector.clone()
        };
        for node in &mut ctx.visited {
            let spot = node
                .spot
                .as_mut()
                .expect("writable traversal holds every visited block");
            if self.try_add_edge(spot.buffer_mut(), rowid, &new_repr)? {
                spot.flush(&mut self.store)?;
                self.writes += 1;
            }
        }

        node_spot.flush(&mut self.store)?;
        self.writes += 1;
        debug!(rowid, edges, visited = ctx.visited.len(), "inserted node");
        Ok(())
    }

    /// Offers an edge towards `cand_rowid` to the node stored in `block`.
    ///
    /// The candidate is rejected when an existing edge already covers it
    /// (`d(node, cand) > alpha * d(edge, cand)`) or when the list is full and
    /// every edge is closer. When it is accepted, any existing edge the new
    /// one covers is dropped in turn, so the list keeps only diverse
    /// neighbors. An existing edge to the same rowid (a zombie left by a
    /// delete) is replaced unconditionally.
    ///
    /// Returns whether the block changed.
    fn try_add_edge(&self, block: &mut [u8], cand_rowid: u64, cand_repr: &Vector) -> Result<bool> {
        let fmt = &self.format;
        let owner_repr = if fmt.edge_type() != fmt.node_type() {
            fmt.vector(block).convert_to(fmt.edge_type())
        } else {
            fmt.vector(block)
        };
        let node_to_cand = distance(&owner_repr, cand_repr, self.metric)? as f32;

        match fmt.find_edge(block, cand_rowid) {
            Some(slot) => fmt.delete_edge(block, slot),
            None => {
                let count = fmt.edge_count(block);
                for slot in 0..count {
                    let edge_vector = fmt.edge_vector(block, slot);
                    let edge_to_cand = distance(&edge_vector, cand_repr, self.metric)?;
                    if f64::from(node_to_cand) > self.pruning_alpha * edge_to_cand {
                        return Ok(false);
                    }
                }
                // Full list: only a strictly farther edge may be evicted,
                // and the sort order keeps it last.
                if count == fmt.max_edges()
                    && node_to_cand >= fmt.edge_distance(block, count - 1)
                {
                    return Ok(false);
                }
            }
        }

        let slot = fmt.edge_insert_slot(block, node_to_cand);
        fmt.insert_edge(block, slot, cand_rowid, node_to_cand, cand_repr);

        // The new edge may in turn cover existing ones; drop those.
        let mut i = 0;
        while i < fmt.edge_count(block) {
            if fmt.edge_rowid(block, i) == cand_rowid {
                i += 1;
                continue;
            }
            let node_to_edge = fmt.edge_distance(block, i);
            let edge_vector = fmt.edge_vector(block, i);
            let cand_to_edge = distance(cand_repr, &edge_vector, self.metric)?;
            if f64::from(node_to_edge) > self.pruning_alpha * cand_to_edge {
                fmt.delete_edge(block, i);
            } else {
                i += 1;
            }
        }
        Ok(true)
    }

    /// Removes a row and the back-edges its neighbors hold to it. Forward
    /// edges elsewhere are left as zombies for search to skip.
    ///
    /// Returns `false` when the key was not in the index.
    pub fn delete(&mut self, key: &IndexKey) -> Result<bool> {
        let Some(rowid) = self.store.rowid_for_key(key)? else {
            return Ok(false);
        };
        let block_size = self.format.block_size();

        let mut node = BlobSpot::create(&self.store, rowid, block_size, false)?;
        node.reload(&self.store, rowid)?;
        self.reads += 1;

        let mut neighbor = BlobSpot::create(&self.store, rowid, block_size, true)?;
        for slot in 0..self.format.edge_count(node.buffer()) {
            let edge_rowid = self.format.edge_rowid(node.buffer(), slot);
            match neighbor.reload(&self.store, edge_rowid) {
                Ok(()) => self.reads += 1,
                Err(IndexError::RowNotFound(_)) => continue,
                Err(err) => return Err(err),
            }
            if let Some(back) = self.format.find_edge(neighbor.buffer(), rowid) {
                self.format.delete_edge(neighbor.buffer_mut(), back);
                neighbor.flush(&mut self.store)?;
                self.writes += 1;
            }
        }

        self.store.delete_row(rowid)?;
        debug!(rowid, "deleted node");
        Ok(true)
    }

    /// Removes every row, keeping the index definition.
    pub fn clear(&mut self) -> Result<()> {
        self.store.clear_relation()
    }
}
