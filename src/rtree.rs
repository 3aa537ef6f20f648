//! ## R-tree / R*-tree engine
//!
//! The tree never holds a node by in-memory pointer across operations: every
//! algorithm below borrows a [`Node`] from a [`PageStore`] for the span of a single
//! recursive call and writes it straight back. This is the "node identity vs.
//! ownership" boundary the rest of the crate is built against, so a disk-backed
//! store drops in without touching this module.
//!
//! `RTree` supports three split policies through [`TreeVariant`]: `Linear` and
//! `Quadratic` share a greedy min-enlargement distribution, seeded differently;
//! `RStar` additionally runs axis/overlap-minimizing splits and forced
//! reinsertion on first overflow per level.

use crate::exceptions::IrTreeError;
use crate::geometry::{Point, Region};
use crate::node::{Entry, Node, NodeCodec};
use crate::storage::{NodeBytes, PageId, PageStore};
use ordered_float::OrderedFloat;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// An object that can be stored in an [`RTree`]: it carries its own identity and
/// minimum bounding region.
pub trait SpatialObject: Clone + std::fmt::Debug {
    /// Stable identifier, used only for diagnostics; equality for deletion is by
    /// `PartialEq` on the whole payload, not this id.
    fn id(&self) -> u64;
    /// The object's minimum bounding region.
    fn mbr(&self) -> Region;
}

/// Split policy for overflowing nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TreeVariant {
    Linear,
    Quadratic,
    RStar,
}

/// Tree configuration, validated once at construction.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Properties {
    pub variant: TreeVariant,
    /// Minimum fill ratio for non-root nodes, in `(0, 1)`.
    pub fill_factor: f64,
    /// Max entries per index node, `>= 3`.
    pub index_capacity: usize,
    /// Max entries per leaf node, `>= 3`.
    pub leaf_capacity: usize,
    /// R*-tree `p`: candidate count considered during overlap-minimizing choose_subtree.
    pub near_minimum_overlap_factor: usize,
    /// R*-tree `m`: fraction of capacity defining the smallest split distribution.
    pub split_distribution_factor: f64,
    /// Fraction of a node's entries reinserted on first overflow under R*.
    pub reinsert_factor: f64,
    /// Spatial dimension, `>= 2`.
    pub dimension: usize,
    /// When present, `RTree::open` reloads the tree from this header page instead
    /// of creating an empty one.
    pub index_identifier: Option<PageId>,
}

impl Default for Properties {
    fn default() -> Self {
        Properties {
            variant: TreeVariant::Quadratic,
            fill_factor: 0.4,
            index_capacity: 50,
            leaf_capacity: 50,
            near_minimum_overlap_factor: 32,
            split_distribution_factor: 0.4,
            reinsert_factor: 0.3,
            dimension: 2,
            index_identifier: None,
        }
    }
}

impl Properties {
    /// Validates the configuration, per the constraints in §4.C.
    pub fn validate(&self) -> Result<(), IrTreeError> {
        if self.dimension < 2 {
            return Err(IrTreeError::Configuration {
                reason: "dimension must be at least 2".into(),
            });
        }
        if self.leaf_capacity < 3 {
            return Err(IrTreeError::Configuration {
                reason: "leaf_capacity must be at least 3".into(),
            });
        }
        if self.index_capacity < 3 {
            return Err(IrTreeError::Configuration {
                reason: "index_capacity must be at least 3".into(),
            });
        }
        if self.fill_factor <= 0.0 || self.fill_factor >= 1.0 {
            return Err(IrTreeError::Configuration {
                reason: "fill_factor must be in (0, 1)".into(),
            });
        }
        if self.split_distribution_factor <= 0.0 || self.split_distribution_factor >= 1.0 {
            return Err(IrTreeError::Configuration {
                reason: "split_distribution_factor must be in (0, 1)".into(),
            });
        }
        if self.reinsert_factor <= 0.0 || self.reinsert_factor >= 1.0 {
            return Err(IrTreeError::Configuration {
                reason: "reinsert_factor must be in (0, 1)".into(),
            });
        }
        let max_overlap = self.leaf_capacity.min(self.index_capacity);
        if self.near_minimum_overlap_factor < 1 || self.near_minimum_overlap_factor > max_overlap {
            return Err(IrTreeError::Configuration {
                reason: format!("near_minimum_overlap_factor must be between 1 and {max_overlap}"),
            });
        }
        Ok(())
    }
}

/// Snapshot of tree-wide counters, recomputed on demand by [`RTree::stats`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub nodes_in_level: Vec<u64>,
    pub reads: u64,
    pub writes: u64,
    pub data: u64,
    pub height: u32,
    pub query_results: u64,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Header {
    root_id: PageId,
    dimension: usize,
    leaf_capacity: usize,
    index_capacity: usize,
    fill_factor: f64,
    height: u32,
    data: u64,
}

#[derive(Debug)]
struct TreeState {
    root_id: PageId,
    header_id: PageId,
    height: u32,
    data: u64,
}

/// The result of inserting into a single node: either it absorbed the entry (and
/// possibly shrank via forced reinsertion), or it split in two.
enum InsertOutcome<T> {
    Done(Region),
    Split {
        left_mbr: Region,
        sibling_id: PageId,
        sibling_mbr: Region,
    },
}

/// The result of deleting from a single node.
enum DeleteOutcome {
    NotFound,
    Deleted { new_mbr: Region },
    /// The node underflowed and was detached; its surviving entries are queued
    /// for reinsertion by the caller.
    Underflow,
}

/// Encodes a `Header` to the page store's opaque byte form. Mirrors
/// `Node::store`'s feature gate: without `serde` there is no codec to go
/// through, so this surfaces as a configuration error rather than a missing
/// symbol.
#[cfg(feature = "serde")]
fn encode_header(header: &Header) -> Result<NodeBytes, IrTreeError> {
    bincode::serialize(header).map_err(|e| IrTreeError::Storage {
        reason: format!("header serialization failed: {e}"),
    })
}

#[cfg(not(feature = "serde"))]
fn encode_header(_header: &Header) -> Result<NodeBytes, IrTreeError> {
    Err(IrTreeError::Configuration {
        reason: "header serialization requires the `serde` feature".into(),
    })
}

#[cfg(feature = "serde")]
fn decode_header(bytes: &[u8]) -> Result<Header, IrTreeError> {
    bincode::deserialize(bytes).map_err(|e| IrTreeError::Storage {
        reason: format!("header deserialization failed: {e}"),
    })
}

#[cfg(not(feature = "serde"))]
fn decode_header(_bytes: &[u8]) -> Result<Header, IrTreeError> {
    Err(IrTreeError::Configuration {
        reason: "header deserialization requires the `serde` feature".into(),
    })
}

type Hooks<F> = RwLock<Vec<Box<F>>>;

/// An R-tree / R*-tree indexing [`SpatialObject`]s over a [`PageStore`].
///
/// Cloning is never implicit: use [`RTree::share`] to obtain a handle backed by
/// the same store and mutable state (cheap, `Arc`-based), which is the crate's
/// answer to spec.md's Design Notes question about node identity vs. ownership
/// under concurrent access.
#[derive(Debug)]
pub struct RTree<T, S = crate::storage::MemoryPageStore>
where
    T: SpatialObject,
    S: PageStore,
{
    store: Arc<S>,
    state: Arc<RwLock<TreeState>>,
    properties: Properties,
    reads: Arc<AtomicU64>,
    writes: Arc<AtomicU64>,
    query_results: Arc<AtomicU64>,
    write_node_commands: Arc<Hooks<dyn Fn(PageId, &Node<T>) + Send + Sync>>,
    read_node_commands: Arc<Hooks<dyn Fn(PageId, &Node<T>) + Send + Sync>>,
    delete_node_commands: Arc<Hooks<dyn Fn(PageId) + Send + Sync>>,
}

impl<T, S> RTree<T, S>
where
    T: SpatialObject + NodeCodec,
    S: PageStore,
{
    /// Creates a fresh, empty tree backed by `store`.
    pub fn new(properties: Properties, store: S) -> Result<Self, IrTreeError> {
        properties.validate()?;
        info!(
            variant = ?properties.variant,
            dimension = properties.dimension,
            "creating new R-tree"
        );
        let store = Arc::new(store);
        let mut root: Node<T> = Node::new_leaf(PageId::NEW, properties.dimension);
        let root_bytes = root.store()?;
        let root_id = store.store_node(PageId::NEW, root_bytes)?;
        root.identifier = root_id;

        let tree = RTree {
            store,
            state: Arc::new(RwLock::new(TreeState {
                root_id,
                header_id: PageId::NEW,
                height: 0,
                data: 0,
            })),
            properties,
            reads: Arc::new(AtomicU64::new(0)),
            writes: Arc::new(AtomicU64::new(1)),
            query_results: Arc::new(AtomicU64::new(0)),
            write_node_commands: Arc::new(RwLock::new(Vec::new())),
            read_node_commands: Arc::new(RwLock::new(Vec::new())),
            delete_node_commands: Arc::new(RwLock::new(Vec::new())),
        };
        {
            let mut state = tree.state.write().expect("tree state lock poisoned");
            tree.persist_header(&mut state)?;
        }
        Ok(tree)
    }

    /// Reopens a tree previously persisted at `properties.index_identifier`.
    /// Immutable properties (`dimension`, `fill_factor`, `leaf_capacity`,
    /// `index_capacity`) are read back from the header; mutable ones (`variant`
    /// and the R* factors) keep whatever `properties` supplies.
    pub fn open(properties: Properties, store: S) -> Result<Self, IrTreeError> {
        let header_id = properties.index_identifier.ok_or_else(|| IrTreeError::Configuration {
            reason: "open requires Properties::index_identifier".into(),
        })?;
        let bytes = store.load_header(header_id)?;
        let header: Header = decode_header(&bytes)?;
        info!(root = header.root_id.0, height = header.height, "reopening R-tree from header");
        let mut merged = properties;
        merged.dimension = header.dimension;
        merged.fill_factor = header.fill_factor;
        merged.leaf_capacity = header.leaf_capacity;
        merged.index_capacity = header.index_capacity;
        merged.validate()?;

        Ok(RTree {
            store: Arc::new(store),
            state: Arc::new(RwLock::new(TreeState {
                root_id: header.root_id,
                header_id,
                height: header.height,
                data: header.data,
            })),
            properties: merged,
            reads: Arc::new(AtomicU64::new(0)),
            writes: Arc::new(AtomicU64::new(0)),
            query_results: Arc::new(AtomicU64::new(0)),
            write_node_commands: Arc::new(RwLock::new(Vec::new())),
            read_node_commands: Arc::new(RwLock::new(Vec::new())),
            delete_node_commands: Arc::new(RwLock::new(Vec::new())),
        })
    }

    /// Returns a handle sharing this tree's store, lock and counters. Distinct
    /// from `Clone` (not implemented): every shared handle observes the same
    /// mutations and the same `stats()`.
    pub fn share(&self) -> Self {
        RTree {
            store: Arc::clone(&self.store),
            state: Arc::clone(&self.state),
            properties: self.properties.clone(),
            reads: Arc::clone(&self.reads),
            writes: Arc::clone(&self.writes),
            query_results: Arc::clone(&self.query_results),
            write_node_commands: Arc::clone(&self.write_node_commands),
            read_node_commands: Arc::clone(&self.read_node_commands),
            delete_node_commands: Arc::clone(&self.delete_node_commands),
        }
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// The page identifier of the current root, for collaborators (e.g. `lkt`)
    /// that need to drive their own traversal over the same store.
    pub fn root_id(&self) -> PageId {
        self.state.read().expect("tree state lock poisoned").root_id
    }

    /// The store this tree reads and writes through.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a hook invoked after every successful `store_node`.
    pub fn add_write_node_command(&self, command: impl Fn(PageId, &Node<T>) + Send + Sync + 'static) {
        self.write_node_commands
            .write()
            .expect("hook lock poisoned")
            .push(Box::new(command));
    }

    /// Registers a hook invoked after every successful `load_node`.
    pub fn add_read_node_command(&self, command: impl Fn(PageId, &Node<T>) + Send + Sync + 'static) {
        self.read_node_commands
            .write()
            .expect("hook lock poisoned")
            .push(Box::new(command));
    }

    /// Registers a hook invoked after every successful `delete_node`.
    pub fn add_delete_node_command(&self, command: impl Fn(PageId) + Send + Sync + 'static) {
        self.delete_node_commands
            .write()
            .expect("hook lock poisoned")
            .push(Box::new(command));
    }

    fn read_node(&self, id: PageId) -> Result<Node<T>, IrTreeError> {
        let bytes = self.store.load_node(id)?;
        let node = Node::load(&bytes)?;
        self.reads.fetch_add(1, AtomicOrdering::Relaxed);
        for hook in self.read_node_commands.read().expect("hook lock poisoned").iter() {
            hook(id, &node);
        }
        Ok(node)
    }

    fn write_node(&self, node: &mut Node<T>) -> Result<(), IrTreeError> {
        let bytes = node.store()?;
        let id = self.store.store_node(node.identifier, bytes)?;
        node.identifier = id;
        self.writes.fetch_add(1, AtomicOrdering::Relaxed);
        for hook in self.write_node_commands.read().expect("hook lock poisoned").iter() {
            hook(id, node);
        }
        Ok(())
    }

    fn delete_node_at(&self, id: PageId) -> Result<(), IrTreeError> {
        self.store.delete_node(id)?;
        for hook in self.delete_node_commands.read().expect("hook lock poisoned").iter() {
            hook(id);
        }
        Ok(())
    }

    fn persist_header(&self, state: &mut TreeState) -> Result<(), IrTreeError> {
        let header = Header {
            root_id: state.root_id,
            dimension: self.properties.dimension,
            leaf_capacity: self.properties.leaf_capacity,
            index_capacity: self.properties.index_capacity,
            fill_factor: self.properties.fill_factor,
            height: state.height,
            data: state.data,
        };
        let bytes = encode_header(&header)?;
        state.header_id = self.store.store_header(state.header_id, bytes)?;
        self.store.flush()
    }

    /// Recomputes tree-wide counters by a full traversal plus the running IO
    /// counters. `nodes_in_level[l]` is the node count at level `l` (0 = leaves).
    pub fn stats(&self) -> Result<Stats, IrTreeError> {
        let state = self.state.read().expect("tree state lock poisoned");
        let mut nodes_in_level = vec![0u64; state.height as usize + 1];
        self.count_nodes(state.root_id, state.height, &mut nodes_in_level)?;
        Ok(Stats {
            nodes_in_level,
            reads: self.reads.load(AtomicOrdering::Relaxed),
            writes: self.writes.load(AtomicOrdering::Relaxed),
            data: state.data,
            height: state.height,
            query_results: self.query_results.load(AtomicOrdering::Relaxed),
        })
    }

    fn count_nodes(&self, id: PageId, level: u32, counts: &mut [u64]) -> Result<(), IrTreeError> {
        let node = self.read_node(id)?;
        counts[level as usize] += 1;
        if !node.is_leaf() {
            for entry in &node.entries {
                self.count_nodes(entry.child_id, level - 1, counts)?;
            }
        }
        Ok(())
    }

    // ---- choose_subtree -------------------------------------------------

    fn choose_subtree(&self, node: &Node<T>, mbr: &Region) -> usize {
        if self.properties.variant == TreeVariant::RStar && node.level == 1 {
            choose_subtree_min_overlap(node, mbr, self.properties.near_minimum_overlap_factor)
        } else {
            choose_subtree_min_enlargement(node, mbr)
        }
    }

    // ---- insertion -------------------------------------------------------

    /// Inserts `payload` into the tree.
    pub fn insert_data(&self, payload: T) -> Result<(), IrTreeError> {
        let mbr = payload.mbr();
        if mbr.dimension() != self.properties.dimension {
            return Err(IrTreeError::Shape {
                expected_dim: self.properties.dimension,
                found_dim: mbr.dimension(),
            });
        }
        info!(id = payload.id(), "inserting object into R-tree");
        let mut state = self.state.write().expect("tree state lock poisoned");
        let mut overflow_table = vec![false; state.height as usize + 1];
        let mut reinsert_queue: Vec<(Entry<T>, u32)> = Vec::new();
        let entry = Entry::leaf(mbr, PageId::NEW, payload);

        let outcome = self.insert_recursive(
            state.root_id,
            state.height,
            entry,
            0,
            &mut overflow_table,
            &mut reinsert_queue,
        )?;
        self.apply_insert_outcome(&mut state, outcome)?;

        while let Some((queued_entry, level)) = reinsert_queue.pop() {
            debug!(level, "reinserting entry displaced by forced reinsertion");
            let root_level = state.height;
            let outcome = self.insert_recursive(
                state.root_id,
                root_level,
                queued_entry,
                level,
                &mut overflow_table,
                &mut reinsert_queue,
            )?;
            self.apply_insert_outcome(&mut state, outcome)?;
        }

        state.data += 1;
        self.persist_header(&mut state)
    }

    fn apply_insert_outcome(
        &self,
        state: &mut TreeState,
        outcome: InsertOutcome<T>,
    ) -> Result<(), IrTreeError> {
        match outcome {
            InsertOutcome::Done(_) => Ok(()),
            InsertOutcome::Split {
                left_mbr,
                sibling_id,
                sibling_mbr,
            } => {
                info!("root overflowed; growing tree height by one");
                let new_level = state.height + 1;
                let mut new_root: Node<T> = Node::new_index(PageId::NEW, new_level, self.properties.dimension);
                new_root.insert_entry(Entry::index(left_mbr, state.root_id));
                new_root.insert_entry(Entry::index(sibling_mbr, sibling_id));
                new_root.recompute_mbr();
                self.write_node(&mut new_root)?;
                state.root_id = new_root.identifier;
                state.height = new_level;
                Ok(())
            }
        }
    }

    /// Descends from `current_id` (at `current_level`) to the node at
    /// `target_level` and appends `entry` there, propagating MBR growth and
    /// split/reinsert outcomes back up.
    fn insert_recursive(
        &self,
        current_id: PageId,
        current_level: u32,
        entry: Entry<T>,
        target_level: u32,
        overflow_table: &mut Vec<bool>,
        reinsert_queue: &mut Vec<(Entry<T>, u32)>,
    ) -> Result<InsertOutcome<T>, IrTreeError> {
        let mut node = self.read_node(current_id)?;

        if current_level == target_level {
            debug!(level = current_level, "appending entry at target level");
            node.insert_entry(entry);
            node.recompute_mbr();
            return self.resolve_overflow(node, current_level, overflow_table, reinsert_queue);
        }

        let child_idx = self.choose_subtree(&node, &entry.mbr);
        let child_id = node.entries[child_idx].child_id;
        let outcome = self.insert_recursive(
            child_id,
            current_level - 1,
            entry,
            target_level,
            overflow_table,
            reinsert_queue,
        )?;
        match outcome {
            InsertOutcome::Done(child_mbr) => {
                node.entries[child_idx].mbr = child_mbr;
            }
            InsertOutcome::Split {
                left_mbr,
                sibling_id,
                sibling_mbr,
            } => {
                node.entries[child_idx].mbr = left_mbr;
                node.insert_entry(Entry::index(sibling_mbr, sibling_id));
            }
        }
        node.recompute_mbr();
        self.resolve_overflow(node, current_level, overflow_table, reinsert_queue)
    }

    /// Handles a node that may now exceed capacity: stores it as-is if it
    /// fits, otherwise forces reinsertion (R* only, once per level) or splits.
    fn resolve_overflow(
        &self,
        mut node: Node<T>,
        level: u32,
        overflow_table: &mut Vec<bool>,
        reinsert_queue: &mut Vec<(Entry<T>, u32)>,
    ) -> Result<InsertOutcome<T>, IrTreeError> {
        let capacity = if node.is_leaf() {
            self.properties.leaf_capacity
        } else {
            self.properties.index_capacity
        };

        if node.entries.len() <= capacity {
            let mbr = node.node_mbr.clone();
            self.write_node(&mut node)?;
            return Ok(InsertOutcome::Done(mbr));
        }

        if self.properties.variant == TreeVariant::RStar && !overflow_table[level as usize] {
            overflow_table[level as usize] = true;
            debug!(level, "forcing reinsertion on first overflow at this level");
            let reinsert_count = ((self.properties.reinsert_factor * capacity as f64).ceil() as usize).max(1);
            let center: Vec<f64> = (0..node.node_mbr.dimension()).map(|d| node.node_mbr.center(d)).collect();

            let mut order: Vec<usize> = (0..node.entries.len()).collect();
            order.sort_by(|&a, &b| {
                let da = center_distance_sq(&center, &node.entries[a].mbr);
                let db = center_distance_sq(&center, &node.entries[b].mbr);
                db.partial_cmp(&da).unwrap_or(Ordering::Equal)
            });
            let removed_slots: std::collections::HashSet<usize> =
                order.into_iter().take(reinsert_count).collect();

            let mut kept = Vec::with_capacity(node.entries.len() - removed_slots.len());
            let mut removed = Vec::with_capacity(removed_slots.len());
            for (i, e) in node.entries.drain(..).enumerate() {
                if removed_slots.contains(&i) {
                    removed.push(e);
                } else {
                    kept.push(e);
                }
            }
            node.entries = kept;
            node.recompute_mbr();
            let mbr = node.node_mbr.clone();
            self.write_node(&mut node)?;
            for e in removed {
                reinsert_queue.push((e, level));
            }
            return Ok(InsertOutcome::Done(mbr));
        }

        debug!(level, variant = ?self.properties.variant, "splitting overflowing node");
        let (group_a, group_b) = split_entries(
            self.properties.variant,
            std::mem::take(&mut node.entries),
            capacity,
            self.properties.fill_factor,
            self.properties.split_distribution_factor,
        );
        node.entries = group_a;
        node.recompute_mbr();
        let left_mbr = node.node_mbr.clone();
        self.write_node(&mut node)?;

        let mut sibling: Node<T> = if node.is_leaf() {
            Node::new_leaf(PageId::NEW, node.node_mbr.dimension())
        } else {
            Node::new_index(PageId::NEW, node.level, node.node_mbr.dimension())
        };
        sibling.entries = group_b;
        sibling.recompute_mbr();
        let sibling_mbr = sibling.node_mbr.clone();
        self.write_node(&mut sibling)?;

        Ok(InsertOutcome::Split {
            left_mbr,
            sibling_id: sibling.identifier,
            sibling_mbr,
        })
    }

    // ---- range query ------------------------------------------------------

    /// Stack-based depth-first traversal. `visitor` is called for every
    /// touched node and for every matching data entry.
    pub fn range_query(
        &self,
        shape: &Region,
        predicate: RangePredicate,
        mut visitor: impl FnMut(RangeVisit<'_, T>),
    ) -> Result<usize, IrTreeError> {
        if shape.dimension() != self.properties.dimension {
            return Err(IrTreeError::Shape {
                expected_dim: self.properties.dimension,
                found_dim: shape.dimension(),
            });
        }
        let state = self.state.read().expect("tree state lock poisoned");
        let mut stack = vec![state.root_id];
        let mut matched = 0usize;
        while let Some(id) = stack.pop() {
            let node = self.read_node(id)?;
            visitor(RangeVisit::Node(&node));
            if node.is_leaf() {
                for e in &node.entries {
                    let hit = match predicate {
                        RangePredicate::Intersects => e.mbr.intersects(shape),
                        RangePredicate::Contains => shape.contains(&e.mbr),
                    };
                    if hit {
                        if let Some(payload) = &e.payload {
                            visitor(RangeVisit::Data(payload));
                            matched += 1;
                        }
                    }
                }
            } else {
                for e in &node.entries {
                    if e.mbr.intersects(shape) {
                        stack.push(e.child_id);
                    }
                }
            }
        }
        self.query_results.fetch_add(matched as u64, AtomicOrdering::Relaxed);
        Ok(matched)
    }

    /// Finds every data entry whose MBR contains `point`, per spec.md §2's
    /// point-location primitive. Descends only children whose MBR contains
    /// `point`, the same `containsPoint` traversal `delete_data`'s
    /// `find_leaf` uses to locate a leaf. A dimension mismatch is raised as
    /// `IrTreeError::Shape` rather than the panic `Region::contains_point`
    /// would otherwise produce.
    pub fn point_location_query(
        &self,
        point: &Point,
        mut visitor: impl FnMut(RangeVisit<'_, T>),
    ) -> Result<usize, IrTreeError> {
        if point.dimension() != self.properties.dimension {
            return Err(IrTreeError::Shape {
                expected_dim: self.properties.dimension,
                found_dim: point.dimension(),
            });
        }
        let state = self.state.read().expect("tree state lock poisoned");
        let mut stack = vec![state.root_id];
        let mut matched = 0usize;
        while let Some(id) = stack.pop() {
            let node = self.read_node(id)?;
            visitor(RangeVisit::Node(&node));
            if node.is_leaf() {
                for e in &node.entries {
                    if e.mbr.contains_point(point) {
                        if let Some(payload) = &e.payload {
                            visitor(RangeVisit::Data(payload));
                            matched += 1;
                        }
                    }
                }
            } else {
                for e in &node.entries {
                    if e.mbr.contains_point(point) {
                        stack.push(e.child_id);
                    }
                }
            }
        }
        self.query_results.fetch_add(matched as u64, AtomicOrdering::Relaxed);
        Ok(matched)
    }

    // ---- nearest neighbor ---------------------------------------------------

    /// Best-first k-NN via a real `BinaryHeap`, keyed by `nnc`'s distance
    /// function. Ties at the kth result are all reported, so `visitor` may be
    /// called more than `k` times.
    pub fn nearest_neighbor_query<N: NnComparator<T>>(
        &self,
        k: usize,
        shape: &Region,
        nnc: &N,
        mut visitor: impl FnMut(&T, f64),
    ) -> Result<usize, IrTreeError> {
        if shape.dimension() != self.properties.dimension {
            return Err(IrTreeError::Shape {
                expected_dim: self.properties.dimension,
                found_dim: shape.dimension(),
            });
        }
        let state = self.state.read().expect("tree state lock poisoned");
        let mut heap: BinaryHeap<std::cmp::Reverse<NnCandidate<T>>> = BinaryHeap::new();
        heap.push(std::cmp::Reverse(NnCandidate {
            cost: 0.0,
            item: NnItem::Node(state.root_id),
        }));

        let mut emitted = 0usize;
        let mut kth_cost: Option<f64> = None;

        while let Some(std::cmp::Reverse(candidate)) = heap.pop() {
            if let Some(kc) = kth_cost {
                if candidate.cost > kc {
                    break;
                }
            }
            match candidate.item {
                NnItem::Node(id) => {
                    let node = self.read_node(id)?;
                    if node.is_leaf() {
                        for e in &node.entries {
                            if let Some(obj) = &e.payload {
                                let cost = nnc.object_distance(shape, obj);
                                heap.push(std::cmp::Reverse(NnCandidate {
                                    cost,
                                    item: NnItem::Data(obj.clone()),
                                }));
                            }
                        }
                    } else {
                        for e in &node.entries {
                            let cost = nnc.minimum_distance(shape, &e.mbr);
                            heap.push(std::cmp::Reverse(NnCandidate {
                                cost,
                                item: NnItem::Node(e.child_id),
                            }));
                        }
                    }
                }
                NnItem::Data(obj) => {
                    visitor(&obj, candidate.cost);
                    emitted += 1;
                    if emitted >= k && kth_cost.is_none() {
                        kth_cost = Some(candidate.cost);
                    }
                }
            }
        }
        self.query_results.fetch_add(emitted as u64, AtomicOrdering::Relaxed);
        Ok(emitted)
    }

    // ---- generic traversal driver ------------------------------------------

    /// Hands nodes to a caller-supplied strategy that decides which node to
    /// visit next and whether to continue. Used for custom traversals such as
    /// index inspection tools.
    pub fn query_strategy(&self, mut strategy: impl QueryStrategy<T>) -> Result<(), IrTreeError> {
        let state = self.state.read().expect("tree state lock poisoned");
        let mut current = Some(state.root_id);
        while let Some(id) = current {
            let node = self.read_node(id)?;
            let (next_id, keep_going) = strategy.next(&node);
            if !keep_going {
                break;
            }
            current = next_id;
        }
        Ok(())
    }

    // ---- structural audit ---------------------------------------------------

    /// Recomputes every node MBR from its children and compares it against the
    /// stored value, recounts nodes per level against `stats()`, and checks
    /// fill-factor bounds. Never repairs anything it finds wrong.
    pub fn is_index_valid(&self) -> Result<(bool, Vec<String>), IrTreeError> {
        let state = self.state.read().expect("tree state lock poisoned");
        let mut diagnostics = Vec::new();
        let mut counts = vec![0u64; state.height as usize + 1];
        self.audit_node(state.root_id, state.height, true, &mut counts, &mut diagnostics)?;
        Ok((diagnostics.is_empty(), diagnostics))
    }

    fn audit_node(
        &self,
        id: PageId,
        level: u32,
        is_root: bool,
        counts: &mut Vec<u64>,
        diagnostics: &mut Vec<String>,
    ) -> Result<Region, IrTreeError> {
        let node = self.read_node(id)?;
        counts[level as usize] += 1;

        if node.level != level {
            diagnostics.push(format!(
                "node {:?} has level {} but was reached at expected level {}",
                id, node.level, level
            ));
        }

        let capacity = if node.is_leaf() {
            self.properties.leaf_capacity
        } else {
            self.properties.index_capacity
        };
        let min_entries = ((capacity as f64 * self.properties.fill_factor).ceil() as usize).max(1);
        if !is_root && node.entries.len() < min_entries {
            diagnostics.push(format!(
                "node {:?} underfilled: {} entries, minimum {}",
                id,
                node.entries.len(),
                min_entries
            ));
        }
        if node.entries.len() > capacity {
            diagnostics.push(format!(
                "node {:?} overfilled: {} entries, capacity {}",
                id,
                node.entries.len(),
                capacity
            ));
        }

        let recomputed = node
            .entries
            .iter()
            .fold(Region::infinite(self.properties.dimension), |acc, e| acc.union(&e.mbr));
        if recomputed != node.node_mbr {
            diagnostics.push(format!("node {:?} stored MBR does not match the union of its entries", id));
        }

        if !node.is_leaf() {
            for e in &node.entries {
                let child_mbr = self.audit_node(e.child_id, level - 1, false, counts, diagnostics)?;
                if child_mbr != e.mbr {
                    diagnostics.push(format!(
                        "entry for child {:?} MBR does not match the child's recomputed MBR",
                        e.child_id
                    ));
                }
            }
        }
        Ok(recomputed)
    }
}

impl<T, S> RTree<T, S>
where
    T: SpatialObject + NodeCodec + PartialEq,
    S: PageStore,
{
    /// Deletes the first entry equal to `object`. Returns whether anything was
    /// removed.
    pub fn delete_data(&self, object: &T) -> Result<bool, IrTreeError> {
        let mbr = object.mbr();
        if mbr.dimension() != self.properties.dimension {
            return Err(IrTreeError::Shape {
                expected_dim: self.properties.dimension,
                found_dim: mbr.dimension(),
            });
        }
        info!(id = object.id(), "deleting object from R-tree");
        let mut state = self.state.write().expect("tree state lock poisoned");
        let min_leaf = ((self.properties.leaf_capacity as f64 * self.properties.fill_factor).ceil() as usize).max(1);
        let min_index = ((self.properties.index_capacity as f64 * self.properties.fill_factor).ceil() as usize).max(1);
        let mut reinsert_queue: Vec<(Entry<T>, u32)> = Vec::new();

        let outcome = self.delete_recursive(
            state.root_id,
            state.height,
            true,
            &mbr,
            object,
            min_leaf,
            min_index,
            &mut reinsert_queue,
        )?;

        if matches!(outcome, DeleteOutcome::NotFound) {
            return Ok(false);
        }
        state.data = state.data.saturating_sub(1);

        let mut overflow_table = vec![false; state.height as usize + 1];
        while let Some((entry, level)) = reinsert_queue.pop() {
            let root_level = state.height;
            let insert_outcome = self.insert_recursive(
                state.root_id,
                root_level,
                entry,
                level,
                &mut overflow_table,
                &mut reinsert_queue,
            )?;
            self.apply_insert_outcome(&mut state, insert_outcome)?;
        }

        self.collapse_root(&mut state)?;
        self.persist_header(&mut state)?;
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    fn delete_recursive(
        &self,
        current_id: PageId,
        current_level: u32,
        is_root: bool,
        target_mbr: &Region,
        object: &T,
        min_leaf: usize,
        min_index: usize,
        reinsert_queue: &mut Vec<(Entry<T>, u32)>,
    ) -> Result<DeleteOutcome, IrTreeError> {
        let mut node = self.read_node(current_id)?;

        if node.is_leaf() {
            let slot = node.entries.iter().position(|e| e.payload.as_ref() == Some(object));
            let Some(slot) = slot else {
                return Ok(DeleteOutcome::NotFound);
            };
            node.delete_entry(slot);
            node.recompute_mbr();
            if !is_root && node.entries.len() < min_leaf {
                debug!(level = current_level, "leaf underflowed; detaching for reinsertion");
                for e in node.entries.drain(..) {
                    reinsert_queue.push((e, 0));
                }
                self.delete_node_at(current_id)?;
                return Ok(DeleteOutcome::Underflow);
            }
            self.write_node(&mut node)?;
            return Ok(DeleteOutcome::Deleted { new_mbr: node.node_mbr.clone() });
        }

        let mut found: Option<(usize, DeleteOutcome)> = None;
        for i in 0..node.entries.len() {
            if !node.entries[i].mbr.contains(target_mbr) {
                continue;
            }
            let child_id = node.entries[i].child_id;
            let outcome = self.delete_recursive(
                child_id,
                current_level - 1,
                false,
                target_mbr,
                object,
                min_leaf,
                min_index,
                reinsert_queue,
            )?;
            if !matches!(outcome, DeleteOutcome::NotFound) {
                found = Some((i, outcome));
                break;
            }
        }
        let Some((slot, outcome)) = found else {
            return Ok(DeleteOutcome::NotFound);
        };
        match outcome {
            DeleteOutcome::Deleted { new_mbr } => node.entries[slot].mbr = new_mbr,
            DeleteOutcome::Underflow => {
                node.delete_entry(slot);
            }
            DeleteOutcome::NotFound => unreachable!(),
        }
        node.recompute_mbr();
        if !is_root && node.entries.len() < min_index {
            debug!(level = current_level, "index node underflowed; detaching for reinsertion");
            for e in node.entries.drain(..) {
                reinsert_queue.push((e, current_level));
            }
            self.delete_node_at(current_id)?;
            return Ok(DeleteOutcome::Underflow);
        }
        self.write_node(&mut node)?;
        Ok(DeleteOutcome::Deleted { new_mbr: node.node_mbr.clone() })
    }

    /// Collapses a root with a single child into that child, repeatedly.
    fn collapse_root(&self, state: &mut TreeState) -> Result<(), IrTreeError> {
        loop {
            let root = self.read_node(state.root_id)?;
            if root.is_leaf() || root.entries.len() != 1 {
                break;
            }
            let only_child = root.entries[0].child_id;
            self.delete_node_at(state.root_id)?;
            state.root_id = only_child;
            state.height = state.height.saturating_sub(1);
        }
        Ok(())
    }
}

/// Selects the predicate a [`RTree::range_query`] matches leaf entries against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePredicate {
    Intersects,
    Contains,
}

/// What a `range_query` visitor is called with.
pub enum RangeVisit<'a, T> {
    Node(&'a Node<T>),
    Data(&'a T),
}

/// Distance function used by `nearest_neighbor_query`. Generalizes spec.md's
/// point-shaped query to regions, so the same comparator also drives the
/// spatial-keyword search in [`crate::search`].
pub trait NnComparator<T> {
    fn minimum_distance(&self, shape: &Region, mbr: &Region) -> f64;
    fn object_distance(&self, shape: &Region, object: &T) -> f64;
}

/// The default comparator: plain Euclidean distance between regions.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanNn;

impl<T: SpatialObject> NnComparator<T> for EuclideanNn {
    fn minimum_distance(&self, shape: &Region, mbr: &Region) -> f64 {
        shape.minimum_distance_to_region(mbr)
    }

    fn object_distance(&self, shape: &Region, object: &T) -> f64 {
        shape.minimum_distance_to_region(&object.mbr())
    }
}

/// A caller-supplied traversal strategy for [`RTree::query_strategy`].
pub trait QueryStrategy<T> {
    /// Given the node just visited, returns the next node to visit and
    /// whether to continue at all.
    fn next(&mut self, node: &Node<T>) -> (Option<PageId>, bool);
}

enum NnItem<T> {
    Node(PageId),
    Data(T),
}

struct NnCandidate<T> {
    cost: f64,
    item: NnItem<T>,
}

impl<T> PartialEq for NnCandidate<T> {
    fn eq(&self, other: &Self) -> bool {
        OrderedFloat(self.cost) == OrderedFloat(other.cost)
    }
}
impl<T> Eq for NnCandidate<T> {}
impl<T> PartialOrd for NnCandidate<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for NnCandidate<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        OrderedFloat(self.cost).cmp(&OrderedFloat(other.cost))
    }
}

fn choose_subtree_min_enlargement<T>(node: &Node<T>, mbr: &Region) -> usize {
    let mut best = 0;
    let mut best_enlargement = f64::INFINITY;
    let mut best_area = f64::INFINITY;
    for (i, e) in node.entries.iter().enumerate() {
        let enlargement = e.mbr.enlargement(mbr);
        let area = e.mbr.area();
        if enlargement < best_enlargement || (enlargement == best_enlargement && area < best_area) {
            best_enlargement = enlargement;
            best_area = area;
            best = i;
        }
    }
    best
}

/// R*-tree choose_subtree at the leaf-parent level: costs the `p` candidates
/// with smallest enlargement by the overlap they would add, tie-breaking by
/// enlargement then area.
fn choose_subtree_min_overlap<T>(node: &Node<T>, mbr: &Region, p: usize) -> usize {
    let p = p.clamp(1, node.entries.len());
    let mut ranked: Vec<usize> = (0..node.entries.len()).collect();
    ranked.sort_by(|&a, &b| {
        node.entries[a]
            .mbr
            .enlargement(mbr)
            .partial_cmp(&node.entries[b].mbr.enlargement(mbr))
            .unwrap_or(Ordering::Equal)
    });
    let candidates = &ranked[..p];

    let mut best = candidates[0];
    let mut best_overlap_delta = f64::INFINITY;
    let mut best_enlargement = f64::INFINITY;
    let mut best_area = f64::INFINITY;
    for &i in candidates {
        let enlarged = node.entries[i].mbr.union(mbr);
        let mut overlap_before = 0.0;
        let mut overlap_after = 0.0;
        for (j, other) in node.entries.iter().enumerate() {
            if i == j {
                continue;
            }
            overlap_before += node.entries[i].mbr.overlap(&other.mbr);
            overlap_after += enlarged.overlap(&other.mbr);
        }
        let delta = overlap_after - overlap_before;
        let enlargement = node.entries[i].mbr.enlargement(mbr);
        let area = node.entries[i].mbr.area();
        if delta < best_overlap_delta
            || (delta == best_overlap_delta && enlargement < best_enlargement)
            || (delta == best_overlap_delta && enlargement == best_enlargement && area < best_area)
        {
            best_overlap_delta = delta;
            best_enlargement = enlargement;
            best_area = area;
            best = i;
        }
    }
    best
}

fn region_center(region: &Region) -> Vec<f64> {
    (0..region.dimension()).map(|d| region.center(d)).collect()
}

fn center_distance_sq(center: &[f64], region: &Region) -> f64 {
    let other = region_center(region);
    center.iter().zip(other.iter()).map(|(a, b)| (a - b).powi(2)).sum()
}

fn group_mbr<T>(entries: &[Entry<T>]) -> Region {
    let dim = entries[0].mbr.dimension();
    entries.iter().fold(Region::infinite(dim), |acc, e| acc.union(&e.mbr))
}

fn take_two<T>(entries: &mut Vec<Entry<T>>, i: usize, j: usize) -> (Entry<T>, Entry<T>) {
    if i < j {
        let b = entries.remove(j);
        let a = entries.remove(i);
        (a, b)
    } else {
        let a = entries.remove(i);
        let b = entries.remove(j);
        (a, b)
    }
}

fn split_entries<T>(
    variant: TreeVariant,
    entries: Vec<Entry<T>>,
    capacity: usize,
    fill_factor: f64,
    split_distribution_factor: f64,
) -> (Vec<Entry<T>>, Vec<Entry<T>>) {
    match variant {
        TreeVariant::Linear => {
            let (a, b) = linear_seeds(&entries);
            distribute_from_seeds(entries, a, b, capacity, fill_factor)
        }
        TreeVariant::Quadratic => {
            let (a, b) = quadratic_seeds(&entries);
            distribute_from_seeds(entries, a, b, capacity, fill_factor)
        }
        TreeVariant::RStar => rstar_split(entries, capacity, split_distribution_factor),
    }
}

/// Picks the pair most separated on any single axis, normalized by that
/// axis's overall extent.
fn linear_seeds<T>(entries: &[Entry<T>]) -> (usize, usize) {
    let dim = entries[0].mbr.dimension();
    let mut best_pair = (0, 1.min(entries.len() - 1));
    let mut best_separation = f64::NEG_INFINITY;
    for axis in 0..dim {
        let mut highest_low_idx = 0;
        let mut highest_low = f64::NEG_INFINITY;
        let mut lowest_high_idx = 0;
        let mut lowest_high = f64::INFINITY;
        let mut axis_min = f64::INFINITY;
        let mut axis_max = f64::NEG_INFINITY;
        for (i, e) in entries.iter().enumerate() {
            let lo = e.mbr.low()[axis];
            let hi = e.mbr.high()[axis];
            if lo > highest_low {
                highest_low = lo;
                highest_low_idx = i;
            }
            if hi < lowest_high {
                lowest_high = hi;
                lowest_high_idx = i;
            }
            axis_min = axis_min.min(lo);
            axis_max = axis_max.max(hi);
        }
        if highest_low_idx == lowest_high_idx {
            continue;
        }
        let width = (axis_max - axis_min).max(f64::EPSILON);
        let separation = (highest_low - lowest_high) / width;
        if separation > best_separation {
            best_separation = separation;
            best_pair = (highest_low_idx, lowest_high_idx);
        }
    }
    best_pair
}

/// Picks the pair that would waste the most area if grouped together.
fn quadratic_seeds<T>(entries: &[Entry<T>]) -> (usize, usize) {
    let mut best = (0, 1.min(entries.len() - 1));
    let mut worst_waste = f64::NEG_INFINITY;
    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let union = entries[i].mbr.union(&entries[j].mbr);
            let waste = union.area() - entries[i].mbr.area() - entries[j].mbr.area();
            if waste > worst_waste {
                worst_waste = waste;
                best = (i, j);
            }
        }
    }
    best
}

/// Shared greedy distribution for the linear and quadratic variants: seeds
/// two groups, then repeatedly assigns the entry with the largest enlargement
/// preference to whichever group it prefers, forcing leftovers into whichever
/// group needs them once the other already has enough to satisfy fill_factor.
fn distribute_from_seeds<T>(
    mut entries: Vec<Entry<T>>,
    seed_a: usize,
    seed_b: usize,
    capacity: usize,
    fill_factor: f64,
) -> (Vec<Entry<T>>, Vec<Entry<T>>) {
    let min_group = (((capacity as f64) * fill_factor).ceil() as usize).max(1);
    let (ea, eb) = take_two(&mut entries, seed_a, seed_b);
    let mut group_a = vec![ea];
    let mut group_b = vec![eb];
    let mut remaining = entries;

    while !remaining.is_empty() {
        let total_remaining = remaining.len();
        if group_a.len() + total_remaining == min_group {
            group_a.append(&mut remaining);
            break;
        }
        if group_b.len() + total_remaining == min_group {
            group_b.append(&mut remaining);
            break;
        }

        let mbr_a = group_mbr(&group_a);
        let mbr_b = group_mbr(&group_b);
        let mut best_idx = 0;
        let mut best_preference = f64::NEG_INFINITY;
        let mut best_enl_a = 0.0;
        let mut best_enl_b = 0.0;
        for (i, e) in remaining.iter().enumerate() {
            let enl_a = mbr_a.enlargement(&e.mbr);
            let enl_b = mbr_b.enlargement(&e.mbr);
            let preference = (enl_a - enl_b).abs();
            if preference > best_preference {
                best_preference = preference;
                best_idx = i;
                best_enl_a = enl_a;
                best_enl_b = enl_b;
            }
        }
        let entry = remaining.remove(best_idx);
        let prefers_a = best_enl_a < best_enl_b
            || (best_enl_a == best_enl_b && mbr_a.area() < mbr_b.area())
            || (best_enl_a == best_enl_b && mbr_a.area() == mbr_b.area() && group_a.len() <= group_b.len());
        if prefers_a {
            group_a.push(entry);
        } else {
            group_b.push(entry);
        }
    }
    (group_a, group_b)
}

/// R*-tree split: pick the axis minimizing the summed margin over all valid
/// distributions, then within that axis the distribution minimizing overlap
/// (ties broken by area).
fn rstar_split<T>(
    entries: Vec<Entry<T>>,
    capacity: usize,
    split_distribution_factor: f64,
) -> (Vec<Entry<T>>, Vec<Entry<T>>) {
    let dim = entries[0].mbr.dimension();
    let min_split = ((split_distribution_factor * capacity as f64).floor() as usize).max(1);
    let max_split = capacity.saturating_sub(min_split).max(min_split);

    let mut best_axis = 0usize;
    let mut best_margin_sum = f64::INFINITY;
    for axis in 0..dim {
        for by_high in [false, true] {
            let mut sorted = entries.clone();
            sorted.sort_by(|a, b| {
                let ka = if by_high { a.mbr.high()[axis] } else { a.mbr.low()[axis] };
                let kb = if by_high { b.mbr.high()[axis] } else { b.mbr.low()[axis] };
                ka.partial_cmp(&kb).unwrap_or(Ordering::Equal)
            });
            let mut margin_sum = 0.0;
            let hi = max_split.min(sorted.len().saturating_sub(1)).max(min_split);
            for k in min_split..=hi {
                if k == 0 || k >= sorted.len() {
                    continue;
                }
                let (left, right) = sorted.split_at(k);
                margin_sum += group_mbr(left).margin() + group_mbr(right).margin();
            }
            if margin_sum < best_margin_sum {
                best_margin_sum = margin_sum;
                best_axis = axis;
            }
        }
    }

    let mut best_overlap = f64::INFINITY;
    let mut best_area = f64::INFINITY;
    let mut best_split: Option<(Vec<Entry<T>>, Vec<Entry<T>>)> = None;
    for by_high in [false, true] {
        let mut sorted = entries.clone();
        sorted.sort_by(|a, b| {
            let ka = if by_high { a.mbr.high()[best_axis] } else { a.mbr.low()[best_axis] };
            let kb = if by_high { b.mbr.high()[best_axis] } else { b.mbr.low()[best_axis] };
            ka.partial_cmp(&kb).unwrap_or(Ordering::Equal)
        });
        let hi = max_split.min(sorted.len().saturating_sub(1)).max(min_split);
        for k in min_split..=hi {
            if k == 0 || k >= sorted.len() {
                continue;
            }
            let (left, right) = sorted.split_at(k);
            let left_mbr = group_mbr(left);
            let right_mbr = group_mbr(right);
            let overlap = left_mbr.overlap(&right_mbr);
            let area = left_mbr.area() + right_mbr.area();
            let better = overlap < best_overlap || (overlap == best_overlap && area < best_area);
            if better {
                best_overlap = overlap;
                best_area = area;
                best_split = Some((left.to_vec(), right.to_vec()));
            }
        }
    }
    best_split.unwrap_or_else(|| {
        let mid = entries.len() / 2;
        (entries[..mid].to_vec(), entries[mid..].to_vec())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryPageStore;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct TestPoint {
        id: u64,
        x: f64,
        y: f64,
    }

    impl SpatialObject for TestPoint {
        fn id(&self) -> u64 {
            self.id
        }
        fn mbr(&self) -> Region {
            Region::from_point(&crate::geometry::Point::new(vec![self.x, self.y]))
        }
    }

    fn point(id: u64, x: f64, y: f64) -> TestPoint {
        TestPoint { id, x, y }
    }

    fn small_tree(variant: TreeVariant) -> RTree<TestPoint> {
        let properties = Properties {
            variant,
            leaf_capacity: 4,
            index_capacity: 4,
            near_minimum_overlap_factor: 3,
            ..Properties::default()
        };
        RTree::new(properties, MemoryPageStore::new()).unwrap()
    }

    #[test]
    fn insert_and_range_query_after_forced_split() {
        let tree = small_tree(TreeVariant::Quadratic);
        for p in [
            point(1, 1.0, 1.0),
            point(2, 2.0, 2.0),
            point(3, 10.0, 10.0),
            point(4, 11.0, 11.0),
            point(5, 12.0, 12.0),
        ] {
            tree.insert_data(p).unwrap();
        }

        let mut low_region = Vec::new();
        tree.range_query(
            &Region::new(vec![0.0, 0.0], vec![3.0, 3.0]),
            RangePredicate::Intersects,
            |visit| {
                if let RangeVisit::Data(obj) = visit {
                    low_region.push(obj.id);
                }
            },
        )
        .unwrap();
        low_region.sort();
        assert_eq!(low_region, vec![1, 2]);

        let mut high_region = Vec::new();
        tree.range_query(
            &Region::new(vec![9.0, 9.0], vec![13.0, 13.0]),
            RangePredicate::Intersects,
            |visit| {
                if let RangeVisit::Data(obj) = visit {
                    high_region.push(obj.id);
                }
            },
        )
        .unwrap();
        high_region.sort();
        assert_eq!(high_region, vec![3, 4, 5]);

        assert_eq!(tree.stats().unwrap().data, 5);
    }

    #[test]
    fn point_location_query_finds_the_entry_covering_the_point() {
        let tree = small_tree(TreeVariant::Quadratic);
        for p in [point(1, 1.0, 1.0), point(2, 10.0, 10.0)] {
            tree.insert_data(p).unwrap();
        }

        let mut found = Vec::new();
        tree.point_location_query(&crate::geometry::Point::new(vec![1.0, 1.0]), |visit| {
            if let RangeVisit::Data(obj) = visit {
                found.push(obj.id);
            }
        })
        .unwrap();
        assert_eq!(found, vec![1]);
    }

    #[test]
    fn point_location_query_rejects_a_dimension_mismatch() {
        let tree = small_tree(TreeVariant::Quadratic);
        let err = tree
            .point_location_query(&crate::geometry::Point::new(vec![1.0, 1.0, 1.0]), |_| {})
            .unwrap_err();
        assert!(matches!(
            err,
            IrTreeError::Shape { expected_dim: 2, found_dim: 3 }
        ));
    }

    #[test]
    fn nearest_neighbor_reports_all_ties() {
        let tree = small_tree(TreeVariant::Linear);
        for p in [
            point(1, 5.0, 0.0),
            point(2, 0.0, 5.0),
            point(3, -5.0, 0.0),
            point(4, 0.0, -5.0),
            point(5, 1.0, 0.0),
        ] {
            tree.insert_data(p).unwrap();
        }

        let origin = Region::from_point(&crate::geometry::Point::new(vec![0.0, 0.0]));
        let mut ids = Vec::new();
        tree.nearest_neighbor_query(2, &origin, &EuclideanNn, |obj, _cost| ids.push(obj.id))
            .unwrap();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn delete_removes_entry_and_shrinks_data_count() {
        let tree = small_tree(TreeVariant::Quadratic);
        let target = point(7, 3.0, 3.0);
        tree.insert_data(target.clone()).unwrap();
        tree.insert_data(point(8, 4.0, 4.0)).unwrap();
        assert_eq!(tree.stats().unwrap().data, 2);

        assert!(tree.delete_data(&target).unwrap());
        assert_eq!(tree.stats().unwrap().data, 1);
        assert!(!tree.delete_data(&target).unwrap());
    }

    #[test]
    fn rstar_tree_stays_structurally_valid_under_load() {
        let tree = small_tree(TreeVariant::RStar);
        for i in 0..60u64 {
            let x = (i % 7) as f64;
            let y = (i / 7) as f64;
            tree.insert_data(point(i, x, y)).unwrap();
        }
        let (valid, diagnostics) = tree.is_index_valid().unwrap();
        assert!(valid, "diagnostics: {diagnostics:?}");
        assert_eq!(tree.stats().unwrap().data, 60);
    }

    #[test]
    fn share_observes_mutations_made_through_the_original_handle() {
        let tree = small_tree(TreeVariant::Quadratic);
        let shared = tree.share();
        tree.insert_data(point(1, 0.0, 0.0)).unwrap();
        assert_eq!(shared.stats().unwrap().data, 1);
    }
}
