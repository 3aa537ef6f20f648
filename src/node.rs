//! ## Node & entry model
//!
//! Leaf and index nodes share one entry layout so the R-tree engine's algorithms
//! (`choose_subtree`, splits, range/k-NN traversal) don't need to special-case level 0.
//! A node never holds a direct reference to another node across operations — only the
//! page identifier of its children — mirroring the page store's node-identity contract.

use crate::exceptions::IrTreeError;
use crate::geometry::Region;
use crate::storage::{NodeBytes, PageId};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An entry inside a node: an MBR, the identifier of the child this entry points at,
/// and — for leaf entries only — the opaque application payload.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entry<P> {
    pub mbr: Region,
    pub child_id: PageId,
    pub payload: Option<P>,
}

impl<P> Entry<P> {
    pub fn leaf(mbr: Region, child_id: PageId, payload: P) -> Self {
        Entry {
            mbr,
            child_id,
            payload: Some(payload),
        }
    }

    pub fn index(mbr: Region, child_id: PageId) -> Self {
        Entry {
            mbr,
            child_id,
            payload: None,
        }
    }
}

/// Either a leaf node (`level == 0`, entries carry data payloads) or an index node
/// (`level > 0`, entries point at child nodes).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node<P> {
    /// Page identifier; negative (`PageId::NEW`) until the first `store`.
    pub identifier: PageId,
    /// 0 for a leaf, > 0 for an index node.
    pub level: u32,
    pub entries: Vec<Entry<P>>,
    /// Invariant: always equals the union of `entries[i].mbr`.
    pub node_mbr: Region,
}

impl<P> Node<P> {
    pub fn new_leaf(identifier: PageId, dimension: usize) -> Self {
        Node {
            identifier,
            level: 0,
            entries: Vec::new(),
            node_mbr: Region::infinite(dimension),
        }
    }

    pub fn new_index(identifier: PageId, level: u32, dimension: usize) -> Self {
        assert!(level > 0, "index nodes have level > 0");
        Node {
            identifier,
            level,
            entries: Vec::new(),
            node_mbr: Region::infinite(dimension),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.level == 0
    }

    /// Appends an entry. Caller enforces capacity and updates `node_mbr`.
    pub fn insert_entry(&mut self, entry: Entry<P>) {
        self.entries.push(entry);
    }

    /// Removes the entry at `slot`, compacting the remaining entries.
    pub fn delete_entry(&mut self, slot: usize) -> Entry<P> {
        self.entries.remove(slot)
    }

    /// Recomputes `node_mbr` from the current entries.
    pub fn recompute_mbr(&mut self) {
        self.node_mbr = self
            .entries
            .iter()
            .fold(Region::infinite(self.node_mbr.dimension()), |acc, e| {
                acc.union(&e.mbr)
            });
    }
}

/// Marker bound the rest of the crate generalizes over instead of naming
/// `serde::Serialize`/`Deserialize` directly, so that every generic bound and
/// `impl` block stays well-formed whether or not the `serde` feature (and the
/// `serde` crate it links) is enabled — mirroring how the teacher crate gates
/// `RTreeObject`'s associated-type bound with two `#[cfg]`-selected trait
/// variants.
#[cfg(feature = "serde")]
pub trait NodeCodec: Serialize + for<'de> Deserialize<'de> {}
#[cfg(feature = "serde")]
impl<P: Serialize + for<'de> Deserialize<'de>> NodeCodec for P {}

#[cfg(not(feature = "serde"))]
pub trait NodeCodec {}
#[cfg(not(feature = "serde"))]
impl<P> NodeCodec for P {}

impl<P> Node<P>
where
    P: NodeCodec,
{
    /// Serializes this node into the page store's opaque byte form. Total and stable:
    /// every field is recoverable and round-trips to an identical value.
    ///
    /// # Errors
    ///
    /// Returns `IrTreeError::Configuration` if the crate was built without the
    /// `serde` feature, since there is no other codec to serialize through.
    #[cfg(feature = "serde")]
    pub fn store(&self) -> Result<NodeBytes, IrTreeError> {
        bincode::serialize(self).map_err(|e| IrTreeError::Storage {
            reason: format!("node serialization failed: {e}"),
        })
    }

    #[cfg(not(feature = "serde"))]
    pub fn store(&self) -> Result<NodeBytes, IrTreeError> {
        Err(IrTreeError::Configuration {
            reason: "node serialization requires the `serde` feature".into(),
        })
    }

    /// Deserializes a node previously produced by `store`.
    ///
    /// # Errors
    ///
    /// Returns `IrTreeError::Configuration` if the crate was built without the
    /// `serde` feature, since there is no other codec to deserialize through.
    #[cfg(feature = "serde")]
    pub fn load(bytes: &[u8]) -> Result<Self, IrTreeError> {
        bincode::deserialize(bytes).map_err(|e| IrTreeError::Storage {
            reason: format!("node deserialization failed: {e}"),
        })
    }

    #[cfg(not(feature = "serde"))]
    pub fn load(_bytes: &[u8]) -> Result<Self, IrTreeError> {
        Err(IrTreeError::Configuration {
            reason: "node deserialization requires the `serde` feature".into(),
        })
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn recompute_mbr_matches_union_of_entries() {
        let mut node: Node<u64> = Node::new_leaf(PageId::NEW, 2);
        node.insert_entry(Entry::leaf(
            Region::new(vec![0.0, 0.0], vec![1.0, 1.0]),
            PageId(0),
            1,
        ));
        node.insert_entry(Entry::leaf(
            Region::new(vec![2.0, 2.0], vec![3.0, 3.0]),
            PageId(0),
            2,
        ));
        node.recompute_mbr();
        assert_eq!(node.node_mbr.low(), &[0.0, 0.0]);
        assert_eq!(node.node_mbr.high(), &[3.0, 3.0]);
    }

    #[test]
    fn delete_entry_compacts_remaining_entries() {
        let mut node: Node<u64> = Node::new_leaf(PageId::NEW, 2);
        node.insert_entry(Entry::leaf(
            Region::new(vec![0.0, 0.0], vec![0.0, 0.0]),
            PageId(0),
            1,
        ));
        node.insert_entry(Entry::leaf(
            Region::new(vec![1.0, 1.0], vec![1.0, 1.0]),
            PageId(0),
            2,
        ));
        let removed = node.delete_entry(0);
        assert_eq!(removed.payload, Some(1));
        assert_eq!(node.entries.len(), 1);
        assert_eq!(node.entries[0].payload, Some(2));
    }

    #[test]
    fn store_load_round_trip_is_identity() {
        let mut node: Node<u64> = Node::new_leaf(PageId(3), 2);
        node.insert_entry(Entry::leaf(
            Region::new(vec![0.0, 0.0], vec![1.0, 1.0]),
            PageId(0),
            7,
        ));
        node.recompute_mbr();
        let bytes = node.store().unwrap();
        let round_tripped: Node<u64> = Node::load(&bytes).unwrap();
        assert_eq!(round_tripped, node);
    }
}
