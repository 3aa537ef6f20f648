//! ## Page store (external collaborator)
//!
//! The R-tree engine never holds nodes by in-memory pointer across operations; it
//! borrows them from a `PageStore` for the duration of a single algorithm and writes
//! them back through the same trait. This sidesteps cyclic references between the
//! tree and its storage and keeps node identity a plain integer, as spec'd in the
//! Design Notes. `MemoryPageStore` is the in-crate reference implementation used by
//! tests and examples; a production deployment would swap in a disk-backed one
//! without touching `RTree`.

use crate::exceptions::IrTreeError;
use std::sync::{Mutex, RwLock};

/// Opaque page identifier. Negative values (besides `NEW`) are never produced by a
/// store; `NEW` is the sentinel requesting allocation of a fresh page on `store_node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageId(pub i64);

impl PageId {
    /// Sentinel requesting allocation of a new page.
    pub const NEW: PageId = PageId(-1);

    pub fn is_assigned(&self) -> bool {
        self.0 >= 0
    }
}

/// The opaque, serialized form of a node as the page store sees it.
pub type NodeBytes = Vec<u8>;

/// Storage-layer contract the R-tree engine is built against. Out of scope for this
/// crate's core (per spec.md §1): a real implementation lives in a page-oriented
/// storage manager, document store, etc. This trait is the dataflow boundary.
pub trait PageStore: std::fmt::Debug {
    /// Writes `bytes` to `page`, or allocates a fresh page when `page == PageId::NEW`.
    /// Returns the page identifier the bytes were written to.
    fn store_node(&self, page: PageId, bytes: NodeBytes) -> Result<PageId, IrTreeError>;

    /// Loads the bytes previously stored at `page`.
    ///
    /// # Errors
    ///
    /// Returns `IrTreeError::InvalidPage` if `page` is unknown.
    fn load_node(&self, page: PageId) -> Result<NodeBytes, IrTreeError>;

    /// Deletes the page, freeing its identifier for reuse.
    fn delete_node(&self, page: PageId) -> Result<(), IrTreeError>;

    /// Number of IO operations performed so far (store + load + delete).
    fn io_count(&self) -> u64;

    /// Persists the tree's header bytes (root id, stats, properties) so a later
    /// process can reopen the tree via `IndexIdentifier`. Left unimplemented (fully
    /// commented out) in the system this crate generalizes; see Design Notes (b) —
    /// here it is a first-class, always-available operation.
    fn store_header(&self, header: PageId, bytes: NodeBytes) -> Result<PageId, IrTreeError>;

    /// Loads previously stored header bytes.
    fn load_header(&self, header: PageId) -> Result<NodeBytes, IrTreeError>;

    /// Flushes any buffered writes to the backing medium. A no-op for a purely
    /// in-memory store.
    fn flush(&self) -> Result<(), IrTreeError>;
}

#[derive(Debug, Default)]
struct Pages {
    slots: Vec<Option<NodeBytes>>,
}

/// Simple in-memory `PageStore`. Pages are appended to a growable vector; deleting a
/// page leaves a hole (`None`) that is never reused, matching the "identifiers never
/// recycled mid-operation" assumption the R-tree engine relies on.
#[derive(Debug)]
pub struct MemoryPageStore {
    pages: RwLock<Pages>,
    headers: RwLock<Pages>,
    io: Mutex<u64>,
}

impl Default for MemoryPageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPageStore {
    pub fn new() -> Self {
        MemoryPageStore {
            pages: RwLock::new(Pages::default()),
            headers: RwLock::new(Pages::default()),
            io: Mutex::new(0),
        }
    }

    fn bump_io(&self) {
        *self.io.lock().expect("io counter lock poisoned") += 1;
    }
}

fn store_in(pages: &RwLock<Pages>, page: PageId, bytes: NodeBytes) -> Result<PageId, IrTreeError> {
    let mut guard = pages.write().expect("page store lock poisoned");
    if page.is_assigned() {
        let idx = page.0 as usize;
        if idx >= guard.slots.len() {
            guard.slots.resize(idx + 1, None);
        }
        guard.slots[idx] = Some(bytes);
        Ok(page)
    } else {
        guard.slots.push(Some(bytes));
        Ok(PageId((guard.slots.len() - 1) as i64))
    }
}

fn load_from(pages: &RwLock<Pages>, page: PageId) -> Result<NodeBytes, IrTreeError> {
    let guard = pages.read().expect("page store lock poisoned");
    guard
        .slots
        .get(page.0 as usize)
        .and_then(|slot| slot.clone())
        .ok_or(IrTreeError::InvalidPage { page: page.0 })
}

impl PageStore for MemoryPageStore {
    fn store_node(&self, page: PageId, bytes: NodeBytes) -> Result<PageId, IrTreeError> {
        self.bump_io();
        store_in(&self.pages, page, bytes)
    }

    fn load_node(&self, page: PageId) -> Result<NodeBytes, IrTreeError> {
        self.bump_io();
        load_from(&self.pages, page)
    }

    fn delete_node(&self, page: PageId) -> Result<(), IrTreeError> {
        self.bump_io();
        let mut guard = self.pages.write().expect("page store lock poisoned");
        let idx = page.0 as usize;
        if idx >= guard.slots.len() || guard.slots[idx].is_none() {
            return Err(IrTreeError::InvalidPage { page: page.0 });
        }
        guard.slots[idx] = None;
        Ok(())
    }

    fn io_count(&self) -> u64 {
        *self.io.lock().expect("io counter lock poisoned")
    }

    fn store_header(&self, header: PageId, bytes: NodeBytes) -> Result<PageId, IrTreeError> {
        self.bump_io();
        store_in(&self.headers, header, bytes)
    }

    fn load_header(&self, header: PageId) -> Result<NodeBytes, IrTreeError> {
        self.bump_io();
        load_from(&self.headers, header)
    }

    fn flush(&self) -> Result<(), IrTreeError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_load_round_trips() {
        let store = MemoryPageStore::new();
        let page = store.store_node(PageId::NEW, vec![1, 2, 3]).unwrap();
        assert!(page.is_assigned());
        assert_eq!(store.load_node(page).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn loading_unknown_page_is_invalid_page_error() {
        let store = MemoryPageStore::new();
        let err = store.load_node(PageId(42)).unwrap_err();
        assert!(matches!(err, IrTreeError::InvalidPage { page: 42 }));
    }

    #[test]
    fn delete_then_load_is_invalid_page_error() {
        let store = MemoryPageStore::new();
        let page = store.store_node(PageId::NEW, vec![9]).unwrap();
        store.delete_node(page).unwrap();
        assert!(store.load_node(page).is_err());
    }

    #[test]
    fn io_counter_increments_on_every_operation() {
        let store = MemoryPageStore::new();
        let page = store.store_node(PageId::NEW, vec![1]).unwrap();
        store.load_node(page).unwrap();
        assert_eq!(store.io_count(), 2);
    }

    #[test]
    fn header_round_trips_independently_of_node_pages() {
        let store = MemoryPageStore::new();
        let header = store.store_header(PageId::NEW, vec![7, 7]).unwrap();
        assert_eq!(store.load_header(header).unwrap(), vec![7, 7]);
        assert!(store.load_node(header).is_err() || header.0 != 0);
    }
}
