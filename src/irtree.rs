//! ## IR-tree builder
//!
//! Overlays an inverted file on an already-built R-tree: a single post-order
//! walk that, at each node, aggregates its children's keyword content into a
//! pseudo-document and stores that pseudo-document as the node's own
//! representative for its parent. The tree structure itself is untouched —
//! this module only populates the accompanying `InvertedFile`.

use crate::exceptions::IrTreeError;
use crate::invertedfile::{ClusterId, InvertedFile, PseudoDocument, TermWeights};
use crate::node::{Node, NodeCodec};
use crate::rtree::SpatialObject;
use crate::storage::{PageId, PageStore};

/// Resolves a leaf document's term weights. Out of scope for this crate's core
/// (a real document store lives elsewhere); this is the dataflow boundary the
/// builder calls into.
pub trait DocumentStore {
    /// Returns the term weights for `doc_id`.
    ///
    /// # Errors
    ///
    /// Returns `IrTreeError::MissingDocument` if `doc_id` cannot be resolved.
    fn load_terms(&self, doc_id: u64) -> Result<TermWeights, IrTreeError>;
}

/// Resolves a document's cluster assignment for the cluster-enhanced builder.
pub trait ClusterMap {
    /// Returns the cluster id `doc_id` belongs to.
    ///
    /// # Errors
    ///
    /// Returns `IrTreeError::MissingCluster` if `doc_id` has no assignment.
    fn cluster_of(&self, doc_id: u64) -> Result<ClusterId, IrTreeError>;
}

fn read_node<T, S>(store: &S, id: PageId) -> Result<Node<T>, IrTreeError>
where
    T: SpatialObject + NodeCodec,
    S: PageStore,
{
    let bytes = store.load_node(id)?;
    Node::load(&bytes)
}

/// Builds the flat (non-clustered) inverted file for the subtree rooted at
/// `root`. At a leaf, each child document's terms are loaded from `documents`
/// and added under the node; at an index node, each child is recursed into
/// first and its returned pseudo-document is added under the child's id.
/// Tolerates nodes with no postings (returns an empty pseudo-document).
pub fn ir<T, S, D, F>(store: &S, inverted: &F, documents: &D, root: PageId) -> Result<PseudoDocument, IrTreeError>
where
    T: SpatialObject + NodeCodec,
    S: PageStore,
    D: DocumentStore,
    F: InvertedFile,
{
    let node = read_node::<T, S>(store, root)?;
    inverted.create(root);

    if node.is_leaf() {
        for entry in &node.entries {
            let Some(payload) = &entry.payload else { continue };
            let doc_id = payload.id();
            let terms = documents.load_terms(doc_id)?;
            inverted.add_document(root, doc_id, &terms, None);
        }
    } else {
        for entry in &node.entries {
            let child_doc = ir::<T, S, D, F>(store, inverted, documents, entry.child_id)?;
            inverted.add_document(root, entry.child_id.0 as u64, &child_doc, None);
        }
    }
    Ok(inverted.store(root))
}

/// Cluster-aware variant of [`ir`]. Leaf documents are routed to their cluster
/// via `clusters`; each node's pseudo-document is returned as a list of
/// `(cluster, terms)` pairs and propagated upward with each cluster slot kept
/// separate. Interior nodes add every child's per-cluster pseudo-documents
/// under that child's id, tagged with the originating cluster.
pub fn cir_cluster_enhance<T, S, D, C, F>(
    store: &S,
    inverted: &F,
    documents: &D,
    clusters: &C,
    root: PageId,
) -> Result<Vec<(ClusterId, PseudoDocument)>, IrTreeError>
where
    T: SpatialObject + NodeCodec,
    S: PageStore,
    D: DocumentStore,
    C: ClusterMap,
    F: InvertedFile,
{
    let node = read_node::<T, S>(store, root)?;
    inverted.create(root);

    if node.is_leaf() {
        for entry in &node.entries {
            let Some(payload) = &entry.payload else { continue };
            let doc_id = payload.id();
            let terms = documents.load_terms(doc_id)?;
            let cluster = clusters.cluster_of(doc_id)?;
            inverted.add_document(root, doc_id, &terms, Some(cluster));
        }
    } else {
        for entry in &node.entries {
            let child_pseudo_docs =
                cir_cluster_enhance::<T, S, D, C, F>(store, inverted, documents, clusters, entry.child_id)?;
            for (cluster, terms) in child_pseudo_docs {
                inverted.add_document(root, entry.child_id.0 as u64, &terms, Some(cluster));
            }
        }
    }
    Ok(inverted.store_cluster_enhance(root))
}
