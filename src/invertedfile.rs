//! ## Inverted-file interface (external collaborator)
//!
//! The R-tree engine treats per-node keyword postings as opaque: it only needs a
//! place to accumulate a document's term weights under a node id and a place to
//! ask "which children match these keywords, and how well." `InvertedFile` is
//! that dataflow contract; `MemoryInvertedFile` is the in-crate reference
//! collaborator used to exercise the IR-tree builder and `lkt` end-to-end in
//! tests. A production backend (e.g. a real on-disk inverted index) is out of
//! scope and would implement the same trait.

use crate::storage::PageId;
use std::collections::HashMap;
use std::sync::RwLock;

pub type KeywordId = u64;
pub type ClusterId = u64;

/// A sparse keyword weight vector: a document, or a node's pseudo-document, is
/// just a set of `(keyword, weight)` pairs.
pub type TermWeights = HashMap<KeywordId, f64>;

/// A node's summary keyword distribution, built bottom-up by the IR-tree
/// builder and stored as that node's representative document in its parent.
pub type PseudoDocument = TermWeights;

/// Per-node posting-list container. Implementations may be clustered
/// (`addDocument` with a `cluster` id) or flat (`cluster = None`).
pub trait InvertedFile {
    /// Initializes an empty posting container for `node`. Safe to call again;
    /// reinitializes to empty.
    fn create(&self, node: PageId);

    /// Accumulates `postings` into `node`'s container, under `cluster` when the
    /// cluster-enhanced variant is in use.
    fn add_document(&self, node: PageId, doc_id: u64, postings: &TermWeights, cluster: Option<ClusterId>);

    /// Aggregates `node`'s postings into a single pseudo-document summarizing
    /// the whole container, irrespective of cluster.
    fn store(&self, node: PageId) -> PseudoDocument;

    /// Aggregates `node`'s postings into one pseudo-document per cluster seen
    /// so far at this node, ordered by first appearance.
    fn store_cluster_enhance(&self, node: PageId) -> Vec<(ClusterId, PseudoDocument)>;

    /// Loads the raw per-document postings previously added at `node`.
    fn load(&self, node: PageId) -> Vec<(u64, TermWeights)>;

    /// Sums the weight of each queried keyword across `node`'s children
    /// (indexed by whatever id `add_document` was called with), returning
    /// only the children that matched at least one keyword.
    fn ranking_sum(&self, node: PageId, keywords: &[KeywordId]) -> HashMap<u64, f64>;

    /// Cluster-aware variant of `ranking_sum`: `keyword_weights` scales each
    /// keyword's contribution before summing, per matching cluster.
    fn ranking_sum_cluster_enhance(
        &self,
        node: PageId,
        keywords: &[KeywordId],
        keyword_weights: &[f64],
    ) -> HashMap<u64, f64>;
}

#[derive(Debug, Default, Clone)]
struct Posting {
    doc_id: u64,
    weights: TermWeights,
    cluster: Option<ClusterId>,
}

#[derive(Debug, Default)]
struct NodePostings {
    postings: Vec<Posting>,
}

/// In-memory `InvertedFile`: one `Vec<Posting>` per node, keyed by `PageId`.
/// Not a production index — a reference collaborator for tests and the IR-tree
/// builder examples, per spec.md §4.D.
#[derive(Debug, Default)]
pub struct MemoryInvertedFile {
    nodes: RwLock<HashMap<PageId, NodePostings>>,
}

impl MemoryInvertedFile {
    pub fn new() -> Self {
        MemoryInvertedFile::default()
    }
}

impl InvertedFile for MemoryInvertedFile {
    fn create(&self, node: PageId) {
        self.nodes
            .write()
            .expect("inverted file lock poisoned")
            .insert(node, NodePostings::default());
    }

    fn add_document(&self, node: PageId, doc_id: u64, postings: &TermWeights, cluster: Option<ClusterId>) {
        let mut guard = self.nodes.write().expect("inverted file lock poisoned");
        let entry = guard.entry(node).or_default();
        entry.postings.push(Posting {
            doc_id,
            weights: postings.clone(),
            cluster,
        });
    }

    fn store(&self, node: PageId) -> PseudoDocument {
        let guard = self.nodes.read().expect("inverted file lock poisoned");
        let mut summary = TermWeights::new();
        if let Some(entry) = guard.get(&node) {
            for posting in &entry.postings {
                for (&kw, &w) in &posting.weights {
                    *summary.entry(kw).or_insert(0.0) += w;
                }
            }
        }
        summary
    }

    fn store_cluster_enhance(&self, node: PageId) -> Vec<(ClusterId, PseudoDocument)> {
        let guard = self.nodes.read().expect("inverted file lock poisoned");
        let mut order: Vec<ClusterId> = Vec::new();
        let mut sums: HashMap<ClusterId, TermWeights> = HashMap::new();
        if let Some(entry) = guard.get(&node) {
            for posting in &entry.postings {
                let cluster = posting.cluster.unwrap_or(0);
                if !sums.contains_key(&cluster) {
                    order.push(cluster);
                }
                let summary = sums.entry(cluster).or_default();
                for (&kw, &w) in &posting.weights {
                    *summary.entry(kw).or_insert(0.0) += w;
                }
            }
        }
        order
            .into_iter()
            .map(|c| (c, sums.remove(&c).unwrap_or_default()))
            .collect()
    }

    fn load(&self, node: PageId) -> Vec<(u64, TermWeights)> {
        let guard = self.nodes.read().expect("inverted file lock poisoned");
        guard
            .get(&node)
            .map(|entry| entry.postings.iter().map(|p| (p.doc_id, p.weights.clone())).collect())
            .unwrap_or_default()
    }

    fn ranking_sum(&self, node: PageId, keywords: &[KeywordId]) -> HashMap<u64, f64> {
        let guard = self.nodes.read().expect("inverted file lock poisoned");
        let mut scores = HashMap::new();
        if let Some(entry) = guard.get(&node) {
            for posting in &entry.postings {
                let mut score = 0.0;
                for &kw in keywords {
                    if let Some(&w) = posting.weights.get(&kw) {
                        score += w;
                    }
                }
                if score > 0.0 {
                    scores.insert(posting.doc_id, score);
                }
            }
        }
        scores
    }

    fn ranking_sum_cluster_enhance(
        &self,
        node: PageId,
        keywords: &[KeywordId],
        keyword_weights: &[f64],
    ) -> HashMap<u64, f64> {
        let guard = self.nodes.read().expect("inverted file lock poisoned");
        let mut scores = HashMap::new();
        if let Some(entry) = guard.get(&node) {
            for posting in &entry.postings {
                let mut score = 0.0;
                for (i, &kw) in keywords.iter().enumerate() {
                    if let Some(&w) = posting.weights.get(&kw) {
                        let weight = keyword_weights.get(i).copied().unwrap_or(1.0);
                        score += w * weight;
                    }
                }
                if score > 0.0 {
                    scores.insert(posting.doc_id, score);
                }
            }
        }
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(KeywordId, f64)]) -> TermWeights {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn store_aggregates_all_documents_under_a_node() {
        let inverted = MemoryInvertedFile::new();
        let node = PageId(1);
        inverted.create(node);
        inverted.add_document(node, 1, &weights(&[(10, 1.0), (20, 2.0)]), None);
        inverted.add_document(node, 2, &weights(&[(10, 0.5)]), None);

        let summary = inverted.store(node);
        assert_eq!(summary.get(&10), Some(&1.5));
        assert_eq!(summary.get(&20), Some(&2.0));
    }

    #[test]
    fn store_cluster_enhance_keeps_clusters_separate() {
        let inverted = MemoryInvertedFile::new();
        let node = PageId(2);
        inverted.create(node);
        inverted.add_document(node, 1, &weights(&[(10, 1.0)]), Some(1));
        inverted.add_document(node, 2, &weights(&[(10, 5.0)]), Some(2));

        let clusters = inverted.store_cluster_enhance(node);
        assert_eq!(clusters.len(), 2);
        let cluster1 = clusters.iter().find(|(c, _)| *c == 1).unwrap();
        let cluster2 = clusters.iter().find(|(c, _)| *c == 2).unwrap();
        assert_eq!(cluster1.1.get(&10), Some(&1.0));
        assert_eq!(cluster2.1.get(&10), Some(&5.0));
    }

    #[test]
    fn ranking_sum_skips_documents_with_no_matching_keyword() {
        let inverted = MemoryInvertedFile::new();
        let node = PageId(3);
        inverted.create(node);
        inverted.add_document(node, 1, &weights(&[(10, 1.0)]), None);
        inverted.add_document(node, 2, &weights(&[(99, 1.0)]), None);

        let scores = inverted.ranking_sum(node, &[10]);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores.get(&1), Some(&1.0));
    }

    #[test]
    fn ranking_sum_cluster_enhance_scales_by_keyword_weight() {
        let inverted = MemoryInvertedFile::new();
        let node = PageId(4);
        inverted.create(node);
        inverted.add_document(node, 1, &weights(&[(10, 2.0)]), Some(1));

        let scores = inverted.ranking_sum_cluster_enhance(node, &[10], &[0.5]);
        assert_eq!(scores.get(&1), Some(&1.0));
    }

    #[test]
    fn empty_node_yields_empty_results() {
        let inverted = MemoryInvertedFile::new();
        let node = PageId(5);
        inverted.create(node);
        assert!(inverted.store(node).is_empty());
        assert!(inverted.ranking_sum(node, &[1]).is_empty());
    }
}
