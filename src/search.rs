//! ## Top-k spatial-keyword search (`lkt`)
//!
//! Best-first branch-and-bound over a min-heap of `(entry, cost)`, mirroring
//! the k-NN search in [`crate::rtree`] but bounding on a combined
//! spatial/textual score instead of distance alone. A node's per-child score
//! comes from the accompanying [`InvertedFile`]'s ranking functions rather
//! than from the tree itself, so `lkt` drives its own traversal over the page
//! store instead of going through `RTree::nearest_neighbor_query`.

use crate::exceptions::IrTreeError;
use crate::invertedfile::{InvertedFile, KeywordId};
use crate::node::{Node, NodeCodec};
use crate::rtree::SpatialObject;
use crate::storage::{PageId, PageStore};
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A spatial-keyword query: a location, its weight within an aggregate query
/// (ignored by plain `lkt`), and the keywords of interest with optional
/// per-keyword weights for the cluster-enhanced ranking function.
#[derive(Debug, Clone)]
pub struct Query {
    pub location: crate::geometry::Point,
    pub weight: f64,
    pub keywords: Vec<KeywordId>,
    pub keyword_weights: Option<Vec<f64>>,
}

impl Query {
    pub fn new(location: crate::geometry::Point, keywords: Vec<KeywordId>) -> Self {
        Query {
            location,
            weight: 1.0,
            keywords,
            keyword_weights: None,
        }
    }
}

/// The spatial, textual and combined cost of a candidate relative to a query.
/// Ordered by `total` ascending; ties are broken by nothing here (see
/// [`SearchResult`]'s `Ord`, which adds the id tiebreak).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cost {
    pub spatial: f64,
    pub textual: f64,
    pub total: f64,
}

impl Eq for Cost {}
impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        OrderedFloat(self.total).cmp(&OrderedFloat(other.total))
    }
}

/// A search hit: the winning object's id and its cost breakdown. Ordered by
/// `(cost.total, id)` ascending, per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    pub id: u64,
    pub cost: Cost,
}

impl Eq for SearchResult {}
impl PartialOrd for SearchResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for SearchResult {
    fn cmp(&self, other: &Self) -> Ordering {
        OrderedFloat(self.cost.total)
            .cmp(&OrderedFloat(other.cost.total))
            .then(self.id.cmp(&other.id))
    }
}

/// Combines a spatial distance and a textual (inverted-file) score into one
/// monotone cost. `ir` is expected in `[0, 1]`, higher is better; `spatial` is
/// a raw distance, normalized by `max_d`. Lower totals are better.
pub fn combined_score(spatial: f64, ir: f64, alpha: f64, max_d: f64) -> Cost {
    let spatial_cost = (spatial / max_d).max(0.0);
    let textual_cost = (1.0 - ir).max(0.0);
    Cost {
        spatial: spatial_cost,
        textual: textual_cost,
        total: alpha * spatial_cost + (1.0 - alpha) * textual_cost,
    }
}

enum Frontier<T> {
    Node(PageId, u32),
    Data(T),
}

struct Candidate<T> {
    cost: Cost,
    frontier: Frontier<T>,
}

impl<T> PartialEq for Candidate<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}
impl<T> Eq for Candidate<T> {}
impl<T> PartialOrd for Candidate<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for Candidate<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost.cmp(&other.cost)
    }
}

fn read_node<T, S>(store: &S, id: PageId) -> Result<Node<T>, IrTreeError>
where
    T: SpatialObject + NodeCodec,
    S: PageStore,
{
    let bytes = store.load_node(id)?;
    Node::load(&bytes)
}

/// Finds the `topk` best-scoring objects under `root` for `query`, per
/// spec.md §4.F. `num_clusters` selects the ranking function: `0` uses
/// `InvertedFile::ranking_sum`, anything else uses
/// `ranking_sum_cluster_enhance`. Ties at the kth cost are all reported, as in
/// k-NN.
///
/// # Errors
///
/// Returns `IrTreeError::Shape` if `query.location`'s dimension does not
/// match `dimension`. Propagates any `IrTreeError` raised while loading
/// nodes from `store`.
#[allow(clippy::too_many_arguments)]
pub fn lkt<T, S, F>(
    store: &S,
    inverted: &F,
    root: PageId,
    root_level: u32,
    dimension: usize,
    query: &Query,
    topk: usize,
    alpha: f64,
    max_d: f64,
    num_clusters: usize,
) -> Result<Vec<SearchResult>, IrTreeError>
where
    T: SpatialObject + NodeCodec,
    S: PageStore,
    F: InvertedFile,
{
    if query.location.dimension() != dimension {
        return Err(IrTreeError::Shape {
            expected_dim: dimension,
            found_dim: query.location.dimension(),
        });
    }
    let mut heap: BinaryHeap<std::cmp::Reverse<Candidate<T>>> = BinaryHeap::new();
    heap.push(std::cmp::Reverse(Candidate {
        cost: Cost { spatial: 0.0, textual: 0.0, total: 0.0 },
        frontier: Frontier::Node(root, root_level),
    }));

    let mut results = Vec::new();
    let mut kth_cost: Option<f64> = None;

    while let Some(std::cmp::Reverse(candidate)) = heap.pop() {
        if let Some(kc) = kth_cost {
            if candidate.cost.total > kc {
                break;
            }
        }
        match candidate.frontier {
            Frontier::Data(object) => {
                results.push(SearchResult { id: object.id(), cost: candidate.cost });
                if results.len() >= topk && kth_cost.is_none() {
                    kth_cost = Some(candidate.cost.total);
                }
            }
            Frontier::Node(id, level) => {
                let node = read_node::<T, S>(store, id)?;
                let child_keys: Vec<u64> = node
                    .entries
                    .iter()
                    .map(|e| if level == 0 { e.payload.as_ref().map_or(0, |p| p.id()) } else { e.child_id.0 as u64 })
                    .collect();
                let scores = if num_clusters != 0 {
                    let weights = query
                        .keyword_weights
                        .clone()
                        .unwrap_or_else(|| vec![1.0; query.keywords.len()]);
                    inverted.ranking_sum_cluster_enhance(id, &query.keywords, &weights)
                } else {
                    inverted.ranking_sum(id, &query.keywords)
                };

                for (entry, child_key) in node.entries.iter().zip(child_keys.iter()) {
                    let Some(&ir_score) = scores.get(child_key) else { continue };
                    let spatial = entry.mbr.minimum_distance(&query.location);
                    let cost = combined_score(spatial, ir_score, alpha, max_d);

                    if level == 0 {
                        if let Some(payload) = &entry.payload {
                            heap.push(std::cmp::Reverse(Candidate {
                                cost,
                                frontier: Frontier::Data(payload.clone()),
                            }));
                        }
                    } else {
                        heap.push(std::cmp::Reverse(Candidate {
                            cost,
                            frontier: Frontier::Node(entry.child_id, level - 1),
                        }));
                    }
                }
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Region};
    use crate::invertedfile::{MemoryInvertedFile, TermWeights};
    use crate::node::Entry;
    use crate::storage::MemoryPageStore;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Doc {
        doc_id: u64,
        x: f64,
        y: f64,
    }

    impl SpatialObject for Doc {
        fn id(&self) -> u64 {
            self.doc_id
        }
        fn mbr(&self) -> Region {
            Region::from_point(&Point::new(vec![self.x, self.y]))
        }
    }

    #[test]
    fn combined_score_is_monotonic_in_both_arguments() {
        let near_relevant = combined_score(1.0, 1.0, 0.5, 10.0);
        let far_relevant = combined_score(5.0, 1.0, 0.5, 10.0);
        let near_irrelevant = combined_score(1.0, 0.0, 0.5, 10.0);
        assert!(near_relevant.total < far_relevant.total);
        assert!(near_relevant.total < near_irrelevant.total);
    }

    #[test]
    fn lkt_returns_the_closest_matching_leaf_document() {
        let store = MemoryPageStore::new();
        let mut leaf: Node<Doc> = Node::new_leaf(PageId::NEW, 2);
        let near = Doc { doc_id: 1, x: 0.0, y: 0.0 };
        let far = Doc { doc_id: 2, x: 100.0, y: 100.0 };
        leaf.insert_entry(Entry::leaf(near.mbr(), PageId::NEW, near.clone()));
        leaf.insert_entry(Entry::leaf(far.mbr(), PageId::NEW, far.clone()));
        leaf.recompute_mbr();
        let leaf_id = store.store_node(PageId::NEW, leaf.store().unwrap()).unwrap();

        let inverted = MemoryInvertedFile::new();
        inverted.create(leaf_id);
        inverted.add_document(leaf_id, 1, &TermWeights::from([(10, 1.0)]), None);
        inverted.add_document(leaf_id, 2, &TermWeights::from([(10, 1.0)]), None);

        let query = Query::new(Point::new(vec![0.0, 0.0]), vec![10]);
        let results = lkt::<Doc, _, _>(&store, &inverted, leaf_id, 0, 2, &query, 1, 0.5, 200.0, 0).unwrap();
        assert_eq!(results[0].id, 1);
    }

    #[test]
    fn lkt_skips_children_missing_from_the_ranking_map() {
        let store = MemoryPageStore::new();
        let mut leaf: Node<Doc> = Node::new_leaf(PageId::NEW, 2);
        let matching = Doc { doc_id: 1, x: 0.0, y: 0.0 };
        let unmatched = Doc { doc_id: 2, x: 0.1, y: 0.1 };
        leaf.insert_entry(Entry::leaf(matching.mbr(), PageId::NEW, matching.clone()));
        leaf.insert_entry(Entry::leaf(unmatched.mbr(), PageId::NEW, unmatched.clone()));
        leaf.recompute_mbr();
        let leaf_id = store.store_node(PageId::NEW, leaf.store().unwrap()).unwrap();

        let inverted = MemoryInvertedFile::new();
        inverted.create(leaf_id);
        inverted.add_document(leaf_id, 1, &TermWeights::from([(10, 1.0)]), None);

        let query = Query::new(Point::new(vec![0.0, 0.0]), vec![10]);
        let results = lkt::<Doc, _, _>(&store, &inverted, leaf_id, 0, 2, &query, 5, 0.5, 200.0, 0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);
    }
}
