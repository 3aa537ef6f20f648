//! ## Aggregate query
//!
//! `AggregateQuery` folds several [`Query`]s into one façade: a combined MBR
//! for pruning and an `aggregator` closure that reduces several per-query
//! costs into a single scalar. The search it exposes reuses `lkt`'s
//! best-first traversal structure but bounds each candidate by the
//! aggregated cost rather than a single query's cost.

use crate::exceptions::IrTreeError;
use crate::geometry::Region;
use crate::invertedfile::InvertedFile;
use crate::node::{Node, NodeCodec};
use crate::rtree::SpatialObject;
use crate::search::{combined_score, Cost, Query, SearchResult};
use crate::storage::{PageId, PageStore};
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A group of queries searched together, reduced to one scalar cost per
/// candidate by `aggregator`. `Agg` is typically a simple reduction such as
/// sum or max over the per-query costs.
pub struct AggregateQuery<Agg>
where
    Agg: Fn(&[Cost]) -> f64,
{
    queries: Vec<Query>,
    aggregator: Agg,
}

impl<Agg> AggregateQuery<Agg>
where
    Agg: Fn(&[Cost]) -> f64,
{
    pub fn new(queries: Vec<Query>, aggregator: Agg) -> Self {
        AggregateQuery { queries, aggregator }
    }

    /// Per-query weights, in query order.
    pub fn weights(&self) -> Vec<f64> {
        self.queries.iter().map(|q| q.weight).collect()
    }

    /// The minimum bounding region covering every query location.
    pub fn mbr(&self) -> Region {
        let dimension = self.queries.first().map(|q| q.location.dimension()).unwrap_or(0);
        self.queries
            .iter()
            .fold(Region::infinite(dimension), |acc, q| acc.union(&Region::from_point(&q.location)))
    }

    /// The set-union of every query's keyword ids, ordered by first
    /// appearance (duplicates removed).
    pub fn combined_keywords(&self) -> Vec<u64> {
        let mut seen = std::collections::HashSet::new();
        let mut combined = Vec::new();
        for q in &self.queries {
            for &kw in &q.keywords {
                if seen.insert(kw) {
                    combined.push(kw);
                }
            }
        }
        combined
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }
}

enum Frontier<T> {
    Node(PageId, u32),
    /// Leaf payload paired with the textual score that was used to rank it,
    /// so the final emitted cost doesn't have to (wrongly) treat it as zero.
    Data(T, f64),
}

struct Candidate<T> {
    total: f64,
    frontier: Frontier<T>,
}

impl<T> PartialEq for Candidate<T> {
    fn eq(&self, other: &Self) -> bool {
        self.total == other.total
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
        OrderedFloat(self.total).cmp(&OrderedFloat(other.total))
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

/// Searches `root` with `aggregate`, pruning with the combined MBR first and
/// then folding each query's `combined_score` through `aggregate.aggregator`.
/// Results are emitted in ascending aggregated-cost order with id as
/// tiebreak, per spec.md §4.G.
///
/// # Errors
///
/// Returns `IrTreeError::Shape` if any query location's dimension does not
/// match `dimension`. Propagates any `IrTreeError` raised while loading
/// nodes from `store`.
#[allow(clippy::too_many_arguments)]
pub fn search<T, S, F, Agg>(
    store: &S,
    inverted: &F,
    root: PageId,
    root_level: u32,
    dimension: usize,
    aggregate: &AggregateQuery<Agg>,
    topk: usize,
    alpha: f64,
    max_d: f64,
) -> Result<Vec<SearchResult>, IrTreeError>
where
    T: SpatialObject + NodeCodec,
    S: PageStore,
    F: InvertedFile,
    Agg: Fn(&[Cost]) -> f64,
{
    for q in aggregate.queries() {
        if q.location.dimension() != dimension {
            return Err(IrTreeError::Shape {
                expected_dim: dimension,
                found_dim: q.location.dimension(),
            });
        }
    }
    let combined_mbr = aggregate.mbr();
    let combined_keywords = aggregate.combined_keywords();

    let mut heap: BinaryHeap<std::cmp::Reverse<Candidate<T>>> = BinaryHeap::new();
    heap.push(std::cmp::Reverse(Candidate { total: 0.0, frontier: Frontier::Node(root, root_level) }));

    let mut results = Vec::new();
    let mut kth_cost: Option<f64> = None;

    while let Some(std::cmp::Reverse(candidate)) = heap.pop() {
        if let Some(kc) = kth_cost {
            if candidate.total > kc {
                break;
            }
        }
        match candidate.frontier {
            Frontier::Data(object, ir_score) => {
                let per_query_cost: Vec<Cost> = aggregate
                    .queries()
                    .iter()
                    .map(|q| {
                        let spatial = object.mbr().minimum_distance(&q.location);
                        combined_score(spatial, ir_score, alpha, max_d)
                    })
                    .collect();
                let total = (aggregate.aggregator)(&per_query_cost);
                // Fold the spatial and textual components through the same
                // aggregator used for `total`, so `cost` stays a genuine
                // (spatial, textual, total) breakdown instead of `total`
                // duplicated into every field.
                let spatial_only: Vec<Cost> =
                    per_query_cost.iter().map(|c| Cost { spatial: c.spatial, textual: c.spatial, total: c.spatial }).collect();
                let textual_only: Vec<Cost> =
                    per_query_cost.iter().map(|c| Cost { spatial: c.textual, textual: c.textual, total: c.textual }).collect();
                let spatial = (aggregate.aggregator)(&spatial_only);
                let textual = (aggregate.aggregator)(&textual_only);
                results.push(SearchResult { id: object.id(), cost: Cost { spatial, textual, total } });
                if results.len() >= topk && kth_cost.is_none() {
                    kth_cost = Some(total);
                }
            }
            Frontier::Node(id, level) => {
                let node = read_node::<T, S>(store, id)?;
                if !node.node_mbr.intersects(&combined_mbr) {
                    continue;
                }
                let scores = inverted.ranking_sum(id, &combined_keywords);
                for entry in &node.entries {
                    let child_key = if level == 0 {
                        entry.payload.as_ref().map_or(0, |p| p.id())
                    } else {
                        entry.child_id.0 as u64
                    };
                    let ir_score = scores.get(&child_key).copied().unwrap_or(0.0);
                    let bound = aggregate
                        .queries()
                        .iter()
                        .map(|q| combined_score(entry.mbr.minimum_distance(&q.location), ir_score, alpha, max_d).total)
                        .fold(0.0, f64::max);
                    if level == 0 {
                        if let Some(payload) = &entry.payload {
                            heap.push(std::cmp::Reverse(Candidate {
                                total: bound,
                                frontier: Frontier::Data(payload.clone(), ir_score),
                            }));
                        }
                    } else {
                        heap.push(std::cmp::Reverse(Candidate { total: bound, frontier: Frontier::Node(entry.child_id, level - 1) }));
                    }
                }
            }
        }
    }

    results.sort();
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    #[test]
    fn combined_keywords_deduplicates_preserving_first_appearance() {
        let aggregate = AggregateQuery::new(
            vec![
                Query::new(Point::new(vec![0.0, 0.0]), vec![1, 2]),
                Query::new(Point::new(vec![1.0, 1.0]), vec![2, 3]),
            ],
            |costs: &[Cost]| costs.iter().map(|c| c.total).sum(),
        );
        assert_eq!(aggregate.combined_keywords(), vec![1, 2, 3]);
    }

    #[test]
    fn mbr_covers_every_query_location() {
        let aggregate = AggregateQuery::new(
            vec![
                Query::new(Point::new(vec![0.0, 0.0]), vec![1]),
                Query::new(Point::new(vec![10.0, 10.0]), vec![1]),
            ],
            |costs: &[Cost]| costs.iter().map(|c| c.total).sum(),
        );
        let mbr = aggregate.mbr();
        assert_eq!(mbr.low(), &[0.0, 0.0]);
        assert_eq!(mbr.high(), &[10.0, 10.0]);
    }

    #[test]
    fn weights_follow_query_order() {
        let mut a = Query::new(Point::new(vec![0.0, 0.0]), vec![1]);
        a.weight = 0.25;
        let mut b = Query::new(Point::new(vec![1.0, 1.0]), vec![1]);
        b.weight = 0.75;
        let aggregate = AggregateQuery::new(vec![a, b], |costs: &[Cost]| costs.iter().map(|c| c.total).sum());
        assert_eq!(aggregate.weights(), vec![0.25, 0.75]);
    }
}
