#![allow(dead_code)]

//! Shared test fixtures used across the integration test suite.

use irtree::geometry::Region;
use irtree::rtree::{Properties, RTree, SpatialObject, TreeVariant};
use irtree::storage::MemoryPageStore;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TestPoint {
    pub id: u64,
    pub x: f64,
    pub y: f64,
}

impl SpatialObject for TestPoint {
    fn id(&self) -> u64 {
        self.id
    }
    fn mbr(&self) -> Region {
        Region::new(vec![self.x, self.y], vec![self.x, self.y])
    }
}

pub fn point(id: u64, x: f64, y: f64) -> TestPoint {
    TestPoint { id, x, y }
}

pub fn tree_with(variant: TreeVariant, leaf_capacity: usize, index_capacity: usize) -> RTree<TestPoint> {
    let properties = Properties {
        variant,
        leaf_capacity,
        index_capacity,
        near_minimum_overlap_factor: leaf_capacity.min(index_capacity),
        ..Properties::default()
    };
    RTree::new(properties, MemoryPageStore::new()).unwrap()
}
