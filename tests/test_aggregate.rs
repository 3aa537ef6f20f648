//! Scenario test for the aggregate query façade: combined MBR and merged
//! keyword set over three queries.

use irtree::aggregate::AggregateQuery;
use irtree::geometry::Point;
use irtree::search::{Cost, Query};

#[test]
fn scenario_combined_mbr_and_merged_keywords_over_three_queries() {
    let aggregate = AggregateQuery::new(
        vec![
            Query::new(Point::new(vec![0.0, 0.0]), vec![1, 2]),
            Query::new(Point::new(vec![10.0, 0.0]), vec![2, 3]),
            Query::new(Point::new(vec![0.0, 10.0]), vec![3, 4]),
        ],
        |costs: &[Cost]| costs.iter().map(|c| c.total).sum(),
    );

    let mbr = aggregate.mbr();
    assert_eq!(mbr.low(), &[0.0, 0.0]);
    assert_eq!(mbr.high(), &[10.0, 10.0]);

    let mut keywords = aggregate.combined_keywords();
    keywords.sort();
    assert_eq!(keywords, vec![1, 2, 3, 4]);

    assert_eq!(aggregate.queries().len(), 3);
}
