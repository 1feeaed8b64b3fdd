#![cfg(test)]

use super::*;
use crate::types::UNORDERED_TIMESTAMP;

fn sample_graph() -> PropertyGraph {
    let mut b = GraphBuilder::new(3, 3);
    b.set_node(0, "u0", "alice", "Person").unwrap();
    b.set_node(1, "u1", "bob", "Person").unwrap();
    b.set_node(2, "u2", "eve", "Person;Bot").unwrap();
    b.add_edge(0, 1, "KNOWS", 5).unwrap();
    b.add_edge(1, 2, "KNOWS", 10).unwrap();
    b.add_edge(2, 0, "BLOCKS", 15).unwrap();
    b.finish().unwrap()
}

#[test]
fn builder_assigns_label_bits_in_registration_order() {
    let g = sample_graph();
    assert_eq!(g.node_label_name(0), Some("Person"));
    assert_eq!(g.node_label_name(1), Some("Bot"));
    assert_eq!(g.edge_label_name(0), Some("KNOWS"));
    assert_eq!(g.edge_label_name(1), Some("BLOCKS"));
    assert_eq!(g.csr().node_label(2), 0b11);
}

#[test]
fn uuid_index_roundtrip() {
    let g = sample_graph();
    assert_eq!(g.node_by_uuid("u1"), Some(1));
    assert_eq!(g.node_uuid(1), "u1");
    assert_eq!(g.node_name(1), "bob");
    assert_eq!(g.node_by_uuid("missing"), None);
}

#[test]
fn label_mask_single_positive() {
    let g = sample_graph();
    let mask = g.node_label_mask("Person").unwrap();
    assert_eq!(mask.positive, 0b01);
    assert_eq!(mask.negative, 0);
    assert!(mask.matches(0b01));
    assert!(mask.matches(0b11));
    assert!(!mask.matches(0b10));
}

#[test]
fn label_mask_negated() {
    let g = sample_graph();
    let mask = g.node_label_mask("~Bot").unwrap();
    assert_eq!(mask.positive, 0);
    assert_eq!(mask.negative, 0b10);
    assert!(mask.matches(0b01));
    assert!(!mask.matches(0b10));
    assert!(!mask.matches(0b11));
    // The empty label set also satisfies a pure-negative mask.
    assert!(mask.matches(0));
}

#[test]
fn label_mask_combined_set() {
    let g = sample_graph();
    let mask = g.node_label_mask("Person;~Bot").unwrap();
    assert!(mask.matches(0b01));
    assert!(!mask.matches(0b11));
}

#[test]
fn label_mask_any_sentinel_matches_everything() {
    let g = sample_graph();
    let node = g.node_label_mask("any").unwrap();
    assert_eq!(node, LabelMask::default());
    assert!(node.matches(0));
    assert!(node.matches(u32::MAX));
    let edge = g.edge_label_mask("ANY").unwrap();
    assert!(edge.matches(0b10));
}

#[test]
fn unknown_positive_label_short_circuits() {
    let g = sample_graph();
    assert!(g.node_label_mask("Ghost").is_none());
    assert!(g.node_label_mask("Person;Ghost").is_none());
    // Unknown labels under ~ are ignorable.
    assert_eq!(g.node_label_mask("~Ghost"), Some(LabelMask::default()));
    assert!(g.node_label_mask("Person;~Ghost").is_some());
}

#[test]
fn matched_state_reset_and_counts() {
    let g = sample_graph();
    g.csr().store_node_matched(0, 0b1);
    g.csr().store_node_matched(2, 0b10);
    g.csr().store_edge_matched(0, 0b1);
    assert_eq!(g.count_matched_nodes(), 2);
    assert_eq!(g.count_matched_edges(), 1);
    g.reset_matched_status();
    assert_eq!(g.count_matched_nodes(), 0);
    assert_eq!(g.count_matched_edges(), 0);
}

#[test]
fn post_construction_label_registration() {
    let mut g = sample_graph();
    let bit = g.register_label(LabelKind::Node, "Admin").unwrap();
    assert_eq!(bit, 2);
    // Registration is idempotent.
    assert_eq!(g.register_label(LabelKind::Node, "Admin").unwrap(), bit);
    g.add_to_node_label(0, bit);
    let mask = g.node_label_mask("Admin").unwrap();
    assert!(mask.matches(g.csr().node_label(0)));
    assert!(!mask.matches(g.csr().node_label(1)));

    let ebit = g.register_label(LabelKind::Edge, "AUDITED").unwrap();
    g.add_to_edge_label(0, ebit);
    assert_ne!(g.csr().edge_data(0).label & (1 << ebit), 0);
}

#[test]
fn label_limit_is_enforced() {
    let mut b = GraphBuilder::new(1, 0);
    for i in 0..32 {
        b.node_label(&format!("L{i}")).unwrap();
    }
    let err = b.node_label("L32");
    assert!(matches!(err, Err(GraphError::LimitExceeded(_))));
}

#[test]
fn edge_attribute_columns_follow_the_band_sort() {
    let mut b = GraphBuilder::new(2, 2);
    b.set_node(0, "a", "a", "N").unwrap();
    b.set_node(1, "b", "b", "N").unwrap();
    // Inserted out of destination order within the same label band.
    b.add_edge(0, 1, "E", UNORDERED_TIMESTAMP).unwrap();
    b.add_edge(0, 0, "E", UNORDERED_TIMESTAMP).unwrap();
    b.set_edge_attribute(
        "weight",
        ColumnData::I64(vec![10, 20]), // insertion order: 0->1 then 0->0
    )
    .unwrap();
    let g = b.finish().unwrap();
    // After the sort edge 0 is 0->0, edge 1 is 0->1.
    assert_eq!(g.csr().edge_dst(0), 0);
    assert_eq!(g.csr().edge_dst(1), 1);
    match g.edge_attribute("weight").unwrap() {
        ColumnData::I64(v) => assert_eq!(v, &vec![20, 10]),
        other => panic!("unexpected column type {other:?}"),
    }
}
