//! End-to-end query scenarios over hand-built graphs.

use lattice::{
    EventLimit, EventWindow, GraphBuilder, PropertyGraph, UNORDERED_TIMESTAMP,
};

fn triangle(third_label: &str) -> PropertyGraph {
    let mut b = GraphBuilder::new(3, 3);
    b.set_node(0, "0", "n0", "Person").unwrap();
    b.set_node(1, "1", "n1", "Person").unwrap();
    b.set_node(2, "2", "n2", third_label).unwrap();
    b.add_edge(0, 1, "KNOWS", UNORDERED_TIMESTAMP).unwrap();
    b.add_edge(1, 2, "KNOWS", UNORDERED_TIMESTAMP).unwrap();
    b.add_edge(2, 0, "KNOWS", UNORDERED_TIMESTAMP).unwrap();
    b.finish().unwrap()
}

const TRIANGLE_QUERY: &str =
    "MATCH (a:Person)-[:KNOWS]->(b:Person)-[:KNOWS]->(c:Person)-[:KNOWS]->(a) RETURN a, b, c";

#[test]
fn plain_triangle_counts_rotations() {
    let g = triangle("Person");
    let count = g.match_cypher_query(None, None, TRIANGLE_QUERY).unwrap();
    assert_eq!(count, 3);
    // Every data node stays a candidate for every query node.
    for v in 0..3 {
        assert_eq!(g.csr().node_matched(v) & 0b111, 0b111);
    }
}

#[test]
fn label_pruning_empties_the_triangle() {
    let g = triangle("Bot");
    let count = g.match_cypher_query(None, None, TRIANGLE_QUERY).unwrap();
    assert_eq!(count, 0);
    for v in 0..3 {
        assert_eq!(g.csr().node_matched(v), 0);
    }
}

#[test]
fn substring_filter_on_single_node_query() {
    let mut b = GraphBuilder::new(5, 0);
    let names = ["alpha.log", "beta.log", "alpha.txt", "gamma.log", "alpha.md"];
    for (i, name) in names.iter().enumerate() {
        b.set_node(i as u32, &i.to_string(), name, "File").unwrap();
    }
    let g = b.finish().unwrap();
    let count = g
        .match_cypher_query(
            None,
            None,
            "MATCH (f:File) WHERE f.name CONTAINS 'alpha' RETURN f",
        )
        .unwrap();
    assert_eq!(count, 3);
    for v in [0, 2, 4] {
        assert_eq!(g.csr().node_matched(v), 1);
    }
    for v in [1, 3] {
        assert_eq!(g.csr().node_matched(v), 0);
    }
}

fn read_write_graph() -> PropertyGraph {
    let mut b = GraphBuilder::new(5, 4);
    for v in 0..5 {
        b.set_node(v, &v.to_string(), &format!("n{v}"), "Event").unwrap();
    }
    b.add_edge(0, 1, "READ", 5).unwrap();
    b.add_edge(1, 2, "WRITE", 10).unwrap();
    b.add_edge(0, 3, "READ", 20).unwrap();
    b.add_edge(3, 4, "WRITE", 15).unwrap();
    b.finish().unwrap()
}

const READ_WRITE_QUERY: &str =
    "MATCH (a)-[e1:READ]->(b)-[e2:WRITE]->(c) WHERE e1.time < e2.time RETURN a, b, c";

#[test]
fn temporal_ordering_selects_the_ascending_path() {
    let g = read_write_graph();
    let count = g.match_cypher_query(None, None, READ_WRITE_QUERY).unwrap();
    assert_eq!(count, 1);
}

#[test]
fn event_window_excludes_out_of_range_edges() {
    let g = read_write_graph();
    let window = EventWindow { start: 0, end: 9 };
    let count = g
        .match_cypher_query(None, Some(window), READ_WRITE_QUERY)
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn event_limit_caps_the_gap_between_events() {
    let g = read_write_graph();
    // The surviving path has timestamps 5 then 10: a gap of 5.
    let tight = EventLimit { time: 4 };
    let count = g
        .match_cypher_query(Some(tight), None, READ_WRITE_QUERY)
        .unwrap();
    assert_eq!(count, 0);
    let loose = EventLimit { time: 5 };
    let count = g
        .match_cypher_query(Some(loose), None, READ_WRITE_QUERY)
        .unwrap();
    assert_eq!(count, 1);
}

fn chain(n: u32) -> PropertyGraph {
    let mut b = GraphBuilder::new(n, (n - 1) as u64);
    for v in 0..n {
        b.set_node(v, &v.to_string(), &v.to_string(), "Host").unwrap();
    }
    for v in 0..n - 1 {
        b.add_edge(v, v + 1, "KNOWS", UNORDERED_TIMESTAMP).unwrap();
    }
    b.finish().unwrap()
}

#[test]
fn shortest_path_star_edge_marks_intermediates() {
    let g = chain(6);
    let count = g
        .match_cypher_query(
            None,
            None,
            "MATCH p = shortestPath((a)-[:KNOWS*]->(b)) WHERE a.id = 0 AND b.id = 5 RETURN p",
        )
        .unwrap();
    assert_eq!(count, 1);
    // The synthetic star node occupies bit 2 (after the two query nodes).
    for v in 1..5 {
        assert_ne!(g.csr().node_matched(v) & (1 << 2), 0, "node {v}");
    }
    assert_ne!(g.csr().node_matched(0) & 0b01, 0);
    assert_ne!(g.csr().node_matched(5) & 0b10, 0);
}

#[test]
fn star_edge_with_unreachable_destination_matches_nothing() {
    let g = chain(6);
    // The chain only runs forward; nothing reaches node 0.
    let count = g
        .match_cypher_query(
            None,
            None,
            "MATCH p = shortestPath((a)-[:KNOWS*]->(b)) WHERE a.id = 5 AND b.id = 0 RETURN p",
        )
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn all_paths_star_edge_marks_every_path_member() {
    // Diamond: 0 -> 1 -> 3 and 0 -> 2 -> 3, plus a stray 0 -> 4.
    let mut b = GraphBuilder::new(5, 5);
    for v in 0..5 {
        b.set_node(v, &v.to_string(), &v.to_string(), "Host").unwrap();
    }
    b.add_edge(0, 1, "KNOWS", UNORDERED_TIMESTAMP).unwrap();
    b.add_edge(0, 2, "KNOWS", UNORDERED_TIMESTAMP).unwrap();
    b.add_edge(1, 3, "KNOWS", UNORDERED_TIMESTAMP).unwrap();
    b.add_edge(2, 3, "KNOWS", UNORDERED_TIMESTAMP).unwrap();
    b.add_edge(0, 4, "KNOWS", UNORDERED_TIMESTAMP).unwrap();
    let g = b.finish().unwrap();
    let count = g
        .match_cypher_query(
            None,
            None,
            "MATCH (a)-[:KNOWS*]->(b) WHERE a.id = 0 AND b.id = 3 RETURN a, b",
        )
        .unwrap();
    assert_eq!(count, 1);
    // Both interior branch nodes lie on a path.
    assert_ne!(g.csr().node_matched(1) & (1 << 2), 0);
    assert_ne!(g.csr().node_matched(2) & (1 << 2), 0);
    // The stray branch does not.
    assert_eq!(g.csr().node_matched(4), 0);
}

#[test]
fn unknown_label_returns_zero_and_clears_state() {
    let g = triangle("Person");
    // Populate match state first.
    g.match_cypher_query(None, None, TRIANGLE_QUERY).unwrap();
    assert!(g.count_matched_nodes() > 0);
    let count = g
        .match_cypher_query(None, None, "MATCH (x:Ghost) RETURN x")
        .unwrap();
    assert_eq!(count, 0);
    assert_eq!(g.count_matched_nodes(), 0);
}

#[test]
fn negated_label_only_matches_the_complement() {
    let g = triangle("Bot");
    let count = g
        .match_cypher_query(None, None, "MATCH (n) WHERE NOT n:Bot RETURN n")
        .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn unlabeled_node_matches_everything() {
    let g = triangle("Bot");
    let count = g.match_cypher_query(None, None, "MATCH (n) RETURN n").unwrap();
    assert_eq!(count, 3);
}

#[test]
fn any_edge_label_matches_all_edges() {
    let g = triangle("Person");
    let count = g
        .match_cypher_query(None, None, "MATCH (a)-[e]->(b) RETURN a, b")
        .unwrap();
    assert_eq!(count, 3);
}

#[test]
fn single_node_query_counts_label_holders() {
    let g = triangle("Bot");
    let count = g
        .match_cypher_query(None, None, "MATCH (p:Person) RETURN p")
        .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn parse_error_returns_zero_matches() {
    let g = triangle("Person");
    let count = g
        .match_cypher_query(None, None, "MATCH (a:Person RETURN a")
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn fixed_length_path_desugars_and_matches() {
    let g = chain(6);
    let count = g
        .match_cypher_query(
            None,
            None,
            "MATCH (a:Host)-[:KNOWS*3..3]->(b:Host) RETURN a, b",
        )
        .unwrap();
    // 0->3, 1->4, 2->5.
    assert_eq!(count, 3);
}

#[test]
fn multi_label_edge_spec_requires_every_positive_bit() {
    let mut b = GraphBuilder::new(3, 2);
    for v in 0..3 {
        b.set_node(v, &v.to_string(), "", "N").unwrap();
    }
    b.add_edge(0, 1, "READ", UNORDERED_TIMESTAMP).unwrap();
    b.add_edge(0, 2, "READ;WRITE", UNORDERED_TIMESTAMP).unwrap();
    let g = b.finish().unwrap();
    // Every positive bit must be present on the data edge, so only the
    // dual-labeled edge qualifies.
    let count = g
        .match_cypher_query(None, None, "MATCH (a)-[:READ|WRITE]->(b) RETURN a, b")
        .unwrap();
    assert_eq!(count, 1);
    let count = g
        .match_cypher_query(None, None, "MATCH (a)-[:READ]->(b) RETURN a, b")
        .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn dfs_strategy_agrees_with_bfs() {
    use lattice::MatchStrategy;
    let g = triangle("Person");
    let ir = lattice::query::cypher::compile(TRIANGLE_QUERY).unwrap();
    let bfs = g
        .match_query_with(None, None, &ir.nodes, &ir.edges, &ir.filters, MatchStrategy::Bfs)
        .unwrap();
    let dfs = g
        .match_query_with(None, None, &ir.nodes, &ir.edges, &ir.filters, MatchStrategy::Dfs)
        .unwrap();
    assert_eq!(bfs, 3);
    assert_eq!(bfs, dfs);
}

#[test]
fn matched_edges_survive_for_enumeration() {
    let g = triangle("Person");
    g.match_cypher_query(None, None, TRIANGLE_QUERY).unwrap();
    assert_eq!(g.count_matched_edges(), 3);
    assert_eq!(g.matched_nodes().len(), 3);
    let edges = g.matched_edges();
    assert_eq!(edges.len(), 3);
    // Per-node neighbor enumeration sees exactly that node's marked edge.
    let neighbors = g.matched_neighbor_edges("0");
    assert_eq!(neighbors.len(), 1);
    assert_eq!(neighbors[0].1, "1");
    assert!(g.matched_neighbor_edges("missing").is_empty());

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("matched.txt");
    g.write_matched_edges(&out).unwrap();
    let written = std::fs::read_to_string(&out).unwrap();
    assert_eq!(written.lines().count(), 3);
}
