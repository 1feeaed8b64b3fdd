//! Property tests for the CSR invariants and the simulation fixed point.

use lattice::{GraphBuilder, PropertyGraph};
use proptest::prelude::*;

const LABELS: [&str; 3] = ["A", "B", "C"];
const EDGE_LABELS: [&str; 3] = ["X", "Y", "Z"];

fn arbitrary_graph() -> impl Strategy<Value = PropertyGraph> {
    let nodes = 1u32..12;
    nodes.prop_flat_map(|n| {
        let edges = proptest::collection::vec(
            (0..n, 0..n, 0usize..EDGE_LABELS.len(), 0u64..50),
            0..40,
        );
        let labels = proptest::collection::vec(0usize..LABELS.len(), n as usize);
        (Just(n), edges, labels).prop_map(|(n, edges, labels)| {
            let mut b = GraphBuilder::new(n, edges.len() as u64);
            for (v, &label) in labels.iter().enumerate() {
                b.set_node(v as u32, &v.to_string(), &format!("node-{v}"), LABELS[label])
                    .unwrap();
            }
            for &(src, dst, label, ts) in &edges {
                b.add_edge(src, dst, EDGE_LABELS[label], ts).unwrap();
            }
            b.finish().unwrap()
        })
    })
}

proptest! {
    #[test]
    fn csr_bands_are_sorted_and_degrees_balance(g in arbitrary_graph()) {
        let csr = g.csr();
        let mut out_sum = 0u64;
        let mut in_sum = 0u64;
        for v in 0..csr.num_nodes() {
            out_sum += csr.out_degree(v);
            in_sum += csr.in_degree(v);
            let band: Vec<(u32, u32)> = csr.out_edges(v).map(|e| (e.label, e.neighbor)).collect();
            let mut sorted = band.clone();
            sorted.sort();
            prop_assert_eq!(&band, &sorted, "out band of {} not sorted", v);
            // Within one label the destination run must be non-decreasing,
            // which the tuple sort above already guarantees; additionally
            // every labeled sub-band must be reachable through the band API.
            for &(label, _) in &band {
                let sub: Vec<u32> = csr
                    .edges_with_label(v, label, lattice::Dir::Out)
                    .map(|e| e.neighbor)
                    .collect();
                let mut sub_sorted = sub.clone();
                sub_sorted.sort();
                prop_assert_eq!(&sub, &sub_sorted);
            }
        }
        prop_assert_eq!(out_sum, csr.num_edges());
        prop_assert_eq!(in_sum, csr.num_edges());
    }

    #[test]
    fn is_connected_agrees_with_adjacency(g in arbitrary_graph()) {
        let csr = g.csr();
        for u in 0..csr.num_nodes() {
            for v in 0..csr.num_nodes() {
                for &word in csr.edge_label_values() {
                    let expected = csr
                        .out_edges(u)
                        .any(|e| e.neighbor == v && e.label == word);
                    prop_assert_eq!(csr.is_connected_with_label(u, v, word), expected);
                }
            }
        }
    }

    #[test]
    fn repeated_queries_are_deterministic(g in arbitrary_graph()) {
        let query = "MATCH (a:A)-[:X]->(b) RETURN a, b";
        let first = g.match_cypher_query(None, None, query).unwrap();
        let marks: Vec<u32> = (0..g.num_nodes()).map(|v| g.csr().node_matched(v)).collect();
        let second = g.match_cypher_query(None, None, query).unwrap();
        prop_assert_eq!(first, second);
        // Simulation is idempotent: the surviving masks are identical run
        // to run.
        let marks_again: Vec<u32> =
            (0..g.num_nodes()).map(|v| g.csr().node_matched(v)).collect();
        prop_assert_eq!(marks, marks_again);
    }

    #[test]
    fn bfs_and_dfs_counts_agree(g in arbitrary_graph()) {
        use lattice::MatchStrategy;
        let ir = lattice::query::cypher::compile(
            "MATCH (a)-[:X]->(b)-[:Y]->(c) RETURN a",
        ).unwrap();
        let bfs = g
            .match_query_with(None, None, &ir.nodes, &ir.edges, &ir.filters, MatchStrategy::Bfs)
            .unwrap();
        let dfs = g
            .match_query_with(None, None, &ir.nodes, &ir.edges, &ir.filters, MatchStrategy::Dfs)
            .unwrap();
        prop_assert_eq!(bfs, dfs);
    }
}
