//! Snapshot round-trips and property-file loading.

use lattice::{load_attributed_graph, ColumnData, GraphBuilder, PropertyGraph};

fn sample_graph() -> PropertyGraph {
    let mut b = GraphBuilder::new(4, 4);
    b.set_node(0, "proc-1", "sshd", "Process").unwrap();
    b.set_node(1, "file-1", "auth.log", "File").unwrap();
    b.set_node(2, "sock-1", "10.0.0.1:443", "Socket").unwrap();
    b.set_node(3, "proc-2", "bash", "Process").unwrap();
    b.add_edge(0, 1, "READ", 100).unwrap();
    b.add_edge(0, 2, "WRITE", 200).unwrap();
    b.add_edge(3, 1, "READ", 300).unwrap();
    b.add_edge(0, 3, "FORKED", 50).unwrap();
    b.set_node_attribute("pid", ColumnData::I64(vec![41, 0, 0, 42]))
        .unwrap();
    b.set_node_attribute(
        "cmdline",
        ColumnData::String(vec![
            "/usr/sbin/sshd".into(),
            String::new(),
            String::new(),
            "bash -l".into(),
        ]),
    )
    .unwrap();
    b.set_edge_attribute("bytes", ColumnData::I64(vec![512, 2048, 128, 0]))
        .unwrap();
    b.finish().unwrap()
}

fn assert_graphs_equal(a: &PropertyGraph, b: &PropertyGraph) {
    assert_eq!(a.num_nodes(), b.num_nodes());
    assert_eq!(a.num_edges(), b.num_edges());
    for v in 0..a.num_nodes() {
        assert_eq!(a.csr().node_label(v), b.csr().node_label(v));
        assert_eq!(a.node_uuid(v), b.node_uuid(v));
        assert_eq!(a.node_name(v), b.node_name(v));
        let ea: Vec<_> = a
            .csr()
            .out_edges(v)
            .map(|e| (e.neighbor, e.label, e.timestamp))
            .collect();
        let eb: Vec<_> = b
            .csr()
            .out_edges(v)
            .map(|e| (e.neighbor, e.label, e.timestamp))
            .collect();
        assert_eq!(ea, eb, "out edges of node {v}");
    }
    assert_eq!(a.node_attribute("pid"), b.node_attribute("pid"));
    assert_eq!(a.node_attribute("cmdline"), b.node_attribute("cmdline"));
    assert_eq!(a.edge_attribute("bytes"), b.edge_attribute("bytes"));
}

#[test]
fn snapshot_roundtrip_preserves_everything() {
    let g = sample_graph();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.lat");
    g.save_graph(&path).unwrap();
    let loaded = PropertyGraph::load_graph(&path).unwrap();
    assert_graphs_equal(&g, &loaded);

    // Identical query results on both sides.
    let q = "MATCH (p:Process)-[:READ]->(f:File) RETURN p, f";
    assert_eq!(
        g.match_cypher_query(None, None, q).unwrap(),
        loaded.match_cypher_query(None, None, q).unwrap()
    );
    assert_eq!(loaded.match_cypher_query(None, None, q).unwrap(), 2);
}

#[test]
fn corrupted_snapshot_is_rejected() {
    let g = sample_graph();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.lat");
    g.save_graph(&path).unwrap();
    let mut bytes = std::fs::read(&path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xff;
    std::fs::write(&path, bytes).unwrap();
    let err = PropertyGraph::load_graph(&path);
    assert!(err.is_err(), "expected corruption to be detected");
}

#[test]
fn truncated_snapshot_is_rejected() {
    let g = sample_graph();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.lat");
    g.save_graph(&path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 8]).unwrap();
    assert!(PropertyGraph::load_graph(&path).is_err());
}

#[test]
fn property_file_graph_loads_labels_names_and_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.json");
    let metadata = serde_json::json!({
        "num_nodes": 3,
        "out_index": [2, 3, 3],
        "out_dst": [1, 2, 2],
        "node_properties": {
            "Person": {"type": "bool", "values": [true, true, false]},
            "Bot": {"type": "bool", "values": [false, false, true]},
            "name": {"type": "string", "values": ["alice", "bob", "crawler"]},
            "uuid": {"type": "string", "values": ["u0", "u1", "u2"]},
            "age": {"type": "i64", "values": [34, 27, 0]}
        },
        "edge_properties": {
            "KNOWS": {"type": "bool", "values": [true, true, false]},
            "BLOCKS": {"type": "bool", "values": [false, false, true]},
            "timestamp": {"type": "i64", "values": [10, 20, 30]},
            "weight": {"type": "f64", "values": [0.5, 0.25, 1.0]}
        }
    });
    std::fs::write(&path, serde_json::to_string_pretty(&metadata).unwrap()).unwrap();

    let g = load_attributed_graph(&path).unwrap();
    assert_eq!(g.num_nodes(), 3);
    assert_eq!(g.num_edges(), 3);
    assert_eq!(g.node_by_uuid("u1"), Some(1));
    assert_eq!(g.node_name(2), "crawler");
    assert!(g.node_attribute("age").is_some());
    assert!(g.node_attribute("Person").is_none(), "labels are not attributes");
    assert!(g.edge_attribute("weight").is_some());

    let count = g
        .match_cypher_query(None, None, "MATCH (a:Person)-[:KNOWS]->(b) RETURN a, b")
        .unwrap();
    assert_eq!(count, 2);
    let count = g
        .match_cypher_query(None, None, "MATCH (a)-[:BLOCKS]->(b:Bot) RETURN a, b")
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn property_file_with_bad_column_length_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    let metadata = serde_json::json!({
        "num_nodes": 2,
        "out_index": [1, 1],
        "out_dst": [1],
        "node_properties": {
            "Person": {"type": "bool", "values": [true]}
        }
    });
    std::fs::write(&path, metadata.to_string()).unwrap();
    assert!(load_attributed_graph(&path).is_err());
}

#[test]
fn snapshot_of_property_file_graph_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("graph.json");
    let metadata = serde_json::json!({
        "num_nodes": 2,
        "out_index": [1, 1],
        "out_dst": [1],
        "node_properties": {
            "Host": {"type": "bool", "values": [true, true]},
            "name": {"type": "string", "values": ["a", "b"]}
        },
        "edge_properties": {
            "LINKS": {"type": "bool", "values": [true]}
        }
    });
    std::fs::write(&json_path, metadata.to_string()).unwrap();
    let g = load_attributed_graph(&json_path).unwrap();

    let snap_path = dir.path().join("graph.lat");
    g.save_graph(&snap_path).unwrap();
    let loaded = PropertyGraph::load_graph(&snap_path).unwrap();
    assert_graphs_equal_simple(&g, &loaded);
}

fn assert_graphs_equal_simple(a: &PropertyGraph, b: &PropertyGraph) {
    assert_eq!(a.num_nodes(), b.num_nodes());
    assert_eq!(a.num_edges(), b.num_edges());
    for v in 0..a.num_nodes() {
        assert_eq!(a.csr().node_label(v), b.csr().node_label(v));
        assert_eq!(a.node_name(v), b.node_name(v));
    }
}
