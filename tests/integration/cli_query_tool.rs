//! Drives the query-tool binary end to end.

use std::fs;

use assert_cmd::Command;
use lattice::{GraphBuilder, UNORDERED_TIMESTAMP};

fn write_triangle_snapshot(dir: &std::path::Path) -> std::path::PathBuf {
    let mut b = GraphBuilder::new(3, 3);
    b.set_node(0, "0", "n0", "Person").unwrap();
    b.set_node(1, "1", "n1", "Person").unwrap();
    b.set_node(2, "2", "n2", "Person").unwrap();
    b.add_edge(0, 1, "KNOWS", UNORDERED_TIMESTAMP).unwrap();
    b.add_edge(1, 2, "KNOWS", UNORDERED_TIMESTAMP).unwrap();
    b.add_edge(2, 0, "KNOWS", UNORDERED_TIMESTAMP).unwrap();
    let g = b.finish().unwrap();
    let path = dir.join("triangle.lat");
    g.save_graph(&path).unwrap();
    path
}

fn write_property_file(dir: &std::path::Path) -> std::path::PathBuf {
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
    let path = dir.join("graph.json");
    fs::write(&path, metadata.to_string()).unwrap();
    path
}

#[test]
fn inline_query_against_snapshot_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let graph = write_triangle_snapshot(dir.path());
    Command::cargo_bin("query-tool")
        .unwrap()
        .arg(&graph)
        .arg("--serialized")
        .arg("--query")
        .arg("MATCH (a:Person)-[:KNOWS]->(b:Person) RETURN a, b")
        .assert()
        .success();
}

#[test]
fn property_file_graph_loads_without_flags() {
    let dir = tempfile::tempdir().unwrap();
    let graph = write_property_file(dir.path());
    Command::cargo_bin("query-tool")
        .unwrap()
        .arg(&graph)
        .arg("--query")
        .arg("MATCH (a:Host)-[:LINKS]->(b:Host) RETURN a, b")
        .assert()
        .success();
}

#[test]
fn missing_graph_file_is_fatal() {
    Command::cargo_bin("query-tool")
        .unwrap()
        .arg("/nonexistent/graph.lat")
        .arg("--serialized")
        .arg("--query")
        .arg("MATCH (a) RETURN a")
        .assert()
        .failure();
}

#[test]
fn list_of_queries_writes_counts_file() {
    let dir = tempfile::tempdir().unwrap();
    let graph = write_triangle_snapshot(dir.path());

    let q1 = dir.path().join("edges.cql");
    fs::write(
        &q1,
        "MATCH (a:Person)-[:KNOWS]->(b:Person) RETURN a, b",
    )
    .unwrap();
    let q2 = dir.path().join("triangles.cql");
    fs::write(
        &q2,
        "MATCH (a:Person)-[:KNOWS]->(b:Person)-[:KNOWS]->(c:Person)-[:KNOWS]->(a) RETURN a",
    )
    .unwrap();
    let list = dir.path().join("queries.txt");
    fs::write(
        &list,
        format!("{}\n{}\n", q1.display(), q2.display()),
    )
    .unwrap();
    let out_dir = dir.path().join("out");

    Command::cargo_bin("query-tool")
        .unwrap()
        .arg(&graph)
        .arg("--serialized")
        .arg("--list-of-queries")
        .arg(&list)
        .arg("--output")
        .arg("--output-location")
        .arg(&out_dir)
        .assert()
        .success();

    let counts = fs::read_to_string(out_dir.join("queries.count")).unwrap();
    let lines: Vec<&str> = counts.lines().collect();
    assert_eq!(lines, vec!["edges.cql 3", "triangles.cql 3"]);
}

#[test]
fn window_flag_is_honored() {
    let dir = tempfile::tempdir().unwrap();
    let mut b = GraphBuilder::new(3, 2);
    for v in 0..3 {
        b.set_node(v, &v.to_string(), "", "E").unwrap();
    }
    b.add_edge(0, 1, "READ", 5).unwrap();
    b.add_edge(1, 2, "WRITE", 100).unwrap();
    let g = b.finish().unwrap();
    let path = dir.path().join("events.lat");
    g.save_graph(&path).unwrap();

    // The WRITE edge falls outside the window, so the two-hop pattern
    // cannot complete; the tool still exits cleanly with zero matches.
    Command::cargo_bin("query-tool")
        .unwrap()
        .arg(&path)
        .arg("--serialized")
        .arg("--window")
        .arg("0")
        .arg("10")
        .arg("--query")
        .arg("MATCH (a)-[:READ]->(b)-[:WRITE]->(c) RETURN a")
        .assert()
        .success();
}
