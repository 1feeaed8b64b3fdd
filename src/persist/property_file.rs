//! Loader for the JSON property-file-graph format.
//!
//! The metadata document carries the CSR topology plus per-node and
//! per-edge columnar property tables. Boolean columns become label bits
//! (the column name is the label). The reserved node columns `name` and
//! `uuid` feed the display-name and identity tables; the reserved edge
//! column `timestamp` feeds edge timestamps. Every other column is kept as
//! an attribute.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{GraphError, Result};
use crate::graph::{ColumnData, GraphBuilder, PropertyGraph};

#[derive(Deserialize)]
struct PropertyFileGraph {
    num_nodes: u32,
    /// Exclusive prefix sums of out-degrees, one entry per node.
    out_index: Vec<u64>,
    out_dst: Vec<u32>,
    #[serde(default)]
    node_properties: BTreeMap<String, ColumnData>,
    #[serde(default)]
    edge_properties: BTreeMap<String, ColumnData>,
}

/// Reads a property-file graph and assembles a fully attributed graph.
pub fn load_attributed_graph(path: impl AsRef<Path>) -> Result<PropertyGraph> {
    let text = fs::read_to_string(path)?;
    let meta: PropertyFileGraph =
        serde_json::from_str(&text).map_err(|e| GraphError::Serialization(e.to_string()))?;

    let n = meta.num_nodes as usize;
    let num_edges = meta.out_dst.len();
    if meta.out_index.len() != n {
        return Err(GraphError::Corruption(format!(
            "out_index has {} entries for {n} nodes",
            meta.out_index.len()
        )));
    }
    for (name, column) in &meta.node_properties {
        if column.len() != n {
            return Err(GraphError::Corruption(format!(
                "node column '{name}' has {} rows for {n} nodes",
                column.len()
            )));
        }
    }
    for (name, column) in &meta.edge_properties {
        if column.len() != num_edges {
            return Err(GraphError::Corruption(format!(
                "edge column '{name}' has {} rows for {num_edges} edges",
                column.len()
            )));
        }
    }

    let mut builder = GraphBuilder::new(meta.num_nodes, num_edges as u64);

    // Reserved node columns.
    let names = match meta.node_properties.get("name") {
        Some(ColumnData::String(v)) => v.clone(),
        _ => vec![String::new(); n],
    };
    let uuids = match meta.node_properties.get("uuid") {
        Some(ColumnData::String(v)) => v.clone(),
        _ => (0..n).map(|v| v.to_string()).collect(),
    };

    // Boolean node columns are labels; BTreeMap order keeps bit assignment
    // deterministic.
    let mut node_label_columns: Vec<(&str, &[bool])> = Vec::new();
    for (name, column) in &meta.node_properties {
        if let ColumnData::Bool(values) = column {
            builder.node_label(name)?;
            node_label_columns.push((name.as_str(), values.as_slice()));
        }
    }
    for v in 0..n {
        let labels: Vec<&str> = node_label_columns
            .iter()
            .filter(|(_, values)| values[v])
            .map(|&(name, _)| name)
            .collect();
        builder.set_node(v as u32, &uuids[v], &names[v], &labels.join(";"))?;
    }

    // Edges: sources recovered from the prefix sums, labels from boolean
    // edge columns, timestamps from the reserved column.
    let mut edge_label_columns: Vec<(&str, &[bool])> = Vec::new();
    for (name, column) in &meta.edge_properties {
        if let ColumnData::Bool(values) = column {
            builder.edge_label(name)?;
            edge_label_columns.push((name.as_str(), values.as_slice()));
        }
    }
    let timestamps: Option<&[i64]> = match meta.edge_properties.get("timestamp") {
        Some(ColumnData::I64(v)) => Some(v),
        Some(ColumnData::TimestampMs(v)) => Some(v),
        _ => None,
    };

    let mut edge = 0usize;
    for v in 0..n {
        let start = if v == 0 { 0 } else { meta.out_index[v - 1] };
        let end = meta.out_index[v];
        if end < start || end as usize > num_edges {
            return Err(GraphError::Corruption(format!(
                "out_index inconsistent at node {v}"
            )));
        }
        for _ in start..end {
            let labels: Vec<&str> = edge_label_columns
                .iter()
                .filter(|(_, values)| values[edge])
                .map(|&(name, _)| name)
                .collect();
            let ts = timestamps.map(|t| t[edge] as u64).unwrap_or(0);
            builder.add_edge(v as u32, meta.out_dst[edge], &labels.join(";"), ts)?;
            edge += 1;
        }
    }
    if edge != num_edges {
        return Err(GraphError::Corruption(format!(
            "prefix sums cover {edge} of {num_edges} edges"
        )));
    }

    // Everything that is not a label or a reserved column survives as an
    // attribute.
    for (name, column) in &meta.node_properties {
        if matches!(column, ColumnData::Bool(_)) || name == "name" || name == "uuid" {
            continue;
        }
        builder.set_node_attribute(name, column.clone())?;
    }
    for (name, column) in &meta.edge_properties {
        if matches!(column, ColumnData::Bool(_)) || name == "timestamp" {
            continue;
        }
        builder.set_edge_attribute(name, column.clone())?;
    }

    builder.finish()
}
