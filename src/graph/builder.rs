//! Incremental construction of an attributed graph.
//!
//! Ingest declares node and edge counts up front, registers labels, sets
//! node identities and edges in any order, then calls [`GraphBuilder::finish`]
//! to materialize the sorted bidirectional CSR. Edge attribute columns are
//! supplied in edge-insertion order; the builder remaps them onto the final
//! edge ids produced by the label-band sort.

use rustc_hash::FxHashMap;

use crate::csr::{CsrGraph, EdgeData};
use crate::error::{GraphError, Result};
use crate::graph::{ColumnData, LabelKind, PropertyGraph};
use crate::types::NodeId;

struct PendingEdge {
    src: NodeId,
    dst: NodeId,
    label: u32,
    timestamp: u64,
    /// Insertion index, used to remap attribute columns after the sort.
    ordinal: usize,
}

/// Builder for [`PropertyGraph`]; the incremental-construction entry point
/// used by ingest.
pub struct GraphBuilder {
    num_nodes: u32,
    node_label_names: Vec<String>,
    node_label_ids: FxHashMap<String, u32>,
    edge_label_names: Vec<String>,
    edge_label_ids: FxHashMap<String, u32>,
    node_uuids: Vec<String>,
    node_names: Vec<String>,
    node_labels: Vec<u32>,
    edges: Vec<PendingEdge>,
    node_attributes: FxHashMap<String, ColumnData>,
    edge_attributes: FxHashMap<String, ColumnData>,
}

impl GraphBuilder {
    /// Starts a builder for a graph of `num_nodes` nodes, reserving room
    /// for `num_edges` edges.
    pub fn new(num_nodes: u32, num_edges: u64) -> GraphBuilder {
        let n = num_nodes as usize;
        GraphBuilder {
            num_nodes,
            node_label_names: Vec::new(),
            node_label_ids: FxHashMap::default(),
            edge_label_names: Vec::new(),
            edge_label_ids: FxHashMap::default(),
            node_uuids: (0..n).map(|v| v.to_string()).collect(),
            node_names: vec![String::new(); n],
            node_labels: vec![0; n],
            edges: Vec::with_capacity(num_edges as usize),
            node_attributes: FxHashMap::default(),
            edge_attributes: FxHashMap::default(),
        }
    }

    /// Registers (or resolves) a node label, returning its bit position.
    pub fn node_label(&mut self, name: &str) -> Result<u32> {
        Self::intern(
            &mut self.node_label_names,
            &mut self.node_label_ids,
            name,
            LabelKind::Node,
        )
    }

    /// Registers (or resolves) an edge label, returning its bit position.
    pub fn edge_label(&mut self, name: &str) -> Result<u32> {
        Self::intern(
            &mut self.edge_label_names,
            &mut self.edge_label_ids,
            name,
            LabelKind::Edge,
        )
    }

    fn intern(
        names: &mut Vec<String>,
        ids: &mut FxHashMap<String, u32>,
        name: &str,
        kind: LabelKind,
    ) -> Result<u32> {
        if let Some(&bit) = ids.get(name) {
            return Ok(bit);
        }
        if names.len() >= 32 {
            return Err(GraphError::LimitExceeded(match kind {
                LabelKind::Node => "more than 32 distinct node labels",
                LabelKind::Edge => "more than 32 distinct edge labels",
            }));
        }
        let bit = names.len() as u32;
        names.push(name.to_owned());
        ids.insert(name.to_owned(), bit);
        Ok(bit)
    }

    /// Sets a node's external identifier, display name, and labels.
    /// Labels may be a semicolon-joined set.
    pub fn set_node(
        &mut self,
        node: NodeId,
        uuid: &str,
        name: &str,
        labels: &str,
    ) -> Result<()> {
        if node >= self.num_nodes {
            return Err(GraphError::InvalidArgument(format!(
                "node {node} out of range"
            )));
        }
        self.node_uuids[node as usize] = uuid.to_owned();
        self.node_names[node as usize] = name.to_owned();
        for label in labels.split(';').filter(|l| !l.is_empty()) {
            let bit = self.node_label(label)?;
            self.node_labels[node as usize] |= 1 << bit;
        }
        Ok(())
    }

    /// Adds a directed edge. The label may be a semicolon-joined set.
    pub fn add_edge(
        &mut self,
        src: NodeId,
        dst: NodeId,
        labels: &str,
        timestamp: u64,
    ) -> Result<()> {
        if src >= self.num_nodes || dst >= self.num_nodes {
            return Err(GraphError::InvalidArgument(format!(
                "edge {src}->{dst} out of range"
            )));
        }
        let mut bits = 0u32;
        for label in labels.split(';').filter(|l| !l.is_empty()) {
            bits |= 1 << self.edge_label(label)?;
        }
        let ordinal = self.edges.len();
        self.edges.push(PendingEdge {
            src,
            dst,
            label: bits,
            timestamp,
            ordinal,
        });
        Ok(())
    }

    /// Attaches a node attribute column (one row per node).
    pub fn set_node_attribute(&mut self, name: &str, column: ColumnData) -> Result<()> {
        if column.len() != self.num_nodes as usize {
            return Err(GraphError::InvalidArgument(format!(
                "node column '{name}' has {} rows for {} nodes",
                column.len(),
                self.num_nodes
            )));
        }
        self.node_attributes.insert(name.to_owned(), column);
        Ok(())
    }

    /// Attaches an edge attribute column (one row per edge, in insertion
    /// order; remapped to final edge ids at finish time).
    pub fn set_edge_attribute(&mut self, name: &str, column: ColumnData) -> Result<()> {
        self.edge_attributes.insert(name.to_owned(), column);
        Ok(())
    }

    /// Builds the sorted bidirectional CSR and hands back the graph.
    pub fn finish(mut self) -> Result<PropertyGraph> {
        let n = self.num_nodes as usize;
        let num_edges = self.edges.len();
        for (name, column) in &self.edge_attributes {
            if column.len() != num_edges {
                return Err(GraphError::InvalidArgument(format!(
                    "edge column '{name}' has {} rows for {num_edges} edges",
                    column.len()
                )));
            }
        }

        // Pre-sort edges into final band order so the attribute remap is a
        // straight permutation of insertion ordinals. Stable, so parallel
        // edges keep insertion order through the CSR's own stable band
        // sort.
        self.edges.sort_by_key(|e| (e.src, e.label, e.dst));

        let mut out_index = vec![0u64; n];
        for e in &self.edges {
            out_index[e.src as usize] += 1;
        }
        let mut sum = 0u64;
        for slot in out_index.iter_mut() {
            sum += *slot;
            *slot = sum;
        }

        let out_dst: Vec<NodeId> = self.edges.iter().map(|e| e.dst).collect();
        let edata: Vec<EdgeData> = self
            .edges
            .iter()
            .map(|e| EdgeData {
                label: e.label,
                timestamp: e.timestamp,
                required: 0,
            })
            .collect();
        let perm: Vec<usize> = self.edges.iter().map(|e| e.ordinal).collect();

        let mut csr = CsrGraph::construct_and_sort_index(self.num_nodes, out_index, out_dst, edata)?;
        csr.set_node_labels(self.node_labels);

        let edge_attributes = self
            .edge_attributes
            .into_iter()
            .map(|(name, column)| (name, permute(&column, &perm)))
            .collect();

        let node_ids = self
            .node_uuids
            .iter()
            .enumerate()
            .map(|(v, uuid)| (uuid.clone(), v as NodeId))
            .collect();

        Ok(PropertyGraph {
            csr,
            node_label_names: self.node_label_names,
            node_label_ids: self.node_label_ids,
            edge_label_names: self.edge_label_names,
            edge_label_ids: self.edge_label_ids,
            node_uuids: self.node_uuids,
            node_ids,
            node_names: self.node_names,
            node_attributes: self.node_attributes,
            edge_attributes,
        })
    }
}

/// Reorders a column so row `i` of the result is row `perm[i]` of the input.
fn permute(column: &ColumnData, perm: &[usize]) -> ColumnData {
    fn pick<T: Clone>(values: &[T], perm: &[usize]) -> Vec<T> {
        perm.iter().map(|&i| values[i].clone()).collect()
    }
    match column {
        ColumnData::I32(v) => ColumnData::I32(pick(v, perm)),
        ColumnData::I64(v) => ColumnData::I64(pick(v, perm)),
        ColumnData::F32(v) => ColumnData::F32(pick(v, perm)),
        ColumnData::F64(v) => ColumnData::F64(pick(v, perm)),
        ColumnData::Bool(v) => ColumnData::Bool(pick(v, perm)),
        ColumnData::String(v) => ColumnData::String(pick(v, perm)),
        ColumnData::TimestampMs(v) => ColumnData::TimestampMs(pick(v, perm)),
        ColumnData::Struct(v) => ColumnData::Struct(pick(v, perm)),
        ColumnData::List { offsets, values } => {
            // Rebuild offsets row by row; the child column is reassembled
            // through a flattened index permutation.
            let mut new_offsets = Vec::with_capacity(perm.len() + 1);
            let mut flat: Vec<usize> = Vec::new();
            new_offsets.push(0u32);
            for &row in perm {
                let lo = offsets[row] as usize;
                let hi = offsets[row + 1] as usize;
                flat.extend(lo..hi);
                new_offsets.push(flat.len() as u32);
            }
            ColumnData::List {
                offsets: new_offsets,
                values: Box::new(permute(values, &flat)),
            }
        }
    }
}
