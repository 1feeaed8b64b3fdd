//! The attributed property graph: CSR topology plus the human-readable
//! metadata the compressed representation elides.
//!
//! Node and edge labels are stored on the topology as single bits; this
//! layer owns the name↔bit registries, the node uuid↔index maps, display
//! names, and the typed attribute columns. It also hosts the matched-state
//! bookkeeping shared by every matcher phase.

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::info;

use crate::csr::{CsrGraph, Dir};
use crate::error::{GraphError, Result};
use crate::types::{EdgeId, LabelMask, NodeId, MAX_EDGE_LABELS, MAX_NODE_LABELS};

pub mod attributes;
mod builder;
mod tests;

pub use attributes::ColumnData;
pub use builder::GraphBuilder;

/// Which of the two label universes a registry call refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LabelKind {
    /// Node labels.
    Node,
    /// Edge labels.
    Edge,
}

/// A CSR topology enriched with label registries, identity maps, display
/// names, and attribute columns.
#[derive(Debug)]
pub struct PropertyGraph {
    pub(crate) csr: CsrGraph,
    pub(crate) node_label_names: Vec<String>,
    pub(crate) node_label_ids: FxHashMap<String, u32>,
    pub(crate) edge_label_names: Vec<String>,
    pub(crate) edge_label_ids: FxHashMap<String, u32>,
    /// Node index → external identifier.
    pub(crate) node_uuids: Vec<String>,
    /// External identifier → node index.
    pub(crate) node_ids: FxHashMap<String, NodeId>,
    /// Display names, matched by node filters.
    pub(crate) node_names: Vec<String>,
    pub(crate) node_attributes: FxHashMap<String, ColumnData>,
    pub(crate) edge_attributes: FxHashMap<String, ColumnData>,
}

impl PropertyGraph {
    /// The underlying topology.
    #[inline]
    pub fn csr(&self) -> &CsrGraph {
        &self.csr
    }

    /// Number of data nodes.
    #[inline]
    pub fn num_nodes(&self) -> u32 {
        self.csr.num_nodes()
    }

    /// Number of data edges.
    #[inline]
    pub fn num_edges(&self) -> u64 {
        self.csr.num_edges()
    }

    /// Resolves a label name to its bit position, registering it if new.
    /// Fails once 32 distinct labels of the kind exist.
    pub fn register_label(&mut self, kind: LabelKind, name: &str) -> Result<u32> {
        let (names, ids, cap) = match kind {
            LabelKind::Node => (
                &mut self.node_label_names,
                &mut self.node_label_ids,
                MAX_NODE_LABELS,
            ),
            LabelKind::Edge => (
                &mut self.edge_label_names,
                &mut self.edge_label_ids,
                MAX_EDGE_LABELS,
            ),
        };
        if let Some(&bit) = ids.get(name) {
            return Ok(bit);
        }
        if names.len() >= cap {
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

    /// Name of a node-label bit.
    pub fn node_label_name(&self, bit: u32) -> Option<&str> {
        self.node_label_names.get(bit as usize).map(String::as_str)
    }

    /// Name of an edge-label bit.
    pub fn edge_label_name(&self, bit: u32) -> Option<&str> {
        self.edge_label_names.get(bit as usize).map(String::as_str)
    }

    /// ORs a label bit into a node. Ingest-time only.
    pub fn add_to_node_label(&mut self, node: NodeId, bit: u32) {
        self.csr.add_node_label(node, 1 << bit);
    }

    /// ORs a label bit into an edge. Ingest-time only.
    pub fn add_to_edge_label(&mut self, edge: EdgeId, bit: u32) {
        self.csr.add_edge_label(edge, 1 << bit);
    }

    /// External identifier of a node.
    pub fn node_uuid(&self, node: NodeId) -> &str {
        &self.node_uuids[node as usize]
    }

    /// Looks up a node by its external identifier.
    pub fn node_by_uuid(&self, uuid: &str) -> Option<NodeId> {
        self.node_ids.get(uuid).copied()
    }

    /// Display name of a node (empty when the graph carries no names).
    pub fn node_name(&self, node: NodeId) -> &str {
        self.node_names
            .get(node as usize)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Read-only view of a node attribute column.
    pub fn node_attribute(&self, name: &str) -> Option<&ColumnData> {
        self.node_attributes.get(name)
    }

    /// Read-only view of an edge attribute column.
    pub fn edge_attribute(&self, name: &str) -> Option<&ColumnData> {
        self.edge_attributes.get(name)
    }

    /// Parses a label specification into positive/negative masks.
    ///
    /// Accepted forms: the `any` sentinel (`"any"` for nodes, `"ANY"` for
    /// edges, both accepted case-sensitively as in the original surface),
    /// a single label, a negated label `~X`, or a semicolon-joined set
    /// `A;B;~C`. Returns `None` when a *positive* token names a label the
    /// graph does not carry — the caller must short-circuit to zero
    /// matches. Unknown negated tokens are harmless and ignored.
    pub fn label_mask(&self, kind: LabelKind, spec: &str) -> Option<LabelMask> {
        let ids = match kind {
            LabelKind::Node => &self.node_label_ids,
            LabelKind::Edge => &self.edge_label_ids,
        };
        if spec == "any" || spec == "ANY" {
            return Some(LabelMask::default());
        }
        let mut mask = LabelMask::default();
        for token in spec.split(';') {
            let (negate, name) = match token.strip_prefix('~') {
                Some(rest) => (true, rest),
                None => (false, token),
            };
            match ids.get(name) {
                Some(&bit) => {
                    if negate {
                        mask.negative |= 1 << bit;
                    } else {
                        mask.positive |= 1 << bit;
                    }
                }
                None if negate => {}
                None => return None,
            }
        }
        Some(mask)
    }

    /// Node-label variant of [`PropertyGraph::label_mask`].
    pub fn node_label_mask(&self, spec: &str) -> Option<LabelMask> {
        self.label_mask(LabelKind::Node, spec)
    }

    /// Edge-label variant of [`PropertyGraph::label_mask`].
    pub fn edge_label_mask(&self, spec: &str) -> Option<LabelMask> {
        self.label_mask(LabelKind::Edge, spec)
    }

    /// Clears every node and edge match mask.
    pub fn reset_matched_status(&self) {
        (0..self.num_nodes()).into_par_iter().for_each(|v| {
            self.csr.store_node_matched(v, 0);
        });
        (0..self.num_edges()).into_par_iter().for_each(|e| {
            self.csr.store_edge_matched(e, 0);
        });
    }

    /// Number of nodes holding at least one match bit.
    pub fn count_matched_nodes(&self) -> u64 {
        (0..self.num_nodes())
            .into_par_iter()
            .filter(|&v| self.csr.node_matched(v) != 0)
            .count() as u64
    }

    /// Number of edges holding at least one match bit, counted from their
    /// matched source nodes.
    pub fn count_matched_edges(&self) -> u64 {
        (0..self.num_nodes())
            .into_par_iter()
            .map(|v| {
                if self.csr.node_matched(v) == 0 {
                    return 0u64;
                }
                self.csr
                    .out_edges(v)
                    .filter(|e| self.csr.edge_matched(e.id) != 0)
                    .count() as u64
            })
            .sum()
    }

    /// Nodes currently holding a match bit, as `(uuid, name)` pairs.
    pub fn matched_nodes(&self) -> Vec<(&str, &str)> {
        (0..self.num_nodes())
            .filter(|&v| self.csr.node_matched(v) != 0)
            .map(|v| (self.node_uuid(v), self.node_name(v)))
            .collect()
    }

    /// Edges currently holding a match bit, as
    /// `(src_uuid, dst_uuid, label_bits, timestamp)` tuples.
    pub fn matched_edges(&self) -> Vec<(&str, &str, u32, u64)> {
        let mut out = Vec::new();
        for v in 0..self.num_nodes() {
            if self.csr.node_matched(v) == 0 {
                continue;
            }
            for e in self.csr.edges(v, Dir::Out) {
                if self.csr.edge_matched(e.id) != 0 {
                    out.push((
                        self.node_uuid(v),
                        self.node_uuid(e.neighbor),
                        e.label,
                        e.timestamp,
                    ));
                }
            }
        }
        out
    }

    /// Matched edges incident to the node with the given external
    /// identifier, as `(src_uuid, dst_uuid, label_bits, timestamp)` tuples.
    /// Unknown identifiers yield an empty list.
    pub fn matched_neighbor_edges(&self, uuid: &str) -> Vec<(&str, &str, u32, u64)> {
        let Some(v) = self.node_by_uuid(uuid) else {
            return Vec::new();
        };
        if self.csr.node_matched(v) == 0 {
            return Vec::new();
        }
        self.csr
            .out_edges(v)
            .filter(|e| self.csr.edge_matched(e.id) != 0)
            .map(|e| {
                (
                    self.node_uuid(v),
                    self.node_uuid(e.neighbor),
                    e.label,
                    e.timestamp,
                )
            })
            .collect()
    }

    /// Writes the matched edges to `path`, one
    /// `src_uuid dst_uuid label timestamp` line per edge.
    pub fn write_matched_edges(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        use std::io::Write;
        let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
        for (src, dst, label, timestamp) in self.matched_edges() {
            writeln!(out, "{src} {dst} {label:#x} {timestamp}")?;
        }
        Ok(())
    }

    /// Emits node/edge counts and the declared label and attribute names.
    pub fn report_graph_stats(&self) {
        info!(
            nodes = self.num_nodes(),
            edges = self.num_edges(),
            "graph loaded"
        );
        info!(labels = ?self.node_label_names, "node labels");
        info!(labels = ?self.edge_label_names, "edge labels");
        let mut node_attrs: Vec<String> = self
            .node_attributes
            .iter()
            .map(|(k, v)| format!("{k}: {}", v.type_name()))
            .collect();
        node_attrs.sort();
        let mut edge_attrs: Vec<String> = self
            .edge_attributes
            .iter()
            .map(|(k, v)| format!("{k}: {}", v.type_name()))
            .collect();
        edge_attrs.sort();
        info!(attributes = ?node_attrs, "node attributes");
        info!(attributes = ?edge_attrs, "edge attributes");
    }
}
