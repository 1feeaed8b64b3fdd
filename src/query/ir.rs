//! Intermediate representation produced by the Cypher compiler and accepted
//! by the planner.
//!
//! Labels stay textual at this level: a node or edge label is either a
//! concrete name, the `any`/`ANY` sentinel, a semicolon-joined set with
//! optional `~` negations (`"A;B;~C"`), or — for edges — a star form
//! (`"*"` shortest-path, `"**"` all-paths, optionally `"*=A;~B"` with a
//! traversal restriction). Resolution to bit masks happens in the planner.

use crate::types::{QueryNodeId, UNORDERED_TIMESTAMP};

/// One node of the query pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryNode {
    /// Dense id assigned by the compiler.
    pub id: QueryNodeId,
    /// Textual label specification; `None` means match any node.
    pub label: Option<String>,
}

/// One edge of the query pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryEdge {
    /// Source query node.
    pub src: QueryNodeId,
    /// Destination query node.
    pub dst: QueryNodeId,
    /// Textual label specification (see module docs).
    pub label: String,
    /// Synthetic ordering timestamp; [`UNORDERED_TIMESTAMP`] when the edge
    /// is not ordered relative to its siblings.
    pub timestamp: u64,
}

impl QueryEdge {
    /// Plain constructor with an unordered timestamp.
    pub fn new(src: QueryNodeId, dst: QueryNodeId, label: impl Into<String>) -> QueryEdge {
        QueryEdge {
            src,
            dst,
            label: label.into(),
            timestamp: UNORDERED_TIMESTAMP,
        }
    }

    /// True when this edge is a variable-length (star) edge.
    pub fn is_star(&self) -> bool {
        self.label.starts_with('*')
    }
}

/// A regex filter applied against a node's display name during labeling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeFilter {
    /// Query node the filter constrains.
    pub node: QueryNodeId,
    /// Regex pattern, searched unanchored within the name.
    pub pattern: String,
}

/// Full compiler output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryIr {
    /// Query nodes, one entry per dense id.
    pub nodes: Vec<QueryNode>,
    /// Query edges (plain and star).
    pub edges: Vec<QueryEdge>,
    /// Node name filters.
    pub filters: Vec<NodeFilter>,
}
