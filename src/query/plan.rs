//! Lowers query IR onto a small CSR query graph and a matching order.
//!
//! The planner is also the early-rejection gate: a query that names a label
//! the data graph does not carry can never match, so it reports
//! [`PlanOutcome::NoMatch`] without touching the matcher.

use regex::Regex;
use tracing::{debug, warn};

use crate::csr::{CsrGraph, EdgeData};
use crate::error::{GraphError, Result};
use crate::graph::PropertyGraph;
use crate::query::ir::{NodeFilter, QueryEdge, QueryNode};
use crate::types::{QueryNodeId, MAX_QUERY_EDGES, MAX_QUERY_NODES};

/// A variable-length edge extracted from the pattern.
#[derive(Clone, Debug)]
pub struct StarEdge {
    /// Query node the paths start from.
    pub src: QueryNodeId,
    /// Query node the paths must reach.
    pub dst: QueryNodeId,
    /// Traversal restriction on intermediate edges (zero = any).
    pub constraint: EdgeData,
    /// All-paths mode (`**`) instead of shortest-path mode (`*`).
    pub all_paths: bool,
}

/// Executable form of a query: the query CSR, per-node filters, star edges,
/// and the matching order.
pub struct QueryPlan {
    /// The query pattern as a label-banded CSR (plain edges only).
    pub query: CsrGraph,
    /// Compiled per-query-node name filters.
    pub filters: Vec<Option<Regex>>,
    /// Star edges, handled by the path matcher.
    pub stars: Vec<StarEdge>,
    /// Matching order: position → query node, descending total degree.
    pub order: Vec<QueryNodeId>,
    /// Inverse of `order`: query node → position.
    pub order_of: Vec<u32>,
    /// Distinct `(label, required)` constraints among plain query edges,
    /// used by the degree pruning checks.
    pub distinct_constraints: Vec<EdgeData>,
}

impl QueryPlan {
    /// Number of query nodes (excluding synthetic star nodes).
    #[inline]
    pub fn num_query_nodes(&self) -> u32 {
        self.query.num_nodes()
    }

    /// Number of plain query edges.
    #[inline]
    pub fn num_plain_edges(&self) -> u64 {
        self.query.num_edges()
    }

    /// Positive (required) label mask of a query node.
    #[inline]
    pub fn node_required(&self, q: QueryNodeId) -> u32 {
        self.query.node_matched(q)
    }

    /// Node-label predicate against a data node's label bits.
    #[inline]
    pub fn match_node_label(&self, q: QueryNodeId, data_label: u32) -> bool {
        (self.query.node_label(q) & data_label) == self.node_required(q)
    }
}

/// Outcome of planning: either an executable plan or a proof that the query
/// cannot match anything.
pub enum PlanOutcome {
    /// The query is feasible.
    Plan(Box<QueryPlan>),
    /// The query can never match (unknown label, bad filter); the caller
    /// must reset match state and report zero.
    NoMatch,
}

/// Builds a plan from IR. Capacity violations are hard errors; semantic
/// impossibilities come back as [`PlanOutcome::NoMatch`].
pub fn build_plan(
    graph: &PropertyGraph,
    nodes: &[QueryNode],
    edges: &[QueryEdge],
    filters: &[NodeFilter],
) -> Result<PlanOutcome> {
    // The node count comes from the edge list; an edge-less query falls
    // back to the node table.
    let mut num_query_nodes = 0u64;
    for e in edges {
        num_query_nodes = num_query_nodes
            .max(e.src as u64 + 1)
            .max(e.dst as u64 + 1);
    }
    if edges.is_empty() {
        for n in nodes {
            num_query_nodes = num_query_nodes.max(n.id as u64 + 1);
        }
    }
    if num_query_nodes == 0 {
        return Ok(PlanOutcome::NoMatch);
    }

    let plain: Vec<&QueryEdge> = edges.iter().filter(|e| !e.is_star()).collect();
    let star_irs: Vec<&QueryEdge> = edges.iter().filter(|e| e.is_star()).collect();

    if num_query_nodes as usize + star_irs.len() > MAX_QUERY_NODES {
        return Err(GraphError::LimitExceeded(
            "more than 32 query nodes (including star edges)",
        ));
    }
    if plain.len() + star_irs.len() > MAX_QUERY_EDGES {
        return Err(GraphError::LimitExceeded("more than 64 query edges"));
    }

    let n = num_query_nodes as usize;

    // Per-node label specs; the IR node table is authoritative, missing
    // entries default to the any sentinel.
    let mut specs: Vec<&str> = vec!["any"; n];
    for node in nodes {
        if (node.id as usize) < n {
            if let Some(spec) = &node.label {
                specs[node.id as usize] = spec;
            }
        }
    }

    // Early rejection: every referenced label must exist.
    let mut node_masks = Vec::with_capacity(n);
    for spec in &specs {
        match graph.node_label_mask(spec) {
            Some(mask) => node_masks.push(mask),
            None => {
                debug!(label = spec, "query node label absent from data graph");
                return Ok(PlanOutcome::NoMatch);
            }
        }
    }
    let mut plain_masks = Vec::with_capacity(plain.len());
    for e in &plain {
        match graph.edge_label_mask(&e.label) {
            Some(mask) => plain_masks.push(mask),
            None => {
                debug!(label = %e.label, "query edge label absent from data graph");
                return Ok(PlanOutcome::NoMatch);
            }
        }
    }
    let mut stars = Vec::with_capacity(star_irs.len());
    for e in &star_irs {
        let all_paths = e.label.starts_with("**");
        let rest = e.label.trim_start_matches('*');
        let constraint = match rest.strip_prefix('=') {
            Some(restrictions) => match graph.edge_label_mask(restrictions) {
                Some(mask) => EdgeData {
                    label: mask.positive | mask.negative,
                    timestamp: 0,
                    required: mask.positive as u64,
                },
                None => {
                    debug!(label = %e.label, "star restriction label absent from data graph");
                    return Ok(PlanOutcome::NoMatch);
                }
            },
            None => EdgeData::default(),
        };
        stars.push(StarEdge {
            src: e.src,
            dst: e.dst,
            constraint,
            all_paths,
        });
    }

    // Compile name filters; a bad pattern means the query as written can
    // never be honored, which callers treat like a parse failure.
    let mut compiled_filters: Vec<Option<Regex>> = vec![None; n];
    for f in filters {
        if (f.node as usize) >= n {
            continue;
        }
        match Regex::new(&f.pattern) {
            Ok(re) => compiled_filters[f.node as usize] = Some(re),
            Err(err) => {
                warn!(pattern = %f.pattern, %err, "rejecting query with invalid node filter");
                return Ok(PlanOutcome::NoMatch);
            }
        }
    }

    // Build the query CSR over plain edges.
    let mut out_index = vec![0u64; n];
    for e in &plain {
        out_index[e.src as usize] += 1;
    }
    let mut sum = 0u64;
    for slot in out_index.iter_mut() {
        sum += *slot;
        *slot = sum;
    }
    let mut order_scratch: Vec<usize> = (0..plain.len()).collect();
    order_scratch.sort_by_key(|&i| plain[i].src);
    let mut out_dst = Vec::with_capacity(plain.len());
    let mut edata = Vec::with_capacity(plain.len());
    for &i in &order_scratch {
        let e = plain[i];
        let mask = plain_masks[i];
        out_dst.push(e.dst);
        edata.push(EdgeData {
            label: mask.positive | mask.negative,
            timestamp: e.timestamp,
            required: mask.positive as u64,
        });
    }
    let mut query = CsrGraph::construct_and_sort_index(
        num_query_nodes as u32,
        out_index,
        out_dst,
        edata,
    )?;
    query.set_node_labels(
        node_masks
            .iter()
            .map(|m| m.positive | m.negative)
            .collect(),
    );
    for (q, mask) in node_masks.iter().enumerate() {
        query.store_node_matched(q as QueryNodeId, mask.positive);
    }

    // Matching order: descending total degree, ties by lower id.
    let mut order: Vec<QueryNodeId> = (0..num_query_nodes as QueryNodeId).collect();
    order.sort_by_key(|&q| {
        let total = query.out_degree(q) + query.in_degree(q);
        (std::cmp::Reverse(total), q)
    });
    let mut order_of = vec![0u32; n];
    for (pos, &q) in order.iter().enumerate() {
        order_of[q as usize] = pos as u32;
    }

    let mut distinct_constraints: Vec<EdgeData> = Vec::new();
    for e in 0..query.num_edges() {
        let data = query.edge_data(e);
        if !distinct_constraints
            .iter()
            .any(|c| c.label == data.label && c.required == data.required)
        {
            distinct_constraints.push(EdgeData {
                timestamp: 0,
                ..data
            });
        }
    }

    Ok(PlanOutcome::Plan(Box::new(QueryPlan {
        query,
        filters: compiled_filters,
        stars,
        order,
        order_of,
        distinct_constraints,
    })))
}
