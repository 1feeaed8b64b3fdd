//! Dual graph simulation: the coarse pruning pass.
//!
//! Maintains the invariant that bit `q` of a data node's match mask is set
//! iff the node is still a viable candidate for query node `q`. The
//! labeling phase seeds the masks; refinement rounds clear bits until a
//! fixed point. Bits only ever clear, so the pass is monotone, confluent,
//! and terminating regardless of scheduling.

use std::cell::RefCell;

use rayon::prelude::*;
use tracing::debug;

use crate::csr::{CsrGraph, Dir};
use crate::graph::PropertyGraph;
use crate::query::QueryPlan;
use crate::types::{EventLimit, EventWindow, NodeId, QueryNodeId, UNORDERED_TIMESTAMP};

thread_local! {
    /// Per-thread candidate-timestamp buckets, reused across iterations.
    static MATCHED_EDGES: RefCell<Vec<Vec<u64>>> = const { RefCell::new(Vec::new()) };
}

/// Runs labeling plus refinement to the fixed point. Returns `false` when
/// some query node ended with an empty candidate set (all match state is
/// cleared in that case).
pub fn run_graph_simulation(
    graph: &PropertyGraph,
    plan: &QueryPlan,
    limit: Option<EventLimit>,
    window: Option<EventWindow>,
) -> bool {
    match_nodes(graph, plan, true, limit, window)
}

/// The simulation driver. With `reinitialize` the labeling phase runs
/// first; without it the worklist is re-seeded from the surviving masks
/// (used after the path matcher tightened them).
pub fn match_nodes(
    graph: &PropertyGraph,
    plan: &QueryPlan,
    reinitialize: bool,
    limit: Option<EventLimit>,
    window: Option<EventWindow>,
) -> bool {
    let data = graph.csr();
    let mut worklist = if reinitialize {
        match label_candidates(graph, plan) {
            Some(w) => w,
            None => return false,
        }
    } else {
        (0..data.num_nodes())
            .into_par_iter()
            .filter(|&v| data.node_matched(v) != 0)
            .collect()
    };

    let mut round = 0u32;
    loop {
        let survivors: Vec<NodeId> = worklist
            .par_iter()
            .with_min_len(64)
            .filter_map(|&dn| {
                refine_node(data, plan, dn, limit, window);
                (data.node_matched(dn) != 0).then_some(dn)
            })
            .collect();
        round += 1;
        debug!(
            round,
            candidates = survivors.len(),
            removed = worklist.len() - survivors.len(),
            "simulation round"
        );
        if survivors.len() == worklist.len() {
            return !survivors.is_empty();
        }
        worklist = survivors;
    }
}

/// Labeling phase: seeds match masks from label predicates and name
/// filters. Returns the initial worklist, or `None` when a query node has
/// no candidate at all (match state is cleared before returning).
fn label_candidates(graph: &PropertyGraph, plan: &QueryPlan) -> Option<Vec<NodeId>> {
    let data = graph.csr();
    let nq = plan.num_query_nodes();
    let full: u32 = if nq == 32 { u32::MAX } else { (1u32 << nq) - 1 };

    let (worklist, seen) = (0..data.num_nodes())
        .into_par_iter()
        .fold(
            || (Vec::new(), 0u32),
            |(mut list, mut seen), dn| {
                // Clearing edge masks here doubles as the per-query reset.
                for e in data.out_edges(dn) {
                    data.store_edge_matched(e.id, 0);
                }
                let label = data.node_label(dn);
                let mut bits = 0u32;
                for q in 0..nq {
                    if !plan.match_node_label(q, label) {
                        continue;
                    }
                    if let Some(filter) = &plan.filters[q as usize] {
                        if !filter.is_match(graph.node_name(dn)) {
                            continue;
                        }
                    }
                    bits |= 1 << q;
                }
                data.store_node_matched(dn, bits);
                if bits != 0 {
                    list.push(dn);
                    seen |= bits;
                }
                (list, seen)
            },
        )
        .reduce(
            || (Vec::new(), 0u32),
            |(mut a, sa), (b, sb)| {
                a.extend(b);
                (a, sa | sb)
            },
        );

    if seen != full {
        debug!(
            missing = full & !seen,
            "query node with no label-matching candidate"
        );
        graph.reset_matched_status();
        return None;
    }
    Some(worklist)
}

/// One refinement step for a single data node: clears every query-node bit
/// whose degree, neighbor-existence, or temporal checks fail.
fn refine_node(
    data: &CsrGraph,
    plan: &QueryPlan,
    dn: NodeId,
    limit: Option<EventLimit>,
    window: Option<EventWindow>,
) {
    let mask = data.node_matched(dn);
    for q in 0..plan.num_query_nodes() {
        if mask & (1 << q) == 0 {
            continue;
        }
        let ok = match_node_degree(data, plan, q, dn)
            && match_incident_edges(data, plan, q, dn, limit, window);
        if !ok {
            data.clear_node_match_bits(dn, 1 << q);
        }
    }
}

/// Labeled-degree pruning: for every distinct edge constraint in the query
/// graph, the data node must offer at least as many satisfying edges as the
/// query node demands, in both directions.
pub fn match_node_degree(data: &CsrGraph, plan: &QueryPlan, q: QueryNodeId, dn: NodeId) -> bool {
    for c in &plan.distinct_constraints {
        if data.degree_matching(dn, c, Dir::Out) < plan.query.degree_with_label(q, c.label, Dir::Out)
        {
            return false;
        }
        if data.degree_matching(dn, c, Dir::In) < plan.query.degree_with_label(q, c.label, Dir::In) {
            return false;
        }
    }
    true
}

/// Neighbor-existence check over every incident query edge of `qn`,
/// followed by a single temporal-order validation across both directions.
///
/// For each incoming query edge there must be a data in-edge whose label
/// matches and whose source still holds the far endpoint's candidate bit;
/// symmetrically for outgoing edges. Candidate timestamps are bucketed per
/// query edge (incoming buckets first) so the ordering walk can compare
/// reads against writes regardless of direction.
fn match_incident_edges(
    data: &CsrGraph,
    plan: &QueryPlan,
    qn: QueryNodeId,
    dn: NodeId,
    limit: Option<EventLimit>,
    window: Option<EventWindow>,
) -> bool {
    let qcsr = &plan.query;
    let num_in = qcsr.degree(qn, Dir::In) as usize;
    let num_out = qcsr.degree(qn, Dir::Out) as usize;
    let total = num_in + num_out;
    if total == 0 {
        return true;
    }

    MATCHED_EDGES.with(|cell| {
        let mut buckets = cell.borrow_mut();
        if buckets.len() < total {
            buckets.resize_with(total, Vec::new);
        }
        for bucket in buckets.iter_mut().take(total) {
            bucket.clear();
        }

        for (dir, offset) in [(Dir::In, 0), (Dir::Out, num_in)] {
            for de in data.edges(dn, dir) {
                if let Some(w) = window {
                    if !w.contains(de.timestamp) {
                        continue;
                    }
                }
                for (idx, qe) in qcsr.edges(qn, dir).enumerate() {
                    let constraint = qcsr.edge_data(qe.id);
                    if !constraint.matches_label(de.label) {
                        continue;
                    }
                    if data.node_matched(de.neighbor) & (1 << qe.neighbor) != 0 {
                        buckets[offset + idx].push(de.timestamp);
                    }
                }
            }
        }

        if buckets.iter().take(total).any(|b| b.is_empty()) {
            return false;
        }

        let timestamps: Vec<u64> = qcsr
            .edges(qn, Dir::In)
            .chain(qcsr.edges(qn, Dir::Out))
            .map(|qe| qe.timestamp)
            .collect();
        match_timestamp_order(&timestamps, &buckets[..total], limit)
    })
}

/// Validates that candidate data timestamps can realize the query's edge
/// ordering. Query edges carrying the unordered sentinel are exempt.
///
/// Walks query edges in ascending synthetic-timestamp order; at each step
/// the smallest candidate timestamp at or after the previous pick must
/// exist, and with a limit in force the gap between consecutive picks may
/// not exceed it.
pub fn match_timestamp_order(
    query_timestamps: &[u64],
    candidates: &[Vec<u64>],
    limit: Option<EventLimit>,
) -> bool {
    let mut remaining = query_timestamps.to_vec();
    let mut order: Vec<usize> = Vec::with_capacity(remaining.len());
    let mut prev = 0u64;
    while prev != UNORDERED_TIMESTAMP {
        let mut next = UNORDERED_TIMESTAMP;
        let mut min_edge = 0usize;
        for (i, &cur) in remaining.iter().enumerate() {
            if cur != UNORDERED_TIMESTAMP && cur >= prev && cur < next {
                next = cur;
                min_edge = i;
            }
        }
        if next != UNORDERED_TIMESTAMP {
            order.push(min_edge);
            remaining[min_edge] = UNORDERED_TIMESTAMP;
        }
        prev = next;
    }

    let mut prev = 0u64;
    for &i in &order {
        let next = candidates[i]
            .iter()
            .copied()
            .filter(|&t| t >= prev)
            .min()
            .unwrap_or(u64::MAX);
        if next == u64::MAX {
            return false;
        }
        if let Some(l) = limit {
            if next - prev > l.time {
                return false;
            }
        }
        prev = next;
    }
    true
}

/// Marks every data edge that can still play some query edge: the labels
/// agree and both endpoints hold the corresponding candidate bits. Run once
/// after simulation converges so callers can enumerate matched edges.
pub fn match_edges_after_simulation(graph: &PropertyGraph, plan: &QueryPlan) {
    let data = graph.csr();
    let qcsr = &plan.query;
    (0..data.num_nodes()).into_par_iter().for_each(|dn| {
        let mask = data.node_matched(dn);
        if mask == 0 {
            return;
        }
        for qn in 0..plan.num_query_nodes() {
            if mask & (1 << qn) == 0 {
                continue;
            }
            for qe in qcsr.out_edges(qn) {
                let constraint = qcsr.edge_data(qe.id);
                for de in data.out_edges(dn) {
                    if constraint.matches_label(de.label)
                        && data.node_matched(de.neighbor) & (1 << qe.neighbor) != 0
                    {
                        data.set_edge_match_bits(de.id, 1 << qe.id);
                    }
                }
            }
        }
    });
}
