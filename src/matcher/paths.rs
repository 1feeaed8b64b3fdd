//! Variable-length (star) edge handling.
//!
//! Runs after simulation has converged. For each star edge the shortest-path
//! variant grows a parallel BFS forest from every source candidate, prunes
//! destination candidates nothing reached, and walks the forest back to mark
//! intermediate nodes and traversed edges with the star's synthetic match
//! bits. The all-paths variant intersects forward and backward reachability
//! instead.
//!
//! The graph is treated as directed throughout: paths follow outgoing edges
//! and the back-walk marks the forward edge the BFS actually traversed.

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use crate::csr::{CsrGraph, Dir, EdgeData};
use crate::graph::PropertyGraph;
use crate::types::{NodeId, QueryNodeId};

const INFINITY: u32 = u32::MAX;

/// Marks shortest paths from `src_qn` candidates to `dst_qn` candidates
/// along edges satisfying `constraint`.
///
/// Intermediate nodes receive `star_node_bit`; traversed edges receive
/// `star_edge_bit`. Sources that reach no destination lose their `src_qn`
/// bit, destinations nothing reached lose their `dst_qn` bit.
pub fn find_shortest_paths(
    graph: &PropertyGraph,
    src_qn: QueryNodeId,
    dst_qn: QueryNodeId,
    constraint: EdgeData,
    star_node_bit: u32,
    star_edge_bit: u32,
) {
    let data = graph.csr();
    let n = data.num_nodes();
    let src_mask = 1u32 << src_qn;
    let dst_mask = 1u32 << dst_qn;

    let parent: Vec<AtomicU32> = (0..n).map(|_| AtomicU32::new(INFINITY)).collect();

    // Seed the frontier with every source candidate.
    let mut frontier: Vec<NodeId> = (0..n)
        .into_par_iter()
        .filter(|&v| data.node_matched(v) & src_mask != 0)
        .collect();

    // Level-synchronous traversal. Each visited node elects exactly one
    // parent via compare-exchange; sources are never traversed into, and
    // destinations do not extend the frontier.
    while !frontier.is_empty() {
        let next: Vec<NodeId> = frontier
            .par_iter()
            .flat_map_iter(|&u| {
                let parent = &parent;
                data.out_edges(u).filter_map(move |e| {
                    if !constraint.matches_label(e.label) {
                        return None;
                    }
                    let dst = e.neighbor;
                    if parent[dst as usize].load(Ordering::Relaxed) != INFINITY {
                        return None;
                    }
                    let dst_bits = data.node_matched(dst);
                    if dst_bits & src_mask != 0 {
                        return None;
                    }
                    if parent[dst as usize]
                        .compare_exchange(INFINITY, u, Ordering::Relaxed, Ordering::Relaxed)
                        .is_ok()
                        && dst_bits & dst_mask == 0
                    {
                        Some(dst)
                    } else {
                        None
                    }
                })
            })
            .collect();
        frontier = next;
    }

    // Un-match unreached destinations; collect the reached ones as walkers.
    let walkers: Vec<NodeId> = (0..n)
        .into_par_iter()
        .filter_map(|v| {
            if data.node_matched(v) & dst_mask == 0 {
                return None;
            }
            if parent[v as usize].load(Ordering::Relaxed) == INFINITY {
                data.clear_node_match_bits(v, dst_mask);
                None
            } else {
                Some(v)
            }
        })
        .collect();

    // Walk each path back to its source, claiming one edge at a time so
    // exactly one walker marks any shared suffix.
    walkers.par_iter().for_each(|&start| {
        let mut pred = start;
        loop {
            let succ = parent[pred as usize].load(Ordering::Relaxed);
            if succ == INFINITY || succ == pred {
                break;
            }
            if parent[pred as usize]
                .compare_exchange(succ, INFINITY, Ordering::Relaxed, Ordering::Relaxed)
                .is_err()
            {
                break;
            }
            if pred != start {
                data.set_node_match_bits(pred, 1 << star_node_bit);
            }
            mark_path_edge(data, succ, pred, &constraint, star_edge_bit);
            pred = succ;
        }
        // The walk bottoms out at a source; a self-parent records that the
        // source lies on a completed path.
        if data.node_matched(pred) & src_mask != 0 {
            parent[pred as usize].store(pred, Ordering::Relaxed);
        }
    });

    // Un-match sources that reached nothing.
    (0..n).into_par_iter().for_each(|v| {
        if data.node_matched(v) & src_mask != 0
            && parent[v as usize].load(Ordering::Relaxed) == INFINITY
        {
            data.clear_node_match_bits(v, src_mask);
        }
    });
}

/// Marks the data edge `from -> to` that the BFS traversed.
fn mark_path_edge(
    data: &CsrGraph,
    from: NodeId,
    to: NodeId,
    constraint: &EdgeData,
    star_edge_bit: u32,
) {
    for &word in data.edge_label_values() {
        if !constraint.matches_label(word) {
            continue;
        }
        for e in data.edges_with_label(from, word, Dir::Out) {
            if e.neighbor == to {
                data.set_edge_match_bits(e.id, 1u64 << star_edge_bit);
                return;
            }
        }
    }
}

const FWD: u32 = 0b01;
const BWD: u32 = 0b10;
const BOTH: u32 = FWD | BWD;

/// Marks every node and edge lying on *some* path from a `src_qn`
/// candidate to a `dst_qn` candidate along edges satisfying `constraint`.
///
/// Forward reachability from sources and backward reachability from
/// destinations are intersected: two-bit visited state, nodes holding both
/// bits lie on a path.
pub fn find_all_paths(
    graph: &PropertyGraph,
    src_qn: QueryNodeId,
    dst_qn: QueryNodeId,
    constraint: EdgeData,
    star_node_bit: u32,
    star_edge_bit: u32,
) {
    let data = graph.csr();
    let n = data.num_nodes();
    let src_mask = 1u32 << src_qn;
    let dst_mask = 1u32 << dst_qn;

    let visited: Vec<AtomicU32> = (0..n).map(|_| AtomicU32::new(0)).collect();

    let seeds = |mask: u32| -> Vec<NodeId> {
        (0..n)
            .into_par_iter()
            .filter(|&v| data.node_matched(v) & mask != 0)
            .collect()
    };

    propagate(data, &visited, seeds(src_mask), FWD, Dir::Out, &constraint);
    propagate(data, &visited, seeds(dst_mask), BWD, Dir::In, &constraint);

    // Nodes on some path get the star bit; endpoints off every path lose
    // their candidate bits.
    (0..n).into_par_iter().for_each(|v| {
        let vis = visited[v as usize].load(Ordering::Relaxed);
        if vis == BOTH {
            data.set_node_match_bits(v, 1 << star_node_bit);
            for e in data.out_edges(v) {
                if constraint.matches_label(e.label)
                    && visited[e.neighbor as usize].load(Ordering::Relaxed) == BOTH
                {
                    data.set_edge_match_bits(e.id, 1u64 << star_edge_bit);
                }
            }
        } else {
            if data.node_matched(v) & src_mask != 0 {
                data.clear_node_match_bits(v, src_mask);
            }
            if data.node_matched(v) & dst_mask != 0 {
                data.clear_node_match_bits(v, dst_mask);
            }
        }
    });
}

/// Level-synchronous reachability propagation of one visited bit.
fn propagate(
    data: &CsrGraph,
    visited: &[AtomicU32],
    seeds: Vec<NodeId>,
    bit: u32,
    dir: Dir,
    constraint: &EdgeData,
) {
    let mut frontier: Vec<NodeId> = seeds
        .into_par_iter()
        .filter(|&v| visited[v as usize].fetch_or(bit, Ordering::Relaxed) & bit == 0)
        .collect();
    while !frontier.is_empty() {
        let next: Vec<NodeId> = frontier
            .par_iter()
            .flat_map_iter(|&u| {
                data.edges(u, dir).filter_map(move |e| {
                    if !constraint.matches_label(e.label) {
                        return None;
                    }
                    if visited[e.neighbor as usize].fetch_or(bit, Ordering::Relaxed) & bit == 0 {
                        Some(e.neighbor)
                    } else {
                        None
                    }
                })
            })
            .collect();
        frontier = next;
    }
}
