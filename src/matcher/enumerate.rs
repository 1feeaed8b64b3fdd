//! Subgraph isomorphism enumeration over the simulation-pruned candidates.
//!
//! Embeddings extend one query node at a time following the plan's matching
//! order. Each extension picks a pivot among the already-placed query
//! neighbors, enumerates the pivot's label band, and filters by match bit,
//! degree, injectivity, and connectivity to every other placed neighbor.

use rayon::prelude::*;
use smallvec::SmallVec;

use crate::csr::{CsrGraph, Dir, EdgeData};
use crate::graph::PropertyGraph;
use crate::query::QueryPlan;
use crate::types::NodeId;

use super::simulation::match_node_degree;

/// Work chunk for the level-synchronous extension loop.
const CHUNK_SIZE: usize = 256;

/// Scheduling policy for the enumeration phase.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Level-synchronous breadth-first extension (the default).
    #[default]
    Bfs,
    /// Depth-first extension; trades parallel width for memory.
    Dfs,
}

/// A partial embedding: data node chosen for each placed matching-order
/// position.
type Embedding = SmallVec<[NodeId; 8]>;

/// A query edge between the next query node and an already-placed one.
struct Neighbor {
    /// Matching-order position of the placed endpoint.
    order_pos: usize,
    /// The connecting query edge's constraint.
    constraint: EdgeData,
}

/// Counts embeddings of the query pattern in the data graph.
pub fn subgraph_count(graph: &PropertyGraph, plan: &QueryPlan, strategy: MatchStrategy) -> u64 {
    let data = graph.csr();
    let nq = plan.num_query_nodes() as usize;
    let first_q = plan.order[0];

    let seeds: Vec<Embedding> = (0..data.num_nodes())
        .into_par_iter()
        .filter(|&dn| {
            data.node_matched(dn) & (1 << first_q) != 0 && match_node_degree(data, plan, first_q, dn)
        })
        .map(|dn| {
            let mut emb = Embedding::new();
            emb.push(dn);
            emb
        })
        .collect();

    if nq == 1 {
        return seeds.len() as u64;
    }

    match strategy {
        MatchStrategy::Bfs => bfs_count(data, plan, seeds),
        MatchStrategy::Dfs => seeds
            .into_par_iter()
            .map(|mut emb| dfs_count(data, plan, &mut emb))
            .sum(),
    }
}

fn bfs_count(data: &CsrGraph, plan: &QueryPlan, mut queue: Vec<Embedding>) -> u64 {
    let nq = plan.num_query_nodes() as usize;
    for level in 1..nq {
        if queue.is_empty() {
            return 0;
        }
        let (neighbors, num_in) = construct_neighbors(plan, level);
        if level == nq - 1 {
            // Final level: count extensions without materializing them.
            return queue
                .par_iter()
                .with_min_len(CHUNK_SIZE)
                .map(|emb| extension_candidates(data, plan, emb, &neighbors, num_in).len() as u64)
                .sum();
        }
        let next_queue: Vec<Embedding> = queue
            .par_iter()
            .with_min_len(CHUNK_SIZE)
            .flat_map_iter(|emb| {
                extension_candidates(data, plan, emb, &neighbors, num_in)
                    .into_iter()
                    .map(move |dst| {
                        let mut next = emb.clone();
                        next.push(dst);
                        next
                    })
            })
            .collect();
        queue = next_queue;
    }
    unreachable!("loop returns at the final level");
}

fn dfs_count(data: &CsrGraph, plan: &QueryPlan, emb: &mut Embedding) -> u64 {
    let nq = plan.num_query_nodes() as usize;
    let level = emb.len();
    let (neighbors, num_in) = construct_neighbors(plan, level);
    let candidates = extension_candidates(data, plan, emb, &neighbors, num_in);
    if level == nq - 1 {
        return candidates.len() as u64;
    }
    let mut count = 0u64;
    for dst in candidates {
        emb.push(dst);
        count += dfs_count(data, plan, emb);
        emb.pop();
    }
    count
}

/// Collects the query edges linking `order[level]` to already-placed query
/// nodes. Incoming neighbors precede outgoing ones; the split index is
/// returned alongside.
fn construct_neighbors(plan: &QueryPlan, level: usize) -> (Vec<Neighbor>, usize) {
    let next_q = plan.order[level];
    let qcsr = &plan.query;
    let mut neighbors = Vec::new();
    for qe in qcsr.in_edges(next_q) {
        let pos = plan.order_of[qe.neighbor as usize] as usize;
        if pos < level {
            neighbors.push(Neighbor {
                order_pos: pos,
                constraint: qcsr.edge_data(qe.id),
            });
        }
    }
    let num_in = neighbors.len();
    for qe in qcsr.out_edges(next_q) {
        let pos = plan.order_of[qe.neighbor as usize] as usize;
        if pos < level {
            neighbors.push(Neighbor {
                order_pos: pos,
                constraint: qcsr.edge_data(qe.id),
            });
        }
    }
    (neighbors, num_in)
}

/// Picks the placed neighbor whose candidate band is smallest. Short lists
/// skip the scan.
fn pick_neighbor(
    data: &CsrGraph,
    emb: &Embedding,
    neighbors: &[Neighbor],
    num_in: usize,
) -> usize {
    if neighbors.len() < 3 {
        return 0;
    }
    let mut index = 0usize;
    let mut best = u64::MAX;
    for (i, nb) in neighbors.iter().enumerate() {
        let d_vertex = emb[nb.order_pos];
        // An in-neighbor supplies candidates from its outgoing band and
        // vice versa.
        let dir = if i < num_in { Dir::Out } else { Dir::In };
        let band = data.degree_matching(d_vertex, &nb.constraint, dir);
        if band < best {
            best = band;
            index = i;
        }
    }
    index
}

/// All data nodes that can extend `emb` at its current level.
fn extension_candidates(
    data: &CsrGraph,
    plan: &QueryPlan,
    emb: &Embedding,
    neighbors: &[Neighbor],
    num_in: usize,
) -> Vec<NodeId> {
    let mut out = Vec::new();

    if neighbors.is_empty() {
        // No placed query neighbor constrains the next node (the query
        // graph is disconnected once star edges are stripped): every
        // surviving candidate is admissible.
        for dn in 0..data.num_nodes() {
            if to_add(data, plan, emb, dn, usize::MAX, neighbors, num_in) {
                out.push(dn);
            }
        }
        return out;
    }

    let pivot = pick_neighbor(data, emb, neighbors, num_in);
    let d_vertex = emb[neighbors[pivot].order_pos];
    let constraint = neighbors[pivot].constraint;
    let dir = if pivot < num_in { Dir::Out } else { Dir::In };

    for &word in data.edge_label_values() {
        if !constraint.matches_label(word) {
            continue;
        }
        for de in data.edges_with_label(d_vertex, word, dir) {
            if to_add(data, plan, emb, de.neighbor, pivot, neighbors, num_in) {
                out.push(de.neighbor);
            }
        }
    }
    out
}

/// The extension filter: match bit, degree, injectivity, and connectivity
/// to every placed non-pivot neighbor in the correct direction.
fn to_add(
    data: &CsrGraph,
    plan: &QueryPlan,
    emb: &Embedding,
    dst: NodeId,
    pivot: usize,
    neighbors: &[Neighbor],
    num_in: usize,
) -> bool {
    let next_q = plan.order[emb.len()];
    if data.node_matched(dst) & (1 << next_q) == 0 {
        return false;
    }
    if !match_node_degree(data, plan, next_q, dst) {
        return false;
    }
    if emb.contains(&dst) {
        return false;
    }
    for (i, nb) in neighbors.iter().enumerate() {
        if i == pivot {
            continue;
        }
        let d_vertex = emb[nb.order_pos];
        let connected = if i < num_in {
            // Query edge placed -> next: the data edge must run the same way.
            data.is_connected(d_vertex, dst, &nb.constraint)
        } else {
            data.is_connected(dst, d_vertex, &nb.constraint)
        };
        if !connected {
            return false;
        }
    }
    true
}
