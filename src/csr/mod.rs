//! Compressed sparse row topology with bit-packed labels.
//!
//! The same structure backs both the data graph and the (tiny) query graph:
//! prefix-summed outgoing adjacency mirrored into incoming adjacency, with
//! each per-node edge band sorted by `(label, destination)`. The sort makes
//! every `(node, label)` pair a contiguous, destination-ordered sub-slice,
//! so directed-labeled reachability is a binary search.
//!
//! After construction the topology is immutable; the only mutable state is
//! the per-node and per-edge match masks, which workers clear with atomic
//! AND (monotone — bits are never set concurrently).

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::{GraphError, Result};
use crate::types::{EdgeId, NodeId};


/// Immutable per-edge payload plus the query-side "required" mask.
///
/// On a data edge `required` is unused (zero). On a query edge `label`
/// packs positive and negative bits, `required` holds the positive bits,
/// and the pair expresses the predicate
/// `(label & data_label) == required`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeData {
    /// Edge label bitset (query side: positive | negative).
    pub label: u32,
    /// Wall-clock timestamp (query side: synthetic ordering value).
    pub timestamp: u64,
    /// Query-side positive mask.
    pub required: u64,
}

impl EdgeData {
    /// Edge-label predicate: every positive bit present in `data_label`,
    /// every negative bit absent. A zero constraint matches everything.
    #[inline]
    pub fn matches_label(&self, data_label: u32) -> bool {
        (self.label & data_label) as u64 == self.required
    }
}

/// A single adjacency entry as seen by the matcher.
#[derive(Copy, Clone, Debug)]
pub struct EdgeRef {
    /// Identity of the underlying edge (shared between directions).
    pub id: EdgeId,
    /// The neighbor on the far side (destination for out, source for in).
    pub neighbor: NodeId,
    /// Edge label bitset.
    pub label: u32,
    /// Edge timestamp.
    pub timestamp: u64,
}

/// Direction selector for adjacency queries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dir {
    /// Outgoing edges.
    Out,
    /// Incoming edges.
    In,
}

impl Dir {
    /// The opposite direction.
    #[inline]
    pub fn flip(self) -> Dir {
        match self {
            Dir::Out => Dir::In,
            Dir::In => Dir::Out,
        }
    }
}

/// Bidirectional label-banded CSR with atomic match masks.
#[derive(Debug)]
pub struct CsrGraph {
    num_nodes: u32,
    out_index: Vec<u64>,
    out_dst: Vec<NodeId>,
    out_label: Vec<u32>,
    out_timestamp: Vec<u64>,
    out_required: Vec<u64>,
    in_index: Vec<u64>,
    in_src: Vec<NodeId>,
    in_label: Vec<u32>,
    in_timestamp: Vec<u64>,
    in_edge_id: Vec<EdgeId>,
    node_label: Vec<u32>,
    node_matched: Vec<AtomicU32>,
    edge_matched: Vec<AtomicU64>,
    edge_label_values: Vec<u32>,
}

impl CsrGraph {
    /// Builds the full bidirectional CSR from outgoing adjacency.
    ///
    /// `out_index[v]` is the (exclusive) prefix sum of out-degrees;
    /// `out_dst`/`out_edata` hold one entry per edge in any per-node order.
    /// Edge ids are assigned *after* the label-band sort. A destination
    /// outside `0..num_nodes` is input corruption.
    pub fn construct_and_sort_index(
        num_nodes: u32,
        out_index: Vec<u64>,
        out_dst: Vec<NodeId>,
        out_edata: Vec<EdgeData>,
    ) -> Result<CsrGraph> {
        let n = num_nodes as usize;
        let num_edges = out_dst.len();
        if out_index.len() != n {
            return Err(GraphError::Corruption(format!(
                "out_index has {} entries for {} nodes",
                out_index.len(),
                n
            )));
        }
        if out_edata.len() != num_edges {
            return Err(GraphError::Corruption(format!(
                "{} edge payloads for {} edges",
                out_edata.len(),
                num_edges
            )));
        }
        if n > 0 && out_index[n - 1] != num_edges as u64 {
            return Err(GraphError::Corruption(format!(
                "prefix sum ends at {} but {} edges were supplied",
                out_index[n - 1],
                num_edges
            )));
        }
        let mut prev = 0u64;
        for (v, &end) in out_index.iter().enumerate() {
            if end < prev {
                return Err(GraphError::Corruption(format!(
                    "out_index decreases at node {v}"
                )));
            }
            prev = end;
        }
        if let Some(&bad) = out_dst.iter().find(|&&d| d >= num_nodes) {
            return Err(GraphError::Corruption(format!(
                "edge destination {bad} out of range (num_nodes = {num_nodes})"
            )));
        }

        let mut graph = CsrGraph {
            num_nodes,
            out_index,
            out_dst,
            out_label: out_edata.iter().map(|e| e.label).collect(),
            out_timestamp: out_edata.iter().map(|e| e.timestamp).collect(),
            out_required: out_edata.iter().map(|e| e.required).collect(),
            in_index: Vec::new(),
            in_src: Vec::new(),
            in_label: Vec::new(),
            in_timestamp: Vec::new(),
            in_edge_id: Vec::new(),
            node_label: vec![0; n],
            node_matched: (0..n).map(|_| AtomicU32::new(0)).collect(),
            edge_matched: (0..num_edges).map(|_| AtomicU64::new(0)).collect(),
            edge_label_values: Vec::new(),
        };
        graph.sort_out_bands();
        graph.build_in_arrays();
        graph.collect_label_values();
        Ok(graph)
    }

    /// Sorts each node's outgoing band by `(label, destination)`.
    fn sort_out_bands(&mut self) {
        let mut scratch: Vec<(u32, NodeId, u64, u64)> = Vec::new();
        for v in 0..self.num_nodes as usize {
            let range = self.out_range_at(v);
            if range.len() < 2 {
                continue;
            }
            scratch.clear();
            for i in range.clone() {
                scratch.push((
                    self.out_label[i],
                    self.out_dst[i],
                    self.out_timestamp[i],
                    self.out_required[i],
                ));
            }
            // Stable: parallel edges keep their construction order, which
            // attribute columns rely on.
            scratch.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
            for (off, &(label, dst, ts, req)) in scratch.iter().enumerate() {
                let i = range.start + off;
                self.out_label[i] = label;
                self.out_dst[i] = dst;
                self.out_timestamp[i] = ts;
                self.out_required[i] = req;
            }
        }
    }

    /// Materializes incoming adjacency by radix-counting and scattering,
    /// then sorts each incoming band by `(label, source)`.
    fn build_in_arrays(&mut self) {
        let n = self.num_nodes as usize;
        let num_edges = self.out_dst.len();

        let mut counts = vec![0u64; n];
        for &dst in &self.out_dst {
            counts[dst as usize] += 1;
        }
        let mut in_index = vec![0u64; n];
        let mut sum = 0u64;
        for v in 0..n {
            sum += counts[v];
            in_index[v] = sum;
        }

        // Scatter with per-node write cursors.
        let mut cursor: Vec<u64> = (0..n)
            .map(|v| if v == 0 { 0 } else { in_index[v - 1] })
            .collect();
        let mut in_src = vec![0 as NodeId; num_edges];
        let mut in_label = vec![0u32; num_edges];
        let mut in_timestamp = vec![0u64; num_edges];
        let mut in_edge_id = vec![0 as EdgeId; num_edges];
        for src in 0..n {
            for i in self.out_range_at(src) {
                let dst = self.out_dst[i] as usize;
                let slot = cursor[dst] as usize;
                cursor[dst] += 1;
                in_src[slot] = src as NodeId;
                in_label[slot] = self.out_label[i];
                in_timestamp[slot] = self.out_timestamp[i];
                in_edge_id[slot] = i as EdgeId;
            }
        }

        // Sort each incoming band by (label, source), carrying the twin id.
        let mut scratch: Vec<(u32, NodeId, u64, EdgeId)> = Vec::new();
        for v in 0..n {
            let start = if v == 0 { 0 } else { in_index[v - 1] as usize };
            let end = in_index[v] as usize;
            if end - start < 2 {
                continue;
            }
            scratch.clear();
            for i in start..end {
                scratch.push((in_label[i], in_src[i], in_timestamp[i], in_edge_id[i]));
            }
            scratch.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
            for (off, &(label, src, ts, id)) in scratch.iter().enumerate() {
                in_label[start + off] = label;
                in_src[start + off] = src;
                in_timestamp[start + off] = ts;
                in_edge_id[start + off] = id;
            }
        }

        self.in_index = in_index;
        self.in_src = in_src;
        self.in_label = in_label;
        self.in_timestamp = in_timestamp;
        self.in_edge_id = in_edge_id;
    }

    fn collect_label_values(&mut self) {
        let mut values: Vec<u32> = self.out_label.clone();
        values.sort_unstable();
        values.dedup();
        self.edge_label_values = values;
    }

    /// Number of nodes.
    #[inline]
    pub fn num_nodes(&self) -> u32 {
        self.num_nodes
    }

    /// Number of edges.
    #[inline]
    pub fn num_edges(&self) -> u64 {
        self.out_dst.len() as u64
    }

    /// Distinct edge-label words present in the graph, ascending.
    #[inline]
    pub fn edge_label_values(&self) -> &[u32] {
        &self.edge_label_values
    }

    #[inline]
    fn out_range_at(&self, v: usize) -> std::ops::Range<usize> {
        let start = if v == 0 { 0 } else { self.out_index[v - 1] as usize };
        start..self.out_index[v] as usize
    }

    #[inline]
    fn in_range_at(&self, v: usize) -> std::ops::Range<usize> {
        let start = if v == 0 { 0 } else { self.in_index[v - 1] as usize };
        start..self.in_index[v] as usize
    }

    #[inline]
    fn range(&self, v: NodeId, dir: Dir) -> std::ops::Range<usize> {
        match dir {
            Dir::Out => self.out_range_at(v as usize),
            Dir::In => self.in_range_at(v as usize),
        }
    }

    #[inline]
    fn label_slice(&self, dir: Dir) -> &[u32] {
        match dir {
            Dir::Out => &self.out_label,
            Dir::In => &self.in_label,
        }
    }

    /// The contiguous index range of `v`'s edges carrying exactly `label`,
    /// in the given direction.
    fn band(&self, v: NodeId, label: u32, dir: Dir) -> std::ops::Range<usize> {
        let range = self.range(v, dir);
        let labels = &self.label_slice(dir)[range.clone()];
        let lo = labels.partition_point(|&l| l < label);
        let hi = labels.partition_point(|&l| l <= label);
        range.start + lo..range.start + hi
    }

    #[inline]
    fn edge_ref_at(&self, i: usize, dir: Dir) -> EdgeRef {
        match dir {
            Dir::Out => EdgeRef {
                id: i as EdgeId,
                neighbor: self.out_dst[i],
                label: self.out_label[i],
                timestamp: self.out_timestamp[i],
            },
            Dir::In => EdgeRef {
                id: self.in_edge_id[i],
                neighbor: self.in_src[i],
                label: self.in_label[i],
                timestamp: self.in_timestamp[i],
            },
        }
    }

    /// Iterates the edges of `v` in the given direction.
    pub fn edges(&self, v: NodeId, dir: Dir) -> impl Iterator<Item = EdgeRef> + '_ {
        self.range(v, dir).map(move |i| self.edge_ref_at(i, dir))
    }

    /// Outgoing edges of `v`.
    pub fn out_edges(&self, v: NodeId) -> impl Iterator<Item = EdgeRef> + '_ {
        self.edges(v, Dir::Out)
    }

    /// Incoming edges of `v`.
    pub fn in_edges(&self, v: NodeId) -> impl Iterator<Item = EdgeRef> + '_ {
        self.edges(v, Dir::In)
    }

    /// The destination-sorted band of `v`'s edges labeled exactly `label`.
    pub fn edges_with_label(
        &self,
        v: NodeId,
        label: u32,
        dir: Dir,
    ) -> impl Iterator<Item = EdgeRef> + '_ {
        self.band(v, label, dir).map(move |i| self.edge_ref_at(i, dir))
    }

    /// Total out-degree of `v`.
    #[inline]
    pub fn out_degree(&self, v: NodeId) -> u64 {
        self.out_range_at(v as usize).len() as u64
    }

    /// Total in-degree of `v`.
    #[inline]
    pub fn in_degree(&self, v: NodeId) -> u64 {
        self.in_range_at(v as usize).len() as u64
    }

    /// Degree of `v` in the given direction.
    #[inline]
    pub fn degree(&self, v: NodeId, dir: Dir) -> u64 {
        self.range(v, dir).len() as u64
    }

    /// Number of `v`'s edges labeled exactly `label`.
    #[inline]
    pub fn degree_with_label(&self, v: NodeId, label: u32, dir: Dir) -> u64 {
        self.band(v, label, dir).len() as u64
    }

    /// Number of `v`'s edges whose label satisfies `constraint`.
    pub fn degree_matching(&self, v: NodeId, constraint: &EdgeData, dir: Dir) -> u64 {
        if constraint.label == 0 && constraint.required == 0 {
            return self.degree(v, dir);
        }
        self.edge_label_values
            .iter()
            .filter(|&&word| constraint.matches_label(word))
            .map(|&word| self.degree_with_label(v, word, dir))
            .sum()
    }

    /// Binary search for `key` within a destination-sorted band.
    fn band_contains(&self, range: std::ops::Range<usize>, key: NodeId, dir: Dir) -> bool {
        let neighbors = match dir {
            Dir::Out => &self.out_dst[range],
            Dir::In => &self.in_src[range],
        };
        neighbors.binary_search(&key).is_ok()
    }

    /// True iff an edge `u -> v` exists whose label word is exactly `label`.
    ///
    /// Searches from whichever endpoint has the smaller band: the forward
    /// band of `u` or the backward band of `v`. This is the hot path of the
    /// enumeration matcher.
    pub fn is_connected_with_label(&self, u: NodeId, v: NodeId, label: u32) -> bool {
        let fwd = self.band(u, label, Dir::Out);
        if fwd.is_empty() {
            return false;
        }
        let bwd = self.band(v, label, Dir::In);
        if bwd.is_empty() {
            return false;
        }
        if fwd.len() > bwd.len() {
            self.band_contains(bwd, u, Dir::In)
        } else {
            self.band_contains(fwd, v, Dir::Out)
        }
    }

    /// True iff an edge `u -> v` exists whose label satisfies `constraint`.
    pub fn is_connected(&self, u: NodeId, v: NodeId, constraint: &EdgeData) -> bool {
        self.edge_label_values
            .iter()
            .filter(|&&word| constraint.matches_label(word))
            .any(|&word| self.is_connected_with_label(u, v, word))
    }

    /// Immutable label bits of `v`.
    #[inline]
    pub fn node_label(&self, v: NodeId) -> u32 {
        self.node_label[v as usize]
    }

    /// ORs label bits into `v`. Ingest-time only.
    #[inline]
    pub fn add_node_label(&mut self, v: NodeId, bits: u32) {
        self.node_label[v as usize] |= bits;
    }

    /// ORs label bits into edge `e`. Ingest-time only. The incoming mirror
    /// keeps its construction-time copy, so labels must be final before
    /// `construct_and_sort_index`; this entry point exists for the query
    /// graph, which is rebuilt per query.
    #[inline]
    pub fn add_edge_label(&mut self, e: EdgeId, bits: u32) {
        self.out_label[e as usize] |= bits;
    }

    /// Current match mask of `v` (relaxed load).
    #[inline]
    pub fn node_matched(&self, v: NodeId) -> u32 {
        self.node_matched[v as usize].load(Ordering::Relaxed)
    }

    /// Overwrites `v`'s match mask. Single-threaded phases only.
    #[inline]
    pub fn store_node_matched(&self, v: NodeId, bits: u32) {
        self.node_matched[v as usize].store(bits, Ordering::Relaxed);
    }

    /// ORs bits into `v`'s match mask. Single-writer phases only.
    #[inline]
    pub fn set_node_match_bits(&self, v: NodeId, bits: u32) {
        self.node_matched[v as usize].fetch_or(bits, Ordering::Relaxed);
    }

    /// Atomically clears bits from `v`'s match mask. The only mutation the
    /// parallel refinement phases perform.
    #[inline]
    pub fn clear_node_match_bits(&self, v: NodeId, bits: u32) {
        self.node_matched[v as usize].fetch_and(!bits, Ordering::Relaxed);
    }

    /// Current match mask of edge `e` (relaxed load).
    #[inline]
    pub fn edge_matched(&self, e: EdgeId) -> u64 {
        self.edge_matched[e as usize].load(Ordering::Relaxed)
    }

    /// Overwrites edge `e`'s match mask.
    #[inline]
    pub fn store_edge_matched(&self, e: EdgeId, bits: u64) {
        self.edge_matched[e as usize].store(bits, Ordering::Relaxed);
    }

    /// ORs bits into edge `e`'s match mask.
    #[inline]
    pub fn set_edge_match_bits(&self, e: EdgeId, bits: u64) {
        self.edge_matched[e as usize].fetch_or(bits, Ordering::Relaxed);
    }

    /// The immutable payload of edge `e` as an [`EdgeData`] constraint view.
    #[inline]
    pub fn edge_data(&self, e: EdgeId) -> EdgeData {
        EdgeData {
            label: self.out_label[e as usize],
            timestamp: self.out_timestamp[e as usize],
            required: self.out_required[e as usize],
        }
    }

    /// Destination of edge `e`.
    #[inline]
    pub fn edge_dst(&self, e: EdgeId) -> NodeId {
        self.out_dst[e as usize]
    }

    /// Raw prefix-sum array (persistence support).
    #[inline]
    pub(crate) fn raw_out_index(&self) -> &[u64] {
        &self.out_index
    }

    /// Raw destination array (persistence support).
    #[inline]
    pub(crate) fn raw_out_dst(&self) -> &[NodeId] {
        &self.out_dst
    }

    /// Raw node label array (persistence support).
    #[inline]
    pub(crate) fn raw_node_labels(&self) -> &[u32] {
        &self.node_label
    }

    /// Raw per-edge labels (persistence support).
    #[inline]
    pub(crate) fn raw_out_labels(&self) -> &[u32] {
        &self.out_label
    }

    /// Raw per-edge timestamps (persistence support).
    #[inline]
    pub(crate) fn raw_out_timestamps(&self) -> &[u64] {
        &self.out_timestamp
    }

    /// Bulk-sets node labels after construction (persistence support).
    pub(crate) fn set_node_labels(&mut self, labels: Vec<u32>) {
        debug_assert_eq!(labels.len(), self.num_nodes as usize);
        self.node_label = labels;
    }
}
