//! Binary snapshot persistence.
//!
//! [`PropertyGraph::save_graph`] writes a single checksummed little-endian
//! file: topology in final (band-sorted) edge order, label registries, node
//! identity tables, and attribute columns. [`PropertyGraph::load_graph`]
//! validates the checksum and rebuilds the bidirectional CSR. Because
//! edges are saved in sorted order, edge ids — and with them the attribute
//! columns and edge timestamps — survive the round trip unchanged.

use std::fs;
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::csr::{CsrGraph, EdgeData};
use crate::error::{GraphError, Result};
use crate::graph::{ColumnData, PropertyGraph};
use crate::types::NodeId;

pub mod property_file;

const MAGIC: [u8; 4] = *b"LATG";
const FORMAT_VERSION: u16 = 1;

impl PropertyGraph {
    /// Serializes the graph to `path`.
    pub fn save_graph(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut payload = Vec::new();
        let w = &mut payload;

        put_u32(w, self.num_nodes());
        put_u64(w, self.num_edges());
        for &v in self.csr.raw_out_index() {
            put_u64(w, v);
        }
        for &v in self.csr.raw_out_dst() {
            put_u32(w, v);
        }
        for &v in self.csr.raw_out_labels() {
            put_u32(w, v);
        }
        for &v in self.csr.raw_out_timestamps() {
            put_u64(w, v);
        }
        for &v in self.csr.raw_node_labels() {
            put_u32(w, v);
        }
        put_string_table(w, &self.node_label_names);
        put_string_table(w, &self.edge_label_names);
        put_string_table(w, &self.node_uuids);
        put_string_table(w, &self.node_names);
        put_columns(w, &self.node_attributes)?;
        put_columns(w, &self.edge_attributes)?;

        let mut file = Vec::with_capacity(payload.len() + 18);
        file.extend_from_slice(&MAGIC);
        file.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        file.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        file.extend_from_slice(&payload);
        file.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        fs::write(path, file)?;
        Ok(())
    }

    /// Loads a graph previously written by [`PropertyGraph::save_graph`].
    pub fn load_graph(path: impl AsRef<Path>) -> Result<PropertyGraph> {
        let bytes = fs::read(path)?;
        if bytes.len() < 14 || bytes[..4] != MAGIC {
            return Err(GraphError::Corruption("not a graph snapshot".into()));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(GraphError::Corruption(format!(
                "unsupported snapshot version {version}"
            )));
        }
        let payload_len = u64::from_le_bytes(bytes[6..14].try_into().unwrap()) as usize;
        if bytes.len() != 14 + payload_len + 4 {
            return Err(GraphError::Corruption("snapshot length mismatch".into()));
        }
        let payload = &bytes[14..14 + payload_len];
        let stored_crc =
            u32::from_le_bytes(bytes[14 + payload_len..].try_into().unwrap());
        if crc32fast::hash(payload) != stored_crc {
            return Err(GraphError::Corruption("snapshot checksum mismatch".into()));
        }

        let mut r = Reader::new(payload);
        let num_nodes = r.u32()?;
        let num_edges = r.u64()? as usize;
        let out_index = r.u64_vec(num_nodes as usize)?;
        let out_dst = r.u32_vec(num_edges)?;
        let out_labels = r.u32_vec(num_edges)?;
        let out_timestamps = r.u64_vec(num_edges)?;
        let node_labels = r.u32_vec(num_nodes as usize)?;
        let node_label_names = r.string_table()?;
        let edge_label_names = r.string_table()?;
        let node_uuids = r.string_table()?;
        let node_names = r.string_table()?;
        let node_attributes = r.columns()?;
        let edge_attributes = r.columns()?;
        r.finish()?;

        if node_uuids.len() != num_nodes as usize || node_names.len() != num_nodes as usize {
            return Err(GraphError::Corruption(
                "node table lengths disagree with node count".into(),
            ));
        }

        let edata: Vec<EdgeData> = out_labels
            .iter()
            .zip(&out_timestamps)
            .map(|(&label, &timestamp)| EdgeData {
                label,
                timestamp,
                required: 0,
            })
            .collect();
        let mut csr = CsrGraph::construct_and_sort_index(num_nodes, out_index, out_dst, edata)?;
        csr.set_node_labels(node_labels);

        let node_label_ids = index_names(&node_label_names);
        let edge_label_ids = index_names(&edge_label_names);
        let node_ids: FxHashMap<String, NodeId> = node_uuids
            .iter()
            .enumerate()
            .map(|(v, uuid)| (uuid.clone(), v as NodeId))
            .collect();

        Ok(PropertyGraph {
            csr,
            node_label_names,
            node_label_ids,
            edge_label_names,
            edge_label_ids,
            node_uuids,
            node_ids,
            node_names,
            node_attributes,
            edge_attributes,
        })
    }
}

fn index_names(names: &[String]) -> FxHashMap<String, u32> {
    names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.clone(), i as u32))
        .collect()
}

// -- encoding helpers -------------------------------------------------------

fn put_u32(w: &mut Vec<u8>, v: u32) {
    w.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(w: &mut Vec<u8>, v: u64) {
    w.extend_from_slice(&v.to_le_bytes());
}

fn put_str(w: &mut Vec<u8>, s: &str) {
    put_u32(w, s.len() as u32);
    w.extend_from_slice(s.as_bytes());
}

fn put_string_table(w: &mut Vec<u8>, table: &[String]) {
    put_u32(w, table.len() as u32);
    for s in table {
        put_str(w, s);
    }
}

/// Attribute maps ride inside the snapshot as a JSON document; the typed
/// column encoding is shared with the property-file loader.
fn put_columns(w: &mut Vec<u8>, columns: &FxHashMap<String, ColumnData>) -> Result<()> {
    let ordered: std::collections::BTreeMap<&String, &ColumnData> = columns.iter().collect();
    let json = serde_json::to_string(&ordered)
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    put_str(w, &json);
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Reader<'a> {
        Reader { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or_else(|| {
            GraphError::Corruption("snapshot offset overflow".into())
        })?;
        if end > self.bytes.len() {
            return Err(GraphError::Corruption("snapshot truncated".into()));
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn u32_vec(&mut self, len: usize) -> Result<Vec<u32>> {
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.u32()?);
        }
        Ok(out)
    }

    fn u64_vec(&mut self, len: usize) -> Result<Vec<u64>> {
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.u64()?);
        }
        Ok(out)
    }

    fn str(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| GraphError::Corruption("snapshot string is not UTF-8".into()))
    }

    fn string_table(&mut self) -> Result<Vec<String>> {
        let len = self.u32()? as usize;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.str()?);
        }
        Ok(out)
    }

    fn columns(&mut self) -> Result<FxHashMap<String, ColumnData>> {
        let json = self.str()?;
        let ordered: std::collections::BTreeMap<String, ColumnData> =
            serde_json::from_str(&json).map_err(|e| GraphError::Serialization(e.to_string()))?;
        Ok(ordered.into_iter().collect())
    }

    fn finish(&self) -> Result<()> {
        if self.pos != self.bytes.len() {
            return Err(GraphError::Corruption(
                "trailing bytes after snapshot payload".into(),
            ));
        }
        Ok(())
    }
}
