//! Columnar attribute storage for nodes and edges.
//!
//! Attributes are immutable after ingest and are only consulted when
//! formatting results; the matcher never reads them.

use serde::{Deserialize, Serialize};

/// A typed column of per-node or per-edge values.
///
/// List columns use arrow-style offsets into a flattened child column:
/// row `i` spans `values[offsets[i]..offsets[i + 1]]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum ColumnData {
    /// 32-bit signed integers.
    I32(Vec<i32>),
    /// 64-bit signed integers.
    I64(Vec<i64>),
    /// 32-bit floats.
    F32(Vec<f32>),
    /// 64-bit floats.
    F64(Vec<f64>),
    /// Booleans.
    Bool(Vec<bool>),
    /// UTF-8 strings.
    String(Vec<String>),
    /// Milliseconds since the Unix epoch.
    TimestampMs(Vec<i64>),
    /// Opaque structured rows, carried as encoded text.
    Struct(Vec<String>),
    /// Variable-length lists over a flattened child column.
    List {
        /// `len + 1` offsets delimiting each row's slice of `values`.
        offsets: Vec<u32>,
        /// Flattened element column.
        values: Box<ColumnData>,
    },
}

impl ColumnData {
    /// Number of rows in the column.
    pub fn len(&self) -> usize {
        match self {
            ColumnData::I32(v) => v.len(),
            ColumnData::I64(v) => v.len(),
            ColumnData::F32(v) => v.len(),
            ColumnData::F64(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::String(v) => v.len(),
            ColumnData::TimestampMs(v) => v.len(),
            ColumnData::Struct(v) => v.len(),
            ColumnData::List { offsets, .. } => offsets.len().saturating_sub(1),
        }
    }

    /// True when the column holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable tag for stats reporting.
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnData::I32(_) => "i32",
            ColumnData::I64(_) => "i64",
            ColumnData::F32(_) => "f32",
            ColumnData::F64(_) => "f64",
            ColumnData::Bool(_) => "bool",
            ColumnData::String(_) => "string",
            ColumnData::TimestampMs(_) => "timestamp_ms",
            ColumnData::Struct(_) => "struct",
            ColumnData::List { .. } => "list",
        }
    }
}
