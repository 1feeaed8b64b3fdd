//! Crate-wide error type and result alias.

use std::io;

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by graph construction, persistence, and query planning.
///
/// Semantic zero-match conditions (unknown labels, empty candidate sets,
/// malformed query text) are deliberately *not* represented here: they log
/// and yield a zero count so callers never see partial matches.
#[derive(Debug, Error)]
pub enum GraphError {
    /// I/O failure while loading or saving a graph.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Snapshot or metadata bytes that fail structural validation.
    #[error("corruption detected: {0}")]
    Corruption(String),
    /// Malformed metadata or attribute payloads.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// A caller-supplied argument that cannot be honored.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A hard capacity limit (label bits, query nodes) was exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
}
