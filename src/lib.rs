//! # Lattice — in-memory property-graph pattern matching
//!
//! Lattice evaluates Cypher-style pattern queries over a labeled, directed
//! property graph held in a compressed sparse row representation. A query
//! like "processes that read a file and then wrote to the network within an
//! hour" returns the number of matching subgraphs and leaves match bits on
//! the data graph so callers can enumerate the participants.
//!
//! ## Quick start
//!
//! ```rust
//! use lattice::{GraphBuilder, UNORDERED_TIMESTAMP};
//!
//! let mut b = GraphBuilder::new(3, 3);
//! b.set_node(0, "p1", "login", "Process")?;
//! b.set_node(1, "p2", "sshd", "Process")?;
//! b.set_node(2, "p3", "bash", "Process")?;
//! b.add_edge(0, 1, "FORKED", UNORDERED_TIMESTAMP)?;
//! b.add_edge(1, 2, "FORKED", UNORDERED_TIMESTAMP)?;
//! b.add_edge(2, 0, "FORKED", UNORDERED_TIMESTAMP)?;
//! let graph = b.finish()?;
//!
//! let matches = graph.match_cypher_query(
//!     None,
//!     None,
//!     "MATCH (a:Process)-[:FORKED]->(b:Process) RETURN a, b",
//! )?;
//! assert_eq!(matches, 3);
//! # Ok::<(), lattice::GraphError>(())
//! ```
//!
//! ## Execution pipeline
//!
//! 1. The **compiler** lowers the query text to a small IR of query nodes,
//!    query edges, and name filters.
//! 2. The **planner** resolves labels to bit masks, builds a CSR query
//!    graph, and picks a degree-descending matching order — rejecting
//!    queries that reference labels the data graph lacks.
//! 3. **Graph simulation** prunes candidate sets to a fixed point in
//!    parallel; variable-length edges then run the **path matcher** and the
//!    simulation re-converges.
//! 4. **Enumeration** extends embeddings along the matching order and
//!    returns the count.

pub mod csr;
pub mod error;
pub mod graph;
pub mod matcher;
pub mod persist;
pub mod query;
pub mod types;

pub use crate::csr::{CsrGraph, Dir, EdgeData, EdgeRef};
pub use crate::error::{GraphError, Result};
pub use crate::graph::{ColumnData, GraphBuilder, LabelKind, PropertyGraph};
pub use crate::matcher::MatchStrategy;
pub use crate::persist::property_file::load_attributed_graph;
pub use crate::query::{NodeFilter, QueryEdge, QueryIr, QueryNode};
pub use crate::types::{
    EdgeId, EventLimit, EventWindow, LabelMask, NodeId, QueryNodeId, UNORDERED_TIMESTAMP,
};
