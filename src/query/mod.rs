//! Query compilation and planning.
//!
//! A query string passes through [`cypher`] to become the textual IR in
//! [`ir`], which [`plan`] resolves against a concrete data graph into an
//! executable [`plan::QueryPlan`].

pub mod cypher;
pub mod ir;
pub mod plan;

pub use ir::{NodeFilter, QueryEdge, QueryIr, QueryNode};
pub use plan::{PlanOutcome, QueryPlan, StarEdge};
