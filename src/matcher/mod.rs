//! Query execution: graph simulation, star-edge handling, and embedding
//! enumeration, stitched together behind [`PropertyGraph`] entry points.

pub mod enumerate;
pub mod paths;
pub mod simulation;

use tracing::{debug, warn};

use crate::error::Result;
use crate::graph::PropertyGraph;
use crate::query::cypher;
use crate::query::{NodeFilter, PlanOutcome, QueryEdge, QueryNode};
use crate::types::{EventLimit, EventWindow};

pub use enumerate::MatchStrategy;

impl PropertyGraph {
    /// Parses and runs a Cypher query, returning the number of matching
    /// subgraphs. Match bits stay populated so matched nodes and edges can
    /// be enumerated afterwards.
    ///
    /// A parse failure is logged and reported as zero matches.
    pub fn match_cypher_query(
        &self,
        limit: Option<EventLimit>,
        window: Option<EventWindow>,
        query: &str,
    ) -> Result<u64> {
        let ir = match cypher::compile(query) {
            Ok(ir) => ir,
            Err(err) => {
                warn!(%err, "failed to parse cypher query");
                return Ok(0);
            }
        };
        debug!(
            nodes = ir.nodes.len(),
            edges = ir.edges.len(),
            filters = ir.filters.len(),
            "compiled query"
        );
        self.match_query(limit, window, &ir.nodes, &ir.edges, &ir.filters)
    }

    /// IR-level query entry point, bypassing the Cypher compiler.
    pub fn match_query(
        &self,
        limit: Option<EventLimit>,
        window: Option<EventWindow>,
        nodes: &[QueryNode],
        edges: &[QueryEdge],
        filters: &[NodeFilter],
    ) -> Result<u64> {
        self.match_query_with(limit, window, nodes, edges, filters, MatchStrategy::default())
    }

    /// [`PropertyGraph::match_query`] with an explicit enumeration
    /// strategy.
    pub fn match_query_with(
        &self,
        limit: Option<EventLimit>,
        window: Option<EventWindow>,
        nodes: &[QueryNode],
        edges: &[QueryEdge],
        filters: &[NodeFilter],
        strategy: MatchStrategy,
    ) -> Result<u64> {
        let plan = match crate::query::plan::build_plan(self, nodes, edges, filters)? {
            PlanOutcome::Plan(plan) => plan,
            PlanOutcome::NoMatch => {
                self.reset_matched_status();
                return Ok(0);
            }
        };

        if !simulation::run_graph_simulation(self, &plan, limit, window) {
            return Ok(0);
        }

        if !plan.stars.is_empty() {
            for (i, star) in plan.stars.iter().enumerate() {
                let star_node_bit = plan.num_query_nodes() + i as u32;
                let star_edge_bit = plan.num_plain_edges() as u32 + i as u32;
                if star.all_paths {
                    paths::find_all_paths(
                        self,
                        star.src,
                        star.dst,
                        star.constraint,
                        star_node_bit,
                        star_edge_bit,
                    );
                } else {
                    paths::find_shortest_paths(
                        self,
                        star.src,
                        star.dst,
                        star.constraint,
                        star_node_bit,
                        star_edge_bit,
                    );
                }
            }
            // Star handling narrowed endpoint candidates; propagate before
            // enumerating.
            if !simulation::match_nodes(self, &plan, false, limit, window) {
                return Ok(0);
            }
        }

        simulation::match_edges_after_simulation(self, &plan);
        let count = enumerate::subgraph_count(self, &plan, strategy);
        debug!(count, "query complete");
        Ok(count)
    }
}
