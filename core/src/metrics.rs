use std::time::Duration;

use serde::Serialize;

use crate::graph::NodeId;

/// Counters accumulated by the batch processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Non-stale entries whose edges were relaxed.
    pub nodes_visited: u64,
    /// Edges scanned from visited nodes.
    pub edges_relaxed: u64,
    /// Relaxations that lowered a distance.
    pub improvements: u64,
    /// Entries dropped by the staleness check.
    pub stale_skipped: u64,
    /// Visited nodes whose distance matched a coarse-level lower bound.
    pub proven_final: u64,
}

/// Metrics reported for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunMetrics {
    /// Hierarchy construction plus every batch loop; excludes validation.
    pub total_time: Duration,
    pub avg_iteration_time: Duration,
    /// Bytes: graph + hierarchy + distance records + peak frontier.
    pub memory_estimate: usize,
    pub nodes_visited: u64,
    pub edges_relaxed: u64,
    pub improvements: u64,
    pub stale_skipped: u64,
    pub proven_final: u64,
    /// Batches processed across all levels.
    pub iteration_count: u64,
    pub hierarchy_levels_used: usize,
    pub peak_frontier: usize,
}

impl RunMetrics {
    pub(crate) fn absorb(&mut self, stats: BatchStats) {
        self.nodes_visited += stats.nodes_visited;
        self.edges_relaxed += stats.edges_relaxed;
        self.improvements += stats.improvements;
        self.stale_skipped += stats.stale_skipped;
        self.proven_final += stats.proven_final;
    }
}

/// One node where engine and baseline disagree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Mismatch {
    pub node: NodeId,
    pub engine: f64,
    pub baseline: f64,
}

/// Engine vs. Dijkstra comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub correct: bool,
    pub mismatch_count: usize,
    /// The first few mismatches, in node order.
    pub mismatches: Vec<Mismatch>,
    pub engine_nodes_visited: u64,
    pub engine_edges_relaxed: u64,
    pub baseline_nodes_visited: u64,
    pub baseline_edges_relaxed: u64,
    pub baseline_time: Duration,
}

/// Result of one run, as handed to a reporting collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SsspOutput {
    pub source: NodeId,
    /// One entry per node; `f64::INFINITY` marks unreachable nodes.
    pub distances: Vec<f64>,
    /// Present only when validation ran.
    pub correctness: Option<bool>,
    pub validation: Option<ValidationReport>,
    pub metrics: RunMetrics,
    /// False when the run stopped before converging.
    pub reliable: bool,
}

impl SsspOutput {
    pub fn distance(&self, node: NodeId) -> Option<f64> {
        self.distances.get(node as usize).copied()
    }

    pub fn reachable_count(&self) -> usize {
        self.distances.iter().filter(|d| d.is_finite()).count()
    }
}
