//! Exact baseline and the comparison against it.
//!
//! The baseline is a plain binary-heap Dijkstra with lazy deletion, kept
//! independent of the batch engine so it can serve as an oracle.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::{InvalidGraphReason, Result};
use crate::graph::{Graph, NodeId};
use crate::metrics::{Mismatch, RunMetrics, ValidationReport};

/// Mismatches kept verbatim in a [`ValidationReport`].
pub const MAX_REPORTED_MISMATCHES: usize = 16;

#[derive(Debug, Clone)]
pub struct BaselineResult {
    pub distances: Vec<f64>,
    pub nodes_visited: u64,
    pub edges_relaxed: u64,
    pub elapsed: Duration,
}

#[derive(Clone, Copy)]
struct HeapItem {
    distance: f64,
    node: NodeId,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.node.cmp(&other.node))
    }
}

/// Classical priority-queue Dijkstra from `source`.
///
/// Returns `None` if `source` is not a node of `graph`.
pub fn dijkstra(graph: &Graph, source: NodeId) -> Option<BaselineResult> {
    if !graph.contains(source) {
        return None;
    }
    let start = Instant::now();
    let mut distances = vec![f64::INFINITY; graph.node_count()];
    let mut done = vec![false; graph.node_count()];
    let mut heap = BinaryHeap::new();
    let mut nodes_visited = 0u64;
    let mut edges_relaxed = 0u64;

    distances[source as usize] = 0.0;
    heap.push(Reverse(HeapItem {
        distance: 0.0,
        node: source,
    }));

    while let Some(Reverse(HeapItem { distance, node })) = heap.pop() {
        let u = node as usize;
        if done[u] || distance > distances[u] {
            continue;
        }
        done[u] = true;
        nodes_visited += 1;

        for edge in graph.neighbors(node) {
            edges_relaxed += 1;
            let candidate = distance + edge.weight;
            let v = edge.target as usize;
            if candidate < distances[v] {
                distances[v] = candidate;
                heap.push(Reverse(HeapItem {
                    distance: candidate,
                    node: edge.target,
                }));
            }
        }
    }

    Some(BaselineResult {
        distances,
        nodes_visited,
        edges_relaxed,
        elapsed: start.elapsed(),
    })
}

/// Compare engine distances to the baseline index by index.
///
/// Two distances agree only if they are equal, or both infinite. No
/// tolerance is applied.
pub fn compare(engine: &[f64], metrics: &RunMetrics, baseline: &BaselineResult) -> ValidationReport {
    let mut mismatches = Vec::new();
    let mut mismatch_count = engine.len().abs_diff(baseline.distances.len());

    for (node, (&e, &b)) in engine.iter().zip(&baseline.distances).enumerate() {
        let agree = e == b || (e.is_infinite() && b.is_infinite());
        if !agree {
            mismatch_count += 1;
            if mismatches.len() < MAX_REPORTED_MISMATCHES {
                mismatches.push(Mismatch {
                    node: node as NodeId,
                    engine: e,
                    baseline: b,
                });
            }
        }
    }

    ValidationReport {
        correct: mismatch_count == 0,
        mismatch_count,
        mismatches,
        engine_nodes_visited: metrics.nodes_visited,
        engine_edges_relaxed: metrics.edges_relaxed,
        baseline_nodes_visited: baseline.nodes_visited,
        baseline_edges_relaxed: baseline.edges_relaxed,
        baseline_time: baseline.elapsed,
    }
}

/// Run the baseline for `source` and compare it with the engine's output.
pub fn validate(graph: &Graph, source: NodeId, engine: &[f64], metrics: &RunMetrics) -> Result<ValidationReport> {
    let baseline = dijkstra(graph, source).ok_or(InvalidGraphReason::SourceOutOfRange {
        node: source,
        node_count: graph.node_count(),
    })?;
    let report = compare(engine, metrics, &baseline);
    if report.correct {
        info!(
            engine_visited = report.engine_nodes_visited,
            baseline_visited = report.baseline_nodes_visited,
            engine_relaxed = report.engine_edges_relaxed,
            baseline_relaxed = report.baseline_edges_relaxed,
            "validation passed"
        );
    } else {
        warn!(
            mismatches = report.mismatch_count,
            first = ?report.mismatches.first(),
            "validation failed"
        );
    }
    Ok(report)
}
