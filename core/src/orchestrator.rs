//! Run driver: `INIT → BUILD_HIERARCHY? → BATCH_LOOP → CONVERGED → VALIDATE? → DONE`.
//!
//! Flat runs drive one [`BatchFrontierProcessor`] over the input graph. With
//! a hierarchy, every coarse level is solved first, coarsest to finest, and
//! each result is lifted through the supernode mapping as per-node lower
//! bounds for the next finer level. Lower bounds never enter a tentative
//! distance: the finest level still starts from +inf everywhere but the
//! source, so the final distances are exactly those of the flat run.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, InvalidGraphReason, Result};
use crate::graph::{EdgeRecord, Graph, NodeId};
use crate::hierarchy::{Hierarchy, HierarchyBuilder};
use crate::metrics::{RunMetrics, SsspOutput};
use crate::processor::{BatchFrontierProcessor, ProcessorState};
use crate::record::DistanceTable;
use crate::validator;

/// Where the orchestrator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunPhase {
    Init,
    BuildHierarchy,
    BatchLoop,
    Converged,
    Validate,
    Done,
    InvalidGraph,
    Diverged,
}

/// Outcome of driving one level.
enum LevelOutcome {
    Converged(DistanceTable),
    Diverged { records: DistanceTable, pending: usize },
}

/// Accumulates per-level results into the run metrics.
struct LevelTally {
    metrics: RunMetrics,
    peak_frontier_bytes: usize,
}

pub struct Orchestrator<'g> {
    graph: &'g Graph,
    config: EngineConfig,
    hierarchy: Option<Hierarchy>,
    phase: RunPhase,
}

impl<'g> Orchestrator<'g> {
    /// Fails with `InvalidConfig` before any work is done.
    pub fn new(graph: &'g Graph, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            graph,
            config,
            hierarchy: None,
            phase: RunPhase::Init,
        })
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The level stack, once a hierarchical run has built it. Reused by
    /// later runs from other sources.
    pub fn hierarchy(&self) -> Option<&Hierarchy> {
        self.hierarchy.as_ref()
    }

    /// Shortest distances from `source` to every node.
    pub fn run(&mut self, source: NodeId) -> Result<SsspOutput> {
        self.phase = RunPhase::Init;
        let graph = self.graph;
        if !graph.contains(source) {
            self.phase = RunPhase::InvalidGraph;
            return Err(InvalidGraphReason::SourceOutOfRange {
                node: source,
                node_count: graph.node_count(),
            }
            .into());
        }
        if !self.config.is_exact() {
            warn!(
                epsilon = self.config.epsilon,
                "epsilon > 0 carries no verified error bound; running in exact mode"
            );
        }
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            source,
            batch_size = self.config.batch_size,
            hierarchy = self.config.hierarchy.is_some(),
            "starting shortest path run"
        );

        let start = Instant::now();
        if let Err(err) = self.ensure_hierarchy() {
            self.phase = RunPhase::InvalidGraph;
            return Err(err);
        }

        self.phase = RunPhase::BatchLoop;
        let loop_start = Instant::now();
        let mut tally = LevelTally {
            metrics: RunMetrics::default(),
            peak_frontier_bytes: 0,
        };

        let mut bounds: Option<Vec<f64>> = None;
        if let Some(hierarchy) = &self.hierarchy {
            let levels = hierarchy.levels();
            for (i, level) in levels.iter().enumerate() {
                let records = match bounds.take() {
                    Some(coarse) => lift(&coarse, levels[i - 1].fine_to_coarse()),
                    None => DistanceTable::new(level.node_count()),
                };
                debug!(
                    level = levels.len() - i,
                    nodes = level.node_count(),
                    edges = level.graph().edge_count(),
                    "relaxing coarse level"
                );
                match self.run_level(level.graph(), level.supernode_of(source), records, &mut tally) {
                    LevelOutcome::Converged(table) => bounds = Some(table.distances()),
                    LevelOutcome::Diverged { records, pending } => {
                        // Coarse distances mapped onto the original nodes.
                        let partial = (0..graph.node_count() as NodeId)
                            .map(|v| records.distance(level.supernode_of(v)))
                            .collect();
                        tally.metrics.memory_estimate = self.memory_estimate(&records, tally.peak_frontier_bytes);
                        self.phase = RunPhase::Diverged;
                        let max = self.config.max_iterations;
                        return Err(diverged(max, source, partial, pending, tally, start, loop_start));
                    }
                }
                tally.metrics.hierarchy_levels_used += 1;
            }
        }

        let records = match (bounds, &self.hierarchy) {
            (Some(coarse), Some(h)) => match h.levels().last() {
                Some(finest) => lift(&coarse, finest.fine_to_coarse()),
                None => DistanceTable::new(graph.node_count()),
            },
            _ => DistanceTable::new(graph.node_count()),
        };
        let table = match self.run_level(graph, source, records, &mut tally) {
            LevelOutcome::Converged(table) => table,
            LevelOutcome::Diverged { records, pending } => {
                tally.metrics.memory_estimate = self.memory_estimate(&records, tally.peak_frontier_bytes);
                self.phase = RunPhase::Diverged;
                let max = self.config.max_iterations;
                let partial = records.distances();
                return Err(diverged(max, source, partial, pending, tally, start, loop_start));
            }
        };

        self.phase = RunPhase::Converged;
        let mut metrics = tally.metrics;
        finish_timing(&mut metrics, start, loop_start);
        metrics.memory_estimate = self.memory_estimate(&table, tally.peak_frontier_bytes);
        info!(
            iterations = metrics.iteration_count,
            visited = metrics.nodes_visited,
            relaxed = metrics.edges_relaxed,
            stale = metrics.stale_skipped,
            levels = metrics.hierarchy_levels_used,
            elapsed_ms = metrics.total_time.as_secs_f64() * 1000.0,
            "run converged"
        );

        let output = SsspOutput {
            source,
            distances: table.distances(),
            correctness: None,
            validation: None,
            metrics,
            reliable: true,
        };

        let output = if self.config.validate {
            self.phase = RunPhase::Validate;
            self.finish_validation(source, output)?
        } else {
            output
        };

        self.phase = RunPhase::Done;
        Ok(output)
    }

    /// Compare a converged output with the baseline. In exact mode any
    /// mismatch is an error carrying the output as computed.
    pub(crate) fn finish_validation(&self, source: NodeId, mut output: SsspOutput) -> Result<SsspOutput> {
        let report = validator::validate(self.graph, source, &output.distances, &output.metrics)?;
        output.correctness = Some(report.correct);
        if !report.correct {
            if self.config.is_exact() {
                return Err(Error::ValidationMismatch {
                    report: Box::new(report),
                    output: Box::new(output),
                });
            }
            warn!(
                epsilon = self.config.epsilon,
                mismatches = report.mismatch_count,
                "distances differ from baseline in unverified epsilon mode"
            );
        }
        output.validation = Some(report);
        Ok(output)
    }

    /// Bytes held by the graph, the hierarchy, `records` and the frontier peak.
    fn memory_estimate(&self, records: &DistanceTable, peak_frontier_bytes: usize) -> usize {
        self.graph.memory_usage()
            + self.hierarchy.as_ref().map_or(0, Hierarchy::memory_usage)
            + records.memory_usage()
            + peak_frontier_bytes
    }

    fn ensure_hierarchy(&mut self) -> Result<()> {
        let Some(config) = &self.config.hierarchy else {
            return Ok(());
        };
        if self.hierarchy.is_some() {
            return Ok(());
        }
        self.phase = RunPhase::BuildHierarchy;
        let started = Instant::now();
        let hierarchy = HierarchyBuilder::new(config.clone()).build(self.graph)?;
        info!(
            levels = hierarchy.len(),
            coarsest_nodes = hierarchy.coarsest().map_or(self.graph.node_count(), |l| l.node_count()),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "hierarchy built"
        );
        self.hierarchy = Some(hierarchy);
        Ok(())
    }

    fn run_level(
        &self,
        graph: &Graph,
        source: NodeId,
        records: DistanceTable,
        tally: &mut LevelTally,
    ) -> LevelOutcome {
        let frontier = self.config.strategy.build(graph);
        let mut processor = BatchFrontierProcessor::new(
            graph,
            records,
            frontier,
            self.config.batch_size,
            self.config.parallel_threshold,
        );
        processor.seed(source, 0.0);
        processor.prepare_batch();

        let mut diverged = false;
        while processor.state() == ProcessorState::BatchReady {
            let used = tally.metrics.iteration_count + processor.iterations();
            if self.config.max_iterations.is_some_and(|max| used >= max) {
                diverged = true;
                break;
            }
            processor.relax_batch();
        }

        tally.metrics.iteration_count += processor.iterations();
        tally.metrics.absorb(processor.stats());
        tally.metrics.peak_frontier = tally.metrics.peak_frontier.max(processor.peak_frontier());
        tally.peak_frontier_bytes = tally.peak_frontier_bytes.max(processor.peak_frontier_bytes());

        if diverged {
            let pending = processor.pending() + processor.batch_len();
            LevelOutcome::Diverged {
                records: processor.into_records(),
                pending,
            }
        } else {
            LevelOutcome::Converged(processor.into_records())
        }
    }
}

fn diverged(
    max_iterations: Option<u64>,
    source: NodeId,
    partial: Vec<f64>,
    pending: usize,
    tally: LevelTally,
    start: Instant,
    loop_start: Instant,
) -> Error {
    let mut metrics = tally.metrics;
    finish_timing(&mut metrics, start, loop_start);
    let max_iterations = max_iterations.unwrap_or(metrics.iteration_count);
    warn!(
        max_iterations,
        pending, "iteration ceiling reached before the frontier emptied"
    );
    Error::Diverged {
        max_iterations,
        pending,
        partial: Box::new(SsspOutput {
            source,
            distances: partial,
            correctness: None,
            validation: None,
            metrics,
            reliable: false,
        }),
    }
}

/// Table for a finer level whose lower bounds come from the coarse result.
fn lift(coarse: &[f64], fine_to_coarse: &[NodeId]) -> DistanceTable {
    DistanceTable::with_lower_bounds(fine_to_coarse.iter().map(|&s| coarse[s as usize]).collect())
}

fn finish_timing(metrics: &mut RunMetrics, start: Instant, loop_start: Instant) {
    metrics.total_time = start.elapsed();
    metrics.avg_iteration_time = match u32::try_from(metrics.iteration_count) {
        Ok(0) => Duration::ZERO,
        Ok(n) => loop_start.elapsed() / n,
        Err(_) => Duration::ZERO,
    };
}

/// One-shot run over an existing graph.
pub fn run(graph: &Graph, source: NodeId, config: &EngineConfig) -> Result<SsspOutput> {
    Orchestrator::new(graph, config.clone())?.run(source)
}

/// Build the graph from raw input and run. Invalid input fails before any
/// batch is processed.
pub fn solve<I, E>(node_count: usize, edges: I, source: NodeId, config: &EngineConfig) -> Result<SsspOutput>
where
    I: IntoIterator<Item = E>,
    E: Into<EdgeRecord>,
{
    config.validate()?;
    let graph = Graph::from_edges(node_count, edges)?;
    run(&graph, source, config)
}
