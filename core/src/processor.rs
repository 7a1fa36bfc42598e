//! Batched relaxation engine.
//!
//! Each iteration draws up to `batch_size` of the smallest pending entries,
//! drops the stale ones, and relaxes the outgoing edges of the rest. A batch
//! is a hard barrier: every improvement it produces lands in the distance
//! table before the next batch is drawn.
//!
//! Large batches compute their relaxation candidates on the rayon pool
//! against a read-only view of the table, then apply them in batch order.
//! Because candidates are only ever accepted when strictly smaller, the
//! result (distances and iteration count) does not depend on thread count.

use rayon::prelude::*;
use tracing::trace;

use crate::frontier::FrontierStrategy;
use crate::graph::{Graph, NodeId};
use crate::metrics::BatchStats;
use crate::record::{DistanceTable, FrontierEntry};

/// Processor lifecycle: `Idle → BatchReady → Relaxing → (BatchReady | Empty)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Idle,
    BatchReady,
    Relaxing,
    Empty,
}

pub struct BatchFrontierProcessor<'g> {
    graph: &'g Graph,
    records: DistanceTable,
    frontier: Box<dyn FrontierStrategy>,
    batch: Vec<FrontierEntry>,
    batch_size: usize,
    parallel_threshold: usize,
    state: ProcessorState,
    stats: BatchStats,
    iterations: u64,
    peak_frontier: usize,
    peak_frontier_bytes: usize,
}

impl<'g> BatchFrontierProcessor<'g> {
    /// `records` must hold one record per node of `graph`.
    pub fn new(
        graph: &'g Graph,
        records: DistanceTable,
        frontier: Box<dyn FrontierStrategy>,
        batch_size: usize,
        parallel_threshold: usize,
    ) -> Self {
        debug_assert_eq!(records.len(), graph.node_count());
        Self {
            graph,
            records,
            frontier,
            batch: Vec::with_capacity(batch_size.min(graph.node_count().max(1))),
            batch_size: batch_size.max(1),
            parallel_threshold: parallel_threshold.max(1),
            state: ProcessorState::Idle,
            stats: BatchStats::default(),
            iterations: 0,
            peak_frontier: 0,
            peak_frontier_bytes: 0,
        }
    }

    /// Offer `distance` for `node` and queue it on improvement.
    pub fn seed(&mut self, node: NodeId, distance: f64) -> bool {
        match self.records.try_improve(node, distance) {
            Some(entry) => {
                self.frontier.push(entry);
                self.track_peak();
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Entries waiting in the frontier, excluding the assembled batch.
    pub fn pending(&self) -> usize {
        self.frontier.len()
    }

    /// Size of the batch that the next [`relax_batch`](Self::relax_batch) will process.
    pub fn batch_len(&self) -> usize {
        self.batch.len()
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub fn peak_frontier(&self) -> usize {
        self.peak_frontier
    }

    pub fn peak_frontier_bytes(&self) -> usize {
        self.peak_frontier_bytes
    }

    pub fn records(&self) -> &DistanceTable {
        &self.records
    }

    pub fn into_records(self) -> DistanceTable {
        self.records
    }

    /// Draw the next batch. Moves to `BatchReady`, or to `Empty` when the
    /// frontier has nothing left.
    pub fn prepare_batch(&mut self) -> ProcessorState {
        self.batch.clear();
        self.frontier.next_batch(self.batch_size, &mut self.batch);
        self.state = if self.batch.is_empty() {
            ProcessorState::Empty
        } else {
            ProcessorState::BatchReady
        };
        self.state
    }

    /// Relax the assembled batch, then draw the next one.
    ///
    /// Does nothing unless the processor is in `BatchReady`.
    pub fn relax_batch(&mut self) -> ProcessorState {
        if self.state != ProcessorState::BatchReady {
            return self.state;
        }
        self.state = ProcessorState::Relaxing;

        let batch = std::mem::take(&mut self.batch);
        if batch.len() >= self.parallel_threshold {
            self.relax_parallel(&batch);
        } else {
            self.relax_sequential(&batch);
        }
        self.batch = batch;
        self.iterations += 1;
        self.track_peak();

        trace!(
            iteration = self.iterations,
            batch = self.batch.len(),
            pending = self.frontier.len(),
            "batch relaxed"
        );

        self.prepare_batch()
    }

    /// Drive to `Empty` with no iteration ceiling.
    pub fn run_to_completion(&mut self) -> BatchStats {
        if self.state == ProcessorState::Idle {
            self.prepare_batch();
        }
        while self.state == ProcessorState::BatchReady {
            self.relax_batch();
        }
        self.stats
    }

    fn relax_sequential(&mut self, batch: &[FrontierEntry]) {
        let graph = self.graph;
        for entry in batch {
            if self.records.is_stale(entry) {
                self.stats.stale_skipped += 1;
                continue;
            }
            self.visit(entry.node);
            for edge in graph.neighbors(entry.node) {
                let candidate = entry.distance + edge.weight;
                if let Some(next) = self.records.try_improve(edge.target, candidate) {
                    self.stats.improvements += 1;
                    self.frontier.push(next);
                }
            }
        }
    }

    fn relax_parallel(&mut self, batch: &[FrontierEntry]) {
        let graph = self.graph;
        let records = &self.records;

        // Read-only phase: distances only shrink, so a candidate that fails
        // against this snapshot would fail against the live table too.
        let candidates: Vec<Option<Vec<(NodeId, f64)>>> = batch
            .par_iter()
            .map(|entry| {
                if records.is_stale(entry) {
                    return None;
                }
                let improving = graph
                    .neighbors(entry.node)
                    .iter()
                    .map(|e| (e.target, entry.distance + e.weight))
                    .filter(|&(v, candidate)| candidate < records.distance(v))
                    .collect();
                Some(improving)
            })
            .collect();

        for (entry, improving) in batch.iter().zip(candidates) {
            // Re-check: an earlier entry of this batch may have improved the node.
            let Some(improving) = improving.filter(|_| !self.records.is_stale(entry)) else {
                self.stats.stale_skipped += 1;
                continue;
            };
            self.visit(entry.node);
            for (v, candidate) in improving {
                if let Some(next) = self.records.try_improve(v, candidate) {
                    self.stats.improvements += 1;
                    self.frontier.push(next);
                }
            }
        }
    }

    fn visit(&mut self, node: NodeId) {
        self.stats.nodes_visited += 1;
        self.stats.edges_relaxed += self.graph.out_degree(node) as u64;
        if self.records.settle(node) {
            self.stats.proven_final += 1;
        }
    }

    fn track_peak(&mut self) {
        let pending = self.frontier.len();
        if pending > self.peak_frontier {
            self.peak_frontier = pending;
        }
        let bytes = self.frontier.memory_usage()
            + self.batch.capacity() * std::mem::size_of::<FrontierEntry>();
        if bytes > self.peak_frontier_bytes {
            self.peak_frontier_bytes = bytes;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::{BucketFrontier, HeapFrontier};

    fn processor(graph: &Graph, batch_size: usize, threshold: usize) -> BatchFrontierProcessor<'_> {
        BatchFrontierProcessor::new(
            graph,
            DistanceTable::new(graph.node_count()),
            Box::new(BucketFrontier::for_graph(graph)),
            batch_size,
            threshold,
        )
    }

    /// 0 →(1) 1 →(1) 2, plus a direct but heavier 0 →(5) 2.
    fn make_triangle() -> Graph {
        Graph::from_edges(3, vec![(0, 1, 1.0), (1, 2, 1.0), (0, 2, 5.0)]).unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let g = make_triangle();
        let mut p = processor(&g, 1, usize::MAX);
        assert_eq!(p.state(), ProcessorState::Idle);

        p.seed(0, 0.0);
        assert_eq!(p.prepare_batch(), ProcessorState::BatchReady);
        assert_eq!(p.batch_len(), 1);

        let mut guard = 0;
        while p.relax_batch() == ProcessorState::BatchReady {
            guard += 1;
            assert!(guard < 100);
        }
        assert_eq!(p.state(), ProcessorState::Empty);
        // Relaxing an empty processor is a no-op.
        assert_eq!(p.relax_batch(), ProcessorState::Empty);
    }

    #[test]
    fn test_triangle_distances() {
        let g = make_triangle();
        let mut p = processor(&g, 1, usize::MAX);
        p.seed(0, 0.0);
        p.run_to_completion();
        assert_eq!(p.records().distances(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_stale_entry_skipped() {
        // With B = 1 the heavy 0→2 entry (5.0) is superseded by 0→1→2 (2.0)
        // before it is drawn, so it must be discarded.
        let g = make_triangle();
        let mut p = processor(&g, 1, usize::MAX);
        p.seed(0, 0.0);
        let stats = p.run_to_completion();
        assert_eq!(stats.stale_skipped, 1);
        assert_eq!(stats.nodes_visited, 3);
        assert_eq!(stats.improvements, 3);
        assert_eq!(stats.edges_relaxed, 3);
    }

    #[test]
    fn test_batch_reprocesses_improved_node() {
        // 2 is first reached at 5.0 and lowered to 2.0 by its batch-mate 1,
        // which turns its own entry in that batch stale.
        let g = Graph::from_edges(
            4,
            vec![(0, 1, 1.0), (0, 2, 5.0), (1, 2, 1.0), (2, 3, 1.0)],
        )
        .unwrap();
        let mut p = processor(&g, 10, usize::MAX);
        p.seed(0, 0.0);
        p.run_to_completion();
        assert_eq!(p.records().distances(), vec![0.0, 1.0, 2.0, 3.0]);
        assert!(p.records().records().iter().all(|r| r.settled));
    }

    #[test]
    fn test_unreachable_stays_infinite() {
        let g = Graph::from_edges(3, vec![(0, 1, 2.0)]).unwrap();
        let mut p = processor(&g, 4, usize::MAX);
        p.seed(0, 0.0);
        p.run_to_completion();
        let d = p.records().distances();
        assert_eq!(d[1], 2.0);
        assert!(d[2].is_infinite());
        assert!(!p.records().get(2).settled);
    }

    #[test]
    fn test_self_loop_never_improves() {
        let g = Graph::from_edges(2, vec![(0, 0, 0.0), (0, 1, 3.0), (1, 1, 1.0)]).unwrap();
        let mut p = processor(&g, 2, usize::MAX);
        p.seed(0, 0.0);
        let stats = p.run_to_completion();
        assert_eq!(p.records().distances(), vec![0.0, 3.0]);
        assert_eq!(stats.improvements, 1);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut edges = Vec::new();
        for u in 0..200u32 {
            for k in 1..6u32 {
                let v = (u * 7 + k * 13) % 200;
                edges.push((u, v, ((u + k) % 9) as f64 + 0.5));
            }
        }
        let g = Graph::from_edges(200, edges).unwrap();

        let mut seq = processor(&g, 64, usize::MAX);
        seq.seed(0, 0.0);
        seq.run_to_completion();

        let mut par = processor(&g, 64, 1);
        par.seed(0, 0.0);
        par.run_to_completion();

        assert_eq!(seq.records().distances(), par.records().distances());
        assert_eq!(seq.iterations(), par.iterations());
        assert_eq!(seq.stats(), par.stats());
    }

    #[test]
    fn test_heap_strategy_same_result() {
        let g = make_triangle();
        let mut p = BatchFrontierProcessor::new(
            &g,
            DistanceTable::new(3),
            Box::new(HeapFrontier::new()),
            2,
            usize::MAX,
        );
        p.seed(0, 0.0);
        p.run_to_completion();
        assert_eq!(p.records().distances(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_proven_final_counts_lower_bounds() {
        let g = make_triangle();
        let mut p = BatchFrontierProcessor::new(
            &g,
            DistanceTable::with_lower_bounds(vec![0.0, 1.0, 2.0]),
            Box::new(BucketFrontier::for_graph(&g)),
            1,
            usize::MAX,
        );
        p.seed(0, 0.0);
        let stats = p.run_to_completion();
        assert_eq!(stats.proven_final, 3);
    }

    #[test]
    fn test_peak_frontier_tracked() {
        let g = Graph::from_edges(5, (1..5u32).map(|v| (0u32, v, v as f64))).unwrap();
        let mut p = processor(&g, 1, usize::MAX);
        p.seed(0, 0.0);
        p.run_to_completion();
        assert_eq!(p.peak_frontier(), 4);
        assert!(p.peak_frontier_bytes() > 0);
    }
}
