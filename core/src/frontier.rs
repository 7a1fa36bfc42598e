//! Batch selection policies.
//!
//! A [`FrontierStrategy`] holds the pending frontier and decides which
//! entries form the next batch. Every strategy must hand out entries in
//! `(distance, node, generation)` order so that runs stay reproducible no
//! matter which strategy is plugged in.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};

use serde::{Deserialize, Serialize};

use crate::graph::Graph;
use crate::record::FrontierEntry;

/// Given the pending frontier, choose the next batch.
pub trait FrontierStrategy: Send {
    fn push(&mut self, entry: FrontierEntry);

    /// Move up to `limit` of the smallest pending entries into `batch`.
    fn next_batch(&mut self, limit: usize, batch: &mut Vec<FrontierEntry>);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate memory usage in bytes.
    fn memory_usage(&self) -> usize;
}

/// Which [`FrontierStrategy`] a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Bucket,
    Heap,
}

impl StrategyKind {
    pub fn build(self, graph: &Graph) -> Box<dyn FrontierStrategy> {
        match self {
            StrategyKind::Bucket => Box::new(BucketFrontier::for_graph(graph)),
            StrategyKind::Heap => Box::new(HeapFrontier::new()),
        }
    }
}

/// Total order used by every strategy.
#[inline]
fn entry_order(a: &FrontierEntry, b: &FrontierEntry) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.node.cmp(&b.node))
        .then(a.generation.cmp(&b.generation))
}

/// Bucket queue over distance ranges of fixed `width`.
///
/// Only the lowest non-empty bucket is ever sorted, and only when a batch is
/// drawn from it. Batches spill into the following buckets when the lowest
/// one holds fewer than `limit` entries.
pub struct BucketFrontier {
    width: f64,
    buckets: BTreeMap<u64, Vec<FrontierEntry>>,
    len: usize,
    spare: Vec<Vec<FrontierEntry>>,
}

impl BucketFrontier {
    pub fn new(width: f64) -> Self {
        let width = if width.is_finite() && width > 0.0 {
            width
        } else {
            1.0
        };
        Self {
            width,
            buckets: BTreeMap::new(),
            len: 0,
            spare: Vec::new(),
        }
    }

    /// Bucket width set to the graph's mean positive edge weight, so one
    /// relaxation step moves an entry about one bucket ahead.
    pub fn for_graph(graph: &Graph) -> Self {
        Self::new(graph.mean_positive_weight().unwrap_or(1.0))
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    fn bucket_of(&self, distance: f64) -> u64 {
        let idx = (distance / self.width).floor();
        if idx >= u64::MAX as f64 {
            u64::MAX
        } else {
            idx as u64
        }
    }
}

impl FrontierStrategy for BucketFrontier {
    fn push(&mut self, entry: FrontierEntry) {
        let key = self.bucket_of(entry.distance);
        let spare = &mut self.spare;
        self.buckets
            .entry(key)
            .or_insert_with(|| spare.pop().unwrap_or_default())
            .push(entry);
        self.len += 1;
    }

    fn next_batch(&mut self, limit: usize, batch: &mut Vec<FrontierEntry>) {
        while batch.len() < limit {
            let Some(mut lowest) = self.buckets.first_entry() else {
                break;
            };
            let bucket = lowest.get_mut();
            // Descending, so the smallest entries pop off the end.
            bucket.sort_unstable_by(|a, b| entry_order(b, a));
            while batch.len() < limit {
                match bucket.pop() {
                    Some(entry) => {
                        batch.push(entry);
                        self.len -= 1;
                    }
                    None => break,
                }
            }
            if bucket.is_empty() {
                self.spare.push(lowest.remove());
            }
        }
    }

    fn len(&self) -> usize {
        self.len
    }

    fn memory_usage(&self) -> usize {
        use std::mem::size_of;

        let entries: usize = self
            .buckets
            .values()
            .chain(self.spare.iter())
            .map(|b| b.capacity() * size_of::<FrontierEntry>())
            .sum();
        entries + self.buckets.len() * (size_of::<u64>() + size_of::<Vec<FrontierEntry>>())
    }
}

#[derive(Debug, Clone, Copy)]
struct HeapItem(FrontierEntry);

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        entry_order(&self.0, &other.0) == Ordering::Equal
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
        entry_order(&self.0, &other.0)
    }
}

/// Binary min-heap over the same order as [`BucketFrontier`].
#[derive(Default)]
pub struct HeapFrontier {
    heap: BinaryHeap<Reverse<HeapItem>>,
}

impl HeapFrontier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrontierStrategy for HeapFrontier {
    fn push(&mut self, entry: FrontierEntry) {
        self.heap.push(Reverse(HeapItem(entry)));
    }

    fn next_batch(&mut self, limit: usize, batch: &mut Vec<FrontierEntry>) {
        while batch.len() < limit {
            match self.heap.pop() {
                Some(Reverse(HeapItem(entry))) => batch.push(entry),
                None => break,
            }
        }
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn memory_usage(&self) -> usize {
        self.heap.capacity() * std::mem::size_of::<Reverse<HeapItem>>()
    }
}
