use serde::Serialize;

use crate::graph::NodeId;

/// Bumped on every accepted improvement of a node's distance.
pub type Generation = u64;

/// Per-node state for one level of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistanceRecord {
    pub distance: f64,
    pub generation: Generation,
    /// The node was popped with its current distance and its edges relaxed.
    /// Cleared again if a later relaxation improves the distance.
    pub settled: bool,
    /// A distance the node can never go below (0 when nothing better is
    /// known). Seeded from a coarser hierarchy level.
    pub lower_bound: f64,
}

impl DistanceRecord {
    pub const UNREACHED: Self = Self {
        distance: f64::INFINITY,
        generation: 0,
        settled: false,
        lower_bound: 0.0,
    };

    /// The distance already equals a proven lower bound, so no relaxation
    /// can ever lower it.
    pub fn is_final(&self) -> bool {
        self.distance <= self.lower_bound
    }
}

/// A snapshot of a node's record at the moment it was queued.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrontierEntry {
    pub node: NodeId,
    pub distance: f64,
    pub generation: Generation,
}

/// Arena of [`DistanceRecord`]s indexed by [`NodeId`].
///
/// `try_improve` is the only way to change a distance, which keeps
/// distances non-increasing and generations strictly increasing per
/// accepted update.
#[derive(Debug, Clone)]
pub struct DistanceTable {
    records: Vec<DistanceRecord>,
}

impl DistanceTable {
    pub fn new(node_count: usize) -> Self {
        Self {
            records: vec![DistanceRecord::UNREACHED; node_count],
        }
    }

    /// Table whose nodes start unreached but carry the given lower bounds.
    pub fn with_lower_bounds(bounds: Vec<f64>) -> Self {
        Self {
            records: bounds
                .into_iter()
                .map(|lower_bound| DistanceRecord {
                    lower_bound,
                    ..DistanceRecord::UNREACHED
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, node: NodeId) -> &DistanceRecord {
        &self.records[node as usize]
    }

    pub fn distance(&self, node: NodeId) -> f64 {
        self.records[node as usize].distance
    }

    /// Stale-entry filter: someone found a better distance after this entry
    /// was queued.
    #[inline]
    pub fn is_stale(&self, entry: &FrontierEntry) -> bool {
        self.records[entry.node as usize].generation != entry.generation
    }

    /// Compare-and-replace: accept `candidate` only if strictly smaller than
    /// the current distance. On success the generation is bumped and the
    /// entry to enqueue is returned.
    #[inline]
    pub fn try_improve(&mut self, node: NodeId, candidate: f64) -> Option<FrontierEntry> {
        let record = &mut self.records[node as usize];
        if candidate < record.distance {
            record.distance = candidate;
            record.generation += 1;
            record.settled = false;
            Some(FrontierEntry {
                node,
                distance: candidate,
                generation: record.generation,
            })
        } else {
            None
        }
    }

    /// Mark `node` settled. Returns whether its distance is provably final.
    pub fn settle(&mut self, node: NodeId) -> bool {
        let record = &mut self.records[node as usize];
        record.settled = true;
        record.is_final()
    }

    pub fn settled_count(&self) -> usize {
        self.records.iter().filter(|r| r.settled).count()
    }

    pub fn distances(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.distance).collect()
    }

    pub fn records(&self) -> &[DistanceRecord] {
        &self.records
    }

    /// Approximate memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        self.records.capacity() * std::mem::size_of::<DistanceRecord>()
    }
}
