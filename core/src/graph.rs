use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{InvalidGraphReason, Result};

/// Dense node identifier in `[0, node_count)`. Doubles as the arena index
/// into per-node tables.
pub type NodeId = u32;

/// Edge weight. Always finite and non-negative once inside a [`Graph`].
pub type Weight = f64;

/// Position of an edge in a graph's compressed adjacency array.
pub type EdgeIndex = usize;

/// A directed edge in the adjacency array. The source is implied by the
/// slice it lives in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub target: NodeId,
    pub weight: Weight,
}

/// A directed edge as handed over by whoever constructs the graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub from: NodeId,
    pub to: NodeId,
    pub weight: Weight,
}

impl EdgeRecord {
    pub fn new(from: NodeId, to: NodeId, weight: Weight) -> Self {
        Self { from, to, weight }
    }
}

impl From<(NodeId, NodeId, Weight)> for EdgeRecord {
    fn from((from, to, weight): (NodeId, NodeId, Weight)) -> Self {
        Self { from, to, weight }
    }
}

/// Accumulates edges and validates them once, in [`GraphBuilder::build`].
///
/// Nothing is checked while edges are added, so a builder can be filled
/// from an untrusted edge list and rejected as a whole.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    node_count: usize,
    edges: Vec<EdgeRecord>,
}

impl GraphBuilder {
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            edges: Vec::new(),
        }
    }

    /// Pre-allocate for a known edge count.
    pub fn with_capacity(node_count: usize, edge_count: usize) -> Self {
        Self {
            node_count,
            edges: Vec::with_capacity(edge_count),
        }
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, weight: Weight) -> &mut Self {
        self.edges.push(EdgeRecord { from, to, weight });
        self
    }

    pub fn extend<I, E>(&mut self, edges: I) -> &mut Self
    where
        I: IntoIterator<Item = E>,
        E: Into<EdgeRecord>,
    {
        self.edges.extend(edges.into_iter().map(Into::into));
        self
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Validate every edge and freeze into compressed adjacency form.
    ///
    /// Edges keep their insertion order within each source's slice.
    /// Weights above `f64::MAX / node_count` are rejected so that no simple
    /// path length can overflow to infinity.
    pub fn build(self) -> Result<Graph> {
        let n = self.node_count;
        if n > NodeId::MAX as usize {
            return Err(InvalidGraphReason::TooManyNodes(n).into());
        }
        let limit = f64::MAX / n.max(1) as f64;

        for (index, e) in self.edges.iter().enumerate() {
            for node in [e.from, e.to] {
                if node as usize >= n {
                    return Err(InvalidGraphReason::EndpointOutOfRange {
                        index,
                        node,
                        node_count: n,
                    }
                    .into());
                }
            }
            if e.weight.is_nan() || e.weight.is_infinite() {
                return Err(InvalidGraphReason::NonFiniteWeight {
                    index,
                    weight: e.weight,
                }
                .into());
            }
            if e.weight < 0.0 {
                return Err(InvalidGraphReason::NegativeWeight {
                    index,
                    weight: e.weight,
                }
                .into());
            }
            if e.weight > limit {
                return Err(InvalidGraphReason::WeightTooLarge {
                    index,
                    weight: e.weight,
                    limit,
                }
                .into());
            }
        }

        // Counting sort by source: offsets first, then a stable scatter.
        let mut offsets = vec![0usize; n + 1];
        for e in &self.edges {
            offsets[e.from as usize + 1] += 1;
        }
        for i in 0..n {
            offsets[i + 1] += offsets[i];
        }

        let mut cursor = offsets.clone();
        let placeholder = Edge {
            target: 0,
            weight: 0.0,
        };
        let mut edges = vec![placeholder; self.edges.len()];
        for e in &self.edges {
            let slot = &mut cursor[e.from as usize];
            edges[*slot] = Edge {
                target: e.to,
                weight: e.weight + 0.0,
            };
            *slot += 1;
        }

        Ok(Graph { offsets, edges })
    }
}

/// Immutable weighted digraph in compressed sparse row form.
///
/// `offsets[u]..offsets[u + 1]` is the slice of `edges` leaving `u`.
/// Parallel edges and self-loops are kept as given.
#[derive(Debug, Clone)]
pub struct Graph {
    offsets: Vec<usize>,
    edges: Vec<Edge>,
}

impl Graph {
    /// Build and validate in one call. See [`GraphBuilder::build`].
    pub fn from_edges<I, E>(node_count: usize, edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = E>,
        E: Into<EdgeRecord>,
    {
        let mut builder = GraphBuilder::new(node_count);
        builder.extend(edges);
        builder.build()
    }

    pub fn node_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        (node as usize) < self.node_count()
    }

    /// Outgoing edges of `node`.
    pub fn neighbors(&self, node: NodeId) -> &[Edge] {
        &self.edges[self.edge_range(node)]
    }

    /// Adjacency-array positions of the edges leaving `node`.
    pub fn edge_range(&self, node: NodeId) -> Range<EdgeIndex> {
        let u = node as usize;
        self.offsets[u]..self.offsets[u + 1]
    }

    pub fn edge(&self, index: EdgeIndex) -> &Edge {
        &self.edges[index]
    }

    pub fn out_degree(&self, node: NodeId) -> usize {
        let u = node as usize;
        self.offsets[u + 1] - self.offsets[u]
    }

    /// Every edge as `(index, source, edge)`, in adjacency order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeIndex, NodeId, &Edge)> + '_ {
        (0..self.node_count() as NodeId).flat_map(move |u| {
            self.edge_range(u).map(move |i| (i, u, &self.edges[i]))
        })
    }

    /// Mean of the strictly positive edge weights, if any exist.
    pub fn mean_positive_weight(&self) -> Option<Weight> {
        let (sum, count) = self
            .edges
            .iter()
            .filter(|e| e.weight > 0.0)
            .fold((0.0, 0usize), |(s, c), e| (s + e.weight, c + 1));
        (count > 0).then(|| sum / count as Weight)
    }

    /// Approximate memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        use std::mem::size_of;

        self.offsets.capacity() * size_of::<usize>() + self.edges.capacity() * size_of::<Edge>()
    }
}
