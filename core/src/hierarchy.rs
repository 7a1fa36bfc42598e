//! Multi-level graph contraction.
//!
//! Each contraction step greedily clusters the current level into
//! supernodes of at most `branching_factor` nodes: nodes are visited by
//! descending degree (ties broken by a seeded hash), and each unassigned
//! node absorbs its unassigned neighbours along the lightest edges first.
//! Edges between two supernodes collapse into one coarse edge carrying the
//! minimum weight of the edges it replaces; edges inside a supernode
//! disappear. Both rules can only shorten paths, so a coarse distance is
//! always a lower bound on the true distance of every node it represents.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::config::HierarchyConfig;
use crate::error::{InvalidGraphReason, Result};
use crate::graph::{EdgeIndex, Graph, GraphBuilder, NodeId, Weight};

const UNASSIGNED: NodeId = NodeId::MAX;

/// How far a level's edge weights may sit below the edges they replace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ContractionError {
    /// Largest gap between the heaviest and lightest original edge folded
    /// into a single coarse edge.
    pub max_edge_spread: Weight,
    /// Heaviest edge dropped because both endpoints share a supernode.
    pub max_collapsed_weight: Weight,
}

/// One coarse level: the contracted graph plus its mappings back down.
#[derive(Debug, Clone)]
pub struct HierarchyLevel {
    graph: Graph,
    fine_to_coarse: Vec<NodeId>,
    assignment: Vec<NodeId>,
    members: Vec<Vec<NodeId>>,
    edge_origins: Vec<Vec<EdgeIndex>>,
    error: ContractionError,
}

impl HierarchyLevel {
    /// The contracted graph. Its edge weights are the level's true weights.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Supernode of each node of the next finer level (or of the original
    /// graph, for the finest coarse level).
    pub fn fine_to_coarse(&self) -> &[NodeId] {
        &self.fine_to_coarse
    }

    /// Supernode containing original node `node`.
    pub fn supernode_of(&self, node: NodeId) -> NodeId {
        self.assignment[node as usize]
    }

    /// Original nodes represented by `supernode`, ascending.
    pub fn members(&self, supernode: NodeId) -> &[NodeId] {
        &self.members[supernode as usize]
    }

    /// Original edges approximated by coarse edge `edge`.
    pub fn edge_origins(&self, edge: EdgeIndex) -> &[EdgeIndex] {
        &self.edge_origins[edge]
    }

    pub fn error(&self) -> ContractionError {
        self.error
    }

    /// Approximate memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        use std::mem::size_of;

        let ids = self.fine_to_coarse.capacity() + self.assignment.capacity();
        let members: usize = self
            .members
            .iter()
            .map(|m| m.capacity() * size_of::<NodeId>() + size_of::<Vec<NodeId>>())
            .sum();
        let origins: usize = self
            .edge_origins
            .iter()
            .map(|o| o.capacity() * size_of::<EdgeIndex>() + size_of::<Vec<EdgeIndex>>())
            .sum();
        self.graph.memory_usage() + ids * size_of::<NodeId>() + members + origins
    }
}

/// Levels ordered coarsest first. The original graph is not included; it is
/// the implicit finest level below the last entry.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    levels: Vec<HierarchyLevel>,
}

impl Hierarchy {
    pub fn levels(&self) -> &[HierarchyLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn coarsest(&self) -> Option<&HierarchyLevel> {
        self.levels.first()
    }

    /// Approximate memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        self.levels.iter().map(HierarchyLevel::memory_usage).sum()
    }
}

pub struct HierarchyBuilder {
    config: HierarchyConfig,
}

impl HierarchyBuilder {
    pub fn new(config: HierarchyConfig) -> Self {
        Self { config }
    }

    /// Contract `graph` until a level has fewer than `node_count / b` nodes,
    /// `max_levels` levels exist, or a step stops making progress.
    pub fn build(&self, graph: &Graph) -> Result<Hierarchy> {
        self.config.validate()?;
        let n = graph.node_count();
        if n == 0 {
            return Err(InvalidGraphReason::DegenerateLevel { step: 0 }.into());
        }
        let b = self.config.branching_factor;

        // Built fine to coarse, reversed at the end.
        let mut built: Vec<HierarchyLevel> = Vec::new();
        for step in 0..self.config.max_levels {
            let prev = built.last();
            let fine = prev.map_or(graph, |l| &l.graph);
            let fine_n = fine.node_count();
            if fine_n <= 1 || fine_n.saturating_mul(b) < n {
                break;
            }

            let level = contract(fine, prev, b, self.config.seed, step)?;
            let coarse_n = level.node_count();
            if coarse_n == 0 {
                return Err(InvalidGraphReason::DegenerateLevel { step }.into());
            }
            if coarse_n == fine_n {
                debug!(step, nodes = fine_n, "contraction stalled, stopping");
                break;
            }
            debug!(
                step,
                fine_nodes = fine_n,
                coarse_nodes = coarse_n,
                coarse_edges = level.graph.edge_count(),
                max_edge_spread = level.error.max_edge_spread,
                max_collapsed_weight = level.error.max_collapsed_weight,
                "contracted level"
            );
            built.push(level);
        }

        built.reverse();
        Ok(Hierarchy { levels: built })
    }
}

/// SplitMix64 finalizer, used for seeded tie-breaking.
fn mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

struct CoarseEdge {
    from: NodeId,
    to: NodeId,
    min: Weight,
    max: Weight,
    origins: Vec<EdgeIndex>,
}

fn contract(
    fine: &Graph,
    prev: Option<&HierarchyLevel>,
    cap: usize,
    seed: u64,
    step: usize,
) -> Result<HierarchyLevel> {
    let n = fine.node_count();

    // Undirected view, self-loops dropped.
    let mut adjacency: Vec<Vec<(Weight, NodeId)>> = vec![Vec::new(); n];
    for (_, u, e) in fine.edges() {
        if u != e.target {
            adjacency[u as usize].push((e.weight, e.target));
            adjacency[e.target as usize].push((e.weight, u));
        }
    }

    let salt = mix(seed ^ ((step as u64) << 32));
    let mut order: Vec<NodeId> = (0..n as NodeId).collect();
    order.sort_by_key(|&u| {
        (
            std::cmp::Reverse(adjacency[u as usize].len()),
            mix(salt ^ u as u64),
            u,
        )
    });

    let mut cluster = vec![UNASSIGNED; n];
    let mut coarse_n: NodeId = 0;
    for &u in &order {
        if cluster[u as usize] != UNASSIGNED {
            continue;
        }
        let id = coarse_n;
        coarse_n += 1;
        cluster[u as usize] = id;

        let neighbors = &mut adjacency[u as usize];
        neighbors.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let mut size = 1;
        for &(_, v) in neighbors.iter() {
            if size >= cap {
                break;
            }
            if cluster[v as usize] == UNASSIGNED {
                cluster[v as usize] = id;
                size += 1;
            }
        }
    }

    let mut error = ContractionError::default();
    let mut slots: HashMap<(NodeId, NodeId), usize> = HashMap::new();
    let mut coarse_edges: Vec<CoarseEdge> = Vec::new();
    for (index, u, e) in fine.edges() {
        let (cu, cv) = (cluster[u as usize], cluster[e.target as usize]);
        if cu == cv {
            error.max_collapsed_weight = error.max_collapsed_weight.max(e.weight);
            continue;
        }
        let origins = match prev {
            Some(p) => p.edge_origins[index].as_slice(),
            None => std::slice::from_ref(&index),
        };
        match slots.get(&(cu, cv)) {
            Some(&slot) => {
                let ce = &mut coarse_edges[slot];
                ce.min = ce.min.min(e.weight);
                ce.max = ce.max.max(e.weight);
                ce.origins.extend_from_slice(origins);
            }
            None => {
                slots.insert((cu, cv), coarse_edges.len());
                coarse_edges.push(CoarseEdge {
                    from: cu,
                    to: cv,
                    min: e.weight,
                    max: e.weight,
                    origins: origins.to_vec(),
                });
            }
        }
    }

    // Once sorted by (from, to), the builder's stable scatter keeps this
    // order, so slot i is edge index i in the coarse graph.
    coarse_edges.sort_by_key(|ce| (ce.from, ce.to));
    let mut builder = GraphBuilder::with_capacity(coarse_n as usize, coarse_edges.len());
    let mut edge_origins = Vec::with_capacity(coarse_edges.len());
    for ce in coarse_edges {
        builder.add_edge(ce.from, ce.to, ce.min);
        error.max_edge_spread = error.max_edge_spread.max(ce.max - ce.min);
        let mut origins = ce.origins;
        origins.sort_unstable();
        edge_origins.push(origins);
    }
    let graph = builder.build()?;

    let assignment: Vec<NodeId> = match prev {
        Some(p) => p.assignment.iter().map(|&s| cluster[s as usize]).collect(),
        None => cluster.clone(),
    };
    let mut members = vec![Vec::new(); coarse_n as usize];
    for (node, &s) in assignment.iter().enumerate() {
        members[s as usize].push(node as NodeId);
    }

    Ok(HierarchyLevel {
        graph,
        fine_to_coarse: cluster,
        assignment,
        members,
        edge_origins,
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::validator::dijkstra;

    fn config(max_levels: usize, branching_factor: usize) -> HierarchyConfig {
        HierarchyConfig {
            max_levels,
            branching_factor,
            seed: 7,
        }
    }

    fn make_chain(n: u32) -> Graph {
        Graph::from_edges(n as usize, (0..n - 1).map(|i| (i, i + 1, (i % 3) as f64 + 1.0))).unwrap()
    }

    fn make_grid(side: u32) -> Graph {
        let mut edges = Vec::new();
        for r in 0..side {
            for c in 0..side {
                let u = r * side + c;
                if c + 1 < side {
                    edges.push((u, u + 1, ((u * 7) % 5) as f64 + 1.0));
                    edges.push((u + 1, u, ((u * 3) % 4) as f64 + 0.5));
                }
                if r + 1 < side {
                    edges.push((u, u + side, ((u * 11) % 6) as f64 + 1.0));
                }
            }
        }
        Graph::from_edges((side * side) as usize, edges).unwrap()
    }

    #[test]
    fn test_levels_strictly_coarsen() {
        let g = make_grid(8);
        let h = HierarchyBuilder::new(config(10, 2)).build(&g).unwrap();
        assert!(!h.is_empty());

        let mut finer = g.node_count();
        for level in h.levels().iter().rev() {
            assert!(level.node_count() < finer);
            assert_eq!(level.fine_to_coarse().len(), finer);
            finer = level.node_count();
        }
        // Stops once below node_count / b.
        let coarsest = h.coarsest().unwrap();
        assert!(coarsest.node_count() * 2 < g.node_count());
    }

    #[test]
    fn test_max_levels_respected() {
        let g = make_chain(64);
        let h = HierarchyBuilder::new(config(1, 64)).build(&g).unwrap();
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn test_members_partition_original_nodes() {
        let g = make_grid(6);
        let h = HierarchyBuilder::new(config(3, 3)).build(&g).unwrap();
        for level in h.levels() {
            let mut seen = vec![false; g.node_count()];
            for s in 0..level.node_count() as NodeId {
                for &m in level.members(s) {
                    assert!(!seen[m as usize], "node {m} in two supernodes");
                    seen[m as usize] = true;
                    assert_eq!(level.supernode_of(m), s);
                }
            }
            assert!(seen.iter().all(|&x| x));
        }
    }

    #[test]
    fn test_coarse_edge_is_min_of_origins() {
        let g = make_grid(6);
        let h = HierarchyBuilder::new(config(3, 3)).build(&g).unwrap();
        for level in h.levels() {
            for (index, cu, e) in level.graph().edges() {
                let origins = level.edge_origins(index);
                assert!(!origins.is_empty());
                let mut min = f64::INFINITY;
                for (orig_index, u, oe) in g.edges() {
                    if origins.binary_search(&orig_index).is_ok() {
                        assert_eq!(level.supernode_of(u), cu);
                        assert_eq!(level.supernode_of(oe.target), e.target);
                        min = min.min(oe.weight);
                    }
                }
                assert_eq!(e.weight, min);
            }
        }
    }

    #[test]
    fn test_coarse_distances_are_lower_bounds() {
        let g = make_grid(7);
        let exact = dijkstra(&g, 0).unwrap().distances;
        let h = HierarchyBuilder::new(config(4, 2)).build(&g).unwrap();
        for level in h.levels() {
            let coarse = dijkstra(level.graph(), level.supernode_of(0)).unwrap().distances;
            for v in 0..g.node_count() as NodeId {
                let bound = coarse[level.supernode_of(v) as usize];
                assert!(bound <= exact[v as usize], "node {v}: {bound} > {}", exact[v as usize]);
            }
        }
    }

    #[test]
    fn test_same_seed_same_hierarchy() {
        let g = make_grid(6);
        let a = HierarchyBuilder::new(config(3, 3)).build(&g).unwrap();
        let b = HierarchyBuilder::new(config(3, 3)).build(&g).unwrap();
        assert_eq!(a.len(), b.len());
        for (la, lb) in a.levels().iter().zip(b.levels()) {
            assert_eq!(la.fine_to_coarse(), lb.fine_to_coarse());
        }
    }

    #[test]
    fn test_parallel_edges_fold_to_min() {
        // 0 and 1 are hubs pulled into different clusters; 2→3 parallel edges.
        let g = Graph::from_edges(
            4,
            vec![(0, 2, 1.0), (1, 3, 1.0), (2, 3, 9.0), (2, 3, 4.0), (0, 1, 100.0)],
        )
        .unwrap();
        let h = HierarchyBuilder::new(config(1, 2)).build(&g).unwrap();
        let level = h.coarsest().unwrap();
        let s2 = level.supernode_of(2);
        let s3 = level.supernode_of(3);
        if s2 != s3 {
            let w = level
                .graph()
                .neighbors(s2)
                .iter()
                .filter(|e| e.target == s3)
                .map(|e| e.weight)
                .fold(f64::INFINITY, f64::min);
            assert!(w <= 4.0);
        }
        assert!(level.error().max_edge_spread >= 0.0);
    }

    #[test]
    fn test_empty_graph_is_degenerate() {
        let g = GraphBuilder::new(0).build().unwrap();
        let err = HierarchyBuilder::new(config(3, 2)).build(&g).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidGraph(InvalidGraphReason::DegenerateLevel { step: 0 })
        ));
    }

    #[test]
    fn test_edgeless_graph_stalls() {
        let g = GraphBuilder::new(5).build().unwrap();
        let h = HierarchyBuilder::new(config(3, 2)).build(&g).unwrap();
        assert!(h.is_empty());
    }

    #[test]
    fn test_single_node_has_no_levels() {
        let g = GraphBuilder::new(1).build().unwrap();
        let h = HierarchyBuilder::new(config(3, 2)).build(&g).unwrap();
        assert!(h.is_empty());
    }

    #[test]
    fn test_memory_usage_nonzero() {
        let g = make_grid(5);
        let h = HierarchyBuilder::new(config(2, 2)).build(&g).unwrap();
        assert!(h.memory_usage() > 0);
    }
}
