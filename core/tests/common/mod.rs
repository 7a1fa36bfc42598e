#![allow(dead_code)]

use frontier_sssp_core::{EdgeRecord, Graph, NodeId};

/// Deterministic LCG so fixtures are identical on every run.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed ^ 0x2545_F491_4F6C_DD1D)
    }

    pub fn next(&mut self, max: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % max
    }

    /// Weight in `[0, 100)` with two decimals; roughly one in ten is zero.
    pub fn weight(&mut self) -> f64 {
        if self.next(10) == 0 {
            0.0
        } else {
            self.next(10_000) as f64 / 100.0
        }
    }
}

/// Exactly `m` edges over `n` nodes. The first `n - 1` form a chain from
/// node 0, the rest are uniform random and may repeat.
pub fn random_edges(n: usize, m: usize, seed: u64) -> Vec<EdgeRecord> {
    let mut rng = Lcg::new(seed);
    let mut edges = Vec::with_capacity(m);
    for v in 1..n.min(m + 1) {
        edges.push(EdgeRecord::new((v - 1) as NodeId, v as NodeId, 1.0 + rng.weight()));
    }
    while edges.len() < m {
        let from = rng.next(n as u64) as NodeId;
        let to = rng.next(n as u64) as NodeId;
        edges.push(EdgeRecord::new(from, to, rng.weight()));
    }
    edges
}

pub fn random_graph(n: usize, m: usize, seed: u64) -> Graph {
    Graph::from_edges(n, random_edges(n, m, seed)).unwrap()
}

/// Random edges only, so parts of the graph are usually unreachable.
pub fn sparse_graph(n: usize, m: usize, seed: u64) -> Graph {
    let mut rng = Lcg::new(seed);
    let edges: Vec<EdgeRecord> = (0..m)
        .map(|_| {
            let from = rng.next(n as u64) as NodeId;
            let to = rng.next(n as u64) as NodeId;
            EdgeRecord::new(from, to, rng.weight())
        })
        .collect();
    Graph::from_edges(n, edges).unwrap()
}

pub fn bits(distances: &[f64]) -> Vec<u64> {
    distances.iter().map(|d| d.to_bits()).collect()
}
