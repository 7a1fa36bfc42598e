use std::time::Instant;

use frontier_sssp_core::{EngineConfig, Error, GraphBuilder, HierarchyConfig, NodeId, SsspOutput};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Node/edge counts used by the memory scaling check.
const SCALING_SIZES: [(usize, usize); 3] = [(50, 262), (500, 4_955), (1_000, 9_984)];

/// Largest allowed spread between the best and worst bytes-per-element ratio.
const SCALING_TOLERANCE: f64 = 4.0;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mode = args.get(1).map(|s| s.as_str()).unwrap_or("all");
    let node_count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10_000);

    if mode == "help" || mode == "--help" {
        println!("Usage: frontier-sssp-bench [mode] [node_count]");
        println!();
        println!("Modes:");
        println!("  all         Run all generators and benchmark each (default)");
        println!("  random      Erdos-Renyi uniform random edges, uniform weights");
        println!("  grid        4-neighbour lattice with varied weights");
        println!("  scalefree   Preferential attachment via edge sampling (hub-and-spoke)");
        println!("  smallworld  Watts-Strogatz ring lattice + long weighted shortcuts");
        println!("  layered     DAG of layers with dense forward edges");
        println!("  scaling     Memory per node+edge at 50/262, 500/4955, 1000/9984");
        println!();
        println!("Default node_count: 10000");
        println!("Log level comes from RUST_LOG (default: info)");
        return;
    }

    println!("frontier-sssp-bench");
    println!("===================");
    println!();

    if mode == "scaling" {
        if !run_scaling() {
            std::process::exit(1);
        }
        return;
    }

    let generators: Vec<(&str, fn(usize) -> GraphBuilder)> = match mode {
        "random" => vec![("Erdos-Renyi random", gen_random)],
        "grid" => vec![("Weighted grid", gen_grid)],
        "scalefree" => vec![("Scale-free (edge sampling)", gen_scale_free)],
        "smallworld" => vec![("Small-world (Watts-Strogatz)", gen_small_world)],
        "layered" => vec![("Layered DAG", gen_layered)],
        "all" => vec![
            ("Erdos-Renyi random", gen_random as fn(usize) -> GraphBuilder),
            ("Weighted grid", gen_grid),
            ("Scale-free (edge sampling)", gen_scale_free),
            ("Small-world (Watts-Strogatz)", gen_small_world),
            ("Layered DAG", gen_layered),
        ],
        _ => {
            eprintln!("Unknown mode: {}. Use --help for options.", mode);
            return;
        }
    };

    let mut failures = 0;
    for (name, generator) in generators {
        failures += run_benchmark(name, generator, node_count);
    }
    if failures > 0 {
        error!(failures, "some runs did not match the Dijkstra baseline");
        std::process::exit(1);
    }
}

/// Benchmark one generator across batch sizes; returns the number of failed runs.
fn run_benchmark(name: &str, generator: fn(usize) -> GraphBuilder, node_count: usize) -> usize {
    println!("--- {} ---", name);
    println!("Target: {} nodes", node_count);

    let t = Instant::now();
    let graph = match generator(node_count).build() {
        Ok(graph) => graph,
        Err(err) => {
            error!(%err, "generator produced an invalid graph");
            return 1;
        }
    };
    println!(
        "Generated in {:.2}s: {} nodes, {} edges, ~{:.1}MB",
        t.elapsed().as_secs_f64(),
        graph.node_count(),
        graph.edge_count(),
        graph.memory_usage() as f64 / 1_048_576.0
    );
    if graph.node_count() == 0 {
        println!();
        return 0;
    }

    println!();
    println!(
        "{:>12} {:>8} {:>10} {:>10} {:>12} {:>10} {:>10} {:>8}",
        "mode", "batch", "iters", "visited", "relaxed", "time", "memory", "correct"
    );
    println!(
        "{:->12} {:->8} {:->10} {:->10} {:->12} {:->10} {:->10} {:->8}",
        "", "", "", "", "", "", "", ""
    );

    let mut failures = 0;
    let mut baseline_ms = None;
    for batch in [1, 10, 100, graph.node_count()] {
        let flat = EngineConfig::default().with_batch_size(batch).with_validation(true);
        let layered = flat.clone().with_hierarchy(HierarchyConfig::default());
        for (label, config) in [("flat", flat), ("hierarchical", layered)] {
            match frontier_sssp_core::run(&graph, 0, &config) {
                Ok(out) => {
                    if baseline_ms.is_none() {
                        baseline_ms = out
                            .validation
                            .as_ref()
                            .map(|v| v.baseline_time.as_secs_f64() * 1000.0);
                    }
                    print_row(label, batch, &out);
                }
                Err(err) => {
                    failures += 1;
                    report_failure(label, batch, &err);
                }
            }
        }
    }

    if let Some(ms) = baseline_ms {
        println!();
        println!("Dijkstra baseline: {:.1}ms", ms);
    }
    let reachable = frontier_sssp_core::dijkstra(&graph, 0)
        .map_or(0, |b| b.distances.iter().filter(|d| d.is_finite()).count());
    println!("Reachable from 0: {} / {}", reachable, graph.node_count());
    println!();
    failures
}

fn print_row(label: &str, batch: usize, out: &SsspOutput) {
    let m = &out.metrics;
    let correct = match out.correctness {
        Some(true) => "yes",
        Some(false) => "NO",
        None => "-",
    };
    println!(
        "{:>12} {:>8} {:>10} {:>10} {:>12} {:>8.1}ms {:>8.1}KB {:>8}",
        label,
        batch,
        m.iteration_count,
        m.nodes_visited,
        m.edges_relaxed,
        m.total_time.as_secs_f64() * 1000.0,
        m.memory_estimate as f64 / 1024.0,
        correct
    );
}

fn report_failure(label: &str, batch: usize, err: &Error) {
    println!("{:>12} {:>8} {:>10}", label, batch, "FAILED");
    match err {
        Error::ValidationMismatch { report, .. } => {
            error!(
                label,
                batch,
                mismatches = report.mismatch_count,
                first = ?report.mismatches.first(),
                "distances differ from baseline"
            );
        }
        other => error!(label, batch, err = %other, "run failed"),
    }
}

/// Check that memory per (node + edge) stays within a constant band.
fn run_scaling() -> bool {
    println!("--- Memory scaling ---");
    println!();
    println!(
        "{:>8} {:>8} {:>12} {:>14}",
        "nodes", "edges", "memory", "bytes/(n+m)"
    );
    println!("{:->8} {:->8} {:->12} {:->14}", "", "", "", "");

    let config = EngineConfig::default().with_batch_size(10).with_validation(true);
    let mut ratios = Vec::with_capacity(SCALING_SIZES.len());
    for (n, m) in SCALING_SIZES {
        let graph = match gen_exact(n, m, 2024).build() {
            Ok(graph) => graph,
            Err(err) => {
                error!(%err, n, m, "generator produced an invalid graph");
                return false;
            }
        };
        let out = match frontier_sssp_core::run(&graph, 0, &config) {
            Ok(out) => out,
            Err(err) => {
                report_failure("flat", 10, &err);
                return false;
            }
        };
        let ratio = out.metrics.memory_estimate as f64 / (n + m) as f64;
        println!(
            "{:>8} {:>8} {:>10.1}KB {:>14.2}",
            n,
            m,
            out.metrics.memory_estimate as f64 / 1024.0,
            ratio
        );
        ratios.push(ratio);
    }

    let lo = ratios.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = ratios.iter().copied().fold(0.0, f64::max);
    let spread = hi / lo;
    println!();
    if spread <= SCALING_TOLERANCE {
        info!(spread, "memory grows linearly in nodes + edges");
        println!("PASS: ratio spread {:.2}x (limit {:.1}x)", spread, SCALING_TOLERANCE);
        true
    } else {
        error!(spread, limit = SCALING_TOLERANCE, "memory ratio spread too large");
        println!("FAIL: ratio spread {:.2}x (limit {:.1}x)", spread, SCALING_TOLERANCE);
        false
    }
}

// ---------------------------------------------------------------------------
// Generators: deterministic, single-threaded, O(n + edges)
// ---------------------------------------------------------------------------

/// Simple LCG for deterministic, fast pseudo-random numbers.
struct FastRng(u64);

impl FastRng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next(&mut self, max: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 33) % max
    }
    fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
    fn node(&mut self, n: usize) -> NodeId {
        self.next(n as u64) as NodeId
    }
    /// Weight in `[lo, hi)`, rounded to two decimals.
    fn weight(&mut self, lo: f64, hi: f64) -> f64 {
        ((lo + self.next_f64() * (hi - lo)) * 100.0).round() / 100.0
    }
}

/// Exactly `m` random edges without self-loops. Node 0 gets a spanning
/// chain first so the whole graph is reachable from it.
fn gen_exact(n: usize, m: usize, seed: u64) -> GraphBuilder {
    let mut builder = GraphBuilder::with_capacity(n, m);
    let mut rng = FastRng::new(seed);
    for v in 1..n.min(m + 1) {
        builder.add_edge((v - 1) as NodeId, v as NodeId, rng.weight(1.0, 10.0));
    }
    while builder.edge_count() < m && n > 1 {
        let from = rng.node(n);
        let to = rng.node(n);
        if from != to {
            builder.add_edge(from, to, rng.weight(0.0, 100.0));
        }
    }
    builder
}

/// Erdos-Renyi: ~10 uniform random edges per node, weights in [0, 100).
fn gen_random(node_count: usize) -> GraphBuilder {
    let target_edges = node_count * 10;
    let mut builder = GraphBuilder::with_capacity(node_count, target_edges);
    let mut rng = FastRng::new(54321);

    for _ in 0..target_edges {
        let from = rng.node(node_count);
        let to = rng.node(node_count);
        if from != to {
            builder.add_edge(from, to, rng.weight(0.0, 100.0));
        }
    }

    builder
}

/// Square lattice with edges in both directions. Horizontal moves are cheap,
/// vertical moves expensive, so shortest paths bend instead of running straight.
fn gen_grid(node_count: usize) -> GraphBuilder {
    let side = (node_count as f64).sqrt().ceil().max(1.0) as usize;
    let mut builder = GraphBuilder::with_capacity(node_count, node_count * 4);
    let mut rng = FastRng::new(31337);

    for v in 0..node_count {
        let col = v % side;
        let right = v + 1;
        if col + 1 < side && right < node_count {
            let w = rng.weight(1.0, 3.0);
            builder.add_edge(v as NodeId, right as NodeId, w);
            builder.add_edge(right as NodeId, v as NodeId, w);
        }
        let down = v + side;
        if down < node_count {
            let w = rng.weight(5.0, 15.0);
            builder.add_edge(v as NodeId, down as NodeId, w);
            builder.add_edge(down as NodeId, v as NodeId, w);
        }
    }

    builder
}

/// Scale-free via edge-list sampling (O(edges), not O(n²)).
///
/// Preferential attachment by picking a random existing edge endpoint. Both
/// directions are added so hubs are reachable and reach back out.
fn gen_scale_free(node_count: usize) -> GraphBuilder {
    let edges_per_node = 5usize;
    let mut builder = GraphBuilder::with_capacity(node_count, node_count * edges_per_node * 2);
    let mut rng = FastRng::new(12345);
    let mut endpoints: Vec<NodeId> = Vec::with_capacity(node_count * edges_per_node * 2);

    // Seed: small clique
    let seed = 5.min(node_count);
    for i in 0..seed {
        for j in (i + 1)..seed {
            let w = rng.weight(1.0, 20.0);
            builder.add_edge(i as NodeId, j as NodeId, w);
            builder.add_edge(j as NodeId, i as NodeId, w);
            endpoints.push(i as NodeId);
            endpoints.push(j as NodeId);
        }
    }

    for new_node in seed..node_count {
        let attach = edges_per_node.min(new_node);
        for _ in 0..attach {
            if endpoints.is_empty() {
                break;
            }
            let target = endpoints[rng.next(endpoints.len() as u64) as usize];
            if target as usize != new_node {
                let w = rng.weight(1.0, 20.0);
                builder.add_edge(new_node as NodeId, target, w);
                builder.add_edge(target, new_node as NodeId, w);
                endpoints.push(new_node as NodeId);
                endpoints.push(target);
            }
        }
    }

    builder
}

/// Small-world (Watts-Strogatz): ring lattice plus rewired shortcuts.
///
/// Lattice edges are light; rewired shortcuts cost more, so a long hop is
/// only sometimes better than walking the ring.
fn gen_small_world(node_count: usize) -> GraphBuilder {
    let k = 5usize;
    let p = 0.05f64;
    let mut builder = GraphBuilder::with_capacity(node_count, node_count * k);
    let mut rng = FastRng::new(67890);

    for i in 0..node_count {
        for j in 1..=k {
            let neighbor = (i + j) % node_count;
            if rng.next_f64() < p {
                let rewired = rng.node(node_count);
                if rewired as usize != i {
                    builder.add_edge(i as NodeId, rewired, rng.weight(10.0, 50.0));
                    continue;
                }
            }
            if neighbor != i {
                builder.add_edge(i as NodeId, neighbor as NodeId, rng.weight(1.0, 5.0));
            }
        }
    }

    builder
}

/// Layered DAG: nodes split into layers of ~sqrt(n), each node linking to
/// a handful of random nodes in the next layer. Zero weights included.
fn gen_layered(node_count: usize) -> GraphBuilder {
    let width = (node_count as f64).sqrt().ceil().max(1.0) as usize;
    let fanout = 4usize;
    let mut builder = GraphBuilder::with_capacity(node_count, node_count * fanout);
    let mut rng = FastRng::new(77777);

    for v in 0..node_count {
        let next_start = (v / width + 1) * width;
        if next_start >= node_count {
            break;
        }
        let next_len = width.min(node_count - next_start);
        for _ in 0..fanout {
            let target = next_start + rng.next(next_len as u64) as usize;
            let w = if rng.next(10) == 0 { 0.0 } else { rng.weight(1.0, 10.0) };
            builder.add_edge(v as NodeId, target as NodeId, w);
        }
    }
    // Node 0 fans out to the whole first layer so every layer is reachable.
    for v in 1..width.min(node_count) {
        builder.add_edge(0, v as NodeId, rng.weight(1.0, 10.0));
    }

    builder
}
