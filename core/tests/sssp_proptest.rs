use frontier_sssp_core::{dijkstra, run, EdgeRecord, EngineConfig, Graph, HierarchyConfig, StrategyKind};
use proptest::prelude::*;

fn graph_input() -> impl Strategy<Value = (usize, Vec<EdgeRecord>)> {
    (1usize..48).prop_flat_map(|n| {
        let edge = (0..n as u32, 0..n as u32, 0u32..5_000)
            .prop_map(|(from, to, w)| EdgeRecord::new(from, to, w as f64 / 100.0));
        (Just(n), prop::collection::vec(edge, 0..240))
    })
}

fn strategy_kind() -> impl Strategy<Value = StrategyKind> {
    prop_oneof![Just(StrategyKind::Bucket), Just(StrategyKind::Heap)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn flat_run_matches_dijkstra(
        (n, edges) in graph_input(),
        source_pick in any::<u32>(),
        batch in 1usize..64,
        strategy in strategy_kind(),
        parallel_threshold in prop_oneof![Just(1usize), Just(usize::MAX)],
    ) {
        let graph = Graph::from_edges(n, edges).unwrap();
        let source = source_pick % n as u32;
        let config = EngineConfig::default()
            .with_batch_size(batch)
            .with_strategy(strategy)
            .with_parallel_threshold(parallel_threshold)
            .with_validation(true);

        let out = run(&graph, source, &config).unwrap();
        let baseline = dijkstra(&graph, source).unwrap();
        prop_assert_eq!(out.correctness, Some(true));
        prop_assert_eq!(out.distances.len(), n);
        for (got, want) in out.distances.iter().zip(&baseline.distances) {
            prop_assert_eq!(got.to_bits(), want.to_bits());
        }
        prop_assert!(out.metrics.nodes_visited >= baseline.nodes_visited);
    }

    #[test]
    fn hierarchical_run_matches_flat(
        (n, edges) in graph_input(),
        batch in 1usize..32,
        branching_factor in 2usize..6,
        max_levels in 1usize..4,
        seed in any::<u64>(),
    ) {
        let graph = Graph::from_edges(n, edges).unwrap();
        let flat = EngineConfig::default().with_batch_size(batch);
        let layered = flat.clone().with_hierarchy(HierarchyConfig { max_levels, branching_factor, seed });

        let a = run(&graph, 0, &flat).unwrap();
        let b = run(&graph, 0, &layered).unwrap();
        prop_assert_eq!(&a.distances, &b.distances);
        prop_assert!(b.metrics.hierarchy_levels_used <= max_levels);
    }

    #[test]
    fn distances_satisfy_triangle_inequality((n, edges) in graph_input(), batch in 1usize..16) {
        let graph = Graph::from_edges(n, edges).unwrap();
        let out = run(&graph, 0, &EngineConfig::default().with_batch_size(batch)).unwrap();
        prop_assert_eq!(out.distances[0], 0.0);
        for (_, from, edge) in graph.edges() {
            let du = out.distances[from as usize];
            let dv = out.distances[edge.target as usize];
            prop_assert!(dv <= du + edge.weight);
        }
    }
}
