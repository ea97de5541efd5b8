//! Benchmark suite for edge matching
//!
//! Compares the per-node search strategies on graphs of growing out-degree:
//! - linear scan of B's edge list
//! - per-node hash index
//! - auto (index above the default threshold)
//!
//! Also times a full multi-host run over prebuilt shards.
//!
//! Run: cargo bench --bench match_strategy

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use samecheck::compare::DEFAULT_INDEX_THRESHOLD;
use samecheck::{
    check_shards, Cluster, CompareOptions, Edge, EdgeList, HostId, MatchStrategy, PartitionMap,
    PartitionPolicy, PartitionedGraph, ShardBuilder,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `nodes` nodes with `degree` out-edges each. B holds the same edges in
/// reverse order so linear search hits its worst case.
fn edge_sets(nodes: u64, degree: u64) -> (Vec<Edge>, Vec<Edge>) {
    let a: Vec<Edge> = (0..nodes)
        .flat_map(|s| (0..degree).map(move |k| Edge::new(s, (s * 13 + k * 7) % nodes, (k % 5) as u32)))
        .collect();
    let mut b = a.clone();
    b.reverse();
    (a, b)
}

fn build(nodes: u64, edges: &[Edge], hosts: u32) -> Vec<PartitionedGraph> {
    let g = EdgeList::from_edges(Some(nodes), edges.to_vec()).unwrap();
    let builder = ShardBuilder::new(PartitionMap::new(PartitionPolicy::Blocked, nodes, hosts).unwrap());
    (0..hosts).map(|h| builder.build(&g, HostId(h)).unwrap()).collect()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_strategy");
    let nodes = 2_000;

    for degree in [4, 32, 256] {
        let (a, b) = edge_sets(nodes, degree);
        let a = build(nodes, &a, 1).remove(0);
        let b = build(nodes, &b, 1).remove(0);

        for (name, strategy) in [
            ("linear", MatchStrategy::Linear),
            ("indexed", MatchStrategy::Indexed),
            ("auto", MatchStrategy::Auto { threshold: DEFAULT_INDEX_THRESHOLD }),
        ] {
            let options = CompareOptions {
                strategy,
                ..Default::default()
            };
            group.bench_with_input(BenchmarkId::new(name, degree), &degree, |bench, _| {
                bench.iter(|| black_box(check_shards(&a, &b, options).unwrap()));
            });
        }
    }

    group.finish();
}

fn bench_cluster(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster");
    group.sample_size(20);
    let nodes = 20_000;
    let (a, b) = edge_sets(nodes, 8);

    for hosts in [1, 2, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(hosts), &hosts, |bench, &hosts| {
            bench.iter_batched(
                || (build(nodes, &a, hosts), build(nodes, &b, hosts)),
                |(sa, sb)| {
                    black_box(
                        Cluster::new(hosts)
                            .unwrap()
                            .run_shards(sa, sb, CompareOptions::default(), 1)
                            .unwrap(),
                    )
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_strategies, bench_cluster);
criterion_main!(benches);
