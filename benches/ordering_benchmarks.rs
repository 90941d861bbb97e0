//! # Policy Ordering Benchmarks
//!
//! Topological ordering of policy include graphs: wide fan-in graphs, long chains and
//! layered diamonds.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::{BTreeMap, BTreeSet};

use gateway_bundler::policy::policy_order;

type Graph = BTreeMap<String, BTreeSet<String>>;

/// `n` policies, each including the previous one
fn chain(n: usize) -> Graph {
    (0..n)
        .map(|i| {
            let deps = if i == 0 {
                BTreeSet::new()
            } else {
                [format!("chain/p{:05}", i - 1)].into_iter().collect()
            };
            (format!("chain/p{:05}", i), deps)
        })
        .collect()
}

/// `layers` layers of `width` policies, every policy including all of the layer below
fn layered(layers: usize, width: usize) -> Graph {
    let name = |layer: usize, i: usize| format!("layer{:03}/p{:03}", layer, i);
    let mut graph = Graph::new();
    for layer in 0..layers {
        for i in 0..width {
            let deps = if layer == 0 {
                BTreeSet::new()
            } else {
                (0..width).map(|j| name(layer - 1, j)).collect()
            };
            graph.insert(name(layer, i), deps);
        }
    }
    graph
}

/// One shared library policy included by `n` others
fn fan_in(n: usize) -> Graph {
    let mut graph: Graph = (0..n)
        .map(|i| {
            (
                format!("api/p{:05}", i),
                ["lib/common".to_string()].into_iter().collect(),
            )
        })
        .collect();
    graph.insert("lib/common".to_string(), BTreeSet::new());
    graph
}

fn benchmark_policy_order(c: &mut Criterion) {
    let excluded = BTreeSet::new();
    let mut group = c.benchmark_group("policy_order");

    for size in [100usize, 1_000, 2_000] {
        let graph = chain(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("chain", size), &graph, |b, graph| {
            b.iter(|| policy_order(black_box(graph), &excluded).unwrap())
        });

        let graph = fan_in(size);
        group.bench_with_input(BenchmarkId::new("fan_in", size), &graph, |b, graph| {
            b.iter(|| policy_order(black_box(graph), &excluded).unwrap())
        });
    }

    for (layers, width) in [(10usize, 10usize), (20, 25)] {
        let graph = layered(layers, width);
        group.throughput(Throughput::Elements((layers * width) as u64));
        group.bench_with_input(
            BenchmarkId::new("layered", format!("{}x{}", layers, width)),
            &graph,
            |b, graph| b.iter(|| policy_order(black_box(graph), &excluded).unwrap()),
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_policy_order);
criterion_main!(benches);
