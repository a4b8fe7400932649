use benches::{deduct_one, Setup, E};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use incentive_system::prelude::*;

fn sync_benchmark(c: &mut Criterion) {
    let mut setup = Setup::new(3);
    let promotion = setup.promotions[0].clone();
    let policy = deduct_one(promotion.dimension());
    let online = SharedDoubleSpendingGraph::<E>::new(&setup.params);

    let chain_lengths = [2, 8, 16];
    let mut chains = vec![];
    for length in chain_lengths {
        let root = setup.funded_token(&promotion);
        let mut token = root.clone();
        let mut transactions = vec![];
        for i in 0..length {
            let (next, tx) = setup
                .spend(&online, &promotion, &token, &policy, &TransactionId::from(i as u64))
                .unwrap();
            transactions.push(tx);
            token = next;
        }
        // The root spent again at a store that has not synced
        let offline = SharedDoubleSpendingGraph::<E>::new(&setup.params);
        let (_, double_spend) = setup
            .spend(&offline, &promotion, &root, &policy, &TransactionId::from("again"))
            .unwrap();
        chains.push((transactions, double_spend));
    }

    let mut honest_group = c.benchmark_group("Sync honest transactions");
    for (i, length) in chain_lengths.iter().enumerate() {
        honest_group.bench_with_input(BenchmarkId::from_parameter(*length), &i, |b, &i| {
            b.iter(|| {
                let mut graph = DoubleSpendingGraph::new(&setup.params);
                for tx in &chains[i].0 {
                    graph.db_sync(black_box(tx)).unwrap();
                }
                graph
            });
        });
    }
    honest_group.finish();

    let mut trace_group = c.benchmark_group("Detect and trace double spend");
    for (i, length) in chain_lengths.iter().enumerate() {
        let mut synced = DoubleSpendingGraph::new(&setup.params);
        for tx in &chains[i].0 {
            synced.db_sync(tx).unwrap();
        }
        trace_group.bench_with_input(BenchmarkId::from_parameter(*length), &i, |b, &i| {
            b.iter(|| {
                let mut graph = synced.clone();
                let report = graph.db_sync(black_box(&chains[i].1)).unwrap();
                assert_eq!(report.double_spends.len(), 1);
                report
            });
        });
    }
    trace_group.finish();
}

criterion_group!(benches, sync_benchmark);
criterion_main!(benches);
