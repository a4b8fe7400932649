use benches::{deduct_one, Setup, E, POINT_DIMENSIONS};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use incentive_system::prelude::*;

fn join_benchmark(c: &mut Criterion) {
    let mut setup = Setup::new(0);
    let promotions = setup.promotions.clone();

    let mut request_group = c.benchmark_group("Join request");
    for (i, dimension) in POINT_DIMENSIONS.iter().enumerate() {
        request_group.bench_with_input(BenchmarkId::from_parameter(*dimension), &i, |b, &i| {
            b.iter(|| {
                JoinRequest::new(
                    &mut setup.rng,
                    black_box(&setup.params),
                    black_box(&promotions[i]),
                    black_box(&setup.provider.public_key),
                    black_box(&setup.user),
                )
                .unwrap()
            });
        });
    }
    request_group.finish();

    let requests = promotions
        .iter()
        .map(|p| {
            JoinRequest::new(
                &mut setup.rng,
                &setup.params,
                p,
                &setup.provider.public_key,
                &setup.user,
            )
            .unwrap()
            .0
        })
        .collect::<Vec<_>>();

    let mut response_group = c.benchmark_group("Join response");
    for (i, dimension) in POINT_DIMENSIONS.iter().enumerate() {
        response_group.bench_with_input(BenchmarkId::from_parameter(*dimension), &i, |b, &i| {
            b.iter(|| {
                JoinResponse::new(
                    &mut setup.rng,
                    black_box(&setup.params),
                    black_box(&promotions[i]),
                    black_box(&setup.provider),
                    black_box(&requests[i]),
                )
                .unwrap()
            });
        });
    }
    response_group.finish();
}

fn earn_benchmark(c: &mut Criterion) {
    let mut setup = Setup::new(1);
    let promotions = setup.promotions.clone();
    let tokens = promotions
        .iter()
        .map(|p| setup.join(p))
        .collect::<Vec<_>>();

    let mut group = c.benchmark_group("Earn");
    for (i, dimension) in POINT_DIMENSIONS.iter().enumerate() {
        group.bench_with_input(BenchmarkId::from_parameter(*dimension), &i, |b, &i| {
            b.iter(|| {
                setup.earn(
                    black_box(&promotions[i]),
                    black_box(&tokens[i]),
                    vec![5; promotions[i].dimension()],
                )
            });
        });
    }
    group.finish();
}

fn spend_benchmark(c: &mut Criterion) {
    let mut setup = Setup::new(2);
    let promotions = setup.promotions.clone();
    let tokens = promotions
        .iter()
        .map(|p| setup.funded_token(p))
        .collect::<Vec<_>>();
    let policies = promotions
        .iter()
        .map(|p| deduct_one(p.dimension()))
        .collect::<Vec<_>>();
    let transaction_id = TransactionId::from("bench");
    // Nothing is ever synced so the same token can be spent in every iteration
    let graph = SharedDoubleSpendingGraph::<E>::new(&setup.params);

    let mut request_group = c.benchmark_group("Spend request");
    for (i, dimension) in POINT_DIMENSIONS.iter().enumerate() {
        let mut new_points = tokens[i].points().to_vec();
        new_points[0] -= 1;
        request_group.bench_with_input(BenchmarkId::from_parameter(*dimension), &i, |b, &i| {
            b.iter(|| {
                SpendRequest::new(
                    black_box(&setup.params),
                    black_box(&promotions[i]),
                    black_box(&setup.provider.public_key),
                    black_box(&setup.user),
                    black_box(&tokens[i]),
                    new_points.clone(),
                    black_box(&policies[i]),
                    black_box(&transaction_id),
                )
                .unwrap()
            });
        });
    }
    request_group.finish();

    let requests = (0..promotions.len())
        .map(|i| {
            let mut new_points = tokens[i].points().to_vec();
            new_points[0] -= 1;
            SpendRequest::new(
                &setup.params,
                &promotions[i],
                &setup.provider.public_key,
                &setup.user,
                &tokens[i],
                new_points,
                &policies[i],
                &transaction_id,
            )
            .unwrap()
            .0
        })
        .collect::<Vec<_>>();

    let mut response_group = c.benchmark_group("Spend response");
    for (i, dimension) in POINT_DIMENSIONS.iter().enumerate() {
        response_group.bench_with_input(BenchmarkId::from_parameter(*dimension), &i, |b, &i| {
            b.iter(|| {
                SpendResponse::new(
                    black_box(&setup.params),
                    black_box(&promotions[i]),
                    black_box(&setup.provider),
                    black_box(&requests[i]),
                    black_box(&policies[i]),
                    black_box(&transaction_id),
                    black_box(&graph),
                )
                .unwrap()
            });
        });
    }
    response_group.finish();

    let mut full_group = c.benchmark_group("Spend");
    for (i, dimension) in POINT_DIMENSIONS.iter().enumerate() {
        full_group.bench_with_input(BenchmarkId::from_parameter(*dimension), &i, |b, &i| {
            b.iter(|| {
                setup
                    .spend(
                        &graph,
                        black_box(&promotions[i]),
                        black_box(&tokens[i]),
                        black_box(&policies[i]),
                        &transaction_id,
                    )
                    .unwrap()
            });
        });
    }
    full_group.finish();
}

criterion_group!(benches, join_benchmark, earn_benchmark, spend_benchmark);
criterion_main!(benches);
