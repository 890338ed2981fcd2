//! Benchmarks for the parallel taxonomy reduction and the graph codec.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use dl_taxonomy::id::{IdentifierService, MemoryIdentifierService, Nid, StableId};
use dl_taxonomy::logic::{DataTarget, ExpressionBuilder, InternalExpression};
use dl_taxonomy::stamp::{PremiseType, Stamp, StampCoordinate, Status};
use dl_taxonomy::taxonomy::{MemoryTaxonomyRecords, TaxonomyBuilder, TaxonomyRecord, TaxonomyView};

const PATH: Nid = Nid(0);

fn universe(concepts: usize) -> (Arc<MemoryIdentifierService>, Arc<MemoryTaxonomyRecords>) {
    let ids = Arc::new(MemoryIdentifierService::new());
    let records = Arc::new(MemoryTaxonomyRecords::new());
    let nids: Vec<Nid> = (0..concepts as u128)
        .map(|n| ids.register_concept(StableId(Uuid::from_u128(n + 1))))
        .collect();
    let mut rng = StdRng::seed_from_u64(0);
    for (i, nid) in nids.iter().enumerate().skip(1) {
        let origin = ids.local_to_sequence(*nid).unwrap();
        for _ in 0..rng.gen_range(1..=3) {
            records.add(
                origin,
                TaxonomyRecord {
                    destination: nids[rng.gen_range(0..i)],
                    premise: PremiseType::Stated,
                    stamp: Stamp {
                        status: Status::Active,
                        time: 1,
                        author: Nid(1),
                        module: Nid(2),
                        path: PATH,
                    },
                },
            );
        }
    }
    (ids, records)
}

fn bench_taxonomy_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("taxonomy_build");
    let view = TaxonomyView::new(PremiseType::Stated, StampCoordinate::latest_active(PATH));
    for concepts in [1_000usize, 20_000] {
        let (ids, records) = universe(concepts);
        let pool = Arc::new(rayon::ThreadPoolBuilder::new().build().unwrap());
        let builder = TaxonomyBuilder::new(ids, records, pool);
        group.bench_with_input(BenchmarkId::from_parameter(concepts), &view, |bench, view| {
            bench.iter(|| black_box(builder.build(view)))
        });
    }
    group.finish();
}

fn wide_definition(ids: &MemoryIdentifierService) -> InternalExpression {
    let mut b = ExpressionBuilder::new();
    let mut conjuncts = Vec::new();
    for n in 0..64u128 {
        let role = ids.register_concept(StableId(Uuid::from_u128(10_000 + n)));
        let filler = ids.register_concept(StableId(Uuid::from_u128(20_000 + n)));
        let filler = b.concept(filler);
        conjuncts.push(b.some_role(role, filler));
    }
    let and = b.and(conjuncts);
    let set = b.necessary_set(vec![and]);
    b.definition(vec![set]).unwrap()
}

fn bench_codec(c: &mut Criterion) {
    let ids = MemoryIdentifierService::new();
    let expr = wide_definition(&ids);
    let internal = expr.encode(DataTarget::Internal, &ids).unwrap();
    let external = expr.encode(DataTarget::External, &ids).unwrap();

    c.bench_function("encode_internal_64", |bench| {
        bench.iter(|| black_box(expr.encode(DataTarget::Internal, &ids).unwrap()))
    });
    c.bench_function("decode_internal_64", |bench| {
        bench.iter(|| {
            black_box(InternalExpression::decode(&internal, DataTarget::Internal, &ids).unwrap())
        })
    });
    c.bench_function("decode_external_64", |bench| {
        bench.iter(|| {
            black_box(InternalExpression::decode(&external, DataTarget::External, &ids).unwrap())
        })
    });
    c.bench_function("root_identity_64", |bench| {
        bench.iter(|| black_box(expr.root_identity(&ids).unwrap()))
    });
    c.bench_function("diff_self_64", |bench| {
        bench.iter(|| black_box(expr.maximal_common_subgraph(&expr)))
    });
}

criterion_group!(benches, bench_taxonomy_build, bench_codec);
criterion_main!(benches);
