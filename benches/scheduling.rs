//! Scheduling throughput over the bundled template pool.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vaultwright::{
    EngineConfig, GenerationConfig, GenerationContext, GenerationPass, PlacementRequest,
    PlacementScheduler, Region, TemplatePool,
};

const POOL: &str = include_str!("../data/templates.json");

fn bench_level_pass(c: &mut Criterion) {
    let engine = EngineConfig::default();
    let (pool, _) = match TemplatePool::from_json(POOL, &engine) {
        Ok(loaded) => loaded,
        Err(error) => panic!("bundled pool failed to load: {}", error),
    };
    let scheduler = PlacementScheduler::new(&pool, &engine);

    c.bench_function("level_pass_depth_15", |b| {
        let mut seed = 0u64;
        b.iter(|| {
            seed += 1;
            let context = GenerationContext::new(15, "D");
            let mut pass = GenerationPass::new(&scheduler, context, &GenerationConfig::new(seed))
                .unwrap();
            pass.schedule_shops(&Region::unbounded("market")).unwrap();
            pass.schedule(&PlacementRequest::any(Region::unbounded("level"), 8))
                .unwrap();
            black_box(pass.finish())
        })
    });
}

fn bench_pool_load(c: &mut Criterion) {
    let engine = EngineConfig::default();
    c.bench_function("pool_load", |b| {
        b.iter(|| black_box(TemplatePool::from_json(black_box(POOL), &engine).unwrap()))
    });
}

criterion_group!(benches, bench_level_pass, bench_pool_load);
criterion_main!(benches);
