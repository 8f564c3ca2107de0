use config::EngineConfig;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use engine::Engine;
use tempfile::tempdir;

const N_KEYS: usize = 5_000;
const VALUE_SIZE: usize = 100;

fn bench_config(dir: &std::path::Path) -> EngineConfig {
    EngineConfig::new(dir).with_capacity(1_000).with_wal_sync(false)
}

fn engine_set_benchmark(c: &mut Criterion) {
    c.bench_function("engine_set_5k_with_flushes", |b| {
        b.iter_batched(
            || tempdir().unwrap(),
            |dir| {
                let mut engine = Engine::open(bench_config(dir.path())).unwrap();
                for i in 0..N_KEYS {
                    engine
                        .set(format!("key{}", i).into_bytes(), vec![b'x'; VALUE_SIZE])
                        .unwrap();
                }
                engine.close().unwrap();
            },
            BatchSize::SmallInput,
        );
    });
}

fn engine_get_benchmark(c: &mut Criterion) {
    c.bench_function("engine_get_5k_across_segments", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let mut engine = Engine::open(bench_config(dir.path())).unwrap();
                for i in 0..N_KEYS {
                    engine
                        .set(format!("key{}", i).into_bytes(), vec![b'x'; VALUE_SIZE])
                        .unwrap();
                }
                (dir, engine)
            },
            |(_dir, engine)| {
                for i in 0..N_KEYS {
                    let key = format!("key{}", i).into_bytes();
                    assert!(engine.get(&key).unwrap().is_some());
                }
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, engine_set_benchmark, engine_get_benchmark);
criterion_main!(benches);
