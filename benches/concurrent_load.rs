//! Benchmark: Concurrent loading of shared paths

use std::sync::Arc;
use std::thread;

use archetype_resource::{CacheConfig, MockLoader, ResourceCache};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const PATHS: [&str; 4] = ["a.mesh", "b.mesh", "c.mesh", "d.mesh"];

fn concurrent_load_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_load");

    for threads in [1usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let cache = Arc::new(ResourceCache::new(CacheConfig::default()).expect("cache"));
                cache.register_format_loader(MockLoader::new(&["mesh"]).with_default_size(256, 0));

                let workers: Vec<_> = (0..threads)
                    .map(|i| {
                        let cache = Arc::clone(&cache);
                        thread::spawn(move || {
                            let handles: Vec<_> = PATHS
                                .iter()
                                .cycle()
                                .skip(i)
                                .take(PATHS.len())
                                .filter_map(|path| cache.load(path).ok())
                                .collect();
                            black_box(handles.len())
                        })
                    })
                    .collect();
                for worker in workers {
                    let _ = worker.join();
                }
            })
        });
    }

    group.bench_function("async_fan_in", |b| {
        let cache = ResourceCache::new(CacheConfig::default()).expect("cache");
        cache.register_format_loader(MockLoader::new(&["mesh"]));

        b.iter(|| {
            let futures: Vec<_> = (0..16).map(|_| cache.load_future("fan_in.mesh").1).collect();
            let handles = futures::executor::block_on(futures::future::join_all(futures));
            black_box(handles.len())
        })
    });

    group.finish();
}

criterion_group!(benches, concurrent_load_benchmark);
criterion_main!(benches);
