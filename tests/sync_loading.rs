//! Integration tests for synchronous loading, reference counting and budgets

mod common;

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use archetype_resource::{
    hash_path, CacheConfig, MemoryDomain, MockLoader, MockResource, Resource, ResourceCache,
    ResourceError,
};
use common::mock_cache;

#[test]
fn test_concurrent_loads_decode_once() {
    const THREADS: usize = 8;

    let cache = Arc::new(ResourceCache::new(CacheConfig::default()).unwrap());
    let loader = Arc::new(MockLoader::new(&["mesh"]).with_delay(Duration::from_millis(20)));
    cache.register_format_loader(loader.clone());

    let barrier = Arc::new(Barrier::new(THREADS));
    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.load("shared.mesh").unwrap()
            })
        })
        .collect();
    let handles: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    assert_eq!(loader.decode_count(), 1);
    assert!(handles.iter().all(|h| h.ptr_eq(&handles[0])));
    assert!(handles[0].ref_count() >= THREADS);
    assert_eq!(cache.metrics().decode_count("shared.mesh"), 1);
}

#[test]
fn test_release_to_zero_then_reload_decodes_again() {
    let (cache, loader) = mock_cache(CacheConfig::default());

    let handle = cache.load("a.mesh").unwrap();
    assert_eq!(handle.ref_count(), 1);
    drop(handle);
    assert!(!cache.contains("a.mesh"));

    let _again = cache.load("a.mesh").unwrap();
    assert_eq!(loader.decodes_of("a.mesh"), 2);
}

#[test]
fn test_handle_exposes_resource() {
    let (cache, loader) = mock_cache(CacheConfig::default());
    loader.set_size("sized.mesh", 321, 654);

    let handle = cache.load("sized.mesh").unwrap();
    assert_eq!(handle.path(), "sized.mesh");
    assert_eq!(handle.key(), hash_path("sized.mesh"));
    assert_eq!((handle.size_cpu(), handle.size_gpu()), (321, 654));

    let resource = handle.downcast_ref::<MockResource>().unwrap();
    assert_eq!(resource.key, handle.key());
    assert_eq!(handle.resource().guid(), Some(handle.key()));
}

#[test]
fn test_manual_reference_release() {
    let (cache, _loader) = mock_cache(CacheConfig::default());

    let key = cache.load("a.mesh").unwrap().into_key();
    let second = cache.load("a.mesh").unwrap();
    assert_eq!(second.ref_count(), 2);

    cache.decrement_reference(key);
    assert_eq!(second.ref_count(), 1);
    drop(second);
    assert!(!cache.contains("a.mesh"));

    // Releasing an already removed key stays a no-op
    cache.decrement_reference(key);
    cache.decrement_reference(key);
    assert!(cache.resources().is_empty());
}

#[test]
fn test_budget_overrun_is_reported_not_enforced() {
    let (cache, loader) = mock_cache(CacheConfig::new(1000, 1 << 20));
    loader.set_size("a.mesh", 600, 0);
    loader.set_size("b.mesh", 600, 0);

    let _a = cache.load("a.mesh").unwrap();
    assert!(cache.metrics().budget_events().is_empty());

    let _b = cache.load("b.mesh").unwrap();
    assert!(cache.contains("b.mesh"));
    assert_eq!(cache.mem_usage_cpu(), 1200);

    let events = cache.metrics().budget_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].domain, MemoryDomain::Cpu);
    assert_eq!(events[0].path, "b.mesh");
    assert_eq!((events[0].usage, events[0].capacity), (1200, 1000));
}

#[test]
fn test_gpu_budget_tracked_separately() {
    let (cache, loader) = mock_cache(CacheConfig::new(1 << 20, 100));
    loader.set_size("tex.mesh", 10, 150);

    let _handle = cache.load("tex.mesh").unwrap();
    assert_eq!(cache.mem_usage_gpu(), 150);
    assert_eq!(cache.capacity_gpu(), 100);

    let events = cache.metrics().budget_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].domain, MemoryDomain::Gpu);
}

#[test]
fn test_budget_usage_not_returned_on_release() {
    let (cache, loader) = mock_cache(CacheConfig::new(1000, 1000));
    loader.set_size("a.mesh", 600, 0);

    drop(cache.load("a.mesh").unwrap());
    assert!(!cache.contains("a.mesh"));
    assert_eq!(cache.mem_usage_cpu(), 600);

    // Reloading charges the budget again
    drop(cache.load("a.mesh").unwrap());
    assert_eq!(cache.mem_usage_cpu(), 1200);
}

#[test]
fn test_init_applies_once() {
    let (cache, _loader) = mock_cache(CacheConfig::default());
    assert!(cache.init(2048, 4096));
    assert!(!cache.init(1, 1));
    assert_eq!(cache.capacity_cpu(), 2048);
    assert_eq!(cache.capacity_gpu(), 4096);

    let (configured, _loader) = mock_cache(CacheConfig::new(10, 20));
    assert!(!configured.init(1, 1));
    assert_eq!(configured.capacity_cpu(), 10);
}

#[test]
fn test_decode_failures_leave_nothing_behind() {
    let (cache, loader) = mock_cache(CacheConfig::default());
    loader.fail_on("bad.mesh");
    loader.panic_on("boom.mesh");

    assert!(matches!(cache.load("bad.mesh"), Err(ResourceError::Decode { .. })));
    assert!(matches!(
        cache.load("boom.mesh"),
        Err(ResourceError::DecoderPanicked { .. })
    ));
    assert!(cache.resources().is_empty());

    // The cache keeps working afterwards
    assert!(cache.load("good.mesh").is_ok());
}

#[test]
fn test_clear_detaches_live_handles() {
    let (cache, loader) = mock_cache(CacheConfig::new(1000, 1000));

    let stale = cache.load("a.mesh").unwrap();
    cache.clear_resource_manager();
    assert!(cache.resources().is_empty());
    assert_eq!(cache.mem_usage_cpu(), 0);
    assert_eq!(cache.mem_usage_gpu(), 0);
    assert!(!stale.is_attached());

    let fresh = cache.load("a.mesh").unwrap();
    assert_eq!(loader.decodes_of("a.mesh"), 2);
    assert!(!fresh.ptr_eq(&stale));

    // Dropping the stale handle must not release the fresh entry
    let stale_copy = stale.clone();
    drop(stale);
    drop(stale_copy);
    assert!(fresh.is_attached());
    assert_eq!(fresh.ref_count(), 1);
}

#[test]
fn test_resources_snapshot() {
    let (cache, loader) = mock_cache(CacheConfig::default());
    loader.set_size("a.mesh", 7, 9);

    let _a = cache.load("a.mesh").unwrap();
    let _a2 = cache.load("a.mesh").unwrap();
    let _b = cache.load("b.mesh").unwrap();

    let mut resources = cache.resources();
    resources.sort_by(|x, y| x.path.cmp(&y.path));
    assert_eq!(resources.len(), 2);
    assert_eq!(resources[0].path, "a.mesh");
    assert_eq!(resources[0].ref_count, 2);
    assert_eq!((resources[0].size_cpu, resources[0].size_gpu), (7, 9));
    assert_eq!(resources[1].ref_count, 1);
}

#[test]
fn test_first_registered_loader_wins() {
    let cache = ResourceCache::new(CacheConfig::default()).unwrap();
    let first = Arc::new(MockLoader::new(&["mesh"]));
    let second = Arc::new(MockLoader::new(&["mesh"]));
    cache.register_format_loader(first.clone());
    cache.register_format_loader(second.clone());

    let _handle = cache.load("a.mesh").unwrap();
    assert_eq!(first.decode_count(), 1);
    assert_eq!(second.decode_count(), 0);
}
