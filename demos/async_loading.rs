//! Background loading example for archetype_resource
//!
//! Queues several loads on the cache's loader thread, cancels one of them and
//! awaits the rest from a tokio runtime.

use std::time::Duration;

use archetype_resource::{CacheConfig, MockLoader, MockResource, ResourceCache};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("archetype_resource Background Loading Demo");
    println!("==========================================\n");

    let config = CacheConfig::new(1 << 20, 1 << 20).with_worker_name("demo-loader");
    let cache = ResourceCache::new(config)?;
    cache.register_format_loader(
        MockLoader::new(&["mesh"])
            .with_default_size(64 * 1024, 256 * 1024)
            .with_delay(Duration::from_millis(50)),
    );

    // Continuation style: runs on the loader thread
    cache.async_load("meshes/rock.mesh", |result| match result {
        Ok(rock) => println!("[callback] rock ready, {} bytes GPU", rock.size_gpu()),
        Err(err) => println!("[callback] rock failed: {err}"),
    });

    // Future style: two requests for the same path share one decode
    let (_, tree) = cache.load_future("meshes/tree.mesh");
    let (_, tree_again) = cache.load_future("meshes/tree.mesh");
    let (cancelled_job, cancelled) = cache.load_future("meshes/unused.mesh");
    cache.remove_async_job(cancelled_job);

    let (tree, tree_again) = tokio::join!(tree, tree_again);
    let (tree, tree_again) = (tree?, tree_again?);
    if let Some(mesh) = tree.downcast_ref::<MockResource>() {
        println!("[future] tree decoded from '{}'", mesh.source);
    }
    println!("[future] shared instance: {}", tree.ptr_eq(&tree_again));

    match cancelled.await {
        Ok(_) => println!("[future] unused mesh delivered anyway"),
        Err(err) => println!("[future] unused mesh: {err}"),
    }

    println!(
        "\nMemory usage: {}KB / {}KB CPU, {}KB / {}KB GPU",
        cache.mem_usage_cpu() / 1024,
        cache.capacity_cpu() / 1024,
        cache.mem_usage_gpu() / 1024,
        cache.capacity_gpu() / 1024
    );
    println!("Cache hit rate: {:.0}%", cache.metrics().cache_hit_rate() * 100.0);
    Ok(())
}
