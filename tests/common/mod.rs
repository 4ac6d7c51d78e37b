//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use archetype_resource::{CacheConfig, MockLoader, ResourceCache};
use crossbeam_channel::{bounded, Sender};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Cache with a mock loader for `.mesh` files registered
pub fn mock_cache(config: CacheConfig) -> (ResourceCache, Arc<MockLoader>) {
    let cache = ResourceCache::new(config).expect("failed to start cache");
    let loader = Arc::new(MockLoader::new(&["mesh"]).with_default_size(100, 40));
    cache.register_format_loader(loader.clone());
    (cache, loader)
}

/// Holds the loader thread inside a continuation until opened
pub struct Gate {
    release: Sender<()>,
}

impl Gate {
    pub fn open(self) {
        let _ = self.release.send(());
    }
}

/// Park the loader thread on `path`'s continuation
///
/// Returns once the loader thread is inside the continuation, so every job
/// queued afterwards stays pending until the gate is opened.
pub fn block_loader(cache: &ResourceCache, path: &str) -> Gate {
    let (entered_tx, entered_rx) = bounded::<()>(1);
    let (release_tx, release_rx) = bounded::<()>(1);

    cache.async_load(path, move |_| {
        let _ = entered_tx.send(());
        let _ = release_rx.recv();
    });
    entered_rx
        .recv_timeout(TIMEOUT)
        .expect("loader thread never reached the gate");

    Gate { release: release_tx }
}

/// Poll `condition` until it holds or the timeout expires
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
