//! Mock format loader for testing
//!
//! Produces [`MockResource`]s without touching the filesystem, counts every
//! decode, and can be told to fail, panic or stall on specific paths.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use super::FormatLoader;
use crate::error::{ResourceError, Result};
use crate::resource::{Resource, ResourceKey};

/// Resource produced by [`MockLoader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResource {
    pub key: ResourceKey,
    pub source: String,
    pub size_cpu: u64,
    pub size_gpu: u64,
}

impl Resource for MockResource {
    fn size_cpu(&self) -> u64 {
        self.size_cpu
    }

    fn size_gpu(&self) -> u64 {
        self.size_gpu
    }

    fn guid(&self) -> Option<u64> {
        Some(self.key)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Loader that fabricates resources of configurable size
#[derive(Debug, Default)]
pub struct MockLoader {
    extensions: Vec<String>,
    default_size: (u64, u64),
    sizes: RwLock<HashMap<String, (u64, u64)>>,
    failing: RwLock<HashSet<String>>,
    panicking: RwLock<HashSet<String>>,
    delay: Option<Duration>,
    decodes: AtomicUsize,
    decodes_by_path: RwLock<HashMap<String, usize>>,
}

impl MockLoader {
    /// Create a loader for the given extensions
    pub fn new(extensions: &[&str]) -> Self {
        Self {
            extensions: extensions.iter().map(|ext| ext.to_ascii_lowercase()).collect(),
            ..Default::default()
        }
    }

    /// Size given to resources without a per-path size
    pub fn with_default_size(mut self, cpu: u64, gpu: u64) -> Self {
        self.default_size = (cpu, gpu);
        self
    }

    /// Sleep for `delay` inside every decode
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Size given to the resource decoded from `path`
    pub fn set_size(&self, path: &str, cpu: u64, gpu: u64) {
        self.sizes.write().insert(path.to_string(), (cpu, gpu));
    }

    /// Make decodes of `path` return an error
    pub fn fail_on(&self, path: &str) {
        self.failing.write().insert(path.to_string());
    }

    /// Make decodes of `path` panic
    pub fn panic_on(&self, path: &str) {
        self.panicking.write().insert(path.to_string());
    }

    /// Total number of decodes attempted
    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    /// Number of decodes attempted for `path`
    pub fn decodes_of(&self, path: &str) -> usize {
        *self.decodes_by_path.read().get(path).unwrap_or(&0)
    }
}

impl FormatLoader for MockLoader {
    fn supports(&self, extension: &str) -> bool {
        self.extensions.iter().any(|ext| ext == extension)
    }

    fn load(&self, path: &str, key: ResourceKey) -> Result<Box<dyn Resource>> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        *self
            .decodes_by_path
            .write()
            .entry(path.to_string())
            .or_insert(0) += 1;

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.panicking.read().contains(path) {
            panic!("mock decoder panicked on {path}");
        }
        if self.failing.read().contains(path) {
            return Err(ResourceError::decode(path, "mock decode failure"));
        }

        let (size_cpu, size_gpu) = self
            .sizes
            .read()
            .get(path)
            .copied()
            .unwrap_or(self.default_size);

        Ok(Box::new(MockResource {
            key,
            source: path.to_string(),
            size_cpu,
            size_gpu,
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_loader_sizes() {
        let loader = MockLoader::new(&["Mesh"]).with_default_size(10, 20);
        loader.set_size("big.mesh", 600, 0);
        assert!(loader.supports("mesh"));

        let small = loader.load("small.mesh", 1).unwrap();
        assert_eq!((small.size_cpu(), small.size_gpu()), (10, 20));

        let big = loader.load("big.mesh", 2).unwrap();
        assert_eq!(big.size_cpu(), 600);
        assert_eq!(loader.decode_count(), 2);
        assert_eq!(loader.decodes_of("big.mesh"), 1);
    }

    #[test]
    fn test_mock_loader_failure() {
        let loader = MockLoader::new(&["mesh"]);
        loader.fail_on("bad.mesh");
        assert!(matches!(
            loader.load("bad.mesh", 3),
            Err(ResourceError::Decode { .. })
        ));
    }
}
