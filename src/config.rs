//! Cache configuration
//!
//! Capacities are budgets, not limits: exceeding them is reported but
//! never blocks a load.

use std::path::PathBuf;

/// Default name given to the background loader thread
pub const DEFAULT_WORKER_NAME: &str = "resource-loader";

/// Memory budgets in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capacities {
    pub cpu: u64,
    pub gpu: u64,
}

/// Configuration for a [`ResourceCache`](crate::ResourceCache)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Budgets applied at construction. When `None` the cache starts with
    /// zero capacities and waits for [`ResourceCache::init`](crate::ResourceCache::init).
    pub capacities: Option<Capacities>,
    /// Name of the background loader thread
    pub worker_name: String,
    /// Directory used for files extracted out of archives
    pub scratch_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacities: None,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

impl CacheConfig {
    /// Create a configuration with both budgets set
    pub fn new(capacity_cpu: u64, capacity_gpu: u64) -> Self {
        Self::default().with_capacities(capacity_cpu, capacity_gpu)
    }

    /// Set both budgets in bytes
    pub fn with_capacities(mut self, cpu: u64, gpu: u64) -> Self {
        self.capacities = Some(Capacities { cpu, gpu });
        self
    }

    /// Set the loader thread name
    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    /// Set the directory archive entries are extracted into
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }
}
