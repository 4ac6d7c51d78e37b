use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::budget::BudgetEvent;

/// Tracks decode and lookup statistics for a resource cache
#[derive(Debug, Default)]
pub struct CacheMetrics {
    decode_times: RwLock<HashMap<String, Duration>>,
    decode_counts: RwLock<HashMap<String, u64>>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    budget_events: Mutex<Vec<BudgetEvent>>,
}

impl CacheMetrics {
    /// Create a new, empty set of metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decode and how long it took
    pub fn record_decode(&self, path: &str, duration: Duration) {
        self.decode_times.write().insert(path.to_string(), duration);
        *self
            .decode_counts
            .write()
            .entry(path.to_string())
            .or_insert(0) += 1;
    }

    /// Record a cache hit
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a budget overrun
    pub fn record_budget_event(&self, event: BudgetEvent) {
        self.budget_events.lock().push(event);
    }

    /// Get the cache hit rate as a percentage
    pub fn cache_hit_rate(&self) -> f32 {
        let hits = self.cache_hits.load(Ordering::Relaxed) as f32;
        let misses = self.cache_misses.load(Ordering::Relaxed) as f32;

        if hits + misses > 0.0 {
            hits / (hits + misses) * 100.0
        } else {
            0.0
        }
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Duration of the most recent decode of `path`
    pub fn last_decode_time(&self, path: &str) -> Option<Duration> {
        self.decode_times.read().get(path).cloned()
    }

    /// Number of times `path` has been decoded
    pub fn decode_count(&self, path: &str) -> u64 {
        *self.decode_counts.read().get(path).unwrap_or(&0)
    }

    /// Total decodes across all paths
    pub fn total_decodes(&self) -> u64 {
        self.decode_counts.read().values().sum()
    }

    /// Every budget overrun recorded so far
    pub fn budget_events(&self) -> Vec<BudgetEvent> {
        self.budget_events.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::budget::MemoryDomain;

    #[test]
    fn test_hit_rate() {
        let metrics = CacheMetrics::new();
        assert_eq!(metrics.cache_hit_rate(), 0.0);

        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        assert_eq!(metrics.cache_hit_rate(), 75.0);
    }

    #[test]
    fn test_decode_counts() {
        let metrics = CacheMetrics::new();
        metrics.record_decode("a.mesh", Duration::from_millis(3));
        metrics.record_decode("a.mesh", Duration::from_millis(5));
        metrics.record_decode("b.mesh", Duration::from_millis(1));

        assert_eq!(metrics.decode_count("a.mesh"), 2);
        assert_eq!(metrics.total_decodes(), 3);
        assert_eq!(metrics.last_decode_time("a.mesh"), Some(Duration::from_millis(5)));
        assert_eq!(metrics.decode_count("missing.mesh"), 0);
    }

    #[test]
    fn test_budget_events() {
        let metrics = CacheMetrics::new();
        metrics.record_budget_event(BudgetEvent {
            domain: MemoryDomain::Gpu,
            path: "a.mesh".to_string(),
            usage: 20,
            capacity: 10,
        });
        assert_eq!(metrics.budget_events().len(), 1);
    }
}
