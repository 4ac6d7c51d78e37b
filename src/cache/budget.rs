//! CPU and GPU memory budgets
//!
//! Usage only ever grows with insertions and is reset by a full clear.
//! Releasing a resource does not give its bytes back.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::config::Capacities;

/// Which memory pool a budget tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryDomain {
    Cpu,
    Gpu,
}

impl fmt::Display for MemoryDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("CPU"),
            Self::Gpu => f.write_str("GPU"),
        }
    }
}

/// A budget overrun observed while inserting a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetEvent {
    pub domain: MemoryDomain,
    /// Path whose insertion crossed the capacity
    pub path: String,
    pub usage: u64,
    pub capacity: u64,
}

impl fmt::Display for BudgetEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Memory usage exceeds the {} memory limit. ({}KB / {}KB) (Usage / Capacity), \
             {} / {} bytes, after loading '{}'",
            self.domain,
            self.usage / 1024,
            self.capacity / 1024,
            self.usage,
            self.capacity,
            self.path
        )
    }
}

#[derive(Debug, Default)]
struct Counter {
    usage: AtomicU64,
    capacity: AtomicU64,
}

impl Counter {
    fn charge(&self, bytes: u64) -> (u64, u64) {
        let usage = self.usage.fetch_add(bytes, Ordering::SeqCst) + bytes;
        (usage, self.capacity.load(Ordering::SeqCst))
    }
}

/// Running totals against configured capacities
#[derive(Debug, Default)]
pub(crate) struct MemoryBudget {
    cpu: Counter,
    gpu: Counter,
    initialized: AtomicBool,
}

impl MemoryBudget {
    /// Set capacities. Only the first call has any effect.
    pub(crate) fn init(&self, capacities: Capacities) -> bool {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.cpu.capacity.store(capacities.cpu, Ordering::SeqCst);
        self.gpu.capacity.store(capacities.gpu, Ordering::SeqCst);
        true
    }

    /// Add a resource's footprint, returning every budget it pushed past capacity
    pub(crate) fn charge(&self, path: &str, size_cpu: u64, size_gpu: u64) -> Vec<BudgetEvent> {
        let mut events = Vec::new();
        for (domain, counter, bytes) in [
            (MemoryDomain::Cpu, &self.cpu, size_cpu),
            (MemoryDomain::Gpu, &self.gpu, size_gpu),
        ] {
            let (usage, capacity) = counter.charge(bytes);
            if usage > capacity {
                events.push(BudgetEvent {
                    domain,
                    path: path.to_string(),
                    usage,
                    capacity,
                });
            }
        }
        events
    }

    pub(crate) fn reset_usage(&self) {
        self.cpu.usage.store(0, Ordering::SeqCst);
        self.gpu.usage.store(0, Ordering::SeqCst);
    }

    pub(crate) fn usage(&self, domain: MemoryDomain) -> u64 {
        self.counter(domain).usage.load(Ordering::SeqCst)
    }

    pub(crate) fn capacity(&self, domain: MemoryDomain) -> u64 {
        self.counter(domain).capacity.load(Ordering::SeqCst)
    }

    fn counter(&self, domain: MemoryDomain) -> &Counter {
        match domain {
            MemoryDomain::Cpu => &self.cpu,
            MemoryDomain::Gpu => &self.gpu,
        }
    }
}
