//! Pending asynchronous loads
//!
//! Each not-yet-loaded key has at most one [`PendingJob`]. Later requests
//! for the same key append their continuation to that job instead of
//! queueing a second load.

pub(crate) mod worker;

use std::collections::HashMap;
use std::fmt;

use crate::error::Result;
use crate::resource::{ResourceHandle, ResourceKey};

/// Callback invoked with the outcome of an asynchronous load
pub type Continuation = Box<dyn FnOnce(Result<ResourceHandle>) + Send + 'static>;

/// Identifies one continuation registered through
/// [`ResourceCache::async_load`](crate::ResourceCache::async_load)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobHandle {
    /// The continuation already ran on the calling thread
    Immediate,
    /// The continuation waits at `index` in the job for `key`
    ///
    /// `generation` tells apart successive jobs for the same key.
    Pending {
        key: ResourceKey,
        generation: u64,
        index: usize,
    },
}

impl JobHandle {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// Key of the job this continuation is attached to
    pub fn key(&self) -> Option<ResourceKey> {
        match self {
            Self::Immediate => None,
            Self::Pending { key, .. } => Some(*key),
        }
    }
}

pub(crate) struct JobCallback {
    pub(crate) active: bool,
    pub(crate) continuation: Continuation,
}

pub(crate) struct PendingJob {
    pub(crate) path: String,
    pub(crate) generation: u64,
    pub(crate) callbacks: Vec<JobCallback>,
}

impl fmt::Debug for PendingJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingJob")
            .field("path", &self.path)
            .field("generation", &self.generation)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// Result of submitting a continuation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Submission {
    /// A new job was created and must be queued
    Created { generation: u64 },
    /// The continuation joined an existing job at this index
    Appended { generation: u64, index: usize },
}

#[derive(Debug, Default)]
pub(crate) struct JobTable {
    jobs: HashMap<ResourceKey, PendingJob>,
    next_generation: u64,
}

impl JobTable {
    pub(crate) fn submit(
        &mut self,
        key: ResourceKey,
        path: &str,
        continuation: Continuation,
    ) -> Submission {
        let callback = JobCallback {
            active: true,
            continuation,
        };
        match self.jobs.get_mut(&key) {
            Some(job) => {
                job.callbacks.push(callback);
                Submission::Appended {
                    generation: job.generation,
                    index: job.callbacks.len() - 1,
                }
            }
            None => {
                let generation = self.next_generation;
                self.next_generation += 1;
                self.jobs.insert(
                    key,
                    PendingJob {
                        path: path.to_string(),
                        generation,
                        callbacks: vec![callback],
                    },
                );
                Submission::Created { generation }
            }
        }
    }

    /// Mark one continuation inactive; returns whether it was found
    ///
    /// A `generation` that does not match the current job for `key` is
    /// stale and ignored.
    pub(crate) fn deactivate(&mut self, key: ResourceKey, generation: u64, index: usize) -> bool {
        let callback = self
            .jobs
            .get_mut(&key)
            .filter(|job| job.generation == generation)
            .and_then(|job| job.callbacks.get_mut(index));
        match callback {
            Some(callback) => {
                callback.active = false;
                true
            }
            None => false,
        }
    }

    pub(crate) fn deactivate_all(&mut self) {
        for callback in self.jobs.values_mut().flat_map(|job| job.callbacks.iter_mut()) {
            callback.active = false;
        }
    }

    pub(crate) fn path_of(&self, key: ResourceKey) -> Option<String> {
        self.jobs.get(&key).map(|job| job.path.clone())
    }

    pub(crate) fn take(&mut self, key: ResourceKey) -> Option<PendingJob> {
        self.jobs.remove(&key)
    }

    /// Remove every job, handing them back so they can be dropped outside the lock
    pub(crate) fn drain(&mut self) -> Vec<PendingJob> {
        self.jobs.drain().map(|(_, job)| job).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.len()
    }

    pub(crate) fn callback_count(&self, key: ResourceKey) -> usize {
        self.jobs.get(&key).map_or(0, |job| job.callbacks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Continuation {
        Box::new(|_| {})
    }

    #[test]
    fn test_one_job_per_key() {
        let mut table = JobTable::default();
        assert_eq!(table.submit(1, "a.mesh", noop()), Submission::Created { generation: 0 });
        assert_eq!(
            table.submit(1, "a.mesh", noop()),
            Submission::Appended {
                generation: 0,
                index: 1
            }
        );
        assert_eq!(table.submit(2, "b.mesh", noop()), Submission::Created { generation: 1 });

        assert_eq!(table.len(), 2);
        assert_eq!(table.callback_count(1), 2);
        assert_eq!(table.path_of(2).as_deref(), Some("b.mesh"));
    }

    #[test]
    fn test_deactivate_single_callback() {
        let mut table = JobTable::default();
        table.submit(1, "a.mesh", noop());
        table.submit(1, "a.mesh", noop());

        assert!(table.deactivate(1, 0, 0));
        assert!(!table.deactivate(1, 0, 5));
        assert!(!table.deactivate(9, 0, 0));

        let job = table.take(1).unwrap();
        let active: Vec<bool> = job.callbacks.iter().map(|cb| cb.active).collect();
        assert_eq!(active, vec![false, true]);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let mut table = JobTable::default();
        table.submit(1, "a.mesh", noop());
        table.take(1);

        // Same key and index, but a later job
        assert_eq!(table.submit(1, "a.mesh", noop()), Submission::Created { generation: 1 });
        assert!(!table.deactivate(1, 0, 0));
        assert!(table.take(1).unwrap().callbacks[0].active);
    }

    #[test]
    fn test_deactivate_all_keeps_jobs() {
        let mut table = JobTable::default();
        table.submit(1, "a.mesh", noop());
        table.submit(2, "b.mesh", noop());
        table.deactivate_all();

        assert_eq!(table.len(), 2);
        let drained = table.drain();
        assert!(drained.iter().flat_map(|job| &job.callbacks).all(|cb| !cb.active));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_job_handle_accessors() {
        assert!(!JobHandle::Immediate.is_pending());
        assert_eq!(JobHandle::Immediate.key(), None);

        let handle = JobHandle::Pending {
            key: 4,
            generation: 2,
            index: 1,
        };
        assert!(handle.is_pending());
        assert_eq!(handle.key(), Some(4));
    }
}
