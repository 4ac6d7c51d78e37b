//! Background loader thread
//!
//! Consumes keys from the job queue in submission order, loads each one
//! through the cache and hands the result to every still-active
//! continuation of its job.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;

use super::PendingJob;
use crate::cache::CacheShared;
use crate::error::{ResourceError, Result};
use crate::resource::{ResourceHandle, ResourceKey};

/// Start the loader thread
pub(crate) fn spawn(
    shared: Arc<CacheShared>,
    queue: Receiver<ResourceKey>,
    name: &str,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || run(shared, queue))
}

fn run(shared: Arc<CacheShared>, queue: Receiver<ResourceKey>) {
    // recv fails once the cache drops its sender
    while let Ok(key) = queue.recv() {
        if !shared.is_running() {
            break;
        }
        match panic::catch_unwind(AssertUnwindSafe(|| load_job(&shared, key))) {
            Ok(Some((job, outcome))) => deliver(job, outcome),
            Ok(None) => {}
            Err(_) => fail_job(&shared, key),
        }
    }
    log::debug!("Resource loader thread stopped");
}

/// Load the job's resource and take the job out of the table
///
/// Runs under the job-clearing lock, so a concurrent clear either happens
/// before (and the job is gone) or waits until the job has been taken.
fn load_job(
    shared: &Arc<CacheShared>,
    key: ResourceKey,
) -> Option<(PendingJob, Result<ResourceHandle>)> {
    let _clearing = shared.clear_lock.lock();

    let path = shared.jobs.lock().path_of(key)?;
    log::debug!("Started async loading of '{path}'");

    let outcome = shared.load(&path);
    if let Err(err) = &outcome {
        log::warn!("Async load of '{path}' failed: {err}");
    }

    let job = shared.jobs.lock().take(key)?;
    Some((job, outcome))
}

/// Report a job whose load panicked outside the decoder
fn fail_job(shared: &CacheShared, key: ResourceKey) {
    let Some(job) = shared.jobs.lock().take(key) else {
        return;
    };
    log::error!("Async load of '{}' panicked", job.path);
    let path = job.path.clone();
    deliver(job, Err(ResourceError::DecoderPanicked { path }));
}

fn deliver(job: PendingJob, outcome: Result<ResourceHandle>) {
    let PendingJob { path, callbacks, .. } = job;

    for callback in callbacks.into_iter().filter(|callback| callback.active) {
        // Each delivery owns its own reference
        let result = match &outcome {
            Ok(handle) => Ok(handle.clone()),
            Err(err) => Err(err.clone()),
        };
        let continuation = callback.continuation;
        if panic::catch_unwind(AssertUnwindSafe(move || continuation(result))).is_err() {
            log::error!("Continuation for '{path}' panicked");
        }
    }

    // Releases the load's own reference
    drop(outcome);
    log::debug!("Done with async job '{path}'");
}
