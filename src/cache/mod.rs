//! Reference-counted resource cache with deduplicated loading
//!
//! This module provides the registry that maps asset paths to loaded
//! resources. Each distinct path is decoded at most once while it stays
//! resident, whether it is requested synchronously through
//! [`ResourceCache::load`] or in the background through
//! [`ResourceCache::async_load`].

pub mod budget;
pub mod metrics;

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle as ThreadHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::async_loading::{self, LoadFuture};
use crate::config::{CacheConfig, Capacities};
use crate::error::{ResourceError, Result};
use crate::jobs::{worker, Continuation, JobHandle, JobTable, Submission};
use crate::loader::{ArchiveExtractor, FormatLoader, LoaderRegistry};
use crate::resource::handle::ResourceSlot;
use crate::resource::{hash_path, Resource, ResourceHandle, ResourceInfo, ResourceKey};

pub use budget::{BudgetEvent, MemoryDomain};
pub use metrics::CacheMetrics;

/// State shared between the cache, its handles and the loader thread
pub(crate) struct CacheShared {
    resources: RwLock<HashMap<ResourceKey, Arc<ResourceSlot>>>,
    loaders: RwLock<LoaderRegistry>,
    archive: RwLock<Option<Arc<dyn ArchiveExtractor>>>,
    /// Serializes decodes so a key is never decoded twice concurrently
    create_lock: Mutex<()>,
    /// Guards the pending job table and the order keys enter the queue
    pub(crate) jobs: Mutex<JobTable>,
    /// Held by the loader thread while it processes a job, and by clears
    pub(crate) clear_lock: Mutex<()>,
    queue_tx: Mutex<Option<Sender<ResourceKey>>>,
    queue_rx: Receiver<ResourceKey>,
    running: AtomicBool,
    budget: budget::MemoryBudget,
    metrics: CacheMetrics,
    scratch_dir: PathBuf,
}

impl CacheShared {
    fn new(config: &CacheConfig) -> Self {
        let (queue_tx, queue_rx) = crossbeam_channel::unbounded();
        Self {
            resources: RwLock::new(HashMap::new()),
            loaders: RwLock::new(LoaderRegistry::new()),
            archive: RwLock::new(None),
            create_lock: Mutex::new(()),
            jobs: Mutex::new(JobTable::default()),
            clear_lock: Mutex::new(()),
            queue_tx: Mutex::new(Some(queue_tx)),
            queue_rx,
            running: AtomicBool::new(true),
            budget: budget::MemoryBudget::default(),
            metrics: CacheMetrics::new(),
            scratch_dir: config.scratch_dir.clone(),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Take a reference on a resident entry
    fn lookup(self: &Arc<Self>, key: ResourceKey) -> Option<ResourceHandle> {
        let resources = self.resources.read();
        let slot = resources.get(&key)?;
        slot.refs.fetch_add(1, Ordering::AcqRel);
        Some(ResourceHandle::adopt(Arc::clone(slot), Arc::downgrade(self)))
    }

    pub(crate) fn is_resident(&self, slot: &Arc<ResourceSlot>) -> bool {
        self.resources
            .read()
            .get(&slot.key)
            .is_some_and(|resident| Arc::ptr_eq(resident, slot))
    }

    /// Count another reference on `slot` if it is still the resident entry
    pub(crate) fn retain(&self, slot: &Arc<ResourceSlot>) {
        let resources = self.resources.read();
        if let Some(resident) = resources.get(&slot.key) {
            if Arc::ptr_eq(resident, slot) {
                resident.refs.fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    /// Release a reference held through a handle
    pub(crate) fn release_slot(&self, slot: &Arc<ResourceSlot>) {
        self.release_where(slot.key, |resident| Arc::ptr_eq(resident, slot));
    }

    /// Release a reference by key
    pub(crate) fn release(&self, key: ResourceKey) {
        self.release_where(key, |_| true);
    }

    fn release_where(&self, key: ResourceKey, matches: impl Fn(&Arc<ResourceSlot>) -> bool) {
        let removed = {
            let mut resources = self.resources.write();
            let Some(resident) = resources.get(&key) else {
                return;
            };
            if !matches(resident) || resident.refs.fetch_sub(1, Ordering::AcqRel) != 1 {
                return;
            }
            resources.remove(&key)
        };
        if let Some(slot) = removed {
            log::debug!("Removing resource '{}'", slot.path);
        }
    }

    /// Synchronous load with double-checked creation
    pub(crate) fn load(self: &Arc<Self>, path: &str) -> Result<ResourceHandle> {
        let key = hash_path(path);
        if let Some(handle) = self.lookup(key) {
            self.metrics.record_cache_hit();
            return Ok(handle);
        }

        let _creating = self.create_lock.lock();

        // Another thread may have finished the same load while we waited
        if let Some(handle) = self.lookup(key) {
            self.metrics.record_cache_hit();
            return Ok(handle);
        }
        self.metrics.record_cache_miss();

        let resource = self.decode(path, key)?;
        Ok(self.insert(path, key, resource))
    }

    /// Decode `path`, turning a panic anywhere in the loader or extractor
    /// into [`ResourceError::DecoderPanicked`]
    fn decode(&self, path: &str, key: ResourceKey) -> Result<Box<dyn Resource>> {
        let mut extracted = None;
        let started = Instant::now();
        let decoded = panic::catch_unwind(AssertUnwindSafe(|| {
            self.dispatch(path, key, &mut extracted)
        }));
        self.metrics.record_decode(path, started.elapsed());

        if let Some(file) = &extracted {
            if let Err(err) = std::fs::remove_file(file) {
                log::warn!("Failed to remove extracted file {}: {err}", file.display());
            }
        }

        decoded.unwrap_or_else(|_| {
            log::error!("Decoding '{path}' panicked");
            Err(ResourceError::DecoderPanicked {
                path: path.to_string(),
            })
        })
    }

    /// Pick the loader, extract archive entries, and run the loader
    ///
    /// `extracted` is set as soon as a scratch file exists, so the caller can
    /// remove it even if the loader fails or panics.
    fn dispatch(
        &self,
        path: &str,
        key: ResourceKey,
        extracted: &mut Option<PathBuf>,
    ) -> Result<Box<dyn Resource>> {
        let loader = self
            .loaders
            .read()
            .find_for_path(path)
            .ok_or_else(|| ResourceError::UnsupportedExtension {
                path: path.to_string(),
            })?;

        let extractor = self.archive.read().clone();
        if let Some(extractor) = extractor.filter(|extractor| extractor.recognizes(path)) {
            *extracted = Some(extractor.extract(path, key, &self.scratch_dir)?);
        }

        match extracted {
            Some(file) => loader.load(&file.to_string_lossy(), key),
            None => loader.load(path, key),
        }
    }

    fn insert(
        self: &Arc<Self>,
        path: &str,
        key: ResourceKey,
        resource: Box<dyn Resource>,
    ) -> ResourceHandle {
        let slot = Arc::new(ResourceSlot::new(key, path, resource));
        self.resources.write().insert(key, Arc::clone(&slot));

        for event in self.budget.charge(path, slot.size_cpu, slot.size_gpu) {
            log::warn!("{event}");
            for info in self.snapshot() {
                log::debug!(
                    "Resident resource {:016x} '{}' ({} bytes CPU, {} bytes GPU)",
                    info.key,
                    info.path,
                    info.size_cpu,
                    info.size_gpu
                );
            }
            self.metrics.record_budget_event(event);
        }

        ResourceHandle::adopt(slot, Arc::downgrade(self))
    }

    fn snapshot(&self) -> Vec<ResourceInfo> {
        self.resources.read().values().map(|slot| slot.info()).collect()
    }

    fn async_load(self: &Arc<Self>, path: &str, continuation: Continuation) -> JobHandle {
        if !self.is_running() {
            continuation(Err(ResourceError::ShutDown));
            return JobHandle::Immediate;
        }

        let key = hash_path(path);
        if let Some(handle) = self.lookup(key) {
            self.metrics.record_cache_hit();
            continuation(Ok(handle));
            return JobHandle::Immediate;
        }

        let mut jobs = self.jobs.lock();

        // Cleanup may have drained the table since the first check
        if !self.is_running() {
            drop(jobs);
            continuation(Err(ResourceError::ShutDown));
            return JobHandle::Immediate;
        }

        // The loader thread may have inserted it since the first check
        if let Some(handle) = self.lookup(key) {
            drop(jobs);
            self.metrics.record_cache_hit();
            continuation(Ok(handle));
            return JobHandle::Immediate;
        }

        match jobs.submit(key, path, continuation) {
            Submission::Appended { generation, index } => JobHandle::Pending {
                key,
                generation,
                index,
            },
            Submission::Created { generation } => {
                if let Some(queue) = self.queue_tx.lock().as_ref() {
                    // The receiver lives in `self`, so sending cannot fail
                    let _ = queue.send(key);
                }
                JobHandle::Pending {
                    key,
                    generation,
                    index: 0,
                }
            }
        }
    }

    fn clear(&self) {
        let (jobs, resources) = {
            let _clearing = self.clear_lock.lock();
            while self.queue_rx.try_recv().is_ok() {}
            let jobs = self.jobs.lock().drain();
            let resources: Vec<_> = self.resources.write().drain().collect();
            self.budget.reset_usage();
            (jobs, resources)
        };
        log::info!(
            "Cleared {} resident resources and {} pending jobs",
            resources.len(),
            jobs.len()
        );
        // Continuations and resources are dropped here, outside every lock
    }
}

/// Reference-counted resource cache
///
/// Owns one background loader thread for its whole lifetime. Dropping the
/// cache stops the thread and releases everything it holds.
///
/// # Example
/// ```ignore
/// let cache = ResourceCache::new(CacheConfig::new(64 << 20, 256 << 20))?;
/// cache.register_format_loader(ObjLoader::new());
///
/// let mesh = cache.load("meshes/crate.obj")?;
/// cache.async_load("meshes/barrel.obj", |result| {
///     if let Ok(mesh) = result {
///         scene.attach(mesh);
///     }
/// });
/// ```
pub struct ResourceCache {
    shared: Arc<CacheShared>,
    worker: Mutex<Option<ThreadHandle<()>>>,
}

impl ResourceCache {
    /// Create a cache and start its loader thread
    pub fn new(config: CacheConfig) -> Result<Self> {
        let shared = Arc::new(CacheShared::new(&config));
        if let Some(capacities) = config.capacities {
            shared.budget.init(capacities);
        }

        let queue = shared.queue_rx.clone();
        let worker = worker::spawn(Arc::clone(&shared), queue, &config.worker_name)?;
        log::debug!("Resource cache started loader thread '{}'", config.worker_name);

        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Set both memory budgets
    ///
    /// Only the first initialization takes effect, including one made through
    /// [`CacheConfig::capacities`]. Returns whether this call applied.
    pub fn init(&self, capacity_cpu: u64, capacity_gpu: u64) -> bool {
        self.shared.budget.init(Capacities {
            cpu: capacity_cpu,
            gpu: capacity_gpu,
        })
    }

    /// Load a resource on the calling thread, or share the resident one
    pub fn load(&self, path: &str) -> Result<ResourceHandle> {
        self.shared.load(path)
    }

    /// Load a resource on the loader thread
    ///
    /// If the resource is already resident, `continuation` runs immediately on
    /// the calling thread and [`JobHandle::Immediate`] is returned. Otherwise
    /// the continuation joins the pending job for this path (creating it if
    /// needed) and runs on the loader thread once the load finishes.
    pub fn async_load<F>(&self, path: &str, continuation: F) -> JobHandle
    where
        F: FnOnce(Result<ResourceHandle>) + Send + 'static,
    {
        self.shared.async_load(path, Box::new(continuation))
    }

    /// Load a resource on the loader thread and await the outcome
    ///
    /// Resolves to [`ResourceError::Cancelled`] if the continuation is
    /// removed or its job is discarded.
    pub fn load_future(&self, path: &str) -> (JobHandle, LoadFuture) {
        let (continuation, future) = async_loading::channel();
        (self.async_load(path, continuation), future)
    }

    /// Stop one continuation from running
    ///
    /// The load itself still happens and sibling continuations still run.
    /// A delivery that has already started cannot be retracted, and a handle
    /// from a job that already finished never touches a later job for the
    /// same path.
    pub fn remove_async_job(&self, handle: JobHandle) {
        if let JobHandle::Pending {
            key,
            generation,
            index,
        } = handle
        {
            self.shared.jobs.lock().deactivate(key, generation, index);
        }
    }

    /// Stop every pending continuation from running
    pub fn remove_all_async_jobs(&self) {
        self.shared.jobs.lock().deactivate_all();
    }

    /// Release one reference on the entry for `key`
    ///
    /// Pairs with [`ResourceHandle::into_key`]. Unknown keys are ignored, so
    /// releasing an already removed entry is harmless.
    pub fn decrement_reference(&self, key: ResourceKey) {
        self.shared.release(key);
    }

    /// Append a format loader; earlier registrations take priority
    pub fn register_format_loader<L: FormatLoader + 'static>(&self, loader: L) {
        self.shared.loaders.write().register(Arc::new(loader));
    }

    /// Read archive entries through `extractor`
    pub fn set_archive_extractor<E: ArchiveExtractor + 'static>(&self, extractor: E) {
        *self.shared.archive.write() = Some(Arc::new(extractor));
    }

    /// Drop every resident resource and pending job, and zero memory usage
    ///
    /// Resources are dropped regardless of their reference count; handles that
    /// are still alive keep their resource but detach from the cache. No
    /// continuation of a job that had not started loading will run.
    pub fn clear_resource_manager(&self) {
        self.shared.clear();
    }

    /// Stop the loader thread and release all loaders and resources
    ///
    /// Jobs still queued are abandoned. Calling this more than once is a no-op.
    pub fn cleanup(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }

        // Closing the channel wakes a loader blocked on an empty queue
        self.shared.queue_tx.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            if worker.thread().id() == thread::current().id() {
                log::warn!("Resource cache cleaned up from its own loader thread");
            } else if worker.join().is_err() {
                log::error!("Resource loader thread panicked");
            }
        }

        self.shared.loaders.write().clear();
        self.shared.archive.write().take();
        let jobs = self.shared.jobs.lock().drain();
        let resources: Vec<_> = self.shared.resources.write().drain().collect();
        log::debug!(
            "Resource cache shut down, released {} resources and abandoned {} jobs",
            resources.len(),
            jobs.len()
        );
    }

    /// Bytes of system memory charged so far
    pub fn mem_usage_cpu(&self) -> u64 {
        self.shared.budget.usage(MemoryDomain::Cpu)
    }

    pub fn capacity_cpu(&self) -> u64 {
        self.shared.budget.capacity(MemoryDomain::Cpu)
    }

    /// Bytes of video memory charged so far
    pub fn mem_usage_gpu(&self) -> u64 {
        self.shared.budget.usage(MemoryDomain::Gpu)
    }

    pub fn capacity_gpu(&self) -> u64 {
        self.shared.budget.capacity(MemoryDomain::Gpu)
    }

    /// Snapshot of every resident resource
    pub fn resources(&self) -> Vec<ResourceInfo> {
        self.shared.snapshot()
    }

    /// Whether `path` is resident
    pub fn contains(&self, path: &str) -> bool {
        self.shared.resources.read().contains_key(&hash_path(path))
    }

    /// Number of jobs waiting for or undergoing a load
    pub fn pending_job_count(&self) -> usize {
        self.shared.jobs.lock().len()
    }

    /// Number of continuations attached to the pending job for `path`
    pub fn pending_callbacks(&self, path: &str) -> usize {
        self.shared.jobs.lock().callback_count(hash_path(path))
    }

    /// Lookup and decode statistics
    pub fn metrics(&self) -> &CacheMetrics {
        &self.shared.metrics
    }
}

impl Drop for ResourceCache {
    fn drop(&mut self) {
        self.cleanup();
    }
}
