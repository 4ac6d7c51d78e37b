//! Counted references to cached resources
//!
//! Every live [`ResourceHandle`] accounts for exactly one reference on its
//! cache entry. Cloning takes another reference, dropping releases one, and
//! the drop that brings the count to zero removes the entry from the cache.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use super::{Resource, ResourceKey};
use crate::cache::CacheShared;

/// A cache entry: the resource plus the bookkeeping the cache stamps on it
pub(crate) struct ResourceSlot {
    pub(crate) key: ResourceKey,
    pub(crate) path: String,
    pub(crate) size_cpu: u64,
    pub(crate) size_gpu: u64,
    pub(crate) refs: AtomicUsize,
    pub(crate) resource: Box<dyn Resource>,
}

impl ResourceSlot {
    /// Wrap a freshly decoded resource. The count starts at one for the
    /// reference handed back to the creating caller.
    pub(crate) fn new(key: ResourceKey, path: &str, resource: Box<dyn Resource>) -> Self {
        Self {
            key,
            path: path.to_string(),
            size_cpu: resource.size_cpu(),
            size_gpu: resource.size_gpu(),
            refs: AtomicUsize::new(1),
            resource,
        }
    }

    pub(crate) fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    pub(crate) fn info(&self) -> ResourceInfo {
        ResourceInfo {
            key: self.key,
            path: self.path.clone(),
            ref_count: self.ref_count(),
            size_cpu: self.size_cpu,
            size_gpu: self.size_gpu,
        }
    }
}

/// Snapshot of a resident cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub key: ResourceKey,
    pub path: String,
    pub ref_count: usize,
    pub size_cpu: u64,
    pub size_gpu: u64,
}

/// Shared reference to a cached resource
pub struct ResourceHandle {
    slot: Arc<ResourceSlot>,
    owner: Weak<CacheShared>,
}

impl ResourceHandle {
    /// Wrap a slot whose count already includes this handle
    pub(crate) fn adopt(slot: Arc<ResourceSlot>, owner: Weak<CacheShared>) -> Self {
        Self { slot, owner }
    }

    /// Key the resource is cached under
    pub fn key(&self) -> ResourceKey {
        self.slot.key
    }

    /// Path the resource was requested with
    pub fn path(&self) -> &str {
        &self.slot.path
    }

    /// Current number of references on the cache entry
    pub fn ref_count(&self) -> usize {
        self.slot.ref_count()
    }

    /// System memory footprint recorded at insertion
    pub fn size_cpu(&self) -> u64 {
        self.slot.size_cpu
    }

    /// Video memory footprint recorded at insertion
    pub fn size_gpu(&self) -> u64 {
        self.slot.size_gpu
    }

    /// The resource as a trait object
    pub fn resource(&self) -> &dyn Resource {
        self.slot.resource.as_ref()
    }

    /// Downcast the resource to its concrete type
    pub fn downcast_ref<T: Resource>(&self) -> Option<&T> {
        self.slot.resource.as_any().downcast_ref::<T>()
    }

    /// Whether the cache still tracks this handle's entry
    ///
    /// Handles outlive a [`clear_resource_manager`](crate::ResourceCache::clear_resource_manager)
    /// or a shutdown; they keep the resource alive but no longer count toward
    /// any cache entry.
    pub fn is_attached(&self) -> bool {
        self.owner
            .upgrade()
            .is_some_and(|shared| shared.is_resident(&self.slot))
    }

    /// Give up the handle while keeping its reference counted
    ///
    /// The reference must later be released with
    /// [`ResourceCache::decrement_reference`](crate::ResourceCache::decrement_reference).
    pub fn into_key(mut self) -> ResourceKey {
        // A dangling owner makes the drop below a no-op.
        self.owner = Weak::new();
        self.slot.key
    }

    /// Whether both handles point at the same loaded instance
    pub fn ptr_eq(&self, other: &ResourceHandle) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl Clone for ResourceHandle {
    fn clone(&self) -> Self {
        if let Some(shared) = self.owner.upgrade() {
            shared.retain(&self.slot);
        }
        Self {
            slot: Arc::clone(&self.slot),
            owner: self.owner.clone(),
        }
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        if let Some(shared) = self.owner.upgrade() {
            shared.release_slot(&self.slot);
        }
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("key", &self.slot.key)
            .field("path", &self.slot.path)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}
