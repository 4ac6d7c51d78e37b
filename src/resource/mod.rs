//! Resource identity and the trait every cached object implements
//!
//! A resource is produced by a [`FormatLoader`](crate::FormatLoader), owned by
//! the cache, and shared with callers through [`ResourceHandle`]s.

pub mod handle;
pub mod mesh;

pub use handle::{ResourceHandle, ResourceInfo};
pub use mesh::MeshResource;

use std::any::Any;
use std::fmt::Debug;

/// Stable identity of a resource, derived from its path
pub type ResourceKey = u64;

/// An object the cache can hold
///
/// Sizes are read once when the resource is inserted and are expected to
/// stay fixed for its whole lifetime.
pub trait Resource: Any + Send + Sync + Debug {
    /// Bytes this resource occupies in system memory
    fn size_cpu(&self) -> u64;

    /// Bytes this resource will occupy in video memory
    fn size_gpu(&self) -> u64 {
        0
    }

    /// Opaque caller-assigned identifier used for log correlation
    fn guid(&self) -> Option<u64> {
        None
    }

    /// Upcast for downcasting to the concrete type
    fn as_any(&self) -> &dyn Any;
}

/// Hash a path into its cache key
///
/// The path is hashed exactly as given; `a/b.mesh` and `./a/b.mesh` are
/// distinct resources.
pub fn hash_path(path: &str) -> ResourceKey {
    xxhash_rust::xxh3::xxh3_64(path.as_bytes())
}
