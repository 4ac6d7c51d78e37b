//! archetype_resource - Reference-counted resource cache with background loading
//!
//! # Features
//! - One decode per path, however many threads ask for it at once
//! - Background loading on a dedicated thread with per-path deduplication
//! - Soft cancellation of pending continuations
//! - CPU and GPU memory budgets (reported, never enforced)
//! - Pluggable format loaders dispatched by extension
//! - Loading straight out of zip archives
//!
//! # Quick Start
//!
//! ```ignore
//! use archetype_resource::{CacheConfig, ResourceCache};
//!
//! let cache = ResourceCache::new(CacheConfig::new(64 << 20, 256 << 20))?;
//! cache.register_format_loader(ObjLoader::new());
//!
//! let mesh = cache.load("meshes/crate.obj")?;
//! let (_job, pending) = cache.load_future("meshes/barrel.obj");
//! let barrel = pending.await?;
//! ```
//!
//! # Feature Flags
//!
//! - `archive-zip`: Enable [`ZipExtractor`] for `archive.zip/entry` paths

// Core modules
pub mod cache;
pub mod jobs;
pub mod loader;
pub mod resource;

// Support modules
pub mod async_loading;
pub mod config;

// Error types
mod error;
pub use error::{ResourceError, Result};

// Re-export main types from cache
pub use cache::{BudgetEvent, CacheMetrics, MemoryDomain, ResourceCache};
pub use config::{CacheConfig, Capacities};

// Re-export job types
pub use async_loading::LoadFuture;
pub use jobs::{Continuation, JobHandle};

// Re-export loader types
#[cfg(feature = "archive-zip")]
pub use loader::ZipExtractor;
pub use loader::{
    split_archive_path, ArchiveExtractor, FormatLoader, LoaderRegistry, MockLoader, MockResource,
};

// Re-export resource types
pub use resource::mesh::{Corner, MeshAttributes};
pub use resource::{hash_path, MeshResource, Resource, ResourceHandle, ResourceInfo, ResourceKey};

// Version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
