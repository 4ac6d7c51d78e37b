//! Format loader contract and extension-based dispatch
//!
//! Loaders are tried in registration order; the first one that supports a
//! path's extension decodes it.

pub mod archive;
pub mod mock;

pub use archive::{split_archive_path, ArchiveExtractor, ZIP_MARKER};
#[cfg(feature = "archive-zip")]
pub use archive::ZipExtractor;
pub use mock::{MockLoader, MockResource};

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::resource::{Resource, ResourceKey};

/// Decoder for one or more file formats
///
/// # Example
/// ```ignore
/// struct BlobLoader;
///
/// impl FormatLoader for BlobLoader {
///     fn supports(&self, extension: &str) -> bool {
///         extension == "bin"
///     }
///
///     fn load(&self, path: &str, key: ResourceKey) -> Result<Box<dyn Resource>> {
///         let bytes = std::fs::read(path)?;
///         Ok(Box::new(Blob::new(key, bytes)))
///     }
/// }
/// ```
pub trait FormatLoader: Send + Sync {
    /// Whether this loader decodes files with `extension`
    ///
    /// The extension is lowercase and has no leading dot.
    fn supports(&self, extension: &str) -> bool;

    /// Decode the file at `path` into a resource cached under `key`
    fn load(&self, path: &str, key: ResourceKey) -> Result<Box<dyn Resource>>;

    /// Name used in diagnostics
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<L: FormatLoader + ?Sized> FormatLoader for Arc<L> {
    fn supports(&self, extension: &str) -> bool {
        (**self).supports(extension)
    }

    fn load(&self, path: &str, key: ResourceKey) -> Result<Box<dyn Resource>> {
        (**self).load(path, key)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Ordered list of format loaders
#[derive(Default)]
pub struct LoaderRegistry {
    loaders: Vec<Arc<dyn FormatLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a loader. Extensions are not deduplicated.
    pub fn register(&mut self, loader: Arc<dyn FormatLoader>) {
        log::debug!("Registered format loader '{}'", loader.name());
        self.loaders.push(loader);
    }

    /// First loader supporting `extension`
    pub fn find(&self, extension: &str) -> Option<Arc<dyn FormatLoader>> {
        self.loaders
            .iter()
            .find(|loader| loader.supports(extension))
            .cloned()
    }

    /// First loader supporting the extension of `path`
    pub fn find_for_path(&self, path: &str) -> Option<Arc<dyn FormatLoader>> {
        extension_of(path).and_then(|ext| self.find(&ext))
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Drop every registered loader
    pub fn clear(&mut self) {
        self.loaders.clear();
    }
}

/// Lowercase extension of `path` without the leading dot
pub fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
