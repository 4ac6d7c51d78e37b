//! Reading resources out of archives
//!
//! A path such as `packs/level1.zip/meshes/crate.obj` names the entry
//! `meshes/crate.obj` inside `packs/level1.zip`. The cache asks the
//! configured [`ArchiveExtractor`] to copy the entry to a scratch file,
//! decodes that file, then deletes it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::resource::ResourceKey;

/// Marker separating a zip archive from the entry inside it
pub const ZIP_MARKER: &str = ".zip";

/// Extracts archive entries to temporary files
pub trait ArchiveExtractor: Send + Sync {
    /// Whether `path` points inside an archive this extractor reads
    fn recognizes(&self, path: &str) -> bool;

    /// Copy the entry named by `path` into `scratch_dir`
    ///
    /// Returns the path of the extracted file; the cache removes it once
    /// the decode has finished.
    fn extract(&self, path: &str, key: ResourceKey, scratch_dir: &Path) -> Result<PathBuf>;
}

impl<E: ArchiveExtractor + ?Sized> ArchiveExtractor for Arc<E> {
    fn recognizes(&self, path: &str) -> bool {
        (**self).recognizes(path)
    }

    fn extract(&self, path: &str, key: ResourceKey, scratch_dir: &Path) -> Result<PathBuf> {
        (**self).extract(path, key, scratch_dir)
    }
}

/// Split `path` at `marker` into the archive path and the entry name
///
/// Returns `None` when the marker is missing or nothing follows it.
pub fn split_archive_path<'a>(path: &'a str, marker: &str) -> Option<(&'a str, &'a str)> {
    let end = path.find(marker)? + marker.len();
    let (archive, rest) = path.split_at(end);
    let entry = rest.trim_start_matches(['/', '\\']);
    if entry.is_empty() || entry.len() == rest.len() {
        return None;
    }
    Some((archive, entry))
}

/// Name for the scratch copy of an entry, keeping its extension
#[cfg(feature = "archive-zip")]
pub(crate) fn scratch_file_name(entry: &str, key: ResourceKey) -> String {
    let file_name = entry.rsplit(['/', '\\']).next().unwrap_or(entry);
    format!("{key:016x}-{file_name}")
}

/// Extractor for zip archives
#[cfg(feature = "archive-zip")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

#[cfg(feature = "archive-zip")]
impl ZipExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "archive-zip")]
impl ArchiveExtractor for ZipExtractor {
    fn recognizes(&self, path: &str) -> bool {
        split_archive_path(path, ZIP_MARKER).is_some()
    }

    fn extract(&self, path: &str, key: ResourceKey, scratch_dir: &Path) -> Result<PathBuf> {
        use crate::error::ResourceError;

        let archive_error = |reason: String| ResourceError::Archive {
            path: path.to_string(),
            reason,
        };

        let (archive_path, entry) = split_archive_path(path, ZIP_MARKER)
            .ok_or_else(|| archive_error("no entry after archive marker".to_string()))?;
        let entry_name = entry.replace('\\', "/");

        let file = std::fs::File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| archive_error(e.to_string()))?;
        let mut source = archive
            .by_name(&entry_name)
            .map_err(|e| archive_error(format!("{entry_name}: {e}")))?;

        let destination = scratch_dir.join(scratch_file_name(&entry_name, key));
        let mut target = std::fs::File::create(&destination)?;
        std::io::copy(&mut source, &mut target)?;

        log::debug!("Extracted '{entry_name}' from '{archive_path}' to {}", destination.display());
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_archive_path() {
        assert_eq!(
            split_archive_path("packs/level1.zip/meshes/crate.obj", ZIP_MARKER),
            Some(("packs/level1.zip", "meshes/crate.obj"))
        );
        assert_eq!(
            split_archive_path("packs\\level1.zip\\crate.obj", ZIP_MARKER),
            Some(("packs\\level1.zip", "crate.obj"))
        );
    }

    #[test]
    fn test_split_rejects_plain_paths() {
        assert_eq!(split_archive_path("meshes/crate.obj", ZIP_MARKER), None);
        assert_eq!(split_archive_path("packs/level1.zip", ZIP_MARKER), None);
        assert_eq!(split_archive_path("packs/level1.zipper/a.obj", ZIP_MARKER), None);
    }

    #[cfg(feature = "archive-zip")]
    #[test]
    fn test_scratch_file_name_keeps_extension() {
        let name = scratch_file_name("meshes/crate.obj", 0xab);
        assert_eq!(name, "00000000000000ab-crate.obj");
    }

    #[cfg(feature = "archive-zip")]
    #[test]
    fn test_zip_extractor_roundtrip() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("pack.zip");
        {
            let file = std::fs::File::create(&archive_path).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            writer
                .start_file("meshes/crate.obj", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"v 0 0 0\n").unwrap();
            writer.finish().unwrap();
        }

        let request = format!("{}/meshes/crate.obj", archive_path.display());
        let extractor = ZipExtractor::new();
        assert!(extractor.recognizes(&request));

        let extracted = extractor.extract(&request, 1, dir.path()).unwrap();
        assert_eq!(std::fs::read(&extracted).unwrap(), b"v 0 0 0\n");
    }
}
