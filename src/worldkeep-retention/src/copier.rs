//! Directory tree copying for snapshot creation.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::accountant::storage_identity;
use crate::{RetentionError, Result};

/// Copies a directory tree to a new location.
pub trait TreeCopier {
    /// Copy everything under `source` into `destination`, which must not exist yet.
    fn copy_tree(&self, source: &Path, destination: &Path) -> Result<()>;
}

/// Default copier.
///
/// Regular files are copied, directories recreated, symlinks recreated as
/// symlinks (Unix), and files that are hard-linked several times inside the
/// source are copied once and hard-linked for the remaining names so the
/// snapshot keeps the source's link structure.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardLinkCopier;

impl HardLinkCopier {
    pub fn new() -> Self {
        Self
    }
}

impl TreeCopier for HardLinkCopier {
    fn copy_tree(&self, source: &Path, destination: &Path) -> Result<()> {
        let copy_err = |from: &Path, to: &Path, source: io::Error| RetentionError::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        };

        // First copy of each multiply-linked source file.
        let mut linked: HashMap<(u64, u64), PathBuf> = HashMap::new();
        let mut files = 0usize;

        for entry in WalkDir::new(source) {
            let entry = entry?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| copy_err(entry.path(), destination, io::Error::other(e)))?;
            let target = destination.join(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                fs::create_dir_all(&target).map_err(|e| copy_err(entry.path(), &target, e))?;
            } else if file_type.is_file() {
                let metadata = entry
                    .metadata()
                    .map_err(|e| copy_err(entry.path(), &target, io::Error::other(e)))?;

                let identity = if link_count(&metadata) > 1 {
                    storage_identity(&metadata)
                } else {
                    None
                };

                match identity.and_then(|id| linked.get(&id)) {
                    Some(first) => {
                        fs::hard_link(first, &target)
                            .map_err(|e| copy_err(entry.path(), &target, e))?;
                    }
                    None => {
                        fs::copy(entry.path(), &target)
                            .map_err(|e| copy_err(entry.path(), &target, e))?;
                        if let Some(id) = identity {
                            linked.insert(id, target.clone());
                        }
                    }
                }
                files += 1;
            } else if file_type.is_symlink() {
                copy_symlink(entry.path(), &target)
                    .map_err(|e| copy_err(entry.path(), &target, e))?;
            }
        }

        debug!(
            source = %source.display(),
            destination = %destination.display(),
            files = files,
            "Copied directory tree"
        );
        Ok(())
    }
}

#[cfg(unix)]
fn link_count(metadata: &fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.nlink()
}

#[cfg(not(unix))]
fn link_count(_metadata: &fs::Metadata) -> u64 {
    1
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let points_to = fs::read_link(link)?;
    std::os::unix::fs::symlink(points_to, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, _target: &Path) -> io::Result<()> {
    tracing::warn!(path = %link.display(), "Skipping symlink, not supported on this platform");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_tree_recreates_structure() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("world");
        fs::create_dir_all(source.join("region")).unwrap();
        fs::create_dir_all(source.join("empty")).unwrap();
        fs::write(source.join("level.dat"), "level").unwrap();
        fs::write(source.join("region").join("r.0.0.mca"), "chunk").unwrap();

        let destination = temp_dir.path().join("copy");
        HardLinkCopier::new().copy_tree(&source, &destination).unwrap();

        assert_eq!(fs::read_to_string(destination.join("level.dat")).unwrap(), "level");
        assert_eq!(
            fs::read_to_string(destination.join("region").join("r.0.0.mca")).unwrap(),
            "chunk"
        );
        assert!(destination.join("empty").is_dir());
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = HardLinkCopier::new()
            .copy_tree(&temp_dir.path().join("nope"), &temp_dir.path().join("dst"));
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_preserves_hard_links() {
        use std::os::unix::fs::MetadataExt;

        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("world");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.bin"), vec![3u8; 64]).unwrap();
        fs::hard_link(source.join("a.bin"), source.join("b.bin")).unwrap();

        let destination = temp_dir.path().join("copy");
        HardLinkCopier::new().copy_tree(&source, &destination).unwrap();

        let a = fs::metadata(destination.join("a.bin")).unwrap();
        let b = fs::metadata(destination.join("b.bin")).unwrap();
        assert_eq!(a.ino(), b.ino());
        assert_ne!(a.ino(), fs::metadata(source.join("a.bin")).unwrap().ino());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_recreates_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("world");
        fs::create_dir_all(&source).unwrap();
        std::os::unix::fs::symlink("level.dat", source.join("current")).unwrap();

        let destination = temp_dir.path().join("copy");
        HardLinkCopier::new().copy_tree(&source, &destination).unwrap();

        assert_eq!(
            fs::read_link(destination.join("current")).unwrap(),
            PathBuf::from("level.dat")
        );
    }
}
