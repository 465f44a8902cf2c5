//! Staging and removal helpers for backup entries.
//!
//! Snapshots and archives are never written under their final name:
//! 1. Write to a hidden staging entry next to the destination
//! 2. Rename the staging entry onto the final name (atomic on POSIX)
//! 3. Sweep staging leftovers of interrupted runs on the next cycle

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{RetentionError, Result};

use super::config::STAGING_SUFFIX;

/// Staging path for `destination`: `.{file name}.partial` in the same directory.
pub fn staging_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}{}", name, STAGING_SUFFIX))
}

/// Whether a backup-directory entry name is a staging leftover.
pub fn is_staging_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(STAGING_SUFFIX)
}

/// Move a finished staging entry onto its final name.
pub fn commit_staged(staging: &Path, destination: &Path) -> io::Result<()> {
    fs::rename(staging, destination)?;
    debug!(
        staging = %staging.display(),
        destination = %destination.display(),
        "Committed staged entry"
    );
    Ok(())
}

/// Remove a backup entry: recursively for directories, otherwise as a file.
///
/// Symlinks are removed themselves, never their targets.
pub fn remove_entry(path: &Path) -> Result<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };

    result.map_err(|source| RetentionError::Remove {
        path: path.to_path_buf(),
        source,
    })
}

/// Delete staging leftovers directly inside `dir`.
///
/// Returns the removed paths. A missing directory has nothing to sweep, and
/// a leftover that cannot be removed is logged and left in place.
pub fn sweep_stale_staging(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut removed = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !is_staging_name(&name.to_string_lossy()) {
            continue;
        }

        let path = entry.path();
        match remove_entry(&path) {
            Ok(()) => {
                warn!(path = %path.display(), "Removed staging leftover of an interrupted run");
                removed.push(path);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove staging leftover");
            }
        }
    }

    Ok(removed)
}
