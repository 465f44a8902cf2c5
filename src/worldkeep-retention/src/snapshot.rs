//! Dated, once-per-day world snapshots.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::Result;

use super::atomic_ops::{commit_staged, remove_entry, staging_path};
use super::copier::{HardLinkCopier, TreeCopier};

/// What `ensure_snapshot` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    /// A new snapshot was copied from the source.
    Created,
    /// Today's snapshot (or its archive) already existed.
    AlreadyPresent,
    /// The source directory does not exist; nothing was materialized.
    SourceMissing,
}

/// A world snapshot destination and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    path: PathBuf,
    status: SnapshotStatus,
}

impl Snapshot {
    /// Destination directory. May not exist (source missing, or already archived).
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> SnapshotStatus {
        self.status
    }

    /// Whether the snapshot directory is on disk right now.
    pub fn is_materialized(&self) -> bool {
        self.path.is_dir()
    }
}

/// Backup entry name for a world on a date: `{world}_{YYYY-MM-DD}`.
pub fn snapshot_name(world_name: &str, date: NaiveDate) -> String {
    format!("{}_{}", world_name, date.format("%Y-%m-%d"))
}

/// Creates at most one snapshot per world per calendar day.
pub struct SnapshotManager {
    copier: Box<dyn TreeCopier + Send + Sync>,
}

impl Default for SnapshotManager {
    fn default() -> Self {
        Self::new(Box::new(HardLinkCopier::new()))
    }
}

impl SnapshotManager {
    pub fn new(copier: Box<dyn TreeCopier + Send + Sync>) -> Self {
        Self { copier }
    }

    /// Ensure today's snapshot (local date) exists.
    pub fn ensure_snapshot(
        &self,
        world_name: &str,
        source_dir: &Path,
        backup_dir: &Path,
    ) -> Result<Snapshot> {
        self.ensure_snapshot_on(Local::now().date_naive(), world_name, source_dir, backup_dir)
    }

    /// Ensure the snapshot for `date` exists.
    ///
    /// The copy goes to a staging entry and is renamed into place once
    /// complete, so the final name only ever holds a finished copy. An
    /// existing directory or archive for the same world and date makes this a
    /// no-op.
    pub fn ensure_snapshot_on(
        &self,
        date: NaiveDate,
        world_name: &str,
        source_dir: &Path,
        backup_dir: &Path,
    ) -> Result<Snapshot> {
        let name = snapshot_name(world_name, date);
        let destination = backup_dir.join(&name);

        if entry_exists(backup_dir, &name) {
            debug!(snapshot = %destination.display(), "Snapshot already present");
            return Ok(Snapshot {
                path: destination,
                status: SnapshotStatus::AlreadyPresent,
            });
        }

        if !source_dir.exists() {
            warn!(
                world = %world_name,
                source = %source_dir.display(),
                "Source directory missing, no snapshot taken"
            );
            return Ok(Snapshot {
                path: destination,
                status: SnapshotStatus::SourceMissing,
            });
        }

        info!(
            world = %world_name,
            source = %source_dir.display(),
            snapshot = %destination.display(),
            "Creating snapshot"
        );

        fs::create_dir_all(backup_dir)?;
        let staging = staging_path(&destination);
        if fs::symlink_metadata(&staging).is_ok() {
            remove_entry(&staging)?;
        }

        if let Err(e) = self.copier.copy_tree(source_dir, &staging) {
            if fs::symlink_metadata(&staging).is_ok() {
                if let Err(cleanup) = remove_entry(&staging) {
                    warn!(
                        path = %staging.display(),
                        error = %cleanup,
                        "Failed to remove partial snapshot"
                    );
                }
            }
            return Err(e);
        }

        commit_staged(&staging, &destination)?;

        Ok(Snapshot {
            path: destination,
            status: SnapshotStatus::Created,
        })
    }
}

/// Whether `backup_dir` holds `name` itself or an archive `name.{ext}`.
fn entry_exists(backup_dir: &Path, name: &str) -> bool {
    if fs::symlink_metadata(backup_dir.join(name)).is_ok() {
        return true;
    }

    let archive_prefix = format!("{}.", name);
    fs::read_dir(backup_dir)
        .map(|entries| {
            entries
                .flatten()
                .any(|e| e.file_name().to_string_lossy().starts_with(&archive_prefix))
        })
        .unwrap_or(false)
}
