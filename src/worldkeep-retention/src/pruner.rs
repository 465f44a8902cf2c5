//! Size-bounded, oldest-first pruning of backup areas.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::Result;

use super::accountant::SizeAccountant;
use super::atomic_ops::remove_entry;
use super::utils::format_size;

/// Result of a pruning pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneResult {
    /// Removed entries, in deletion order (oldest first).
    pub removed: Vec<PathBuf>,
    /// Measured size before the first deletion.
    pub size_before: u64,
    /// Measured size after the last deletion.
    pub size_after: u64,
    /// Budget the pass was run against.
    pub budget_bytes: u64,
}

impl PruneResult {
    /// Number of entries removed.
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    /// Whether the backup area ended at or below its budget.
    pub fn within_budget(&self) -> bool {
        self.size_after <= self.budget_bytes
    }
}

/// Evicts the oldest backup entries until a backup area fits its budget.
///
/// Entry names embed an ISO-8601 date, so name order is chronological order.
/// The whole area is re-measured after every deletion: an old snapshot whose
/// files are still hard-linked from a newer one frees less than its apparent
/// size, and subtracting per-entry sizes would evict too much.
#[derive(Debug, Clone, Default)]
pub struct RetentionPruner {
    accountant: SizeAccountant,
}

impl RetentionPruner {
    pub fn new(accountant: SizeAccountant) -> Self {
        Self { accountant }
    }

    /// Prune `backup_dir` down to `budget_bytes`.
    ///
    /// Deletion failures abort the pass. Running out of entries while still
    /// over budget is logged, not an error.
    pub fn prune(&self, backup_dir: &Path, budget_bytes: u64) -> Result<PruneResult> {
        // Newest first; the oldest sits at the tail and is popped first.
        let mut entries = list_entries(backup_dir)?;
        entries.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

        let size_before = self.accountant.measure(backup_dir);
        let mut result = PruneResult {
            removed: Vec::new(),
            size_before,
            size_after: size_before,
            budget_bytes,
        };

        while result.size_after > budget_bytes {
            let Some(oldest) = entries.pop() else {
                break;
            };

            info!(
                entry = %oldest.display(),
                size = %format_size(result.size_after),
                budget = %format_size(budget_bytes),
                "Pruning backup entry"
            );
            remove_entry(&oldest)?;
            result.removed.push(oldest);
            result.size_after = self.accountant.measure(backup_dir);
        }

        if !result.within_budget() {
            warn!(
                backup_dir = %backup_dir.display(),
                size = %format_size(result.size_after),
                budget = %format_size(budget_bytes),
                "Backup area still over budget with no entries left to prune"
            );
        } else if result.removed.is_empty() {
            debug!(
                backup_dir = %backup_dir.display(),
                size = %format_size(result.size_after),
                "Backup area within budget"
            );
        } else {
            info!(
                backup_dir = %backup_dir.display(),
                removed = result.removed_count(),
                freed = %format_size(result.size_before.saturating_sub(result.size_after)),
                "Pruning completed"
            );
        }

        Ok(result)
    }
}

/// Direct children of `dir`. A missing directory has none.
fn list_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    match fs::read_dir(dir) {
        Ok(entries) => Ok(entries.flatten().map(|e| e.path()).collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}
