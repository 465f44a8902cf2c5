//! Snapshot retention for worldkeep backup areas.
//!
//! Materializes dated snapshots of live world directories, optionally turns
//! them into archives, and keeps each world's backup area under its size
//! budget by evicting the oldest entries first.
//!
//! # Features
//!
//! - **Size Accounting**: Hard-link aware directory measurement
//! - **Pruning**: Oldest-first eviction with a full re-measure after every deletion
//! - **Snapshots**: At most one snapshot per world per day, staged then renamed
//! - **Compression**: In-process ZIP or an external archiver command
//! - **Rendering**: External render command fed from the fresh snapshot
//! - **Orchestration**: Per-world isolation so one failing world never stops the rest
//!
//! # Example
//!
//! ```rust,no_run
//! use worldkeep_retention::{MaintenanceConfig, MaintenanceOrchestrator};
//! use std::path::Path;
//!
//! let config = MaintenanceConfig::load(Path::new("config.json")).expect("bad config");
//! let orchestrator = MaintenanceOrchestrator::from_config(&config);
//!
//! let report = orchestrator.run_once();
//! println!("{} world(s) failed", report.failed_worlds().count());
//! ```

mod accountant;
mod atomic_ops;
mod compress;
mod config;
mod copier;
mod orchestrator;
mod process;
mod pruner;
mod render;
mod snapshot;
mod utils;

#[cfg(test)]
mod test_support;

pub use accountant::{SizeAccountant, SizeReport};
pub use atomic_ops::{
    commit_staged, is_staging_name, remove_entry, staging_path, sweep_stale_staging,
};
pub use compress::{CommandCompressor, Compressor, ZipCompressor};
pub use config::{
    BYTES_PER_MEGABYTE, CompressionConfig, DEFAULT_CONFIG_FILE, MaintenanceConfig, RenderConfig,
    STAGING_SUFFIX, WorldConfig,
};
pub use copier::{HardLinkCopier, TreeCopier};
pub use orchestrator::{MaintenanceOrchestrator, MaintenanceReport, WorldReport};
pub use process::{CommandTemplate, ProcessRunner, SystemRunner};
pub use pruner::{PruneResult, RetentionPruner};
pub use render::{CommandRenderer, Renderer};
pub use snapshot::{Snapshot, SnapshotManager, SnapshotStatus, snapshot_name};
pub use utils::format_size;

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetentionError {
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to remove backup entry {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to launch `{program}`: {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}")]
    CommandFailed { program: String, status: ExitStatus },
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RetentionError>;
