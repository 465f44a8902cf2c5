//! Configuration for worldkeep maintenance runs.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::{RetentionError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "./config.json";

/// Budgets are configured in decimal megabytes.
pub const BYTES_PER_MEGABYTE: u64 = 1_000_000;

/// Suffix of staging entries written before an atomic rename.
pub const STAGING_SUFFIX: &str = ".partial";

/// Archive extension used by the built-in ZIP compressor.
pub const ZIP_EXTENSION: &str = "zip";

// ============================================================================
// Configuration
// ============================================================================

/// One maintained world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldConfig {
    /// Unique world name, also the prefix of every backup entry.
    pub name: String,

    /// Live data directory to snapshot.
    pub source_dir: PathBuf,

    /// Directory where dated snapshots and archives accumulate.
    pub backup_dir: PathBuf,

    /// Size budget of `backup_dir` in decimal megabytes.
    pub max_backup_size_mb: f64,

    /// Target directory for the render command.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Whether fresh snapshots are replaced by an archive.
    #[serde(default)]
    pub compress: bool,
}

impl WorldConfig {
    /// The size budget in bytes.
    ///
    /// This is the only place megabytes are converted; everything downstream
    /// works in bytes.
    pub fn budget_bytes(&self) -> u64 {
        (self.max_backup_size_mb * BYTES_PER_MEGABYTE as f64).round() as u64
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RetentionError::InvalidConfig(
                "world name must not be empty".to_string(),
            ));
        }
        if self.name.contains(['/', '\\']) || self.name.starts_with('.') {
            return Err(RetentionError::InvalidConfig(format!(
                "world name '{}' must be a plain file name",
                self.name
            )));
        }
        if self.source_dir.as_os_str().is_empty() || self.backup_dir.as_os_str().is_empty() {
            return Err(RetentionError::InvalidConfig(format!(
                "world '{}' needs both source_dir and backup_dir",
                self.name
            )));
        }
        if !self.max_backup_size_mb.is_finite() || self.max_backup_size_mb < 0.0 {
            return Err(RetentionError::InvalidConfig(format!(
                "world '{}' has an invalid max_backup_size_mb: {}",
                self.name, self.max_backup_size_mb
            )));
        }
        Ok(())
    }
}

/// How snapshots are turned into archives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case", deny_unknown_fields)]
pub enum CompressionConfig {
    /// Built-in deflate ZIP writer.
    Zip,
    /// External archiver. `args` may use `{source}` and `{archive}`.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        extension: String,
    },
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self::Zip
    }
}

impl CompressionConfig {
    /// File extension of the archives this method produces.
    pub fn extension(&self) -> &str {
        match self {
            Self::Zip => ZIP_EXTENSION,
            Self::Command { extension, .. } => extension,
        }
    }
}

/// External render command. `args` may use `{snapshot}` and `{output}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaintenanceConfig {
    /// Worlds, processed in this order.
    pub worlds: Vec<WorldConfig>,

    #[serde(default)]
    pub compression: CompressionConfig,

    #[serde(default)]
    pub render: Option<RenderConfig>,
}

impl MaintenanceConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| RetentionError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self =
            serde_json::from_str(&contents).map_err(|source| RetentionError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.worlds.is_empty() {
            return Err(RetentionError::InvalidConfig(
                "at least one world must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for world in &self.worlds {
            world.validate()?;
            if !seen.insert(world.name.as_str()) {
                return Err(RetentionError::InvalidConfig(format!(
                    "duplicate world name '{}'",
                    world.name
                )));
            }
        }
        self.validate_directories()?;

        if let CompressionConfig::Command {
            program, extension, ..
        } = &self.compression
        {
            if program.trim().is_empty() || extension.trim().is_empty() {
                return Err(RetentionError::InvalidConfig(
                    "compression command needs a program and an extension".to_string(),
                ));
            }
        }

        if let Some(render) = &self.render {
            if render.program.trim().is_empty() {
                return Err(RetentionError::InvalidConfig(
                    "render command needs a program".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Every world owns its backup directory exclusively: no two worlds
    /// share or nest backup directories, and no backup directory overlaps a
    /// source directory.
    ///
    /// Paths are compared as written, after dropping `.` components and
    /// trailing separators. Aliases through symlinks are not detected.
    fn validate_directories(&self) -> Result<()> {
        let dirs: Vec<(&str, PathBuf, PathBuf)> = self
            .worlds
            .iter()
            .map(|w| {
                (
                    w.name.as_str(),
                    normalize(&w.source_dir),
                    normalize(&w.backup_dir),
                )
            })
            .collect();

        for (i, (name, _, backup)) in dirs.iter().enumerate() {
            for (j, (other, other_source, other_backup)) in dirs.iter().enumerate() {
                if i != j && backup.starts_with(other_backup) {
                    return Err(RetentionError::InvalidConfig(format!(
                        "backup_dir of world '{}' overlaps the backup_dir of world '{}'",
                        name, other
                    )));
                }
                if backup.starts_with(other_source) || other_source.starts_with(backup) {
                    return Err(RetentionError::InvalidConfig(format!(
                        "backup_dir of world '{}' overlaps the source_dir of world '{}'",
                        name, other
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Lexical form used for overlap checks.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
