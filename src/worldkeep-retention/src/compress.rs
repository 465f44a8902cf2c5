//! Snapshot compression.
//!
//! A compressed snapshot replaces its directory with a single archive next to
//! it. The archive is written under a staging name and renamed into place;
//! the directory is removed only after that rename succeeded.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::{RetentionError, Result};

use super::atomic_ops::{commit_staged, remove_entry, staging_path};
use super::config::ZIP_EXTENSION;
use super::process::{CommandTemplate, ProcessRunner};

/// Turns a snapshot directory into an archive file.
pub trait Compressor {
    /// Archive extension without the leading dot.
    fn extension(&self) -> &str;

    /// Write an archive of `source_dir` to `archive`.
    fn write_archive(&self, source_dir: &Path, archive: &Path) -> Result<()>;

    /// Final archive path for a snapshot directory.
    fn archive_path(&self, source_dir: &Path) -> PathBuf {
        let name = source_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        source_dir.with_file_name(format!("{}.{}", name, self.extension()))
    }

    /// Replace `source_dir` with an archive and return the archive path.
    fn compress(&self, source_dir: &Path) -> Result<PathBuf> {
        let archive = self.archive_path(source_dir);
        let staging = staging_path(&archive);

        info!(
            snapshot = %source_dir.display(),
            archive = %archive.display(),
            "Compressing snapshot"
        );

        if let Err(e) = self.write_archive(source_dir, &staging) {
            if fs::symlink_metadata(&staging).is_ok() {
                if let Err(cleanup) = remove_entry(&staging) {
                    warn!(
                        path = %staging.display(),
                        error = %cleanup,
                        "Failed to remove partial archive"
                    );
                }
            }
            return Err(e);
        }

        commit_staged(&staging, &archive)?;
        remove_entry(source_dir)?;

        debug!(archive = %archive.display(), "Snapshot directory replaced by archive");
        Ok(archive)
    }
}

/// Built-in deflate ZIP compressor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipCompressor;

impl ZipCompressor {
    pub fn new() -> Self {
        Self
    }
}

impl Compressor for ZipCompressor {
    fn extension(&self) -> &str {
        ZIP_EXTENSION
    }

    fn write_archive(&self, source_dir: &Path, archive: &Path) -> Result<()> {
        if !source_dir.is_dir() {
            return Err(RetentionError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("snapshot directory {} not found", source_dir.display()),
            )));
        }

        let file = File::create(archive)?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut files = 0usize;
        for entry in WalkDir::new(source_dir).sort_by_file_name() {
            let entry = entry?;
            let Ok(relative) = entry.path().strip_prefix(source_dir) else {
                continue;
            };

            // Skip the root itself
            if relative.as_os_str().is_empty() {
                continue;
            }

            let name = zip_entry_name(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                zip.add_directory(name, options)?;
            } else if file_type.is_file() {
                let len = entry.metadata().map(|m| m.len()).unwrap_or(0);
                zip.start_file(name, options.large_file(len >= u32::MAX as u64))?;
                let mut reader = BufReader::new(File::open(entry.path())?);
                io::copy(&mut reader, &mut zip)?;
                files += 1;
            } else {
                debug!(path = %entry.path().display(), "Skipping non-regular entry in archive");
            }
        }

        let file = zip.finish()?;
        file.sync_all()?;

        debug!(archive = %archive.display(), files = files, "ZIP archive written");
        Ok(())
    }
}

/// Archive entry name with `/` separators regardless of platform.
fn zip_entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Compressor backed by an external archiver.
///
/// The template receives `{source}` (snapshot directory) and `{archive}`
/// (staging file to create). Only a successful exit that leaves the archive
/// behind counts as success.
pub struct CommandCompressor {
    template: CommandTemplate,
    extension: String,
    runner: Arc<dyn ProcessRunner + Send + Sync>,
}

impl CommandCompressor {
    pub fn new(
        template: CommandTemplate,
        extension: impl Into<String>,
        runner: Arc<dyn ProcessRunner + Send + Sync>,
    ) -> Self {
        Self {
            template,
            extension: extension.into(),
            runner,
        }
    }
}

impl Compressor for CommandCompressor {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn write_archive(&self, source_dir: &Path, archive: &Path) -> Result<()> {
        self.template.run(
            self.runner.as_ref(),
            &[("source", source_dir), ("archive", archive)],
        )?;

        if fs::symlink_metadata(archive).is_err() {
            return Err(RetentionError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "`{}` succeeded but did not create {}",
                    self.template.program(),
                    archive.display()
                ),
            )));
        }
        Ok(())
    }
}
