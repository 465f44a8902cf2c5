//! Maintenance orchestrator: snapshot, render, compress and prune each world.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn};

use super::atomic_ops::sweep_stale_staging;
use super::compress::{CommandCompressor, Compressor, ZipCompressor};
use super::config::{CompressionConfig, MaintenanceConfig, WorldConfig};
use super::process::{CommandTemplate, ProcessRunner, SystemRunner};
use super::pruner::{PruneResult, RetentionPruner};
use super::render::{CommandRenderer, Renderer};
use super::snapshot::{SnapshotManager, SnapshotStatus};
use super::utils::{format_size, timestamp_now};

/// Outcome of one world's maintenance.
#[derive(Debug, Clone, Serialize)]
pub struct WorldReport {
    /// World name.
    pub name: String,
    /// Staging leftovers removed before the run.
    pub swept: usize,
    /// Snapshot destination, if the snapshot step ran.
    pub snapshot: Option<PathBuf>,
    /// What the snapshot step did.
    pub snapshot_status: Option<SnapshotStatus>,
    /// Archive that replaced the snapshot directory.
    pub archive: Option<PathBuf>,
    /// Render failure; never fails the world.
    pub render_error: Option<String>,
    /// Pruning results.
    pub prune: Option<PruneResult>,
    /// Step failures, in the order they happened.
    pub errors: Vec<String>,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl WorldReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            swept: 0,
            snapshot: None,
            snapshot_status: None,
            archive: None,
            render_error: None,
            prune: None,
            errors: Vec::new(),
            duration_ms: 0,
        }
    }

    fn add_error(&mut self, step: &str, error: impl std::fmt::Display) {
        self.errors.push(format!("{}: {}", step, error));
    }

    /// Whether every step of this world succeeded.
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Outcome of a full maintenance run.
#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceReport {
    /// Unix timestamp of the run start.
    pub timestamp: u64,
    /// Date used for every snapshot name in this run.
    pub date: NaiveDate,
    /// Per-world results, in configuration order.
    pub worlds: Vec<WorldReport>,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl MaintenanceReport {
    /// Worlds with at least one failed step.
    pub fn failed_worlds(&self) -> impl Iterator<Item = &WorldReport> {
        self.worlds.iter().filter(|w| !w.succeeded())
    }

    /// Whether every world succeeded.
    pub fn success(&self) -> bool {
        self.worlds.iter().all(WorldReport::succeeded)
    }
}

/// Runs maintenance over an ordered list of worlds.
///
/// Worlds are processed one after another in configuration order. Each world
/// is isolated: a failing step is recorded in its report and the run moves
/// on. Pruning runs even when the snapshot or compression step failed so the
/// budget is enforced on every cycle.
pub struct MaintenanceOrchestrator {
    worlds: Vec<WorldConfig>,
    snapshots: SnapshotManager,
    compressor: Box<dyn Compressor + Send + Sync>,
    renderer: Option<Box<dyn Renderer + Send + Sync>>,
    pruner: RetentionPruner,
}

impl MaintenanceOrchestrator {
    /// Orchestrator with the default copier, ZIP compression and no renderer.
    pub fn new(worlds: Vec<WorldConfig>) -> Self {
        Self {
            worlds,
            snapshots: SnapshotManager::default(),
            compressor: Box::new(ZipCompressor::new()),
            renderer: None,
            pruner: RetentionPruner::default(),
        }
    }

    /// Build from configuration, running external commands as child processes.
    pub fn from_config(config: &MaintenanceConfig) -> Self {
        Self::from_config_with_runner(config, Arc::new(SystemRunner))
    }

    /// Build from configuration with a custom process runner.
    pub fn from_config_with_runner(
        config: &MaintenanceConfig,
        runner: Arc<dyn ProcessRunner + Send + Sync>,
    ) -> Self {
        let compressor: Box<dyn Compressor + Send + Sync> = match &config.compression {
            CompressionConfig::Zip => Box::new(ZipCompressor::new()),
            CompressionConfig::Command {
                program,
                args,
                extension,
            } => Box::new(CommandCompressor::new(
                CommandTemplate::new(program.clone(), args.clone()),
                extension.clone(),
                Arc::clone(&runner),
            )),
        };

        let mut orchestrator = Self::new(config.worlds.clone()).with_compressor(compressor);
        if let Some(render) = &config.render {
            orchestrator = orchestrator.with_renderer(Box::new(CommandRenderer::new(
                CommandTemplate::new(render.program.clone(), render.args.clone()),
                runner,
            )));
        }
        orchestrator
    }

    pub fn with_snapshot_manager(mut self, snapshots: SnapshotManager) -> Self {
        self.snapshots = snapshots;
        self
    }

    pub fn with_compressor(mut self, compressor: Box<dyn Compressor + Send + Sync>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer + Send + Sync>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn worlds(&self) -> &[WorldConfig] {
        &self.worlds
    }

    /// Run one maintenance cycle dated with today's local date.
    pub fn run_once(&self) -> MaintenanceReport {
        self.run_on(Local::now().date_naive())
    }

    /// Run one maintenance cycle with snapshots dated `date`.
    pub fn run_on(&self, date: NaiveDate) -> MaintenanceReport {
        let start = Instant::now();
        let mut report = MaintenanceReport {
            timestamp: timestamp_now(),
            date,
            worlds: Vec::with_capacity(self.worlds.len()),
            duration_ms: 0,
        };

        for world in &self.worlds {
            let span = info_span!("world", name = %world.name);
            let _entered = span.enter();

            let world_report = self.maintain_world(world, date);
            if world_report.succeeded() {
                info!(duration_ms = world_report.duration_ms, "World maintenance completed");
            } else {
                error!(
                    errors = ?world_report.errors,
                    "World maintenance finished with errors"
                );
            }
            report.worlds.push(world_report);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            worlds = report.worlds.len(),
            failed = report.failed_worlds().count(),
            duration_ms = report.duration_ms,
            "Maintenance cycle completed"
        );
        report
    }

    fn maintain_world(&self, world: &WorldConfig, date: NaiveDate) -> WorldReport {
        let start = Instant::now();
        let mut report = WorldReport::new(&world.name);

        match sweep_stale_staging(&world.backup_dir) {
            Ok(swept) => report.swept = swept.len(),
            Err(e) => report.add_error("sweep", e),
        }

        match self
            .snapshots
            .ensure_snapshot_on(date, &world.name, &world.source_dir, &world.backup_dir)
        {
            Ok(snapshot) => {
                report.snapshot = Some(snapshot.path().to_path_buf());
                report.snapshot_status = Some(snapshot.status());

                if snapshot.is_materialized() {
                    if let (Some(renderer), Some(output_dir)) = (&self.renderer, &world.output_dir)
                    {
                        if let Err(e) = renderer.render(snapshot.path(), output_dir) {
                            warn!(error = %e, "Render failed, continuing");
                            report.render_error = Some(e.to_string());
                        }
                    }

                    if world.compress {
                        match self.compressor.compress(snapshot.path()) {
                            Ok(archive) => report.archive = Some(archive),
                            Err(e) => report.add_error("compress", e),
                        }
                    }
                }
            }
            Err(e) => report.add_error("snapshot", e),
        }

        match self.pruner.prune(&world.backup_dir, world.budget_bytes()) {
            Ok(result) => {
                info!(
                    removed = result.removed_count(),
                    size = %format_size(result.size_after),
                    budget = %format_size(result.budget_bytes),
                    "Retention enforced"
                );
                report.prune = Some(result);
            }
            Err(e) => report.add_error("prune", e),
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }
}
