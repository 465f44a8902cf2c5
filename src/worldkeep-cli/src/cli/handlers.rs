//! Command execution.

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use worldkeep_retention::{
    MaintenanceConfig, MaintenanceOrchestrator, MaintenanceReport, WorldReport, format_size,
};

use super::args::Cli;

/// Load the configuration and run one maintenance cycle.
///
/// Only configuration problems are fatal. Worlds that fail are reported in
/// the log and do not change the outcome.
pub fn run(cli: &Cli) -> Result<MaintenanceReport> {
    let config = MaintenanceConfig::load(&cli.config).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            cli.config.display()
        )
    })?;

    info!(
        config = %cli.config.display(),
        worlds = config.worlds.len(),
        archive_extension = config.compression.extension(),
        "Configuration loaded"
    );

    let report = MaintenanceOrchestrator::from_config(&config).run_once();
    log_summary(&report);
    Ok(report)
}

fn log_summary(report: &MaintenanceReport) {
    for world in &report.worlds {
        log_world(world);
    }

    let failed = report.failed_worlds().count();
    if failed > 0 {
        warn!(
            date = %report.date,
            worlds = report.worlds.len(),
            failed = failed,
            "Run finished with failures"
        );
    } else {
        info!(
            date = %report.date,
            worlds = report.worlds.len(),
            duration_ms = report.duration_ms,
            "Run finished"
        );
    }
}

fn log_world(world: &WorldReport) {
    let size = world
        .prune
        .as_ref()
        .map(|p| format_size(p.size_after))
        .unwrap_or_else(|| "unknown".to_string());
    let removed = world.prune.as_ref().map_or(0, |p| p.removed_count());

    if let Some(render_error) = &world.render_error {
        warn!(world = %world.name, error = %render_error, "Render did not complete");
    }

    if world.succeeded() {
        info!(
            world = %world.name,
            snapshot = ?world.snapshot_status,
            archived = world.archive.is_some(),
            removed = removed,
            size = %size,
            "World done"
        );
    } else {
        error!(
            world = %world.name,
            errors = ?world.errors,
            removed = removed,
            size = %size,
            "World failed"
        );
    }
}
