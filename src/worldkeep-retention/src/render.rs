//! Derived-artifact rendering from a fresh snapshot.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::Result;

use super::process::{CommandTemplate, ProcessRunner};

/// Produces derived artifacts (maps, previews) from a materialized snapshot.
pub trait Renderer {
    fn render(&self, snapshot_dir: &Path, output_dir: &Path) -> Result<()>;
}

/// Renderer backed by an external command.
///
/// The template receives `{snapshot}` and `{output}`.
pub struct CommandRenderer {
    template: CommandTemplate,
    runner: Arc<dyn ProcessRunner + Send + Sync>,
}

impl CommandRenderer {
    pub fn new(template: CommandTemplate, runner: Arc<dyn ProcessRunner + Send + Sync>) -> Self {
        Self { template, runner }
    }
}

impl Renderer for CommandRenderer {
    fn render(&self, snapshot_dir: &Path, output_dir: &Path) -> Result<()> {
        info!(
            snapshot = %snapshot_dir.display(),
            output = %output_dir.display(),
            program = %self.template.program(),
            "Rendering snapshot"
        );

        fs::create_dir_all(output_dir)?;
        self.template.run(
            self.runner.as_ref(),
            &[("snapshot", snapshot_dir), ("output", output_dir)],
        )
    }
}
