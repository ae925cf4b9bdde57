// Services shared by every command of one invocation

use galleria_images::{Galleria, ImageConfig};
use tracing::{debug, info};

use crate::error::{CliError, CliResult};
use crate::output::OutputStyle;
use crate::router::Cli;

/// Opened services plus output preferences
pub struct CommandContext {
    pub galleria: Galleria,
    pub json: bool,
    pub style: OutputStyle,
}

impl CommandContext {
    /// Resolve configuration and open storage. With `sweep`, the startup
    /// cleanup runs before any command sees the data.
    pub async fn open(cli: &Cli, sweep: bool) -> CliResult<Self> {
        let config = load_config(cli)?;
        debug!(root = %config.storage_root().display(), "Resolved storage root");

        let galleria = if sweep {
            Galleria::open(config).await?
        } else {
            Galleria::open_without_sweep(config)?
        };

        let report = galleria.startup_report();
        if report.removed_count > 0 || report.assets_removed_count > 0 {
            info!(
                removed = report.removed_count,
                sections = report.sections_affected_count,
                assets = report.assets_removed_count,
                "Startup sweep purged invalid references"
            );
        }

        Ok(Self {
            galleria,
            json: cli.json,
            style: OutputStyle::default(),
        })
    }

    /// Release any preview left open by the command
    pub fn close(&self) {
        self.galleria.close();
    }
}

/// Configuration hierarchy with `--data-dir` applied last
pub fn load_config(cli: &Cli) -> CliResult<ImageConfig> {
    let mut config = ImageConfig::load_with_hierarchy(cli.config.as_deref())
        .map_err(|e| CliError::Config(e.to_string()))?;
    if let Some(dir) = &cli.data_dir {
        config.storage.root_dir = Some(dir.clone());
    }
    Ok(config)
}
