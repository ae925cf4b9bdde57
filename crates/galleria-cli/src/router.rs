// Command routing and dispatch

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::*;
use crate::context::CommandContext;
use crate::error::CliResult;

/// Galleria - durable image asset store
#[derive(Parser, Debug)]
#[command(name = "galleria")]
#[command(bin_name = "galleria")]
#[command(about = "Store images as self-contained assets and manage the sections that show them")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Storage directory (default: ~/.galleria/data)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Configuration file, applied over user and project configuration
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Ingest an image file
    #[command(about = "Validate and store an image file")]
    Ingest {
        /// Image file
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Append the stored image to this section
        #[arg(short, long)]
        section: Option<String>,

        /// Alternative text for the section entry
        #[arg(long, default_value = "")]
        alt: String,

        /// Caption for the section entry
        #[arg(long)]
        caption: Option<String>,
    },

    /// Show one stored asset
    #[command(about = "Show a stored asset record")]
    Get {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// List stored assets
    #[command(about = "List all stored asset records")]
    List,

    /// Show sections, or the entries of one section
    #[command(about = "List sections or the entries of a section")]
    Sections {
        #[arg(value_name = "NAME")]
        name: Option<String>,
    },

    /// Remove one section entry
    #[command(about = "Remove the entry at INDEX from a section")]
    Remove {
        #[arg(value_name = "SECTION")]
        section: String,

        #[arg(value_name = "INDEX")]
        index: usize,
    },

    /// Delete a stored asset record
    #[command(about = "Delete a stored asset record")]
    DeleteAsset {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Report the startup cleanup sweep
    #[command(about = "Purge section entries and records that can no longer be displayed")]
    Cleanup {
        /// Show what would be removed without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show storage usage
    #[command(about = "Show durable storage usage against its capacity")]
    Quota,
}

/// Routes parsed commands to their handlers
pub struct CommandRouter;

impl CommandRouter {
    /// Parse CLI arguments and route to appropriate handler
    pub async fn route() -> CliResult<()> {
        let cli = Cli::parse();

        crate::logging::init_logging(cli.verbose);

        Self::execute(&cli).await
    }

    /// Execute a command
    pub async fn execute(cli: &Cli) -> CliResult<()> {
        // A dry run must not be preceded by the startup sweep it previews
        let sweep = !matches!(cli.command, Commands::Cleanup { dry_run: true });
        let ctx = CommandContext::open(cli, sweep).await?;

        let result = match &cli.command {
            Commands::Ingest {
                path,
                section,
                alt,
                caption,
            } => {
                let cmd = IngestCommand::new(path.clone())
                    .with_section(section.clone())
                    .with_alt(alt.clone())
                    .with_caption(caption.clone());
                cmd.execute(&ctx).await
            }
            Commands::Get { id } => GetCommand::new(id.clone()).execute(&ctx).await,
            Commands::List => ListCommand.execute(&ctx).await,
            Commands::Sections { name } => SectionsCommand::new(name.clone()).execute(&ctx).await,
            Commands::Remove { section, index } => {
                RemoveEntryCommand::new(section.clone(), *index)
                    .execute(&ctx)
                    .await
            }
            Commands::DeleteAsset { id } => DeleteAssetCommand::new(id.clone()).execute(&ctx).await,
            Commands::Cleanup { dry_run } => CleanupCommand::new(*dry_run).execute(&ctx).await,
            Commands::Quota => QuotaCommand.execute(&ctx).await,
        };

        ctx.close();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::try_parse_from([
            "galleria", "ingest", "photo.jpg", "--section", "hero", "--alt", "Our team", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Ingest {
                path,
                section,
                alt,
                caption,
            } => {
                assert_eq!(path, PathBuf::from("photo.jpg"));
                assert_eq!(section.as_deref(), Some("hero"));
                assert_eq!(alt, "Our team");
                assert_eq!(caption, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "galleria", "quota", "--data-dir", "/tmp/g", "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/g")));
        assert!(matches!(cli.command, Commands::Quota));
    }

    #[test]
    fn test_parse_remove_and_cleanup() {
        let cli = Cli::try_parse_from(["galleria", "remove", "gallery", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Remove { ref section, index: 2 } if section == "gallery"
        ));

        let cli = Cli::try_parse_from(["galleria", "cleanup", "--dry-run"]).unwrap();
        assert!(matches!(cli.command, Commands::Cleanup { dry_run: true }));

        let cli = Cli::try_parse_from(["galleria", "delete-asset", "img-1-abcdefg"]).unwrap();
        assert!(matches!(cli.command, Commands::DeleteAsset { .. }));
    }

    #[test]
    fn test_parse_rejects_bad_index() {
        assert!(Cli::try_parse_from(["galleria", "remove", "gallery", "first"]).is_err());
        assert!(Cli::try_parse_from(["galleria"]).is_err());
    }
}
