// Command handlers for the galleria CLI

pub mod assets;
pub mod cleanup;
pub mod ingest;
pub mod quota;
pub mod sections;

pub use assets::{DeleteAssetCommand, GetCommand, ListCommand};
pub use cleanup::CleanupCommand;
pub use ingest::IngestCommand;
pub use quota::QuotaCommand;
pub use sections::{RemoveEntryCommand, SectionsCommand};

use crate::context::CommandContext;
use crate::error::CliResult;

/// Trait for command handlers
#[async_trait::async_trait]
pub trait Command: Send + Sync {
    /// Execute the command against the opened services
    async fn execute(&self, ctx: &CommandContext) -> CliResult<()>;
}
