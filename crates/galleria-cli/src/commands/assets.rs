// Asset record listing and deletion

use galleria_images::AssetRecord;

use super::Command;
use crate::context::CommandContext;
use crate::error::{CliError, CliResult};
use crate::output::{abbreviate, format_bytes, print_info, print_json};

fn not_found(id: &str) -> CliError {
    CliError::NotFound {
        what: format!("Asset '{}'", id),
    }
}

fn summary(record: &AssetRecord) -> String {
    format!(
        "{}  {}  {}  {}",
        record.id,
        record.original_name,
        record.payload_kind(),
        format_bytes(record.payload_len() as u64)
    )
}

/// Show one asset record
pub struct GetCommand {
    id: String,
}

impl GetCommand {
    pub fn new(id: String) -> Self {
        Self { id }
    }
}

#[async_trait::async_trait]
impl Command for GetCommand {
    async fn execute(&self, ctx: &CommandContext) -> CliResult<()> {
        let record = ctx
            .galleria
            .store()
            .get(&self.id)
            .await
            .ok_or_else(|| not_found(&self.id))?;

        if ctx.json {
            return print_json(&record);
        }

        let style = &ctx.style;
        println!("{}", style.section(&record.id));
        println!("{}", style.key_value("filename", &record.filename));
        println!("{}", style.key_value("original name", &record.original_name));
        println!(
            "{}",
            style.key_value(
                "content type",
                record.content_type.as_deref().unwrap_or("unknown")
            )
        );
        println!("{}", style.key_value("uploaded", &record.uploaded_at.to_rfc3339()));
        println!("{}", style.key_value("kind", record.payload_kind().as_str()));
        println!(
            "{}",
            style.key_value("size", &format_bytes(record.payload_len() as u64))
        );
        println!("{}", style.key_value("reference", &abbreviate(&record.payload, 48)));
        Ok(())
    }
}

/// List every asset record
pub struct ListCommand;

#[async_trait::async_trait]
impl Command for ListCommand {
    async fn execute(&self, ctx: &CommandContext) -> CliResult<()> {
        let records = ctx.galleria.store().list().await;

        if ctx.json {
            return print_json(&records);
        }
        if records.is_empty() {
            print_info("No assets stored");
            return Ok(());
        }

        println!("{}", ctx.style.section(&format!("Assets ({})", records.len())));
        for (i, record) in records.iter().enumerate() {
            println!("{}", ctx.style.numbered_item(i + 1, &summary(record)));
        }
        Ok(())
    }
}

/// Delete one asset record
pub struct DeleteAssetCommand {
    id: String,
}

impl DeleteAssetCommand {
    pub fn new(id: String) -> Self {
        Self { id }
    }
}

#[async_trait::async_trait]
impl Command for DeleteAssetCommand {
    async fn execute(&self, ctx: &CommandContext) -> CliResult<()> {
        let removed = ctx
            .galleria
            .store()
            .remove(&self.id)
            .await?
            .ok_or_else(|| not_found(&self.id))?;

        if ctx.json {
            return print_json(&removed);
        }
        println!("{}", ctx.style.success(&format!("Deleted {}", removed.id)));
        Ok(())
    }
}
