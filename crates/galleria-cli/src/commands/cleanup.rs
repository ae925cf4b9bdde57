// Cleanup sweep report and dry run

use super::Command;
use crate::context::CommandContext;
use crate::error::CliResult;
use crate::output::{abbreviate, print_info, print_json};

/// Report the startup sweep, or preview one with `dry_run`
pub struct CleanupCommand {
    dry_run: bool,
}

impl CleanupCommand {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    async fn preview(&self, ctx: &CommandContext) -> CliResult<()> {
        let plan = ctx.galleria.cleanup().scan().await?;

        if ctx.json {
            return print_json(&plan);
        }
        if plan.is_empty() {
            print_info("Nothing to remove");
            return Ok(());
        }

        println!(
            "{}",
            ctx.style.section(&format!(
                "Would remove {} entries from {} sections",
                plan.entries.len(),
                plan.sections_affected()
            ))
        );
        for entry in &plan.entries {
            println!(
                "{}",
                ctx.style.list_item(&format!(
                    "{}  {}  {}",
                    entry.slot(),
                    abbreviate(&entry.src, 48),
                    ctx.style.dim(entry.kind.as_str())
                ))
            );
        }
        if !plan.asset_ids.is_empty() {
            println!("{}", ctx.style.section("Would delete assets"));
            for id in &plan.asset_ids {
                println!("{}", ctx.style.list_item(id));
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Command for CleanupCommand {
    async fn execute(&self, ctx: &CommandContext) -> CliResult<()> {
        if self.dry_run {
            return self.preview(ctx).await;
        }

        // The sweep already ran while the services were opened
        let report = ctx.galleria.startup_report();
        if ctx.json {
            return print_json(&report);
        }

        println!("{}", ctx.style.success("Cleanup sweep complete"));
        println!(
            "{}",
            ctx.style.key_value("entries removed", &report.removed_count.to_string())
        );
        println!(
            "{}",
            ctx.style
                .key_value("sections affected", &report.sections_affected_count.to_string())
        );
        println!(
            "{}",
            ctx.style
                .key_value("assets removed", &report.assets_removed_count.to_string())
        );
        Ok(())
    }
}
