// Storage usage report

use serde::Serialize;

use super::Command;
use crate::context::CommandContext;
use crate::error::CliResult;
use crate::output::{format_bytes, print_json};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuotaReport {
    used_bytes: u64,
    capacity_bytes: u64,
    usage_ratio: f64,
    available: bool,
}

/// Show durable storage usage
pub struct QuotaCommand;

#[async_trait::async_trait]
impl Command for QuotaCommand {
    async fn execute(&self, ctx: &CommandContext) -> CliResult<()> {
        let estimate = ctx.galleria.quota().estimate().await?;
        let report = QuotaReport {
            used_bytes: estimate.used_bytes,
            capacity_bytes: estimate.capacity_bytes,
            usage_ratio: estimate.usage_ratio(),
            available: estimate.available(),
        };

        if ctx.json {
            return print_json(&report);
        }

        let style = &ctx.style;
        println!("{}", style.section("Storage"));
        println!("{}", style.key_value("used", &format_bytes(report.used_bytes)));
        println!("{}", style.key_value("capacity", &format_bytes(report.capacity_bytes)));
        println!(
            "{}",
            style.key_value("usage", &format!("{:.1}%", report.usage_ratio * 100.0))
        );
        println!(
            "{}",
            style.key_value("remaining", &format_bytes(estimate.remaining_bytes()))
        );
        if !report.available {
            println!(
                "{}",
                style.warning(&format!(
                    "Usage is at or above {:.0}% of capacity; new uploads may replace the whole manifest",
                    estimate.warning_ratio * 100.0
                ))
            );
        }
        Ok(())
    }
}
