// Section listing and entry removal

use galleria_images::{ReferenceKind, SlotKey};
use serde::Serialize;

use super::Command;
use crate::context::CommandContext;
use crate::error::{CliError, CliResult};
use crate::output::{abbreviate, print_info, print_json};

/// Entry as shown to the presentation layer, with its raw classification
#[derive(Debug, Serialize)]
struct DisplayedEntry {
    index: usize,
    src: String,
    alt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<String>,
    kind: ReferenceKind,
}

/// List sections, or the display entries of one section
pub struct SectionsCommand {
    name: Option<String>,
}

impl SectionsCommand {
    pub fn new(name: Option<String>) -> Self {
        Self { name }
    }

    async fn list_sections(&self, ctx: &CommandContext) -> CliResult<()> {
        let map = ctx.galleria.sections().map().await;

        if ctx.json {
            return print_json(&*map);
        }
        if map.is_empty() {
            print_info("No sections stored");
            return Ok(());
        }

        println!("{}", ctx.style.section("Sections"));
        for (name, entries) in map.iter() {
            println!(
                "{}",
                ctx.style.list_item(&format!("{} ({} entries)", name, entries.len()))
            );
        }
        Ok(())
    }

    async fn show_section(&self, ctx: &CommandContext, name: &str) -> CliResult<()> {
        let sections = ctx.galleria.sections();
        if !sections.map().await.contains_key(name) {
            return Err(CliError::NotFound {
                what: format!("Section '{}'", name),
            });
        }

        let raw = sections.entries(name).await;
        let shown = sections.display_entries(name).await;
        let entries: Vec<DisplayedEntry> = raw
            .iter()
            .zip(shown)
            .enumerate()
            .map(|(index, (raw, shown))| DisplayedEntry {
                index,
                src: shown.src,
                alt: shown.alt,
                caption: shown.caption,
                kind: raw.kind(),
            })
            .collect();

        if ctx.json {
            return print_json(&entries);
        }

        println!("{}", ctx.style.section(name));
        if entries.is_empty() {
            print_info("Section is empty");
        }
        for entry in &entries {
            let mut line = format!(
                "{}  {}",
                abbreviate(&entry.src, 48),
                ctx.style.dim(entry.kind.as_str())
            );
            if !entry.alt.is_empty() {
                line.push_str(&format!("  alt=\"{}\"", entry.alt));
            }
            if let Some(caption) = &entry.caption {
                line.push_str(&format!("  caption=\"{}\"", caption));
            }
            println!("{}", ctx.style.numbered_item(entry.index, &line));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Command for SectionsCommand {
    async fn execute(&self, ctx: &CommandContext) -> CliResult<()> {
        match &self.name {
            Some(name) => self.show_section(ctx, name).await,
            None => self.list_sections(ctx).await,
        }
    }
}

/// Remove one entry from a section
pub struct RemoveEntryCommand {
    slot: SlotKey,
}

impl RemoveEntryCommand {
    pub fn new(section: String, index: usize) -> Self {
        Self {
            slot: SlotKey::new(section, index),
        }
    }
}

#[async_trait::async_trait]
impl Command for RemoveEntryCommand {
    async fn execute(&self, ctx: &CommandContext) -> CliResult<()> {
        let removed = ctx.galleria.editor().remove(&self.slot).await?;

        if ctx.json {
            return print_json(&removed);
        }
        println!(
            "{}",
            ctx.style.success(&format!("Removed {} ({})", self.slot, abbreviate(&removed.src, 48)))
        );
        Ok(())
    }
}
