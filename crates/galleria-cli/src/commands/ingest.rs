// Ingest an image file

use galleria_images::{IngestReply, IngestResponse, SlotKey, Upload};
use std::path::PathBuf;
use tracing::debug;

use super::Command;
use crate::context::CommandContext;
use crate::error::{CliError, CliResult};
use crate::output::{abbreviate, format_bytes, print_json};

/// Validate and store an image file, optionally appending it to a section
pub struct IngestCommand {
    path: PathBuf,
    section: Option<String>,
    alt: String,
    caption: Option<String>,
}

impl IngestCommand {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            section: None,
            alt: String::new(),
            caption: None,
        }
    }

    pub fn with_section(mut self, section: Option<String>) -> Self {
        self.section = section;
        self
    }

    pub fn with_alt(mut self, alt: String) -> Self {
        self.alt = alt;
        self
    }

    pub fn with_caption(mut self, caption: Option<String>) -> Self {
        self.caption = caption;
        self
    }

    /// Read the file; its content type is inferred from the extension
    pub async fn read_upload(&self) -> CliResult<Upload> {
        let bytes = tokio::fs::read(&self.path).await?;
        let content_type = mime_guess::from_path(&self.path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let filename = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(file = %filename, content_type = %content_type, bytes = bytes.len(), "Read upload");
        Ok(Upload::new(bytes, content_type, filename))
    }
}

#[async_trait::async_trait]
impl Command for IngestCommand {
    async fn execute(&self, ctx: &CommandContext) -> CliResult<()> {
        let upload = self.read_upload().await?;
        let size = upload.size();

        let mut slot = None;
        let result = match &self.section {
            Some(section) => {
                let next = ctx.galleria.sections().entries(section).await.len();
                ctx.galleria
                    .editor()
                    .upload(
                        SlotKey::new(section.clone(), next),
                        upload,
                        self.alt.clone(),
                        self.caption.clone(),
                    )
                    .await
                    .map(|outcome| {
                        slot = Some(outcome.slot);
                        outcome.receipt
                    })
            }
            None => ctx.galleria.pipeline().ingest(upload).await,
        };

        let reply = IngestReply::from_result(result);
        if ctx.json {
            print_json(&reply.body)?;
        }

        match reply.body {
            IngestResponse::Success { url, id } => {
                if !ctx.json {
                    println!("{}", ctx.style.success(&format!("Stored {}", id)));
                    println!("{}", ctx.style.key_value("size", &format_bytes(size)));
                    println!("{}", ctx.style.key_value("reference", &abbreviate(&url, 48)));
                    if let Some(slot) = slot {
                        println!("{}", ctx.style.key_value("section", &slot.to_string()));
                    }
                }
                Ok(())
            }
            IngestResponse::Failure { error } => Err(CliError::Ingest {
                status: reply.status.code(),
                message: error,
            }),
        }
    }
}
