// File sink - appends responses to a file
//
// Output format follows `output.format`: protocol text lines or JSON Lines
// (one JSON object per line).

use super::{Sink, render_batch};
use crate::config::OutputFormat;
use crate::router::Response;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

pub struct FileSink {
    path: PathBuf,
    format: OutputFormat,
    // DESIGN CHOICE: Store path only, open file on each batch
    // Append-mode writes from the single writer task need no shared handle.
}

impl FileSink {
    pub fn new(path: PathBuf, format: OutputFormat) -> Result<Self> {
        // Create parent directories if they don't exist
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory '{}'", parent.display()))?;
        }

        // Test that we can write to the file
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Cannot open output file '{}'", path.display()))?;

        Ok(Self { path, format })
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn write_batch(&self, responses: Vec<Response>) -> Result<()> {
        if responses.is_empty() {
            return Ok(());
        }

        let rendered = render_batch(&responses, self.format)?;
        let path = self.path.clone();

        // File writes are blocking, keep them off the async workers
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(rendered.as_bytes())?;
            file.flush()?;
            Ok(())
        })
        .await??;

        tracing::trace!(count = responses.len(), path = %self.path.display(), "Batch written");
        Ok(())
    }
}
