// Stdout sink - the default output
//
// Each batch is rendered into one buffer and written with a single call,
// then flushed so piped consumers see responses without delay.

use super::{Sink, render_batch};
use crate::config::OutputFormat;
use crate::router::Response;
use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

pub struct StdoutSink {
    format: OutputFormat,
}

impl StdoutSink {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

#[async_trait]
impl Sink for StdoutSink {
    async fn write_batch(&self, responses: Vec<Response>) -> Result<()> {
        if responses.is_empty() {
            return Ok(());
        }

        let rendered = render_batch(&responses, self.format)?;
        let mut stdout = tokio::io::stdout();
        stdout.write_all(rendered.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}
