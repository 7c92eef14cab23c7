// Output sinks for router responses
//
// DESIGN: Each sink type is a separate module implementing the common Sink
// trait. A single writer task owns the sink and drains the response channel
// in batches, so sinks never see concurrent writes.

pub mod file;
pub mod stdout;

use crate::config::{OutputConfig, OutputFormat};
use crate::router::Response;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Upper bound on responses handed to a sink in one call
pub const BATCH_SIZE: usize = 256;

/// Common interface for all output sinks
#[async_trait]
pub trait Sink: Send + Sync {
    /// Write a single response
    async fn write(&self, response: Response) -> Result<()> {
        self.write_batch(vec![response]).await
    }

    /// Write responses in order, one line each
    async fn write_batch(&self, responses: Vec<Response>) -> Result<()>;
}

/// Render one response as a single output line, without the newline
pub fn render(response: &Response, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(response.to_string()),
        OutputFormat::Json => Ok(serde_json::to_string(response)?),
    }
}

/// Render a batch as newline-terminated lines
pub fn render_batch(responses: &[Response], format: OutputFormat) -> Result<String> {
    let mut out = String::new();
    for response in responses {
        out.push_str(&render(response, format)?);
        out.push('\n');
    }
    Ok(out)
}

/// Factory function to create the sink described by the output config
pub fn create_sink(config: &OutputConfig) -> Result<Box<dyn Sink>> {
    match &config.path {
        Some(path) => Ok(Box::new(file::FileSink::new(path.clone(), config.format)?)),
        None => Ok(Box::new(stdout::StdoutSink::new(config.format))),
    }
}

/// Forward every response from `rx` to `sink` until all senders are dropped.
/// Returns the number of responses written.
pub async fn drain(mut rx: mpsc::Receiver<Response>, sink: Box<dyn Sink>) -> Result<usize> {
    let mut written = 0;
    let mut batch = Vec::with_capacity(BATCH_SIZE);

    while rx.recv_many(&mut batch, BATCH_SIZE).await > 0 {
        written += batch.len();
        sink.write_batch(std::mem::take(&mut batch)).await?;
    }

    tracing::debug!(written, "Response channel closed");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::MatchReport;
    use std::sync::{Arc, Mutex};

    struct Collect(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl Sink for Collect {
        async fn write_batch(&self, responses: Vec<Response>) -> Result<()> {
            let mut lines = self.0.lock().unwrap();
            for response in &responses {
                lines.push(render(response, OutputFormat::Text)?);
            }
            Ok(())
        }
    }

    fn ack(fid: u64, terms: &str) -> Response {
        Response::Ack {
            fid,
            terms: terms.to_string(),
        }
    }

    #[test]
    fn test_render_text_and_json() {
        let report = Response::Match(MatchReport::new("Hello!".to_string(), vec![2, 3]).unwrap());

        assert_eq!(render(&report, OutputFormat::Text).unwrap(), "M:Hello!; FID=2, 3");
        assert_eq!(
            render(&report, OutputFormat::Json).unwrap(),
            r#"{"kind":"match","line":"Hello!","fids":[2,3]}"#
        );
    }

    #[test]
    fn test_render_batch() {
        let batch = vec![ack(1, "a"), ack(2, "b c")];
        assert_eq!(
            render_batch(&batch, OutputFormat::Text).unwrap(),
            "A:a; FID=1\nA:b c; FID=2\n"
        );
        assert_eq!(render_batch(&[], OutputFormat::Json).unwrap(), "");
    }

    #[tokio::test]
    async fn test_drain_preserves_order() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel(4);

        let writer = tokio::spawn(drain(rx, Box::new(Collect(Arc::clone(&lines)))));
        for fid in 1..=10 {
            tx.send(ack(fid, "x")).await.unwrap();
        }
        drop(tx);

        assert_eq!(writer.await.unwrap().unwrap(), 10);
        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "A:x; FID=1");
        assert_eq!(lines[9], "A:x; FID=10");
    }

    #[tokio::test]
    async fn test_default_write_delegates_to_batch() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Collect(Arc::clone(&lines));

        sink.write(ack(5, "solo")).await.unwrap();
        assert_eq!(*lines.lock().unwrap(), vec!["A:solo; FID=5"]);
    }
}
