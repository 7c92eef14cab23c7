// Command sources feeding the router
//
// Every source runs as its own task and processes its lines strictly in
// order. Sources run concurrently against the same shared router. Responses
// go to the writer task over an mpsc channel; lines without a response send
// nothing.
//
// Lines are read as bytes. Invalid UTF-8 is replaced, never fatal.

use crate::router::{CommandRouter, Response};
use anyhow::{Context, Result};
use std::fs::{File, Metadata, metadata};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Fixed walkthrough used by `--demo`
pub const DEMO_SCRIPT: [&str; 6] = [
    "QF: Hello",
    "LOL: World Hello!",
    "LOL: Hello World",
    "QF: World",
    "LOL: Our Earth is our World",
    "LOL: Our Earth is our World, Hello",
];

/// Lines buffered between a blocking reader thread and its source task
const READER_BUFFER: usize = 256;

/// Turn raw line bytes into text, dropping the `\n` / `\r\n` terminator.
fn decode_line(mut bytes: Vec<u8>) -> String {
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
    }

    match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(e) => {
            let line = String::from_utf8_lossy(e.as_bytes()).into_owned();
            tracing::warn!(line = %line, "Invalid UTF-8 in command line, replaced");
            line
        }
    }
}

#[cfg(unix)]
fn inode_of(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn inode_of(_metadata: &Metadata) -> u64 {
    0 // Windows doesn't have inodes
}

/// Open file plus read progress
struct FileState {
    reader: BufReader<File>,
    position: u64, // Current byte offset in file
    #[cfg_attr(not(unix), allow(dead_code))]
    inode: u64, // Of the opened file, to detect rotation
    partial: Vec<u8>, // Bytes of a line whose newline has not arrived yet
}

/// Reads a command file from the start, then picks up appended lines
pub struct CommandTailer {
    path: PathBuf,
    state: Option<FileState>,
}

impl CommandTailer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Complete lines written since the last poll.
    ///
    /// The first successful poll returns everything already in the file.
    /// A missing file yields no lines; it is opened once it appears.
    pub fn poll(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();

        let metadata = match metadata(&self.path) {
            Ok(m) => m,
            Err(_) => return Ok(lines),
        };

        if let Some(state) = self.state.as_mut() {
            // Shrunk below what we already read: truncated in place
            if metadata.len() < state.position {
                tracing::warn!(path = %self.path.display(), "Command file truncated, reading from start");
                state.position = 0;
                state.partial.clear();
            }

            // Replaced by a new file under the same name
            #[cfg(unix)]
            if inode_of(&metadata) != state.inode {
                tracing::info!(path = %self.path.display(), "Command file rotated, reopening");
                self.state = None;
                return self.poll();
            }
        } else {
            let file = File::open(&self.path)
                .with_context(|| format!("Failed to open '{}'", self.path.display()))?;
            // From the handle, so a rotation between stat and open is not
            // mistaken for a later one
            let inode = inode_of(&file.metadata()?);
            self.state = Some(FileState {
                reader: BufReader::new(file),
                position: 0,
                inode,
                partial: Vec::new(),
            });
            tracing::info!(path = %self.path.display(), "Reading commands");
        }

        let Some(state) = self.state.as_mut() else {
            return Ok(lines);
        };

        state.reader.seek(SeekFrom::Start(state.position))?;

        let mut buf = Vec::new();
        loop {
            match state.reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    state.partial.append(&mut buf);
                    if state.partial.last() == Some(&b'\n') {
                        lines.push(decode_line(std::mem::take(&mut state.partial)));
                    }
                }
                Err(e) => {
                    // Keep what was read, the next poll retries from here
                    tracing::warn!(path = %self.path.display(), error = %e, "Read failed");
                    break;
                }
            }
        }

        state.position = state.reader.stream_position()?;
        Ok(lines)
    }

    /// Take a trailing line that never got its newline
    pub fn take_partial(&mut self) -> Option<String> {
        self.state
            .as_mut()
            .map(|state| std::mem::take(&mut state.partial))
            .filter(|bytes| !bytes.is_empty())
            .map(decode_line)
    }
}

/// Read lines from a blocking reader and forward them until EOF or until
/// the receiving side goes away. Returns the number of lines forwarded.
pub fn read_lines<R: BufRead>(mut reader: R, lines: &mpsc::Sender<String>) -> Result<usize> {
    let mut count = 0;
    let mut buf = Vec::new();

    while reader.read_until(b'\n', &mut buf)? > 0 {
        if lines.blocking_send(decode_line(std::mem::take(&mut buf))).is_err() {
            break;
        }
        count += 1;
    }
    Ok(count)
}

async fn dispatch(router: &CommandRouter, tx: &mpsc::Sender<Response>, line: &str) -> Result<()> {
    if let Some(response) = router.respond(line) {
        tx.send(response)
            .await
            .map_err(|_| anyhow::anyhow!("Response channel closed"))?;
    }
    Ok(())
}

/// Process a fixed list of lines. Returns the number of lines processed.
pub async fn feed_lines(
    lines: Vec<String>,
    router: Arc<CommandRouter>,
    tx: mpsc::Sender<Response>,
) -> Result<usize> {
    for line in &lines {
        dispatch(&router, &tx, line).await?;
    }
    Ok(lines.len())
}

/// Process lines from a blocking reader until EOF.
///
/// The reader runs on its own OS thread, not on the tokio blocking pool, so
/// aborting this task never leaves the runtime waiting on a stuck read.
pub async fn feed_blocking_reader<R>(
    reader: R,
    router: Arc<CommandRouter>,
    tx: mpsc::Sender<Response>,
) -> Result<usize>
where
    R: BufRead + Send + 'static,
{
    let (line_tx, mut line_rx) = mpsc::channel::<String>(READER_BUFFER);

    std::thread::Builder::new()
        .name("line-reader".to_string())
        .spawn(move || {
            if let Err(e) = read_lines(reader, &line_tx) {
                tracing::warn!(error = %e, "Line reader stopped");
            }
        })
        .context("Failed to spawn line reader thread")?;

    let mut count = 0;
    while let Some(line) = line_rx.recv().await {
        dispatch(&router, &tx, &line).await?;
        count += 1;
    }
    Ok(count)
}

pub async fn feed_stdin(router: Arc<CommandRouter>, tx: mpsc::Sender<Response>) -> Result<usize> {
    let stdin = BufReader::new(std::io::stdin());
    let count = feed_blocking_reader(stdin, router, tx).await?;
    tracing::info!(lines = count, "Stdin closed");
    Ok(count)
}

// Tailer I/O is blocking, run it on the blocking pool and hand it back
async fn poll_blocking(mut tailer: CommandTailer) -> Result<(CommandTailer, Vec<String>)> {
    tokio::task::spawn_blocking(move || {
        let lines = tailer.poll()?;
        Ok((tailer, lines))
    })
    .await?
}

/// Process a command file.
///
/// Without `follow` the file must exist and is read once to the end. With
/// `follow` it is polled at that interval forever; the task ends only when
/// aborted or when the response channel closes.
pub async fn feed_file(
    path: PathBuf,
    follow: Option<Duration>,
    router: Arc<CommandRouter>,
    tx: mpsc::Sender<Response>,
) -> Result<usize> {
    if follow.is_none() {
        tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("Cannot read command file '{}'", path.display()))?;
    }

    let mut tailer = CommandTailer::new(path);
    let mut interval = follow.map(tokio::time::interval);
    let mut count = 0;

    loop {
        let (returned, lines) = poll_blocking(tailer).await?;
        tailer = returned;

        for line in &lines {
            dispatch(&router, &tx, line).await?;
        }
        count += lines.len();

        match interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => break,
        }
    }

    if let Some(line) = tailer.take_partial() {
        dispatch(&router, &tx, &line).await?;
        count += 1;
    }

    tracing::info!(path = %tailer.path().display(), lines = count, "Command file done");
    Ok(count)
}
