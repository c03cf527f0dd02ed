//! Child output capture.
//!
//! One reader per stream splits bytes into lines and forwards them over a
//! channel to a single consumer, so the sink is only ever called from one
//! task.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

const LINE_CHANNEL_CAPACITY: usize = 256;

/// Longer lines are split into chunks of at most this many bytes.
pub const MAX_LINE_BYTES: u64 = 16 * 1024;

/// A captured, trimmed, non-blank line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub text: String,
    pub is_error: bool,
}

/// Lossily decode and trim one raw line; blank lines yield `None`.
pub fn normalize_line(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Running reader and consumer tasks for one child.
pub struct OutputCapture {
    readers: Vec<JoinHandle<()>>,
    consumer: JoinHandle<()>,
}

impl OutputCapture {
    /// Start reading `stdout` and `stderr`, delivering lines to `sink`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start<O, E, F>(stdout: Option<O>, stderr: Option<E>, mut sink: F) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
        F: FnMut(OutputLine) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<OutputLine>(LINE_CHANNEL_CAPACITY);
        let mut readers = Vec::with_capacity(2);

        if let Some(stdout) = stdout {
            readers.push(tokio::spawn(read_lines(stdout, false, tx.clone())));
        }
        if let Some(stderr) = stderr {
            readers.push(tokio::spawn(read_lines(stderr, true, tx.clone())));
        }
        drop(tx);

        let consumer = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                sink(line);
            }
        });

        Self { readers, consumer }
    }

    /// Wait for both streams to close and every line to reach the sink.
    ///
    /// Gives up after `limit` (a grandchild can keep a pipe open) and aborts
    /// the tasks. Returns whether the drain completed.
    pub async fn drain(self, limit: Duration) -> bool {
        let Self {
            readers,
            mut consumer,
        } = self;

        match tokio::time::timeout(limit, &mut consumer).await {
            Ok(_) => true,
            Err(_) => {
                debug!("Output drain timed out after {:?}", limit);
                for reader in readers {
                    reader.abort();
                }
                consumer.abort();
                false
            }
        }
    }
}

async fn read_lines<R>(reader: R, is_error: bool, tx: mpsc::Sender<OutputLine>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match (&mut reader).take(MAX_LINE_BYTES).read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let Some(text) = normalize_line(&buf) else {
                    continue;
                };
                if tx.send(OutputLine { text, is_error }).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Output reader stopped: {}", e);
                break;
            }
        }
    }
}
