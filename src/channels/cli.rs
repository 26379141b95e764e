//! Stdin listener — each non-empty line is one manual intake batch.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{BatchStream, IntakeSource};
use crate::error::ChannelError;
use crate::pipeline::types::IntakeBatch;

/// Reads gift links typed or piped on stdin.
pub struct StdinListener;

impl StdinListener {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdinListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntakeSource for StdinListener {
    fn name(&self) -> &str {
        "stdin"
    }

    async fn start(&self) -> Result<BatchStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(batch) = batch_from_line(&line) else {
                            continue;
                        };
                        if tx.send(batch).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|batch| (batch, rx))
        });

        Ok(Box::pin(stream))
    }
}

fn batch_from_line(line: &str) -> Option<IntakeBatch> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(IntakeBatch::new("stdin", line))
}
