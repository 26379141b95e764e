//! Intake source abstraction.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::ChannelError;
use crate::pipeline::processor::GiftProcessor;
use crate::pipeline::types::IntakeBatch;

/// Stream of batches produced by an intake source.
pub type BatchStream = Pin<Box<dyn Stream<Item = IntakeBatch> + Send>>;

/// A place gift links come from. Pure I/O, no evaluation.
#[async_trait]
pub trait IntakeSource: Send + Sync {
    /// Source name used in logs ("feed", "stdin").
    fn name(&self) -> &str;

    /// Begin listening and return the batch stream.
    async fn start(&self) -> Result<BatchStream, ChannelError>;
}

/// Start a source and process its batches on a dedicated task.
///
/// Batches from one source run one after another; separate sources run
/// concurrently against the same processor.
pub async fn spawn_intake(
    source: &dyn IntakeSource,
    processor: Arc<GiftProcessor>,
) -> Result<JoinHandle<()>, ChannelError> {
    let mut stream = source.start().await?;
    let name = source.name().to_string();

    info!(source = %name, "Intake source started");

    Ok(tokio::spawn(async move {
        while let Some(batch) = stream.next().await {
            processor.process_batch(&batch).await;
        }
        info!(source = %name, "Intake source ended");
    }))
}
