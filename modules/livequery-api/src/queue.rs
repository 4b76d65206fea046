//! In-process comment queue with batched delivery.
//!
//! Messages are collected into batches of up to `batch_size`, waiting at most
//! `batch_window` after the first message of a batch. Each batch is handled on
//! its own task. A failed batch goes back on the queue until its messages have
//! been delivered `max_receive_count` times, after which they are
//! dead-lettered.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{error, info, warn};

use livequery_common::{Config, QueueMessage};
use livequery_pipeline::BatchProcessor;

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub batch_size: usize,
    pub batch_window: Duration,
    pub max_receive_count: u32,
}

impl From<&Config> for QueueSettings {
    fn from(config: &Config) -> Self {
        Self {
            batch_size: config.queue_batch_size.max(1),
            batch_window: Duration::from_millis(config.queue_batch_window_ms),
            max_receive_count: config.queue_max_receive_count.max(1),
        }
    }
}

/// Consumer side of the queue.
#[async_trait]
pub trait BatchHandler: Send + Sync + 'static {
    /// `Err` asks for the batch to be redelivered.
    async fn handle(&self, batch: &[QueueMessage]) -> Result<()>;
}

#[async_trait]
impl BatchHandler for BatchProcessor {
    async fn handle(&self, batch: &[QueueMessage]) -> Result<()> {
        self.process(batch).await.map(|_| ())
    }
}

#[derive(Clone)]
pub struct MemoryQueue {
    sender: mpsc::UnboundedSender<QueueMessage>,
    dead_letters: Arc<Mutex<Vec<QueueMessage>>>,
}

impl MemoryQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<QueueMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            sender,
            dead_letters: Arc::new(Mutex::new(Vec::new())),
        };
        (queue, receiver)
    }

    pub fn send(&self, message: QueueMessage) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|_| anyhow!("comment queue is closed"))
    }

    /// Messages that exhausted their deliveries.
    #[cfg(test)]
    async fn dead_letters(&self) -> Vec<QueueMessage> {
        self.dead_letters.lock().await.clone()
    }

    async fn redeliver(&self, batch: Vec<QueueMessage>, max_receive_count: u32) {
        for message in batch {
            if message.receive_count >= max_receive_count {
                error!(
                    message_id = %message.message_id,
                    receive_count = message.receive_count,
                    "Message exhausted its deliveries, dead-lettering"
                );
                self.dead_letters.lock().await.push(message);
                continue;
            }
            if let Err(e) = self.send(message) {
                warn!(error = %e, "Could not requeue message");
            }
        }
    }
}

/// Drain `receiver` in batches until every sender is gone.
pub async fn run_consumer<H: BatchHandler>(
    queue: MemoryQueue,
    mut receiver: mpsc::UnboundedReceiver<QueueMessage>,
    handler: Arc<H>,
    settings: QueueSettings,
) {
    info!(
        batch_size = settings.batch_size,
        window_ms = settings.batch_window.as_millis() as u64,
        "Queue consumer started"
    );

    while let Some(batch) = next_batch(&mut receiver, &settings).await {
        let handler = handler.clone();
        let queue = queue.clone();
        let max_receive_count = settings.max_receive_count;

        tokio::spawn(async move {
            if let Err(e) = handler.handle(&batch).await {
                error!(
                    error = %format!("{e:#}"),
                    messages = batch.len(),
                    "Batch failed, returning it to the queue"
                );
                queue.redeliver(batch, max_receive_count).await;
            }
        });
    }

    info!("Queue consumer stopped");
}

async fn next_batch(
    receiver: &mut mpsc::UnboundedReceiver<QueueMessage>,
    settings: &QueueSettings,
) -> Option<Vec<QueueMessage>> {
    let first = receiver.recv().await?;
    let deadline = Instant::now() + settings.batch_window;
    let mut batch = vec![first];

    while batch.len() < settings.batch_size {
        match tokio::time::timeout_at(deadline, receiver.recv()).await {
            Ok(Some(message)) => batch.push(message),
            Ok(None) | Err(_) => break,
        }
    }

    for message in &mut batch {
        message.receive_count += 1;
    }
    Some(batch)
}
