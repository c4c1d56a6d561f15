//! Fire-and-forget narration.
//!
//! The loop hands text to [`Narrator::say`], which never waits: lines go
//! through a bounded channel to a background task that feeds a
//! [`Speaker`] one at a time. When the queue is full the line is dropped.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default number of lines waiting to be spoken.
pub const DEFAULT_QUEUE: usize = 16;

/// Something that can voice a line of text.
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, text: &str);
}

/// Speaker that writes narration to the log.
pub struct LogSpeaker;

#[async_trait]
impl Speaker for LogSpeaker {
    async fn speak(&self, text: &str) {
        info!(narration = %text, "Speaking");
    }
}

pub struct Narrator {
    tx: mpsc::Sender<String>,
    worker: JoinHandle<()>,
}

impl Narrator {
    /// Start the consumer task. Must be called inside a tokio runtime.
    pub fn spawn(speaker: Arc<dyn Speaker>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<String>(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                speaker.speak(&line).await;
            }
            debug!("Narration queue closed");
        });
        Self { tx, worker }
    }

    /// Queue `text` for speaking without waiting.
    pub fn say(&self, text: impl Into<String>) {
        match self.tx.try_send(text.into()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(line)) => {
                warn!(chars = line.len(), "Narration queue full, dropping line");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Narration consumer stopped, dropping line");
            }
        }
    }

    /// Speak everything still queued, then stop.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "Narration task ended abnormally");
        }
    }
}
