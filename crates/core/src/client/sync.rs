//! Background persistence of mirror snapshots.
//!
//! Scheduling never blocks the reducer and a failed write is only logged.
//! Writes go through one background task so they land in the order they
//! were scheduled.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::state::{ProjectStore, RecordPatch};

pub struct PersistenceSync {
    thread_id: String,
    tx: mpsc::UnboundedSender<RecordPatch>,
    handle: JoinHandle<usize>,
}

impl PersistenceSync {
    /// Start the writer task for one thread
    pub fn spawn(store: Arc<dyn ProjectStore>, thread_id: impl Into<String>) -> Self {
        let thread_id = thread_id.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<RecordPatch>();

        let writer_id = thread_id.clone();
        let handle = tokio::spawn(async move {
            let mut written = 0;
            while let Some(patch) = rx.recv().await {
                match store.upsert(&writer_id, patch).await {
                    Ok(_) => written += 1,
                    Err(e) => tracing::warn!(thread_id = %writer_id, error = %e, "Project upsert failed"),
                }
            }
            written
        });

        Self {
            thread_id,
            tx,
            handle,
        }
    }

    /// Queue a write and return immediately
    pub fn schedule(&self, patch: RecordPatch) {
        if self.tx.send(patch).is_err() {
            tracing::warn!(thread_id = %self.thread_id, "Persistence writer is gone; dropping update");
        }
    }

    /// Wait for every queued write; returns how many succeeded
    pub async fn flush(self) -> usize {
        drop(self.tx);
        match self.handle.await {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!(thread_id = %self.thread_id, error = %e, "Persistence writer panicked");
                0
            }
        }
    }
}
