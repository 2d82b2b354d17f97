//! # Stream Consumer
//!
//! Reads a chunked event stream (an HTTP body or an in-process channel),
//! splits it into frames, folds every event into a [`Mirror`] and schedules a
//! persistence write after each one.

use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use crate::state::{RecordPatch, RecordStatus};
use crate::swarm::{SseDecoder, WireEvent};

use super::mirror::{Mirror, Transition};
use super::progress::{LinearProgress, ProgressEstimator};
use super::sync::PersistenceSync;

pub struct StreamConsumer {
    estimator: Arc<dyn ProgressEstimator>,
    read_timeout: Duration,
    sync: Option<PersistenceSync>,
}

impl StreamConsumer {
    pub fn new(read_timeout: Duration) -> Self {
        Self {
            estimator: Arc::new(LinearProgress::default()),
            read_timeout,
            sync: None,
        }
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn ProgressEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_sync(mut self, sync: PersistenceSync) -> Self {
        self.sync = Some(sync);
        self
    }

    /// Queue a write if persistence is attached
    pub fn persist(&self, patch: RecordPatch) {
        if let Some(sync) = &self.sync {
            sync.schedule(patch);
        }
    }

    /// Consume `stream` until `[DONE]`, an error event, a timeout or the end
    /// of the stream. `on_event` sees the mirror after each applied event.
    ///
    /// A stream that ends without `[DONE]` leaves the mirror failed.
    #[tracing::instrument(skip_all, fields(thread_id = %mirror.thread_id))]
    pub async fn consume<S, B, E>(
        &self,
        mut mirror: Mirror,
        stream: S,
        mut on_event: impl FnMut(&Mirror, &WireEvent),
    ) -> Mirror
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let mut stream = std::pin::pin!(stream);
        let mut decoder = SseDecoder::new();

        loop {
            let chunk = match tokio::time::timeout(self.read_timeout, stream.next()).await {
                Err(_) => {
                    let reason = format!(
                        "No data received for {:?}. Connection timed out.",
                        self.read_timeout
                    );
                    tracing::warn!("{}", reason);
                    self.fail(&mut mirror, &reason);
                    break;
                }
                Ok(None) => {
                    tracing::warn!(pending = decoder.pending(), "Stream closed before [DONE]");
                    self.fail(&mut mirror, "Connection closed before the run finished.");
                    break;
                }
                Ok(Some(Err(e))) => {
                    self.fail(&mut mirror, &format!("Stream error: {}", e));
                    break;
                }
                Ok(Some(Ok(chunk))) => chunk,
            };

            for data in decoder.push(chunk.as_ref()) {
                let event = match WireEvent::decode_data(&data) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping malformed event");
                        continue;
                    }
                };

                let transition = mirror.apply(&event, self.estimator.as_ref());
                self.persist(mirror.to_patch());
                if transition == Transition::Completed {
                    self.persist(RecordPatch {
                        status: Some(RecordStatus::Completed),
                        global_progress: Some(100),
                        ..RecordPatch::default()
                    });
                }
                on_event(&mirror, &event);

                if event.is_done() || transition == Transition::Failed {
                    return mirror;
                }
            }
        }
        mirror
    }

    fn fail(&self, mirror: &mut Mirror, reason: &str) {
        if mirror.status == RecordStatus::Failed {
            return;
        }
        mirror.fail(reason);
        self.persist(mirror.to_patch());
    }

    /// Wait for queued writes to land
    pub async fn finish(self) -> usize {
        match self.sync {
            Some(sync) => sync.flush().await,
            None => 0,
        }
    }
}
