//! # Event Producer
//!
//! Runs one project thread in the background and exposes its events as a
//! channel. A retryable failure (quota, rate limit, forced simulation)
//! switches to the simulated run, which may follow events already emitted by
//! the live loop. Any other failure ends the stream with a single error event
//! and no terminator.

use futures::Stream;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::error::{RunError, WireError};
use crate::state::AgentKind;

use super::coordinator::Coordinator;
use super::events::{Payload, WireEvent};
use super::simulation;

/// Trace line announcing the switch to the simulated run
pub const FALLBACK_NOTICE: &str = "System: API Quota Exceeded. Switching to Simulation Mode...";

const CHANNEL_CAPACITY: usize = 64;

/// How a run should be produced
#[derive(Debug, Clone, Copy)]
pub struct ProducerOptions {
    /// Skip the live loop and go straight to the simulated run
    pub force_simulation: bool,
    /// Delay scale for the simulated run
    pub sim_pacing: f64,
}

impl Default for ProducerOptions {
    fn default() -> Self {
        Self {
            force_simulation: false,
            sim_pacing: 1.0,
        }
    }
}

impl From<&Settings> for ProducerOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            force_simulation: settings.force_simulation,
            sim_pacing: settings.sim_pacing,
        }
    }
}

/// A running producer: the event receiver plus its background task
pub struct EventStream {
    pub events: mpsc::Receiver<WireEvent>,
    pub handle: JoinHandle<()>,
}

impl EventStream {
    /// Encoded frames as a byte stream, for consumers that read the wire
    /// format rather than decoded events
    pub fn into_frames(self) -> impl Stream<Item = Result<Vec<u8>, WireError>> {
        futures::stream::unfold(self.events, |mut rx| async move {
            let event = rx.recv().await?;
            Some((event.encode().map(String::into_bytes), rx))
        })
    }
}

/// Start producing events for `prompt`
pub fn spawn_run(
    coordinator: Arc<Coordinator>,
    prompt: String,
    options: ProducerOptions,
) -> EventStream {
    let (tx, events) = mpsc::channel(CHANNEL_CAPACITY);
    let handle = tokio::spawn(async move {
        produce(&coordinator, &prompt, options, &tx).await;
    });
    EventStream { events, handle }
}

/// Drive one run into `tx`, ending with `[DONE]` or an error event
pub async fn produce(
    coordinator: &Coordinator,
    prompt: &str,
    options: ProducerOptions,
    tx: &mpsc::Sender<WireEvent>,
) {
    let result = if options.force_simulation {
        Err(RunError::ForcedSimulation)
    } else {
        coordinator.run(prompt, tx).await.map(|_| ())
    };

    let outcome = match result {
        Ok(()) => Ok(()),
        Err(RunError::ConsumerClosed) => Err(RunError::ConsumerClosed),
        Err(err) if err.is_retryable() => {
            tracing::warn!(error = %err, "Falling back to simulated run");
            fallback(prompt, options.sim_pacing, tx).await
        }
        Err(err) => {
            tracing::error!(error = %err, "Run failed");
            if tx.send(WireEvent::Error(err.to_string())).await.is_err() {
                tracing::debug!("Consumer closed before error event");
            }
            return;
        }
    };

    match outcome {
        Ok(()) => {
            if tx.send(WireEvent::Done).await.is_err() {
                tracing::debug!("Consumer closed before [DONE]");
            }
        }
        Err(_) => tracing::info!("Consumer disconnected; stopping run"),
    }
}

/// Manager frame announcing the switch, shaped like any other manager event
fn fallback_notice() -> WireEvent {
    WireEvent::update(
        AgentKind::Manager,
        Payload {
            current_agent: Some(AgentKind::Manager),
            ..Payload::logs([FALLBACK_NOTICE])
        },
    )
}

async fn fallback(
    prompt: &str,
    pacing: f64,
    tx: &mpsc::Sender<WireEvent>,
) -> Result<(), RunError> {
    tx.send(fallback_notice()).await.map_err(|_| RunError::ConsumerClosed)?;
    simulation::play(prompt, pacing, tx).await
}
