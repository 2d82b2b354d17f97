//! # Swarm Coordinator
//!
//! Drives the orchestration loop: manager decision, then the chosen worker,
//! then back to the manager until `finish`. Every node execution is emitted
//! as one [`WireEvent`] in strict execution order.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::agents::{DefaultPolicy, LlmBackend, RadkitBackend, RoutingPolicy, Team};
use crate::config::Settings;
use crate::error::RunError;
use crate::state::{AgentKind, ProjectState};

use super::events::{Payload, WireEvent};
use super::pipeline::Pipeline;

/// Loop limits taken from [`Settings`]
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    pub stall_limit: u32,
    /// Base cycle ceiling; raised per plan task
    pub max_cycles: usize,
    pub max_plan_attempts: u32,
    pub max_qa_rounds: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            stall_limit: 3,
            max_cycles: 64,
            max_plan_attempts: 2,
            max_qa_rounds: 2,
        }
    }
}

impl From<&Settings> for CoordinatorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            stall_limit: settings.stall_limit,
            max_cycles: settings.max_cycles,
            max_plan_attempts: settings.max_plan_attempts,
            max_qa_rounds: settings.max_qa_rounds,
        }
    }
}

pub struct Coordinator {
    config: CoordinatorConfig,
    team: Team,
    policy: Arc<dyn RoutingPolicy>,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        backend: Arc<dyn LlmBackend>,
        policy: Arc<dyn RoutingPolicy>,
    ) -> Self {
        Self {
            team: Team::new(backend, config.max_plan_attempts),
            config,
            policy,
        }
    }

    /// Production wiring: radkit backend and the default routing table
    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_backend(settings, Arc::new(RadkitBackend::new(settings)))
    }

    /// Default routing table over a caller-supplied backend
    pub fn with_backend(settings: &Settings, backend: Arc<dyn LlmBackend>) -> Self {
        Self::new(
            settings.into(),
            backend,
            Arc::new(DefaultPolicy::from_settings(settings)),
        )
    }

    /// Run one project thread to completion, emitting every node's output.
    ///
    /// Returns the final state on `finish`. A closed receiver stops the loop
    /// with [`RunError::ConsumerClosed`]; the worker already running is
    /// allowed to finish first.
    #[tracing::instrument(skip(self, tx), fields(prompt_preview = %prompt.chars().take(50).collect::<String>()))]
    pub async fn run(
        &self,
        prompt: &str,
        tx: &mpsc::Sender<WireEvent>,
    ) -> Result<ProjectState, RunError> {
        let mut state = ProjectState::new(prompt);
        let mut pipeline = Pipeline::new(self.config.stall_limit, self.config.max_cycles);

        loop {
            let routing = self.policy.decide(&state);
            let decision = routing.decision;
            tracing::info!(cycle = pipeline.cycles + 1, %decision, "Manager routed");

            let update = routing.into_update();
            emit(tx, WireEvent::update(AgentKind::Manager, Payload::from_update(&update, None)))
                .await?;
            state = state.apply(update);

            let Some(worker) = pipeline.route(decision)? else {
                break;
            };

            let outcome = match self.team.execute(decision, &state).await {
                Ok(Some(outcome)) => outcome,
                Ok(None) => break,
                Err(source) => {
                    pipeline.fail();
                    tracing::error!(%worker, error = %source, "Worker failed");
                    return Err(RunError::Node {
                        agent: worker,
                        source,
                    });
                }
            };

            emit(
                tx,
                WireEvent::update(worker, Payload::from_update(&outcome.update, outcome.signal)),
            )
            .await?;

            let before = state.clone();
            state = state.apply(outcome.update);
            pipeline.fit_plan(state.plan_tasks().len(), self.config.max_qa_rounds);
            pipeline.worker_done(decision, !before.same_progress(&state))?;
        }

        tracing::info!(cycles = pipeline.cycles, "Run finished");
        Ok(state)
    }
}

async fn emit(tx: &mpsc::Sender<WireEvent>, event: WireEvent) -> Result<(), RunError> {
    tracing::debug!(?event, "Emitting event");
    tx.send(event).await.map_err(|_| RunError::ConsumerClosed)
}
