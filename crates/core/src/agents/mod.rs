//! # Agents
//!
//! The coordinator policy and the five worker nodes. Every node is a function
//! from an immutable [`ProjectState`] snapshot to a [`NodeOutcome`]; nodes
//! never touch the state directly.

pub mod backend;
pub mod executor;
pub mod llm_helpers;
pub mod manager;
pub mod planner;
pub mod prompts;
pub mod qa;
pub mod reporting;
pub mod requirement;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;

use std::sync::Arc;

pub use backend::{LlmBackend, RadkitBackend};
pub use manager::{DefaultPolicy, Routing, RoutingPolicy};
#[cfg(any(test, feature = "testing"))]
pub use scripted::{ScriptedBackend, ScriptedCall};

use crate::error::NodeError;
use crate::state::{CompletionSignal, Decision, Message, MessageRole, ProjectState, StateUpdate};

/// What a node hands back to the loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOutcome {
    pub update: StateUpdate,
    /// Optional completion signal forwarded on the wire
    pub signal: Option<CompletionSignal>,
}

impl NodeOutcome {
    pub fn new(update: StateUpdate) -> Self {
        Self {
            update,
            signal: None,
        }
    }

    pub fn with_signal(mut self, signal: CompletionSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// The worker nodes sharing one backend
#[derive(Clone)]
pub struct Team {
    backend: Arc<dyn LlmBackend>,
    max_plan_attempts: u32,
}

impl Team {
    pub fn new(backend: Arc<dyn LlmBackend>, max_plan_attempts: u32) -> Self {
        Self {
            backend,
            max_plan_attempts: max_plan_attempts.max(1),
        }
    }

    /// Run the worker a decision names, `None` for `finish`
    pub async fn execute(
        &self,
        decision: Decision,
        state: &ProjectState,
    ) -> Result<Option<NodeOutcome>, NodeError> {
        let backend = self.backend.as_ref();
        let outcome = match decision {
            Decision::Requirement => requirement::run(backend, state).await?,
            Decision::Planner => planner::run(backend, state, self.max_plan_attempts).await?,
            Decision::Executor => executor::run(backend, state).await?,
            Decision::Qa => qa::run(backend, state).await?,
            Decision::Reporting => reporting::run(backend, state).await?,
            Decision::Finish => return Ok(None),
        };
        Ok(Some(outcome))
    }
}

/// `Role: content` lines for a slice of the conversation
pub(crate) fn render_messages(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
                MessageRole::System => "System",
            };
            format!("{}: {}", role, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
