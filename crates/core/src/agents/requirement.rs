//! # Requirement Node
//!
//! Produces the requirements document. Writing new requirements always clears
//! the plan so it is regenerated against them.

use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{render_messages, LlmBackend, NodeOutcome};
use crate::error::NodeError;
use crate::state::{AgentKind, ProjectState, StateUpdate};

/// Output from the requirement analyst
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct RequirementOutput {
    /// The requirements document in markdown
    pub requirements_doc: String,
    /// Assumptions made to fill gaps in the brief
    #[serde(default)]
    pub assumptions: Vec<String>,
}

pub fn render_context(state: &ProjectState) -> String {
    format!("Conversation:\n{}", render_messages(&state.messages))
}

pub async fn run(backend: &dyn LlmBackend, state: &ProjectState) -> Result<NodeOutcome, NodeError> {
    let output = backend
        .analyze_requirements(render_context(state))
        .await
        .map_err(NodeError::from_llm)?;

    let mut update = StateUpdate::from_agent(AgentKind::Requirement)
        .log("Requirement Analyst: Requirements generated.");
    update
        .logs
        .extend(output.assumptions.iter().map(|a| format!("Assumption: {}", a)));
    update.requirements = Some(Some(output.requirements_doc));
    update.plan = Some(None);

    Ok(NodeOutcome::new(update))
}
