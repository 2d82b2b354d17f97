//! # Reporting Node

use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{LlmBackend, NodeOutcome};
use crate::error::NodeError;
use crate::state::{AgentKind, CompletionSignal, Message, ProjectState, StateUpdate};

/// Output from the delivery report writer
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct ReportOutput {
    pub summary_markdown: String,
}

pub fn render_context(state: &ProjectState) -> String {
    let qa = state
        .qa_feedback
        .as_ref()
        .and_then(|f| serde_json::to_string(f).ok())
        .unwrap_or_else(|| "null".to_string());
    format!(
        "Requirements: {}\nPlan Items: {}\nFiles: {}\nQA: {}",
        state.requirements.as_deref().unwrap_or(""),
        state.plan_tasks().len(),
        state.file_list().len(),
        qa
    )
}

/// Appends the report to the conversation and marks the project reported
pub async fn run(backend: &dyn LlmBackend, state: &ProjectState) -> Result<NodeOutcome, NodeError> {
    let output = backend
        .report(render_context(state))
        .await
        .map_err(NodeError::from_llm)?;

    let mut update =
        StateUpdate::from_agent(AgentKind::Reporting).log("Reporting: Final report generated.");
    update.messages.push(Message::assistant(output.summary_markdown));
    update.reported = Some(true);

    Ok(NodeOutcome::new(update).with_signal(CompletionSignal::Completed))
}
