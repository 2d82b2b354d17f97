//! # Executor Node
//!
//! Implements one eligible task per invocation (first in plan order). When no
//! task is eligible but the last QA verdict failed, it applies the fixes
//! directly instead.

use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{LlmBackend, NodeOutcome};
use crate::error::NodeError;
use crate::state::plan::{next_eligible, with_task_status};
use crate::state::{
    AgentKind, CompletionSignal, ProjectFile, ProjectState, QaFeedback, StateUpdate, Task,
    TaskStatus,
};

/// A file written by the executor
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, LLMOutput)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Success,
    Error,
}

/// Output from the executor
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct CodeOutput {
    pub files: Vec<GeneratedFile>,
    pub completion_status: CompletionStatus,
    #[serde(default)]
    pub execution_log: String,
}

impl CodeOutput {
    fn into_drafts(self) -> (Vec<ProjectFile>, CompletionStatus, String) {
        let files = self
            .files
            .into_iter()
            .map(|f| ProjectFile::draft(f.path, f.content, f.language))
            .collect();
        (files, self.completion_status, self.execution_log)
    }
}

fn existing_paths(state: &ProjectState) -> String {
    let files = state.file_list();
    if files.is_empty() {
        "None".to_string()
    } else {
        files
            .iter()
            .map(|f| f.path.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn render_task_context(task: &Task, state: &ProjectState) -> String {
    format!(
        "Current Task: {}\nDescription: {}\nRequirements Context: {}\nExisting Files: {}",
        task.title,
        task.description,
        state.requirements.as_deref().unwrap_or(""),
        existing_paths(state),
    )
}

pub fn render_fix_context(feedback: &QaFeedback, state: &ProjectState) -> String {
    let bullets = |items: &[String]| {
        items
            .iter()
            .map(|i| format!("- {}", i))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let files = state
        .file_list()
        .iter()
        .map(|f| format!("File: {}\n{}", f.path, f.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Current Task: Fix QA issues\nQA Issues:\n{}\nRecommendations:\n{}\nRequirements Context: {}\nExisting Files:\n{}",
        bullets(&feedback.issues),
        bullets(&feedback.recommendations),
        state.requirements.as_deref().unwrap_or(""),
        files,
    )
}

pub async fn run(backend: &dyn LlmBackend, state: &ProjectState) -> Result<NodeOutcome, NodeError> {
    let update = StateUpdate::from_agent(AgentKind::Executor);

    if let Some(task) = next_eligible(state.plan_tasks()) {
        return implement_task(backend, state, task, update).await;
    }

    if let Some(feedback) = state.qa_feedback.as_ref().filter(|f| !f.passed) {
        return apply_fixes(backend, state, feedback, update).await;
    }

    Ok(NodeOutcome::new(
        update.log("Executor: No pending actionable tasks found. All done or blocked?"),
    )
    .with_signal(CompletionSignal::Skipped))
}

async fn implement_task(
    backend: &dyn LlmBackend,
    state: &ProjectState,
    task: &Task,
    mut update: StateUpdate,
) -> Result<NodeOutcome, NodeError> {
    tracing::debug!(task = %task.id, title = %task.title, "Executing task");
    let output = backend
        .implement(render_task_context(task, state))
        .await
        .map_err(NodeError::from_llm)?;

    let (files, status, execution_log) = output.into_drafts();
    let task_status = match status {
        CompletionStatus::Success => TaskStatus::Completed,
        CompletionStatus::Error => TaskStatus::Failed,
    };

    update = match task_status {
        TaskStatus::Completed => update.log(format!(
            "Executor: Completed task '{}'. Generated {} files.",
            task.title,
            files.len()
        )),
        _ => update.log(format!("Executor: Task '{}' failed.", task.title)),
    };
    if !execution_log.is_empty() {
        update = update.log(format!("Executor: {}", execution_log));
    }
    update.plan = Some(Some(with_task_status(state.plan_tasks(), &task.id, task_status)));
    update.files = Some(files);

    Ok(NodeOutcome::new(update))
}

async fn apply_fixes(
    backend: &dyn LlmBackend,
    state: &ProjectState,
    feedback: &QaFeedback,
    mut update: StateUpdate,
) -> Result<NodeOutcome, NodeError> {
    let output = backend
        .implement(render_fix_context(feedback, state))
        .await
        .map_err(NodeError::from_llm)?;

    let (files, _, execution_log) = output.into_drafts();
    update = update.log(format!(
        "Executor: Applied fixes for {} QA issue(s). Updated {} files.",
        feedback.issues.len(),
        files.len()
    ));
    if !execution_log.is_empty() {
        update = update.log(format!("Executor: {}", execution_log));
    }
    update.files = Some(files);
    // the fixed files need a fresh review
    update.qa_feedback = Some(None);

    Ok(NodeOutcome::new(update))
}
