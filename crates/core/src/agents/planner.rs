//! # Planner Node
//!
//! Turns requirements (and any failing QA verdict) into a task DAG. A plan is
//! only returned once it passes [`validate_plan`]; invalid plans are retried
//! with the validation error fed back to the model.

use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{render_messages, LlmBackend, NodeOutcome};
use crate::error::{NodeError, PlanError};
use crate::state::{validate_plan, AgentKind, ProjectState, StateUpdate, Task, TaskStatus};

/// Messages from the end of the conversation included in the context
const RECENT_MESSAGES: usize = 5;

/// A task as proposed by the model
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct PlannedTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Ids of tasks that must complete first
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// "executor", "qa" or "reporting"; executor when omitted
    #[serde(default)]
    pub assigned_to: Option<String>,
}

impl PlannedTask {
    pub fn into_task(self) -> Task {
        let assigned_to = self
            .assigned_to
            .as_deref()
            .and_then(AgentKind::parse)
            .filter(|a| matches!(a, AgentKind::Executor | AgentKind::Qa | AgentKind::Reporting))
            .unwrap_or(AgentKind::Executor);
        Task {
            id: self.id,
            title: self.title,
            description: self.description,
            status: TaskStatus::Pending,
            dependencies: self.dependencies,
            assigned_to,
        }
    }
}

/// Output from the planner
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct PlanOutput {
    pub items: Vec<PlannedTask>,
}

fn pretty<T: Serialize>(value: &Option<T>) -> String {
    match value {
        Some(v) => serde_json::to_string_pretty(v).unwrap_or_else(|_| "None".to_string()),
        None => "None".to_string(),
    }
}

pub fn render_context(state: &ProjectState, rejected: Option<&PlanError>) -> String {
    let recent = &state.messages[state.messages.len().saturating_sub(RECENT_MESSAGES)..];
    let mut context = format!(
        "Requirements:\n{}\n\nCurrent Plan (if any):\n{}\n\nQA Feedback (if any):\n{}\n\nRecent Messages:\n{}",
        state.requirements.as_deref().unwrap_or(""),
        pretty(&state.plan),
        pretty(&state.qa_feedback),
        render_messages(recent),
    );
    if let Some(err) = rejected {
        context.push_str(&format!(
            "\n\nYour previous plan was rejected: {}. Return a corrected plan.",
            err
        ));
    }
    context
}

pub async fn run(
    backend: &dyn LlmBackend,
    state: &ProjectState,
    max_attempts: u32,
) -> Result<NodeOutcome, NodeError> {
    if state.requirements.is_none() {
        return Err(NodeError::MissingInput("requirements"));
    }

    let mut update = StateUpdate::from_agent(AgentKind::Planner);
    let mut rejected: Option<PlanError> = None;

    for attempt in 1..=max_attempts.max(1) {
        let output = backend
            .plan(render_context(state, rejected.as_ref()))
            .await
            .map_err(NodeError::from_llm)?;

        let tasks: Vec<Task> = output.items.into_iter().map(PlannedTask::into_task).collect();
        match validate_plan(&tasks) {
            Ok(()) => {
                update = update.log(format!("Planner: Created {} tasks.", tasks.len()));
                update.plan = Some(Some(tasks));
                update.qa_feedback = Some(None);
                return Ok(NodeOutcome::new(update));
            }
            Err(err) => {
                tracing::warn!(attempt, error = %err, "Planner produced an invalid plan");
                update = update.log(format!("Planner: Discarded invalid plan ({}).", err));
                rejected = Some(err);
            }
        }
    }

    Err(NodeError::InvalidPlan(
        rejected.unwrap_or(PlanError::Empty),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{ScriptedBackend, ScriptedCall};
    use crate::state::QaFeedback;

    fn planned(id: &str, deps: &[&str]) -> PlannedTask {
        PlannedTask {
            id: id.into(),
            title: format!("Task {}", id),
            description: String::new(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            assigned_to: None,
        }
    }

    fn with_requirements() -> ProjectState {
        let mut state = ProjectState::new("Build a todo app");
        state.requirements = Some("# Todo".into());
        state.qa_feedback = Some(QaFeedback {
            passed: false,
            issues: vec!["missing auth".into()],
            recommendations: vec![],
        });
        state
    }

    #[tokio::test]
    async fn test_valid_plan_resets_feedback() {
        let outcome = run(&ScriptedBackend::new(), &with_requirements(), 2)
            .await
            .unwrap();
        let update = outcome.update;
        assert_eq!(update.qa_feedback, Some(None));
        let plan = update.plan.unwrap().unwrap();
        assert!(validate_plan(&plan).is_ok());
        assert!(plan.iter().all(|t| t.status == TaskStatus::Pending));
    }

    #[tokio::test]
    async fn test_cycle_is_retried_with_feedback() {
        let backend = ScriptedBackend::new().with_plans(vec![
            PlanOutput {
                items: vec![planned("1", &["2"]), planned("2", &["1"])],
            },
            PlanOutput {
                items: vec![planned("1", &[]), planned("2", &["1"])],
            },
        ]);

        let outcome = run(&backend, &with_requirements(), 2).await.unwrap();
        assert_eq!(outcome.update.plan.unwrap().unwrap().len(), 2);

        let contexts = backend.contexts(ScriptedCall::Plan);
        assert_eq!(contexts.len(), 2);
        assert!(contexts[1].contains("previous plan was rejected"));
    }

    #[tokio::test]
    async fn test_invalid_plan_never_accepted() {
        let cyclic = PlanOutput {
            items: vec![planned("1", &["1"])],
        };
        let backend = ScriptedBackend::new().with_plans(vec![cyclic.clone(), cyclic]);

        let err = run(&backend, &with_requirements(), 2).await.unwrap_err();
        assert!(matches!(
            err,
            NodeError::InvalidPlan(PlanError::SelfDependency(_))
        ));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_requires_requirements() {
        let state = ProjectState::new("x");
        let err = run(&ScriptedBackend::new(), &state, 1).await.unwrap_err();
        assert!(matches!(err, NodeError::MissingInput("requirements")));
    }

    #[test]
    fn test_assignee_defaults_to_executor() {
        let mut task = planned("1", &[]);
        task.assigned_to = Some("architect".into());
        assert_eq!(task.into_task().assigned_to, AgentKind::Executor);

        let mut review = planned("2", &[]);
        review.assigned_to = Some("qa".into());
        assert_eq!(review.into_task().assigned_to, AgentKind::Qa);
    }

    #[test]
    fn test_context_includes_feedback_and_recent_messages() {
        let mut state = with_requirements();
        for i in 0..8 {
            state.messages.push(crate::state::Message::assistant(format!("m{}", i)));
        }
        let context = render_context(&state, None);
        assert!(context.contains("missing auth"));
        assert!(context.contains("m7"));
        assert!(!context.contains("m2"));
    }
}
