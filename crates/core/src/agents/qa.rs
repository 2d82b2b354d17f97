//! # QA Node
//!
//! Reviews generated files against the requirements. Only ever writes
//! `qa_feedback`.

use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{LlmBackend, NodeOutcome};
use crate::error::NodeError;
use crate::state::{AgentKind, ProjectState, QaFeedback, StateUpdate};

/// Output from the QA reviewer
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct QaOutput {
    pub passed: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl From<QaOutput> for QaFeedback {
    fn from(output: QaOutput) -> Self {
        Self {
            passed: output.passed,
            issues: output.issues,
            recommendations: output.recommendations,
        }
    }
}

pub fn render_context(state: &ProjectState) -> String {
    let files = state.file_list();
    let code = if files.is_empty() {
        "No files.".to_string()
    } else {
        files
            .iter()
            .map(|f| format!("File: {}\n{}", f.path, f.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    format!(
        "Requirements:\n{}\n\nGenerated Code:\n{}",
        state.requirements.as_deref().unwrap_or(""),
        code
    )
}

pub async fn run(backend: &dyn LlmBackend, state: &ProjectState) -> Result<NodeOutcome, NodeError> {
    let feedback: QaFeedback = backend
        .review(render_context(state))
        .await
        .map_err(NodeError::from_llm)?
        .into();

    let mut update = StateUpdate::from_agent(AgentKind::Qa).log(format!(
        "QA: Review complete. Passed: {}. Issues: {}",
        feedback.passed,
        feedback.issues.len()
    ));
    update.qa_feedback = Some(Some(feedback));

    Ok(NodeOutcome::new(update))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ScriptedBackend;
    use crate::state::ProjectFile;

    #[tokio::test]
    async fn test_review_only_writes_feedback() {
        let mut state = ProjectState::new("x");
        state.requirements = Some("# R".into());
        state.files = Some(vec![ProjectFile::draft("a.ts", "code", "typescript")]);

        let backend = ScriptedBackend::new().with_reviews(vec![QaOutput {
            passed: false,
            issues: vec!["missing auth".into()],
            recommendations: vec![],
        }]);
        let update = run(&backend, &state).await.unwrap().update;

        assert!(update.files.is_none());
        assert!(update.plan.is_none());
        assert_eq!(update.logs, vec!["QA: Review complete. Passed: false. Issues: 1"]);
        assert!(!update.qa_feedback.unwrap().unwrap().passed);
    }

    #[test]
    fn test_context_without_files() {
        let state = ProjectState::new("x");
        assert!(render_context(&state).ends_with("No files."));
    }
}
