//! # Scripted Backend
//!
//! Deterministic [`LlmBackend`] for tests, behind the `testing` feature. Queued responses
//! are returned first; once a queue is empty a built-in happy-path answer is
//! derived from the context. Every call's context is recorded.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::executor::{CodeOutput, CompletionStatus, GeneratedFile};
use super::planner::{PlanOutput, PlannedTask};
use super::qa::QaOutput;
use super::reporting::ReportOutput;
use super::requirement::RequirementOutput;
use super::LlmBackend;

/// Backend method a scripted call went through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptedCall {
    Requirements,
    Plan,
    Implement,
    Review,
    Report,
}

#[derive(Default)]
pub struct ScriptedBackend {
    plans: Mutex<VecDeque<PlanOutput>>,
    code: Mutex<VecDeque<CodeOutput>>,
    reviews: Mutex<VecDeque<QaOutput>>,
    failures: Mutex<HashMap<ScriptedCall, String>>,
    calls: Mutex<Vec<(ScriptedCall, String)>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plans(self, plans: Vec<PlanOutput>) -> Self {
        if let Ok(mut queue) = self.plans.lock() {
            queue.extend(plans);
        }
        self
    }

    pub fn with_code(self, code: Vec<CodeOutput>) -> Self {
        if let Ok(mut queue) = self.code.lock() {
            queue.extend(code);
        }
        self
    }

    pub fn with_reviews(self, reviews: Vec<QaOutput>) -> Self {
        if let Ok(mut queue) = self.reviews.lock() {
            queue.extend(reviews);
        }
        self
    }

    /// Make every call to `call` fail with `message`
    pub fn failing(self, call: ScriptedCall, message: impl Into<String>) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(call, message.into());
        }
        self
    }

    /// Contexts passed to `call`, in call order
    pub fn contexts(&self, call: ScriptedCall) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| {
                calls
                    .iter()
                    .filter(|(c, _)| *c == call)
                    .map(|(_, ctx)| ctx.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn record(&self, call: ScriptedCall, context: &str) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((call, context.to_string()));
        }
        let failure = self
            .failures
            .lock()
            .ok()
            .and_then(|f| f.get(&call).cloned());
        match failure {
            Some(message) => Err(anyhow::anyhow!(message)),
            None => Ok(()),
        }
    }

    fn next<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
        queue.lock().ok().and_then(|mut q| q.pop_front())
    }
}

/// Value of the `Label: value` line in a rendered context
fn field<'a>(context: &'a str, label: &str) -> Option<&'a str> {
    context
        .lines()
        .find_map(|line| line.strip_prefix(label))
        .map(str::trim)
}

fn slug(title: &str) -> String {
    title
        .split_whitespace()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn analyze_requirements(&self, context: String) -> Result<RequirementOutput> {
        self.record(ScriptedCall::Requirements, &context)?;
        let brief = field(&context, "User:").unwrap_or("the project");
        Ok(RequirementOutput {
            requirements_doc: format!(
                "## Requirements for: {}\n\n1. Core Logic\n2. User Interface\n3. Integration Tests",
                brief
            ),
            assumptions: vec!["Standard web stack".to_string()],
        })
    }

    async fn plan(&self, context: String) -> Result<PlanOutput> {
        self.record(ScriptedCall::Plan, &context)?;
        if let Some(plan) = Self::next(&self.plans) {
            return Ok(plan);
        }
        let task = |id: &str, title: &str, deps: &[&str]| PlannedTask {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            assigned_to: Some("executor".to_string()),
        };
        Ok(PlanOutput {
            items: vec![
                task("1", "Setup Project", &[]),
                task("2", "Implement Core Features", &["1"]),
                task("3", "Frontend UI", &["2"]),
            ],
        })
    }

    async fn implement(&self, context: String) -> Result<CodeOutput> {
        self.record(ScriptedCall::Implement, &context)?;
        if let Some(code) = Self::next(&self.code) {
            return Ok(code);
        }
        let title = field(&context, "Current Task:").unwrap_or("task");
        Ok(CodeOutput {
            files: vec![GeneratedFile {
                path: format!("src/{}.ts", slug(title)),
                content: format!("// {}\nexport {{}};\n", title),
                language: "typescript".to_string(),
            }],
            completion_status: CompletionStatus::Success,
            execution_log: String::new(),
        })
    }

    async fn review(&self, context: String) -> Result<QaOutput> {
        self.record(ScriptedCall::Review, &context)?;
        Ok(Self::next(&self.reviews).unwrap_or(QaOutput {
            passed: true,
            issues: vec![],
            recommendations: vec!["Ready for deploy".to_string()],
        }))
    }

    async fn report(&self, context: String) -> Result<ReportOutput> {
        self.record(ScriptedCall::Report, &context)?;
        Ok(ReportOutput {
            summary_markdown: format!("# Project Report\n\n{}", context),
        })
    }
}
