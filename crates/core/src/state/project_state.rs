//! # Project State
//!
//! The shared record threaded through every orchestration cycle. Nodes never
//! mutate it in place: each one receives an immutable snapshot and returns a
//! [`StateUpdate`], which [`ProjectState::apply`] folds in with one reducer per
//! field.

use serde::{Deserialize, Deserializer, Serialize};

use super::roster::{AgentKind, Decision};

/// Lifecycle of a plan task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// A unit of work in the plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// Ids of tasks that must be completed first
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "default_assignee")]
    pub assigned_to: AgentKind,
}

fn default_assignee() -> AgentKind {
    AgentKind::Executor
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            assigned_to: AgentKind::Executor,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }
}

/// Review state of a generated file
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    #[default]
    Draft,
    Approved,
    Rejected,
}

/// A generated source file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectFile {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub status: FileStatus,
}

impl ProjectFile {
    pub fn draft(
        path: impl Into<String>,
        content: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            language: language.into(),
            status: FileStatus::Draft,
        }
    }
}

/// Verdict of a QA pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct QaFeedback {
    pub passed: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A conversation turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Snapshot of one project thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectState {
    pub messages: Vec<Message>,
    pub requirements: Option<String>,
    pub plan: Option<Vec<Task>>,
    pub files: Option<Vec<ProjectFile>>,
    pub qa_feedback: Option<QaFeedback>,
    pub current_agent: Option<AgentKind>,
    pub next_agent: Option<Decision>,
    pub logs: Vec<String>,
    /// Set once the reporting node has produced its summary
    pub reported: bool,
    /// Failing QA verdicts seen so far
    pub qa_failures: u32,
}

/// Partial update returned by a node.
///
/// `None` leaves a field untouched. For nullable fields `Some(None)` clears
/// the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    pub messages: Vec<Message>,
    pub requirements: Option<Option<String>>,
    pub plan: Option<Option<Vec<Task>>>,
    /// Merged into the existing list by path
    pub files: Option<Vec<ProjectFile>>,
    pub qa_feedback: Option<Option<QaFeedback>>,
    pub current_agent: Option<AgentKind>,
    pub next_agent: Option<Decision>,
    pub logs: Vec<String>,
    pub reported: Option<bool>,
}

impl StateUpdate {
    /// Empty update attributed to `agent`
    pub fn from_agent(agent: AgentKind) -> Self {
        Self {
            current_agent: Some(agent),
            ..Self::default()
        }
    }

    pub fn log(mut self, line: impl Into<String>) -> Self {
        self.logs.push(line.into());
        self
    }

    /// True when applying this update cannot change anything but the trace
    pub fn is_noop(&self) -> bool {
        self.messages.is_empty()
            && self.requirements.is_none()
            && self.plan.is_none()
            && self.files.is_none()
            && self.qa_feedback.is_none()
            && self.reported.is_none()
    }
}

impl ProjectState {
    /// Fresh thread seeded with the user's brief
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
            ..Self::default()
        }
    }

    /// Fold a node's partial update into a new snapshot
    pub fn apply(mut self, update: StateUpdate) -> Self {
        self.messages.extend(update.messages);
        if let Some(requirements) = update.requirements {
            self.requirements = requirements;
        }
        if let Some(plan) = update.plan {
            self.plan = plan;
        }
        if let Some(files) = update.files {
            self.files = Some(merge_files(self.files.take().unwrap_or_default(), files));
        }
        if let Some(feedback) = update.qa_feedback {
            if matches!(&feedback, Some(f) if !f.passed) {
                self.qa_failures += 1;
            }
            self.qa_feedback = feedback;
        }
        if let Some(agent) = update.current_agent {
            self.current_agent = Some(agent);
        }
        if let Some(next) = update.next_agent {
            self.next_agent = Some(next);
        }
        self.logs.extend(update.logs);
        if let Some(reported) = update.reported {
            self.reported = reported;
        }
        self
    }

    /// Compare everything except bookkeeping (trace lines, last/next agent)
    pub fn same_progress(&self, other: &ProjectState) -> bool {
        self.messages == other.messages
            && self.requirements == other.requirements
            && self.plan == other.plan
            && self.files == other.files
            && self.qa_feedback == other.qa_feedback
            && self.reported == other.reported
            && self.qa_failures == other.qa_failures
    }

    pub fn plan_tasks(&self) -> &[Task] {
        self.plan.as_deref().unwrap_or(&[])
    }

    pub fn file_list(&self) -> &[ProjectFile] {
        self.files.as_deref().unwrap_or(&[])
    }

    /// Text of the first user turn
    pub fn prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }
}

/// Replace-by-path merge: matching paths are overwritten in place, new paths
/// are appended in the order they arrive.
pub fn merge_files(mut existing: Vec<ProjectFile>, incoming: Vec<ProjectFile>) -> Vec<ProjectFile> {
    for file in incoming {
        match existing.iter_mut().find(|f| f.path == file.path) {
            Some(slot) => *slot = file,
            None => existing.push(file),
        }
    }
    existing
}

/// Deserialize a field whose explicit `null` differs from absence.
///
/// Use with `#[serde(default, deserialize_with = "nullable")]` on an
/// `Option<Option<T>>`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
