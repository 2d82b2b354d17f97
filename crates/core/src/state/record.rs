//! # Project Records
//!
//! The persisted view of one project thread, as written by client mirrors and
//! served back over the records API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::project_state::{nullable, ProjectFile, QaFeedback, Task};
use super::roster::{AgentKind, AgentStatus};

/// Overall status of a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Options chosen when the project was set up
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOptions {
    #[serde(default)]
    pub is_code: bool,
    #[serde(default)]
    pub is_fast: bool,
    #[serde(default)]
    pub is_detailed: bool,
}

/// User-facing description of a project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Metadata {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: ProjectOptions,
}

impl Metadata {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            options: ProjectOptions::default(),
        }
    }

    /// Brief sent to the orchestrator for this project
    pub fn render_prompt(&self) -> String {
        let mode = if self.options.is_detailed {
            "Detailed Analysis"
        } else {
            "Fast Path"
        };
        format!(
            "Project Title: {}\nDescription: {}\nMode: {}",
            self.title, self.description, mode
        )
    }
}

/// Persisted status of one agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentSnapshot {
    pub name: String,
    pub role: String,
    pub progress: u8,
    pub status: AgentStatus,
}

impl AgentSnapshot {
    pub fn idle(agent: AgentKind) -> Self {
        Self {
            name: agent.display_name().to_string(),
            role: agent.role().to_string(),
            progress: 0,
            status: AgentStatus::Idle,
        }
    }

    /// The roster entry this snapshot belongs to
    pub fn agent(&self) -> Option<AgentKind> {
        AgentKind::from_display_name(&self.name)
    }
}

/// Final narrative produced by the reporting node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub markdown: String,
    pub generated_at: DateTime<Utc>,
}

/// A stored project thread
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub thread_id: String,
    pub prompt: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub plan: Option<Vec<Task>>,
    #[serde(default)]
    pub files: Option<Vec<ProjectFile>>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub qa_feedback: Option<QaFeedback>,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default)]
    pub global_progress: u8,
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentSnapshot>,
    #[serde(default)]
    pub report: Option<Report>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fresh thread id for a new project
pub fn new_thread_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Idle snapshot for every agent in roster order
pub fn default_agents() -> Vec<AgentSnapshot> {
    AgentKind::ALL.into_iter().map(AgentSnapshot::idle).collect()
}

/// Partial write to a [`ProjectRecord`].
///
/// Absent fields are left untouched; nullable fields distinguish an explicit
/// `null` from absence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub requirements: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub plan: Option<Option<Vec<Task>>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub files: Option<Option<Vec<ProjectFile>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub qa_feedback: Option<Option<QaFeedback>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<Vec<AgentSnapshot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
}

impl ProjectRecord {
    /// New record for a thread that has not been seen before
    pub fn create(thread_id: impl Into<String>, patch: &RecordPatch, now: DateTime<Utc>) -> Self {
        let prompt = patch
            .prompt
            .clone()
            .or_else(|| patch.metadata.as_ref().map(|m| m.title.clone()))
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "Untitled Project".to_string());

        Self {
            thread_id: thread_id.into(),
            prompt,
            metadata: None,
            requirements: None,
            plan: None,
            files: None,
            logs: Vec::new(),
            qa_feedback: None,
            status: RecordStatus::Running,
            global_progress: 0,
            agents: default_agents(),
            report: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite exactly the fields present in `patch`
    pub fn apply(&mut self, patch: RecordPatch, now: DateTime<Utc>) {
        if let Some(prompt) = patch.prompt {
            self.prompt = prompt;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = Some(metadata);
        }
        if let Some(requirements) = patch.requirements {
            self.requirements = requirements;
        }
        if let Some(plan) = patch.plan {
            self.plan = plan;
        }
        if let Some(files) = patch.files {
            self.files = files;
        }
        if let Some(logs) = patch.logs {
            self.logs = logs;
        }
        if let Some(feedback) = patch.qa_feedback {
            self.qa_feedback = feedback;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(progress) = patch.global_progress {
            self.global_progress = progress.min(100);
        }
        if let Some(agents) = patch.agents {
            self.agents = agents;
        }
        if let Some(report) = patch.report {
            self.report = Some(report);
        }
        self.updated_at = now;
    }

    /// Create-or-update, the semantics every store's `upsert` follows
    pub fn upserted(existing: Option<Self>, thread_id: &str, patch: RecordPatch) -> Self {
        let now = Utc::now();
        let mut record = existing.unwrap_or_else(|| Self::create(thread_id, &patch, now));
        record.apply(patch, now);
        record
    }
}
