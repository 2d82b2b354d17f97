//! # Client Mirror
//!
//! A consumer's local copy of a run, folded from wire events in arrival
//! order. The mirror is also what gets persisted: [`Mirror::to_patch`]
//! renders it as a full [`RecordPatch`].

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::state::{
    merge_files, AgentKind, AgentSnapshot, AgentStatus, Decision, MessageRole, Metadata,
    ProjectFile, ProjectRecord, QaFeedback, RecordPatch, RecordStatus, Report, Task,
};
use crate::swarm::{Payload, WireEvent};

use super::progress::ProgressEstimator;

/// What applying one event did to the mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Updated,
    /// The run reached its terminal state with this event
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mirror {
    pub thread_id: String,
    pub prompt: String,
    pub metadata: Option<Metadata>,
    pub requirements: Option<String>,
    pub plan: Option<Vec<Task>>,
    pub files: Option<Vec<ProjectFile>>,
    pub qa_feedback: Option<QaFeedback>,
    pub logs: Vec<String>,
    pub agent_statuses: BTreeMap<AgentKind, AgentStatus>,
    pub agent_progress: BTreeMap<AgentKind, u8>,
    pub current_agent: Option<AgentKind>,
    /// Markdown of the last report message
    pub report: Option<String>,
    pub status: RecordStatus,
    pub error: Option<String>,
    pub is_processing: bool,
    pub is_completed: bool,
}

impl Mirror {
    /// Empty mirror with every agent idle
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            prompt: String::new(),
            metadata: None,
            requirements: None,
            plan: None,
            files: None,
            qa_feedback: None,
            logs: Vec::new(),
            agent_statuses: AgentKind::ALL
                .into_iter()
                .map(|a| (a, AgentStatus::Idle))
                .collect(),
            agent_progress: AgentKind::ALL.into_iter().map(|a| (a, 0)).collect(),
            current_agent: None,
            report: None,
            status: RecordStatus::Running,
            error: None,
            is_processing: false,
            is_completed: false,
        }
    }

    /// Mirror for a run that is about to start
    pub fn start(thread_id: impl Into<String>, metadata: Metadata) -> Self {
        let mut mirror = Self::new(thread_id);
        mirror
            .logs
            .push(format!("System: Initializing \"{}\" evaluation...", metadata.title));
        mirror.prompt = metadata.title.clone();
        mirror.metadata = Some(metadata);
        mirror.is_processing = true;
        mirror
    }

    /// Rehydrate from a stored record
    pub fn from_record(record: &ProjectRecord) -> Self {
        let mut mirror = Self::new(record.thread_id.clone());
        for snapshot in &record.agents {
            let Some(agent) = snapshot.agent() else {
                tracing::debug!(name = %snapshot.name, "Skipping unknown agent in record");
                continue;
            };
            mirror.agent_statuses.insert(agent, snapshot.status);
            mirror.agent_progress.insert(agent, snapshot.progress.min(100));
        }
        mirror.prompt = record.prompt.clone();
        mirror.metadata = record.metadata.clone();
        mirror.requirements = record.requirements.clone();
        mirror.plan = record.plan.clone();
        mirror.files = record.files.clone();
        mirror.qa_feedback = record.qa_feedback.clone();
        mirror.logs = record.logs.clone();
        mirror.report = record.report.as_ref().map(|r| r.markdown.clone());
        mirror.status = record.status;
        mirror.is_processing = record.status == RecordStatus::Running;
        mirror.is_completed = record.status == RecordStatus::Completed;
        mirror
    }

    pub fn status_of(&self, agent: AgentKind) -> AgentStatus {
        self.agent_statuses.get(&agent).copied().unwrap_or_default()
    }

    pub fn progress_of(&self, agent: AgentKind) -> u8 {
        self.agent_progress.get(&agent).copied().unwrap_or(0)
    }

    /// Share of agents in a terminal state, 100 once the run completed
    pub fn global_progress(&self) -> u8 {
        if self.is_completed {
            return 100;
        }
        let done = AgentKind::ALL
            .iter()
            .filter(|a| self.status_of(**a).is_terminal())
            .count();
        ((done as f64 / AgentKind::ALL.len() as f64) * 100.0).round() as u8
    }

    pub fn is_terminal(&self) -> bool {
        self.status != RecordStatus::Running
    }

    /// Fold one event into the mirror
    pub fn apply(&mut self, event: &WireEvent, estimator: &dyn ProgressEstimator) -> Transition {
        match event {
            WireEvent::Update { agent, payload } => self.apply_update(*agent, payload, estimator),
            WireEvent::Error(message) => {
                self.fail(message);
                Transition::Failed
            }
            WireEvent::Done => self.complete(),
        }
    }

    fn apply_update(
        &mut self,
        agent: AgentKind,
        payload: &Payload,
        estimator: &dyn ProgressEstimator,
    ) -> Transition {
        let signal = payload
            .status
            .map(|s| s.agent_status())
            .or(payload.next_agent.map(|_| AgentStatus::Completed));

        let current = self.progress_of(agent);
        match signal {
            Some(status) => {
                self.agent_statuses.insert(agent, status);
                self.agent_progress.insert(agent, 100);
            }
            None => {
                if !self.status_of(agent).is_terminal() {
                    self.agent_statuses.insert(agent, AgentStatus::Running);
                }
                let next = match payload.progress {
                    Some(p) => p.min(100),
                    None => estimator.advance(current),
                };
                self.agent_progress.insert(agent, next.max(current));
            }
        }

        if let Some(requirements) = &payload.requirements {
            self.requirements = requirements.clone();
        }
        if let Some(plan) = &payload.plan {
            self.plan = plan.clone();
        }
        if let Some(files) = &payload.files {
            self.files = Some(merge_files(
                self.files.take().unwrap_or_default(),
                files.clone(),
            ));
        }
        if let Some(feedback) = &payload.qa_feedback {
            self.qa_feedback = feedback.clone();
        }
        if let Some(report) = payload
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
        {
            self.report = Some(report.content.clone());
        }
        self.logs.extend(payload.logs.iter().cloned());
        self.current_agent = Some(agent);

        let finished = payload.next_agent == Some(Decision::Finish)
            || (agent == AgentKind::Reporting && signal == Some(AgentStatus::Completed));
        if finished {
            self.complete()
        } else {
            Transition::Updated
        }
    }

    /// Force every unfinished agent to completed and close the run
    fn complete(&mut self) -> Transition {
        for status in self.agent_statuses.values_mut() {
            if !status.is_terminal() {
                *status = AgentStatus::Completed;
            }
        }
        for progress in self.agent_progress.values_mut() {
            *progress = 100;
        }
        self.is_processing = false;

        if self.is_completed || self.status == RecordStatus::Failed {
            return Transition::Updated;
        }
        self.is_completed = true;
        self.status = RecordStatus::Completed;
        Transition::Completed
    }

    /// Mark the run failed, keeping everything received so far
    pub fn fail(&mut self, message: &str) {
        self.logs.push(format!("Error: {}", message));
        self.error = Some(message.to_string());
        self.status = RecordStatus::Failed;
        self.is_processing = false;
        self.is_completed = false;
    }

    pub fn agent_snapshots(&self) -> Vec<AgentSnapshot> {
        AgentKind::ALL
            .into_iter()
            .map(|agent| AgentSnapshot {
                progress: self.progress_of(agent),
                status: self.status_of(agent),
                ..AgentSnapshot::idle(agent)
            })
            .collect()
    }

    /// Patch written when the run starts
    pub fn start_patch(&self) -> RecordPatch {
        RecordPatch {
            prompt: Some(self.prompt.clone()),
            metadata: self.metadata.clone(),
            logs: Some(self.logs.clone()),
            status: Some(RecordStatus::Running),
            global_progress: Some(0),
            agents: Some(self.agent_snapshots()),
            ..RecordPatch::default()
        }
    }

    /// Full-document patch of the run fields
    pub fn to_patch(&self) -> RecordPatch {
        RecordPatch {
            requirements: Some(self.requirements.clone()),
            plan: Some(self.plan.clone()),
            files: Some(self.files.clone()),
            logs: Some(self.logs.clone()),
            qa_feedback: Some(self.qa_feedback.clone()),
            status: Some(self.status),
            global_progress: Some(self.global_progress()),
            agents: Some(self.agent_snapshots()),
            report: self.report.as_ref().map(|markdown| Report {
                markdown: markdown.clone(),
                generated_at: Utc::now(),
            }),
            ..RecordPatch::default()
        }
    }
}

/// Pure form of [`Mirror::apply`]
pub fn fold(mut mirror: Mirror, event: &WireEvent, estimator: &dyn ProgressEstimator) -> Mirror {
    mirror.apply(event, estimator);
    mirror
}
