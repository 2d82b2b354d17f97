//! # Agent Roster
//!
//! The closed set of worker identifiers that appear on the wire, in the
//! shared state and in persisted records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the six nodes of the orchestration graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// The coordinator
    Manager,
    Requirement,
    Planner,
    Executor,
    Qa,
    Reporting,
}

impl AgentKind {
    /// Every agent in display order
    pub const ALL: [AgentKind; 6] = [
        AgentKind::Manager,
        AgentKind::Requirement,
        AgentKind::Planner,
        AgentKind::Executor,
        AgentKind::Qa,
        AgentKind::Reporting,
    ];

    /// Wire identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Requirement => "requirement",
            Self::Planner => "planner",
            Self::Executor => "executor",
            Self::Qa => "qa",
            Self::Reporting => "reporting",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manager" => Some(Self::Manager),
            "requirement" => Some(Self::Requirement),
            "planner" => Some(Self::Planner),
            "executor" => Some(Self::Executor),
            "qa" => Some(Self::Qa),
            "reporting" => Some(Self::Reporting),
            _ => None,
        }
    }

    /// Persona name stored in project records
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Manager => "Manager",
            Self::Requirement => "Alice",
            Self::Planner => "Bob",
            Self::Executor => "Charlie",
            Self::Qa => "Diana",
            Self::Reporting => "Reporting",
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::Manager => "Project Lead",
            Self::Requirement => "Requirements Agent",
            Self::Planner => "Planning Agent",
            Self::Executor => "Coding Agent",
            Self::Qa => "QA Agent",
            Self::Reporting => "Documentation",
        }
    }

    /// Reverse of [`AgentKind::display_name`]
    pub fn from_display_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.display_name() == name)
    }

    /// Prefix used for this agent's trace lines
    pub fn log_prefix(&self) -> &'static str {
        match self {
            Self::Manager => "Manager",
            Self::Requirement => "Requirement Analyst",
            Self::Planner => "Planner",
            Self::Executor => "Executor",
            Self::Qa => "QA",
            Self::Reporting => "Reporting",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing decision emitted by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Requirement,
    Planner,
    Executor,
    Qa,
    Reporting,
    Finish,
}

impl Decision {
    /// The worker this decision hands control to, `None` for `finish`
    pub fn worker(self) -> Option<AgentKind> {
        match self {
            Self::Requirement => Some(AgentKind::Requirement),
            Self::Planner => Some(AgentKind::Planner),
            Self::Executor => Some(AgentKind::Executor),
            Self::Qa => Some(AgentKind::Qa),
            Self::Reporting => Some(AgentKind::Reporting),
            Self::Finish => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requirement => "requirement",
            Self::Planner => "planner",
            Self::Executor => "executor",
            Self::Qa => "qa",
            Self::Reporting => "reporting",
            Self::Finish => "finish",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-agent status as seen by a client mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

impl AgentStatus {
    /// Completed and failed are both terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Completion signal a node attaches to its output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionSignal {
    Completed,
    Failed,
    /// Nothing to do; counts as done for progress
    Skipped,
}

impl CompletionSignal {
    /// Status the mirror snaps the agent to
    pub fn agent_status(self) -> AgentStatus {
        match self {
            Self::Completed | Self::Skipped => AgentStatus::Completed,
            Self::Failed => AgentStatus::Failed,
        }
    }
}
