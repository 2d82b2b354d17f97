//! Error types for nodes, plans, the orchestration loop and the wire codec.

use thiserror::Error;

use crate::state::{AgentKind, Decision};

/// Markers that identify a quota / rate-limit failure from a provider
const RETRYABLE_MARKERS: [&str; 5] = [
    "insufficientquota",
    "insufficient_quota",
    "429",
    "quota",
    "rate limit",
];

/// A plan that violates the DAG invariants
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("plan contains no tasks")]
    Empty,
    #[error("duplicate task id '{0}'")]
    DuplicateTask(String),
    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },
    #[error("task '{0}' depends on itself")]
    SelfDependency(String),
    #[error("dependency cycle through task '{0}'")]
    Cycle(String),
}

/// Failure of a single node's computation
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("LLM call failed: {message}")]
    Llm { retryable: bool, message: String },
    #[error("planner produced an invalid plan: {0}")]
    InvalidPlan(#[from] PlanError),
    #[error("missing input: {0}")]
    MissingInput(&'static str),
}

impl NodeError {
    /// Classify a backend failure by its message
    pub fn from_llm(err: anyhow::Error) -> Self {
        let message = format!("{err:#}");
        Self::Llm {
            retryable: is_retryable_message(&message),
            message,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Llm { retryable: true, .. })
    }
}

/// True when a provider error message denotes quota exhaustion or rate limiting
pub fn is_retryable_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    RETRYABLE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Failure of an orchestration run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{agent} failed: {source}")]
    Node {
        agent: AgentKind,
        #[source]
        source: NodeError,
    },
    #[error("no progress after {repeats} consecutive '{decision}' decisions")]
    Stalled { decision: Decision, repeats: u32 },
    #[error("cycle limit of {0} reached without a finish decision")]
    CycleLimit(usize),
    #[error("simulation forced by configuration")]
    ForcedSimulation,
    #[error("event consumer went away")]
    ConsumerClosed,
}

impl RunError {
    /// Retryable failures are answered with the simulated run
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Node { source, .. } => source.is_retryable(),
            Self::ForcedSimulation => true,
            Self::Stalled { .. } | Self::CycleLimit(_) | Self::ConsumerClosed => false,
        }
    }
}

/// Malformed wire frame
#[derive(Debug, Error)]
pub enum WireError {
    #[error("frame is not a data line: {0:?}")]
    NotData(String),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event must be an object with exactly one key")]
    Shape,
    #[error("unknown worker id '{0}'")]
    UnknownAgent(String),
}
