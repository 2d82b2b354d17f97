//! # Wire Events
//!
//! The text event stream between the orchestration process and its
//! consumers. Each event is one `data: <json>\n\n` frame holding either a
//! single-key object `{"<agent>": {payload}}`, an `{"error": "..."}` object,
//! or the literal terminator `[DONE]`.

use serde::{Deserialize, Serialize};

use crate::error::WireError;
use crate::state::project_state::nullable;
use crate::state::{
    AgentKind, CompletionSignal, Decision, Message, ProjectFile, QaFeedback, StateUpdate, Task,
};

/// Terminator sent after the last substantive event
pub const DONE: &str = "[DONE]";

/// Partial update carried under a worker id. Every field is optional and
/// only present fields are applied by consumers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Payload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_agent: Option<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_agent: Option<AgentKind>,
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<ProjectFile>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub qa_feedback: Option<Option<QaFeedback>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CompletionSignal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl Payload {
    /// Payload mirroring a node's state update
    pub fn from_update(update: &StateUpdate, status: Option<CompletionSignal>) -> Self {
        Self {
            next_agent: update.next_agent,
            current_agent: update.current_agent,
            requirements: update.requirements.clone(),
            plan: update.plan.clone(),
            files: update.files.clone(),
            qa_feedback: update.qa_feedback.clone(),
            logs: update.logs.clone(),
            messages: update.messages.clone(),
            status,
            progress: None,
        }
    }

    /// Payload carrying only trace lines
    pub fn logs<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            logs: lines.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// One decoded wire event
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    Update { agent: AgentKind, payload: Payload },
    /// Fatal, non-recoverable failure
    Error(String),
    Done,
}

impl WireEvent {
    pub fn update(agent: AgentKind, payload: Payload) -> Self {
        Self::Update { agent, payload }
    }

    /// Body of the `data:` line
    pub fn data(&self) -> Result<String, WireError> {
        match self {
            // Written by hand so payload fields keep declaration order
            Self::Update { agent, payload } => Ok(format!(
                "{{{}:{}}}",
                serde_json::to_string(agent.as_str())?,
                serde_json::to_string(payload)?
            )),
            Self::Error(message) => Ok(serde_json::json!({ "error": message }).to_string()),
            Self::Done => Ok(DONE.to_string()),
        }
    }

    /// Full frame including the trailing blank line
    pub fn encode(&self) -> Result<String, WireError> {
        Ok(format!("data: {}\n\n", self.data()?))
    }

    /// Parse the body of a `data:` line
    pub fn decode_data(data: &str) -> Result<Self, WireError> {
        let data = data.trim();
        if data == DONE {
            return Ok(Self::Done);
        }

        let value: serde_json::Value = serde_json::from_str(data)?;
        let serde_json::Value::Object(object) = value else {
            return Err(WireError::Shape);
        };
        if object.len() != 1 {
            return Err(WireError::Shape);
        }
        let Some((key, body)) = object.into_iter().next() else {
            return Err(WireError::Shape);
        };

        if key == "error" {
            let message = match body {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            return Ok(Self::Error(message));
        }

        let agent = AgentKind::parse(&key).ok_or(WireError::UnknownAgent(key))?;
        let payload = serde_json::from_value(body)?;
        Ok(Self::Update { agent, payload })
    }

    /// Parse one complete frame such as `data: {...}`
    pub fn decode_frame(frame: &str) -> Result<Self, WireError> {
        let data = frame_data(frame).ok_or_else(|| WireError::NotData(frame.to_string()))?;
        Self::decode_data(&data)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Joined `data:` lines of a frame; `None` for comment-only frames
fn frame_data(frame: &str) -> Option<String> {
    let lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Incremental frame splitter for a chunked byte stream.
///
/// Frames may span chunk boundaries (including inside a UTF-8 sequence);
/// comment lines (`:`) and non-data fields are skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the `data` bodies of every completed frame
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some((end, sep)) = find_boundary(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..end + sep).take(end).collect();
            let text = String::from_utf8_lossy(&frame).replace("\r\n", "\n");
            if let Some(data) = frame_data(&text) {
                out.push(data);
            }
        }
        out
    }

    /// Bytes of an unterminated frame still waiting for its blank line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Position and length of the first blank-line separator
fn find_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}
