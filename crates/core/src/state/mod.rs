//! # State
//!
//! Shared project state, the plan DAG, persisted project records and the
//! stores that keep them.

pub mod db;
pub mod json;
pub mod plan;
pub mod project_state;
pub mod record;
pub mod roster;
pub mod store;

pub use db::SqliteProjectStore;
pub use json::JsonFileStore;
pub use plan::{next_eligible, validate_plan};
pub use project_state::{
    merge_files, FileStatus, Message, MessageRole, ProjectFile, ProjectState, QaFeedback,
    StateUpdate, Task, TaskStatus,
};
pub use record::{
    new_thread_id, AgentSnapshot, Metadata, ProjectOptions, ProjectRecord, RecordPatch,
    RecordStatus, Report,
};
pub use roster::{AgentKind, AgentStatus, CompletionSignal, Decision};
pub use store::{open_store, MemoryStore, ProjectStore};
