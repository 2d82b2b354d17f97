//! # Swarm Orchestration
//!
//! The orchestration loop and everything that turns it into a stream.
//!
//! ## Loop
//!
//! ```text
//! Manager → worker → Manager → worker → … → Manager(finish)
//! ```
//!
//! Workers are `requirement`, `planner`, `executor`, `qa` and `reporting`.
//! Each node execution becomes one wire event; the producer appends `[DONE]`
//! or, on a fatal failure, a single error event.

pub mod coordinator;
pub mod events;
pub mod pipeline;
pub mod simulation;
pub mod stream;

pub use coordinator::{Coordinator, CoordinatorConfig};
pub use events::{Payload, SseDecoder, WireEvent, DONE};
pub use pipeline::{Pipeline, PipelineStage};
pub use simulation::SimulatedStep;
pub use stream::{produce, spawn_run, EventStream, ProducerOptions, FALLBACK_NOTICE};
