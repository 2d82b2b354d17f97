//! # OrchestrAI Core
//!
//! The "Brain" of OrchestrAI: project state, the agent nodes, the
//! orchestration loop, the wire protocol and the client-side mirror.
//!
//! ## Architecture
//!
//! - `agents/` - Manager routing policy and the five worker nodes
//! - `state/` - Shared project state, plan DAG, project records and stores
//! - `swarm/` - Orchestration loop, simulated run, wire events, producer
//! - `client/` - Stream consumer, mirror reducer, persistence sync
//! - `models` / `config` - LLM provider selection and runtime settings
//!
//! ## Usage
//!
//! ```rust,ignore
//! use orchestrai_core::config::Settings;
//! use orchestrai_core::swarm::{spawn_run, Coordinator};
//! use std::sync::Arc;
//!
//! let settings = Settings::load().await?;
//! let coordinator = Arc::new(Coordinator::from_settings(&settings));
//! let mut stream = spawn_run(coordinator, "Build a todo app".into(), (&settings).into());
//! while let Some(event) = stream.events.recv().await {
//!     print!("{}", event.encode()?);
//! }
//! ```

pub mod agents;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod swarm;
