//! # Client
//!
//! Consumer side of the event stream: the mirror reducer, synthetic
//! progress, and background persistence of the mirror.

pub mod consumer;
pub mod mirror;
pub mod progress;
pub mod sync;

pub use consumer::StreamConsumer;
pub use mirror::{fold, Mirror, Transition};
pub use progress::{EasedProgress, LinearProgress, ProgressEstimator};
pub use sync::PersistenceSync;
