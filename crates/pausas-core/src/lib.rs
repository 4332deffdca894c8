//! # Pausas Core
//!
//! Shared plumbing for the pausas workspace: the worker configuration
//! file, the injectable clock, and the core error type.

pub mod clock;
pub mod config;
pub mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::WorkerConfig;
pub use error::CoreError;
