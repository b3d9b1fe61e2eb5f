//! Period scheduling and attempt orchestration for rollcalld
//!
//! This crate is the heart of rollcalld, containing:
//! - The period registry and per-period state machine
//!   (Waiting -> Detecting -> Completed | Skipped | TimedOut)
//! - Attempt throttling and headcount evaluation
//! - Window expiry
//! - The capture pipeline (capture, detect, evaluate, save, log)
//! - A one-second ticker that serializes passes and manual commands

mod condition;
mod events;
mod orchestrator;
mod period;
mod scheduler;
mod throttle;
mod ticker;
mod timeout;

pub use condition::*;
pub use events::*;
pub use orchestrator::*;
pub use period::*;
pub use scheduler::*;
pub use throttle::*;
pub use ticker::*;
pub use timeout::*;
