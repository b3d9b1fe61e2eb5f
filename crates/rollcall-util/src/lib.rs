//! Shared utilities for rollcall
//!
//! This crate provides:
//! - ID types (PeriodId, ClientId)
//! - Time utilities (wall-clock capture windows, mock-time aware `now()`)
//! - Error types
//! - Default paths for socket, config, data, and evidence directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
