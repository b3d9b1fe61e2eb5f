//! Collaborator trait interfaces for rollcalld
//!
//! This crate defines the interface between the scheduling core and the
//! screenshot and face-detection backends. It contains no platform code itself.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;
