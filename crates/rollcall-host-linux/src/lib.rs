//! Linux collaborators for rollcalld
//!
//! Both backends shell out to configured commands:
//! - `CommandCapture` runs a screenshot tool and decodes the PNG it writes
//! - `CommandDetector` hands a PNG to a face counter and parses its stdout

mod capture;
mod detector;
mod process;

pub use capture::*;
pub use detector::*;
pub use process::*;
