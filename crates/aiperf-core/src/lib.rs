//! AIPerf Core Types and Traits
//!
//! Fundamental types shared by every AIPerf service process:
//!
//! - [`clock`]: monotonic nanosecond clock
//! - [`model`]: conversations, credits, records, and progress snapshots (§3)
//! - [`error`]: shared error taxonomy (§7)
//! - [`config`]: per-process JSON config file loading (§4.7)

pub mod clock;
pub mod config;
pub mod error;
pub mod model;

pub use clock::{Clock, PerfNs};
pub use error::{Error, ExitErrorInfo, Result};
