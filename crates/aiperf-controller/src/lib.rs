//! System controller: binds the message bus, spawns worker and
//! records-manager subprocesses, and drives one benchmark run through its
//! full lifecycle (§4.7).

pub mod config;
pub mod controller;
pub mod dataset_service;
pub mod error;
pub mod supervisor;

pub use config::{DatasetFormat, DatasetSource, PhaseConfig, RunConfig, StrategyConfig};
pub use controller::{Controller, RunOutcome};
pub use error::{ControllerError, Result};
pub use supervisor::Supervisor;
