//! Conversation dataset loading and lookup (§4.3 step 2, §6).
//!
//! [`loaders`] parses the four input JSONL formats into the shared
//! `aiperf_core::model` types. [`store`] holds them in memory for direct,
//! in-process lookup; [`client`] wraps that lookup (or a bus fallback) for a
//! worker that doesn't share a process with the dataset manager.
//! [`artifact`] writes the `inputs.json` intermediate artifact.

pub mod artifact;
pub mod client;
pub mod error;
pub mod loaders;
pub mod store;

pub use client::DatasetClient;
pub use error::DatasetError;
pub use loaders::{load_multi_turn, load_random_pool, load_single_turn, load_trace, RandomPool, TraceEntry};
pub use store::DatasetStore;
