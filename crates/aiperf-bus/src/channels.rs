//! Well-known channel names shared by every service process. Centralized
//! here so the timing strategy, worker, and records manager agree on them
//! without a runtime handshake.

/// PUB/SUB: controller-issued lifecycle and profile commands.
pub const COMMANDS_TOPIC: &str = "commands";

/// PUB/SUB: service status and heartbeat fan-out.
pub const STATUS_TOPIC: &str = "status";

/// PUB/SUB: worker acks of credit completion, consumed by the concurrency strategy.
pub const CREDIT_RETURNS_TOPIC: &str = "credit_returns";

/// PUSH/PULL: credits emitted by the active timing strategy, pulled by workers.
pub const CREDITS_QUEUE: &str = "credits";

/// PUSH/PULL: per-request metric records pushed by workers to the records manager.
pub const RECORDS_QUEUE: &str = "records";

/// REQ/REP: conversation and turn lookups served by the dataset manager.
pub const DATASET_ENDPOINT: &str = "dataset";

/// REQ/REP: real-time metric snapshot queries served by the records manager.
pub const REALTIME_METRICS_ENDPOINT: &str = "realtime_metrics";
