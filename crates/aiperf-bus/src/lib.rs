//! The message bus services use to coordinate a run (§4.1, §6).
//!
//! [`transport::BusTransport`] is the contract; [`local::LocalBus`] backs it
//! for single-process runs and [`tcp`] backs it across real OS processes.
//! [`client::BusClient`] is the handle services actually hold.

pub mod channels;
pub mod client;
pub mod local;
pub mod message;
pub mod tcp;
pub mod transport;

pub use client::BusClient;
pub use local::LocalBus;
pub use message::{CommandResponseStatus, Message, MetricRecordPayload, ProcessRecordsResultPayload, ServiceStatus};
pub use tcp::{BrokerServer, TcpBus};
pub use transport::{BusTransport, ReplySender};
