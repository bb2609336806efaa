//! The broker contract (§4.1): PUB/SUB, PUSH/PULL, REQ/REP
//!
//! Contracts, verbatim from the design:
//! - Publish is fire-and-forget; no delivery guarantee across restarts.
//! - Push delivery is at-most-once per puller (the broker load-balances).
//! - Request/reply carries a `request_id`; the reply must echo it. Timeouts
//!   are caller-side.
//! - Subscription dispatch is synchronous-per-message inside one consumer.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

use aiperf_core::Result;

use crate::message::Message;

/// A reply channel handed to a REQ/REP server loop for one inbound request.
pub type ReplySender = oneshot::Sender<Message>;

#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Fan out `message` to every current subscriber of `topic`.
    async fn publish(&self, topic: &str, message: Message) -> Result<()>;

    /// Subscribe to `topic`; each call gets its own receiver so a slow
    /// subscriber never delays another (§4.1, §5 ordering guarantees).
    fn subscribe(&self, topic: &str) -> broadcast::Receiver<Message>;

    /// Enqueue `message` on the named work queue for load-balanced pull.
    async fn push(&self, queue: &str, message: Message) -> Result<()>;

    /// Pull the next message from the named work queue. The broker
    /// load-balances: a message handed to one puller is never handed to
    /// another.
    async fn pull(&self, queue: &str) -> Result<Message>;

    /// Send `message` to `endpoint` and await its reply, bounded by `timeout`.
    async fn request(&self, endpoint: &str, message: Message, timeout: Duration) -> Result<Message>;

    /// Register as the reply server for `endpoint`; yields `(request,
    /// reply_sender)` pairs until the returned receiver is dropped.
    fn serve(&self, endpoint: &str) -> mpsc::Receiver<(Message, ReplySender)>;
}
