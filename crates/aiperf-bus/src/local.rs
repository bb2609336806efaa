//! In-process broker backend
//!
//! Backs [`crate::transport::BusTransport`] with `tokio::sync` primitives
//! instead of OS sockets. This is the backend used when every component
//! service runs as a task inside one process — the common deployment shape
//! for a single-host benchmark run (see the Open Questions entry in
//! `DESIGN.md`). [`crate::tcp`] backs the same trait across real OS processes.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::time::timeout as tokio_timeout;

use aiperf_core::{Error, Result};

use crate::message::Message;
use crate::transport::{BusTransport, ReplySender};

const BROADCAST_CAPACITY: usize = 1024;
const QUEUE_CAPACITY: usize = 4096;

struct Queue {
    tx: mpsc::Sender<Message>,
    rx: Mutex<mpsc::Receiver<Message>>,
}

struct ReplyEndpoint {
    tx: mpsc::Sender<(Message, ReplySender)>,
    rx: Mutex<Option<mpsc::Receiver<(Message, ReplySender)>>>,
}

/// A process-local broker shared by every service task.
#[derive(Clone, Default)]
pub struct LocalBus {
    topics: Arc<DashMap<String, broadcast::Sender<Message>>>,
    queues: Arc<DashMap<String, Arc<Queue>>>,
    endpoints: Arc<DashMap<String, Arc<ReplyEndpoint>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn topic_sender(&self, topic: &str) -> broadcast::Sender<Message> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(BROADCAST_CAPACITY).0)
            .clone()
    }

    fn queue(&self, name: &str) -> Arc<Queue> {
        self.queues
            .entry(name.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
                Arc::new(Queue {
                    tx,
                    rx: Mutex::new(rx),
                })
            })
            .clone()
    }

    fn endpoint(&self, name: &str) -> Arc<ReplyEndpoint> {
        self.endpoints
            .entry(name.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
                Arc::new(ReplyEndpoint {
                    tx,
                    rx: Mutex::new(Some(rx)),
                })
            })
            .clone()
    }
}

#[async_trait]
impl BusTransport for LocalBus {
    async fn publish(&self, topic: &str, message: Message) -> Result<()> {
        // Fire-and-forget: no subscribers is not an error (§4.1 contract).
        let _ = self.topic_sender(topic).send(message);
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> broadcast::Receiver<Message> {
        self.topic_sender(topic).subscribe()
    }

    async fn push(&self, queue: &str, message: Message) -> Result<()> {
        self.queue(queue)
            .tx
            .send(message)
            .await
            .map_err(|e| Error::Push(e.to_string()))
    }

    async fn pull(&self, queue: &str) -> Result<Message> {
        let queue = self.queue(queue);
        let mut rx = queue.rx.lock().await;
        rx.recv().await.ok_or_else(|| Error::Pull("queue closed".into()))
    }

    async fn request(&self, endpoint: &str, message: Message, timeout: Duration) -> Result<Message> {
        let ep = self.endpoint(endpoint);
        let (reply_tx, reply_rx) = oneshot::channel();
        ep.tx
            .send((message, reply_tx))
            .await
            .map_err(|e| Error::Request(e.to_string()))?;
        match tokio_timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(Error::Response("reply sender dropped".into())),
            Err(_) => Err(Error::Response(format!("timed out after {timeout:?}"))),
        }
    }

    fn serve(&self, endpoint: &str) -> mpsc::Receiver<(Message, ReplySender)> {
        let ep = self.endpoint(endpoint);
        let mut guard = ep.rx.try_lock().expect("serve() called concurrently for the same endpoint");
        guard
            .take()
            .expect("serve() called twice for the same endpoint")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let bus = LocalBus::new();
        let mut sub1 = bus.subscribe("commands");
        let mut sub2 = bus.subscribe("commands");

        bus.publish(
            "commands",
            Message::ProfileStart {
                service_id: "controller".into(),
                request_ns: 1,
            },
        )
        .await
        .unwrap();

        assert_eq!(sub1.recv().await.unwrap().service_id(), "controller");
        assert_eq!(sub2.recv().await.unwrap().service_id(), "controller");
    }

    #[tokio::test]
    async fn push_pull_load_balances_across_two_pullers() {
        let bus = LocalBus::new();
        for i in 0..4u64 {
            bus.push(
                "credits",
                Message::CreditReturn {
                    service_id: "worker".into(),
                    request_ns: 0,
                    conversation_num: i,
                    errored: false,
                },
            )
            .await
            .unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..4 {
            let msg = bus.pull("credits").await.unwrap();
            if let Message::CreditReturn { conversation_num, .. } = msg {
                seen.push(conversation_num);
            }
        }
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn request_reply_round_trips() {
        let bus = LocalBus::new();
        let mut server = bus.serve("dataset");

        let bus_clone = bus.clone();
        tokio::spawn(async move {
            let _ = bus_clone;
            let (_req, reply) = server.recv().await.unwrap();
            let _ = reply.send(Message::ConversationResponse {
                service_id: "dataset-manager".into(),
                request_ns: 2,
                request_id: "req-1".into(),
                conversation: None,
            });
        });

        let reply = bus
            .request(
                "dataset",
                Message::ConversationRequest {
                    service_id: "worker-0".into(),
                    request_ns: 1,
                    request_id: "req-1".into(),
                    conversation_id: None,
                },
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(reply.request_id(), Some("req-1"));
    }

    #[tokio::test]
    async fn request_times_out_when_nobody_replies() {
        let bus = LocalBus::new();
        let _server = bus.serve("dataset");
        let result = bus
            .request(
                "dataset",
                Message::ConversationRequest {
                    service_id: "worker-0".into(),
                    request_ns: 1,
                    request_id: "req-2".into(),
                    conversation_id: None,
                },
                Duration::from_millis(20),
            )
            .await;
        assert!(result.is_err());
    }
}
