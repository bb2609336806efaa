//! Ergonomic wrapper services use instead of talking to [`BusTransport`] directly.

use std::sync::Arc;
use std::time::Duration;

use aiperf_core::Result;

use crate::message::Message;
use crate::transport::{BusTransport, ReplySender};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A named handle onto a shared [`BusTransport`], bound to one service id.
///
/// Every service wires its outbound channel once at startup and reuses it,
/// rather than threading a trait object through every call site.
#[derive(Clone)]
pub struct BusClient {
    service_id: String,
    transport: Arc<dyn BusTransport>,
}

impl BusClient {
    pub fn new(service_id: impl Into<String>, transport: Arc<dyn BusTransport>) -> Self {
        Self {
            service_id: service_id.into(),
            transport,
        }
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub async fn publish(&self, topic: &str, message: Message) -> Result<()> {
        self.transport.publish(topic, message).await
    }

    pub fn subscribe(&self, topic: &str) -> tokio::sync::broadcast::Receiver<Message> {
        self.transport.subscribe(topic)
    }

    pub async fn push(&self, queue: &str, message: Message) -> Result<()> {
        self.transport.push(queue, message).await
    }

    pub async fn pull(&self, queue: &str) -> Result<Message> {
        self.transport.pull(queue).await
    }

    pub async fn request(&self, endpoint: &str, message: Message) -> Result<Message> {
        self.transport
            .request(endpoint, message, DEFAULT_REQUEST_TIMEOUT)
            .await
    }

    pub async fn request_with_timeout(
        &self,
        endpoint: &str,
        message: Message,
        timeout: Duration,
    ) -> Result<Message> {
        self.transport.request(endpoint, message, timeout).await
    }

    pub fn serve(&self, endpoint: &str) -> tokio::sync::mpsc::Receiver<(Message, ReplySender)> {
        self.transport.serve(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalBus;

    #[tokio::test]
    async fn client_tags_published_heartbeats_with_its_service_id() {
        let bus: Arc<dyn BusTransport> = Arc::new(LocalBus::new());
        let client = BusClient::new("worker-3", bus);
        let mut sub = client.subscribe("heartbeats");
        client
            .publish(
                "heartbeats",
                Message::Heartbeat {
                    service_id: client.service_id().to_string(),
                    request_ns: 7,
                },
            )
            .await
            .unwrap();
        let received = sub.recv().await.unwrap();
        assert_eq!(received.service_id(), "worker-3");
    }
}
