//! JSON-line TCP broker backend
//!
//! A minimal real broker for running services as separate OS processes
//! (§4.1's multi-process deployment). Each connection speaks newline-delimited
//! frames; the broker fans published topics out to subscribers, round-robins
//! pushed work across pullers, and relays requests to whichever connection
//! registered as an endpoint's server. This is a small fraction of a real
//! broker (no persistence, no reconnection) since a benchmark run's broker
//! lives only as long as the run itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::time::timeout as tokio_timeout;
use tracing::{debug, warn};

use aiperf_core::{Error, Result};

use crate::message::{decode, encode, Message};
use crate::transport::{BusTransport, ReplySender};

/// A client handle that speaks to a [`BrokerServer`] over one TCP connection.
pub struct TcpBus {
    out_tx: mpsc::Sender<String>,
    subscriptions: Arc<tokio::sync::Mutex<HashMap<String, broadcast::Sender<Message>>>>,
    pull_queues: Arc<tokio::sync::Mutex<HashMap<String, broadcast::Sender<Message>>>>,
    pending_replies: Arc<tokio::sync::Mutex<HashMap<String, oneshot::Sender<Message>>>>,
    serve_inboxes: Arc<tokio::sync::Mutex<HashMap<String, mpsc::Sender<(Message, ReplySender)>>>>,
}

impl TcpBus {
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::Transport(format!("connect {addr}: {e}")))?;
        Ok(Self::from_stream(stream))
    }

    fn from_stream(stream: TcpStream) -> Self {
        let (read_half, mut write_half) = stream.into_split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(1024);
        let subscriptions = Arc::new(tokio::sync::Mutex::new(HashMap::new()));
        let pull_queues = Arc::new(tokio::sync::Mutex::new(HashMap::new()));
        let pending_replies = Arc::new(tokio::sync::Mutex::new(HashMap::new()));
        let serve_inboxes = Arc::new(tokio::sync::Mutex::new(HashMap::new()));

        tokio::spawn(async move {
            while let Some(line) = out_rx.recv().await {
                if write_half.write_all(line.as_bytes()).await.is_err() {
                    warn!("tcp bus write side closed");
                    break;
                }
            }
        });

        let subs = subscriptions.clone();
        let queues = pull_queues.clone();
        let replies = pending_replies.clone();
        let inboxes = serve_inboxes.clone();
        let reader_out_tx = out_tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        Self::dispatch_inbound_line(
                            &line,
                            &subs,
                            &queues,
                            &replies,
                            &inboxes,
                            &reader_out_tx,
                        )
                        .await;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "tcp bus read side error");
                        break;
                    }
                }
            }
        });

        Self {
            out_tx,
            subscriptions,
            pull_queues,
            pending_replies,
            serve_inboxes,
        }
    }

    async fn dispatch_inbound_line(
        line: &str,
        subscriptions: &tokio::sync::Mutex<HashMap<String, broadcast::Sender<Message>>>,
        pull_queues: &tokio::sync::Mutex<HashMap<String, broadcast::Sender<Message>>>,
        pending_replies: &tokio::sync::Mutex<HashMap<String, oneshot::Sender<Message>>>,
        serve_inboxes: &tokio::sync::Mutex<HashMap<String, mpsc::Sender<(Message, ReplySender)>>>,
        out_tx: &mpsc::Sender<String>,
    ) {
        let Some((kind, rest)) = line.split_once(' ') else {
            return;
        };
        match kind {
            "EVT" => {
                let Some((topic, payload)) = rest.split_once(' ') else { return };
                if let Ok(message) = decode(payload) {
                    if let Some(sender) = subscriptions.lock().await.get(topic) {
                        let _ = sender.send(message);
                    }
                }
            }
            "JOB" => {
                let Some((queue, payload)) = rest.split_once(' ') else { return };
                if let Ok(message) = decode(payload) {
                    if let Some(sender) = pull_queues.lock().await.get(queue) {
                        let _ = sender.send(message);
                    }
                }
            }
            "REPLY" => {
                if let Ok(message) = decode(rest) {
                    if let Some(request_id) = message.request_id() {
                        if let Some(sender) = pending_replies.lock().await.remove(request_id) {
                            let _ = sender.send(message);
                        }
                    }
                }
            }
            "CALL" => {
                let Some((_endpoint, payload)) = rest.split_once(' ') else { return };
                if let Ok(message) = decode(payload) {
                    if let Some(inbox) = serve_inboxes.lock().await.get(_endpoint) {
                        let (reply_tx, reply_rx) = oneshot::channel();
                        if inbox.try_send((message, reply_tx)).is_ok() {
                            let out_tx = out_tx.clone();
                            tokio::spawn(async move {
                                if let Ok(reply) = reply_rx.await {
                                    if let Ok(payload) = encode(&reply) {
                                        let _ = out_tx.send(format!("REPLY {payload}\n")).await;
                                    }
                                }
                            });
                        }
                    }
                }
            }
            _ => debug!(kind, "unrecognized tcp bus frame kind"),
        }
    }

    async fn write_line(&self, line: String) -> Result<()> {
        self.out_tx
            .send(line)
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

#[async_trait]
impl BusTransport for TcpBus {
    async fn publish(&self, topic: &str, message: Message) -> Result<()> {
        let payload = encode(&message)?;
        self.write_line(format!("PUB {topic} {payload}\n")).await
    }

    fn subscribe(&self, topic: &str) -> broadcast::Receiver<Message> {
        let subscriptions = self.subscriptions.clone();
        let out_tx = self.out_tx.clone();
        let topic_owned = topic.to_string();
        let (tx, rx) = broadcast::channel(1024);
        tokio::spawn(async move {
            subscriptions.lock().await.insert(topic_owned.clone(), tx);
            let _ = out_tx.send(format!("SUB {topic_owned}\n")).await;
        });
        rx
    }

    async fn push(&self, queue: &str, message: Message) -> Result<()> {
        let payload = encode(&message)?;
        self.write_line(format!("PUSH {queue} {payload}\n")).await
    }

    async fn pull(&self, queue: &str) -> Result<Message> {
        let mut rx = {
            let mut queues = self.pull_queues.lock().await;
            queues
                .entry(queue.to_string())
                .or_insert_with(|| broadcast::channel(1024).0)
                .subscribe()
        };
        self.write_line(format!("PULL {queue}\n")).await?;
        rx.recv().await.map_err(|e| Error::Pull(e.to_string()))
    }

    async fn request(&self, endpoint: &str, message: Message, timeout: Duration) -> Result<Message> {
        let request_id = message
            .request_id()
            .ok_or_else(|| Error::Request("message carries no request_id".into()))?
            .to_string();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending_replies
            .lock()
            .await
            .insert(request_id.clone(), reply_tx);
        let payload = encode(&message)?;
        self.write_line(format!("REQ {endpoint} {payload}\n")).await?;
        match tokio_timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(Error::Response("reply sender dropped".into())),
            Err(_) => {
                self.pending_replies.lock().await.remove(&request_id);
                Err(Error::Response(format!("timed out after {timeout:?}")))
            }
        }
    }

    fn serve(&self, endpoint: &str) -> mpsc::Receiver<(Message, ReplySender)> {
        let (tx, rx) = mpsc::channel(256);
        let serve_inboxes = self.serve_inboxes.clone();
        let out_tx = self.out_tx.clone();
        let endpoint_owned = endpoint.to_string();
        tokio::spawn(async move {
            serve_inboxes.lock().await.insert(endpoint_owned.clone(), tx);
            let _ = out_tx.send(format!("SERVE {endpoint_owned}\n")).await;
        });
        rx
    }
}

/// A listening broker process. Relays PUB/SUB, PUSH/PULL and REQ/REP frames
/// between connected [`TcpBus`] clients; holds no bus state of its own beyond
/// the routing tables.
pub struct BrokerServer {
    listener: TcpListener,
}

type Routes = Arc<Mutex<HashMap<String, Vec<mpsc::Sender<String>>>>>;

impl BrokerServer {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Transport(format!("bind {addr}: {e}")))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::Transport(e.to_string()))
    }

    pub async fn run(self) -> Result<()> {
        let topics: Routes = Arc::new(Mutex::new(HashMap::new()));
        let pull_consumers: Routes = Arc::new(Mutex::new(HashMap::new()));
        let endpoints: Routes = Arc::new(Mutex::new(HashMap::new()));
        let pending_requests: Arc<Mutex<HashMap<String, mpsc::Sender<String>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| Error::Transport(e.to_string()))?;
            debug!(%peer, "broker accepted connection");
            let topics = topics.clone();
            let pull_consumers = pull_consumers.clone();
            let endpoints = endpoints.clone();
            let pending_requests = pending_requests.clone();
            tokio::spawn(async move {
                if let Err(e) =
                    handle_connection(stream, topics, pull_consumers, endpoints, pending_requests).await
                {
                    warn!(%peer, error = %e, "broker connection ended");
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    topics: Routes,
    pull_consumers: Routes,
    endpoints: Routes,
    pending_requests: Arc<Mutex<HashMap<String, mpsc::Sender<String>>>>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(1024);

    let writer = tokio::spawn(async move {
        while let Some(line) = out_rx.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut next_consumer: HashMap<String, usize> = HashMap::new();
    let mut lines = BufReader::new(read_half).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Some((kind, rest)) = line.split_once(' ') else {
            continue;
        };
        match kind {
            "PUB" => {
                if let Some((topic, payload)) = rest.split_once(' ') {
                    let routes = topics.lock().await;
                    if let Some(senders) = routes.get(topic) {
                        let wire = format!("EVT {topic} {payload}\n");
                        for sender in senders {
                            let _ = sender.try_send(wire.clone());
                        }
                    }
                }
            }
            "SUB" => {
                topics
                    .lock()
                    .await
                    .entry(rest.to_string())
                    .or_default()
                    .push(out_tx.clone());
            }
            "PUSH" => {
                if let Some((queue, payload)) = rest.split_once(' ') {
                    let routes = pull_consumers.lock().await;
                    if let Some(senders) = routes.get(queue) {
                        if !senders.is_empty() {
                            let idx = next_consumer.entry(queue.to_string()).or_insert(0);
                            let sender = &senders[*idx % senders.len()];
                            let _ = sender.try_send(format!("JOB {queue} {payload}\n"));
                            *idx += 1;
                        }
                    }
                }
            }
            "PULL" => {
                pull_consumers
                    .lock()
                    .await
                    .entry(rest.to_string())
                    .or_default()
                    .push(out_tx.clone());
            }
            "REQ" => {
                if let Some((endpoint, payload)) = rest.split_once(' ') {
                    if let Ok(message) = decode(payload) {
                        if let Some(request_id) = message.request_id() {
                            pending_requests
                                .lock()
                                .await
                                .insert(request_id.to_string(), out_tx.clone());
                        }
                    }
                    let routes = endpoints.lock().await;
                    if let Some(senders) = routes.get(endpoint) {
                        if let Some(sender) = senders.first() {
                            let _ = sender.try_send(format!("CALL {endpoint} {payload}\n"));
                        }
                    }
                }
            }
            "SERVE" => {
                endpoints
                    .lock()
                    .await
                    .entry(rest.to_string())
                    .or_default()
                    .push(out_tx.clone());
            }
            "REPLY" => {
                if let Ok(message) = decode(rest) {
                    if let Some(request_id) = message.request_id() {
                        if let Some(requester) = pending_requests.lock().await.remove(request_id) {
                            let _ = requester.try_send(format!("REPLY {rest}\n"));
                        }
                    }
                }
            }
            _ => debug!(kind, "unrecognized broker frame kind"),
        }
    }

    writer.abort();
    Ok(())
}
