//! Shared test doubles for the end-to-end scenario tests: an in-process bus,
//! a one-turn dataset, and a minimal SSE server that can delay each chunk
//! independently (wiremock only delays a whole response, not per-chunk).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use futures::stream;

use aiperf_bus::{BusClient, BusTransport, LocalBus};
use aiperf_core::clock::Clock;
use aiperf_core::model::{Conversation, Turn, TurnContent};
use aiperf_dataset::{DatasetClient, DatasetStore};
use aiperf_http::{create_client, HttpClientConfig};
use aiperf_metrics::{types::builtin_classes, MetricRegistry};
use aiperf_worker::config::WorkerConfig;
use aiperf_worker::Worker;

pub fn local_transport() -> Arc<dyn BusTransport> {
    Arc::new(LocalBus::new())
}

pub fn one_turn_dataset(text: &str) -> Arc<DatasetStore> {
    Arc::new(DatasetStore::from_conversations(vec![Conversation {
        conversation_id: "conversation-0".into(),
        turns: vec![Turn { text: TurnContent::single(text), ..Default::default() }],
    }]))
}

/// Builds a `Worker` wired to `transport`, a local dataset of one
/// conversation, and a fresh registry of the built-in metric classes.
pub async fn spawn_worker(service_id: &str, transport: Arc<dyn BusTransport>, base_url: &str, streaming: bool) -> tokio::task::JoinHandle<()> {
    let bus = BusClient::new(service_id, transport);
    let config = WorkerConfig {
        service_id: service_id.to_string(),
        bus_addr: String::new(),
        model_name: "test-model".into(),
        base_url: base_url.to_string(),
        endpoint_type: aiperf_worker::config::SerializableEndpointType::ChatCompletions,
        streaming,
        api_key: None,
        extra_headers: Default::default(),
        extra: Default::default(),
        http: HttpClientConfig::default(),
        slo: Default::default(),
    };
    let http = create_client(&config.http).unwrap();
    let endpoint = config.endpoint();
    let dataset = DatasetClient::with_local_store(bus.clone(), one_turn_dataset("hello"));
    let registry = Arc::new(MetricRegistry::build(builtin_classes()).unwrap());
    let worker = Worker { config, bus, clock: Clock::new(), http, endpoint, dataset, registry };

    tokio::spawn(async move {
        let _ = worker.run().await;
    })
}

/// A chunk of an SSE response: how long to wait after the previous chunk
/// before writing `data: {body}\n\n`.
#[derive(Clone)]
pub struct SseChunk {
    pub delay: Duration,
    pub body: String,
}

/// Starts a real HTTP server (axum, not wiremock) whose single
/// `/chat/completions` route streams `chunks` with the requested per-chunk
/// delay, then `data: [DONE]\n\n`, returning its base URL.
pub async fn spawn_sse_server(chunks: Vec<SseChunk>) -> String {
    let app = Router::new().route(
        "/chat/completions",
        post(move || {
            let mut remaining: Vec<Bytes> = chunks
                .iter()
                .map(|c| Bytes::from(format!("data: {}\n\n", c.body)))
                .collect();
            remaining.push(Bytes::from("data: [DONE]\n\n"));
            let mut delays: Vec<Duration> = chunks.iter().map(|c| c.delay).collect();
            delays.push(Duration::ZERO);
            remaining.reverse();
            delays.reverse();

            async move {
                let body_stream = stream::unfold((remaining, delays), |(mut frames, mut delays)| async move {
                    let frame = frames.pop()?;
                    let delay = delays.pop().unwrap_or(Duration::ZERO);
                    tokio::time::sleep(delay).await;
                    Some((Ok::<Bytes, std::convert::Infallible>(frame), (frames, delays)))
                });
                Response::builder()
                    .header("content-type", "text/event-stream")
                    .body(Body::from_stream(body_stream))
                    .unwrap()
                    .into_response()
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
