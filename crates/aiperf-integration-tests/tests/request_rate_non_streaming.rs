//! Non-streaming request through the worker, HTTP layer, and metric
//! evaluation, mirroring the rate-based run scenario: a single-turn
//! conversation served by an endpoint with a fixed server-side delay.

mod common;

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aiperf_bus::channels::{COMMANDS_TOPIC, RECORDS_QUEUE};
use aiperf_bus::message::Message;
use aiperf_bus::BusClient;
use aiperf_core::model::CreditPhase;

#[tokio::test]
async fn ttft_and_latency_track_the_mocked_server_delay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "choices": [{"message": {"content": "hi"}}],
                    "usage": {"prompt_tokens": 3, "completion_tokens": 1}
                }))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;

    let transport = common::local_transport();
    let harness = BusClient::new("test-harness", transport.clone());
    let mut commands = harness.subscribe(COMMANDS_TOPIC);

    common::spawn_worker("worker-0", transport, &server.uri(), false).await;

    let Message::RegisterService { .. } = commands.recv().await.unwrap() else { panic!("expected RegisterService") };
    harness
        .publish(
            COMMANDS_TOPIC,
            Message::ProfileConfigure { service_id: "test-harness".into(), request_ns: 0, request_id: Some("cfg-1".into()), config_path: String::new() },
        )
        .await
        .unwrap();
    loop {
        if let Message::CommandResponse { .. } = commands.recv().await.unwrap() {
            break;
        }
    }

    const REQUEST_COUNT: usize = 10;
    for i in 0..REQUEST_COUNT {
        harness
            .push(
                aiperf_bus::channels::CREDITS_QUEUE,
                Message::CreditDrop {
                    service_id: "test-harness".into(),
                    request_ns: 0,
                    phase: CreditPhase::Profiling,
                    conversation_id: None,
                    turn_index: 0,
                    should_cancel: false,
                    cancel_after_ns: None,
                    credit_drop_perf_ns: 0,
                    conversation_num: i as u64,
                },
            )
            .await
            .unwrap();
    }

    let mut latency_ns = Vec::new();
    for _ in 0..REQUEST_COUNT {
        let Message::MetricRecords { record, .. } = harness.pull(RECORDS_QUEUE).await.unwrap() else { panic!("expected MetricRecords") };
        assert!(record.error.is_none(), "request should not have errored: {:?}", record.error);
        // time_to_first_token is STREAMING_ONLY (aiperf-metrics/src/types/mod.rs);
        // for a non-streaming response it's equal to request_latency by
        // construction, so only the latter is ever evaluated.
        assert!(!record.values.contains_key("time_to_first_token"));
        latency_ns.push(record.values["request_latency"].value);
    }

    let median = |mut v: Vec<f64>| {
        v.sort_by(|a, b| a.partial_cmp(b).unwrap());
        v[v.len() / 2]
    };
    let latency_median_ms = median(latency_ns) / 1e6;

    assert!((40.0..=70.0).contains(&latency_median_ms), "latency median {latency_median_ms}ms not within 50ms +/- slack");
}
