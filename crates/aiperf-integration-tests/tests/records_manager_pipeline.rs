//! Full request-count pipeline: a worker serving a mocked non-streaming
//! endpoint, a real `RecordsManager` admitting and aggregating its records,
//! and the controller-side `ProcessRecordsResult` the manager publishes once
//! the run's credits are complete.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aiperf_bus::channels::COMMANDS_TOPIC;
use aiperf_bus::message::Message;
use aiperf_bus::BusClient;
use aiperf_core::clock::Clock;
use aiperf_core::model::CreditPhase;
use aiperf_records::config::{BenchmarkMode, RecordsManagerConfig};
use aiperf_records::manager::RecordsManager;
use aiperf_timing::{cancel_pair, ConcurrencyConfig, ConcurrencyStrategy, CreditStrategy, StopCondition, StrategyContext};

const REQUEST_COUNT: u64 = 6;

#[tokio::test]
async fn records_manager_aggregates_a_request_count_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "hi"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1}
        })))
        .mount(&server)
        .await;

    let transport = common::local_transport();
    let harness = BusClient::new("test-harness", transport.clone());
    let mut commands = harness.subscribe(COMMANDS_TOPIC);

    common::spawn_worker("worker-0", transport.clone(), &server.uri(), false).await;

    let registry = Arc::new(aiperf_metrics::MetricRegistry::build(aiperf_metrics::types::builtin_classes()).unwrap());
    let manager_bus = BusClient::new("records-manager", transport.clone());
    let manager = RecordsManager::new(
        manager_bus,
        Clock::new(),
        RecordsManagerConfig { mode: BenchmarkMode::RequestCount, export_records: false, ..Default::default() },
        registry,
    )
    .await
    .unwrap();
    tokio::spawn(async move {
        let _ = manager.run().await;
    });

    for _ in 0..2 {
        let Message::RegisterService { .. } = commands.recv().await.unwrap() else { panic!("expected RegisterService") };
    }
    harness
        .publish(
            COMMANDS_TOPIC,
            Message::ProfileConfigure { service_id: "test-harness".into(), request_ns: 0, request_id: Some("cfg-1".into()), config_path: String::new() },
        )
        .await
        .unwrap();
    for _ in 0..2 {
        loop {
            if let Message::CommandResponse { .. } = commands.recv().await.unwrap() {
                break;
            }
        }
    }

    harness.publish(COMMANDS_TOPIC, Message::ProfileStart { service_id: "test-harness".into(), request_ns: 0 }).await.unwrap();

    let (_cancel_handle, cancel_token) = cancel_pair();
    let ctx = StrategyContext { bus: BusClient::new("timing-strategy", transport.clone()), clock: Clock::new(), cancel: cancel_token };
    let strategy = ConcurrencyStrategy { config: ConcurrencyConfig { concurrency: 1 } };
    let stats = strategy.run(&ctx, CreditPhase::Profiling, StopCondition::RequestCount(REQUEST_COUNT)).await.unwrap();
    assert_eq!(stats.completed, REQUEST_COUNT);

    let result = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Message::ProcessRecordsResult { result, .. } = commands.recv().await.unwrap() {
                return result;
            }
        }
    })
    .await
    .expect("RecordsManager should publish ProcessRecordsResult after CreditsComplete");

    assert!(!result.was_cancelled);
    let latency = result.results.iter().find(|r| r.tag == "request_latency").expect("request_latency should be aggregated");
    assert_eq!(latency.count, REQUEST_COUNT);
    let errors = result.results.iter().find(|r| r.tag == "error_request_count");
    assert!(errors.is_none() || errors.unwrap().count == 0);
}
