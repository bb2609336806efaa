//! Request issuance with nanosecond first/last-byte capture (§4.3 steps 4-5).

use aiperf_core::clock::{Clock, PerfNs};
use aiperf_core::model::{ErrorDetails, RawResponse, RequestRecord};
use futures::StreamExt;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::converters::EndpointConfig;
use aiperf_parser::sse::SseReader;

pub struct RequestParams {
    pub conversation_id: String,
    pub turn_index: usize,
    pub model_name: String,
    pub credit_num: u64,
    pub worker_id: Option<String>,
    pub should_cancel: bool,
    pub cancel_after_ns: Option<PerfNs>,
}

/// Issue one POST against `endpoint`, returning a [`RequestRecord`] with
/// `start_perf_ns`/`recv_start_perf_ns`/`end_perf_ns` captured around it.
/// Transport failures are folded into `RequestRecord.error` rather than
/// propagated, matching §7's "transport errors become ErrorDetails" rule —
/// the caller always gets a record to publish.
pub async fn issue_request(client: &Client, clock: &Clock, endpoint: &EndpointConfig, payload: Value, params: RequestParams) -> RequestRecord {
    let start_perf_ns = clock.now_ns();

    let send = send_and_collect(client, clock, endpoint, payload);
    let outcome = if params.should_cancel {
        if let Some(cancel_after_ns) = params.cancel_after_ns {
            let timeout = Duration::from_nanos(cancel_after_ns.max(0) as u64);
            match tokio::time::timeout(timeout, send).await {
                Ok(outcome) => outcome,
                Err(_) => Outcome::Cancelled,
            }
        } else {
            send.await
        }
    } else {
        send.await
    };

    let end_perf_ns = clock.now_ns();

    let (status, responses, error, recv_start_perf_ns, cancelled) = match outcome {
        Outcome::Success { status, recv_start_perf_ns, raw } => (Some(status), raw, None, Some(recv_start_perf_ns), false),
        Outcome::Error { status, recv_start_perf_ns, error } => (status, Vec::new(), Some(error), recv_start_perf_ns, false),
        Outcome::Cancelled => (None, Vec::new(), None, None, true),
    };

    RequestRecord {
        conversation_id: params.conversation_id,
        turn_index: params.turn_index,
        model_name: params.model_name,
        start_perf_ns,
        end_perf_ns,
        recv_start_perf_ns,
        status,
        responses,
        error,
        delayed: false,
        cancelled,
        worker_id: params.worker_id,
        credit_num: params.credit_num,
    }
}

enum Outcome {
    Success {
        status: u16,
        recv_start_perf_ns: PerfNs,
        raw: Vec<RawResponse>,
    },
    Error {
        status: Option<u16>,
        recv_start_perf_ns: Option<PerfNs>,
        error: ErrorDetails,
    },
    Cancelled,
}

async fn send_and_collect(client: &Client, clock: &Clock, endpoint: &EndpointConfig, payload: Value) -> Outcome {
    let mut request = client.post(endpoint.url()).json(&payload);
    if let Some(api_key) = &endpoint.api_key {
        request = request.bearer_auth(api_key);
    }
    for (name, value) in &endpoint.extra_headers {
        request = request.header(name, value);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            return Outcome::Error {
                status: err.status().map(|s| s.as_u16()),
                recv_start_perf_ns: None,
                error: ErrorDetails {
                    code: err.status().map(|s| s.as_u16()),
                    error_type: "transport".to_string(),
                    message: err.to_string(),
                },
            };
        }
    };

    // reqwest resolves headers before the body; this is the closest available
    // approximation to "first response byte" without a lower-level client.
    let recv_start_perf_ns = clock.now_ns();
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Outcome::Error {
            status: Some(status.as_u16()),
            recv_start_perf_ns: Some(recv_start_perf_ns),
            error: ErrorDetails {
                code: Some(status.as_u16()),
                error_type: "endpoint".to_string(),
                message: body,
            },
        };
    }

    let is_streaming = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/event-stream"))
        .unwrap_or(false);

    if !is_streaming {
        return match response.text().await {
            Ok(body) => Outcome::Success {
                status: status.as_u16(),
                recv_start_perf_ns,
                raw: vec![RawResponse::Text(body)],
            },
            Err(err) => Outcome::Error {
                status: Some(status.as_u16()),
                recv_start_perf_ns: Some(recv_start_perf_ns),
                error: ErrorDetails {
                    code: None,
                    error_type: "transport".to_string(),
                    message: err.to_string(),
                },
            },
        };
    }

    let mut reader = SseReader::new();
    let mut frames = Vec::new();
    let mut stream = response.bytes_stream();
    loop {
        match stream.next().await {
            Some(Ok(bytes)) => {
                let now = clock.now_ns();
                for frame in reader.feed(&bytes, now) {
                    if let Ok(encoded) = serde_json::to_string(&frame) {
                        frames.push(encoded);
                    }
                }
            }
            Some(Err(err)) => {
                return Outcome::Error {
                    status: Some(status.as_u16()),
                    recv_start_perf_ns: Some(recv_start_perf_ns),
                    error: ErrorDetails {
                        code: None,
                        error_type: "transport".to_string(),
                        message: err.to_string(),
                    },
                };
            }
            None => break,
        }
    }

    Outcome::Success {
        status: status.as_u16(),
        recv_start_perf_ns,
        raw: vec![RawResponse::SseMessages(frames)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::EndpointType;
    use std::collections::HashMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint(base_url: String, endpoint_type: EndpointType) -> EndpointConfig {
        EndpointConfig {
            base_url,
            endpoint_type,
            streaming: false,
            api_key: None,
            extra_headers: HashMap::new(),
            extra: serde_json::Map::new(),
        }
    }

    fn params() -> RequestParams {
        RequestParams {
            conversation_id: "c1".into(),
            turn_index: 0,
            model_name: "gpt-test".into(),
            credit_num: 1,
            worker_id: Some("worker-0".into()),
            should_cancel: false,
            cancel_after_ns: None,
        }
    }

    #[tokio::test]
    async fn non_streaming_success_captures_text_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"choices":[{"message":{"content":"hi"}}]}"#))
            .mount(&server)
            .await;

        let client = Client::new();
        let clock = Clock::new();
        let record = issue_request(
            &client,
            &clock,
            &endpoint(server.uri(), EndpointType::ChatCompletions),
            serde_json::json!({"model": "gpt-test"}),
            params(),
        )
        .await;

        assert!(record.is_valid());
        assert_eq!(record.status, Some(200));
        assert!(matches!(&record.responses[0], RawResponse::Text(_)));
    }

    #[tokio::test]
    async fn error_status_produces_error_details_not_a_panic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("server exploded"))
            .mount(&server)
            .await;

        let client = Client::new();
        let clock = Clock::new();
        let record = issue_request(
            &client,
            &clock,
            &endpoint(server.uri(), EndpointType::ChatCompletions),
            serde_json::json!({"model": "gpt-test"}),
            params(),
        )
        .await;

        assert!(!record.is_valid());
        assert_eq!(record.status, Some(500));
        assert_eq!(record.error.unwrap().code, Some(500));
    }

    #[tokio::test]
    async fn cancel_after_ns_marks_the_record_cancelled_on_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok").set_delay(Duration::from_millis(200)))
            .mount(&server)
            .await;

        let client = Client::new();
        let clock = Clock::new();
        let mut p = params();
        p.should_cancel = true;
        p.cancel_after_ns = Some(1_000_000); // 1ms, well under the mock's 200ms delay

        let record = issue_request(&client, &clock, &endpoint(server.uri(), EndpointType::ChatCompletions), serde_json::json!({}), p).await;

        assert!(record.cancelled);
        assert!(record.responses.is_empty());
    }
}
