//! OpenAI response extractor (§4.5).
//!
//! Converts the raw responses captured on a [`RequestRecord`] into a list of
//! [`ParsedResponse`] plus whatever token counts the endpoint reported. The
//! raw SSE message bodies here are JSON-encoded [`SseFrame`]s produced by
//! [`crate::sse::SseReader`]; a non-streaming [`RawResponse::Text`] body is
//! the endpoint's whole JSON response with no frame timestamps of its own, so
//! its single [`ParsedResponse`] is stamped with `recv_start_perf_ns` (first
//! byte of the body) when the client captured one, falling back to
//! `end_perf_ns`.

use aiperf_core::model::{RawResponse, RequestRecord, ResponseData};
use serde_json::Value;

use crate::error::{ParseError, Result};
use crate::sse::SseFrame;

const DONE_SENTINEL: &str = "[DONE]";

/// Parsed responses plus token accounting pulled from `usage` fields.
#[derive(Debug, Clone, Default)]
pub struct ExtractedRecord {
    pub responses: Vec<aiperf_core::model::ParsedResponse>,
    pub input_token_count: Option<u64>,
    pub output_token_count: Option<u64>,
    pub reasoning_token_count: Option<u64>,
}

pub fn extract(record: &RequestRecord) -> Result<ExtractedRecord> {
    let mut out = ExtractedRecord::default();
    for raw in &record.responses {
        match raw {
            RawResponse::Text(body) => extract_non_streaming(body, record, &mut out)?,
            RawResponse::SseMessages(frames) => {
                for encoded in frames {
                    extract_sse_frame(encoded, &mut out)?;
                }
            }
        }
    }
    Ok(out)
}

fn extract_non_streaming(body: &str, record: &RequestRecord, out: &mut ExtractedRecord) -> Result<()> {
    let value: Value = serde_json::from_str(body)?;
    apply_usage(&value, out);
    let perf_ns = record.recv_start_perf_ns.unwrap_or(record.end_perf_ns);

    if let Some(data) = &value.get("data").and_then(|d| d.as_array()) {
        // Embeddings response: {"data": [{"embedding": [...]}], ...}
        for item in data.iter() {
            if let Some(embedding) = item.get("embedding").and_then(|e| e.as_array()) {
                let values: Vec<f32> = embedding.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect();
                out.responses.push(aiperf_core::model::ParsedResponse {
                    perf_ns,
                    data: ResponseData::Embedding(values),
                });
            }
        }
        if !out.responses.is_empty() {
            return Ok(());
        }
    }

    let choice = value
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first());
    let Some(choice) = choice else {
        return Err(ParseError::Payload("non-streaming response has no choices".into()));
    };

    let text = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .or_else(|| choice.get("text").and_then(|t| t.as_str()));
    let reasoning = choice
        .get("message")
        .and_then(|m| m.get("reasoning_content"))
        .and_then(|r| r.as_str());

    let data = match (text, reasoning) {
        (Some(text), Some(reasoning)) => ResponseData::Reasoning {
            content: text.to_string(),
            reasoning: reasoning.to_string(),
        },
        (Some(text), None) => ResponseData::Text(text.to_string()),
        (None, Some(reasoning)) => ResponseData::Reasoning {
            content: String::new(),
            reasoning: reasoning.to_string(),
        },
        (None, None) => ResponseData::MetricsOnly,
    };
    out.responses.push(aiperf_core::model::ParsedResponse { perf_ns, data });
    Ok(())
}

fn extract_sse_frame(encoded: &str, out: &mut ExtractedRecord) -> Result<()> {
    let frame: SseFrame = serde_json::from_str(encoded)?;
    if frame.data.trim() == DONE_SENTINEL {
        return Ok(());
    }
    let value: Value = serde_json::from_str(&frame.data)?;
    apply_usage(&value, out);

    let data = chunk_data(&value);
    out.responses.push(aiperf_core::model::ParsedResponse {
        perf_ns: frame.last_byte_perf_ns,
        data,
    });
    Ok(())
}

fn chunk_data(value: &Value) -> ResponseData {
    let choice = value.get("choices").and_then(|c| c.as_array()).and_then(|c| c.first());
    let Some(choice) = choice else {
        return ResponseData::MetricsOnly;
    };
    let delta = choice.get("delta");
    let content = delta
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .or_else(|| choice.get("text").and_then(|t| t.as_str()));
    let reasoning = delta.and_then(|d| d.get("reasoning_content")).and_then(|r| r.as_str());

    match (content, reasoning) {
        (Some(content), Some(reasoning)) if !reasoning.is_empty() => ResponseData::Reasoning {
            content: content.to_string(),
            reasoning: reasoning.to_string(),
        },
        (Some(content), _) if !content.is_empty() => ResponseData::Text(content.to_string()),
        (_, Some(reasoning)) if !reasoning.is_empty() => ResponseData::Reasoning {
            content: String::new(),
            reasoning: reasoning.to_string(),
        },
        _ => ResponseData::MetricsOnly,
    }
}

fn apply_usage(value: &Value, out: &mut ExtractedRecord) {
    let Some(usage) = value.get("usage") else { return };
    if let Some(prompt) = usage.get("prompt_tokens").and_then(|v| v.as_u64()) {
        out.input_token_count = Some(prompt);
    }
    if let Some(completion) = usage.get("completion_tokens").and_then(|v| v.as_u64()) {
        out.output_token_count = Some(completion);
    }
    if let Some(reasoning) = usage
        .get("completion_tokens_details")
        .and_then(|d| d.get("reasoning_tokens"))
        .and_then(|v| v.as_u64())
    {
        out.reasoning_token_count = Some(reasoning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_record(responses: Vec<RawResponse>) -> RequestRecord {
        RequestRecord {
            conversation_id: "c".into(),
            turn_index: 0,
            model_name: "m".into(),
            start_perf_ns: 0,
            end_perf_ns: 100,
            recv_start_perf_ns: Some(10),
            status: Some(200),
            responses,
            error: None,
            delayed: false,
            cancelled: false,
            worker_id: None,
            credit_num: 0,
        }
    }

    fn frame(data: &str, ns: i64) -> String {
        serde_json::to_string(&SseFrame {
            first_byte_perf_ns: ns,
            last_byte_perf_ns: ns,
            data: data.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn non_streaming_chat_completion_extracts_message_content() {
        let body = r#"{"choices":[{"message":{"content":"hi there"}}],"usage":{"prompt_tokens":3,"completion_tokens":2}}"#;
        let record = empty_record(vec![RawResponse::Text(body.into())]);
        let extracted = extract(&record).unwrap();
        assert_eq!(extracted.responses.len(), 1);
        assert!(matches!(&extracted.responses[0].data, ResponseData::Text(t) if t == "hi there"));
        assert_eq!(extracted.input_token_count, Some(3));
        assert_eq!(extracted.output_token_count, Some(2));
    }

    #[test]
    fn streaming_chunks_extract_delta_content_in_order() {
        let chunk1 = frame(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#, 11);
        let chunk2 = frame(r#"{"choices":[{"delta":{"content":"lo"}}]}"#, 12);
        let done = frame(DONE_SENTINEL, 13);
        let record = empty_record(vec![RawResponse::SseMessages(vec![chunk1, chunk2, done])]);
        let extracted = extract(&record).unwrap();
        assert_eq!(extracted.responses.len(), 2);
        assert!(matches!(&extracted.responses[0].data, ResponseData::Text(t) if t == "Hel"));
        assert_eq!(extracted.responses[1].perf_ns, 12);
    }

    #[test]
    fn reasoning_delta_populates_reasoning_variant() {
        let chunk = frame(r#"{"choices":[{"delta":{"reasoning_content":"thinking..."}}]}"#, 5);
        let record = empty_record(vec![RawResponse::SseMessages(vec![chunk])]);
        let extracted = extract(&record).unwrap();
        assert!(matches!(&extracted.responses[0].data, ResponseData::Reasoning { reasoning, .. } if reasoning == "thinking..."));
    }

    #[test]
    fn usage_only_trailing_chunk_is_metrics_only() {
        let chunk = frame(r#"{"choices":[],"usage":{"prompt_tokens":5,"completion_tokens":7}}"#, 20);
        let record = empty_record(vec![RawResponse::SseMessages(vec![chunk])]);
        let extracted = extract(&record).unwrap();
        assert!(matches!(&extracted.responses[0].data, ResponseData::MetricsOnly));
        assert_eq!(extracted.output_token_count, Some(7));
    }

    #[test]
    fn missing_choices_on_non_streaming_is_an_error() {
        let record = empty_record(vec![RawResponse::Text("{}".into())]);
        assert!(extract(&record).is_err());
    }
}
