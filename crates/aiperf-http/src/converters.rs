//! Endpoint-specific request converters (§4.5): turn a [`Turn`] into the
//! JSON payload a given OpenAI-compatible endpoint expects.

use aiperf_core::model::Turn;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::error::{HttpError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointType {
    ChatCompletions,
    Completions,
    Embeddings,
    Responses,
}

impl EndpointType {
    pub fn path(&self) -> &'static str {
        match self {
            EndpointType::ChatCompletions => "/chat/completions",
            EndpointType::Completions => "/completions",
            EndpointType::Embeddings => "/embeddings",
            EndpointType::Responses => "/responses",
        }
    }

    /// Whether responses from this endpoint type carry token-bearing text
    /// (embeddings return vectors, never tokens).
    pub fn produces_tokens(&self) -> bool {
        !matches!(self, EndpointType::Embeddings)
    }
}

/// Static per-run endpoint configuration, built once at `ProfileConfigure`.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
    pub endpoint_type: EndpointType,
    pub streaming: bool,
    pub api_key: Option<String>,
    pub extra_headers: HashMap<String, String>,
    pub extra: Map<String, Value>,
}

impl EndpointConfig {
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.endpoint_type.path())
    }
}

/// Build the JSON request body for `turn` against `endpoint`, merging
/// `endpoint.extra` over the generated fields and setting `stream` from
/// `endpoint.streaming` uniformly across endpoint types.
pub fn build_payload(endpoint: &EndpointConfig, turn: &Turn) -> Result<Value> {
    let model = turn.model.clone().unwrap_or_default();
    let mut payload = match endpoint.endpoint_type {
        EndpointType::ChatCompletions => chat_completions_payload(&model, turn)?,
        EndpointType::Completions => completions_payload(&model, turn),
        EndpointType::Embeddings => embeddings_payload(&model, turn),
        EndpointType::Responses => responses_payload(&model, turn),
    };
    payload["stream"] = json!(endpoint.streaming);

    let Value::Object(map) = &mut payload else {
        unreachable!("payload builders always return an object");
    };
    for (key, value) in &endpoint.extra {
        map.insert(key.clone(), value.clone());
    }
    Ok(payload)
}

fn chat_completions_payload(model: &str, turn: &Turn) -> Result<Value> {
    let mut content = Vec::new();
    for text in &turn.text.contents {
        content.push(json!({"type": "text", "text": text}));
    }
    for image in &turn.image.contents {
        content.push(json!({"type": "image_url", "image_url": {"url": image}}));
    }
    for audio in &turn.audio.contents {
        let Some((format, b64_audio)) = audio.split_once(',') else {
            return Err(HttpError::Payload(format!(
                "audio content item has no comma separating format from data: {audio:?}"
            )));
        };
        content.push(json!({"type": "input_audio", "input_audio": {"data": b64_audio, "format": format}}));
    }

    let mut message = Map::new();
    message.insert("role".to_string(), json!("user"));
    message.insert("content".to_string(), json!(content));

    let mut payload = Map::new();
    payload.insert("model".to_string(), json!(model));
    payload.insert("messages".to_string(), json!([Value::Object(message)]));
    if let Some(max_tokens) = turn.max_tokens {
        payload.insert("max_completion_tokens".to_string(), json!(max_tokens));
    }
    Ok(Value::Object(payload))
}

fn completions_payload(model: &str, turn: &Turn) -> Value {
    let prompt = turn.text.contents.join("\n");
    json!({
        "model": model,
        "prompt": prompt,
    })
}

fn embeddings_payload(model: &str, turn: &Turn) -> Value {
    json!({
        "model": model,
        "input": turn.text.contents,
        "dimensions": 1536,
        "encoding_format": "float",
        "user": "",
    })
}

fn responses_payload(model: &str, turn: &Turn) -> Value {
    json!({
        "model": model,
        "input": turn.text.contents.join("\n"),
        "max_output_tokens": 1000,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(endpoint_type: EndpointType, streaming: bool) -> EndpointConfig {
        EndpointConfig {
            base_url: "https://api.example.com/v1".into(),
            endpoint_type,
            streaming,
            api_key: None,
            extra_headers: HashMap::new(),
            extra: Map::new(),
        }
    }

    fn text_turn(text: &str) -> Turn {
        Turn {
            text: aiperf_core::model::TurnContent::single(text),
            model: Some("gpt-test".into()),
            ..Default::default()
        }
    }

    #[test]
    fn chat_completions_assembles_a_single_user_message() {
        let payload = build_payload(&endpoint(EndpointType::ChatCompletions, true), &text_turn("hi")).unwrap();
        assert_eq!(payload["messages"][0]["role"], "user");
        assert_eq!(payload["messages"][0]["content"][0]["text"], "hi");
        assert_eq!(payload["stream"], true);
    }

    #[test]
    fn chat_completions_uses_max_completion_tokens_not_max_tokens() {
        let mut turn = text_turn("hi");
        turn.max_tokens = Some(128);
        let payload = build_payload(&endpoint(EndpointType::ChatCompletions, false), &turn).unwrap();
        assert_eq!(payload["max_completion_tokens"], 128);
        assert!(payload.get("max_tokens").is_none());
    }

    #[test]
    fn audio_content_without_a_comma_is_rejected() {
        let mut turn = text_turn("hi");
        turn.audio = aiperf_core::model::TurnContent::single("not-a-valid-audio-string");
        let err = build_payload(&endpoint(EndpointType::ChatCompletions, false), &turn).unwrap_err();
        assert!(matches!(err, HttpError::Payload(_)));
    }

    #[test]
    fn audio_content_splits_format_and_data_at_first_comma() {
        let mut turn = text_turn("hi");
        turn.audio = aiperf_core::model::TurnContent::single("wav,dGVzdA==");
        let payload = build_payload(&endpoint(EndpointType::ChatCompletions, false), &turn).unwrap();
        let content = &payload["messages"][0]["content"];
        let audio_item = content.as_array().unwrap().iter().find(|c| c["type"] == "input_audio").unwrap();
        assert_eq!(audio_item["input_audio"]["format"], "wav");
        assert_eq!(audio_item["input_audio"]["data"], "dGVzdA==");
    }

    #[test]
    fn embeddings_payload_has_defaults() {
        let payload = build_payload(&endpoint(EndpointType::Embeddings, false), &text_turn("hi")).unwrap();
        assert_eq!(payload["dimensions"], 1536);
        assert_eq!(payload["encoding_format"], "float");
    }

    #[test]
    fn responses_payload_defaults_max_output_tokens() {
        let payload = build_payload(&endpoint(EndpointType::Responses, false), &text_turn("hi")).unwrap();
        assert_eq!(payload["max_output_tokens"], 1000);
    }

    #[test]
    fn extra_fields_override_generated_fields() {
        let mut endpoint = endpoint(EndpointType::ChatCompletions, false);
        endpoint.extra.insert("temperature".to_string(), json!(0.2));
        endpoint.extra.insert("stream".to_string(), json!(true));
        let payload = build_payload(&endpoint, &text_turn("hi")).unwrap();
        assert_eq!(payload["temperature"], 0.2);
        assert_eq!(payload["stream"], true);
    }
}
