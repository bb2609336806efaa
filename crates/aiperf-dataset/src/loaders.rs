//! Parsers for the four input dataset formats (§6).
//!
//! Every loader reads one conversation (or trace entry) per line and folds
//! it into the shared `aiperf_core::model::{Conversation, Turn}` shape so the
//! rest of the crate never branches on source format again.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use aiperf_core::model::{Conversation, Turn, TurnContent};

use crate::error::{DatasetError, Result};

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })?;
    std::io::BufReader::new(file)
        .lines()
        .map(|l| {
            l.map_err(|source| DatasetError::Io {
                path: path.display().to_string(),
                source,
            })
        })
        .collect()
}

fn content(values: Vec<String>) -> TurnContent {
    TurnContent { contents: values }
}

/// One conversation per line: `{"text"|"image"|"audio", "timestamp"?, "delay"?}`.
/// `text`/`image`/`audio` accept either a bare string or a list of strings.
#[derive(Debug, Deserialize)]
struct SingleTurnLine {
    #[serde(default)]
    text: Option<Value>,
    #[serde(default)]
    image: Option<Value>,
    #[serde(default)]
    audio: Option<Value>,
    timestamp: Option<i64>,
    delay: Option<i64>,
}

fn as_string_list(value: Option<Value>) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(Value::String(s)) => vec![s],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(_) => Vec::new(),
    }
}

pub fn load_single_turn(path: &Path) -> Result<Vec<Conversation>> {
    let mut conversations = Vec::new();
    for (idx, line) in read_lines(path)?.into_iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: SingleTurnLine = serde_json::from_str(&line).map_err(|e| DatasetError::Parse {
            path: path.display().to_string(),
            line_no: idx + 1,
            message: e.to_string(),
        })?;
        let turn = Turn {
            text: content(as_string_list(parsed.text)),
            image: content(as_string_list(parsed.image)),
            audio: content(as_string_list(parsed.audio)),
            role: None,
            timestamp_ms: parsed.timestamp,
            delay_ms: parsed.delay,
            max_tokens: None,
            model: None,
        };
        conversations.push(Conversation {
            conversation_id: format!("single-turn-{idx}"),
            turns: vec![turn],
        });
    }
    Ok(conversations)
}

/// One conversation per line: `{"session_id", "turns":[{...}, ...]}`.
/// Lines sharing a `session_id` contribute turns to the same conversation,
/// in file order.
#[derive(Debug, Deserialize)]
struct MultiTurnLine {
    session_id: String,
    turns: Vec<MultiTurnTurn>,
}

#[derive(Debug, Deserialize)]
struct MultiTurnTurn {
    #[serde(default)]
    text: Option<Value>,
    #[serde(default)]
    image: Option<Value>,
    #[serde(default)]
    audio: Option<Value>,
    role: Option<String>,
    timestamp: Option<i64>,
    delay: Option<i64>,
    max_tokens: Option<u32>,
    model: Option<String>,
}

pub fn load_multi_turn(path: &Path) -> Result<Vec<Conversation>> {
    let mut by_session: HashMap<String, Vec<Turn>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (idx, line) in read_lines(path)?.into_iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: MultiTurnLine = serde_json::from_str(&line).map_err(|e| DatasetError::Parse {
            path: path.display().to_string(),
            line_no: idx + 1,
            message: e.to_string(),
        })?;
        let turns = parsed.turns.into_iter().map(|t| Turn {
            text: content(as_string_list(t.text)),
            image: content(as_string_list(t.image)),
            audio: content(as_string_list(t.audio)),
            role: t.role,
            timestamp_ms: t.timestamp,
            delay_ms: t.delay,
            max_tokens: t.max_tokens,
            model: t.model,
        });
        let entry = by_session.entry(parsed.session_id.clone()).or_insert_with(|| {
            order.push(parsed.session_id.clone());
            Vec::new()
        });
        entry.extend(turns);
    }

    Ok(order
        .into_iter()
        .map(|session_id| {
            let turns = by_session.remove(&session_id).unwrap_or_default();
            Conversation { conversation_id: session_id, turns }
        })
        .collect())
}

/// Fixed-schedule replay trace: `{"input_length","output_length","hash_ids", "timestamp"? xor ("session_id"+"delay")?}`.
#[derive(Debug, Deserialize)]
struct TraceLine {
    input_length: u64,
    output_length: u64,
    hash_ids: Vec<u64>,
    timestamp: Option<i64>,
    session_id: Option<String>,
    delay: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub conversation_id: String,
    pub input_length: u64,
    pub output_length: u64,
    pub hash_ids: Vec<u64>,
    pub timestamp_ms: Option<i64>,
    pub session_id: Option<String>,
    pub delay_ms: Option<i64>,
}

pub fn load_trace(path: &Path) -> Result<Vec<TraceEntry>> {
    let mut entries = Vec::new();
    for (idx, line) in read_lines(path)?.into_iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: TraceLine = serde_json::from_str(&line).map_err(|e| DatasetError::Parse {
            path: path.display().to_string(),
            line_no: idx + 1,
            message: e.to_string(),
        })?;
        if parsed.timestamp.is_some() && (parsed.session_id.is_some() || parsed.delay.is_some()) {
            return Err(DatasetError::ConflictingScheduleFields);
        }
        entries.push(TraceEntry {
            conversation_id: parsed.session_id.clone().unwrap_or_else(|| format!("trace-{idx}")),
            input_length: parsed.input_length,
            output_length: parsed.output_length,
            hash_ids: parsed.hash_ids,
            timestamp_ms: parsed.timestamp,
            session_id: parsed.session_id,
            delay_ms: parsed.delay,
        });
    }
    Ok(entries)
}

/// Random-pool JSONL: a list of prompt/media pools sampled at request time.
#[derive(Debug, Deserialize)]
struct RandomPoolLine {
    #[serde(default)]
    text: Option<Value>,
    #[serde(default)]
    image: Option<Value>,
    #[serde(default)]
    audio: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct RandomPool {
    pub text: Vec<String>,
    pub image: Vec<String>,
    pub audio: Vec<String>,
}

pub fn load_random_pool(path: &Path) -> Result<RandomPool> {
    let mut pool = RandomPool::default();
    for (idx, line) in read_lines(path)?.into_iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: RandomPoolLine = serde_json::from_str(&line).map_err(|e| DatasetError::Parse {
            path: path.display().to_string(),
            line_no: idx + 1,
            message: e.to_string(),
        })?;
        pool.text.extend(as_string_list(parsed.text));
        pool.image.extend(as_string_list(parsed.image));
        pool.audio.extend(as_string_list(parsed.audio));
    }
    Ok(pool)
}
