//! Loads the run's dataset once and serves conversation/turn lookups to
//! worker subprocesses over `DATASET_ENDPOINT` (§4.1, §4.3 step 2).
//!
//! A worker sharing a process with the dataset (the in-process integration
//! harness) can skip the bus round trip entirely via
//! `aiperf_dataset::DatasetClient::with_local_store`; a worker subprocess
//! always goes through this REQ/REP server.

use rand::seq::IndexedRandom;

use aiperf_bus::channels::DATASET_ENDPOINT;
use aiperf_bus::message::Message;
use aiperf_bus::BusClient;
use aiperf_core::model::{Conversation, Turn, TurnContent};
use aiperf_dataset::{load_multi_turn, load_random_pool, load_single_turn, load_trace, DatasetStore};

use crate::config::{DatasetFormat, DatasetSource};
use crate::error::Result;

/// How many synthetic conversations to materialize for a random-pool
/// dataset. The format names per-request sampling (§6); pre-sampling this
/// many distinct conversations up front approximates that without requiring
/// the store to support unbounded stochastic lookups.
const RANDOM_POOL_SAMPLE_SIZE: usize = 2000;

pub fn load_store(source: &DatasetSource) -> Result<DatasetStore> {
    let conversations = match source.format {
        DatasetFormat::SingleTurn => load_single_turn(&source.path)?,
        DatasetFormat::MultiTurn => load_multi_turn(&source.path)?,
        DatasetFormat::Trace => trace_conversations(source)?,
        DatasetFormat::RandomPool => random_pool_conversations(source)?,
    };
    Ok(DatasetStore::from_conversations(conversations))
}

fn trace_conversations(source: &DatasetSource) -> Result<Vec<Conversation>> {
    let entries = load_trace(&source.path)?;
    Ok(entries
        .into_iter()
        .map(|entry| Conversation {
            conversation_id: entry.conversation_id,
            turns: vec![Turn {
                text: TurnContent::single("lorem ".repeat(entry.input_length.max(1) as usize)),
                max_tokens: Some(entry.output_length as u32),
                ..Default::default()
            }],
        })
        .collect())
}

fn random_pool_conversations(source: &DatasetSource) -> Result<Vec<Conversation>> {
    let pool = load_random_pool(&source.path)?;
    let mut rng = rand::rng();
    let conversations = (0..RANDOM_POOL_SAMPLE_SIZE)
        .map(|idx| Conversation {
            conversation_id: format!("random-{idx}"),
            turns: vec![Turn {
                text: pool.text.choose(&mut rng).map(|s| TurnContent::single(s.clone())).unwrap_or_default(),
                image: pool.image.choose(&mut rng).map(|s| TurnContent::single(s.clone())).unwrap_or_default(),
                audio: pool.audio.choose(&mut rng).map(|s| TurnContent::single(s.clone())).unwrap_or_default(),
                ..Default::default()
            }],
        })
        .collect();
    Ok(conversations)
}

/// Runs until the bus is dropped, answering `ConversationRequest` and
/// `ConversationTurnRequest` against `store`.
pub async fn serve(bus: BusClient, store: DatasetStore) {
    let mut requests = bus.serve(DATASET_ENDPOINT);
    while let Some((message, reply)) = requests.recv().await {
        let response = match message {
            Message::ConversationRequest { request_ns, request_id, .. } => {
                Message::ConversationResponse {
                    service_id: bus.service_id().to_string(),
                    request_ns,
                    request_id,
                    conversation: store.random_conversation().ok().cloned(),
                }
            }
            Message::ConversationTurnRequest { request_ns, request_id, conversation_id, turn_index, .. } => {
                let turn_json = store
                    .turn(&conversation_id, turn_index)
                    .ok()
                    .and_then(|turn| serde_json::to_string(turn).ok());
                Message::ConversationTurnResponse {
                    service_id: bus.service_id().to_string(),
                    request_ns,
                    request_id,
                    turn_json,
                }
            }
            _ => continue,
        };
        let _ = reply.send(response);
    }
}
