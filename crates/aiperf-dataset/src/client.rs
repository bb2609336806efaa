//! Worker-side conversation lookup (§4.3 step 2): prefer an in-process
//! `DatasetStore`, otherwise fall back to req/rep against the dataset
//! manager over the bus.

use std::sync::Arc;

use aiperf_bus::channels::DATASET_ENDPOINT;
use aiperf_bus::message::Message;
use aiperf_bus::BusClient;
use aiperf_core::model::{Conversation, Turn};

use crate::error::{DatasetError, Result};
use crate::store::DatasetStore;

pub struct DatasetClient {
    bus: BusClient,
    local: Option<Arc<DatasetStore>>,
}

impl DatasetClient {
    /// A worker sharing a process with the dataset manager gets a direct
    /// reference and skips the bus round-trip entirely.
    pub fn with_local_store(bus: BusClient, store: Arc<DatasetStore>) -> Self {
        Self { bus, local: Some(store) }
    }

    /// A worker running as its own subprocess only has the bus.
    pub fn remote(bus: BusClient) -> Self {
        Self { bus, local: None }
    }

    pub async fn turn(&self, conversation_id: &str, turn_index: usize, request_id: String) -> Result<Turn> {
        if let Some(store) = &self.local {
            return store.turn(conversation_id, turn_index).map(Clone::clone);
        }

        let reply = self
            .bus
            .request(
                DATASET_ENDPOINT,
                Message::ConversationTurnRequest {
                    service_id: self.bus.service_id().to_string(),
                    request_ns: 0,
                    request_id,
                    conversation_id: conversation_id.to_string(),
                    turn_index,
                },
            )
            .await?;

        match reply {
            Message::ConversationTurnResponse { turn_json: Some(json), .. } => {
                Ok(serde_json::from_str(&json)?)
            }
            Message::ConversationTurnResponse { turn_json: None, .. } => {
                Err(DatasetError::TurnIndexOutOfRange { conversation_id: conversation_id.to_string(), turn_index })
            }
            _ => Err(DatasetError::ConversationNotFound(conversation_id.to_string())),
        }
    }

    pub async fn random_conversation(&self, request_id: String) -> Result<Conversation> {
        if let Some(store) = &self.local {
            return store.random_conversation().map(Clone::clone);
        }

        let reply = self
            .bus
            .request(
                DATASET_ENDPOINT,
                Message::ConversationRequest {
                    service_id: self.bus.service_id().to_string(),
                    request_ns: 0,
                    request_id,
                    conversation_id: None,
                },
            )
            .await?;

        match reply {
            Message::ConversationResponse { conversation: Some(conversation), .. } => Ok(conversation),
            _ => Err(DatasetError::EmptyDataset),
        }
    }
}
