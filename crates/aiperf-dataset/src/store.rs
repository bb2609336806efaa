//! In-memory conversation store served by the dataset manager and consulted
//! directly by workers that share its process (§4.3 step 2: "preferred,
//! in-process map").

use std::collections::HashMap;

use rand::seq::IteratorRandom;

use aiperf_core::model::{Conversation, Turn};

use crate::error::{DatasetError, Result};

#[derive(Debug, Default)]
pub struct DatasetStore {
    conversations: HashMap<String, Conversation>,
    order: Vec<String>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_conversations(conversations: Vec<Conversation>) -> Self {
        let mut store = Self::new();
        for conversation in conversations {
            store.insert(conversation);
        }
        store
    }

    pub fn insert(&mut self, conversation: Conversation) {
        if !self.conversations.contains_key(&conversation.conversation_id) {
            self.order.push(conversation.conversation_id.clone());
        }
        self.conversations.insert(conversation.conversation_id.clone(), conversation);
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn get(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations.get(conversation_id)
    }

    pub fn turn(&self, conversation_id: &str, turn_index: usize) -> Result<&Turn> {
        let conversation = self
            .get(conversation_id)
            .ok_or_else(|| DatasetError::ConversationNotFound(conversation_id.to_string()))?;
        conversation.turn(turn_index).ok_or_else(|| DatasetError::TurnIndexOutOfRange {
            conversation_id: conversation_id.to_string(),
            turn_index,
        })
    }

    /// Picks a conversation uniformly at random, for credits with no
    /// `conversation_id` (§4.3 step 2: "otherwise request a random conversation").
    pub fn random_conversation(&self) -> Result<&Conversation> {
        let mut rng = rand::rng();
        self.order
            .iter()
            .choose(&mut rng)
            .and_then(|id| self.conversations.get(id))
            .ok_or(DatasetError::EmptyDataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiperf_core::model::TurnContent;

    fn conversation(id: &str) -> Conversation {
        Conversation {
            conversation_id: id.to_string(),
            turns: vec![Turn {
                text: TurnContent::single("hi"),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn turn_out_of_range_is_a_named_error() {
        let store = DatasetStore::from_conversations(vec![conversation("a")]);
        let err = store.turn("a", 5).unwrap_err();
        assert!(matches!(err, DatasetError::TurnIndexOutOfRange { .. }));
    }

    #[test]
    fn missing_conversation_is_a_named_error() {
        let store = DatasetStore::new();
        let err = store.turn("missing", 0).unwrap_err();
        assert!(matches!(err, DatasetError::ConversationNotFound(_)));
    }

    #[test]
    fn random_conversation_fails_clearly_on_an_empty_store() {
        let store = DatasetStore::new();
        assert!(matches!(store.random_conversation(), Err(DatasetError::EmptyDataset)));
    }

    #[test]
    fn random_conversation_picks_from_the_loaded_set() {
        let store = DatasetStore::from_conversations(vec![conversation("a"), conversation("b")]);
        let picked = store.random_conversation().unwrap();
        assert!(picked.conversation_id == "a" || picked.conversation_id == "b");
    }
}
