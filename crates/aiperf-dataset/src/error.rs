//! Dataset loading and lookup error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed dataset line {line_no} in {path}: {message}")]
    Parse {
        path: String,
        line_no: usize,
        message: String,
    },

    #[error("trace record cannot set timestamp together with session_id or delay")]
    ConflictingScheduleFields,

    #[error("conversation {0} not found")]
    ConversationNotFound(String),

    #[error("turn index {turn_index} out of range for conversation {conversation_id}")]
    TurnIndexOutOfRange { conversation_id: String, turn_index: usize },

    #[error("dataset is empty, cannot select a random conversation")]
    EmptyDataset,

    #[error("bus error: {0}")]
    Bus(#[from] aiperf_core::Error),

    #[error("turn decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DatasetError>;

impl From<DatasetError> for aiperf_core::Error {
    fn from(err: DatasetError) -> Self {
        match err {
            DatasetError::Bus(e) => e,
            DatasetError::Io { .. } | DatasetError::Parse { .. } | DatasetError::ConflictingScheduleFields => {
                aiperf_core::Error::DatasetInit(err.to_string())
            }
            DatasetError::Decode(e) => aiperf_core::Error::Serialization(e),
            other => aiperf_core::Error::DatasetConfig(other.to_string()),
        }
    }
}
