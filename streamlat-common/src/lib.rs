use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod logging;
pub mod message;
pub mod settings;
pub mod time;
pub mod topic;

pub use message::{Message, MessageKind};
pub use settings::{ConsumerSettings, OffsetReset, ProducerSettings};
pub use time::{Clock, EpochMillis, ManualClock, SystemClock};
pub use topic::Topics;

/// How long a single consumer poll waits for a record before reporting a timeout.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// Error types for StreamLat operations
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP {0}: {1}")]
    HttpError(u16, String),

    #[error("Broker error {code}: {message}")]
    Broker { code: i32, message: String },

    #[error("End of partition: {topic} [{partition}] at offset {offset}")]
    PartitionEof {
        topic: String,
        partition: i32,
        offset: i64,
    },

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Message is missing required field `{0}`")]
    MissingField(String),

    #[error("Consumer instance is closed")]
    ConsumerClosed,

    #[error("Histogram error: {0}")]
    Histogram(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StreamError {
    /// `true` for the broker's "nothing more on this partition right now" signal.
    pub fn is_partition_eof(&self) -> bool {
        matches!(self, StreamError::PartitionEof { .. })
    }

    /// Network error whose text carries `err` and every cause beneath it.
    pub fn network(err: &dyn std::error::Error) -> Self {
        StreamError::NetworkError(error_chain(err))
    }
}

/// `err` followed by each of its `source()` causes, joined with ": ".
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// JSON error envelope returned by the broker's REST gateway.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: i32,
    pub message: String,
}

/// Result type for StreamLat operations
pub type Result<T> = std::result::Result<T, StreamError>;
