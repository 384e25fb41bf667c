use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::topic::DEFAULT_STREAM;
use crate::{Result, StreamError};

/// Where a new consumer group starts reading when it has no committed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    Earliest,
    Latest,
}

impl OffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }
}

/// Consumer group configuration handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerSettings {
    pub group_id: String,
    pub offset_reset: OffsetReset,
    pub auto_commit_interval_ms: u64,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            group_id: "mygroup".to_string(),
            offset_reset: OffsetReset::Earliest,
            auto_commit_interval_ms: 500,
        }
    }
}

impl ConsumerSettings {
    /// Read settings from a JSON file; absent fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StreamError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| StreamError::Config(format!("{}: {e}", path.display())))
    }
}

/// Producer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerSettings {
    /// Stream that unqualified topic names are written to.
    pub default_stream: String,
    /// Records buffered before the producer sends without an explicit flush.
    pub batch_size: usize,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            default_stream: DEFAULT_STREAM.to_string(),
            batch_size: 100,
        }
    }
}
