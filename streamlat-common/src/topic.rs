use serde::{Deserialize, Serialize};

/// Stream the sample topics live in.
pub const DEFAULT_STREAM: &str = "/sample-stream";
/// Data and marker messages.
pub const FAST_MESSAGES: &str = "fast-messages";
/// Secondary summary messages.
pub const SUMMARY_MARKERS: &str = "summary-markers";

/// Place `topic` inside `stream` unless it already names its own stream
/// (`/other-stream:topic`), in which case it is returned unchanged.
pub fn qualify(stream: &str, topic: &str) -> String {
    if topic.contains(':') {
        topic.to_string()
    } else {
        format!("{stream}:{topic}")
    }
}

/// The pair of fully qualified topics the producer writes and the consumer reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topics {
    pub fast: String,
    pub summary: String,
}

impl Topics {
    pub fn in_stream(stream: &str) -> Self {
        Self {
            fast: qualify(stream, FAST_MESSAGES),
            summary: qualify(stream, SUMMARY_MARKERS),
        }
    }

    /// Both topics, in subscription order.
    pub fn all(&self) -> Vec<String> {
        vec![self.fast.clone(), self.summary.clone()]
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::in_stream(DEFAULT_STREAM)
    }
}
