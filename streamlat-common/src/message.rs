//! Wire model for the JSON messages exchanged between producer and consumer.
//!
//! ```json
//! {"type": "test", "t": 1503.123, "k": 0}
//! ```
//!
//! `t` is seconds since the epoch with millisecond precision; it is carried
//! in memory as [`EpochMillis`]. Older producers quoted `t`, so a numeric
//! string is accepted on decode.

use serde::{Deserialize, Serialize};

use crate::time::EpochMillis;
use crate::{Result, StreamError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Test,
    Marker,
    Other,
    /// Any `type` this build does not know, kept verbatim. A missing `type` is `Unknown("")`.
    Unknown(String),
}

impl MessageKind {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "test" => MessageKind::Test,
            "marker" => MessageKind::Marker,
            "other" => MessageKind::Other,
            _ => MessageKind::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Test => "test",
            MessageKind::Marker => "marker",
            MessageKind::Other => "other",
            MessageKind::Unknown(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub sent_at: Option<EpochMillis>,
    pub seq: Option<i64>,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    t: Option<WireTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    k: Option<i64>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireTime {
    Secs(f64),
    Text(String),
}

impl Message {
    pub fn new(kind: MessageKind, seq: i64, sent_at: EpochMillis) -> Self {
        Self { kind, sent_at: Some(sent_at), seq: Some(seq) }
    }

    pub fn test(seq: i64, sent_at: EpochMillis) -> Self {
        Self::new(MessageKind::Test, seq, sent_at)
    }

    pub fn marker(seq: i64, sent_at: EpochMillis) -> Self {
        Self::new(MessageKind::Marker, seq, sent_at)
    }

    pub fn other(seq: i64, sent_at: EpochMillis) -> Self {
        Self::new(MessageKind::Other, seq, sent_at)
    }

    /// Serialize to UTF-8 JSON bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let wire = WireMessage {
            kind: Some(self.kind.as_str().to_string()),
            t: self.sent_at.map(|at| WireTime::Secs(at.as_secs_f64())),
            k: self.seq,
        };
        serde_json::to_vec(&wire).map_err(|e| StreamError::MalformedMessage(e.to_string()))
    }

    /// Parse UTF-8 JSON bytes. Fails with `MalformedMessage` on anything that is
    /// not a JSON object of the expected shape.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let wire: WireMessage = serde_json::from_slice(payload)
            .map_err(|e| StreamError::MalformedMessage(e.to_string()))?;

        let sent_at = match wire.t {
            None => None,
            Some(WireTime::Secs(secs)) => Some(secs_to_millis(secs)?),
            Some(WireTime::Text(text)) => {
                let secs = text.trim().parse::<f64>().map_err(|_| {
                    StreamError::MalformedMessage(format!("`t` is not a number: {text:?}"))
                })?;
                Some(secs_to_millis(secs)?)
            }
        };

        Ok(Message {
            kind: MessageKind::from_wire(wire.kind.as_deref().unwrap_or("")),
            sent_at,
            seq: wire.k,
        })
    }
}

fn secs_to_millis(secs: f64) -> Result<EpochMillis> {
    EpochMillis::from_secs_f64(secs)
        .ok_or_else(|| StreamError::MalformedMessage(format!("`t` is not finite: {secs}")))
}
