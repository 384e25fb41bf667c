//! Pub/sub client capability used by the producer and the consumer.
//!
//! Two transports implement [`Producer`] and [`Consumer`]:
//! [`rest`] talks to a stream gateway speaking the Kafka REST Proxy v2
//! dialect, and [`memory`] is an in-process broker for tests and demos.

use std::time::Duration;
use streamlat_common::Result;

pub mod memory;
pub mod rest;

pub use memory::{MemoryBroker, MemoryConsumer, MemoryProducer};
pub use rest::{RestConsumer, RestProducer};

/// A record handed out by [`Consumer::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Stream-qualified topic, e.g. `/sample-stream:fast-messages`.
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

#[allow(async_fn_in_trait)]
pub trait Producer {
    /// Queue `payload` for `topic`. Bare topic names go to the producer's
    /// default stream; a stream-qualified name overrides it for this call.
    /// May send immediately once the batch is full.
    async fn produce(&mut self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Block until every queued record has been acknowledged or has failed.
    async fn flush(&mut self) -> Result<()>;
}

#[allow(async_fn_in_trait)]
pub trait Consumer {
    async fn subscribe(&mut self, topics: &[String]) -> Result<()>;

    /// Wait up to `timeout` for the next record.
    ///
    /// `Ok(None)` means the wait timed out. Broker-side conditions, including
    /// the benign `StreamError::PartitionEof`, come back as `Err`.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Record>>;

    async fn close(&mut self) -> Result<()>;
}

/// Records queued by a producer, grouped for sending.
#[derive(Debug)]
pub struct PendingBatch {
    records: Vec<(String, Vec<u8>)>,
    capacity: usize,
}

impl PendingBatch {
    pub fn new(capacity: usize) -> Self {
        Self { records: Vec::new(), capacity: capacity.max(1) }
    }

    /// Queue one record; returns `true` once the batch has reached capacity.
    pub fn push(&mut self, topic: String, payload: Vec<u8>) -> bool {
        self.records.push((topic, payload));
        self.records.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Empty the batch, grouping payloads by topic. Topics keep first-seen
    /// order and payloads keep queue order within a topic.
    pub fn drain_by_topic(&mut self) -> Vec<(String, Vec<Vec<u8>>)> {
        let mut grouped: Vec<(String, Vec<Vec<u8>>)> = Vec::new();
        for (topic, payload) in self.records.drain(..) {
            match grouped.iter_mut().find(|(t, _)| *t == topic) {
                Some((_, payloads)) => payloads.push(payload),
                None => grouped.push((topic, vec![payload])),
            }
        }
        grouped
    }
}
