//! In-process broker: one partition per topic, shared by every producer and
//! consumer created from the same [`MemoryBroker`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use streamlat_common::topic::qualify;
use streamlat_common::{ConsumerSettings, OffsetReset, ProducerSettings, Result, StreamError};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

use crate::{Consumer, PendingBatch, Producer, Record};

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, Vec<Vec<u8>>>,
    /// Handed to the next consumer poll, ahead of any record.
    poll_errors: VecDeque<StreamError>,
    /// Returned by the next producer send instead of appending.
    send_errors: VecDeque<StreamError>,
}

#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    appended: Arc<Notify>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn producer(&self, settings: ProducerSettings) -> MemoryProducer {
        let pending = PendingBatch::new(settings.batch_size);
        MemoryProducer { broker: self.clone(), settings, pending }
    }

    pub fn consumer(&self, settings: ConsumerSettings) -> MemoryConsumer {
        MemoryConsumer {
            broker: self.clone(),
            settings,
            subscriptions: Vec::new(),
            cursor: 0,
            closed: false,
        }
    }

    /// Make the next consumer poll fail with `err`.
    pub async fn inject_poll_error(&self, err: StreamError) {
        self.state.lock().await.poll_errors.push_back(err);
        self.appended.notify_waiters();
    }

    /// Make the next producer send fail with `err`.
    pub async fn inject_send_error(&self, err: StreamError) {
        self.state.lock().await.send_errors.push_back(err);
    }

    /// Number of records stored on `topic` (stream-qualified).
    pub async fn topic_len(&self, topic: &str) -> usize {
        self.state.lock().await.topics.get(topic).map_or(0, Vec::len)
    }

    /// Copy of every payload stored on `topic`, in offset order.
    pub async fn topic_payloads(&self, topic: &str) -> Vec<Vec<u8>> {
        self.state.lock().await.topics.get(topic).cloned().unwrap_or_default()
    }

    async fn append(&self, topic: String, payloads: Vec<Vec<u8>>) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(err) = state.send_errors.pop_front() {
            return Err(err);
        }
        debug!(topic = %topic, count = payloads.len(), "Appending batch");
        state.topics.entry(topic).or_default().extend(payloads);
        drop(state);
        self.appended.notify_waiters();
        Ok(())
    }
}

pub struct MemoryProducer {
    pub settings: ProducerSettings,
    broker: MemoryBroker,
    pending: PendingBatch,
}

impl MemoryProducer {
    /// Number of records queued but not yet delivered to the broker.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Producer for MemoryProducer {
    async fn produce(&mut self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let topic = qualify(&self.settings.default_stream, topic);
        if self.pending.push(topic, payload) {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        for (topic, payloads) in self.pending.drain_by_topic() {
            self.broker.append(topic, payloads).await?;
        }
        Ok(())
    }
}

struct Subscription {
    topic: String,
    offset: usize,
    /// Set once end-of-partition has been reported for the current tail.
    at_eof: bool,
}

pub struct MemoryConsumer {
    pub settings: ConsumerSettings,
    broker: MemoryBroker,
    subscriptions: Vec<Subscription>,
    /// Subscription to look at first on the next poll, so topics take turns.
    cursor: usize,
    closed: bool,
}

impl Consumer for MemoryConsumer {
    async fn subscribe(&mut self, topics: &[String]) -> Result<()> {
        if self.closed {
            return Err(StreamError::ConsumerClosed);
        }
        let state = self.broker.state.lock().await;
        self.subscriptions = topics
            .iter()
            .map(|topic| {
                let offset = match self.settings.offset_reset {
                    OffsetReset::Earliest => 0,
                    OffsetReset::Latest => state.topics.get(topic).map_or(0, Vec::len),
                };
                Subscription { topic: topic.clone(), offset, at_eof: false }
            })
            .collect();
        self.cursor = 0;
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Option<Record>> {
        if self.closed {
            return Err(StreamError::ConsumerClosed);
        }
        let deadline = Instant::now() + timeout;

        loop {
            // Register interest before inspecting the log so an append between
            // the check and the wait still wakes us.
            let appended = self.broker.appended.notified();
            tokio::pin!(appended);
            appended.as_mut().enable();

            {
                let mut state = self.broker.state.lock().await;
                if let Some(err) = state.poll_errors.pop_front() {
                    return Err(err);
                }

                let n = self.subscriptions.len();
                for i in 0..n {
                    let idx = (self.cursor + i) % n;
                    let sub = &mut self.subscriptions[idx];
                    let log = state.topics.get(&sub.topic);
                    let len = log.map_or(0, Vec::len);

                    if let Some(payload) = log.and_then(|l| l.get(sub.offset)) {
                        let record = Record {
                            topic: sub.topic.clone(),
                            partition: 0,
                            offset: sub.offset as i64,
                            payload: payload.clone(),
                        };
                        sub.offset += 1;
                        sub.at_eof = false;
                        self.cursor = idx + 1;
                        return Ok(Some(record));
                    }

                    if !sub.at_eof {
                        sub.at_eof = true;
                        let eof = StreamError::PartitionEof {
                            topic: sub.topic.clone(),
                            partition: 0,
                            offset: len as i64,
                        };
                        self.cursor = idx + 1;
                        return Err(eof);
                    }
                }
            }

            if tokio::time::timeout_at(deadline, appended).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.subscriptions.clear();
        Ok(())
    }
}
