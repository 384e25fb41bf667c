use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use streamlat_client::{Consumer, Record};
use streamlat_common::{Clock, Message, MessageKind, Result, StreamError, Topics, POLL_TIMEOUT};
use tracing::{debug, error, info, warn};

use crate::stats::{Clamp, LatencyReport, LatencyTracker};

/// What the dispatcher did with one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// A test message; its latency went into both windows.
    Recorded { latency_ms: i64, clamp: Clamp },
    /// A marker; the report was printed and the periodic window reset.
    Reported(LatencyReport),
    /// Fast-topic message whose type is neither test nor marker.
    IllegalType(String),
    /// Summary-topic message, accepted without processing.
    Summary,
    UnexpectedTopic(String),
    /// Payload could not be used (not JSON, or a test message without `t`).
    Skipped(StreamError),
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Timeout,
    PartitionEof,
    Dispatched(Dispatch),
}

/// Why [`Dispatcher::run`] returned.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Interrupted,
    Fatal(StreamError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchCounters {
    pub timeouts: u64,
    pub records: u64,
    pub recorded: u64,
    pub reports: u64,
    pub illegal: u64,
    pub summaries: u64,
    pub unexpected: u64,
    pub skipped: u64,
    pub partition_eofs: u64,
}

/// Owns the consumer and the latency windows; routes each record by topic and type.
pub struct Dispatcher<C> {
    consumer: C,
    topics: Topics,
    tracker: LatencyTracker,
    clock: Arc<dyn Clock>,
    poll_timeout: Duration,
    counters: DispatchCounters,
    timeouts_since_record: u64,
}

impl<C: Consumer> Dispatcher<C> {
    pub fn new(consumer: C, topics: Topics, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            consumer,
            topics,
            tracker: LatencyTracker::new()?,
            clock,
            poll_timeout: POLL_TIMEOUT,
            counters: DispatchCounters::default(),
            timeouts_since_record: 0,
        })
    }

    /// Override the per-poll wait.
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn tracker(&self) -> &LatencyTracker {
        &self.tracker
    }

    pub fn counters(&self) -> &DispatchCounters {
        &self.counters
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Subscribe the consumer to the fast and summary topics.
    pub async fn subscribe(&mut self) -> Result<()> {
        let topics = self.topics.all();
        self.consumer.subscribe(&topics).await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.consumer.close().await
    }

    /// Poll once and dispatch whatever arrived.
    ///
    /// Timeouts and end-of-partition are `Ok`; any other broker error is
    /// returned and should end the run.
    pub async fn poll_once(&mut self) -> Result<Step> {
        match self.consumer.poll(self.poll_timeout).await {
            Ok(None) => {
                self.counters.timeouts += 1;
                self.timeouts_since_record += 1;
                Ok(Step::Timeout)
            }
            Ok(Some(record)) => {
                self.counters.records += 1;
                info!("Got record after {} timeouts", self.timeouts_since_record);
                self.timeouts_since_record = 0;
                Ok(Step::Dispatched(self.dispatch(&record)))
            }
            Err(e) if e.is_partition_eof() => {
                self.counters.partition_eofs += 1;
                debug!("{e}");
                Ok(Step::PartitionEof)
            }
            Err(e) => Err(e),
        }
    }

    /// Poll until `shutdown` resolves or the broker reports a fatal error.
    /// Nothing is drained on shutdown.
    pub async fn run<F>(&mut self, shutdown: F) -> RunOutcome
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, leaving poll loop");
                    return RunOutcome::Interrupted;
                }
                step = self.poll_once() => {
                    if let Err(e) = step {
                        error!("{e}");
                        return RunOutcome::Fatal(e);
                    }
                }
            }
        }
    }

    /// Route one record by `(topic, type)`.
    pub fn dispatch(&mut self, record: &Record) -> Dispatch {
        let message = match Message::decode(&record.payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(topic = %record.topic, offset = record.offset, "Skipping message: {e}");
                self.counters.skipped += 1;
                return Dispatch::Skipped(e);
            }
        };

        if record.topic == self.topics.fast {
            match message.kind {
                MessageKind::Test => self.record_latency(record, &message),
                MessageKind::Marker => {
                    let report = self.tracker.report_and_reset_periodic();
                    self.counters.reports += 1;
                    println!("{report}");
                    Dispatch::Reported(report)
                }
                MessageKind::Other | MessageKind::Unknown(_) => {
                    warn!("Illegal message type: {}", message.kind.as_str());
                    self.counters.illegal += 1;
                    Dispatch::IllegalType(message.kind.as_str().to_string())
                }
            }
        } else if record.topic == self.topics.summary {
            self.counters.summaries += 1;
            Dispatch::Summary
        } else {
            warn!("Shouldn't be possible to get message on topic {}", record.topic);
            self.counters.unexpected += 1;
            Dispatch::UnexpectedTopic(record.topic.clone())
        }
    }

    fn record_latency(&mut self, record: &Record, message: &Message) -> Dispatch {
        let Some(sent_at) = message.sent_at else {
            warn!(topic = %record.topic, offset = record.offset, "Skipping test message without `t`");
            self.counters.skipped += 1;
            return Dispatch::Skipped(StreamError::MissingField("t".to_string()));
        };

        let latency_ms = self.clock.now().millis_since(sent_at);
        let clamp = self.tracker.record(latency_ms);
        match clamp {
            Clamp::None => {}
            Clamp::Low => warn!(latency_ms, "Negative latency recorded as 0; clocks are skewed"),
            Clamp::High => warn!(latency_ms, "Latency above histogram range recorded at the maximum"),
        }
        self.counters.recorded += 1;
        Dispatch::Recorded { latency_ms, clamp }
    }
}
