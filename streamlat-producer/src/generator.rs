use std::num::NonZeroU64;
use streamlat_client::Producer;
use streamlat_common::{Clock, Message, Result, Topics};
use tracing::info;

const DEFAULT_MARKER_EVERY: NonZeroU64 = match NonZeroU64::new(10) {
    Some(every) => every,
    None => panic!("marker interval must be non-zero"),
};

/// How many messages to send and how often to interleave markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Number of "test" messages.
    pub messages: u64,
    /// A marker/other pair follows every index divisible by this.
    pub marker_every: NonZeroU64,
    pub topics: Topics,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            messages: 10_000,
            marker_every: DEFAULT_MARKER_EVERY,
            topics: Topics::default(),
        }
    }
}

/// Counts of what [`run`] handed to the producer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SendStats {
    pub test: u64,
    pub marker: u64,
    pub other: u64,
    pub flushes: u64,
}

impl SendStats {
    pub fn total(&self) -> u64 {
        self.test + self.marker + self.other
    }

    /// Messages written to the fast topic (tests and markers).
    pub fn fast_topic(&self) -> u64 {
        self.test + self.marker
    }
}

/// `true` when a marker/other pair follows the test message at `index`.
pub fn is_marker_index(index: u64, every: NonZeroU64) -> bool {
    index % every.get() == 0
}

/// Send `config.messages` test messages, each stamped with `clock`, plus a
/// marker (fast topic) and an other (summary topic) message after every
/// `marker_every`-th index starting at 0. Flushes after each marker group
/// and once at the end.
///
/// Stops at the first send error; nothing is retried.
pub async fn run<P: Producer>(
    producer: &mut P,
    clock: &dyn Clock,
    config: &GeneratorConfig,
) -> Result<SendStats> {
    let mut stats = SendStats::default();

    for k in 0..config.messages {
        let seq = k as i64;
        let mut sent_this_round = 0;

        let test = Message::test(seq, clock.now()).encode()?;
        producer.produce(&config.topics.fast, test).await?;
        stats.test += 1;
        sent_this_round += 1;

        if is_marker_index(k, config.marker_every) {
            let marker = Message::marker(seq, clock.now()).encode()?;
            producer.produce(&config.topics.fast, marker).await?;
            stats.marker += 1;
            sent_this_round += 1;

            let other = Message::other(seq, clock.now()).encode()?;
            producer.produce(&config.topics.summary, other).await?;
            stats.other += 1;
            sent_this_round += 1;

            producer.flush().await?;
            stats.flushes += 1;
        }

        info!(
            "Sent {} messages this round out of {} sent so far",
            sent_this_round,
            stats.total()
        );
    }

    producer.flush().await?;
    stats.flushes += 1;
    Ok(stats)
}
