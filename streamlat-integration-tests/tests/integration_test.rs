use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Duration;
use streamlat_client::{MemoryBroker, Producer};
use streamlat_common::{
    ConsumerSettings, EpochMillis, ManualClock, Message, ProducerSettings, StreamError, Topics,
};
use streamlat_consumer::{Dispatch, Dispatcher, RunOutcome, Step};
use streamlat_producer::generator::{self, GeneratorConfig};

const SENT_AT: EpochMillis = EpochMillis(1_700_000_000_000);

fn generator_config(messages: u64, marker_every: u64) -> GeneratorConfig {
    GeneratorConfig {
        messages,
        marker_every: NonZeroU64::new(marker_every).unwrap(),
        topics: Topics::default(),
    }
}

/// Poll until the broker has nothing left, collecting every dispatch.
async fn drain<C: streamlat_client::Consumer>(d: &mut Dispatcher<C>) -> Vec<Dispatch> {
    let mut seen = Vec::new();
    loop {
        match d.poll_once().await.unwrap() {
            Step::Timeout => return seen,
            Step::PartitionEof => {}
            Step::Dispatched(dispatch) => seen.push(dispatch),
        }
    }
}

#[tokio::test]
async fn test_reference_run_end_to_end() {
    let broker = MemoryBroker::new();

    let producer_clock = ManualClock::new(SENT_AT);
    let mut producer = broker.producer(ProducerSettings::default());
    let stats = generator::run(&mut producer, &producer_clock, &generator_config(10_000, 10))
        .await
        .unwrap();
    assert_eq!(stats.fast_topic(), 11_000);
    assert_eq!(stats.other, 1_000);

    // Every message arrives exactly 35 ms after it was stamped.
    let consumer_clock = Arc::new(ManualClock::new(EpochMillis(SENT_AT.0 + 35)));
    let mut d = Dispatcher::new(broker.consumer(ConsumerSettings::default()), Topics::default(), consumer_clock)
        .unwrap()
        .with_poll_timeout(Duration::from_millis(20));
    d.subscribe().await.unwrap();

    let dispatched = drain(&mut d).await;

    let counters = *d.counters();
    assert_eq!(counters.records, 12_000);
    assert_eq!(counters.recorded, 10_000);
    assert_eq!(counters.reports, 1_000);
    assert_eq!(counters.summaries, 1_000);
    assert_eq!(counters.illegal + counters.unexpected + counters.skipped, 0);

    assert_eq!(d.tracker().cumulative().count(), 10_000);
    assert_eq!(d.tracker().cumulative().value_at_percentile(0.0), Some(35));
    assert_eq!(d.tracker().cumulative().value_at_percentile(100.0), Some(35));

    // Markers follow indexes 0, 10, 20, ...: the first period holds one test
    // message and every later one holds ten.
    let periods: Vec<u64> = dispatched
        .iter()
        .filter_map(|dispatch| match dispatch {
            Dispatch::Reported(report) => Some(report.periodic.count),
            _ => None,
        })
        .collect();
    assert_eq!(periods.len(), 1_000);
    assert_eq!(periods[0], 1);
    assert!(periods[1..].iter().all(|&n| n == 10));

    // Nine test messages follow the final marker and remain in the open period.
    assert_eq!(d.tracker().periodic().count(), 9);
}

#[tokio::test]
async fn test_bad_messages_do_not_stop_the_consumer() {
    let broker = MemoryBroker::new();
    let topics = Topics::default();
    let mut producer = broker.producer(ProducerSettings::default());

    producer.produce(&topics.fast, b"definitely not json".to_vec()).await.unwrap();
    producer.produce(&topics.fast, br#"{"type":"test","k":1}"#.to_vec()).await.unwrap();
    producer.produce(&topics.fast, br#"{"type":"bogus","t":1.0,"k":2}"#.to_vec()).await.unwrap();
    producer.produce("/sample-stream:stray", Message::test(3, SENT_AT).encode().unwrap()).await.unwrap();
    producer.produce(&topics.fast, Message::test(4, SENT_AT).encode().unwrap()).await.unwrap();
    producer.produce(&topics.fast, Message::marker(5, SENT_AT).encode().unwrap()).await.unwrap();
    producer.flush().await.unwrap();

    let clock = Arc::new(ManualClock::new(EpochMillis(SENT_AT.0 + 7)));
    let mut d = Dispatcher::new(broker.consumer(ConsumerSettings::default()), topics.clone(), clock)
        .unwrap()
        .with_poll_timeout(Duration::from_millis(20));
    d.subscribe().await.unwrap();

    let outcome = d
        .run(async {
            tokio::time::sleep(Duration::from_millis(200)).await;
        })
        .await;

    assert_eq!(outcome, RunOutcome::Interrupted);
    let counters = *d.counters();
    assert_eq!(counters.skipped, 2);
    assert_eq!(counters.illegal, 1);
    assert_eq!(counters.recorded, 1);
    assert_eq!(counters.reports, 1);
    // The stray topic was never subscribed, so it never reaches the dispatcher.
    assert_eq!(counters.unexpected, 0);
    assert_eq!(d.tracker().cumulative().count(), 1);
    assert_eq!(d.tracker().periodic().count(), 0);
}

#[tokio::test]
async fn test_fatal_broker_error_ends_the_run_after_processing() {
    let broker = MemoryBroker::new();
    let topics = Topics::default();
    let mut producer = broker.producer(ProducerSettings::default());
    producer.produce(&topics.fast, Message::test(0, SENT_AT).encode().unwrap()).await.unwrap();
    producer.flush().await.unwrap();

    let clock = Arc::new(ManualClock::new(SENT_AT));
    let mut d = Dispatcher::new(broker.consumer(ConsumerSettings::default()), topics, clock)
        .unwrap()
        .with_poll_timeout(Duration::from_millis(20));
    d.subscribe().await.unwrap();
    drain(&mut d).await;

    let fatal = StreamError::Broker { code: 50002, message: "Kafka error".to_string() };
    broker.inject_poll_error(fatal.clone()).await;

    let outcome = d.run(std::future::pending::<()>()).await;

    assert_eq!(outcome, RunOutcome::Fatal(fatal));
    assert_eq!(d.tracker().cumulative().count(), 1);
    d.close().await.unwrap();
}
