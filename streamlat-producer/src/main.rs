use clap::Parser;
use std::num::NonZeroU64;
use std::process;
use streamlat_client::RestProducer;
use streamlat_common::topic::DEFAULT_STREAM;
use streamlat_common::{logging, ProducerSettings, SystemClock, Topics};
use streamlat_producer::generator::{self, GeneratorConfig};

#[derive(Parser, Debug)]
#[command(name = "streamlat-producer", about = "Send timestamped sample messages for latency measurement")]
struct Args {
    /// Base URL of the stream REST gateway.
    #[arg(long, default_value = "http://localhost:8082")]
    rest_url: String,

    /// Default stream for the fast-messages and summary-markers topics.
    #[arg(long, default_value = DEFAULT_STREAM)]
    stream: String,

    /// Number of "test" messages to send.
    #[arg(long, default_value_t = 10_000)]
    messages: u64,

    /// Send a marker/other pair after every Nth test message (starting with the first).
    #[arg(long, default_value = "10")]
    marker_every: NonZeroU64,

    /// Records buffered before sending without an explicit flush.
    #[arg(long, default_value_t = 100)]
    batch_size: usize,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    logging::init(&args.log_level);

    let settings = ProducerSettings {
        default_stream: args.stream.clone(),
        batch_size: args.batch_size,
    };
    let mut producer = RestProducer::new(&args.rest_url, settings).unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(3);
    });

    let config = GeneratorConfig {
        messages: args.messages,
        marker_every: args.marker_every,
        topics: Topics::in_stream(&args.stream),
    };

    println!("Producing messages...");

    match generator::run(&mut producer, &SystemClock, &config).await {
        Ok(stats) => {
            println!("Test messages:         {}", stats.test);
            println!("Marker messages:       {}", stats.marker);
            println!("Summary messages:      {}", stats.other);
            println!("Flushes:               {}", stats.flushes);
            println!("Done!");
        }
        Err(e) => {
            println!("*** Exception occurred:");
            println!("{e}");
            process::exit(1);
        }
    }
}
