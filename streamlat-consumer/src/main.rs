use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use streamlat_client::RestConsumer;
use streamlat_common::topic::DEFAULT_STREAM;
use streamlat_common::{logging, ConsumerSettings, OffsetReset, Result, SystemClock, Topics};
use streamlat_consumer::{DispatchCounters, Dispatcher, RunOutcome};
use tracing::warn;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OffsetResetArg {
    Earliest,
    Latest,
}

#[derive(Parser, Debug)]
#[command(name = "streamlat-consumer", about = "Consume sample messages and report one-way latency")]
struct Args {
    /// Base URL of the stream REST gateway.
    #[arg(long, default_value = "http://localhost:8082")]
    rest_url: String,

    /// Stream holding the fast-messages and summary-markers topics.
    #[arg(long, default_value = DEFAULT_STREAM)]
    stream: String,

    /// Consumer group identifier [default: mygroup]
    #[arg(long)]
    group_id: Option<String>,

    /// Where to start when the group has no committed offset [default: earliest]
    #[arg(long, value_enum)]
    offset_reset: Option<OffsetResetArg>,

    /// Offset auto-commit interval in milliseconds [default: 500]
    #[arg(long)]
    auto_commit_interval_ms: Option<u64>,

    /// JSON file with consumer settings; flags given on the command line win.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    logging::init(&args.log_level);

    let settings = consumer_settings(&args).unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(3);
    });

    println!("Consuming messages...");

    let consumer = RestConsumer::connect(&args.rest_url, settings).await.unwrap_or_else(|e| {
        eprintln!("Failed to create consumer: {e}");
        process::exit(3);
    });

    let mut dispatcher = Dispatcher::new(consumer, Topics::in_stream(&args.stream), Arc::new(SystemClock))
        .unwrap_or_else(|e| {
            eprintln!("{e}");
            process::exit(3);
        });

    if let Err(e) = dispatcher.subscribe().await {
        eprintln!("Failed to subscribe: {e}");
        process::exit(3);
    }

    let outcome = dispatcher
        .run(async {
            if tokio::signal::ctrl_c().await.is_err() {
                // No signal handler available: run until a fatal error.
                std::future::pending::<()>().await;
            }
        })
        .await;

    let exit_code = match outcome {
        RunOutcome::Interrupted => {
            println!("You pressed Ctrl+C. Closing consumer gracefully.");
            0
        }
        RunOutcome::Fatal(_) => 1,
    };

    if let Err(e) = dispatcher.close().await {
        warn!("Failed to close consumer: {e}");
    }

    print_summary(dispatcher.counters());
    println!("Done!");
    process::exit(exit_code);
}

/// Settings file first (if any), then command-line overrides.
fn consumer_settings(args: &Args) -> Result<ConsumerSettings> {
    let mut settings = match &args.settings {
        Some(path) => ConsumerSettings::from_json_file(path)?,
        None => ConsumerSettings::default(),
    };

    if let Some(group_id) = &args.group_id {
        settings.group_id = group_id.clone();
    }
    if let Some(reset) = args.offset_reset {
        settings.offset_reset = match reset {
            OffsetResetArg::Earliest => OffsetReset::Earliest,
            OffsetResetArg::Latest => OffsetReset::Latest,
        };
    }
    if let Some(interval) = args.auto_commit_interval_ms {
        settings.auto_commit_interval_ms = interval;
    }

    Ok(settings)
}

fn print_summary(c: &DispatchCounters) {
    println!("Records:               {}", c.records);
    println!("Latencies recorded:    {}", c.recorded);
    println!("Reports:               {}", c.reports);
    println!("Summary messages:      {}", c.summaries);
    println!("Illegal types:         {}", c.illegal);
    println!("Unexpected topics:     {}", c.unexpected);
    println!("Skipped payloads:      {}", c.skipped);
    println!("Poll timeouts:         {}", c.timeouts);
}
