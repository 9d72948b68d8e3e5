//! CLI entry point for the GTFS-RT feed decoder.
//!
//! Provides subcommands for decoding a single feed to JSON, byte-walking an
//! unknown feed to reverse-engineer its schema, and polling a feed over
//! time while appending summary records.

use anyhow::Result;
use clap::{Parser, Subcommand};
use gtfs_rt_decoder::{
    fetch::{BasicClient, auth::ApiKey, fetch_bytes},
    introspect,
    output::{append_summary, print_pretty, render_json},
    parser::parse_feed,
    schema::FeedSchema,
    stats::FeedSummary,
};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// CLI name for a vehicle-position schema variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum SchemaVariant {
    /// Field numbers observed on the live vendor feed
    Observed,
    /// Field numbers from the published specification
    Published,
}

impl From<SchemaVariant> for FeedSchema {
    fn from(variant: SchemaVariant) -> Self {
        match variant {
            SchemaVariant::Observed => FeedSchema::OBSERVED,
            SchemaVariant::Published => FeedSchema::PUBLISHED,
        }
    }
}

#[derive(Parser)]
#[command(name = "gtfs_rt_decoder")]
#[command(about = "Decode and inspect GTFS-RT vendor feeds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a feed from a file or URL and print it as JSON
    Decode {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Which vehicle-position field numbering the vendor uses
        #[arg(short, long, value_enum, default_value = "observed")]
        schema: SchemaVariant,

        /// Print a summary record instead of the full JSON tree
        #[arg(long, default_value_t = false)]
        summary: bool,
    },
    /// Walk a feed's raw bytes without assuming a schema
    Inspect {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Maximum message nesting depth to descend into
        #[arg(short = 'd', long, default_value_t = introspect::DEFAULT_MAX_DEPTH)]
        max_depth: usize,
    },
    /// Poll a feed at an interval, appending summary rows to a CSV
    Watch {
        /// Feed URL
        #[arg(value_name = "URL")]
        url: String,

        /// CSV file to append summary rows to
        #[arg(short, long, default_value = "summaries.csv")]
        output: String,

        /// Which vehicle-position field numbering the vendor uses
        #[arg(short, long, value_enum, default_value = "observed")]
        schema: SchemaVariant,

        /// Seconds between polls
        #[arg(short = 'r', long, default_value_t = 60)]
        sample_rate: u64,

        /// Number of polls to run (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 1)]
        num_samples: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_rt_decoder.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_rt_decoder.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode {
            source,
            schema,
            summary,
        } => {
            let bytes = fetcher(&source).await?;
            let feed = parse_feed(&bytes, FeedSchema::from(schema))?;
            if feed.parse_errors > 0 {
                warn!(
                    parse_errors = feed.parse_errors,
                    "Some entities failed to decode"
                );
            }
            print_pretty(&feed);

            if summary {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&FeedSummary::from_feed(&feed))?
                );
            } else {
                println!("{}", render_json(&feed)?);
            }
        }
        Commands::Inspect { source, max_depth } => {
            let bytes = fetcher(&source).await?;
            print!("{}", introspect::inspect(&bytes, max_depth));
        }
        Commands::Watch {
            url,
            output,
            schema,
            sample_rate,
            num_samples,
        } => {
            watch_feed(&url, &output, FeedSchema::from(schema), sample_rate, num_samples).await?;
        }
    }

    Ok(())
}

/// Loads feed data from a local file path or fetches it over HTTP.
///
/// A `FEED_API_KEY` env var, when present, is sent as the header named by
/// `FEED_API_KEY_HEADER` (default `x-api-key`).
#[tracing::instrument(fields(source = %source))]
async fn fetcher(source: &str) -> Result<Vec<u8>> {
    let bytes = if source.starts_with("http") {
        let client = BasicClient::new();
        match std::env::var("FEED_API_KEY") {
            Ok(key) => {
                let header_name = std::env::var("FEED_API_KEY_HEADER")
                    .unwrap_or_else(|_| "x-api-key".to_string());
                let client = ApiKey {
                    inner: client,
                    header_name,
                    key,
                };
                fetch_bytes(&client, source).await?
            }
            Err(_) => fetch_bytes(&client, source).await?,
        }
    } else {
        std::fs::read(source)?
    };
    Ok(bytes)
}

/// Polls one feed at a fixed interval, appending a summary row per sample.
#[tracing::instrument(skip(schema), fields(url, output, sample_rate, num_samples))]
async fn watch_feed(
    url: &str,
    output: &str,
    schema: FeedSchema,
    sample_rate: u64,
    num_samples: usize,
) -> Result<()> {
    if num_samples == 0 {
        info!(sample_rate, "Sampling infinitely. Press Ctrl+C to stop.");
    } else {
        info!(num_samples, sample_rate, "Starting sample collection");
    }

    let mut sample_count = 0;
    loop {
        if num_samples > 0 && sample_count >= num_samples {
            break;
        }
        sample_count += 1;

        match fetcher(url).await {
            Ok(bytes) => match parse_feed(&bytes, schema) {
                Ok(feed) => {
                    let summary = FeedSummary::from_feed(&feed);
                    info!(
                        sample = sample_count,
                        entities = summary.total_entities,
                        vehicles = summary.vehicles,
                        parse_errors = summary.parse_errors,
                        "Feed sampled"
                    );
                    if let Err(e) = append_summary(output, &summary) {
                        error!(error = %e, "Failed to write summary row");
                    }
                }
                Err(e) => {
                    // The error already carries byte count and hex preview.
                    error!(error = %e, "Feed decode failed");
                }
            },
            Err(e) => {
                error!(error = %e, "Feed HTTP fetch failed");
            }
        }

        if num_samples == 0 || sample_count < num_samples {
            tokio::time::sleep(tokio::time::Duration::from_secs(sample_rate)).await;
        }
    }

    info!(output, "Finished sampling feed");
    Ok(())
}
