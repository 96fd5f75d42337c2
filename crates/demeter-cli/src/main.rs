use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use demeter_client::{BrowserPool, CsvResultStore, HanziiExtractor, read_key_column};
use demeter_core::pipeline::{HarvestPipeline, HarvestSummary};
use demeter_core::report::TracingReporter;
use demeter_core::traits::ResultStore;
use demeter_core::HarvestConfig;

#[derive(Parser)]
#[command(name = "demeter", version, about = "Resilient batch vocabulary harvester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest a record for every key in the input dataset
    Harvest {
        /// Input CSV containing the key column
        #[arg(short, long, default_value = "vocabulary.csv")]
        input: PathBuf,

        /// Output CSV dataset; doubles as the resume checkpoint
        #[arg(short, long, default_value = "translated-full.csv")]
        output: PathBuf,

        /// Input column holding the work keys
        #[arg(long, default_value = "simplified_chinese")]
        key_column: String,

        /// Concurrent extractions (browser tabs) in flight
        #[arg(long, env = "DEMETER_CONCURRENCY", default_value_t = 2)]
        concurrency: usize,

        /// Keys per batch; progress is saved after every batch
        #[arg(long, default_value_t = 5)]
        batch_size: usize,

        /// Retries per key after the first attempt
        #[arg(long, default_value_t = 2)]
        max_retries: u32,

        /// Base delay in seconds for linear retry backoff
        #[arg(long, default_value_t = 5)]
        base_retry_delay: u64,

        /// Pacing delay in seconds between batches
        #[arg(long, default_value_t = 3)]
        batch_delay: u64,

        /// Settle delay in seconds after each key
        #[arg(long, default_value_t = 1)]
        item_delay: u64,

        /// Consecutive failures before the circuit breaker trips
        #[arg(long, default_value_t = 5)]
        failure_threshold: u32,

        /// Cooldown in seconds after a breaker trip
        #[arg(long, default_value_t = 30)]
        cooldown: u64,

        /// Restart the browser session every N batches (0 disables)
        #[arg(long, default_value_t = 4)]
        recycle_after: usize,

        /// Print the final summary as JSON on stdout
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Summarize an existing output dataset
    Status {
        /// Output CSV dataset to inspect
        #[arg(short, long, default_value = "translated-full.csv")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("demeter=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Harvest {
            input,
            output,
            key_column,
            concurrency,
            batch_size,
            max_retries,
            base_retry_delay,
            batch_delay,
            item_delay,
            failure_threshold,
            cooldown,
            recycle_after,
            json,
        } => {
            let config = HarvestConfig {
                concurrency,
                batch_size,
                max_retries,
                base_retry_delay: Duration::from_secs(base_retry_delay),
                batch_delay: Duration::from_secs(batch_delay),
                item_delay: Duration::from_secs(item_delay),
                failure_threshold,
                cooldown: Duration::from_secs(cooldown),
                recycle_after_batches: recycle_after,
            };
            cmd_harvest(&input, &output, &key_column, config, json).await?;
        }
        Commands::Status { output } => {
            cmd_status(&output).await?;
        }
    }

    Ok(())
}

async fn cmd_harvest(
    input: &PathBuf,
    output: &PathBuf,
    key_column: &str,
    config: HarvestConfig,
    json: bool,
) -> Result<()> {
    // No work is meaningful without the input list: unreadable input is fatal.
    let keys = read_key_column(input, key_column)
        .with_context(|| format!("Failed to read input dataset: {}", input.display()))?;

    tracing::info!(keys = keys.len(), input = %input.display(), "Input dataset loaded");

    let pool = BrowserPool::new();
    let extractor = HanziiExtractor::new();
    let store = CsvResultStore::new(output);
    let pipeline = HarvestPipeline::new(pool, extractor, store, config);

    // Ctrl-C stops issuing new batches; in-flight work finishes and is
    // flushed before exit.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing the current batch before shutdown");
                cancel.cancel();
            }
        });
    }

    let summary = pipeline.run(&keys, cancel, &TracingReporter).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, output);
    }

    Ok(())
}

fn print_summary(summary: &HarvestSummary, output: &PathBuf) {
    println!("Harvest {}:", if summary.interrupted { "interrupted" } else { "completed" });
    println!("  total unique keys: {}", summary.total_keys);
    println!("  already recorded:  {}", summary.skipped);
    println!("  newly succeeded:   {}", summary.succeeded);
    println!("  newly failed:      {}", summary.failed);
    println!("  success rate:      {:.1}%", summary.success_rate());
    if summary.breaker_trips > 0 {
        println!("  breaker trips:     {}", summary.breaker_trips);
    }
    println!("  duration:          {:.2}s", summary.duration_secs);
    println!("  output file:       {}", output.display());
}

async fn cmd_status(output: &PathBuf) -> Result<()> {
    let store = CsvResultStore::new(output);
    let records = store
        .load()
        .await
        .with_context(|| format!("Failed to read output dataset: {}", output.display()))?;

    if records.is_empty() {
        println!("No records in {}", output.display());
        return Ok(());
    }

    let not_found = records.iter().filter(|r| r.is_not_found()).count();
    println!("Dataset {}:", output.display());
    println!("  records:   {}", records.len());
    println!("  extracted: {}", records.len() - not_found);
    println!("  not found: {}", not_found);

    Ok(())
}
