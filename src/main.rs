use anyhow::{Context, Result};
use clap::Parser;
use std::process;
use tokio_util::sync::CancellationToken;
use weather_history::cli::{Args, setup_logging};
use weather_history::HistoryPipeline;

fn main() {
    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    match runtime.block_on(run(args)) {
        Ok(true) => process::exit(0),
        Ok(false) => {
            eprintln!("Run interrupted; partial results were written");
            process::exit(130);
        }
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

/// Run the pipeline; returns false when the run was interrupted
async fn run(args: Args) -> Result<bool> {
    setup_logging(&args).context("Failed to initialise logging")?;

    let config = args.to_config().context("Invalid arguments")?;
    let pipeline =
        HistoryPipeline::from_config(config).context("Failed to set up the pipeline")?;

    // Cancel all operations when Ctrl+C is received
    let cancellation_token = CancellationToken::new();
    let shutdown = {
        let token = cancellation_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nReceived CTRL+C, finishing with the days fetched so far...");
                token.cancel();
            }
        })
    };

    let summary = pipeline
        .run(&cancellation_token)
        .await
        .with_context(|| format!("Run for station {} failed", pipeline.station()))?;
    shutdown.abort();

    Ok(!summary.interrupted)
}
