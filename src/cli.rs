//! Command-line interface for the weather history scraper.
//!
//! Defines the clap argument surface, maps it onto [`HistoryConfig`] and
//! installs the tracing subscriber.

use crate::config::{
    BackoffSchedule, ConditionColumns, FailurePolicy, HistoryConfig, RetryPolicy, RunStages,
};
use crate::constants::{
    DEFAULT_BACKOFF_SECS, DEFAULT_END_DATE, DEFAULT_HOST, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_OUTPUT_DIR, DEFAULT_PAGE_WAIT_SECS, DEFAULT_REGION,
    DEFAULT_START_DATE, DEFAULT_STATION,
};
use crate::error::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Stages selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StageArg {
    /// Scrape, normalize and encode
    All,
    /// Scrape and write the raw stage only
    Scrape,
    /// Normalize and encode an existing raw stage without network access
    Process,
}

impl From<StageArg> for RunStages {
    fn from(stage: StageArg) -> Self {
        match stage {
            StageArg::All => RunStages::All,
            StageArg::Scrape => RunStages::Scrape,
            StageArg::Process => RunStages::Process,
        }
    }
}

/// CLI arguments for the weather history scraper
///
/// Fetches hourly observations for one station from the daily history
/// dashboard and writes raw, processed and one-hot encoded tables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "weather_history",
    version,
    about = "Scrape hourly weather station history into analysis-ready tables"
)]
pub struct Args {
    /// Station code used in page URLs and output file names
    #[arg(short = 's', long, value_name = "CODE", default_value = DEFAULT_STATION)]
    pub station: String,

    /// First day to fetch (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", default_value = DEFAULT_START_DATE)]
    pub start: String,

    /// Last day to fetch, inclusive (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", default_value = DEFAULT_END_DATE)]
    pub end: String,

    /// Directory receiving the stage files and run summary
    #[arg(short = 'o', long, value_name = "PATH", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Total fetch attempts per date before it is recorded as failed
    #[arg(long, value_name = "COUNT", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Wait between attempts, in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_BACKOFF_SECS)]
    pub backoff_secs: u64,

    /// Double the wait after each attempt, up to this many seconds
    #[arg(long, value_name = "SECS")]
    pub max_backoff_secs: Option<u64>,

    /// Number of dates fetched concurrently
    #[arg(short = 'j', long, value_name = "COUNT", default_value_t = DEFAULT_MAX_CONCURRENT_FETCHES)]
    pub concurrency: usize,

    /// How long to poll a page for its observation table, in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_PAGE_WAIT_SECS)]
    pub page_wait_secs: u64,

    /// Dashboard base URL
    #[arg(long, value_name = "URL", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Region path segment of the history pages, e.g. np/kathmandu
    #[arg(long, value_name = "PATH", default_value = DEFAULT_REGION)]
    pub region: String,

    /// Record timeouts, rejected pages and bad tables instead of aborting
    #[arg(long)]
    pub skip_failed: bool,

    /// Keep the precipitation column (station has a rain gauge)
    #[arg(long)]
    pub precipitation_sensor: bool,

    /// Emit only condition columns that occur in the data
    #[arg(long)]
    pub observed_conditions_only: bool,

    /// Which stages to run
    #[arg(long, value_enum, default_value_t = StageArg::All)]
    pub stage: StageArg,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    fn retry_policy(&self) -> RetryPolicy {
        let initial = Duration::from_secs(self.backoff_secs);
        let backoff = match self.max_backoff_secs {
            Some(max) => BackoffSchedule::Exponential {
                initial,
                max: Duration::from_secs(max),
            },
            None => BackoffSchedule::Fixed(initial),
        };

        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff,
        }
    }

    /// Build and validate the run configuration
    pub fn to_config(&self) -> Result<HistoryConfig> {
        let mut config = HistoryConfig::default()
            .with_station(self.station.trim())
            .with_date_range(&self.start, &self.end)
            .with_output_dir(&self.output_dir)
            .with_stages(self.stage.into())
            .with_retry_policy(self.retry_policy())
            .with_max_concurrent_fetches(self.concurrency)
            .with_precipitation_sensor(self.precipitation_sensor);

        if self.skip_failed {
            config = config.with_failure_policy(FailurePolicy::Skip);
        }
        if self.observed_conditions_only {
            config = config.with_condition_columns(ConditionColumns::Observed);
        }
        if self.no_progress {
            config = config.without_progress();
        }

        config.fetcher.host = self.host.clone();
        config.fetcher.region = self.region.clone();
        config.fetcher.page_wait = Duration::from_secs(self.page_wait_secs);

        config.validate()?;
        Ok(config)
    }
}

/// Set up logging
pub fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("weather_history={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .init();

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}
