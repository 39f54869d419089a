//! Configuration management and validation.
//!
//! Provides configuration structures for page fetching, the retry policy,
//! the per-station column schema and category encoding, with defaults
//! drawn from [`crate::constants`].

use crate::constants::{
    DEFAULT_BACKOFF_SECS, DEFAULT_END_DATE, DEFAULT_HOST, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_OUTPUT_DIR, DEFAULT_PAGE_WAIT_SECS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_REGION, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_START_DATE,
    DEFAULT_STATION, canonical, raw,
};
use crate::error::{HistoryError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Delay schedule between attempts after a transient failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackoffSchedule {
    /// Same delay before every retry
    Fixed(Duration),
    /// Doubling delay starting at `initial`, capped at `max`
    Exponential { initial: Duration, max: Duration },
}

/// Bounded retry policy applied to transient fetch failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per date, including the first
    pub max_attempts: u32,

    pub backoff: BackoffSchedule,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffSchedule::Fixed(Duration::from_secs(DEFAULT_BACKOFF_SECS)),
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffSchedule::Fixed(delay),
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match &self.backoff {
            BackoffSchedule::Fixed(delay) => *delay,
            BackoffSchedule::Exponential { initial, max } => {
                let exponent = attempt.saturating_sub(1).min(16);
                initial.saturating_mul(1 << exponent).min(*max)
            }
        }
    }
}

/// What to do with a date whose failure is not worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Stop the run and surface the error
    Abort,
    /// Record the failure in the summary and continue with other dates
    Skip,
}

/// Remote page settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    pub host: String,

    /// Region path segment, e.g. `np/kathmandu`
    pub region: String,

    /// How long to wait for the observation table to appear
    pub page_wait: Duration,

    pub poll_interval: Duration,

    pub request_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            region: DEFAULT_REGION.to_string(),
            page_wait: Duration::from_secs(DEFAULT_PAGE_WAIT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Scrape loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub retry: RetryPolicy,

    /// Upper bound on dates fetched at the same time
    pub max_concurrent_fetches: usize,

    pub failure_policy: FailurePolicy,

    pub show_progress: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            failure_policy: FailurePolicy::Abort,
            show_progress: true,
        }
    }
}

/// How a column's cells are cleaned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Trimmed display text
    Text,
    /// Clock time, normalized to 24 hour HH:MM
    Time,
    /// Number followed by a unit, coerced to f64
    Measurement,
}

/// Mapping of one raw page column onto the canonical schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRule {
    pub source: String,
    pub target: String,
    pub kind: ColumnKind,
}

impl ColumnRule {
    pub fn new(source: &str, target: &str, kind: ColumnKind) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            kind,
        }
    }
}

/// Declarative column schema of a station's observation table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationSchema {
    /// Rules in output column order
    pub columns: Vec<ColumnRule>,

    /// Whether the station measures precipitation
    pub precipitation_sensor: bool,
}

impl Default for StationSchema {
    fn default() -> Self {
        use ColumnKind::{Measurement, Text, Time};

        Self {
            columns: vec![
                ColumnRule::new(raw::TIME, canonical::TIME, Time),
                ColumnRule::new(raw::TEMPERATURE, canonical::TEMPERATURE, Measurement),
                ColumnRule::new(raw::DEW_POINT, canonical::DEW_POINT, Measurement),
                ColumnRule::new(raw::HUMIDITY, canonical::HUMIDITY, Measurement),
                ColumnRule::new(raw::WIND, canonical::WIND_DIRECTION, Text),
                ColumnRule::new(raw::WIND_SPEED, canonical::WIND_SPEED, Measurement),
                ColumnRule::new(raw::WIND_GUST, canonical::WIND_GUST, Measurement),
                ColumnRule::new(raw::PRESSURE, canonical::PRESSURE, Measurement),
                ColumnRule::new(raw::PRECIPITATION, canonical::PRECIPITATION, Measurement),
                ColumnRule::new(raw::CONDITION, canonical::CONDITION, Text),
            ],
            // The Kathmandu station has no rain gauge
            precipitation_sensor: false,
        }
    }
}

impl StationSchema {
    /// Page column headers the station's table is expected to carry
    pub fn source_columns(&self) -> Vec<String> {
        self.columns.iter().map(|rule| rule.source.clone()).collect()
    }

    /// Canonical columns omitted because the station lacks the sensor
    pub fn dropped_columns(&self) -> Vec<&'static str> {
        if self.precipitation_sensor {
            Vec::new()
        } else {
            vec![canonical::PRECIPITATION]
        }
    }

    /// Rules for the columns that survive into the processed table
    pub fn retained_rules(&self) -> impl Iterator<Item = &ColumnRule> {
        let dropped = self.dropped_columns();
        self.columns
            .iter()
            .filter(move |rule| !dropped.contains(&rule.target.as_str()))
    }
}

/// Which condition indicator columns the encoder emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionColumns {
    /// All four categories, whether observed or not
    Full,
    /// Only categories that occur in the data
    Observed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    pub condition_columns: ConditionColumns,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            condition_columns: ConditionColumns::Full,
        }
    }
}

/// Which pipeline stages a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStages {
    /// Scrape, normalize and encode
    All,
    /// Scrape and write the raw stage only
    Scrape,
    /// Normalize and encode an existing raw stage
    Process,
}

impl RunStages {
    pub fn includes_scrape(&self) -> bool {
        matches!(self, RunStages::All | RunStages::Scrape)
    }

    pub fn includes_processing(&self) -> bool {
        matches!(self, RunStages::All | RunStages::Process)
    }
}

/// Global configuration for a station history run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub station: String,

    /// First day to fetch, YYYY-MM-DD
    pub start_date: String,

    /// Last day to fetch, YYYY-MM-DD
    pub end_date: String,

    pub output_dir: PathBuf,

    pub stages: RunStages,

    pub fetcher: FetcherConfig,

    pub scrape: ScrapeConfig,

    pub schema: StationSchema,

    pub encoding: EncodingConfig,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            station: DEFAULT_STATION.to_string(),
            start_date: DEFAULT_START_DATE.to_string(),
            end_date: DEFAULT_END_DATE.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            stages: RunStages::All,
            fetcher: FetcherConfig::default(),
            scrape: ScrapeConfig::default(),
            schema: StationSchema::default(),
            encoding: EncodingConfig::default(),
        }
    }
}

impl HistoryConfig {
    pub fn with_station(mut self, station: impl Into<String>) -> Self {
        self.station = station.into();
        self
    }

    pub fn with_date_range(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = start.into();
        self.end_date = end.into();
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_stages(mut self, stages: RunStages) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.scrape.retry = retry;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, max_fetches: usize) -> Self {
        self.scrape.max_concurrent_fetches = max_fetches;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.scrape.failure_policy = policy;
        self
    }

    pub fn without_progress(mut self) -> Self {
        self.scrape.show_progress = false;
        self
    }

    pub fn with_precipitation_sensor(mut self, present: bool) -> Self {
        self.schema.precipitation_sensor = present;
        self
    }

    pub fn with_condition_columns(mut self, columns: ConditionColumns) -> Self {
        self.encoding.condition_columns = columns;
        self
    }

    /// Check values that would otherwise fail deep inside a run
    pub fn validate(&self) -> Result<()> {
        if self.station.trim().is_empty() {
            return Err(HistoryError::configuration("station code must not be empty"));
        }
        if self.scrape.retry.max_attempts == 0 {
            return Err(HistoryError::configuration(
                "max attempts must be at least 1",
            ));
        }
        if self.scrape.max_concurrent_fetches == 0 {
            return Err(HistoryError::configuration(
                "concurrency limit must be at least 1",
            ));
        }
        if let BackoffSchedule::Exponential { initial, max } = &self.scrape.retry.backoff {
            if initial > max {
                return Err(HistoryError::configuration(format!(
                    "initial backoff {:?} exceeds maximum backoff {:?}",
                    initial, max
                )));
            }
        }
        if self.fetcher.page_wait.is_zero() {
            return Err(HistoryError::configuration("page wait must be non-zero"));
        }
        if !self.fetcher.host.starts_with("http://") && !self.fetcher.host.starts_with("https://")
        {
            return Err(HistoryError::configuration(format!(
                "host '{}' must start with http:// or https://",
                self.fetcher.host
            )));
        }
        if self.fetcher.region.trim_matches('/').is_empty() {
            return Err(HistoryError::configuration("region must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = HistoryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.station, "VNKT");
        assert_eq!(config.scrape.retry.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.scrape.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let zero_attempts = HistoryConfig::default()
            .with_retry_policy(RetryPolicy::fixed(0, Duration::from_secs(1)));
        assert!(zero_attempts.validate().is_err());

        let zero_workers = HistoryConfig::default().with_max_concurrent_fetches(0);
        assert!(zero_workers.validate().is_err());

        let empty_station = HistoryConfig::default().with_station(" ");
        assert!(empty_station.validate().is_err());

        let mut bad_host = HistoryConfig::default();
        bad_host.fetcher.host = "ftp://example.com".to_string();
        assert!(bad_host.validate().is_err());
    }

    #[test]
    fn test_fixed_backoff_is_constant() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(10));
        assert_eq!(policy.delay_after(1), Duration::from_secs(10));
        assert_eq!(policy.delay_after(7), Duration::from_secs(10));
    }

    #[test]
    fn test_exponential_backoff_doubles_until_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            backoff: BackoffSchedule::Exponential {
                initial: Duration::from_secs(2),
                max: Duration::from_secs(20),
            },
        };
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
        assert_eq!(policy.delay_after(5), Duration::from_secs(20));
        assert_eq!(policy.delay_after(40), Duration::from_secs(20));
    }

    #[test]
    fn test_precipitation_drop_follows_sensor_flag() {
        let without = StationSchema::default();
        assert_eq!(without.dropped_columns(), vec![canonical::PRECIPITATION]);
        assert!(
            without
                .retained_rules()
                .all(|rule| rule.target != canonical::PRECIPITATION)
        );

        let with = HistoryConfig::default().with_precipitation_sensor(true).schema;
        assert!(with.dropped_columns().is_empty());
        assert_eq!(with.retained_rules().count(), with.columns.len());
    }

    #[test]
    fn test_source_columns_follow_rules() {
        let mut schema = StationSchema::default();
        assert_eq!(schema.source_columns().len(), schema.columns.len());
        assert_eq!(schema.source_columns()[0], "Time");

        schema.columns.retain(|rule| rule.target != canonical::PRECIPITATION);
        let sources = schema.source_columns();
        assert_eq!(sources.len(), 9);
        assert!(!sources.iter().any(|source| source == "Precip."));
    }
}
