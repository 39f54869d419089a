//! Application constants for the weather history scraper
//!
//! This module contains the page layout, column names, condition keywords
//! and default run parameters used throughout the application.

// =============================================================================
// Remote Dashboard
// =============================================================================

/// Dashboard host serving the daily history pages
pub const DEFAULT_HOST: &str = "https://www.wunderground.com";

/// Region path segment for the deployed station
pub const DEFAULT_REGION: &str = "np/kathmandu";

/// Default station code (Kathmandu, Tribhuvan International)
pub const DEFAULT_STATION: &str = "VNKT";

/// Maximum number of hourly rows taken from a daily page
pub const MAX_ROWS_PER_DAY: usize = 24;

/// User agent sent with page requests
pub const USER_AGENT: &str = concat!("weather_history/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Raw Page Columns
// =============================================================================

/// Injected date column, formatted as YYYY-MM-DD
pub const DATE_COLUMN: &str = "Date";

pub mod raw {
    pub const TIME: &str = "Time";
    pub const TEMPERATURE: &str = "Temperature";
    pub const DEW_POINT: &str = "Dew Point";
    pub const HUMIDITY: &str = "Humidity";
    pub const WIND: &str = "Wind";
    pub const WIND_SPEED: &str = "Wind Speed";
    pub const WIND_GUST: &str = "Wind Gust";
    pub const PRESSURE: &str = "Pressure";
    pub const PRECIPITATION: &str = "Precip.";
    pub const CONDITION: &str = "Condition";
}

/// Columns of the observation table, in page order
pub const RAW_COLUMNS: &[&str] = &[
    raw::TIME,
    raw::TEMPERATURE,
    raw::DEW_POINT,
    raw::HUMIDITY,
    raw::WIND,
    raw::WIND_SPEED,
    raw::WIND_GUST,
    raw::PRESSURE,
    raw::PRECIPITATION,
    raw::CONDITION,
];

// =============================================================================
// Canonical Columns
// =============================================================================

pub mod canonical {
    pub const TIME: &str = "Time";
    pub const TEMPERATURE: &str = "Temperature [F]";
    pub const DEW_POINT: &str = "Dew Point [F]";
    pub const HUMIDITY: &str = "Humidity [%]";
    pub const WIND_DIRECTION: &str = "Wind Direction";
    pub const WIND_SPEED: &str = "Wind Speed [mph]";
    pub const WIND_GUST: &str = "Wind Gust [mph]";
    pub const PRESSURE: &str = "Pressure [in]";
    pub const PRECIPITATION: &str = "Precipitation [inch]";
    pub const CONDITION: &str = "Condition";
}

// =============================================================================
// Condition Taxonomy
// =============================================================================

/// Checked first; a phrase with any of these is Rain
pub const RAIN_KEYWORDS: &[&str] = &["rain", "drizzle", "misty", "storm", "thunder"];

pub const CLOUDY_KEYWORDS: &[&str] = &["cloudy", "fog"];

pub const SUN_KEYWORDS: &[&str] = &["fair"];

// =============================================================================
// Defaults
// =============================================================================

pub const DEFAULT_START_DATE: &str = "2019-01-01";
pub const DEFAULT_END_DATE: &str = "2019-12-28";
pub const DEFAULT_OUTPUT_DIR: &str = "data";

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BACKOFF_SECS: u64 = 10;
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 2;

/// Page-load wait budget, matching a 20 second driver wait
pub const DEFAULT_PAGE_WAIT_SECS: u64 = 20;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Progress is logged for each date whose day of month is a multiple of this
pub const PROGRESS_DAY_INTERVAL: u32 = 10;

// =============================================================================
// Output Files
// =============================================================================

pub const RAW_STAGE_SUFFIX: &str = "raw_weather";
pub const PROCESSED_STAGE_SUFFIX: &str = "processed_weather";
pub const ONEHOT_STAGE_SUFFIX: &str = "onehot_weather";
pub const SUMMARY_SUFFIX: &str = "run_summary";
