//! Error types for scraping and processing station history.

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for the weather history library
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Errors surfaced by the scraper, the processing stages and the exporter
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Invalid date range '{start}' to '{end}': {reason}")]
    InvalidDateRange {
        start: String,
        end: String,
        reason: String,
    },

    #[error("Transport failure fetching {station} on {date}: {message}")]
    FetchTransport {
        station: String,
        date: NaiveDate,
        message: String,
    },

    #[error("Observation table for {station} on {date} did not appear within {waited:?}")]
    FetchTimeout {
        station: String,
        date: NaiveDate,
        waited: Duration,
    },

    #[error("Page for {station} on {date} was rejected with HTTP status {status}")]
    FetchRejected {
        station: String,
        date: NaiveDate,
        status: u16,
    },

    #[error("Gave up fetching {station} on {date} after {attempts} attempts: {last_error}")]
    FetchExhausted {
        station: String,
        date: NaiveDate,
        attempts: u32,
        last_error: String,
    },

    #[error("Schema mismatch for {station} ({context}): expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        station: String,
        context: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error(
        "Failed to normalize {station} row {row} ({date}) column '{column}' value {value:?}: {reason}"
    )]
    Normalization {
        station: String,
        row: usize,
        date: String,
        column: String,
        value: String,
        reason: String,
    },

    #[error("Failed to export {path}: {reason}")]
    Export { path: PathBuf, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

impl HistoryError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid date range error
    pub fn invalid_date_range(
        start: impl Into<String>,
        end: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidDateRange {
            start: start.into(),
            end: end.into(),
            reason: reason.into(),
        }
    }

    /// Create an export error for a destination path
    pub fn export(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Export {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Attach station and date context to a fetcher error
    pub fn from_fetch(station: &str, date: NaiveDate, error: FetchError) -> Self {
        let station = station.to_string();
        match error {
            FetchError::Transport { message } => Self::FetchTransport {
                station,
                date,
                message,
            },
            FetchError::Timeout { waited } => Self::FetchTimeout {
                station,
                date,
                waited,
            },
            FetchError::Rejected { status } => Self::FetchRejected {
                station,
                date,
                status,
            },
            FetchError::SchemaMismatch { expected, found } => Self::SchemaMismatch {
                station,
                context: date.to_string(),
                expected,
                found,
            },
        }
    }
}

/// Failures reported by a page fetcher for a single station and date
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Network-level failure or rate limiting; worth retrying
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The observation table never appeared within the wait budget
    #[error("no observation table appeared within {waited:?}")]
    Timeout { waited: Duration },

    /// The server answered with a non-transient error status
    #[error("page rejected with HTTP status {status}")]
    Rejected { status: u16 },

    /// A table was found but its columns are not the expected layout
    #[error("table columns {found:?} do not match expected {expected:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Only transport failures are retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transport { .. })
    }
}
