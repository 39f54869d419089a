//! Weather History Library
//!
//! A Rust library for scraping hourly observations of a weather station from
//! a public daily history dashboard and turning them into analysis-ready
//! tables.
//!
//! This library provides tools for:
//! - Fetching one observation table per day with bounded retry and backoff
//! - Accumulating days into a chronologically ordered station series
//! - Normalizing display strings into typed measurements and 24 hour times
//! - One-hot encoding wind direction and weather condition
//! - Exporting every stage as CSV, xlsx and Parquet with atomic writes

pub mod cli;
pub mod config;
pub mod constants;
pub mod dates;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod processor;

// Re-export commonly used types
pub use config::{
    BackoffSchedule, ConditionColumns, FailurePolicy, HistoryConfig, RetryPolicy, RunStages,
};
pub use dates::DateRange;
pub use error::{FetchError, HistoryError, Result};
pub use fetcher::{HttpPageFetcher, PageFetcher};
pub use models::{
    ConditionCategory, DailyObservationTable, RunSummary, Stage, StationCode, StationSeries,
};
pub use processor::HistoryPipeline;
