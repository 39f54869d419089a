//! Page fetching for daily station history tables.
//!
//! [`PageFetcher`] is the boundary the scraper drives; [`HttpPageFetcher`]
//! is the implementation used by the binary.

pub mod http;
pub mod table;

pub use http::HttpPageFetcher;

use crate::error::FetchError;
use crate::models::{DailyObservationTable, StationCode};
use chrono::NaiveDate;
use std::future::Future;

/// Source of one day's observation table for a station
pub trait PageFetcher: Send + Sync {
    /// Fetch the table for `date`, waiting until it has loaded or the wait
    /// budget elapses
    fn fetch(
        &self,
        station: &StationCode,
        date: NaiveDate,
    ) -> impl Future<Output = Result<DailyObservationTable, FetchError>> + Send;
}
