//! HTTP implementation of [`PageFetcher`].
//!
//! Requests the daily history page and polls until a table with the
//! station's expected columns is present or the page-wait budget runs out.

use super::PageFetcher;
use super::table::{PageTable, find_observation_table};
use crate::config::{FetcherConfig, StationSchema};
use crate::constants::USER_AGENT;
use crate::error::{FetchError, HistoryError, Result};
use crate::models::{DailyObservationTable, StationCode};
use chrono::{Datelike, NaiveDate};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Fetches daily history pages over HTTP
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
    host: String,
    region: String,
    columns: Vec<String>,
    page_wait: Duration,
    poll_interval: Duration,
}

impl HttpPageFetcher {
    pub fn new(config: &FetcherConfig, schema: &StationSchema) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                HistoryError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            region: config.region.trim_matches('/').to_string(),
            columns: schema.source_columns(),
            page_wait: config.page_wait,
            poll_interval: config.poll_interval,
        })
    }

    /// URL of the daily history page; month and day are not zero-padded
    pub fn page_url(&self, station: &StationCode, date: NaiveDate) -> String {
        format!(
            "{}/history/daily/{}/{}/date/{}-{}-{}",
            self.host,
            self.region,
            station,
            date.year(),
            date.month(),
            date.day()
        )
    }

    async fn get_page(&self, url: &str) -> std::result::Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(e.to_string()))?;

        if let Some(error) = classify_status(response.status()) {
            return Err(error);
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::transport(e.to_string()))
    }
}

/// Map a non-success status to a fetch error
///
/// Rate limiting, request timeouts and server errors are transient.
pub fn classify_status(status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        None
    } else if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        Some(FetchError::transport(format!("HTTP status {}", status)))
    } else {
        Some(FetchError::Rejected {
            status: status.as_u16(),
        })
    }
}

impl PageFetcher for HttpPageFetcher {
    async fn fetch(
        &self,
        station: &StationCode,
        date: NaiveDate,
    ) -> std::result::Result<DailyObservationTable, FetchError> {
        let url = self.page_url(station, date);
        let started = Instant::now();
        let deadline = started + self.page_wait;

        loop {
            debug!("Requesting {}", url);
            let body = self.get_page(&url).await?;

            let unrecognized = match find_observation_table(&body, &self.columns) {
                PageTable::Observation(table) => {
                    trace!(
                        "Found table with {} rows for {} on {}",
                        table.rows.len(),
                        station,
                        date
                    );
                    return DailyObservationTable::from_rows(
                        date,
                        &self.columns,
                        &table.headers,
                        &table.rows,
                    );
                }
                PageTable::Unrecognized(table) => Some(table),
                PageTable::Missing => None,
            };

            if Instant::now() + self.poll_interval >= deadline {
                // A page that rendered tables, none of them ours, has changed layout
                if let Some(table) = unrecognized {
                    return DailyObservationTable::from_rows(
                        date,
                        &self.columns,
                        &table.headers,
                        &table.rows,
                    );
                }
                return Err(FetchError::Timeout {
                    waited: started.elapsed(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
