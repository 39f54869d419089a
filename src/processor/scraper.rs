//! Retrying scrape loop over a date range.
//!
//! Each date is an independent task: fetch, back off and retry transient
//! failures per the [`RetryPolicy`], and report the outcome. Tasks run
//! through a bounded pool and are reassembled in chronological order.

use crate::config::{FailurePolicy, RetryPolicy, ScrapeConfig};
use crate::constants::PROGRESS_DAY_INTERVAL;
use crate::dates::DateRange;
use crate::error::{FetchError, HistoryError, Result};
use crate::fetcher::PageFetcher;
use crate::models::{DailyObservationTable, DateFailure, FailureKind, StationCode, StationSeries};

use chrono::{Datelike, NaiveDate};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::pin::pin;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of scraping a date range
#[derive(Debug)]
pub struct ScrapeOutcome {
    /// Successfully fetched days in chronological order
    pub series: StationSeries,

    /// Dates that were given up on, in chronological order
    pub failures: Vec<DateFailure>,

    /// Set when cancellation stopped the run before every date was tried
    pub interrupted: bool,
}

/// Terminal state of a single date task
#[derive(Debug)]
enum DateOutcome {
    Fetched(DailyObservationTable),
    Failed(DateFailure),
    Cancelled,
}

/// Fetches every date of a range with bounded retry
#[derive(Debug, Clone)]
pub struct RetryingScraper {
    retry: RetryPolicy,
    failure_policy: FailurePolicy,
    max_concurrent: usize,
    show_progress: bool,
}

impl RetryingScraper {
    pub fn new(config: &ScrapeConfig) -> Self {
        Self {
            retry: config.retry.clone(),
            failure_policy: config.failure_policy,
            max_concurrent: config.max_concurrent_fetches.max(1),
            show_progress: config.show_progress,
        }
    }

    /// Fetch all dates of `range` for `station`
    ///
    /// Exhausted dates are recorded in the outcome. Non-retryable failures
    /// abort the run or are recorded, according to the failure policy.
    /// Cancelling `cancel` stops new dates from starting and returns what has
    /// been fetched so far.
    pub async fn scrape<F: PageFetcher>(
        &self,
        fetcher: &F,
        station: &StationCode,
        range: &DateRange,
        cancel: &CancellationToken,
    ) -> Result<ScrapeOutcome> {
        info!(
            "Scraping {} days for station {} ({} to {})",
            range.days(),
            station,
            range.start(),
            range.end()
        );

        let progress = self.progress_bar(range.days() as u64, station);

        let mut tasks = pin!(
            stream::iter(range.iter())
                .map(move |date| self.fetch_date(fetcher, station, date, cancel))
                .buffer_unordered(self.max_concurrent)
                .take_until(cancel.cancelled())
        );

        let mut fetched = Vec::with_capacity(range.days());
        let mut failures = Vec::new();
        let mut cancelled_tasks = 0usize;

        while let Some(result) = tasks.next().await {
            progress.inc(1);
            match result {
                Ok(DateOutcome::Fetched(table)) => {
                    progress.set_message(format!("{}", table.date()));
                    fetched.push(table);
                }
                Ok(DateOutcome::Failed(failure)) => failures.push(failure),
                Ok(DateOutcome::Cancelled) => cancelled_tasks += 1,
                Err(e) => {
                    progress.abandon_with_message("aborted");
                    error!("Aborting scrape for {}: {}", station, e);
                    return Err(e);
                }
            }
        }

        let attempted = fetched.len() + failures.len();
        let interrupted = cancel.is_cancelled() && (cancelled_tasks > 0 || attempted < range.days());

        if interrupted {
            progress.abandon_with_message("interrupted");
            warn!(
                "Scrape interrupted after {} of {} days",
                fetched.len(),
                range.days()
            );
        } else {
            progress.finish_with_message("done");
        }

        failures.sort_by_key(|failure| failure.date);
        let series = StationSeries::from_unordered(station.clone(), fetched);

        info!(
            "Fetched {} days ({} rows) for {}, {} failed",
            series.len(),
            series.total_rows(),
            station,
            failures.len()
        );

        Ok(ScrapeOutcome {
            series,
            failures,
            interrupted,
        })
    }

    /// Fetch one date, retrying transient failures
    async fn fetch_date<F: PageFetcher>(
        &self,
        fetcher: &F,
        station: &StationCode,
        date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<DateOutcome> {
        if date.day() % PROGRESS_DAY_INTERVAL == 0 {
            info!("Working on date {} for station {}", date, station);
        }

        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Ok(DateOutcome::Cancelled);
            }
            attempt += 1;

            let error = match fetcher.fetch(station, date).await {
                Ok(table) => {
                    debug!(
                        "Fetched {} rows for {} on {} (attempt {})",
                        table.len(),
                        station,
                        date,
                        attempt
                    );
                    return Ok(DateOutcome::Fetched(table));
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                return self.non_retryable(station, date, attempt, error);
            }

            if attempt >= self.retry.max_attempts {
                warn!(
                    "Giving up on {} for {} after {} attempts: {}",
                    date, station, attempt, error
                );
                return Ok(DateOutcome::Failed(DateFailure {
                    date,
                    kind: FailureKind::Exhausted,
                    attempts: attempt,
                    message: HistoryError::FetchExhausted {
                        station: station.to_string(),
                        date,
                        attempts: attempt,
                        last_error: error.to_string(),
                    }
                    .to_string(),
                }));
            }

            let delay = self.retry.delay_after(attempt);
            warn!(
                "Got {} on {} for {}; retrying in {:?} (attempt {}/{})",
                error, date, station, delay, attempt, self.retry.max_attempts
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Ok(DateOutcome::Cancelled),
            }
        }
    }

    fn non_retryable(
        &self,
        station: &StationCode,
        date: NaiveDate,
        attempts: u32,
        error: FetchError,
    ) -> Result<DateOutcome> {
        let kind = match &error {
            FetchError::Timeout { .. } => FailureKind::Timeout,
            FetchError::Rejected { .. } => FailureKind::Rejected,
            FetchError::SchemaMismatch { .. } => FailureKind::SchemaMismatch,
            FetchError::Transport { .. } => FailureKind::Exhausted,
        };
        let error = HistoryError::from_fetch(station.as_str(), date, error);

        match self.failure_policy {
            FailurePolicy::Abort => Err(error),
            FailurePolicy::Skip => {
                warn!("Skipping {} for {}: {}", date, station, error);
                Ok(DateOutcome::Failed(DateFailure {
                    date,
                    kind,
                    attempts,
                    message: error.to_string(),
                }))
            }
        }
    }

    fn progress_bar(&self, total: u64, station: &StationCode) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(format!("Fetching {}", station));
        pb
    }
}
