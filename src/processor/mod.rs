//! Station history pipeline with modular stages.
//!
//! Orchestrates the complete workflow for one station: scrape the date range
//! into a raw table, normalize it into the processed table, one-hot encode
//! the categorical columns, and export every stage plus a run summary.

pub mod encoder;
pub mod normalizer;
pub mod scraper;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::{
    encoder::CategoryEncoder,
    normalizer::Normalizer,
    scraper::RetryingScraper,
    writer::{Exporter, OutputDir},
};

use crate::config::HistoryConfig;
use crate::dates::DateRange;
use crate::error::Result;
use crate::fetcher::{HttpPageFetcher, PageFetcher};
use crate::models::{RunSummary, Stage, StationCode};

use colored::*;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs the configured stages for one station
#[derive(Debug)]
pub struct HistoryPipeline<F> {
    config: HistoryConfig,
    station: StationCode,
    range: DateRange,
    fetcher: F,
    exporter: Exporter,
}

impl HistoryPipeline<HttpPageFetcher> {
    /// Create a pipeline that fetches pages over HTTP
    pub fn from_config(config: HistoryConfig) -> Result<Self> {
        let fetcher = HttpPageFetcher::new(&config.fetcher, &config.schema)?;
        Self::new(config, fetcher)
    }
}

impl<F: PageFetcher> HistoryPipeline<F> {
    /// Create a pipeline with an explicit page fetcher
    ///
    /// The configuration and date range are validated before the output
    /// directory is created.
    pub fn new(config: HistoryConfig, fetcher: F) -> Result<Self> {
        config.validate()?;
        let station = StationCode::new(&config.station)?;
        let range = DateRange::parse(&config.start_date, &config.end_date)?;
        let exporter = Exporter::new(OutputDir::prepare(&config.output_dir)?);

        Ok(Self {
            config,
            station,
            range,
            fetcher,
            exporter,
        })
    }

    pub fn station(&self) -> &StationCode {
        &self.station
    }

    pub fn range(&self) -> &DateRange {
        &self.range
    }

    pub fn exporter(&self) -> &Exporter {
        &self.exporter
    }

    /// Main processing entry point
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunSummary> {
        let start_time = Instant::now();
        self.print_header();

        let mut summary = RunSummary {
            station: self.station.to_string(),
            start_date: Some(self.range.start()),
            end_date: Some(self.range.end()),
            days_requested: self.range.days(),
            ..RunSummary::default()
        };

        if self.config.stages.includes_scrape() {
            println!("\n{}", "Scraping daily history...".bright_yellow());
            let scraper = RetryingScraper::new(&self.config.scrape);
            let outcome = scraper
                .scrape(&self.fetcher, &self.station, &self.range, cancel)
                .await?;

            summary.days_fetched = outcome.series.len();
            summary.failures = outcome.failures;
            summary.interrupted = outcome.interrupted;

            let mut raw = outcome
                .series
                .to_frame(&self.config.schema.source_columns())?;
            summary
                .outputs
                .push(self.exporter.write_stage(&self.station, Stage::Raw, &mut raw)?);

            if summary.interrupted {
                warn!("Run interrupted; skipping processing stages");
                return self.finish(summary, start_time);
            }
        }

        if self.config.stages.includes_processing() {
            println!("\n{}", "Processing raw table...".bright_yellow());
            let raw = self.exporter.read_stage(&self.station, Stage::Raw)?;

            let normalizer = Normalizer::new(self.station.clone(), self.config.schema.clone());
            let mut processed = normalizer.normalize(&raw)?;
            summary.outputs.push(self.exporter.write_stage(
                &self.station,
                Stage::Processed,
                &mut processed,
            )?);

            let processed = self.exporter.read_stage(&self.station, Stage::Processed)?;
            let mut onehot = CategoryEncoder::new(&self.config.encoding).encode(&processed)?;
            summary.outputs.push(self.exporter.write_stage(
                &self.station,
                Stage::OneHot,
                &mut onehot,
            )?);
        }

        self.finish(summary, start_time)
    }

    fn finish(&self, mut summary: RunSummary, start_time: Instant) -> Result<RunSummary> {
        summary.processing_time_ms = start_time.elapsed().as_millis();
        let summary_path = self.exporter.write_summary(&self.station, &summary)?;
        info!("Run summary written to {}", summary_path.display());

        self.print_summary(&summary);
        Ok(summary)
    }

    fn print_header(&self) {
        println!(
            "{}",
            "Starting weather history run".bright_green().bold()
        );
        println!("  {} {}", "Station:".bright_cyan(), self.station);
        println!(
            "  {} {} to {} ({} days)",
            "Range:".bright_cyan(),
            self.range.start(),
            self.range.end(),
            self.range.days()
        );
        println!(
            "  {} {}",
            "Output:".bright_cyan(),
            self.exporter.output_dir().path().display()
        );
    }

    fn print_summary(&self, summary: &RunSummary) {
        println!("\n{}", "Run Summary".bright_green().bold());
        println!(
            "  {} {}ms",
            "Time elapsed:".bright_cyan(),
            summary.processing_time_ms.to_string().bright_white()
        );
        if self.config.stages.includes_scrape() {
            println!(
                "  {} {}/{}",
                "Days fetched:".bright_cyan(),
                summary.days_fetched.to_string().bright_white(),
                summary.days_requested
            );
        }
        if !summary.failures.is_empty() {
            println!(
                "  {} {}",
                "Days failed:".bright_red(),
                summary.failures.len().to_string().bright_red().bold()
            );
            for failure in &summary.failures {
                println!("    {} {:?}", failure.date, failure.kind);
            }
        }
        for output in &summary.outputs {
            println!(
                "  {} {} rows -> {}",
                format!("{:?}:", output.stage).bright_cyan(),
                output.rows.to_string().bright_white().bold(),
                output.csv_path.display()
            );
        }
        if summary.interrupted {
            println!("  {}", "Interrupted before completion".bright_red().bold());
        }
    }
}
