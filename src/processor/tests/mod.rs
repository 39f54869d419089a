//! Scenario tests for the scraper and the pipeline
//!
//! Pages are served by a scripted fetcher so failures, timeouts and
//! cancellation can be reproduced without network access.


use crate::constants::RAW_COLUMNS;
use crate::error::FetchError;
use crate::fetcher::PageFetcher;
use crate::models::{DailyObservationTable, StationCode};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Scripted behaviour for one date
#[derive(Debug, Clone)]
pub enum Script {
    /// Fail with a transport error this many times, then succeed
    Transient(u32),
    /// Always fail with a transport error
    AlwaysTransient,
    Timeout,
    Rejected(u16),
    /// Serve a table with the wrong columns
    WrongColumns,
}

/// Page fetcher that serves synthetic days and records every attempt
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    scripts: HashMap<NaiveDate, Script>,
    delays: HashMap<NaiveDate, Duration>,
    pressure: Option<String>,
    columns: Option<Vec<String>>,
    cancel_on: Option<(NaiveDate, CancellationToken)>,
    attempts: Mutex<Vec<NaiveDate>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, date: NaiveDate, script: Script) -> Self {
        self.scripts.insert(date, script);
        self
    }

    /// Delay the response for a date
    pub fn with_delay(mut self, date: NaiveDate, delay: Duration) -> Self {
        self.delays.insert(date, delay);
        self
    }

    /// Serve this pressure cell instead of the default
    pub fn with_pressure(mut self, pressure: &str) -> Self {
        self.pressure = Some(pressure.to_string());
        self
    }

    /// Serve only these page columns, in this order
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Cancel `token` while serving `date`
    pub fn cancel_on(mut self, date: NaiveDate, token: CancellationToken) -> Self {
        self.cancel_on = Some((date, token));
        self
    }

    /// Every attempted date, in call order
    pub fn attempts(&self) -> Vec<NaiveDate> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, date: NaiveDate) -> usize {
        self.attempts().iter().filter(|d| **d == date).count()
    }

    fn record(&self, date: NaiveDate) -> u32 {
        let mut attempts = self.attempts.lock().unwrap();
        attempts.push(date);
        attempts.iter().filter(|d| **d == date).count() as u32
    }

    fn day(&self, date: NaiveDate) -> DailyObservationTable {
        let pressure = self.pressure.as_deref().unwrap_or("25.52 in");
        let rows: Vec<Vec<String>> = (0..24)
            .map(|hour| {
                let clock = if hour % 12 == 0 { 12 } else { hour % 12 };
                let meridiem = if hour < 12 { "AM" } else { "PM" };
                let time = format!("{}:20 {}", clock, meridiem);
                [
                    time.as_str(),
                    "45 F",
                    "41 F",
                    "87 %",
                    "N",
                    "3 mph",
                    "0 mph",
                    pressure,
                    "0.0 in",
                    "Fair",
                ]
                .iter()
                .map(|cell| cell.to_string())
                .collect()
            })
            .collect();

        match &self.columns {
            None => DailyObservationTable::from_rows(date, RAW_COLUMNS, RAW_COLUMNS, &rows).unwrap(),
            Some(columns) => {
                let rows: Vec<Vec<String>> = rows
                    .iter()
                    .map(|row| {
                        columns
                            .iter()
                            .map(|name| {
                                let index = RAW_COLUMNS
                                    .iter()
                                    .position(|raw| *raw == name.as_str())
                                    .unwrap();
                                row[index].clone()
                            })
                            .collect()
                    })
                    .collect();
                DailyObservationTable::from_rows(date, columns, columns, &rows).unwrap()
            }
        }
    }
}

impl PageFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        _station: &StationCode,
        date: NaiveDate,
    ) -> Result<DailyObservationTable, FetchError> {
        let attempt = self.record(date);

        if let Some(delay) = self.delays.get(&date) {
            tokio::time::sleep(*delay).await;
        }

        if let Some((cancel_date, token)) = &self.cancel_on {
            if *cancel_date == date {
                token.cancel();
            }
        }

        match self.scripts.get(&date) {
            Some(Script::Transient(failures)) if attempt <= *failures => {
                Err(FetchError::transport(format!("connection reset ({})", attempt)))
            }
            Some(Script::AlwaysTransient) => Err(FetchError::transport("connection refused")),
            Some(Script::Timeout) => Err(FetchError::Timeout {
                waited: Duration::from_secs(20),
            }),
            Some(Script::Rejected(status)) => Err(FetchError::Rejected { status: *status }),
            Some(Script::WrongColumns) => {
                DailyObservationTable::from_rows(date, RAW_COLUMNS, &["Hour", "Temp"][..], &[])
            }
            _ => Ok(self.day(date)),
        }
    }
}

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, month, day).unwrap()
}

pub fn station() -> StationCode {
    StationCode::new("VNKT").unwrap()
}
