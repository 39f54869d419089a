//! Core data structures for station history processing.
//!
//! Defines station codes, daily observation tables, the accumulated
//! station series, pipeline stages and the run summary.

use crate::constants::{
    DATE_COLUMN, MAX_ROWS_PER_DAY, ONEHOT_STAGE_SUFFIX, PROCESSED_STAGE_SUFFIX, RAW_STAGE_SUFFIX,
};
use crate::dates::DATE_FORMAT;
use crate::error::{FetchError, HistoryError, Result};
use chrono::NaiveDate;
use polars::prelude::{Column, DataFrame};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

/// Short station identifier used in page URLs and file names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StationCode(String);

impl StationCode {
    pub fn new(code: impl AsRef<str>) -> Result<Self> {
        let code = code.as_ref().trim();
        if code.is_empty() {
            return Err(HistoryError::configuration("station code must not be empty"));
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// True when `headers` names exactly the `expected` columns, in any order
pub fn matches_layout<E: AsRef<str>, H: AsRef<str>>(expected: &[E], headers: &[H]) -> bool {
    let found: HashSet<&str> = headers.iter().map(|h| h.as_ref().trim()).collect();
    headers.len() == expected.len()
        && found.len() == headers.len()
        && expected.iter().all(|name| found.contains(name.as_ref()))
}

/// One day of hourly observations as rendered on the dashboard
///
/// Each row holds one display string per column, in the order of the
/// station schema's source columns. Empty cells are stored as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyObservationTable {
    date: NaiveDate,
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl DailyObservationTable {
    /// Build a table from the page's header row and body rows
    ///
    /// The header set must match `expected` exactly, in any order. Rows
    /// beyond [`MAX_ROWS_PER_DAY`] are ignored; short rows are padded with
    /// missing cells.
    pub fn from_rows<E: AsRef<str>, H: AsRef<str>>(
        date: NaiveDate,
        expected: &[E],
        headers: &[H],
        rows: &[Vec<String>],
    ) -> std::result::Result<Self, FetchError> {
        if !matches_layout(expected, headers) {
            return Err(FetchError::SchemaMismatch {
                expected: expected.iter().map(|s| s.as_ref().to_string()).collect(),
                found: headers.iter().map(|s| s.as_ref().trim().to_string()).collect(),
            });
        }

        let positions: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(index, name)| (name.as_ref().trim(), index))
            .collect();
        let columns: Vec<String> = expected.iter().map(|s| s.as_ref().to_string()).collect();

        let rows = rows
            .iter()
            .take(MAX_ROWS_PER_DAY)
            .map(|row| {
                columns
                    .iter()
                    .map(|name| {
                        row.get(positions[name.as_str()])
                            .map(|cell| cell.trim())
                            .filter(|cell| !cell.is_empty())
                            .map(str::to_string)
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            date,
            columns,
            rows,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell for a page column name, if the column exists and the cell is present
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|name| name == column)?;
        self.rows.get(row)?.get(index)?.as_deref()
    }
}

/// Daily tables for one station, in chronological order
#[derive(Debug, Clone)]
pub struct StationSeries {
    station: StationCode,
    days: Vec<DailyObservationTable>,
}

impl StationSeries {
    pub fn new(station: StationCode) -> Self {
        Self {
            station,
            days: Vec::new(),
        }
    }

    /// Build a series from tables in any order, sorting them by date
    pub fn from_unordered(station: StationCode, mut days: Vec<DailyObservationTable>) -> Self {
        days.sort_by_key(|day| day.date());
        Self { station, days }
    }

    pub fn push(&mut self, day: DailyObservationTable) {
        self.days.push(day);
    }

    pub fn station(&self) -> &StationCode {
        &self.station
    }

    pub fn days(&self) -> &[DailyObservationTable] {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.days.iter().map(DailyObservationTable::len).sum()
    }

    /// Concatenate all days into one string-typed frame
    ///
    /// The frame has a leading Date column followed by `columns`, so an empty
    /// series still carries the station's raw schema.
    pub fn to_frame<S: AsRef<str>>(&self, columns: &[S]) -> Result<DataFrame> {
        let dates: Vec<String> = self
            .days
            .iter()
            .flat_map(|day| {
                let date = day.date().format(DATE_FORMAT).to_string();
                std::iter::repeat_n(date, day.len())
            })
            .collect();

        let mut frame_columns = Vec::with_capacity(columns.len() + 1);
        frame_columns.push(Column::new(DATE_COLUMN.into(), dates));

        for name in columns {
            let name = name.as_ref();
            let values: Vec<Option<String>> = self
                .days
                .iter()
                .flat_map(|day| (0..day.len()).map(move |row| day.cell(row, name).map(str::to_string)))
                .collect();
            frame_columns.push(Column::new(name.into(), values));
        }

        Ok(DataFrame::new(frame_columns)?)
    }
}

/// Successive on-disk snapshots of a station's series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Raw,
    Processed,
    OneHot,
}

impl Stage {
    pub fn suffix(&self) -> &'static str {
        match self {
            Stage::Raw => RAW_STAGE_SUFFIX,
            Stage::Processed => PROCESSED_STAGE_SUFFIX,
            Stage::OneHot => ONEHOT_STAGE_SUFFIX,
        }
    }

    /// File stem for a station, e.g. `VNKT_raw_weather`
    pub fn file_stem(&self, station: &StationCode) -> String {
        format!("{}_{}", station, self.suffix())
    }
}

/// Closed weather condition taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionCategory {
    Rain,
    Cloudy,
    Sun,
    Other,
}

impl ConditionCategory {
    pub const ALL: [ConditionCategory; 4] = [
        ConditionCategory::Rain,
        ConditionCategory::Cloudy,
        ConditionCategory::Sun,
        ConditionCategory::Other,
    ];

    /// Indicator column name
    pub fn label(&self) -> &'static str {
        match self {
            ConditionCategory::Rain => "Rain",
            ConditionCategory::Cloudy => "Cloudy",
            ConditionCategory::Sun => "Sun",
            ConditionCategory::Other => "Other",
        }
    }
}

/// Why a date is missing from the series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Exhausted,
    Timeout,
    Rejected,
    SchemaMismatch,
}

/// A date that could not be fetched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateFailure {
    pub date: NaiveDate,
    pub kind: FailureKind,
    pub attempts: u32,
    pub message: String,
}

/// Files and row count written for one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutput {
    pub stage: Stage,
    pub rows: usize,
    pub csv_path: PathBuf,
    pub xlsx_path: PathBuf,
    pub parquet_path: PathBuf,
}

/// Summary of a pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub station: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub days_requested: usize,
    pub days_fetched: usize,
    pub failures: Vec<DateFailure>,
    pub outputs: Vec<StageOutput>,
    pub interrupted: bool,
    pub processing_time_ms: u128,
}

impl RunSummary {
    pub fn output(&self, stage: Stage) -> Option<&StageOutput> {
        self.outputs.iter().find(|output| output.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::RAW_COLUMNS;

    fn headers() -> Vec<&'static str> {
        RAW_COLUMNS.to_vec()
    }

    fn hour(time: &str) -> Vec<String> {
        [
            time, "72 F", "50 F", "45 %", "N", "5 mph", "0 mph", "29.92 in", "0.0 in", "Fair",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 1, d).unwrap()
    }

    fn day(d: u32, rows: &[Vec<String>]) -> DailyObservationTable {
        DailyObservationTable::from_rows(date(d), RAW_COLUMNS, &headers()[..], rows).unwrap()
    }

    #[test]
    fn test_station_code_rejects_empty() {
        assert!(StationCode::new("  ").is_err());
        assert_eq!(StationCode::new(" VNKT ").unwrap().as_str(), "VNKT");
    }

    #[test]
    fn test_layout_match_ignores_order() {
        let mut reordered = headers();
        reordered.reverse();
        assert!(matches_layout(RAW_COLUMNS, &reordered[..]));
        assert!(!matches_layout(RAW_COLUMNS, &headers()[1..]));
        assert!(!matches_layout(&["Time", "Time"][..], &["Time", "Time"][..]));
    }

    #[test]
    fn test_from_rows_accepts_reordered_headers() {
        let mut reordered = headers();
        reordered.reverse();
        let row: Vec<String> = hour("1:00 AM").into_iter().rev().collect();

        let table =
            DailyObservationTable::from_rows(date(1), RAW_COLUMNS, &reordered[..], &[row]).unwrap();

        assert_eq!(table.cell(0, "Time"), Some("1:00 AM"));
        assert_eq!(table.cell(0, "Pressure"), Some("29.92 in"));
        assert_eq!(table.cell(0, "Condition"), Some("Fair"));
    }

    #[test]
    fn test_from_rows_rejects_unexpected_columns() {
        let mut extra = headers();
        extra.push("UV Index");
        let result = DailyObservationTable::from_rows(date(1), RAW_COLUMNS, &extra[..], &[]);
        assert!(matches!(result, Err(FetchError::SchemaMismatch { .. })));

        let all = headers();
        let result = DailyObservationTable::from_rows(date(1), RAW_COLUMNS, &all[1..], &[]);
        assert!(matches!(result, Err(FetchError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_from_rows_follows_expected_columns() {
        let without_precip: Vec<&str> = headers()
            .into_iter()
            .filter(|name| *name != "Precip.")
            .collect();
        let row: Vec<String> = hour("3:00 AM")
            .into_iter()
            .filter(|cell| cell != "0.0 in")
            .collect();

        let table =
            DailyObservationTable::from_rows(date(1), &without_precip[..], &without_precip[..], &[row])
                .unwrap();
        assert_eq!(table.columns().len(), 9);
        assert_eq!(table.cell(0, "Condition"), Some("Fair"));
        assert_eq!(table.cell(0, "Precip."), None);

        // The full layout is rejected for a station without the gauge
        let result =
            DailyObservationTable::from_rows(date(1), &without_precip[..], &headers()[..], &[]);
        assert!(matches!(result, Err(FetchError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_from_rows_caps_rows_and_pads_short_rows() {
        let mut rows: Vec<Vec<String>> = (0..30).map(|_| hour("2:00 AM")).collect();
        rows[0].truncate(3);
        rows[1][9] = "  ".to_string();

        let table = day(1, &rows);

        assert_eq!(table.len(), MAX_ROWS_PER_DAY);
        assert_eq!(table.cell(0, "Dew Point"), Some("50 F"));
        assert_eq!(table.cell(0, "Humidity"), None);
        assert_eq!(table.cell(1, "Condition"), None);
    }

    #[test]
    fn test_series_to_frame_injects_date_column() {
        let station = StationCode::new("VNKT").unwrap();
        let day2 = day(2, &[hour("1:00 AM")]);
        let day1 = day(1, &[hour("1:00 AM"), hour("2:00 AM")]);

        let series = StationSeries::from_unordered(station, vec![day2, day1]);
        let frame = series.to_frame(RAW_COLUMNS).unwrap();

        assert_eq!(frame.height(), 3);
        assert_eq!(frame.width(), RAW_COLUMNS.len() + 1);
        assert_eq!(series.total_rows(), 3);

        let dates: Vec<_> = frame
            .column(DATE_COLUMN)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|d| d.unwrap().to_string())
            .collect();
        assert_eq!(dates, vec!["2019-01-01", "2019-01-01", "2019-01-02"]);
    }

    #[test]
    fn test_empty_series_keeps_schema() {
        let series = StationSeries::new(StationCode::new("VNKT").unwrap());
        let frame = series.to_frame(RAW_COLUMNS).unwrap();
        assert_eq!(frame.height(), 0);
        assert_eq!(frame.width(), RAW_COLUMNS.len() + 1);
    }

    #[test]
    fn test_stage_file_stems() {
        let station = StationCode::new("VNKT").unwrap();
        assert_eq!(Stage::Raw.file_stem(&station), "VNKT_raw_weather");
        assert_eq!(Stage::Processed.file_stem(&station), "VNKT_processed_weather");
        assert_eq!(Stage::OneHot.file_stem(&station), "VNKT_onehot_weather");
    }
}
