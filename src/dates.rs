//! Calendar date ranges for the days to fetch.

use crate::error::{HistoryError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date format accepted on the command line
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive range of calendar days, `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DateRangeFields")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct DateRangeFields {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<DateRangeFields> for DateRange {
    type Error = HistoryError;

    fn try_from(fields: DateRangeFields) -> Result<Self> {
        Self::new(fields.start, fields.end)
    }
}

impl DateRange {
    /// Create a range, rejecting a start after the end
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(HistoryError::invalid_date_range(
                start.to_string(),
                end.to_string(),
                "start date is after end date",
            ));
        }
        Ok(Self { start, end })
    }

    /// Parse a range from two YYYY-MM-DD strings
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |value: &str| {
            NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|e| {
                HistoryError::invalid_date_range(
                    start,
                    end,
                    format!("'{}' is not a YYYY-MM-DD date: {}", value, e),
                )
            })
        };

        let start_date = parse(start)?;
        let end_date = parse(end)?;

        Self::new(start_date, end_date).map_err(|_| {
            HistoryError::invalid_date_range(start, end, "start date is after end date")
        })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days, counting both ends
    pub fn days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    /// Iterate the days in chronological order
    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take(self.days())
    }
}
