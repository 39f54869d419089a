//! Normalization of raw observation tables.
//!
//! Renames page columns to the canonical schema, strips display units,
//! coerces measurements to `f64`, converts clock times to 24 hour form and
//! drops columns for sensors the station does not have.

use crate::config::{ColumnKind, ColumnRule, StationSchema};
use crate::constants::DATE_COLUMN;
use crate::error::{HistoryError, Result};
use crate::models::StationCode;
use chrono::NaiveTime;
use polars::prelude::*;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Fixed-point number with `.` as the only decimal separator
static NUMERIC_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("valid numeric pattern"));

/// Keep only the leading whitespace-separated token of a display cell
///
/// `"72 F"` becomes `"72"`; a cell without a unit is returned unchanged.
pub fn strip_unit(cell: &str) -> &str {
    cell.split_whitespace().next().unwrap_or("")
}

/// Parse a measurement cell such as `"29.92 in"`
///
/// Missing and blank cells are `Ok(None)`. Tokens that are not plain
/// fixed-point numbers, including comma decimals, are errors.
pub fn parse_measurement(cell: Option<&str>) -> std::result::Result<Option<f64>, String> {
    let Some(token) = cell.map(strip_unit).filter(|token| !token.is_empty()) else {
        return Ok(None);
    };

    if !NUMERIC_TOKEN.is_match(token) {
        return Err(format!("'{}' is not a number with '.' decimals", token));
    }

    token
        .parse::<f64>()
        .map(Some)
        .map_err(|e| format!("'{}' is not a number: {}", token, e))
}

/// Convert `"12:20 AM"` style times to `"00:20"`; 24 hour input is kept
pub fn normalize_time(cell: Option<&str>) -> std::result::Result<Option<String>, String> {
    let Some(text) = cell.map(str::trim).filter(|text| !text.is_empty()) else {
        return Ok(None);
    };

    NaiveTime::parse_from_str(text, "%I:%M %p")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map(|time| Some(time.format("%H:%M").to_string()))
        .map_err(|_| format!("'{}' is not a clock time", text))
}

/// Cleans a raw stage frame into the processed schema
#[derive(Debug, Clone)]
pub struct Normalizer {
    station: StationCode,
    schema: StationSchema,
}

impl Normalizer {
    pub fn new(station: StationCode, schema: StationSchema) -> Self {
        Self { station, schema }
    }

    /// Produce the processed table; row order is preserved
    pub fn normalize(&self, raw: &DataFrame) -> Result<DataFrame> {
        self.check_columns(raw)?;

        let dates = string_cells(raw, DATE_COLUMN)?;
        let mut columns = vec![Column::new(DATE_COLUMN.into(), dates.clone())];

        for rule in self.schema.retained_rules() {
            let cells = string_cells(raw, &rule.source)?;
            columns.push(self.normalize_column(rule, &cells, &dates)?);
        }

        for dropped in self.schema.dropped_columns() {
            debug!("Dropping {} for station {}: no sensor", dropped, self.station);
        }

        let processed = DataFrame::new(columns)?;
        info!(
            "Normalized {} rows into {} columns for {}",
            processed.height(),
            processed.width(),
            self.station
        );
        Ok(processed)
    }

    fn check_columns(&self, raw: &DataFrame) -> Result<()> {
        let present: Vec<String> = raw
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let expected: Vec<String> = std::iter::once(DATE_COLUMN.to_string())
            .chain(self.schema.columns.iter().map(|rule| rule.source.clone()))
            .collect();

        if expected.iter().any(|name| !present.contains(name)) {
            return Err(HistoryError::SchemaMismatch {
                station: self.station.to_string(),
                context: "raw table".to_string(),
                expected,
                found: present,
            });
        }
        Ok(())
    }

    fn normalize_column(
        &self,
        rule: &ColumnRule,
        cells: &[Option<String>],
        dates: &[Option<String>],
    ) -> Result<Column> {
        let name: PlSmallStr = rule.target.as_str().into();
        let fail = |row: usize, value: &str, reason: String| HistoryError::Normalization {
            station: self.station.to_string(),
            row,
            date: dates[row].clone().unwrap_or_default(),
            column: rule.source.clone(),
            value: value.to_string(),
            reason,
        };

        let column = match rule.kind {
            ColumnKind::Measurement => {
                let mut values = Vec::with_capacity(cells.len());
                for (row, cell) in cells.iter().enumerate() {
                    let value = parse_measurement(cell.as_deref())
                        .map_err(|reason| fail(row, cell.as_deref().unwrap_or(""), reason))?;
                    values.push(value);
                }
                Column::new(name, values)
            }
            ColumnKind::Time => {
                let mut values = Vec::with_capacity(cells.len());
                for (row, cell) in cells.iter().enumerate() {
                    let value = normalize_time(cell.as_deref())
                        .map_err(|reason| fail(row, cell.as_deref().unwrap_or(""), reason))?;
                    values.push(value);
                }
                Column::new(name, values)
            }
            ColumnKind::Text => {
                let values: Vec<Option<String>> = cells
                    .iter()
                    .map(|cell| {
                        cell.as_deref()
                            .map(str::trim)
                            .filter(|text| !text.is_empty())
                            .map(str::to_string)
                    })
                    .collect();
                Column::new(name, values)
            }
        };

        Ok(column)
    }
}

/// Cells of a column as optional strings, casting non-string columns
fn string_cells(frame: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = frame.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|cell| cell.map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{RAW_COLUMNS, canonical};

    fn raw_frame(rows: &[[&str; 10]]) -> DataFrame {
        let mut columns = vec![Column::new(
            DATE_COLUMN.into(),
            vec!["2019-01-01".to_string(); rows.len()],
        )];
        for (index, name) in RAW_COLUMNS.iter().enumerate() {
            let values: Vec<Option<String>> = rows
                .iter()
                .map(|row| Some(row[index]).filter(|s| !s.is_empty()).map(str::to_string))
                .collect();
            columns.push(Column::new((*name).into(), values));
        }
        DataFrame::new(columns).unwrap()
    }

    const HOUR: [&str; 10] = [
        "12:20 AM", "45 F", "41 F", "87 %", "CALM", "0 mph", "0 mph", "25.52 in", "0.0 in", "Fog",
    ];

    fn normalizer() -> Normalizer {
        Normalizer::new(StationCode::new("VNKT").unwrap(), StationSchema::default())
    }

    #[test]
    fn test_strip_unit() {
        assert_eq!(strip_unit("72 F"), "72");
        assert_eq!(strip_unit("29.92 in"), "29.92");
        assert_eq!(strip_unit("72"), "72");
        assert_eq!(strip_unit(strip_unit("72 F")), "72");
        assert_eq!(strip_unit("  "), "");
    }

    #[test]
    fn test_parse_measurement() {
        assert_eq!(parse_measurement(Some("72 F")), Ok(Some(72.0)));
        assert_eq!(parse_measurement(Some("29.92 in")), Ok(Some(29.92)));
        assert_eq!(parse_measurement(Some("-3 F")), Ok(Some(-3.0)));
        assert_eq!(parse_measurement(None), Ok(None));
        assert_eq!(parse_measurement(Some("")), Ok(None));
        assert!(parse_measurement(Some("29,92 in")).is_err());
        assert!(parse_measurement(Some("NaN")).is_err());
        assert!(parse_measurement(Some("-- mph")).is_err());
    }

    #[test]
    fn test_normalize_time() {
        assert_eq!(normalize_time(Some("12:20 AM")), Ok(Some("00:20".to_string())));
        assert_eq!(normalize_time(Some("1:50 PM")), Ok(Some("13:50".to_string())));
        assert_eq!(normalize_time(Some("13:50")), Ok(Some("13:50".to_string())));
        assert_eq!(normalize_time(None), Ok(None));
        assert!(normalize_time(Some("noon")).is_err());
    }

    #[test]
    fn test_normalize_renames_and_coerces() {
        let processed = normalizer().normalize(&raw_frame(&[HOUR, HOUR])).unwrap();

        let names: Vec<String> = processed
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                DATE_COLUMN,
                canonical::TIME,
                canonical::TEMPERATURE,
                canonical::DEW_POINT,
                canonical::HUMIDITY,
                canonical::WIND_DIRECTION,
                canonical::WIND_SPEED,
                canonical::WIND_GUST,
                canonical::PRESSURE,
                canonical::CONDITION,
            ]
        );

        assert_eq!(processed.height(), 2);
        let pressure = processed.column(canonical::PRESSURE).unwrap().f64().unwrap();
        assert_eq!(pressure.get(0), Some(25.52));
        let time = processed.column(canonical::TIME).unwrap().str().unwrap();
        assert_eq!(time.get(1), Some("00:20"));
        let wind = processed.column(canonical::WIND_DIRECTION).unwrap().str().unwrap();
        assert_eq!(wind.get(0), Some("CALM"));
    }

    #[test]
    fn test_precipitation_kept_with_sensor() {
        let schema = StationSchema {
            precipitation_sensor: true,
            ..StationSchema::default()
        };
        let processed = Normalizer::new(StationCode::new("KSEA").unwrap(), schema)
            .normalize(&raw_frame(&[HOUR]))
            .unwrap();

        let precipitation = processed
            .column(canonical::PRECIPITATION)
            .unwrap()
            .f64()
            .unwrap();
        assert_eq!(precipitation.get(0), Some(0.0));
    }

    #[test]
    fn test_missing_cells_become_null() {
        let mut hour = HOUR;
        hour[6] = "";
        let processed = normalizer().normalize(&raw_frame(&[hour])).unwrap();
        let gust = processed.column(canonical::WIND_GUST).unwrap().f64().unwrap();
        assert_eq!(gust.get(0), None);
    }

    #[test]
    fn test_bad_cell_reports_context() {
        let mut bad = HOUR;
        bad[7] = "25,52 in";
        let result = normalizer().normalize(&raw_frame(&[HOUR, bad]));

        match result {
            Err(HistoryError::Normalization {
                station,
                row,
                date,
                column,
                value,
                ..
            }) => {
                assert_eq!(station, "VNKT");
                assert_eq!(row, 1);
                assert_eq!(date, "2019-01-01");
                assert_eq!(column, "Pressure");
                assert_eq!(value, "25,52 in");
            }
            other => panic!("Expected Normalization error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_source_column_is_schema_mismatch() {
        let raw = raw_frame(&[HOUR]).drop("Wind Gust").unwrap();
        assert!(matches!(
            normalizer().normalize(&raw),
            Err(HistoryError::SchemaMismatch { .. })
        ));
    }
}
