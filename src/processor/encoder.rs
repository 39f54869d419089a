//! One-hot encoding of wind direction and weather condition.

use crate::config::{ConditionColumns, EncodingConfig};
use crate::constants::{CLOUDY_KEYWORDS, RAIN_KEYWORDS, SUN_KEYWORDS, canonical};
use crate::error::Result;
use crate::models::ConditionCategory;
use polars::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Bucket a condition phrase into the fixed taxonomy
///
/// Keyword lists are checked case-insensitively in the order Rain, Cloudy,
/// Sun; the first match wins. Missing cells and unmatched phrases are Other.
pub fn classify_condition(cell: Option<&str>) -> ConditionCategory {
    let Some(text) = cell else {
        return ConditionCategory::Other;
    };
    let text = text.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|keyword| text.contains(keyword));

    if mentions(RAIN_KEYWORDS) {
        ConditionCategory::Rain
    } else if mentions(CLOUDY_KEYWORDS) {
        ConditionCategory::Cloudy
    } else if mentions(SUN_KEYWORDS) {
        ConditionCategory::Sun
    } else {
        ConditionCategory::Other
    }
}

/// Replaces categorical columns with boolean indicator columns
#[derive(Debug, Clone)]
pub struct CategoryEncoder {
    condition_columns: ConditionColumns,
}

impl CategoryEncoder {
    pub fn new(config: &EncodingConfig) -> Self {
        Self {
            condition_columns: config.condition_columns,
        }
    }

    /// Encode a processed table
    ///
    /// Wind Direction and Condition are removed; one column per observed wind
    /// direction is appended, then the condition category columns.
    pub fn encode(&self, processed: &DataFrame) -> Result<DataFrame> {
        let directions = optional_strings(processed, canonical::WIND_DIRECTION)?;
        let conditions: Vec<ConditionCategory> =
            optional_strings(processed, canonical::CONDITION)?
                .iter()
                .map(|cell| classify_condition(cell.as_deref()))
                .collect();

        let mut columns: Vec<Column> = processed
            .get_columns()
            .iter()
            .filter(|column| {
                let name = column.name().as_str();
                name != canonical::WIND_DIRECTION && name != canonical::CONDITION
            })
            .cloned()
            .collect();

        let wind_columns = wind_indicators(&directions);
        debug!("Encoding {} wind directions", wind_columns.len());
        columns.extend(wind_columns);
        columns.extend(self.condition_indicators(&conditions));

        let encoded = DataFrame::new(columns)?;
        info!(
            "Encoded {} rows into {} columns",
            encoded.height(),
            encoded.width()
        );
        Ok(encoded)
    }

    fn condition_indicators(&self, conditions: &[ConditionCategory]) -> Vec<Column> {
        ConditionCategory::ALL
            .iter()
            .filter(|category| {
                self.condition_columns == ConditionColumns::Full || conditions.contains(category)
            })
            .map(|category| {
                let flags: Vec<bool> = conditions.iter().map(|c| c == category).collect();
                Column::new(category.label().into(), flags)
            })
            .collect()
    }
}

/// One column per distinct non-null direction, sorted by name
fn wind_indicators(directions: &[Option<String>]) -> Vec<Column> {
    let distinct: BTreeSet<&str> = directions.iter().flatten().map(String::as_str).collect();

    distinct
        .into_iter()
        .map(|direction| {
            let flags: Vec<bool> = directions
                .iter()
                .map(|cell| cell.as_deref() == Some(direction))
                .collect();
            Column::new(direction.into(), flags)
        })
        .collect()
}

/// Column cells as strings; non-string columns are cast first
fn optional_strings(frame: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = frame.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|cell| cell.map(str::to_string))
        .collect())
}
