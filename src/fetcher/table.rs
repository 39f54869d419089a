//! Extraction of the observation table from a history page.
//!
//! A history page carries several tables (daily summary, monthly almanac,
//! hourly observations). The observation table is the one whose header row
//! matches the station's expected columns.

use crate::constants::MAX_ROWS_PER_DAY;
use crate::models::matches_layout;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// Header and body cells of a table, as display text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// What a page holds in place of the observation table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageTable {
    /// No table has rendered yet
    Missing,
    /// A table with the expected header set
    Observation(ParsedTable),
    /// Tables are present but none has the expected headers; holds the last one
    Unrecognized(ParsedTable),
}

struct Selectors {
    table: Selector,
    head_cell: Selector,
    body_row: Selector,
    row: Selector,
    cell: Selector,
}

static SELECTORS: LazyLock<Selectors> = LazyLock::new(|| {
    let parse = |css: &str| Selector::parse(css).expect("valid table selector");
    Selectors {
        table: parse("table"),
        head_cell: parse("thead th, thead td"),
        body_row: parse("tbody tr"),
        row: parse("tr"),
        cell: parse("th, td"),
    }
});

/// Visible text of an element with child texts joined by single spaces
///
/// `<span>72</span><span>°F</span>` yields `72 °F`.
fn cell_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn row_cells(row: ElementRef<'_>) -> Vec<String> {
    row.select(&SELECTORS.cell).map(cell_text).collect()
}

/// Headers come from `thead` when present, otherwise from the first row.
/// At most [`MAX_ROWS_PER_DAY`] body rows are kept; rows without cells are
/// skipped.
fn parse_table(table: ElementRef<'_>) -> ParsedTable {
    let mut headers: Vec<String> = table.select(&SELECTORS.head_cell).map(cell_text).collect();
    let mut body: Vec<Vec<String>> = if table.select(&SELECTORS.body_row).next().is_some() {
        table.select(&SELECTORS.body_row).map(row_cells).collect()
    } else {
        table.select(&SELECTORS.row).map(row_cells).collect()
    };

    if headers.is_empty() && !body.is_empty() {
        headers = body.remove(0);
    }

    let rows = body
        .into_iter()
        .filter(|cells| !cells.is_empty())
        .take(MAX_ROWS_PER_DAY)
        .collect();

    ParsedTable { headers, rows }
}

/// Locate the table in `html` whose headers match `expected`
///
/// Tables are tried in document order and the first match wins.
pub fn find_observation_table<S: AsRef<str>>(html: &str, expected: &[S]) -> PageTable {
    let document = Html::parse_document(html);
    let mut last = None;

    for element in document.select(&SELECTORS.table) {
        let table = parse_table(element);
        if matches_layout(expected, &table.headers) {
            return PageTable::Observation(table);
        }
        last = Some(table);
    }

    match last {
        Some(table) => PageTable::Unrecognized(table),
        None => PageTable::Missing,
    }
}
