//! Coercion of form values into typed cells
//!
//! Rules, applied per column:
//! - columns whose name contains `DATE` hold day-first dates; unparseable
//!   input becomes an empty cell instead of an error
//! - count and currency columns become numbers when the text reads as one
//!   (spaces stripped, comma as decimal point), otherwise stay text
//! - booleans become `0`/`1` whatever the column
//! - everything else is stored as text

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::value::{format_number, CellValue, FieldValue};

/// Columns holding counts or amounts
pub const NUMERIC_COLUMNS: &[&str] = &[
    "CAPITAL",
    "PARTS",
    "CAPITAL_DETENU",
    "PRIX_CONTRAT",
    "PRIX_INTERMEDIARE_CONTRAT",
];

// Two-digit years first: `%Y` would also accept "24" as year 24.
const DATE_FORMATS: &[&str] = &["%d/%m/%y", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// How a column's input is converted before storage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coercion {
    Date,
    Numeric,
    Text,
}

impl Coercion {
    /// Rule derived from the column name
    pub fn for_column(column: &str) -> Coercion {
        let upper = column.to_ascii_uppercase();
        if upper.contains("DATE") {
            Coercion::Date
        } else if NUMERIC_COLUMNS.contains(&upper.as_str()) {
            Coercion::Numeric
        } else {
            Coercion::Text
        }
    }

    pub fn apply(self, value: &FieldValue) -> CellValue {
        match value {
            FieldValue::Null => CellValue::Empty,
            FieldValue::Bool(b) => CellValue::Number(if *b { 1.0 } else { 0.0 }),
            FieldValue::Number(n) => match self {
                Coercion::Numeric => CellValue::Number(*n),
                Coercion::Text => CellValue::Text(format_number(*n)),
                Coercion::Date => parse_date_cell(&format_number(*n)),
            },
            FieldValue::Text(s) => match self {
                Coercion::Date => parse_date_cell(s),
                Coercion::Numeric => match parse_numeric(s) {
                    Some(n) => CellValue::Number(n),
                    None if s.trim().is_empty() => CellValue::Empty,
                    None => CellValue::Text(s.clone()),
                },
                Coercion::Text => CellValue::Text(s.clone()),
            },
        }
    }
}

fn parse_date_cell(input: &str) -> CellValue {
    match parse_day_first_date(input) {
        Some(date) => CellValue::Date(date),
        None => {
            if !input.trim().is_empty() {
                debug!(input, "unparseable date stored as empty cell");
            }
            CellValue::Empty
        }
    }
}

/// Parse a date, reading ambiguous forms day first
pub fn parse_day_first_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Parse an amount such as `"10 000"` or `"1500,50"`
pub fn parse_numeric(input: &str) -> Option<f64> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}
