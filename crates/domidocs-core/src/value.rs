//! Input field values and stored cell values

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Value supplied by the form layer for one field
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
}

impl FieldValue {
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// Typed content of one worksheet cell
///
/// Sheets are rewritten in full on every save, so every kind of cell a
/// workbook can hold needs a variant that writes back unchanged.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    /// Excel serial carrying a time of day
    DateTime(f64),
    /// Excel serial shown as elapsed time
    Duration(f64),
    /// Formula without its leading `=`, plus the value Excel last computed
    Formula {
        formula: String,
        result: Box<CellValue>,
    },
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Numeric reading of the cell; text is accepted when it parses cleanly
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Formula { result, .. } => result.as_f64(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::DateTime(serial) => excel_serial_to_date(*serial),
            CellValue::Formula { result, .. } => result.as_date(),
            _ => None,
        }
    }

    /// Text the cell shows once formatted, used for column width estimation
    pub fn display_len(&self) -> usize {
        match self {
            CellValue::Empty => 0,
            CellValue::Text(s) => s.chars().count(),
            CellValue::Number(n) => format_number(*n).len() + thousands_separators(*n),
            CellValue::Date(_) => 10,
            CellValue::Formula { result, .. } => result.display_len(),
            other => other.to_string().chars().count(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Date(d) => write!(f, "{}", d.format("%d/%m/%Y")),
            CellValue::DateTime(serial) => match excel_serial_to_datetime(*serial) {
                Some(dt) => write!(f, "{}", dt.format("%d/%m/%Y %H:%M")),
                None => f.write_str(&format_number(*serial)),
            },
            CellValue::Duration(serial) => f.write_str(&format_duration(*serial)),
            CellValue::Formula { result, .. } => write!(f, "{result}"),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_none(),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serializer.serialize_i64(*n as i64)
            }
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            CellValue::DateTime(serial) => match excel_serial_to_datetime(*serial) {
                Some(dt) => serializer.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
                None => serializer.serialize_f64(*serial),
            },
            CellValue::Duration(serial) => serializer.serialize_str(&format_duration(*serial)),
            CellValue::Formula { result, .. } => result.serialize(serializer),
        }
    }
}

/// Render a number without a trailing `.0` when it is integral
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn thousands_separators(n: f64) -> usize {
    let digits = format!("{}", n.abs().trunc() as i64).len();
    digits.saturating_sub(1) / 3
}

/// Date part of an Excel serial in the 1900 date system
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let days = serial.floor() as i64;
    // Serials before 1 March 1900 are offset by Excel's phantom 29 Feb 1900.
    let epoch = if days < 61 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    epoch.checked_add_signed(Duration::days(days))
}

/// Date and time of day of an Excel serial, to the second
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let date = excel_serial_to_date(serial)?;
    let seconds = (serial.fract() * SECONDS_PER_DAY).round() as i64;
    date.and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::seconds(seconds))
}

const SECONDS_PER_DAY: f64 = 86_400.0;

/// `h:mm:ss` with unbounded hours, as Excel's `[h]:mm:ss`
fn format_duration(serial: f64) -> String {
    let total = (serial.abs() * SECONDS_PER_DAY).round() as i64;
    let sign = if serial < 0.0 { "-" } else { "" };
    format!("{sign}{}:{:02}:{:02}", total / 3600, total / 60 % 60, total % 60)
}
