//! Domiciliation contract dates

use chrono::{Months, NaiveDate};

use crate::coerce::parse_numeric;
use crate::value::{CellValue, FieldValue};

/// End of a contract starting on `start` and running `months` months
///
/// The day is clamped to the last day of the target month, so a contract
/// starting on 31 January for one month ends on 28 or 29 February.
pub fn end_date(start: NaiveDate, months: u32) -> Option<NaiveDate> {
    start.checked_add_months(Months::new(months))
}

/// Read a period such as `"12"`, `12` or `"12 mois"` as a month count
pub fn period_months(value: &FieldValue) -> Option<u32> {
    let n = match value {
        FieldValue::Number(n) => *n,
        FieldValue::Text(s) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            parse_numeric(&digits)?
        }
        _ => return None,
    };
    if n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) {
        Some(n as u32)
    } else {
        None
    }
}

/// Fill an empty end date from start date and period
pub fn complete_end_date(start: &CellValue, period: &FieldValue, end: &CellValue) -> CellValue {
    if !end.is_empty() {
        return end.clone();
    }
    match (start.as_date(), period_months(period)) {
        (Some(start), Some(months)) => end_date(start, months)
            .map(CellValue::Date)
            .unwrap_or(CellValue::Empty),
        _ => end.clone(),
    }
}
