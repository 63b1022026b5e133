//! Cell serialisation and cosmetic formatting
//!
//! Values are always written; a failed value write is a data-integrity error
//! and aborts the save. Layout touches (widths, freeze panes, date fallback)
//! are cosmetic: their failures are collected and reported, never raised.
//!
//! Only schema sheets are styled. Other sheets are written cell for cell,
//! with just the number formats their dates and durations need.

use chrono::{Datelike, NaiveDate};
use domidocs_core::{CellValue, Coercion};
use rust_xlsxwriter::{
    ExcelDateTime, Format, FormatAlign, FormatBorder, Formula, Worksheet, XlsxError,
};
use serde::Serialize;

use crate::book::Sheet;

const MIN_WIDTH: usize = 8;
const MAX_WIDTH: usize = 60;
const WRAP_WIDTH: usize = 40;

/// Free-text columns that wrap instead of growing
const WRAPPED_COLUMNS: &[&str] = &["ADRESSE", "LIEU_NAISS"];

/// A formatting step that did not apply
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CosmeticIssue {
    pub sheet: String,
    pub message: String,
}

impl CosmeticIssue {
    fn new(sheet: &str, message: impl Into<String>) -> Self {
        Self {
            sheet: sheet.to_string(),
            message: message.into(),
        }
    }
}

/// Presentation of one column, derived from its header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Date,
    Amount,
    Count,
    Phone,
    Wrapped,
    Plain,
}

impl ColumnKind {
    pub fn for_header(header: &str) -> Self {
        let upper = header.trim().to_ascii_uppercase();
        match Coercion::for_column(&upper) {
            Coercion::Date => ColumnKind::Date,
            Coercion::Numeric if upper == "PARTS" => ColumnKind::Count,
            Coercion::Numeric => ColumnKind::Amount,
            Coercion::Text if upper.contains("PHONE") || upper.starts_with("TEL") => {
                ColumnKind::Phone
            }
            Coercion::Text if WRAPPED_COLUMNS.contains(&upper.as_str()) => ColumnKind::Wrapped,
            Coercion::Text => ColumnKind::Plain,
        }
    }
}

/// Reusable formats
pub(crate) struct Formats {
    header: Format,
    date: Format,
    datetime: Format,
    duration: Format,
    amount: Format,
    count: Format,
    phone: Format,
    wrapped: Format,
}

impl Formats {
    pub(crate) fn new() -> Self {
        Self {
            header: Format::new()
                .set_bold()
                .set_background_color(0xD9E1F2)
                .set_border(FormatBorder::Thin),
            date: Format::new().set_num_format("dd/mm/yyyy"),
            datetime: Format::new().set_num_format("dd/mm/yyyy hh:mm"),
            duration: Format::new().set_num_format("[h]:mm:ss"),
            amount: Format::new()
                .set_num_format("#,##0.00")
                .set_align(FormatAlign::Right),
            count: Format::new()
                .set_num_format("#,##0")
                .set_align(FormatAlign::Right),
            phone: Format::new().set_num_format("@"),
            wrapped: Format::new().set_text_wrap(),
        }
    }
}

/// Write headers and rows; styled sheets also get widths and a frozen
/// header row
pub(crate) fn write_sheet(
    worksheet: &mut Worksheet,
    sheet: &Sheet,
    formats: &Formats,
    styled: bool,
    issues: &mut Vec<CosmeticIssue>,
) -> Result<(), XlsxError> {
    let kinds: Vec<ColumnKind> = sheet
        .headers
        .iter()
        .map(|h| if styled { ColumnKind::for_header(h) } else { ColumnKind::Plain })
        .collect();

    if styled {
        for (col, header) in sheet.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, header, &formats.header)?;
        }
    } else if sheet.header_row.is_empty() {
        for (col, header) in sheet.headers.iter().enumerate().filter(|(_, h)| !h.is_empty()) {
            worksheet.write_string(0, col as u16, header)?;
        }
    } else {
        for (col, cell) in sheet.header_row.iter().enumerate() {
            let plain = ColumnKind::Plain;
            write_cell(worksheet, 0, col as u16, cell, plain, formats, &sheet.name, issues)?;
        }
    }

    for (r, row) in sheet.rows.iter().enumerate() {
        let row_num = (r + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            let kind = kinds.get(c).copied().unwrap_or(ColumnKind::Plain);
            write_cell(worksheet, row_num, c as u16, cell, kind, formats, &sheet.name, issues)?;
        }
    }

    if !styled {
        return Ok(());
    }
    for (col, width) in column_widths(sheet, &kinds).into_iter().enumerate() {
        if let Err(e) = worksheet.set_column_width(col as u16, width as f64) {
            issues.push(CosmeticIssue::new(&sheet.name, format!("column {col} width: {e}")));
        }
    }
    if let Err(e) = worksheet.set_freeze_panes(1, 0) {
        issues.push(CosmeticIssue::new(&sheet.name, format!("freeze header: {e}")));
    }
    Ok(())
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &CellValue,
    kind: ColumnKind,
    formats: &Formats,
    sheet: &str,
    issues: &mut Vec<CosmeticIssue>,
) -> Result<(), XlsxError> {
    match cell {
        CellValue::Empty => {}
        CellValue::Text(s) => match kind {
            ColumnKind::Phone => {
                worksheet.write_string_with_format(row, col, s, &formats.phone)?;
            }
            ColumnKind::Wrapped => {
                worksheet.write_string_with_format(row, col, s, &formats.wrapped)?;
            }
            _ => {
                worksheet.write_string(row, col, s)?;
            }
        },
        CellValue::Number(n) => match number_format(kind, formats) {
            Some(format) => {
                worksheet.write_number_with_format(row, col, *n, format)?;
            }
            None => {
                worksheet.write_number(row, col, *n)?;
            }
        },
        CellValue::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        CellValue::Date(d) => match excel_date(d) {
            Ok(dt) => {
                worksheet.write_datetime_with_format(row, col, &dt, &formats.date)?;
            }
            Err(e) => {
                issues.push(CosmeticIssue::new(
                    sheet,
                    format!("row {row} column {col}: date {d} written as text ({e})"),
                ));
                worksheet.write_string(row, col, cell.to_string())?;
            }
        },
        CellValue::DateTime(serial) => {
            worksheet.write_number_with_format(row, col, *serial, &formats.datetime)?;
        }
        CellValue::Duration(serial) => {
            worksheet.write_number_with_format(row, col, *serial, &formats.duration)?;
        }
        CellValue::Formula { formula, result } => {
            let mut formula = Formula::new(formula);
            if let Some(cached) = cached_result(result) {
                formula = formula.set_result(cached);
            }
            match result_format(result, kind, formats) {
                Some(format) => worksheet.write_formula_with_format(row, col, formula, format)?,
                None => worksheet.write_formula(row, col, formula)?,
            };
        }
    }
    Ok(())
}

fn excel_date(d: &NaiveDate) -> Result<ExcelDateTime, XlsxError> {
    ExcelDateTime::from_ymd(d.year() as u16, d.month() as u8, d.day() as u8)
}

fn number_format(kind: ColumnKind, formats: &Formats) -> Option<&Format> {
    match kind {
        ColumnKind::Amount => Some(&formats.amount),
        ColumnKind::Count => Some(&formats.count),
        _ => None,
    }
}

/// Number format a formula cell needs to show its cached value the same way
fn result_format<'a>(result: &CellValue, kind: ColumnKind, formats: &'a Formats) -> Option<&'a Format> {
    match result {
        CellValue::Date(_) => Some(&formats.date),
        CellValue::DateTime(_) => Some(&formats.datetime),
        CellValue::Duration(_) => Some(&formats.duration),
        CellValue::Formula { result, .. } => result_format(result, kind, formats),
        _ => number_format(kind, formats),
    }
}

/// Cached value as stored in the cell's `<v>` element
fn cached_result(result: &CellValue) -> Option<String> {
    match result {
        CellValue::Empty => None,
        CellValue::Text(s) => Some(s.clone()),
        CellValue::Number(n) | CellValue::DateTime(n) | CellValue::Duration(n) => {
            Some(n.to_string())
        }
        CellValue::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        CellValue::Date(d) => excel_date(d).ok().map(|dt| dt.to_excel().to_string()),
        CellValue::Formula { result, .. } => cached_result(result),
    }
}

/// Widths from the longest rendered cell text, header included
pub fn column_widths(sheet: &Sheet, kinds: &[ColumnKind]) -> Vec<usize> {
    sheet
        .headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            let longest = sheet
                .rows
                .iter()
                .filter_map(|row| row.get(col))
                .map(CellValue::display_len)
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0);
            let cap = match kinds.get(col) {
                Some(ColumnKind::Wrapped) => WRAP_WIDTH,
                _ => MAX_WIDTH,
            };
            (longest + 2).clamp(MIN_WIDTH, cap)
        })
        .collect()
}
