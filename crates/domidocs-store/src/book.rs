//! In-memory workbook
//!
//! The workbook is read with calamine and written back in full with
//! rust_xlsxwriter. There is no in-place append: every save serialises every
//! sheet, which is what keeps column order under control.
//!
//! Cells keep their position, their type and their formula, so sheets
//! outside the schema survive a save with the same content. Cell styles and
//! sheet layout other than number formats are not carried over.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use domidocs_core::coerce::parse_day_first_date;
use domidocs_core::{excel_serial_to_date, CellValue, Schema};
use rust_xlsxwriter::Workbook;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::style::{self, CosmeticIssue, Formats};

static EMPTY: CellValue = CellValue::Empty;

/// One worksheet: a header row plus data rows
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    /// First row as read, kept so non-text header cells write back as they were
    pub header_row: Vec<CellValue>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            header_row: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Split a cell grid into the header row and the rows below it
    fn from_grid(name: String, grid: Vec<Vec<CellValue>>) -> Self {
        let mut rows = grid.into_iter();
        let header_row = rows.next().unwrap_or_default();
        let headers = header_row
            .iter()
            .map(|c| c.to_string().trim().to_string())
            .collect();
        Self {
            name,
            headers,
            header_row,
            rows: rows.collect(),
        }
    }

    /// Position of a header, ignoring case and surrounding blanks
    pub fn column_index(&self, column: &str) -> Option<usize> {
        let wanted = column.trim();
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(wanted))
    }

    /// Values of one column, empty cells included
    pub fn column_values<'a>(&'a self, column: &str) -> impl Iterator<Item = &'a CellValue> + 'a {
        let idx = self.column_index(column);
        self.rows
            .iter()
            .map(move |row| idx.and_then(|i| row.get(i)).unwrap_or(&EMPTY))
    }

    /// Rows holding at least one value
    pub fn data_rows(&self) -> impl Iterator<Item = &Vec<CellValue>> + '_ {
        self.rows.iter().filter(|row| row.iter().any(|c| !c.is_empty()))
    }

    /// Rows rebuilt on `columns`: absent columns become empty, extras and
    /// blank rows are dropped
    pub fn reindex(&self, columns: &[String]) -> Vec<Vec<CellValue>> {
        let positions: Vec<Option<usize>> =
            columns.iter().map(|c| self.column_index(c)).collect();
        self.data_rows()
            .map(|row| {
                positions
                    .iter()
                    .map(|p| p.and_then(|i| row.get(i)).cloned().unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    /// Rewrite this sheet so its header is exactly `columns`
    pub fn conform_to(&mut self, columns: &[String]) {
        if self.headers == columns {
            self.rows.retain(|row| row.iter().any(|c| !c.is_empty()));
            return;
        }
        self.rows = self.reindex(columns);
        self.headers = columns.to_vec();
        self.header_row.clear();
    }
}

/// A sheet calamine could not decode
#[derive(Clone, Debug, PartialEq)]
pub struct UnreadableSheet {
    pub name: String,
    pub message: String,
}

/// All sheets of a workbook, in workbook order
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Book {
    pub sheets: Vec<Sheet>,
}

impl Book {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every sheet; any unreadable sheet fails the whole load
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let (book, unreadable) = Self::load_lenient(path)?;
        match unreadable.into_iter().next() {
            Some(bad) => Err(StoreError::Integrity(format!(
                "sheet '{}' of {} cannot be read: {}",
                bad.name,
                path.display(),
                bad.message
            ))),
            None => Ok(book),
        }
    }

    /// Read every sheet, setting aside the ones that fail to decode
    pub fn load_lenient(path: &Path) -> Result<(Self, Vec<UnreadableSheet>), StoreError> {
        let mut workbook: Xlsx<BufReader<File>> =
            open_workbook(path).map_err(|e| StoreError::read(path, e))?;

        let mut book = Book::new();
        let mut unreadable = Vec::new();
        for name in workbook.sheet_names() {
            let grid = match workbook.worksheet_range(&name) {
                Ok(values) => workbook
                    .worksheet_formula(&name)
                    .map(|formulas| cell_grid(&values, &formulas)),
                Err(e) => Err(e),
            };
            match grid {
                Ok(grid) => {
                    let sheet = Sheet::from_grid(name, grid);
                    debug!(sheet = sheet.name.as_str(), rows = sheet.rows.len(), "sheet loaded");
                    book.sheets.push(sheet);
                }
                Err(e) => {
                    warn!(sheet = name.as_str(), error = %e, "sheet skipped: cannot be read");
                    unreadable.push(UnreadableSheet { name, message: e.to_string() });
                }
            }
        }
        Ok((book, unreadable))
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sheet(name).is_some()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn push(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    pub fn remove(&mut self, name: &str) -> Option<Sheet> {
        let idx = self.sheets.iter().position(|s| s.name == name)?;
        Some(self.sheets.remove(idx))
    }

    /// Serialise every sheet and replace the file at `path`
    ///
    /// Sheets of `schema` get the header styling and column layout; any
    /// other sheet is written as it was read. The bytes go to a sibling temp
    /// file first and are renamed over the target, so a failed save leaves
    /// the previous workbook intact.
    pub fn save(&self, path: &Path, schema: &Schema) -> Result<Vec<CosmeticIssue>, StoreError> {
        let mut workbook = Workbook::new();
        let formats = Formats::new();
        let mut issues = Vec::new();

        for sheet in &self.sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet.name)?;
            let styled = schema.is_canonical_sheet(&sheet.name);
            style::write_sheet(worksheet, sheet, &formats, styled, &mut issues)?;
        }

        let bytes = workbook.save_to_buffer()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let tmp = temp_path(path);
        fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::io(path, e));
        }

        for issue in &issues {
            warn!(sheet = issue.sheet.as_str(), "{}", issue.message);
        }
        Ok(issues)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Cells of a sheet at their absolute position, starting from A1
///
/// calamine trims the ranges to the used area, so the grid is padded back
/// to the top-left corner. Formulas are laid over their cached values.
fn cell_grid(values: &Range<Data>, formulas: &Range<String>) -> Vec<Vec<CellValue>> {
    let mut grid: Vec<Vec<CellValue>> = Vec::new();
    if let Some((top, left)) = values.start() {
        grid.resize(top as usize, Vec::new());
        for row in values.rows() {
            let mut cells = vec![CellValue::Empty; left as usize];
            cells.extend(row.iter().map(cell_from_data));
            grid.push(cells);
        }
    }

    let Some((top, left)) = formulas.start() else {
        return grid;
    };
    for (r, c, formula) in formulas.used_cells() {
        if formula.is_empty() {
            continue;
        }
        let (row, col) = (top as usize + r, left as usize + c);
        if grid.len() <= row {
            grid.resize(row + 1, Vec::new());
        }
        let cells = &mut grid[row];
        if cells.len() <= col {
            cells.resize(col + 1, CellValue::Empty);
        }
        let cached = std::mem::take(&mut cells[col]);
        cells[col] = CellValue::Formula {
            formula: formula.clone(),
            result: Box::new(cached),
        };
    }
    grid
}

fn cell_from_data(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => CellValue::Duration(dt.as_f64()),
        Data::DateTime(dt) => serial_cell(dt.as_f64()),
        Data::DateTimeIso(s) => parse_day_first_date(s)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// A whole serial is a plain date; anything else keeps its time of day
fn serial_cell(serial: f64) -> CellValue {
    if serial.fract() != 0.0 {
        return CellValue::DateTime(serial);
    }
    excel_serial_to_date(serial)
        .map(CellValue::Date)
        .unwrap_or(CellValue::DateTime(serial))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sheet() -> Sheet {
        Sheet {
            name: "Feuil1".into(),
            headers: vec!["NOM".into(), " den_ste ".into(), "EXTRA".into()],
            header_row: Vec::new(),
            rows: vec![vec![
                CellValue::Text("Alaoui".into()),
                CellValue::Text("ACME".into()),
                CellValue::Text("drop me".into()),
            ]],
        }
    }

    #[test]
    fn reindex_matches_headers_case_insensitively() {
        let columns = vec!["ID_SOCIETE".to_string(), "DEN_STE".to_string()];
        assert_eq!(
            sheet().reindex(&columns),
            vec![vec![CellValue::Empty, CellValue::Text("ACME".into())]]
        );
    }

    #[test]
    fn conform_to_replaces_headers() {
        let mut s = sheet();
        let columns = vec!["DEN_STE".to_string(), "NOM".to_string()];
        s.conform_to(&columns);
        assert_eq!(s.headers, columns);
        assert_eq!(s.rows[0][1], CellValue::Text("Alaoui".into()));
    }

    #[test]
    fn column_values_pad_missing_columns() {
        let s = sheet();
        let missing: Vec<_> = s.column_values("ID_SOCIETE").collect();
        assert_eq!(missing, vec![&CellValue::Empty]);
    }

    #[test]
    fn serials_split_into_dates_and_datetimes() {
        assert_eq!(
            serial_cell(45292.0),
            CellValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
        assert_eq!(serial_cell(45292.75), CellValue::DateTime(45292.75));
        assert_eq!(serial_cell(0.0), CellValue::DateTime(0.0));
    }

    #[test]
    fn blank_rows_are_kept_until_conformed() {
        let mut s = sheet();
        s.rows.insert(0, vec![CellValue::Empty; 3]);
        assert_eq!(s.data_rows().count(), 1);
        assert_eq!(s.reindex(&["NOM".to_string()]).len(), 1);

        let headers = s.headers.clone();
        s.conform_to(&headers);
        assert_eq!(s.rows.len(), 1);
    }

    #[test]
    fn grid_from_headers_and_rows() {
        let s = Sheet::from_grid(
            "Notes".into(),
            vec![
                vec![CellValue::Text(" Titre ".into()), CellValue::Empty],
                vec![CellValue::Empty, CellValue::Bool(true)],
            ],
        );
        assert_eq!(s.headers, vec!["Titre".to_string(), String::new()]);
        assert_eq!(s.header_row[0], CellValue::Text(" Titre ".into()));
        assert_eq!(s.rows, vec![vec![CellValue::Empty, CellValue::Bool(true)]]);
    }

    #[test]
    fn temp_path_is_a_sibling() {
        assert_eq!(temp_path(Path::new("/data/db.xlsx")), PathBuf::from("/data/db.xlsx.tmp"));
    }

    #[test]
    fn book_sheet_lookup_and_removal() {
        let mut book = Book::new();
        book.push(Sheet::new("Societes", vec![]));
        book.push(sheet());
        assert_eq!(book.sheet_names(), vec!["Societes", "Feuil1"]);
        assert!(book.remove("Feuil1").is_some());
        assert!(!book.contains("Feuil1"));
    }
}
