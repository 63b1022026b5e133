//! Workbook Store
//!
//! Append-only persistence of company, associate and contract rows into one
//! workbook with a sheet per table.
//!
//! ## Write path
//!
//! 1. make sure the file and the canonical sheets exist
//! 2. compute the next identifier of every touched table
//! 3. coerce the form fields into rows laid out on the canonical columns
//! 4. reindex the existing rows onto the canonical columns, append, and
//!    rewrite the whole workbook
//!
//! Step 4 is the only write strategy. Rows are never appended in place, so
//! a sheet whose on-disk column order drifted is repaired rather than
//! extended with misaligned cells.
//!
//! Writes are not locked. Callers must serialise calls to
//! [`WorkbookStore::write_records`] and [`crate::migrate_workbook`] on the
//! same file.

use std::path::{Path, PathBuf};

use domidocs_core::contract::complete_end_date;
use domidocs_core::{
    CellValue, FieldMap, FieldValue, Fields, FormBatch, Record, Schema, Table, TableLayout,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::book::{Book, Sheet};
use crate::error::StoreError;
use crate::style::CosmeticIssue;

/// Identifiers assigned by one [`WorkbookStore::write_records`] call
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct WriteOutcome {
    pub company_id: Option<i64>,
    pub associate_ids: Vec<i64>,
    pub contract_id: Option<i64>,
    /// Formatting steps that failed without affecting the data
    pub cosmetic: Vec<CosmeticIssue>,
}

/// Create the workbook or add the canonical sheets it lacks
///
/// Existing sheets keep their content. Returns `true` when the file was
/// created or modified.
pub fn ensure_schema(path: &Path, schema: &Schema) -> Result<bool, StoreError> {
    if !path.exists() {
        let mut book = Book::new();
        for layout in schema.tables() {
            book.push(Sheet::new(layout.sheet.clone(), layout.columns.clone()));
        }
        book.save(path, schema)?;
        info!(path = %path.display(), "workbook created");
        return Ok(true);
    }

    let mut book = Book::load(path)?;
    let missing: Vec<&TableLayout> = schema
        .tables()
        .iter()
        .filter(|l| !book.contains(&l.sheet))
        .collect();
    if missing.is_empty() {
        return Ok(false);
    }
    for layout in missing {
        info!(sheet = layout.sheet.as_str(), "adding missing sheet");
        book.push(Sheet::new(layout.sheet.clone(), layout.columns.clone()));
    }
    book.save(path, schema)?;
    Ok(true)
}

/// Next free identifier of a sheet
///
/// `max + 1` over the numeric cells of `id_column`. When no cell is numeric
/// the count of non-blank rows plus one is used instead, which is `1` for an
/// empty sheet. Numbers too large to count from (beyond 2^53, where `f64`
/// stops being exact) are not identifiers and are ignored.
pub fn next_identifier(sheet: &Sheet, id_column: &str) -> i64 {
    let max = sheet
        .column_values(id_column)
        .filter_map(CellValue::as_f64)
        .filter(|n| {
            let usable = n.abs() < MAX_EXACT_ID;
            if !usable {
                warn!(
                    sheet = sheet.name.as_str(),
                    column = id_column,
                    value = n,
                    "identifier out of range, ignored"
                );
            }
            usable
        })
        .map(|n| n.floor() as i64)
        .max();
    match max {
        Some(max) => max + 1,
        None => {
            let rows = sheet.data_rows().count();
            if rows > 0 {
                warn!(
                    sheet = sheet.name.as_str(),
                    column = id_column,
                    rows,
                    "no numeric identifier found, falling back to row count"
                );
            }
            rows as i64 + 1
        }
    }
}

/// 2^53
const MAX_EXACT_ID: f64 = 9_007_199_254_740_992.0;

/// Spreadsheet-backed record store
#[derive(Clone, Debug)]
pub struct WorkbookStore {
    path: PathBuf,
    schema: Schema,
    fields: FieldMap,
}

impl WorkbookStore {
    /// Store over the canonical schema and form mapping
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::with_schema(path, Schema::canonical(), FieldMap::canonical())
    }

    /// Store over a custom layout; the mapping is validated against it
    pub fn with_schema(
        path: impl Into<PathBuf>,
        schema: Schema,
        fields: FieldMap,
    ) -> Result<Self, StoreError> {
        fields.validate(&schema)?;
        Ok(Self {
            path: path.into(),
            schema,
            fields,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn ensure_schema(&self) -> Result<bool, StoreError> {
        ensure_schema(&self.path, &self.schema)
    }

    fn layout(&self, table: Table) -> Result<&TableLayout, StoreError> {
        self.schema
            .layout(table)
            .ok_or_else(|| StoreError::MissingSheet(table.sheet_name().to_string()))
    }

    /// Identifier the next row of `table` would receive
    pub fn next_identifier(&self, table: Table) -> Result<i64, StoreError> {
        self.ensure_schema()?;
        let book = Book::load(&self.path)?;
        let layout = self.layout(table)?;
        let sheet = book
            .sheet(&layout.sheet)
            .ok_or_else(|| StoreError::MissingSheet(layout.sheet.clone()))?;
        Ok(next_identifier(sheet, table.id_column()))
    }

    /// Persist one form save
    ///
    /// A company is written when its fields carry any value; associates and
    /// the contract are stamped with that company's identifier, or left
    /// without one when no company is part of the batch.
    pub fn write_records(&self, batch: &FormBatch) -> Result<WriteOutcome, StoreError> {
        self.ensure_schema()?;
        let mut book = Book::load(&self.path)?;
        let mut outcome = WriteOutcome::default();

        if let Some(fields) = batch.company_fields() {
            let ids = self.append(&mut book, Table::Company, std::slice::from_ref(fields), None)?;
            outcome.company_id = ids.first().copied();
        }
        if !batch.associates.is_empty() {
            outcome.associate_ids =
                self.append(&mut book, Table::Associate, &batch.associates, outcome.company_id)?;
        }
        if let Some(fields) = batch.contract_fields() {
            let ids = self.append(
                &mut book,
                Table::Contract,
                std::slice::from_ref(fields),
                outcome.company_id,
            )?;
            outcome.contract_id = ids.first().copied();
        }

        outcome.cosmetic = book.save(&self.path, &self.schema)?;
        info!(
            company = ?outcome.company_id,
            associates = outcome.associate_ids.len(),
            contract = ?outcome.contract_id,
            "records written"
        );
        Ok(outcome)
    }

    /// Append rows to one table's sheet, returning their identifiers
    fn append(
        &self,
        book: &mut Book,
        table: Table,
        records: &[Fields],
        company_id: Option<i64>,
    ) -> Result<Vec<i64>, StoreError> {
        let layout = self.layout(table)?;
        let sheet = book
            .sheet_mut(&layout.sheet)
            .ok_or_else(|| StoreError::MissingSheet(layout.sheet.clone()))?;

        sheet.conform_to(&layout.columns);
        let first_id = next_identifier(sheet, table.id_column());
        let id_idx = column_position(layout, table.id_column())?;
        let ref_idx = match table.company_ref() {
            Some(col) => Some(column_position(layout, col)?),
            None => None,
        };

        let mut ids = Vec::with_capacity(records.len());
        for (offset, fields) in records.iter().enumerate() {
            let id = first_id + offset as i64;
            let mut row = self.fields.build_row(table, fields, &layout.columns);
            row[id_idx] = CellValue::Number(id as f64);
            if let Some(idx) = ref_idx {
                row[idx] = company_id
                    .map(|c| CellValue::Number(c as f64))
                    .unwrap_or(CellValue::Empty);
            }
            if table == Table::Contract {
                self.fill_end_date(layout, fields, &mut row);
            }
            debug!(%table, id, "row appended");
            sheet.rows.push(row);
            ids.push(id);
        }
        Ok(ids)
    }

    fn fill_end_date(&self, layout: &TableLayout, fields: &Fields, row: &mut [CellValue]) {
        let position = |col: &str| layout.columns.iter().position(|c| c == col);
        let (Some(start), Some(end)) = (position("DATE_DEBUT"), position("DATE_FIN")) else {
            return;
        };
        let period = fields
            .iter()
            .find(|(key, _)| {
                self.fields
                    .lookup(Table::Contract, key)
                    .is_some_and(|m| m.column == "PERIOD_DOMCILIATION")
            })
            .map(|(_, v)| v.clone())
            .unwrap_or(FieldValue::Null);
        row[end] = complete_end_date(&row[start], &period, &row[end]);
    }

    /// Stored rows of one table, laid out on the canonical columns
    pub fn read_table(&self, table: Table) -> Result<Vec<Record>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let book = Book::load(&self.path)?;
        let layout = self.layout(table)?;
        let Some(sheet) = book.sheet(&layout.sheet) else {
            return Ok(Vec::new());
        };
        Ok(sheet
            .reindex(&layout.columns)
            .into_iter()
            .map(|row| Record::new(table, layout.columns.iter().cloned().zip(row).collect()))
            .collect())
    }

    /// A company with its associates and most recent contract
    pub fn company_bundle(&self, company_id: i64) -> Result<Option<CompanyBundle>, StoreError> {
        let Some(company) = self
            .read_table(Table::Company)?
            .into_iter()
            .find(|r| r.id() == Some(company_id))
        else {
            return Ok(None);
        };
        let associates = self
            .read_table(Table::Associate)?
            .into_iter()
            .filter(|r| r.company_id() == Some(company_id))
            .collect();
        let contract = self
            .read_table(Table::Contract)?
            .into_iter()
            .filter(|r| r.company_id() == Some(company_id))
            .max_by_key(|r| r.id());
        Ok(Some(CompanyBundle {
            company,
            associates,
            contract,
        }))
    }
}

/// Everything stored about one company
#[derive(Clone, Debug, PartialEq)]
pub struct CompanyBundle {
    pub company: Record,
    pub associates: Vec<Record>,
    pub contract: Option<Record>,
}

fn column_position(layout: &TableLayout, column: &str) -> Result<usize, StoreError> {
    layout.columns.iter().position(|c| c == column).ok_or_else(|| {
        StoreError::Integrity(format!("sheet '{}' has no '{}' column", layout.sheet, column))
    })
}
