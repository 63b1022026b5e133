//! Schema Migrator
//!
//! Folds legacy sheets into the canonical tables. A sheet whose headers
//! overlap a canonical table enough is reindexed onto that table's columns,
//! appended to its sheet, and removed. The workbook is copied to a
//! timestamped backup before anything is rewritten.
//!
//! The overlap threshold and the tie-break between equally good tables are
//! policy, not business rules; both live in [`MigrationPolicy`].

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use domidocs_core::{Schema, Table, TableLayout};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::book::{Book, Sheet, UnreadableSheet};
use crate::error::StoreError;
use crate::style::CosmeticIssue;

/// How to choose between canonical tables with the same overlap
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    /// First table in schema declaration order wins
    #[default]
    #[serde(alias = "declaration-order")]
    First,
    /// Leave the sheet alone
    Skip,
}

/// Matching rules for legacy sheets
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationPolicy {
    /// Minimum share of the legacy sheet's columns found in the table
    pub threshold: f64,
    pub tie_break: TieBreak,
}

impl Default for MigrationPolicy {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            tie_break: TieBreak::First,
        }
    }
}

/// Outcome of matching one legacy sheet
#[derive(Clone, Debug, PartialEq)]
pub enum SheetMatch {
    Table { table: Table, overlap: usize },
    Ambiguous(Vec<Table>),
    NoMatch,
}

/// Pick the canonical table a legacy header row belongs to
pub fn match_table(headers: &[String], schema: &Schema, policy: &MigrationPolicy) -> SheetMatch {
    let legacy: HashSet<String> = headers
        .iter()
        .map(|h| h.trim().to_ascii_uppercase())
        .filter(|h| !h.is_empty())
        .collect();
    if legacy.is_empty() {
        return SheetMatch::NoMatch;
    }
    let needed = policy.threshold * legacy.len() as f64;

    let mut best: Vec<(Table, usize)> = Vec::new();
    for layout in schema.tables() {
        let overlap = layout
            .columns
            .iter()
            .filter(|c| legacy.contains(&c.to_ascii_uppercase()))
            .count();
        if overlap == 0 || (overlap as f64) < needed {
            continue;
        }
        match best.first() {
            Some((_, top)) if overlap < *top => {}
            Some((_, top)) if overlap == *top => best.push((layout.table, overlap)),
            _ => best = vec![(layout.table, overlap)],
        }
    }

    match (best.as_slice(), policy.tie_break) {
        ([], _) => SheetMatch::NoMatch,
        ([(table, overlap)], _) | ([(table, overlap), ..], TieBreak::First) => SheetMatch::Table {
            table: *table,
            overlap: *overlap,
        },
        (tied, TieBreak::Skip) => SheetMatch::Ambiguous(tied.iter().map(|(t, _)| *t).collect()),
    }
}

/// A legacy sheet folded into a canonical one
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MergedSheet {
    pub sheet: String,
    pub table: Table,
    pub rows: usize,
    pub overlap: usize,
}

/// Why a sheet was left out of the migration
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// Could not be decoded; it survives only in the backup
    Unreadable(String),
    NoMatch,
    Ambiguous(Vec<Table>),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkippedSheet {
    pub sheet: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MigrationReport {
    pub backup: Option<PathBuf>,
    pub merged: Vec<MergedSheet>,
    pub skipped: Vec<SkippedSheet>,
    pub cosmetic: Vec<CosmeticIssue>,
}

/// Backup path `<stem>_backup_<YYYYMMDD_HHMMSS><ext>` next to `path`
pub fn backup_path(path: &Path, timestamp: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    path.with_file_name(format!("{stem}_backup_{timestamp}{ext}"))
}

/// Copy the workbook to a timestamped backup
pub fn backup_workbook(path: &Path) -> io::Result<PathBuf> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let target = backup_path(path, &timestamp);
    fs::copy(path, &target)?;
    Ok(target)
}

/// Normalise a workbook onto `schema`
///
/// Backup failure is logged and migration continues. A sheet that cannot be
/// read is skipped; since the workbook is rewritten in full, that is only
/// allowed when a backup exists to keep it.
pub fn migrate_workbook(
    path: &Path,
    schema: &Schema,
    policy: &MigrationPolicy,
) -> Result<MigrationReport, StoreError> {
    if !path.exists() {
        return Err(StoreError::io(
            path,
            io::Error::new(io::ErrorKind::NotFound, "workbook not found"),
        ));
    }

    let backup = match backup_workbook(path) {
        Ok(backup) => {
            info!(backup = %backup.display(), "workbook backed up");
            Some(backup)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "backup failed, migrating anyway");
            None
        }
    };

    let (mut book, unreadable) = Book::load_lenient(path)?;
    let mut report = migrate_book(&mut book, unreadable, backup, schema, policy)?;
    report.cosmetic = book.save(path, schema)?;
    Ok(report)
}

/// Fold the legacy sheets of a loaded workbook into the canonical ones
///
/// `unreadable` are the sheets the load set aside and `backup` the copy
/// taken beforehand, if any. Nothing is written; on error `book` may be
/// partly migrated and must not be saved.
pub fn migrate_book(
    book: &mut Book,
    unreadable: Vec<UnreadableSheet>,
    backup: Option<PathBuf>,
    schema: &Schema,
    policy: &MigrationPolicy,
) -> Result<MigrationReport, StoreError> {
    if !unreadable.is_empty() && backup.is_none() {
        return Err(StoreError::Integrity(format!(
            "{} unreadable sheet(s) would be lost and no backup exists",
            unreadable.len()
        )));
    }
    let mut report = MigrationReport {
        backup,
        ..MigrationReport::default()
    };
    for bad in unreadable {
        report.skipped.push(SkippedSheet {
            sheet: bad.name,
            reason: SkipReason::Unreadable(bad.message),
        });
    }

    for layout in schema.tables() {
        match book.sheet_mut(&layout.sheet) {
            Some(sheet) => sheet.conform_to(&layout.columns),
            None => book.push(Sheet::new(layout.sheet.clone(), layout.columns.clone())),
        }
    }

    let legacy: Vec<Sheet> = book
        .sheets
        .iter()
        .filter(|s| !schema.is_canonical_sheet(&s.name))
        .cloned()
        .collect();
    let mut retired = Vec::new();
    for sheet in &legacy {
        match match_table(&sheet.headers, schema, policy) {
            SheetMatch::Table { table, overlap } => {
                let Some(layout) = schema.layout(table) else {
                    continue;
                };
                let rows = merge_into(book, layout, sheet)?;
                info!(sheet = sheet.name.as_str(), %table, rows, overlap, "legacy sheet merged");
                report.merged.push(MergedSheet {
                    sheet: sheet.name.clone(),
                    table,
                    rows,
                    overlap,
                });
                retired.push(sheet.name.clone());
            }
            SheetMatch::Ambiguous(tables) => {
                warn!(sheet = sheet.name.as_str(), ?tables, "ambiguous legacy sheet left in place");
                report.skipped.push(SkippedSheet {
                    sheet: sheet.name.clone(),
                    reason: SkipReason::Ambiguous(tables),
                });
            }
            SheetMatch::NoMatch => report.skipped.push(SkippedSheet {
                sheet: sheet.name.clone(),
                reason: SkipReason::NoMatch,
            }),
        }
    }

    for name in &retired {
        book.remove(name);
    }
    Ok(report)
}

/// Append a legacy sheet's rows to its table, returning how many moved
fn merge_into(book: &mut Book, layout: &TableLayout, legacy: &Sheet) -> Result<usize, StoreError> {
    let rows = legacy.reindex(&layout.columns);
    let count = rows.len();
    let target = book
        .sheet_mut(&layout.sheet)
        .ok_or_else(|| StoreError::MissingSheet(layout.sheet.clone()))?;
    target.rows.extend(rows);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domidocs_core::TableLayout;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn backup_name_keeps_stem_and_extension() {
        assert_eq!(
            backup_path(Path::new("/data/base.xlsx"), "20240102_030405"),
            PathBuf::from("/data/base_backup_20240102_030405.xlsx")
        );
    }

    #[test]
    fn legacy_company_sheet_matches_case_insensitively() {
        let m = match_table(
            &headers(&["id_societe", "den_ste", "capital", "notes"]),
            &Schema::canonical(),
            &MigrationPolicy::default(),
        );
        assert_eq!(m, SheetMatch::Table { table: Table::Company, overlap: 3 });
    }

    #[test]
    fn overlap_below_threshold_is_no_match() {
        let m = match_table(
            &headers(&["DEN_STE", "A", "B", "C", "D"]),
            &Schema::canonical(),
            &MigrationPolicy::default(),
        );
        assert_eq!(m, SheetMatch::NoMatch);
    }

    #[test]
    fn threshold_is_configurable() {
        let policy = MigrationPolicy { threshold: 0.2, ..MigrationPolicy::default() };
        let m = match_table(&headers(&["DEN_STE", "A", "B", "C", "D"]), &Schema::canonical(), &policy);
        assert_eq!(m, SheetMatch::Table { table: Table::Company, overlap: 1 });
    }

    #[test]
    fn largest_overlap_wins_over_declaration_order() {
        let m = match_table(
            &headers(&["ID_SOCIETE", "DATE_DEBUT", "DATE_FIN", "PRIX_CONTRAT"]),
            &Schema::canonical(),
            &MigrationPolicy::default(),
        );
        assert_eq!(m, SheetMatch::Table { table: Table::Contract, overlap: 4 });
    }

    fn tied_schema() -> Schema {
        Schema::new(vec![
            TableLayout {
                table: Table::Company,
                sheet: "Societes".into(),
                columns: headers(&["ID_SOCIETE", "ADRESSE"]),
            },
            TableLayout {
                table: Table::Associate,
                sheet: "Associes".into(),
                columns: headers(&["ID_ASSOCIE", "ID_SOCIETE", "ADRESSE"]),
            },
        ])
    }

    #[test]
    fn ties_go_to_first_declared_table() {
        let m = match_table(&headers(&["ID_SOCIETE", "ADRESSE"]), &tied_schema(), &MigrationPolicy::default());
        assert_eq!(m, SheetMatch::Table { table: Table::Company, overlap: 2 });
    }

    #[test]
    fn ties_can_be_skipped() {
        let policy = MigrationPolicy { tie_break: TieBreak::Skip, ..MigrationPolicy::default() };
        let m = match_table(&headers(&["ID_SOCIETE", "ADRESSE"]), &tied_schema(), &policy);
        assert_eq!(m, SheetMatch::Ambiguous(vec![Table::Company, Table::Associate]));
    }

    #[test]
    fn empty_header_row_never_matches() {
        let m = match_table(&headers(&["", " "]), &Schema::canonical(), &MigrationPolicy::default());
        assert_eq!(m, SheetMatch::NoMatch);
    }

    #[test]
    fn policy_parses_from_config_names() {
        let policy: MigrationPolicy =
            serde_json::from_str(r#"{"threshold": 0.75, "tie_break": "skip"}"#).unwrap();
        assert_eq!(policy.tie_break, TieBreak::Skip);
        let defaulted: MigrationPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(defaulted, MigrationPolicy::default());
    }
}
