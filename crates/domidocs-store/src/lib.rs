//! # domidocs-store
//!
//! Spreadsheet-backed record store for the domiciliation office.
//!
//! This crate provides:
//! - [`WorkbookStore`]: creates the workbook, assigns incrementing
//!   identifiers and appends company/associate/contract rows without ever
//!   misaligning columns
//! - [`migrate_workbook`]: folds legacy sheets into the canonical tables after
//!   taking a timestamped backup
//! - a formatting pass (date formats, widths, header styling) whose failures
//!   are reported as [`CosmeticIssue`]s instead of errors
//!
//! ## Example
//!
//! ```rust,ignore
//! use domidocs_core::{FieldValue, FormBatch, Fields};
//! use domidocs_store::WorkbookStore;
//!
//! let store = WorkbookStore::new("base.xlsx")?;
//! let mut company = Fields::new();
//! company.insert("denomination".into(), FieldValue::from("ACME"));
//! let outcome = store.write_records(&FormBatch::new().company(company))?;
//! assert_eq!(outcome.company_id, Some(1));
//! ```

pub mod book;
pub mod error;
pub mod migrate;
pub mod store;
pub mod style;

pub use book::{Book, Sheet, UnreadableSheet};
pub use error::StoreError;
pub use migrate::{
    backup_workbook, match_table, migrate_book, migrate_workbook, MigrationPolicy, MigrationReport,
    SheetMatch, SkipReason, TieBreak,
};
pub use store::{ensure_schema, next_identifier, CompanyBundle, WorkbookStore, WriteOutcome};
pub use style::CosmeticIssue;
