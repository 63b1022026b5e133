//! # domidocs-core
//!
//! Domain model shared by the domidocs record store and document renderer.
//!
//! This crate provides:
//! - The canonical three-table schema (`Societes`, `Associes`, `Contrats`)
//! - Declared form-key to column mappings, validated against the schema
//! - Coercion of form values into typed cells (day-first dates, amounts, flags)
//! - Contract end date arithmetic
//! - Template context construction from stored records
//!
//! ## Example
//!
//! ```rust
//! use domidocs_core::{FieldMap, Schema, Table};
//!
//! let map = FieldMap::canonical();
//! map.validate(&Schema::canonical()).unwrap();
//!
//! let column = map.lookup(Table::Company, "denomination").unwrap().column;
//! assert_eq!(column, "DEN_STE");
//! ```

pub mod coerce;
pub mod context;
pub mod contract;
pub mod mapping;
pub mod record;
pub mod schema;
pub mod value;

pub use coerce::Coercion;
pub use context::build_context;
pub use mapping::{FieldMap, FieldMapping, Fields};
pub use record::{FormBatch, Record};
pub use schema::{Schema, Table, TableLayout, COMPANY_REF};
pub use value::{excel_serial_to_date, excel_serial_to_datetime, CellValue, FieldValue};

use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Mapping/schema mismatch detected at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{table}: columns with no form mapping: {}", .columns.join(", "))]
    UnmappedColumns { table: Table, columns: Vec<String> },

    #[error("{table}: key '{key}' maps to unknown column '{column}'")]
    UnknownColumn {
        table: Table,
        key: String,
        column: String,
    },

    #[error("{table}: form key '{key}' declared twice")]
    DuplicateKey { table: Table, key: String },

    #[error("{table}: column '{column}' mapped twice")]
    DuplicateColumn { table: Table, column: String },
}
