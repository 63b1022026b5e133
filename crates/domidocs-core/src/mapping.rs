//! Declared translation from form keys to canonical columns
//!
//! Each record type has a table of `(key, column, coercion)` triples. The
//! table is validated against the schema when a store is built, so a column
//! nobody fills is reported up front instead of showing up as blank cells.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::coerce::Coercion;
use crate::schema::{Schema, Table};
use crate::value::{CellValue, FieldValue};
use crate::ConfigError;

/// Form fields for one record, keyed by collaborator name
pub type Fields = BTreeMap<String, FieldValue>;

/// One form key feeding one canonical column
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldMapping {
    pub key: &'static str,
    pub column: &'static str,
    pub coercion: Coercion,
}

const fn field(key: &'static str, column: &'static str, coercion: Coercion) -> FieldMapping {
    FieldMapping { key, column, coercion }
}

use Coercion::{Date, Numeric, Text};

const COMPANY_FIELDS: &[FieldMapping] = &[
    field("denomination", "DEN_STE", Text),
    field("forme_juridique", "FORME_JUR", Text),
    field("ice", "ICE", Text),
    field("date_ice", "DATE_ICE", Date),
    field("capital", "CAPITAL", Numeric),
    field("parts_social", "PART_SOCIAL", Text),
    field("adresse", "ADRESSE", Text),
    field("tribunal", "TRIBUNAL", Text),
];

const ASSOCIATE_FIELDS: &[FieldMapping] = &[
    field("civilite", "CIVIL", Text),
    field("prenom", "PRENOM", Text),
    field("nom", "NOM", Text),
    field("nationalite", "NATIONALITY", Text),
    field("num_piece", "CIN_NUM", Text),
    field("validite_piece", "DATE_VALIDITE_CIN", Date),
    field("date_naiss", "DATE_NAISS", Date),
    field("lieu_naiss", "LIEU_NAISS", Text),
    field("adresse", "ADRESSE", Text),
    field("telephone", "PHONE", Text),
    field("email", "EMAIL", Text),
    field("pourcentage", "PERCENTAGE", Text),
    field("parts", "PARTS", Numeric),
    field("capital_detenu", "CAPITAL_DETENU", Numeric),
    field("est_gerant", "IS_GERANT", Text),
    field("qualite", "QUALITY", Text),
];

const CONTRACT_FIELDS: &[FieldMapping] = &[
    field("date_contrat", "DATE_CONTRAT", Date),
    field("period", "PERIOD_DOMCILIATION", Text),
    field("prix_mensuel", "PRIX_CONTRAT", Numeric),
    field("prix_inter", "PRIX_INTERMEDIARE_CONTRAT", Numeric),
    field("date_debut", "DATE_DEBUT", Date),
    field("date_fin", "DATE_FIN", Date),
];

/// Key/column/coercion tables for every record type
#[derive(Clone, Debug)]
pub struct FieldMap {
    tables: BTreeMap<Table, Vec<FieldMapping>>,
}

impl FieldMap {
    /// Mapping used by the office forms
    pub fn canonical() -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(Table::Company, COMPANY_FIELDS.to_vec());
        tables.insert(Table::Associate, ASSOCIATE_FIELDS.to_vec());
        tables.insert(Table::Contract, CONTRACT_FIELDS.to_vec());
        Self { tables }
    }

    pub fn new(tables: BTreeMap<Table, Vec<FieldMapping>>) -> Self {
        Self { tables }
    }

    pub fn mappings(&self, table: Table) -> &[FieldMapping] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check the mapping covers every non-key column of the schema exactly once
    pub fn validate(&self, schema: &Schema) -> Result<(), ConfigError> {
        for layout in schema.tables() {
            let table = layout.table;
            let mappings = self.mappings(table);

            let mut keys = HashSet::new();
            let mut columns = HashSet::new();
            for m in mappings {
                if !keys.insert(m.key) {
                    return Err(ConfigError::DuplicateKey { table, key: m.key.to_string() });
                }
                if !columns.insert(m.column) {
                    return Err(ConfigError::DuplicateColumn {
                        table,
                        column: m.column.to_string(),
                    });
                }
                if table.is_key_column(m.column) || !layout.columns.iter().any(|c| c == m.column) {
                    return Err(ConfigError::UnknownColumn {
                        table,
                        key: m.key.to_string(),
                        column: m.column.to_string(),
                    });
                }
            }

            let unmapped: Vec<String> = layout
                .columns
                .iter()
                .filter(|c| !table.is_key_column(c) && !columns.contains(c.as_str()))
                .cloned()
                .collect();
            if !unmapped.is_empty() {
                return Err(ConfigError::UnmappedColumns { table, columns: unmapped });
            }
        }
        Ok(())
    }

    /// Mapping for a form key, or for the canonical column name itself
    pub fn lookup(&self, table: Table, key: &str) -> Option<&FieldMapping> {
        let mappings = self.mappings(table);
        mappings
            .iter()
            .find(|m| m.key == key)
            .or_else(|| mappings.iter().find(|m| m.column == key))
    }

    /// Form key that feeds a column
    pub fn key_for_column(&self, table: Table, column: &str) -> Option<&'static str> {
        self.mappings(table).iter().find(|m| m.column == column).map(|m| m.key)
    }

    /// Coerce form fields into a row aligned on `columns`
    ///
    /// Identifier and company reference columns are left empty for the store
    /// to fill. Keys with no mapping are dropped.
    pub fn build_row(&self, table: Table, fields: &Fields, columns: &[String]) -> Vec<CellValue> {
        let mut row = vec![CellValue::Empty; columns.len()];
        for (key, value) in fields {
            let Some(mapping) = self.lookup(table, key) else {
                debug!(%table, key = key.as_str(), "ignoring unmapped form key");
                continue;
            };
            if let Some(idx) = columns.iter().position(|c| c == mapping.column) {
                row[idx] = mapping.coercion.apply(value);
            }
        }
        row
    }
}

impl Default for FieldMap {
    fn default() -> Self {
        Self::canonical()
    }
}
