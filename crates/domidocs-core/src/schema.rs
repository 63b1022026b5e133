//! Canonical table layouts
//!
//! The workbook holds one sheet per [`Table`]. The column order declared here
//! is the on-disk order and every write reindexes onto it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Foreign key column shared by the Associate and Contract tables
pub const COMPANY_REF: &str = "ID_SOCIETE";

const COMPANY_COLUMNS: &[&str] = &[
    "ID_SOCIETE",
    "DEN_STE",
    "FORME_JUR",
    "ICE",
    "DATE_ICE",
    "CAPITAL",
    "PART_SOCIAL",
    "ADRESSE",
    "TRIBUNAL",
];

const ASSOCIATE_COLUMNS: &[&str] = &[
    "ID_ASSOCIE",
    "ID_SOCIETE",
    "CIVIL",
    "PRENOM",
    "NOM",
    "NATIONALITY",
    "CIN_NUM",
    "DATE_VALIDITE_CIN",
    "DATE_NAISS",
    "LIEU_NAISS",
    "ADRESSE",
    "PHONE",
    "EMAIL",
    "PERCENTAGE",
    "PARTS",
    "CAPITAL_DETENU",
    "IS_GERANT",
    "QUALITY",
];

const CONTRACT_COLUMNS: &[&str] = &[
    "ID_CONTRAT",
    "ID_SOCIETE",
    "DATE_CONTRAT",
    "PERIOD_DOMCILIATION",
    "PRIX_CONTRAT",
    "PRIX_INTERMEDIARE_CONTRAT",
    "DATE_DEBUT",
    "DATE_FIN",
];

/// Logical table stored as one workbook sheet
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Company,
    Associate,
    Contract,
}

impl Table {
    /// All tables in declaration order
    pub const ALL: [Table; 3] = [Table::Company, Table::Associate, Table::Contract];

    /// Sheet name inside the workbook
    pub fn sheet_name(self) -> &'static str {
        match self {
            Table::Company => "Societes",
            Table::Associate => "Associes",
            Table::Contract => "Contrats",
        }
    }

    /// Column holding the table's own identifier
    pub fn id_column(self) -> &'static str {
        match self {
            Table::Company => "ID_SOCIETE",
            Table::Associate => "ID_ASSOCIE",
            Table::Contract => "ID_CONTRAT",
        }
    }

    /// Column referencing the owning company, if any
    pub fn company_ref(self) -> Option<&'static str> {
        match self {
            Table::Company => None,
            Table::Associate | Table::Contract => Some(COMPANY_REF),
        }
    }

    /// Canonical column order
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Table::Company => COMPANY_COLUMNS,
            Table::Associate => ASSOCIATE_COLUMNS,
            Table::Contract => CONTRACT_COLUMNS,
        }
    }

    /// Whether the column is filled by the store rather than the collaborator
    pub fn is_key_column(self, column: &str) -> bool {
        column == self.id_column() || self.company_ref() == Some(column)
    }

    /// Resolve a table from its sheet name (exact match)
    pub fn from_sheet_name(name: &str) -> Option<Table> {
        Table::ALL.into_iter().find(|t| t.sheet_name() == name)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sheet_name())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "company" | "companies" | "societe" | "societes" => Ok(Table::Company),
            "associate" | "associates" | "associe" | "associes" => Ok(Table::Associate),
            "contract" | "contracts" | "contrat" | "contrats" => Ok(Table::Contract),
            other => Err(format!("unknown table '{other}'")),
        }
    }
}

/// Layout of one table: its sheet name and ordered columns
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableLayout {
    pub table: Table,
    pub sheet: String,
    pub columns: Vec<String>,
}

impl TableLayout {
    pub fn canonical(table: Table) -> Self {
        Self {
            table,
            sheet: table.sheet_name().to_string(),
            columns: table.columns().iter().map(|c| (*c).to_string()).collect(),
        }
    }
}

/// Ordered mapping of table name to column list
///
/// Declaration order matters: the migrator breaks overlap ties by it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    tables: Vec<TableLayout>,
}

impl Schema {
    /// The three-sheet layout used by the office workbook
    pub fn canonical() -> Self {
        Self {
            tables: Table::ALL.into_iter().map(TableLayout::canonical).collect(),
        }
    }

    pub fn new(tables: Vec<TableLayout>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &[TableLayout] {
        &self.tables
    }

    pub fn layout(&self, table: Table) -> Option<&TableLayout> {
        self.tables.iter().find(|l| l.table == table)
    }

    /// Layout whose sheet name matches exactly
    pub fn by_sheet(&self, sheet: &str) -> Option<&TableLayout> {
        self.tables.iter().find(|l| l.sheet == sheet)
    }

    pub fn is_canonical_sheet(&self, sheet: &str) -> bool {
        self.by_sheet(sheet).is_some()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::canonical()
    }
}
