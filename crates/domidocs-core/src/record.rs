//! Form batches going in, stored records coming out

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::mapping::Fields;
use crate::schema::{Table, COMPANY_REF};
use crate::value::CellValue;

/// Everything one save of the company form produces
///
/// Field names follow the collaborator's keys (`societe`, `associes`,
/// `contrat`), so a JSON dump of the form deserializes directly.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct FormBatch {
    #[serde(default, rename = "societe")]
    pub company: Option<Fields>,
    #[serde(default, rename = "associes")]
    pub associates: Vec<Fields>,
    #[serde(default, rename = "contrat")]
    pub contract: Option<Fields>,
}

impl FormBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn company(mut self, fields: Fields) -> Self {
        self.company = Some(fields);
        self
    }

    pub fn associate(mut self, fields: Fields) -> Self {
        self.associates.push(fields);
        self
    }

    pub fn contract(mut self, fields: Fields) -> Self {
        self.contract = Some(fields);
        self
    }

    /// Company fields when at least one of them carries a value
    pub fn company_fields(&self) -> Option<&Fields> {
        non_blank(self.company.as_ref())
    }

    pub fn contract_fields(&self) -> Option<&Fields> {
        non_blank(self.contract.as_ref())
    }
}

fn non_blank(fields: Option<&Fields>) -> Option<&Fields> {
    fields.filter(|f| f.values().any(|v| !v.is_blank()))
}

/// One stored row, read back with its column names
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub table: Table,
    pub values: Vec<(String, CellValue)>,
}

impl Record {
    pub fn new(table: Table, values: Vec<(String, CellValue)>) -> Self {
        Self { table, values }
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    fn integer(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(CellValue::as_f64).map(|n| n as i64)
    }

    /// The record's own identifier
    pub fn id(&self) -> Option<i64> {
        self.integer(self.table.id_column())
    }

    /// Identifier of the owning company (the record's own id for companies)
    pub fn company_id(&self) -> Option<i64> {
        match self.table {
            Table::Company => self.id(),
            _ => self.integer(COMPANY_REF),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in &self.values {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
