//! Template context built from stored records

use serde_json::{Map, Value};

use crate::mapping::FieldMap;
use crate::record::Record;
use crate::schema::Table;

/// Build the renderer context for one company
///
/// Company and contract fields appear both at top level under their form
/// keys and nested under `societe` / `contrat`. Associates are listed under
/// `associes`; the first one flagged as manager is also exposed as `gerant`.
pub fn build_context(
    map: &FieldMap,
    company: &Record,
    associates: &[Record],
    contract: Option<&Record>,
) -> Value {
    let mut root = Map::new();

    let societe = record_object(map, company);
    for (key, value) in &societe {
        root.insert(key.clone(), value.clone());
    }
    root.insert("societe".into(), Value::Object(societe));

    if let Some(contract) = contract {
        let contrat = record_object(map, contract);
        for (key, value) in &contrat {
            root.entry(key.clone()).or_insert_with(|| value.clone());
        }
        root.insert("contrat".into(), Value::Object(contrat));
    }

    let associes: Vec<Value> = associates
        .iter()
        .map(|a| Value::Object(record_object(map, a)))
        .collect();
    if let Some(gerant) = associates.iter().find(|a| is_manager(a)) {
        root.insert("gerant".into(), Value::Object(record_object(map, gerant)));
    }
    root.insert("nb_associes".into(), Value::String(associes.len().to_string()));
    root.insert("associes".into(), Value::Array(associes));

    Value::Object(root)
}

fn is_manager(record: &Record) -> bool {
    record
        .get("IS_GERANT")
        .and_then(|v| v.as_f64())
        .map(|n| n != 0.0)
        .unwrap_or(false)
}

fn record_object(map: &FieldMap, record: &Record) -> Map<String, Value> {
    let table: Table = record.table;
    let mut object = Map::new();
    for (column, value) in &record.values {
        let key = map
            .key_for_column(table, column)
            .map(str::to_string)
            .unwrap_or_else(|| column.to_ascii_lowercase());
        object.insert(key, Value::String(value.to_string()));
    }
    object
}
