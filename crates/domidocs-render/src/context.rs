//! Placeholder values
//!
//! The renderer does not interpret the context's shape. A placeholder name is
//! resolved as a dotted path (`societe.denomination`, `associes.0.nom`) and
//! only scalar values are substituted.

use serde_json::Value;

/// Flat or nested key/value map handed to the template filler
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Context {
    root: Value,
}

impl Context {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Text for a placeholder, or `None` when it cannot be resolved to a scalar
    pub fn lookup(&self, name: &str) -> Option<String> {
        let mut current = &self.root;
        if let Some(direct) = current.get(name) {
            return scalar_text(direct);
        }
        for segment in name.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        scalar_text(current)
    }
}

impl From<Value> for Context {
    fn from(root: Value) -> Self {
        Self::new(root)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{}", f as i64),
            _ => n.to_string(),
        }),
        Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> Context {
        Context::new(json!({
            "denomination": "ACME",
            "capital": 10000.0,
            "gerant": null,
            "societe": {"ville": "Casablanca"},
            "associes": [{"nom": "Alaoui"}, {"nom": "Bennani"}],
            "dotted.key": "flat wins",
        }))
    }

    #[test]
    fn flat_keys_resolve() {
        assert_eq!(ctx().lookup("denomination").as_deref(), Some("ACME"));
        assert_eq!(ctx().lookup("capital").as_deref(), Some("10000"));
        assert_eq!(ctx().lookup("gerant").as_deref(), Some(""));
    }

    #[test]
    fn dotted_paths_walk_objects_and_arrays() {
        assert_eq!(ctx().lookup("societe.ville").as_deref(), Some("Casablanca"));
        assert_eq!(ctx().lookup("associes.1.nom").as_deref(), Some("Bennani"));
        assert_eq!(ctx().lookup("dotted.key").as_deref(), Some("flat wins"));
    }

    #[test]
    fn unresolved_names_and_containers_yield_none() {
        assert_eq!(ctx().lookup("missing"), None);
        assert_eq!(ctx().lookup("societe"), None);
        assert_eq!(ctx().lookup("associes.5.nom"), None);
    }
}
