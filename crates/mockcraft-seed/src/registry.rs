use std::collections::BTreeMap;

use mockcraft_core::{Row, Value};

/// Key values generated during one run, per `(table, column)`, in insertion
/// order. Holds each table's primary column plus every column a relationship
/// references as its parent side.
#[derive(Debug, Default)]
pub struct PrimaryKeyRegistry {
    keys: BTreeMap<(String, String), Vec<Value>>,
}

impl PrimaryKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append values for `table.column`; nulls are never recorded.
    pub fn record(&mut self, table: &str, column: &str, values: impl IntoIterator<Item = Value>) {
        self.keys
            .entry((table.to_string(), column.to_string()))
            .or_default()
            .extend(values.into_iter().filter(|value| !value.is_null()));
    }

    /// Record `columns` of every row.
    pub fn record_rows(&mut self, table: &str, columns: &[String], rows: &[Row]) {
        for column in columns {
            self.record(
                table,
                column,
                rows.iter().filter_map(|row| row.get(column).cloned()),
            );
        }
    }

    pub fn keys(&self, table: &str, column: &str) -> &[Value] {
        self.keys
            .get(&(table.to_string(), column.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self, table: &str, column: &str) -> usize {
        self.keys(table, column).len()
    }

    pub fn is_empty(&self, table: &str, column: &str) -> bool {
        self.keys(table, column).is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order_and_skips_nulls() {
        let mut registry = PrimaryKeyRegistry::new();
        registry.record("users", "id", [Value::Int(2), Value::Null, Value::Int(1)]);
        registry.record("users", "id", [Value::Int(3)]);
        assert_eq!(
            registry.keys("users", "id"),
            &[Value::Int(2), Value::Int(1), Value::Int(3)]
        );
        assert!(registry.is_empty("users", "email"));
        assert_eq!(registry.len("posts", "id"), 0);
    }
}
