use std::collections::BTreeMap;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constraints::{Constraint, Index, Relationship};
use crate::error::{Error, Result};
use crate::types::Row;

/// Free-form parameter bag handed to a generator.
pub type Params = BTreeMap<String, serde_json::Value>;

/// Industry used when a column does not name one.
pub const DEFAULT_INDUSTRY: &str = "base";

/// Declarative schema document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Schema {
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default, alias = "relationships")]
    pub relations: Vec<Relationship>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    /// Alternate document-store shape; folded into `tables` on load.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<Collection>,
}

/// A table to create and populate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Table {
    #[serde(default)]
    pub name: String,
    /// Rows to generate; zero creates the structure only.
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    /// Pre-materialized rows inserted instead of generated ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Row>>,
}

/// A column and the generator that fills it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Column {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub generator: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub params: Params,
    /// Literal choices, honored only by the `enum` generator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<serde_json::Value>>,
    #[serde(default, alias = "primary")]
    pub is_primary: bool,
    #[serde(default, alias = "nullable")]
    pub is_nullable: bool,
    #[serde(default, alias = "unique")]
    pub is_unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Field specs for embedded-document generators.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested_fields: Vec<Column>,
}

/// Document-store flavored table declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Collection {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub fields: Vec<Column>,
    #[serde(default)]
    pub indexes: Vec<Index>,
}

impl Schema {
    /// Parse a YAML schema document and fold `collections` into `tables`.
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let mut schema: Schema =
            serde_yaml::from_str(input).map_err(|err| Error::Parse(err.to_string()))?;
        schema.fold_collections();
        Ok(schema)
    }

    /// Read and parse a YAML schema document from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|err| Error::Parse(err.to_string()))
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|table| table.name == name)
    }

    /// Position of a table in document order.
    pub fn table_position(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|table| table.name == name)
    }

    /// Relationships whose child side is `table`, in document order.
    pub fn relationships_for_child<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relations
            .iter()
            .filter(move |relation| relation.to_table == table)
    }

    fn fold_collections(&mut self) {
        for collection in std::mem::take(&mut self.collections) {
            let mut columns = collection.fields;
            if !columns.iter().any(|column| column.is_primary)
                && let Some(id) = columns.iter_mut().find(|column| column.name == "_id")
            {
                id.is_primary = true;
            }
            self.tables.push(Table {
                name: collection.name,
                count: collection.count,
                columns,
                indexes: collection.indexes,
                data: None,
            });
        }
    }
}

impl Table {
    pub fn new(name: impl Into<String>, count: u64, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            count,
            columns,
            indexes: Vec::new(),
            data: None,
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// The single column flagged primary, if any.
    pub fn primary_column(&self) -> Option<&Column> {
        self.columns.iter().find(|column| column.is_primary)
    }
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            ..Self::default()
        }
    }

    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = generator.into();
        self
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = industry.into();
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    /// Industry with the `base` fallback applied.
    pub fn industry_or_default(&self) -> &str {
        if self.industry.is_empty() {
            DEFAULT_INDUSTRY
        } else {
            &self.industry
        }
    }

    /// Declared `max_length`, used for VARCHAR sizing.
    pub fn max_length(&self) -> Option<u64> {
        self.params
            .get("max_length")
            .and_then(|value| value.as_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tables_relations_and_defaults() {
        let yaml = r#"
tables:
  - name: users
    count: 3
    columns:
      - name: id
        type: uuid
        generator: uuid
        is_primary: true
      - name: email
        type: varchar
        params:
          max_length: 64
relations:
  - from_table: users
    from_column: id
    to_table: posts
    to_column: user_id
    type: one-to-many
"#;
        let schema = Schema::from_yaml_str(yaml).expect("parse schema");
        let users = schema.table("users").expect("users table");
        assert_eq!(users.count, 3);
        assert_eq!(users.primary_column().map(|c| c.name.as_str()), Some("id"));
        assert_eq!(users.columns[1].max_length(), Some(64));
        assert_eq!(users.columns[1].industry_or_default(), DEFAULT_INDUSTRY);
        assert_eq!(schema.relations.len(), 1);
        assert_eq!(schema.relations[0].parent(), "users");
        assert_eq!(schema.relations[0].child(), "posts");
    }

    #[test]
    fn folds_collections_into_tables() {
        let yaml = r#"
collections:
  - name: events
    count: 5
    fields:
      - name: _id
        type: mongo_object_id
        generator: mongo_object_id
      - name: kind
        type: string
"#;
        let schema = Schema::from_yaml_str(yaml).expect("parse schema");
        assert!(schema.collections.is_empty());
        let events = schema.table("events").expect("events table");
        assert_eq!(events.count, 5);
        assert_eq!(
            events.primary_column().map(|c| c.name.as_str()),
            Some("_id")
        );
    }

    #[test]
    fn rejects_negative_counts_at_parse_time() {
        let yaml = "tables:\n  - name: t\n    count: -1\n    columns: []\n";
        assert!(matches!(Schema::from_yaml_str(yaml), Err(Error::Parse(_))));
    }
}
