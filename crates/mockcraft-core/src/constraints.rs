use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Relationship cardinality between a parent and a child table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum Cardinality {
    #[serde(rename = "one-to-one")]
    OneToOne,
    #[default]
    #[serde(rename = "one-to-many")]
    OneToMany,
    #[serde(rename = "many-to-many")]
    ManyToMany,
}

impl Cardinality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneToOne => "one-to-one",
            Self::OneToMany => "one-to-many",
            Self::ManyToMany => "many-to-many",
        }
    }
}

/// Directed foreign-key edge.
///
/// `from_*` names the parent (the referenced primary key), `to_*` names the
/// child (the column holding the foreign key).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct Relationship {
    #[serde(default)]
    pub from_table: String,
    #[serde(default)]
    pub from_column: String,
    #[serde(default)]
    pub to_table: String,
    #[serde(default)]
    pub to_column: String,
    #[serde(default, rename = "type", alias = "cardinality")]
    pub cardinality: Cardinality,
}

impl Relationship {
    pub fn new(
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_column: from_column.into(),
            to_table: to_table.into(),
            to_column: to_column.into(),
            cardinality: Cardinality::OneToMany,
        }
    }

    pub fn parent(&self) -> &str {
        &self.from_table
    }

    pub fn child(&self) -> &str {
        &self.to_table
    }

    pub fn is_self_reference(&self) -> bool {
        self.from_table == self.to_table
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.from_table, self.from_column, self.to_table, self.to_column
        )
    }
}

/// Kind of an extra schema constraint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    Unique,
    Check,
    ForeignKey,
}

/// Extra constraint declared next to tables and relations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct Constraint {
    #[serde(rename = "type")]
    pub constraint_type: ConstraintType,
    /// Table the constraint applies to; when absent the columns are looked up
    /// across all tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Index definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct Index {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}
