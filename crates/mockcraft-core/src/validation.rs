use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constraints::{Cardinality, Relationship};
use crate::error::{Error, Result};
use crate::schema::{Schema, Table};

/// A single structural problem found in a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipIssue {
    pub relationship: String,
    pub message: String,
}

impl fmt::Display for RelationshipIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.relationship, self.message)
    }
}

/// Validate tables, columns, indexes and constraints.
///
/// This checks:
/// - non-empty, unique table names with at least one column
/// - non-empty, unique column names with a declared type
/// - at most one primary column per table
/// - index names and columns
/// - constraint columns exist (in the named table, or any table)
///
/// Relationships are checked separately by [`relationship_issues`].
pub fn validate_structure(schema: &Schema) -> Result<()> {
    let mut table_names = BTreeSet::new();
    for (position, table) in schema.tables.iter().enumerate() {
        if table.name.trim().is_empty() {
            return Err(Error::InvalidSchema(format!(
                "table #{position} has an empty name"
            )));
        }
        if !table_names.insert(table.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate table name: {}",
                table.name
            )));
        }
        validate_table(table)?;
    }

    let catalog = column_catalog(schema);
    for constraint in &schema.constraints {
        if constraint.columns.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "{:?} constraint has no columns",
                constraint.constraint_type
            )));
        }
        for column in &constraint.columns {
            let found = match &constraint.table {
                Some(table) => catalog
                    .get(table.as_str())
                    .is_some_and(|columns| columns.contains(column.as_str())),
                None => catalog.values().any(|columns| columns.contains(column.as_str())),
            };
            if !found {
                return Err(Error::InvalidSchema(format!(
                    "constraint column not found: {}{column}",
                    constraint
                        .table
                        .as_deref()
                        .map(|table| format!("{table}."))
                        .unwrap_or_default()
                )));
            }
        }
    }

    Ok(())
}

fn validate_table(table: &Table) -> Result<()> {
    if table.columns.is_empty() {
        return Err(Error::InvalidSchema(format!(
            "table {} has no columns",
            table.name
        )));
    }

    let mut columns = BTreeSet::new();
    let mut primary = 0usize;
    for column in &table.columns {
        if column.name.trim().is_empty() {
            return Err(Error::InvalidSchema(format!(
                "table {} has a column with an empty name",
                table.name
            )));
        }
        if column.column_type.trim().is_empty() {
            return Err(Error::InvalidSchema(format!(
                "column {}.{} has no type",
                table.name, column.name
            )));
        }
        if !columns.insert(column.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate column name: {}.{}",
                table.name, column.name
            )));
        }
        if column.is_primary {
            primary += 1;
        }
    }
    if primary > 1 {
        return Err(Error::InvalidSchema(format!(
            "table {} has {primary} primary columns; at most one is allowed",
            table.name
        )));
    }

    for index in &table.indexes {
        if index.name.trim().is_empty() {
            return Err(Error::InvalidSchema(format!(
                "table {} has an index with an empty name",
                table.name
            )));
        }
        if index.columns.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "index {} on {} has no columns",
                index.name, table.name
            )));
        }
        for column in &index.columns {
            if !columns.contains(column.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "index column not found: {}.{column} (index {})",
                    table.name, index.name
                )));
            }
        }
    }

    Ok(())
}

/// Collect structural problems with every declared relationship.
///
/// One entry per invalid relationship, in document order; an empty vector
/// means every relationship is usable.
pub fn relationship_issues(schema: &Schema) -> Vec<RelationshipIssue> {
    schema
        .relations
        .iter()
        .filter_map(|relation| {
            check_relationship(schema, relation).err().map(|message| RelationshipIssue {
                relationship: relation.to_string(),
                message,
            })
        })
        .collect()
}

fn check_relationship(schema: &Schema, relation: &Relationship) -> std::result::Result<(), String> {
    for (field, value) in [
        ("from_table", &relation.from_table),
        ("from_column", &relation.from_column),
        ("to_table", &relation.to_table),
        ("to_column", &relation.to_column),
    ] {
        if value.trim().is_empty() {
            return Err(format!("{field} is empty"));
        }
    }

    let parent = schema
        .table(&relation.from_table)
        .ok_or_else(|| format!("parent table {} not found", relation.from_table))?;
    let child = schema
        .table(&relation.to_table)
        .ok_or_else(|| format!("child table {} not found", relation.to_table))?;

    if !parent.has_column(&relation.from_column) {
        return Err(format!(
            "parent column {}.{} not found",
            relation.from_table, relation.from_column
        ));
    }
    let child_column = child.column(&relation.to_column).ok_or_else(|| {
        format!(
            "child column {}.{} not found",
            relation.to_table, relation.to_column
        )
    })?;

    if child_column.is_primary && relation.cardinality != Cardinality::OneToOne {
        return Err(format!(
            "child column {}.{} is primary but cardinality is {}",
            relation.to_table,
            relation.to_column,
            relation.cardinality.as_str()
        ));
    }

    Ok(())
}

fn column_catalog(schema: &Schema) -> BTreeMap<&str, BTreeSet<&str>> {
    schema
        .tables
        .iter()
        .map(|table| {
            (
                table.name.as_str(),
                table.columns.iter().map(|c| c.name.as_str()).collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{Constraint, ConstraintType, Index};
    use crate::schema::Column;

    fn users() -> Table {
        Table::new(
            "users",
            10,
            vec![
                Column::new("id", "integer").primary(),
                Column::new("email", "varchar"),
            ],
        )
    }

    fn posts() -> Table {
        Table::new(
            "posts",
            10,
            vec![
                Column::new("id", "integer").primary(),
                Column::new("user_id", "integer"),
            ],
        )
    }

    #[test]
    fn accepts_well_formed_schema() {
        let schema = Schema {
            tables: vec![users(), posts()],
            relations: vec![Relationship::new("users", "id", "posts", "user_id")],
            ..Schema::default()
        };
        assert!(validate_structure(&schema).is_ok());
        assert!(relationship_issues(&schema).is_empty());
    }

    #[test]
    fn rejects_duplicate_tables_and_columns() {
        let schema = Schema {
            tables: vec![users(), users()],
            ..Schema::default()
        };
        assert!(matches!(
            validate_structure(&schema),
            Err(Error::InvalidSchema(message)) if message.contains("duplicate table")
        ));

        let mut table = users();
        table.columns.push(Column::new("email", "text"));
        let schema = Schema {
            tables: vec![table],
            ..Schema::default()
        };
        assert!(matches!(
            validate_structure(&schema),
            Err(Error::InvalidSchema(message)) if message.contains("duplicate column")
        ));
    }

    #[test]
    fn rejects_two_primary_columns() {
        let mut table = users();
        table.columns[1].is_primary = true;
        let schema = Schema {
            tables: vec![table],
            ..Schema::default()
        };
        assert!(matches!(validate_structure(&schema), Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn rejects_index_on_missing_column() {
        let mut table = users();
        table.indexes.push(Index {
            name: "idx_users_name".to_string(),
            columns: vec!["name".to_string()],
            unique: false,
        });
        let schema = Schema {
            tables: vec![table],
            ..Schema::default()
        };
        assert!(matches!(validate_structure(&schema), Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn rejects_constraint_on_unknown_column() {
        let schema = Schema {
            tables: vec![users()],
            constraints: vec![Constraint {
                constraint_type: ConstraintType::Unique,
                table: None,
                columns: vec!["handle".to_string()],
                condition: None,
            }],
            ..Schema::default()
        };
        assert!(matches!(validate_structure(&schema), Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn reports_each_broken_relationship() {
        let mut child_primary = Relationship::new("users", "id", "posts", "id");
        child_primary.cardinality = Cardinality::OneToMany;
        let schema = Schema {
            tables: vec![users(), posts()],
            relations: vec![
                Relationship::new("users", "id", "posts", "missing"),
                Relationship::new("accounts", "id", "posts", "user_id"),
                child_primary,
                Relationship::new("users", "id", "posts", "user_id"),
            ],
            ..Schema::default()
        };
        let issues = relationship_issues(&schema);
        assert_eq!(issues.len(), 3);
        assert!(issues[0].message.contains("posts.missing"));
        assert!(issues[1].message.contains("accounts"));
        assert!(issues[2].message.contains("primary"));
    }
}
