use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use mockcraft_core::{
    Column, ConstraintType, DEFAULT_INDUSTRY, LogicalType, Params, Schema, relationship_issues,
    validate_structure,
};
use mockcraft_generate::{GeneratorEngine, GeneratorError};

use crate::errors::{SeedError, SeedResult};
use crate::options::ValidationOptions;

/// Counts gathered while validating a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub tables: usize,
    pub columns: usize,
    pub relationships: usize,
}

/// Validate `schema` and fill in defaults in place.
///
/// Every column ends up with an industry and a generator that resolves in the
/// engine's registry and survives a probe call.
pub fn validate_and_enhance(
    schema: &mut Schema,
    engine: &GeneratorEngine,
    options: &ValidationOptions,
) -> SeedResult<ValidationSummary> {
    validate_structure(schema)?;

    let unique_columns: Vec<(Option<String>, String)> = schema
        .constraints
        .iter()
        .filter(|constraint| {
            constraint.constraint_type == ConstraintType::Unique && constraint.columns.len() == 1
        })
        .map(|constraint| (constraint.table.clone(), constraint.columns[0].clone()))
        .collect();

    let mut summary = ValidationSummary::default();
    for table in &mut schema.tables {
        for column in &mut table.columns {
            if unique_columns.iter().any(|(scope, name)| {
                name == &column.name && scope.as_deref().is_none_or(|scope| scope == table.name)
            }) {
                column.is_unique = true;
            }
            enhance_column(column, engine);
            check_column(column, engine).map_err(|err| SeedError::in_table(&table.name, err))?;
            summary.columns += 1;
        }
        summary.tables += 1;
    }

    let total = schema.relations.len();
    let issues = relationship_issues(schema);
    for issue in &issues {
        warn!(relationship = %issue.relationship, reason = %issue.message, "invalid relationship");
    }
    if !issues.is_empty() {
        let summary = issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(SeedError::InvalidRelationships {
            invalid: issues.len(),
            total,
            summary,
        });
    }
    summary.relationships = total;

    if let Some(minimum) = options.min_valid_relationships
        && total > 0
        && total < minimum
    {
        return Err(SeedError::FkCoverageInsufficient {
            found: total,
            minimum,
        });
    }

    debug!(
        tables = summary.tables,
        columns = summary.columns,
        relationships = summary.relationships,
        "schema validated"
    );
    Ok(summary)
}

/// Apply the industry default, the type-derived generator and enum values.
pub fn enhance_column(column: &mut Column, engine: &GeneratorEngine) {
    if column.industry.trim().is_empty() {
        column.industry = DEFAULT_INDUSTRY.to_string();
    }
    if column.generator.trim().is_empty() {
        let (generator, defaults) = default_generator(column, engine);
        column.generator = generator;
        for (key, value) in defaults {
            column.params.entry(key).or_insert(value);
        }
    }
    if column.generator == "enum"
        && let Some(values) = &column.values
    {
        column
            .params
            .insert("values".to_string(), serde_json::Value::from(values.clone()));
    }
    for nested in &mut column.nested_fields {
        enhance_column(nested, engine);
    }
}

/// Generator and default params for a column's declared type.
///
/// Primary and unique integer columns count up from 1 per table.
pub fn default_generator(column: &Column, engine: &GeneratorEngine) -> (String, Params) {
    let column_type = column.column_type.as_str();
    let mut params = Params::new();
    let generator = match LogicalType::parse(column_type) {
        kind if kind.is_textual() => "word",
        kind if kind.is_integer() && (column.is_primary || column.is_unique) => "serial",
        kind if kind.is_integer() => {
            params.insert("min".to_string(), json!(0));
            params.insert("max".to_string(), json!(100));
            "number"
        }
        LogicalType::Float | LogicalType::Decimal => {
            params.insert("min".to_string(), json!(0.0));
            params.insert("max".to_string(), json!(100.0));
            params.insert("precision".to_string(), json!(2));
            "float"
        }
        LogicalType::Boolean => "boolean",
        LogicalType::DateTime => "datetime",
        LogicalType::Date => "date",
        LogicalType::Uuid => "uuid",
        _ => {
            let name = column_type.trim().to_ascii_lowercase();
            return match name.as_str() {
                "objectid" | "object_id" | "mongo_object_id" => {
                    ("mongo_object_id".to_string(), params)
                }
                _ if engine.registry().contains(DEFAULT_INDUSTRY, &name) => (name, params),
                _ => ("word".to_string(), params),
            };
        }
    };
    (generator.to_string(), params)
}

fn check_column(column: &Column, engine: &GeneratorEngine) -> Result<(), GeneratorError> {
    let industry = column.industry_or_default();
    engine
        .validate(industry, &column.generator)
        .map_err(|err| err.with_column(&column.name, industry, &column.generator))?;
    engine.probe(column)?;
    for nested in &column.nested_fields {
        check_column(nested, engine)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use mockcraft_core::{Constraint, Relationship, Table};

    use super::*;
    use crate::errors::ErrorKind;

    fn schema() -> Schema {
        Schema {
            tables: vec![
                Table::new(
                    "users",
                    3,
                    vec![
                        Column::new("id", "uuid").primary(),
                        Column::new("age", "integer"),
                        Column::new("score", "decimal"),
                        Column::new("email", "varchar"),
                        Column::new("tier", "string")
                            .with_generator("enum"),
                    ],
                ),
                Table::new(
                    "posts",
                    6,
                    vec![Column::new("id", "uuid").primary(), Column::new("user_id", "uuid")],
                ),
            ],
            relations: vec![Relationship::new("users", "id", "posts", "user_id")],
            ..Schema::default()
        }
    }

    #[test]
    fn fills_generators_and_enum_values() {
        let engine = GeneratorEngine::new(0);
        let mut schema = schema();
        schema.tables[0].columns[4].values = Some(vec![json!("free"), json!("pro")]);
        validate_and_enhance(&mut schema, &engine, &ValidationOptions::default())
            .expect("valid schema");

        let users = &schema.tables[0];
        assert_eq!(users.columns[0].generator, "uuid");
        assert_eq!(users.columns[0].industry, "base");
        assert_eq!(users.columns[1].generator, "number");
        assert_eq!(users.columns[1].params.get("max"), Some(&json!(100)));
        assert_eq!(users.columns[2].generator, "float");
        assert_eq!(users.columns[2].params.get("precision"), Some(&json!(2)));
        assert_eq!(users.columns[3].generator, "word");
        assert_eq!(
            users.columns[4].params.get("values"),
            Some(&json!(["free", "pro"]))
        );
    }

    #[test]
    fn backend_flavored_types_keep_their_generator() {
        let engine = GeneratorEngine::new(0);
        let of = |column_type: &str| default_generator(&Column::new("c", column_type), &engine).0;
        assert_eq!(of("jsonb"), "jsonb");
        assert_eq!(of("ObjectId"), "mongo_object_id");
        assert_eq!(of("geometry"), "word");
    }

    #[test]
    fn integer_keys_default_to_a_sequence() {
        let engine = GeneratorEngine::new(0);
        let (generator, params) = default_generator(&Column::new("id", "bigint").primary(), &engine);
        assert_eq!(generator, "serial");
        assert!(params.is_empty());

        let mut code = Column::new("code", "integer");
        code.is_unique = true;
        assert_eq!(default_generator(&code, &engine).0, "serial");
        assert_eq!(default_generator(&Column::new("age", "int"), &engine).0, "number");
    }

    #[test]
    fn user_params_win_over_type_defaults() {
        let engine = GeneratorEngine::new(0);
        let mut column = Column::new("age", "integer").with_param("max", json!(5));
        enhance_column(&mut column, &engine);
        assert_eq!(column.params.get("max"), Some(&json!(5)));
        assert_eq!(column.params.get("min"), Some(&json!(0)));
    }

    #[test]
    fn empty_enum_fails_the_probe() {
        let engine = GeneratorEngine::new(0);
        let mut schema = schema();
        let err = validate_and_enhance(&mut schema, &engine, &ValidationOptions::default())
            .expect_err("enum without values");
        assert_eq!(err.kind(), ErrorKind::InvalidParam);
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn unknown_generator_is_reported() {
        let engine = GeneratorEngine::new(0);
        let mut schema = schema();
        schema.tables[0].columns[4] = Column::new("tier", "string").with_generator("nope");
        let err = validate_and_enhance(&mut schema, &engine, &ValidationOptions::default())
            .expect_err("unknown generator");
        assert_eq!(err.kind(), ErrorKind::UnknownGenerator);
    }

    #[test]
    fn invalid_relationships_fail_with_summary() {
        let engine = GeneratorEngine::new(0);
        let mut schema = schema();
        schema.tables[0].columns.pop();
        schema
            .relations
            .push(Relationship::new("users", "id", "comments", "user_id"));
        let err = validate_and_enhance(&mut schema, &engine, &ValidationOptions::default())
            .expect_err("missing table");
        match err {
            SeedError::InvalidRelationships { invalid, total, summary } => {
                assert_eq!((invalid, total), (1, 2));
                assert!(summary.contains("comments"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unique_constraints_mark_columns() {
        let engine = GeneratorEngine::new(0);
        let mut schema = schema();
        schema.tables[0].columns.pop();
        schema.constraints.push(Constraint {
            constraint_type: ConstraintType::Unique,
            table: Some("users".to_string()),
            columns: vec!["email".to_string()],
            condition: None,
        });
        validate_and_enhance(&mut schema, &engine, &ValidationOptions::default())
            .expect("valid schema");
        assert!(schema.tables[0].columns[3].is_unique);
        assert!(!schema.tables[1].columns[1].is_unique);
    }
}
