use mockcraft_core::{Cardinality, Schema, plan_order, validate_structure};
use schemars::schema_for;

const BLOG: &str = r#"
tables:
  - name: users
    count: 10
    columns:
      - name: id
        type: uuid
        is_primary: true
      - name: email
        type: varchar
        generator: email
        params:
          max_length: 50
  - name: posts
    count: 40
    columns:
      - name: id
        type: integer
        is_primary: true
      - name: user_id
        type: uuid
      - name: status
        type: varchar
        generator: enum
        values: [draft, published]
    indexes:
      - name: idx_posts_user
        columns: [user_id]
relations:
  - from_table: users
    from_column: id
    to_table: posts
    to_column: user_id
    type: one-to-many
constraints:
  - type: unique
    table: users
    columns: [email]
"#;

#[test]
fn loads_plans_and_validates_blog_schema() {
    let schema = Schema::from_yaml_str(BLOG).expect("parse schema");
    validate_structure(&schema).expect("structurally valid");

    let plan = plan_order(&schema).expect("plan");
    assert_eq!(plan.order, vec!["users", "posts"]);
    assert_eq!(schema.relations[0].cardinality, Cardinality::OneToMany);

    let posts = schema.table("posts").expect("posts");
    assert_eq!(posts.indexes[0].columns, vec!["user_id"]);
    assert_eq!(
        posts.column("status").and_then(|c| c.values.as_ref()).map(Vec::len),
        Some(2)
    );
}

#[test]
fn schema_survives_yaml_round_trip() {
    let schema = Schema::from_yaml_str(BLOG).expect("parse schema");
    let yaml = schema.to_yaml_string().expect("serialize");
    let reparsed = Schema::from_yaml_str(&yaml).expect("reparse");
    assert_eq!(schema, reparsed);
}

#[test]
fn json_schema_describes_document_keys() {
    let generated = schema_for!(Schema);
    let json = serde_json::to_value(&generated).expect("serialize json schema");
    let properties = json
        .get("properties")
        .and_then(|value| value.as_object())
        .expect("object properties");
    for key in ["tables", "relations", "constraints", "collections"] {
        assert!(properties.contains_key(key), "missing {key}");
    }
}

#[test]
fn loads_schema_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("schema.yaml");
    std::fs::write(&path, BLOG).expect("write schema");
    let schema = Schema::from_path(&path).expect("load");
    assert_eq!(schema.tables.len(), 2);
}
