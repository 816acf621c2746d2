use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use mockcraft_backend::{Context, MemoryBackend};
use mockcraft_core::{Row, Schema, Value};
use mockcraft_seed::{ErrorKind, SeedOptions, Seeder, ValidationOptions};

fn options(seed: u64) -> SeedOptions {
    SeedOptions {
        seed,
        reference_time: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single(),
        ..SeedOptions::default()
    }
}

fn schema(yaml: &str) -> Schema {
    Schema::from_yaml_str(yaml).expect("schema")
}

fn seeder(backend: &MemoryBackend, options: SeedOptions) -> Seeder {
    Seeder::new(Box::new(backend.clone()), options)
}

fn column(rows: &[Row], name: &str) -> Vec<Value> {
    rows.iter()
        .map(|row| row.get(name).cloned().unwrap_or(Value::Null))
        .collect()
}

fn histogram(values: &[Value]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for value in values {
        *counts.entry(value.key_string()).or_insert(0) += 1;
    }
    counts
}

const USERS_POSTS: &str = r#"
tables:
  - name: users
    count: 2
    columns:
      - name: id
        type: uuid
        is_primary: true
  - name: posts
    count: 6
    columns:
      - name: id
        type: uuid
        is_primary: true
      - name: user_id
        type: uuid
relations:
  - from_table: users
    from_column: id
    to_table: posts
    to_column: user_id
    type: one-to-many
"#;

#[tokio::test]
async fn primary_keys_are_distinct_uuids() {
    let backend = MemoryBackend::new();
    let schema = schema(
        r#"
tables:
  - name: users
    count: 3
    columns:
      - name: id
        type: uuid
        generator: uuid
        is_primary: true
      - name: name
        type: string
"#,
    );
    let report = seeder(&backend, options(42)).seed(schema).await.expect("seed");
    assert_eq!(report.total_rows(), 3);

    let ids = column(&backend.rows("users"), "id");
    let distinct = histogram(&ids);
    assert_eq!(distinct.len(), 3);
    for id in &ids {
        let parsed = Uuid::parse_str(id.as_str().expect("text id")).expect("uuid");
        assert_eq!(parsed.get_version_num(), 4);
    }
}

#[tokio::test]
async fn children_spread_evenly_over_parents() {
    let backend = MemoryBackend::new();
    let report = seeder(&backend, options(7))
        .seed(schema(USERS_POSTS))
        .await
        .expect("seed");
    assert_eq!(report.order, vec!["users", "posts"]);
    assert!(!report.verification_failed());

    let users = column(&backend.rows("users"), "id");
    let per_user = histogram(&column(&backend.rows("posts"), "user_id"));
    assert_eq!(per_user.len(), 2);
    for user in &users {
        assert_eq!(per_user.get(&user.key_string()), Some(&3));
    }
}

#[tokio::test]
async fn short_child_counts_fall_back_to_even_split() {
    let backend = MemoryBackend::new();
    let yaml = USERS_POSTS
        .replacen("count: 2", "count: 3", 1)
        .replacen("count: 6", "count: 5", 1);
    seeder(&backend, options(7))
        .seed(schema(&yaml))
        .await
        .expect("seed");

    let mut counts: Vec<usize> = histogram(&column(&backend.rows("posts"), "user_id"))
        .into_values()
        .collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![1, 2, 2]);
}

#[tokio::test]
async fn mutual_cycle_is_deferred_and_consistent() {
    let backend = MemoryBackend::new();
    let schema = schema(
        r#"
tables:
  - name: a
    count: 4
    columns:
      - name: id
        type: uuid
        is_primary: true
      - name: b_id
        type: uuid
  - name: b
    count: 3
    columns:
      - name: id
        type: uuid
        is_primary: true
      - name: a_id
        type: uuid
relations:
  - from_table: b
    from_column: id
    to_table: a
    to_column: b_id
  - from_table: a
    from_column: id
    to_table: b
    to_column: a_id
"#,
    );
    let report = seeder(&backend, options(3)).seed(schema).await.expect("seed");
    assert_eq!(report.deferred, vec!["a", "b"]);
    assert!(report.tables.iter().all(|table| table.deferred));
    assert_eq!(report.verification.len(), 2);
    assert!(!report.verification_failed());
    assert_eq!(backend.row_count("a"), 4);
    assert_eq!(backend.row_count("b"), 3);
}

#[tokio::test]
async fn self_reference_points_at_own_rows() {
    let backend = MemoryBackend::new();
    let schema = schema(
        r#"
tables:
  - name: employees
    count: 8
    columns:
      - name: id
        type: uuid
        is_primary: true
      - name: manager_id
        type: uuid
relations:
  - from_table: employees
    from_column: id
    to_table: employees
    to_column: manager_id
"#,
    );
    let report = seeder(&backend, options(5)).seed(schema).await.expect("seed");
    assert_eq!(report.deferred, vec!["employees"]);
    assert_eq!(report.verification[0].checked, 8);
    assert!(!report.verification_failed());
}

#[tokio::test]
async fn empty_parent_leaves_children_unconstrained() {
    let backend = MemoryBackend::new();
    let schema = schema(
        r#"
tables:
  - name: parents
    count: 0
    columns:
      - name: id
        type: uuid
        is_primary: true
  - name: children
    count: 5
    columns:
      - name: id
        type: uuid
        is_primary: true
      - name: parent_id
        type: uuid
relations:
  - from_table: parents
    from_column: id
    to_table: children
    to_column: parent_id
"#,
    );
    let report = seeder(&backend, options(1)).seed(schema).await.expect("seed");
    assert_eq!(backend.row_count("children"), 5);
    assert!(
        report
            .warnings
            .iter()
            .any(|issue| issue.message == "no primary keys for balanced distribution")
    );
    assert!(report.verification_failed());
    assert_eq!(report.verification[0].orphan_count, 5);
    assert_eq!(report.orphan_count(), 5);
}

#[tokio::test]
async fn coverage_threshold_rejects_sparse_schemas() {
    let backend = MemoryBackend::new();
    let yaml = format!(
        "{USERS_POSTS}  - from_table: users\n    from_column: id\n    to_table: posts\n    to_column: id\n    type: one-to-one\n"
    );
    let mut options = options(0);
    options.validation = ValidationOptions {
        min_valid_relationships: Some(3),
    };
    let err = seeder(&backend, options)
        .seed(schema(&yaml))
        .await
        .expect_err("two relationships are below the minimum");
    assert_eq!(err.kind(), ErrorKind::FkCoverageInsufficient);
    assert!(err.to_string().contains("found 2, minimum 3"));
    assert!(backend.table_names().is_empty());
}

#[tokio::test]
async fn same_seed_same_rows() {
    let first = MemoryBackend::new();
    let second = MemoryBackend::new();
    seeder(&first, options(99)).seed(schema(USERS_POSTS)).await.expect("seed");
    seeder(&second, options(99)).seed(schema(USERS_POSTS)).await.expect("seed");
    assert_eq!(first.rows("users"), second.rows("users"));
    assert_eq!(first.rows("posts"), second.rows("posts"));

    let other = MemoryBackend::new();
    seeder(&other, options(100)).seed(schema(USERS_POSTS)).await.expect("seed");
    assert_ne!(first.rows("users"), other.rows("users"));
}

#[tokio::test]
async fn reseeding_replaces_rows() {
    let backend = MemoryBackend::new();
    let mut seeder = seeder(&backend, options(11));
    seeder.seed(schema(USERS_POSTS)).await.expect("first run");
    let before = backend.rows("posts");
    let report = seeder.seed(schema(USERS_POSTS)).await.expect("second run");
    assert_eq!(backend.rows("posts"), before);
    assert_eq!(report.total_rows(), 8);
}

#[tokio::test]
async fn secondary_references_draw_from_parent_keys() {
    let backend = MemoryBackend::new();
    let schema = schema(
        r#"
tables:
  - name: users
    count: 2
    columns:
      - name: id
        type: uuid
        is_primary: true
  - name: posts
    count: 6
    columns:
      - name: id
        type: uuid
        is_primary: true
      - name: user_id
        type: uuid
  - name: comments
    count: 20
    columns:
      - name: id
        type: uuid
        is_primary: true
      - name: post_id
        type: uuid
      - name: author_id
        type: uuid
relations:
  - from_table: users
    from_column: id
    to_table: posts
    to_column: user_id
  - from_table: posts
    from_column: id
    to_table: comments
    to_column: post_id
  - from_table: users
    from_column: id
    to_table: comments
    to_column: author_id
"#,
    );
    let options = SeedOptions {
        validation: ValidationOptions {
            min_valid_relationships: Some(3),
        },
        ..options(4)
    };
    let report = seeder(&backend, options).seed(schema).await.expect("seed");
    assert_eq!(report.order, vec!["users", "posts", "comments"]);
    assert!(!report.verification_failed());

    let per_post = histogram(&column(&backend.rows("comments"), "post_id"));
    assert_eq!(per_post.len(), 6);
    assert!(per_post.values().all(|count| *count >= 2));
    let authors = histogram(&column(&backend.rows("comments"), "author_id"));
    assert!(authors.len() <= 2);
}

#[tokio::test]
async fn max_length_truncates_text() {
    let backend = MemoryBackend::new();
    let schema = schema(
        r#"
tables:
  - name: notes
    count: 25
    columns:
      - name: body
        type: varchar
        generator: paragraph
        params:
          max_length: 12
"#,
    );
    seeder(&backend, options(8)).seed(schema).await.expect("seed");
    for value in column(&backend.rows("notes"), "body") {
        let text = value.as_str().expect("text");
        assert!(text.chars().count() <= 12, "{text:?} is too long");
    }
}

#[tokio::test]
async fn inserts_are_batched() {
    let backend = MemoryBackend::new();
    let options = SeedOptions {
        batch_size: 4,
        ..options(2)
    };
    let report = seeder(&backend, options)
        .seed(schema(USERS_POSTS))
        .await
        .expect("seed");
    let posts = report.table("posts").expect("posts report");
    assert_eq!(posts.rows_inserted, 6);
    assert_eq!(posts.batches, 2);
    assert_eq!(report.table("users").map(|table| table.batches), Some(1));
}

#[tokio::test]
async fn data_rows_are_inserted_verbatim() {
    let backend = MemoryBackend::new();
    let schema = schema(
        r#"
tables:
  - name: plans
    count: 10
    columns:
      - name: code
        type: string
        is_primary: true
      - name: price
        type: integer
    data:
      - code: free
        price: 0
      - code: pro
        price: 20
  - name: accounts
    count: 4
    columns:
      - name: id
        type: integer
        generator: serial
        is_primary: true
      - name: plan
        type: string
relations:
  - from_table: plans
    from_column: code
    to_table: accounts
    to_column: plan
"#,
    );
    let report = seeder(&backend, options(6)).seed(schema).await.expect("seed");
    let plans = report.table("plans").expect("plans report");
    assert!(plans.from_data);
    assert_eq!(plans.rows_inserted, 2);
    assert_eq!(
        histogram(&column(&backend.rows("accounts"), "plan")),
        BTreeMap::from([("free".to_string(), 2), ("pro".to_string(), 2)])
    );
}

#[tokio::test]
async fn failed_backup_only_warns() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = MemoryBackend::new();
    let options = SeedOptions {
        backup_path: Some(dir.path().join("missing").join("snapshot.json")),
        ..options(0)
    };
    let report = seeder(&backend, options)
        .seed(schema(USERS_POSTS))
        .await
        .expect("seed");
    assert!(report.warnings.iter().any(|issue| issue.code == "backup_failed"));
    assert_eq!(backend.row_count("posts"), 6);
}

#[tokio::test]
async fn cancellation_stops_the_run() {
    let backend = MemoryBackend::new();
    let ctx = Context::new();
    ctx.cancel();
    let err = seeder(&backend, options(0))
        .with_context(ctx)
        .seed(schema(USERS_POSTS))
        .await
        .expect_err("cancelled");
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(backend.row_count("posts"), 0);
}

#[tokio::test]
async fn integer_primary_keys_count_up_without_collisions() {
    let backend = MemoryBackend::new();
    let schema = schema(
        r#"
tables:
  - name: users
    count: 150
    columns:
      - name: id
        type: integer
        is_primary: true
  - name: orders
    count: 300
    columns:
      - name: id
        type: bigint
        is_primary: true
      - name: user_id
        type: integer
relations:
  - from_table: users
    from_column: id
    to_table: orders
    to_column: user_id
"#,
    );
    let report = seeder(&backend, options(12)).seed(schema).await.expect("seed");
    assert!(!report.verification_failed());

    let ids: Vec<i64> = column(&backend.rows("users"), "id")
        .iter()
        .map(|id| id.as_i64().expect("integer id"))
        .collect();
    assert_eq!(ids, (1..=150).collect::<Vec<_>>());

    let per_user = histogram(&column(&backend.rows("orders"), "user_id"));
    assert_eq!(per_user.len(), 150);
    assert!(per_user.values().all(|count| *count == 2));
}
