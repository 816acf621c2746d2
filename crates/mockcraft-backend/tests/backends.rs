use mockcraft_backend::{Backend, BackendError, Context, MemoryBackend, connect_backend};
use mockcraft_core::{Column, Index, Relationship, Row, Table, Value};

fn users() -> Table {
    Table::new(
        "users",
        0,
        vec![
            Column::new("id", "integer").primary(),
            Column::new("email", "string"),
        ],
    )
}

fn posts() -> Table {
    Table::new(
        "posts",
        0,
        vec![
            Column::new("id", "integer").primary(),
            Column::new("user_id", "integer"),
        ],
    )
}

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

fn user(id: i64) -> Row {
    row(&[("id", Value::Int(id)), ("email", Value::from(format!("u{id}@example.com")))])
}

fn post(id: i64, user_id: Value) -> Row {
    row(&[("id", Value::Int(id)), ("user_id", user_id)])
}

fn fk() -> Relationship {
    Relationship::new("users", "id", "posts", "user_id")
}

#[tokio::test]
async fn memory_backend_enforces_declared_foreign_keys() {
    let backend = MemoryBackend::new();
    let ctx = Context::new();
    backend.create_table(&ctx, &users(), &[], &[]).await.expect("users");
    backend.create_table(&ctx, &posts(), &[fk()], &[]).await.expect("posts");
    backend
        .insert_batch(&ctx, &users(), &[user(1), user(2)])
        .await
        .expect("insert users");

    let inserted = backend
        .insert_batch(&ctx, &posts(), &[post(1, Value::Int(1)), post(2, Value::Null)])
        .await
        .expect("insert posts");
    assert_eq!(inserted, 2);

    let orphan = backend
        .insert_batch(&ctx, &posts(), &[post(3, Value::Int(2)), post(4, Value::Int(99))])
        .await;
    assert!(matches!(orphan, Err(BackendError::ForeignKeyViolation { .. })));
    assert_eq!(backend.row_count("posts"), 2);
}

#[tokio::test]
async fn integrity_report_lists_orphans_and_skips_nulls() {
    let backend = MemoryBackend::new();
    let ctx = Context::new();
    backend.create_table(&ctx, &users(), &[], &[]).await.expect("users");
    // No declared FK, so orphans can be stored and then detected.
    backend.create_table(&ctx, &posts(), &[], &[]).await.expect("posts");
    backend.insert_batch(&ctx, &users(), &[user(1)]).await.expect("users");
    let rows: Vec<Row> = (0..15)
        .map(|id| post(id, if id == 0 { Value::Null } else { Value::Int(100 + id) }))
        .chain([post(15, Value::Int(1))])
        .collect();
    backend.insert_batch(&ctx, &posts(), &rows).await.expect("posts");

    let report = backend.verify_integrity(&ctx, &fk()).await.expect("verify");
    assert!(!report.is_valid());
    assert_eq!(report.checked, 15);
    assert_eq!(report.orphan_count, 14);
    assert_eq!(report.orphans.len(), 10);
    assert_eq!(report.orphans[0], Value::Int(101));
    assert_eq!(report.relationship, "users.id -> posts.user_id");
}

#[tokio::test]
async fn memory_backup_round_trips_through_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("snapshot.json");
    let backend = MemoryBackend::new();
    let ctx = Context::new();
    backend.create_table(&ctx, &users(), &[], &[]).await.expect("users");
    backend.insert_batch(&ctx, &users(), &[user(1), user(2)]).await.expect("insert");
    backend.backup(&ctx, &path).await.expect("backup");

    backend.drop_table(&ctx, "users").await.expect("drop");
    backend.drop_table(&ctx, "users").await.expect("drop twice");
    assert_eq!(backend.row_count("users"), 0);

    backend.restore(&ctx, &path).await.expect("restore");
    assert_eq!(backend.row_count("users"), 2);
    let keys = backend.primary_keys(&ctx, &users()).await.expect("keys");
    assert_eq!(keys, vec![Value::Int(1), Value::Int(2)]);
}

#[tokio::test]
async fn factory_resolves_memory_scheme() {
    let ctx = Context::new();
    let backend = connect_backend("memory://scratch", &ctx).await.expect("connect");
    assert_eq!(backend.driver_name(), "memory");
    assert!(matches!(
        connect_backend("redis://localhost", &ctx).await,
        Err(BackendError::UnsupportedScheme(_))
    ));
}

#[tokio::test]
async fn cancelled_context_stops_inserts() {
    let backend = MemoryBackend::new();
    let ctx = Context::new();
    backend.create_table(&ctx, &users(), &[], &[]).await.expect("users");
    ctx.cancel();
    let result = backend.insert_batch(&ctx, &users(), &[user(1)]).await;
    assert!(matches!(result, Err(BackendError::Cancelled)));
    assert_eq!(backend.row_count("users"), 0);
}

#[tokio::test]
async fn sqlite_backend_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("seed.db");
    let dsn = format!("sqlite://{}?max_open_conns=1", db.display());
    let ctx = Context::new();
    let mut backend = connect_backend(&dsn, &ctx).await.expect("connect sqlite");
    assert_eq!(backend.driver_name(), "sqlite");

    backend.drop_table(&ctx, "posts").await.expect("drop");
    backend.create_table(&ctx, &users(), &[], &[]).await.expect("users");
    backend.create_table(&ctx, &posts(), &[fk()], &[]).await.expect("posts");
    let index = Index {
        name: "posts_user_idx".to_string(),
        columns: vec!["user_id".to_string()],
        unique: false,
    };
    backend.create_index(&ctx, &posts(), &index).await.expect("index");

    backend
        .insert_batch(&ctx, &users(), &[user(1), user(2)])
        .await
        .expect("users");
    backend
        .insert_batch(&ctx, &posts(), &[post(1, Value::Int(1)), post(2, Value::Int(2))])
        .await
        .expect("posts");
    let duplicate = backend.insert_batch(&ctx, &users(), &[user(3), user(1)]).await;
    assert!(matches!(duplicate, Err(BackendError::Sql(_))));

    let keys = backend.primary_keys(&ctx, &users()).await.expect("keys");
    assert_eq!(keys.len(), 2);
    let report = backend.verify_integrity(&ctx, &fk()).await.expect("verify");
    assert!(report.is_valid());
    assert_eq!(report.checked, 2);

    let copy = dir.path().join("backup.db");
    backend.backup(&ctx, &copy).await.expect("backup");
    assert!(copy.exists());
    backend.close().await.expect("close");
}
