//! In-process backend holding tables in memory.
//!
//! It enforces primary-key uniqueness and declared foreign keys the way a
//! relational store would, so seeding runs against it exercise the same
//! failure modes. Clones share the same store.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mockcraft_core::{Index, Relationship, Row, Table, Value};

use crate::adapter::{Backend, Transaction};
use crate::context::Context;
use crate::error::{BackendError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Store {
    tables: BTreeMap<String, StoredTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTable {
    columns: Vec<String>,
    primary: Option<String>,
    foreign_keys: Vec<Relationship>,
    indexes: Vec<Index>,
    rows: Vec<Row>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    name: Option<String>,
    state: Arc<Mutex<Store>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.store().tables.keys().cloned().collect()
    }

    /// Stored rows of `table`; empty when the table does not exist.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.store()
            .tables
            .get(table)
            .map(|stored| stored.rows.clone())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.store()
            .tables
            .get(table)
            .map_or(0, |stored| stored.rows.len())
    }

    pub fn indexes(&self, table: &str) -> Vec<Index> {
        self.store()
            .tables
            .get(table)
            .map(|stored| stored.indexes.clone())
            .unwrap_or_default()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn driver_name(&self) -> &'static str {
        "memory"
    }

    async fn connect(&mut self, ctx: &Context) -> Result<()> {
        ctx.check()
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    async fn create_table(
        &self,
        ctx: &Context,
        table: &Table,
        foreign_keys: &[Relationship],
        _checks: &[String],
    ) -> Result<()> {
        ctx.check()?;
        let mut store = self.store();
        for relationship in foreign_keys {
            if relationship.from_table != table.name
                && !store.tables.contains_key(&relationship.from_table)
            {
                return Err(BackendError::UnknownTable(relationship.from_table.clone()));
            }
        }
        store
            .tables
            .entry(table.name.clone())
            .or_insert_with(|| StoredTable {
                columns: table.columns.iter().map(|column| column.name.clone()).collect(),
                primary: table.primary_column().map(|column| column.name.clone()),
                foreign_keys: foreign_keys.to_vec(),
                indexes: Vec::new(),
                rows: Vec::new(),
            });
        Ok(())
    }

    async fn create_index(&self, ctx: &Context, table: &Table, index: &Index) -> Result<()> {
        ctx.check()?;
        let mut store = self.store();
        let stored = store
            .tables
            .get_mut(&table.name)
            .ok_or_else(|| BackendError::UnknownTable(table.name.clone()))?;
        if let Some(column) = index
            .columns
            .iter()
            .find(|column| !stored.columns.contains(column))
        {
            return Err(BackendError::UnknownColumn {
                table: table.name.clone(),
                column: column.clone(),
            });
        }
        if !stored.indexes.iter().any(|existing| existing.name == index.name) {
            stored.indexes.push(index.clone());
        }
        Ok(())
    }

    async fn drop_table(&self, ctx: &Context, name: &str) -> Result<()> {
        ctx.check()?;
        if self.store().tables.remove(name).is_some() {
            debug!(table = name, "dropped in-memory table");
        }
        Ok(())
    }

    async fn insert_batch(&self, ctx: &Context, table: &Table, rows: &[Row]) -> Result<u64> {
        ctx.check()?;
        let mut store = self.store();
        let stored = store
            .tables
            .get(&table.name)
            .ok_or_else(|| BackendError::UnknownTable(table.name.clone()))?;

        let mut batch = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(column) = row.keys().find(|column| !stored.columns.contains(column)) {
                return Err(BackendError::UnknownColumn {
                    table: table.name.clone(),
                    column: column.clone(),
                });
            }
            let full: Row = stored
                .columns
                .iter()
                .map(|column| (column.clone(), row.get(column).cloned().unwrap_or(Value::Null)))
                .collect();
            batch.push(full);
        }

        if let Some(primary) = &stored.primary {
            let mut seen: BTreeSet<String> = stored
                .rows
                .iter()
                .filter_map(|row| row.get(primary))
                .map(Value::key_string)
                .collect();
            for row in &batch {
                let key = row.get(primary).cloned().unwrap_or(Value::Null);
                if !seen.insert(key.key_string()) {
                    return Err(BackendError::DuplicateKey {
                        table: table.name.clone(),
                        key: key.key_string(),
                    });
                }
            }
        }

        for relationship in &stored.foreign_keys {
            let parent_rows = if relationship.from_table == table.name {
                &stored.rows
            } else {
                &store
                    .tables
                    .get(&relationship.from_table)
                    .ok_or_else(|| BackendError::UnknownTable(relationship.from_table.clone()))?
                    .rows
            };
            let mut parents: BTreeSet<String> = parent_rows
                .iter()
                .filter_map(|row| row.get(&relationship.from_column))
                .map(Value::key_string)
                .collect();
            if relationship.from_table == table.name {
                parents.extend(
                    batch
                        .iter()
                        .filter_map(|row| row.get(&relationship.from_column))
                        .map(Value::key_string),
                );
            }
            for row in &batch {
                if let Some(value) = row.get(&relationship.to_column)
                    && !value.is_null()
                    && !parents.contains(&value.key_string())
                {
                    return Err(BackendError::ForeignKeyViolation {
                        relationship: relationship.to_string(),
                        value: value.key_string(),
                    });
                }
            }
        }

        let inserted = batch.len() as u64;
        if let Some(stored) = store.tables.get_mut(&table.name) {
            stored.rows.extend(batch);
        }
        Ok(inserted)
    }

    async fn foreign_key_values(
        &self,
        ctx: &Context,
        table: &str,
        column: &str,
    ) -> Result<Vec<Value>> {
        ctx.check()?;
        let store = self.store();
        let stored = store
            .tables
            .get(table)
            .ok_or_else(|| BackendError::UnknownTable(table.to_string()))?;
        if !stored.columns.iter().any(|name| name == column) {
            return Err(BackendError::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
        Ok(stored
            .rows
            .iter()
            .map(|row| row.get(column).cloned().unwrap_or(Value::Null))
            .collect())
    }

    async fn backup(&self, ctx: &Context, path: &Path) -> Result<()> {
        let snapshot = serde_json::to_vec_pretty(&*self.store())?;
        ctx.run(async { tokio::fs::write(path, snapshot).await.map_err(BackendError::from) })
            .await
    }

    async fn restore(&self, ctx: &Context, path: &Path) -> Result<()> {
        let bytes = ctx
            .run(async { tokio::fs::read(path).await.map_err(BackendError::from) })
            .await?;
        let restored: Store = serde_json::from_slice(&bytes)?;
        *self.store() = restored;
        Ok(())
    }

    async fn begin_transaction(&self, ctx: &Context) -> Result<Box<dyn Transaction>> {
        ctx.check()?;
        let snapshot = self.store().clone();
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            snapshot,
        }))
    }
}

/// Snapshot taken at begin; rollback restores it.
struct MemoryTransaction {
    state: Arc<Mutex<Store>>,
    snapshot: Store,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let MemoryTransaction { state, snapshot } = *self;
        *state.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockcraft_core::Column;

    fn users() -> Table {
        Table::new(
            "users",
            0,
            vec![
                Column::new("id", "integer").primary(),
                Column::new("name", "string"),
            ],
        )
    }

    fn row(id: i64, name: &str) -> Row {
        let mut row = Row::new();
        row.insert("id".to_string(), Value::Int(id));
        row.insert("name".to_string(), Value::from(name));
        row
    }

    #[tokio::test]
    async fn duplicate_keys_reject_the_whole_batch() {
        let backend = MemoryBackend::new();
        let ctx = Context::new();
        backend.create_table(&ctx, &users(), &[], &[]).await.expect("create");
        backend
            .insert_batch(&ctx, &users(), &[row(1, "a")])
            .await
            .expect("insert");
        let result = backend
            .insert_batch(&ctx, &users(), &[row(2, "b"), row(1, "c")])
            .await;
        assert!(matches!(result, Err(BackendError::DuplicateKey { .. })));
        assert_eq!(backend.row_count("users"), 1);
    }

    #[tokio::test]
    async fn rollback_restores_snapshot() {
        let backend = MemoryBackend::new();
        let ctx = Context::new();
        backend.create_table(&ctx, &users(), &[], &[]).await.expect("create");
        let txn = backend.begin_transaction(&ctx).await.expect("begin");
        backend
            .insert_batch(&ctx, &users(), &[row(1, "a")])
            .await
            .expect("insert");
        txn.rollback().await.expect("rollback");
        assert_eq!(backend.row_count("users"), 0);
    }
}
