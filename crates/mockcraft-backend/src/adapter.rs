use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use mockcraft_core::{Index, Relationship, Row, Table, Value};

use crate::context::Context;
use crate::error::{BackendError, Result};

/// Offenders listed in an integrity report.
pub const MAX_REPORTED_ORPHANS: usize = 10;

/// Outcome of checking one relationship against stored data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityReport {
    pub relationship: String,
    /// Non-null child foreign-key values examined.
    pub checked: usize,
    pub orphan_count: usize,
    /// First offending values, in child order.
    pub orphans: Vec<Value>,
}

impl IntegrityReport {
    pub fn is_valid(&self) -> bool {
        self.orphan_count == 0
    }

    /// Child values missing from the parent key set. Nulls are not references.
    pub fn compute(relationship: &Relationship, parent_keys: &[Value], child_values: &[Value]) -> Self {
        let parents: BTreeSet<String> = parent_keys.iter().map(Value::key_string).collect();
        let mut checked = 0;
        let mut orphan_count = 0;
        let mut orphans = Vec::new();
        for value in child_values.iter().filter(|value| !value.is_null()) {
            checked += 1;
            if !parents.contains(&value.key_string()) {
                orphan_count += 1;
                if orphans.len() < MAX_REPORTED_ORPHANS {
                    orphans.push(value.clone());
                }
            }
        }
        Self {
            relationship: relationship.to_string(),
            checked,
            orphan_count,
            orphans,
        }
    }
}

/// An open unit of work; consumed by `commit` or `rollback`.
#[async_trait]
pub trait Transaction: Send {
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Storage contract the seeder drives.
///
/// Implementations own one logical connection (pool) and honor the
/// [`Context`] passed to each call.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short identifier such as `postgres` or `mongodb`.
    fn driver_name(&self) -> &'static str;

    async fn connect(&mut self, ctx: &Context) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    /// Create `table`. `foreign_keys` lists the relationships whose child is
    /// this table and that the caller wants declared; `checks` are SQL
    /// conditions. Document stores ignore both and index the primary column.
    async fn create_table(
        &self,
        ctx: &Context,
        table: &Table,
        foreign_keys: &[Relationship],
        checks: &[String],
    ) -> Result<()>;

    async fn create_index(&self, ctx: &Context, table: &Table, index: &Index) -> Result<()>;

    /// Drop `name` if it exists.
    async fn drop_table(&self, ctx: &Context, name: &str) -> Result<()>;

    /// Insert `rows` atomically: either all land or none do.
    async fn insert_batch(&self, ctx: &Context, table: &Table, rows: &[Row]) -> Result<u64>;

    /// Every stored value of `column`, in storage order.
    async fn foreign_key_values(&self, ctx: &Context, table: &str, column: &str)
    -> Result<Vec<Value>>;

    async fn primary_keys(&self, ctx: &Context, table: &Table) -> Result<Vec<Value>> {
        let column = table
            .primary_column()
            .ok_or_else(|| BackendError::NoPrimaryKey(table.name.clone()))?;
        self.foreign_key_values(ctx, &table.name, &column.name).await
    }

    async fn verify_integrity(
        &self,
        ctx: &Context,
        relationship: &Relationship,
    ) -> Result<IntegrityReport> {
        let parents = self
            .foreign_key_values(ctx, &relationship.from_table, &relationship.from_column)
            .await?;
        let children = self
            .foreign_key_values(ctx, &relationship.to_table, &relationship.to_column)
            .await?;
        Ok(IntegrityReport::compute(relationship, &parents, &children))
    }

    async fn backup(&self, ctx: &Context, path: &Path) -> Result<()>;

    async fn restore(&self, ctx: &Context, path: &Path) -> Result<()>;

    async fn begin_transaction(&self, ctx: &Context) -> Result<Box<dyn Transaction>>;
}
