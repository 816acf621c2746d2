use std::collections::BTreeSet;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mockcraft_backend::{Backend, Context};
use mockcraft_core::{
    Cardinality, ConstraintType, DependencyPlan, Relationship, Row, Schema, Table,
    plan_order_with_deferral,
};
use mockcraft_generate::GeneratorEngine;

use crate::distribution::{balanced, one_to_one, uniform_pick};
use crate::errors::{SeedError, SeedResult};
use crate::model::{SeedReport, TableReport};
use crate::options::SeedOptions;
use crate::registry::PrimaryKeyRegistry;
use crate::validate::validate_and_enhance;
use crate::verify::{offenders, verify_relationships};

/// Drives one schema into one backend.
pub struct Seeder {
    engine: GeneratorEngine,
    backend: Box<dyn Backend>,
    options: SeedOptions,
    ctx: Context,
    run_id: Option<String>,
}

impl Seeder {
    pub fn new(backend: Box<dyn Backend>, options: SeedOptions) -> Self {
        let mut engine = GeneratorEngine::new(options.seed);
        if let Some(reference_time) = options.reference_time {
            engine = engine.with_reference_time(reference_time);
        }
        Self {
            engine,
            backend,
            options,
            ctx: Context::new(),
            run_id: None,
        }
    }

    /// Use a caller-built engine, e.g. one with extra generators registered.
    pub fn with_engine(mut self, engine: GeneratorEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Bound the run by the context's deadline and cancellation token.
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    /// Report under `run_id` instead of a fresh one.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn engine(&self) -> &GeneratorEngine {
        &self.engine
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn options(&self) -> &SeedOptions {
        &self.options
    }

    pub fn into_backend(self) -> Box<dyn Backend> {
        self.backend
    }

    /// Validate, create and populate every table of `schema`, then verify
    /// every relationship.
    ///
    /// The engine is reseeded first, so seeding the same schema twice with the
    /// same options produces the same rows.
    pub async fn seed(&mut self, mut schema: Schema) -> SeedResult<SeedReport> {
        self.engine.reseed(self.options.seed);
        let run_id = self.run_id.clone().unwrap_or_else(new_run_id);
        let mut report = SeedReport::new(run_id, self.options.seed, self.backend.driver_name());
        info!(run_id = %report.run_id, driver = %report.driver, seed = report.seed, "seed run started");

        self.backup_first(&mut report).await?;

        validate_and_enhance(&mut schema, &self.engine, &self.options.validation)?;
        for column in schema.tables.iter().flat_map(|table| &table.columns) {
            let key = format!("{}.{}", column.industry_or_default(), column.generator);
            *report.generator_usage.entry(key).or_insert(0) += 1;
        }

        let plan = plan_order_with_deferral(&schema);
        let deferred = deferred_tables(&schema, &plan);
        report.order = plan.order.clone();
        report.deferred = plan
            .order
            .iter()
            .filter(|name| deferred.contains(*name))
            .cloned()
            .collect();
        debug!(order = ?report.order, deferred = ?report.deferred, "tables planned");

        if self.options.drop_before_create {
            for name in plan.order.iter().rev() {
                self.backend
                    .drop_table(&self.ctx, name)
                    .await
                    .map_err(|err| SeedError::in_table(name, err))?;
            }
        }

        let mut registry = PrimaryKeyRegistry::new();
        let mut created = BTreeSet::new();
        let mut pending = Vec::new();
        for name in &plan.order {
            let Some(table) = schema.table(name) else {
                continue;
            };
            self.create_structure(&schema, table, &deferred, &created, &registry, &mut report)
                .await?;
            created.insert(table.name.clone());
            if deferred.contains(&table.name) {
                debug!(table = %table.name, "insert deferred");
                pending.push(table);
                continue;
            }

            let (rows, from_data) = match &table.data {
                Some(data) => (data.clone(), true),
                None => {
                    let mut inherited = vec![Row::new(); row_count(table)];
                    self.assign_foreign_keys(&schema, table, &registry, &mut inherited, &mut report);
                    (self.generate_rows(table, &inherited)?, false)
                }
            };
            let (inserted, batches) = self.insert_rows(table, &rows).await?;
            registry.record_rows(&table.name, &key_columns(&schema, table), &rows);
            report.tables.push(TableReport {
                table: table.name.clone(),
                rows_requested: table.count,
                rows_inserted: inserted,
                batches,
                deferred: false,
                from_data,
            });
        }

        if !pending.is_empty() {
            self.seed_deferred(&schema, &pending, &mut registry, &mut report)
                .await?;
        }

        if self.options.verify {
            report.verification =
                verify_relationships(self.backend.as_ref(), &self.ctx, &schema.relations).await?;
            let failed: Vec<_> = report
                .verification
                .iter()
                .filter(|check| !check.is_valid())
                .map(|check| {
                    (
                        check.relationship.clone(),
                        format!(
                            "{} of {} references are orphans (first: {})",
                            check.orphan_count,
                            check.checked,
                            offenders(check)
                        ),
                    )
                })
                .collect();
            for (relationship, message) in failed {
                report.warn("integrity_violation", message, None, Some(relationship));
            }
        }

        info!(
            run_id = %report.run_id,
            tables = report.tables.len(),
            rows = report.total_rows(),
            warnings = report.warnings.len(),
            "seed run finished"
        );
        Ok(report)
    }

    async fn backup_first(&self, report: &mut SeedReport) -> SeedResult<()> {
        let Some(path) = &self.options.backup_path else {
            return Ok(());
        };
        match self.backend.backup(&self.ctx, path).await {
            Ok(()) => {
                info!(path = %path.display(), "backup written");
                Ok(())
            }
            Err(err) if err.is_cancellation() => Err(err.into()),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "backup failed; continuing");
                report.warn("backup_failed", err.to_string(), None, None);
                Ok(())
            }
        }
    }

    async fn create_structure(
        &self,
        schema: &Schema,
        table: &Table,
        deferred: &BTreeSet<String>,
        created: &BTreeSet<String>,
        registry: &PrimaryKeyRegistry,
        report: &mut SeedReport,
    ) -> SeedResult<()> {
        let mut foreign_keys = Vec::new();
        for relation in schema.relationships_for_child(&table.name) {
            let parent = relation.parent();
            if relation.is_self_reference() || deferred.contains(parent) || !created.contains(parent) {
                continue;
            }
            let referenced = schema
                .table(parent)
                .and_then(|parent| parent.column(&relation.from_column))
                .is_some_and(|column| column.is_primary || column.is_unique);
            if !referenced {
                debug!(relationship = %relation, "parent column is not a key; constraint skipped");
                continue;
            }
            if registry.is_empty(parent, &relation.from_column) {
                warn!(relationship = %relation, "parent has no rows; constraint skipped");
                report.warn(
                    "fk_constraint_skipped",
                    format!("{parent} has no rows to reference"),
                    Some(table.name.as_str()),
                    Some(relation.to_string()),
                );
                continue;
            }
            foreign_keys.push(relation.clone());
        }

        let checks: Vec<String> = schema
            .constraints
            .iter()
            .filter(|constraint| constraint.constraint_type == ConstraintType::Check)
            .filter(|constraint| match &constraint.table {
                Some(name) => name == &table.name,
                None => constraint.columns.iter().all(|column| table.has_column(column)),
            })
            .filter_map(|constraint| constraint.condition.clone())
            .collect();

        self.backend
            .create_table(&self.ctx, table, &foreign_keys, &checks)
            .await
            .map_err(|err| SeedError::in_table(&table.name, err))?;
        for index in &table.indexes {
            self.backend
                .create_index(&self.ctx, table, index)
                .await
                .map_err(|err| SeedError::in_table(&table.name, err))?;
        }
        debug!(table = %table.name, foreign_keys = foreign_keys.len(), indexes = table.indexes.len(), "table created");
        Ok(())
    }

    /// Fill foreign-key columns of `inherited` from the registry.
    ///
    /// The first relationship naming this table as child is balanced; the
    /// rest are drawn uniformly. Columns already set are left alone.
    fn assign_foreign_keys(
        &mut self,
        schema: &Schema,
        table: &Table,
        registry: &PrimaryKeyRegistry,
        inherited: &mut [Row],
        report: &mut SeedReport,
    ) {
        let relations: Vec<&Relationship> = schema.relationships_for_child(&table.name).collect();
        let Some((primary, secondary)) = relations.split_first() else {
            return;
        };

        let keys = registry.keys(primary.parent(), &primary.from_column);
        let assigned: Option<Vec<_>> = if primary.cardinality == Cardinality::OneToOne {
            if keys.len() < inherited.len() {
                warn!(relationship = %primary, keys = keys.len(), rows = inherited.len(), "fewer parent keys than one-to-one children");
                report.warn(
                    "fk_distribution",
                    format!("{} parent keys for {} one-to-one rows", keys.len(), inherited.len()),
                    Some(table.name.as_str()),
                    Some(primary.to_string()),
                );
            }
            Some(one_to_one(inherited.len(), keys))
        } else {
            balanced(inherited.len(), keys, self.engine.rng_mut())
                .map(|values| values.into_iter().map(Some).collect())
        };
        match assigned {
            Some(values) => {
                for (row, value) in inherited.iter_mut().zip(values) {
                    if let Some(value) = value {
                        row.entry(primary.to_column.clone()).or_insert(value);
                    }
                }
            }
            None if !inherited.is_empty() => {
                warn!(relationship = %primary, "no primary keys for balanced distribution");
                report.warn(
                    "fk_distribution",
                    "no primary keys for balanced distribution",
                    Some(table.name.as_str()),
                    Some(primary.to_string()),
                );
            }
            None => {}
        }

        for relation in secondary {
            let keys = registry.keys(relation.parent(), &relation.from_column);
            if keys.is_empty() {
                if !inherited.is_empty() {
                    warn!(relationship = %relation, "no keys for secondary reference");
                    report.warn(
                        "fk_distribution",
                        "no keys for secondary reference",
                        Some(table.name.as_str()),
                        Some(relation.to_string()),
                    );
                }
                continue;
            }
            for row in inherited.iter_mut() {
                if row.contains_key(&relation.to_column) {
                    continue;
                }
                if let Some(value) = uniform_pick(keys, self.engine.rng_mut()) {
                    row.insert(relation.to_column.clone(), value);
                }
            }
        }
    }

    fn generate_rows(&mut self, table: &Table, inherited: &[Row]) -> SeedResult<Vec<Row>> {
        inherited
            .iter()
            .map(|row| {
                self.engine
                    .generate_row_in(&table.name, &table.columns, row)
                    .map_err(|err| SeedError::in_table(&table.name, err))
            })
            .collect()
    }

    async fn insert_rows(&self, table: &Table, rows: &[Row]) -> SeedResult<(u64, u64)> {
        let mut inserted = 0;
        let mut batches = 0;
        for chunk in rows.chunks(self.options.effective_batch_size()) {
            self.ctx
                .check()
                .map_err(|err| SeedError::in_table(&table.name, err))?;
            inserted += self
                .backend
                .insert_batch(&self.ctx, table, chunk)
                .await
                .map_err(|err| SeedError::in_table(&table.name, err))?;
            batches += 1;
            debug!(table = %table.name, batch = batches, rows = chunk.len(), "batch inserted");
        }
        info!(table = %table.name, rows = inserted, batches, "table inserted");
        Ok((inserted, batches))
    }

    /// Seed tables that sit on a cycle or below one.
    ///
    /// Key columns of every deferred table are generated and recorded first,
    /// so foreign keys in either direction of a cycle can point at real rows.
    async fn seed_deferred(
        &mut self,
        schema: &Schema,
        pending: &[&Table],
        registry: &mut PrimaryKeyRegistry,
        report: &mut SeedReport,
    ) -> SeedResult<()> {
        let mut prepared = Vec::with_capacity(pending.len());
        for table in pending {
            let keys = key_columns(schema, table);
            let rows = match &table.data {
                Some(data) => data.clone(),
                None => {
                    let child_columns: BTreeSet<&str> = schema
                        .relationships_for_child(&table.name)
                        .map(|relation| relation.to_column.as_str())
                        .collect();
                    let mut rows = Vec::with_capacity(row_count(table));
                    for _ in 0..row_count(table) {
                        let mut row = Row::new();
                        for column in table
                            .columns
                            .iter()
                            .filter(|column| keys.contains(&column.name))
                            .filter(|column| !child_columns.contains(column.name.as_str()))
                        {
                            let value = self
                                .engine
                                .generate_column(&table.name, column)
                                .map_err(|err| SeedError::in_table(&table.name, err))?;
                            row.insert(column.name.clone(), value);
                        }
                        rows.push(row);
                    }
                    rows
                }
            };
            registry.record_rows(&table.name, &keys, &rows);
            prepared.push(rows);
        }

        let mut generated = Vec::with_capacity(pending.len());
        for (table, mut inherited) in pending.iter().zip(prepared) {
            if table.data.is_some() {
                generated.push((inherited, true));
                continue;
            }
            self.assign_foreign_keys(schema, table, registry, &mut inherited, report);
            let rows = self.generate_rows(table, &inherited)?;
            generated.push((rows, false));
        }

        for (table, (rows, from_data)) in pending.iter().zip(generated) {
            let (inserted, batches) = self.insert_rows(table, &rows).await?;
            report.tables.push(TableReport {
                table: table.name.clone(),
                rows_requested: table.count,
                rows_inserted: inserted,
                batches,
                deferred: true,
                from_data,
            });
        }
        Ok(())
    }
}

/// Circular tables plus every table that depends on one.
fn deferred_tables(schema: &Schema, plan: &DependencyPlan) -> BTreeSet<String> {
    let mut deferred: BTreeSet<String> = plan.circular.iter().cloned().collect();
    for name in &plan.order {
        if schema
            .relationships_for_child(name)
            .any(|relation| !relation.is_self_reference() && deferred.contains(relation.parent()))
        {
            deferred.insert(name.clone());
        }
    }
    deferred
}

/// The primary column plus every column another relationship points at.
fn key_columns(schema: &Schema, table: &Table) -> Vec<String> {
    let mut columns: Vec<String> = table
        .primary_column()
        .map(|column| column.name.clone())
        .into_iter()
        .collect();
    for relation in &schema.relations {
        if relation.from_table == table.name && !columns.contains(&relation.from_column) {
            columns.push(relation.from_column.clone());
        }
    }
    columns
}

fn row_count(table: &Table) -> usize {
    usize::try_from(table.count).unwrap_or(usize::MAX)
}

/// `{date}__seed_{short uuid}`.
pub fn new_run_id() -> String {
    let date = Utc::now().format("%Y-%m-%d");
    let uuid = Uuid::new_v4().to_string();
    let short = uuid.split('-').next().unwrap_or("run");
    format!("{date}__seed_{short}")
}
