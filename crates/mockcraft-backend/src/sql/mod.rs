//! Relational backends over sqlx's `Any` driver.

mod dialect;

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::any::{AnyArguments, AnyPoolOptions};
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Row as _};
use tokio::process::Command;
use tracing::{debug, info};

use mockcraft_core::{Index, Relationship, Row, Table, Value};

use crate::adapter::{Backend, Transaction};
use crate::context::Context;
use crate::dsn::{ConnectionConfig, Driver};
use crate::error::{BackendError, Result};

pub use dialect::{Dialect, SqlParam};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Postgres, MySQL or SQLite behind one pool.
#[derive(Debug)]
pub struct SqlBackend {
    config: ConnectionConfig,
    dialect: Dialect,
    pool: Option<AnyPool>,
}

impl SqlBackend {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let dialect = match config.driver {
            Driver::Postgres => Dialect::Postgres,
            Driver::MySql => Dialect::MySql,
            Driver::Sqlite => Dialect::Sqlite,
            other => {
                return Err(BackendError::UnsupportedScheme(other.as_str().to_string()));
            }
        };
        Ok(Self {
            config,
            dialect,
            pool: None,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn pool(&self) -> Result<&AnyPool> {
        self.pool.as_ref().ok_or(BackendError::NotConnected)
    }

    /// `CREATE TABLE` statement for `table`.
    pub fn create_table_sql(
        &self,
        table: &Table,
        foreign_keys: &[Relationship],
        checks: &[String],
    ) -> String {
        let dialect = self.dialect;
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|column| {
                let is_key = is_key_column(table, column.name.as_str(), foreign_keys);
                let mut definition = format!(
                    "{} {}",
                    dialect.quote(&column.name),
                    dialect.column_type(column, is_key)
                );
                if column.is_primary {
                    definition.push_str(" PRIMARY KEY");
                } else if column.is_unique {
                    definition.push_str(" UNIQUE");
                }
                definition
            })
            .collect();
        parts.extend(checks.iter().map(|condition| format!("CHECK ({condition})")));
        parts.extend(
            foreign_keys
                .iter()
                .filter(|relationship| relationship.to_table == table.name)
                .map(|relationship| {
                    format!(
                        "FOREIGN KEY ({}) REFERENCES {} ({})",
                        dialect.quote(&relationship.to_column),
                        dialect.quote(&relationship.from_table),
                        dialect.quote(&relationship.from_column)
                    )
                }),
        );
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            dialect.quote(&table.name),
            parts.join(",\n  ")
        )
    }

    pub fn create_index_sql(&self, table: &Table, index: &Index) -> String {
        let dialect = self.dialect;
        let unique = if index.unique { "UNIQUE " } else { "" };
        let if_not_exists = if dialect == Dialect::MySql {
            ""
        } else {
            "IF NOT EXISTS "
        };
        let columns: Vec<String> = index.columns.iter().map(|c| dialect.quote(c)).collect();
        format!(
            "CREATE {unique}INDEX {if_not_exists}{} ON {} ({})",
            dialect.quote(&index.name),
            dialect.quote(&table.name),
            columns.join(", ")
        )
    }

    /// Multi-row `INSERT` statements for `rows`, each within the dialect's
    /// parameter ceiling.
    pub fn insert_statements(&self, table: &Table, rows: &[Row]) -> Vec<(String, Vec<SqlParam>)> {
        let dialect = self.dialect;
        let width = table.columns.len().max(1);
        let rows_per_statement = (dialect.max_params() / width).max(1);
        let column_list: Vec<String> = table
            .columns
            .iter()
            .map(|column| dialect.quote(&column.name))
            .collect();
        let head = format!(
            "INSERT INTO {} ({}) VALUES ",
            dialect.quote(&table.name),
            column_list.join(", ")
        );

        rows.chunks(rows_per_statement)
            .map(|chunk| {
                let mut params = Vec::with_capacity(chunk.len() * width);
                let mut tuples = Vec::with_capacity(chunk.len());
                for row in chunk {
                    let mut slots = Vec::with_capacity(width);
                    for column in &table.columns {
                        params.push(dialect.param(row.get(&column.name).unwrap_or(&Value::Null)));
                        let is_key = column.is_primary || column.is_unique;
                        slots.push(dialect.placeholder(params.len(), column, is_key));
                    }
                    tuples.push(format!("({})", slots.join(", ")));
                }
                (format!("{head}{}", tuples.join(", ")), params)
            })
            .collect()
    }

    async fn open_pool(&self) -> Result<AnyPool> {
        sqlx::any::install_default_drivers();
        let pool = &self.config.pool;
        let mut options = AnyPoolOptions::new()
            .max_connections(pool.max_open.max(1))
            .min_connections(pool.max_idle.min(pool.max_open))
            .max_lifetime(Some(pool.max_lifetime))
            .idle_timeout(Some(pool.max_idle_time))
            .acquire_timeout(ACQUIRE_TIMEOUT);
        if self.dialect == Dialect::Sqlite {
            options = options.after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            });
        }
        Ok(options.connect(&self.config.url).await?)
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        debug!(driver = self.dialect_name(), sql, "executing statement");
        let result = sqlx::query(sql).execute(self.pool()?).await?;
        Ok(result.rows_affected())
    }

    async fn insert_rows(&self, table: &Table, rows: &[Row]) -> Result<u64> {
        let statements = self.insert_statements(table, rows);
        let mut tx = self.pool()?.begin().await?;
        let mut affected = 0;
        for (sql, params) in &statements {
            let mut query = sqlx::query(sql.as_str());
            for param in params {
                query = bind(query, param.clone());
            }
            affected += query.execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(affected)
    }

    async fn fetch_column(&self, table: &str, column: &str) -> Result<Vec<Value>> {
        let sql = format!(
            "SELECT {} FROM {}",
            self.dialect.select_as_text(column),
            self.dialect.quote(table)
        );
        let rows = sqlx::query(&sql).fetch_all(self.pool()?).await?;
        rows.iter()
            .map(|row| -> Result<Value> {
                let value: Option<String> = row.try_get(0)?;
                Ok(value.map_or(Value::Null, Value::Text))
            })
            .collect()
    }

    fn dialect_name(&self) -> &'static str {
        self.config.driver.as_str()
    }

    async fn dump(&self, path: &Path) -> Result<()> {
        let config = &self.config;
        match self.dialect {
            Dialect::Postgres => {
                let mut command = Command::new("pg_dump");
                command
                    .args(["--format=custom", "--compress=9", "--clean", "--create"])
                    .args(connection_args(config, "-h", "-p", "-U"))
                    .arg("--file")
                    .arg(path);
                if let Some(database) = &config.database {
                    command.args(["--dbname", database.as_str()]);
                }
                if let Some(password) = &config.password {
                    command.env("PGPASSWORD", password);
                }
                run_command(command, "pg_dump").await
            }
            Dialect::MySql => {
                let mut command = Command::new("mysqldump");
                command
                    .args(connection_args(config, "-h", "-P", "-u"))
                    .arg(format!("--result-file={}", path.display()));
                if let Some(database) = &config.database {
                    command.args(["--databases", database.as_str()]);
                }
                if let Some(password) = &config.password {
                    command.env("MYSQL_PWD", password);
                }
                run_command(command, "mysqldump").await
            }
            Dialect::Sqlite => {
                let source = self.sqlite_path()?;
                tokio::fs::copy(source, path).await?;
                sync_file(path).await
            }
        }
    }

    async fn load(&self, path: &Path) -> Result<()> {
        let config = &self.config;
        match self.dialect {
            Dialect::Postgres => {
                let mut command = Command::new("pg_restore");
                command
                    .args(["--clean", "--create", "--dbname", "postgres"])
                    .args(connection_args(config, "-h", "-p", "-U"))
                    .arg(path);
                if let Some(password) = &config.password {
                    command.env("PGPASSWORD", password);
                }
                run_command(command, "pg_restore").await
            }
            Dialect::MySql => {
                let dump = tokio::fs::File::open(path).await?.into_std().await;
                let mut command = Command::new("mysql");
                command
                    .args(connection_args(config, "-h", "-P", "-u"))
                    .stdin(Stdio::from(dump));
                if let Some(password) = &config.password {
                    command.env("MYSQL_PWD", password);
                }
                run_command(command, "mysql").await
            }
            Dialect::Sqlite => {
                let target = self.sqlite_path()?;
                tokio::fs::copy(path, target).await?;
                sync_file(Path::new(target)).await
            }
        }
    }

    fn sqlite_path(&self) -> Result<&str> {
        match self.config.path.as_deref() {
            Some(":memory:") | None => Err(BackendError::Unsupported(
                "in-memory sqlite databases cannot be backed up".to_string(),
            )),
            Some(path) => Ok(path),
        }
    }
}

fn is_key_column(table: &Table, column: &str, foreign_keys: &[Relationship]) -> bool {
    table
        .column(column)
        .is_some_and(|c| c.is_primary || c.is_unique)
        || foreign_keys
            .iter()
            .any(|relationship| relationship.to_table == table.name && relationship.to_column == column)
        || table
            .indexes
            .iter()
            .any(|index| index.columns.iter().any(|name| name == column))
}

fn bind<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    param: SqlParam,
) -> Query<'q, Any, AnyArguments<'q>> {
    match param {
        SqlParam::Null => query.bind(None::<String>),
        SqlParam::Bool(value) => query.bind(value),
        SqlParam::Int(value) => query.bind(value),
        SqlParam::Float(value) => query.bind(value),
        SqlParam::Text(value) => query.bind(value),
    }
}

fn connection_args(
    config: &ConnectionConfig,
    host_flag: &str,
    port_flag: &str,
    user_flag: &str,
) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(host) = &config.host {
        args.extend([host_flag.to_string(), host.clone()]);
    }
    if let Some(port) = config.port {
        args.extend([port_flag.to_string(), port.to_string()]);
    }
    if let Some(user) = &config.user {
        args.extend([user_flag.to_string(), user.clone()]);
    }
    args
}

pub(crate) async fn run_command(mut command: Command, program: &str) -> Result<()> {
    command.kill_on_drop(true);
    let output = command.output().await?;
    if output.status.success() {
        info!(program, "external tool finished");
        return Ok(());
    }
    Err(BackendError::Command {
        program: program.to_string(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

async fn sync_file(path: &Path) -> Result<()> {
    let file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
    file.sync_all().await?;
    Ok(())
}

#[async_trait]
impl Backend for SqlBackend {
    fn driver_name(&self) -> &'static str {
        self.dialect_name()
    }

    async fn connect(&mut self, ctx: &Context) -> Result<()> {
        if self.pool.is_some() {
            return Ok(());
        }
        let pool = ctx.run(self.open_pool()).await?;
        info!(driver = self.dialect_name(), dsn = %self.config.redacted(), "connected");
        self.pool = Some(pool);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
        Ok(())
    }

    async fn create_table(
        &self,
        ctx: &Context,
        table: &Table,
        foreign_keys: &[Relationship],
        checks: &[String],
    ) -> Result<()> {
        let sql = self.create_table_sql(table, foreign_keys, checks);
        ctx.run(self.execute(&sql)).await.map(|_| ())
    }

    async fn create_index(&self, ctx: &Context, table: &Table, index: &Index) -> Result<()> {
        let sql = self.create_index_sql(table, index);
        ctx.run(self.execute(&sql)).await.map(|_| ())
    }

    async fn drop_table(&self, ctx: &Context, name: &str) -> Result<()> {
        let sql = self.dialect.drop_table(name);
        ctx.run(self.execute(&sql)).await.map(|_| ())
    }

    async fn insert_batch(&self, ctx: &Context, table: &Table, rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        ctx.run(self.insert_rows(table, rows)).await
    }

    async fn foreign_key_values(
        &self,
        ctx: &Context,
        table: &str,
        column: &str,
    ) -> Result<Vec<Value>> {
        ctx.run(self.fetch_column(table, column)).await
    }

    async fn backup(&self, ctx: &Context, path: &Path) -> Result<()> {
        ctx.run(self.dump(path)).await
    }

    async fn restore(&self, ctx: &Context, path: &Path) -> Result<()> {
        ctx.run(self.load(path)).await
    }

    async fn begin_transaction(&self, ctx: &Context) -> Result<Box<dyn Transaction>> {
        let pool = self.pool()?;
        let inner = ctx
            .run(async { pool.begin().await.map_err(BackendError::from) })
            .await?;
        Ok(Box::new(SqlTransaction { inner }))
    }
}

struct SqlTransaction {
    inner: sqlx::Transaction<'static, Any>,
}

#[async_trait]
impl Transaction for SqlTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        Ok(self.inner.commit().await?)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(self.inner.rollback().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockcraft_core::Column;

    fn backend(dsn: &str) -> SqlBackend {
        SqlBackend::new(ConnectionConfig::parse(dsn).expect("dsn")).expect("sql backend")
    }

    fn posts() -> Table {
        Table::new(
            "posts",
            10,
            vec![
                Column::new("id", "integer").primary(),
                Column::new("user_id", "string"),
                Column::new("title", "string"),
            ],
        )
    }

    #[test]
    fn ddl_declares_primary_and_foreign_keys() {
        let fk = Relationship::new("users", "id", "posts", "user_id");
        let sql = backend("mysql://root@localhost/app").create_table_sql(
            &posts(),
            &[fk],
            &["`id` > 0".to_string()],
        );
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `posts`"));
        assert!(sql.contains("`id` INT PRIMARY KEY"));
        assert!(sql.contains("`user_id` VARCHAR(255)"));
        assert!(sql.contains("`title` TEXT"));
        assert!(sql.contains("CHECK (`id` > 0)"));
        assert!(sql.contains("FOREIGN KEY (`user_id`) REFERENCES `users` (`id`)"));
    }

    #[test]
    fn inserts_split_at_parameter_ceiling() {
        let backend = backend("sqlite://seed.db");
        let rows: Vec<Row> = (0..20_000)
            .map(|id| {
                let mut row = Row::new();
                row.insert("id".to_string(), Value::Int(id));
                row
            })
            .collect();
        let statements = backend.insert_statements(&posts(), &rows);
        // 32766 / 3 columns = 10922 rows per statement.
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].1.len(), 10_922 * 3);
        assert_eq!(statements[1].1[1], SqlParam::Null);
    }

    #[test]
    fn postgres_inserts_cast_placeholders() {
        let backend = backend("postgres://u:p@localhost/app");
        let mut row = Row::new();
        row.insert("id".to_string(), Value::Int(1));
        let statements = backend.insert_statements(&posts(), &[row]);
        assert_eq!(
            statements[0].0,
            "INSERT INTO \"posts\" (\"id\", \"user_id\", \"title\") VALUES \
             (CAST($1 AS INTEGER), CAST($2 AS TEXT), CAST($3 AS TEXT))"
        );
    }

    #[test]
    fn rejects_document_drivers() {
        let config = ConnectionConfig::parse("mongodb://localhost/app").expect("dsn");
        assert!(SqlBackend::new(config).is_err());
    }
}
