//! Document backend over the official MongoDB driver.
//!
//! Tables map to collections. Composite values produced in extended JSON
//! (`$binary`, `$timestamp`, ...) are converted to native BSON on insert.

use std::io::Write;
use std::path::Path;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, ClientSession, Collection, Database, IndexModel};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, info};

use mockcraft_core::{Column, Index, Relationship, Row, Table, Value};

use crate::adapter::{Backend, Transaction};
use crate::context::Context;
use crate::dsn::{ConnectionConfig, Driver};
use crate::error::{BackendError, Result};
use crate::sql::run_command;

const DEFAULT_DATABASE: &str = "test";
const OBJECT_ID_GENERATOR: &str = "mongo_object_id";

pub struct MongoBackend {
    config: ConnectionConfig,
    client: Option<Client>,
}

impl MongoBackend {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        if config.driver != Driver::MongoDb {
            return Err(BackendError::UnsupportedScheme(config.driver.as_str().to_string()));
        }
        Ok(Self {
            config,
            client: None,
        })
    }

    fn database_name(&self) -> &str {
        self.config.database.as_deref().unwrap_or(DEFAULT_DATABASE)
    }

    fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or(BackendError::NotConnected)
    }

    fn database(&self) -> Result<Database> {
        Ok(self.client()?.database(self.database_name()))
    }

    fn collection(&self, name: &str) -> Result<Collection<Document>> {
        Ok(self.database()?.collection::<Document>(name))
    }

    /// Multi-document transactions need a replica set or sharded cluster.
    fn supports_transactions(&self) -> bool {
        self.config.replica_set.is_some()
    }

    async fn open_client(&self) -> Result<Client> {
        let mut options = ClientOptions::parse(&self.config.url).await?;
        options.max_pool_size = Some(self.config.pool.max_open);
        options.max_idle_time = Some(self.config.pool.max_idle_time);
        let client = Client::with_options(options)?;
        client
            .database(self.database_name())
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(client)
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let names = self.database()?.list_collection_names().await?;
        Ok(names.iter().any(|existing| existing == name))
    }

    async fn create_collection(&self, table: &Table) -> Result<()> {
        if !self.collection_exists(&table.name).await? {
            self.database()?.create_collection(&table.name).await?;
        }
        // `_id` is always uniquely indexed by the server.
        if let Some(primary) = table.primary_column()
            && primary.name != "_id"
        {
            let mut keys = Document::new();
            keys.insert(primary.name.clone(), 1);
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(format!("{}_{}_pk", table.name, primary.name))
                        .unique(true)
                        .build(),
                )
                .build();
            self.collection(&table.name)?.create_index(model).await?;
        }
        Ok(())
    }

    async fn create_named_index(&self, table: &Table, index: &Index) -> Result<()> {
        let mut keys = Document::new();
        for column in &index.columns {
            keys.insert(column.as_str(), 1);
        }
        let model = IndexModel::builder()
            .keys(keys)
            .options(
                IndexOptions::builder()
                    .name(index.name.clone())
                    .unique(index.unique)
                    .build(),
            )
            .build();
        self.collection(&table.name)?.create_index(model).await?;
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        if self.collection_exists(name).await? {
            self.collection(name)?.drop().await?;
            debug!(collection = name, "dropped collection");
        }
        Ok(())
    }

    async fn insert_documents(&self, table: &Table, rows: &[Row]) -> Result<u64> {
        let documents = rows
            .iter()
            .map(|row| row_to_document(table, row))
            .collect::<Result<Vec<_>>>()?;
        let collection = self.collection(&table.name)?;

        if !self.supports_transactions() {
            let result = collection.insert_many(documents).await?;
            return Ok(result.inserted_ids.len() as u64);
        }

        let mut session = self.client()?.start_session().await?;
        session.start_transaction().await?;
        match collection.insert_many(documents).session(&mut session).await {
            Ok(result) => {
                session.commit_transaction().await?;
                Ok(result.inserted_ids.len() as u64)
            }
            Err(err) => {
                if let Err(abort) = session.abort_transaction().await {
                    debug!(error = %abort, "abort after failed insert also failed");
                }
                Err(err.into())
            }
        }
    }

    async fn fetch_field(&self, table: &str, column: &str) -> Result<Vec<Value>> {
        let mut projection = Document::new();
        projection.insert(column, 1);
        if column != "_id" {
            projection.insert("_id", 0);
        }
        let mut cursor = self
            .collection(table)?
            .find(doc! {})
            .projection(projection)
            .await?;
        let mut values = Vec::new();
        while cursor.advance().await? {
            let document = cursor.deserialize_current()?;
            values.push(document.get(column).cloned().map_or(Value::Null, bson_to_value));
        }
        Ok(values)
    }

    async fn dump(&self, path: &Path) -> Result<()> {
        let config = tool_config(&self.config.url)?;
        let mut command = Command::new("mongodump");
        command
            .args(archive_args(config.path(), path))
            .arg("--gzip");
        run_command(command, "mongodump").await
    }

    async fn load(&self, path: &Path) -> Result<()> {
        let config = tool_config(&self.config.url)?;
        let mut command = Command::new("mongorestore");
        command
            .args(archive_args(config.path(), path))
            .args(["--gzip", "--drop"]);
        run_command(command, "mongorestore").await
    }
}

/// YAML options file for the mongo tools; the URI carries credentials, so it
/// stays off the command line. Removed when the handle drops.
fn tool_config(url: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("mockcraft-mongo-")
        .suffix(".yaml")
        .tempfile()?;
    // A JSON string is a valid double-quoted YAML scalar.
    writeln!(file, "uri: {}", serde_json::to_string(url)?)?;
    file.flush()?;
    Ok(file)
}

fn archive_args(config: &Path, archive: &Path) -> Vec<String> {
    vec![
        format!("--config={}", config.display()),
        format!("--archive={}", archive.display()),
    ]
}

/// Convert a generated row into a document, following column declarations
/// so object-id columns become native `ObjectId`s.
pub fn row_to_document(table: &Table, row: &Row) -> Result<Document> {
    let mut document = Document::new();
    for (name, value) in row {
        let column = table.column(name);
        document.insert(name.as_str(), value_to_bson(value, column)?);
    }
    Ok(document)
}

pub fn value_to_bson(value: &Value, column: Option<&Column>) -> Result<Bson> {
    Ok(match value {
        Value::Null => Bson::Null,
        Value::Bool(value) => Bson::Boolean(*value),
        Value::Int(value) => Bson::Int64(*value),
        Value::Float(value) => Bson::Double(*value),
        Value::Text(text) if column.is_some_and(is_object_id_column) => {
            let id = ObjectId::parse_str(text)
                .map_err(|err| BackendError::Bson(format!("invalid ObjectId `{text}`: {err}")))?;
            Bson::ObjectId(id)
        }
        Value::Text(text) => Bson::String(text.clone()),
        Value::Timestamp(value) => Bson::DateTime(bson::DateTime::from_chrono(*value)),
        Value::Map(map) if map.keys().any(|key| key.starts_with('$')) => {
            Bson::try_from(value.to_json()).map_err(|err| BackendError::Bson(err.to_string()))?
        }
        Value::Map(map) => {
            let mut document = Document::new();
            for (key, nested) in map {
                let nested_column = column.and_then(|column| {
                    column.nested_fields.iter().find(|field| &field.name == key)
                });
                document.insert(key.as_str(), value_to_bson(nested, nested_column)?);
            }
            Bson::Document(document)
        }
        Value::List(items) => Bson::Array(
            items
                .iter()
                .map(|item| value_to_bson(item, None))
                .collect::<Result<Vec<_>>>()?,
        ),
    })
}

fn is_object_id_column(column: &Column) -> bool {
    column.generator == OBJECT_ID_GENERATOR
        || matches!(
            column.column_type.to_ascii_lowercase().as_str(),
            "objectid" | "object_id" | "mongo_object_id"
        )
}

pub fn bson_to_value(value: Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(value) => Value::Bool(value),
        Bson::Int32(value) => Value::Int(i64::from(value)),
        Bson::Int64(value) => Value::Int(value),
        Bson::Double(value) => Value::Float(value),
        Bson::String(value) => Value::Text(value),
        Bson::ObjectId(id) => Value::Text(id.to_hex()),
        Bson::DateTime(value) => Value::Timestamp(value.to_chrono()),
        Bson::Array(items) => Value::List(items.into_iter().map(bson_to_value).collect()),
        Bson::Document(document) => Value::Map(
            document
                .into_iter()
                .map(|(key, value)| (key, bson_to_value(value)))
                .collect(),
        ),
        other => Value::from(other.into_relaxed_extjson()),
    }
}

#[async_trait]
impl Backend for MongoBackend {
    fn driver_name(&self) -> &'static str {
        "mongodb"
    }

    async fn connect(&mut self, ctx: &Context) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }
        let client = ctx.run(self.open_client()).await?;
        info!(driver = "mongodb", dsn = %self.config.redacted(), database = self.database_name(), "connected");
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
        }
        Ok(())
    }

    async fn create_table(
        &self,
        ctx: &Context,
        table: &Table,
        _foreign_keys: &[Relationship],
        _checks: &[String],
    ) -> Result<()> {
        ctx.run(self.create_collection(table)).await
    }

    async fn create_index(&self, ctx: &Context, table: &Table, index: &Index) -> Result<()> {
        ctx.run(self.create_named_index(table, index)).await
    }

    async fn drop_table(&self, ctx: &Context, name: &str) -> Result<()> {
        ctx.run(self.drop_collection(name)).await
    }

    async fn insert_batch(&self, ctx: &Context, table: &Table, rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        ctx.run(self.insert_documents(table, rows)).await
    }

    async fn foreign_key_values(
        &self,
        ctx: &Context,
        table: &str,
        column: &str,
    ) -> Result<Vec<Value>> {
        ctx.run(self.fetch_field(table, column)).await
    }

    async fn backup(&self, ctx: &Context, path: &Path) -> Result<()> {
        ctx.run(self.dump(path)).await
    }

    async fn restore(&self, ctx: &Context, path: &Path) -> Result<()> {
        ctx.run(self.load(path)).await
    }

    async fn begin_transaction(&self, ctx: &Context) -> Result<Box<dyn Transaction>> {
        let client = self.client()?;
        let session = ctx
            .run(async {
                let mut session = client.start_session().await?;
                session.start_transaction().await?;
                Ok::<_, BackendError>(session)
            })
            .await?;
        Ok(Box::new(MongoTransaction { session }))
    }
}

struct MongoTransaction {
    session: ClientSession,
}

#[async_trait]
impl Transaction for MongoTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        Ok(self.session.commit_transaction().await?)
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        Ok(self.session.abort_transaction().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn tool_credentials_go_through_a_config_file() {
        let url = "mongodb://app:s3cret@db:27017/shop?replicaSet=rs0";
        let config = tool_config(url).expect("config file");
        let written = std::fs::read_to_string(config.path()).expect("read config");
        assert_eq!(written.trim(), format!("uri: \"{url}\""));

        let args = archive_args(config.path(), Path::new("/tmp/shop.archive"));
        assert!(args.iter().all(|arg| !arg.contains("s3cret")));
        assert!(args[0].starts_with("--config="));
    }

    #[test]
    fn object_id_columns_become_native_ids() {
        let column = Column::new("_id", "string").with_generator("mongo_object_id");
        let bson = value_to_bson(&Value::from("65a1b2c3d4e5f60718293a4b"), Some(&column))
            .expect("bson");
        assert!(matches!(bson, Bson::ObjectId(_)));
        assert_eq!(bson_to_value(bson), Value::from("65a1b2c3d4e5f60718293a4b"));
    }

    #[test]
    fn extended_json_maps_are_decoded() {
        let mut inner = BTreeMap::new();
        inner.insert("t".to_string(), Value::Int(1_700_000_000));
        inner.insert("i".to_string(), Value::Int(3));
        let mut outer = BTreeMap::new();
        outer.insert("$timestamp".to_string(), Value::Map(inner));
        let bson = value_to_bson(&Value::Map(outer), None).expect("bson");
        assert!(matches!(bson, Bson::Timestamp(_)));
    }

    #[test]
    fn plain_maps_nest_as_documents() {
        let mut map = BTreeMap::new();
        map.insert("city".to_string(), Value::from("Lisbon"));
        let bson = value_to_bson(&Value::Map(map), None).expect("bson");
        assert_eq!(bson, Bson::Document(doc! { "city": "Lisbon" }));
    }
}
