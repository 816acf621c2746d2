//! Storage backends the seeder writes into.

pub mod adapter;
pub mod context;
pub mod dsn;
pub mod error;
pub mod memory;
pub mod mongo;
pub mod options;
pub mod sql;

pub use adapter::{Backend, IntegrityReport, MAX_REPORTED_ORPHANS, Transaction};
pub use context::Context;
pub use dsn::{ConnectionConfig, Driver, redact_dsn};
pub use error::{BackendError, Result};
pub use memory::MemoryBackend;
pub use mongo::MongoBackend;
pub use options::{PoolOptions, parse_duration};
pub use sql::{Dialect, SqlBackend};

/// Build the backend named by the DSN scheme without connecting.
pub fn backend_for(dsn: &str) -> Result<Box<dyn Backend>> {
    let config = ConnectionConfig::parse(dsn)?;
    Ok(match config.driver {
        Driver::Postgres | Driver::MySql | Driver::Sqlite => Box::new(SqlBackend::new(config)?),
        Driver::MongoDb => Box::new(MongoBackend::new(config)?),
        Driver::Memory => Box::new(match config.path {
            Some(name) => MemoryBackend::named(name),
            None => MemoryBackend::new(),
        }),
    })
}

/// Build and connect the backend named by the DSN scheme.
pub async fn connect_backend(dsn: &str, ctx: &Context) -> Result<Box<dyn Backend>> {
    let mut backend = backend_for(dsn)?;
    backend.connect(ctx).await?;
    tracing::info!(driver = backend.driver_name(), dsn = %redact_dsn(dsn), "backend ready");
    Ok(backend)
}
