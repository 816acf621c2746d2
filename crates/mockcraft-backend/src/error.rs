use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("bson conversion error: {0}")]
    Bson(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid connection string: {0}")]
    InvalidDsn(String),
    #[error("unsupported connection scheme `{0}`")]
    UnsupportedScheme(String),
    #[error("backend is not connected")]
    NotConnected,
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("unknown table `{0}`")]
    UnknownTable(String),
    #[error("unknown column `{table}.{column}`")]
    UnknownColumn { table: String, column: String },
    #[error("duplicate primary key {key} in `{table}`")]
    DuplicateKey { table: String, key: String },
    #[error("foreign key violation on {relationship}: no parent for {value}")]
    ForeignKeyViolation { relationship: String, value: String },
    #[error("table `{0}` has no primary key column")]
    NoPrimaryKey(String),
    #[error("`{program}` exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("{0}")]
    Unsupported(String),
}

impl BackendError {
    /// True for the two context-driven aborts.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
