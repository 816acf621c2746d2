mod logging;
mod run;

pub use logging::{LogFormat, init_logging};
pub use run::{RunConfig, RunPaths, collect_git_info, start_run, write_report};

use thiserror::Error;

/// Errors raised while writing run artifacts or installing logging.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("invalid artifact path: {0}")]
    InvalidPath(String),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
