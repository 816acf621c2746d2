use std::fmt;

use serde::Serialize;
use thiserror::Error;

use mockcraft_backend::BackendError;
use mockcraft_generate::{GeneratorError, GeneratorErrorKind};

/// Errors surfaced by a seeding run.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Schema(#[from] mockcraft_core::Error),
    #[error("{invalid} of {total} relationships are invalid: {summary}")]
    InvalidRelationships {
        invalid: usize,
        total: usize,
        summary: String,
    },
    #[error("insufficient foreign-key coverage: found {found}, minimum {minimum}")]
    FkCoverageInsufficient { found: usize, minimum: usize },
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("table `{table}`: {source}")]
    Table {
        table: String,
        #[source]
        source: Box<SeedError>,
    },
}

/// Stable tag for each failure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SchemaInvalid,
    CyclicSchema,
    FkCoverageInsufficient,
    UnknownGenerator,
    InvalidParam,
    RangeViolation,
    BackendIo,
    IntegrityViolation,
    BackupFailed,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SchemaInvalid => "schema_invalid",
            Self::CyclicSchema => "cyclic_schema",
            Self::FkCoverageInsufficient => "fk_coverage_insufficient",
            Self::UnknownGenerator => "unknown_generator",
            Self::InvalidParam => "invalid_param",
            Self::RangeViolation => "range_violation",
            Self::BackendIo => "backend_io",
            Self::IntegrityViolation => "integrity_violation",
            Self::BackupFailed => "backup_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SeedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema(mockcraft_core::Error::CyclicSchema(_)) => ErrorKind::CyclicSchema,
            Self::Schema(mockcraft_core::Error::Io(_)) => ErrorKind::BackendIo,
            Self::Schema(_) | Self::InvalidRelationships { .. } | Self::Config(_) => {
                ErrorKind::SchemaInvalid
            }
            Self::FkCoverageInsufficient { .. } => ErrorKind::FkCoverageInsufficient,
            Self::Generator(err) => match err.kind() {
                GeneratorErrorKind::UnknownGenerator => ErrorKind::UnknownGenerator,
                GeneratorErrorKind::RangeViolation => ErrorKind::RangeViolation,
                GeneratorErrorKind::InvalidParamType | GeneratorErrorKind::EmptyEnum => {
                    ErrorKind::InvalidParam
                }
            },
            Self::Backend(err) if err.is_cancellation() => ErrorKind::Cancelled,
            Self::Backend(_) => ErrorKind::BackendIo,
            Self::Table { source, .. } => source.kind(),
        }
    }

    /// Attach the table a failure happened in.
    pub fn in_table(table: &str, err: impl Into<SeedError>) -> Self {
        match err.into() {
            already @ Self::Table { .. } => already,
            other => Self::Table {
                table: table.to_string(),
                source: Box::new(other),
            },
        }
    }
}

pub type SeedResult<T> = std::result::Result<T, SeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_survive_table_context() {
        let err = SeedError::in_table("users", BackendError::Cancelled);
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(err.to_string().starts_with("table `users`"));

        let twice = SeedError::in_table("posts", err);
        assert!(twice.to_string().starts_with("table `users`"));
    }

    #[test]
    fn generator_kinds_map_to_seed_kinds() {
        let err = SeedError::from(GeneratorError::EmptyEnum);
        assert_eq!(err.kind(), ErrorKind::InvalidParam);
        let err = SeedError::from(mockcraft_core::Error::CyclicSchema(vec!["a".into()]));
        assert_eq!(err.kind().as_str(), "cyclic_schema");
    }
}
