use thiserror::Error;

/// Errors emitted by generators and the generator engine.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("unknown generator '{name}' in industry '{industry}'")]
    UnknownGenerator { industry: String, name: String },
    #[error("invalid value for param '{param}': expected {expected}")]
    InvalidParamType {
        param: String,
        expected: &'static str,
    },
    #[error("range violation: {0}")]
    RangeViolation(String),
    #[error("enum generator requires a non-empty 'values' list")]
    EmptyEnum,
    #[error("column '{column}' ({industry}.{generator}): {source}")]
    Column {
        column: String,
        industry: String,
        generator: String,
        #[source]
        source: Box<GeneratorError>,
    },
}

/// Stable tag for a [`GeneratorError`], independent of column context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorErrorKind {
    UnknownGenerator,
    InvalidParamType,
    RangeViolation,
    EmptyEnum,
}

impl GeneratorError {
    pub fn kind(&self) -> GeneratorErrorKind {
        match self {
            Self::UnknownGenerator { .. } => GeneratorErrorKind::UnknownGenerator,
            Self::InvalidParamType { .. } => GeneratorErrorKind::InvalidParamType,
            Self::RangeViolation(_) => GeneratorErrorKind::RangeViolation,
            Self::EmptyEnum => GeneratorErrorKind::EmptyEnum,
            Self::Column { source, .. } => source.kind(),
        }
    }

    pub(crate) fn range(message: impl Into<String>) -> Self {
        Self::RangeViolation(message.into())
    }

    /// Attach column context; an error that already carries it is returned as is.
    pub fn with_column(self, column: &str, industry: &str, generator: &str) -> Self {
        match self {
            Self::Column { .. } => self,
            other => Self::Column {
                column: column.to_string(),
                industry: industry.to_string(),
                generator: generator.to_string(),
                source: Box::new(other),
            },
        }
    }
}
