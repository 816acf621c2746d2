use thiserror::Error;

/// Core error type shared across MockCraft crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema document could not be parsed.
    #[error("schema parse error: {0}")]
    Parse(String),
    /// The schema violates structural invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// Foreign-key dependencies form a cycle the planner cannot order.
    #[error("cyclic schema: tables {} form a dependency cycle", .0.join(", "))]
    CyclicSchema(Vec<String>),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for results returned by MockCraft crates.
pub type Result<T> = std::result::Result<T, Error>;
