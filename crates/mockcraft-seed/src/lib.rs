//! Schema-driven seeding for MockCraft.
//!
//! A [`Seeder`] validates a schema, orders its tables by foreign-key
//! dependencies, generates rows with balanced parent references and writes
//! them through a [`mockcraft_backend::Backend`].

pub mod distribution;
pub mod errors;
pub mod model;
pub mod options;
pub mod registry;
pub mod seeder;
pub mod validate;
pub mod verify;

pub use distribution::MIN_PER_PARENT;
pub use errors::{ErrorKind, SeedError, SeedResult};
pub use model::{SeedIssue, SeedReport, TableReport};
pub use options::{DEFAULT_BATCH_SIZE, SeedOptions, ValidationOptions};
pub use registry::PrimaryKeyRegistry;
pub use seeder::{Seeder, new_run_id};
pub use validate::{ValidationSummary, validate_and_enhance};
pub use verify::verify_relationships;
