//! Deterministic value generators for MockCraft.
//!
//! Generators are registered by `(industry, name)` in a [`GeneratorRegistry`];
//! a [`GeneratorEngine`] owns the registry and the seeded PRNG and composes
//! generated values into rows.

pub mod engine;
pub mod errors;
pub mod generators;
pub mod params;

pub use engine::GeneratorEngine;
pub use errors::{GeneratorError, GeneratorErrorKind};
pub use generators::{Generator, GeneratorContext, GeneratorInfo, GeneratorRegistry};
pub use params::{ParamKind, ParamMap, ParamSpec};
