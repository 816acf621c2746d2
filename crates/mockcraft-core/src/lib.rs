//! Core contracts for MockCraft.
//!
//! This crate defines the declarative schema model, the value type shared by
//! generators and backends, structural validation, and dependency planning.

pub mod constraints;
pub mod error;
pub mod graph;
pub mod schema;
pub mod types;
pub mod validation;

pub use constraints::{Cardinality, Constraint, ConstraintType, Index, Relationship};
pub use error::{Error, Result};
pub use graph::{DependencyPlan, plan_order, plan_order_with_deferral};
pub use schema::{Collection, Column, DEFAULT_INDUSTRY, Params, Schema, Table};
pub use types::{LogicalType, Row, Value, format_timestamp};
pub use validation::{RelationshipIssue, relationship_issues, validate_structure};
