use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{SeedError, SeedResult};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Options for one seeding run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SeedOptions {
    /// Root PRNG seed.
    pub seed: u64,
    /// Rows per backend insert call.
    pub batch_size: usize,
    /// Drop every schema table before creating it.
    pub drop_before_create: bool,
    /// Back up the target before seeding. Failure only logs a warning.
    pub backup_path: Option<PathBuf>,
    /// Check every relationship after inserting.
    pub verify: bool,
    /// Anchor for temporal generators; start of the current UTC day when unset.
    pub reference_time: Option<DateTime<Utc>>,
    pub validation: ValidationOptions,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            drop_before_create: true,
            backup_path: None,
            verify: true,
            reference_time: None,
            validation: ValidationOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidationOptions {
    /// When relationships are declared, at least this many must be valid.
    pub min_valid_relationships: Option<usize>,
}

impl SeedOptions {
    pub fn from_toml_str(input: &str) -> SeedResult<Self> {
        toml::from_str(input).map_err(|err| SeedError::Config(err.to_string()))
    }

    pub fn from_path(path: &Path) -> SeedResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| SeedError::Config(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let options = SeedOptions::from_toml_str(
            r#"
seed = 42
batch_size = 250

[validation]
min_valid_relationships = 3
"#,
        )
        .expect("options");
        assert_eq!(options.seed, 42);
        assert_eq!(options.batch_size, 250);
        assert!(options.drop_before_create);
        assert!(options.verify);
        assert_eq!(options.validation.min_valid_relationships, Some(3));
    }

    #[test]
    fn zero_batch_size_inserts_one_row_at_a_time() {
        let options = SeedOptions {
            batch_size: 0,
            ..SeedOptions::default()
        };
        assert_eq!(options.effective_batch_size(), 1);
        assert!(SeedOptions::from_toml_str("seed = \"x\"").is_err());
    }
}
