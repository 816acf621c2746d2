use std::collections::BTreeMap;

use serde::Serialize;

use mockcraft_backend::IntegrityReport;

/// Summary of one seeded table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    pub table: String,
    pub rows_requested: u64,
    pub rows_inserted: u64,
    pub batches: u64,
    /// Inserted after every non-circular table.
    pub deferred: bool,
    /// Rows came from the table's `data` override.
    pub from_data: bool,
}

/// Structured warning raised during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedIssue {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
}

/// Report for a seeding run.
#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub run_id: String,
    pub seed: u64,
    pub driver: String,
    pub order: Vec<String>,
    pub deferred: Vec<String>,
    pub tables: Vec<TableReport>,
    /// `industry.generator` -> number of columns using it.
    pub generator_usage: BTreeMap<String, u64>,
    pub verification: Vec<IntegrityReport>,
    pub warnings: Vec<SeedIssue>,
}

impl SeedReport {
    pub fn new(run_id: String, seed: u64, driver: &str) -> Self {
        Self {
            run_id,
            seed,
            driver: driver.to_string(),
            order: Vec::new(),
            deferred: Vec::new(),
            tables: Vec::new(),
            generator_usage: BTreeMap::new(),
            verification: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|report| report.table == name)
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|report| report.rows_inserted).sum()
    }

    /// True when any verified relationship has orphans.
    pub fn verification_failed(&self) -> bool {
        self.verification.iter().any(|report| !report.is_valid())
    }

    pub fn orphan_count(&self) -> u64 {
        self.verification
            .iter()
            .map(|report| report.orphan_count as u64)
            .sum()
    }

    pub(crate) fn warn(
        &mut self,
        code: &str,
        message: impl Into<String>,
        table: Option<&str>,
        relationship: Option<String>,
    ) {
        self.warnings.push(SeedIssue {
            code: code.to_string(),
            message: message.into(),
            table: table.map(str::to_string),
            relationship,
        });
    }
}
