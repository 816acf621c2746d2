use tracing::{debug, warn};

use mockcraft_backend::{Backend, Context, IntegrityReport};
use mockcraft_core::{Relationship, Value};

use crate::errors::SeedResult;

/// Check every relationship against what the backend stored.
///
/// Orphans are logged, never fatal; the reports carry them back to the caller.
pub async fn verify_relationships(
    backend: &dyn Backend,
    ctx: &Context,
    relations: &[Relationship],
) -> SeedResult<Vec<IntegrityReport>> {
    let mut reports = Vec::with_capacity(relations.len());
    for relation in relations {
        let report = backend.verify_integrity(ctx, relation).await?;
        if report.is_valid() {
            debug!(relationship = %report.relationship, checked = report.checked, "relationship verified");
        } else {
            warn!(
                relationship = %report.relationship,
                checked = report.checked,
                orphans = report.orphan_count,
                first = %offenders(&report),
                "integrity violation"
            );
        }
        reports.push(report);
    }
    Ok(reports)
}

/// Comma-separated list of the reported orphan values.
pub fn offenders(report: &IntegrityReport) -> String {
    report
        .orphans
        .iter()
        .map(Value::key_string)
        .collect::<Vec<_>>()
        .join(", ")
}
