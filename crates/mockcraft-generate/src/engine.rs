use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};

use chrono::{DateTime, Utc};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use mockcraft_core::{Column, Params, Row, Value};

use crate::errors::GeneratorError;
use crate::generators::{GeneratorContext, GeneratorInfo, GeneratorRegistry};

/// Registry plus the seeded PRNG that drives it.
///
/// Every value drawn through one engine comes from a single ChaCha8 stream, so
/// two engines built with the same seed and reference time produce the same
/// values in the same call order.
pub struct GeneratorEngine {
    registry: Arc<GeneratorRegistry>,
    seed: u64,
    rng: ChaCha8Rng,
    reference_time: DateTime<Utc>,
    sequences: BTreeMap<String, i64>,
}

impl GeneratorEngine {
    pub fn new(seed: u64) -> Self {
        Self::with_registry(seed, Arc::new(GeneratorRegistry::with_builtins()))
    }

    pub fn with_registry(seed: u64, registry: Arc<GeneratorRegistry>) -> Self {
        Self {
            registry,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            reference_time: start_of_today(),
            sequences: BTreeMap::new(),
        }
    }

    /// Anchor temporal defaults at `reference_time` instead of today.
    pub fn with_reference_time(mut self, reference_time: DateTime<Utc>) -> Self {
        self.reference_time = reference_time;
        self
    }

    /// Process-wide engine seeded with zero.
    pub fn global() -> &'static Mutex<GeneratorEngine> {
        static GLOBAL: OnceLock<Mutex<GeneratorEngine>> = OnceLock::new();
        GLOBAL.get_or_init(|| Mutex::new(GeneratorEngine::new(0)))
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        self.reference_time
    }

    pub fn registry(&self) -> &GeneratorRegistry {
        &self.registry
    }

    /// Restart the PRNG stream and sequences from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.sequences.clear();
    }

    /// Independent PRNG derived from the root seed and `label`.
    pub fn child_rng(&self, label: &str) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(hash_seed(self.seed, label))
    }

    pub fn rng_mut(&mut self) -> &mut dyn RngCore {
        &mut self.rng
    }

    /// Succeeds iff `(industry, name)` is registered.
    pub fn validate(&self, industry: &str, name: &str) -> Result<(), GeneratorError> {
        self.registry.lookup(industry, name).map(|_| ())
    }

    pub fn generate(
        &mut self,
        industry: &str,
        name: &str,
        params: &Params,
    ) -> Result<Value, GeneratorError> {
        let mut ctx = GeneratorContext {
            industry,
            column_key: name,
            reference_time: self.reference_time,
            sequences: &mut self.sequences,
            nested_fields: &[],
            registry: &self.registry,
        };
        self.registry.generate(&mut ctx, name, params, &mut self.rng)
    }

    /// Dry run of one column: a throw-away PRNG and scratch sequences, so the
    /// engine's stream is left untouched.
    pub fn probe(&self, column: &Column) -> Result<Value, GeneratorError> {
        let mut rng = self.child_rng(&column.name);
        let mut sequences = BTreeMap::new();
        generate_column_with(
            &self.registry,
            column,
            &column.name,
            self.reference_time,
            &mut sequences,
            &mut rng,
        )
    }

    /// Generate one column value; errors carry the column context.
    pub fn generate_column(&mut self, scope: &str, column: &Column) -> Result<Value, GeneratorError> {
        let key = if scope.is_empty() {
            column.name.clone()
        } else {
            format!("{scope}.{}", column.name)
        };
        generate_column_with(
            &self.registry,
            column,
            &key,
            self.reference_time,
            &mut self.sequences,
            &mut self.rng,
        )
    }

    /// Compose a row from column specs in order; `inherited` values win.
    pub fn generate_row(&mut self, columns: &[Column], inherited: &Row) -> Result<Row, GeneratorError> {
        self.generate_row_in("", columns, inherited)
    }

    /// As [`generate_row`](Self::generate_row), with sequences keyed under `scope`
    /// (usually the table name).
    pub fn generate_row_in(
        &mut self,
        scope: &str,
        columns: &[Column],
        inherited: &Row,
    ) -> Result<Row, GeneratorError> {
        let mut row = Row::new();
        for column in columns {
            if let Some(value) = inherited.get(&column.name) {
                row.insert(column.name.clone(), value.clone());
                continue;
            }
            let value = self.generate_column(scope, column)?;
            row.insert(column.name.clone(), value);
        }
        Ok(row)
    }

    pub fn list_industries(&self) -> Vec<&'static str> {
        self.registry.industries()
    }

    pub fn list_generators(&self, industry: &str) -> Vec<&'static str> {
        self.registry.generators(industry)
    }

    pub fn info(&self, industry: &str, name: &str) -> Result<GeneratorInfo, GeneratorError> {
        self.registry.info(industry, name)
    }
}

fn generate_column_with(
    registry: &GeneratorRegistry,
    column: &Column,
    key: &str,
    reference_time: DateTime<Utc>,
    sequences: &mut BTreeMap<String, i64>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let industry = column.industry_or_default();
    let mut ctx = GeneratorContext {
        industry,
        column_key: key,
        reference_time,
        sequences,
        nested_fields: &column.nested_fields,
        registry,
    };
    registry
        .generate(&mut ctx, &column.generator, &column.params, rng)
        .map_err(|err| {
            debug!(column = %column.name, industry, generator = %column.generator, error = %err, "column generation failed");
            err.with_column(&column.name, industry, &column.generator)
        })
}

/// Day-granular so same-seed runs agree within a UTC day.
fn start_of_today() -> DateTime<Utc> {
    let now = Utc::now();
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn engine(seed: u64) -> GeneratorEngine {
        let reference = Utc
            .with_ymd_and_hms(2024, 6, 1, 0, 0, 0)
            .single()
            .expect("reference time");
        GeneratorEngine::new(seed).with_reference_time(reference)
    }

    fn columns() -> Vec<Column> {
        vec![
            Column::new("id", "uuid").with_generator("uuid"),
            Column::new("age", "integer")
                .with_generator("number")
                .with_param("min", json!(18))
                .with_param("max", json!(90)),
            Column::new("created_at", "datetime").with_generator("datetime"),
        ]
    }

    #[test]
    fn same_seed_same_rows() {
        let mut a = engine(42);
        let mut b = engine(42);
        for _ in 0..20 {
            let left = a.generate_row(&columns(), &Row::new()).expect("row");
            let right = b.generate_row(&columns(), &Row::new()).expect("row");
            assert_eq!(left, right);
        }
    }

    #[test]
    fn inherited_values_are_not_generated() {
        let mut engine = engine(1);
        let mut inherited = Row::new();
        inherited.insert("age".to_string(), Value::Int(7));
        let row = engine.generate_row(&columns(), &inherited).expect("row");
        assert_eq!(row.get("age"), Some(&Value::Int(7)));
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn probe_leaves_stream_untouched() {
        let mut probed = engine(9);
        let mut plain = engine(9);
        for column in columns() {
            probed.probe(&column).expect("probe");
        }
        let left = probed.generate_row(&columns(), &Row::new()).expect("row");
        let right = plain.generate_row(&columns(), &Row::new()).expect("row");
        assert_eq!(left, right);
    }

    #[test]
    fn errors_carry_column_context() {
        let mut engine = engine(3);
        let column = Column::new("score", "integer")
            .with_generator("number")
            .with_param("min", json!(10))
            .with_param("max", json!(1));
        match engine.generate_column("scores", &column) {
            Err(GeneratorError::Column { column, source, .. }) => {
                assert_eq!(column, "score");
                assert!(matches!(*source, GeneratorError::RangeViolation(_)));
            }
            other => panic!("expected column error, got {other:?}"),
        }
    }

    #[test]
    fn serial_sequences_are_scoped() {
        let mut engine = engine(0);
        let column = Column::new("id", "integer").with_generator("serial");
        let users: Vec<Value> = (0..3)
            .map(|_| engine.generate_column("users", &column).expect("serial"))
            .collect();
        let posts = engine.generate_column("posts", &column).expect("serial");
        assert_eq!(users, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(posts, Value::Int(1));
    }

    #[test]
    fn listings_are_sorted() {
        let engine = engine(0);
        let industries = engine.list_industries();
        assert_eq!(industries, vec!["aviation", "base", "finance", "health"]);
        let generators = engine.list_generators("health");
        let mut sorted = generators.clone();
        sorted.sort();
        assert_eq!(generators, sorted);
        assert!(engine.validate("base", "email").is_ok());
        assert!(matches!(
            engine.validate("base", "nope"),
            Err(GeneratorError::UnknownGenerator { .. })
        ));
    }
}
