use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::{Rng, RngCore};
use serde::Serialize;

use mockcraft_core::{Column, Params, Value};

use crate::errors::GeneratorError;
use crate::params::{ParamMap, ParamSpec, truncate_chars, validate_params};

pub mod domain;
pub mod mongo;
pub mod primitives;
pub mod semantic;
pub mod sql;

pub const BASE: &str = "base";

/// A registered value producer.
pub trait Generator: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str {
        ""
    }

    /// Params this generator reads; checked before `generate` is called.
    fn params(&self) -> &'static [ParamSpec] {
        &[]
    }

    fn generate(
        &self,
        ctx: &mut GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError>;
}

/// Per-call state shared with a generator.
pub struct GeneratorContext<'a> {
    pub industry: &'a str,
    /// Sequence key for counters such as `serial`.
    pub column_key: &'a str,
    pub reference_time: DateTime<Utc>,
    pub sequences: &'a mut BTreeMap<String, i64>,
    pub nested_fields: &'a [Column],
    pub registry: &'a GeneratorRegistry,
}

impl GeneratorContext<'_> {
    /// Return the next value of this column's sequence, starting at `start`.
    pub fn next_sequence(&mut self, start: i64) -> i64 {
        let entry = self
            .sequences
            .entry(self.column_key.to_string())
            .or_insert(start.saturating_sub(1));
        *entry = entry.saturating_add(1);
        *entry
    }

    /// Generate every nested field spec in order into a map.
    pub fn generate_nested(
        &mut self,
        rng: &mut dyn RngCore,
    ) -> Result<BTreeMap<String, Value>, GeneratorError> {
        let registry = self.registry;
        let fields = self.nested_fields;
        let mut map = BTreeMap::new();
        for field in fields {
            let key = format!("{}.{}", self.column_key, field.name);
            let industry = field.industry_or_default();
            let name = if field.generator.is_empty() {
                "word"
            } else {
                field.generator.as_str()
            };
            let mut child = GeneratorContext {
                industry,
                column_key: &key,
                reference_time: self.reference_time,
                sequences: &mut *self.sequences,
                nested_fields: &field.nested_fields,
                registry,
            };
            let value = registry
                .generate(&mut child, name, &field.params, rng)
                .map_err(|err| err.with_column(&field.name, industry, name))?;
            map.insert(field.name.clone(), value);
        }
        Ok(map)
    }
}

/// Metadata about a registered generator.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratorInfo {
    pub industry: String,
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

/// `industry -> name -> generator` registry.
#[derive(Default)]
pub struct GeneratorRegistry {
    industries: BTreeMap<&'static str, BTreeMap<&'static str, Box<dyn Generator>>>,
}

impl GeneratorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in industry pack.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        primitives::register(&mut registry);
        semantic::register(&mut registry);
        mongo::register(&mut registry);
        sql::register(&mut registry);
        domain::register(&mut registry);
        registry
    }

    pub fn register(&mut self, industry: &'static str, generator: Box<dyn Generator>) {
        self.industries
            .entry(industry)
            .or_default()
            .insert(generator.name(), generator);
    }

    pub fn contains(&self, industry: &str, name: &str) -> bool {
        self.lookup(industry, name).is_ok()
    }

    pub fn lookup(&self, industry: &str, name: &str) -> Result<&dyn Generator, GeneratorError> {
        self.industries
            .get(industry)
            .and_then(|generators| generators.get(name))
            .map(|generator| generator.as_ref())
            .ok_or_else(|| GeneratorError::UnknownGenerator {
                industry: industry.to_string(),
                name: name.to_string(),
            })
    }

    pub fn industries(&self) -> Vec<&'static str> {
        self.industries.keys().copied().collect()
    }

    pub fn generators(&self, industry: &str) -> Vec<&'static str> {
        self.industries
            .get(industry)
            .map(|generators| generators.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn info(&self, industry: &str, name: &str) -> Result<GeneratorInfo, GeneratorError> {
        let generator = self.lookup(industry, name)?;
        Ok(GeneratorInfo {
            industry: industry.to_string(),
            name: generator.name().to_string(),
            description: generator.description().to_string(),
            params: generator.params().to_vec(),
        })
    }

    /// Validate params, invoke the generator and apply `max_length`.
    pub fn generate(
        &self,
        ctx: &mut GeneratorContext<'_>,
        name: &str,
        params: &Params,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        let generator = self.lookup(ctx.industry, name)?;
        let params = validate_params(params, generator.params())?;
        let mut value = generator.generate(ctx, &params, rng)?;
        if let (Some(max), Value::Text(text)) = (params.max_length(), &mut value) {
            truncate_chars(text, max);
        }
        Ok(value)
    }
}

/// Generator that picks uniformly from a fixed list.
pub struct ChoiceGenerator {
    pub name: &'static str,
    pub description: &'static str,
    pub values: &'static [&'static str],
}

impl Generator for ChoiceGenerator {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn generate(
        &self,
        _ctx: &mut GeneratorContext<'_>,
        _params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        Ok(Value::Text(pick(self.values, rng).to_string()))
    }
}

pub type GenerateFn = fn(
    &mut GeneratorContext<'_>,
    &ParamMap<'_>,
    &mut dyn RngCore,
) -> Result<Value, GeneratorError>;

/// Generator backed by a plain function.
pub struct FnGenerator {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    pub func: GenerateFn,
}

impl Generator for FnGenerator {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn params(&self) -> &'static [ParamSpec] {
        self.params
    }

    fn generate(
        &self,
        ctx: &mut GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        (self.func)(ctx, params, rng)
    }
}

pub(crate) fn register_choices(
    registry: &mut GeneratorRegistry,
    industry: &'static str,
    choices: &[(&'static str, &'static str, &'static [&'static str])],
) {
    for &(name, description, values) in choices {
        registry.register(
            industry,
            Box::new(ChoiceGenerator {
                name,
                description,
                values,
            }),
        );
    }
}

pub(crate) fn register_fns(
    registry: &mut GeneratorRegistry,
    industry: &'static str,
    fns: &[(&'static str, &'static str, &'static [ParamSpec], GenerateFn)],
) {
    for &(name, description, params, func) in fns {
        registry.register(
            industry,
            Box::new(FnGenerator {
                name,
                description,
                params,
                func,
            }),
        );
    }
}

/// Uniform pick; `values` must be non-empty.
pub(crate) fn pick<'a, T>(values: &'a [T], rng: &mut dyn RngCore) -> &'a T {
    &values[rng.random_range(0..values.len())]
}

pub(crate) fn digits(rng: &mut dyn RngCore, count: usize) -> String {
    (0..count)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

pub(crate) fn upper_letters(rng: &mut dyn RngCore, count: usize) -> String {
    (0..count)
        .map(|_| char::from(b'A' + rng.random_range(0..26u8)))
        .collect()
}

/// Round half away from zero to `precision` decimal places.
pub(crate) fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}
