use chrono::{DateTime, Duration, Months, NaiveTime, Utc};
use fake::Fake;
use fake::faker::lorem::en::Word;
use rand::{Rng, RngCore};
use uuid::{Builder, Uuid, Version};

use mockcraft_core::Value;

use crate::errors::GeneratorError;
use crate::generators::{BASE, Generator, GeneratorContext, GeneratorRegistry, round_to};
use crate::params::{ParamKind, ParamMap, ParamSpec, bounded_size};

const DEFAULT_INT_MIN: i64 = 0;
const DEFAULT_INT_MAX: i64 = 1000;
const DEFAULT_FLOAT_MIN: f64 = 0.0;
const DEFAULT_FLOAT_MAX: f64 = 100.0;
const DEFAULT_PRECISION: i64 = 2;
const MAX_PRECISION: i64 = 15;
const DEFAULT_TEXT_MIN: i64 = 20;
const DEFAULT_TEXT_MAX: i64 = 200;
/// Temporal defaults cover the calendar year before the engine's reference
/// instant. That instant is the start of the current UTC day unless set, so
/// runs on the same day with the same seed stay byte-identical.
const DEFAULT_WINDOW_MONTHS: u32 = 12;
const ALPHANUMERIC: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const UUID_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("version", ParamKind::Int, false),
    ParamSpec::new("namespace", ParamKind::String, false),
    ParamSpec::new("name", ParamKind::String, false),
];
const INT_RANGE_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min", ParamKind::Int, false),
    ParamSpec::new("max", ParamKind::Int, false),
];
const FLOAT_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min", ParamKind::Float, false),
    ParamSpec::new("max", ParamKind::Float, false),
    ParamSpec::new("precision", ParamKind::Int, false),
];
const BOOL_PARAMS: &[ParamSpec] = &[ParamSpec::new("probability", ParamKind::Float, false)];
const ENUM_PARAMS: &[ParamSpec] = &[ParamSpec::new("values", ParamKind::List, false)];
const CHAR_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("length", ParamKind::Int, false),
    ParamSpec::new("charset", ParamKind::String, false),
];
const SENTENCE_PARAMS: &[ParamSpec] = &[ParamSpec::new("word_count", ParamKind::Int, false)];
const PARAGRAPH_PARAMS: &[ParamSpec] =
    &[ParamSpec::new("sentence_count", ParamKind::Int, false)];
const TIMESTAMP_WINDOW_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("start", ParamKind::Timestamp, false),
    ParamSpec::new("end", ParamKind::Timestamp, false),
];
const TIME_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("start", ParamKind::Time, false),
    ParamSpec::new("end", ParamKind::Time, false),
];
const CONSTANT_PARAMS: &[ParamSpec] = &[ParamSpec::new("value", ParamKind::Any, true)];

pub fn register(registry: &mut GeneratorRegistry) {
    registry.register(BASE, Box::new(UuidGenerator));
    registry.register(BASE, Box::new(NumberGenerator));
    registry.register(BASE, Box::new(FloatGenerator { name: "float" }));
    registry.register(BASE, Box::new(FloatGenerator { name: "decimal" }));
    registry.register(BASE, Box::new(BooleanGenerator));
    registry.register(BASE, Box::new(EnumGenerator));
    registry.register(BASE, Box::new(CharGenerator));
    registry.register(BASE, Box::new(WordGenerator));
    registry.register(BASE, Box::new(SentenceGenerator));
    registry.register(BASE, Box::new(ParagraphGenerator));
    registry.register(BASE, Box::new(TextGenerator));
    registry.register(BASE, Box::new(DateGenerator));
    registry.register(BASE, Box::new(DateTimeGenerator { name: "datetime" }));
    registry.register(BASE, Box::new(DateTimeGenerator { name: "timestamp" }));
    registry.register(BASE, Box::new(TimeGenerator));
    registry.register(BASE, Box::new(NullGenerator));
    registry.register(BASE, Box::new(ConstantGenerator));
    registry.register(BASE, Box::new(ObjectGenerator));
}

struct UuidGenerator;

impl Generator for UuidGenerator {
    fn name(&self) -> &'static str {
        "uuid"
    }

    fn description(&self) -> &'static str {
        "RFC 4122 UUID; version 1, 3, 4 (default) or 5"
    }

    fn params(&self) -> &'static [ParamSpec] {
        UUID_PARAMS
    }

    fn generate(
        &self,
        _ctx: &mut GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        let uuid = match params.get_i64("version").unwrap_or(4) {
            1 => Builder::from_random_bytes(bytes)
                .with_version(Version::Mac)
                .into_uuid(),
            4 => Builder::from_random_bytes(bytes).into_uuid(),
            version @ (3 | 5) => {
                let namespace = namespace(params.get_str("namespace").unwrap_or("dns"))?;
                let name = match params.get_str("name") {
                    Some(name) => name.to_string(),
                    None => hex::encode(bytes),
                };
                if version == 3 {
                    Uuid::new_v3(&namespace, name.as_bytes())
                } else {
                    Uuid::new_v5(&namespace, name.as_bytes())
                }
            }
            other => {
                return Err(GeneratorError::range(format!(
                    "uuid version must be one of 1, 3, 4, 5 (got {other})"
                )));
            }
        };
        Ok(Value::Text(uuid.to_string()))
    }
}

fn namespace(value: &str) -> Result<Uuid, GeneratorError> {
    match value.to_ascii_lowercase().as_str() {
        "dns" => Ok(Uuid::NAMESPACE_DNS),
        "url" => Ok(Uuid::NAMESPACE_URL),
        "oid" => Ok(Uuid::NAMESPACE_OID),
        "x500" => Ok(Uuid::NAMESPACE_X500),
        other => Uuid::parse_str(other).map_err(|_| GeneratorError::InvalidParamType {
            param: "namespace".to_string(),
            expected: "dns, url, oid, x500 or a UUID",
        }),
    }
}

struct NumberGenerator;

impl Generator for NumberGenerator {
    fn name(&self) -> &'static str {
        "number"
    }

    fn description(&self) -> &'static str {
        "Integer in the inclusive range [min, max]"
    }

    fn params(&self) -> &'static [ParamSpec] {
        INT_RANGE_PARAMS
    }

    fn generate(
        &self,
        _ctx: &mut GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        let (min, max) = params.int_range("min", "max", DEFAULT_INT_MIN, DEFAULT_INT_MAX)?;
        Ok(Value::Int(rng.random_range(min..=max)))
    }
}

struct FloatGenerator {
    name: &'static str,
}

impl Generator for FloatGenerator {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        "Number in [min, max] rounded half away from zero to `precision` places"
    }

    fn params(&self) -> &'static [ParamSpec] {
        FLOAT_PARAMS
    }

    fn generate(
        &self,
        _ctx: &mut GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        let (min, max) = params.float_range(DEFAULT_FLOAT_MIN, DEFAULT_FLOAT_MAX)?;
        let precision = precision(params)?;
        Ok(Value::Float(bounded_float(rng, min, max, precision)))
    }
}

pub(crate) fn precision(params: &ParamMap<'_>) -> Result<u32, GeneratorError> {
    let precision = params.get_i64("precision").unwrap_or(DEFAULT_PRECISION);
    if !(0..=MAX_PRECISION).contains(&precision) {
        return Err(GeneratorError::range(format!(
            "precision must be between 0 and {MAX_PRECISION} (got {precision})"
        )));
    }
    Ok(precision as u32)
}

/// Uniform float in `[min, max]`, rounded, then clamped back into range.
///
/// Bounds whose span overflows `f64` are interpolated instead of sampled directly.
pub(crate) fn bounded_float(rng: &mut dyn RngCore, min: f64, max: f64, precision: u32) -> f64 {
    let raw = if min == max {
        min
    } else if (max - min).is_finite() {
        rng.random_range(min..=max)
    } else {
        let t: f64 = rng.random();
        min * (1.0 - t) + max * t
    };
    round_to(raw, precision).clamp(min, max)
}

struct BooleanGenerator;

impl Generator for BooleanGenerator {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn params(&self) -> &'static [ParamSpec] {
        BOOL_PARAMS
    }

    fn generate(
        &self,
        _ctx: &mut GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        let probability = params.get_f64("probability").unwrap_or(0.5);
        if !(0.0..=1.0).contains(&probability) {
            return Err(GeneratorError::range(format!(
                "probability must be within [0, 1] (got {probability})"
            )));
        }
        Ok(Value::Bool(rng.random_bool(probability)))
    }
}

struct EnumGenerator;

impl Generator for EnumGenerator {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn description(&self) -> &'static str {
        "Uniform pick from `values`"
    }

    fn params(&self) -> &'static [ParamSpec] {
        ENUM_PARAMS
    }

    fn generate(
        &self,
        _ctx: &mut GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        let values = params
            .get_list("values")
            .filter(|values| !values.is_empty())
            .ok_or(GeneratorError::EmptyEnum)?;
        let choice = &values[rng.random_range(0..values.len())];
        Ok(Value::from(choice.clone()))
    }
}

struct CharGenerator;

impl Generator for CharGenerator {
    fn name(&self) -> &'static str {
        "char"
    }

    fn params(&self) -> &'static [ParamSpec] {
        CHAR_PARAMS
    }

    fn generate(
        &self,
        _ctx: &mut GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        let length = bounded_size("length", params.get_i64("length").unwrap_or(1), 1)?;
        let charset: Vec<char> = params
            .get_str("charset")
            .unwrap_or(ALPHANUMERIC)
            .chars()
            .collect();
        if charset.is_empty() {
            return Err(GeneratorError::range("charset must not be empty"));
        }
        let value = (0..length)
            .map(|_| charset[rng.random_range(0..charset.len())])
            .collect();
        Ok(Value::Text(value))
    }
}

pub(crate) fn word(rng: &mut dyn RngCore) -> String {
    Word().fake_with_rng(rng)
}

fn sentence(rng: &mut dyn RngCore, words: usize) -> String {
    let mut out = String::new();
    for idx in 0..words {
        let word = word(rng);
        if idx == 0 {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        } else {
            out.push(' ');
            out.push_str(&word);
        }
    }
    out.push('.');
    out
}

struct WordGenerator;

impl Generator for WordGenerator {
    fn name(&self) -> &'static str {
        "word"
    }

    fn description(&self) -> &'static str {
        "Single lorem word"
    }

    fn generate(
        &self,
        _ctx: &mut GeneratorContext<'_>,
        _params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        Ok(Value::Text(word(rng)))
    }
}

struct SentenceGenerator;

impl Generator for SentenceGenerator {
    fn name(&self) -> &'static str {
        "sentence"
    }

    fn params(&self) -> &'static [ParamSpec] {
        SENTENCE_PARAMS
    }

    fn generate(
        &self,
        _ctx: &mut GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        let words = match params.get_i64("word_count") {
            Some(count) => bounded_size("word_count", count, 1)?,
            None => rng.random_range(4..=12),
        };
        Ok(Value::Text(sentence(rng, words)))
    }
}

struct ParagraphGenerator;

impl Generator for ParagraphGenerator {
    fn name(&self) -> &'static str {
        "paragraph"
    }

    fn params(&self) -> &'static [ParamSpec] {
        PARAGRAPH_PARAMS
    }

    fn generate(
        &self,
        _ctx: &mut GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        let sentences = match params.get_i64("sentence_count") {
            Some(count) => bounded_size("sentence_count", count, 1)?,
            None => rng.random_range(3..=6),
        };
        let paragraph: Vec<String> = (0..sentences)
            .map(|_| {
                let words = rng.random_range(4..=12);
                sentence(rng, words)
            })
            .collect();
        Ok(Value::Text(paragraph.join(" ")))
    }
}

struct TextGenerator;

impl Generator for TextGenerator {
    fn name(&self) -> &'static str {
        "text"
    }

    fn description(&self) -> &'static str {
        "Lorem text between `min` and `max` characters"
    }

    fn params(&self) -> &'static [ParamSpec] {
        INT_RANGE_PARAMS
    }

    fn generate(
        &self,
        _ctx: &mut GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        let (min, max) = params.int_range("min", "max", DEFAULT_TEXT_MIN, DEFAULT_TEXT_MAX)?;
        bounded_size("min", min, 0)?;
        bounded_size("max", max, 0)?;
        let target = rng.random_range(min..=max) as usize;
        let mut text = String::with_capacity(target + 16);
        let mut len = 0;
        while len < target {
            if !text.is_empty() {
                text.push(' ');
                len += 1;
            }
            let next = word(rng);
            len += next.chars().count();
            text.push_str(&next);
        }
        let mut text: String = text.chars().take(target).collect();
        if text.ends_with(' ') {
            text.pop();
            text.push('.');
        }
        Ok(Value::Text(text))
    }
}

/// `[start, end]` window, defaulting to the year before the reference instant.
pub(crate) fn window(
    ctx: &GeneratorContext<'_>,
    params: &ParamMap<'_>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), GeneratorError> {
    let end = params.get_timestamp("end").unwrap_or(ctx.reference_time);
    let start = params
        .get_timestamp("start")
        .unwrap_or_else(|| default_window_start(ctx.reference_time));
    if start > end {
        return Err(GeneratorError::range(format!(
            "start must be <= end (got {start} > {end})"
        )));
    }
    Ok((start, end))
}

fn default_window_start(reference: DateTime<Utc>) -> DateTime<Utc> {
    reference
        .checked_sub_months(Months::new(DEFAULT_WINDOW_MONTHS))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub(crate) fn instant_between(
    rng: &mut dyn RngCore,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> DateTime<Utc> {
    let span = (end - start).num_seconds();
    start + Duration::seconds(rng.random_range(0..=span))
}

struct DateGenerator;

impl Generator for DateGenerator {
    fn name(&self) -> &'static str {
        "date"
    }

    fn description(&self) -> &'static str {
        "Calendar date (YYYY-MM-DD) in [start, end]"
    }

    fn params(&self) -> &'static [ParamSpec] {
        TIMESTAMP_WINDOW_PARAMS
    }

    fn generate(
        &self,
        ctx: &mut GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        let (start, end) = window(ctx, params)?;
        let instant = instant_between(rng, start, end);
        Ok(Value::Text(instant.format("%Y-%m-%d").to_string()))
    }
}

struct DateTimeGenerator {
    name: &'static str,
}

impl Generator for DateTimeGenerator {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        "UTC instant in [start, end]"
    }

    fn params(&self) -> &'static [ParamSpec] {
        TIMESTAMP_WINDOW_PARAMS
    }

    fn generate(
        &self,
        ctx: &mut GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        let (start, end) = window(ctx, params)?;
        Ok(Value::Timestamp(instant_between(rng, start, end)))
    }
}

struct TimeGenerator;

impl Generator for TimeGenerator {
    fn name(&self) -> &'static str {
        "time"
    }

    fn params(&self) -> &'static [ParamSpec] {
        TIME_PARAMS
    }

    fn generate(
        &self,
        _ctx: &mut GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        let start = params.get_time("start").unwrap_or(NaiveTime::MIN);
        let end = params
            .get_time("end")
            .or_else(|| NaiveTime::from_hms_opt(23, 59, 59))
            .unwrap_or(NaiveTime::MIN);
        if start > end {
            return Err(GeneratorError::range(format!(
                "start must be <= end (got {start} > {end})"
            )));
        }
        let span = (end - start).num_seconds();
        let time = start + Duration::seconds(rng.random_range(0..=span));
        Ok(Value::Text(time.format("%H:%M:%S").to_string()))
    }
}

struct NullGenerator;

impl Generator for NullGenerator {
    fn name(&self) -> &'static str {
        "null"
    }

    fn generate(
        &self,
        _ctx: &mut GeneratorContext<'_>,
        _params: &ParamMap<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        Ok(Value::Null)
    }
}

struct ConstantGenerator;

impl Generator for ConstantGenerator {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn description(&self) -> &'static str {
        "Always returns `value`"
    }

    fn params(&self) -> &'static [ParamSpec] {
        CONSTANT_PARAMS
    }

    fn generate(
        &self,
        _ctx: &mut GeneratorContext<'_>,
        params: &ParamMap<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        Ok(params
            .raw("value")
            .cloned()
            .map(Value::from)
            .unwrap_or(Value::Null))
    }
}

struct ObjectGenerator;

impl Generator for ObjectGenerator {
    fn name(&self) -> &'static str {
        "object"
    }

    fn description(&self) -> &'static str {
        "Embedded document built from `nested_fields`"
    }

    fn generate(
        &self,
        ctx: &mut GeneratorContext<'_>,
        _params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GeneratorError> {
        Ok(Value::Map(ctx.generate_nested(rng)?))
    }
}
