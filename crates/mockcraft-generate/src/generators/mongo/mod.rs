//! Document-store flavored generators.
//!
//! Composite BSON types are emitted in MongoDB extended JSON (`$binary`,
//! `$timestamp`, ...) so the document backend can convert them losslessly.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::{Rng, RngCore};

use mockcraft_core::Value;

use crate::errors::GeneratorError;
use crate::generators::primitives::{bounded_float, precision, word};
use crate::generators::{BASE, GeneratorContext, GeneratorRegistry, register_fns};
use crate::params::{ParamKind, ParamMap, ParamSpec};

const DECIMAL_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min", ParamKind::Float, false),
    ParamSpec::new("max", ParamKind::Float, false),
    ParamSpec::new("precision", ParamKind::Int, false),
];
const BINARY_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("subtype", ParamKind::String, false),
    ParamSpec::new("size", ParamKind::Int, false),
];

pub fn register(registry: &mut GeneratorRegistry) {
    register_fns(
        registry,
        BASE,
        &[
            (
                "mongo_object_id",
                "24 hex character ObjectId stamped with the reference time",
                &[],
                object_id,
            ),
            ("mongo_decimal128", "Decimal128 string", DECIMAL_PARAMS, decimal128),
            (
                "mongo_binary",
                "Binary payload; subtype is generic, uuid, md5 or user_defined",
                BINARY_PARAMS,
                binary,
            ),
            ("mongo_timestamp", "BSON timestamp", &[], timestamp),
            ("mongo_regex", "BSON regular expression", &[], regex),
            ("mongo_min_key", "BSON MinKey", &[], min_key),
            ("mongo_max_key", "BSON MaxKey", &[], max_key),
        ],
    );
}

fn object_id(
    ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let mut bytes = [0u8; 12];
    let seconds = u32::try_from(ctx.reference_time.timestamp().max(0)).unwrap_or(u32::MAX);
    bytes[..4].copy_from_slice(&seconds.to_be_bytes());
    rng.fill_bytes(&mut bytes[4..]);
    Ok(Value::Text(hex::encode(bytes)))
}

fn decimal128(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let (min, max) = params.float_range(0.0, 10_000.0)?;
    let precision = precision(params)?;
    let value = bounded_float(rng, min, max, precision);
    Ok(Value::Text(format!("{value:.prec$}", prec = precision as usize)))
}

fn binary(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let (subtype, fixed_size) = match params.get_str("subtype").unwrap_or("generic") {
        "generic" => ("00", None),
        "uuid" => ("04", Some(16)),
        "md5" => ("05", Some(16)),
        "user_defined" => ("80", None),
        _ => {
            return Err(GeneratorError::InvalidParamType {
                param: "subtype".to_string(),
                expected: "generic, uuid, md5 or user_defined",
            });
        }
    };
    let size = match (fixed_size, params.get_i64("size")) {
        (Some(size), _) => size,
        (None, Some(size)) if !(1..=1024 * 1024).contains(&size) => {
            return Err(GeneratorError::range(format!(
                "size must be between 1 and 1048576 (got {size})"
            )));
        }
        (None, Some(size)) => size as usize,
        (None, None) => 16,
    };
    let mut payload = vec![0u8; size];
    rng.fill_bytes(&mut payload);

    let mut inner = BTreeMap::new();
    inner.insert("base64".to_string(), Value::Text(STANDARD.encode(&payload)));
    inner.insert("subType".to_string(), Value::from(subtype));
    Ok(extended("$binary", Value::Map(inner)))
}

fn timestamp(
    ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let seconds = ctx.reference_time.timestamp().max(0) - rng.random_range(0..=365 * 86_400);
    let mut inner = BTreeMap::new();
    inner.insert("t".to_string(), Value::Int(seconds.max(0)));
    inner.insert("i".to_string(), Value::Int(rng.random_range(1..=1000)));
    Ok(extended("$timestamp", Value::Map(inner)))
}

fn regex(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let options = ["", "i", "m", "im"][rng.random_range(0..4)];
    let mut inner = BTreeMap::new();
    inner.insert(
        "pattern".to_string(),
        Value::Text(format!("^{}.*", word(rng))),
    );
    inner.insert("options".to_string(), Value::from(options));
    Ok(extended("$regularExpression", Value::Map(inner)))
}

fn min_key(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    _rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    Ok(extended("$minKey", Value::Int(1)))
}

fn max_key(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    _rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    Ok(extended("$maxKey", Value::Int(1)))
}

fn extended(key: &str, value: Value) -> Value {
    let mut map = BTreeMap::new();
    map.insert(key.to_string(), value);
    Value::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::GeneratorRegistry;
    use chrono::{TimeZone, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn object_id_leads_with_reference_seconds() {
        let registry = GeneratorRegistry::with_builtins();
        let mut sequences = BTreeMap::new();
        let reference = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("time");
        let mut ctx = GeneratorContext {
            industry: BASE,
            column_key: "_id",
            reference_time: reference,
            sequences: &mut sequences,
            nested_fields: &[],
            registry: &registry,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let value = registry
            .generate(&mut ctx, "mongo_object_id", &Default::default(), &mut rng)
            .expect("object id");
        let text = value.as_str().expect("text");
        assert_eq!(text.len(), 24);
        assert_eq!(&text[..8], format!("{:08x}", reference.timestamp()));
    }
}
