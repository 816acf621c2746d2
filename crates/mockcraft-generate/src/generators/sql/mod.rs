//! Relational flavored generators.
//!
//! Geometric, range and full-text values are rendered as PostgreSQL input
//! literals.

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::Duration;
use rand::{Rng, RngCore};

use mockcraft_core::{Value, format_timestamp};

use crate::errors::GeneratorError;
use crate::generators::primitives::{bounded_float, instant_between, window, word};
use crate::generators::semantic::{ipv4_octets, ipv6_segments};
use crate::generators::{BASE, GeneratorContext, GeneratorRegistry, register_fns, round_to};
use crate::params::{ParamKind, ParamMap, ParamSpec, bounded_size};

const IP_PARAMS: &[ParamSpec] = &[ParamSpec::new("version", ParamKind::Int, false)];
const CIDR_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("version", ParamKind::Int, false),
    ParamSpec::new("prefix", ParamKind::Int, false),
];
const SIZE_PARAMS: &[ParamSpec] = &[ParamSpec::new("size", ParamKind::Int, false)];
const MONEY_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min", ParamKind::Float, false),
    ParamSpec::new("max", ParamKind::Float, false),
];
const SERIAL_PARAMS: &[ParamSpec] = &[ParamSpec::new("start", ParamKind::Int, false)];
const RANGE_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min", ParamKind::Int, false),
    ParamSpec::new("max", ParamKind::Int, false),
];
const TEMPORAL_RANGE_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("start", ParamKind::Timestamp, false),
    ParamSpec::new("end", ParamKind::Timestamp, false),
];
const ARRAY_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("element_type", ParamKind::String, false),
    ParamSpec::new("min_size", ParamKind::Int, false),
    ParamSpec::new("max_size", ParamKind::Int, false),
];
const BIT_PARAMS: &[ParamSpec] = &[ParamSpec::new("length", ParamKind::Int, false)];

pub fn register(registry: &mut GeneratorRegistry) {
    register_fns(
        registry,
        BASE,
        &[
            ("json", "Small JSON document", &[], json_document),
            ("jsonb", "Small JSON document", &[], json_document),
            ("inet", "Host address", IP_PARAMS, inet),
            ("cidr", "Network address with host bits cleared", CIDR_PARAMS, cidr),
            ("bytea", "Hex-escaped bytes", SIZE_PARAMS, bytea),
            ("money", "Amount with two decimals", MONEY_PARAMS, money),
            ("interval", "Interval literal", &[], interval),
            ("serial", "Monotonic 32-bit sequence", SERIAL_PARAMS, serial),
            ("bigserial", "Monotonic 64-bit sequence", SERIAL_PARAMS, serial),
            ("point", "Point (x,y)", &[], point),
            ("line", "Line {A,B,C}", &[], line),
            ("lseg", "Line segment", &[], lseg),
            ("box", "Box", &[], rect),
            ("path", "Open path", &[], path),
            ("polygon", "Polygon", &[], polygon),
            ("circle", "Circle <(x,y),r>", &[], circle),
            ("int4range", "Integer range", RANGE_PARAMS, int_range),
            ("int8range", "Big integer range", RANGE_PARAMS, int_range),
            ("numrange", "Numeric range", RANGE_PARAMS, num_range),
            ("tsrange", "Timestamp range", TEMPORAL_RANGE_PARAMS, ts_range),
            ("tstzrange", "Timestamp with time zone range", TEMPORAL_RANGE_PARAMS, ts_range),
            ("daterange", "Date range", TEMPORAL_RANGE_PARAMS, date_range),
            ("tsvector", "Full-text document vector", &[], tsvector),
            ("tsquery", "Full-text query", &[], tsquery),
            ("hstore", "Key/value store literal", &[], hstore),
            ("xml", "XML fragment", &[], xml),
            ("array", "List of generated elements", ARRAY_PARAMS, array),
            ("bit", "Bit string", BIT_PARAMS, bit),
        ],
    );
}

fn json_document(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let mut map = BTreeMap::new();
    map.insert("id".to_string(), Value::Int(rng.random_range(1..=100_000)));
    map.insert("label".to_string(), Value::Text(word(rng)));
    map.insert("active".to_string(), Value::Bool(rng.random_bool(0.5)));
    map.insert(
        "score".to_string(),
        Value::Float(bounded_float(rng, 0.0, 100.0, 2)),
    );
    let tags = (0..rng.random_range(1..=3))
        .map(|_| Value::Text(word(rng)))
        .collect();
    map.insert("tags".to_string(), Value::List(tags));
    Ok(Value::Map(map))
}

fn inet(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let value = match params.get_i64("version").unwrap_or(4) {
        4 => Ipv4Addr::from(ipv4_octets(rng)).to_string(),
        6 => Ipv6Addr::from(ipv6_segments(rng)).to_string(),
        other => {
            return Err(GeneratorError::range(format!(
                "ip version must be 4 or 6 (got {other})"
            )));
        }
    };
    Ok(Value::Text(value))
}

fn cidr(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let version = params.get_i64("version").unwrap_or(4);
    let (bits, default_prefix) = match version {
        4 => (32, rng.random_range(8..=30)),
        6 => (128, rng.random_range(32..=64)),
        other => {
            return Err(GeneratorError::range(format!(
                "ip version must be 4 or 6 (got {other})"
            )));
        }
    };
    let prefix = params.get_i64("prefix").unwrap_or(default_prefix);
    if !(0..=bits).contains(&prefix) {
        return Err(GeneratorError::range(format!(
            "prefix must be between 0 and {bits} (got {prefix})"
        )));
    }
    let prefix = prefix as u32;
    let value = if version == 4 {
        let address = u32::from(Ipv4Addr::from(ipv4_octets(rng)));
        let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
        format!("{}/{prefix}", Ipv4Addr::from(address & mask))
    } else {
        let address = u128::from(Ipv6Addr::from(ipv6_segments(rng)));
        let mask = u128::MAX.checked_shl(128 - prefix).unwrap_or(0);
        format!("{}/{prefix}", Ipv6Addr::from(address & mask))
    };
    Ok(Value::Text(value))
}

fn bytea(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let size = params.get_i64("size").unwrap_or(16);
    if !(1..=1024 * 1024).contains(&size) {
        return Err(GeneratorError::range(format!(
            "size must be between 1 and 1048576 (got {size})"
        )));
    }
    let mut bytes = vec![0u8; size as usize];
    rng.fill_bytes(&mut bytes);
    Ok(Value::Text(format!("\\x{}", hex::encode(bytes))))
}

fn money(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let (min, max) = params.float_range(0.0, 10_000.0)?;
    Ok(Value::Float(bounded_float(rng, min, max, 2)))
}

fn interval(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let days = rng.random_range(0..=365);
    let hours = rng.random_range(0..24);
    let minutes = rng.random_range(0..60);
    let seconds = rng.random_range(0..60);
    Ok(Value::Text(format!(
        "{days} days {hours:02}:{minutes:02}:{seconds:02}"
    )))
}

fn serial(
    ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    _rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let start = params.get_i64("start").unwrap_or(1);
    Ok(Value::Int(ctx.next_sequence(start)))
}

fn coordinate(rng: &mut dyn RngCore) -> f64 {
    round_to(rng.random_range(-1000.0..=1000.0), 2)
}

fn point_literal(rng: &mut dyn RngCore) -> String {
    let x = coordinate(rng);
    let y = coordinate(rng);
    format!("({x},{y})")
}

fn points(rng: &mut dyn RngCore, count: usize) -> String {
    (0..count)
        .map(|_| point_literal(rng))
        .collect::<Vec<_>>()
        .join(",")
}

fn point(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    Ok(Value::Text(point_literal(rng)))
}

fn line(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    // A and B must not both be zero.
    let a = round_to(rng.random_range(1.0..=100.0), 2);
    let b = coordinate(rng);
    let c = coordinate(rng);
    Ok(Value::Text(format!("{{{a},{b},{c}}}")))
}

fn lseg(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    Ok(Value::Text(format!("[{}]", points(rng, 2))))
}

fn rect(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    Ok(Value::Text(format!("({})", points(rng, 2))))
}

fn path(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let count = rng.random_range(2..=5);
    Ok(Value::Text(format!("[{}]", points(rng, count))))
}

fn polygon(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let count = rng.random_range(3..=6);
    Ok(Value::Text(format!("({})", points(rng, count))))
}

fn circle(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let center = point_literal(rng);
    let radius = round_to(rng.random_range(0.5..=500.0), 2);
    Ok(Value::Text(format!("<{center},{radius}>")))
}

fn int_range(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let (min, max) = params.int_range("min", "max", 0, 1000)?;
    let lower = rng.random_range(min..=max);
    let upper = rng.random_range(lower..=max).saturating_add(1);
    Ok(Value::Text(format!("[{lower},{upper})")))
}

fn num_range(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let (min, max) = params.int_range("min", "max", 0, 1000)?;
    let lower = bounded_float(rng, min as f64, max as f64, 2);
    let upper = bounded_float(rng, lower, max as f64, 2);
    Ok(Value::Text(format!("[{lower},{upper}]")))
}

fn ts_range(
    ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let (start, end) = window(ctx, params)?;
    let lower = instant_between(rng, start, end);
    let upper = instant_between(rng, lower, end);
    Ok(Value::Text(format!(
        "[\"{}\",\"{}\"]",
        format_timestamp(&lower),
        format_timestamp(&upper)
    )))
}

fn date_range(
    ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let (start, end) = window(ctx, params)?;
    let lower = instant_between(rng, start, end).date_naive();
    let upper = lower + Duration::days(rng.random_range(1..=90));
    Ok(Value::Text(format!(
        "[{},{})",
        lower.format("%Y-%m-%d"),
        upper.format("%Y-%m-%d")
    )))
}

fn distinct_words(rng: &mut dyn RngCore, count: usize) -> Vec<String> {
    let mut words: Vec<String> = (0..count).map(|_| word(rng)).collect();
    words.sort();
    words.dedup();
    words
}

fn tsvector(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let count = rng.random_range(2..=6);
    let lexemes: Vec<String> = distinct_words(rng, count)
        .into_iter()
        .enumerate()
        .map(|(idx, word)| format!("'{word}':{}", idx + 1))
        .collect();
    Ok(Value::Text(lexemes.join(" ")))
}

fn tsquery(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let count = rng.random_range(1..=3);
    let terms: Vec<String> = distinct_words(rng, count)
        .into_iter()
        .map(|word| format!("'{word}'"))
        .collect();
    let operator = if rng.random_bool(0.5) { " & " } else { " | " };
    Ok(Value::Text(terms.join(operator)))
}

fn hstore(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let count = rng.random_range(1..=4);
    let pairs: Vec<String> = distinct_words(rng, count)
        .into_iter()
        .map(|key| format!("\"{key}\"=>\"{}\"", word(rng)))
        .collect();
    Ok(Value::Text(pairs.join(", ")))
}

fn xml(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let id = rng.random_range(1..=100_000);
    let name = word(rng);
    let note = word(rng);
    Ok(Value::Text(format!(
        "<record id=\"{id}\"><name>{name}</name><note>{note}</note></record>"
    )))
}

fn array(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let (min, max) = params.int_range("min_size", "max_size", 1, 5)?;
    bounded_size("min_size", min, 0)?;
    bounded_size("max_size", max, 0)?;
    let element = params.get_str("element_type").unwrap_or("string");
    let size = rng.random_range(min..=max);
    let mut items = Vec::with_capacity(size as usize);
    for _ in 0..size {
        let item = match element {
            "string" | "text" | "word" => Value::Text(word(rng)),
            "integer" | "int" | "number" => Value::Int(rng.random_range(0..=1000)),
            "float" | "decimal" => Value::Float(bounded_float(rng, 0.0, 100.0, 2)),
            "boolean" | "bool" => Value::Bool(rng.random_bool(0.5)),
            "uuid" => {
                let mut bytes = [0u8; 16];
                rng.fill_bytes(&mut bytes);
                Value::Text(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
            }
            _ => {
                return Err(GeneratorError::InvalidParamType {
                    param: "element_type".to_string(),
                    expected: "string, integer, float, boolean or uuid",
                });
            }
        };
        items.push(item);
    }
    Ok(Value::List(items))
}

fn bit(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let length = params.get_i64("length").unwrap_or(8);
    if !(1..=4096).contains(&length) {
        return Err(GeneratorError::range(format!(
            "length must be between 1 and 4096 (got {length})"
        )));
    }
    let bits = (0..length)
        .map(|_| if rng.random_bool(0.5) { '1' } else { '0' })
        .collect();
    Ok(Value::Text(bits))
}
