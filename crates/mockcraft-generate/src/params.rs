use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use serde_json::Value;

use mockcraft_core::Params;

use crate::errors::GeneratorError;

/// Parameter accepted by every string-producing generator.
pub const MAX_LENGTH: &str = "max_length";

/// Ceiling for user-sized lengths and element counts.
pub const MAX_GENERATED_SIZE: i64 = 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    String,
    Date,
    Time,
    Timestamp,
    List,
    Any,
}

impl ParamKind {
    fn expected(self) -> &'static str {
        match self {
            Self::Bool => "a boolean",
            Self::Int => "an integer",
            Self::Float => "a number",
            Self::String => "a string",
            Self::Date => "an ISO-8601 date",
            Self::Time => "a HH:MM:SS time",
            Self::Timestamp => "an RFC-3339 datetime or ISO-8601 date",
            Self::List => "a list",
            Self::Any => "any value",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct ParamSpec {
    pub key: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    pub const fn new(key: &'static str, kind: ParamKind, required: bool) -> Self {
        Self {
            key,
            kind,
            required,
        }
    }
}

/// Typed view over a validated parameter bag.
#[derive(Clone, Copy)]
pub struct ParamMap<'a> {
    map: &'a Params,
}

/// Check declared params for type and presence.
///
/// Keys a generator does not declare are ignored; `max_length` is checked here
/// for every generator.
pub fn validate_params<'a>(
    params: &'a Params,
    specs: &[ParamSpec],
) -> Result<ParamMap<'a>, GeneratorError> {
    for spec in specs {
        match params.get(spec.key) {
            Some(value) => validate_kind(spec.key, spec.kind, value)?,
            None if spec.required => {
                return Err(GeneratorError::InvalidParamType {
                    param: spec.key.to_string(),
                    expected: spec.kind.expected(),
                });
            }
            None => {}
        }
    }

    if let Some(value) = params.get(MAX_LENGTH)
        && value.as_u64().is_none()
    {
        return Err(GeneratorError::InvalidParamType {
            param: MAX_LENGTH.to_string(),
            expected: "a non-negative integer",
        });
    }

    Ok(ParamMap { map: params })
}

impl<'a> ParamMap<'a> {
    pub fn raw(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.raw(key).and_then(as_integer)
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get_i64(key).and_then(|value| usize::try_from(value).ok())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.raw(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.raw(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&'a str> {
        self.raw(key).and_then(Value::as_str)
    }

    pub fn get_list(&self, key: &str) -> Option<&'a [Value]> {
        self.raw(key).and_then(Value::as_array).map(Vec::as_slice)
    }

    pub fn get_timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get_str(key).and_then(parse_timestamp_value)
    }

    pub fn get_time(&self, key: &str) -> Option<NaiveTime> {
        self.get_str(key).and_then(parse_time_value)
    }

    pub fn max_length(&self) -> Option<usize> {
        self.raw(MAX_LENGTH)
            .and_then(Value::as_u64)
            .and_then(|value| usize::try_from(value).ok())
    }

    /// `(min, max)` integer bounds with defaults; `min > max` is a range violation.
    pub fn int_range(
        &self,
        min_key: &str,
        max_key: &str,
        default_min: i64,
        default_max: i64,
    ) -> Result<(i64, i64), GeneratorError> {
        let min = self.get_i64(min_key).unwrap_or(default_min);
        let max = self.get_i64(max_key).unwrap_or(default_max);
        if min > max {
            return Err(GeneratorError::range(format!(
                "{min_key} must be <= {max_key} (got {min} > {max})"
            )));
        }
        Ok((min, max))
    }

    pub fn float_range(
        &self,
        default_min: f64,
        default_max: f64,
    ) -> Result<(f64, f64), GeneratorError> {
        let min = self.get_f64("min").unwrap_or(default_min);
        let max = self.get_f64("max").unwrap_or(default_max);
        if min > max {
            return Err(GeneratorError::range(format!(
                "min must be <= max (got {min} > {max})"
            )));
        }
        Ok((min, max))
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|number| number.fract() == 0.0 && number.abs() < i64::MAX as f64)
            .map(|number| number as i64)
    })
}

fn validate_kind(key: &str, kind: ParamKind, value: &Value) -> Result<(), GeneratorError> {
    let valid = match kind {
        ParamKind::Bool => value.is_boolean(),
        ParamKind::Int => as_integer(value).is_some(),
        ParamKind::Float => value.as_f64().is_some(),
        ParamKind::String => value.is_string(),
        ParamKind::Date => value.as_str().and_then(parse_date_value).is_some(),
        ParamKind::Time => value.as_str().and_then(parse_time_value).is_some(),
        ParamKind::Timestamp => value.as_str().and_then(parse_timestamp_value).is_some(),
        ParamKind::List => value.is_array(),
        ParamKind::Any => true,
    };

    if valid {
        Ok(())
    } else {
        Err(GeneratorError::InvalidParamType {
            param: key.to_string(),
            expected: kind.expected(),
        })
    }
}

pub fn parse_date_value(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp_value(value).map(|dt| dt.date_naive()))
}

pub fn parse_time_value(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .ok()
        .or_else(|| NaiveTime::parse_from_str(value, "%H:%M:%S%.f").ok())
}

/// Accepts RFC-3339, naive `T`/space separated datetimes (as UTC) and bare dates.
pub fn parse_timestamp_value(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").ok())
                .or_else(|| {
                    NaiveDate::parse_from_str(value, "%Y-%m-%d")
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                })
                .map(|naive| naive.and_utc())
        })
}

/// Check `value` against `[min, MAX_GENERATED_SIZE]` and convert it to a size.
pub fn bounded_size(key: &str, value: i64, min: i64) -> Result<usize, GeneratorError> {
    if !(min..=MAX_GENERATED_SIZE).contains(&value) {
        return Err(GeneratorError::range(format!(
            "{key} must be between {min} and {MAX_GENERATED_SIZE} (got {value})"
        )));
    }
    Ok(value as usize)
}

/// Truncate to at most `max` characters.
pub fn truncate_chars(value: &mut String, max: usize) {
    if let Some((idx, _)) = value.char_indices().nth(max) {
        value.truncate(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        serde_json::from_value(value).expect("params object")
    }

    #[test]
    fn ignores_unknown_keys() {
        let bag = params(json!({"min": 1, "colour": "blue"}));
        let specs = [ParamSpec::new("min", ParamKind::Int, false)];
        let map = validate_params(&bag, &specs).expect("valid");
        assert_eq!(map.get_i64("min"), Some(1));
    }

    #[test]
    fn rejects_wrong_kind() {
        let bag = params(json!({"min": "one"}));
        let specs = [ParamSpec::new("min", ParamKind::Int, false)];
        assert!(matches!(
            validate_params(&bag, &specs),
            Err(GeneratorError::InvalidParamType { param, .. }) if param == "min"
        ));
    }

    #[test]
    fn accepts_integral_floats_as_ints() {
        let bag = params(json!({"min": 3.0}));
        let specs = [ParamSpec::new("min", ParamKind::Int, false)];
        let map = validate_params(&bag, &specs).expect("valid");
        assert_eq!(map.get_i64("min"), Some(3));
    }

    #[test]
    fn rejects_negative_max_length() {
        let bag = params(json!({"max_length": -2}));
        assert!(validate_params(&bag, &[]).is_err());
    }

    #[test]
    fn parses_dates_as_midnight_timestamps() {
        let parsed = parse_timestamp_value("2024-02-29").expect("date");
        assert_eq!(parsed.to_rfc3339(), "2024-02-29T00:00:00+00:00");
        assert!(parse_timestamp_value("2024-02-30").is_none());
    }

    #[test]
    fn truncates_on_char_boundaries() {
        let mut value = "héllo wörld".to_string();
        truncate_chars(&mut value, 4);
        assert_eq!(value, "héll");
        let mut short = "ab".to_string();
        truncate_chars(&mut short, 10);
        assert_eq!(short, "ab");
    }
}
