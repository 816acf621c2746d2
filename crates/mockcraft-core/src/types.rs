use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::Schema as JsonSchemaObject;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A generated row: column name to value.
pub type Row = BTreeMap<String, Value>;

/// A single generated or stored value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Map(BTreeMap<String, Value>),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Canonical string used to compare keys across backends.
    ///
    /// Backends that read keys back as text and the generator that produced
    /// typed values agree on this form.
    pub fn key_string(&self) -> String {
        match self {
            Value::Null => "<null>".to_string(),
            Value::Bool(value) => value.to_string(),
            Value::Int(value) => value.to_string(),
            Value::Float(value) => value.to_string(),
            Value::Text(value) => value.clone(),
            Value::Timestamp(value) => format_timestamp(value),
            Value::Map(_) | Value::List(_) => self.to_json().to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(value) => serde_json::Value::Bool(*value),
            Value::Int(value) => serde_json::Value::from(*value),
            Value::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(value) => serde_json::Value::String(value.clone()),
            Value::Timestamp(value) => serde_json::Value::String(format_timestamp(value)),
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }
}

/// RFC-3339 rendering with microsecond precision and a `Z` suffix.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(value),
            serde_json::Value::Number(number) => {
                if let Some(value) = number.as_i64() {
                    Value::Int(value)
                } else {
                    Value::Float(number.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(value) => Value::Text(value),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key_string())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl JsonSchema for Value {
    fn schema_name() -> String {
        "Value".to_string()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> JsonSchemaObject {
        serde_json::Value::json_schema(generator)
    }
}

/// Logical column types recognized by the schema validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    String,
    Text,
    Varchar,
    Char,
    Integer,
    BigInt,
    SmallInt,
    Float,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Uuid,
    /// Backend-flavored type names (`jsonb`, `inet`, `mongo_object_id`, ...).
    Other,
}

impl LogicalType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "string" => Self::String,
            "text" => Self::Text,
            "varchar" => Self::Varchar,
            "char" => Self::Char,
            "integer" | "int" => Self::Integer,
            "bigint" => Self::BigInt,
            "smallint" => Self::SmallInt,
            "float" => Self::Float,
            "decimal" | "numeric" => Self::Decimal,
            "boolean" | "bool" => Self::Boolean,
            "date" => Self::Date,
            "datetime" | "timestamp" => Self::DateTime,
            "uuid" => Self::Uuid,
            _ => Self::Other,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::Integer | Self::BigInt | Self::SmallInt)
    }

    pub fn is_textual(self) -> bool {
        matches!(self, Self::String | Self::Text | Self::Varchar | Self::Char)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_keeps_nested_shape() {
        let json = serde_json::json!({"a": [1, 2.5, "x", null], "b": {"c": true}});
        let value = Value::from(json.clone());
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn key_string_matches_text_form() {
        assert_eq!(Value::Int(42).key_string(), "42");
        assert_eq!(Value::from("abc").key_string(), "abc");
        assert_eq!(Value::Null.key_string(), "<null>");
    }

    #[test]
    fn parses_logical_types_case_insensitively() {
        assert_eq!(LogicalType::parse("VARCHAR"), LogicalType::Varchar);
        assert_eq!(LogicalType::parse("int"), LogicalType::Integer);
        assert_eq!(LogicalType::parse("timestamp"), LogicalType::DateTime);
        assert_eq!(LogicalType::parse("jsonb"), LogicalType::Other);
    }
}
