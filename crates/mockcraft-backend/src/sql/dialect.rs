use mockcraft_core::{Column, LogicalType, Value, format_timestamp};

/// Per-database SQL spelling: identifier quoting, placeholders and DDL types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

/// How a value travels to the driver. `Any` binds a small fixed set of
/// primitive types, so everything else goes as text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Dialect {
    /// Bind-parameter ceiling per statement.
    pub fn max_params(self) -> usize {
        match self {
            Self::Postgres | Self::MySql => 65_535,
            Self::Sqlite => 32_766,
        }
    }

    pub fn quote(self, identifier: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", identifier.replace('`', "``")),
            Self::Postgres | Self::Sqlite => format!("\"{}\"", identifier.replace('"', "\"\"")),
        }
    }

    /// Placeholder for the `index`-th (1-based) parameter of `column`.
    /// Postgres receives text and casts it to the column type.
    pub fn placeholder(self, index: usize, column: &Column, is_key: bool) -> String {
        match self {
            Self::Postgres => format!("CAST(${index} AS {})", self.column_type(column, is_key)),
            Self::MySql | Self::Sqlite => "?".to_string(),
        }
    }

    /// Expression reading `column` back as text.
    pub fn select_as_text(self, column: &str) -> String {
        let quoted = self.quote(column);
        match self {
            Self::MySql => format!("CAST({quoted} AS CHAR)"),
            Self::Postgres | Self::Sqlite => format!("CAST({quoted} AS TEXT)"),
        }
    }

    pub fn drop_table(self, name: &str) -> String {
        match self {
            Self::Postgres => format!("DROP TABLE IF EXISTS {} CASCADE", self.quote(name)),
            Self::MySql | Self::Sqlite => format!("DROP TABLE IF EXISTS {}", self.quote(name)),
        }
    }

    /// DDL type for `column`. `is_key` marks primary, unique and foreign-key
    /// columns, which MySQL cannot index as unbounded `TEXT`.
    pub fn column_type(self, column: &Column, is_key: bool) -> String {
        let max_length = column.max_length();
        let logical = LogicalType::parse(&column.column_type);
        match self {
            Self::Postgres => postgres_type(column, logical, max_length),
            Self::MySql => mysql_type(column, logical, max_length, is_key),
            Self::Sqlite => sqlite_type(logical).to_string(),
        }
    }

    /// Convert a generated value into a bind parameter for this dialect.
    pub fn param(self, value: &Value) -> SqlParam {
        match (self, value) {
            (_, Value::Null) => SqlParam::Null,
            (Self::Postgres, other) => SqlParam::Text(text_literal(other)),
            (_, Value::Bool(value)) => SqlParam::Bool(*value),
            (_, Value::Int(value)) => SqlParam::Int(*value),
            (_, Value::Float(value)) => SqlParam::Float(*value),
            (Self::MySql, Value::Timestamp(value)) => {
                SqlParam::Text(value.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
            }
            (_, other) => SqlParam::Text(text_literal(other)),
        }
    }
}

fn text_literal(value: &Value) -> String {
    match value {
        Value::Text(value) => value.clone(),
        Value::Timestamp(value) => format_timestamp(value),
        Value::Map(_) | Value::List(_) => value.to_json().to_string(),
        other => other.key_string(),
    }
}

fn postgres_type(column: &Column, logical: LogicalType, max_length: Option<u64>) -> String {
    match logical {
        LogicalType::String | LogicalType::Varchar => match max_length {
            Some(length) => format!("VARCHAR({length})"),
            None if logical == LogicalType::Varchar => "VARCHAR(255)".to_string(),
            None => "TEXT".to_string(),
        },
        LogicalType::Char => match max_length {
            Some(length) => format!("CHAR({length})"),
            None => "TEXT".to_string(),
        },
        LogicalType::Text => "TEXT".to_string(),
        LogicalType::Integer => "INTEGER".to_string(),
        LogicalType::BigInt => "BIGINT".to_string(),
        LogicalType::SmallInt => "SMALLINT".to_string(),
        LogicalType::Float => "DOUBLE PRECISION".to_string(),
        LogicalType::Decimal => "NUMERIC".to_string(),
        LogicalType::Boolean => "BOOLEAN".to_string(),
        LogicalType::Date => "DATE".to_string(),
        LogicalType::DateTime => "TIMESTAMPTZ".to_string(),
        LogicalType::Uuid => "UUID".to_string(),
        LogicalType::Other => match column.column_type.to_ascii_lowercase().as_str() {
            "json" | "jsonb" | "array" | "object" => "JSONB",
            "serial" => "INTEGER",
            "bigserial" => "BIGINT",
            "bit" => "VARBIT",
            native @ ("inet" | "cidr" | "bytea" | "money" | "interval" | "point" | "line"
            | "lseg" | "box" | "path" | "polygon" | "circle" | "int4range" | "int8range"
            | "numrange" | "tsrange" | "tstzrange" | "daterange" | "tsvector" | "tsquery"
            | "xml" | "time") => return native.to_ascii_uppercase(),
            _ => "TEXT",
        }
        .to_string(),
    }
}

fn mysql_type(
    column: &Column,
    logical: LogicalType,
    max_length: Option<u64>,
    is_key: bool,
) -> String {
    match logical {
        LogicalType::String | LogicalType::Varchar | LogicalType::Char | LogicalType::Text => {
            match max_length {
                Some(length) if logical == LogicalType::Char => format!("CHAR({length})"),
                Some(length) => format!("VARCHAR({length})"),
                None if is_key || logical == LogicalType::Varchar => "VARCHAR(255)".to_string(),
                None => "TEXT".to_string(),
            }
        }
        LogicalType::Integer => "INT".to_string(),
        LogicalType::BigInt => "BIGINT".to_string(),
        LogicalType::SmallInt => "SMALLINT".to_string(),
        LogicalType::Float => "DOUBLE".to_string(),
        LogicalType::Decimal => "DECIMAL(18,4)".to_string(),
        LogicalType::Boolean => "BOOLEAN".to_string(),
        LogicalType::Date => "DATE".to_string(),
        LogicalType::DateTime => "DATETIME(6)".to_string(),
        LogicalType::Uuid => "CHAR(36)".to_string(),
        LogicalType::Other => match column.column_type.to_ascii_lowercase().as_str() {
            "json" | "jsonb" | "array" | "object" => "JSON".to_string(),
            "serial" => "INT".to_string(),
            "bigserial" => "BIGINT".to_string(),
            "money" => "DECIMAL(18,2)".to_string(),
            "time" => "TIME".to_string(),
            _ if is_key => "VARCHAR(255)".to_string(),
            _ => "TEXT".to_string(),
        },
    }
}

fn sqlite_type(logical: LogicalType) -> &'static str {
    match logical {
        LogicalType::Integer | LogicalType::BigInt | LogicalType::SmallInt | LogicalType::Boolean => {
            "INTEGER"
        }
        LogicalType::Float => "REAL",
        LogicalType::Decimal => "NUMERIC",
        _ => "TEXT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quoting_escapes_delimiters() {
        assert_eq!(Dialect::Postgres.quote("order"), "\"order\"");
        assert_eq!(Dialect::Sqlite.quote("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(Dialect::MySql.quote("a`b"), "`a``b`");
    }

    #[test]
    fn postgres_placeholders_cast_to_column_type() {
        let column = Column::new("created_at", "datetime");
        assert_eq!(
            Dialect::Postgres.placeholder(3, &column, false),
            "CAST($3 AS TIMESTAMPTZ)"
        );
        assert_eq!(Dialect::MySql.placeholder(3, &column, false), "?");
    }

    #[test]
    fn mysql_keys_are_bounded_strings() {
        let column = Column::new("id", "string");
        assert_eq!(Dialect::MySql.column_type(&column, true), "VARCHAR(255)");
        assert_eq!(Dialect::MySql.column_type(&column, false), "TEXT");
        let bounded = Column::new("code", "varchar").with_param("max_length", json!(12));
        assert_eq!(Dialect::Postgres.column_type(&bounded, false), "VARCHAR(12)");
    }

    #[test]
    fn backend_flavored_types_map_natively_on_postgres() {
        assert_eq!(Dialect::Postgres.column_type(&Column::new("n", "cidr"), false), "CIDR");
        assert_eq!(Dialect::Postgres.column_type(&Column::new("d", "jsonb"), false), "JSONB");
        assert_eq!(Dialect::Sqlite.column_type(&Column::new("d", "jsonb"), false), "TEXT");
    }

    #[test]
    fn postgres_binds_everything_as_text() {
        assert_eq!(Dialect::Postgres.param(&Value::Int(5)), SqlParam::Text("5".to_string()));
        assert_eq!(Dialect::Postgres.param(&Value::Bool(true)), SqlParam::Text("true".to_string()));
        assert_eq!(Dialect::Sqlite.param(&Value::Int(5)), SqlParam::Int(5));
        assert_eq!(Dialect::MySql.param(&Value::Null), SqlParam::Null);
    }
}
