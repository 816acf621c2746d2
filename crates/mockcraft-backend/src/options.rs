use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, Result};

/// Connection pool settings parsed out of a DSN query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolOptions {
    pub max_open: u32,
    pub max_idle: u32,
    pub max_lifetime: Duration,
    pub max_idle_time: Duration,
}

impl PoolOptions {
    pub fn sql_defaults() -> Self {
        Self {
            max_open: 10,
            max_idle: 5,
            max_lifetime: Duration::from_secs(3600),
            max_idle_time: Duration::from_secs(300),
        }
    }

    pub fn document_defaults() -> Self {
        Self {
            max_open: 100,
            max_idle: 100,
            ..Self::sql_defaults()
        }
    }

    /// Apply one `key=value` pair. Returns `Ok(false)` when `key` is not a
    /// pool option.
    pub(crate) fn apply(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "max_open_conns" | "maxPoolSize" => self.max_open = parse_count(key, value)?,
            "max_idle_conns" => self.max_idle = parse_count(key, value)?,
            "conn_max_lifetime" => self.max_lifetime = parse_duration(value)?,
            "conn_max_idle_time" => self.max_idle_time = parse_duration(value)?,
            "maxIdleTimeMS" => {
                let millis = value.parse::<u64>().map_err(|_| {
                    BackendError::InvalidDsn(format!("{key} must be milliseconds, got `{value}`"))
                })?;
                self.max_idle_time = Duration::from_millis(millis);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::sql_defaults()
    }
}

fn parse_count(key: &str, value: &str) -> Result<u32> {
    value
        .parse::<u32>()
        .map_err(|_| BackendError::InvalidDsn(format!("{key} must be a non-negative integer")))
}

/// Parse durations such as `1h`, `5m`, `90s`, `250ms` or `1h30m`. A bare
/// number is read as seconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    let invalid = || BackendError::InvalidDsn(format!("invalid duration `{input}`"));
    if input.is_empty() {
        return Err(invalid());
    }
    if let Ok(seconds) = input.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|ch: char| !ch.is_ascii_digit() && ch != '.')
            .ok_or_else(invalid)?;
        if digits_end == 0 {
            return Err(invalid());
        }
        let amount: f64 = rest[..digits_end].parse().map_err(|_| invalid())?;
        rest = &rest[digits_end..];
        let unit_end = rest
            .find(|ch: char| ch.is_ascii_digit() || ch == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(invalid()),
        };
        total += Duration::from_secs_f64(amount * scale);
        rest = &rest[unit_end..];
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compound_durations() {
        assert_eq!(parse_duration("1h").ok(), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("1h30m").ok(), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("250ms").ok(), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("45").ok(), Some(Duration::from_secs(45)));
        assert!(parse_duration("ten minutes").is_err());
        assert!(parse_duration("5").is_ok());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn applies_known_keys_only() {
        let mut pool = PoolOptions::sql_defaults();
        assert!(matches!(pool.apply("max_open_conns", "20"), Ok(true)));
        assert!(matches!(pool.apply("sslmode", "disable"), Ok(false)));
        assert!(pool.apply("max_idle_conns", "-1").is_err());
        assert_eq!(pool.max_open, 20);
        assert_eq!(pool.max_idle, 5);
    }
}
