//! Column decoding helpers shared by the libSQL repositories

use std::str::FromStr;

use libsql::{Row, Value};

use crate::error::{Error, Result};

pub fn text(row: &Row, idx: i32) -> Result<String> {
    Ok(row.get::<String>(idx)?)
}

pub fn int(row: &Row, idx: i32) -> Result<i64> {
    Ok(row.get::<i64>(idx)?)
}

pub fn opt_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(value) => Ok(Some(value)),
        other => Err(Error::Database(format!(
            "column {idx}: expected TEXT or NULL, found {other:?}"
        ))),
    }
}

pub fn opt_int(row: &Row, idx: i32) -> Result<Option<i64>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Integer(value) => Ok(Some(value)),
        other => Err(Error::Database(format!(
            "column {idx}: expected INTEGER or NULL, found {other:?}"
        ))),
    }
}

/// Parse a stored identifier or enum column
pub fn parse<T>(raw: &str, column: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|error| Error::Database(format!("invalid {column} '{raw}': {error}")))
}

pub fn opt_parse<T>(raw: Option<String>, column: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| parse(&value, column)).transpose()
}

pub fn nullable_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |value| Value::Text(value.to_string()))
}

pub fn nullable_int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}
