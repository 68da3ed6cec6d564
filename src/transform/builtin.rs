//! Built-in stored/domain conversions.
//!
//! Each conversion reports failures as a plain message; `FieldTransform` attaches the
//! transform name. None of these functions is ever called with `Value::Null`.

use crate::models::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as JsonValue;

type Conversion = Result<Value, String>;

fn unsupported(direction: &str, value: &Value) -> String {
    format!("cannot convert {} value {}", value.type_name(), direction)
}

// int

pub(crate) fn int_to_view(value: Value) -> Conversion {
    to_int(value, "to int")
}

pub(crate) fn int_to_store(value: Value) -> Conversion {
    to_int(value, "to a stored int")
}

fn to_int(value: Value, direction: &str) -> Conversion {
    match value {
        Value::Int(v) => Ok(Value::Int(v)),
        Value::Bool(v) => Ok(Value::Int(v.into())),
        Value::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
            Ok(Value::Int(v as i64))
        }
        Value::String(s) => parse_int(&s).map(Value::Int),
        other => Err(unsupported(direction, &other)),
    }
}

/// Integer text, also accepting integral decimal text such as "42.000".
fn parse_int(text: &str) -> Result<i64, String> {
    let text = text.trim();
    if let Ok(v) = text.parse::<i64>() {
        return Ok(v);
    }
    match text.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Ok(v as i64),
        _ => Err(format!("'{}' is not an integer", text)),
    }
}

// float

pub(crate) fn float_to_view(value: Value, precision: Option<u32>) -> Conversion {
    to_float(value, precision, "to float")
}

pub(crate) fn float_to_store(value: Value, precision: Option<u32>) -> Conversion {
    to_float(value, precision, "to a stored float")
}

fn to_float(value: Value, precision: Option<u32>, direction: &str) -> Conversion {
    let v = match value {
        Value::Float(v) => v,
        Value::Int(v) => v as f64,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("'{}' is not a number", s))?,
        other => return Err(unsupported(direction, &other)),
    };
    Ok(Value::Float(round(v, precision)))
}

fn round(value: f64, precision: Option<u32>) -> f64 {
    match precision {
        Some(p) => {
            let factor = 10f64.powi(p.min(15) as i32);
            (value * factor).round() / factor
        }
        None => value,
    }
}

// bool

pub(crate) fn bool_to_view(value: Value) -> Conversion {
    match value {
        Value::Bool(v) => Ok(Value::Bool(v)),
        Value::Int(v) => Ok(Value::Bool(v != 0)),
        Value::String(s) => parse_bool(&s).map(Value::Bool),
        other => Err(unsupported("to bool", &other)),
    }
}

pub(crate) fn bool_to_store(value: Value) -> Conversion {
    let flag = match bool_to_view(value)? {
        Value::Bool(v) => v,
        other => return Err(unsupported("to a stored bool", &other)),
    };
    Ok(Value::Int(flag.into()))
}

fn parse_bool(text: &str) -> Result<bool, String> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" | "" => Ok(false),
        other => Err(format!("'{}' is not a boolean", other)),
    }
}

// json

pub(crate) fn json_to_view(value: Value) -> Conversion {
    let parsed = match value {
        Value::String(s) => parse_json(&s)?,
        Value::Bytes(b) => {
            let text = String::from_utf8(b).map_err(|e| format!("invalid UTF-8: {}", e))?;
            parse_json(&text)?
        }
        Value::Json(v) => v,
        other => other.to_json(),
    };
    Ok(Value::Json(parsed))
}

/// JSON `null` is a domain value like any other and is stored as the text `null`.
pub(crate) fn json_to_store(value: Value) -> Conversion {
    Ok(Value::String(value.to_json().to_string()))
}

fn parse_json(text: &str) -> Result<JsonValue, String> {
    serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))
}

// enum

pub(crate) fn enum_to_view(value: Value, values: &[String]) -> Conversion {
    let index = match value {
        Value::Int(i) => i,
        Value::String(s) => match parse_int(&s) {
            Ok(i) => i,
            Err(_) if values.contains(&s) => return Ok(Value::String(s)),
            Err(_) => return Err(format!("'{}' is not a member of the enum", s)),
        },
        other => return Err(unsupported("to an enum member", &other)),
    };
    usize::try_from(index)
        .ok()
        .and_then(|i| values.get(i))
        .map(|member| Value::String(member.clone()))
        .ok_or_else(|| format!("index {} is out of range for {} members", index, values.len()))
}

pub(crate) fn enum_to_store(value: Value, values: &[String]) -> Conversion {
    match value {
        Value::String(s) => values
            .iter()
            .position(|member| *member == s)
            .map(|i| Value::Int(i as i64))
            .ok_or_else(|| format!("'{}' is not a member of the enum", s)),
        Value::Int(i) if usize::try_from(i).is_ok_and(|i| i < values.len()) => Ok(Value::Int(i)),
        Value::Int(i) => Err(format!("index {} is out of range for {} members", i, values.len())),
        other => Err(unsupported("to an enum index", &other)),
    }
}

// set

pub(crate) fn set_to_view(value: Value, values: Option<&[String]>) -> Conversion {
    let members = match value {
        Value::String(s) => split_set(&s),
        Value::Json(v) => json_members(v)?,
        other => return Err(unsupported("to a set", &other)),
    };
    check_members(&members, values)?;
    Ok(Value::Json(JsonValue::Array(
        members.into_iter().map(JsonValue::String).collect(),
    )))
}

pub(crate) fn set_to_store(value: Value, values: Option<&[String]>) -> Conversion {
    let members = match value {
        Value::Json(v) => json_members(v)?,
        Value::String(s) => split_set(&s),
        other => return Err(unsupported("to a stored set", &other)),
    };
    check_members(&members, values)?;
    if let Some(bad) = members.iter().find(|m| m.contains(',')) {
        return Err(format!("set member '{}' contains a comma", bad));
    }
    Ok(Value::String(members.join(",")))
}

fn split_set(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(',').map(str::to_string).collect()
}

fn json_members(json: JsonValue) -> Result<Vec<String>, String> {
    match json {
        JsonValue::Array(items) => items
            .into_iter()
            .map(|item| match item {
                JsonValue::String(s) => Ok(s),
                other => Err(format!("set member {} is not a string", other)),
            })
            .collect(),
        other => Err(format!("expected an array of set members, got {}", other)),
    }
}

fn check_members(members: &[String], allowed: Option<&[String]>) -> Result<(), String> {
    let Some(allowed) = allowed else {
        return Ok(());
    };
    match members.iter().find(|m| !allowed.contains(m)) {
        Some(bad) => Err(format!("'{}' is not a member of the set", bad)),
        None => Ok(()),
    }
}

// timestamp

pub(crate) fn timestamp_to_view(value: Value, format: &str) -> Conversion {
    match value {
        Value::DateTime(v) => Ok(Value::DateTime(v)),
        Value::String(s) => parse_timestamp(s.trim(), format)
            .map(Value::DateTime)
            .map_err(|e| format!("'{}' does not match '{}': {}", s, format, e)),
        other => Err(unsupported("to a timestamp", &other)),
    }
}

/// Parse with `format`, which may name a date only; the time is then midnight.
fn parse_timestamp(text: &str, format: &str) -> chrono::ParseResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, format).or_else(|err| {
        NaiveDate::parse_from_str(text, format)
            .map(|date| date.and_time(NaiveTime::MIN))
            .map_err(|_| err)
    })
}

pub(crate) fn timestamp_to_store(value: Value, format: &str) -> Conversion {
    match timestamp_to_view(value, format)? {
        Value::DateTime(v) => Ok(Value::String(v.format(format).to_string())),
        other => Err(unsupported("to a stored timestamp", &other)),
    }
}
