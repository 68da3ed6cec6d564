//! Literal quoting and diagnostic SQL reconstruction.
//!
//! The reconstructed SQL is only ever written to logs. It is meant to be readable,
//! it is never sent to a server.

use super::placeholder::{Segment, scan};
use super::types::Backend;
use crate::models::{DATETIME_FORMAT, Parameters, Value};
use std::fmt::Write as _;

/// Quote a value as a MySQL literal (backslash escapes).
pub fn quote_mysql(value: &Value) -> String {
    match value {
        Value::String(s) => mysql_string(s),
        Value::Json(v) => mysql_string(&v.to_string()),
        other => quote_common(other),
    }
}

/// Quote a value as an ANSI/SQLite literal (doubled single quotes).
pub fn quote_ansi(value: &Value) -> String {
    match value {
        Value::String(s) => ansi_string(s),
        Value::Json(v) => ansi_string(&v.to_string()),
        other => quote_common(other),
    }
}

fn quote_common(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(v) => if *v { "1" } else { "0" }.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Bytes(v) => hex_literal(v),
        Value::DateTime(v) => format!("'{}'", v.format(DATETIME_FORMAT)),
        Value::String(s) => ansi_string(s),
        Value::Json(v) => ansi_string(&v.to_string()),
    }
}

fn mysql_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn ansi_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn hex_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 3);
    out.push_str("X'");
    for b in bytes {
        let _ = write!(out, "{:02X}", b);
    }
    out.push('\'');
    out
}

/// Append `text` with every whitespace run folded into one space. Leading
/// whitespace is dropped while `out` is still empty.
fn push_collapsed(out: &mut String, text: &str) {
    for c in text.chars() {
        if c.is_whitespace() {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
    }
}

/// Human-readable SQL with each `:name` replaced by the quoted literal of its value.
///
/// Whitespace runs collapse to one space and line comments are dropped, so the
/// result fits on one log line. Substitution is position-aware: names are matched
/// as whole tokens, so one name being a prefix of another cannot corrupt the
/// output. Placeholders without a value are left as written.
pub fn compile_sql(
    statement: &str,
    backend: Backend,
    parameters: &Parameters,
    quote: impl Fn(&Value) -> String,
) -> String {
    let mut out = String::with_capacity(statement.len());
    for segment in scan(statement, backend) {
        match segment {
            Segment::Text(text) | Segment::BlockComment(text) => push_collapsed(&mut out, text),
            Segment::LineComment(_) => push_collapsed(&mut out, " "),
            Segment::Placeholder(name) => match parameters.get(name) {
                Some(value) => out.push_str(&quote(value)),
                None => {
                    out.push(':');
                    out.push_str(name);
                }
            },
        }
    }
    out.truncate(out.trim_end().len());
    out
}
