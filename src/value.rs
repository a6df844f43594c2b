//! The value system (spec §3, §4.A).
//!
//! Polymorphism without inheritance: the teacher's `Value` enum
//! (`examples/georgebarwood-RustDB/src/value.rs`) is a tagged union matched
//! on for every operation (`compare`, `str`, `bin`, ...); this is the same
//! shape, narrowed to the five variants the spec names and with
//! cross-numeric ordering instead of the teacher's same-variant-only `cmp`.

use crate::status::{KdbResult, Status};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The declared type of a column, field, or value slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Integer,
    Float,
    String,
    Boolean,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Null => "Null",
            DataType::Integer => "Integer",
            DataType::Float => "Float",
            DataType::String => "String",
            DataType::Boolean => "Boolean",
        };
        f.write_str(s)
    }
}

/// A tagged-union value: `{Null | Integer(i64) | Float(f64) | String | Boolean}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
}

impl Value {
    pub fn null() -> Value {
        Value::Null
    }

    pub fn integer(v: i64) -> Value {
        Value::Integer(v)
    }

    pub fn float(v: f64) -> Value {
        Value::Float(v)
    }

    pub fn string(v: impl Into<String>) -> Value {
        Value::String(v.into())
    }

    pub fn boolean(v: bool) -> Value {
        Value::Boolean(v)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::String(_) => DataType::String,
            Value::Boolean(_) => DataType::Boolean,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Debug rendering (quoted strings); NOT what `serialize::json` emits for
    /// a value payload, only for logging / `Display`.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::String(s) => format!("\"{}\"", s.replace('"', "\\\"")),
            Value::Boolean(b) => b.to_string(),
        }
    }

    /// Typed conversion: `Boolean` widens to int/float; `Integer`/`Float`
    /// widen to each other; anything else is a `TypeError` (InvalidArgument).
    pub fn as_int(&self) -> KdbResult<i64> {
        match self {
            Value::Integer(i) => Ok(*i),
            Value::Float(f) => Ok(*f as i64),
            Value::Boolean(b) => Ok(if *b { 1 } else { 0 }),
            other => Err(type_error("Integer", other)),
        }
    }

    pub fn as_float(&self) -> KdbResult<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            other => Err(type_error("Float", other)),
        }
    }

    pub fn as_bool(&self) -> KdbResult<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::Integer(i) => Ok(*i != 0),
            Value::Float(f) => Ok(*f != 0.0),
            other => Err(type_error("Boolean", other)),
        }
    }

    pub fn as_string(&self) -> KdbResult<String> {
        match self {
            Value::String(s) => Ok(s.clone()),
            other => Err(type_error("String", other)),
        }
    }

    /// `toString` per spec §4.A: used for hashing/uniqueness and display,
    /// never for the serialized JSON value payload.
    pub fn to_string_form(&self) -> String {
        match self {
            Value::Null => "<null>".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::String(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
        }
    }

    /// Equality with the cross-numeric rule from `compare`.
    pub fn values_equal(&self, other: &Value) -> bool {
        self.compare(other) == Ordering::Equal
    }

    /// Total ordering: numeric within Integer/Float (cross-compared as
    /// f64), Null strictly below every non-null value, otherwise by type
    /// ordinal. String comparison is byte-wise on UTF-8.
    pub fn compare(&self, other: &Value) -> Ordering {
        use Value::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Integer(a), Float(b)) => (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal),
            (Float(a), Integer(b)) => a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal),
            (String(a), String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Boolean(a), Boolean(b)) => a.cmp(b),
            _ => type_ordinal(self).cmp(&type_ordinal(other)),
        }
    }
}

/// Ordinal used to order values across unrelated types. Null is handled
/// separately (always least) so it is excluded here.
fn type_ordinal(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Integer(_) => 1,
        Value::Float(_) => 1,
        Value::String(_) => 2,
        Value::Boolean(_) => 3,
    }
}

fn type_error(wanted: &str, got: &Value) -> Status {
    Status::invalid_argument(format!(
        "TypeError: cannot convert {} to {}",
        got.data_type(),
        wanted
    ))
}

/// `Float::to_string` uses up to 15 significant digits (spec §4.A).
fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    format_sig(f, 15)
}

fn format_sig(f: f64, sig: usize) -> String {
    if f == 0.0 {
        return "0".to_string();
    }
    let s = format!("{:.*e}", sig - 1, f);
    // Rust's {:e} gives e.g. "1.234500000000000e2"; convert to plain
    // decimal form when the exponent is in a reasonable printable range,
    // else keep scientific notation.
    if let Some(epos) = s.find('e') {
        let exp: i32 = s[epos + 1..].parse().unwrap_or(0);
        let mantissa = s[..epos].to_string();
        if (-4..21).contains(&exp) {
            trim_trailing_zeros(&sci_to_plain(&mantissa, exp))
        } else {
            format!("{}e{}", trim_trailing_zeros(&mantissa), exp)
        }
    } else {
        trim_trailing_zeros(&s)
    }
}

fn sci_to_plain(mantissa: &str, exp: i32) -> String {
    let neg = mantissa.starts_with('-');
    let mantissa = mantissa.trim_start_matches('-');
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits: String = format!("{}{}", int_part, frac_part);
    let point = int_part.len() as i32 + exp;
    let mut out = String::new();
    if neg {
        out.push('-');
    }
    if point <= 0 {
        out.push_str("0.");
        for _ in 0..(-point) {
            out.push('0');
        }
        out.push_str(&digits);
    } else if (point as usize) >= digits.len() {
        out.push_str(&digits);
        for _ in 0..(point as usize - digits.len()) {
            out.push('0');
        }
    } else {
        out.push_str(&digits[..point as usize]);
        out.push('.');
        out.push_str(&digits[point as usize..]);
    }
    out
}

fn trim_trailing_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    let s = s.trim_end_matches('0');
    let s = s.trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.values_equal(other)
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_form())
    }
}
