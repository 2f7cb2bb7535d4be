//! Bind values and write payloads.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

/// Column/value payload for INSERT and UPDATE.
///
/// Columns are kept sorted so every row of a multi-row insert lowers to the
/// same column list regardless of construction order.
pub type Record = BTreeMap<String, Value>;

/// A value bound to a `?` placeholder.
///
/// The numeric/opaque split only matters when rendering a statement for
/// display (see [`Value::is_numeric`]); execution always binds parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
}

impl Value {
    /// Whether this value is SQL `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value is rendered unquoted in a debug query string.
    ///
    /// Integers, floats and booleans are numeric. Text counts as numeric when
    /// its trimmed content parses as a finite number (`"42"`, `"-1.5e3"`).
    pub fn is_numeric(&self) -> bool {
        match self {
            Value::Int(_) | Value::Bool(_) => true,
            Value::Float(f) => f.is_finite(),
            Value::Text(s) => is_numeric_text(s),
            _ => false,
        }
    }

    /// Loose truthiness used for `exists` style results.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("f")),
            _ => true,
        }
    }

    /// Integer view of the value, if it has one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Borrow the text content, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Plain rendering used inside a debug query string (without quotes).
    pub fn display_text(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => {
                let mut out = String::with_capacity(b.len() * 2 + 2);
                out.push_str("\\x");
                for byte in b {
                    let _ = write!(out, "{byte:02x}");
                }
                out
            }
            Value::Timestamp(ts) => ts.to_rfc3339(),
            Value::Uuid(u) => u.to_string(),
            Value::Json(j) => j.to_string(),
        }
    }

    /// Type-tagged rendering that keeps `Int(1)` and `Text("1")` apart.
    pub(crate) fn write_fingerprint(&self, out: &mut String) {
        let tag = match self {
            Value::Null => 'n',
            Value::Bool(_) => 'b',
            Value::Int(_) => 'i',
            Value::Float(_) => 'f',
            Value::Text(_) => 't',
            Value::Bytes(_) => 'x',
            Value::Timestamp(_) => 'd',
            Value::Uuid(_) => 'u',
            Value::Json(_) => 'j',
        };
        out.push(tag);
        out.push(':');
        match self {
            Value::Float(f) => {
                let _ = write!(out, "{:016x}", f.to_bits());
            }
            other => out.push_str(&other.display_text()),
        }
    }
}

fn is_numeric_text(s: &str) -> bool {
    let t = s.trim();
    if t.is_empty() || !t.bytes().any(|b| b.is_ascii_digit()) {
        return false;
    }
    // Rust also accepts "inf"/"nan"; the digit check above already rules them out.
    t.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Build a [`Record`] from `column => value` pairs.
///
/// ```ignore
/// let rec = hookqb::record! { "name" => "alice", "age" => 30 };
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Record::new() };
    ($($col:expr => $val:expr),+ $(,)?) => {{
        let mut rec = $crate::Record::new();
        $( rec.insert(::std::string::String::from($col), $crate::Value::from($val)); )+
        rec
    }};
}
