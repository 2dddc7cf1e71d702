use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Declared storage type of a schema property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    String,
    Uint,
    Int,
    Float,
    Bool,
    /// Array of scalars. Only meaningful as a constraint value for
    /// `IN` / `NOT IN`; never a declared column type.
    Array,
}

/// A typed scalar (or array of scalars) flowing between callers, the
/// constraint engine, and materialized records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Uint(u32),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<Value>),
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::String(_) => TypeTag::String,
            Value::Uint(_) => TypeTag::Uint,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Bool(_) => TypeTag::Bool,
            Value::Array(_) => TypeTag::Array,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u32> {
        match self {
            Value::Uint(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert to the declared type of the property the value is compared
    /// against. Conversion failures are hard errors: zero is a legitimate
    /// domain value (tenant id 0, count 0) and must never stand in for a
    /// failed parse.
    pub fn coerce(self, target: TypeTag) -> Result<Value, Error> {
        match target {
            TypeTag::String => match self {
                Value::String(s) => Ok(Value::String(s)),
                Value::Uint(u) => Ok(Value::String(u.to_string())),
                Value::Int(i) => Ok(Value::String(i.to_string())),
                Value::Float(f) => Ok(Value::String(f.to_string())),
                Value::Bool(b) => Ok(Value::String(if b { "1" } else { "0" }.to_string())),
                Value::Array(_) => Err(Error::Conversion("array where string expected".into())),
            },
            TypeTag::Uint => match self {
                Value::Uint(u) => Ok(Value::Uint(u)),
                Value::Int(i) => u32::try_from(i)
                    .map(Value::Uint)
                    .map_err(|_| Error::Conversion(format!("{} out of unsigned range", i))),
                Value::Bool(b) => Ok(Value::Uint(b as u32)),
                Value::String(s) => parse_u32_prefixed(&s).map(Value::Uint),
                Value::Float(f) => Err(Error::Conversion(format!(
                    "refusing implicit float truncation: {}",
                    f
                ))),
                Value::Array(_) => Err(Error::Conversion("array where uint expected".into())),
            },
            TypeTag::Int => match self {
                Value::Int(i) => Ok(Value::Int(i)),
                Value::Uint(u) => Ok(Value::Int(u as i64)),
                Value::Bool(b) => Ok(Value::Int(b as i64)),
                Value::String(s) => parse_i64_prefixed(&s).map(Value::Int),
                Value::Float(f) => Err(Error::Conversion(format!(
                    "refusing implicit float truncation: {}",
                    f
                ))),
                Value::Array(_) => Err(Error::Conversion("array where int expected".into())),
            },
            TypeTag::Float => match self {
                Value::Float(f) => Ok(Value::Float(f)),
                Value::Uint(u) => Ok(Value::Float(u as f64)),
                Value::Int(i) => Ok(Value::Float(i as f64)),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| Error::Conversion(format!("not a float: {:?}", s))),
                Value::Bool(_) => Err(Error::Conversion("bool where float expected".into())),
                Value::Array(_) => Err(Error::Conversion("array where float expected".into())),
            },
            TypeTag::Bool => match self {
                Value::Bool(b) => Ok(Value::Bool(b)),
                Value::Uint(u) => Ok(Value::Bool(u != 0)),
                Value::Int(i) => Ok(Value::Bool(i != 0)),
                Value::String(s) => match s.trim() {
                    "0" => Ok(Value::Bool(false)),
                    "1" => Ok(Value::Bool(true)),
                    other if other.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                    other if other.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                    other => Err(Error::Conversion(format!("not a bool: {:?}", other))),
                },
                Value::Float(_) => Err(Error::Conversion("float where bool expected".into())),
                Value::Array(_) => Err(Error::Conversion("array where bool expected".into())),
            },
            TypeTag::Array => match self {
                Value::Array(items) => Ok(Value::Array(items)),
                other => Err(Error::Conversion(format!(
                    "{:?} where array expected",
                    other.type_tag()
                ))),
            },
        }
    }

    /// Decode a raw database cell into this declared type. NULL and the
    /// empty string become the type's zero value; anything else goes
    /// through the same strict conversion as caller-supplied values.
    pub fn decode_column(raw: Option<&str>, target: TypeTag) -> Result<Value, Error> {
        let raw = match raw {
            None | Some("") => return Ok(Value::zero(target)),
            Some(raw) => raw,
        };
        Value::String(raw.to_string()).coerce(target)
    }

    pub fn zero(target: TypeTag) -> Value {
        match target {
            TypeTag::String => Value::String(String::new()),
            TypeTag::Uint => Value::Uint(0),
            TypeTag::Int => Value::Int(0),
            TypeTag::Float => Value::Float(0.0),
            TypeTag::Bool => Value::Bool(false),
            TypeTag::Array => Value::Array(Vec::new()),
        }
    }

    /// Render as a safely quoted SQL literal. Strings go through `escape`
    /// and are single-quoted; numerics and booleans are formatted per type
    /// and never quoted. Arrays are handled by the IN code path, not here.
    pub fn sql_literal_with<F>(&self, escape: F) -> Result<String, Error>
    where
        F: Fn(&str) -> String,
    {
        match self {
            Value::String(s) => Ok(format!("'{}'", escape(s))),
            Value::Uint(u) => Ok(u.to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
            Value::Array(_) => Err(Error::ValueShape(
                "array literal outside IN / NOT IN".into(),
            )),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Uint(u) => write!(f, "{}", u),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", if *b { "1" } else { "0" }),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<u32> for Value {
    fn from(u: u32) -> Self {
        Value::Uint(u)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

/// MySQL-style string escaping. Used by the mock/test driver and as the
/// default for adapters that have no server-side escape call.
pub fn escape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            other => out.push(other),
        }
    }
    out
}

/// Unsigned parse with legacy base prefixes: `0x` hex, leading-zero octal,
/// decimal otherwise.
fn parse_u32_prefixed(s: &str) -> Result<u32, Error> {
    let t = s.trim();
    let t = t.strip_prefix('+').unwrap_or(t);
    let parsed = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else if t.len() > 1 && t.starts_with('0') {
        u32::from_str_radix(&t[1..], 8)
    } else {
        t.parse::<u32>()
    };
    parsed.map_err(|_| Error::Conversion(format!("not an unsigned integer: {:?}", s)))
}

fn parse_i64_prefixed(s: &str) -> Result<i64, Error> {
    let t = s.trim();
    let (negative, t) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let magnitude = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if t.len() > 1 && t.starts_with('0') {
        i64::from_str_radix(&t[1..], 8)
    } else {
        t.parse::<i64>()
    };
    magnitude
        .map(|m| if negative { -m } else { m })
        .map_err(|_| Error::Conversion(format!("not an integer: {:?}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_string_to_uint() {
        assert_eq!(
            Value::from("42").coerce(TypeTag::Uint).unwrap(),
            Value::Uint(42)
        );
        assert_eq!(
            Value::from("0x1A").coerce(TypeTag::Uint).unwrap(),
            Value::Uint(26)
        );
        assert_eq!(
            Value::from("017").coerce(TypeTag::Uint).unwrap(),
            Value::Uint(15)
        );
        assert_eq!(
            Value::from("0").coerce(TypeTag::Uint).unwrap(),
            Value::Uint(0)
        );
    }

    #[test]
    fn garbage_string_is_not_zero() {
        assert!(Value::from("twelve").coerce(TypeTag::Uint).is_err());
        assert!(Value::from("-1").coerce(TypeTag::Uint).is_err());
        assert!(Value::from("nan?").coerce(TypeTag::Float).is_err());
    }

    #[test]
    fn float_never_truncates_to_int() {
        assert!(Value::Float(1.5).coerce(TypeTag::Uint).is_err());
        assert!(Value::Float(2.0).coerce(TypeTag::Int).is_err());
    }

    #[test]
    fn null_column_decodes_to_zero_value() {
        assert_eq!(
            Value::decode_column(None, TypeTag::Uint).unwrap(),
            Value::Uint(0)
        );
        assert_eq!(
            Value::decode_column(Some(""), TypeTag::String).unwrap(),
            Value::String(String::new())
        );
        assert_eq!(
            Value::decode_column(Some("7"), TypeTag::Int).unwrap(),
            Value::Int(7)
        );
    }

    #[test]
    fn string_literal_is_escaped_and_quoted() {
        let lit = Value::from("o'hara").sql_literal_with(escape_string).unwrap();
        assert_eq!(lit, "'o\\'hara'");
        let num = Value::Uint(9).sql_literal_with(escape_string).unwrap();
        assert_eq!(num, "9");
    }
}
