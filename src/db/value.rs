//! Parameter and column values.
//!
//! [`Value`] is used both for bound statement parameters and for decoded
//! result columns. The legacy type-code strings (`"sid"`) are accepted through
//! [`bind_type_codes`], which turns them into a typed parameter list.

use crate::error::{DatabaseError, DbResult};
use serde::{Deserialize, Serialize};

/// A single SQL value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// NULL value
    Null,
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    Float(f64),
    Text(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            Self::Text(v) => Some(v.as_bytes()),
            _ => None,
        }
    }

    /// Coerce this value to the type named by a legacy type code.
    ///
    /// `s` string, `i` integer, `d` double, `b` blob. NULL passes through
    /// every code unchanged.
    pub fn coerce(self, code: char) -> DbResult<Value> {
        if self.is_null() {
            return Ok(self);
        }
        match code {
            's' => Ok(match self {
                Self::Text(v) => Self::Text(v),
                Self::Bool(v) => Self::Text((v as i64).to_string()),
                Self::Int(v) => Self::Text(v.to_string()),
                Self::Float(v) => Self::Text(v.to_string()),
                Self::Bytes(v) => Self::Text(
                    String::from_utf8(v)
                        .map_err(|_| coerce_error(code, "bytes that are not valid UTF-8"))?,
                ),
                Self::Null => Self::Null,
            }),
            'i' => match self {
                Self::Int(v) => Ok(Self::Int(v)),
                Self::Bool(v) => Ok(Self::Int(v as i64)),
                Self::Float(v) if v.fract() == 0.0 => Ok(Self::Int(v as i64)),
                Self::Text(ref v) => v
                    .trim()
                    .parse::<i64>()
                    .map(Self::Int)
                    .map_err(|_| coerce_error(code, &format!("'{}'", v))),
                other => Err(coerce_error(code, other.type_name())),
            },
            'd' => match self {
                Self::Float(v) => Ok(Self::Float(v)),
                Self::Int(v) => Ok(Self::Float(v as f64)),
                Self::Text(ref v) => v
                    .trim()
                    .parse::<f64>()
                    .map(Self::Float)
                    .map_err(|_| coerce_error(code, &format!("'{}'", v))),
                other => Err(coerce_error(code, other.type_name())),
            },
            'b' => match self {
                Self::Bytes(v) => Ok(Self::Bytes(v)),
                Self::Text(v) => Ok(Self::Bytes(v.into_bytes())),
                other => Err(coerce_error(code, other.type_name())),
            },
            other => Err(DatabaseError::invalid_parameters(format!(
                "unknown type code '{}'",
                other
            ))),
        }
    }
}

fn coerce_error(code: char, found: &str) -> DatabaseError {
    DatabaseError::invalid_parameters(format!(
        "cannot bind {} with type code '{}'",
        found, code
    ))
}

/// Turn a legacy type-code string plus raw values into a typed parameter list.
///
/// The string must hold exactly one code per parameter.
pub fn bind_type_codes(types: &str, params: Vec<Value>) -> DbResult<Vec<Value>> {
    let codes: Vec<char> = types.chars().collect();
    if codes.len() != params.len() {
        return Err(DatabaseError::invalid_parameters(format!(
            "type string '{}' has {} codes but {} parameters were given",
            types,
            codes.len(),
            params.len()
        )));
    }
    codes
        .into_iter()
        .zip(params)
        .map(|(code, value)| value.coerce(code))
        .collect()
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_types() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(true).is_null());
        assert_eq!(Value::Int(42).type_name(), "int");
        assert_eq!(Value::from("hello").type_name(), "string");
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(7)), Value::Int(7));
    }

    #[test]
    fn test_bind_type_codes_coerces() {
        let params = bind_type_codes("si", vec!["Jane Doe".into(), "1".into()]).unwrap();
        assert_eq!(params, vec![Value::Text("Jane Doe".to_string()), Value::Int(1)]);

        let params = bind_type_codes("dsb", vec![3.into(), 12.into(), "raw".into()]).unwrap();
        assert_eq!(
            params,
            vec![
                Value::Float(3.0),
                Value::Text("12".to_string()),
                Value::Bytes(b"raw".to_vec())
            ]
        );
    }

    #[test]
    fn test_bind_type_codes_keeps_null() {
        let params = bind_type_codes("i", vec![Value::Null]).unwrap();
        assert_eq!(params, vec![Value::Null]);
    }

    #[test]
    fn test_bind_type_codes_length_mismatch() {
        let err = bind_type_codes("s", vec!["a".into(), "b".into()]).unwrap_err();
        assert!(err.to_string().contains("has 1 codes but 2 parameters"));
    }

    #[test]
    fn test_bind_type_codes_rejects_bad_input() {
        let err = bind_type_codes("x", vec!["a".into()]).unwrap_err();
        assert!(err.to_string().contains("unknown type code 'x'"));

        let err = bind_type_codes("i", vec!["twelve".into()]).unwrap_err();
        assert!(err.to_string().contains("'twelve'"));

        let err = bind_type_codes("i", vec![Value::Float(1.5)]).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidParameters { .. }));
    }

    #[test]
    fn test_bytes_serialize_as_base64() {
        let json = serde_json::to_value(Value::Bytes(b"hello world".to_vec())).unwrap();
        assert_eq!(json, serde_json::json!("aGVsbG8gd29ybGQ="));

        let json = serde_json::to_value(vec![Value::Null, Value::Int(1), "x".into()]).unwrap();
        assert_eq!(json, serde_json::json!([null, 1, "x"]));
    }
}
