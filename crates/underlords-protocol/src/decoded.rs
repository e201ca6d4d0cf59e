//! The normalized form of a decoded coordinator message.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A dynamically typed protobuf value after normalization.
///
/// 64-bit integers are kept as decimal strings so they survive a trip
/// through JSON. `Null` marks a field that was not on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Null,
    Bool(bool),
    /// 32-bit integers and enum numbers.
    Int(i64),
    Float(f64),
    /// Strings, and 64-bit integers in decimal form.
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Decoded>),
    Object(BTreeMap<String, Decoded>),
}

impl Decoded {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Field of an object; `None` for missing keys and non-objects.
    pub fn get(&self, key: &str) -> Option<&Decoded> {
        match self {
            Self::Object(fields) => fields.get(key),
            _ => None,
        }
    }

    /// Element of a list; `None` when out of range or not a list.
    pub fn index(&self, idx: usize) -> Option<&Decoded> {
        match self {
            Self::List(items) => items.get(idx),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Integer value, accepting the decimal-string form of 64-bit fields.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(n) => u64::try_from(*n).ok(),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Decoded]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Decoded>> {
        match self {
            Self::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Converts to a JSON value. Byte blobs become arrays of numbers.
    #[cfg(feature = "json")]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::from(*n),
            Self::Float(f) => Value::from(*f),
            Self::String(s) => Value::String(s.clone()),
            Self::Bytes(b) => Value::from(b.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Decoded {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Bytes(b) => {
                let mut seq = serializer.serialize_seq(Some(b.len()))?;
                for byte in b {
                    seq.serialize_element(byte)?;
                }
                seq.end()
            }
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}
