//! The wire-expressible value domain
//!
//! Signal values are drawn from a closed set of shapes that the textual
//! serializer can carry, plus `PairRef` for references to other pair
//! instances. A `PairRef` crosses the wire as `{"__type__": "Pair-Ref",
//! "id": <id>}` and is revived against the instance registry on arrival.

use std::collections::BTreeMap;
use std::fmt;

use crate::InstanceId;

/// A signal value
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Reference to another pair instance, by id
    PairRef(InstanceId),
}

impl Value {
    /// Is this the null value?
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Extract the referenced instance id, if this is a pair reference.
    pub fn as_pair_ref(&self) -> Option<&InstanceId> {
        match self {
            Value::PairRef(id) => Some(id),
            _ => None,
        }
    }

    /// Does any part of this value reference a pair instance?
    pub fn contains_pair_ref(&self) -> bool {
        match self {
            Value::PairRef(_) => true,
            Value::List(items) => items.iter().any(Value::contains_pair_ref),
            Value::Map(entries) => entries.values().any(Value::contains_pair_ref),
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: {value}")?;
                }
                f.write_str("}")
            }
            Value::PairRef(id) => write!(f, "<{id}>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}
