//! Textual value serializer
//!
//! Values cross the channel as JSON. Object references and other
//! non-plain-JSON shapes are encoded as tagged objects:
//!
//! ```text
//! {"__type__": "Pair-Ref", "id": "Counter1"}
//! ```
//!
//! Decoding runs the tag through a reviver registry. The `Pair-Ref`
//! reviver is registered by the sync layer and resolves ids against the
//! instance registry; a tag with no registered reviver is left as a plain
//! map. A reviver returning None yields a null tombstone (the referenced
//! object was collected).

use std::collections::{BTreeMap, HashMap};

use serde_json::json;
use tether_core::{InstanceId, TetherError, TetherResult, Value};

/// Type tag marking a pair reference on the wire
pub const PAIR_REF_TAG: &str = "Pair-Ref";

/// Key carrying the type tag inside an encoded object
pub const TYPE_KEY: &str = "__type__";

/// Reviver callback: receives the decoded fields of a tagged object
/// (minus the tag itself) and produces the revived value, or None for a
/// tombstone.
pub type Reviver = Box<dyn Fn(&BTreeMap<String, Value>) -> Option<Value> + Send + Sync>;

/// Value serializer with an extensible reviver registry
#[derive(Default)]
pub struct Serializer {
    revivers: HashMap<String, Reviver>,
}

impl Serializer {
    pub fn new() -> Self {
        Serializer::default()
    }

    /// Register a reviver for a type tag. A later registration under the
    /// same tag replaces the earlier one.
    pub fn add_reviver(
        &mut self,
        tag: impl Into<String>,
        reviver: impl Fn(&BTreeMap<String, Value>) -> Option<Value> + Send + Sync + 'static,
    ) {
        self.revivers.insert(tag.into(), Box::new(reviver));
    }

    /// Encode a value to wire text. Total: every `Value` has an encoding
    /// (non-finite floats degrade to null, which is what JSON offers).
    pub fn encode(&self, value: &Value) -> String {
        to_json(value).to_string()
    }

    /// Decode wire text to a value, running tagged objects through the
    /// reviver registry. Malformed text surfaces as `TetherError::Decode`.
    pub fn decode(&self, text: &str) -> TetherResult<Value> {
        let raw: serde_json::Value =
            serde_json::from_str(text).map_err(|e| TetherError::Decode(e.to_string()))?;
        Ok(self.from_json(&raw))
    }

    fn from_json(&self, raw: &serde_json::Value) -> Value {
        match raw {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(|v| self.from_json(v)).collect())
            }
            serde_json::Value::Object(entries) => {
                let tag = entries.get(TYPE_KEY).and_then(|t| t.as_str());
                let fields: BTreeMap<String, Value> = entries
                    .iter()
                    .filter(|(k, _)| k.as_str() != TYPE_KEY)
                    .map(|(k, v)| (k.clone(), self.from_json(v)))
                    .collect();

                if let Some(tag) = tag {
                    if let Some(reviver) = self.revivers.get(tag) {
                        return reviver(&fields).unwrap_or(Value::Null);
                    }
                }
                // No tag, or no reviver registered for it: plain map. The
                // tag key survives so the shape is not silently lossy.
                let mut map = fields;
                if let Some(tag) = tag {
                    map.insert(TYPE_KEY.to_owned(), Value::Str(tag.to_owned()));
                }
                Value::Map(map)
            }
        }
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(n) => json!(n),
        Value::Float(x) => serde_json::Number::from_f64(*x)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => json!(s),
        Value::List(items) => {
            serde_json::Value::Array(items.iter().map(to_json).collect())
        }
        Value::Map(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
        Value::PairRef(id) => json!({ TYPE_KEY: PAIR_REF_TAG, "id": id.as_str() }),
    }
}

/// Read the instance id out of a decoded `Pair-Ref` field map.
pub fn pair_ref_id(fields: &BTreeMap<String, Value>) -> Option<InstanceId> {
    match fields.get("id") {
        Some(Value::Str(id)) => Some(InstanceId::from_wire(id.as_str())),
        _ => None,
    }
}
