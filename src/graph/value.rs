//! Property values carried by edge payloads and variable bindings.
//!
//! Payloads are opaque records; the only introspection the engine needs is
//! name-based field access, expressed by the [`Fields`] trait.
//!
//! Equality and hashing on [`PropValue`] are numeric-aware: `Int(1)` and
//! `Float(1.0)` are the same value. Numbers are compared as `f64` under a
//! total order, so `NaN` equals itself and `-0.0` differs from `0.0`.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::graph::edge::Edge;
use crate::location::NodeLocation;

/// Name-based field lookup over a structured value.
pub trait Fields {
    /// Returns the value of field `name`, or `None` when the field is absent.
    fn field(&self, name: &str) -> Option<PropValue>;
}

/// Typed value tagged with explicit type information so the wire format
/// remains unambiguous.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum PropValue {
    /// Absent value.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Arbitrary binary payload.
    Bytes(Vec<u8>),
    /// Reference to a node by location.
    Location(NodeLocation),
    /// Nested record.
    Record(Record),
    /// A traversed edge, as bound by a pattern capture.
    Edge(Box<Edge>),
}

impl PropValue {
    /// Returns `true` for [`PropValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Null)
    }

    /// Numeric view of the value, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Int(v) => Some(*v as f64),
            PropValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropValue::Null => "null",
            PropValue::Bool(_) => "bool",
            PropValue::Int(_) => "int",
            PropValue::Float(_) => "float",
            PropValue::String(_) => "string",
            PropValue::Bytes(_) => "bytes",
            PropValue::Location(_) => "location",
            PropValue::Record(_) => "record",
            PropValue::Edge(_) => "edge",
        }
    }

    /// Converts into a plain JSON value for display.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            PropValue::Null => Json::Null,
            PropValue::Bool(b) => Json::Bool(*b),
            PropValue::Int(i) => Json::from(*i),
            PropValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            PropValue::String(s) => Json::String(s.clone()),
            PropValue::Bytes(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
            PropValue::Location(loc) => Json::String(loc.to_string()),
            PropValue::Record(record) => record.to_json(),
            PropValue::Edge(edge) => serde_json::json!({
                "target": edge.target.to_string(),
                "payload": edge.payload.to_json(),
            }),
        }
    }
}

/// Canonical bit pattern used for numeric equality and hashing.
fn numeric_key(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return numeric_key(a) == numeric_key(b);
        }
        match (self, other) {
            (PropValue::Null, PropValue::Null) => true,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::String(a), PropValue::String(b)) => a == b,
            (PropValue::Bytes(a), PropValue::Bytes(b)) => a == b,
            (PropValue::Location(a), PropValue::Location(b)) => a == b,
            (PropValue::Record(a), PropValue::Record(b)) => a == b,
            (PropValue::Edge(a), PropValue::Edge(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PropValue {}

impl Hash for PropValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            PropValue::Int(_) | PropValue::Float(_) => {
                state.write_u8(1);
                state.write_u64(numeric_key(self.as_f64().unwrap_or_default()));
            }
            PropValue::Null => state.write_u8(0),
            PropValue::Bool(b) => {
                state.write_u8(2);
                b.hash(state);
            }
            PropValue::String(s) => {
                state.write_u8(3);
                s.hash(state);
            }
            PropValue::Bytes(bytes) => {
                state.write_u8(4);
                bytes.hash(state);
            }
            PropValue::Location(loc) => {
                state.write_u8(5);
                loc.hash(state);
            }
            PropValue::Record(record) => {
                state.write_u8(6);
                record.hash(state);
            }
            PropValue::Edge(edge) => {
                state.write_u8(7);
                edge.hash(state);
            }
        }
    }
}

impl Fields for PropValue {
    fn field(&self, name: &str) -> Option<PropValue> {
        match self {
            PropValue::Record(record) => record.field(name),
            PropValue::Edge(edge) => edge.field(name),
            PropValue::Location(loc) => loc.field(name),
            _ => None,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => f.write_str("null"),
            PropValue::Bool(b) => write!(f, "{b}"),
            PropValue::Int(i) => write!(f, "{i}"),
            PropValue::Float(v) => write!(f, "{v}"),
            PropValue::String(s) => write!(f, "{s:?}"),
            PropValue::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            PropValue::Location(loc) => write!(f, "@{loc}"),
            PropValue::Record(record) => write!(f, "{record}"),
            PropValue::Edge(edge) => write!(f, "-> {} {}", edge.target, edge.payload),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::String(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::String(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<NodeLocation> for PropValue {
    fn from(value: NodeLocation) -> Self {
        PropValue::Location(value)
    }
}

impl From<Record> for PropValue {
    fn from(value: Record) -> Self {
        PropValue::Record(value)
    }
}

impl From<Edge> for PropValue {
    fn from(value: Edge) -> Self {
        PropValue::Edge(Box::new(value))
    }
}

impl TryFrom<serde_json::Value> for PropValue {
    type Error = GraphError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        use serde_json::Value as Json;
        Ok(match value {
            Json::Null => PropValue::Null,
            Json::Bool(b) => PropValue::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => PropValue::Int(i),
                None => PropValue::Float(n.as_f64().ok_or_else(|| {
                    GraphError::InvalidArgument(format!("number {n} is out of range"))
                })?),
            },
            Json::String(s) => PropValue::String(s),
            Json::Object(map) => {
                let mut record = Record::new();
                for (key, value) in map {
                    record.insert(key, PropValue::try_from(value)?);
                }
                PropValue::Record(record)
            }
            Json::Array(_) => {
                return Err(GraphError::InvalidArgument(
                    "arrays are not supported as property values".into(),
                ))
            }
        })
    }
}

/// Ordered field-name → value map used as an edge payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, PropValue>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts or replaces a field, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Option<PropValue> {
        self.fields.insert(name.into(), value.into())
    }

    /// Borrows a field value.
    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.fields.get(name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` when the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl Fields for Record {
    fn field(&self, name: &str) -> Option<PropValue> {
        self.fields.get(name).cloned()
    }
}

impl Fields for NodeLocation {
    fn field(&self, name: &str) -> Option<PropValue> {
        match name {
            "service" => Some(PropValue::from(self.service())),
            "client" => Some(PropValue::from(self.client())),
            "node" => Some(PropValue::from(self.node())),
            _ => None,
        }
    }
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (name, value)) in self.fields.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &PropValue) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn ints_and_floats_compare_numerically() {
        assert_eq!(PropValue::Int(1), PropValue::Float(1.0));
        assert_eq!(hash_of(&PropValue::Int(1)), hash_of(&PropValue::Float(1.0)));
        assert_ne!(PropValue::Int(1), PropValue::Float(1.5));
        assert_ne!(PropValue::Int(1), PropValue::from("1"));
        assert_eq!(PropValue::Float(f64::NAN), PropValue::Float(f64::NAN));
    }

    #[test]
    fn location_exposes_its_parts_as_fields() {
        let loc = NodeLocation::new("S1", "c", "A");
        assert_eq!(loc.field("service"), Some(PropValue::from("S1")));
        assert_eq!(loc.field("node"), Some(PropValue::from("A")));
        assert_eq!(loc.field("weight"), None);
    }

    #[test]
    fn json_conversion_keeps_integer_and_record_shape() {
        let value = PropValue::try_from(serde_json::json!({"w": 5, "r": 0.5, "name": "x"}))
            .expect("convert");
        let PropValue::Record(record) = &value else {
            panic!("expected record, got {value:?}");
        };
        assert_eq!(record.get("w"), Some(&PropValue::Int(5)));
        assert_eq!(record.get("r"), Some(&PropValue::Float(0.5)));
        assert_eq!(value.to_json(), serde_json::json!({"w": 5, "r": 0.5, "name": "x"}));
        assert!(PropValue::try_from(serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn record_display_is_ordered() {
        let record = Record::new().with("b", 2i64).with("a", "x");
        assert_eq!(record.to_string(), "{a=\"x\", b=2}");
    }
}
