//! Runtime value flowing through binding tables and result rows.

use serde::Serialize;

use crate::model::{Edge, Node, PropertyValue};

/// Tagged union over everything a query variable can be bound to: a scalar,
/// a node, or an edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Node(Node),
    Edge(Edge),
}

impl Value {
    /// Numeric coercion for ordered comparisons; non-numeric values coerce
    /// to 0.0.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            _ => 0.0,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Node(_) => "node",
            Value::Edge(_) => "edge",
        }
    }
}

impl From<PropertyValue> for Value {
    fn from(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Null => Value::Null,
            PropertyValue::Bool(b) => Value::Bool(b),
            PropertyValue::Int(i) => Value::Int(i),
            PropertyValue::Float(f) => Value::Float(f),
            PropertyValue::String(s) => Value::String(s),
        }
    }
}

impl From<&PropertyValue> for Value {
    fn from(value: &PropertyValue) -> Self {
        value.clone().into()
    }
}
