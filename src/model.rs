use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub type NodeId = u64;
pub type EdgeId = u64;

pub const NULL_NODE_ID: NodeId = 0;
pub const NULL_EDGE_ID: EdgeId = 0;

/// Scalar property value. Untagged so WAL records and snapshots carry plain
/// JSON scalars; absent properties are represented by map lookup, not `Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

pub type Properties = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub properties: Properties,
    pub out_edges: Vec<EdgeId>,
    pub in_edges: Vec<EdgeId>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Node {
    pub fn new(id: NodeId, label: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id,
            label: label.into(),
            properties: Properties::new(),
            out_edges: Vec::new(),
            in_edges: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Sets a property and returns the previous value, if any.
    pub fn set_property(
        &mut self,
        key: impl Into<String>,
        value: PropertyValue,
    ) -> Option<PropertyValue> {
        let previous = self.properties.insert(key.into(), value);
        self.updated_at = now_millis();
        previous
    }

    pub fn add_out_edge(&mut self, edge_id: EdgeId) {
        self.out_edges.push(edge_id);
        self.updated_at = now_millis();
    }

    pub fn add_in_edge(&mut self, edge_id: EdgeId) {
        self.in_edges.push(edge_id);
        self.updated_at = now_millis();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub label: String,
    pub properties: Properties,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Edge {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId, label: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id,
            source,
            target,
            label: label.into(),
            properties: Properties::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn set_property(
        &mut self,
        key: impl Into<String>,
        value: PropertyValue,
    ) -> Option<PropertyValue> {
        let previous = self.properties.insert(key.into(), value);
        self.updated_at = now_millis();
        previous
    }
}

/// Wall-clock timestamp in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
