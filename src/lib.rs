#![forbid(unsafe_code)]

pub mod algorithms;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod query;
pub mod storage;
pub mod wal;

pub use crate::db::{Config, GraphDB};
pub use crate::error::{GraphError, Result};
pub use crate::model::{Edge, EdgeId, Node, NodeId, Properties, PropertyValue};
pub use crate::query::{ResultSet, Row, Value};
pub use crate::storage::Graph;
