//! Physical operators selected by the planner.
//!
//! The plan is a linear pipeline: each operator transforms the list of
//! binding tables produced by its predecessor.

use crate::query::ast::{Direction, Expr, ReturnItem};

#[derive(Debug, Clone)]
pub struct PhysicalPlan {
    pub ops: Vec<PhysicalOp>,
}

#[derive(Debug, Clone)]
pub enum PhysicalOp {
    /// Emits one extended binding per node whose label matches (any label
    /// when `label` is empty).
    NodeScan {
        var: Option<String>,
        label: Option<String>,
    },
    /// Retains bindings whose predicate evaluates to boolean true.
    Filter { predicate: Expr },
    /// Follows one edge step from `source`, binding the opposite endpoint
    /// and, when named, the edge itself.
    Expand {
        source: String,
        target: Option<String>,
        edge: Option<String>,
        direction: Direction,
        edge_type: Option<String>,
    },
    /// Builds result rows from the binding tables.
    Project { items: Vec<ReturnItem> },
    /// Truncates rows and bindings to at most `count`.
    Limit { count: usize },
}
