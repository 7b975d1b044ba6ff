//! Abstract syntax tree produced by the parser.

use std::collections::BTreeMap;
use std::fmt;

use crate::model::PropertyValue;

/// Complete query: `MATCH ... WHERE ... RETURN ... ORDER BY ... LIMIT ...`.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub match_clause: Option<MatchClause>,
    pub where_clause: Option<WhereClause>,
    pub return_clause: Option<ReturnClause>,
    /// Parsed but not planned; kept for a future executor stage.
    pub order_by: Option<OrderByClause>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct MatchClause {
    pub patterns: Vec<Pattern>,
}

/// An alternating node-edge-node chain like `(a)-[r:KNOWS]->(b)`.
/// `edges.len()` is always `nodes.len() - 1`.
#[derive(Debug, Clone, Default)]
pub struct Pattern {
    pub nodes: Vec<NodePattern>,
    pub edges: Vec<EdgePattern>,
}

#[derive(Debug, Clone, Default)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub label: Option<String>,
    /// Inline equality constraints: `(n {name: "Alice"})`.
    pub properties: BTreeMap<String, PropertyValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
    Both,
}

#[derive(Debug, Clone)]
pub struct EdgePattern {
    pub variable: Option<String>,
    pub edge_type: Option<String>,
    pub direction: Direction,
}

#[derive(Debug, Clone)]
pub struct WhereClause {
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(PropertyValue),
    Identifier(String),
    PropertyAccess { variable: String, property: String },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub struct ReturnClause {
    pub items: Vec<ReturnItem>,
    /// Reserved; never set by the parser and never executed.
    pub distinct: bool,
}

#[derive(Debug, Clone)]
pub struct ReturnItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrderByClause {
    pub fields: Vec<OrderByField>,
}

#[derive(Debug, Clone)]
pub struct OrderByField {
    pub expr: Expr,
    pub descending: bool,
}
