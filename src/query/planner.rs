//! Lowers a parsed query into the linear operator pipeline.
//!
//! Only the first pattern of a MATCH clause is planned; additional patterns
//! and ORDER BY are accepted by the parser but not translated.

use crate::error::{GraphError, Result};
use crate::query::ast::{BinaryOp, Expr, NodePattern, Query};
use crate::query::physical::{PhysicalOp, PhysicalPlan};

pub fn plan(query: &Query) -> Result<PhysicalPlan> {
    let match_clause = query
        .match_clause
        .as_ref()
        .ok_or_else(|| GraphError::InvalidArgument("MATCH clause is required".into()))?;

    let mut ops = Vec::new();

    if let Some(pattern) = match_clause.patterns.first() {
        if let Some(start) = pattern.nodes.first() {
            ops.push(PhysicalOp::NodeScan {
                var: start.variable.clone(),
                label: start.label.clone(),
            });
            push_property_filters(&mut ops, start)?;
        }

        for (i, edge) in pattern.edges.iter().enumerate() {
            let target = &pattern.nodes[i + 1];
            let source = pattern.nodes[i].variable.clone().ok_or_else(|| {
                GraphError::InvalidArgument("expand requires a named source node".into())
            })?;

            ops.push(PhysicalOp::Expand {
                source,
                target: target.variable.clone(),
                edge: edge.variable.clone(),
                direction: edge.direction,
                edge_type: edge.edge_type.clone(),
            });
            push_property_filters(&mut ops, target)?;
        }
    }

    if let Some(where_clause) = &query.where_clause {
        ops.push(PhysicalOp::Filter {
            predicate: where_clause.expr.clone(),
        });
    }

    if let Some(return_clause) = &query.return_clause {
        ops.push(PhysicalOp::Project {
            items: return_clause.items.clone(),
        });
    }

    if let Some(limit) = query.limit {
        ops.push(PhysicalOp::Limit { count: limit });
    }

    Ok(PhysicalPlan { ops })
}

/// Inline properties become equality filters right after the operator that
/// bound the variable.
fn push_property_filters(ops: &mut Vec<PhysicalOp>, node: &NodePattern) -> Result<()> {
    if node.properties.is_empty() {
        return Ok(());
    }
    let variable = node.variable.clone().ok_or_else(|| {
        GraphError::InvalidArgument("inline properties require a named variable".into())
    })?;

    for (key, value) in &node.properties {
        ops.push(PhysicalOp::Filter {
            predicate: Expr::Binary {
                left: Box::new(Expr::PropertyAccess {
                    variable: variable.clone(),
                    property: key.clone(),
                }),
                op: BinaryOp::Equal,
                right: Box::new(Expr::Literal(value.clone())),
            },
        });
    }
    Ok(())
}
