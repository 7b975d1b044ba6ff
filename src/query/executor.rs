//! Binding-table pipeline execution.
//!
//! The context carries a list of binding tables threaded through the
//! operators, starting from a single empty table. Once an operator yields
//! zero bindings the rest of the pipeline is skipped.

use std::collections::{BTreeMap, HashMap};

use crate::error::{GraphError, Result};
use crate::query::ast::{BinaryOp, Direction, Expr, Query, ReturnItem};
use crate::query::physical::{PhysicalOp, PhysicalPlan};
use crate::query::planner;
use crate::query::value::Value;
use crate::storage::Graph;

/// Mapping from pattern variable to bound value.
pub type BindingTable = HashMap<String, Value>;

/// Single result row keyed by column name.
pub type Row = BTreeMap<String, Value>;

#[derive(Debug, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

struct ExecContext<'g> {
    graph: &'g Graph,
    bindings: Vec<BindingTable>,
    rows: Vec<Row>,
}

/// Plans and runs a query against the graph.
pub fn execute(graph: &Graph, query: &Query) -> Result<ResultSet> {
    let plan = planner::plan(query)?;
    execute_plan(graph, query, &plan)
}

fn execute_plan(graph: &Graph, query: &Query, plan: &PhysicalPlan) -> Result<ResultSet> {
    let mut ctx = ExecContext {
        graph,
        bindings: vec![BindingTable::new()],
        rows: Vec::new(),
    };

    for op in &plan.ops {
        run_op(op, &mut ctx)?;
        if ctx.bindings.is_empty() {
            break;
        }
    }

    let columns = query
        .return_clause
        .as_ref()
        .map(|ret| column_names(&ret.items))
        .unwrap_or_default();

    Ok(ResultSet {
        columns,
        rows: ctx.rows,
    })
}

fn run_op(op: &PhysicalOp, ctx: &mut ExecContext<'_>) -> Result<()> {
    match op {
        PhysicalOp::NodeScan { var, label } => scan(ctx, var.as_deref(), label.as_deref()),
        PhysicalOp::Filter { predicate } => filter(ctx, predicate),
        PhysicalOp::Expand {
            source,
            target,
            edge,
            direction,
            edge_type,
        } => expand(
            ctx,
            source,
            target.as_deref(),
            edge.as_deref(),
            *direction,
            edge_type.as_deref(),
        ),
        PhysicalOp::Project { items } => project(ctx, items),
        PhysicalOp::Limit { count } => {
            ctx.rows.truncate(*count);
            ctx.bindings.truncate(*count);
            Ok(())
        }
    }
}

fn scan(ctx: &mut ExecContext<'_>, var: Option<&str>, label: Option<&str>) -> Result<()> {
    let mut matching = Vec::new();
    ctx.graph.iterate_nodes(|node| {
        if label.map_or(true, |l| node.label == l) {
            matching.push(node.clone());
        }
        true
    });

    let mut next = Vec::with_capacity(matching.len() * ctx.bindings.len());
    for node in &matching {
        for binding in &ctx.bindings {
            let mut extended = binding.clone();
            if let Some(var) = var {
                extended.insert(var.to_owned(), Value::Node(node.clone()));
            }
            next.push(extended);
        }
    }

    ctx.bindings = next;
    Ok(())
}

fn filter(ctx: &mut ExecContext<'_>, predicate: &Expr) -> Result<()> {
    let mut kept = Vec::new();
    for binding in ctx.bindings.drain(..) {
        if evaluate(predicate, &binding)? == Value::Bool(true) {
            kept.push(binding);
        }
    }
    ctx.bindings = kept;
    Ok(())
}

fn expand(
    ctx: &mut ExecContext<'_>,
    source: &str,
    target: Option<&str>,
    edge_var: Option<&str>,
    direction: Direction,
    edge_type: Option<&str>,
) -> Result<()> {
    let mut next = Vec::new();

    for binding in &ctx.bindings {
        let Some(bound) = binding.get(source) else {
            return Err(GraphError::Execution(format!(
                "variable '{source}' not defined"
            )));
        };
        let Value::Node(source_node) = bound else {
            return Err(GraphError::Execution(format!(
                "variable '{source}' is not a node"
            )));
        };

        if matches!(direction, Direction::Out | Direction::Both) {
            follow_edges(
                ctx.graph,
                binding,
                source_node.out_edges.iter(),
                |edge| edge.target,
                target,
                edge_var,
                edge_type,
                &mut next,
            );
        }
        if matches!(direction, Direction::In | Direction::Both) {
            follow_edges(
                ctx.graph,
                binding,
                source_node.in_edges.iter(),
                |edge| edge.source,
                target,
                edge_var,
                edge_type,
                &mut next,
            );
        }
    }

    ctx.bindings = next;
    Ok(())
}

/// Walks one adjacency list, skipping edges removed under concurrent
/// mutation and edges whose label does not match the requested type.
#[allow(clippy::too_many_arguments)]
fn follow_edges<'a, I, F>(
    graph: &Graph,
    binding: &BindingTable,
    edge_ids: I,
    opposite: F,
    target: Option<&str>,
    edge_var: Option<&str>,
    edge_type: Option<&str>,
    next: &mut Vec<BindingTable>,
) where
    I: Iterator<Item = &'a u64>,
    F: Fn(&crate::model::Edge) -> u64,
{
    for edge_id in edge_ids {
        let Ok(edge) = graph.get_edge(*edge_id) else {
            continue;
        };
        if edge_type.is_some_and(|t| edge.label != t) {
            continue;
        }
        let Ok(neighbor) = graph.get_node(opposite(&edge)) else {
            continue;
        };

        let mut extended = binding.clone();
        if let Some(target) = target {
            extended.insert(target.to_owned(), Value::Node(neighbor));
        }
        if let Some(edge_var) = edge_var {
            extended.insert(edge_var.to_owned(), Value::Edge(edge));
        }
        next.push(extended);
    }
}

fn project(ctx: &mut ExecContext<'_>, items: &[ReturnItem]) -> Result<()> {
    let mut rows = Vec::with_capacity(ctx.bindings.len());
    for binding in &ctx.bindings {
        let mut row = Row::new();
        for (position, item) in items.iter().enumerate() {
            let value = evaluate(&item.expr, binding)?;
            row.insert(column_name(item, position), value);
        }
        rows.push(row);
    }
    ctx.rows = rows;
    Ok(())
}

fn column_names(items: &[ReturnItem]) -> Vec<String> {
    items
        .iter()
        .enumerate()
        .map(|(position, item)| column_name(item, position))
        .collect()
}

/// Column naming: alias, then identifier name, then `var.prop`, then a
/// positional fallback.
fn column_name(item: &ReturnItem, position: usize) -> String {
    if let Some(alias) = &item.alias {
        return alias.clone();
    }
    match &item.expr {
        Expr::Identifier(name) => name.clone(),
        Expr::PropertyAccess { variable, property } => format!("{variable}.{property}"),
        _ => format!("col_{position}"),
    }
}

fn evaluate(expr: &Expr, binding: &BindingTable) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.into()),
        Expr::Identifier(name) => binding
            .get(name)
            .cloned()
            .ok_or_else(|| GraphError::Execution(format!("variable '{name}' not defined"))),
        Expr::PropertyAccess { variable, property } => {
            let bound = binding.get(variable).ok_or_else(|| {
                GraphError::Execution(format!("variable '{variable}' not defined"))
            })?;
            match bound {
                Value::Node(node) => Ok(node
                    .get_property(property)
                    .map(Value::from)
                    .unwrap_or(Value::Null)),
                Value::Edge(edge) => Ok(edge
                    .get_property(property)
                    .map(Value::from)
                    .unwrap_or(Value::Null)),
                other => Err(GraphError::Execution(format!(
                    "variable '{variable}' is not a node or edge (got {})",
                    other.type_name()
                ))),
            }
        }
        Expr::Binary { left, op, right } => {
            let left = evaluate(left, binding)?;
            let right = evaluate(right, binding)?;
            apply_binary(&left, *op, &right)
        }
    }
}

fn apply_binary(left: &Value, op: BinaryOp, right: &Value) -> Result<Value> {
    let result = match op {
        BinaryOp::Equal => left == right,
        BinaryOp::NotEqual => left != right,
        BinaryOp::And | BinaryOp::Or => {
            let (Some(l), Some(r)) = (left.as_bool(), right.as_bool()) else {
                return Err(GraphError::Execution(format!(
                    "{op} requires boolean operands (got {} and {})",
                    left.type_name(),
                    right.type_name()
                )));
            };
            match op {
                BinaryOp::And => l && r,
                _ => l || r,
            }
        }
        BinaryOp::Less => left.as_f64() < right.as_f64(),
        BinaryOp::LessEqual => left.as_f64() <= right.as_f64(),
        BinaryOp::Greater => left.as_f64() > right.as_f64(),
        BinaryOp::GreaterEqual => left.as_f64() >= right.as_f64(),
    };
    Ok(Value::Bool(result))
}
