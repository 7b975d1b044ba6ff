//! Breadth- and depth-first traversal over outgoing edges.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::Result;
use crate::model::NodeId;
use crate::storage::Graph;

#[derive(Debug, Default)]
pub struct TraversalResult {
    pub visited_order: Vec<NodeId>,
    /// Start-to-target path when a target was requested and found.
    pub path: Vec<NodeId>,
    pub found: bool,
    pub distance: usize,
}

/// Breadth-first search from `start`. With a target, stops when it is reached
/// and reconstructs the shortest path; `max_depth` of 0 means unlimited.
pub fn bfs(
    graph: &Graph,
    start: NodeId,
    target: Option<NodeId>,
    max_depth: usize,
) -> Result<TraversalResult> {
    graph.get_node(start)?;

    let mut queue = VecDeque::from([start]);
    let mut visited = HashSet::from([start]);
    let mut parents: HashMap<NodeId, NodeId> = HashMap::new();
    let mut distances: HashMap<NodeId, usize> = HashMap::from([(start, 0)]);

    let mut result = TraversalResult::default();

    while let Some(current) = queue.pop_front() {
        result.visited_order.push(current);
        let depth = distances[&current];

        if target == Some(current) {
            result.found = true;
            result.distance = depth;
            result.path = reconstruct_path(&parents, start, current);
            return Ok(result);
        }

        if max_depth > 0 && depth >= max_depth {
            continue;
        }

        let Ok(neighbors) = graph.get_neighbors(current) else {
            continue;
        };
        for neighbor in neighbors {
            if visited.insert(neighbor.id) {
                parents.insert(neighbor.id, current);
                distances.insert(neighbor.id, depth + 1);
                queue.push_back(neighbor.id);
            }
        }
    }

    Ok(result)
}

/// Depth-first search from `start`, preorder visit.
pub fn dfs(
    graph: &Graph,
    start: NodeId,
    target: Option<NodeId>,
    max_depth: usize,
) -> Result<TraversalResult> {
    graph.get_node(start)?;

    let mut visited = HashSet::new();
    let mut parents = HashMap::new();
    let mut result = TraversalResult::default();

    let found = dfs_visit(
        graph,
        start,
        target,
        max_depth,
        0,
        &mut visited,
        &mut parents,
        &mut result,
    );

    if found {
        if let Some(target) = target {
            result.found = true;
            result.path = reconstruct_path(&parents, start, target);
            result.distance = result.path.len().saturating_sub(1);
        }
    }

    Ok(result)
}

#[allow(clippy::too_many_arguments)]
fn dfs_visit(
    graph: &Graph,
    current: NodeId,
    target: Option<NodeId>,
    max_depth: usize,
    depth: usize,
    visited: &mut HashSet<NodeId>,
    parents: &mut HashMap<NodeId, NodeId>,
    result: &mut TraversalResult,
) -> bool {
    visited.insert(current);
    result.visited_order.push(current);

    if target == Some(current) {
        return true;
    }
    if max_depth > 0 && depth >= max_depth {
        return false;
    }

    let Ok(neighbors) = graph.get_neighbors(current) else {
        return false;
    };
    for neighbor in neighbors {
        if !visited.contains(&neighbor.id) {
            parents.insert(neighbor.id, current);
            if dfs_visit(
                graph,
                neighbor.id,
                target,
                max_depth,
                depth + 1,
                visited,
                parents,
                result,
            ) {
                return true;
            }
        }
    }
    false
}

fn reconstruct_path(parents: &HashMap<NodeId, NodeId>, start: NodeId, end: NodeId) -> Vec<NodeId> {
    let mut path = vec![end];
    let mut current = end;
    while current != start {
        let Some(&parent) = parents.get(&current) else {
            return Vec::new();
        };
        path.push(parent);
        current = parent;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Properties;

    /// 1 -> 2 -> 3 -> 4, plus 1 -> 5.
    fn chain_graph() -> Graph {
        let graph = Graph::new();
        for _ in 0..5 {
            graph.add_node("Node", Properties::new());
        }
        for (s, t) in [(1, 2), (2, 3), (3, 4), (1, 5)] {
            graph.add_edge(s, t, "NEXT", Properties::new()).unwrap();
        }
        graph
    }

    #[test]
    fn bfs_visits_reachable_nodes() -> Result<()> {
        let graph = chain_graph();
        let result = bfs(&graph, 1, None, 0)?;
        assert_eq!(result.visited_order.len(), 5);
        assert_eq!(result.visited_order[0], 1);
        assert!(!result.found);
        Ok(())
    }

    #[test]
    fn bfs_finds_shortest_path() -> Result<()> {
        let graph = chain_graph();
        let result = bfs(&graph, 1, Some(4), 0)?;
        assert!(result.found);
        assert_eq!(result.path, vec![1, 2, 3, 4]);
        assert_eq!(result.distance, 3);
        Ok(())
    }

    #[test]
    fn bfs_respects_depth_limit() -> Result<()> {
        let graph = chain_graph();
        let result = bfs(&graph, 1, None, 1)?;
        // Depth 1: the start plus its direct neighbors.
        assert_eq!(result.visited_order.len(), 3);
        Ok(())
    }

    #[test]
    fn dfs_visits_all_and_finds_path() -> Result<()> {
        let graph = chain_graph();
        let result = dfs(&graph, 1, None, 0)?;
        assert_eq!(result.visited_order.len(), 5);

        let result = dfs(&graph, 1, Some(4), 0)?;
        assert!(result.found);
        assert_eq!(result.path, vec![1, 2, 3, 4]);
        assert_eq!(result.distance, 3);
        Ok(())
    }

    #[test]
    fn dfs_respects_depth_limit() -> Result<()> {
        let graph = chain_graph();
        let result = dfs(&graph, 1, None, 1)?;
        assert_eq!(result.visited_order.len(), 3);
        Ok(())
    }

    #[test]
    fn missing_start_node_errors() {
        let graph = Graph::new();
        assert!(bfs(&graph, 42, None, 0).is_err());
        assert!(dfs(&graph, 42, None, 0).is_err());
    }

    #[test]
    fn unreachable_target_is_not_found() -> Result<()> {
        let graph = chain_graph();
        let loner = graph.add_node("Node", Properties::new());
        let result = bfs(&graph, 1, Some(loner.id), 0)?;
        assert!(!result.found);
        assert!(result.path.is_empty());
        Ok(())
    }
}
