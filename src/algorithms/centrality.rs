//! PageRank centrality.

use std::collections::HashMap;

use crate::model::NodeId;
use crate::storage::Graph;

const DEFAULT_DAMPING_FACTOR: f64 = 0.85;
const DEFAULT_ITERATIONS: usize = 20;
const DEFAULT_TOLERANCE: f64 = 0.0001;

#[derive(Debug, Clone, Copy)]
pub struct PageRankConfig {
    pub damping_factor: f64,
    pub iterations: usize,
    /// Early-exit threshold on the summed absolute score change.
    pub tolerance: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping_factor: DEFAULT_DAMPING_FACTOR,
            iterations: DEFAULT_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// Iterative PageRank over the whole graph; scores sum to roughly 1.
pub fn page_rank(graph: &Graph, config: PageRankConfig) -> HashMap<NodeId, f64> {
    let node_count = graph.node_count();
    if node_count == 0 {
        return HashMap::new();
    }

    let mut node_ids = Vec::with_capacity(node_count);
    let mut out_degree: HashMap<NodeId, usize> = HashMap::with_capacity(node_count);
    graph.iterate_nodes(|node| {
        node_ids.push(node.id);
        out_degree.insert(node.id, node.out_edges.len());
        true
    });

    let initial = 1.0 / node_count as f64;
    let mut scores: HashMap<NodeId, f64> = node_ids.iter().map(|id| (*id, initial)).collect();

    for _ in 0..config.iterations {
        let mut next_scores = HashMap::with_capacity(node_ids.len());
        let mut diff = 0.0;

        for &node_id in &node_ids {
            let Ok(incoming) = graph.get_incoming_neighbors(node_id) else {
                continue;
            };

            let mut incoming_score = 0.0;
            for neighbor in incoming {
                let degree = out_degree.get(&neighbor.id).copied().unwrap_or(0);
                if degree > 0 {
                    incoming_score += scores.get(&neighbor.id).copied().unwrap_or(0.0) / degree as f64;
                }
            }

            let score = (1.0 - config.damping_factor) / node_count as f64
                + config.damping_factor * incoming_score;
            diff += (score - scores.get(&node_id).copied().unwrap_or(0.0)).abs();
            next_scores.insert(node_id, score);
        }

        scores = next_scores;
        if diff < config.tolerance {
            break;
        }
    }

    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Properties;

    #[test]
    fn cycle_converges_to_uniform_scores() {
        let graph = Graph::new();
        let a = graph.add_node("Node", Properties::new()).id;
        let b = graph.add_node("Node", Properties::new()).id;
        let c = graph.add_node("Node", Properties::new()).id;
        graph.add_edge(a, b, "LINK", Properties::new()).unwrap();
        graph.add_edge(b, c, "LINK", Properties::new()).unwrap();
        graph.add_edge(c, a, "LINK", Properties::new()).unwrap();

        let scores = page_rank(&graph, PageRankConfig::default());
        for id in [a, b, c] {
            let score = scores[&id];
            assert!(
                (score - 1.0 / 3.0).abs() < 0.001,
                "node {id} score {score} not near 1/3"
            );
        }
    }

    #[test]
    fn hub_outranks_spokes() {
        let graph = Graph::new();
        let hub = graph.add_node("Node", Properties::new()).id;
        let mut spokes = Vec::new();
        for _ in 0..4 {
            let spoke = graph.add_node("Node", Properties::new()).id;
            graph.add_edge(spoke, hub, "LINK", Properties::new()).unwrap();
            spokes.push(spoke);
        }

        let scores = page_rank(&graph, PageRankConfig::default());
        for spoke in spokes {
            assert!(scores[&hub] > scores[&spoke]);
        }
    }

    #[test]
    fn disconnected_nodes_share_base_score() {
        let graph = Graph::new();
        let a = graph.add_node("Node", Properties::new()).id;
        let b = graph.add_node("Node", Properties::new()).id;

        let scores = page_rank(&graph, PageRankConfig::default());
        assert!((scores[&a] - scores[&b]).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_graph_yields_no_scores() {
        let graph = Graph::new();
        assert!(page_rank(&graph, PageRankConfig::default()).is_empty());
    }
}
