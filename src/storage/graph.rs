//! Concurrent in-memory graph index.
//!
//! Two map-level locks protect the node and edge maps; each entity carries its
//! own lock inside the `Arc`. Compound operations acquire the nodes map first,
//! then the edges map, then per-entity locks in ascending ID order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{GraphError, Result};
use crate::model::{Edge, EdgeId, Node, NodeId, Properties, PropertyValue};

type Shared<T> = Arc<RwLock<T>>;

pub struct Graph {
    nodes: RwLock<HashMap<NodeId, Shared<Node>>>,
    edges: RwLock<HashMap<EdgeId, Shared<Edge>>>,
    next_node_id: AtomicU64,
    next_edge_id: AtomicU64,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            edges: RwLock::new(HashMap::new()),
            // ID 0 is reserved as the null/invalid sentinel.
            next_node_id: AtomicU64::new(1),
            next_edge_id: AtomicU64::new(1),
        }
    }

    /// Creates a node with a freshly allocated ID. Never fails for valid input.
    pub fn add_node(&self, label: impl Into<String>, properties: Properties) -> Node {
        let node_id = self.next_node_id.fetch_add(1, Ordering::SeqCst);

        let mut node = Node::new(node_id, label);
        node.properties = properties;

        let snapshot = node.clone();
        self.nodes
            .write()
            .insert(node_id, Arc::new(RwLock::new(node)));
        snapshot
    }

    pub fn get_node(&self, id: NodeId) -> Result<Node> {
        let handle = self.node_handle(id)?;
        let node = handle.read().clone();
        Ok(node)
    }

    pub fn get_edge(&self, id: EdgeId) -> Result<Edge> {
        let handle = self.edge_handle(id)?;
        let edge = handle.read().clone();
        Ok(edge)
    }

    /// Creates an edge between two existing nodes and links it into both
    /// adjacency lists. If an endpoint disappears mid-flight the edge is
    /// removed again so no dangling edge survives.
    pub fn add_edge(
        &self,
        source: NodeId,
        target: NodeId,
        label: impl Into<String>,
        properties: Properties,
    ) -> Result<Edge> {
        let source_handle = self.node_handle(source)?;
        let target_handle = self.node_handle(target)?;

        let edge_id = self.next_edge_id.fetch_add(1, Ordering::SeqCst);
        let mut edge = Edge::new(edge_id, source, target, label);
        edge.properties = properties;

        let snapshot = edge.clone();
        self.edges
            .write()
            .insert(edge_id, Arc::new(RwLock::new(edge)));

        if source == target {
            let mut node = source_handle.write();
            node.add_out_edge(edge_id);
            node.add_in_edge(edge_id);
        } else if source < target {
            let mut src = source_handle.write();
            let mut tgt = target_handle.write();
            src.add_out_edge(edge_id);
            tgt.add_in_edge(edge_id);
        } else {
            let mut tgt = target_handle.write();
            let mut src = source_handle.write();
            src.add_out_edge(edge_id);
            tgt.add_in_edge(edge_id);
        }

        // An endpoint may have been deleted between the existence check and
        // the adjacency update; undo the insert to keep the no-dangling-edge
        // invariant.
        let endpoints_live = {
            let nodes = self.nodes.read();
            nodes.contains_key(&source) && nodes.contains_key(&target)
        };
        if !endpoints_live {
            let _ = self.delete_edge(edge_id);
            return Err(GraphError::NotFound("node"));
        }

        Ok(snapshot)
    }

    /// Outgoing neighbors of a node. Edges or endpoints that vanish under a
    /// concurrent deletion are skipped, not reported.
    pub fn get_neighbors(&self, id: NodeId) -> Result<Vec<Node>> {
        let out_edges = {
            let handle = self.node_handle(id)?;
            let node = handle.read();
            node.out_edges.clone()
        };

        let mut neighbors = Vec::with_capacity(out_edges.len());
        for edge_id in out_edges {
            let Ok(edge) = self.get_edge(edge_id) else {
                continue;
            };
            let Ok(neighbor) = self.get_node(edge.target) else {
                continue;
            };
            neighbors.push(neighbor);
        }
        Ok(neighbors)
    }

    /// Nodes with edges pointing at the given node.
    pub fn get_incoming_neighbors(&self, id: NodeId) -> Result<Vec<Node>> {
        let in_edges = {
            let handle = self.node_handle(id)?;
            let node = handle.read();
            node.in_edges.clone()
        };

        let mut neighbors = Vec::with_capacity(in_edges.len());
        for edge_id in in_edges {
            let Ok(edge) = self.get_edge(edge_id) else {
                continue;
            };
            let Ok(neighbor) = self.get_node(edge.source) else {
                continue;
            };
            neighbors.push(neighbor);
        }
        Ok(neighbors)
    }

    /// Removes an edge and unlinks it from both adjacency lists. Endpoints
    /// that are already gone are tolerated.
    pub fn delete_edge(&self, id: EdgeId) -> Result<()> {
        let edge = {
            let mut edges = self.edges.write();
            let handle = edges.remove(&id).ok_or(GraphError::NotFound("edge"))?;
            let edge = handle.read().clone();
            edge
        };

        if let Ok(handle) = self.node_handle(edge.source) {
            let mut node = handle.write();
            node.out_edges.retain(|eid| *eid != id);
        }
        if let Ok(handle) = self.node_handle(edge.target) {
            let mut node = handle.write();
            node.in_edges.retain(|eid| *eid != id);
        }

        Ok(())
    }

    /// Removes a node after cascading deletion of every incident edge.
    pub fn delete_node(&self, id: NodeId) -> Result<()> {
        let (out_edges, in_edges) = {
            let handle = self.node_handle(id)?;
            let node = handle.read();
            (node.out_edges.clone(), node.in_edges.clone())
        };

        for edge_id in out_edges.into_iter().chain(in_edges) {
            // Already-removed edges are fine; the cascade may see an edge
            // twice for self-loops.
            let _ = self.delete_edge(edge_id);
        }

        self.nodes.write().remove(&id);
        Ok(())
    }

    pub fn set_node_property(
        &self,
        id: NodeId,
        key: impl Into<String>,
        value: PropertyValue,
    ) -> Result<Option<PropertyValue>> {
        let handle = self.node_handle(id)?;
        let mut node = handle.write();
        Ok(node.set_property(key, value))
    }

    pub fn set_edge_property(
        &self,
        id: EdgeId,
        key: impl Into<String>,
        value: PropertyValue,
    ) -> Result<Option<PropertyValue>> {
        let handle = self.edge_handle(id)?;
        let mut edge = handle.write();
        Ok(edge.set_property(key, value))
    }

    /// Reinstates a property to its previous state; used by the durability
    /// layer to compensate a failed WAL append.
    pub(crate) fn restore_node_property(
        &self,
        id: NodeId,
        key: &str,
        previous: Option<PropertyValue>,
    ) -> Result<()> {
        let handle = self.node_handle(id)?;
        let mut node = handle.write();
        match previous {
            Some(value) => {
                node.set_property(key, value);
            }
            None => {
                node.properties.remove(key);
            }
        }
        Ok(())
    }

    pub(crate) fn restore_edge_property(
        &self,
        id: EdgeId,
        key: &str,
        previous: Option<PropertyValue>,
    ) -> Result<()> {
        let handle = self.edge_handle(id)?;
        let mut edge = handle.write();
        match previous {
            Some(value) => {
                edge.set_property(key, value);
            }
            None => {
                edge.properties.remove(key);
            }
        }
        Ok(())
    }

    /// Invokes the visitor on every node under the nodes map shared lock.
    /// The visitor must not mutate graph structure; returning `false` stops
    /// the iteration.
    pub fn iterate_nodes<F>(&self, mut visitor: F)
    where
        F: FnMut(&Node) -> bool,
    {
        let nodes = self.nodes.read();
        for handle in nodes.values() {
            let node = handle.read();
            if !visitor(&node) {
                break;
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.read().len()
    }

    /// Clones the full graph state for snapshotting, ordered by ID so
    /// snapshots are deterministic.
    pub(crate) fn export(&self) -> (Vec<Node>, Vec<Edge>) {
        let mut nodes: Vec<Node> = {
            let map = self.nodes.read();
            map.values().map(|handle| handle.read().clone()).collect()
        };
        let mut edges: Vec<Edge> = {
            let map = self.edges.read();
            map.values().map(|handle| handle.read().clone()).collect()
        };
        nodes.sort_by_key(|n| n.id);
        edges.sort_by_key(|e| e.id);
        (nodes, edges)
    }

    /// Installs a node verbatim during recovery, overwriting any existing
    /// entry with the same ID and advancing the ID counter.
    pub(crate) fn install_node(&self, node: Node) {
        let id = node.id;
        self.nodes.write().insert(id, Arc::new(RwLock::new(node)));
        self.next_node_id.fetch_max(id + 1, Ordering::SeqCst);
    }

    /// Installs an edge during recovery. Adjacency entries are only appended
    /// when absent, which makes replay of an already-snapshotted edge a no-op.
    pub(crate) fn install_edge(&self, edge: Edge) {
        let id = edge.id;
        let source = edge.source;
        let target = edge.target;
        self.edges.write().insert(id, Arc::new(RwLock::new(edge)));
        self.next_edge_id.fetch_max(id + 1, Ordering::SeqCst);

        if let Ok(handle) = self.node_handle(source) {
            let mut node = handle.write();
            if !node.out_edges.contains(&id) {
                node.add_out_edge(id);
            }
        }
        if let Ok(handle) = self.node_handle(target) {
            let mut node = handle.write();
            if !node.in_edges.contains(&id) {
                node.add_in_edge(id);
            }
        }
    }

    fn node_handle(&self, id: NodeId) -> Result<Shared<Node>> {
        self.nodes
            .read()
            .get(&id)
            .cloned()
            .ok_or(GraphError::NotFound("node"))
    }

    fn edge_handle(&self, id: EdgeId) -> Result<Shared<Edge>> {
        self.edges
            .read()
            .get(&id)
            .cloned()
            .ok_or(GraphError::NotFound("edge"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn new_graph_is_empty() {
        let graph = Graph::new();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn add_node_assigns_sequential_ids() {
        let graph = Graph::new();
        let a = graph.add_node("Person", Properties::new());
        let b = graph.add_node("Person", Properties::new());
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn get_node_returns_properties() {
        let graph = Graph::new();
        let props = Properties::from([("name".to_owned(), PropertyValue::from("Alice"))]);
        let created = graph.add_node("Person", props);

        let fetched = graph.get_node(created.id).unwrap();
        assert_eq!(fetched.label, "Person");
        assert_eq!(
            fetched.get_property("name"),
            Some(&PropertyValue::from("Alice"))
        );

        assert!(matches!(graph.get_node(999), Err(GraphError::NotFound(_))));
    }

    #[test]
    fn add_edge_links_adjacency() {
        let graph = Graph::new();
        let a = graph.add_node("Person", Properties::new());
        let b = graph.add_node("Person", Properties::new());

        let edge = graph
            .add_edge(a.id, b.id, "KNOWS", Properties::new())
            .unwrap();
        assert_eq!(edge.id, 1);
        assert_eq!(edge.source, a.id);
        assert_eq!(edge.target, b.id);

        let a = graph.get_node(a.id).unwrap();
        let b = graph.get_node(b.id).unwrap();
        assert_eq!(a.out_edges, vec![edge.id]);
        assert_eq!(b.in_edges, vec![edge.id]);
    }

    #[test]
    fn add_edge_requires_both_endpoints() {
        let graph = Graph::new();
        let a = graph.add_node("Person", Properties::new());

        assert!(matches!(
            graph.add_edge(a.id, 999, "KNOWS", Properties::new()),
            Err(GraphError::NotFound(_))
        ));
        assert!(matches!(
            graph.add_edge(999, a.id, "KNOWS", Properties::new()),
            Err(GraphError::NotFound(_))
        ));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn neighbors_follow_edge_direction() {
        let graph = Graph::new();
        let a = graph.add_node("Person", Properties::new());
        let b = graph.add_node("Person", Properties::new());
        let c = graph.add_node("Person", Properties::new());
        graph
            .add_edge(a.id, b.id, "KNOWS", Properties::new())
            .unwrap();
        graph
            .add_edge(a.id, c.id, "KNOWS", Properties::new())
            .unwrap();

        let neighbors = graph.get_neighbors(a.id).unwrap();
        let ids: HashSet<NodeId> = neighbors.iter().map(|n| n.id).collect();
        assert_eq!(ids, HashSet::from([b.id, c.id]));

        assert!(graph.get_neighbors(b.id).unwrap().is_empty());

        let incoming = graph.get_incoming_neighbors(b.id).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].id, a.id);
    }

    #[test]
    fn delete_edge_unlinks_adjacency() {
        let graph = Graph::new();
        let a = graph.add_node("Person", Properties::new());
        let b = graph.add_node("Person", Properties::new());
        let edge = graph
            .add_edge(a.id, b.id, "KNOWS", Properties::new())
            .unwrap();

        graph.delete_edge(edge.id).unwrap();

        assert_eq!(graph.edge_count(), 0);
        assert!(graph.get_node(a.id).unwrap().out_edges.is_empty());
        assert!(graph.get_node(b.id).unwrap().in_edges.is_empty());
        assert!(matches!(
            graph.delete_edge(edge.id),
            Err(GraphError::NotFound(_))
        ));
    }

    #[test]
    fn delete_node_cascades_incident_edges() {
        let graph = Graph::new();
        let a = graph.add_node("Person", Properties::new());
        let b = graph.add_node("Person", Properties::new());
        let c = graph.add_node("Person", Properties::new());
        graph
            .add_edge(a.id, b.id, "KNOWS", Properties::new())
            .unwrap();
        graph
            .add_edge(c.id, b.id, "KNOWS", Properties::new())
            .unwrap();

        graph.delete_node(b.id).unwrap();

        assert!(matches!(graph.get_node(b.id), Err(GraphError::NotFound(_))));
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.get_node(a.id).unwrap().out_edges.is_empty());
        assert!(graph.get_node(c.id).unwrap().out_edges.is_empty());
    }

    #[test]
    fn delete_node_with_self_loop() {
        let graph = Graph::new();
        let a = graph.add_node("Person", Properties::new());
        graph
            .add_edge(a.id, a.id, "SELF", Properties::new())
            .unwrap();

        graph.delete_node(a.id).unwrap();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn iterate_nodes_visits_all_and_stops() {
        let graph = Graph::new();
        for _ in 0..10 {
            graph.add_node("Person", Properties::new());
        }

        let mut seen = 0;
        graph.iterate_nodes(|_| {
            seen += 1;
            true
        });
        assert_eq!(seen, 10);

        let mut seen = 0;
        graph.iterate_nodes(|_| {
            seen += 1;
            seen < 3
        });
        assert_eq!(seen, 3);
    }

    #[test]
    fn install_edge_is_idempotent_on_adjacency() {
        let graph = Graph::new();
        let a = graph.add_node("Person", Properties::new());
        let b = graph.add_node("Person", Properties::new());
        let edge = graph
            .add_edge(a.id, b.id, "KNOWS", Properties::new())
            .unwrap();

        // Replaying the same edge (snapshot/WAL overlap) must not duplicate
        // adjacency entries.
        graph.install_edge(edge.clone());
        let a = graph.get_node(a.id).unwrap();
        let b = graph.get_node(b.id).unwrap();
        assert_eq!(a.out_edges, vec![edge.id]);
        assert_eq!(b.in_edges, vec![edge.id]);
    }

    #[test]
    fn install_advances_id_counters() {
        let graph = Graph::new();
        graph.install_node(Node::new(41, "Person"));
        let next = graph.add_node("Person", Properties::new());
        assert_eq!(next.id, 42);
    }

    #[test]
    fn concurrent_mutations_keep_counts_consistent() {
        let graph = Arc::new(Graph::new());
        let root = graph.add_node("Root", Properties::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let graph = Arc::clone(&graph);
            let root_id = root.id;
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    let node = graph.add_node("Person", Properties::new());
                    graph
                        .add_edge(root_id, node.id, "HAS", Properties::new())
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(graph.node_count(), 1 + 8 * 50);
        assert_eq!(graph.edge_count(), 8 * 50);
        assert_eq!(graph.get_node(root.id).unwrap().out_edges.len(), 8 * 50);
    }
}
