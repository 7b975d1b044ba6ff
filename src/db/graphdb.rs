//! Durable graph façade.
//!
//! Wraps the in-memory [`Graph`] with a write-ahead log and snapshot manager.
//! Every mutation is applied in memory first and then appended to the WAL; a
//! failed append is compensated by reversing the in-memory change, so a
//! successful return implies durability. A failed compensation poisons the
//! engine and every further mutation is refused.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info, warn};

use crate::db::config::Config;
use crate::error::{GraphError, Result};
use crate::model::{Edge, EdgeId, Node, NodeId, Properties, PropertyValue};
use crate::query::executor::{self, ResultSet};
use crate::query::parser::Parser;
use crate::storage::Graph;
use crate::wal::{LogEntry, Operation, Snapshot, SnapshotManager, Wal};

pub struct GraphDB {
    graph: Graph,
    wal: Wal,
    snapshots: SnapshotManager,
    config: Config,
    wal_enabled: AtomicBool,
    poisoned: AtomicBool,
}

impl GraphDB {
    /// Opens an engine rooted at `data_dir` (WAL under `wal/`, snapshots
    /// under `snapshots/`) and recovers any prior state.
    pub fn open(data_dir: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::open_with_config(Config::new(data_dir))
    }

    pub fn open_with_config(config: Config) -> Result<Self> {
        let wal = Wal::open(&config.wal_dir)?;
        let snapshots = SnapshotManager::new(&config.snapshot_dir)?;

        let db = Self {
            graph: Graph::new(),
            wal,
            snapshots,
            config,
            wal_enabled: AtomicBool::new(false),
            poisoned: AtomicBool::new(false),
        };

        db.recover()?;
        db.wal_enabled.store(true, Ordering::SeqCst);
        Ok(db)
    }

    pub fn add_node(&self, label: impl Into<String>, properties: Properties) -> Result<Node> {
        self.ensure_usable()?;
        let node = self.graph.add_node(label, properties);

        if let Err(err) = self.log(Operation::AddNode {
            node_id: node.id,
            label: node.label.clone(),
            properties: node.properties.clone(),
        }) {
            self.compensate_insert(err.to_string(), self.graph.delete_node(node.id))?;
            return Err(err);
        }
        Ok(node)
    }

    pub fn add_edge(
        &self,
        source: NodeId,
        target: NodeId,
        label: impl Into<String>,
        properties: Properties,
    ) -> Result<Edge> {
        self.ensure_usable()?;
        let edge = self.graph.add_edge(source, target, label, properties)?;

        if let Err(err) = self.log(Operation::AddEdge {
            edge_id: edge.id,
            source,
            target,
            label: edge.label.clone(),
            properties: edge.properties.clone(),
        }) {
            self.compensate_insert(err.to_string(), self.graph.delete_edge(edge.id))?;
            return Err(err);
        }
        Ok(edge)
    }

    /// Deletes a node and all incident edges. A WAL failure after the delete
    /// is not reversed; the un-logged delete resurfaces after recovery.
    pub fn delete_node(&self, id: NodeId) -> Result<()> {
        self.ensure_usable()?;
        self.graph.delete_node(id)?;

        if let Err(err) = self.log(Operation::DeleteNode { node_id: id }) {
            warn!(node_id = id, %err, "node deletion not logged; it will reappear after recovery");
            return Err(err);
        }
        Ok(())
    }

    pub fn delete_edge(&self, id: EdgeId) -> Result<()> {
        self.ensure_usable()?;
        self.graph.delete_edge(id)?;

        if let Err(err) = self.log(Operation::DeleteEdge { edge_id: id }) {
            warn!(edge_id = id, %err, "edge deletion not logged; it will reappear after recovery");
            return Err(err);
        }
        Ok(())
    }

    pub fn set_node_property(
        &self,
        id: NodeId,
        key: impl Into<String>,
        value: PropertyValue,
    ) -> Result<()> {
        self.ensure_usable()?;
        let key = key.into();
        let previous = self.graph.set_node_property(id, key.clone(), value.clone())?;

        if let Err(err) = self.log(Operation::SetNodeProp {
            node_id: id,
            key: key.clone(),
            value,
        }) {
            self.compensate_insert(
                err.to_string(),
                self.graph.restore_node_property(id, &key, previous),
            )?;
            return Err(err);
        }
        Ok(())
    }

    pub fn set_edge_property(
        &self,
        id: EdgeId,
        key: impl Into<String>,
        value: PropertyValue,
    ) -> Result<()> {
        self.ensure_usable()?;
        let key = key.into();
        let previous = self.graph.set_edge_property(id, key.clone(), value.clone())?;

        if let Err(err) = self.log(Operation::SetEdgeProp {
            edge_id: id,
            key: key.clone(),
            value,
        }) {
            self.compensate_insert(
                err.to_string(),
                self.graph.restore_edge_property(id, &key, previous),
            )?;
            return Err(err);
        }
        Ok(())
    }

    pub fn get_node(&self, id: NodeId) -> Result<Node> {
        self.graph.get_node(id)
    }

    pub fn get_edge(&self, id: EdgeId) -> Result<Edge> {
        self.graph.get_edge(id)
    }

    pub fn get_neighbors(&self, id: NodeId) -> Result<Vec<Node>> {
        self.graph.get_neighbors(id)
    }

    pub fn get_incoming_neighbors(&self, id: NodeId) -> Result<Vec<Node>> {
        self.graph.get_incoming_neighbors(id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn iterate_nodes<F>(&self, visitor: F)
    where
        F: FnMut(&Node) -> bool,
    {
        self.graph.iterate_nodes(visitor)
    }

    /// Direct access to the in-memory index, for read-only helpers such as
    /// traversal algorithms.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Parses and runs a query against the current graph state.
    pub fn execute_query(&self, text: &str) -> Result<ResultSet> {
        let query = Parser::new(text).parse()?;
        executor::execute(&self.graph, &query)
    }

    /// Writes a full snapshot and truncates the WAL at the captured index.
    pub fn snapshot(&self) -> Result<()> {
        self.ensure_usable()?;

        let index = self.wal.current_index();
        let (nodes, edges) = self.graph.export();
        self.snapshots.create(index, nodes, edges)?;

        // A truncate failure leaves extra WAL entries behind; replay stays
        // correct because the snapshot plus the full WAL cover the state.
        self.wal.truncate(index)?;

        if let Err(err) = self.snapshots.cleanup_old(self.config.keep_snapshots) {
            warn!(%err, "snapshot cleanup failed");
        }
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.wal.sync()
    }

    /// Rebuilds state from the latest snapshot plus WAL replay. Runs with
    /// WAL appending disabled; replay application is idempotent so the
    /// overlap entry retained by truncation is harmless.
    fn recover(&self) -> Result<()> {
        if let Some(snapshot) = self.snapshots.load_latest()? {
            self.load_snapshot(snapshot);
        }

        self.wal.replay(|entry| self.apply_entry(entry))?;

        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            wal_index = self.wal.current_index(),
            "recovery complete"
        );
        Ok(())
    }

    fn load_snapshot(&self, snapshot: Snapshot) {
        info!(
            index = snapshot.metadata.index,
            nodes = snapshot.metadata.node_count,
            edges = snapshot.metadata.edge_count,
            "recovering from snapshot"
        );

        // Snapshot nodes carry their adjacency lists; they are installed
        // verbatim and trusted.
        for node in snapshot.nodes {
            self.graph.install_node(node);
        }
        for edge in snapshot.edges {
            self.graph.install_edge(edge);
        }
    }

    fn apply_entry(&self, entry: &LogEntry) -> Result<()> {
        match &entry.op {
            Operation::AddNode {
                node_id,
                label,
                properties,
            } => {
                let mut node = Node::new(*node_id, label.clone());
                node.properties = properties.clone();
                node.created_at = entry.timestamp;
                node.updated_at = entry.timestamp;
                self.graph.install_node(node);
            }
            Operation::AddEdge {
                edge_id,
                source,
                target,
                label,
                properties,
            } => {
                let mut edge = Edge::new(*edge_id, *source, *target, label.clone());
                edge.properties = properties.clone();
                edge.created_at = entry.timestamp;
                edge.updated_at = entry.timestamp;
                self.graph.install_edge(edge);
            }
            Operation::DeleteNode { node_id } => {
                // Delete-of-absent is a no-op: the snapshot may already
                // reflect this entry.
                match self.graph.delete_node(*node_id) {
                    Ok(()) | Err(GraphError::NotFound(_)) => {}
                    Err(err) => return Err(err),
                }
            }
            Operation::DeleteEdge { edge_id } => {
                match self.graph.delete_edge(*edge_id) {
                    Ok(()) | Err(GraphError::NotFound(_)) => {}
                    Err(err) => return Err(err),
                }
            }
            Operation::SetNodeProp {
                node_id,
                key,
                value,
            } => {
                self.graph.set_node_property(*node_id, key.clone(), value.clone())?;
            }
            Operation::SetEdgeProp {
                edge_id,
                key,
                value,
            } => {
                self.graph.set_edge_property(*edge_id, key.clone(), value.clone())?;
            }
        }
        Ok(())
    }

    fn log(&self, op: Operation) -> Result<()> {
        if !self.wal_enabled.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.wal.append(op)?;
        Ok(())
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.poisoned.load(Ordering::SeqCst) {
            return Err(GraphError::Unrecoverable(
                "a previous rollback failed; reopen the engine to recover".into(),
            ));
        }
        Ok(())
    }

    /// Evaluates the outcome of a compensating rollback. `NotFound` means the
    /// entity was already gone, which is an acceptable rollback; anything
    /// else poisons the engine.
    fn compensate_insert(&self, cause: String, rollback: Result<()>) -> Result<()> {
        match rollback {
            Ok(()) | Err(GraphError::NotFound(_)) => Ok(()),
            Err(rollback_err) => {
                self.poisoned.store(true, Ordering::SeqCst);
                error!(%rollback_err, %cause, "compensating rollback failed; engine poisoned");
                Err(GraphError::Unrecoverable(format!(
                    "WAL append failed ({cause}) and rollback failed ({rollback_err})"
                )))
            }
        }
    }
}
