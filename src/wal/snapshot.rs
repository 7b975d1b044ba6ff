//! Full-state snapshots of the in-memory graph.
//!
//! Each snapshot is a single JSON object in its own uniquely named file; the
//! `snapshot-latest.json` pointer is a byte copy updated via a temp file and
//! rename so a crash leaves either the old or the new pointer intact.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::model::{now_millis, Edge, Node};

const LATEST: &str = "snapshot-latest.json";
const LATEST_TMP: &str = "snapshot-latest.json.tmp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// WAL index the snapshot covers.
    pub index: u64,
    pub timestamp: i64,
    pub node_count: usize,
    pub edge_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub metadata: SnapshotMetadata,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

pub struct SnapshotManager {
    dir: PathBuf,
}

impl SnapshotManager {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Writes a snapshot file and repoints `snapshot-latest.json` at it.
    pub fn create(&self, wal_index: u64, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<()> {
        let snapshot = Snapshot {
            metadata: SnapshotMetadata {
                index: wal_index,
                timestamp: now_millis(),
                node_count: nodes.len(),
                edge_count: edges.len(),
            },
            nodes,
            edges,
        };

        let filename = format!("snapshot-{}-{}.json", wal_index, unix_seconds());
        let path = self.dir.join(&filename);

        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        self.update_latest(&path)?;

        info!(
            index = wal_index,
            nodes = snapshot.metadata.node_count,
            edges = snapshot.metadata.edge_count,
            file = %filename,
            "snapshot written"
        );
        Ok(())
    }

    /// Loads the newest snapshot. A missing pointer file is not an error.
    pub fn load_latest(&self) -> Result<Option<Snapshot>> {
        let path = self.dir.join(LATEST);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let snapshot = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(snapshot))
    }

    /// All snapshot filenames, excluding the latest pointer.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("snapshot-") && name.ends_with(".json") && name != LATEST {
                snapshots.push(name);
            }
        }
        Ok(snapshots)
    }

    /// Keeps the `keep_count` newest snapshots by modification time. The
    /// latest pointer is never deleted.
    pub fn cleanup_old(&self, keep_count: usize) -> Result<()> {
        let names = self.list()?;
        if names.len() <= keep_count {
            return Ok(());
        }

        let mut dated: Vec<(SystemTime, String)> = Vec::with_capacity(names.len());
        for name in names {
            let modified = fs::metadata(self.dir.join(&name))?.modified()?;
            dated.push((modified, name));
        }
        dated.sort();

        let excess = dated.len() - keep_count;
        for (_, name) in dated.into_iter().take(excess) {
            fs::remove_file(self.dir.join(&name))?;
            debug!(file = %name, "removed old snapshot");
        }
        Ok(())
    }

    fn update_latest(&self, source: &Path) -> Result<()> {
        let tmp = self.dir.join(LATEST_TMP);
        let bytes = fs::read(source)?;

        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, self.dir.join(LATEST))?;
        Ok(())
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
