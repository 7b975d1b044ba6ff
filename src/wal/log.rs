//! Append-only write-ahead log.
//!
//! One JSON record per line in `wal.log`. Records are self-delimited, so a
//! torn trailing write truncates replay cleanly; a decode failure with intact
//! records after it is corruption.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::model::{now_millis, EdgeId, NodeId, Properties, PropertyValue};

const WAL_FILE: &str = "wal.log";

/// Logged mutation, tagged with the original wire names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op_type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    AddNode {
        node_id: NodeId,
        label: String,
        properties: Properties,
    },
    AddEdge {
        edge_id: EdgeId,
        source: NodeId,
        target: NodeId,
        label: String,
        properties: Properties,
    },
    DeleteNode {
        node_id: NodeId,
    },
    DeleteEdge {
        edge_id: EdgeId,
    },
    SetNodeProp {
        node_id: NodeId,
        key: String,
        value: PropertyValue,
    },
    SetEdgeProp {
        edge_id: EdgeId,
        key: String,
        value: PropertyValue,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub index: u64,
    pub timestamp: i64,
    #[serde(flatten)]
    pub op: Operation,
}

struct WalInner {
    file: File,
    next_index: u64,
}

pub struct Wal {
    dir: PathBuf,
    inner: Mutex<WalInner>,
}

impl Wal {
    /// Opens (or creates) the log, scanning existing records to find the next
    /// index.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let path = dir.join(WAL_FILE);
        let file = OpenOptions::new().append(true).create(true).open(&path)?;

        let last_index = read_entries(&path)?
            .iter()
            .map(|entry| entry.index)
            .max()
            .unwrap_or(0);

        Ok(Self {
            dir,
            inner: Mutex::new(WalInner {
                file,
                next_index: last_index + 1,
            }),
        })
    }

    /// Appends one operation, fsyncs, and returns the assigned index. The
    /// index does not advance unless the record is durable.
    pub fn append(&self, op: Operation) -> Result<u64> {
        let mut inner = self.inner.lock();

        let entry = LogEntry {
            index: inner.next_index,
            timestamp: now_millis(),
            op,
        };

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        inner.file.write_all(line.as_bytes())?;
        inner.file.sync_data()?;

        inner.next_index += 1;
        Ok(entry.index)
    }

    /// Streams every record in file order. Visitor errors abort the replay
    /// and propagate.
    pub fn replay<F>(&self, mut visitor: F) -> Result<()>
    where
        F: FnMut(&LogEntry) -> Result<()>,
    {
        for entry in read_entries(&self.path())? {
            visitor(&entry)?;
        }
        Ok(())
    }

    /// Rewrites the log keeping only records with `index >= keep_from`.
    pub fn truncate(&self, keep_from: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        let path = self.path();

        let retained: Vec<LogEntry> = read_entries(&path)?
            .into_iter()
            .filter(|entry| entry.index >= keep_from)
            .collect();

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        for entry in &retained {
            let mut line = serde_json::to_string(entry)?;
            line.push('\n');
            file.write_all(line.as_bytes())?;
        }
        file.sync_data()?;

        debug!(keep_from, retained = retained.len(), "truncated WAL");

        inner.file = OpenOptions::new().append(true).create(true).open(&path)?;
        Ok(())
    }

    /// Index of the most recent record, or 0 when the log is empty.
    pub fn current_index(&self) -> u64 {
        self.inner.lock().next_index - 1
    }

    pub fn sync(&self) -> Result<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }

    pub fn size(&self) -> Result<u64> {
        Ok(fs::metadata(self.path())?.len())
    }

    fn path(&self) -> PathBuf {
        self.dir.join(WAL_FILE)
    }
}

/// Decodes every record in the file. A record that fails to decode with
/// nothing but blank lines after it marks the end of the log (torn final
/// write); one followed by further records is a fatal corruption.
fn read_entries(path: &Path) -> Result<Vec<LogEntry>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut entries = Vec::new();
    let mut lines = contents.lines().enumerate().peekable();
    while let Some((line_no, line)) = lines.next() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                let trailing = lines.clone().any(|(_, rest)| !rest.trim().is_empty());
                if trailing {
                    return Err(GraphError::Corruption(format!(
                        "WAL record {} undecodable mid-log: {err}",
                        line_no + 1
                    )));
                }
                debug!(line = line_no + 1, "dropping torn trailing WAL record");
                break;
            }
        }
    }
    Ok(entries)
}
