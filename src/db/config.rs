use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Config {
    pub wal_dir: PathBuf,
    pub snapshot_dir: PathBuf,
    /// How many snapshot files to retain after each snapshot.
    pub keep_snapshots: usize,
}

impl Config {
    /// Standard layout: `<data_dir>/wal` and `<data_dir>/snapshots`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            wal_dir: data_dir.join("wal"),
            snapshot_dir: data_dir.join("snapshots"),
            keep_snapshots: 5,
        }
    }

    pub fn keep_snapshots(mut self, count: usize) -> Self {
        self.keep_snapshots = count;
        self
    }
}
