//! Durable per-region visit counters.
//!
//! The whole map is persisted as one JSON document and rewritten on every
//! increment (temp file + rename, so a crash never leaves a torn file).
//! Write volume is one increment per visitor connection, which keeps the
//! full-rewrite scheme comfortably cheap.
//!
//! The store has a single owner (the presence hub actor), which serializes
//! the read-modify-write cycle; counts are monotonically non-decreasing
//! for the lifetime of the store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;

/// Durable region → all-time visit count store.
#[derive(Debug)]
pub struct RegionStatsStore {
    path: PathBuf,
    stats: HashMap<String, u64>,
}

impl RegionStatsStore {
    /// Open the store, loading any previously persisted counters.
    ///
    /// A missing file means no visit has ever been recorded and yields an
    /// empty map. An unreadable or corrupt file is logged and also yields
    /// an empty map: counter degradation is accepted, failing admission
    /// over statistics is not.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stats = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(stats) => stats,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt region stats file, starting with empty counters");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read region stats file, starting with empty counters");
                HashMap::new()
            }
        };
        debug!(path = %path.display(), regions = stats.len(), "Region stats store opened");
        Self { path, stats }
    }

    /// Increment the visit count for `region` and persist the full map.
    ///
    /// The in-memory count is bumped even when the write fails, so the
    /// live roster keeps working; the store may undercount after a crash
    /// that follows a failed write.
    pub async fn increment(&mut self, region: &str) -> Result<u64> {
        let count = self.stats.entry(region.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        self.persist().await?;
        Ok(count)
    }

    /// Current counters. May trail an in-flight increment on another
    /// store instance; the counts are advisory statistics.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.stats.clone()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(&self.stats)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
