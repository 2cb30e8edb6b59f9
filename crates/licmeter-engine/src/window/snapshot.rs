//! Window snapshot file
//!
//! Keeps the window start and per-host tallies between invocations. A
//! missing or unreadable file is never fatal: the tick starts a fresh window.
//! So does a window start that is not positive or lies after the tick.
//! Writes go to a sibling temp file that is then renamed over the snapshot.
//! Only one writer may run at a time; the caller's scheduler guarantees that.

use licmeter_common::{CacheError, HostRecord, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Persisted window state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Start of the current window (Unix millis)
    pub last_millis: i64,
    /// Host tallies keyed by host id
    #[serde(default)]
    pub hosts: BTreeMap<String, HostRecord>,
}

impl CacheSnapshot {
    /// Empty snapshot whose window starts at `now_millis`
    pub fn fresh(now_millis: i64) -> Self {
        Self {
            last_millis: now_millis,
            hosts: BTreeMap::new(),
        }
    }

    /// Close the window: drop host tallies and move the start forward.
    ///
    /// Returns the tallies of the closed window. The start never moves back.
    pub fn reset(&mut self, now_millis: i64) -> BTreeMap<String, HostRecord> {
        self.last_millis = self.last_millis.max(now_millis);
        std::mem::take(&mut self.hosts)
    }
}

/// Snapshot file location and I/O
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot, falling back to a fresh window at `now_millis`
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self, now_millis: i64) -> CacheSnapshot {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("No snapshot yet, starting a fresh window");
                return CacheSnapshot::fresh(now_millis);
            }
            Err(e) => {
                warn!(error = %e, "Failed to read snapshot, starting a fresh window");
                return CacheSnapshot::fresh(now_millis);
            }
        };

        if data.trim().is_empty() {
            warn!("Snapshot is empty, starting a fresh window");
            return CacheSnapshot::fresh(now_millis);
        }

        match serde_json::from_str::<CacheSnapshot>(&data) {
            Ok(snapshot) if snapshot.last_millis <= 0 || snapshot.last_millis > now_millis => {
                warn!(
                    last_millis = snapshot.last_millis,
                    now_millis,
                    "Snapshot window start out of range, starting a fresh window"
                );
                CacheSnapshot::fresh(now_millis)
            }
            Ok(snapshot) => {
                debug!(hosts = snapshot.hosts.len(), last_millis = snapshot.last_millis, "Loaded snapshot");
                snapshot
            }
            Err(e) => {
                warn!(error = %e, bytes = data.len(), "Corrupt snapshot, starting a fresh window");
                CacheSnapshot::fresh(now_millis)
            }
        }
    }

    /// Replace the snapshot file
    #[instrument(skip(self, snapshot), fields(path = %self.path.display(), hosts = snapshot.hosts.len()))]
    pub async fn store(&self, snapshot: &CacheSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot).map_err(|e| CacheError::Encode(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| self.write_error(&e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.write_error(&e))?;

        debug!(last_millis = snapshot.last_millis, "Stored snapshot");
        Ok(())
    }

    fn write_error(&self, err: &std::io::Error) -> CacheError {
        CacheError::Write {
            path: self.path.display().to_string(),
            reason: err.to_string(),
        }
    }
}
