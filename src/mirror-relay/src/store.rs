//! Correlation between source messages and their mirrored copies.
//!
//! Every public method takes the single store lock for its whole duration,
//! so a sweep always sees a consistent snapshot. Entries live for a fixed
//! TTL after their last `set`; expired entries are treated as absent by
//! `get` and physically removed by the sweeps.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{RelayError, RelayResult};
use crate::message::SourceMessage;
use crate::target::TargetMessage;

/// Default lifetime of a correlation entry.
pub const DEFAULT_TTL_HOURS: i64 = 48;

/// One mirrored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntry {
    pub source: SourceMessage,
    pub target: TargetMessage,
    pub expiry: DateTime<Utc>,
}

impl TrackedEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

/// Thread-safe map of source message id to [`TrackedEntry`].
#[derive(Debug)]
pub struct CorrelationStore {
    entries: Mutex<HashMap<String, TrackedEntry>>,
    ttl: TimeDelta,
}

impl Default for CorrelationStore {
    fn default() -> Self {
        Self::new(TimeDelta::hours(DEFAULT_TTL_HOURS))
    }
}

impl CorrelationStore {
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Track `target` as the mirror of `source`, replacing any previous
    /// entry for the same id and stamping a fresh expiry.
    pub fn set(&self, source: &SourceMessage, target: TargetMessage) {
        self.set_at(source, target, Utc::now());
    }

    pub fn set_at(&self, source: &SourceMessage, target: TargetMessage, now: DateTime<Utc>) {
        let entry = TrackedEntry {
            source: source.clone(),
            target,
            expiry: now
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        self.entries.lock().insert(source.id.clone(), entry);
    }

    /// Live entry for `source_id`.
    pub fn get(&self, source_id: &str) -> Option<TrackedEntry> {
        self.get_at(source_id, Utc::now())
    }

    pub fn get_at(&self, source_id: &str, now: DateTime<Utc>) -> Option<TrackedEntry> {
        self.entries
            .lock()
            .get(source_id)
            .filter(|entry| !entry.is_expired_at(now))
            .cloned()
    }

    /// Stop tracking `source_id`, returning the removed entry.
    pub fn unset(&self, source_id: &str) -> Option<TrackedEntry> {
        self.entries.lock().remove(source_id)
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Swept expired entries");
        }
        removed
    }

    /// Number of entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy of all entries ordered by source id.
    pub fn snapshot(&self) -> BTreeMap<String, TrackedEntry> {
        self.entries
            .lock()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    /// Replace the contents with the entries stored at `path`, then sweep.
    ///
    /// A missing file leaves the store empty. A file that exists but cannot
    /// be parsed is an error.
    pub async fn load(&self, path: &Path) -> RelayResult<usize> {
        debug!(path = %path.display(), "Loading tracked messages");
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "No tracked messages found");
                self.entries.lock().clear();
                return Ok(0);
            }
            Err(e) => {
                return Err(RelayError::Persistence(format!(
                    "error opening {}: {e}",
                    path.display()
                )));
            }
        };

        let loaded: HashMap<String, TrackedEntry> = serde_json::from_str(&content)
            .map_err(|e| {
                RelayError::Persistence(format!("error decoding {}: {e}", path.display()))
            })?;
        *self.entries.lock() = loaded;
        self.sweep_expired();

        let count = self.len();
        info!(count, path = %path.display(), "Tracked messages loaded");
        Ok(count)
    }

    /// Sweep, then rewrite the whole file at `path` atomically.
    pub async fn save(&self, path: &Path) -> RelayResult<usize> {
        self.sweep_expired();
        let (content, count) = {
            let entries = self.entries.lock();
            let ordered: BTreeMap<&String, &TrackedEntry> = entries.iter().collect();
            (serde_json::to_string_pretty(&ordered)?, entries.len())
        };

        atomic_write(path, content.as_bytes())
            .await
            .map_err(|e| RelayError::Persistence(format!("error writing {}: {e}", path.display())))?;
        info!(count, path = %path.display(), "Tracked messages saved");
        Ok(count)
    }
}

/// Write to a temp file in the same directory, then rename over `path`.
async fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent
        && !parent.exists()
    {
        fs::create_dir_all(parent).await?;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("tracked");
    let temp_name = format!(".{}.tmp.{}", file_name, std::process::id());
    let temp_path = match parent {
        Some(parent) => parent.join(temp_name),
        None => temp_name.into(),
    };

    fs::write(&temp_path, content).await?;
    let file = fs::OpenOptions::new().write(true).open(&temp_path).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }
    Ok(())
}
