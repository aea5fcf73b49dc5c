use crate::types::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Identifiers already delivered, kept in insertion order so truncation can
/// drop the oldest entries first.
///
/// The backing file is a JSON array of strings, oldest first. It is read once
/// when the run starts and written once when it ends.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    capacity: usize,
    order: Vec<String>,
    index: HashSet<String>,
    load_warning: Option<String>,
}

impl HistoryStore {
    /// An empty store that will persist to `path`.
    pub fn empty(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
            order: Vec::new(),
            index: HashSet::new(),
            load_warning: None,
        }
    }

    /// Loads the history file. Never fails: a missing file gives an empty
    /// store, an unreadable or corrupt one gives an empty store plus a warning.
    pub async fn load(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let mut store = Self::empty(path, capacity);

        let bytes = match tokio::fs::read(&store.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("History file {} does not exist, starting empty", store.path.display());
                return store;
            }
            Err(e) => {
                store.warn_empty(format!("failed to read {}: {}", store.path.display(), e));
                return store;
            }
        };

        let entries: Vec<serde_json::Value> = match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                store.warn_empty(format!("corrupt history file {}: {}", store.path.display(), e));
                return store;
            }
        };

        let mut skipped = 0;
        for entry in entries {
            match entry.as_str() {
                Some(id) if !id.is_empty() => {
                    store.insert(id);
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!("Skipped {} malformed history entries", skipped);
        }
        store.truncate_to_capacity();

        info!("Loaded {} history entries from {}", store.len(), store.path.display());
        store
    }

    fn warn_empty(&mut self, message: String) {
        warn!("{}, using empty history", message);
        self.load_warning = Some(message);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Appends identifiers in order. Duplicates and empty ids are ignored;
    /// an id already present keeps its original position.
    pub fn record<I, S>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for id in ids {
            if self.insert(id.as_ref()) {
                added += 1;
            }
        }
        debug!("Recorded {} new history entries", added);
        added
    }

    fn insert(&mut self, id: &str) -> bool {
        if id.is_empty() || self.index.contains(id) {
            return false;
        }
        self.index.insert(id.to_string());
        self.order.push(id.to_string());
        true
    }

    fn truncate_to_capacity(&mut self) -> usize {
        if self.order.len() <= self.capacity {
            return 0;
        }
        let excess = self.order.len() - self.capacity;
        for evicted in self.order.drain(..excess) {
            self.index.remove(&evicted);
        }
        info!("History truncated to {} entries ({} evicted)", self.capacity, excess);
        excess
    }

    /// Writes the most recent `capacity` entries. The file is replaced via a
    /// temporary sibling so an interrupted write leaves the old file intact.
    pub async fn persist(&mut self) -> Result<usize> {
        self.truncate_to_capacity();

        let json = serde_json::to_string_pretty(&self.order)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                warn!("Could not remove {}: {}", tmp.display(), cleanup);
            }
            return Err(e.into());
        }

        info!("Saved {} history entries to {}", self.order.len(), self.path.display());
        Ok(self.order.len())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn load_warning(&self) -> Option<&str> {
        self.load_warning.as_deref()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "history.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_loads_empty_without_warning() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::load(dir.path().join("history.json"), 10).await;
        assert!(store.is_empty());
        assert!(store.load_warning().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty_with_warning() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        tokio::fs::write(&path, b"[\"a\", \"b\"").await.unwrap();

        let store = HistoryStore::load(&path, 10).await;
        assert!(store.is_empty());
        assert!(store.load_warning().unwrap().contains("corrupt"));
    }

    #[tokio::test]
    async fn non_string_entries_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        tokio::fs::write(&path, br#"["a", 3, null, "", "b"]"#).await.unwrap();

        let store = HistoryStore::load(&path, 10).await;
        assert_eq!(store.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn record_ignores_duplicates_and_empty_ids() {
        let mut store = HistoryStore::empty("unused.json", 10);
        assert_eq!(store.record(["a", "b", "a", ""]), 2);
        assert_eq!(store.record(["b", "c"]), 1);
        assert_eq!(store.iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert!(store.contains("c"));
        assert!(!store.contains(""));
    }

    #[tokio::test]
    async fn persist_keeps_most_recent_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        let capacity = 5;
        let mut store = HistoryStore::empty(&path, capacity);

        let ids: Vec<String> = (0..capacity + 3).map(|i| format!("id-{i}")).collect();
        store.record(&ids);
        assert_eq!(store.persist().await.unwrap(), capacity);

        let saved: Vec<String> = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(saved, ids[3..].to_vec());
        for old in &ids[..3] {
            assert!(!store.contains(old));
        }
        assert!(!dir.path().join("history.json.tmp").exists());
    }

    #[tokio::test]
    async fn oversized_file_is_truncated_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        tokio::fs::write(&path, br#"["a", "b", "c", "d"]"#).await.unwrap();

        let store = HistoryStore::load(&path, 2).await;
        assert_eq!(store.iter().collect::<Vec<_>>(), vec!["c", "d"]);
    }

    #[tokio::test]
    async fn persist_then_load_round_trips_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("history.json");
        let mut store = HistoryStore::empty(&path, 100);
        store.record(["z", "a", "m"]);
        store.persist().await.unwrap();

        let reloaded = HistoryStore::load(&path, 100).await;
        assert_eq!(reloaded.iter().collect::<Vec<_>>(), vec!["z", "a", "m"]);
    }

    #[tokio::test]
    async fn persist_reports_write_failure() {
        let dir = tempdir().unwrap();
        // A directory cannot be replaced by a file rename.
        let path = dir.path().join("occupied");
        tokio::fs::create_dir(&path).await.unwrap();
        tokio::fs::write(path.join("inner"), b"x").await.unwrap();

        let mut store = HistoryStore::empty(&path, 10);
        store.record(["a"]);
        assert!(store.persist().await.is_err());
        assert!(!dir.path().join("occupied.tmp").exists());
        assert!(path.is_dir());
    }
}
