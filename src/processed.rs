/// Processed Posts Module
///
/// Durable record of post ids the bot has already handled, kept as a flat
/// JSON array on disk. Insertion order is preserved so that the file can be
/// capped to the most recent entries.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Ordered set of post ids, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedSet {
    order: Vec<String>,
    index: HashSet<String>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Record an id. Returns false if it was already present, in which case
    /// its position is left unchanged.
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.index.contains(&id) {
            return false;
        }
        self.index.insert(id.clone());
        self.order.push(id);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// The `cap` most recently added ids, oldest first
    pub fn most_recent(&self, cap: usize) -> &[String] {
        let start = self.order.len().saturating_sub(cap);
        &self.order[start..]
    }
}

impl<S: Into<String>> FromIterator<S> for ProcessedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ProcessedSet::new();
        for id in iter {
            set.add(id);
        }
        set
    }
}

/// Older state files stored numeric ids
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredId {
    Text(String),
    Number(u64),
}

impl From<StoredId> for String {
    fn from(id: StoredId) -> Self {
        match id {
            StoredId::Text(text) => text,
            StoredId::Number(number) => number.to_string(),
        }
    }
}

/// File-backed store for a `ProcessedSet`
#[derive(Debug, Clone)]
pub struct ProcessedStore {
    path: PathBuf,
    cap: usize,
}

impl ProcessedStore {
    pub fn new(path: impl Into<PathBuf>, cap: usize) -> Self {
        Self {
            path: path.into(),
            cap,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the set from disk.
    ///
    /// A missing, unreadable or malformed file yields an empty set.
    pub fn load(&self) -> ProcessedSet {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "No state file at {}, starting with an empty processed set",
                    self.path.display()
                );
                return ProcessedSet::new();
            }
            Err(e) => {
                log::warn!(
                    "Could not read state file {}: {}. Starting empty.",
                    self.path.display(),
                    e
                );
                return ProcessedSet::new();
            }
        };

        if raw.trim().is_empty() {
            return ProcessedSet::new();
        }

        match serde_json::from_str::<Vec<StoredId>>(&raw) {
            Ok(ids) => {
                let set: ProcessedSet = ids.into_iter().map(String::from).collect();
                log::debug!("Loaded {} processed ids from {}", set.len(), self.path.display());
                set
            }
            Err(e) => {
                log::warn!(
                    "State file {} is malformed ({}). Starting with an empty processed set.",
                    self.path.display(),
                    e
                );
                ProcessedSet::new()
            }
        }
    }

    /// Write the most recent `cap` ids to disk, replacing the file atomically.
    pub fn save(&self, set: &ProcessedSet) -> Result<()> {
        let kept = set.most_recent(self.cap);
        let json = serde_json::to_string(kept).context("Failed to encode processed ids")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory {}", parent.display()))?;
        }

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace state file {}", self.path.display()))?;

        log::debug!("Saved {} processed ids to {}", kept.len(), self.path.display());
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "processed".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir, cap: usize) -> ProcessedStore {
        ProcessedStore::new(dir.path().join("processed.json"), cap)
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 10);
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_malformed_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 10);
        fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_empty());

        fs::write(store.path(), r#"{"ids": ["1"]}"#).unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_empty_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 10);
        fs::write(store.path(), "  \n").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_numeric_ids_are_accepted() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 10);
        fs::write(store.path(), r#"[1234567890123, "987"]"#).unwrap();

        let set = store.load();
        assert!(set.contains("1234567890123"));
        assert!(set.contains("987"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 100);
        let set: ProcessedSet = ["a", "1744", "zz-9", "42"].into_iter().collect();

        store.save(&set).unwrap();
        let loaded = store.load();

        assert_eq!(loaded, set);
        assert!(!dir.path().join("processed.json.tmp").exists());
    }

    #[test]
    fn test_save_keeps_most_recent_entries() {
        let dir = TempDir::new().unwrap();
        let cap = 5;
        let store = store_in(&dir, cap);
        let set: ProcessedSet = (1..=8).map(|n| n.to_string()).collect();

        store.save(&set).unwrap();
        let loaded = store.load();

        assert_eq!(loaded.len(), cap);
        let ids: Vec<&str> = loaded.iter().collect();
        assert_eq!(ids, vec!["4", "5", "6", "7", "8"]);
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let store = ProcessedStore::new(dir.path().join("nested/state/processed.json"), 10);
        let set: ProcessedSet = ["1"].into_iter().collect();

        store.save(&set).unwrap();
        assert!(store.load().contains("1"));
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut set = ProcessedSet::new();
        assert!(set.add("1"));
        assert!(set.add("2"));
        assert!(!set.add("1"));

        let ids: Vec<&str> = set.iter().collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_duplicate_ids_in_file_collapse() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 10);
        fs::write(store.path(), r#"["1", "2", "1", 2]"#).unwrap();
        assert_eq!(store.load().len(), 2);
    }
}
