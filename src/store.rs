//! Write-through JSON file storage.
//!
//! Each repository owns one [`JsonStore`] per entity family. The on-disk
//! format is a single JSON object keyed by entity id, with dates as
//! ISO-8601 strings. Every mutation rewrites the whole file before the
//! call returns; there is no append log and no batching. A per-store mutex
//! serializes load-mutate-save cycles within the process.
//!
//! Loading tolerates a missing file (empty store). A malformed individual
//! record is logged and skipped so one bad entry cannot abort startup.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::Result;

/// A mutex-guarded, file-backed map of id to entity.
pub struct JsonStore<T> {
    path: PathBuf,
    entries: Mutex<HashMap<String, T>>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Open the store at `path`, creating parent directories and loading
    /// whatever valid entries the file holds.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let entries = load_entries(&path);
        Ok(JsonStore {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Run a read-only closure over the entries.
    pub fn read<R>(&self, f: impl FnOnce(&HashMap<String, T>) -> R) -> R {
        let entries = self.entries.lock().expect("store lock poisoned");
        f(&entries)
    }

    /// Run a mutating closure over the entries, then rewrite the file.
    ///
    /// The closure works on a copy; it is committed to memory only after
    /// the file write succeeds, so a failed validation or failed write
    /// leaves no partial state behind.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut HashMap<String, T>) -> Result<R>) -> Result<R> {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        let mut next = entries.clone();
        let result = f(&mut next)?;
        let json = serde_json::to_string_pretty(&next)?;
        fs::write(&self.path, json)?;
        *entries = next;
        Ok(result)
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.read(|entries| entries.get(id).cloned())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read(|entries| entries.contains_key(id))
    }

    pub fn len(&self) -> usize {
        self.read(|entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Load the id-keyed object at `path`, skipping entries that fail to
/// deserialize. An unreadable or unparseable file yields an empty map.
fn load_entries<T: DeserializeOwned>(path: &Path) -> HashMap<String, T> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read store file; starting empty");
            return HashMap::new();
        }
    };

    let values: HashMap<String, serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(values) => values,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store file is not valid JSON; starting empty");
            return HashMap::new();
        }
    };

    let mut entries = HashMap::with_capacity(values.len());
    for (id, value) in values {
        match serde_json::from_value(value) {
            Ok(entity) => {
                entries.insert(id, entity);
            }
            Err(e) => {
                warn!(path = %path.display(), id = %id, error = %e, "Skipping malformed record");
            }
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: String,
        weight: u32,
    }

    fn widget(id: &str, weight: u32) -> Widget {
        Widget {
            id: id.to_string(),
            weight,
        }
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonStore<Widget> = JsonStore::open(dir.path().join("widgets.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn mutations_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widgets.json");

        let store: JsonStore<Widget> = JsonStore::open(&path).unwrap();
        store
            .mutate(|entries| {
                entries.insert("w-1".to_string(), widget("w-1", 7));
                entries.insert("w-2".to_string(), widget("w-2", 9));
                Ok(())
            })
            .unwrap();

        let reloaded: JsonStore<Widget> = JsonStore::open(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("w-1"), Some(widget("w-1", 7)));
        assert_eq!(reloaded.get("w-2"), Some(widget("w-2", 9)));
    }

    #[test]
    fn malformed_record_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widgets.json");
        fs::write(
            &path,
            r#"{
                "w-1": {"id": "w-1", "weight": 3},
                "w-2": {"id": "w-2", "weight": "not a number"}
            }"#,
        )
        .unwrap();

        let store: JsonStore<Widget> = JsonStore::open(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains("w-1"));
        assert!(!store.contains("w-2"));
    }

    #[test]
    fn unparseable_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widgets.json");
        fs::write(&path, "not json at all").unwrap();

        let store: JsonStore<Widget> = JsonStore::open(&path).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn failed_closure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widgets.json");

        let store: JsonStore<Widget> = JsonStore::open(&path).unwrap();
        let result: Result<()> = store.mutate(|entries| {
            entries.insert("w-1".to_string(), widget("w-1", 1));
            Err(Error::validation("rejected"))
        });
        assert!(result.is_err());

        // Neither memory nor disk saw the rejected insert.
        assert!(store.is_empty());
        let reloaded: JsonStore<Widget> = JsonStore::open(&path).unwrap();
        assert!(reloaded.is_empty());
    }
}
