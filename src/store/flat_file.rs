use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use tracing::debug;

use super::{FlatStore, write_atomic};
use crate::StorageError;

/// Flat store persisted as one JSON object in a file.
///
/// The whole file is rewritten on each mutation through a temporary file
/// and a rename. An optional byte quota (sum of key and value lengths)
/// rejects writes that would grow the store past it.
#[derive(Debug)]
pub struct FileFlatStore {
    path: PathBuf,
    quota: Option<usize>,
    items: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileFlatStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            quota: None,
            items: Mutex::new(None),
        }
    }

    /// Limit the store to `bytes` of keys plus values.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_items<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut guard = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(items) => f(items),
            None => Err(StorageError::Unavailable(format!(
                "flat store {} is not open",
                self.path.display()
            ))),
        }
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let json = serde_json::to_vec(items)?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        write_atomic(dir, &self.path, &json)?;
        Ok(())
    }
}

fn used_bytes(items: &BTreeMap<String, String>) -> usize {
    items.iter().map(|(k, v)| k.len() + v.len()).sum()
}

impl FlatStore for FileFlatStore {
    fn open(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let items = match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let items = BTreeMap::new();
                self.persist(&items)?;
                items
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Opened flat store {}", self.path.display());
        *self.items.lock().unwrap_or_else(PoisonError::into_inner) = Some(items);
        Ok(())
    }

    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_items(|items| Ok(items.get(key).cloned()))
    }

    fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.with_items(|items| {
            if let Some(quota) = self.quota {
                let current = items.get(key).map_or(0, |old| key.len() + old.len());
                let needed = used_bytes(items) - current + key.len() + value.len();
                if needed > quota {
                    return Err(StorageError::QuotaExceeded { needed, quota });
                }
            }
            let previous = items.insert(key.to_owned(), value);
            if let Err(e) = self.persist(items) {
                match previous {
                    Some(old) => items.insert(key.to_owned(), old),
                    None => items.remove(key),
                };
                return Err(e);
            }
            Ok(())
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.with_items(|items| {
            let Some(previous) = items.remove(key) else {
                return Ok(());
            };
            if let Err(e) = self.persist(items) {
                items.insert(key.to_owned(), previous);
                return Err(e);
            }
            Ok(())
        })
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.with_items(|items| Ok(items.keys().cloned().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("flat.json");

        let store = FileFlatStore::new(&path);
        store.open().unwrap();
        store.set_item("a", "1".to_owned()).unwrap();
        store.set_item("b", "2".to_owned()).unwrap();
        store.remove_item("a").unwrap();
        store.remove_item("missing").unwrap();

        let reopened = FileFlatStore::new(&path);
        reopened.open().unwrap();
        assert_eq!(reopened.get_item("a").unwrap(), None);
        assert_eq!(reopened.get_item("b").unwrap().as_deref(), Some("2"));
        assert_eq!(reopened.keys().unwrap(), vec!["b".to_owned()]);
    }

    #[test]
    fn test_unopened_store_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileFlatStore::new(dir.path().join("flat.json"));
        assert!(matches!(store.get_item("a"), Err(StorageError::Unavailable(_))));
    }

    #[test]
    fn test_quota_rejects_without_changing_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileFlatStore::new(dir.path().join("flat.json")).with_quota(10);
        store.open().unwrap();

        store.set_item("k", "12345".to_owned()).unwrap();
        let err = store.set_item("k", "1234567890".to_owned()).unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { needed: 11, quota: 10 }));
        assert_eq!(store.get_item("k").unwrap().as_deref(), Some("12345"));

        // Replacing a value only counts the difference.
        store.set_item("k", "123456789".to_owned()).unwrap();
    }

    #[test]
    fn test_persist_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileFlatStore::new(dir.path().join("flat.json"));
        store.open().unwrap();
        store.set_item("a", "1".to_owned()).unwrap();
        store.remove_item("a").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("flat.json")]);
    }

    #[test]
    fn test_corrupt_file_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.json");
        fs::write(&path, b"not json").unwrap();

        let store = FileFlatStore::new(&path);
        assert!(matches!(store.open(), Err(StorageError::Serialization(_))));
    }
}
