//! Directory-backed store writing one TOML document per section.
use std::{
    collections::{hash_map::Entry, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use bevy::log::debug;
use toml::{Table, Value};

use super::store::{KeyValueStore, StoreError};

/// Caches each document after first read and writes through on every mutation.
#[derive(Debug)]
pub struct TomlFileStore {
    root: PathBuf,
    cache: Mutex<HashMap<String, Table>>,
}

impl TomlFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    fn read_document(&self, file: &str) -> Result<Table, StoreError> {
        let path = self.path_for(file);
        if !path.exists() {
            debug!(target: "storage", "{} not found; starting with an empty section", path.display());
            return Ok(Table::new());
        }

        let raw = fs::read_to_string(&path).map_err(|err| StoreError::io(file, err))?;
        toml::from_str(&raw).map_err(|err| StoreError::parse(file, err))
    }

    fn write_document(&self, file: &str, table: &Table) -> Result<(), StoreError> {
        let path = self.path_for(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| StoreError::io(file, err))?;
        }
        let rendered = toml::to_string(table).map_err(|err| StoreError::serialize(file, err))?;
        fs::write(&path, rendered).map_err(|err| StoreError::io(file, err))
    }

    fn with_document<T>(
        &self,
        file: &str,
        apply: impl FnOnce(&mut Table) -> (T, bool),
    ) -> Result<T, StoreError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let table = match cache.entry(file.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.read_document(file)?),
        };

        let (result, dirty) = apply(table);
        if dirty {
            self.write_document(file, table)?;
        }
        Ok(result)
    }
}

impl KeyValueStore for TomlFileStore {
    fn get(&self, file: &str, key: &str) -> Result<Option<Value>, StoreError> {
        self.with_document(file, |table| (table.get(key).cloned(), false))
    }

    fn set(&self, file: &str, key: &str, value: Value) -> Result<(), StoreError> {
        self.with_document(file, |table| {
            table.insert(key.to_string(), value);
            ((), true)
        })
    }

    fn remove(&self, file: &str, key: &str) -> Result<Option<Value>, StoreError> {
        self.with_document(file, |table| {
            let removed = table.remove(key);
            let dirty = removed.is_some();
            (removed, dirty)
        })
    }

    fn table(&self, file: &str) -> Result<Table, StoreError> {
        self.with_document(file, |table| (table.clone(), false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "jobslite-store-{}-{}",
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn writes_through_and_reloads_from_disk() {
        let dir = scratch_dir();
        let store = TomlFileStore::new(&dir);

        let mut record = Table::new();
        record.insert("job".to_string(), Value::from("miner"));
        record.insert("level".to_string(), Value::from(2));
        store
            .set(
                "playerjobdata.toml",
                "player-1",
                Value::Array(vec![Value::Table(record)]),
            )
            .expect("write should succeed");

        let reopened = TomlFileStore::new(&dir);
        let value = reopened
            .get("playerjobdata.toml", "player-1")
            .expect("read should succeed")
            .expect("record should persist");
        let first = &value.as_array().expect("array value")[0];
        assert_eq!(first.get("job").and_then(Value::as_str), Some("miner"));

        assert!(reopened
            .remove("playerjobdata.toml", "player-1")
            .unwrap()
            .is_some());
        assert!(TomlFileStore::new(&dir)
            .keys("playerjobdata.toml")
            .unwrap()
            .is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_document_reports_parse_error() {
        let dir = scratch_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("jobs.toml"), "jobs = [").unwrap();

        let store = TomlFileStore::new(&dir);
        let error = store.table("jobs.toml").expect_err("parse should fail");
        assert!(matches!(error, StoreError::Parse { .. }));

        let _ = fs::remove_dir_all(&dir);
    }
}
