//! Host facilities injected into service modules.
//!
//! A [`CapabilitySet`] is the ONLY surface a module can reach: its members
//! are installed into the module's context at instantiation and the set is
//! fixed from then on. Members are shared across all modules (`Arc`, not
//! copied) and must provide their own internal thread safety; the core does
//! not serialize access to them.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use apiary_common::{ApiaryError, Result};

/// Narrow storage interface exposed to modules as the `db` capability.
///
/// The actual persistence layer is outside this crate's scope; this trait is
/// the seam it plugs into. `mask` in [`Storage::find`] is an id prefix.
pub trait Storage: Send + Sync {
    fn read(&self, table: &str, id: &str) -> Result<Option<Value>>;
    fn write(&self, table: &str, id: &str, record: Value) -> Result<()>;
    fn remove(&self, table: &str, id: &str) -> Result<bool>;
    fn find(&self, table: &str, mask: &str) -> Result<Vec<Value>>;
}

/// In-memory [`Storage`] used by tests, demos and standalone servers.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStore {
    fn read(&self, table: &str, id: &str) -> Result<Option<Value>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| ApiaryError::Storage("store lock poisoned".into()))?;
        Ok(tables.get(table).and_then(|t| t.get(id)).cloned())
    }

    fn write(&self, table: &str, id: &str, record: Value) -> Result<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| ApiaryError::Storage("store lock poisoned".into()))?;
        tables
            .entry(table.to_string())
            .or_default()
            .insert(id.to_string(), record);
        Ok(())
    }

    fn remove(&self, table: &str, id: &str) -> Result<bool> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| ApiaryError::Storage("store lock poisoned".into()))?;
        Ok(tables.get_mut(table).map_or(false, |t| t.remove(id).is_some()))
    }

    fn find(&self, table: &str, mask: &str) -> Result<Vec<Value>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| ApiaryError::Storage("store lock poisoned".into()))?;
        Ok(tables
            .get(table)
            .map(|t| {
                t.iter()
                    .filter(|(id, _)| id.starts_with(mask))
                    .map(|(_, record)| record.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// The fixed facility set handed to every module.
#[derive(Clone)]
pub struct CapabilitySet {
    pub storage: Arc<dyn Storage>,
}

impl CapabilitySet {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        CapabilitySet { storage }
    }

    /// Capability set backed by a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();

        store.write("user", "3", json!({"name": "x"})).unwrap();
        assert_eq!(store.read("user", "3").unwrap(), Some(json!({"name": "x"})));
        assert_eq!(store.read("user", "4").unwrap(), None);
    }

    #[test]
    fn memory_store_remove() {
        let store = MemoryStore::new();

        store.write("user", "3", json!({})).unwrap();
        assert!(store.remove("user", "3").unwrap());
        assert!(!store.remove("user", "3").unwrap());
        assert_eq!(store.read("user", "3").unwrap(), None);
    }

    #[test]
    fn memory_store_find_matches_id_prefix() {
        let store = MemoryStore::new();

        store.write("user", "ab1", json!({"n": 1})).unwrap();
        store.write("user", "ab2", json!({"n": 2})).unwrap();
        store.write("user", "zz9", json!({"n": 3})).unwrap();

        let found = store.find("user", "ab").unwrap();
        assert_eq!(found, vec![json!({"n": 1}), json!({"n": 2})]);

        assert!(store.find("country", "ab").unwrap().is_empty());
    }
}
