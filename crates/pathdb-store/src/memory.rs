use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{StoreError, StoreResult};
use crate::traits::{KeyValue, OrderedStore};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory, `BTreeMap`-based ordered store.
///
/// Intended for tests and embedding. All pairs are held behind a `RwLock`;
/// `None` marks a destroyed store. Values are cloned on read.
pub struct InMemoryOrderedStore {
    map: RwLock<Option<Map>>,
}

impl InMemoryOrderedStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            map: RwLock::new(Some(BTreeMap::new())),
        }
    }

    /// Number of keys currently stored (0 once destroyed).
    pub fn len(&self) -> usize {
        self.read()
            .map(|guard| guard.as_ref().map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    /// Returns `true` if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Option<Map>>> {
        self.map
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Option<Map>>> {
        self.map
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for InMemoryOrderedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderedStore for InMemoryOrderedStore {
    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let mut guard = self.write()?;
        let map = guard.as_mut().ok_or(StoreError::Closed)?;
        map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let guard = self.read()?;
        let map = guard.as_ref().ok_or(StoreError::Closed)?;
        Ok(map.get(key).cloned())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        let mut guard = self.write()?;
        let map = guard.as_mut().ok_or(StoreError::Closed)?;
        Ok(map.remove(key).is_some())
    }

    fn scan(&self, start: &[u8], limit: usize) -> StoreResult<Vec<KeyValue>> {
        let guard = self.read()?;
        let map = guard.as_ref().ok_or(StoreError::Closed)?;
        Ok(map
            .range(start.to_vec()..)
            .take(limit)
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
            .collect())
    }

    fn destroy(&self) -> StoreResult<()> {
        self.write()?.take();
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryOrderedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryOrderedStore")
            .field("key_count", &self.len())
            .finish()
    }
}
