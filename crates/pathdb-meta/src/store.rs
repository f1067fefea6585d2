use std::collections::BTreeMap;
use std::sync::Arc;

use pathdb_store::OrderedStore;
use pathdb_types::{codec, Entry, MetaFlags, ObjectMeta, Path};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MetaConfig;
use crate::error::{MetaError, MetaResult};
use crate::list::{list_page, ListPage, ListRequest};
use crate::record::Record;

/// A fetched object: its value and every stored attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub path: Path,
    pub value: Vec<u8>,
    pub meta: ObjectMeta,
}

/// Path-addressed object metadata over an [`OrderedStore`].
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct MetaStore {
    store: Arc<dyn OrderedStore>,
    config: MetaConfig,
}

impl MetaStore {
    pub fn new(store: Arc<dyn OrderedStore>) -> Self {
        Self::with_config(store, MetaConfig::default())
    }

    pub fn with_config(store: Arc<dyn OrderedStore>, config: MetaConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &MetaConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn OrderedStore> {
        &self.store
    }

    /// Store `value` at `path`, replacing any existing record.
    pub fn put(&self, path: &Path, value: &[u8]) -> MetaResult<()> {
        self.put_with(path, value, BTreeMap::new())
    }

    /// Like [`MetaStore::put`], attaching custom attributes.
    pub fn put_with(
        &self,
        path: &Path,
        value: &[u8],
        custom: BTreeMap<String, String>,
    ) -> MetaResult<()> {
        let key = object_key(path)?;
        let record = Record::new(value.to_vec()).with_custom(custom).encode()?;
        self.store
            .put(&key, &record)
            .map_err(|source| MetaError::IoFailure {
                op: "put",
                path: path.to_string(),
                source,
            })?;
        debug!(path = %path, size = value.len(), "put object");
        Ok(())
    }

    /// Fetch the object stored at exactly `path`.
    pub fn get(&self, path: &Path) -> MetaResult<Object> {
        let key = object_key(path)?;
        let raw = self
            .store
            .get(&key)
            .map_err(|source| MetaError::StorageUnavailable {
                op: "get",
                path: path.to_string(),
                source,
            })?
            .ok_or_else(|| MetaError::NotFound { path: path.clone() })?;
        let record = Record::decode(&raw).map_err(|source| MetaError::CorruptRecord {
            path: path.clone(),
            source,
        })?;
        let meta = record.hydrate(MetaFlags::ALL);
        Ok(Object {
            path: path.clone(),
            value: record.value,
            meta,
        })
    }

    pub fn get_value(&self, path: &Path) -> MetaResult<Vec<u8>> {
        self.get(path).map(|object| object.value)
    }

    /// Remove the record at `path`. Deleting a missing path succeeds.
    pub fn delete(&self, path: &Path) -> MetaResult<()> {
        let key = object_key(path)?;
        let existed = self
            .store
            .delete(&key)
            .map_err(|source| MetaError::IoFailure {
                op: "delete",
                path: path.to_string(),
                source,
            })?;
        debug!(path = %path, existed, "delete object");
        Ok(())
    }

    pub fn list(&self, request: &ListRequest) -> MetaResult<ListPage> {
        list_page(self.store.as_ref(), &self.config, request, None)
    }

    /// Like [`MetaStore::list`], aborting once `cancel` fires.
    pub fn list_cancellable(
        &self,
        request: &ListRequest,
        cancel: &CancellationToken,
    ) -> MetaResult<ListPage> {
        list_page(self.store.as_ref(), &self.config, request, Some(cancel))
    }

    /// Follow continuation cursors until the listing is exhausted.
    pub fn list_all(&self, request: &ListRequest) -> MetaResult<Vec<Entry>> {
        let mut entries = Vec::new();
        let mut page_request = request.clone();
        loop {
            let page = self.list(&page_request)?;
            let next = page.next_start_after().cloned();
            entries.extend(page.entries);
            match next {
                Some(cursor) => page_request.start_after = Some(cursor),
                None => return Ok(entries),
            }
        }
    }

    /// Tear down the backend. Every later call fails.
    pub fn destroy(&self) -> MetaResult<()> {
        match self.store.destroy() {
            Ok(()) => {
                info!("metadata store destroyed");
                Ok(())
            }
            Err(source) => {
                warn!(error = %source, "failed to destroy metadata store");
                Err(MetaError::IoFailure {
                    op: "destroy",
                    path: String::new(),
                    source,
                })
            }
        }
    }
}

impl std::fmt::Debug for MetaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn object_key(path: &Path) -> MetaResult<Vec<u8>> {
    if path.is_root() {
        return Err(MetaError::InvalidPath {
            path: String::new(),
            reason: "the root cannot hold an object".into(),
        });
    }
    Ok(codec::encode(path))
}
