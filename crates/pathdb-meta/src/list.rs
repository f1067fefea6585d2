//! Hierarchical listing over a flat, ordered keyspace.
//!
//! A listing walks the key range below `prefix` in ascending order. In
//! recursive mode every stored key becomes a leaf entry. Otherwise each key
//! is folded to the child of `prefix` it lives under: a child with nothing
//! below it is a leaf, a child with descendants becomes a single directory
//! marker, and the scan jumps straight to the first key past that child's
//! subtree. The jump costs at most one adapter call per marker no matter
//! how many keys the subtree holds.
//!
//! # Cursors
//!
//! The continuation cursor is the path of the last entry returned. Resuming
//! recursively starts at the first key after the cursor. Resuming a
//! non-recursive listing starts after the cursor's whole subtree (truncated
//! to the listing depth), so a marker is never repeated.
//!
//! # Consistency
//!
//! A listing reads through several scans and is not a snapshot. Puts and
//! deletes that race with it may or may not be reflected in its pages.

use std::collections::VecDeque;

use pathdb_store::{KeyValue, OrderedStore, StoreError};
use pathdb_types::codec::{self, child_range_start, key_successor, subtree_end};
use pathdb_types::{Entry, MetaFlags, ObjectMeta, Path};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::MetaConfig;
use crate::error::{MetaError, MetaResult};
use crate::record::Record;

/// Parameters of one listing call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    /// Only keys strictly below this path are listed.
    pub prefix: Path,
    /// Exclusive resume point; `None` starts at the beginning of `prefix`.
    pub start_after: Option<Path>,
    /// Maximum entries per page; `0` selects the configured default.
    pub limit: usize,
    /// Descend into every level instead of folding children into markers.
    pub recurse: bool,
    pub flags: MetaFlags,
}

impl ListRequest {
    /// `recurse` has no default: callers must choose.
    pub fn new(prefix: Path, recurse: bool) -> Self {
        Self {
            prefix,
            start_after: None,
            limit: 0,
            recurse,
            flags: MetaFlags::NONE,
        }
    }

    pub fn start_after(mut self, cursor: Path) -> Self {
        self.start_after = Some(cursor);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn flags(mut self, flags: MetaFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// One page of a listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPage {
    /// Entries in strictly ascending path order.
    pub entries: Vec<Entry>,
    /// `true` if entries remain after the last one returned.
    pub more: bool,
}

impl ListPage {
    /// The cursor for the next page, if there is one.
    pub fn next_start_after(&self) -> Option<&Path> {
        if !self.more {
            return None;
        }
        self.entries.last().map(|e| &e.path)
    }
}

/// Produce one page of `request` from `store`.
///
/// A scan error aborts the call with [`MetaError::StorageUnavailable`] and a
/// cancelled `cancel` token with [`MetaError::Cancelled`]; in both cases the
/// partially built page is dropped.
pub fn list_page(
    store: &dyn OrderedStore,
    config: &MetaConfig,
    request: &ListRequest,
    cancel: Option<&CancellationToken>,
) -> MetaResult<ListPage> {
    let prefix = &request.prefix;
    let depth = prefix.depth();
    let limit = config.effective_limit(request.limit);
    let range = child_range_start(prefix);

    let mut start = range.clone();
    if let Some(after) = request.start_after.as_ref().filter(|p| !p.is_root()) {
        let resume = resume_key(prefix, after, request.recurse);
        if resume > start {
            start = resume;
        }
    }

    let scan_err = |source: StoreError| MetaError::StorageUnavailable {
        op: "list",
        path: prefix.to_string(),
        source,
    };

    let mut keys = KeyCursor::new(store, config.batch_for(limit), start, range);
    let mut entries = Vec::new();

    while entries.len() < limit {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(MetaError::Cancelled {
                op: "list",
                path: prefix.to_string(),
            });
        }

        let Some(kv) = keys.next().map_err(scan_err)? else {
            break;
        };
        let path = codec::decode(&kv.key)
            .map_err(|source| MetaError::InvalidEncoding { op: "list", source })?;

        if request.recurse {
            let meta = hydrate(&path, &kv.value, request.flags)?;
            entries.push(Entry::leaf(path, meta));
            continue;
        }

        let child = path.truncated(depth + 1);
        let has_descendants = if path.depth() > depth + 1 {
            true
        } else {
            let below = child_range_start(&child);
            keys.peek()
                .map_err(scan_err)?
                .is_some_and(|next| next.key.starts_with(&below))
        };

        if has_descendants {
            if let Some(end) = subtree_end(&child) {
                keys.seek(end);
            }
            entries.push(Entry::prefix(child));
        } else {
            let meta = hydrate(&path, &kv.value, request.flags)?;
            entries.push(Entry::leaf(path, meta));
        }
    }

    let more = entries.len() >= limit && keys.peek().map_err(scan_err)?.is_some();

    debug!(
        prefix = %prefix,
        recurse = request.recurse,
        entries = entries.len(),
        more,
        scans = keys.scans(),
        "listed page"
    );
    Ok(ListPage { entries, more })
}

/// First key to scan when resuming after `after`.
fn resume_key(prefix: &Path, after: &Path, recurse: bool) -> Vec<u8> {
    if !recurse && after.is_descendant_of(prefix) {
        let child = after.truncated(prefix.depth() + 1);
        if let Some(end) = subtree_end(&child) {
            return end;
        }
    }
    key_successor(&codec::encode(after))
}

fn hydrate(path: &Path, value: &[u8], flags: MetaFlags) -> MetaResult<Option<ObjectMeta>> {
    if flags.is_none() {
        return Ok(None);
    }
    let record = Record::decode(value).map_err(|source| MetaError::CorruptRecord {
        path: path.clone(),
        source,
    })?;
    Ok(Some(record.hydrate(flags)))
}

/// Buffered forward iterator over the keys of one range.
///
/// Keys are fetched from the store `batch` at a time. [`KeyCursor::seek`]
/// discards buffered keys below the target and, if the buffer runs dry,
/// makes the next fetch start at the target.
struct KeyCursor<'a> {
    store: &'a dyn OrderedStore,
    batch: usize,
    /// Every key of the range starts with this.
    range: Vec<u8>,
    buffer: VecDeque<KeyValue>,
    /// Start of the next fetch; `None` once the range is exhausted.
    next_start: Option<Vec<u8>>,
    scans: usize,
}

impl<'a> KeyCursor<'a> {
    fn new(store: &'a dyn OrderedStore, batch: usize, start: Vec<u8>, range: Vec<u8>) -> Self {
        Self {
            store,
            batch,
            range,
            buffer: VecDeque::new(),
            next_start: Some(start),
            scans: 0,
        }
    }

    fn scans(&self) -> usize {
        self.scans
    }

    fn next(&mut self) -> Result<Option<KeyValue>, StoreError> {
        self.fill()?;
        Ok(self.buffer.pop_front())
    }

    fn peek(&mut self) -> Result<Option<&KeyValue>, StoreError> {
        self.fill()?;
        Ok(self.buffer.front())
    }

    fn seek(&mut self, target: Vec<u8>) {
        let skip = self.buffer.partition_point(|kv| kv.key < target);
        self.buffer.drain(..skip);
        if self.buffer.is_empty() {
            if let Some(next) = self.next_start.as_mut() {
                if *next < target {
                    *next = target;
                }
            }
        }
    }

    fn fill(&mut self) -> Result<(), StoreError> {
        if !self.buffer.is_empty() {
            return Ok(());
        }
        let Some(start) = self.next_start.take() else {
            return Ok(());
        };

        let batch = self.store.scan(&start, self.batch)?;
        self.scans += 1;

        let full = batch.len() >= self.batch;
        let mut left_range = false;
        for kv in batch {
            if !kv.key.starts_with(&self.range) {
                left_range = true;
                break;
            }
            self.buffer.push_back(kv);
        }

        if full && !left_range {
            if let Some(last) = self.buffer.back() {
                self.next_start = Some(key_successor(&last.key));
            }
        }
        Ok(())
    }
}
