use crate::error::StoreResult;

/// One key/value pair returned by a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl KeyValue {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Sorted key-value store over raw byte keys.
///
/// All implementations must satisfy these invariants:
/// - Keys compare by plain lexicographic byte order.
/// - `put` and `delete` are atomic per key. Nothing is atomic across keys,
///   so a scan running concurrently with writes may or may not observe them.
/// - `scan` yields ascending keys and returns `min(limit, remaining)` pairs.
/// - All I/O errors are propagated, never silently ignored.
pub trait OrderedStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Read the value stored under exactly `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Remove `key`. Returns `true` if the key existed.
    fn delete(&self, key: &[u8]) -> StoreResult<bool>;

    /// Return up to `limit` pairs with keys `>= start`, in ascending order.
    fn scan(&self, start: &[u8], limit: usize) -> StoreResult<Vec<KeyValue>>;

    /// Release the store and remove any state it owns outside the process.
    ///
    /// After `destroy`, every operation fails with
    /// [`StoreError::Closed`](crate::StoreError::Closed). Destroying an
    /// already destroyed store is a no-op.
    fn destroy(&self) -> StoreResult<()>;
}
