/// Errors from ordered store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying storage medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A log record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A thread panicked while holding the store lock.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// The store was destroyed and can no longer be used.
    #[error("store is closed")]
    Closed,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
