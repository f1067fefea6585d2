use pathdb_store::StoreError;
use pathdb_types::{Path, TypeError};
use thiserror::Error;

/// Errors from metadata store operations.
///
/// Adapter failures are carried verbatim as the error source, together with
/// the operation and path they occurred on. Nothing is retried here.
#[derive(Debug, Error)]
pub enum MetaError {
    /// The caller supplied a path that cannot address an object.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The caller named a metadata flag that does not exist.
    #[error("unknown metadata flag: {0}")]
    UnknownFlag(String),

    /// A stored key does not decode to a path.
    #[error("invalid key encoding during {op}: {source}")]
    InvalidEncoding {
        op: &'static str,
        #[source]
        source: TypeError,
    },

    /// No record exists at exactly this path.
    #[error("not found: {path}")]
    NotFound { path: Path },

    /// Reading from the ordered store failed.
    #[error("storage unavailable during {op} of {path:?}: {source}")]
    StorageUnavailable {
        op: &'static str,
        path: String,
        #[source]
        source: StoreError,
    },

    /// Writing to the ordered store failed.
    #[error("I/O failure during {op} of {path:?}: {source}")]
    IoFailure {
        op: &'static str,
        path: String,
        #[source]
        source: StoreError,
    },

    /// A stored value is not a valid record.
    #[error("corrupt record at {path}: {source}")]
    CorruptRecord {
        path: Path,
        #[source]
        source: RecordError,
    },

    /// A record could not be serialized for writing.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The caller abandoned the operation.
    #[error("{op} of {path:?} cancelled")]
    Cancelled { op: &'static str, path: String },
}

impl MetaError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for errors caused by caller input rather than storage.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidPath { .. } | Self::UnknownFlag(_))
    }
}

impl From<TypeError> for MetaError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidPath { path, reason } => Self::InvalidPath { path, reason },
            TypeError::UnknownFlag(flag) => Self::UnknownFlag(flag),
            err @ TypeError::InvalidEncoding { .. } => Self::InvalidEncoding {
                op: "decode",
                source: err,
            },
        }
    }
}

/// Errors decoding the stored record envelope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("value is too short to hold a record header")]
    Truncated,

    #[error("bad record magic 0x{0:02x}")]
    BadMagic(u8),

    #[error("unsupported record version {0}")]
    UnsupportedVersion(u8),

    #[error("record body does not decode: {0}")]
    Body(String),
}

/// Result alias for metadata store operations.
pub type MetaResult<T> = Result<T, MetaError>;
