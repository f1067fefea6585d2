use thiserror::Error;

/// Errors produced by path and flag operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid key encoding at byte {offset}: {reason}")]
    InvalidEncoding { offset: usize, reason: String },

    #[error("unknown metadata flag: {0}")]
    UnknownFlag(String),
}
