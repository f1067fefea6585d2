use std::fmt;

use pathdb_types::{Entry, MetaFlags, ObjectMeta, Path};
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Confirmation string carried by every successful put.
pub const PUT_CONFIRMATION: &str = "success";

/// All message types in the metadata protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaMessage {
    Put { path: Path, small_value: Vec<u8> },
    Get { path: Path },
    Delete { path: Path },
    List {
        prefix: Path,
        start_after: Option<Path>,
        limit: u32,
        recurse: bool,
        flags: MetaFlags,
    },
    PutAck { confirmation: String },
    Object { path: Path, small_value: Vec<u8>, meta: ObjectMeta },
    Deleted,
    ListPage { entries: Vec<Entry>, more: bool },
    Error { code: ErrorCode, message: String },
}

/// Coarse failure classes reported to RPC clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    Unavailable,
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidArgument => "invalid-argument",
            Self::NotFound => "not-found",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl MetaMessage {
    pub fn put_ack() -> Self {
        Self::PutAck {
            confirmation: PUT_CONFIRMATION.into(),
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Put { .. } => 1,
            Self::Get { .. } => 2,
            Self::Delete { .. } => 3,
            Self::List { .. } => 4,
            Self::PutAck { .. } => 17,
            Self::Object { .. } => 18,
            Self::Deleted => 19,
            Self::ListPage { .. } => 20,
            Self::Error { .. } => 255,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Put { .. } => "Put",
            Self::Get { .. } => "Get",
            Self::Delete { .. } => "Delete",
            Self::List { .. } => "List",
            Self::PutAck { .. } => "PutAck",
            Self::Object { .. } => "Object",
            Self::Deleted => "Deleted",
            Self::ListPage { .. } => "ListPage",
            Self::Error { .. } => "Error",
        }
    }

    /// Requests flow client to server; everything else is a response.
    pub fn is_request(&self) -> bool {
        self.type_tag() < 16
    }
}
