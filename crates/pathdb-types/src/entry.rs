use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::path::Path;

/// Optional attributes of a stored object.
///
/// Which fields are filled in is governed by [`crate::MetaFlags`]; fields
/// that were not requested keep their `Default` value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Length of the stored value in bytes.
    pub size: u64,
    /// Last modification, in milliseconds since the UNIX epoch.
    pub modified_ms: u64,
    /// BLAKE3 hash of the stored value.
    pub checksum: Option<[u8; 32]>,
    /// Caller-supplied key/value annotations.
    pub custom: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Hex form of the checksum, if one was computed.
    pub fn checksum_hex(&self) -> Option<String> {
        self.checksum.map(hex::encode)
    }

    /// Returns `true` if no field carries a value.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One row of a listing.
///
/// A *leaf* is an object that exists in the store. A *prefix* entry is a
/// directory marker: a synthetic row standing for every object below
/// `path`. Markers are never stored and never carry metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub path: Path,
    pub is_prefix: bool,
    pub meta: Option<ObjectMeta>,
}

impl Entry {
    pub fn leaf(path: Path, meta: Option<ObjectMeta>) -> Self {
        Self {
            path,
            is_prefix: false,
            meta,
        }
    }

    pub fn prefix(path: Path) -> Self {
        Self {
            path,
            is_prefix: true,
            meta: None,
        }
    }
}
