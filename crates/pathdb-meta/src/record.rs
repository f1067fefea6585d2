//! The value envelope stored under every object key.
//!
//! ```text
//! [1 byte: magic 0xB7][1 byte: version][N bytes: bincode(Record)]
//! ```
//!
//! Size and checksum are derived from the inline value on demand rather
//! than stored, so they can never disagree with it.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use pathdb_types::{MetaFlags, ObjectMeta};
use serde::{Deserialize, Serialize};

use crate::error::{MetaError, MetaResult, RecordError};

pub const RECORD_MAGIC: u8 = 0xB7;
pub const RECORD_VERSION: u8 = 1;

/// A stored object: its inline value plus the attributes set at write time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub value: Vec<u8>,
    /// Milliseconds since the UNIX epoch when the record was written.
    pub modified_ms: u64,
    pub custom: BTreeMap<String, String>,
}

impl Record {
    /// A record stamped with the current wall-clock time.
    pub fn new(value: Vec<u8>) -> Self {
        Self {
            value,
            modified_ms: now_ms(),
            custom: BTreeMap::new(),
        }
    }

    pub fn with_custom(mut self, custom: BTreeMap<String, String>) -> Self {
        self.custom = custom;
        self
    }

    pub fn encode(&self) -> MetaResult<Vec<u8>> {
        let body = bincode::serialize(self).map_err(|e| MetaError::Serialization(e.to_string()))?;
        let mut buf = Vec::with_capacity(2 + body.len());
        buf.push(RECORD_MAGIC);
        buf.push(RECORD_VERSION);
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        let [magic, version, body @ ..] = bytes else {
            return Err(RecordError::Truncated);
        };
        if *magic != RECORD_MAGIC {
            return Err(RecordError::BadMagic(*magic));
        }
        if *version != RECORD_VERSION {
            return Err(RecordError::UnsupportedVersion(*version));
        }
        bincode::deserialize(body).map_err(|e| RecordError::Body(e.to_string()))
    }

    /// Project the requested attributes. Unrequested fields stay at their
    /// zero value; the checksum is hashed only when asked for.
    pub fn hydrate(&self, flags: MetaFlags) -> ObjectMeta {
        let mut meta = ObjectMeta::default();
        if flags.contains(MetaFlags::SIZE) {
            meta.size = self.value.len() as u64;
        }
        if flags.contains(MetaFlags::MODIFIED) {
            meta.modified_ms = self.modified_ms;
        }
        if flags.contains(MetaFlags::CHECKSUM) {
            meta.checksum = Some(*blake3::hash(&self.value).as_bytes());
        }
        if flags.contains(MetaFlags::CUSTOM) {
            meta.custom = self.custom.clone();
        }
        meta
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
