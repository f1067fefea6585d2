use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{KeyValue, OrderedStore};

/// A single mutation persisted in the log.
///
/// On-disk format:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized LogRecord)]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum LogRecord {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Flush/sync strategy for the log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every write (safest, highest latency).
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    #[default]
    OsDefault,
}

/// Configuration for [`FileOrderedStore`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreConfig {
    pub sync_mode: SyncMode,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Appending side of the log.
struct LogWriter {
    writer: BufWriter<File>,
    /// Current end of the log file.
    offset: u64,
}

/// File-backed ordered store.
///
/// The authoritative state is an append-only log of puts and deletes. On
/// open the log is replayed front-to-back into an in-memory `BTreeMap`,
/// which then serves all reads and scans. Records failing their CRC are
/// skipped; a torn tail is cut off so later appends land on a clean
/// boundary. [`FileOrderedStore::compact`] rewrites the log to hold one
/// record per live key.
pub struct FileOrderedStore {
    path: PathBuf,
    /// Appends are serialized here; `None` once destroyed.
    writer: Mutex<Option<LogWriter>>,
    index: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    closed: AtomicBool,
    config: FileStoreConfig,
}

impl FileOrderedStore {
    /// Open (or create) the store backed by the log file at `path`.
    pub fn open(path: &Path, config: FileStoreConfig) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (index, valid_len) = replay(path)?;
        if valid_len < file.metadata()?.len() {
            warn!(path = %path.display(), valid_len, "truncating torn log tail");
            file.set_len(valid_len)?;
        }

        debug!(path = %path.display(), keys = index.len(), "opened file store");
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(Some(LogWriter {
                writer: BufWriter::new(file),
                offset: valid_len,
            })),
            index: RwLock::new(index),
            closed: AtomicBool::new(false),
            config,
        })
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the log in bytes.
    pub fn log_len(&self) -> StoreResult<u64> {
        let guard = self.lock_writer()?;
        guard.as_ref().map(|w| w.offset).ok_or(StoreError::Closed)
    }

    /// Number of live keys.
    pub fn len(&self) -> StoreResult<usize> {
        self.ensure_open()?;
        Ok(self.read_index()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Rewrite the log so it holds exactly one `Put` per live key.
    ///
    /// The new log is written to a temporary file in the same directory and
    /// atomically renamed over the old one.
    pub fn compact(&self) -> StoreResult<()> {
        let mut guard = self.lock_writer()?;
        if guard.is_none() {
            return Err(StoreError::Closed);
        }

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        let mut offset = 0u64;
        {
            let index = self.read_index()?;
            let mut out = BufWriter::new(tmp.as_file_mut());
            for (key, value) in index.iter() {
                offset += write_record(
                    &mut out,
                    &LogRecord::Put {
                        key: key.clone(),
                        value: value.clone(),
                    },
                )?;
            }
            out.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;

        let file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        *guard = Some(LogWriter {
            writer: BufWriter::new(file),
            offset,
        });

        debug!(path = %self.path.display(), log_len = offset, "compacted file store");
        Ok(())
    }

    fn append(&self, writer: &mut LogWriter, record: &LogRecord) -> StoreResult<()> {
        let written = write_record(&mut writer.writer, record)?;
        writer.writer.flush()?;
        if self.config.sync_mode == SyncMode::EveryWrite {
            writer.writer.get_ref().sync_all()?;
        }
        writer.offset += written;
        Ok(())
    }

    fn lock_writer(&self) -> StoreResult<MutexGuard<'_, Option<LogWriter>>> {
        self.writer
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn read_index(&self) -> StoreResult<RwLockReadGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>> {
        self.index
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write_index(&self) -> StoreResult<RwLockWriteGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>> {
        self.index
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl OrderedStore for FileOrderedStore {
    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let mut guard = self.lock_writer()?;
        let writer = guard.as_mut().ok_or(StoreError::Closed)?;
        self.append(
            writer,
            &LogRecord::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            },
        )?;
        self.write_index()?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.read_index()?.get(key).cloned())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        let mut guard = self.lock_writer()?;
        let writer = guard.as_mut().ok_or(StoreError::Closed)?;
        if !self.read_index()?.contains_key(key) {
            return Ok(false);
        }
        self.append(writer, &LogRecord::Delete { key: key.to_vec() })?;
        self.write_index()?.remove(key);
        Ok(true)
    }

    fn scan(&self, start: &[u8], limit: usize) -> StoreResult<Vec<KeyValue>> {
        self.ensure_open()?;
        let index = self.read_index()?;
        Ok(index
            .range(start.to_vec()..)
            .take(limit)
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
            .collect())
    }

    fn destroy(&self) -> StoreResult<()> {
        let mut guard = self.lock_writer()?;
        if guard.take().is_none() {
            return Ok(());
        }
        self.closed.store(true, Ordering::Release);
        self.write_index()?.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!(path = %self.path.display(), "destroyed file store");
        Ok(())
    }
}

impl std::fmt::Debug for FileOrderedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileOrderedStore")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish()
    }
}

/// Frame and write one record. Returns the number of bytes written.
fn write_record<W: Write>(out: &mut W, record: &LogRecord) -> StoreResult<u64> {
    let payload =
        bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| StoreError::Serialization(format!("record too large: {} bytes", payload.len())))?;
    let crc = crc32fast::hash(&payload);

    out.write_all(&length.to_le_bytes())?;
    out.write_all(&crc.to_le_bytes())?;
    out.write_all(&payload)?;
    Ok(HEADER_SIZE as u64 + payload.len() as u64)
}

/// Rebuild the index from the log.
///
/// Returns the index and the length of the valid log prefix. Records that
/// fail CRC validation are logged and skipped; replay stops at the first
/// truncated or implausible header.
fn replay(path: &Path) -> StoreResult<(BTreeMap<Vec<u8>, Vec<u8>>, u64)> {
    let mut file = BufReader::new(File::open(path)?);
    let file_len = file.get_ref().metadata()?.len();
    let mut index = BTreeMap::new();
    let mut offset: u64 = 0;
    let mut replayed = 0usize;

    while offset + HEADER_SIZE as u64 <= file_len {
        let mut header = [0u8; HEADER_SIZE];
        match file.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if length == 0 || offset + HEADER_SIZE as u64 + length as u64 > file_len {
            warn!(offset, length, file_len, "invalid log record length; stopping replay");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        match file.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!(offset, "truncated log record; stopping replay");
                break;
            }
            Err(e) => return Err(e.into()),
        }
        offset += HEADER_SIZE as u64 + length as u64;

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; skipping log record"
            );
            continue;
        }

        match bincode::deserialize::<LogRecord>(&payload) {
            Ok(LogRecord::Put { key, value }) => {
                index.insert(key, value);
            }
            Ok(LogRecord::Delete { key }) => {
                index.remove(&key);
            }
            Err(e) => {
                warn!(offset, error = %e, "failed to decode log record; skipping");
                continue;
            }
        }
        replayed += 1;
    }

    debug!(replayed, live = index.len(), "log replay complete");
    Ok((index, offset))
}
