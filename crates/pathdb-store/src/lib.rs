//! Ordered key-value storage for pathdb.
//!
//! pathdb keeps hierarchical metadata in a flat, sorted keyspace. This crate
//! defines the narrow contract the metadata layer needs from a storage
//! engine and ships two engines that satisfy it.
//!
//! # Storage Backends
//!
//! All backends implement the [`OrderedStore`] trait:
//!
//! - [`InMemoryOrderedStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`FileOrderedStore`] -- `BTreeMap` index rebuilt from a CRC-framed
//!   append-only log on open
//!
//! # Design Rules
//!
//! 1. Keys are raw bytes compared with plain lexicographic byte order.
//! 2. Each `put`/`delete` is atomic for its key; there are no multi-key
//!    transactions.
//! 3. `scan` returns keys in ascending order and never returns fewer pairs
//!    than requested unless the keyspace is exhausted.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use file::{FileOrderedStore, FileStoreConfig, SyncMode};
pub use memory::InMemoryOrderedStore;
pub use traits::{KeyValue, OrderedStore};
