//! Path-indexed object metadata for pathdb.
//!
//! Objects live at slash-separated [`Path`]s. Each path is encoded into a
//! key of an [`OrderedStore`](pathdb_store::OrderedStore) so that a
//! directory's subtree is one contiguous key range. Listings are served from
//! that range:
//!
//! - [`MetaStore`] -- put / get / delete / list over any ordered store
//! - [`list::list_page`] -- the listing engine, usable without the façade
//! - [`Record`] -- the versioned envelope stored under each key
//!
//! # Consistency
//!
//! Single-key operations are atomic. A listing is built from several scans
//! and is not a point-in-time snapshot; writes racing with it may or may not
//! show up.
//!
//! [`Path`]: pathdb_types::Path

pub mod config;
pub mod error;
pub mod list;
pub mod record;
pub mod store;

pub use config::MetaConfig;
pub use error::{MetaError, MetaResult, RecordError};
pub use list::{ListPage, ListRequest};
pub use record::Record;
pub use store::{MetaStore, Object};
pub use tokio_util::sync::CancellationToken;
