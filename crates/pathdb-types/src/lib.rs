//! Foundation types for pathdb.
//!
//! This crate provides the path model and the types shared by every other
//! pathdb crate. Nothing here touches storage.
//!
//! # Key Types
//!
//! - [`Path`] -- Hierarchical, slash-delimited object address
//! - [`codec`] -- Order-preserving conversion between [`Path`] and byte keys
//! - [`MetaFlags`] -- Selects which metadata a listing must hydrate
//! - [`Entry`] -- One row of a listing: a leaf or a directory marker
//! - [`ObjectMeta`] -- Size, modification time, checksum, and custom fields

pub mod codec;
pub mod entry;
pub mod error;
pub mod flags;
pub mod path;

pub use codec::{decode, encode};
pub use entry::{Entry, ObjectMeta};
pub use error::TypeError;
pub use flags::MetaFlags;
pub use path::Path;
