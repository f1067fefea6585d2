//! Servers for pathdb.
//!
//! Two front ends share one [`MetaStore`](pathdb_meta::MetaStore):
//!
//! - the framed RPC metadata service ([`rpc`]), for clients that keep small
//!   inline values such as object pointers
//! - the HTTP object gateway ([`gateway`]), for uploads, downloads, and
//!   directory listings by bucket
//!
//! Every request runs on the blocking pool under the configured deadline.

pub mod config;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod router;
pub mod rpc;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use rpc::{MetaService, RpcClient, RpcServer};
pub use server::PathdbServer;
pub use state::AppState;
