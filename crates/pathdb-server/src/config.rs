use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use pathdb_meta::MetaConfig;
use pathdb_store::FileStoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address of the HTTP object gateway.
    pub http_addr: SocketAddr,
    /// Address of the framed RPC metadata service.
    pub rpc_addr: SocketAddr,
    /// Log file backing the ordered store.
    pub data_path: PathBuf,
    /// Deadline applied to every request, in milliseconds.
    pub request_timeout_ms: u64,
    /// `recurse` used by gateway listings that do not specify it.
    pub default_recurse: bool,
    pub store: FileStoreConfig,
    pub meta: MetaConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            rpc_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 7777)),
            data_path: PathBuf::from("pathdb.db"),
            request_timeout_ms: 30_000,
            default_recurse: false,
            store: FileStoreConfig::default(),
            meta: MetaConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read a TOML file. Missing keys take their default values.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
