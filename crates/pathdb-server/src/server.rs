use std::sync::Arc;

use pathdb_meta::MetaStore;
use pathdb_store::FileOrderedStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::rpc::RpcServer;
use crate::state::AppState;

/// Runs the RPC service and the HTTP gateway over one metadata store.
pub struct PathdbServer {
    state: AppState,
}

impl PathdbServer {
    /// Open the file-backed store named by `config.data_path`.
    pub fn open(config: ServerConfig) -> ServerResult<Self> {
        let backend = FileOrderedStore::open(&config.data_path, config.store.clone())?;
        info!(
            path = %config.data_path.display(),
            keys = backend.len()?,
            "opened metadata store"
        );
        let meta = MetaStore::with_config(Arc::new(backend), config.meta.clone());
        Ok(Self::with_store(meta, config))
    }

    pub fn with_store(meta: MetaStore, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(meta, config),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Serve both listeners until `shutdown` fires or one of them fails.
    pub async fn serve(self, shutdown: CancellationToken) -> ServerResult<()> {
        let http = TcpListener::bind(self.config().http_addr).await?;
        let rpc = TcpListener::bind(self.config().rpc_addr).await?;
        info!(addr = %http.local_addr()?, "http gateway listening");

        let app = self.router();
        let http_shutdown = shutdown.clone();
        let gateway = async move {
            axum::serve(http, app)
                .with_graceful_shutdown(http_shutdown.cancelled_owned())
                .await
                .map_err(|e| ServerError::Internal(e.to_string()))
        };
        let rpc_server = RpcServer::new(self.state.clone()).serve(rpc, shutdown.clone());

        let result = tokio::try_join!(gateway, rpc_server).map(|_| ());
        shutdown.cancel();
        result
    }
}
