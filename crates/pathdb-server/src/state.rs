use std::sync::Arc;

use pathdb_meta::{CancellationToken, MetaResult, MetaStore};
use tracing::warn;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// State shared by the RPC service and the HTTP gateway.
#[derive(Clone, Debug)]
pub struct AppState {
    pub meta: MetaStore,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(meta: MetaStore, config: ServerConfig) -> Self {
        Self {
            meta,
            config: Arc::new(config),
        }
    }

    /// Run a metadata call on the blocking pool under the request deadline.
    ///
    /// When the deadline fires the call's token is cancelled, so a listing
    /// still in flight stops at its next entry.
    pub async fn run<T, F>(&self, op: &'static str, call: F) -> ServerResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&MetaStore, &CancellationToken) -> MetaResult<T> + Send + 'static,
    {
        let meta = self.meta.clone();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task = tokio::task::spawn_blocking(move || call(&meta, &task_cancel));

        let timeout = self.config.request_timeout();
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result.map_err(ServerError::from),
            Ok(Err(join)) => Err(ServerError::Internal(join.to_string())),
            Err(_) => {
                cancel.cancel();
                warn!(op, timeout_ms = self.config.request_timeout_ms, "request deadline exceeded");
                Err(ServerError::Timeout {
                    op,
                    after_ms: self.config.request_timeout_ms,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use pathdb_meta::MetaError;
    use pathdb_store::InMemoryOrderedStore;
    use pathdb_types::Path;

    fn state(timeout_ms: u64) -> AppState {
        let config = ServerConfig {
            request_timeout_ms: timeout_ms,
            ..ServerConfig::default()
        };
        AppState::new(MetaStore::new(Arc::new(InMemoryOrderedStore::new())), config)
    }

    #[tokio::test]
    async fn run_returns_result() {
        let state = state(1_000);
        state
            .run("put", |meta, _| meta.put(&Path::parse("a").unwrap(), b"v"))
            .await
            .unwrap();
        let value = state
            .run("get", |meta, _| meta.get_value(&Path::parse("a").unwrap()))
            .await
            .unwrap();
        assert_eq!(value, b"v");
    }

    #[tokio::test]
    async fn run_maps_meta_errors() {
        let state = state(1_000);
        let err = state
            .run("get", |meta, _| meta.get(&Path::parse("missing").unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Meta(MetaError::NotFound { .. })));
    }

    #[tokio::test]
    async fn deadline_cancels_token() {
        let state = state(20);
        let (seen_tx, seen_rx) = std::sync::mpsc::channel();
        let err = state
            .run("list", move |_, cancel| {
                while !cancel.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(5));
                }
                let _ = seen_tx.send(());
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Timeout { op: "list", .. }));
        seen_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
}
