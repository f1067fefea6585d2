//! The framed RPC metadata service.
//!
//! One TCP connection carries a sequence of request frames, each answered
//! by exactly one response frame in order. Requests are served through
//! [`AppState::run`], so every call is subject to the configured deadline.

use std::net::SocketAddr;

use pathdb_meta::ListRequest;
use pathdb_protocol::{ErrorCode, MetaCodec, MetaMessage, ProtocolError, ProtocolResult};
use pathdb_types::{Entry, MetaFlags, ObjectMeta, Path};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Dispatches decoded requests to the metadata store.
#[derive(Clone, Debug)]
pub struct MetaService {
    state: AppState,
}

impl MetaService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Answer one request. Failures become [`MetaMessage::Error`].
    pub async fn handle(&self, request: MetaMessage) -> MetaMessage {
        let kind = request.type_name();
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(err) => {
                debug!(kind, error = %err, "rpc request failed");
                MetaMessage::error(err.code(), err.to_string())
            }
        }
    }

    async fn dispatch(&self, request: MetaMessage) -> ServerResult<MetaMessage> {
        match request {
            MetaMessage::Put { path, small_value } => {
                self.state
                    .run("put", move |meta, _| meta.put(&path, &small_value))
                    .await?;
                Ok(MetaMessage::put_ack())
            }
            MetaMessage::Get { path } => {
                let object = self.state.run("get", move |meta, _| meta.get(&path)).await?;
                Ok(MetaMessage::Object {
                    path: object.path,
                    small_value: object.value,
                    meta: object.meta,
                })
            }
            MetaMessage::Delete { path } => {
                self.state.run("delete", move |meta, _| meta.delete(&path)).await?;
                Ok(MetaMessage::Deleted)
            }
            MetaMessage::List {
                prefix,
                start_after,
                limit,
                recurse,
                flags,
            } => {
                let request = ListRequest {
                    prefix,
                    start_after,
                    limit: self.state.config.meta.served_limit(limit as usize),
                    recurse,
                    flags,
                };
                let page = self
                    .state
                    .run("list", move |meta, cancel| meta.list_cancellable(&request, cancel))
                    .await?;
                Ok(MetaMessage::ListPage {
                    entries: page.entries,
                    more: page.more,
                })
            }
            other => Err(ServerError::BadRequest(format!(
                "{} is not a request",
                other.type_name()
            ))),
        }
    }
}

/// Accept loop for the RPC service.
pub struct RpcServer {
    service: MetaService,
}

impl RpcServer {
    pub fn new(state: AppState) -> Self {
        Self {
            service: MetaService::new(state),
        }
    }

    /// Serve connections from `listener` until `shutdown` fires.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> ServerResult<()> {
        info!(addr = %listener.local_addr()?, "rpc service listening");
        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => accepted?,
            };
            let service = self.service.clone();
            let conn_shutdown = shutdown.clone();
            tokio::spawn(async move {
                if let Err(err) = serve_connection(service, stream, conn_shutdown).await {
                    warn!(%peer, error = %err, "rpc connection closed with error");
                }
            });
        }
        info!("rpc service stopped");
        Ok(())
    }
}

async fn serve_connection(
    service: MetaService,
    mut stream: TcpStream,
    shutdown: CancellationToken,
) -> ProtocolResult<()> {
    loop {
        let read = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            read = MetaCodec::read_message(&mut stream) => read,
        };
        let request = match read {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(err @ (ProtocolError::Io(_) | ProtocolError::MessageTooLarge { .. } | ProtocolError::FramingError(_))) => {
                return Err(err);
            }
            Err(err) => {
                // The frame was consumed; report and keep the connection.
                let reply = MetaMessage::error(ErrorCode::InvalidArgument, err.to_string());
                MetaCodec::write_message(&mut stream, &reply).await?;
                continue;
            }
        };
        let response = service.handle(request).await;
        MetaCodec::write_message(&mut stream, &response).await?;
    }
}

/// Client for the RPC service.
pub struct RpcClient {
    stream: TcpStream,
}

impl RpcClient {
    pub async fn connect(addr: SocketAddr) -> ProtocolResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self { stream })
    }

    /// Send one message and wait for its reply.
    pub async fn call(&mut self, request: &MetaMessage) -> ProtocolResult<MetaMessage> {
        MetaCodec::write_message(&mut self.stream, request).await?;
        match MetaCodec::read_message(&mut self.stream).await? {
            Some(MetaMessage::Error { code, message }) => {
                Err(ProtocolError::RemoteError { code, message })
            }
            Some(response) => Ok(response),
            None => Err(ProtocolError::FramingError("connection closed by server".into())),
        }
    }

    /// Returns the server's confirmation string.
    pub async fn put(&mut self, path: Path, small_value: Vec<u8>) -> ProtocolResult<String> {
        match self.call(&MetaMessage::Put { path, small_value }).await? {
            MetaMessage::PutAck { confirmation } => Ok(confirmation),
            other => Err(unexpected("PutAck", &other)),
        }
    }

    pub async fn get(&mut self, path: Path) -> ProtocolResult<(Vec<u8>, ObjectMeta)> {
        match self.call(&MetaMessage::Get { path }).await? {
            MetaMessage::Object { small_value, meta, .. } => Ok((small_value, meta)),
            other => Err(unexpected("Object", &other)),
        }
    }

    pub async fn delete(&mut self, path: Path) -> ProtocolResult<()> {
        match self.call(&MetaMessage::Delete { path }).await? {
            MetaMessage::Deleted => Ok(()),
            other => Err(unexpected("Deleted", &other)),
        }
    }

    pub async fn list(
        &mut self,
        prefix: Path,
        start_after: Option<Path>,
        limit: u32,
        recurse: bool,
        flags: MetaFlags,
    ) -> ProtocolResult<(Vec<Entry>, bool)> {
        let request = MetaMessage::List {
            prefix,
            start_after,
            limit,
            recurse,
            flags,
        };
        match self.call(&request).await? {
            MetaMessage::ListPage { entries, more } => Ok((entries, more)),
            other => Err(unexpected("ListPage", &other)),
        }
    }
}

fn unexpected(expected: &'static str, got: &MetaMessage) -> ProtocolError {
    ProtocolError::UnexpectedMessage {
        expected,
        got: got.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use pathdb_meta::MetaStore;
    use pathdb_store::InMemoryOrderedStore;

    use crate::config::ServerConfig;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn state() -> AppState {
        AppState::new(
            MetaStore::new(Arc::new(InMemoryOrderedStore::new())),
            ServerConfig::default(),
        )
    }

    async fn spawn_server() -> (SocketAddr, CancellationToken) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = RpcServer::new(state());
        tokio::spawn(server.serve(listener, shutdown.clone()));
        (addr, shutdown)
    }

    // -----------------------------------------------------------------------
    // Service
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_confirms_success() {
        let service = MetaService::new(state());
        let reply = service
            .handle(MetaMessage::Put { path: p("a/b"), small_value: b"v".to_vec() })
            .await;
        assert_eq!(reply, MetaMessage::put_ack());
    }

    #[tokio::test]
    async fn missing_get_is_not_found() {
        let service = MetaService::new(state());
        let reply = service.handle(MetaMessage::Get { path: p("missing/path") }).await;
        assert!(matches!(reply, MetaMessage::Error { code: ErrorCode::NotFound, .. }));
    }

    #[tokio::test]
    async fn root_put_is_invalid_argument() {
        let service = MetaService::new(state());
        let reply = service
            .handle(MetaMessage::Put { path: Path::root(), small_value: vec![] })
            .await;
        assert!(matches!(reply, MetaMessage::Error { code: ErrorCode::InvalidArgument, .. }));
    }

    #[tokio::test]
    async fn list_limit_is_capped_by_server() {
        let mut config = ServerConfig::default();
        config.meta.max_page_size = 2;
        let service = MetaService::new(AppState::new(
            MetaStore::new(Arc::new(InMemoryOrderedStore::new())),
            config,
        ));
        for path in ["a/1", "a/2", "a/3"] {
            service
                .handle(MetaMessage::Put { path: p(path), small_value: vec![] })
                .await;
        }
        let reply = service
            .handle(MetaMessage::List {
                prefix: p("a"),
                start_after: None,
                limit: 100,
                recurse: true,
                flags: MetaFlags::NONE,
            })
            .await;
        let MetaMessage::ListPage { entries, more } = reply else {
            panic!("unexpected reply {reply:?}");
        };
        assert_eq!(entries.len(), 2);
        assert!(more);
    }

    #[tokio::test]
    async fn response_as_request_is_rejected() {
        let service = MetaService::new(state());
        let reply = service.handle(MetaMessage::Deleted).await;
        assert!(matches!(reply, MetaMessage::Error { code: ErrorCode::InvalidArgument, .. }));
    }

    // -----------------------------------------------------------------------
    // TCP round trip
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn client_round_trip() {
        let (addr, shutdown) = spawn_server().await;
        let mut client = RpcClient::connect(addr).await.unwrap();

        for path in ["a/b/c", "a/b/d", "a/x"] {
            let confirmation = client.put(p(path), path.as_bytes().to_vec()).await.unwrap();
            assert_eq!(confirmation, "success");
        }

        let (value, meta) = client.get(p("a/x")).await.unwrap();
        assert_eq!(value, b"a/x");
        assert_eq!(meta.size, 3);

        let (entries, more) = client
            .list(p("a"), None, 0, false, MetaFlags::NONE)
            .await
            .unwrap();
        let paths: Vec<String> = entries.iter().map(|e| e.path.to_string()).collect();
        assert_eq!(paths, vec!["a/b", "a/x"]);
        assert!(entries[0].is_prefix);
        assert!(!more);

        client.delete(p("a/x")).await.unwrap();
        client.delete(p("a/x")).await.unwrap();
        let err = client.get(p("a/x")).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::RemoteError { code: ErrorCode::NotFound, .. }
        ));

        shutdown.cancel();
    }

    #[tokio::test]
    async fn paged_listing_over_tcp() {
        let (addr, shutdown) = spawn_server().await;
        let mut client = RpcClient::connect(addr).await.unwrap();
        for i in 0..5 {
            client.put(p(&format!("logs/{i}")), vec![]).await.unwrap();
        }

        let (first, more) = client
            .list(p("logs"), None, 2, true, MetaFlags::SIZE)
            .await
            .unwrap();
        assert_eq!(first.len(), 2);
        assert!(more);
        assert_eq!(first[0].meta.as_ref().map(|m| m.size), Some(0));

        let cursor = first.last().map(|e| e.path.clone());
        let (rest, more) = client
            .list(p("logs"), cursor, 10, true, MetaFlags::NONE)
            .await
            .unwrap();
        assert_eq!(rest.len(), 3);
        assert!(!more);

        shutdown.cancel();
    }
}
