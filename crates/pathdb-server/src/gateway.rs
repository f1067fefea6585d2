//! HTTP object gateway.
//!
//! Buckets are the first path segment. A GET on a bucket, or on a key that
//! ends in `/`, lists that directory; a GET on any other key downloads the
//! object. Custom attributes travel as `x-pathdb-meta-<name>` headers.
//!
//! The upload's `Content-Type` is kept as the `content-type` attribute and
//! returned on download. Objects stored without one are sniffed from their
//! leading bytes, then guessed from the key's extension.

use std::collections::BTreeMap;

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::header::{CONTENT_TYPE, ETAG};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use pathdb_meta::{ListRequest, MetaError};
use pathdb_types::{Entry, MetaFlags, Path};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

pub const META_HEADER_PREFIX: &str = "x-pathdb-meta-";
pub const MODIFIED_HEADER: &str = "x-pathdb-modified-ms";
/// Custom attribute holding the upload's media type.
pub const CONTENT_TYPE_ATTR: &str = "content-type";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Query string accepted by listings.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListQuery {
    pub start_after: Option<String>,
    pub limit: Option<usize>,
    pub recurse: Option<bool>,
    pub flags: Option<String>,
}

/// JSON body of a listing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub prefix: String,
    pub entries: Vec<EntryView>,
    pub more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_start_after: Option<String>,
}

/// One listing row; only requested attributes are present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryView {
    pub path: String,
    pub is_prefix: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<BTreeMap<String, String>>,
}

impl EntryView {
    fn new(entry: Entry, flags: MetaFlags) -> Self {
        let mut view = Self {
            path: entry.path.to_string(),
            is_prefix: entry.is_prefix,
            size: None,
            modified_ms: None,
            checksum: None,
            custom: None,
        };
        if let Some(meta) = entry.meta {
            if flags.contains(MetaFlags::SIZE) {
                view.size = Some(meta.size);
            }
            if flags.contains(MetaFlags::MODIFIED) {
                view.modified_ms = Some(meta.modified_ms);
            }
            view.checksum = meta.checksum_hex();
            if flags.contains(MetaFlags::CUSTOM) {
                view.custom = Some(meta.custom);
            }
        }
        view
    }
}

/// Response of a successful upload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub path: String,
    pub size: usize,
}

/// `GET /{bucket}` and `GET /{bucket}/`
pub async fn list_bucket(
    State(state): State<AppState>,
    UrlPath(bucket): UrlPath<String>,
    Query(query): Query<ListQuery>,
) -> ServerResult<Json<ListResponse>> {
    let prefix = parse_path(&bucket)?;
    list_dir(state, prefix, query).await
}

/// `GET /{bucket}/{key}`: a listing if `key` ends in `/`, else a download.
pub async fn get_object(
    State(state): State<AppState>,
    UrlPath((bucket, key)): UrlPath<(String, String)>,
    Query(query): Query<ListQuery>,
) -> ServerResult<Response> {
    let path = object_path(&bucket, &key)?;
    if key.is_empty() || key.ends_with('/') {
        return Ok(list_dir(state, path, query).await?.into_response());
    }

    let object = state.run("get", move |meta, _| meta.get(&path)).await?;
    let mut headers = HeaderMap::new();
    let content_type = object
        .meta
        .custom
        .get(CONTENT_TYPE_ATTR)
        .and_then(|stored| HeaderValue::from_str(stored).ok())
        .unwrap_or_else(|| HeaderValue::from_static(detect_content_type(&key, &object.value)));
    headers.insert(CONTENT_TYPE, content_type);
    if let Some(hex) = object.meta.checksum_hex() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{hex}\"")) {
            headers.insert(ETAG, value);
        }
    }
    headers.insert(
        HeaderName::from_static(MODIFIED_HEADER),
        HeaderValue::from(object.meta.modified_ms),
    );
    for (name, value) in &object.meta.custom {
        if name == CONTENT_TYPE_ATTR {
            continue;
        }
        let header = HeaderName::try_from(format!("{META_HEADER_PREFIX}{name}"));
        if let (Ok(header), Ok(value)) = (header, HeaderValue::from_str(value)) {
            headers.insert(header, value);
        }
    }
    Ok((StatusCode::OK, headers, object.value).into_response())
}

/// `PUT` or `POST /{bucket}/{key}`: store the raw request body.
pub async fn put_object(
    State(state): State<AppState>,
    UrlPath((bucket, key)): UrlPath<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Json<UploadResponse>> {
    if key.ends_with('/') {
        return Err(ServerError::BadRequest(format!(
            "cannot upload to directory {bucket}/{key}"
        )));
    }
    let path = object_path(&bucket, &key)?;
    let mut custom = custom_from_headers(&headers);
    if let Some(media) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        custom.insert(CONTENT_TYPE_ATTR.to_string(), media.to_string());
    }
    let size = body.len();
    let stored = path.to_string();
    state
        .run("put", move |meta, _| meta.put_with(&path, &body, custom))
        .await?;
    debug!(path = %stored, size, "uploaded object");
    Ok(Json(UploadResponse { path: stored, size }))
}

/// `DELETE /{bucket}/{key}`
pub async fn delete_object(
    State(state): State<AppState>,
    UrlPath((bucket, key)): UrlPath<(String, String)>,
) -> ServerResult<StatusCode> {
    if key.is_empty() || key.ends_with('/') {
        return Err(ServerError::BadRequest(format!(
            "cannot delete directory {bucket}/{key}"
        )));
    }
    let path = object_path(&bucket, &key)?;
    state.run("delete", move |meta, _| meta.delete(&path)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_dir(state: AppState, prefix: Path, query: ListQuery) -> ServerResult<Json<ListResponse>> {
    let flags = match query.flags.as_deref() {
        Some(text) => text
            .parse::<MetaFlags>()
            .map_err(|e| ServerError::BadRequest(e.to_string()))?,
        None => MetaFlags::NONE,
    };
    let recurse = query.recurse.unwrap_or(state.config.default_recurse);
    let mut request = ListRequest::new(prefix.clone(), recurse)
        .limit(state.config.meta.served_limit(query.limit.unwrap_or(0)))
        .flags(flags);
    if let Some(after) = query.start_after.as_deref().filter(|s| !s.is_empty()) {
        request = request.start_after(parse_path(after)?);
    }

    let page = state
        .run("list", move |meta, cancel| meta.list_cancellable(&request, cancel))
        .await?;
    let next_start_after = page.next_start_after().map(Path::to_string);
    Ok(Json(ListResponse {
        prefix: prefix.to_string(),
        entries: page
            .entries
            .into_iter()
            .map(|entry| EntryView::new(entry, flags))
            .collect(),
        more: page.more,
        next_start_after,
    }))
}

fn parse_path(text: &str) -> ServerResult<Path> {
    Path::parse(text).map_err(|e| ServerError::Meta(MetaError::from(e)))
}

fn object_path(bucket: &str, key: &str) -> ServerResult<Path> {
    parse_path(&format!("{bucket}/{key}"))
}

/// Media type of a stored object that was uploaded without one.
fn detect_content_type(key: &str, value: &[u8]) -> &'static str {
    if let Some(kind) = infer::get(value) {
        return kind.mime_type();
    }
    mime_guess::from_path(key)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

fn custom_from_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let field = name.as_str().strip_prefix(META_HEADER_PREFIX)?;
            let value = value.to_str().ok()?;
            Some((field.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pathdb_meta::MetaStore;
    use pathdb_store::InMemoryOrderedStore;
    use tower::util::ServiceExt;

    use crate::config::ServerConfig;
    use crate::router::build_router;

    fn app_with(config: ServerConfig) -> axum::Router {
        let meta = MetaStore::new(Arc::new(InMemoryOrderedStore::new()));
        build_router(AppState::new(meta, config))
    }

    fn app() -> axum::Router {
        app_with(ServerConfig::default())
    }

    async fn send(app: &axum::Router, method: &str, uri: &str, body: &[u8]) -> Response {
        app.clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::from(body.to_vec()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    async fn listing(app: &axum::Router, uri: &str) -> ListResponse {
        let response = send(app, "GET", uri, b"").await;
        assert_eq!(response.status(), StatusCode::OK);
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    fn paths(list: &ListResponse) -> Vec<&str> {
        list.entries.iter().map(|e| e.path.as_str()).collect()
    }

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn upload_then_download() {
        let app = app();
        let response = send(&app, "PUT", "/photos/2024/cat", b"meow").await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, "GET", "/photos/2024/cat", b"").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );
        assert!(response.headers().contains_key(ETAG));
        assert_eq!(body_bytes(response).await, b"meow");
    }

    #[tokio::test]
    async fn post_also_uploads() {
        let app = app();
        let response = send(&app, "POST", "/b/k", b"v").await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = send(&app, "GET", "/b/k", b"").await;
        assert_eq!(body_bytes(response).await, b"v");
    }

    #[tokio::test]
    async fn custom_headers_round_trip() {
        let app = app();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/b/doc")
                    .header("x-pathdb-meta-owner", "ops")
                    .body(Body::from("x"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, "GET", "/b/doc", b"").await;
        assert_eq!(response.headers().get("x-pathdb-meta-owner").unwrap(), "ops");
    }

    async fn put_typed(app: &axum::Router, uri: &str, content_type: &str, body: &[u8]) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(uri)
                    .header(CONTENT_TYPE, content_type)
                    .body(Body::from(body.to_vec()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn uploaded_content_type_is_returned() {
        let app = app();
        put_typed(&app, "/b/page.html", "text/html", b"<p>hi</p>").await;
        let response = send(&app, "GET", "/b/page.html", b"").await;
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "text/html");
        assert!(!response.headers().contains_key("x-pathdb-meta-content-type"));
    }

    #[tokio::test]
    async fn stored_type_wins_over_extension() {
        let app = app();
        put_typed(&app, "/b/data.json", "text/plain; charset=utf-8", b"{}").await;
        let response = send(&app, "GET", "/b/data.json", b"").await;
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn untyped_upload_is_sniffed_from_content() {
        let app = app();
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
        send(&app, "PUT", "/b/blob", &png).await;
        let response = send(&app, "GET", "/b/blob", b"").await;
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "image/png");
    }

    #[tokio::test]
    async fn untyped_upload_falls_back_to_extension() {
        let app = app();
        send(&app, "PUT", "/b/notes.json", b"{\"a\": 1}").await;
        let response = send(&app, "GET", "/b/notes.json", b"").await;
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[tokio::test]
    async fn missing_object_is_404() {
        let app = app();
        let response = send(&app, "GET", "/b/missing/path", b"").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_path_is_400() {
        let app = app();
        let response = send(&app, "PUT", "/b/a//c", b"x").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_is_204_and_idempotent() {
        let app = app();
        send(&app, "PUT", "/b/k", b"v").await;
        assert_eq!(send(&app, "DELETE", "/b/k", b"").await.status(), StatusCode::NO_CONTENT);
        assert_eq!(send(&app, "DELETE", "/b/k", b"").await.status(), StatusCode::NO_CONTENT);
        assert_eq!(send(&app, "GET", "/b/k", b"").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_of_directory_key_is_400() {
        let app = app();
        send(&app, "PUT", "/b/dir", b"v").await;
        let response = send(&app, "DELETE", "/b/dir/", b"").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(send(&app, "GET", "/b/dir", b"").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn destroyed_store_is_500() {
        let backend = Arc::new(InMemoryOrderedStore::new());
        let meta = MetaStore::new(backend);
        meta.destroy().unwrap();
        let app = build_router(AppState::new(meta, ServerConfig::default()));
        let response = send(&app, "GET", "/b/k", b"").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    // -----------------------------------------------------------------------
    // Listings
    // -----------------------------------------------------------------------

    async fn seeded() -> axum::Router {
        let app = app();
        for key in ["b/c", "b/d", "x"] {
            send(&app, "PUT", &format!("/bucket/a/{key}"), b"abc").await;
        }
        app
    }

    #[tokio::test]
    async fn directory_listing_groups() {
        let app = seeded().await;
        let list = listing(&app, "/bucket/a/").await;
        assert_eq!(paths(&list), vec!["bucket/a/b", "bucket/a/x"]);
        assert!(list.entries[0].is_prefix);
        assert!(!list.more);
    }

    #[tokio::test]
    async fn bucket_listing() {
        let app = seeded().await;
        let list = listing(&app, "/bucket").await;
        assert_eq!(paths(&list), vec!["bucket/a"]);
        let list = listing(&app, "/bucket?recurse=true").await;
        assert_eq!(paths(&list), vec!["bucket/a/b/c", "bucket/a/b/d", "bucket/a/x"]);
    }

    #[tokio::test]
    async fn configured_recurse_default_applies() {
        let app = app_with(ServerConfig {
            default_recurse: true,
            ..ServerConfig::default()
        });
        send(&app, "PUT", "/bucket/a/b", b"v").await;
        let list = listing(&app, "/bucket/").await;
        assert_eq!(paths(&list), vec!["bucket/a/b"]);
        let list = listing(&app, "/bucket/?recurse=false").await;
        assert_eq!(paths(&list), vec!["bucket/a"]);
    }

    #[tokio::test]
    async fn listing_pages_with_cursor() {
        let app = seeded().await;
        let first = listing(&app, "/bucket/a/?recurse=true&limit=2").await;
        assert_eq!(first.entries.len(), 2);
        assert!(first.more);
        let cursor = first.next_start_after.clone().unwrap();
        let rest = listing(&app, &format!("/bucket/a/?recurse=true&limit=2&start_after={cursor}")).await;
        assert_eq!(paths(&rest), vec!["bucket/a/x"]);
        assert!(!rest.more);
    }

    #[tokio::test]
    async fn listing_flags_select_fields() {
        let app = seeded().await;
        let list = listing(&app, "/bucket/a/?recurse=true&flags=size").await;
        let leaf = &list.entries[0];
        assert_eq!(leaf.size, Some(3));
        assert!(leaf.modified_ms.is_none());
        assert!(leaf.checksum.is_none());

        let plain = listing(&app, "/bucket/a/?recurse=true").await;
        assert!(plain.entries[0].size.is_none());
    }

    #[tokio::test]
    async fn listing_limit_is_capped() {
        let mut config = ServerConfig::default();
        config.meta.max_page_size = 2;
        let app = app_with(config);
        for key in ["1", "2", "3"] {
            send(&app, "PUT", &format!("/bucket/{key}"), b"v").await;
        }
        let list = listing(&app, "/bucket/?limit=50").await;
        assert_eq!(list.entries.len(), 2);
        assert!(list.more);
        assert_eq!(list.next_start_after.as_deref(), Some("bucket/2"));
    }

    #[tokio::test]
    async fn unknown_flag_is_400() {
        let app = seeded().await;
        let response = send(&app, "GET", "/bucket/a/?flags=colour", b"").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_directory_lists_nothing() {
        let app = app();
        let list = listing(&app, "/bucket/empty/?limit=5").await;
        assert!(list.entries.is_empty());
        assert!(!list.more);
    }
}
