use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use pathdb_meta::MetaError;
use pathdb_protocol::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Meta(#[from] MetaError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{op} timed out after {after_ms} ms")]
    Timeout { op: &'static str, after_ms: u64 },

    #[error("protocol error: {0}")]
    Protocol(#[from] pathdb_protocol::ProtocolError),

    #[error("store error: {0}")]
    Store(#[from] pathdb_store::StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP status reported by the object gateway.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Meta(err) => match err {
                MetaError::NotFound { .. } => StatusCode::NOT_FOUND,
                MetaError::InvalidPath { .. } | MetaError::UnknownFlag(_) => {
                    StatusCode::BAD_REQUEST
                }
                MetaError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
                MetaError::InvalidEncoding { .. }
                | MetaError::StorageUnavailable { .. }
                | MetaError::IoFailure { .. }
                | MetaError::CorruptRecord { .. }
                | MetaError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error class reported to RPC clients.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Meta(err) => match err {
                MetaError::NotFound { .. } => ErrorCode::NotFound,
                MetaError::InvalidPath { .. } | MetaError::UnknownFlag(_) => {
                    ErrorCode::InvalidArgument
                }
                MetaError::StorageUnavailable { .. }
                | MetaError::IoFailure { .. }
                | MetaError::Cancelled { .. } => ErrorCode::Unavailable,
                MetaError::InvalidEncoding { .. }
                | MetaError::CorruptRecord { .. }
                | MetaError::Serialization(_) => ErrorCode::Internal,
            },
            Self::BadRequest(_) => ErrorCode::InvalidArgument,
            Self::Timeout { .. } => ErrorCode::Unavailable,
            _ => ErrorCode::Internal,
        }
    }
}

/// JSON body of every gateway error response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
