//! Wire protocol for the pathdb metadata service.
//!
//! Defines the framing, message types, and status codes exchanged between
//! RPC clients and the metadata server, plus the HTTP endpoint paths served
//! by the object gateway.

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod message;

pub use codec::MetaCodec;
pub use endpoint::{endpoints, HealthResponse, InfoResponse};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{ErrorCode, MetaMessage, MAX_MESSAGE_SIZE, PROTOCOL_VERSION, PUT_CONFIRMATION};
