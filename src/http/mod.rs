//! HTTP/1.1 client pieces for the camera control API
//!
//! One fixed host, `Connection: close`, bodies framed by
//! `Content-Length` only.

pub mod engine;
pub mod parse;
pub mod request;
pub mod transport;

pub use engine::{EngineError, RequestEngine, RequestSink};
pub use request::{
    format_get, format_put, CompletionReason, FormatError, HttpRequest, JsonField, JsonValue,
    RequestBytes, Stage,
};
pub use transport::{SocketChunk, SocketEvent, SocketSlots, Transport, TransportError};
