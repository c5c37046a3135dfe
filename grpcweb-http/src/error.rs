//! Error types for the HTTP client.

use std::io;

/// Errors produced by the HTTP/1.1 exchange.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The connection closed before the response (or body) completed.
    #[error("connection closed")]
    ConnectionClosed,

    /// I/O error during connect, send, or recv.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The response head or body framing could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
}
