//! Minimal async HTTP/1.1 client with incremental body delivery.
//!
//! One request per connection: [`Connection::send_request`] consumes the
//! connection and returns a [`ResponseStream`] that exposes the response
//! head immediately and yields body bytes chunk by chunk as they arrive,
//! honoring `content-length`, `transfer-encoding: chunked`, and
//! close-delimited bodies. Chunk boundaries carry no meaning -- a consumer
//! reassembling framed data must expect frames split across chunks.
//!
//! The connection is generic over any `AsyncRead + AsyncWrite` stream, so
//! TLS can be layered underneath by the caller; [`connect`] provides the
//! plain-TCP default.
//!
//! # Example
//!
//! ```rust,ignore
//! use grpcweb_http::connect;
//!
//! let conn = connect("127.0.0.1:8000").await?;
//! let mut resp = conn
//!     .send_request("POST", "/Echo/Hello", "127.0.0.1", &headers, &body)
//!     .await?;
//!
//! assert_eq!(resp.status(), 200);
//! while let Some(chunk) = resp.next_chunk().await? {
//!     // process each body chunk as it arrives
//! }
//! ```

pub mod body;
pub mod conn;
pub mod error;
pub mod request;
pub mod response;

pub use conn::{connect, Connection, ResponseStream};
pub use error::HttpError;
pub use response::ResponseHead;
