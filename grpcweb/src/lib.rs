//! gRPC-Web client transport for unary and server-streaming calls.
//!
//! This crate drives RPCs over a browser-compatible channel: HTTP/1.1
//! POST exchanges with no native trailer support, the terminal status
//! carried in-band as a flagged wire frame. It has no protobuf
//! dependency -- generated stubs hand it serialized request bytes and
//! get response bytes back.
//!
//! # Architecture
//!
//! ```text
//!   +----------------+
//!   | Client         |  channel config, call entry points
//!   +----+-----------+
//!        |
//!   +----v-----------+
//!   | call controllers|  unary: single completion
//!   | unary/streaming |  streaming: ordered events + cancellation
//!   +----+-----------+
//!        |
//!   +----v-----------+     +----------------+
//!   | grpcweb-http   |     | grpcweb-wire   |
//!   | HTTP/1.1 I/O   |---->| framing/status |
//!   +----------------+     +----------------+
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use grpcweb::{CallOptions, Client};
//!
//! let client = Client::builder("http://127.0.0.1:8000").build()?;
//!
//! // Unary: one request, one response.
//! let reply = client
//!     .unary("/Echo/Hello", request_bytes, CallOptions::new())
//!     .await?;
//!
//! // Server-streaming: one request, ordered responses, one terminal event.
//! let mut stream = client
//!     .server_streaming("/Echo/RepeatHello", request_bytes, CallOptions::new())
//!     .await;
//! let handle = stream.handle(); // cancellable from elsewhere
//! while let Some(message) = stream.next_message().await? {
//!     // ...
//! }
//! ```
//!
//! Every failure -- transport, framing, protocol, or remote -- reaches the
//! caller as a terminal [`Status`] through the same completion path as
//! success; nothing is retried inside this crate.

pub mod call;
pub mod client;
pub mod streaming;
pub mod unary;

pub use call::{CallOptions, CallState, CancelHandle, StreamHandle};
pub use client::{Client, ClientBuilder, ConfigError, Mode};
pub use streaming::ServerStream;
pub use unary::UnaryReply;

pub use grpcweb_wire::{Code, Metadata, Status};
