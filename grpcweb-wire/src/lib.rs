//! Sans-IO gRPC-Web wire layer.
//!
//! This crate provides the pure framing and status pieces of a gRPC-Web
//! client. It has no protobuf dependency -- callers provide raw `&[u8]`
//! message bodies and handle serialization externally -- and performs no
//! I/O: bytes go in through [`FrameDecoder::push`], frames come out of
//! [`FrameDecoder::try_next`], and the transport above decides when to
//! read more.
//!
//! # Architecture
//!
//! ```text
//!   HTTP/1.1 response body chunks
//!        |
//!   +----v-----------+
//!   | FrameDecoder   |  5-byte prefix framing, DATA vs TRAILERS
//!   +----+-----------+
//!        |
//!   +----v-----------+
//!   | trailer block  |  "key: value\r\n" lines -> Metadata
//!   | Status         |  grpc-status / grpc-message extraction
//!   +----------------+
//! ```
//!
//! # Example
//!
//! ```rust
//! use grpcweb_wire::{Frame, FrameDecoder, Status};
//!
//! let mut wire = Vec::new();
//! grpcweb_wire::frame::encode_data(b"payload", &mut wire);
//! grpcweb_wire::frame::encode_trailers(b"grpc-status: 0\r\n", &mut wire);
//!
//! let mut decoder = FrameDecoder::new(16 * 1024);
//! decoder.push(&wire);
//! while let Some(frame) = decoder.try_next().unwrap() {
//!     match frame {
//!         Frame::Data(payload) => assert_eq!(&payload[..], b"payload"),
//!         Frame::Trailers(block) => {
//!             let status = Status::from_trailer_block(&block).unwrap();
//!             assert!(status.is_ok());
//!         }
//!     }
//! }
//! ```

pub mod error;
pub mod frame;
pub mod metadata;
pub mod status;
pub mod text;
pub mod trailer;

pub use error::WireError;
pub use frame::{Frame, FrameDecoder};
pub use metadata::Metadata;
pub use status::{Code, Status};
