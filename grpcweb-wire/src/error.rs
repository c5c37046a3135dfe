//! Error types for the wire layer.

/// Errors produced while decoding the gRPC-Web framing.
///
/// The call layer maps every variant to an `INTERNAL` status; a malformed
/// frame means the peer is not speaking the protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// Frame flag byte is neither DATA (0x00) nor TRAILERS (0x80).
    #[error("invalid frame flag: {0:#04x}")]
    InvalidFlag(u8),

    /// Declared frame length exceeds the configured maximum.
    #[error("frame length {len} exceeds maximum {max}")]
    Oversized { len: usize, max: usize },

    /// Trailer block could not be parsed.
    #[error("malformed trailers: {0}")]
    Trailer(String),

    /// Base64 text-mode payload could not be decoded.
    #[error("malformed base64 body: {0}")]
    Base64(String),
}
