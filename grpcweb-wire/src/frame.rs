//! gRPC-Web frame encoding/decoding.
//!
//! Every frame carries a fixed 5-byte prefix:
//! ```text
//! +----------+-------------------------------+------------------+
//! | flag (8) |     length (32, big-endian)   | payload (length) |
//! +----------+-------------------------------+------------------+
//! ```
//! Bit 7 of the flag selects the frame kind: 0 for a DATA frame carrying
//! one serialized message, 1 for the TRAILERS frame carrying the terminal
//! header block. The remaining flag bits are reserved and must be zero.

use bytes::{Bytes, BytesMut};

use crate::error::WireError;

/// Frame prefix size in bytes.
pub const FRAME_PREFIX_LEN: usize = 5;

/// Flag byte of a DATA frame.
pub const DATA_FLAG: u8 = 0x00;

/// Flag byte of the TRAILERS frame.
pub const TRAILERS_FLAG: u8 = 0x80;

/// One decoded wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A serialized message, length prefix stripped.
    Data(Bytes),
    /// The terminal header block, unparsed. See [`crate::trailer`].
    Trailers(Bytes),
}

impl Frame {
    /// Payload bytes regardless of kind.
    pub fn payload(&self) -> &Bytes {
        match self {
            Frame::Data(p) | Frame::Trailers(p) => p,
        }
    }

    /// Whether this is the TRAILERS frame.
    pub fn is_trailers(&self) -> bool {
        matches!(self, Frame::Trailers(_))
    }
}

/// Append a DATA frame for `payload` to `out`.
pub fn encode_data(payload: &[u8], out: &mut Vec<u8>) {
    out.push(DATA_FLAG);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
}

/// Append a TRAILERS frame for an already-serialized header block to `out`.
pub fn encode_trailers(block: &[u8], out: &mut Vec<u8>) {
    out.push(TRAILERS_FLAG);
    out.extend_from_slice(&(block.len() as u32).to_be_bytes());
    out.extend_from_slice(block);
}

/// Incremental frame decoder.
///
/// Bytes arrive in arbitrary chunks via [`push`](Self::push);
/// [`try_next`](Self::try_next) drains one complete frame at a time. The
/// decoded frame sequence is independent of how the input was split.
///
/// `max_frame_len` bounds the declared payload length of a single frame.
/// A frame announcing more is rejected before any of its payload is
/// buffered, which keeps a hostile peer from ballooning the buffer.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_frame_len: usize,
}

impl FrameDecoder {
    /// Create a decoder enforcing `max_frame_len` as the payload limit.
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_len,
        }
    }

    /// Append received bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Try to decode one complete frame from the front of the buffer.
    ///
    /// Returns `Ok(None)` when fewer than `5 + length` bytes are buffered.
    pub fn try_next(&mut self) -> Result<Option<Frame>, WireError> {
        if self.buf.len() < FRAME_PREFIX_LEN {
            return Ok(None);
        }

        let flag = self.buf[0];
        if flag != DATA_FLAG && flag != TRAILERS_FLAG {
            return Err(WireError::InvalidFlag(flag));
        }

        let len = u32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]) as usize;
        if len > self.max_frame_len {
            return Err(WireError::Oversized {
                len,
                max: self.max_frame_len,
            });
        }

        let total = FRAME_PREFIX_LEN + len;
        if self.buf.len() < total {
            return Ok(None);
        }

        let mut frame = self.buf.split_to(total);
        let payload = frame.split_off(FRAME_PREFIX_LEN).freeze();

        Ok(Some(if flag == TRAILERS_FLAG {
            Frame::Trailers(payload)
        } else {
            Frame::Data(payload)
        }))
    }

    /// Whether any undecoded bytes remain buffered.
    ///
    /// Non-empty after the TRAILERS frame means the peer kept sending,
    /// which the call layer treats as a protocol violation.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
