//! Trailer block serialization.
//!
//! The TRAILERS frame payload is an ASCII header block, one
//! `name: value\r\n` line per entry, names case-insensitive.

use crate::error::WireError;
use crate::metadata::Metadata;

/// Parse a trailer block into [`Metadata`].
///
/// A bare `\n` line terminator is accepted alongside `\r\n`; lines without
/// a colon fail with [`WireError::Trailer`].
pub fn parse_block(block: &[u8]) -> Result<Metadata, WireError> {
    let text = std::str::from_utf8(block)
        .map_err(|_| WireError::Trailer("trailer block is not ASCII".into()))?;

    let mut meta = Metadata::new();
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| WireError::Trailer(format!("malformed trailer line: {line:?}")))?;
        meta.insert(name.trim(), value.trim());
    }
    Ok(meta)
}

/// Serialize [`Metadata`] into a trailer block.
pub fn encode_block(meta: &Metadata) -> Vec<u8> {
    let mut block = Vec::new();
    for (name, value) in meta.iter() {
        block.extend_from_slice(name.as_bytes());
        block.extend_from_slice(b": ");
        block.extend_from_slice(value.as_bytes());
        block.extend_from_slice(b"\r\n");
    }
    block
}
