//! Base64 codec for the `application/grpc-web-text` wire mode.
//!
//! In text mode the request body is one base64 string and the response
//! body is a concatenation of independently padded base64 segments: the
//! server closes and reopens its encoder on every flush, so `=` padding
//! can appear mid-stream. Decoding one 4-character group at a time
//! handles segment boundaries for free, since every segment is a whole
//! number of groups.

use crate::error::WireError;

/// Encode a request body for the text wire mode.
pub fn encode(body: &[u8]) -> Vec<u8> {
    base64::encode(body).into_bytes()
}

/// Incremental decoder for a text-mode response body.
///
/// Chunks arrive at arbitrary boundaries; bytes that do not yet complete
/// a 4-character group are carried over to the next call.
#[derive(Debug, Default)]
pub struct TextDecoder {
    carry: Vec<u8>,
}

impl TextDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, appending decoded bytes to `out`.
    pub fn push(&mut self, chunk: &[u8], out: &mut Vec<u8>) -> Result<(), WireError> {
        self.carry.extend_from_slice(chunk);

        let whole = self.carry.len() / 4 * 4;
        for group in self.carry[..whole].chunks_exact(4) {
            let decoded = base64::decode(group)
                .map_err(|e| WireError::Base64(e.to_string()))?;
            out.extend_from_slice(&decoded);
        }
        self.carry.drain(..whole);
        Ok(())
    }

    /// Check that no partial group is left over at end of stream.
    pub fn finish(&self) -> Result<(), WireError> {
        if self.carry.is_empty() {
            Ok(())
        } else {
            Err(WireError::Base64(format!(
                "{} trailing bytes do not form a base64 group",
                self.carry.len()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_split(input: &[u8], split: usize) -> Vec<u8> {
        let mut decoder = TextDecoder::new();
        let mut out = Vec::new();
        decoder.push(&input[..split], &mut out).unwrap();
        decoder.push(&input[split..], &mut out).unwrap();
        decoder.finish().unwrap();
        out
    }

    #[test]
    fn encode_decode_round_trip() {
        let body = b"\x00\x00\x00\x00\x05hello";
        let encoded = encode(body);
        for split in 0..=encoded.len() {
            assert_eq!(decode_split(&encoded, split), body, "split at {split}");
        }
    }

    #[test]
    fn concatenated_padded_segments() {
        // Two flushes, each independently padded.
        let mut wire = encode(b"first");
        wire.extend_from_slice(&encode(b"second!"));
        let mut decoder = TextDecoder::new();
        let mut out = Vec::new();
        decoder.push(&wire, &mut out).unwrap();
        decoder.finish().unwrap();
        assert_eq!(out, b"firstsecond!");
    }

    #[test]
    fn invalid_character_rejected() {
        let mut decoder = TextDecoder::new();
        let mut out = Vec::new();
        assert!(matches!(
            decoder.push(b"ab~d", &mut out),
            Err(WireError::Base64(_))
        ));
    }

    #[test]
    fn dangling_partial_group_rejected() {
        let mut decoder = TextDecoder::new();
        let mut out = Vec::new();
        decoder.push(b"abc", &mut out).unwrap();
        assert!(out.is_empty());
        assert!(decoder.finish().is_err());
    }
}
