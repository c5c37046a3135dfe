//! Incremental response body delivery.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::HttpError;
use crate::response::ResponseHead;

/// Longest accepted chunk-size line, extensions included.
const MAX_CHUNK_LINE: usize = 1024;

/// Streaming reader for a response body.
///
/// Yields body bytes as they arrive, decoding the transfer framing:
/// `content-length` bodies, `chunked` bodies (chunk metadata stripped),
/// and close-delimited bodies. At most one socket read happens per yielded
/// piece, so a consumer that stops pulling stops the underlying reads.
#[derive(Debug)]
pub struct BodyReader<S> {
    stream: S,
    buf: BytesMut,
    kind: BodyKind,
    done: bool,
}

#[derive(Debug)]
enum BodyKind {
    /// Exactly `remaining` bytes left to deliver.
    Length { remaining: usize },
    /// Chunked transfer encoding.
    Chunked(ChunkedState),
    /// Delimited by connection close.
    Close,
}

#[derive(Debug)]
enum ChunkedState {
    /// Expecting a `<hex-size>\r\n` line.
    Size,
    /// Inside chunk data.
    Data { remaining: usize },
    /// Expecting the `\r\n` after chunk data.
    DataEnd,
    /// Skipping trailer lines after the zero-size chunk.
    Trailers,
}

impl<S: AsyncRead + Unpin> BodyReader<S> {
    /// Wrap `stream`, with `leftover` bytes already read past the head.
    pub(crate) fn new(stream: S, leftover: BytesMut, head: &ResponseHead) -> Self {
        let kind = if head.chunked() {
            BodyKind::Chunked(ChunkedState::Size)
        } else if let Some(len) = head.content_length() {
            BodyKind::Length { remaining: len }
        } else {
            BodyKind::Close
        };
        Self {
            stream,
            buf: leftover,
            kind,
            done: false,
        }
    }

    /// Yield the next body piece, or `None` when the body is complete.
    ///
    /// A connection that closes before the declared body end fails with
    /// [`HttpError::ConnectionClosed`].
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, HttpError> {
        loop {
            if self.done {
                return Ok(None);
            }
            if let Some(piece) = self.drain_buffered()? {
                return Ok(Some(piece));
            }
            if self.done {
                return Ok(None);
            }

            self.buf.reserve(8 * 1024);
            let n = self.stream.read_buf(&mut self.buf).await?;
            if n == 0 {
                return match self.kind {
                    BodyKind::Close => {
                        self.done = true;
                        Ok(None)
                    }
                    _ => Err(HttpError::ConnectionClosed),
                };
            }
        }
    }

    /// Produce at most one piece from already-buffered bytes.
    ///
    /// Returns `Ok(None)` when more input is needed or (with `self.done`
    /// set) when the body just completed.
    fn drain_buffered(&mut self) -> Result<Option<Bytes>, HttpError> {
        let buf = &mut self.buf;
        match &mut self.kind {
            BodyKind::Length { remaining } => {
                if *remaining == 0 {
                    self.done = true;
                    return Ok(None);
                }
                if buf.is_empty() {
                    return Ok(None);
                }
                let take = (*remaining).min(buf.len());
                let piece = buf.split_to(take).freeze();
                *remaining -= take;
                if *remaining == 0 {
                    self.done = true;
                }
                Ok(Some(piece))
            }
            BodyKind::Close => {
                if buf.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(buf.split().freeze()))
                }
            }
            BodyKind::Chunked(state) => loop {
                match state {
                    ChunkedState::Size => {
                        let Some(pos) = find_crlf(buf) else {
                            if buf.len() > MAX_CHUNK_LINE {
                                return Err(HttpError::Parse("chunk size line too long".into()));
                            }
                            return Ok(None);
                        };
                        let line = buf.split_to(pos + 2);
                        let size = parse_chunk_size(&line[..pos])?;
                        *state = if size == 0 {
                            ChunkedState::Trailers
                        } else {
                            ChunkedState::Data { remaining: size }
                        };
                    }
                    ChunkedState::Data { remaining } => {
                        if buf.is_empty() {
                            return Ok(None);
                        }
                        let take = (*remaining).min(buf.len());
                        let piece = buf.split_to(take).freeze();
                        *remaining -= take;
                        if *remaining == 0 {
                            *state = ChunkedState::DataEnd;
                        }
                        return Ok(Some(piece));
                    }
                    ChunkedState::DataEnd => {
                        if buf.len() < 2 {
                            return Ok(None);
                        }
                        if &buf[..2] != b"\r\n" {
                            return Err(HttpError::Parse("missing CRLF after chunk".into()));
                        }
                        let _ = buf.split_to(2);
                        *state = ChunkedState::Size;
                    }
                    ChunkedState::Trailers => {
                        let Some(pos) = find_crlf(buf) else {
                            return Ok(None);
                        };
                        let line = buf.split_to(pos + 2);
                        if pos == 0 {
                            // Blank line: body complete.
                            self.done = true;
                            return Ok(None);
                        }
                        let _ = line;
                    }
                }
            },
        }
    }
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}

/// Parse a chunk-size line, stripping any `;ext=val` extensions.
fn parse_chunk_size(line: &[u8]) -> Result<usize, HttpError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| HttpError::Parse("chunk size line is not ASCII".into()))?;
    let hex = text.split(';').next().unwrap_or("").trim();
    usize::from_str_radix(hex, 16)
        .map_err(|_| HttpError::Parse(format!("bad chunk size: {text:?}")))
}
