//! Request/response exchange on a single connection.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::body::BodyReader;
use crate::error::HttpError;
use crate::request;
use crate::response::{self, ResponseHead};

/// Upper bound on the response head size.
const MAX_HEAD_LEN: usize = 64 * 1024;

/// Open a plain-TCP connection to `authority` (`host:port`).
pub async fn connect(authority: &str) -> Result<Connection<TcpStream>, HttpError> {
    let stream = TcpStream::connect(authority).await?;
    stream.set_nodelay(true)?;
    Ok(Connection::new(stream))
}

/// A connection ready to carry one HTTP/1.1 exchange.
///
/// Generic over the stream type so a TLS session (or an in-memory duplex
/// in tests) can stand in for a TCP socket.
pub struct Connection<S> {
    stream: S,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    /// Wrap an established stream.
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Send one request and read the response head.
    ///
    /// Consumes the connection: the returned [`ResponseStream`] owns the
    /// stream for the remainder of the exchange. The head (status and
    /// headers) is available immediately; the body is pulled lazily.
    pub async fn send_request(
        mut self,
        method: &str,
        path: &str,
        host: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<ResponseStream<S>, HttpError> {
        let req = request::serialize(method, path, host, headers, body);
        self.stream.write_all(&req).await?;
        self.stream.flush().await?;

        let mut buf = BytesMut::with_capacity(8 * 1024);
        let head_end = loop {
            if let Some(pos) = response::find_head_end(&buf) {
                break pos;
            }
            if buf.len() > MAX_HEAD_LEN {
                return Err(HttpError::Parse("response head too large".into()));
            }
            buf.reserve(8 * 1024);
            let n = self.stream.read_buf(&mut buf).await?;
            if n == 0 {
                return Err(HttpError::ConnectionClosed);
            }
        };

        let head = response::parse_head(&buf[..head_end])?;
        let leftover = buf.split_off(head_end + 4);
        let body = BodyReader::new(self.stream, leftover, &head);
        Ok(ResponseStream { head, body })
    }
}

/// An in-flight response: head available, body streamed on demand.
#[derive(Debug)]
pub struct ResponseStream<S> {
    head: ResponseHead,
    body: BodyReader<S>,
}

impl<S: AsyncRead + Unpin> ResponseStream<S> {
    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.head.status()
    }

    /// Response headers as (name, value) pairs, names lowercased.
    pub fn headers(&self) -> &[(String, String)] {
        self.head.headers()
    }

    /// First header value matching `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.header(name)
    }

    /// The parsed response head.
    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// Yield the next body piece, or `None` when the body is complete.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, HttpError> {
        self.body.next_chunk().await
    }
}
