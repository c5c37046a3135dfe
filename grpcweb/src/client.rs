//! Channel configuration and call entry points.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use grpcweb_wire::Metadata;

use crate::call::{CallContext, CallOptions};
use crate::streaming::ServerStream;
use crate::unary::{self, UnaryReply};
use grpcweb_wire::Status;

/// Default cap on a single response frame's payload.
pub const DEFAULT_MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// Wire mode: how frames are carried in the HTTP body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `application/grpc-web+proto`: raw frames.
    Binary,
    /// `application/grpc-web-text+proto`: base64-wrapped frames, for
    /// channels that cannot carry binary bodies.
    Text,
}

impl Mode {
    pub(crate) fn content_type(self) -> &'static str {
        match self {
            Mode::Binary => "application/grpc-web+proto",
            Mode::Text => "application/grpc-web-text+proto",
        }
    }
}

/// Errors building a [`Client`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The origin URL could not be understood.
    #[error("invalid origin: {0}")]
    InvalidOrigin(String),
}

struct Channel {
    authority: String,
    path_prefix: String,
    default_metadata: Metadata,
    default_deadline: Option<Duration>,
    mode: Mode,
    max_frame_len: usize,
}

/// A gRPC-Web channel: immutable configuration plus the two call entry
/// points generated stubs consume.
///
/// Cloning is cheap; clones share the configuration. Concurrent calls are
/// fully independent -- each owns its own connection and controller state.
///
/// # Example
///
/// ```rust,ignore
/// use grpcweb::{CallOptions, Client};
///
/// let client = Client::builder("http://127.0.0.1:8000").build()?;
///
/// let reply = client
///     .unary("/Echo/Hello", request_bytes, CallOptions::new())
///     .await?;
///
/// let mut stream = client
///     .server_streaming("/Echo/RepeatHello", request_bytes, CallOptions::new())
///     .await;
/// while let Some(message) = stream.next_message().await? {
///     // one message per DATA frame, in wire order
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    channel: Arc<Channel>,
}

impl Client {
    /// Start building a client for `origin`, e.g. `http://127.0.0.1:8000`.
    pub fn builder(origin: &str) -> ClientBuilder {
        ClientBuilder {
            origin: origin.to_string(),
            default_metadata: Metadata::new(),
            default_deadline: None,
            mode: Mode::Binary,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Issue a unary call: one request, one response.
    ///
    /// Resolves exactly once, with the reply or the terminal [`Status`].
    /// Transport and framing failures surface as statuses, never as raw
    /// errors.
    pub async fn unary(
        &self,
        method: &str,
        request: impl Into<Bytes>,
        options: CallOptions,
    ) -> Result<UnaryReply, Status> {
        let ctx = self.prepare(method, request.into(), &options);
        unary::invoke(ctx, options).await
    }

    /// Issue a server-streaming call: one request, many responses.
    ///
    /// The returned stream yields messages in wire order and ends with
    /// exactly one terminal event; see [`ServerStream::next_message`].
    pub async fn server_streaming(
        &self,
        method: &str,
        request: impl Into<Bytes>,
        options: CallOptions,
    ) -> ServerStream {
        let ctx = self.prepare(method, request.into(), &options);
        ServerStream::invoke(ctx, options).await
    }

    fn prepare(&self, method: &str, request: Bytes, options: &CallOptions) -> CallContext {
        let ch = &self.channel;
        CallContext::new(
            ch.authority.clone(),
            format!("{}{}", ch.path_prefix, method),
            ch.default_metadata.merge_over(options.metadata()),
            options.deadline().or(ch.default_deadline),
            ch.mode,
            ch.max_frame_len,
            request,
        )
    }
}

/// Builder for [`Client`] with `build()` validation.
pub struct ClientBuilder {
    origin: String,
    default_metadata: Metadata,
    default_deadline: Option<Duration>,
    mode: Mode,
    max_frame_len: usize,
}

impl ClientBuilder {
    /// Add a default metadata entry sent on every call. Per-call metadata
    /// with the same name replaces it.
    pub fn metadata(mut self, name: &str, value: &str) -> Self {
        self.default_metadata.insert(name, value);
        self
    }

    /// Set the default deadline applied when a call sets none.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline = Some(deadline);
        self
    }

    /// Select the wire mode. Defaults to [`Mode::Binary`].
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Cap the payload length of a single response frame.
    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    /// Validate the origin and build the client.
    pub fn build(self) -> Result<Client, ConfigError> {
        let rest = self
            .origin
            .strip_prefix("http://")
            .ok_or_else(|| ConfigError::InvalidOrigin(format!(
                "expected http:// origin, got {:?}; layer TLS via grpcweb-http directly",
                self.origin
            )))?;

        let (authority, path) = match rest.find('/') {
            Some(pos) => (&rest[..pos], rest[pos..].trim_end_matches('/')),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(ConfigError::InvalidOrigin(self.origin.clone()));
        }
        let authority = if authority.contains(':') {
            authority.to_string()
        } else {
            format!("{authority}:80")
        };

        Ok(Client {
            channel: Arc::new(Channel {
                authority,
                path_prefix: path.to_string(),
                default_metadata: self.default_metadata,
                default_deadline: self.default_deadline,
                mode: self.mode,
                max_frame_len: self.max_frame_len,
            }),
        })
    }
}
