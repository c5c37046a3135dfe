//! Shared call machinery: options, cancellation, and the transport driver
//! both controllers sit on.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use log::debug;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::time::Instant;

use grpcweb_http::{HttpError, ResponseStream};
use grpcweb_wire::frame::{self, Frame, FrameDecoder};
use grpcweb_wire::text::{self, TextDecoder};
use grpcweb_wire::{Code, Metadata, Status};

use crate::client::Mode;

/// Call lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Not yet started.
    Pending,
    /// Request sent; reading the response.
    Active,
    /// Transport finished; buffered messages still undelivered.
    Draining,
    /// Terminal: OK status delivered.
    Completed,
    /// Terminal: cancelled locally.
    Cancelled,
    /// Terminal: non-OK status delivered.
    Failed,
}

impl CallState {
    /// Whether the call has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

// ── Cancellation ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct CancelShared {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelShared {
    pub(crate) fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation has been requested.
    pub(crate) async fn cancelled(&self) {
        while !self.is_cancelled() {
            self.notify.notified().await;
        }
    }
}

/// Cancellation token for a call, created by the caller and passed via
/// [`CallOptions::with_cancel`]. Cloning shares the token.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    shared: Arc<CancelShared>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    pub(crate) fn shared(&self) -> Arc<CancelShared> {
        self.shared.clone()
    }
}

/// Cancellable handle to a streaming call.
///
/// Holds only a weak reference to the call's cancellation state: keeping
/// a handle does not keep the call alive, and cancelling after the call
/// ended is a no-op.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    shared: Weak<CancelShared>,
}

impl StreamHandle {
    pub(crate) fn new(shared: &Arc<CancelShared>) -> Self {
        Self {
            shared: Arc::downgrade(shared),
        }
    }

    /// Request cancellation of the stream. Delivery stops at the next
    /// dispatch point; no further events are observed.
    pub fn cancel(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.cancel();
        }
    }
}

// ── Options ─────────────────────────────────────────────────────────────

/// Per-call options, merged over the channel defaults (per-call wins on
/// name conflicts).
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    metadata: Metadata,
    deadline: Option<Duration>,
    cancel: Option<CancelHandle>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one metadata entry.
    pub fn metadata_entry(mut self, name: &str, value: &str) -> Self {
        self.metadata.insert(name, value);
        self
    }

    /// Replace the per-call metadata wholesale.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the call deadline, overriding the channel default.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancel(mut self, cancel: &CancelHandle) -> Self {
        self.cancel = Some(cancel.clone());
        self
    }

    pub(crate) fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub(crate) fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub(crate) fn cancel_shared(&self) -> Option<Arc<CancelShared>> {
        self.cancel.as_ref().map(CancelHandle::shared)
    }
}

// ── Call context ────────────────────────────────────────────────────────

/// Everything needed to put one call on the wire: the merged result of
/// channel configuration and per-call options.
pub(crate) struct CallContext {
    authority: String,
    path: String,
    metadata: Metadata,
    deadline: Option<Duration>,
    mode: Mode,
    max_frame_len: usize,
    request: Bytes,
}

impl CallContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        authority: String,
        path: String,
        metadata: Metadata,
        deadline: Option<Duration>,
        mode: Mode,
        max_frame_len: usize,
        request: Bytes,
    ) -> Self {
        Self {
            authority,
            path,
            metadata,
            deadline,
            mode,
            max_frame_len,
            request,
        }
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// Headers the call machinery owns; user metadata must not override them.
fn is_reserved(name: &str) -> bool {
    matches!(
        name,
        "host"
            | "content-type"
            | "content-length"
            | "accept"
            | "x-grpc-web"
            | "grpc-timeout"
            | "te"
            | "connection"
            | "transfer-encoding"
    )
}

// ── Status mapping ──────────────────────────────────────────────────────

/// Map a transport failure to the closest status; callers never see a
/// raw [`HttpError`].
pub(crate) fn status_from_transport(err: &HttpError) -> Status {
    match err {
        HttpError::ConnectionClosed => Status::unavailable("connection closed"),
        HttpError::Io(e) => Status::unavailable(format!("connection failed: {e}")),
        HttpError::Parse(m) => Status::internal(format!("malformed http response: {m}")),
    }
}

/// Run `fut` under the call deadline, mapping expiry to
/// `DEADLINE_EXCEEDED`.
pub(crate) async fn with_deadline<T>(
    deadline: Option<Instant>,
    fut: impl Future<Output = T>,
) -> Result<T, Status> {
    match deadline {
        Some(at) => tokio::time::timeout_at(at, fut)
            .await
            .map_err(|_| Status::deadline_exceeded("deadline exceeded")),
        None => Ok(fut.await),
    }
}

// ── Transport driver ────────────────────────────────────────────────────

/// An established call: response head consumed, frames pulled on demand.
pub(crate) struct ActiveCall {
    response: ResponseStream<TcpStream>,
    decoder: FrameDecoder,
    text: Option<TextDecoder>,
    deadline: Option<Instant>,
    metadata: Metadata,
    headers_status: Option<Status>,
}

impl ActiveCall {
    /// Connect, send the framed request, and validate the response head.
    pub(crate) async fn start(ctx: &CallContext) -> Result<Self, Status> {
        let deadline = ctx.deadline.map(|d| Instant::now() + d);
        debug!("POST {} on {} ({:?})", ctx.path, ctx.authority, ctx.mode);

        let conn = with_deadline(deadline, grpcweb_http::connect(&ctx.authority))
            .await?
            .map_err(|e| status_from_transport(&e))?;

        let mut headers: Vec<(String, String)> = vec![
            ("content-type".into(), ctx.mode.content_type().into()),
            ("accept".into(), ctx.mode.content_type().into()),
            ("x-grpc-web".into(), "1".into()),
        ];
        if let Some(d) = ctx.deadline {
            // grpc-timeout allows at most 8 digits.
            let ms = (d.as_millis() as u64).min(99_999_999);
            headers.push(("grpc-timeout".into(), format!("{ms}m")));
        }
        for (name, value) in ctx.metadata.iter() {
            if !is_reserved(name) {
                headers.push((name.into(), value.into()));
            }
        }

        let mut framed = Vec::with_capacity(frame::FRAME_PREFIX_LEN + ctx.request.len());
        frame::encode_data(&ctx.request, &mut framed);
        let body = match ctx.mode {
            Mode::Binary => framed,
            Mode::Text => text::encode(&framed),
        };

        let response = with_deadline(
            deadline,
            conn.send_request("POST", &ctx.path, &ctx.authority, &headers, &body),
        )
        .await?
        .map_err(|e| status_from_transport(&e))?;

        let http_status = response.status();
        if !(200..300).contains(&http_status) {
            return Err(Status::new(
                Code::from_http(http_status),
                format!("HTTP status {http_status}"),
            ));
        }

        match response.header("content-type").and_then(family_of) {
            Some(family) if family == ctx.mode => {}
            _ => {
                return Err(Status::internal(format!(
                    "unexpected response content-type {:?} for {:?} call",
                    response.header("content-type").unwrap_or(""),
                    ctx.mode
                )))
            }
        }

        let mut metadata = Metadata::new();
        for (name, value) in response.headers() {
            metadata.insert(name, value);
        }

        // A response carrying grpc-status in its HTTP headers is a
        // trailers-only response: the status arrives before any body.
        let headers_status = if metadata.contains("grpc-status") {
            Some(Status::from_trailers(metadata.clone()))
        } else {
            None
        };

        Ok(Self {
            response,
            decoder: FrameDecoder::new(ctx.max_frame_len),
            text: matches!(ctx.mode, Mode::Text).then(TextDecoder::new),
            deadline,
            metadata,
            headers_status,
        })
    }

    /// Initial response metadata.
    pub(crate) fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Status delivered via HTTP headers (trailers-only response), if any.
    pub(crate) fn take_headers_status(&mut self) -> Option<Status> {
        self.headers_status.take()
    }

    /// Whether undecoded bytes remain buffered past the last frame.
    pub(crate) fn has_residue(&self) -> bool {
        !self.decoder.is_empty()
    }

    /// Pull the next frame, reading transport chunks as needed.
    ///
    /// `Ok(None)` means the body ended; whether that is legal is the
    /// controller's call (it is not, unless a TRAILERS frame was seen).
    pub(crate) async fn next_frame(&mut self) -> Result<Option<Frame>, Status> {
        loop {
            match self.decoder.try_next() {
                Ok(Some(frame)) => return Ok(Some(frame)),
                Ok(None) => {}
                Err(e) => return Err(Status::internal(e.to_string())),
            }

            match with_deadline(self.deadline, self.response.next_chunk()).await? {
                Ok(Some(chunk)) => match &mut self.text {
                    Some(text) => {
                        let mut decoded = Vec::with_capacity(chunk.len() / 4 * 3);
                        text.push(&chunk, &mut decoded)
                            .map_err(|e| Status::internal(e.to_string()))?;
                        self.decoder.push(&decoded);
                    }
                    None => self.decoder.push(&chunk),
                },
                Ok(None) => {
                    if let Some(text) = &self.text {
                        text.finish().map_err(|e| Status::internal(e.to_string()))?;
                    }
                    return Ok(None);
                }
                Err(e) => return Err(status_from_transport(&e)),
            }
        }
    }
}

/// Which wire family a response content-type belongs to.
fn family_of(content_type: &str) -> Option<Mode> {
    if content_type.starts_with("application/grpc-web-text") {
        Some(Mode::Text)
    } else if content_type.starts_with("application/grpc-web") {
        Some(Mode::Binary)
    } else {
        None
    }
}
