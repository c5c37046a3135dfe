//! Server-streaming call controller.

use std::sync::Arc;

use bytes::Bytes;
use log::debug;

use grpcweb_wire::frame::Frame;
use grpcweb_wire::{Metadata, Status};

use crate::call::{ActiveCall, CallContext, CallOptions, CallState, CancelShared, StreamHandle};

/// A server-streaming call in flight.
///
/// [`next_message`](Self::next_message) yields the ordered event sequence:
/// `Ok(Some(bytes))` per DATA frame in wire order, then exactly one
/// terminal event -- `Ok(None)` after an OK trailers frame, or
/// `Err(status)` for any non-OK outcome. After the terminal event the
/// stream is fused: further polls return `Ok(None)`.
///
/// Messages are decoded frame by frame from at most one pending transport
/// chunk, so a consumer that stops pulling stops the underlying reads.
///
/// A cancelled stream delivers nothing further: no message, no end, no
/// error. [`trailers`](Self::trailers) stays `None` and
/// [`state`](Self::state) reports [`CallState::Cancelled`].
pub struct ServerStream {
    call: Option<ActiveCall>,
    cancel: Arc<CancelShared>,
    state: CallState,
    metadata: Metadata,
    trailers: Option<Metadata>,
    pending: Option<Pending>,
}

/// Terminal outcome decided at invoke time, delivered on the first poll.
enum Pending {
    Error(Status),
    End(Metadata),
}

impl ServerStream {
    pub(crate) async fn invoke(ctx: CallContext, options: CallOptions) -> Self {
        let cancel = options
            .cancel_shared()
            .unwrap_or_else(|| Arc::new(CancelShared::default()));

        match ActiveCall::start(&ctx).await {
            Ok(mut call) => {
                let metadata = call.metadata().clone();
                let pending = call.take_headers_status().map(|status| {
                    debug!("{}: trailers-only response, {status}", ctx.path());
                    if status.is_ok() {
                        Pending::End(status.metadata().clone())
                    } else {
                        Pending::Error(status)
                    }
                });
                Self {
                    call: Some(call),
                    cancel,
                    state: CallState::Active,
                    metadata,
                    trailers: None,
                    pending,
                }
            }
            Err(status) => Self {
                call: None,
                cancel,
                state: CallState::Active,
                metadata: Metadata::new(),
                trailers: None,
                pending: Some(Pending::Error(status)),
            },
        }
    }

    /// Initial response metadata (empty if the transport failed before a
    /// response arrived).
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Trailer metadata, available once the stream completed with OK.
    pub fn trailers(&self) -> Option<&Metadata> {
        self.trailers.as_ref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CallState {
        self.state
    }

    /// A cancellable handle to this stream, holding only a weak reference
    /// to the call.
    pub fn handle(&self) -> StreamHandle {
        StreamHandle::new(&self.cancel)
    }

    /// Cancel the stream: release the connection and stop all further
    /// delivery. Silent -- no terminal event follows.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if !self.state.is_terminal() {
            debug!("stream cancelled");
            self.teardown(CallState::Cancelled);
        }
    }

    /// Pull the next event; see the type-level docs for the sequence
    /// guarantees.
    pub async fn next_message(&mut self) -> Result<Option<Bytes>, Status> {
        if self.cancel.is_cancelled() && !self.state.is_terminal() {
            self.teardown(CallState::Cancelled);
        }
        if self.state.is_terminal() {
            return Ok(None);
        }

        match self.pending.take() {
            Some(Pending::Error(status)) => {
                self.teardown(CallState::Failed);
                return Err(status);
            }
            Some(Pending::End(trailers)) => {
                self.trailers = Some(trailers);
                self.teardown(CallState::Completed);
                return Ok(None);
            }
            None => {}
        }

        let cancel = self.cancel.clone();
        let frame = {
            let call = self
                .call
                .as_mut()
                .expect("active stream without transport");
            tokio::select! {
                _ = cancel.cancelled() => None,
                frame = call.next_frame() => Some(frame),
            }
        };

        // Flag check before dispatch: a cancellation racing the read wins.
        let Some(frame) = frame else {
            self.teardown(CallState::Cancelled);
            return Ok(None);
        };
        if cancel.is_cancelled() {
            self.teardown(CallState::Cancelled);
            return Ok(None);
        }

        let residue = self.call.as_ref().map_or(false, ActiveCall::has_residue);
        match frame {
            Ok(Some(Frame::Data(payload))) => {
                self.state = if residue {
                    CallState::Draining
                } else {
                    CallState::Active
                };
                Ok(Some(payload))
            }
            Ok(Some(Frame::Trailers(block))) => {
                let status = match Status::from_trailer_block(&block) {
                    Ok(status) => status,
                    Err(e) => {
                        self.teardown(CallState::Failed);
                        return Err(Status::internal(e.to_string()));
                    }
                };
                if residue {
                    self.teardown(CallState::Failed);
                    return Err(Status::internal(
                        "protocol violation: bytes after trailers",
                    ));
                }
                debug!("stream finished: {status}");
                if status.is_ok() {
                    self.trailers = Some(status.metadata().clone());
                    self.teardown(CallState::Completed);
                    Ok(None)
                } else {
                    self.teardown(CallState::Failed);
                    Err(status)
                }
            }
            Ok(None) => {
                self.teardown(CallState::Failed);
                Err(Status::unknown("stream closed without trailers"))
            }
            Err(status) => {
                self.teardown(CallState::Failed);
                Err(status)
            }
        }
    }

    /// Drop the transport and enter a terminal state.
    fn teardown(&mut self, state: CallState) {
        self.call = None;
        self.state = state;
    }
}
