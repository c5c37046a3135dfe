//! Unary call controller: one request, one response, one completion.

use bytes::Bytes;
use log::debug;

use grpcweb_wire::frame::Frame;
use grpcweb_wire::{Metadata, Status};

use crate::call::{ActiveCall, CallContext, CallOptions};

/// The successful completion of a unary call.
///
/// `message` is `None` for a trailers-only response: the server ended the
/// call with an OK status and no payload.
#[derive(Debug)]
pub struct UnaryReply {
    message: Option<Bytes>,
    metadata: Metadata,
    trailers: Metadata,
}

impl UnaryReply {
    /// The response payload, if one was sent.
    pub fn message(&self) -> Option<&Bytes> {
        self.message.as_ref()
    }

    /// Consume the reply, returning the payload.
    pub fn into_message(self) -> Option<Bytes> {
        self.message
    }

    /// Initial response metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Trailer metadata beyond the status.
    pub fn trailers(&self) -> &Metadata {
        &self.trailers
    }
}

/// Drive a unary call to its single completion.
pub(crate) async fn invoke(
    ctx: CallContext,
    options: CallOptions,
) -> Result<UnaryReply, Status> {
    match options.cancel_shared() {
        None => drive(&ctx).await,
        Some(cancel) => {
            if cancel.is_cancelled() {
                return Err(Status::cancelled("call cancelled"));
            }
            tokio::select! {
                _ = cancel.cancelled() => Err(Status::cancelled("call cancelled")),
                completion = drive(&ctx) => completion,
            }
        }
    }
}

async fn drive(ctx: &CallContext) -> Result<UnaryReply, Status> {
    let mut call = ActiveCall::start(ctx).await?;
    let metadata = call.metadata().clone();

    if let Some(status) = call.take_headers_status() {
        debug!("{}: trailers-only response, {status}", ctx.path());
        return finish(metadata, None, status);
    }

    let mut message: Option<Bytes> = None;
    loop {
        match call.next_frame().await? {
            Some(Frame::Data(payload)) => {
                if message.is_some() {
                    return Err(Status::internal(
                        "protocol violation: second data frame in unary call",
                    ));
                }
                message = Some(payload);
            }
            Some(Frame::Trailers(block)) => {
                let status = Status::from_trailer_block(&block)
                    .map_err(|e| Status::internal(e.to_string()))?;
                if call.has_residue() {
                    return Err(Status::internal(
                        "protocol violation: bytes after trailers",
                    ));
                }
                debug!("{}: {status}", ctx.path());
                return finish(metadata, message, status);
            }
            None => {
                return Err(Status::unknown("stream closed without trailers"));
            }
        }
    }
}

fn finish(
    metadata: Metadata,
    message: Option<Bytes>,
    status: Status,
) -> Result<UnaryReply, Status> {
    if status.is_ok() {
        Ok(UnaryReply {
            message,
            metadata,
            trailers: status.metadata().clone(),
        })
    } else {
        Err(status)
    }
}
