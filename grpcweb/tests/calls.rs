//! Integration tests: unary and streaming calls against a scripted
//! in-process gRPC-Web server.
//!
//! The mock server speaks just enough HTTP/1.1 to accept one POST and
//! play back a scripted response, piece by piece, so tests control
//! exactly how frames land on chunk boundaries.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use grpcweb::{CallOptions, CallState, CancelHandle, Client, Code, Mode};
use grpcweb_wire::frame;
use grpcweb_wire::text;

const BINARY_CT: &str = "application/grpc-web+proto";
const TEXT_CT: &str = "application/grpc-web-text+proto";

// ── Mock server ─────────────────────────────────────────────────────────

fn response_head(status: u16, content_type: &str, extra: &[(&str, &str)]) -> Vec<u8> {
    let mut head = format!("HTTP/1.1 {status} OK\r\ncontent-type: {content_type}\r\n");
    for (name, value) in extra {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    head.into_bytes()
}

fn data_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    frame::encode_data(payload, &mut out);
    out
}

fn trailers_frame(block: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    frame::encode_trailers(block, &mut out);
    out
}

fn ok_trailers() -> Vec<u8> {
    trailers_frame(b"grpc-status: 0\r\n")
}

/// Read one full request (head plus content-length body).
async fn read_request(sock: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    loop {
        let n = sock.read(&mut tmp).await.unwrap();
        assert!(n > 0, "client closed before sending a full request");
        buf.extend_from_slice(&tmp[..n]);

        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
            let content_length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= pos + 4 + content_length {
                return buf;
            }
        }
    }
}

/// Accept one call, capture the request, play back `pieces` with short
/// pauses, then close. The returned handle yields the raw request bytes.
async fn serve(pieces: Vec<Vec<u8>>) -> (SocketAddr, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let request = read_request(&mut sock).await;
        for piece in pieces {
            let _ = sock.write_all(&piece).await;
            let _ = sock.flush().await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        request
    });
    (addr, handle)
}

/// Accept one call, play back `pieces`, then hold the connection open.
async fn serve_and_stall(pieces: Vec<Vec<u8>>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let _ = read_request(&mut sock).await;
        for piece in pieces {
            let _ = sock.write_all(&piece).await;
            let _ = sock.flush().await;
        }
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(sock);
    });
    addr
}

fn client_for(addr: SocketAddr) -> Client {
    Client::builder(&format!("http://{addr}")).build().unwrap()
}

// ── Unary ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn unary_hello() {
    let reply_payload = b"\x0a\x0bHello Arion";
    let (addr, server) = serve(vec![
        response_head(200, BINARY_CT, &[]),
        data_frame(reply_payload),
        ok_trailers(),
    ])
    .await;

    let request_payload = b"\x0a\x05Arion";
    let reply = client_for(addr)
        .unary("/Echo/Hello", &request_payload[..], CallOptions::new())
        .await
        .unwrap();

    assert_eq!(reply.message().map(|m| &m[..]), Some(&reply_payload[..]));

    // The request went out as POST with one framed DATA payload.
    let request = server.await.unwrap();
    let text = String::from_utf8_lossy(&request);
    assert!(text.starts_with("POST /Echo/Hello HTTP/1.1\r\n"));
    assert!(text.contains(&format!("content-type: {BINARY_CT}\r\n")));
    assert!(text.contains("x-grpc-web: 1\r\n"));
    let body_start = request.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
    assert_eq!(&request[body_start..], &data_frame(request_payload)[..]);
}

#[tokio::test]
async fn unary_frames_split_at_arbitrary_boundaries() {
    let mut body = response_head(200, BINARY_CT, &[]);
    body.extend(data_frame(b"split me up"));
    body.extend(ok_trailers());

    // Deliver in 3-byte slivers.
    let pieces: Vec<Vec<u8>> = body.chunks(3).map(|c| c.to_vec()).collect();
    let (addr, _server) = serve(pieces).await;

    let reply = client_for(addr)
        .unary("/Echo/Hello", &b"x"[..], CallOptions::new())
        .await
        .unwrap();
    assert_eq!(reply.message().map(|m| &m[..]), Some(&b"split me up"[..]));
}

#[tokio::test]
async fn unary_remote_error_passes_through() {
    let (addr, _server) = serve(vec![
        response_head(200, BINARY_CT, &[]),
        trailers_frame(b"grpc-status: 5\r\ngrpc-message: no%20such%20user\r\n"),
    ])
    .await;

    let status = client_for(addr)
        .unary("/Echo/Hello", &b"x"[..], CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(status.message(), "no such user");
}

#[tokio::test]
async fn unary_trailers_only_response() {
    let (addr, _server) = serve(vec![
        response_head(200, BINARY_CT, &[]),
        trailers_frame(b"grpc-status: 0\r\nx-info: done\r\n"),
    ])
    .await;

    let reply = client_for(addr)
        .unary("/Echo/Hello", &b"x"[..], CallOptions::new())
        .await
        .unwrap();
    assert!(reply.message().is_none());
    assert_eq!(reply.trailers().get("x-info"), Some("done"));
}

#[tokio::test]
async fn unary_trailers_only_via_http_headers() {
    // Some servers fold a trailers-only response into the HTTP headers.
    let (addr, _server) = serve(vec![response_head(
        200,
        BINARY_CT,
        &[("grpc-status", "0"), ("content-length", "0")],
    )])
    .await;

    let reply = client_for(addr)
        .unary("/Echo/Hello", &b"x"[..], CallOptions::new())
        .await
        .unwrap();
    assert!(reply.message().is_none());
}

#[tokio::test]
async fn unary_second_data_frame_is_protocol_error() {
    let (addr, _server) = serve(vec![
        response_head(200, BINARY_CT, &[]),
        data_frame(b"one"),
        data_frame(b"two"),
        ok_trailers(),
    ])
    .await;

    let status = client_for(addr)
        .unary("/Echo/Hello", &b"x"[..], CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Internal);
}

#[tokio::test]
async fn unary_missing_trailers_is_unknown() {
    let (addr, _server) = serve(vec![
        response_head(200, BINARY_CT, &[]),
        data_frame(b"payload"),
        // Connection closes without a TRAILERS frame.
    ])
    .await;

    let status = client_for(addr)
        .unary("/Echo/Hello", &b"x"[..], CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unknown);
    assert_eq!(status.message(), "stream closed without trailers");
}

#[tokio::test]
async fn unary_connect_failure_is_unavailable() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let status = client_for(addr)
        .unary("/Echo/Hello", &b"x"[..], CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
}

#[tokio::test]
async fn unary_http_error_status_mapped() {
    let (addr, _server) = serve(vec![response_head(
        503,
        "text/plain",
        &[("content-length", "0")],
    )])
    .await;

    let status = client_for(addr)
        .unary("/Echo/Hello", &b"x"[..], CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
}

#[tokio::test]
async fn unary_content_type_mismatch_is_internal() {
    let (addr, _server) = serve(vec![
        response_head(200, "text/html", &[]),
        b"<html></html>".to_vec(),
    ])
    .await;

    let status = client_for(addr)
        .unary("/Echo/Hello", &b"x"[..], CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Internal);
}

#[tokio::test]
async fn unary_deadline_exceeded() {
    let addr = serve_and_stall(vec![]).await;

    let options = CallOptions::new().with_deadline(Duration::from_millis(100));
    let status = client_for(addr)
        .unary("/Echo/Hello", &b"x"[..], options)
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::DeadlineExceeded);
}

#[tokio::test]
async fn unary_cancelled_midway() {
    let addr = serve_and_stall(vec![response_head(200, BINARY_CT, &[])]).await;

    let cancel = CancelHandle::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let options = CallOptions::new().with_cancel(&cancel);
    let status = client_for(addr)
        .unary("/Echo/Hello", &b"x"[..], options)
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Cancelled);
}

#[tokio::test]
async fn unary_metadata_merge_and_deadline_header() {
    let (addr, server) = serve(vec![
        response_head(200, BINARY_CT, &[]),
        trailers_frame(b"grpc-status: 0\r\n"),
    ])
    .await;

    let client = Client::builder(&format!("http://{addr}"))
        .metadata("authorization", "default-token")
        .metadata("x-channel", "base")
        .build()
        .unwrap();

    let options = CallOptions::new()
        .metadata_entry("authorization", "call-token")
        .with_deadline(Duration::from_secs(2));
    client
        .unary("/Echo/Hello", &b"x"[..], options)
        .await
        .unwrap();

    let request = String::from_utf8(server.await.unwrap()).unwrap();
    assert!(request.contains("authorization: call-token\r\n"));
    assert!(!request.contains("default-token"));
    assert!(request.contains("x-channel: base\r\n"));
    assert!(request.contains("grpc-timeout: 2000m\r\n"));
}

#[tokio::test]
async fn unary_initial_metadata_exposed() {
    let (addr, _server) = serve(vec![
        response_head(200, BINARY_CT, &[("x-request-id", "abc-123")]),
        data_frame(b"m"),
        ok_trailers(),
    ])
    .await;

    let reply = client_for(addr)
        .unary("/Echo/Hello", &b"x"[..], CallOptions::new())
        .await
        .unwrap();
    assert_eq!(reply.metadata().get("x-request-id"), Some("abc-123"));
}

// ── Server streaming ────────────────────────────────────────────────────

#[tokio::test]
async fn streaming_repeat_hello() {
    let mut pieces = vec![response_head(200, BINARY_CT, &[])];
    for i in 0..5 {
        pieces.push(data_frame(format!("Hello Arion #{i}").as_bytes()));
    }
    pieces.push(ok_trailers());
    let (addr, _server) = serve(pieces).await;

    let mut stream = client_for(addr)
        .server_streaming("/Echo/RepeatHello", &b"x"[..], CallOptions::new())
        .await;

    let mut messages = Vec::new();
    while let Some(message) = stream.next_message().await.unwrap() {
        messages.push(String::from_utf8(message.to_vec()).unwrap());
    }
    assert_eq!(
        messages,
        (0..5).map(|i| format!("Hello Arion #{i}")).collect::<Vec<_>>()
    );
    assert_eq!(stream.state(), CallState::Completed);
    assert!(stream.trailers().is_some());

    // Fused after the terminal event.
    assert!(stream.next_message().await.unwrap().is_none());
}

#[tokio::test]
async fn streaming_error_after_data() {
    let (addr, _server) = serve(vec![
        response_head(200, BINARY_CT, &[]),
        data_frame(b"one"),
        data_frame(b"two"),
        trailers_frame(b"grpc-status: 13\r\ngrpc-message: boom\r\n"),
    ])
    .await;

    let mut stream = client_for(addr)
        .server_streaming("/Echo/RepeatHello", &b"x"[..], CallOptions::new())
        .await;

    assert_eq!(&*stream.next_message().await.unwrap().unwrap(), b"one");
    assert_eq!(&*stream.next_message().await.unwrap().unwrap(), b"two");
    let status = stream.next_message().await.unwrap_err();
    assert_eq!(status.code(), Code::Internal);
    assert_eq!(status.message(), "boom");
    assert_eq!(stream.state(), CallState::Failed);
    assert!(stream.trailers().is_none());

    // Exactly one terminal event.
    assert!(stream.next_message().await.unwrap().is_none());
}

#[tokio::test]
async fn streaming_messages_arrive_in_wire_order_when_batched() {
    // All frames in a single write: the decoder drains them in order.
    let mut body = response_head(200, BINARY_CT, &[]);
    for i in 0..10 {
        body.extend(data_frame(format!("m{i}").as_bytes()));
    }
    body.extend(ok_trailers());
    let (addr, _server) = serve(vec![body]).await;

    let mut stream = client_for(addr)
        .server_streaming("/Echo/RepeatHello", &b"x"[..], CallOptions::new())
        .await;

    for i in 0..10 {
        let message = stream.next_message().await.unwrap().unwrap();
        assert_eq!(&*message, format!("m{i}").as_bytes());
    }
    assert!(stream.next_message().await.unwrap().is_none());
}

#[tokio::test]
async fn streaming_cancel_stops_delivery() {
    let addr = serve_and_stall(vec![
        response_head(200, BINARY_CT, &[]),
        data_frame(b"one"),
        data_frame(b"two"),
    ])
    .await;

    let mut stream = client_for(addr)
        .server_streaming("/Echo/RepeatHello", &b"x"[..], CallOptions::new())
        .await;

    assert_eq!(&*stream.next_message().await.unwrap().unwrap(), b"one");
    assert_eq!(&*stream.next_message().await.unwrap().unwrap(), b"two");

    stream.cancel();
    assert_eq!(stream.state(), CallState::Cancelled);

    // No further data, end, or error events.
    assert!(stream.next_message().await.unwrap().is_none());
    assert!(stream.next_message().await.unwrap().is_none());
    assert!(stream.trailers().is_none());
}

#[tokio::test]
async fn streaming_cancel_via_handle_unblocks_pending_read() {
    let addr = serve_and_stall(vec![
        response_head(200, BINARY_CT, &[]),
        data_frame(b"one"),
    ])
    .await;

    let mut stream = client_for(addr)
        .server_streaming("/Echo/RepeatHello", &b"x"[..], CallOptions::new())
        .await;
    assert_eq!(&*stream.next_message().await.unwrap().unwrap(), b"one");

    let handle = stream.handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    // The stream is parked waiting for bytes; the handle wakes it.
    assert!(stream.next_message().await.unwrap().is_none());
    assert_eq!(stream.state(), CallState::Cancelled);
}

#[tokio::test]
async fn streaming_transport_failure_is_single_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut stream = client_for(addr)
        .server_streaming("/Echo/RepeatHello", &b"x"[..], CallOptions::new())
        .await;

    let status = stream.next_message().await.unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
    assert_eq!(stream.state(), CallState::Failed);
    assert!(stream.next_message().await.unwrap().is_none());
}

#[tokio::test]
async fn streaming_data_after_trailers_is_protocol_error() {
    // Trailers and a late DATA frame land in the same write.
    let mut tail = ok_trailers();
    tail.extend(data_frame(b"late"));
    let (addr, _server) = serve(vec![
        response_head(200, BINARY_CT, &[]),
        data_frame(b"one"),
        tail,
    ])
    .await;

    let mut stream = client_for(addr)
        .server_streaming("/Echo/RepeatHello", &b"x"[..], CallOptions::new())
        .await;

    assert_eq!(&*stream.next_message().await.unwrap().unwrap(), b"one");
    let status = stream.next_message().await.unwrap_err();
    assert_eq!(status.code(), Code::Internal);
}

#[tokio::test]
async fn streaming_oversized_frame_is_internal() {
    let (addr, _server) = serve(vec![
        response_head(200, BINARY_CT, &[]),
        data_frame(&vec![0u8; 64]),
    ])
    .await;

    let client = Client::builder(&format!("http://{addr}"))
        .max_frame_len(16)
        .build()
        .unwrap();
    let mut stream = client
        .server_streaming("/Echo/RepeatHello", &b"x"[..], CallOptions::new())
        .await;

    let status = stream.next_message().await.unwrap_err();
    assert_eq!(status.code(), Code::Internal);
}

// ── Text mode ───────────────────────────────────────────────────────────

#[tokio::test]
async fn text_mode_round_trip() {
    // Response body: two independently padded base64 segments, the way a
    // server that flushes between frames produces them.
    let mut body = text::encode(&data_frame(b"text hello"));
    body.extend(text::encode(&ok_trailers()));
    let (addr, server) = serve(vec![response_head(200, TEXT_CT, &[]), body]).await;

    let client = Client::builder(&format!("http://{addr}"))
        .mode(Mode::Text)
        .build()
        .unwrap();
    let reply = client
        .unary("/Echo/Hello", &b"req"[..], CallOptions::new())
        .await
        .unwrap();
    assert_eq!(reply.message().map(|m| &m[..]), Some(&b"text hello"[..]));

    // The request body went out base64-encoded.
    let request = server.await.unwrap();
    let text_of = String::from_utf8_lossy(&request);
    assert!(text_of.contains(&format!("content-type: {TEXT_CT}\r\n")));
    let body_start = request.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
    let mut decoder = text::TextDecoder::new();
    let mut decoded = Vec::new();
    decoder.push(&request[body_start..], &mut decoded).unwrap();
    decoder.finish().unwrap();
    assert_eq!(decoded, data_frame(b"req"));
}

#[tokio::test]
async fn text_mode_rejects_binary_response() {
    let (addr, _server) = serve(vec![
        response_head(200, BINARY_CT, &[]),
        data_frame(b"m"),
        ok_trailers(),
    ])
    .await;

    let client = Client::builder(&format!("http://{addr}"))
        .mode(Mode::Text)
        .build()
        .unwrap();
    let status = client
        .unary("/Echo/Hello", &b"x"[..], CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Internal);
}
