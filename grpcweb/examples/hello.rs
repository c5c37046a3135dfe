//! Hello demo: a hand-written Echo stub over the transport core.
//!
//! Issues a unary `/Echo/Hello` and a server-streaming `/Echo/RepeatHello`
//! against a gRPC-Web server and prints the replies. Message bytes are
//! built and parsed by hand here; a schema compiler would normally
//! generate this part.
//!
//! Usage: `hello [http://host:port]` (defaults to `http://127.0.0.1:8000`).

use bytes::Bytes;
use grpcweb::{CallOptions, Client};

fn put_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// `HelloRequest { name: <name> }`
fn hello_request(name: &str) -> Bytes {
    let mut msg = Vec::new();
    msg.push(0x0a); // field 1, length-delimited
    put_varint(name.len() as u64, &mut msg);
    msg.extend_from_slice(name.as_bytes());
    msg.into()
}

/// `RepeatHelloRequest { name: <name>, count: <count> }`
fn repeat_hello_request(name: &str, count: u64) -> Bytes {
    let mut msg = Vec::new();
    msg.push(0x0a);
    put_varint(name.len() as u64, &mut msg);
    msg.extend_from_slice(name.as_bytes());
    msg.push(0x10); // field 2, varint
    put_varint(count, &mut msg);
    msg.into()
}

/// `HelloReply { message: ... }` -> the message string.
fn reply_message(payload: &[u8]) -> String {
    let mut i = 0;
    if payload.get(i) == Some(&0x0a) {
        i += 1;
        let mut len = 0usize;
        let mut shift = 0;
        while let Some(&byte) = payload.get(i) {
            i += 1;
            len |= ((byte & 0x7f) as usize) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                break;
            }
        }
        if let Some(bytes) = payload.get(i..i + len) {
            return String::from_utf8_lossy(bytes).into_owned();
        }
    }
    format!("(unparseable reply: {} bytes)", payload.len())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let origin = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:8000".to_string());
    let client = Client::builder(&origin).build()?;

    // Simple unary call.
    match client
        .unary("/Echo/Hello", hello_request("Arion"), CallOptions::new())
        .await
    {
        Ok(reply) => match reply.into_message() {
            Some(payload) => println!("{}", reply_message(&payload)),
            None => println!("(empty reply)"),
        },
        Err(status) => println!(
            "unexpected error for Hello: code = {}, message = {:?}",
            status.code(),
            status.message()
        ),
    }

    // Server-streaming call.
    let mut stream = client
        .server_streaming(
            "/Echo/RepeatHello",
            repeat_hello_request("Arion", 5),
            CallOptions::new(),
        )
        .await;
    loop {
        match stream.next_message().await {
            Ok(Some(payload)) => println!("{}", reply_message(&payload)),
            Ok(None) => break,
            Err(status) => {
                println!(
                    "unexpected stream error: code = {}, message = {:?}",
                    status.code(),
                    status.message()
                );
                break;
            }
        }
    }

    Ok(())
}
