//! HTTP/1.1 request serialization.

/// Serialize a request head plus body into a single send buffer.
///
/// `content-length` is always emitted; the caller supplies every other
/// header. Header names are written as given -- HTTP/1.1 field names are
/// case-insensitive on the wire.
pub fn serialize(
    method: &str,
    path: &str,
    host: &str,
    headers: &[(String, String)],
    body: &[u8],
) -> Vec<u8> {
    let mut req = Vec::with_capacity(256 + body.len());
    req.extend_from_slice(method.as_bytes());
    req.push(b' ');
    req.extend_from_slice(path.as_bytes());
    req.extend_from_slice(b" HTTP/1.1\r\n");
    req.extend_from_slice(b"host: ");
    req.extend_from_slice(host.as_bytes());
    req.extend_from_slice(b"\r\n");

    for (name, value) in headers {
        req.extend_from_slice(name.as_bytes());
        req.extend_from_slice(b": ");
        req.extend_from_slice(value.as_bytes());
        req.extend_from_slice(b"\r\n");
    }

    req.extend_from_slice(b"content-length: ");
    req.extend_from_slice(body.len().to_string().as_bytes());
    req.extend_from_slice(b"\r\n\r\n");
    req.extend_from_slice(body);
    req
}
