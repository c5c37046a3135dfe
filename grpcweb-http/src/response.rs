//! HTTP/1.1 response head parsing.

use crate::error::HttpError;

/// Parsed response status line and headers.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    status: u16,
    headers: Vec<(String, String)>,
    content_length: Option<usize>,
    chunked: bool,
}

impl ResponseHead {
    /// HTTP status code (e.g. 200, 404).
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response headers as (name, value) pairs, names lowercased.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header value matching `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Declared `content-length`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    /// Whether the body uses chunked transfer encoding.
    pub fn chunked(&self) -> bool {
        self.chunked
    }
}

/// Position of the `\r\n\r\n` head terminator, if present.
pub fn find_head_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse everything before the `\r\n\r\n` terminator.
pub fn parse_head(data: &[u8]) -> Result<ResponseHead, HttpError> {
    let text = std::str::from_utf8(data)
        .map_err(|_| HttpError::Parse("response head is not UTF-8".into()))?;
    let mut lines = text.split("\r\n");

    // Status line: HTTP/1.1 200 OK
    let status_line = lines
        .next()
        .ok_or_else(|| HttpError::Parse("empty response head".into()))?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts
        .next()
        .ok_or_else(|| HttpError::Parse("missing HTTP version".into()))?;
    if !version.starts_with("HTTP/1.") {
        return Err(HttpError::Parse(format!("unexpected version: {version}")));
    }
    let status: u16 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| HttpError::Parse(format!("malformed status line: {status_line:?}")))?;

    let mut headers = Vec::new();
    let mut content_length = None;
    let mut chunked = false;

    for line in lines {
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| HttpError::Parse(format!("malformed header line: {line:?}")))?;
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim().to_string();

        if name == "content-length" {
            content_length = Some(
                value
                    .parse()
                    .map_err(|_| HttpError::Parse(format!("bad content-length: {value:?}")))?,
            );
        }
        if name == "transfer-encoding" && value.eq_ignore_ascii_case("chunked") {
            chunked = true;
        }

        headers.push((name, value));
    }

    Ok(ResponseHead {
        status,
        headers,
        content_length,
        chunked,
    })
}
