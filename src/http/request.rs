//! Parses a byte buffer already known to contain the full header block
//! (`spec.md` §4.4) into a [`Request`].

use std::collections::HashMap;

use super::header::HeaderMap;
use super::method::Method;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// A parsed HTTP/1.1 request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// The request-target exactly as it appeared on the wire.
    pub raw_path: String,
    /// The path component, percent-decoded, without the query string.
    pub path: String,
    pub query: HashMap<String, String>,
    pub protocol: String,
    pub headers: HeaderMap,
    /// Byte length of the header block, including the terminating blank
    /// line — the offset at which the body begins in the original buffer.
    pub header_len: usize,
    /// Body bytes accumulated so far (filled incrementally by the
    /// connection state machine as more bytes arrive).
    pub body: Vec<u8>,
}

/// A malformed request line or header block; the caller responds 400 and
/// closes the connection (`spec.md` §7).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestParseError {
    #[error("missing header terminator")]
    Incomplete,
    #[error("malformed request line")]
    MalformedRequestLine,
    #[error("malformed header line: {0:?}")]
    MalformedHeaderLine(String),
}

/// Returns the index just past `\r\n\r\n` if `buf` contains the header
/// terminator, so the caller knows a full header block has arrived.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .map(|pos| pos + HEADER_TERMINATOR.len())
}

/// Parses the header block of `buf`. `buf` must contain at least one full
/// `\r\n\r\n`-terminated header block; bytes past [`Request::header_len`]
/// (if any) are the start of the body and are not touched here.
pub fn parse(buf: &[u8]) -> Result<Request, RequestParseError> {
    let header_len = find_header_end(buf).ok_or(RequestParseError::Incomplete)?;
    let head = &buf[..header_len];
    let text = String::from_utf8_lossy(head);

    let mut lines = text.split("\r\n");
    let request_line = lines.next().ok_or(RequestParseError::MalformedRequestLine)?;

    let mut parts = request_line.split(' ');
    let method_str = parts.next().ok_or(RequestParseError::MalformedRequestLine)?;
    let raw_path = parts.next().ok_or(RequestParseError::MalformedRequestLine)?;
    let protocol = parts.next().ok_or(RequestParseError::MalformedRequestLine)?;
    if parts.next().is_some() {
        return Err(RequestParseError::MalformedRequestLine);
    }

    let method = method_str
        .parse::<Method>()
        .map_err(|_| RequestParseError::MalformedRequestLine)?;

    let mut headers = HeaderMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| RequestParseError::MalformedHeaderLine(line.to_string()))?;
        headers.set(key.trim(), value.trim_end().trim_start());
    }

    let (path, query) = split_path_and_query(raw_path);

    Ok(Request {
        method,
        raw_path: raw_path.to_string(),
        path,
        query,
        protocol: protocol.to_string(),
        headers,
        header_len,
        body: Vec::new(),
    })
}

fn split_path_and_query(raw: &str) -> (String, HashMap<String, String>) {
    let (path, query_str) = match raw.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (raw, None),
    };

    let path = percent_decode(path);
    let mut query = HashMap::new();
    if let Some(q) = query_str {
        for pair in q.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            query.insert(percent_decode(k), percent_decode(v));
        }
    }
    (path, query)
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(bytes[i]);
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

impl Request {
    /// `Content-Length`, if present and parseable as a non-negative
    /// integer; otherwise the request has no body (`spec.md` §4.4).
    pub fn content_length(&self) -> Option<usize> {
        self.headers
            .get("Content-Length")
            .and_then(|v| v.trim().parse::<usize>().ok())
    }

    /// True iff `Connection: keep-alive` (case-sensitive value). HTTP/1.1's
    /// RFC default is persistent connections; this engine instead requires
    /// the explicit header, per `spec.md` §4.4 and §9's open question.
    pub fn is_keep_alive(&self) -> bool {
        self.headers.get("Connection") == Some("keep-alive")
    }

    /// True iff `Connection: close` or the nonstandard `Connection: closed`
    /// spelling preserved from the original implementation (`spec.md` §9).
    pub fn is_closed(&self) -> bool {
        matches!(self.headers.get("Connection"), Some("close") | Some("closed"))
    }

    pub fn host(&self) -> Option<&str> {
        self.headers.get("Host").map(|h| h.split(':').next().unwrap_or(h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_line_and_headers() {
        let raw = b"GET /index.html?x=1 HTTP/1.1\r\nHost: example.com\r\nConnection: keep-alive\r\n\r\n";
        let req = parse(raw).unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path, "/index.html");
        assert_eq!(req.query.get("x"), Some(&"1".to_string()));
        assert_eq!(req.host(), Some("example.com"));
        assert!(req.is_keep_alive());
    }

    #[test]
    fn duplicate_headers_last_write_wins() {
        let raw = b"GET / HTTP/1.1\r\nX-Custom: first\r\nX-Custom: second\r\n\r\n";
        let req = parse(raw).unwrap();
        assert_eq!(req.headers.get("X-Custom"), Some("second"));
    }

    #[test]
    fn header_len_points_at_body_start() {
        let raw = b"GET / HTTP/1.1\r\n\r\nBODY";
        let req = parse(raw).unwrap();
        assert_eq!(&raw[req.header_len..], b"BODY");
    }

    #[test]
    fn missing_terminator_is_incomplete() {
        let raw = b"GET / HTTP/1.1\r\nHost: x\r\n";
        assert_eq!(parse(raw).unwrap_err(), RequestParseError::Incomplete);
    }

    #[test]
    fn connection_closed_spelling_is_accepted() {
        let raw = b"GET / HTTP/1.1\r\nConnection: closed\r\n\r\n";
        let req = parse(raw).unwrap();
        assert!(req.is_closed());
    }

    #[test]
    fn content_length_absent_means_no_body() {
        let raw = b"GET / HTTP/1.1\r\n\r\n";
        let req = parse(raw).unwrap();
        assert_eq!(req.content_length(), None);
    }
}
