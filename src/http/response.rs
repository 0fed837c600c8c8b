//! Serializes a [`Response`] to the bytes written to the wire
//! (`spec.md` §4.6).

use std::fs;
use std::io;
use std::path::PathBuf;

use super::header::HeaderMap;
use super::status::reason_phrase;

/// A response body: either bytes ready to send, or a path whose contents
/// the writer reads and serializes (the handler contract from `spec.md`
/// §6 — "a ready byte buffer ... or a path whose file contents the writer
/// will read and serialize").
#[derive(Debug, Clone)]
pub enum Body {
    Bytes(Vec<u8>),
    File(PathBuf),
    Empty,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Body,
}

impl Response {
    pub fn new(status: u16) -> Response {
        Response {
            status,
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Response {
        self.headers.set(name, value);
        self
    }

    pub fn with_bytes_body(mut self, bytes: Vec<u8>) -> Response {
        self.body = Body::Bytes(bytes);
        self
    }

    pub fn with_file_body(mut self, path: PathBuf) -> Response {
        self.body = Body::File(path);
        self
    }

    pub fn text(status: u16, text: impl Into<String>) -> Response {
        Response::new(status).with_header("Content-Type", "text/plain").with_bytes_body(text.into().into_bytes())
    }

    pub fn html(status: u16, html: impl Into<String>) -> Response {
        Response::new(status).with_header("Content-Type", "text/html").with_bytes_body(html.into().into_bytes())
    }

    pub fn redirect(status: u16, location: &str) -> Response {
        Response::new(status).with_header("Location", location)
    }

    /// Reads any file body into memory and serializes the full response
    /// (status line, headers, blank line, body) as bytes ready to `write`
    /// in one call. `Content-Length` is always set for a non-empty body.
    pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        let body_bytes = match self.body {
            Body::Bytes(b) => b,
            Body::File(path) => fs::read(path)?,
            Body::Empty => Vec::new(),
        };

        self.headers.set("Content-Length", body_bytes.len().to_string());

        let mut out = Vec::with_capacity(body_bytes.len() + 256);
        out.extend_from_slice(
            format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status)).as_bytes(),
        );
        for (name, value) in self.headers.iter() {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&body_bytes);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_status_line_headers_and_body() {
        let resp = Response::text(200, "hi");
        let bytes = resp.into_bytes().unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Length: 2\r\n"));
        assert!(s.ends_with("\r\n\r\nhi"));
    }

    #[test]
    fn empty_body_still_terminates_headers() {
        let resp = Response::new(204);
        let bytes = resp.into_bytes().unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert!(s.ends_with("\r\n\r\n"));
    }

    #[test]
    fn redirect_sets_location_header() {
        let resp = Response::redirect(301, "/new");
        assert_eq!(resp.headers.get("Location"), Some("/new"));
    }
}
