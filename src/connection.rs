//! The per-connection read → parse → route → write → (close|keep-alive)
//! state machine (`spec.md` §4.7).
//!
//! Modeled as a tagged enum carrying only the data valid in that state
//! (the design note in `spec.md` §9), rather than a struct with an
//! `is_body` flag and nullable fields.

use std::net::SocketAddr;

use crate::http::request::{self, Request, RequestParseError};
use mio::Token;

/// What the event loop should do after feeding more bytes into a
/// connection.
pub enum Action {
    /// Not enough data yet; keep watching for readability.
    NeedMoreData,
    /// A full request has arrived and is ready to be routed. `forced_413`
    /// is set when the client sent more body bytes than it declared via
    /// `Content-Length` (the "hostile" case in `spec.md` §4.7) — the
    /// request should not be routed normally, just answered 413.
    Ready { request: Request, forced_413: bool },
    /// The header block itself was malformed; respond 400 and close.
    BadRequest,
}

enum ConnectionState {
    ReadingHeader { buf: Vec<u8> },
    ReadingBody {
        request: Request,
        body: Vec<u8>,
        needed: usize,
    },
    Responding {
        bytes: Vec<u8>,
        written: usize,
        keep_alive: bool,
    },
}

pub struct Connection {
    pub token: Token,
    pub listener_token: Token,
    pub remote_addr: SocketAddr,
    state: ConnectionState,
}

impl Connection {
    pub fn new(token: Token, listener_token: Token, remote_addr: SocketAddr) -> Connection {
        Connection {
            token,
            listener_token,
            remote_addr,
            state: ConnectionState::ReadingHeader { buf: Vec::new() },
        }
    }

    /// Feeds newly-received bytes into the state machine, advancing
    /// `ReadingHeader` → `ReadingBody` → ready-to-route as appropriate.
    ///
    /// Takes ownership of the current state up front (rather than matching
    /// on `&mut self.state`) so the branches below are free to move their
    /// fields into the next state without fighting the borrow checker.
    pub fn feed(&mut self, chunk: &[u8]) -> Action {
        let state = std::mem::replace(&mut self.state, ConnectionState::ReadingHeader { buf: Vec::new() });

        match state {
            ConnectionState::ReadingHeader { mut buf } => {
                buf.extend_from_slice(chunk);
                match request::parse(&buf) {
                    Ok(mut req) => {
                        let body_so_far = buf[req.header_len..].to_vec();
                        match req.content_length() {
                            None => Action::Ready { request: req, forced_413: false },
                            Some(needed) if body_so_far.len() >= needed => {
                                let overflow = body_so_far.len() > needed;
                                req.body = body_so_far[..needed.min(body_so_far.len())].to_vec();
                                Action::Ready { request: req, forced_413: overflow }
                            }
                            Some(needed) => {
                                self.state = ConnectionState::ReadingBody { request: req, body: body_so_far, needed };
                                Action::NeedMoreData
                            }
                        }
                    }
                    Err(RequestParseError::Incomplete) => {
                        self.state = ConnectionState::ReadingHeader { buf };
                        Action::NeedMoreData
                    }
                    Err(_) => Action::BadRequest,
                }
            }
            ConnectionState::ReadingBody { mut request, mut body, needed } => {
                body.extend_from_slice(chunk);
                if body.len() >= needed {
                    let overflow = body.len() > needed;
                    request.body = body[..needed.min(body.len())].to_vec();
                    Action::Ready { request, forced_413: overflow }
                } else {
                    self.state = ConnectionState::ReadingBody { request, body, needed };
                    Action::NeedMoreData
                }
            }
            // A response is already queued; bytes arriving now belong to the
            // client's *next* request (or are spurious). Restore the state
            // unchanged rather than discarding the queued response — the
            // caller is expected to stop reading once it sees `Responding`
            // (`Server::handle_readable` does), so this arm only guards
            // against a stray extra read slipping through.
            responding @ ConnectionState::Responding { .. } => {
                self.state = responding;
                Action::NeedMoreData
            }
        }
    }

    /// Arms this connection to send `bytes` on the next writable event.
    pub fn begin_responding(&mut self, bytes: Vec<u8>, keep_alive: bool) {
        self.state = ConnectionState::Responding { bytes, written: 0, keep_alive };
    }

    /// True while this connection has a response queued to write.
    pub fn is_responding(&self) -> bool {
        matches!(self.state, ConnectionState::Responding { .. })
    }

    pub fn pending_response(&self) -> Option<&[u8]> {
        match &self.state {
            ConnectionState::Responding { bytes, .. } => Some(bytes),
            _ => None,
        }
    }

    /// The slice of the queued response not yet written to the socket.
    pub fn unwritten(&self) -> &[u8] {
        match &self.state {
            ConnectionState::Responding { bytes, written, .. } => &bytes[*written..],
            _ => &[],
        }
    }

    /// Records that `n` more bytes of the queued response were written.
    pub fn advance_written(&mut self, n: usize) {
        if let ConnectionState::Responding { written, .. } = &mut self.state {
            *written += n;
        }
    }

    /// True once every byte of the queued response has been written.
    pub fn fully_written(&self) -> bool {
        matches!(&self.state, ConnectionState::Responding { bytes, written, .. } if written == &bytes.len())
    }

    /// Whether the connection should stay open for another request after
    /// the response currently queued is fully written.
    pub fn keep_alive(&self) -> bool {
        matches!(&self.state, ConnectionState::Responding { keep_alive, .. } if *keep_alive)
    }

    /// Resets to `ReadingHeader` with cleared buffers, per `spec.md` §4.7's
    /// `Responding` → `ReadingHeader` transition.
    pub fn reset_for_next_request(&mut self) {
        self.state = ConnectionState::ReadingHeader { buf: Vec::new() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn conn() -> Connection {
        Connection::new(
            Token(1),
            Token(0),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9999),
        )
    }

    #[test]
    fn bodiless_request_is_ready_after_headers() {
        let mut c = conn();
        let action = c.feed(b"GET / HTTP/1.1\r\n\r\n");
        assert!(matches!(action, Action::Ready { forced_413: false, .. }));
    }

    #[test]
    fn header_split_across_reads_waits() {
        let mut c = conn();
        assert!(matches!(c.feed(b"GET / HTTP/1.1\r\n"), Action::NeedMoreData));
        assert!(matches!(c.feed(b"\r\n"), Action::Ready { .. }));
    }

    #[test]
    fn body_split_across_reads_waits_then_completes() {
        let mut c = conn();
        assert!(matches!(
            c.feed(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nab"),
            Action::NeedMoreData
        ));
        let action = c.feed(b"cde");
        match action {
            Action::Ready { request, forced_413 } => {
                assert!(!forced_413);
                assert_eq!(request.body, b"abcde");
            }
            _ => panic!("expected Ready"),
        }
    }

    #[test]
    fn excess_body_bytes_force_413() {
        let mut c = conn();
        let action = c.feed(b"POST / HTTP/1.1\r\nContent-Length: 2\r\n\r\nabcdef");
        match action {
            Action::Ready { forced_413, .. } => assert!(forced_413),
            _ => panic!("expected Ready"),
        }
    }

    #[test]
    fn malformed_request_line_is_bad_request() {
        let mut c = conn();
        let action = c.feed(b"NOTHTTP\r\n\r\n");
        assert!(matches!(action, Action::BadRequest));
    }

    #[test]
    fn feed_while_responding_preserves_queued_response() {
        let mut c = conn();
        c.feed(b"GET / HTTP/1.1\r\n\r\n");
        c.begin_responding(b"HTTP/1.1 200 OK\r\n\r\nhi".to_vec(), true);
        assert!(matches!(c.feed(b"stray bytes"), Action::NeedMoreData));
        assert!(c.is_responding());
        assert_eq!(c.pending_response(), Some(&b"HTTP/1.1 200 OK\r\n\r\nhi"[..]));
    }

    #[test]
    fn write_progress_tracks_partial_writes() {
        let mut c = conn();
        c.begin_responding(b"0123456789".to_vec(), false);
        assert_eq!(c.unwritten(), b"0123456789");
        c.advance_written(4);
        assert_eq!(c.unwritten(), b"456789");
        assert!(!c.fully_written());
        c.advance_written(6);
        assert!(c.fully_written());
        assert_eq!(c.unwritten(), b"");
    }

    #[test]
    fn reset_clears_header_buffer_for_keep_alive() {
        let mut c = conn();
        c.feed(b"GET / HTTP/1.1\r\n\r\n");
        c.begin_responding(b"HTTP/1.1 200 OK\r\n\r\n".to_vec(), true);
        assert!(c.is_responding());
        assert!(c.keep_alive());
        c.reset_for_next_request();
        assert!(!c.is_responding());
        assert!(matches!(c.feed(b"GET / HTTP/1.1\r\n\r\n"), Action::Ready { .. }));
    }
}
