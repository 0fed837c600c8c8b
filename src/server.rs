//! The single-threaded, non-blocking event loop (`spec.md` §5, §9): one
//! `mio::Poll` multiplexes every listening socket and every open
//! connection, matching the original implementation's one-`epoll_wait`
//! design but replacing raw epoll calls with `mio`'s portable readiness
//! API.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};

use crate::config::ServerConfig;
use crate::connection::{Action, Connection};
use crate::error::ServerError;
use crate::handler;
use crate::http::{Request, Response};
use crate::router::{self, RouteOutcome};

const READ_CHUNK: usize = 8192;
/// Reserve the low token range for listeners; connections start above it,
/// the way the original implementation keeps listening fds in a separate
/// map from connection fds.
const LISTENER_TOKENS: usize = 1024;

struct Listener {
    socket: TcpListener,
    servers: Vec<ServerConfig>,
}

pub struct Server {
    poll: Poll,
    listeners: HashMap<Token, Listener>,
    connections: HashMap<Token, (TcpStream, Connection)>,
    next_token: usize,
}

impl Server {
    /// Binds one listening socket per distinct `listen` address, grouping
    /// `ServerConfig`s that share an address as virtual hosts on it
    /// (`spec.md` §4.2).
    pub fn bind(configs: Vec<ServerConfig>) -> Result<Server, ServerError> {
        if configs.is_empty() {
            return Err(ServerError::NoListeners);
        }

        let mut by_addr: HashMap<SocketAddr, Vec<ServerConfig>> = HashMap::new();
        for config in configs {
            by_addr.entry(config.listen.into()).or_default().push(config);
        }

        let poll = Poll::new().map_err(ServerError::Poll)?;
        let mut listeners = HashMap::new();

        for (index, (addr, servers)) in by_addr.into_iter().enumerate() {
            let mut socket = TcpListener::bind(addr).map_err(|source| ServerError::Bind {
                addr: servers[0].listen,
                source,
            })?;
            let token = Token(index);
            poll.registry()
                .register(&mut socket, token, Interest::READABLE)
                .map_err(|source| ServerError::Register {
                    addr: servers[0].listen,
                    source,
                })?;
            log::info!("listening on {addr} ({} host(s))", servers.len());
            listeners.insert(token, Listener { socket, servers });
        }

        Ok(Server {
            poll,
            listeners,
            connections: HashMap::new(),
            next_token: LISTENER_TOKENS,
        })
    }

    /// The addresses actually bound, in listener-registration order. Useful
    /// for tests that configure port `0` and need the OS-assigned port.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        let mut addrs: Vec<(usize, SocketAddr)> = self
            .listeners
            .iter()
            .filter_map(|(token, listener)| listener.socket.local_addr().ok().map(|addr| (token.0, addr)))
            .collect();
        addrs.sort_by_key(|(token, _)| *token);
        addrs.into_iter().map(|(_, addr)| addr).collect()
    }

    /// Runs the event loop until `mio::Poll::poll` itself errors. Never
    /// returns on a clean path; the process is expected to be killed by a
    /// signal (`spec.md` §5 treats shutdown as out of scope for the CORE).
    pub fn run(&mut self) -> Result<(), ServerError> {
        let mut events = Events::with_capacity(256);
        loop {
            self.poll.poll(&mut events, None).map_err(ServerError::Poll)?;

            let tokens: Vec<(Token, bool, bool)> = events
                .iter()
                .map(|e| (e.token(), e.is_readable(), e.is_writable()))
                .collect();

            for (token, readable, writable) in tokens {
                if self.listeners.contains_key(&token) {
                    self.accept_all(token);
                    continue;
                }
                if readable {
                    self.handle_readable(token);
                }
                if writable {
                    self.handle_writable(token);
                }
            }
        }
    }

    fn accept_all(&mut self, listener_token: Token) {
        loop {
            let accepted = match self.listeners.get_mut(&listener_token) {
                Some(listener) => listener.socket.accept(),
                None => return,
            };
            let (mut stream, remote_addr) = match accepted {
                Ok(pair) => pair,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    log::warn!("accept() failed: {e}");
                    return;
                }
            };

            let token = Token(self.next_token);
            self.next_token += 1;

            if let Err(e) = self
                .poll
                .registry()
                .register(&mut stream, token, Interest::READABLE)
            {
                log::warn!("failed to register accepted connection: {e}");
                continue;
            }

            let conn = Connection::new(token, listener_token, remote_addr);
            self.connections.insert(token, (stream, conn));
        }
    }

    fn handle_readable(&mut self, token: Token) {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let read = match self.connections.get_mut(&token) {
                Some((stream, _)) => stream.read(&mut buf),
                None => return,
            };

            match read {
                Ok(0) => {
                    self.close_connection(token);
                    return;
                }
                Ok(n) => {
                    if let Some(outcome) = self.feed_connection(token, &buf[..n]) {
                        self.respond(token, outcome);
                    }
                    // A response may now be queued (including the 400 path
                    // inside `feed_connection`). Any further bytes on this
                    // fd belong to a request that hasn't been answered yet;
                    // leave them for the next readable event instead of
                    // feeding them into the state machine while it's
                    // waiting to write (`connection.rs`'s `Responding` arm
                    // of `feed` would otherwise have to swallow them).
                    let responding = matches!(self.connections.get(&token), Some((_, conn)) if conn.is_responding());
                    if responding {
                        return;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    log::warn!("recv() failed: {e}");
                    self.close_connection(token);
                    return;
                }
            }
        }
    }

    /// Feeds `chunk` into the connection's state machine, returning a
    /// completed request to route when one is ready.
    fn feed_connection(&mut self, token: Token, chunk: &[u8]) -> Option<(Request, bool)> {
        let (_, conn) = self.connections.get_mut(&token)?;
        match conn.feed(chunk) {
            Action::NeedMoreData => None,
            Action::Ready { request, forced_413 } => Some((request, forced_413)),
            Action::BadRequest => {
                self.respond_raw(token, Response::text(400, "Bad Request"), false);
                None
            }
        }
    }

    fn respond(&mut self, token: Token, (request, forced_413): (Request, bool)) {
        let listener_token = match self.connections.get(&token) {
            Some((_, conn)) => conn.listener_token,
            None => return,
        };
        let Some(listener) = self.listeners.get(&listener_token) else {
            return;
        };
        let servers: Vec<&ServerConfig> = listener.servers.iter().collect();

        let keep_alive = request.is_keep_alive() && !request.is_closed();

        let response = if forced_413 {
            Response::text(413, "Payload Too Large")
        } else {
            match router::route(&servers, &request) {
                RouteOutcome::Matched { server, location } => handler::dispatch(server, location, &request),
                RouteOutcome::NotFound => Response::text(404, "Not Found"),
                RouteOutcome::MethodNotAllowed => Response::text(405, "Method Not Allowed"),
                RouteOutcome::PayloadTooLarge => Response::text(413, "Payload Too Large"),
            }
        };

        log::info!("{} {} -> {}", request.method, request.path, response.status);
        self.respond_raw(token, response, keep_alive);
    }

    fn respond_raw(&mut self, token: Token, response: Response, keep_alive: bool) {
        let keep_alive = keep_alive && response.status < 500;
        let mut response = response;
        if keep_alive {
            response = response.with_header("Connection", "keep-alive");
        }

        let bytes = match response.into_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("failed to serialize response body: {e}");
                match Response::text(500, "Internal Server Error").into_bytes() {
                    Ok(bytes) => bytes,
                    Err(_) => return,
                }
            }
        };

        if let Some((stream, conn)) = self.connections.get_mut(&token) {
            conn.begin_responding(bytes, keep_alive);
            if self
                .poll
                .registry()
                .reregister(stream, token, Interest::WRITABLE)
                .is_err()
            {
                self.close_connection(token);
            }
        }
    }

    fn handle_writable(&mut self, token: Token) {
        loop {
            let to_write = match self.connections.get(&token) {
                Some((_, conn)) => conn.unwritten().to_vec(),
                None => return,
            };
            if to_write.is_empty() {
                break;
            }

            let written = match self.connections.get_mut(&token) {
                Some((stream, _)) => stream.write(&to_write),
                None => return,
            };

            match written {
                Ok(0) => {
                    self.close_connection(token);
                    return;
                }
                Ok(n) => {
                    if let Some((_, conn)) = self.connections.get_mut(&token) {
                        conn.advance_written(n);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    log::warn!("send() failed: {e}");
                    self.close_connection(token);
                    return;
                }
            }
        }

        let Some((_, conn)) = self.connections.get(&token) else {
            return;
        };
        if !conn.fully_written() {
            return;
        }

        if conn.keep_alive() {
            self.reset_for_keep_alive(token);
        } else {
            self.close_connection(token);
        }
    }

    fn reset_for_keep_alive(&mut self, token: Token) {
        if let Some((stream, conn)) = self.connections.get_mut(&token) {
            conn.reset_for_next_request();
            if self
                .poll
                .registry()
                .reregister(stream, token, Interest::READABLE)
                .is_err()
            {
                self.close_connection(token);
            }
        }
    }

    fn close_connection(&mut self, token: Token) {
        if let Some((mut stream, _)) = self.connections.remove(&token) {
            let _ = self.poll.registry().deregister(&mut stream);
        }
    }
}
