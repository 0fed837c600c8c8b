//! Resolves a request to a virtual host, then to a location, by the rules
//! in `spec.md` §4.5.

use crate::config::{LocationConfig, ServerConfig};
use crate::http::Request;

/// The outcome of routing a request, before a handler has produced a body.
pub enum RouteOutcome<'a> {
    /// A location matched; method and body-size checks passed.
    Matched {
        server: &'a ServerConfig,
        location: &'a LocationConfig,
    },
    /// No location's prefix matched the request path.
    NotFound,
    /// A location matched but not for this method.
    MethodNotAllowed,
    /// The declared `Content-Length` exceeds the applicable body-size limit.
    PayloadTooLarge,
}

/// Picks the virtual host for `host` among `servers`, which must all share
/// the same listen address. Falls back to the first-declared host
/// (`spec.md`'s "default host") when `host` is absent or unmatched.
pub fn select_server<'a>(servers: &'a [&'a ServerConfig], host: Option<&str>) -> &'a ServerConfig {
    if let Some(host) = host {
        if let Some(found) = servers.iter().find(|s| s.server_name == host) {
            return found;
        }
    }
    servers[0]
}

/// Picks the longest-prefix-matching location within `server`, ties broken
/// by declaration order.
pub fn select_location<'a>(server: &'a ServerConfig, path: &str) -> Option<&'a LocationConfig> {
    server
        .locations_by_specificity()
        .into_iter()
        .find(|loc| path.starts_with(loc.prefix.as_str()))
}

/// Routes `request` against `servers` (all servers sharing the listen
/// socket that received it), applying virtual-host selection, longest-prefix
/// location matching, the method check, and the body-size check, in that
/// order (`spec.md` §4.5 steps 1–4).
pub fn route<'a>(servers: &'a [&'a ServerConfig], request: &Request) -> RouteOutcome<'a> {
    let server = select_server(servers, request.host());

    let Some(location) = select_location(server, &request.path) else {
        return RouteOutcome::NotFound;
    };

    if !location.methods.contains(&request.method) {
        return RouteOutcome::MethodNotAllowed;
    }

    let limit = location.max_body_size.unwrap_or(server.client_max_body_size);
    if let Some(len) = request.content_length() {
        if len as u64 > limit {
            return RouteOutcome::PayloadTooLarge;
        }
    }

    RouteOutcome::Matched { server, location }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_str;
    use crate::http::Method;

    fn two_vhosts() -> Vec<ServerConfig> {
        let src = "\
server {
    listen 127.0.0.1:18080
    server_name a.test
    location / {
        methods GET
        root ./www
    }
}
server {
    listen 127.0.0.1:18080
    server_name b.test
    location / {
        methods GET
        root ./www
    }
}
";
        load_str(src).unwrap()
    }

    fn req_with_host(host: Option<&str>, path: &str, method: Method) -> Request {
        let host_line = host.map(|h| format!("Host: {h}\r\n")).unwrap_or_default();
        let raw = format!("{method} {path} HTTP/1.1\r\n{host_line}\r\n");
        crate::http::request::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn unmatched_host_falls_back_to_default() {
        let servers = two_vhosts();
        let refs: Vec<&ServerConfig> = servers.iter().collect();
        let req = req_with_host(Some("c.test"), "/", Method::Get);
        let chosen = select_server(&refs, req.host());
        assert_eq!(chosen.server_name, "a.test");
    }

    #[test]
    fn missing_host_falls_back_to_default() {
        let servers = two_vhosts();
        let refs: Vec<&ServerConfig> = servers.iter().collect();
        let req = req_with_host(None, "/", Method::Get);
        let chosen = select_server(&refs, req.host());
        assert_eq!(chosen.server_name, "a.test");
    }

    #[test]
    fn matching_host_is_selected() {
        let servers = two_vhosts();
        let refs: Vec<&ServerConfig> = servers.iter().collect();
        let req = req_with_host(Some("b.test"), "/", Method::Get);
        let chosen = select_server(&refs, req.host());
        assert_eq!(chosen.server_name, "b.test");
    }

    #[test]
    fn longest_prefix_wins_deterministically() {
        let src = "\
server {
    listen 127.0.0.1:18080
    location / {
        methods GET
    }
    location /api {
        methods GET
    }
    location /api/v2 {
        methods GET
    }
}
";
        let servers = load_str(src).unwrap();
        let loc = select_location(&servers[0], "/api/v2/users").unwrap();
        assert_eq!(loc.prefix, "/api/v2");

        // Determinism: repeated calls return the same location.
        let loc2 = select_location(&servers[0], "/api/v2/users").unwrap();
        assert_eq!(loc.prefix, loc2.prefix);
    }

    #[test]
    fn method_not_allowed_short_circuits_before_body_check() {
        let src = "\
server {
    listen 127.0.0.1:18080
    client_max_body_size 10
    location / {
        methods GET
    }
}
";
        let servers = load_str(src).unwrap();
        let refs: Vec<&ServerConfig> = servers.iter().collect();
        let raw = b"DELETE / HTTP/1.1\r\nContent-Length: 100\r\n\r\n";
        let req = crate::http::request::parse(raw).unwrap();
        assert!(matches!(route(&refs, &req), RouteOutcome::MethodNotAllowed));
    }

    #[test]
    fn body_too_large_is_rejected() {
        let src = "\
server {
    listen 127.0.0.1:18080
    client_max_body_size 10
    location / {
        methods POST
    }
}
";
        let servers = load_str(src).unwrap();
        let refs: Vec<&ServerConfig> = servers.iter().collect();
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 100\r\n\r\n";
        let req = crate::http::request::parse(raw).unwrap();
        assert!(matches!(route(&refs, &req), RouteOutcome::PayloadTooLarge));
    }

    #[test]
    fn no_matching_prefix_is_not_found() {
        let src = "\
server {
    listen 127.0.0.1:18080
    location /only {
        methods GET
    }
}
";
        let servers = load_str(src).unwrap();
        let refs: Vec<&ServerConfig> = servers.iter().collect();
        let raw = b"GET /elsewhere HTTP/1.1\r\n\r\n";
        let req = crate::http::request::parse(raw).unwrap();
        assert!(matches!(route(&refs, &req), RouteOutcome::NotFound));
    }
}
