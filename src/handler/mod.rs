//! The handler boundary: static file serving, directory autoindex,
//! redirects, and CGI. `spec.md` §1 scopes these out of the CORE as
//! external collaborators behind the contract in §6; this module is the
//! minimal implementation of that contract needed to run the engine
//! end to end (`SPEC_FULL.md` §4.10).

mod cgi;
mod mime;
mod static_files;

use crate::config::{LocationConfig, ServerConfig};
use crate::http::{Request, Response};

/// Dispatches a routed request to the handler implied by its location,
/// per `spec.md` §4.5 step 5, then applies any `error_page` override from
/// the server's configuration.
pub fn dispatch(server: &ServerConfig, location: &LocationConfig, request: &Request) -> Response {
    let response = dispatch_inner(location, request);
    apply_error_page(server, response)
}

fn dispatch_inner(location: &LocationConfig, request: &Request) -> Response {
    if let Some((code, url)) = &location.redirect {
        return Response::redirect(*code, url);
    }

    if let Some(interpreter) = matching_cgi_interpreter(location, &request.path) {
        return cgi::invoke(interpreter, location, request);
    }

    static_files::serve(location, request)
}

fn matching_cgi_interpreter<'a>(location: &'a LocationConfig, path: &str) -> Option<&'a str> {
    location
        .cgi
        .iter()
        .find(|(ext, _)| path.ends_with(ext.as_str()))
        .map(|(_, interpreter)| interpreter.as_str())
}

fn apply_error_page(server: &ServerConfig, response: Response) -> Response {
    if response.status < 400 {
        return response;
    }
    match server.error_pages.get(&response.status) {
        Some(path) => Response::new(response.status).with_file_body(path.into()),
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_str;

    fn make_request(raw: &str) -> Request {
        crate::http::request::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn redirect_location_short_circuits_other_handlers() {
        let src = "\
server {
    listen 127.0.0.1:18080
    location / {
        methods GET
        return 301 /new
    }
}
";
        let servers = load_str(src).unwrap();
        let req = make_request("GET / HTTP/1.1\r\n\r\n");
        let resp = dispatch(&servers[0], &servers[0].locations[0], &req);
        assert_eq!(resp.status, 301);
        assert_eq!(resp.headers.get("Location"), Some("/new"));
    }

    #[test]
    fn error_page_override_replaces_body() {
        let src = "\
server {
    listen 127.0.0.1:18080
    error_page 404 /errors/404.html
    location / {
        methods GET
        root /does/not/exist
    }
}
";
        let servers = load_str(src).unwrap();
        let req = make_request("GET /missing HTTP/1.1\r\n\r\n");
        let resp = dispatch(&servers[0], &servers[0].locations[0], &req);
        assert_eq!(resp.status, 404);
        assert!(matches!(resp.body, crate::http::Body::File(_)));
    }
}
