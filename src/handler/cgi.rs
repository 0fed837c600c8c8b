//! Minimal CGI/1.1 invocation: spawns the configured interpreter against
//! the resolved script path, feeds the request body to its stdin, and
//! parses its stdout as a header block followed by a body
//! (`SPEC_FULL.md` §4.10).

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::config::LocationConfig;
use crate::http::{Request, Response};

use super::static_files;

pub fn invoke(interpreter: &str, location: &LocationConfig, request: &Request) -> Response {
    let Some(root) = &location.root else {
        return Response::text(500, "Internal Server Error");
    };
    let Some(relative) = static_files::relative_path(location, &request.path) else {
        return Response::text(403, "Forbidden");
    };
    let script_path = Path::new(root).join(&relative);

    let env = cgi_env(location, request, &script_path);

    let mut child = match Command::new(interpreter)
        .arg(&script_path)
        .envs(env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(_) => return Response::text(500, "Internal Server Error"),
    };

    if let Some(mut stdin) = child.stdin.take() {
        if stdin.write_all(&request.body).is_err() {
            return Response::text(500, "Internal Server Error");
        }
    }

    let output = match child.wait_with_output() {
        Ok(output) => output,
        Err(_) => return Response::text(500, "Internal Server Error"),
    };

    if !output.status.success() {
        return Response::text(502, "Bad Gateway");
    }

    parse_cgi_output(&output.stdout)
}

fn cgi_env(location: &LocationConfig, request: &Request, script_path: &Path) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert("GATEWAY_INTERFACE".to_string(), "CGI/1.1".to_string());
    env.insert("REQUEST_METHOD".to_string(), request.method.to_string());
    env.insert("SCRIPT_FILENAME".to_string(), script_path.to_string_lossy().into_owned());
    env.insert("PATH_INFO".to_string(), request.path.clone());
    env.insert("QUERY_STRING".to_string(), query_string(request));
    env.insert("CONTENT_LENGTH".to_string(), request.body.len().to_string());
    if let Some(content_type) = request.headers.get("Content-Type") {
        env.insert("CONTENT_TYPE".to_string(), content_type.to_string());
    }
    if let Some(host) = request.host() {
        env.insert("SERVER_NAME".to_string(), host.to_string());
    }
    let _ = location;
    env
}

fn query_string(request: &Request) -> String {
    request
        .raw_path
        .split_once('?')
        .map(|(_, q)| q.to_string())
        .unwrap_or_default()
}

/// A CGI script's stdout is a header block (`Name: value` lines, blank line
/// terminated) followed by the body — the same shape as the response the
/// engine itself writes, minus the status line.
fn parse_cgi_output(stdout: &[u8]) -> Response {
    let text_end = stdout
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| (pos, pos + 4))
        .or_else(|| {
            stdout
                .windows(2)
                .position(|w| w == b"\n\n")
                .map(|pos| (pos, pos + 2))
        });

    let Some((header_end, body_start)) = text_end else {
        return Response::new(200).with_header("Content-Type", "text/plain").with_bytes_body(stdout.to_vec());
    };

    let header_text = String::from_utf8_lossy(&stdout[..header_end]);
    let body = stdout[body_start..].to_vec();

    let mut status = 200u16;
    let mut response = Response::new(200);
    for line in header_text.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("Status") {
            if let Some(code) = value.split_whitespace().next().and_then(|s| s.parse::<u16>().ok()) {
                status = code;
            }
            continue;
        }
        response = response.with_header(name.trim(), value.to_string());
    }

    response.status = status;
    response.with_bytes_body(body)
}
