//! Serves static files from a location's `root`, with directory
//! `index`/`autoindex` handling, upload (`DELETE`/`POST`) support, and
//! path-traversal rejection (`SPEC_FULL.md` §4.10).

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::LocationConfig;
use crate::http::{Method, Request, Response};

use super::mime;

pub fn serve(location: &LocationConfig, request: &Request) -> Response {
    let Some(root) = &location.root else {
        return Response::text(404, "Not Found");
    };

    let Some(relative) = relative_path(location, &request.path) else {
        return Response::text(403, "Forbidden");
    };

    let resolved = Path::new(root).join(&relative);

    match request.method {
        Method::Get | Method::Head => serve_read(location, &resolved, &request.path),
        Method::Delete => serve_delete(&resolved),
        Method::Post => serve_upload(location, &resolved, &request.body),
    }
}

/// Strips `location.prefix` from `path` and rejects any `..` segment, so a
/// request cannot escape `root` (`spec.md` §4.5's "serve file from
/// `root/<path-relative-to-prefix>`").
pub(super) fn relative_path(location: &LocationConfig, path: &str) -> Option<PathBuf> {
    let rest = path.strip_prefix(location.prefix.as_str()).unwrap_or(path);
    let rest = rest.trim_start_matches('/');

    let mut out = PathBuf::new();
    for segment in rest.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return None;
        }
        out.push(segment);
    }
    Some(out)
}

fn serve_read(location: &LocationConfig, resolved: &Path, request_path: &str) -> Response {
    match fs::metadata(resolved) {
        Ok(meta) if meta.is_dir() => serve_directory(location, resolved, request_path),
        Ok(_) => Response::new(200)
            .with_header("Content-Type", mime::guess(&resolved.to_string_lossy()))
            .with_file_body(resolved.to_path_buf()),
        Err(_) => Response::text(404, "Not Found"),
    }
}

fn serve_directory(location: &LocationConfig, dir: &Path, request_path: &str) -> Response {
    for index_name in &location.index {
        let candidate = dir.join(index_name);
        if candidate.is_file() {
            return Response::new(200)
                .with_header("Content-Type", mime::guess(index_name))
                .with_file_body(candidate);
        }
    }

    if location.autoindex {
        return render_autoindex(dir, request_path);
    }

    Response::text(404, "Not Found")
}

fn render_autoindex(dir: &Path, request_path: &str) -> Response {
    let mut entries: Vec<String> = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => return Response::text(500, "Internal Server Error"),
    };
    entries.sort();

    let mut body = String::new();
    let _ = write!(body, "<html><head><title>Index of {request_path}</title></head><body>");
    let _ = write!(body, "<h1>Index of {request_path}</h1><ul>");
    let base = if request_path.ends_with('/') {
        request_path.to_string()
    } else {
        format!("{request_path}/")
    };
    for name in &entries {
        let _ = write!(body, "<li><a href=\"{base}{name}\">{name}</a></li>");
    }
    body.push_str("</ul></body></html>");

    Response::html(200, body)
}

fn serve_delete(resolved: &Path) -> Response {
    match fs::metadata(resolved) {
        Ok(meta) if meta.is_dir() => Response::text(403, "Forbidden"),
        Ok(_) => match fs::remove_file(resolved) {
            Ok(()) => Response::new(204),
            Err(_) => Response::text(500, "Internal Server Error"),
        },
        Err(_) => Response::text(404, "Not Found"),
    }
}

fn serve_upload(location: &LocationConfig, resolved: &Path, body: &[u8]) -> Response {
    if !location.allow_upload {
        return Response::text(403, "Forbidden");
    }
    if let Some(parent) = resolved.parent() {
        if fs::create_dir_all(parent).is_err() {
            return Response::text(500, "Internal Server Error");
        }
    }
    match fs::write(resolved, body) {
        Ok(()) => Response::new(201),
        Err(_) => Response::text(500, "Internal Server Error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn location_with_root(root: &str, index: &[&str], autoindex: bool) -> LocationConfig {
        LocationConfig {
            prefix: "/".to_string(),
            methods: vec![Method::Get, Method::Post, Method::Delete],
            root: Some(root.to_string()),
            index: index.iter().map(|s| s.to_string()).collect(),
            autoindex,
            allow_upload: true,
            ..Default::default()
        }
    }

    fn request(method_line: &str) -> Request {
        crate::http::request::parse(method_line.as_bytes()).unwrap()
    }

    #[test]
    fn serves_existing_file_with_content_length() {
        let dir = tempdir().unwrap();
        let mut f = fs::File::create(dir.path().join("index.html")).unwrap();
        f.write_all(b"hi").unwrap();

        let loc = location_with_root(dir.path().to_str().unwrap(), &["index.html"], false);
        let req = request("GET / HTTP/1.1\r\n\r\n");
        let resp = serve(&loc, &req);
        assert_eq!(resp.status, 200);
        let bytes = resp.into_bytes().unwrap();
        assert!(String::from_utf8(bytes).unwrap().ends_with("hi"));
    }

    #[test]
    fn missing_file_is_404() {
        let dir = tempdir().unwrap();
        let loc = location_with_root(dir.path().to_str().unwrap(), &["index.html"], false);
        let req = request("GET /missing.html HTTP/1.1\r\n\r\n");
        let resp = serve(&loc, &req);
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn directory_without_index_or_autoindex_is_404() {
        let dir = tempdir().unwrap();
        let loc = location_with_root(dir.path().to_str().unwrap(), &[], false);
        let req = request("GET / HTTP/1.1\r\n\r\n");
        let resp = serve(&loc, &req);
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn autoindex_lists_directory_entries() {
        let dir = tempdir().unwrap();
        fs::File::create(dir.path().join("a.txt")).unwrap();
        fs::File::create(dir.path().join("b.txt")).unwrap();
        let loc = location_with_root(dir.path().to_str().unwrap(), &[], true);
        let req = request("GET / HTTP/1.1\r\n\r\n");
        let resp = serve(&loc, &req);
        assert_eq!(resp.status, 200);
        let bytes = resp.into_bytes().unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert!(s.contains("a.txt"));
        assert!(s.contains("b.txt"));
    }

    #[test]
    fn path_traversal_is_rejected() {
        let dir = tempdir().unwrap();
        let loc = location_with_root(dir.path().to_str().unwrap(), &[], false);
        let req = request("GET /../../etc/passwd HTTP/1.1\r\n\r\n");
        let resp = serve(&loc, &req);
        assert_eq!(resp.status, 403);
    }

    #[test]
    fn delete_removes_existing_file() {
        let dir = tempdir().unwrap();
        fs::File::create(dir.path().join("doomed.txt")).unwrap();
        let loc = location_with_root(dir.path().to_str().unwrap(), &[], false);
        let req = request("DELETE /doomed.txt HTTP/1.1\r\n\r\n");
        let resp = serve(&loc, &req);
        assert_eq!(resp.status, 204);
        assert!(!dir.path().join("doomed.txt").exists());
    }

    #[test]
    fn post_upload_writes_body_when_allowed() {
        let dir = tempdir().unwrap();
        let loc = location_with_root(dir.path().to_str().unwrap(), &[], false);
        let req = request("POST /new.txt HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");
        let resp = serve(&loc, &req);
        assert_eq!(resp.status, 201);
        assert_eq!(fs::read(dir.path().join("new.txt")).unwrap(), b"hello");
    }
}
