//! A short extension → MIME-type table covering the handful of static
//! file types this engine's tests and example configuration serve.
//! `spec.md` §1 scopes the full MIME-type registry out of the CORE; this
//! is not a reimplementation of it, just enough to set `Content-Type`.

pub fn guess(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_map_correctly() {
        assert_eq!(guess("index.html"), "text/html");
        assert_eq!(guess("style.css"), "text/css");
    }

    #[test]
    fn unknown_extension_is_octet_stream() {
        assert_eq!(guess("data.bin"), "application/octet-stream");
        assert_eq!(guess("noext"), "application/octet-stream");
    }
}
