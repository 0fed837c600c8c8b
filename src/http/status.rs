//! The slice of the HTTP status-code registry this engine actually emits
//! (`spec.md` §1 calls the full registry an out-of-scope external
//! collaborator; this is the minimal internal table, not a reimplementation
//! of it).

/// Returns the standard reason phrase for a status code this engine can
/// produce, or `"Unknown"` for anything else (handlers may still set
/// arbitrary codes; only the phrase lookup is limited).
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        411 => "Length Required",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Unknown",
    }
}
