//! HTTP/1.1 wire-level types: methods, status phrases, headers, request
//! parsing, and response serialization (`spec.md` §4.4, §4.6, §6).

pub mod header;
pub mod method;
pub mod request;
pub mod response;
pub mod status;

pub use header::HeaderMap;
pub use method::Method;
pub use request::{Request, RequestParseError};
pub use response::{Body, Response};
