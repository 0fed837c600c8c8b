//! The configuration subsystem: tokenizer, recursive-descent parser, and
//! semantic validator for the nginx-style server configuration grammar
//! described in `spec.md` §4.1–§4.3.

pub mod diagnostic;
pub mod entry;
pub mod token;
pub mod validate;

pub use diagnostic::ConfigError;
pub use validate::{LocationConfig, ServerConfig};

use std::fs;
use std::path::Path;

/// Loads and validates a configuration file, returning every `ServerConfig`
/// declared in it or the full list of errors encountered. Configuration
/// errors abort startup (`spec.md` §7); this function never partially
/// succeeds.
pub fn load_file(path: &Path) -> Result<Vec<ServerConfig>, Vec<ConfigError>> {
    let source = fs::read_to_string(path).map_err(|_| {
        vec![ConfigError::FileNotFound {
            path: path.display().to_string(),
        }]
    })?;

    load_str(&source)
}

/// Loads and validates configuration from an in-memory source string.
pub fn load_str(source: &str) -> Result<Vec<ServerConfig>, Vec<ConfigError>> {
    let tokens = token::tokenize(source);
    let root = entry::parse(&tokens)?;
    validate::validate(&root, source)
}

/// Renders a list of configuration errors as caret-underline diagnostics
/// against their source text, the way `spec.md` §4.9 describes.
pub fn render_errors(errors: &[ConfigError], source: &str) -> String {
    errors.iter().map(|e| e.render(source)).collect::<Vec<_>>().join("\n")
}
