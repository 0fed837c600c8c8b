//! Structured configuration diagnostics with caret-underline rendering.

use std::fmt;

use super::token::Token;

/// The taxonomy of configuration errors, matching `spec.md` §7 one-for-one.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read file `{path}`")]
    FileNotFound { path: String },

    #[error("expected `{expected}` but {found} was found")]
    UnexpectedToken {
        token: Token,
        expected: String,
        found: String,
    },

    #[error("expected inline declaration for `{name}`")]
    NotInline { token: Token, name: String },

    #[error("mismatched curly brackets")]
    MismatchCurly { token: Token },

    #[error("invalid entry, expected usage is `{usage}`")]
    MismatchEntry { token: Token, usage: String },

    #[error("unknown entry `{name}`, expected one of {}", join_quoted(allowed))]
    UnknownEntry {
        token: Token,
        name: String,
        allowed: Vec<String>,
    },

    #[error("invalid method `{name}`, expected one of GET, POST, DELETE, HEAD")]
    InvalidMethod { token: Token, name: String },

    #[error("value {value} is not in range {min}..{max}")]
    NotInRange {
        token: Token,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("invalid address")]
    Addr { token: Token },
}

fn join_quoted(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("`{s}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ConfigError {
    /// The offending token, when this error is anchored to one (all
    /// variants but [`ConfigError::FileNotFound`]).
    pub fn token(&self) -> Option<&Token> {
        match self {
            ConfigError::FileNotFound { .. } => None,
            ConfigError::UnexpectedToken { token, .. }
            | ConfigError::NotInline { token, .. }
            | ConfigError::MismatchCurly { token }
            | ConfigError::MismatchEntry { token, .. }
            | ConfigError::UnknownEntry { token, .. }
            | ConfigError::InvalidMethod { token, .. }
            | ConfigError::NotInRange { token, .. }
            | ConfigError::Addr { token } => Some(token),
        }
    }

    /// Renders this error as a caret-underline diagnostic against `source`.
    ///
    /// ```text
    /// error: invalid entry, expected usage is `listen <addr>`
    ///   --> line 2, column 5
    ///     |
    ///   2 |     listen
    ///     |     ^~~~~~
    /// ```
    pub fn render(&self, source: &str) -> String {
        let mut out = String::new();
        use fmt::Write;

        let Some(token) = self.token() else {
            let _ = writeln!(out, "error: {self}");
            return out;
        };

        let line_text = source.lines().nth(token.line.saturating_sub(1)).unwrap_or("");
        let width = token.width().max(1);
        let underline: String = std::iter::once('^')
            .chain(std::iter::repeat('~').take(width.saturating_sub(1)))
            .collect();
        let gutter = format!("{}", token.line);
        let pad = " ".repeat(gutter.len());

        let _ = writeln!(out, "error: {self}");
        let _ = writeln!(out, "{pad} --> line {}, column {}", token.line, token.column);
        let _ = writeln!(out, "{pad} |");
        let _ = writeln!(out, "{gutter} | {line_text}");
        let _ = writeln!(
            out,
            "{pad} | {}{}",
            " ".repeat(token.column.saturating_sub(1)),
            underline
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::token::TokenKind;

    fn tok(line: usize, column: usize, text: &str) -> Token {
        Token {
            kind: TokenKind::Identifier,
            text: text.to_string(),
            line,
            column,
        }
    }

    #[test]
    fn render_points_at_the_offending_column() {
        let source = "server {\n    listen\n}";
        let err = ConfigError::MismatchEntry {
            token: tok(2, 5, "listen"),
            usage: "listen <addr>".to_string(),
        };
        let rendered = err.render(source);
        assert!(rendered.contains("listen <addr>"));
        assert!(rendered.contains("    listen"));
        assert!(rendered.contains("^~~~~~"));
    }

    #[test]
    fn file_not_found_has_no_span() {
        let err = ConfigError::FileNotFound {
            path: "missing.conf".to_string(),
        };
        assert_eq!(err.render(""), "error: cannot read file `missing.conf`\n");
    }
}
