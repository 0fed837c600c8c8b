//! Recursive-descent parser over the token stream, producing a tree of
//! [`ConfigEntry`] nodes.

use super::diagnostic::ConfigError;
use super::token::{Token, TokenKind};

/// One node in the configuration tree: a directive head (`args`) followed
/// either by a line break (`inline`) or a brace-delimited list of children.
#[derive(Debug, Clone, Default)]
pub struct ConfigEntry {
    pub args: Vec<Token>,
    pub children: Vec<ConfigEntry>,
    pub inline: bool,
    /// The opening and closing brace tokens, for block entries.
    pub braces: Option<(Token, Token)>,
}

impl ConfigEntry {
    fn root() -> ConfigEntry {
        ConfigEntry {
            args: Vec::new(),
            children: Vec::new(),
            inline: false,
            braces: None,
        }
    }

    /// The first argument token's text, conventionally the directive name.
    pub fn name(&self) -> Option<&str> {
        self.args.first().map(|t| t.text.as_str())
    }

    /// Argument tokens after the directive name.
    pub fn rest(&self) -> &[Token] {
        if self.args.is_empty() {
            &[]
        } else {
            &self.args[1..]
        }
    }
}

/// Parses a full token stream (including the trailing EOF) into a synthetic
/// root [`ConfigEntry`] whose children are the top-level directives.
pub fn parse(tokens: &[Token]) -> Result<ConfigEntry, Vec<ConfigError>> {
    let mut root = ConfigEntry::root();
    let mut errors = Vec::new();
    let mut index = 0usize;

    while let Some(result) = parse_one(tokens, &mut index) {
        match result {
            Ok(entry) => root.children.push(entry),
            Err(err) => {
                errors.push(err);
                // Recover by skipping to the next line break so later
                // directives can still be checked, collecting every error
                // rather than stopping at the first (per spec.md §9).
                while !matches!(
                    tokens.get(index).map(|t| &t.kind),
                    Some(TokenKind::LineBreak) | Some(TokenKind::Eof) | None
                ) {
                    index += 1;
                }
                if matches!(tokens.get(index).map(|t| &t.kind), Some(TokenKind::LineBreak)) {
                    index += 1;
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(root)
    } else {
        Err(errors)
    }
}

/// Parses one entry starting at `tokens[*index]`, advancing `*index` past
/// it. Returns `None` once only EOF remains.
fn parse_one(tokens: &[Token], index: &mut usize) -> Option<Result<ConfigEntry, ConfigError>> {
    while matches!(tokens.get(*index).map(|t| &t.kind), Some(TokenKind::LineBreak)) {
        *index += 1;
    }

    if matches!(tokens.get(*index).map(|t| &t.kind), Some(TokenKind::Eof) | None) {
        return None;
    }

    let mut entry = ConfigEntry::root();

    while let Some(tok) = tokens.get(*index) {
        match tok.kind {
            TokenKind::LineBreak | TokenKind::LeftCurly | TokenKind::Eof => break,
            _ => {
                entry.args.push(tok.clone());
                *index += 1;
            }
        }
    }

    match tokens.get(*index) {
        None => {
            entry.inline = true;
            Some(Ok(entry))
        }
        Some(tok) if tok.kind == TokenKind::Eof || tok.kind == TokenKind::LineBreak => {
            *index += 1;
            entry.inline = true;
            Some(Ok(entry))
        }
        Some(tok) if tok.kind == TokenKind::LeftCurly && entry.args.is_empty() => Some(Err(
            ConfigError::UnexpectedToken {
                token: tok.clone(),
                expected: "Identifier".to_string(),
                found: tok.kind_name().to_string(),
            },
        )),
        Some(tok) if tok.kind == TokenKind::LeftCurly => {
            let left = tok.clone();
            *index += 1;

            let mut depth = 0i32;
            let body_start = *index;
            let mut body_end = None;
            let mut scan = *index;
            while let Some(t) = tokens.get(scan) {
                match t.kind {
                    TokenKind::RightCurly if depth == 0 => {
                        body_end = Some(scan);
                        break;
                    }
                    TokenKind::LeftCurly => depth += 1,
                    TokenKind::RightCurly => depth -= 1,
                    _ => {}
                }
                scan += 1;
            }

            let Some(body_end) = body_end else {
                return Some(Err(ConfigError::MismatchCurly { token: left }));
            };

            let right = tokens[body_end].clone();
            let body = &tokens[body_start..body_end];
            let mut child_index = 0usize;
            let mut children = Vec::new();
            while let Some(result) = parse_one(body, &mut child_index) {
                match result {
                    Ok(child) => children.push(child),
                    Err(err) => return Some(Err(err)),
                }
            }

            *index = body_end + 1;
            entry.inline = false;
            entry.children = children;
            entry.braces = Some((left, right));
            Some(Ok(entry))
        }
        Some(tok) => Some(Err(ConfigError::UnexpectedToken {
            token: tok.clone(),
            expected: "`{` or line break".to_string(),
            found: tok.kind_name().to_string(),
        })),
    }
}
