//! Tokenizer for the server configuration grammar.
//!
//! Turns a source string into a stream of [`Token`]s. Whitespace separates
//! tokens but is never itself a token; a run of `\r`/`\n` produces one
//! [`TokenKind::LineBreak`] per terminator encountered, matching the
//! original implementation's tolerance for blank lines between directives.

/// The kind of a lexical token in the configuration grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// A run of non-whitespace characters that is not a [`TokenKind::Number`].
    Identifier,
    /// A run of non-whitespace characters that parses wholly as a
    /// non-negative decimal integer.
    Number(i64),
    /// A single- or double-quoted span; the quotes are stripped and no
    /// escape processing is performed.
    String,
    LeftCurly,
    RightCurly,
    LineBreak,
    Eof,
}

/// A single lexical token, carrying enough position information to render
/// a caret-underline diagnostic (see [`crate::config::diagnostic`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// The literal text of the token (empty for braces/line breaks/EOF).
    pub text: String,
    /// 1-origin line number.
    pub line: usize,
    /// 1-origin column number.
    pub column: usize,
}

impl Token {
    fn new(kind: TokenKind, text: String, line: usize, column: usize) -> Token {
        Token { kind, text, line, column }
    }

    /// The display width of this token, for underlining it in a diagnostic.
    pub fn width(&self) -> usize {
        match &self.kind {
            TokenKind::Identifier | TokenKind::String => self.text.chars().count().max(1),
            TokenKind::Number(n) => n.to_string().len(),
            TokenKind::LeftCurly | TokenKind::RightCurly | TokenKind::LineBreak => 1,
            TokenKind::Eof => 0,
        }
    }

    /// A human name for this token's kind, for "expected X but found Y"
    /// diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            TokenKind::Identifier => "Identifier",
            TokenKind::Number(_) => "Number",
            TokenKind::String => "String",
            TokenKind::LeftCurly => "`{`",
            TokenKind::RightCurly => "`}`",
            TokenKind::LineBreak => "line break",
            TokenKind::Eof => "end of file",
        }
    }
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{0B}' | '\u{0C}')
}

/// Lazily yields [`Token`]s from a source string, one at a time, until
/// [`TokenKind::Eof`] is reached (after which it yields `None`).
///
/// Modeled as an iterator per the design note in `spec.md` §9 rather than
/// the original implementation's explicit `(index, line, column)` cursor
/// triple threaded through a free function.
pub struct Tokenizer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
    done: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Tokenizer<'a> {
        Tokenizer {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            done: false,
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn next_token(&mut self) -> Token {
        while let Some(c) = self.peek_char() {
            if is_space(c) {
                self.bump();
            } else {
                break;
            }
        }

        let line = self.line;
        let column = self.column;

        let Some(c) = self.peek_char() else {
            return Token::new(TokenKind::Eof, String::new(), line, column);
        };

        if c == '\r' || c == '\n' {
            self.bump();
            // A lone `\r` not followed by `\n` still counts as one line break.
            if c == '\r' && self.peek_char() == Some('\n') {
                self.bump();
            }
            return Token::new(TokenKind::LineBreak, String::new(), line, column);
        }

        if c == '{' {
            self.bump();
            return Token::new(TokenKind::LeftCurly, String::new(), line, column);
        }

        if c == '}' {
            self.bump();
            return Token::new(TokenKind::RightCurly, String::new(), line, column);
        }

        if c == '"' || c == '\'' {
            let quote = c;
            self.bump();
            let mut buf = String::new();
            while let Some(c) = self.peek_char() {
                if c == quote {
                    self.bump();
                    break;
                }
                buf.push(c);
                self.bump();
            }
            return Token::new(TokenKind::String, buf, line, column);
        }

        let mut buf = String::new();
        while let Some(c) = self.peek_char() {
            if is_space(c) || c == '\r' || c == '\n' || c == '{' || c == '}' {
                break;
            }
            buf.push(c);
            self.bump();
        }

        if !buf.is_empty() && buf.bytes().all(|b| b.is_ascii_digit()) {
            // Safe: an all-digit ASCII run this short never overflows i64 in
            // any configuration we accept; directive values are small.
            if let Ok(n) = buf.parse::<i64>() {
                return Token::new(TokenKind::Number(n), buf, line, column);
            }
        }

        Token::new(TokenKind::Identifier, buf, line, column)
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }
        let tok = self.next_token();
        if tok.kind == TokenKind::Eof {
            self.done = true;
        }
        Some(tok)
    }
}

/// Tokenizes the full source, including the trailing EOF token.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut out: Vec<Token> = Tokenizer::new(source).collect();
    match out.last() {
        Some(t) if t.kind == TokenKind::Eof => {}
        _ => out.push(Token::new(TokenKind::Eof, String::new(), 1, 1)),
    }
    out
}
