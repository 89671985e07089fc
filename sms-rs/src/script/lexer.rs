//! SMS lexer.
//!
//! Converts source text into a [`Token`] stream that always ends with
//! [`TokenKind::Eof`].  Newlines are significant (statement separators);
//! spaces, tabs and carriage returns are skipped.  String literals that
//! contain `${expr}` or `$ident` become [`TokenKind::InterpolatedStr`] whose
//! expression segments are re-lexed by the parser.

use super::error::{Result, ScriptError};
use super::position::Position;
use super::token::{StringSegment, Token, TokenKind};

/// Tokenize `src` from line 1, column 1.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    Lexer::new(src).tokenize()
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(src: &str) -> Self {
        Self::with_origin(src, Position::default())
    }

    /// Lex `src` as if it began at `origin` in some enclosing source, so that
    /// interpolated sub-expressions report positions in the outer text.
    pub fn with_origin(src: &str, origin: Position) -> Self {
        Lexer {
            chars: src.chars().collect(),
            pos: 0,
            line: origin.line,
            column: origin.column,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_ws();
            if self.at_end() {
                break;
            }
            if let Some(tok) = self.next_token()? {
                tokens.push(tok);
            }
        }
        tokens.push(Token::new(TokenKind::Eof, "", self.here()));
        Ok(tokens)
    }

    // ── Cursor ────────────────────────────────────────────────────────────────

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn here(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\r')) {
            self.advance();
        }
    }

    fn slice(&self, start: usize) -> String {
        self.chars[start..self.pos].iter().collect()
    }

    // ── Tokens ────────────────────────────────────────────────────────────────

    /// Lex one token.  Comments yield `Ok(None)`.
    fn next_token(&mut self) -> Result<Option<Token>> {
        let start = self.here();
        let Some(c) = self.advance() else {
            return Ok(None);
        };

        let simple = |kind: TokenKind, text: &str| -> Result<Option<Token>> {
            Ok(Some(Token::new(kind, text, start)))
        };

        match c {
            '(' => simple(TokenKind::LParen, "("),
            ')' => simple(TokenKind::RParen, ")"),
            '{' => simple(TokenKind::LBrace, "{"),
            '}' => simple(TokenKind::RBrace, "}"),
            '[' => simple(TokenKind::LBracket, "["),
            ']' => simple(TokenKind::RBracket, "]"),
            ',' => simple(TokenKind::Comma, ","),
            '.' => simple(TokenKind::Dot, "."),
            ';' => simple(TokenKind::Semicolon, ";"),
            '*' => simple(TokenKind::Star, "*"),
            '\n' => simple(TokenKind::Newline, "\n"),
            '+' if self.eat('+') => simple(TokenKind::Increment, "++"),
            '+' => simple(TokenKind::Plus, "+"),
            '-' if self.eat('>') => simple(TokenKind::Arrow, "->"),
            '-' if self.eat('-') => simple(TokenKind::Decrement, "--"),
            '-' => simple(TokenKind::Minus, "-"),
            '=' if self.eat('=') => simple(TokenKind::Eq, "=="),
            '=' => simple(TokenKind::Assign, "="),
            '!' if self.eat('=') => simple(TokenKind::Ne, "!="),
            '!' => simple(TokenKind::Bang, "!"),
            '<' if self.eat('=') => simple(TokenKind::Le, "<="),
            '<' => simple(TokenKind::Lt, "<"),
            '>' if self.eat('=') => simple(TokenKind::Ge, ">="),
            '>' => simple(TokenKind::Gt, ">"),
            '&' if self.eat('&') => simple(TokenKind::And, "&&"),
            '&' => Err(ScriptError::lex(
                "Unexpected character '&' - did you mean '&&'?",
                start,
            )),
            '|' if self.eat('|') => simple(TokenKind::Or, "||"),
            '|' => Err(ScriptError::lex(
                "Unexpected character '|' - did you mean '||'?",
                start,
            )),
            '/' => self.slash_or_comment(start),
            '"' => self.read_string(start).map(Some),
            c if c.is_ascii_digit() => Ok(Some(self.read_number(start))),
            c if c.is_alphabetic() || c == '_' => Ok(Some(self.read_ident(start))),
            c => Err(ScriptError::lex(format!("Unexpected character '{c}'"), start)),
        }
    }

    fn slash_or_comment(&mut self, start: Position) -> Result<Option<Token>> {
        if self.eat('/') {
            while !matches!(self.peek(), None | Some('\n')) {
                self.advance();
            }
            return Ok(None);
        }
        if self.eat('*') {
            while !self.at_end() {
                if self.peek() == Some('*') && self.peek2() == Some('/') {
                    self.advance();
                    self.advance();
                    return Ok(None);
                }
                self.advance();
            }
            return Err(ScriptError::lex(
                "Unterminated block comment - missing */",
                start,
            ));
        }
        Ok(Some(Token::new(TokenKind::Slash, "/", start)))
    }

    fn read_number(&mut self, start: Position) -> Token {
        let begin = self.pos - 1;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && matches!(self.peek2(), Some(c) if c.is_ascii_digit()) {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        Token::new(TokenKind::Number, self.slice(begin), start)
    }

    fn read_ident(&mut self, start: Position) -> Token {
        let begin = self.pos - 1;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let text = self.slice(begin);
        let kind = TokenKind::keyword(&text).unwrap_or(TokenKind::Identifier);
        Token::new(kind, text, start)
    }

    /// Read a double-quoted string; the opening quote is already consumed.
    fn read_string(&mut self, start: Position) -> Result<Token> {
        let begin = self.pos - 1;
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut interpolated = false;

        loop {
            let Some(c) = self.peek() else {
                return Err(ScriptError::lex(
                    "Unterminated string literal - missing closing quote",
                    self.here(),
                ));
            };
            match c {
                '"' => break,
                '\\' => {
                    self.advance();
                    let Some(esc) = self.advance() else {
                        return Err(ScriptError::lex(
                            "Unterminated string literal - missing closing quote",
                            self.here(),
                        ));
                    };
                    text.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                '$' if self.peek2() == Some('{') => {
                    interpolated = true;
                    flush(&mut text, &mut segments);
                    self.advance();
                    self.advance();
                    segments.push(self.read_braced_expr()?);
                }
                '$' if matches!(self.peek2(), Some(n) if n.is_alphabetic() || n == '_') => {
                    interpolated = true;
                    flush(&mut text, &mut segments);
                    self.advance();
                    let pos = self.here();
                    let ident_start = self.pos;
                    while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
                        self.advance();
                    }
                    segments.push(StringSegment::Expr {
                        source: self.slice(ident_start),
                        pos,
                    });
                }
                _ => {
                    text.push(c);
                    self.advance();
                }
            }
        }

        // closing quote
        self.advance();
        let raw = self.slice(begin);

        if interpolated {
            flush(&mut text, &mut segments);
            Ok(Token::new(TokenKind::InterpolatedStr(segments), raw, start))
        } else {
            Ok(Token {
                kind: TokenKind::Str,
                text,
                pos: start,
            })
        }
    }

    /// Scan the body of `${...}` with brace-depth tracking.  The `${` is
    /// already consumed; the closing `}` is consumed but not included.
    fn read_braced_expr(&mut self) -> Result<StringSegment> {
        let pos = self.here();
        let expr_start = self.pos;
        let mut depth = 1usize;
        while let Some(c) = self.peek() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            self.advance();
        }
        if depth > 0 {
            return Err(ScriptError::lex(
                "Unterminated string interpolation - missing }",
                self.here(),
            ));
        }
        let source = self.slice(expr_start);
        self.advance();
        Ok(StringSegment::Expr { source, pos })
    }
}

fn flush(text: &mut String, segments: &mut Vec<StringSegment>) {
    if !text.is_empty() {
        segments.push(StringSegment::Text(std::mem::take(text)));
    }
}
