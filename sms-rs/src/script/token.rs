//! Token types produced by the lexer.

use std::fmt;

use super::position::Position;

/// One piece of an interpolated string literal.
#[derive(Debug, Clone, PartialEq)]
pub enum StringSegment {
    /// Literal text with escapes already resolved.
    Text(String),
    /// Raw expression source from `${...}` or `$ident`, re-lexed by the parser.
    /// `pos` is where the expression text starts in the enclosing source.
    Expr { source: String, pos: Position },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number,
    Str,
    InterpolatedStr(Vec<StringSegment>),
    Boolean,
    Null,
    Identifier,

    // Keywords
    Var,
    Fun,
    Get,
    Set,
    When,
    If,
    Else,
    While,
    For,
    In,
    Break,
    Continue,
    Return,
    Data,
    Class,
    On,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Bang,
    And,
    Or,
    Increment,
    Decrement,
    Arrow,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Semicolon,
    Newline,
    Eof,
}

impl TokenKind {
    /// Map an identifier's text to its keyword kind, if it is one.
    pub fn keyword(text: &str) -> Option<TokenKind> {
        Some(match text {
            "fun" => TokenKind::Fun,
            "var" => TokenKind::Var,
            "get" => TokenKind::Get,
            "set" => TokenKind::Set,
            "when" => TokenKind::When,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "true" | "false" => TokenKind::Boolean,
            "null" => TokenKind::Null,
            "data" => TokenKind::Data,
            "class" => TokenKind::Class,
            "on" => TokenKind::On,
            _ => return None,
        })
    }

    /// Short name used in diagnostics ("Expected expression, found RBrace").
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Number => "Number",
            TokenKind::Str => "String",
            TokenKind::InterpolatedStr(_) => "InterpolatedString",
            TokenKind::Boolean => "Boolean",
            TokenKind::Null => "Null",
            TokenKind::Identifier => "Identifier",
            TokenKind::Var => "Var",
            TokenKind::Fun => "Fun",
            TokenKind::Get => "Get",
            TokenKind::Set => "Set",
            TokenKind::When => "When",
            TokenKind::If => "If",
            TokenKind::Else => "Else",
            TokenKind::While => "While",
            TokenKind::For => "For",
            TokenKind::In => "In",
            TokenKind::Break => "Break",
            TokenKind::Continue => "Continue",
            TokenKind::Return => "Return",
            TokenKind::Data => "Data",
            TokenKind::Class => "Class",
            TokenKind::On => "On",
            TokenKind::Plus => "Plus",
            TokenKind::Minus => "Minus",
            TokenKind::Star => "Multiply",
            TokenKind::Slash => "Divide",
            TokenKind::Assign => "Assign",
            TokenKind::Eq => "Equals",
            TokenKind::Ne => "NotEquals",
            TokenKind::Lt => "Less",
            TokenKind::Le => "LessEqual",
            TokenKind::Gt => "Greater",
            TokenKind::Ge => "GreaterEqual",
            TokenKind::Bang => "Not",
            TokenKind::And => "And",
            TokenKind::Or => "Or",
            TokenKind::Increment => "Increment",
            TokenKind::Decrement => "Decrement",
            TokenKind::Arrow => "Arrow",
            TokenKind::LParen => "LeftParen",
            TokenKind::RParen => "RightParen",
            TokenKind::LBrace => "LeftBrace",
            TokenKind::RBrace => "RightBrace",
            TokenKind::LBracket => "LeftBracket",
            TokenKind::RBracket => "RightBracket",
            TokenKind::Comma => "Comma",
            TokenKind::Dot => "Dot",
            TokenKind::Semicolon => "Semicolon",
            TokenKind::Newline => "Newline",
            TokenKind::Eof => "Eof",
        }
    }
}

/// A lexed token: kind, literal source text, and where it started.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: Position,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, pos: Position) -> Self {
        Token {
            kind,
            text: text.into(),
            pos,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}('{}') at {}", self.kind.name(), self.text, self.pos)
    }
}
