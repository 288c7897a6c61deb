//! Token types for the definitions lexer
//!
//! Tokens represent the lexical elements of unit and scale declarations.

use std::fmt;

/// Token types for the definitions lexer
#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub enum TokenType {
    // Trivia
    Whitespace,
    Comment,

    // Literals
    NumberLiteral,
    StringLiteral,

    // Identifiers (keywords are recognized by the parser)
    Identifier,

    // Operators
    Minus,       // -
    Plus,        // +
    Multiply,    // *
    Divide,      // /
    Equal,       // =
    LessThan,    // <
    GreaterThan, // >
    Pipe,        // |
    Caret,       // ^
    Colon,       // :
    Semicolon,   // ;
    Dot,         // .

    // Delimiters
    OpenParen,  // (
    CloseParen, // )

    // End of input
    Eof,

    // Malformed input
    Error,
}

impl TokenType {
    pub fn is_trivia(&self) -> bool {
        matches!(self, TokenType::Whitespace | TokenType::Comment)
    }

    /// Human readable name used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenType::Whitespace => "whitespace",
            TokenType::Comment => "comment",
            TokenType::NumberLiteral => "number",
            TokenType::StringLiteral => "string literal",
            TokenType::Identifier => "identifier",
            TokenType::Minus => "'-'",
            TokenType::Plus => "'+'",
            TokenType::Multiply => "'*'",
            TokenType::Divide => "'/'",
            TokenType::Equal => "'='",
            TokenType::LessThan => "'<'",
            TokenType::GreaterThan => "'>'",
            TokenType::Pipe => "'|'",
            TokenType::Caret => "'^'",
            TokenType::Colon => "':'",
            TokenType::Semicolon => "';'",
            TokenType::Dot => "'.'",
            TokenType::OpenParen => "'('",
            TokenType::CloseParen => "')'",
            TokenType::Eof => "end of input",
            TokenType::Error => "invalid token",
        }
    }
}

/// Source extent of a token or syntax node.
///
/// `start`/`end` are byte offsets into the input (end exclusive). Lines and
/// columns are 1-based and point at the first and last character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Span {
    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        let (first, last) = if self.start <= other.start {
            (self, other)
        } else {
            (other, self)
        };
        Span {
            start: first.start,
            end: first.end.max(last.end),
            line: first.line,
            column: first.column,
            end_line: last.end_line,
            end_column: last.end_column,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A token in the definitions text
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    /// Token text. Identifiers carry their body without the override marker,
    /// string literals their unescaped contents, errors the offending text.
    pub value: String,
    pub span: Span,
    /// `true` for identifiers written with the `@` override marker.
    pub verbatim: bool,
    /// Set on `Error` tokens.
    pub message: Option<String>,
}

impl Token {
    pub fn new(token_type: TokenType, value: String, span: Span) -> Self {
        Self {
            token_type,
            value,
            span,
            verbatim: false,
            message: None,
        }
    }

    pub fn identifier(value: String, span: Span, verbatim: bool) -> Self {
        Self {
            token_type: TokenType::Identifier,
            value,
            span,
            verbatim,
            message: None,
        }
    }

    pub fn eof(span: Span) -> Self {
        Self::new(TokenType::Eof, String::new(), span)
    }

    pub fn error(message: String, text: String, span: Span) -> Self {
        Self {
            token_type: TokenType::Error,
            value: text,
            span,
            verbatim: false,
            message: Some(message),
        }
    }

    /// Case-insensitive keyword test. Identifiers written with the override
    /// marker never match.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.token_type == TokenType::Identifier
            && !self.verbatim
            && self.value.eq_ignore_ascii_case(keyword)
    }
}
