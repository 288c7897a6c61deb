//! Definitions lexer - tokenizes unit and scale declarations
//!
//! Converts definitions text into a stream of tokens with line/column spans.
//! Malformed input never aborts lexing: it is reported as an `Error` token and
//! scanning resumes right after the offending text.

use crate::token::{Span, Token, TokenType};

/// Position the lexer can return to when building a span.
#[derive(Debug, Clone, Copy)]
struct Mark {
    position: usize,
    offset: usize,
    line: usize,
    column: usize,
}

/// The definitions lexer
pub struct Lexer {
    chars: Vec<char>,
    /// Index into `chars`.
    position: usize,
    /// Byte offset of `current_char` in the input.
    offset: usize,
    line: usize,
    column: usize,
    /// Line and column of the most recently consumed character.
    last_line: usize,
    last_column: usize,
    current_char: Option<char>,
}

impl Lexer {
    /// Create a new lexer for the given input
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            chars,
            position: 0,
            offset: 0,
            line: 1,
            column: 1,
            last_line: 1,
            last_column: 1,
            current_char,
        }
    }

    /// Advance to the next character
    fn advance(&mut self) {
        if let Some(c) = self.current_char {
            self.last_line = self.line;
            self.last_column = self.column;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.offset += c.len_utf8();
            self.position += 1;
        }
        self.current_char = self.chars.get(self.position).copied();
    }

    /// Peek at the next character without advancing
    fn peek(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn mark(&self) -> Mark {
        Mark {
            position: self.position,
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    fn span_from(&self, mark: Mark) -> Span {
        let (end_line, end_column) = if self.position > mark.position {
            (self.last_line, self.last_column)
        } else {
            (mark.line, mark.column)
        };
        Span {
            start: mark.offset,
            end: self.offset,
            line: mark.line,
            column: mark.column,
            end_line,
            end_column,
        }
    }

    fn text_from(&self, mark: Mark) -> String {
        self.chars[mark.position..self.position].iter().collect()
    }

    fn single(&mut self, token_type: TokenType) -> Token {
        let mark = self.mark();
        self.advance();
        Token::new(token_type, self.text_from(mark), self.span_from(mark))
    }

    /// Read a run of whitespace characters
    fn read_whitespace(&mut self) -> Token {
        let mark = self.mark();
        while let Some(c) = self.current_char {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
        Token::new(TokenType::Whitespace, self.text_from(mark), self.span_from(mark))
    }

    /// Read a comment (both // and /* */)
    fn read_comment(&mut self) -> Token {
        let mark = self.mark();
        self.advance(); // Skip '/'

        if self.current_char == Some('/') {
            // Line comment runs up to (not including) the line feed
            while let Some(c) = self.current_char {
                if c == '\n' {
                    break;
                }
                self.advance();
            }
            return Token::new(TokenType::Comment, self.text_from(mark), self.span_from(mark));
        }

        self.advance(); // Skip '*'
        while let Some(c) = self.current_char {
            if c == '*' && self.peek() == Some('/') {
                self.advance(); // Skip '*'
                self.advance(); // Skip '/'
                return Token::new(TokenType::Comment, self.text_from(mark), self.span_from(mark));
            }
            self.advance();
        }

        Token::error(
            "Unterminated block comment".into(),
            self.text_from(mark),
            self.span_from(mark),
        )
    }

    fn is_identifier_start(c: char) -> bool {
        c.is_alphabetic() || c == '_'
    }

    fn is_identifier_body(c: char) -> bool {
        c.is_alphanumeric() || c == '_'
    }

    /// Read an identifier, optionally prefixed with the `@` override marker
    fn read_identifier(&mut self) -> Token {
        let mark = self.mark();
        let verbatim = self.current_char == Some('@');
        if verbatim {
            self.advance(); // Skip '@'
            if !self.current_char.is_some_and(Self::is_identifier_body) {
                return Token::error(
                    "Expected an identifier after '@'".into(),
                    self.text_from(mark),
                    self.span_from(mark),
                );
            }
        }

        let body_start = self.position;
        while let Some(c) = self.current_char {
            if Self::is_identifier_body(c) {
                self.advance();
            } else {
                break;
            }
        }

        let value: String = self.chars[body_start..self.position].iter().collect();
        Token::identifier(value, self.span_from(mark), verbatim)
    }

    /// Read a string literal: "string"
    fn read_string(&mut self) -> Token {
        let mark = self.mark();
        self.advance(); // Skip opening quote

        let mut value = String::new();
        while let Some(c) = self.current_char {
            match c {
                '"' => {
                    self.advance(); // Skip closing quote
                    return Token::new(TokenType::StringLiteral, value, self.span_from(mark));
                }
                '\n' => break,
                '\\' => {
                    self.advance(); // Skip backslash
                    match self.current_char {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('\n') | None => break,
                        Some(other) => value.push(other),
                    }
                    self.advance();
                }
                _ => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        Token::error(
            "Unterminated string literal".into(),
            self.text_from(mark),
            self.span_from(mark),
        )
    }

    fn read_digits(&mut self) -> usize {
        let mut count = 0;
        while let Some(c) = self.current_char {
            if c.is_ascii_digit() {
                self.advance();
                count += 1;
            } else {
                break;
            }
        }
        count
    }

    /// Read a numeral: digits [. digits] [(e|E) [+|-] digits]
    fn read_number(&mut self) -> Token {
        let mark = self.mark();
        self.read_digits();

        if self.current_char == Some('.') {
            self.advance(); // Skip '.'
            if self.read_digits() == 0 {
                return Token::error(
                    "Invalid numeral: expected digits after '.'".into(),
                    self.text_from(mark),
                    self.span_from(mark),
                );
            }
        }

        if matches!(self.current_char, Some('e') | Some('E')) {
            self.advance(); // Skip exponent marker
            if matches!(self.current_char, Some('+') | Some('-')) {
                self.advance();
            }
            if self.read_digits() == 0 {
                // Swallow the rest of the word so "2em" is a single error
                while self.current_char.is_some_and(Self::is_identifier_body) {
                    self.advance();
                }
                return Token::error(
                    "Invalid numeral: expected exponent digits".into(),
                    self.text_from(mark),
                    self.span_from(mark),
                );
            }
        }

        Token::new(TokenType::NumberLiteral, self.text_from(mark), self.span_from(mark))
    }

    /// Get the next token, including whitespace and comments.
    ///
    /// Returns `Eof` once the input is exhausted, and keeps returning it.
    pub fn next_token(&mut self) -> Token {
        let Some(c) = self.current_char else {
            let mark = self.mark();
            return Token::eof(self.span_from(mark));
        };

        match c {
            c if c.is_whitespace() => self.read_whitespace(),
            '/' if matches!(self.peek(), Some('/') | Some('*')) => self.read_comment(),
            '"' => self.read_string(),
            '@' => self.read_identifier(),
            c if Self::is_identifier_start(c) => self.read_identifier(),
            c if c.is_ascii_digit() => self.read_number(),
            '.' if self.peek().is_some_and(|n| n.is_ascii_digit()) => self.read_number(),
            '.' => self.single(TokenType::Dot),
            '-' => self.single(TokenType::Minus),
            '+' => self.single(TokenType::Plus),
            '*' => self.single(TokenType::Multiply),
            '/' => self.single(TokenType::Divide),
            '=' => self.single(TokenType::Equal),
            '<' => self.single(TokenType::LessThan),
            '>' => self.single(TokenType::GreaterThan),
            '|' => self.single(TokenType::Pipe),
            '^' => self.single(TokenType::Caret),
            ':' => self.single(TokenType::Colon),
            ';' => self.single(TokenType::Semicolon),
            '(' => self.single(TokenType::OpenParen),
            ')' => self.single(TokenType::CloseParen),
            other => {
                let mark = self.mark();
                self.advance();
                Token::error(
                    format!("Unexpected character '{}'", other.escape_default()),
                    self.text_from(mark),
                    self.span_from(mark),
                )
            }
        }
    }

    /// Next token that is not whitespace or a comment
    pub fn next_significant_token(&mut self) -> Token {
        loop {
            let token = self.next_token();
            if !token.token_type.is_trivia() {
                return token;
            }
        }
    }
}
