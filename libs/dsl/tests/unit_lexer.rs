//! Unit tests for the definitions lexer

use metrum_dsl::lexer::Lexer;
use metrum_dsl::token::{Token, TokenType};

/// Helper to tokenize input, skipping whitespace and comments
fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_significant_token();
        let done = token.token_type == TokenType::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    tokens
}

fn types(input: &str) -> Vec<TokenType> {
    tokenize(input).into_iter().map(|t| t.token_type).collect()
}

#[test]
fn test_operators_and_punctuation() {
    assert_eq!(
        types("- + * / = < > | ^ : ; ( ) ."),
        vec![
            TokenType::Minus,
            TokenType::Plus,
            TokenType::Multiply,
            TokenType::Divide,
            TokenType::Equal,
            TokenType::LessThan,
            TokenType::GreaterThan,
            TokenType::Pipe,
            TokenType::Caret,
            TokenType::Colon,
            TokenType::Semicolon,
            TokenType::OpenParen,
            TokenType::CloseParen,
            TokenType::Dot,
            TokenType::Eof,
        ]
    );
}

#[test]
fn test_numerals() {
    for text in ["42", "2.54", ".5", "1e-3", "6.02E+23", "0.0"] {
        let tokens = tokenize(text);
        assert_eq!(tokens[0].token_type, TokenType::NumberLiteral, "{}", text);
        assert_eq!(tokens[0].value, text);
        assert_eq!(tokens[1].token_type, TokenType::Eof);
    }
}

#[test]
fn test_malformed_numerals() {
    let tokens = tokenize("1.;");
    assert_eq!(tokens[0].token_type, TokenType::Error);
    assert_eq!(tokens[0].value, "1.");
    assert_eq!(
        tokens[0].message.as_deref(),
        Some("Invalid numeral: expected digits after '.'")
    );
    // lexing resumes after the malformed text
    assert_eq!(tokens[1].token_type, TokenType::Semicolon);

    let tokens = tokenize("2em");
    assert_eq!(tokens[0].token_type, TokenType::Error);
    assert_eq!(tokens[0].value, "2em");
    assert_eq!(tokens[1].token_type, TokenType::Eof);
}

#[test]
fn test_unit_property_is_not_a_numeral() {
    assert_eq!(
        types("Meter.Factor"),
        vec![
            TokenType::Identifier,
            TokenType::Dot,
            TokenType::Identifier,
            TokenType::Eof
        ]
    );
}

#[test]
fn test_string_literals() {
    let tokens = tokenize(r#""m/s" "a\"b\\c" "tab\there""#);
    assert_eq!(tokens[0].value, "m/s");
    assert_eq!(tokens[1].value, "a\"b\\c");
    assert_eq!(tokens[2].value, "tab\there");
}

#[test]
fn test_unterminated_string() {
    let tokens = tokenize("\"abc\nunit");
    assert_eq!(tokens[0].token_type, TokenType::Error);
    assert_eq!(
        tokens[0].message.as_deref(),
        Some("Unterminated string literal")
    );
    assert_eq!(tokens[1].token_type, TokenType::Identifier);
    assert_eq!(tokens[1].value, "unit");

    let tokens = tokenize("\"abc");
    assert_eq!(tokens[0].token_type, TokenType::Error);
    assert_eq!(tokens[1].token_type, TokenType::Eof);
}

#[test]
fn test_override_marker() {
    let tokens = tokenize("@unit unit @pi");
    assert_eq!(tokens[0].value, "unit");
    assert!(tokens[0].verbatim);
    assert!(!tokens[0].is_keyword("unit"));
    assert!(tokens[1].is_keyword("unit"));
    assert!(tokens[1].is_keyword("UNIT"));
    assert_eq!(tokens[2].value, "pi");
    assert!(tokens[2].verbatim);

    let tokens = tokenize("@ x");
    assert_eq!(tokens[0].token_type, TokenType::Error);
}

#[test]
fn test_comments() {
    assert_eq!(
        types("unit // line comment\n /* block\n comment */ Meter"),
        vec![TokenType::Identifier, TokenType::Identifier, TokenType::Eof]
    );

    let mut lexer = Lexer::new("// note\nx");
    assert_eq!(lexer.next_token().token_type, TokenType::Comment);
    assert_eq!(lexer.next_token().token_type, TokenType::Whitespace);
    assert_eq!(lexer.next_token().token_type, TokenType::Identifier);

    let tokens = tokenize("/* never closed");
    assert_eq!(tokens[0].token_type, TokenType::Error);
    assert_eq!(
        tokens[0].message.as_deref(),
        Some("Unterminated block comment")
    );
}

#[test]
fn test_unexpected_character() {
    let tokens = tokenize("Meter # Second");
    assert_eq!(tokens[1].token_type, TokenType::Error);
    assert_eq!(tokens[1].value, "#");
    assert_eq!(tokens[2].value, "Second");
}

#[test]
fn test_spans() {
    let tokens = tokenize("unit π\n  Meter");
    assert_eq!((tokens[0].span.line, tokens[0].span.column), (1, 1));
    assert_eq!((tokens[0].span.end_line, tokens[0].span.end_column), (1, 4));

    // byte offsets count the two-byte 'π'
    assert_eq!((tokens[1].span.start, tokens[1].span.end), (5, 7));
    assert_eq!(tokens[1].span.column, 6);

    assert_eq!((tokens[2].span.line, tokens[2].span.column), (2, 3));
    assert_eq!(tokens[2].span.start, 10);
}
