//! Definitions parser - converts definitions text to declarations
//!
//! Recursive descent parser with one token of lookahead (two at the start of a
//! scale body). Syntax errors are recorded as diagnostics and the parser
//! resynchronizes at the next `;` or declaration keyword, so one malformed
//! declaration does not hide problems in the rest of the file.
//!
//! Precedence inside numeral expressions (lowest to highest):
//! 1. additive (+, -)
//! 2. multiplicative (*, /)
//! 3. polarity (+, -)
//! 4. factor (number, literal, `Unit.Factor`, parenthesized)
//!
//! Dimension expressions only have the multiplicative level.

use crate::ast::{AstNode, ScaleDecl, UnitDecl};
use crate::diagnostics::{Diagnostic, Diagnostics, Stage};
use crate::dimension::Magnitude;
use crate::lexer::Lexer;
use crate::numeral::{is_named_constant, NumericKind};
use crate::token::{Span, Token, TokenType};

const MAX_RECURSION_DEPTH: usize = 200;

/// Declarations and diagnostics produced by one parse
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub units: Vec<UnitDecl>,
    pub scales: Vec<ScaleDecl>,
    pub diagnostics: Diagnostics,
}

/// The current declaration was abandoned; its diagnostic is already recorded.
#[derive(Debug)]
struct Abandoned;

type Parse<T> = std::result::Result<T, Abandoned>;

/// Parser for definitions text
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    peeked: Option<Token>,
    previous_span: Span,
    recursion_depth: usize,
    diagnostics: Diagnostics,
}

impl Parser {
    /// Create a new parser for the given input string
    pub fn new(input: &str) -> Self {
        Self::with_diagnostics(input, Diagnostics::new())
    }

    /// Parser whose diagnostics name `source` as their origin
    pub fn with_source(input: &str, source: &str) -> Self {
        Self::with_diagnostics(input, Diagnostics::for_source(source))
    }

    fn with_diagnostics(input: &str, diagnostics: Diagnostics) -> Self {
        let mut lexer = Lexer::new(input);
        let first = lexer.next_significant_token();
        let mut parser = Self {
            lexer,
            current_token: first,
            peeked: None,
            previous_span: Span::default(),
            recursion_depth: 0,
            diagnostics,
        };
        parser.report_lex_error();
        parser
    }

    /// Parse the entire input
    pub fn parse(mut self) -> ParseOutput {
        let mut units = Vec::new();
        let mut scales = Vec::new();

        loop {
            self.recursion_depth = 0;
            if self.current_token_is(TokenType::Eof) {
                break;
            }
            if self.current_token.is_keyword("unit") {
                match self.parse_unit_declaration() {
                    Ok(unit) => units.push(unit),
                    Err(Abandoned) => self.synchronize(),
                }
            } else if self.current_token.is_keyword("scale") {
                match self.parse_scale_declaration() {
                    Ok(scale) => scales.push(scale),
                    Err(Abandoned) => self.synchronize(),
                }
            } else if self.current_token_is(TokenType::Semicolon) {
                self.advance();
            } else {
                self.unexpected("'unit' or 'scale'");
                self.synchronize();
            }
        }

        tracing::debug!(
            units = units.len(),
            scales = scales.len(),
            errors = self.diagnostics.error_count(),
            "Parsed definitions"
        );

        ParseOutput {
            units,
            scales,
            diagnostics: self.diagnostics,
        }
    }

    /// Advance to the next significant token
    fn advance(&mut self) {
        self.previous_span = self.current_token.span;
        self.current_token = match self.peeked.take() {
            Some(token) => token,
            None => self.lexer.next_significant_token(),
        };
        self.report_lex_error();
    }

    /// Token after the current one
    fn peek(&mut self) -> &Token {
        let lexer = &mut self.lexer;
        self.peeked
            .get_or_insert_with(|| lexer.next_significant_token())
    }

    fn report_lex_error(&mut self) {
        let token = &self.current_token;
        if token.token_type == TokenType::Error {
            let message = token
                .message
                .clone()
                .unwrap_or_else(|| format!("Invalid token '{}'", token.value));
            let diagnostic = Diagnostic::error(Stage::Lex, message).with_span(token.span);
            self.diagnostics.push(diagnostic);
        }
    }

    /// Check if current token matches the given type
    fn current_token_is(&self, token_type: TokenType) -> bool {
        self.current_token.token_type == token_type
    }

    /// Check if current token is one of the given types
    fn current_token_is_one_of(&self, types: &[TokenType]) -> bool {
        types.contains(&self.current_token.token_type)
    }

    /// Record a syntax error at the current token.
    ///
    /// Error tokens were already reported by the lexer stage and are not
    /// reported twice.
    fn unexpected(&mut self, expected: &str) -> Abandoned {
        let token = &self.current_token;
        if token.token_type != TokenType::Error {
            let found = match token.token_type {
                TokenType::Identifier | TokenType::NumberLiteral => {
                    format!("{} '{}'", token.token_type.describe(), token.value)
                }
                TokenType::StringLiteral => format!("string literal \"{}\"", token.value),
                other => other.describe().to_string(),
            };
            let diagnostic =
                Diagnostic::error(Stage::Parse, format!("Expected {}, found {}", expected, found))
                    .with_span(token.span);
            self.diagnostics.push(diagnostic);
        }
        Abandoned
    }

    fn error_here(&mut self, message: String) -> Abandoned {
        let diagnostic = Diagnostic::error(Stage::Parse, message).with_span(self.current_token.span);
        self.diagnostics.push(diagnostic);
        Abandoned
    }

    /// Expect a specific token type and advance
    fn expect(&mut self, token_type: TokenType) -> Parse<Token> {
        if self.current_token_is(token_type) {
            let token = self.current_token.clone();
            self.advance();
            Ok(token)
        } else {
            Err(self.unexpected(token_type.describe()))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Parse<Token> {
        if self.current_token_is(TokenType::Identifier) {
            let token = self.current_token.clone();
            self.advance();
            Ok(token)
        } else {
            Err(self.unexpected(what))
        }
    }

    /// Skip to the end of the broken declaration.
    ///
    /// Consumes up to and including the next `;`, or stops in front of the next
    /// `unit`/`scale` keyword.
    fn synchronize(&mut self) {
        loop {
            if self.current_token_is(TokenType::Eof) {
                return;
            }
            if self.current_token_is(TokenType::Semicolon) {
                self.advance();
                return;
            }
            if self.current_token.is_keyword("unit") || self.current_token.is_keyword("scale") {
                return;
            }
            self.advance();
        }
    }

    /// Check recursion depth and increment
    fn check_recursion_depth(&mut self) -> Parse<()> {
        self.recursion_depth += 1;
        if self.recursion_depth > MAX_RECURSION_DEPTH {
            return Err(self.error_here(format!(
                "Expression too deeply nested (max depth: {})",
                MAX_RECURSION_DEPTH
            )));
        }
        Ok(())
    }

    /// Decrement recursion depth
    fn decrement_recursion_depth(&mut self) {
        self.recursion_depth -= 1;
    }

    /// Parse unit declaration:
    /// `unit ["<" NumType ">"] Identifier StringLiteral+ [":" Format] "=" DimExpr ("|" DimExpr)* ";"`
    fn parse_unit_declaration(&mut self) -> Parse<UnitDecl> {
        let start = self.current_token.span;
        self.advance(); // Skip 'unit'

        let numeric_kind = if self.current_token_is(TokenType::LessThan) {
            self.advance();
            let keyword = self.expect_identifier("numeric type")?;
            let kind = match NumericKind::from_keyword(&keyword.value) {
                Some(kind) => kind,
                None => {
                    let diagnostic = Diagnostic::error(
                        Stage::Parse,
                        format!(
                            "Unknown numeric type '{}' (expected double, float or decimal)",
                            keyword.value
                        ),
                    )
                    .with_span(keyword.span);
                    self.diagnostics.push(diagnostic);
                    return Err(Abandoned);
                }
            };
            self.expect(TokenType::GreaterThan)?;
            Some(kind)
        } else {
            None
        };

        let name = self.expect_identifier("unit name")?;

        let mut tags = Vec::new();
        while self.current_token_is(TokenType::StringLiteral) {
            tags.push(self.current_token.value.clone());
            self.advance();
        }
        if tags.is_empty() {
            return Err(self.unexpected("symbol tag (string literal)"));
        }

        let format = self.parse_format()?;

        self.expect(TokenType::Equal)?;
        let definition = self.parse_dim_expression()?;

        let mut alternatives = Vec::new();
        while self.current_token_is(TokenType::Pipe) {
            self.advance();
            alternatives.push(self.parse_dim_expression()?);
        }

        self.expect(TokenType::Semicolon)?;

        Ok(UnitDecl {
            name: name.value,
            span: start.to(self.previous_span),
            numeric_kind,
            tags,
            format,
            definition,
            alternatives,
        })
    }

    /// Parse scale declaration:
    /// `scale Identifier [":" Format] [RefPoint] "=" (NumExpr "from" UnitRef | UnitRef NumExpr) ";"`
    fn parse_scale_declaration(&mut self) -> Parse<ScaleDecl> {
        let start = self.current_token.span;
        self.advance(); // Skip 'scale'

        let name = self.expect_identifier("scale name")?;
        let format = self.parse_format()?;

        let ref_point = if self.current_token_is(TokenType::Identifier) {
            let tag = self.current_token.value.clone();
            self.advance();
            Some(tag)
        } else {
            None
        };

        self.expect(TokenType::Equal)?;

        let starts_with_unit = self.current_token_is(TokenType::Identifier)
            && (self.current_token.verbatim || !is_named_constant(&self.current_token.value))
            && self.peek().token_type != TokenType::Dot;

        let (unit, offset) = if starts_with_unit {
            let unit = self.expect_identifier("unit name")?;
            let offset = self.parse_num_expression()?;
            (unit, offset)
        } else {
            let offset = self.parse_num_expression()?;
            if !self.current_token.is_keyword("from") {
                return Err(self.unexpected("'from'"));
            }
            self.advance();
            let unit = self.expect_identifier("unit name")?;
            (unit, offset)
        };

        self.expect(TokenType::Semicolon)?;

        Ok(ScaleDecl {
            name: name.value,
            span: start.to(self.previous_span),
            format,
            ref_point,
            unit: unit.value,
            unit_span: unit.span,
            offset,
        })
    }

    /// Parse optional `":" StringLiteral` format clause
    fn parse_format(&mut self) -> Parse<Option<String>> {
        if !self.current_token_is(TokenType::Colon) {
            return Ok(None);
        }
        self.advance();
        let format = self.expect(TokenType::StringLiteral)?;
        Ok(Some(format.value))
    }

    /// Parse dimension expression: DimTerm (("*" | "/") DimTerm)*
    fn parse_dim_expression(&mut self) -> Parse<AstNode> {
        let mut left = self.parse_dim_term()?;

        while self.current_token_is_one_of(&[TokenType::Multiply, TokenType::Divide]) {
            let is_product = self.current_token_is(TokenType::Multiply);
            self.advance();
            let right = self.parse_dim_term()?;
            left = if is_product {
                AstNode::Product {
                    lhs: Box::new(left),
                    rhs: Box::new(right),
                }
            } else {
                AstNode::Quotient {
                    lhs: Box::new(left),
                    rhs: Box::new(right),
                }
            };
        }

        if self.current_token_is(TokenType::Caret) {
            return Err(self.error_here(
                "Exponentiation '^' is not supported; write powers as products (Meter * Meter)"
                    .into(),
            ));
        }

        Ok(left)
    }

    /// Parse dimension term:
    /// `"<" [Magnitude] ">" | Number | NamedLiteral | UnitRef | "(" DimExpr ")"`
    fn parse_dim_term(&mut self) -> Parse<AstNode> {
        let token = self.current_token.clone();
        match token.token_type {
            TokenType::LessThan => self.parse_magnitude(),
            TokenType::NumberLiteral => {
                self.advance();
                Ok(AstNode::Number {
                    text: token.value,
                    span: token.span,
                })
            }
            TokenType::StringLiteral => {
                self.advance();
                Ok(AstNode::Literal {
                    name: token.value,
                    span: token.span,
                })
            }
            TokenType::Identifier => {
                self.advance();
                if !token.verbatim && is_named_constant(&token.value) {
                    Ok(AstNode::Literal {
                        name: token.value,
                        span: token.span,
                    })
                } else {
                    Ok(AstNode::UnitReference {
                        name: token.value,
                        span: token.span,
                    })
                }
            }
            TokenType::OpenParen => {
                self.check_recursion_depth()?;
                self.advance();
                let inner = self.parse_dim_expression()?;
                self.expect(TokenType::CloseParen)?;
                self.decrement_recursion_depth();
                Ok(AstNode::Parenthesized(Box::new(inner)))
            }
            TokenType::Caret => Err(self.error_here(
                "Exponentiation '^' is not supported; write powers as products (Meter * Meter)"
                    .into(),
            )),
            _ => Err(self.unexpected("dimension term")),
        }
    }

    /// Parse magnitude atom: `"<" [Magnitude] ">"`
    fn parse_magnitude(&mut self) -> Parse<AstNode> {
        let start = self.current_token.span;
        self.advance(); // Skip '<'

        let magnitude = if self.current_token_is(TokenType::GreaterThan) {
            None
        } else {
            let name = self.expect_identifier("magnitude name")?;
            match Magnitude::from_name(&name.value) {
                Some(magnitude) => Some(magnitude),
                None => {
                    let diagnostic = Diagnostic::error(
                        Stage::Parse,
                        format!("Unknown magnitude '{}'", name.value),
                    )
                    .with_span(name.span);
                    self.diagnostics.push(diagnostic);
                    return Err(Abandoned);
                }
            }
        };

        self.expect(TokenType::GreaterThan)?;
        Ok(AstNode::Magnitude {
            magnitude,
            span: start.to(self.previous_span),
        })
    }

    /// Parse numeral expression: Term (("+" | "-") Term)*
    fn parse_num_expression(&mut self) -> Parse<AstNode> {
        let mut left = self.parse_num_term()?;

        while self.current_token_is_one_of(&[TokenType::Plus, TokenType::Minus]) {
            let is_sum = self.current_token_is(TokenType::Plus);
            self.advance();
            let right = self.parse_num_term()?;
            left = if is_sum {
                AstNode::Sum {
                    lhs: Box::new(left),
                    rhs: Box::new(right),
                }
            } else {
                AstNode::Difference {
                    lhs: Box::new(left),
                    rhs: Box::new(right),
                }
            };
        }

        Ok(left)
    }

    /// Parse numeral term: Factor (("*" | "/") Factor)*
    fn parse_num_term(&mut self) -> Parse<AstNode> {
        let mut left = self.parse_num_factor()?;

        while self.current_token_is_one_of(&[TokenType::Multiply, TokenType::Divide]) {
            let is_product = self.current_token_is(TokenType::Multiply);
            self.advance();
            let right = self.parse_num_factor()?;
            left = if is_product {
                AstNode::Product {
                    lhs: Box::new(left),
                    rhs: Box::new(right),
                }
            } else {
                AstNode::Quotient {
                    lhs: Box::new(left),
                    rhs: Box::new(right),
                }
            };
        }

        Ok(left)
    }

    /// Parse numeral factor:
    /// `["-" | "+"] (Number | NamedLiteral | UnitRef "." "Factor" | "(" NumExpr ")")`
    fn parse_num_factor(&mut self) -> Parse<AstNode> {
        let token = self.current_token.clone();
        match token.token_type {
            TokenType::Plus | TokenType::Minus => {
                self.check_recursion_depth()?;
                self.advance();
                let operand = self.parse_num_factor()?;
                self.decrement_recursion_depth();
                Ok(AstNode::Unary {
                    negative: token.token_type == TokenType::Minus,
                    operand: Box::new(operand),
                })
            }
            TokenType::NumberLiteral => {
                self.advance();
                Ok(AstNode::Number {
                    text: token.value,
                    span: token.span,
                })
            }
            TokenType::StringLiteral => {
                self.advance();
                Ok(AstNode::Literal {
                    name: token.value,
                    span: token.span,
                })
            }
            TokenType::Identifier if !token.verbatim && is_named_constant(&token.value) => {
                self.advance();
                Ok(AstNode::Literal {
                    name: token.value,
                    span: token.span,
                })
            }
            TokenType::Identifier => {
                self.advance();
                self.expect(TokenType::Dot)?;
                let property = self.expect_identifier("'Factor'")?;
                if property.value != "Factor" {
                    let diagnostic = Diagnostic::error(
                        Stage::Parse,
                        format!(
                            "Unknown unit property '{}' (only '{}.Factor' is available)",
                            property.value, token.value
                        ),
                    )
                    .with_span(property.span);
                    self.diagnostics.push(diagnostic);
                    return Err(Abandoned);
                }
                Ok(AstNode::UnitReference {
                    name: token.value,
                    span: token.span.to(property.span),
                })
            }
            TokenType::OpenParen => {
                self.check_recursion_depth()?;
                self.advance();
                let inner = self.parse_num_expression()?;
                self.expect(TokenType::CloseParen)?;
                self.decrement_recursion_depth();
                Ok(AstNode::Parenthesized(Box::new(inner)))
            }
            _ => Err(self.unexpected("numeral expression")),
        }
    }
}

/// Parse `input` in one go.
pub fn parse(input: &str) -> ParseOutput {
    Parser::new(input).parse()
}
