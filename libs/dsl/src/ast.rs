//! Abstract Syntax Tree (AST) representation
//!
//! The AST mirrors the definitions grammar directly, without semantic analysis.
//! Each declaration owns one expression tree per definition; the encoders
//! consume those trees after parsing.
//!
//! # Grammar Coverage
//!
//! ## Declarations
//! - `unit ["<" NumType ">"] Identifier StringLiteral+ [":" Format] "=" DimExpr ("|" DimExpr)* ";"`
//! - `scale Identifier [":" Format] [RefPoint] "=" NumExpr "from" UnitRef ";"`
//! - `scale Identifier [":" Format] [RefPoint] "=" UnitRef NumExpr ";"`
//!
//! ## Expressions
//! - Number: `2.54`, `1e-3`
//! - Literal: `pi`, `"e"`, `"Rate"`
//! - Magnitude: `<Length>`, `<>`
//! - UnitReference: `Meter`, `Meter.Factor`
//! - Unary: `-x`, `+x`
//! - Parenthesized: `(x)`
//! - Product / Quotient: `x * y`, `x / y`
//! - Sum / Difference: `x + y`, `x - y`

use std::fmt;

use crate::dimension::Magnitude;
use crate::numeral::NumericKind;
use crate::token::Span;

/// AST node of a dimension or numeral expression
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    /// Number literal, kept as source text until its numeric kind is known
    Number { text: String, span: Span },

    /// Named symbolic constant
    Literal { name: String, span: Span },

    /// Base magnitude atom; `None` is the dimensionless magnitude `<>`
    Magnitude {
        magnitude: Option<Magnitude>,
        span: Span,
    },

    /// Reference to a unit declared anywhere in the same compilation
    UnitReference { name: String, span: Span },

    /// Sign applied to an operand
    Unary {
        negative: bool,
        operand: Box<AstNode>,
    },

    Parenthesized(Box<AstNode>),

    Product {
        lhs: Box<AstNode>,
        rhs: Box<AstNode>,
    },

    Quotient {
        lhs: Box<AstNode>,
        rhs: Box<AstNode>,
    },

    Sum {
        lhs: Box<AstNode>,
        rhs: Box<AstNode>,
    },

    Difference {
        lhs: Box<AstNode>,
        rhs: Box<AstNode>,
    },
}

impl AstNode {
    pub fn span(&self) -> Span {
        match self {
            AstNode::Number { span, .. }
            | AstNode::Literal { span, .. }
            | AstNode::Magnitude { span, .. }
            | AstNode::UnitReference { span, .. } => *span,
            AstNode::Unary { operand, .. } => operand.span(),
            AstNode::Parenthesized(inner) => inner.span(),
            AstNode::Product { lhs, rhs }
            | AstNode::Quotient { lhs, rhs }
            | AstNode::Sum { lhs, rhs }
            | AstNode::Difference { lhs, rhs } => lhs.span().to(rhs.span()),
        }
    }

    /// Names of all units referenced by this tree, in source order.
    pub fn references(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_references(&mut names);
        names
    }

    fn collect_references<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            AstNode::UnitReference { name, .. } => names.push(name),
            AstNode::Unary { operand, .. } => operand.collect_references(names),
            AstNode::Parenthesized(inner) => inner.collect_references(names),
            AstNode::Product { lhs, rhs }
            | AstNode::Quotient { lhs, rhs }
            | AstNode::Sum { lhs, rhs }
            | AstNode::Difference { lhs, rhs } => {
                lhs.collect_references(names);
                rhs.collect_references(names);
            }
            AstNode::Number { .. } | AstNode::Literal { .. } | AstNode::Magnitude { .. } => {}
        }
    }
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstNode::Number { text, .. } => f.write_str(text),
            AstNode::Literal { name, .. } => write!(f, "\"{}\"", name),
            AstNode::Magnitude { magnitude, .. } => match magnitude {
                Some(m) => write!(f, "<{}>", m),
                None => f.write_str("<>"),
            },
            AstNode::UnitReference { name, .. } => f.write_str(name),
            AstNode::Unary { negative, operand } => {
                write!(f, "{}{}", if *negative { "-" } else { "+" }, operand)
            }
            AstNode::Parenthesized(inner) => write!(f, "({})", inner),
            AstNode::Product { lhs, rhs } => write!(f, "{} * {}", lhs, rhs),
            AstNode::Quotient { lhs, rhs } => write!(f, "{} / {}", lhs, rhs),
            AstNode::Sum { lhs, rhs } => write!(f, "{} + {}", lhs, rhs),
            AstNode::Difference { lhs, rhs } => write!(f, "{} - {}", lhs, rhs),
        }
    }
}

/// `unit` declaration
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDecl {
    pub name: String,
    pub span: Span,
    /// Explicit `<double|float|decimal>`; `None` takes the compile default
    pub numeric_kind: Option<NumericKind>,
    pub tags: Vec<String>,
    pub format: Option<String>,
    pub definition: AstNode,
    /// Further `| DimExpr` definitions that must agree with the first one
    pub alternatives: Vec<AstNode>,
}

/// `scale` declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleDecl {
    pub name: String,
    pub span: Span,
    pub format: Option<String>,
    /// Reference-point tag; `None` puts the scale in a family of its own
    pub ref_point: Option<String>,
    pub unit: String,
    pub unit_span: Span,
    pub offset: AstNode,
}
