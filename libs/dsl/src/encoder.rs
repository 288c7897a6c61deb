//! Dimension and numeral encoders
//!
//! Both encoders walk a declaration's AST in post-order and fold it on an
//! explicit stack: the dimension encoder into a [`Dimension`] vector, the
//! numeral encoder into a [`Numeral`] of the declaring unit's kind. Each also
//! produces the Rust source text the backends emit for the folded value.

use thiserror::Error;

use crate::ast::AstNode;
use crate::dimension::{Dimension, DimensionError};
use crate::numeral::{Numeral, NumeralError, NumericKind};
use crate::token::Span;

/// Folded dimension of an expression
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DimensionalExpression {
    pub value: Dimension,
    pub code: String,
}

impl DimensionalExpression {
    pub fn dimensionless() -> Self {
        Self {
            value: Dimension::NONE,
            code: "Dimension::NONE".into(),
        }
    }
}

/// Folded numeric value of an expression
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NumeralExpression {
    /// `false` once any operand is symbolic
    pub is_true_constant: bool,
    pub value: Numeral,
    pub code: String,
}

impl NumeralExpression {
    pub fn constant(value: Numeral) -> Self {
        Self {
            is_true_constant: true,
            code: value.literal(),
            value,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// Declared unit that is not elaborated yet; the caller may retry later
    #[error("Unresolved reference '{name}'")]
    Pending { name: String, span: Span },

    #[error("Unresolved reference '{name}'")]
    Unresolved { name: String, span: Span },

    #[error("Reference to invalid unit '{name}'")]
    InvalidReference { name: String, span: Span },

    #[error("Unit '{name}' is {found}, expected {expected}")]
    KindMismatch {
        name: String,
        span: Span,
        expected: NumericKind,
        found: NumericKind,
    },

    #[error("{source}")]
    Numeral { source: NumeralError, span: Span },

    #[error("{source}")]
    Dimension { source: DimensionError, span: Span },

    /// Grammar invariant violation; never caused by user input
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EncodeError {
    pub fn span(&self) -> Option<Span> {
        match self {
            EncodeError::Pending { span, .. }
            | EncodeError::Unresolved { span, .. }
            | EncodeError::InvalidReference { span, .. }
            | EncodeError::KindMismatch { span, .. }
            | EncodeError::Numeral { span, .. }
            | EncodeError::Dimension { span, .. } => Some(*span),
            EncodeError::Internal(_) => None,
        }
    }
}

/// What the encoders need to know about a referenced unit
#[derive(Debug, Clone, Copy)]
pub struct UnitSummary<'a> {
    pub name: &'a str,
    pub kind: NumericKind,
    pub dimension: &'a DimensionalExpression,
    pub factor: &'a NumeralExpression,
}

/// Outcome of looking a unit up by name
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    Resolved(UnitSummary<'a>),
    /// Declared, not elaborated yet
    Pending,
    /// Declared, but its own elaboration failed
    Invalid,
    Unknown,
}

/// Name resolution used by the encoders
pub trait UnitLookup {
    fn lookup_unit(&self, name: &str) -> Lookup<'_>;
}

fn resolve<'a>(
    lookup: &'a dyn UnitLookup,
    name: &str,
    span: Span,
) -> Result<UnitSummary<'a>, EncodeError> {
    match lookup.lookup_unit(name) {
        Lookup::Resolved(unit) => Ok(unit),
        Lookup::Pending => Err(EncodeError::Pending {
            name: name.to_string(),
            span,
        }),
        Lookup::Invalid => Err(EncodeError::InvalidReference {
            name: name.to_string(),
            span,
        }),
        Lookup::Unknown => Err(EncodeError::Unresolved {
            name: name.to_string(),
            span,
        }),
    }
}

/// Wrap `expr` in parentheses unless it is already fully enclosed
fn parenthesize(expr: &str) -> String {
    let mut depth = 0i32;
    let mut chars = expr.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && chars.peek().is_some() {
                    return format!("({})", expr);
                }
            }
            ' ' => {}
            _ if depth == 0 => return format!("({})", expr),
            _ => {}
        }
    }
    expr.to_string()
}

fn pop2<T>(stack: &mut Vec<T>) -> Result<(T, T), EncodeError> {
    match (stack.pop(), stack.pop()) {
        (Some(rhs), Some(lhs)) => Ok((lhs, rhs)),
        _ => Err(EncodeError::Internal("operand stack underflow".into())),
    }
}

fn pop1<T>(stack: &mut Vec<T>) -> Result<T, EncodeError> {
    stack
        .pop()
        .ok_or_else(|| EncodeError::Internal("operand stack underflow".into()))
}

/// Folds an AST into a dimension vector
pub struct DimensionEncoder<'a> {
    lookup: &'a dyn UnitLookup,
    stack: Vec<DimensionalExpression>,
}

impl<'a> DimensionEncoder<'a> {
    pub fn new(lookup: &'a dyn UnitLookup) -> Self {
        Self {
            lookup,
            stack: Vec::with_capacity(8),
        }
    }

    pub fn encode(&mut self, node: &AstNode) -> Result<DimensionalExpression, EncodeError> {
        self.stack.clear();
        self.visit(node)?;
        let result = pop1(&mut self.stack)?;
        if !self.stack.is_empty() {
            return Err(EncodeError::Internal(format!(
                "dimension encoding of '{}' left {} operands",
                node,
                self.stack.len()
            )));
        }
        Ok(result)
    }

    fn visit(&mut self, node: &AstNode) -> Result<(), EncodeError> {
        match node {
            AstNode::Number { .. } | AstNode::Literal { .. } => {
                self.stack.push(DimensionalExpression::dimensionless());
            }
            AstNode::Magnitude { magnitude, .. } => {
                let expr = match magnitude {
                    Some(m) => DimensionalExpression {
                        value: Dimension::basic(*m),
                        code: format!("Dimension::{}", m.constant_name()),
                    },
                    None => DimensionalExpression::dimensionless(),
                };
                self.stack.push(expr);
            }
            AstNode::UnitReference { name, span } => {
                let unit = resolve(self.lookup, name, *span)?;
                self.stack.push(DimensionalExpression {
                    value: unit.dimension.value,
                    code: format!("{}::DIMENSION", unit.name),
                });
            }
            AstNode::Unary { operand, .. } => self.visit(operand)?,
            AstNode::Parenthesized(inner) => {
                self.visit(inner)?;
                let expr = pop1(&mut self.stack)?;
                self.stack.push(DimensionalExpression {
                    value: expr.value,
                    code: parenthesize(&expr.code),
                });
            }
            AstNode::Product { lhs, rhs } => {
                self.visit(lhs)?;
                self.visit(rhs)?;
                let (l, r) = pop2(&mut self.stack)?;
                let result = if l.value.is_dimensionless() {
                    r
                } else if r.value.is_dimensionless() {
                    l
                } else {
                    DimensionalExpression {
                        value: l.value.checked_mul(&r.value).map_err(|source| {
                            EncodeError::Dimension {
                                source,
                                span: node.span(),
                            }
                        })?,
                        code: format!("{} * {}", l.code, r.code),
                    }
                };
                self.stack.push(result);
            }
            AstNode::Quotient { lhs, rhs } => {
                self.visit(lhs)?;
                self.visit(rhs)?;
                let (l, r) = pop2(&mut self.stack)?;
                let result = if r.value.is_dimensionless() {
                    l
                } else {
                    DimensionalExpression {
                        value: l.value.checked_div(&r.value).map_err(|source| {
                            EncodeError::Dimension {
                                source,
                                span: node.span(),
                            }
                        })?,
                        code: format!("{} / {}", l.code, r.code),
                    }
                };
                self.stack.push(result);
            }
            AstNode::Sum { .. } | AstNode::Difference { .. } => {
                return Err(EncodeError::Internal(format!(
                    "'{}' adds or subtracts dimensions, which no declaration can express",
                    node
                )));
            }
        }
        Ok(())
    }
}

/// Folds an AST into a numeral of one numeric kind
pub struct NumeralEncoder<'a> {
    lookup: &'a dyn UnitLookup,
    kind: NumericKind,
    stack: Vec<NumeralExpression>,
}

impl<'a> NumeralEncoder<'a> {
    pub fn new(lookup: &'a dyn UnitLookup, kind: NumericKind) -> Self {
        Self {
            lookup,
            kind,
            stack: Vec::with_capacity(8),
        }
    }

    pub fn encode(&mut self, node: &AstNode) -> Result<NumeralExpression, EncodeError> {
        self.stack.clear();
        self.visit(node)?;
        let result = pop1(&mut self.stack)?;
        if !self.stack.is_empty() {
            return Err(EncodeError::Internal(format!(
                "numeral encoding of '{}' left {} operands",
                node,
                self.stack.len()
            )));
        }
        Ok(result)
    }

    fn binary(
        &mut self,
        node: &AstNode,
        op: &str,
        fold: impl Fn(&Numeral, &Numeral) -> Result<Numeral, NumeralError>,
    ) -> Result<(), EncodeError> {
        let (l, r) = pop2(&mut self.stack)?;
        let value = fold(&l.value, &r.value).map_err(|source| EncodeError::Numeral {
            source,
            span: node.span(),
        })?;
        self.stack.push(NumeralExpression {
            is_true_constant: l.is_true_constant && r.is_true_constant,
            value,
            code: format!("{} {} {}", l.code, op, r.code),
        });
        Ok(())
    }

    fn visit(&mut self, node: &AstNode) -> Result<(), EncodeError> {
        match node {
            AstNode::Number { text, span } => {
                let value = self
                    .kind
                    .parse(text)
                    .map_err(|source| EncodeError::Numeral { source, span: *span })?;
                self.stack.push(NumeralExpression::constant(value));
            }
            AstNode::Literal { name, .. } => {
                let expr = if let Some((value, code)) = self.kind.named_constant(name) {
                    NumeralExpression {
                        is_true_constant: true,
                        value,
                        code,
                    }
                } else if let Ok(value) = self.kind.parse(name) {
                    NumeralExpression::constant(value)
                } else {
                    tracing::debug!(literal = %name, "Symbolic literal is not a compile-time constant");
                    NumeralExpression {
                        is_true_constant: false,
                        value: self.kind.one(),
                        code: name.clone(),
                    }
                };
                self.stack.push(expr);
            }
            AstNode::Magnitude { .. } => {
                self.stack.push(NumeralExpression::constant(self.kind.one()));
            }
            AstNode::UnitReference { name, span } => {
                let unit = resolve(self.lookup, name, *span)?;
                if unit.kind != self.kind {
                    return Err(EncodeError::KindMismatch {
                        name: name.clone(),
                        span: *span,
                        expected: self.kind,
                        found: unit.kind,
                    });
                }
                self.stack.push(NumeralExpression {
                    is_true_constant: unit.factor.is_true_constant,
                    value: unit.factor.value,
                    code: format!("{}::FACTOR", unit.name),
                });
            }
            AstNode::Unary { negative, operand } => {
                self.visit(operand)?;
                let expr = pop1(&mut self.stack)?;
                let expr = if *negative {
                    NumeralExpression {
                        is_true_constant: expr.is_true_constant,
                        value: expr.value.neg(),
                        code: format!("-{}", expr.code),
                    }
                } else {
                    expr
                };
                self.stack.push(expr);
            }
            AstNode::Parenthesized(inner) => {
                self.visit(inner)?;
                let expr = pop1(&mut self.stack)?;
                self.stack.push(NumeralExpression {
                    code: parenthesize(&expr.code),
                    ..expr
                });
            }
            AstNode::Product { lhs, rhs } => {
                self.visit(lhs)?;
                self.visit(rhs)?;
                self.binary(node, "*", Numeral::checked_mul)?;
            }
            AstNode::Quotient { lhs, rhs } => {
                self.visit(lhs)?;
                self.visit(rhs)?;
                self.binary(node, "/", Numeral::checked_div)?;
            }
            AstNode::Sum { lhs, rhs } => {
                self.visit(lhs)?;
                self.visit(rhs)?;
                self.binary(node, "+", Numeral::checked_add)?;
            }
            AstNode::Difference { lhs, rhs } => {
                self.visit(lhs)?;
                self.visit(rhs)?;
                self.binary(node, "-", Numeral::checked_sub)?;
            }
        }
        Ok(())
    }
}
