//! Numeric kinds and checked numeral arithmetic
//!
//! Factors and offsets are folded in the numeric kind of the declaring unit:
//! `double` (f64), `float` (f32) or `decimal` (`rust_decimal::Decimal`).

use std::fmt;
use std::str::FromStr;

use phf::phf_map;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumeralError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Numeric overflow")]
    Overflow,

    #[error("Invalid {kind} numeral '{text}'")]
    Invalid { kind: NumericKind, text: String },

    #[error("Cannot combine {left} and {right} values")]
    KindMismatch { left: NumericKind, right: NumericKind },
}

/// Numeric type underlying a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum NumericKind {
    #[default]
    Double,
    Float,
    Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NamedConstant {
    Pi,
    E,
}

static NAMED_CONSTANTS: phf::Map<&'static str, NamedConstant> = phf_map! {
    "pi" => NamedConstant::Pi,
    "π" => NamedConstant::Pi,
    "e" => NamedConstant::E,
};

/// Whether `name` is one of the built-in symbolic constants.
pub fn is_named_constant(name: &str) -> bool {
    NAMED_CONSTANTS.contains_key(name)
}

impl NumericKind {
    pub fn from_keyword(keyword: &str) -> Option<NumericKind> {
        match keyword.to_ascii_lowercase().as_str() {
            "double" => Some(NumericKind::Double),
            "float" => Some(NumericKind::Float),
            "decimal" => Some(NumericKind::Decimal),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            NumericKind::Double => "double",
            NumericKind::Float => "float",
            NumericKind::Decimal => "decimal",
        }
    }

    /// Rust type the generated wrappers store.
    pub fn rust_type(&self) -> &'static str {
        match self {
            NumericKind::Double => "f64",
            NumericKind::Float => "f32",
            NumericKind::Decimal => "Decimal",
        }
    }

    pub fn one(&self) -> Numeral {
        match self {
            NumericKind::Double => Numeral::Double(1.0),
            NumericKind::Float => Numeral::Float(1.0),
            NumericKind::Decimal => Numeral::Decimal(Decimal::ONE),
        }
    }

    pub fn zero(&self) -> Numeral {
        match self {
            NumericKind::Double => Numeral::Double(0.0),
            NumericKind::Float => Numeral::Float(0.0),
            NumericKind::Decimal => Numeral::Decimal(Decimal::ZERO),
        }
    }

    /// Parse a lexed numeral (`2.54`, `.5`, `1e-3`) in this kind.
    pub fn parse(&self, text: &str) -> Result<Numeral, NumeralError> {
        let invalid = || NumeralError::Invalid {
            kind: *self,
            text: text.to_string(),
        };
        match self {
            NumericKind::Double => {
                let value = f64::from_str(text).map_err(|_| invalid())?;
                Numeral::Double(value).finite()
            }
            NumericKind::Float => {
                let value = f32::from_str(text).map_err(|_| invalid())?;
                Numeral::Float(value).finite()
            }
            NumericKind::Decimal => {
                let normalized = if text.starts_with('.') {
                    format!("0{}", text)
                } else {
                    text.to_string()
                };
                let value = if normalized.contains(['e', 'E']) {
                    Decimal::from_scientific(&normalized)
                } else {
                    Decimal::from_str(&normalized)
                };
                value.map(Numeral::Decimal).map_err(|_| invalid())
            }
        }
    }

    /// Re-express `value` in this kind.
    pub fn convert(&self, value: &Numeral) -> Result<Numeral, NumeralError> {
        if value.kind() == *self {
            return Ok(*value);
        }
        match self {
            NumericKind::Double => Numeral::Double(value.to_f64()).finite(),
            NumericKind::Float => Numeral::Float(value.to_f64() as f32).finite(),
            NumericKind::Decimal => Decimal::from_f64(value.to_f64())
                .map(Numeral::Decimal)
                .ok_or(NumeralError::Overflow),
        }
    }

    /// Value and generated code of a built-in symbolic constant.
    pub fn named_constant(&self, name: &str) -> Option<(Numeral, String)> {
        let constant = NAMED_CONSTANTS.get(name)?;
        let resolved = match (self, constant) {
            (NumericKind::Double, NamedConstant::Pi) => (
                Numeral::Double(std::f64::consts::PI),
                "std::f64::consts::PI".to_string(),
            ),
            (NumericKind::Double, NamedConstant::E) => (
                Numeral::Double(std::f64::consts::E),
                "std::f64::consts::E".to_string(),
            ),
            (NumericKind::Float, NamedConstant::Pi) => (
                Numeral::Float(std::f32::consts::PI),
                "std::f32::consts::PI".to_string(),
            ),
            (NumericKind::Float, NamedConstant::E) => (
                Numeral::Float(std::f32::consts::E),
                "std::f32::consts::E".to_string(),
            ),
            (NumericKind::Decimal, NamedConstant::Pi) => {
                let value =
                    Numeral::Decimal(Decimal::from_i128_with_scale(31415926535897932384626433833, 28));
                let code = value.literal();
                (value, code)
            }
            (NumericKind::Decimal, NamedConstant::E) => {
                let value =
                    Numeral::Decimal(Decimal::from_i128_with_scale(27182818284590452353602874714, 28));
                let code = value.literal();
                (value, code)
            }
        };
        Some(resolved)
    }
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A folded value of one numeric kind
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "value", rename_all = "lowercase"))]
pub enum Numeral {
    Double(f64),
    Float(f32),
    Decimal(Decimal),
}

impl Numeral {
    pub fn kind(&self) -> NumericKind {
        match self {
            Numeral::Double(_) => NumericKind::Double,
            Numeral::Float(_) => NumericKind::Float,
            Numeral::Decimal(_) => NumericKind::Decimal,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Numeral::Double(v) => *v == 0.0,
            Numeral::Float(v) => *v == 0.0,
            Numeral::Decimal(v) => v.is_zero(),
        }
    }

    pub fn is_one(&self) -> bool {
        *self == self.kind().one()
    }

    /// Lossy view used for tolerance comparisons and reporting.
    pub fn to_f64(&self) -> f64 {
        match self {
            Numeral::Double(v) => *v,
            Numeral::Float(v) => f64::from(*v),
            Numeral::Decimal(v) => v.to_f64().unwrap_or(f64::NAN),
        }
    }

    fn finite(self) -> Result<Numeral, NumeralError> {
        match self {
            Numeral::Double(v) if !v.is_finite() => Err(NumeralError::Overflow),
            Numeral::Float(v) if !v.is_finite() => Err(NumeralError::Overflow),
            other => Ok(other),
        }
    }

    fn binary(
        &self,
        other: &Numeral,
        double: impl Fn(f64, f64) -> f64,
        float: impl Fn(f32, f32) -> f32,
        decimal: impl Fn(Decimal, Decimal) -> Option<Decimal>,
    ) -> Result<Numeral, NumeralError> {
        match (self, other) {
            (Numeral::Double(a), Numeral::Double(b)) => Numeral::Double(double(*a, *b)).finite(),
            (Numeral::Float(a), Numeral::Float(b)) => Numeral::Float(float(*a, *b)).finite(),
            (Numeral::Decimal(a), Numeral::Decimal(b)) => decimal(*a, *b)
                .map(Numeral::Decimal)
                .ok_or(NumeralError::Overflow),
            (left, right) => Err(NumeralError::KindMismatch {
                left: left.kind(),
                right: right.kind(),
            }),
        }
    }

    pub fn checked_add(&self, other: &Numeral) -> Result<Numeral, NumeralError> {
        self.binary(other, |a, b| a + b, |a, b| a + b, |a, b| a.checked_add(b))
    }

    pub fn checked_sub(&self, other: &Numeral) -> Result<Numeral, NumeralError> {
        self.binary(other, |a, b| a - b, |a, b| a - b, |a, b| a.checked_sub(b))
    }

    pub fn checked_mul(&self, other: &Numeral) -> Result<Numeral, NumeralError> {
        self.binary(other, |a, b| a * b, |a, b| a * b, |a, b| a.checked_mul(b))
    }

    pub fn checked_div(&self, other: &Numeral) -> Result<Numeral, NumeralError> {
        if other.is_zero() && self.kind() == other.kind() {
            return Err(NumeralError::DivisionByZero);
        }
        self.binary(other, |a, b| a / b, |a, b| a / b, |a, b| a.checked_div(b))
    }

    pub fn neg(&self) -> Numeral {
        match self {
            Numeral::Double(v) => Numeral::Double(-v),
            Numeral::Float(v) => Numeral::Float(-v),
            Numeral::Decimal(v) => Numeral::Decimal(-*v),
        }
    }

    /// Relative comparison; exact zero only matches exact zero.
    pub fn approx_eq(&self, other: &Numeral, tolerance: f64) -> bool {
        if let (Numeral::Decimal(a), Numeral::Decimal(b)) = (self, other) {
            if a == b {
                return true;
            }
        }
        let (a, b) = (self.to_f64(), other.to_f64());
        if a == b {
            return true;
        }
        let scale = a.abs().max(b.abs());
        (a - b).abs() <= tolerance * scale
    }

    /// Rust source text for this value (`2.54f64`, `0.5f32`, `Decimal::from_parts(..)`).
    pub fn literal(&self) -> String {
        match self {
            Numeral::Double(v) => format!("{:?}f64", v),
            Numeral::Float(v) => format!("{:?}f32", v),
            Numeral::Decimal(v) => {
                let mantissa = v.mantissa();
                let magnitude = mantissa.unsigned_abs();
                format!(
                    "Decimal::from_parts({}, {}, {}, {}, {})",
                    magnitude as u32,
                    (magnitude >> 32) as u32,
                    (magnitude >> 64) as u32,
                    mantissa < 0,
                    v.scale()
                )
            }
        }
    }
}

impl fmt::Display for Numeral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Numeral::Double(v) => write!(f, "{}", v),
            Numeral::Float(v) => write!(f, "{}", v),
            Numeral::Decimal(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_each_kind() {
        assert_eq!(NumericKind::Double.parse("2.54"), Ok(Numeral::Double(2.54)));
        assert_eq!(NumericKind::Float.parse(".5"), Ok(Numeral::Float(0.5)));
        assert_eq!(
            NumericKind::Decimal.parse("1e3"),
            Ok(Numeral::Decimal(Decimal::from(1000)))
        );
        assert_eq!(
            NumericKind::Decimal.parse(".25"),
            Ok(Numeral::Decimal(Decimal::new(25, 2)))
        );
        assert_eq!(NumericKind::Double.parse("1e400"), Err(NumeralError::Overflow));
    }

    #[test]
    fn test_division_by_zero() {
        let one = NumericKind::Decimal.one();
        let zero = NumericKind::Decimal.zero();
        assert_eq!(one.checked_div(&zero), Err(NumeralError::DivisionByZero));
        assert_eq!(
            NumericKind::Double.one().checked_div(&NumericKind::Double.zero()),
            Err(NumeralError::DivisionByZero)
        );
    }

    #[test]
    fn test_kind_mismatch() {
        let result = Numeral::Double(1.0).checked_add(&Numeral::Float(1.0));
        assert!(matches!(result, Err(NumeralError::KindMismatch { .. })));
    }

    #[test]
    fn test_literals() {
        assert_eq!(Numeral::Double(100.0).literal(), "100.0f64");
        assert_eq!(Numeral::Float(0.5).literal(), "0.5f32");
        assert_eq!(
            Numeral::Decimal(Decimal::new(-15, 1)).literal(),
            "Decimal::from_parts(15, 0, 0, true, 1)"
        );
    }

    #[test]
    fn test_named_constants() {
        let (pi, code) = NumericKind::Double.named_constant("pi").unwrap();
        assert_eq!(pi, Numeral::Double(std::f64::consts::PI));
        assert_eq!(code, "std::f64::consts::PI");
        let (e, _) = NumericKind::Decimal.named_constant("e").unwrap();
        assert!((e.to_f64() - std::f64::consts::E).abs() < 1e-12);
        assert!(NumericKind::Float.named_constant("tau").is_none());
    }
}
