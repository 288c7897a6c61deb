//! Metrum definitions compiler
//!
//! Turns unit and scale declarations into a resolved model: dimension
//! families, constant-folded conversion factors and the table of arithmetic
//! operations relating units to one another.
//!
//! # Architecture Overview
//!
//! ```text
//! Definitions text
//!      |
//!   Lexer -> tokens -> Parser -> declarations (AST)
//!      |
//! Elaboration -> Dimension / Numeral encoders, deferred references
//!      |
//! Resolver -> families, relatives, outer operations
//!      |
//! Model (+ Diagnostics)
//! ```
//!
//! # Example
//!
//! ```rust
//! use metrum_dsl::{compile, CompileOptions};
//!
//! let text = r#"
//!     unit Meter "m" = <L>;
//!     unit Second "s" = <T>;
//!     unit MetersPerSecond "m/s" = Meter / Second;
//! "#;
//! let compilation = compile(text, &CompileOptions::default()).unwrap();
//! assert!(compilation.is_success());
//! assert_eq!(compilation.model.units.len(), 3);
//! ```

pub mod ast;
pub mod compiler;
pub mod diagnostics;
pub mod dimension;
mod elaborate;
pub mod encoder;
pub mod error;
pub mod lexer;
pub mod model;
pub mod numeral;
pub mod parser;
mod resolver;
pub mod token;

// Re-export main types
pub use compiler::{compile, compile_file, extend, Compilation, CompileOptions, RedeclarationPolicy};
pub use diagnostics::{Diagnostic, Diagnostics, Severity, Stage};
pub use dimension::{Dimension, Magnitude};
pub use encoder::{DimensionalExpression, NumeralExpression};
pub use error::{Error, Result};
pub use model::{
    BinaryOperation, FamilyId, Model, Operand, Operator, Origin, ScaleId, ScaleType, UnitId,
    UnitType,
};
pub use numeral::{Numeral, NumericKind};
pub use token::Span;
