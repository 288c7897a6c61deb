//! Error types for the definitions compiler
//!
//! Malformed definitions never produce an `Error`; they are reported through
//! [`Diagnostics`](crate::Diagnostics). An `Error` means the compilation could
//! not run at all.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invariant violation inside the compiler itself
    #[error("Internal error: {0}")]
    Internal(String),
}
