//! Error types for late loading

use std::path::PathBuf;

use metrum_dsl::{Diagnostic, Diagnostics, Stage};
use thiserror::Error;

/// Why a late load failed. Nothing is published when one is returned.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid module manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Cannot decompile '{name}': {message}")]
    Decompile { name: String, message: String },

    #[error(transparent)]
    Compiler(#[from] metrum_dsl::Error),

    #[error("Late definitions have {} error(s)", .0.error_count())]
    Definitions(Diagnostics),

    #[error("Late definitions declare no units or scales")]
    Empty,

    #[error("Code generation failed: {0}")]
    Generate(String),

    #[error("Building module '{module}' failed with {} error(s)", .diagnostics.error_count())]
    Build {
        module: String,
        diagnostics: Diagnostics,
    },

    #[error("Module '{0}' is already loaded")]
    DuplicateModule(String),

    #[error("Late load cancelled")]
    Cancelled,
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            source,
        }
    }

    /// The failure rendered through the diagnostics channel.
    pub fn diagnostics(&self) -> Diagnostics {
        match self {
            LoadError::Definitions(diagnostics) | LoadError::Build { diagnostics, .. } => {
                diagnostics.clone()
            }
            LoadError::Io { path, .. } => {
                Diagnostic::error(Stage::Backend, self.to_string())
                    .with_source(path.display().to_string())
                    .into()
            }
            other => Diagnostic::error(Stage::Backend, other.to_string()).into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
