//! Code generators
//!
//! Language-specific backends that turn a [`ModelView`] into source text.

pub mod rust;

use crate::view::ModelView;
use anyhow::Result;

/// Trait for code generators
pub trait Generator {
    /// Output type for the generator
    type Output;

    /// Generate code from the model view
    fn generate(&self, view: &ModelView) -> Result<Self::Output>;
}

/// Configuration for code generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Generate documentation comments
    pub generate_docs: bool,
    /// Generate serde derives on unit and scale types
    pub generate_serde: bool,
    /// Name of the generated module
    pub module_name: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            generate_docs: true,
            generate_serde: true,
            module_name: "units".to_string(),
        }
    }
}
