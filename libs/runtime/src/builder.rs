//! Module builder port
//!
//! Turning generated source into loadable types is a host capability: a host
//! with a compiler toolchain can build and load real code, others can fall
//! back to [`DescriptorBuilder`].

use std::sync::Arc;

use metrum_dsl::{Diagnostic, Diagnostics, Model, Stage};
use serde::{Deserialize, Serialize};

use crate::descriptor::{ScaleDescriptor, ScaleRef, UnitDescriptor, UnitRef};

/// Everything a builder needs to produce one late module
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRequest {
    pub module: String,
    /// Generated Rust source, all submodules inlined
    pub source: String,
    /// Existing modules the source may refer to
    pub references: Vec<String>,
    pub units: Vec<UnitDescriptor>,
    pub scales: Vec<ScaleDescriptor>,
}

/// A built module, in a form that can be persisted and loaded again
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleArtifact {
    pub module: String,
    pub source: String,
    #[serde(default)]
    pub references: Vec<String>,
    pub units: Vec<UnitDescriptor>,
    pub scales: Vec<ScaleDescriptor>,
}

/// Types exposed by a loaded module
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub name: String,
    pub units: Vec<UnitRef>,
    pub scales: Vec<ScaleRef>,
}

impl LoadedModule {
    /// Module built straight from its descriptors.
    pub fn from_descriptors(
        name: impl Into<String>,
        units: Vec<UnitDescriptor>,
        scales: Vec<ScaleDescriptor>,
    ) -> Self {
        Self {
            name: name.into(),
            units: units.into_iter().map(|u| Arc::new(u) as UnitRef).collect(),
            scales: scales.into_iter().map(|s| Arc::new(s) as ScaleRef).collect(),
        }
    }

    /// Module exposing every resolved entry of a compiled model. This is how
    /// hosts seed a [`Catalog`](crate::catalog::Catalog) with the definitions
    /// they were built from.
    pub fn from_model(name: impl Into<String>, model: &Model) -> Self {
        let name = name.into();
        let units = model
            .units
            .iter()
            .filter_map(|u| UnitDescriptor::from_unit(u, &name))
            .collect();
        let scales = model
            .scales
            .iter()
            .filter_map(|s| ScaleDescriptor::from_scale(model, s, &name))
            .collect();
        Self::from_descriptors(name, units, scales)
    }
}

pub trait ModuleBuilder: Send + Sync {
    /// Compile the generated source of a late module.
    fn build(&self, request: &BuildRequest) -> Result<ModuleArtifact, Diagnostics>;

    /// Materialize the types of a built module.
    fn load(&self, artifact: &ModuleArtifact) -> Result<LoadedModule, Diagnostics>;
}

/// Builder for hosts without runtime code loading: the loaded handles are the
/// descriptors themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorBuilder;

impl DescriptorBuilder {
    fn check(module: &str, units: &[UnitDescriptor], scales: &[ScaleDescriptor]) -> Diagnostics {
        let mut diagnostics = Diagnostics::for_source(module);
        let foreign = units
            .iter()
            .map(|u| (&u.name, &u.module))
            .chain(scales.iter().map(|s| (&s.name, &s.module)))
            .filter(|(_, owner)| owner.as_str() != module);
        for (name, owner) in foreign {
            diagnostics.push(Diagnostic::error(
                Stage::Backend,
                format!("'{}' belongs to module '{}', not '{}'", name, owner, module),
            ));
        }
        diagnostics
    }
}

impl ModuleBuilder for DescriptorBuilder {
    fn build(&self, request: &BuildRequest) -> Result<ModuleArtifact, Diagnostics> {
        let diagnostics = Self::check(&request.module, &request.units, &request.scales);
        if diagnostics.has_errors() {
            return Err(diagnostics);
        }
        Ok(ModuleArtifact {
            module: request.module.clone(),
            source: request.source.clone(),
            references: request.references.clone(),
            units: request.units.clone(),
            scales: request.scales.clone(),
        })
    }

    fn load(&self, artifact: &ModuleArtifact) -> Result<LoadedModule, Diagnostics> {
        let diagnostics = Self::check(&artifact.module, &artifact.units, &artifact.scales);
        if diagnostics.has_errors() {
            return Err(diagnostics);
        }
        Ok(LoadedModule::from_descriptors(
            artifact.module.clone(),
            artifact.units.clone(),
            artifact.scales.clone(),
        ))
    }
}
