//! Late-binding loader
//!
//! Extends a [`Catalog`] with units and scales declared after the host was
//! built:
//!
//! 1. decompile the catalog into a model,
//! 2. compile the late text on top of it (families continue past the
//!    catalog's highest id),
//! 3. generate source for the late entries only,
//! 4. build, load and store the module,
//! 5. publish it into the catalog.
//!
//! The whole sequence runs under the catalog's load lock, and the catalog is
//! only touched by the final step.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use heck::ToSnakeCase;
use metrum_codegen::generators::rust::RustGenerator;
use metrum_codegen::generators::{Generator, GeneratorConfig};
use metrum_codegen::view::ModelView;
use metrum_dsl::{extend, CompileOptions, Diagnostics, FamilyId, Model, RedeclarationPolicy};
use tracing::{debug, info, warn};

use crate::builder::{BuildRequest, ModuleArtifact, ModuleBuilder};
use crate::catalog::Catalog;
use crate::decompile::decompile;
use crate::descriptor::{ScaleDescriptor, UnitDescriptor};
use crate::error::{LoadError, Result};
use crate::store::ModuleStore;

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Prefix of generated module names
    pub module_prefix: String,
    /// Modules handed to the builder as references next to the catalog's own
    pub references: Vec<String>,
    pub redeclaration: RedeclarationPolicy,
    pub generator: GeneratorConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            module_prefix: "late".to_string(),
            references: Vec::new(),
            redeclaration: RedeclarationPolicy::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

/// Cooperative cancellation for a late load
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        Ok(())
    }
}

/// Outcome of a successful late load
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub module: String,
    pub units: Vec<String>,
    pub scales: Vec<String>,
    /// The module came from the store instead of being rebuilt
    pub from_cache: bool,
    /// Warnings reported while compiling
    pub diagnostics: Diagnostics,
}

pub struct LateLoader<'c> {
    catalog: &'c Catalog,
    builder: Box<dyn ModuleBuilder>,
    store: Option<Box<dyn ModuleStore>>,
    config: LoaderConfig,
}

impl<'c> LateLoader<'c> {
    pub fn new(catalog: &'c Catalog, builder: impl ModuleBuilder + 'static, config: LoaderConfig) -> Self {
        Self {
            catalog,
            builder: Box::new(builder),
            store: None,
            config,
        }
    }

    /// Persist built modules and reuse them while they are fresh.
    pub fn with_store(mut self, store: impl ModuleStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load late definitions from a file, reusing the stored module when the
    /// file has not changed since it was built.
    pub fn load_file(&self, path: &Path, cancel: &CancellationToken) -> Result<LoadReport> {
        let _guard = self.catalog.lock_loads();

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_snake_case())
            .unwrap_or_default();
        let module = format!("{}_{}", self.config.module_prefix, stem);
        if self.catalog.contains_module(&module) {
            return Err(LoadError::DuplicateModule(module));
        }

        if let Some(store) = &self.store {
            if store.is_fresh(path, &module)? {
                let artifact = store.read(&module)?;
                match stale_reason(&artifact, &module, self.catalog, &self.config.references) {
                    None => return self.publish_cached(path, artifact),
                    Some(reason) => info!(
                        module = %module,
                        reason = %reason,
                        "Stored module does not fit the catalog, rebuilding"
                    ),
                }
            }
        }

        let text = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
        self.compile_and_publish(&text, &path.display().to_string(), module, true, cancel)
    }

    /// Load late definitions from a string. The module is not stored, so it
    /// is rebuilt on every run.
    pub fn load_str(&self, text: &str, cancel: &CancellationToken) -> Result<LoadReport> {
        let _guard = self.catalog.lock_loads();

        let taken = self.catalog.modules();
        let module = (taken.len()..)
            .map(|n| format!("{}_{}", self.config.module_prefix, n))
            .find(|name| !taken.contains(name))
            .unwrap_or_else(|| self.config.module_prefix.clone());

        self.compile_and_publish(text, "<definitions string>", module, false, cancel)
    }

    fn publish_cached(&self, path: &Path, artifact: ModuleArtifact) -> Result<LoadReport> {
        let module = artifact.module.clone();
        let loaded = self
            .builder
            .load(&artifact)
            .map_err(|diagnostics| LoadError::Build {
                module: module.clone(),
                diagnostics,
            })?;

        let report = LoadReport {
            module: module.clone(),
            units: artifact.units.iter().map(|u| u.name.clone()).collect(),
            scales: artifact.scales.iter().map(|s| s.name.clone()).collect(),
            from_cache: true,
            diagnostics: Diagnostics::new(),
        };
        self.catalog.append(loaded);
        info!(
            module = %module,
            path = %path.display(),
            units = report.units.len(),
            scales = report.scales.len(),
            "Loaded late module from store"
        );
        Ok(report)
    }

    fn compile_and_publish(
        &self,
        text: &str,
        source: &str,
        module: String,
        persist: bool,
        cancel: &CancellationToken,
    ) -> Result<LoadReport> {
        let decompiled = decompile(&self.catalog.units(), &self.catalog.scales())?;
        let options = CompileOptions {
            first_family: decompiled.next_family(),
            redeclaration: self.config.redeclaration,
            source: Some(source.to_string()),
            ..CompileOptions::default()
        };

        let compilation = extend(decompiled.model, text, &options)?;
        if !compilation.is_success() {
            return Err(LoadError::Definitions(compilation.diagnostics));
        }
        let model = compilation.model;
        if model.late_units() == model.units.len() && model.late_scales() == model.scales.len() {
            return Err(LoadError::Empty);
        }
        for diagnostic in compilation.diagnostics.iter() {
            warn!(source, "{}", diagnostic);
        }

        let view = ModelView::late(&model);
        let generator = RustGenerator::new(GeneratorConfig {
            module_name: module.clone(),
            ..self.config.generator.clone()
        });
        let bundle = generator
            .generate(&view)
            .map_err(|e| LoadError::Generate(format!("{:#}", e)))?;
        debug!(module = %module, files = bundle.files.len(), "Generated late module");
        cancel.check()?;

        let (units, scales) = late_descriptors(&model, &module);
        let mut references = self.config.references.clone();
        for name in view.externals.iter().filter_map(|u| u.module.as_ref()) {
            if !references.contains(name) {
                references.push(name.clone());
            }
        }
        let request = BuildRequest {
            module: module.clone(),
            source: bundle.merged(),
            references,
            units,
            scales,
        };

        let build_error = |diagnostics| LoadError::Build {
            module: module.clone(),
            diagnostics,
        };
        let artifact = self.builder.build(&request).map_err(build_error)?;
        let loaded = self.builder.load(&artifact).map_err(build_error)?;

        cancel.check()?;
        if persist {
            if let Some(store) = &self.store {
                store.write(&module, &artifact)?;
            }
        }

        let report = LoadReport {
            module: module.clone(),
            units: request.units.iter().map(|u| u.name.clone()).collect(),
            scales: request.scales.iter().map(|s| s.name.clone()).collect(),
            from_cache: false,
            diagnostics: compilation.diagnostics,
        };
        self.catalog.append(loaded);
        info!(
            module = %module,
            source,
            units = report.units.len(),
            scales = report.scales.len(),
            "Published late module"
        );
        Ok(report)
    }
}

/// Why a stored artifact can no longer be published into `catalog`.
///
/// Every referenced module must be loaded. A stored family id must either
/// be past the catalog's highest id, in which case no existing family may
/// have claimed its members, or name a catalog family of the same dimension
/// (units) or reference point and unit family (scales).
fn stale_reason(
    artifact: &ModuleArtifact,
    module: &str,
    catalog: &Catalog,
    host_references: &[String],
) -> Option<String> {
    if artifact.module != module {
        return Some(format!("stored as module '{}'", artifact.module));
    }

    let modules = catalog.modules();
    if let Some(missing) = artifact
        .references
        .iter()
        .find(|r| !host_references.contains(r) && !modules.contains(r))
    {
        return Some(format!("module '{}' is not loaded", missing));
    }

    let unit_refs = catalog.units();
    let scale_refs = catalog.scales();
    let units: Vec<&UnitDescriptor> = unit_refs.iter().map(|u| u.descriptor()).collect();
    let scales: Vec<&ScaleDescriptor> = scale_refs.iter().map(|s| s.descriptor()).collect();
    let max_family = catalog.max_family();
    let is_new = |family: FamilyId| max_family.map_or(true, |max| family > max);

    for unit in &artifact.units {
        if is_new(unit.family) {
            let redeclares = artifact
                .units
                .iter()
                .filter(|u| u.family == unit.family)
                .any(|u| units.iter().any(|c| c.name == u.name));
            if !redeclares && units.iter().any(|c| c.dimension == unit.dimension) {
                return Some(format!("unit '{}' belongs to an existing family", unit.name));
            }
        } else {
            let members: Vec<&UnitDescriptor> = units
                .iter()
                .copied()
                .filter(|c| c.family == unit.family)
                .collect();
            if members.is_empty()
                || members.iter().any(|c| c.dimension != unit.dimension)
                || scales.iter().any(|s| s.family == unit.family)
            {
                return Some(format!(
                    "family {} of unit '{}' is allocated differently",
                    unit.family, unit.name
                ));
            }
        }
    }

    let unit_family = |name: &str, owner: &str| {
        artifact
            .units
            .iter()
            .chain(units.iter().copied())
            .find(|u| u.name == name && u.module == owner)
            .map(|u| u.family)
    };
    for scale in &artifact.scales {
        let Some(family_of_unit) = unit_family(&scale.unit, &scale.unit_module) else {
            return Some(format!(
                "unit '{}' of scale '{}' is not loaded",
                scale.unit, scale.name
            ));
        };
        let shares_reference = |other: &ScaleDescriptor| {
            other.ref_point.is_some()
                && other.ref_point == scale.ref_point
                && unit_family(&other.unit, &other.unit_module) == Some(family_of_unit)
        };

        if is_new(scale.family) {
            if scales.iter().any(|&s| shares_reference(s)) {
                return Some(format!("scale '{}' belongs to an existing family", scale.name));
            }
        } else {
            let members: Vec<&ScaleDescriptor> = scales
                .iter()
                .copied()
                .filter(|s| s.family == scale.family)
                .collect();
            if members.is_empty()
                || !members.iter().all(|&s| shares_reference(s))
                || units.iter().any(|u| u.family == scale.family)
            {
                return Some(format!(
                    "family {} of scale '{}' is allocated differently",
                    scale.family, scale.name
                ));
            }
        }
    }

    None
}

/// Descriptors of the valid late entries, owned by `module`
fn late_descriptors(model: &Model, module: &str) -> (Vec<UnitDescriptor>, Vec<ScaleDescriptor>) {
    let units = model.units[model.late_units()..]
        .iter()
        .filter_map(|u| UnitDescriptor::from_unit(u, module))
        .collect();
    let scales = model.scales[model.late_scales()..]
        .iter()
        .filter_map(|s| ScaleDescriptor::from_scale(model, s, module))
        .collect();
    (units, scales)
}
