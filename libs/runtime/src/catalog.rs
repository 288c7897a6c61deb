//! Process-wide unit catalog
//!
//! The catalog starts out with the units and scales of the compiled
//! definitions (see [`Catalog::register`]) and only grows afterwards, through
//! the serialized late-binding path. Readers take snapshots and never block
//! a late load for longer than one append.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use metrum_dsl::FamilyId;
use once_cell::sync::Lazy;

use crate::builder::LoadedModule;
use crate::descriptor::{ScaleRef, UnitRef};
use crate::error::{LoadError, Result};

static GLOBAL: Lazy<Catalog> = Lazy::new(Catalog::new);

#[derive(Debug, Default)]
struct CatalogState {
    units: Vec<UnitRef>,
    scales: Vec<ScaleRef>,
    modules: Vec<String>,
}

/// Registry of every known unit and scale
#[derive(Debug, Default)]
pub struct Catalog {
    state: RwLock<CatalogState>,
    /// Serializes decompile, merge and publish of late loads
    loads: Mutex<()>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog shared by the whole process
    pub fn global() -> &'static Catalog {
        &GLOBAL
    }

    // Entries are only ever appended, so a poisoned lock still guards a
    // consistent state.
    fn read(&self) -> RwLockReadGuard<'_, CatalogState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock_loads(&self) -> MutexGuard<'_, ()> {
        self.loads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed the catalog with a compiled module.
    pub fn register(&self, module: LoadedModule) -> Result<()> {
        let _guard = self.lock_loads();
        if self.contains_module(&module.name) {
            return Err(LoadError::DuplicateModule(module.name));
        }
        self.append(module);
        Ok(())
    }

    /// Publish a module in one step. The caller holds the load lock and has
    /// checked the module name.
    pub(crate) fn append(&self, module: LoadedModule) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(
            module = %module.name,
            units = module.units.len(),
            scales = module.scales.len(),
            "Catalog append"
        );
        state.units.extend(module.units);
        state.scales.extend(module.scales);
        state.modules.push(module.name);
    }

    pub fn units(&self) -> Vec<UnitRef> {
        self.read().units.clone()
    }

    pub fn scales(&self) -> Vec<ScaleRef> {
        self.read().scales.clone()
    }

    pub fn modules(&self) -> Vec<String> {
        self.read().modules.clone()
    }

    pub fn contains_module(&self, name: &str) -> bool {
        self.read().modules.iter().any(|m| m == name)
    }

    pub fn is_empty(&self) -> bool {
        let state = self.read();
        state.units.is_empty() && state.scales.is_empty()
    }

    /// Unit by name; a later module shadows an earlier one.
    pub fn unit(&self, name: &str) -> Option<UnitRef> {
        self.read()
            .units
            .iter()
            .rev()
            .find(|u| u.descriptor().name == name)
            .cloned()
    }

    pub fn unit_by_tag(&self, tag: &str) -> Option<UnitRef> {
        self.read()
            .units
            .iter()
            .rev()
            .find(|u| u.descriptor().tags.iter().any(|t| t == tag))
            .cloned()
    }

    pub fn scale(&self, name: &str) -> Option<ScaleRef> {
        self.read()
            .scales
            .iter()
            .rev()
            .find(|s| s.descriptor().name == name)
            .cloned()
    }

    /// Units of one family in registration order
    pub fn family_units(&self, family: FamilyId) -> Vec<UnitRef> {
        self.read()
            .units
            .iter()
            .filter(|u| u.descriptor().family == family)
            .cloned()
            .collect()
    }

    pub fn family_scales(&self, family: FamilyId) -> Vec<ScaleRef> {
        self.read()
            .scales
            .iter()
            .filter(|s| s.descriptor().family == family)
            .cloned()
            .collect()
    }

    /// Highest family id of any registered unit or scale
    pub fn max_family(&self) -> Option<FamilyId> {
        let state = self.read();
        state
            .units
            .iter()
            .map(|u| u.descriptor().family)
            .chain(state.scales.iter().map(|s| s.descriptor().family))
            .max()
    }
}
