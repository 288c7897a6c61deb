//! Unit and scale descriptors
//!
//! A descriptor is everything the compiler needs to know about a unit or
//! scale that already exists in the process. Hosts expose their compiled
//! types through [`UnitHandle`] / [`ScaleHandle`], and the catalog stores
//! handles rather than concrete types.

use std::fmt;
use std::sync::Arc;

use metrum_dsl::{Dimension, FamilyId, Model, Numeral, NumericKind, Origin, ScaleType, UnitType};
use serde::{Deserialize, Serialize};

fn constant() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    pub name: String,
    /// Module the unit was materialized in
    pub module: String,
    pub kind: NumericKind,
    pub dimension: Dimension,
    pub factor: Numeral,
    /// `false` when the factor is a placeholder for a symbolic value
    #[serde(default = "constant")]
    pub constant: bool,
    pub format: String,
    pub tags: Vec<String>,
    pub family: FamilyId,
}

impl UnitDescriptor {
    /// Descriptor of a resolved unit materialized in `module`. `None` for a
    /// unit that did not resolve.
    pub fn from_unit(unit: &UnitType, module: &str) -> Option<Self> {
        if !unit.valid {
            return None;
        }
        Some(Self {
            name: unit.name.clone(),
            module: module.to_string(),
            kind: unit.kind,
            dimension: unit.dimension.value,
            factor: unit.factor.value,
            constant: unit.factor.is_true_constant,
            format: unit.format.clone(),
            tags: unit.tags.clone(),
            family: unit.family?,
        })
    }

    pub fn symbol(&self) -> &str {
        self.tags.first().map(String::as_str).unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleDescriptor {
    pub name: String,
    pub module: String,
    pub unit: String,
    /// Module owning `unit`
    pub unit_module: String,
    pub offset: Numeral,
    /// `None` for scales declared without a reference point
    pub ref_point: Option<String>,
    pub format: String,
    pub family: FamilyId,
}

impl ScaleDescriptor {
    /// Descriptor of a resolved scale materialized in `module`. A decompiled
    /// unit keeps its own module; every other unit is assumed to live in
    /// `module` too.
    pub fn from_scale(model: &Model, scale: &ScaleType, module: &str) -> Option<Self> {
        if !scale.valid {
            return None;
        }
        let unit = model.unit(scale.unit?);
        let unit_module = match &unit.origin {
            Origin::Decompiled { module } => module.clone(),
            Origin::Declared { .. } => module.to_string(),
        };
        Some(Self {
            name: scale.name.clone(),
            module: module.to_string(),
            unit: unit.name.clone(),
            unit_module,
            offset: scale.offset.value,
            ref_point: scale.ref_point.clone(),
            format: scale.format.clone(),
            family: scale.family?,
        })
    }
}

/// A compiled unit type as seen by the late-binding loader
pub trait UnitHandle: fmt::Debug + Send + Sync {
    fn descriptor(&self) -> &UnitDescriptor;
}

/// A compiled scale type as seen by the late-binding loader
pub trait ScaleHandle: fmt::Debug + Send + Sync {
    fn descriptor(&self) -> &ScaleDescriptor;
}

impl UnitHandle for UnitDescriptor {
    fn descriptor(&self) -> &UnitDescriptor {
        self
    }
}

impl ScaleHandle for ScaleDescriptor {
    fn descriptor(&self) -> &ScaleDescriptor {
        self
    }
}

pub type UnitRef = Arc<dyn UnitHandle>;
pub type ScaleRef = Arc<dyn ScaleHandle>;
