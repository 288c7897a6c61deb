//! Model view
//!
//! Read-only snapshot of a resolved [`Model`] handed to generators. Arena
//! indices are replaced by names so a view can be serialized, diffed or fed
//! to a backend without access to the model it came from.

use std::collections::BTreeSet;
use std::fmt;

use metrum_dsl::{
    BinaryOperation, DimensionalExpression, FamilyId, Model, NumeralExpression, NumericKind,
    Operand, Operator, Origin, ScaleId, UnitId, UnitType,
};
use serde::{Deserialize, Serialize};

/// Units, scales and operations selected for one backend run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelView {
    /// Units the backend should emit
    pub units: Vec<UnitView>,
    /// Units referenced by emitted entries but owned by another module
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub externals: Vec<UnitView>,
    pub scales: Vec<ScaleView>,
    pub operations: Vec<OperationView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitView {
    pub name: String,
    /// Owning module for units materialized elsewhere
    pub module: Option<String>,
    pub kind: NumericKind,
    /// Rust type backing the unit
    pub numeric_type: String,
    pub one: String,
    pub zero: String,
    pub dimension: DimensionalExpression,
    pub factor: NumeralExpression,
    pub relative_factor: Option<NumeralExpression>,
    pub format: String,
    pub tags: Vec<String>,
    pub family: Option<FamilyId>,
    pub prime: Option<String>,
    pub relatives: Vec<String>,
    pub operations: Vec<OperationView>,
    pub valid: bool,
}

impl UnitView {
    pub fn symbol(&self) -> &str {
        self.tags.first().map(String::as_str).unwrap_or(&self.name)
    }

    pub fn is_prime(&self) -> bool {
        self.family.is_some() && self.prime.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleView {
    pub name: String,
    pub module: Option<String>,
    /// Owning unit; `None` when the scale failed to resolve
    pub unit: Option<String>,
    pub offset: NumeralExpression,
    pub ref_point: String,
    /// The reference point was omitted and filled in with the common one
    pub ref_point_normalized: bool,
    pub format: String,
    pub family: Option<FamilyId>,
    pub prime: Option<String>,
    pub relatives: Vec<String>,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperandView {
    /// Unit name, or the Rust type of a built-in number
    pub name: String,
    /// Owning module when the unit is not part of this view
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Built-in numeric type rather than a unit
    pub number: bool,
}

impl OperandView {
    /// Path to the operand type as seen from the generated module.
    pub fn path(&self) -> String {
        match &self.module {
            Some(module) => format!("{}::{}", module, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationView {
    pub operator: Operator,
    pub lhs: OperandView,
    pub rhs: OperandView,
    pub result: OperandView,
}

impl fmt::Display for OperationView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} -> {}",
            self.lhs.name, self.operator, self.rhs.name, self.result.name
        )
    }
}

impl ModelView {
    /// View of every entry in the model.
    pub fn full(model: &Model) -> Self {
        Self::select(model, |_| true, |_| true)
    }

    /// View of the late entries only: units and scales past the model's
    /// late offsets, plus the operations with at least one late participant.
    pub fn late(model: &Model) -> Self {
        Self::select(
            model,
            |id| model.is_late_unit(id),
            |id| model.is_late_scale(id),
        )
    }

    fn select(
        model: &Model,
        unit_selected: impl Fn(UnitId) -> bool,
        scale_selected: impl Fn(ScaleId) -> bool,
    ) -> Self {
        let operations: Vec<&BinaryOperation> = model
            .operations
            .iter()
            .filter(|op| {
                op.operands()
                    .iter()
                    .any(|operand| operand.unit().is_some_and(&unit_selected))
            })
            .collect();

        let units: Vec<UnitId> = model.unit_ids().filter(|id| unit_selected(*id)).collect();
        let scales: Vec<ScaleId> = model.scale_ids().filter(|id| scale_selected(*id)).collect();

        let mut referenced = BTreeSet::new();
        for op in &operations {
            referenced.extend(op.operands().iter().filter_map(Operand::unit));
        }
        for id in &units {
            let unit = model.unit(*id);
            referenced.extend(unit.prime);
            referenced.extend(unit.relatives.iter().copied());
        }
        for id in &scales {
            referenced.extend(model.scale(*id).unit);
        }
        let externals: Vec<UnitId> = referenced
            .into_iter()
            .filter(|id| !unit_selected(*id))
            .collect();

        let operand = |operand: Operand| operand_view(model, operand, &unit_selected);
        let operation = |op: &BinaryOperation| OperationView {
            operator: op.operator,
            lhs: operand(op.lhs),
            rhs: operand(op.rhs),
            result: operand(op.result),
        };
        let unit_view = |id: UnitId| {
            let participates: Vec<OperationView> = operations
                .iter()
                .filter(|op| op.operands().contains(&Operand::Unit(id)))
                .map(|op| operation(*op))
                .collect();
            build_unit(model, model.unit(id), participates)
        };

        Self {
            units: units.iter().map(|id| unit_view(*id)).collect(),
            externals: externals.iter().map(|id| unit_view(*id)).collect(),
            scales: scales.iter().map(|id| build_scale(model, *id)).collect(),
            operations: operations.iter().map(|op| operation(*op)).collect(),
        }
    }

    /// Emitted units first, then externals.
    pub fn unit(&self, name: &str) -> Option<&UnitView> {
        self.units
            .iter()
            .rev()
            .find(|u| u.name == name)
            .or_else(|| self.externals.iter().rev().find(|u| u.name == name))
    }

    /// Unit behind an operation operand, honoring its owning module.
    pub fn operand_unit(&self, operand: &OperandView) -> Option<&UnitView> {
        if operand.number {
            return None;
        }
        match &operand.module {
            Some(module) => self
                .externals
                .iter()
                .find(|u| u.name == operand.name && u.module.as_deref() == Some(module.as_str())),
            None => self.units.iter().rev().find(|u| u.name == operand.name),
        }
    }

    pub fn scale(&self, name: &str) -> Option<&ScaleView> {
        self.scales.iter().rev().find(|s| s.name == name)
    }

    pub fn is_emitted(&self, name: &str) -> bool {
        self.units.iter().any(|u| u.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.scales.is_empty()
    }
}

fn module_of(origin: &Origin) -> Option<String> {
    match origin {
        Origin::Decompiled { module } => Some(module.clone()),
        Origin::Declared { .. } => None,
    }
}

fn operand_view(model: &Model, operand: Operand, selected: impl Fn(UnitId) -> bool) -> OperandView {
    match operand {
        Operand::Unit(id) => {
            let unit = model.unit(id);
            OperandView {
                name: unit.name.clone(),
                module: if selected(id) {
                    None
                } else {
                    module_of(&unit.origin)
                },
                number: false,
            }
        }
        Operand::Number(kind) => OperandView {
            name: kind.rust_type().to_string(),
            module: None,
            number: true,
        },
    }
}

fn build_unit(model: &Model, unit: &UnitType, operations: Vec<OperationView>) -> UnitView {
    UnitView {
        name: unit.name.clone(),
        module: module_of(&unit.origin),
        kind: unit.kind,
        numeric_type: unit.kind.rust_type().to_string(),
        one: unit.one().literal(),
        zero: unit.zero().literal(),
        dimension: unit.dimension.clone(),
        factor: unit.factor.clone(),
        relative_factor: unit.relative_factor.clone(),
        format: unit.format.clone(),
        tags: unit.tags.clone(),
        family: unit.family,
        prime: unit.prime.map(|id| model.unit(id).name.clone()),
        relatives: unit
            .relatives
            .iter()
            .map(|id| model.unit(*id).name.clone())
            .collect(),
        operations,
        valid: unit.valid,
    }
}

fn build_scale(model: &Model, id: ScaleId) -> ScaleView {
    let scale = model.scale(id);
    ScaleView {
        name: scale.name.clone(),
        module: module_of(&scale.origin),
        unit: scale.unit.map(|unit| model.unit(unit).name.clone()),
        offset: scale.offset.clone(),
        ref_point: scale.ref_point_label().to_string(),
        ref_point_normalized: scale.is_ref_point_normalized(),
        format: scale.format.clone(),
        family: scale.family,
        prime: scale.prime.map(|prime| model.scale(prime).name.clone()),
        relatives: scale
            .relatives
            .iter()
            .map(|relative| model.scale(*relative).name.clone())
            .collect(),
        valid: scale.valid,
    }
}
