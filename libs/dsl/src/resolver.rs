//! Family, relative and outer-operation resolution
//!
//! Runs once over the whole model after elaboration:
//! 1. unit families by dimension, then scale families by reference point
//! 2. prime and relatives per family, with each relative's conversion factor
//! 3. outer operations over every ordered pair of units
//!
//! Invalid entries keep their place in the model but take no part in any step.

use std::collections::{BTreeMap, HashMap};

use crate::diagnostics::{Diagnostic, Diagnostics, Stage};
use crate::dimension::Dimension;
use crate::encoder::NumeralExpression;
use crate::model::{
    BinaryOperation, FamilyId, Model, Operand, Operator, ScaleId, UnitId, UnitType,
};
use crate::numeral::{Numeral, NumeralError, NumericKind};

const FACTOR_TOLERANCE: f64 = 1e-9;

/// Family id allocator shared by units and scales
struct Families {
    next: u32,
}

impl Families {
    fn fresh(&mut self) -> FamilyId {
        let id = FamilyId(self.next);
        self.next += 1;
        id
    }
}

pub(crate) fn resolve(model: &mut Model, first_family: u32, diagnostics: &mut Diagnostics) {
    let mut families = Families {
        next: model
            .max_family()
            .map_or(first_family, |max| first_family.max(max.0 + 1)),
    };

    assign_unit_families(model, &mut families);
    link_units(model, diagnostics);
    assign_scale_families(model, &mut families);
    link_scales(model);
    synthesize_operations(model);

    tracing::debug!(
        units = model.units.len(),
        scales = model.scales.len(),
        operations = model.operations.len(),
        next_family = families.next,
        "Resolved model"
    );
}

fn assign_unit_families(model: &mut Model, families: &mut Families) {
    let mut by_dimension: HashMap<Dimension, FamilyId> = HashMap::new();
    for unit in model.units.iter().filter(|u| u.valid) {
        if let Some(family) = unit.family {
            by_dimension.entry(unit.dimension.value).or_insert(family);
        }
    }

    for unit in model.units.iter_mut() {
        if !unit.valid || unit.family.is_some() {
            continue;
        }
        let dimension = unit.dimension.value;
        let family = match by_dimension.get(&dimension) {
            Some(family) if !unit.redeclared => *family,
            _ => {
                let family = families.fresh();
                if !unit.redeclared {
                    by_dimension.insert(dimension, family);
                }
                family
            }
        };
        unit.family = Some(family);
    }
}

fn relative_factor(unit: &UnitType, prime: &UnitType) -> Result<NumeralExpression, NumeralError> {
    let base = unit.kind.convert(&prime.factor.value)?;
    let value = unit.factor.value.checked_div(&base)?;
    let code = if unit.kind == prime.kind {
        format!("{}::FACTOR / {}::FACTOR", unit.name, prime.name)
    } else {
        value.literal()
    };
    Ok(NumeralExpression {
        is_true_constant: unit.factor.is_true_constant && prime.factor.is_true_constant,
        value,
        code,
    })
}

fn family_members<T>(
    entries: &[T],
    family: impl Fn(&T) -> Option<FamilyId>,
) -> BTreeMap<FamilyId, Vec<usize>> {
    let mut members: BTreeMap<FamilyId, Vec<usize>> = BTreeMap::new();
    for (index, entry) in entries.iter().enumerate() {
        if let Some(id) = family(entry) {
            members.entry(id).or_default().push(index);
        }
    }
    members
}

fn link_units(model: &mut Model, diagnostics: &mut Diagnostics) {
    let members = family_members(&model.units, |u| if u.valid { u.family } else { None });
    for indices in members.values() {
        let prime = indices[0];
        for &index in indices {
            let relative = if index == prime {
                None
            } else {
                match relative_factor(&model.units[index], &model.units[prime]) {
                    Ok(factor) => Some(factor),
                    Err(error) => {
                        let unit = &model.units[index];
                        let mut diagnostic = Diagnostic::error(
                            Stage::Semantic,
                            format!(
                                "Cannot relate '{}' to '{}': {}",
                                unit.name, model.units[prime].name, error
                            ),
                        );
                        if let Some(span) = unit.origin.span() {
                            diagnostic = diagnostic.with_span(span);
                        }
                        diagnostics.push(diagnostic);
                        None
                    }
                }
            };
            let unit = &mut model.units[index];
            unit.prime = (index != prime).then_some(UnitId(prime));
            unit.relatives = indices
                .iter()
                .filter(|&&other| other != index)
                .map(|&other| UnitId(other))
                .collect();
            unit.relative_factor = relative;
        }
    }
}

fn assign_scale_families(model: &mut Model, families: &mut Families) {
    let family_of_unit =
        |model: &Model, unit: Option<UnitId>| unit.and_then(|id| model.unit(id).family);

    let mut by_ref_point: HashMap<(String, FamilyId), FamilyId> = HashMap::new();
    for scale in model.scales.iter().filter(|s| s.valid) {
        if let (Some(family), Some(ref_point), Some(unit_family)) =
            (scale.family, &scale.ref_point, family_of_unit(model, scale.unit))
        {
            by_ref_point
                .entry((ref_point.clone(), unit_family))
                .or_insert(family);
        }
    }

    for index in 0..model.scales.len() {
        let scale = &model.scales[index];
        if !scale.valid || scale.family.is_some() {
            continue;
        }
        let Some(unit_family) = family_of_unit(model, scale.unit) else {
            continue;
        };
        let family = match &scale.ref_point {
            Some(ref_point) => *by_ref_point
                .entry((ref_point.clone(), unit_family))
                .or_insert_with(|| families.fresh()),
            None => families.fresh(),
        };
        model.scales[index].family = Some(family);
    }
}

fn link_scales(model: &mut Model) {
    let members = family_members(&model.scales, |s| if s.valid { s.family } else { None });
    for indices in members.values() {
        let prime = indices[0];
        for &index in indices {
            let scale = &mut model.scales[index];
            scale.prime = (index != prime).then_some(ScaleId(prime));
            scale.relatives = indices
                .iter()
                .filter(|&&other| other != index)
                .map(|&other| ScaleId(other))
                .collect();
        }
    }
}

/// Result unit for an operation whose value is `target`
fn pick_result(
    model: &Model,
    candidates: Option<&Vec<UnitId>>,
    target: Option<Numeral>,
) -> Option<UnitId> {
    let candidates = candidates?;
    if let Some(target) = target {
        let exact = candidates
            .iter()
            .find(|id| model.unit(**id).factor.value.approx_eq(&target, FACTOR_TOLERANCE));
        if exact.is_some() {
            return exact.copied();
        }
    }
    candidates
        .iter()
        .find(|id| model.unit(**id).is_prime())
        .or_else(|| candidates.first())
        .copied()
}

fn synthesize_operations(model: &mut Model) {
    model.operations.clear();
    for unit in model.units.iter_mut() {
        unit.operations.clear();
    }

    let candidates: Vec<UnitId> = model
        .unit_ids()
        .filter(|id| {
            let unit = model.unit(*id);
            unit.valid && unit.family.is_some() && !unit.is_dimensionless()
        })
        .collect();

    let mut by_dimension: HashMap<(Dimension, NumericKind), Vec<UnitId>> = HashMap::new();
    for &id in &candidates {
        let unit = model.unit(id);
        by_dimension
            .entry((unit.dimension.value, unit.kind))
            .or_default()
            .push(id);
    }

    let mut operations = Vec::new();
    for &l in &candidates {
        for &r in &candidates {
            let (lhs, rhs) = (model.unit(l), model.unit(r));
            if lhs.kind != rhs.kind {
                continue;
            }
            let kind = lhs.kind;

            match lhs.dimension.value.checked_mul(&rhs.dimension.value) {
                Ok(dimension) if dimension.is_dimensionless() => operations.push(BinaryOperation {
                    operator: Operator::Product,
                    lhs: Operand::Unit(l),
                    rhs: Operand::Unit(r),
                    result: Operand::Number(kind),
                }),
                Ok(dimension) => {
                    let target = lhs.factor.value.checked_mul(&rhs.factor.value).ok();
                    if let Some(result) = pick_result(model, by_dimension.get(&(dimension, kind)), target) {
                        operations.push(BinaryOperation {
                            operator: Operator::Product,
                            lhs: Operand::Unit(l),
                            rhs: Operand::Unit(r),
                            result: Operand::Unit(result),
                        });
                    }
                }
                Err(error) => {
                    tracing::debug!(lhs = %lhs.name, rhs = %rhs.name, %error, "Skipping product");
                }
            }

            if lhs.family == rhs.family {
                continue;
            }
            match lhs.dimension.value.checked_div(&rhs.dimension.value) {
                Ok(dimension) if dimension.is_dimensionless() => {}
                Ok(dimension) => {
                    let target = lhs.factor.value.checked_div(&rhs.factor.value).ok();
                    if let Some(result) = pick_result(model, by_dimension.get(&(dimension, kind)), target) {
                        operations.push(BinaryOperation {
                            operator: Operator::Quotient,
                            lhs: Operand::Unit(l),
                            rhs: Operand::Unit(r),
                            result: Operand::Unit(result),
                        });
                    }
                }
                Err(error) => {
                    tracing::debug!(lhs = %lhs.name, rhs = %rhs.name, %error, "Skipping quotient");
                }
            }
        }
    }

    for &r in &candidates {
        let rhs = model.unit(r);
        match rhs.dimension.value.checked_inv() {
            Ok(dimension) => {
                let target = rhs.one().checked_div(&rhs.factor.value).ok();
                if let Some(result) = pick_result(model, by_dimension.get(&(dimension, rhs.kind)), target) {
                    operations.push(BinaryOperation {
                        operator: Operator::Quotient,
                        lhs: Operand::Number(rhs.kind),
                        rhs: Operand::Unit(r),
                        result: Operand::Unit(result),
                    });
                }
            }
            Err(error) => {
                tracing::debug!(rhs = %rhs.name, %error, "Skipping reciprocal");
            }
        }
    }

    for (index, operation) in operations.iter().enumerate() {
        for operand in operation.operands() {
            if let Some(id) = operand.unit() {
                let participation = &mut model.units[id.0].operations;
                if participation.last() != Some(&index) {
                    participation.push(index);
                }
            }
        }
    }
    model.operations = operations;
}
