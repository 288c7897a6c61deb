//! Decompilation
//!
//! Rebuilds model entries from the descriptors of already materialized units
//! and scales, so the resolver sees compiled and late entries alike.

use std::collections::HashMap;

use metrum_dsl::{
    DimensionalExpression, FamilyId, Model, NumeralExpression, ScaleType, UnitId, UnitType,
};

use crate::descriptor::{ScaleRef, UnitRef};
use crate::error::{LoadError, Result};

/// Decompiled catalog contents
#[derive(Debug, Clone)]
pub struct Decompiled {
    pub model: Model,
    pub max_family: Option<FamilyId>,
}

impl Decompiled {
    /// First id available to a new family
    pub fn next_family(&self) -> u32 {
        self.max_family.map_or(0, |family| family.0 + 1)
    }
}

pub fn decompile(units: &[UnitRef], scales: &[ScaleRef]) -> Result<Decompiled> {
    let mut model = Model::new();
    let mut ids: HashMap<(&str, &str), UnitId> = HashMap::new();

    for handle in units {
        let descriptor = handle.descriptor();
        if descriptor.factor.kind() != descriptor.kind {
            return Err(LoadError::Decompile {
                name: descriptor.name.clone(),
                message: format!(
                    "factor is {}, expected {}",
                    descriptor.factor.kind(),
                    descriptor.kind
                ),
            });
        }
        if descriptor.factor.is_zero() {
            return Err(LoadError::Decompile {
                name: descriptor.name.clone(),
                message: "zero conversion factor".to_string(),
            });
        }

        let mut unit = UnitType::decompiled(
            &descriptor.name,
            &descriptor.module,
            descriptor.kind,
            DimensionalExpression {
                value: descriptor.dimension,
                code: format!("{}::DIMENSION", descriptor.name),
            },
            NumeralExpression {
                is_true_constant: descriptor.constant,
                value: descriptor.factor,
                code: format!("{}::FACTOR", descriptor.name),
            },
        );
        unit.format = descriptor.format.clone();
        unit.tags = descriptor.tags.clone();
        unit.family = Some(descriptor.family);

        let id = model.push_unit(unit);
        ids.insert((descriptor.module.as_str(), descriptor.name.as_str()), id);
    }

    for handle in scales {
        let descriptor = handle.descriptor();
        let unit = ids
            .get(&(descriptor.unit_module.as_str(), descriptor.unit.as_str()))
            .copied()
            .ok_or_else(|| LoadError::Decompile {
                name: descriptor.name.clone(),
                message: format!(
                    "unknown unit '{}' of module '{}'",
                    descriptor.unit, descriptor.unit_module
                ),
            })?;
        let unit_kind = model.unit(unit).kind;
        if descriptor.offset.kind() != unit_kind {
            return Err(LoadError::Decompile {
                name: descriptor.name.clone(),
                message: format!(
                    "offset is {}, expected {}",
                    descriptor.offset.kind(),
                    unit_kind
                ),
            });
        }

        let mut scale = ScaleType::decompiled(
            &descriptor.name,
            &descriptor.module,
            unit,
            NumeralExpression {
                is_true_constant: true,
                value: descriptor.offset,
                code: format!("{}::OFFSET", descriptor.name),
            },
            descriptor.ref_point.clone(),
        );
        scale.format = descriptor.format.clone();
        scale.family = Some(descriptor.family);
        model.push_scale(scale);
    }

    let max_family = model.max_family();
    tracing::debug!(
        units = model.units.len(),
        scales = model.scales.len(),
        max_family = ?max_family,
        "Decompiled catalog"
    );
    Ok(Decompiled { model, max_family })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ScaleDescriptor, UnitDescriptor};
    use metrum_dsl::{Dimension, Numeral, NumericKind, Origin};
    use std::sync::Arc;

    fn meter() -> UnitDescriptor {
        UnitDescriptor {
            name: "Meter".into(),
            module: "si".into(),
            kind: NumericKind::Double,
            dimension: Dimension::new([1, 0, 0, 0, 0, 0, 0, 0, 0]),
            factor: Numeral::Double(1.0),
            constant: true,
            format: "{0} {1}".into(),
            tags: vec!["m".into()],
            family: FamilyId(2),
        }
    }

    #[test]
    fn test_decompile_keeps_descriptors() {
        let units: Vec<UnitRef> = vec![Arc::new(meter())];
        let scales: Vec<ScaleRef> = vec![Arc::new(ScaleDescriptor {
            name: "Height".into(),
            module: "si".into(),
            unit: "Meter".into(),
            unit_module: "si".into(),
            offset: Numeral::Double(0.0),
            ref_point: None,
            format: "{0} {1}".into(),
            family: FamilyId(5),
        })];

        let decompiled = decompile(&units, &scales).unwrap();
        assert_eq!(decompiled.max_family, Some(FamilyId(5)));
        assert_eq!(decompiled.next_family(), 6);

        let unit = &decompiled.model.units[0];
        assert_eq!(unit.origin, Origin::Decompiled { module: "si".into() });
        assert_eq!(unit.factor.code, "Meter::FACTOR");
        assert_eq!(unit.family, Some(FamilyId(2)));
        assert!(unit.valid);

        let scale = &decompiled.model.scales[0];
        assert_eq!(scale.unit, Some(UnitId(0)));
        assert!(scale.is_ref_point_normalized());
    }

    #[test]
    fn test_kind_mismatch_fails() {
        let mut bad = meter();
        bad.factor = Numeral::Float(1.0);
        let units: Vec<UnitRef> = vec![Arc::new(bad)];

        let err = decompile(&units, &[]).unwrap_err();
        assert_eq!(err.to_string(), "Cannot decompile 'Meter': factor is float, expected double");
    }

    #[test]
    fn test_scale_of_unknown_unit_fails() {
        let scales: Vec<ScaleRef> = vec![Arc::new(ScaleDescriptor {
            name: "Height".into(),
            module: "si".into(),
            unit: "Meter".into(),
            unit_module: "si".into(),
            offset: Numeral::Double(0.0),
            ref_point: None,
            format: String::new(),
            family: FamilyId(0),
        })];
        assert!(matches!(
            decompile(&[], &scales),
            Err(LoadError::Decompile { name, .. }) if name == "Height"
        ));
    }
}
