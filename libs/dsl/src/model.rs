//! Resolved model
//!
//! The model owns every unit and scale of one compilation in a flat arena.
//! Cross references (prime, relatives, operation operands, a scale's unit) are
//! indices into that arena. On the late path the arena starts with the
//! decompiled entries; everything from [`Model::late_units`] onwards was
//! declared by the late text.

use std::fmt;

use crate::encoder::{DimensionalExpression, NumeralExpression};
use crate::numeral::{Numeral, NumericKind};
use crate::token::Span;

/// Label shown for scales declared without a reference point
pub const COMMON_REFERENCE_POINT: &str = "<common reference point>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScaleId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct FamilyId(pub u32);

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an entry came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Parsed from the definitions text of this compilation
    Declared { span: Span },
    /// Reconstructed from an already materialized module
    Decompiled { module: String },
}

impl Origin {
    pub fn span(&self) -> Option<Span> {
        match self {
            Origin::Declared { span } => Some(*span),
            Origin::Decompiled { .. } => None,
        }
    }

    pub fn is_decompiled(&self) -> bool {
        matches!(self, Origin::Decompiled { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitType {
    pub name: String,
    pub origin: Origin,
    pub kind: NumericKind,
    pub dimension: DimensionalExpression,
    pub factor: NumeralExpression,
    pub format: String,
    /// Symbol tags; the first one is the default symbol
    pub tags: Vec<String>,
    pub family: Option<FamilyId>,
    /// First member of the family; `None` for the prime itself
    pub prime: Option<UnitId>,
    /// `factor / prime.factor`, set on every non-prime member
    pub relative_factor: Option<NumeralExpression>,
    pub relatives: Vec<UnitId>,
    /// Indices into [`Model::operations`]
    pub operations: Vec<usize>,
    /// Reuses the name of a decompiled unit and must not join its family
    pub redeclared: bool,
    pub valid: bool,
}

impl UnitType {
    /// Unit with no derived fields yet, as materialized by a host module.
    pub fn decompiled(
        name: impl Into<String>,
        module: impl Into<String>,
        kind: NumericKind,
        dimension: DimensionalExpression,
        factor: NumeralExpression,
    ) -> Self {
        Self {
            name: name.into(),
            origin: Origin::Decompiled {
                module: module.into(),
            },
            kind,
            dimension,
            factor,
            format: String::new(),
            tags: Vec::new(),
            family: None,
            prime: None,
            relative_factor: None,
            relatives: Vec::new(),
            operations: Vec::new(),
            redeclared: false,
            valid: true,
        }
    }

    pub(crate) fn pending(name: &str, span: Span, kind: NumericKind) -> Self {
        Self {
            name: name.to_string(),
            origin: Origin::Declared { span },
            kind,
            dimension: DimensionalExpression::dimensionless(),
            factor: NumeralExpression::constant(kind.one()),
            format: String::new(),
            tags: Vec::new(),
            family: None,
            prime: None,
            relative_factor: None,
            relatives: Vec::new(),
            operations: Vec::new(),
            redeclared: false,
            valid: false,
        }
    }

    pub fn one(&self) -> Numeral {
        self.kind.one()
    }

    pub fn zero(&self) -> Numeral {
        self.kind.zero()
    }

    pub fn symbol(&self) -> &str {
        self.tags.first().map(String::as_str).unwrap_or(&self.name)
    }

    pub fn is_prime(&self) -> bool {
        self.family.is_some() && self.prime.is_none()
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dimension.value.is_dimensionless()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScaleType {
    pub name: String,
    pub origin: Origin,
    /// `None` only on invalid scales whose unit did not resolve
    pub unit: Option<UnitId>,
    pub offset: NumeralExpression,
    /// Declared reference point; `None` puts the scale in a family of its own
    pub ref_point: Option<String>,
    pub format: String,
    pub family: Option<FamilyId>,
    pub prime: Option<ScaleId>,
    pub relatives: Vec<ScaleId>,
    pub valid: bool,
}

impl ScaleType {
    pub fn decompiled(
        name: impl Into<String>,
        module: impl Into<String>,
        unit: UnitId,
        offset: NumeralExpression,
        ref_point: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            origin: Origin::Decompiled {
                module: module.into(),
            },
            unit: Some(unit),
            offset,
            ref_point,
            format: String::new(),
            family: None,
            prime: None,
            relatives: Vec::new(),
            valid: true,
        }
    }

    pub fn ref_point_label(&self) -> &str {
        self.ref_point.as_deref().unwrap_or(COMMON_REFERENCE_POINT)
    }

    /// Whether the reference point was filled in for an omitted one
    pub fn is_ref_point_normalized(&self) -> bool {
        self.ref_point.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Operator {
    Product,
    Quotient,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Product => "*",
            Operator::Quotient => "/",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One side of a binary operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Unit(UnitId),
    /// Built-in numeric type
    Number(NumericKind),
}

impl Operand {
    pub fn unit(&self) -> Option<UnitId> {
        match self {
            Operand::Unit(id) => Some(*id),
            Operand::Number(_) => None,
        }
    }
}

/// A synthesized `lhs operator rhs -> result` overload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BinaryOperation {
    pub operator: Operator,
    pub lhs: Operand,
    pub rhs: Operand,
    pub result: Operand,
}

impl BinaryOperation {
    pub fn operands(&self) -> [Operand; 3] {
        [self.lhs, self.rhs, self.result]
    }
}

/// Arena of all units, scales and operations of a compilation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    pub units: Vec<UnitType>,
    pub scales: Vec<ScaleType>,
    pub operations: Vec<BinaryOperation>,
    late_units: usize,
    late_scales: usize,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_unit(&mut self, unit: UnitType) -> UnitId {
        self.units.push(unit);
        UnitId(self.units.len() - 1)
    }

    pub fn push_scale(&mut self, scale: ScaleType) -> ScaleId {
        self.scales.push(scale);
        ScaleId(self.scales.len() - 1)
    }

    /// Everything pushed from now on counts as late.
    pub fn begin_late(&mut self) {
        self.late_units = self.units.len();
        self.late_scales = self.scales.len();
    }

    /// Index of the first late unit
    pub fn late_units(&self) -> usize {
        self.late_units
    }

    /// Index of the first late scale
    pub fn late_scales(&self) -> usize {
        self.late_scales
    }

    pub fn is_late_unit(&self, id: UnitId) -> bool {
        id.0 >= self.late_units
    }

    pub fn is_late_scale(&self, id: ScaleId) -> bool {
        id.0 >= self.late_scales
    }

    pub fn unit(&self, id: UnitId) -> &UnitType {
        &self.units[id.0]
    }

    pub fn scale(&self, id: ScaleId) -> &ScaleType {
        &self.scales[id.0]
    }

    pub fn unit_ids(&self) -> impl Iterator<Item = UnitId> {
        (0..self.units.len()).map(UnitId)
    }

    pub fn scale_ids(&self) -> impl Iterator<Item = ScaleId> {
        (0..self.scales.len()).map(ScaleId)
    }

    /// Last unit with this name, so late units shadow decompiled ones.
    pub fn find_unit(&self, name: &str) -> Option<UnitId> {
        self.units.iter().rposition(|u| u.name == name).map(UnitId)
    }

    pub fn find_scale(&self, name: &str) -> Option<ScaleId> {
        self.scales.iter().rposition(|s| s.name == name).map(ScaleId)
    }

    pub fn find_unit_by_tag(&self, tag: &str) -> Option<UnitId> {
        self.units
            .iter()
            .rposition(|u| u.tags.iter().any(|t| t == tag))
            .map(UnitId)
    }

    /// Members of a unit family in declaration order
    pub fn family_units(&self, family: FamilyId) -> impl Iterator<Item = UnitId> + '_ {
        self.unit_ids()
            .filter(move |id| self.unit(*id).family == Some(family))
    }

    pub fn family_scales(&self, family: FamilyId) -> impl Iterator<Item = ScaleId> + '_ {
        self.scale_ids()
            .filter(move |id| self.scale(*id).family == Some(family))
    }

    pub fn operations_of(&self, id: UnitId) -> impl Iterator<Item = &BinaryOperation> + '_ {
        self.unit(id).operations.iter().map(|i| &self.operations[*i])
    }

    /// Highest family id in use by any unit or scale
    pub fn max_family(&self) -> Option<FamilyId> {
        self.units
            .iter()
            .filter_map(|u| u.family)
            .chain(self.scales.iter().filter_map(|s| s.family))
            .max()
    }
}
