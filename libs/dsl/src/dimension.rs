//! Dimension vectors
//!
//! A dimension is a fixed tuple of small signed exponents, one per base
//! magnitude. Multiplying units adds their vectors, dividing subtracts them.
//! Every slot is an `i8`; arithmetic that leaves that range is an error
//! instead of wrapping around.

use std::fmt;
use std::ops::Index;

use phf::phf_map;
use thiserror::Error;

/// Number of base magnitudes.
pub const MAGNITUDE_COUNT: usize = 9;

/// Base magnitudes, in slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Magnitude {
    Length,
    Time,
    Mass,
    Temperature,
    ElectricCurrent,
    AmountOfSubstance,
    LuminousIntensity,
    Money,
    Other,
}

static MAGNITUDE_NAMES: phf::Map<&'static str, Magnitude> = phf_map! {
    "Length" => Magnitude::Length,
    "L" => Magnitude::Length,
    "Time" => Magnitude::Time,
    "T" => Magnitude::Time,
    "Mass" => Magnitude::Mass,
    "M" => Magnitude::Mass,
    "Temperature" => Magnitude::Temperature,
    "Θ" => Magnitude::Temperature,
    "K" => Magnitude::Temperature,
    "ElectricCurrent" => Magnitude::ElectricCurrent,
    "I" => Magnitude::ElectricCurrent,
    "AmountOfSubstance" => Magnitude::AmountOfSubstance,
    "N" => Magnitude::AmountOfSubstance,
    "LuminousIntensity" => Magnitude::LuminousIntensity,
    "J" => Magnitude::LuminousIntensity,
    "Money" => Magnitude::Money,
    "Currency" => Magnitude::Money,
    "Other" => Magnitude::Other,
    "X" => Magnitude::Other,
};

impl Magnitude {
    pub const ALL: [Magnitude; MAGNITUDE_COUNT] = [
        Magnitude::Length,
        Magnitude::Time,
        Magnitude::Mass,
        Magnitude::Temperature,
        Magnitude::ElectricCurrent,
        Magnitude::AmountOfSubstance,
        Magnitude::LuminousIntensity,
        Magnitude::Money,
        Magnitude::Other,
    ];

    /// Look up a magnitude by its full or short name (`Length`, `L`, ...).
    pub fn from_name(name: &str) -> Option<Magnitude> {
        MAGNITUDE_NAMES.get(name).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Magnitude::Length => "L",
            Magnitude::Time => "T",
            Magnitude::Mass => "M",
            Magnitude::Temperature => "K",
            Magnitude::ElectricCurrent => "I",
            Magnitude::AmountOfSubstance => "N",
            Magnitude::LuminousIntensity => "J",
            Magnitude::Money => "Money",
            Magnitude::Other => "X",
        }
    }

    /// Name of the matching constant on the generated `Dimension` type.
    pub fn constant_name(self) -> &'static str {
        match self {
            Magnitude::Length => "LENGTH",
            Magnitude::Time => "TIME",
            Magnitude::Mass => "MASS",
            Magnitude::Temperature => "TEMPERATURE",
            Magnitude::ElectricCurrent => "ELECTRIC_CURRENT",
            Magnitude::AmountOfSubstance => "AMOUNT_OF_SUBSTANCE",
            Magnitude::LuminousIntensity => "LUMINOUS_INTENSITY",
            Magnitude::Money => "MONEY",
            Magnitude::Other => "OTHER",
        }
    }
}

impl fmt::Display for Magnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DimensionError {
    #[error("Dimension overflow: exponent of {0} is out of range")]
    Overflow(Magnitude),
}

/// Exponent vector over the base magnitudes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dimension([i8; MAGNITUDE_COUNT]);

impl Dimension {
    pub const NONE: Dimension = Dimension([0; MAGNITUDE_COUNT]);

    pub const fn new(exponents: [i8; MAGNITUDE_COUNT]) -> Self {
        Dimension(exponents)
    }

    /// One-hot vector for a single magnitude.
    pub fn basic(magnitude: Magnitude) -> Self {
        let mut exponents = [0; MAGNITUDE_COUNT];
        exponents[magnitude.index()] = 1;
        Dimension(exponents)
    }

    pub fn exponents(&self) -> &[i8; MAGNITUDE_COUNT] {
        &self.0
    }

    pub fn is_dimensionless(&self) -> bool {
        self.0.iter().all(|&e| e == 0)
    }

    fn combine(
        &self,
        other: &Dimension,
        op: impl Fn(i8, i8) -> Option<i8>,
    ) -> Result<Dimension, DimensionError> {
        let mut exponents = [0; MAGNITUDE_COUNT];
        for (i, magnitude) in Magnitude::ALL.iter().enumerate() {
            exponents[i] =
                op(self.0[i], other.0[i]).ok_or(DimensionError::Overflow(*magnitude))?;
        }
        Ok(Dimension(exponents))
    }

    /// Dimension of a product.
    pub fn checked_mul(&self, other: &Dimension) -> Result<Dimension, DimensionError> {
        self.combine(other, i8::checked_add)
    }

    /// Dimension of a quotient.
    pub fn checked_div(&self, other: &Dimension) -> Result<Dimension, DimensionError> {
        self.combine(other, i8::checked_sub)
    }

    /// Dimension raised to an integer power.
    pub fn checked_pow(&self, exponent: i8) -> Result<Dimension, DimensionError> {
        self.combine(&Dimension::NONE, |e, _| e.checked_mul(exponent))
    }

    /// Dimension of the reciprocal.
    pub fn checked_inv(&self) -> Result<Dimension, DimensionError> {
        Dimension::NONE.checked_div(self)
    }
}

impl Index<Magnitude> for Dimension {
    type Output = i8;

    fn index(&self, magnitude: Magnitude) -> &i8 {
        &self.0[magnitude.index()]
    }
}

impl fmt::Display for Dimension {
    /// `<L T^-1>`; the dimensionless vector prints as `<>`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<")?;
        let mut first = true;
        for magnitude in Magnitude::ALL {
            let exponent = self[magnitude];
            if exponent == 0 {
                continue;
            }
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            f.write_str(magnitude.symbol())?;
            if exponent != 1 {
                write!(f, "^{}", exponent)?;
            }
        }
        f.write_str(">")
    }
}
