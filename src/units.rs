//! Unit types and conversion utilities.
//!
//! Conversions are linear (`y = x * factor + offset`), which covers every
//! pair of units inside one quantity listed here, temperatures included.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator};

/// Physical quantity a unit measures
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quantity {
    Temperature,
    Pressure,
    Speed,
    Length,
}

/// Known display units
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, EnumIter)]
pub enum Unit {
    #[strum(serialize = "K")]
    Kelvin,
    #[strum(serialize = "°C", serialize = "degC")]
    Celsius,
    #[strum(serialize = "°F", serialize = "degF")]
    Fahrenheit,
    #[strum(serialize = "kPa")]
    KPa,
    #[strum(serialize = "bar")]
    Bar,
    #[strum(serialize = "psi", serialize = "PSI")]
    Psi,
    #[strum(serialize = "km/h")]
    KmPerHour,
    #[strum(serialize = "mph")]
    Mph,
    #[strum(serialize = "m/s")]
    MPerS,
    #[strum(serialize = "mm")]
    Millimeter,
    #[strum(serialize = "m")]
    Meter,
    #[strum(serialize = "in")]
    Inch,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Kelvin => "K",
            Unit::Celsius => "°C",
            Unit::Fahrenheit => "°F",
            Unit::KPa => "kPa",
            Unit::Bar => "bar",
            Unit::Psi => "psi",
            Unit::KmPerHour => "km/h",
            Unit::Mph => "mph",
            Unit::MPerS => "m/s",
            Unit::Millimeter => "mm",
            Unit::Meter => "m",
            Unit::Inch => "in",
        }
    }

    pub fn quantity(&self) -> Quantity {
        match self {
            Unit::Kelvin | Unit::Celsius | Unit::Fahrenheit => Quantity::Temperature,
            Unit::KPa | Unit::Bar | Unit::Psi => Quantity::Pressure,
            Unit::KmPerHour | Unit::Mph | Unit::MPerS => Quantity::Speed,
            Unit::Millimeter | Unit::Meter | Unit::Inch => Quantity::Length,
        }
    }

    /// `(factor, offset)` taking a value in this unit to the quantity's base unit
    /// (K, kPa, m/s, m)
    fn to_base(self) -> (f64, f64) {
        match self {
            Unit::Kelvin => (1.0, 0.0),
            Unit::Celsius => (1.0, 273.15),
            Unit::Fahrenheit => (5.0 / 9.0, 273.15 - 32.0 * 5.0 / 9.0),
            Unit::KPa => (1.0, 0.0),
            Unit::Bar => (100.0, 0.0),
            Unit::Psi => (6.894_757, 0.0),
            Unit::KmPerHour => (1.0 / 3.6, 0.0),
            Unit::Mph => (0.447_04, 0.0),
            Unit::MPerS => (1.0, 0.0),
            Unit::Millimeter => (0.001, 0.0),
            Unit::Meter => (1.0, 0.0),
            Unit::Inch => (0.0254, 0.0),
        }
    }

    /// Units that `self` can be converted to, itself included
    pub fn compatible(&self) -> Vec<Unit> {
        Unit::iter()
            .filter(|u| u.quantity() == self.quantity())
            .collect()
    }
}

/// Linear conversion applied to a numeric trace before display
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitConversion {
    pub factor: f64,
    pub offset: f64,
    /// Symbol of the resulting unit, if known
    pub unit: Option<String>,
}

impl Default for UnitConversion {
    fn default() -> Self {
        Self::identity()
    }
}

impl UnitConversion {
    pub fn new(factor: f64, offset: f64, unit: Option<String>) -> Self {
        Self {
            factor,
            offset,
            unit,
        }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, None)
    }

    pub fn is_identity(&self) -> bool {
        self.factor == 1.0 && self.offset == 0.0
    }

    pub fn apply(&self, value: f64) -> f64 {
        value * self.factor + self.offset
    }

    /// Conversion between two unit symbols.
    ///
    /// Returns `None` when either symbol is unknown or the units measure
    /// different quantities.
    pub fn between(from: &str, to: &str) -> Option<UnitConversion> {
        let from: Unit = from.parse().ok()?;
        let to: Unit = to.parse().ok()?;
        if from.quantity() != to.quantity() {
            return None;
        }
        let (f_from, o_from) = from.to_base();
        let (f_to, o_to) = to.to_base();
        Some(Self::new(
            f_from / f_to,
            (o_from - o_to) / f_to,
            Some(to.symbol().to_string()),
        ))
    }
}
