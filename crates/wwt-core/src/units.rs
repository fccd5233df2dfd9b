//! Physical units and quantities
//!
//! A [`Unit`] is a symbol plus a dimension and a scale relative to the
//! reference unit of that dimension (metre, degree, second, pixel, kilogram).
//! Two units are numerically equivalent when they share a dimension and their
//! scales agree to a relative tolerance of 1e-9.
//!
//! [`UnitChoice`] describes a closed set of canonical units an attribute may
//! take, together with the wire name the engine expects for each member.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{WwtError, WwtResult};

const SCALE_TOLERANCE: f64 = 1e-9;

/// Physical dimension of a unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Length,
    Angle,
    Time,
    Pixel,
    Mass,
    Dimensionless,
}

impl Dimension {
    /// Lowercase name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Length => "length",
            Dimension::Angle => "angle",
            Dimension::Time => "time",
            Dimension::Pixel => "pixel",
            Dimension::Mass => "mass",
            Dimension::Dimensionless => "dimensionless",
        }
    }
}

const PARSEC_M: f64 = 3.085_677_581_491_367_3e16;

/// Known units: (symbol followed by aliases, dimension, scale)
const UNIT_DEFINITIONS: &[(&[&str], Dimension, f64)] = &[
    // Length, metres
    (&["m", "meter", "meters", "metre"], Dimension::Length, 1.0),
    (&["cm", "centimeter"], Dimension::Length, 0.01),
    (&["mm", "millimeter"], Dimension::Length, 0.001),
    (&["km", "kilometer", "kilometers"], Dimension::Length, 1000.0),
    (&["ft", "foot", "feet"], Dimension::Length, 0.3048),
    (&["inch", "in", "inches"], Dimension::Length, 0.0254),
    (&["mi", "mile", "miles"], Dimension::Length, 1609.344),
    (&["AU", "au"], Dimension::Length, 1.495_978_707e11),
    (&["lyr", "ly", "lightyear"], Dimension::Length, 9.460_730_472_580_8e15),
    (&["pc", "parsec"], Dimension::Length, PARSEC_M),
    (&["kpc"], Dimension::Length, PARSEC_M * 1e3),
    (&["Mpc"], Dimension::Length, PARSEC_M * 1e6),
    // Angle, degrees
    (&["deg", "degree", "degrees"], Dimension::Angle, 1.0),
    (&["arcmin", "arcminute"], Dimension::Angle, 1.0 / 60.0),
    (&["arcsec", "arcsecond"], Dimension::Angle, 1.0 / 3600.0),
    (&["mas"], Dimension::Angle, 1.0 / 3_600_000.0),
    (&["rad", "radian"], Dimension::Angle, 180.0 / std::f64::consts::PI),
    (&["hourangle"], Dimension::Angle, 15.0),
    // Time, seconds
    (&["s", "second", "sec"], Dimension::Time, 1.0),
    (&["min", "minute"], Dimension::Time, 60.0),
    (&["h", "hour", "hr"], Dimension::Time, 3600.0),
    (&["day", "d"], Dimension::Time, 86400.0),
    (&["yr", "year"], Dimension::Time, 31_557_600.0),
    // Pixels
    (&["px", "pix", "pixel"], Dimension::Pixel, 1.0),
    // Mass, kilograms
    (&["kg", "kilogram"], Dimension::Mass, 1.0),
    (&["g", "gram"], Dimension::Mass, 0.001),
    (&["", "dimensionless"], Dimension::Dimensionless, 1.0),
];

lazy_static! {
    /// symbol or alias -> (canonical symbol, dimension, scale)
    static ref UNIT_TABLE: HashMap<&'static str, (&'static str, Dimension, f64)> = {
        let mut table = HashMap::new();
        for (symbols, dimension, scale) in UNIT_DEFINITIONS {
            let canonical = symbols[0];
            for symbol in symbols.iter() {
                table.insert(*symbol, (canonical, *dimension, *scale));
            }
        }
        table
    };
}

/// A unit of measure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    symbol: String,
    dimension: Dimension,
    scale: f64,
}

impl Unit {
    /// Look up a known unit by symbol or alias
    pub fn lookup(symbol: &str) -> Option<Unit> {
        UNIT_TABLE
            .get(symbol.trim())
            .map(|(canonical, dimension, scale)| Unit {
                symbol: canonical.to_string(),
                dimension: *dimension,
                scale: *scale,
            })
    }

    /// Parse a unit symbol, failing on unknown symbols
    pub fn parse(symbol: &str) -> WwtResult<Unit> {
        Self::lookup(symbol)
            .ok_or_else(|| WwtError::validation("unit", format!("unknown unit '{}'", symbol)))
    }

    /// A user-defined unit with an explicit scale relative to the reference unit
    pub fn custom(symbol: impl Into<String>, dimension: Dimension, scale: f64) -> Unit {
        Unit {
            symbol: symbol.into(),
            dimension,
            scale,
        }
    }

    pub fn deg() -> Unit {
        Self::custom("deg", Dimension::Angle, 1.0)
    }

    pub fn px() -> Unit {
        Self::custom("px", Dimension::Pixel, 1.0)
    }

    pub fn m() -> Unit {
        Self::custom("m", Dimension::Length, 1.0)
    }

    pub fn day() -> Unit {
        Self::custom("day", Dimension::Time, 86400.0)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Whether both units measure the same dimension
    pub fn is_equivalent(&self, other: &Unit) -> bool {
        self.dimension == other.dimension
    }

    /// Whether both units measure the same dimension at the same scale
    pub fn same_scale(&self, other: &Unit) -> bool {
        let tolerance = SCALE_TOLERANCE * self.scale.abs().max(other.scale.abs());
        self.is_equivalent(other) && (self.scale - other.scale).abs() <= tolerance
    }

    /// Multiplier converting a magnitude in `self` into `target`
    pub fn conversion_factor(&self, target: &Unit) -> Option<f64> {
        if self.is_equivalent(target) {
            Some(self.scale / target.scale)
        } else {
            None
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// A magnitude with a unit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Quantity in pixels
    pub fn px(value: f64) -> Self {
        Self::new(value, Unit::px())
    }

    /// Quantity in degrees
    pub fn deg(value: f64) -> Self {
        Self::new(value, Unit::deg())
    }

    /// Magnitude expressed in another unit of the same dimension
    pub fn value_in(&self, target: &Unit) -> Option<f64> {
        self.unit
            .conversion_factor(target)
            .map(|factor| self.value * factor)
    }

    /// Convert to another unit of the same dimension
    pub fn to(&self, target: &Unit) -> Option<Quantity> {
        self.value_in(target)
            .map(|value| Quantity::new(value, target.clone()))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// Closed set of canonical units accepted by an attribute
#[derive(Clone, Copy, Debug)]
pub struct UnitChoice {
    /// Attribute name used in error messages
    pub attribute: &'static str,
    /// (canonical symbol, engine wire name) pairs
    pub members: &'static [(&'static str, &'static str)],
}

/// Longitude units for table layers
pub const LON_UNITS: UnitChoice = UnitChoice {
    attribute: "lon_unit",
    members: &[("deg", "degrees"), ("h", "hours"), ("hourangle", "hours")],
};

/// Altitude units for table layers
pub const ALT_UNITS: UnitChoice = UnitChoice {
    attribute: "alt_unit",
    members: &[
        ("m", "meters"),
        ("ft", "feet"),
        ("inch", "inches"),
        ("mi", "miles"),
        ("km", "kilometers"),
        ("AU", "astronomicalUnits"),
        ("lyr", "lightYears"),
        ("pc", "parsecs"),
        ("Mpc", "megaParsecs"),
    ],
};

impl UnitChoice {
    /// Canonical members, ASCII-sorted and joined by `/`
    pub fn allowed(&self) -> String {
        let mut symbols: Vec<&str> = self.members.iter().map(|(s, _)| *s).collect();
        symbols.sort_unstable();
        symbols.join("/")
    }

    /// Map a unit onto the canonical member it is identical or equivalent to
    pub fn canonicalize(&self, unit: &Unit) -> WwtResult<Unit> {
        if let Some((symbol, _)) = self.members.iter().find(|(s, _)| *s == unit.symbol()) {
            if let Some(member) = Unit::lookup(symbol) {
                if member.same_scale(unit) {
                    return Ok(member);
                }
            }
        }

        self.members
            .iter()
            .filter_map(|(symbol, _)| Unit::lookup(symbol))
            .find(|member| member.same_scale(unit))
            .ok_or_else(|| {
                WwtError::validation(
                    self.attribute,
                    format!("{} should be one of {}", self.attribute, self.allowed()),
                )
            })
    }

    /// Engine name for a canonical member
    pub fn wire_name(&self, unit: &Unit) -> Option<&'static str> {
        self.members
            .iter()
            .find(|(symbol, _)| *symbol == unit.symbol())
            .map(|(_, wire)| *wire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_aliases() {
        assert_eq!(Unit::lookup("degree").unwrap().symbol(), "deg");
        assert_eq!(Unit::lookup("lightyear").unwrap().symbol(), "lyr");
        assert!(Unit::lookup("furlong").is_none());
        assert!(Unit::parse("furlong").is_err());
    }

    #[test]
    fn test_conversion_factor() {
        let km = Unit::lookup("km").unwrap();
        assert_eq!(km.conversion_factor(&Unit::m()), Some(1000.0));
        assert_eq!(km.conversion_factor(&Unit::deg()), None);
        let q = Quantity::new(2.0, Unit::lookup("arcmin").unwrap());
        assert!((q.value_in(&Unit::deg()).unwrap() - 2.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_custom_unit_canonicalizes_to_member() {
        let kilo = Unit::custom("kilo_m", Dimension::Length, 1000.0);
        assert_eq!(ALT_UNITS.canonicalize(&kilo).unwrap().symbol(), "km");

        let fifteen_deg = Unit::custom("fifteen", Dimension::Angle, 15.0);
        assert_eq!(LON_UNITS.canonicalize(&fifteen_deg).unwrap().symbol(), "hourangle");
    }

    #[test]
    fn test_rejection_lists_allowed_set() {
        let err = ALT_UNITS
            .canonicalize(&Unit::lookup("kg").unwrap())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "alt_unit should be one of AU/Mpc/ft/inch/km/lyr/m/mi/pc"
        );

        let err = LON_UNITS.canonicalize(&Unit::lookup("rad").unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "lon_unit should be one of deg/h/hourangle");
    }

    #[test]
    fn test_centimetre_is_not_an_altitude_unit() {
        assert!(ALT_UNITS.canonicalize(&Unit::lookup("cm").unwrap()).is_err());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(LON_UNITS.wire_name(&Unit::lookup("hourangle").unwrap()), Some("hours"));
        assert_eq!(ALT_UNITS.wire_name(&Unit::lookup("Mpc").unwrap()), Some("megaParsecs"));
    }
}
