//! ICRS sky positions
//!
//! Positions are plain right ascension / declination pairs in degrees. The
//! only geometry needed here is the gnomonic (tangent-plane) projection used
//! to lay instrument footprints out around a pointing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position on the sky, ICRS degrees
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkyCoord {
    /// Right ascension, degrees in `[0, 360)`
    pub ra: f64,
    /// Declination, degrees in `[-90, 90]`
    pub dec: f64,
}

impl SkyCoord {
    /// Create a position, wrapping RA into `[0, 360)` and clamping Dec
    pub fn new(ra: f64, dec: f64) -> Self {
        Self {
            ra: ra.rem_euclid(360.0),
            dec: dec.clamp(-90.0, 90.0),
        }
    }

    /// Create a position from RA in hours
    pub fn from_hours(ra_hours: f64, dec: f64) -> Self {
        Self::new(ra_hours * 15.0, dec)
    }

    /// Position at tangent-plane offset `(xi, eta)` degrees from `self`
    ///
    /// `xi` increases towards the east (increasing RA), `eta` towards north.
    pub fn offset_by(&self, xi_deg: f64, eta_deg: f64) -> SkyCoord {
        let xi = xi_deg.to_radians();
        let eta = eta_deg.to_radians();
        let rho = xi.hypot(eta);
        if rho == 0.0 {
            return *self;
        }

        let ra0 = self.ra.to_radians();
        let dec0 = self.dec.to_radians();
        let c = rho.atan();
        let (sin_c, cos_c) = c.sin_cos();
        let (sin_d0, cos_d0) = dec0.sin_cos();

        let dec = (cos_c * sin_d0 + eta * sin_c * cos_d0 / rho).asin();
        let ra = ra0 + (xi * sin_c).atan2(rho * cos_d0 * cos_c - eta * sin_d0 * sin_c);
        SkyCoord::new(ra.to_degrees(), dec.to_degrees())
    }

    /// Angular separation in degrees
    pub fn separation(&self, other: &SkyCoord) -> f64 {
        let (d1, d2) = (self.dec.to_radians(), other.dec.to_radians());
        let dra = (other.ra - self.ra).to_radians();
        let a = ((d2 - d1) / 2.0).sin().powi(2) + d1.cos() * d2.cos() * (dra / 2.0).sin().powi(2);
        (2.0 * a.sqrt().min(1.0).asin()).to_degrees()
    }
}

impl Default for SkyCoord {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl fmt::Display for SkyCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(ra={:.6}, dec={:.6})", self.ra, self.dec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_wraps_ra() {
        let c = SkyCoord::new(-10.0, 95.0);
        assert_eq!(c.ra, 350.0);
        assert_eq!(c.dec, 90.0);
        assert_eq!(SkyCoord::from_hours(6.0, 0.0).ra, 90.0);
    }

    #[test]
    fn test_offset_at_equator() {
        let center = SkyCoord::new(10.0, 0.0);
        let east = center.offset_by(1.0, 0.0);
        assert!((east.ra - 11.0).abs() < 1e-3);
        assert!(east.dec.abs() < 1e-9);

        let north = center.offset_by(0.0, 1.0);
        assert!((north.dec - 1.0).abs() < 1e-3);
        assert!((north.ra - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_offset_preserves_separation() {
        let center = SkyCoord::new(150.0, 45.0);
        let moved = center.offset_by(0.3, -0.4);
        assert!((center.separation(&moved) - 0.5).abs() < 1e-3);
        assert_eq!(center.offset_by(0.0, 0.0), center);
    }
}
