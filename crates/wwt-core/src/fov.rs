//! Instrument fields of view
//!
//! A field of view is an instrument footprint laid out around a pointing.
//! Footprints are lists of panels, each panel a closed outline given as
//! tangent-plane offsets `(xi, eta)` in degrees from the pointing, with the
//! instrument at position angle zero. Placing a footprint rotates the
//! offsets by the position angle (east of north) and projects them onto the
//! sky around the center.
//!
//! The client materializes one polygon annotation per panel; this module only
//! owns the geometry and the footprint catalogs.

use lazy_static::lazy_static;
use std::fmt;
use uuid::Uuid;

use crate::annotation::AnnotationId;
use crate::coords::SkyCoord;
use crate::error::{WwtError, WwtResult};

/// One instrument footprint
#[derive(Clone, Debug, PartialEq)]
pub struct Footprint {
    /// Catalog name, lowercase
    pub name: String,
    /// Panel outlines as `(xi, eta)` offsets in degrees
    pub panels: Vec<Vec<(f64, f64)>>,
}

impl Footprint {
    pub fn new(name: impl Into<String>, panels: Vec<Vec<(f64, f64)>>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            panels,
        }
    }

    /// Panel corners on the sky for a pointing and position angle
    pub fn corners_at(&self, center: SkyCoord, rotation_deg: f64) -> Vec<Vec<SkyCoord>> {
        let (sin, cos) = rotation_deg.to_radians().sin_cos();
        self.panels
            .iter()
            .map(|panel| {
                panel
                    .iter()
                    .map(|&(xi, eta)| center.offset_by(xi * cos - eta * sin, xi * sin + eta * cos))
                    .collect()
            })
            .collect()
    }
}

/// Source of instrument footprints
pub trait FootprintCatalog {
    /// Footprint for a telescope name (case-insensitive)
    fn footprint(&self, telescope: &str) -> WwtResult<Footprint>;

    /// Every name the catalog knows
    fn names(&self) -> Vec<String>;
}

/// Axis-aligned rectangle centered on `(xi, eta)`
fn rect(xi: f64, eta: f64, width: f64, height: f64) -> Vec<(f64, f64)> {
    let (w, h) = (width / 2.0, height / 2.0);
    vec![(xi - w, eta - h), (xi + w, eta - h), (xi + w, eta + h), (xi - w, eta + h)]
}

const ARCSEC: f64 = 1.0 / 3600.0;

lazy_static! {
    static ref BUILTIN_FOOTPRINTS: Vec<Footprint> = vec![
        // Two 4096x2048 chips at 0.05"/px with a 2.5" gap
        Footprint::new(
            "hst_acs_wfc",
            vec![
                rect(0.0, 52.5 * ARCSEC, 202.0 * ARCSEC, 102.0 * ARCSEC),
                rect(0.0, -52.5 * ARCSEC, 202.0 * ARCSEC, 102.0 * ARCSEC),
            ],
        ),
        // Modules A and B, 2.2' each, 44" apart
        Footprint::new(
            "jwst_nircam",
            vec![
                rect(-88.0 * ARCSEC, 0.0, 132.0 * ARCSEC, 132.0 * ARCSEC),
                rect(88.0 * ARCSEC, 0.0, 132.0 * ARCSEC, 132.0 * ARCSEC),
            ],
        ),
        // 3.6/5.8 um and 4.5/8.0 um fields, 5.2' each
        Footprint::new(
            "spitzer_irac",
            vec![
                rect(0.0, 3.4 / 60.0, 5.2 / 60.0, 5.2 / 60.0),
                rect(0.0, -3.4 / 60.0, 5.2 / 60.0, 5.2 / 60.0),
            ],
        ),
        // Four 24 degree cameras along one sector
        Footprint::new(
            "tess",
            (0..4).map(|i| rect(0.0, -36.0 + 24.0 * i as f64, 24.0, 24.0)).collect(),
        ),
        // 6x3 grid of 0.125 degree detectors
        Footprint::new(
            "roman_wfi",
            (0..3)
                .flat_map(|row| {
                    (0..6).map(move |col| {
                        rect(-0.34 + 0.136 * col as f64, -0.136 + 0.136 * row as f64, 0.125, 0.125)
                    })
                })
                .collect(),
        ),
    ];
}

/// Footprints shipped with the crate
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinFootprints;

impl FootprintCatalog for BuiltinFootprints {
    fn footprint(&self, telescope: &str) -> WwtResult<Footprint> {
        let wanted = telescope.to_lowercase();
        BUILTIN_FOOTPRINTS
            .iter()
            .find(|f| f.name == wanted)
            .cloned()
            .ok_or_else(|| {
                let mut names = self.names();
                names.sort();
                WwtError::validation(
                    "telescope",
                    format!("telescope should be one of {}", names.join("/")),
                )
            })
    }

    fn names(&self) -> Vec<String> {
        BUILTIN_FOOTPRINTS.iter().map(|f| f.name.clone()).collect()
    }
}

/// Identifier of a field of view
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FovId(String);

impl FovId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FovId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A placed footprint and the polygons drawing it
#[derive(Clone, Debug)]
pub struct FieldOfView {
    pub(crate) id: FovId,
    pub(crate) footprint: Footprint,
    pub(crate) center: SkyCoord,
    pub(crate) rotation: f64,
    pub(crate) panels: Vec<AnnotationId>,
}

impl FieldOfView {
    pub fn id(&self) -> &FovId {
        &self.id
    }

    pub fn telescope(&self) -> &str {
        &self.footprint.name
    }

    pub fn center(&self) -> SkyCoord {
        self.center
    }

    /// Position angle, degrees east of north
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Polygon annotations, one per panel, in footprint order
    pub fn panels(&self) -> &[AnnotationId] {
        &self.panels
    }

    /// Panel corners at the current pointing
    pub fn corners(&self) -> Vec<Vec<SkyCoord>> {
        self.footprint.corners_at(self.center, self.rotation)
    }
}
