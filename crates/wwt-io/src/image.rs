//! Image data bound to image layers
//!
//! An image is a 2-D array of pixel values (rows = y, columns = x) together
//! with a tangent-plane world-coordinate transform.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Simple celestial WCS (FITS-style reference pixel, value and scale)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wcs {
    /// Projection type of the first axis, e.g. "RA---TAN"
    pub ctype1: String,
    /// Projection type of the second axis, e.g. "DEC--TAN"
    pub ctype2: String,
    /// World coordinates of the reference pixel, degrees
    pub crval: [f64; 2],
    /// Reference pixel (1-based, FITS convention)
    pub crpix: [f64; 2],
    /// Pixel scale, degrees per pixel
    pub cdelt: [f64; 2],
    /// Rotation of the second axis, degrees
    pub crota2: f64,
}

impl Default for Wcs {
    fn default() -> Self {
        Self {
            ctype1: "RA---TAN".to_string(),
            ctype2: "DEC--TAN".to_string(),
            crval: [0.0, 0.0],
            crpix: [1.0, 1.0],
            cdelt: [-1.0 / 3600.0, 1.0 / 3600.0],
            crota2: 0.0,
        }
    }
}

impl Wcs {
    /// TAN projection centred on `(ra, dec)` with a square pixel scale in degrees
    pub fn tan(ra: f64, dec: f64, pixel_scale_deg: f64, reference_pixel: [f64; 2]) -> Self {
        Self {
            crval: [ra, dec],
            crpix: reference_pixel,
            cdelt: [-pixel_scale_deg, pixel_scale_deg],
            ..Self::default()
        }
    }

    /// Whether both axes describe equatorial coordinates
    pub fn is_equatorial(&self) -> bool {
        self.ctype1.starts_with("RA") && self.ctype2.starts_with("DEC")
    }
}

/// Pixel array plus its coordinate transform
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub data: Array2<f64>,
    pub wcs: Wcs,
}

impl ImageData {
    pub fn new(data: Array2<f64>, wcs: Wcs) -> Self {
        Self { data, wcs }
    }

    /// Image width in pixels
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    /// Image height in pixels
    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Finite pixel values, in row-major order
    pub fn finite_values(&self) -> Vec<f64> {
        self.data.iter().copied().filter(|v| v.is_finite()).collect()
    }
}
