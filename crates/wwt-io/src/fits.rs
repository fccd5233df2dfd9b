//! FITS primary-image reader and writer (requires `fits` feature)
//!
//! Image layers need a single 2-D primary HDU plus the simple celestial WCS
//! keywords (`CTYPEn`, `CRVALn`, `CRPIXn`, `CDELTn`, `CROTA2`). Pixel decoding
//! and `BSCALE`/`BZERO` scaling are left to cfitsio through `fitsio`.

use crate::image::{ImageData, Wcs};
use crate::reader::{IoError, IoResult};
use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::headers::ReadsKey;
use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use ndarray::Array2;
use std::path::Path;

impl From<fitsio::errors::Error> for IoError {
    fn from(err: fitsio::errors::Error) -> Self {
        IoError::Fits(err.to_string())
    }
}

/// Rows and columns of a primary image, from the HDU shape (slowest axis first)
fn image_dims(shape: &[usize]) -> IoResult<(usize, usize)> {
    let (height, width) = match shape {
        [height, width] => (*height, *width),
        [1, height, width] => (*height, *width),
        _ => {
            return Err(IoError::UnsupportedFits(format!(
                "expected a 2-D image, found NAXIS = {}",
                shape.len()
            )))
        }
    };
    height
        .checked_mul(width)
        .filter(|count| *count > 0)
        .ok_or_else(|| IoError::InvalidFormat(format!("bad image size {}x{}", width, height)))?;
    Ok((height, width))
}

fn key_or<T: ReadsKey>(hdu: &FitsHdu, file: &mut FitsFile, name: &str, default: T) -> T {
    hdu.read_key(file, name).unwrap_or(default)
}

/// Read the primary image of a FITS file
pub fn read_image(path: impl AsRef<Path>) -> IoResult<ImageData> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(IoError::FileNotFound(path.display().to_string()));
    }

    let mut file = FitsFile::open(path)?;
    let hdu = file.primary_hdu()?;
    let (height, width) = match &hdu.info {
        HduInfo::ImageInfo { shape, .. } => image_dims(shape)?,
        _ => return Err(IoError::UnsupportedFits("primary HDU is not an image".to_string())),
    };

    let pixels: Vec<f64> = hdu.read_image(&mut file)?;
    let data = Array2::from_shape_vec((height, width), pixels)
        .map_err(|e| IoError::InvalidFormat(e.to_string()))?;

    let defaults = Wcs::default();
    let wcs = Wcs {
        ctype1: key_or(&hdu, &mut file, "CTYPE1", defaults.ctype1),
        ctype2: key_or(&hdu, &mut file, "CTYPE2", defaults.ctype2),
        crval: [
            key_or(&hdu, &mut file, "CRVAL1", 0.0),
            key_or(&hdu, &mut file, "CRVAL2", 0.0),
        ],
        crpix: [
            key_or(&hdu, &mut file, "CRPIX1", 1.0),
            key_or(&hdu, &mut file, "CRPIX2", 1.0),
        ],
        cdelt: [
            key_or(&hdu, &mut file, "CDELT1", defaults.cdelt[0]),
            key_or(&hdu, &mut file, "CDELT2", defaults.cdelt[1]),
        ],
        crota2: key_or(&hdu, &mut file, "CROTA2", 0.0),
    };

    Ok(ImageData::new(data, wcs))
}

/// Write an image as 64-bit float pixels, replacing any existing file
pub fn write_image(path: impl AsRef<Path>, image: &ImageData) -> IoResult<()> {
    let dims = [image.height(), image.width()];
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &dims,
    };
    let mut file = FitsFile::create(path.as_ref())
        .with_custom_primary(&description)
        .overwrite()
        .open()?;
    let hdu = file.primary_hdu()?;

    let pixels: Vec<f64> = image.data.iter().copied().collect();
    hdu.write_image(&mut file, &pixels)?;

    let wcs = &image.wcs;
    hdu.write_key(&mut file, "CTYPE1", wcs.ctype1.as_str())?;
    hdu.write_key(&mut file, "CTYPE2", wcs.ctype2.as_str())?;
    for (axis, index) in [("1", 0), ("2", 1)] {
        hdu.write_key(&mut file, &format!("CRVAL{}", axis), wcs.crval[index])?;
        hdu.write_key(&mut file, &format!("CRPIX{}", axis), wcs.crpix[index])?;
        hdu.write_key(&mut file, &format!("CDELT{}", axis), wcs.cdelt[index])?;
    }
    hdu.write_key(&mut file, "CROTA2", wcs.crota2)?;
    Ok(())
}
