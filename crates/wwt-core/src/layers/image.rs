//! Image layers
//!
//! An image layer shows a 2-D array on the sky. The engine loads the pixels
//! from `<data_dir>/<id>.fits`; display limits, stretch and colormap travel
//! as their own messages rather than as settings.

use lazy_static::lazy_static;
use ndarray::Array2;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use wwt_io::ImageData;

use crate::attributes::{validate_opacity, AttrType, AttrValue, AttributeSpec, Attrs, Model};
use crate::dispatch::{Dispatcher, SetContext};
use crate::error::WwtResult;
use crate::layers::{LayerId, COLORMAPS};
use crate::state::StretchInfo;
use crate::transport::{Message, MessageSender};

/// Stretch functions, in the engine's index order
pub const STRETCHES: &[&str] = &["linear", "log", "power", "sqrt", "histeq"];

/// Percentiles used for the initial display limits
const AUTOSCALE_PERCENTILES: (f64, f64) = (0.5, 99.5);

/// Engine index of a stretch name
pub fn stretch_index(name: &str) -> Option<usize> {
    STRETCHES.iter().position(|s| *s == name)
}

lazy_static! {
    static ref IMAGE_LAYER_ATTRIBUTES: Vec<AttributeSpec> = vec![
        AttributeSpec::new("opacity", AttrType::Float, 1.0)
            .remote("opacity")
            .validator(validate_opacity),
        AttributeSpec::new("vmin", AttrType::OptFloat, AttrValue::None),
        AttributeSpec::new("vmax", AttrType::OptFloat, AttrValue::None),
        AttributeSpec::new("stretch", AttrType::Choice(STRETCHES), "linear"),
        AttributeSpec::new("cmap", AttrType::Choice(COLORMAPS), "gray"),
    ];
}

/// Where image pixels come from
#[derive(Clone, Debug)]
pub enum ImageSource {
    /// An in-memory array with its transform
    Array(ImageData),
    /// A FITS file
    File(PathBuf),
}

impl ImageSource {
    fn load(self) -> WwtResult<ImageData> {
        match self {
            ImageSource::Array(image) => Ok(image),
            ImageSource::File(path) => read_fits(&path),
        }
    }
}

#[cfg(feature = "fits")]
fn read_fits(path: &Path) -> WwtResult<ImageData> {
    Ok(wwt_io::fits::read_image(path)?)
}

#[cfg(feature = "fits")]
fn write_fits(path: &Path, image: &ImageData) -> WwtResult<()> {
    Ok(wwt_io::fits::write_image(path, image)?)
}

#[cfg(not(feature = "fits"))]
fn fits_disabled(path: &Path) -> crate::error::WwtError {
    wwt_io::IoError::UnsupportedFits(format!(
        "{}: FITS support not enabled (enable the 'fits' feature)",
        path.display()
    ))
    .into()
}

#[cfg(not(feature = "fits"))]
fn read_fits(path: &Path) -> WwtResult<ImageData> {
    Err(fits_disabled(path))
}

#[cfg(not(feature = "fits"))]
fn write_fits(path: &Path, _image: &ImageData) -> WwtResult<()> {
    Err(fits_disabled(path))
}

impl From<ImageData> for ImageSource {
    fn from(image: ImageData) -> Self {
        ImageSource::Array(image)
    }
}

/// Linearly interpolated percentile of sorted values
fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (p / 100.0).clamp(0.0, 1.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Display limits from the finite pixels
pub fn autoscale_limits(image: &ImageData) -> Option<(f64, f64)> {
    let mut values = image.finite_values();
    values.sort_by(f64::total_cmp);
    let (low, high) = AUTOSCALE_PERCENTILES;
    Some((percentile(&values, low)?, percentile(&values, high)?))
}

/// A live image layer
#[derive(Debug)]
pub struct ImageLayer {
    id: LayerId,
    image: ImageData,
    url: String,
    model: Model,
    sender: MessageSender,
}

impl ImageLayer {
    pub(crate) fn create(
        source: ImageSource,
        data_dir: &str,
        sender: &MessageSender,
        attrs: &Attrs,
    ) -> WwtResult<Self> {
        let mut model = Model::new("ImageLayer", &IMAGE_LAYER_ATTRIBUTES);
        model.check_attrs(attrs)?;
        let image = source.load()?;

        let (vmin, vmax) = autoscale_limits(&image).unwrap_or((0.0, 1.0));
        model.set("vmin", vmin)?;
        model.set("vmax", vmax)?;
        for (name, value) in attrs.iter() {
            model.set(name, value.clone())?;
        }

        let id = LayerId::generate();
        let url = format!("{}/{}.fits", data_dir, id);
        sender.send(
            Message::new("image_layer_create")
                .with("id", id.as_str())
                .with("url", url.as_str()),
        )?;
        tracing::info!(
            "created image layer {} ({}x{} pixels)",
            id,
            image.width(),
            image.height()
        );

        model.observe(Box::new(Dispatcher::for_entity(
            SetContext::ImageLayer,
            id.as_str(),
            sender.clone(),
        )));

        let mut layer = Self {
            id,
            image,
            url,
            model,
            sender: sender.clone(),
        };
        layer.send_stretch()?;
        layer.send_cmap()?;
        layer.model.touch("opacity")?;
        Ok(layer)
    }

    pub fn id(&self) -> &LayerId {
        &self.id
    }

    pub fn image(&self) -> &ImageData {
        &self.image
    }

    /// URL the engine loads the pixels from
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.model.get(name)
    }

    /// Write one attribute; limits, stretch and colormap send their own messages
    pub fn set(&mut self, name: &str, value: impl Into<AttrValue>) -> WwtResult<()> {
        self.model.set(name, value)?;
        match name {
            "vmin" | "vmax" | "stretch" => self.send_stretch(),
            "cmap" => self.send_cmap(),
            _ => Ok(()),
        }
    }

    /// Replace the pixels, keeping the transform, stretch and colormap
    ///
    /// The engine reloads the data file from the layer URL, and the display
    /// limits are autoscaled again from the new pixels.
    pub fn update_data(&mut self, data: Array2<f64>) -> WwtResult<()> {
        let image = ImageData::new(data, self.image.wcs.clone());
        self.sender.send(
            Message::new("image_layer_update")
                .with("id", self.id.as_str())
                .with("url", self.url.as_str()),
        )?;
        self.image = image;
        tracing::info!(
            "updated image layer {} ({}x{} pixels)",
            self.id,
            self.image.width(),
            self.image.height()
        );

        if let Some((vmin, vmax)) = autoscale_limits(&self.image) {
            self.model.set("vmin", vmin)?;
            self.model.set("vmax", vmax)?;
        }
        self.send_stretch()
    }

    /// Write the pixels as the FITS file the engine loads from the layer URL
    pub fn write_data_file(&self, path: &Path) -> WwtResult<()> {
        write_fits(path, &self.image)
    }

    /// Current display parameters
    pub fn stretch_info(&self) -> StretchInfo {
        StretchInfo {
            stretch: self.model.get_str("stretch").unwrap_or("linear").to_string(),
            vmin: self.model.get_f64("vmin").unwrap_or(0.0),
            vmax: self.model.get_f64("vmax").unwrap_or(1.0),
            cmap: self.model.get_str("cmap").unwrap_or("gray").to_string(),
        }
    }

    pub fn wire_settings(&self) -> Map<String, Value> {
        self.model.remote_settings()
    }

    pub(crate) fn remove(self) -> WwtResult<()> {
        self.sender
            .send(Message::new("image_layer_remove").with("id", self.id.as_str()))?;
        tracing::info!("removed image layer {}", self.id);
        Ok(())
    }

    fn send_stretch(&self) -> WwtResult<()> {
        let info = self.stretch_info();
        self.sender.send(
            Message::new("image_layer_stretch")
                .with("id", self.id.as_str())
                .with("stretch", stretch_index(&info.stretch).unwrap_or(0))
                .with("vmin", info.vmin)
                .with("vmax", info.vmax),
        )
    }

    fn send_cmap(&self) -> WwtResult<()> {
        self.sender.send(
            Message::new("image_layer_cmap")
                .with("id", self.id.as_str())
                .with("cmap", self.model.get_str("cmap").unwrap_or("gray")),
        )
    }
}

impl fmt::Display for ImageLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<ImageLayer {}x{} pixels>", self.image.width(), self.image.height())
    }
}
