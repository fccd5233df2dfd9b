//! Data layers
//!
//! Table layers plot the rows of a [`wwt_io::Table`] as markers; image layers
//! show a 2-D array on the sky. Both are owned by the [`LayerManager`], which
//! keeps them in insertion order and addresses them by position or by id.
//!
//! # Lifecycle
//!
//! - `add_*_layer` validates every keyword before the create message is sent
//! - attribute writes go through the layer's model and its dispatcher
//! - removal sends `<kind>_layer_remove`; the id is stale afterwards

pub mod columns;
pub mod image;
pub mod table;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::ops::Index;
use std::path::Path;
use uuid::Uuid;
use wwt_io::Table;

use crate::attributes::Attrs;
use crate::error::{WwtError, WwtResult};
use crate::state::LayerEntry;
use crate::transport::MessageSender;

pub use columns::guess_lon_lat_columns;
pub use image::{ImageLayer, ImageSource};
pub use table::TableLayer;

/// Colormaps the engine knows by name
pub const COLORMAPS: &[&str] = &[
    "viridis", "plasma", "inferno", "magma", "cividis", "gray", "greys", "purples", "blues",
    "greens", "oranges", "reds", "rdylbu",
];

/// Identifier correlating a layer with its engine counterpart
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(String);

impl LayerId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference frame a layer is drawn in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frame {
    Sky,
    Ecliptic,
    Sun,
    Mercury,
    Venus,
    Earth,
    Moon,
    Mars,
    Jupiter,
    Io,
    Europa,
    Ganymede,
    Callisto,
    Saturn,
    Uranus,
    Neptune,
    Pluto,
}

const FRAMES: &[Frame] = &[
    Frame::Sky,
    Frame::Ecliptic,
    Frame::Sun,
    Frame::Mercury,
    Frame::Venus,
    Frame::Earth,
    Frame::Moon,
    Frame::Mars,
    Frame::Jupiter,
    Frame::Io,
    Frame::Europa,
    Frame::Ganymede,
    Frame::Callisto,
    Frame::Saturn,
    Frame::Uranus,
    Frame::Neptune,
    Frame::Pluto,
];

impl Frame {
    /// Canonical capitalised name
    pub fn name(&self) -> &'static str {
        match self {
            Frame::Sky => "Sky",
            Frame::Ecliptic => "Ecliptic",
            Frame::Sun => "Sun",
            Frame::Mercury => "Mercury",
            Frame::Venus => "Venus",
            Frame::Earth => "Earth",
            Frame::Moon => "Moon",
            Frame::Mars => "Mars",
            Frame::Jupiter => "Jupiter",
            Frame::Io => "Io",
            Frame::Europa => "Europa",
            Frame::Ganymede => "Ganymede",
            Frame::Callisto => "Callisto",
            Frame::Saturn => "Saturn",
            Frame::Uranus => "Uranus",
            Frame::Neptune => "Neptune",
            Frame::Pluto => "Pluto",
        }
    }

    /// Case-insensitive lookup
    pub fn parse(name: &str) -> WwtResult<Frame> {
        FRAMES
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(name.trim()))
            .copied()
            .ok_or_else(|| {
                let mut names: Vec<&str> = FRAMES.iter().map(Frame::name).collect();
                names.sort_unstable();
                WwtError::validation("frame", format!("frame should be one of {}", names.join("/")))
            })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A table or image layer
#[derive(Debug)]
pub enum Layer {
    Table(TableLayer),
    Image(ImageLayer),
}

impl Layer {
    pub fn id(&self) -> &LayerId {
        match self {
            Layer::Table(layer) => layer.id(),
            Layer::Image(layer) => layer.id(),
        }
    }

    /// Entity name used in messages and errors
    pub fn kind(&self) -> &'static str {
        match self {
            Layer::Table(_) => "TableLayer",
            Layer::Image(_) => "ImageLayer",
        }
    }

    pub fn as_table(&self) -> Option<&TableLayer> {
        match self {
            Layer::Table(layer) => Some(layer),
            Layer::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageLayer> {
        match self {
            Layer::Image(layer) => Some(layer),
            Layer::Table(_) => None,
        }
    }

    /// Data file name inside the export data directory
    pub fn data_file_name(&self) -> String {
        match self {
            Layer::Table(layer) => format!("{}.csv", layer.id()),
            Layer::Image(layer) => format!("{}.fits", layer.id()),
        }
    }

    /// Write the layer's data file to `path`
    pub fn write_data_file(&self, path: &Path) -> WwtResult<()> {
        match self {
            Layer::Table(layer) => {
                fs::write(path, wwt_io::csv_reader::write_csv(layer.table())?)?;
                Ok(())
            }
            Layer::Image(layer) => layer.write_data_file(path),
        }
    }

    /// State-document entry; `data_dir` is the directory holding data files
    pub fn serialize(&self, data_dir: &str) -> LayerEntry {
        let data_file = Some(format!("{}/{}", data_dir, self.data_file_name()));
        match self {
            Layer::Table(layer) => LayerEntry {
                id: layer.id().to_string(),
                layer_type: "table".to_string(),
                frame: layer.frame().name().to_string(),
                settings: layer.wire_settings(),
                data_file,
                stretch_info: None,
            },
            Layer::Image(layer) => LayerEntry {
                id: layer.id().to_string(),
                layer_type: "image".to_string(),
                frame: Frame::Sky.name().to_string(),
                settings: layer.wire_settings(),
                data_file,
                stretch_info: Some(layer.stretch_info()),
            },
        }
    }

    fn remove(self) -> WwtResult<()> {
        match self {
            Layer::Table(layer) => layer.remove(),
            Layer::Image(layer) => layer.remove(),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Table(layer) => write!(f, "{}", layer),
            Layer::Image(layer) => write!(f, "{}", layer),
        }
    }
}

/// Ordered, index-addressable collection of live layers
#[derive(Debug)]
pub struct LayerManager {
    sender: MessageSender,
    data_dir: String,
    layers: Vec<Layer>,
}

impl LayerManager {
    /// `data_dir` prefixes the URLs of layer data files
    pub fn new(sender: MessageSender, data_dir: impl Into<String>) -> Self {
        Self {
            sender,
            data_dir: data_dir.into(),
            layers: Vec::new(),
        }
    }

    /// Add a layer plotting the rows of `table`
    pub fn add_table_layer(
        &mut self,
        table: Table,
        frame: &str,
        attrs: &Attrs,
    ) -> WwtResult<LayerId> {
        let frame = Frame::parse(frame)?;
        let layer = TableLayer::create(table, frame, &self.sender, attrs)?;
        let id = layer.id().clone();
        self.layers.push(Layer::Table(layer));
        Ok(id)
    }

    /// Add a layer showing an image
    pub fn add_image_layer(&mut self, source: ImageSource, attrs: &Attrs) -> WwtResult<LayerId> {
        let layer = ImageLayer::create(source, &self.data_dir, &self.sender, attrs)?;
        let id = layer.id().clone();
        self.layers.push(Layer::Image(layer));
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    /// Layer at a position
    pub fn at(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    /// Position of a live layer
    pub fn position(&self, id: &LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id() == id)
    }

    pub fn get(&self, id: &LayerId) -> WwtResult<&Layer> {
        self.layers
            .iter()
            .find(|l| l.id() == id)
            .ok_or_else(|| WwtError::stale("Layer", id.as_str()))
    }

    pub fn table(&self, id: &LayerId) -> WwtResult<&TableLayer> {
        self.get(id)?
            .as_table()
            .ok_or_else(|| WwtError::stale("TableLayer", id.as_str()))
    }

    pub fn table_mut(&mut self, id: &LayerId) -> WwtResult<&mut TableLayer> {
        self.layers
            .iter_mut()
            .find_map(|l| match l {
                Layer::Table(layer) if layer.id() == id => Some(layer),
                _ => None,
            })
            .ok_or_else(|| WwtError::stale("TableLayer", id.as_str()))
    }

    pub fn image(&self, id: &LayerId) -> WwtResult<&ImageLayer> {
        self.get(id)?
            .as_image()
            .ok_or_else(|| WwtError::stale("ImageLayer", id.as_str()))
    }

    pub fn image_mut(&mut self, id: &LayerId) -> WwtResult<&mut ImageLayer> {
        self.layers
            .iter_mut()
            .find_map(|l| match l {
                Layer::Image(layer) if layer.id() == id => Some(layer),
                _ => None,
            })
            .ok_or_else(|| WwtError::stale("ImageLayer", id.as_str()))
    }

    /// Remove a layer; later positions shift down by one
    pub fn remove_layer(&mut self, id: &LayerId) -> WwtResult<()> {
        let index = self
            .position(id)
            .ok_or_else(|| WwtError::stale("Layer", id.as_str()))?;
        self.layers.remove(index).remove()
    }

    /// Remove the layer at a position
    pub fn remove_at(&mut self, index: usize) -> WwtResult<LayerId> {
        if index >= self.layers.len() {
            return Err(WwtError::validation(
                "index",
                format!("layer index {} out of range for {} layers", index, self.layers.len()),
            ));
        }
        let layer = self.layers.remove(index);
        let id = layer.id().clone();
        layer.remove()?;
        Ok(id)
    }

    /// Directory prefix of layer data files
    pub fn data_dir(&self) -> &str {
        &self.data_dir
    }

    /// State-document entries, in layer order
    pub fn serialize(&self) -> Vec<LayerEntry> {
        self.layers.iter().map(|l| l.serialize(&self.data_dir)).collect()
    }
}

impl Index<usize> for LayerManager {
    type Output = Layer;

    fn index(&self, index: usize) -> &Layer {
        &self.layers[index]
    }
}

impl<'a> IntoIterator for &'a LayerManager {
    type Item = &'a Layer;
    type IntoIter = std::slice::Iter<'a, Layer>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}

impl fmt::Display for LayerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.layers.is_empty() {
            return write!(f, "<LayerManager with no layers>");
        }
        writeln!(f, "<LayerManager with {} layers>", self.layers.len())?;
        writeln!(f)?;
        for (index, layer) in self.layers.iter().enumerate() {
            writeln!(f, "  [{}]: {}", index, layer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;
    use wwt_io::DataColumn;

    fn manager() -> (LayerManager, RecordingTransport) {
        let recorder = RecordingTransport::new();
        let sender = MessageSender::new(Box::new(recorder.clone()), true);
        (LayerManager::new(sender, "layer_data"), recorder)
    }

    fn stars(rows: usize) -> Table {
        let values: Vec<f64> = (0..rows).map(|i| i as f64).collect();
        Table::new()
            .with_column("ra", Some("deg"), DataColumn::Float64(values.clone()))
            .unwrap()
            .with_column("dec", Some("deg"), DataColumn::Float64(values))
            .unwrap()
    }

    #[test]
    fn test_frame_parse() {
        assert_eq!(Frame::parse("earth").unwrap(), Frame::Earth);
        assert_eq!(Frame::parse("SKY").unwrap().name(), "Sky");
        let err = Frame::parse("vulcan").unwrap_err().to_string();
        assert!(err.starts_with("frame should be one of Callisto/Earth/Ecliptic"));
    }

    #[test]
    fn test_removal_shifts_indices() {
        let (mut layers, recorder) = manager();
        let a = layers.add_table_layer(stars(1), "Sky", &Attrs::new()).unwrap();
        let b = layers.add_table_layer(stars(2), "Sky", &Attrs::new()).unwrap();
        let c = layers.add_table_layer(stars(3), "Sky", &Attrs::new()).unwrap();

        layers.remove_layer(&b).unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].id(), &a);
        assert_eq!(layers[1].id(), &c);
        assert_eq!(recorder.events("table_layer_remove").len(), 1);

        assert!(matches!(layers.table_mut(&b), Err(WwtError::StaleEntity { .. })));
        assert!(layers.remove_layer(&b).is_err());
    }

    #[test]
    fn test_display() {
        let (mut layers, _) = manager();
        assert_eq!(layers.to_string(), "<LayerManager with no layers>");
        layers.add_table_layer(stars(4), "Sky", &Attrs::new()).unwrap();
        assert_eq!(
            layers.to_string(),
            "<LayerManager with 1 layers>\n\n  [0]: <TableLayer with 4 markers>\n"
        );
    }

    #[test]
    fn test_remove_at_out_of_range() {
        let (mut layers, _) = manager();
        assert!(layers.remove_at(0).is_err());
        let id = layers.add_table_layer(stars(1), "Sky", &Attrs::new()).unwrap();
        assert_eq!(layers.remove_at(0).unwrap(), id);
        assert!(layers.is_empty());
    }

    #[test]
    fn test_serialize_data_file() {
        let (mut layers, _) = manager();
        let id = layers.add_table_layer(stars(2), "earth", &Attrs::new()).unwrap();
        let entries = layers.serialize();
        assert_eq!(entries[0].frame, "Earth");
        assert_eq!(entries[0].layer_type, "table");
        let expected = format!("layer_data/{}.csv", id);
        assert_eq!(entries[0].data_file.as_deref(), Some(expected.as_str()));
    }
}
