//! State document
//!
//! A JSON-compatible snapshot of the whole view: root settings, camera,
//! imagery, layers and live annotations. The document is built from the
//! client's own mirrored state, so producing one never involves the engine.
//!
//! [`StateDocument::to_messages`] replays a document as the message sequence
//! that rebuilds an equivalent view on a fresh engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::{is_3d_mode, PLANET_MODE};
use crate::coords::SkyCoord;
use crate::dispatch::SetContext;
use crate::error::WwtResult;
use crate::layers::image::stretch_index;
use crate::transport::Message;

/// Presentation options for exported figures
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HtmlSettings {
    pub title: Option<String>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
}

impl HtmlSettings {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_max_size(mut self, width: u32, height: u32) -> Self {
        self.max_width = Some(width);
        self.max_height = Some(height);
        self
    }
}

/// Camera state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewSettings {
    /// `sky`, `panorama`, `planet`, or a 3-D mode
    pub mode: String,

    /// Body shown in `planet` mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Center right ascension, degrees
    pub ra: f64,

    /// Center declination, degrees
    pub dec: f64,

    /// Field of view, degrees
    pub fov: f64,

    /// Object tracked in 3-D modes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked_object_id: Option<u32>,
}

/// Imagery layers behind the annotations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForegroundSettings {
    pub foreground: String,
    pub background: String,
    /// Foreground opacity as a percentage
    pub foreground_alpha: f64,
}

/// Image display parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StretchInfo {
    pub stretch: String,
    pub vmin: f64,
    pub vmax: f64,
    pub cmap: String,
}

/// One data layer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerEntry {
    pub id: String,
    /// `table` or `image`
    pub layer_type: String,
    pub frame: String,
    pub settings: Map<String, Value>,
    /// Data file path relative to the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stretch_info: Option<StretchInfo>,
}

/// A position in a document
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordEntry {
    pub ra: f64,
    pub dec: f64,
}

impl From<&SkyCoord> for CoordEntry {
    fn from(coord: &SkyCoord) -> Self {
        Self {
            ra: coord.ra,
            dec: coord.dec,
        }
    }
}

/// One live annotation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationEntry {
    pub id: String,
    pub shape: String,
    pub settings: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<CoordEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<CoordEntry>>,
}

/// Complete view description
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub html_settings: HtmlSettings,
    pub wwt_settings: Map<String, Value>,
    pub view_settings: ViewSettings,
    pub foreground_settings: ForegroundSettings,
    pub layers: Vec<LayerEntry>,
    pub annotations: Vec<AnnotationEntry>,
}

impl StateDocument {
    pub fn to_json(&self) -> WwtResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> WwtResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Messages that rebuild this view on a fresh engine
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::new();

        for (setting, value) in &self.wwt_settings {
            messages.push(SetContext::Setting.message(None, setting, value.clone()));
        }

        let view = &self.view_settings;
        let viewer_mode = if is_3d_mode(&view.mode) {
            "sky"
        } else if view.mode == PLANET_MODE {
            view.body.as_deref().unwrap_or("earth")
        } else {
            view.mode.as_str()
        };
        messages.push(Message::new("set_viewer_mode").with("mode", viewer_mode));
        if let Some(code) = view.tracked_object_id {
            messages.push(Message::new("track_object").with("code", code));
        }

        let imagery = &self.foreground_settings;
        messages.push(
            Message::new("set_foreground_by_name").with("name", imagery.foreground.as_str()),
        );
        messages.push(
            Message::new("set_background_by_name").with("name", imagery.background.as_str()),
        );
        messages.push(
            Message::new("set_foreground_opacity").with("value", imagery.foreground_alpha),
        );

        messages.push(
            Message::new("center_on_coordinates")
                .with("ra", view.ra)
                .with("dec", view.dec)
                .with("fov", view.fov)
                .with("instant", true),
        );

        for layer in &self.layers {
            messages.extend(layer_messages(layer));
        }
        for annotation in &self.annotations {
            messages.extend(annotation_messages(annotation));
        }

        messages
    }
}

fn layer_messages(layer: &LayerEntry) -> Vec<Message> {
    let mut messages = Vec::new();
    let url = layer.data_file.clone().unwrap_or_default();

    let context = if layer.layer_type == "image" {
        messages.push(
            Message::new("image_layer_create")
                .with("id", layer.id.as_str())
                .with("url", url),
        );
        SetContext::ImageLayer
    } else {
        messages.push(
            Message::new("table_layer_create")
                .with("id", layer.id.as_str())
                .with("frame", layer.frame.as_str())
                .with("url", url),
        );
        SetContext::TableLayer
    };

    for (setting, value) in &layer.settings {
        messages.push(context.message(Some(&layer.id), setting, value.clone()));
    }

    if let Some(stretch) = &layer.stretch_info {
        messages.push(
            Message::new("image_layer_stretch")
                .with("id", layer.id.as_str())
                .with("stretch", stretch_index(&stretch.stretch).unwrap_or(0))
                .with("vmin", stretch.vmin)
                .with("vmax", stretch.vmax),
        );
        messages.push(
            Message::new("image_layer_cmap")
                .with("id", layer.id.as_str())
                .with("cmap", stretch.cmap.as_str()),
        );
    }

    messages
}

fn annotation_messages(annotation: &AnnotationEntry) -> Vec<Message> {
    let id = annotation.id.as_str();
    let mut messages = vec![Message::new("annotation_create")
        .with("id", id)
        .with("shape", annotation.shape.as_str())];

    for (setting, value) in &annotation.settings {
        messages.push(SetContext::Annotation.message(Some(id), setting, value.clone()));
    }

    if let Some(center) = &annotation.center {
        messages.push(
            Message::new("circle_set_center")
                .with("id", id)
                .with("ra", center.ra)
                .with("dec", center.dec),
        );
    }

    let point_event = format!("{}_add_point", annotation.shape);
    for point in annotation.points.iter().flatten() {
        messages.push(
            Message::new(point_event.as_str())
                .with("id", id)
                .with("ra", point.ra)
                .with("dec", point.dec),
        );
    }

    messages
}
