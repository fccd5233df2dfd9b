//! In-memory reference engine
//!
//! [`EngineMirror`] is a [`Transport`] that applies every message to a plain
//! model of engine state instead of rendering anything. Comparing that model
//! with a serialized [`StateDocument`] checks that the two ways of describing
//! a view agree: what the engine was told, and what the client says it told.

use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use crate::client::{is_3d_mode, PLANET_MODE};
use crate::error::{WwtError, WwtResult};
use crate::imagery::SOLAR_SYSTEM_IMAGERY;
use crate::layers::image::stretch_index;
use crate::state::{CoordEntry, StateDocument};
use crate::transport::{Message, Transport, ViewField};

const TOLERANCE: f64 = 1e-9;

#[derive(Clone, Debug, Default, PartialEq)]
struct MirroredAnnotation {
    shape: String,
    settings: Map<String, Value>,
    center: Option<CoordEntry>,
    points: Vec<CoordEntry>,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct MirroredStretch {
    stretch: Option<u64>,
    vmin: Option<f64>,
    vmax: Option<f64>,
    cmap: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct MirroredLayer {
    layer_type: String,
    frame: Option<String>,
    settings: Map<String, Value>,
    stretch: MirroredStretch,
}

#[derive(Debug, Default)]
struct EngineState {
    settings: Map<String, Value>,
    mode: Option<String>,
    foreground: Option<String>,
    background: Option<String>,
    foreground_opacity: Option<f64>,
    center: Option<(f64, f64, f64)>,
    tracked: Option<u64>,
    datetime: Option<String>,
    annotations: BTreeMap<String, MirroredAnnotation>,
    annotation_order: Vec<String>,
    layers: BTreeMap<String, MirroredLayer>,
    layer_order: Vec<String>,
    unknown: Vec<String>,
}

/// Reference engine recording the state messages describe
///
/// Clones share state.
#[derive(Clone, Default)]
pub struct EngineMirror {
    state: Rc<RefCell<EngineState>>,
}

fn number(message: &Message, key: &str) -> Option<f64> {
    message.get(key).and_then(Value::as_f64)
}

fn coord(message: &Message) -> Option<CoordEntry> {
    Some(CoordEntry {
        ra: number(message, "ra")?,
        dec: number(message, "dec")?,
    })
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

fn values_match(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => close(x, y),
        _ => a == b,
    }
}

fn coords_match(a: &CoordEntry, b: &CoordEntry) -> bool {
    close(a.ra, b.ra) && close(a.dec, b.dec)
}

/// Every mirrored setting must appear in the document with the same value
fn check_settings(
    owner: &str,
    mirrored: &Map<String, Value>,
    documented: &Map<String, Value>,
    skip: impl Fn(&str) -> bool,
    problems: &mut Vec<String>,
) {
    for (name, value) in mirrored {
        if skip(name) {
            continue;
        }
        match documented.get(name) {
            Some(doc_value) if values_match(value, doc_value) => {}
            Some(doc_value) => problems.push(format!(
                "{}: setting {} is {} in the engine but {} in the document",
                owner, name, value, doc_value
            )),
            None => problems.push(format!("{}: setting {} missing from the document", owner, name)),
        }
    }
}

impl EngineMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a replayed message sequence
    pub fn replay(&self, messages: &[Message]) {
        let mut state = self.state.borrow_mut();
        for message in messages {
            state.apply(message);
        }
    }

    /// Events the mirror did not understand
    pub fn unknown_events(&self) -> Vec<String> {
        self.state.borrow().unknown.clone()
    }

    pub fn setting(&self, name: &str) -> Option<Value> {
        self.state.borrow().settings.get(name).cloned()
    }

    /// Live annotation ids, in creation order
    pub fn annotation_ids(&self) -> Vec<String> {
        self.state.borrow().annotation_order.clone()
    }

    /// Live layer ids, in creation order
    pub fn layer_ids(&self) -> Vec<String> {
        self.state.borrow().layer_order.clone()
    }

    /// Every way the mirrored engine state contradicts `doc`
    pub fn disagreements(&self, doc: &StateDocument) -> Vec<String> {
        let state = self.state.borrow();
        let mut problems = Vec::new();
        let view = &doc.view_settings;
        let in_3d = is_3d_mode(&view.mode);

        check_settings(
            "view",
            &state.settings,
            &doc.wwt_settings,
            |name| name.starts_with("solarSystem") && !in_3d,
            &mut problems,
        );

        let engine_mode = state.mode.as_deref().unwrap_or("sky");
        let expected_mode = if in_3d {
            "sky"
        } else if view.mode == PLANET_MODE {
            view.body.as_deref().unwrap_or("earth")
        } else {
            view.mode.as_str()
        };
        if engine_mode != expected_mode {
            problems.push(format!(
                "viewer mode is {} in the engine but the document implies {}",
                engine_mode, expected_mode
            ));
        }
        if in_3d && state.foreground.as_deref() != Some(SOLAR_SYSTEM_IMAGERY) {
            problems.push(format!("3-D mode {} without the solar system foreground", view.mode));
        }

        let imagery = &doc.foreground_settings;
        if let Some(foreground) = &state.foreground {
            if *foreground != imagery.foreground {
                problems.push(format!(
                    "foreground is {} in the engine but {} in the document",
                    foreground, imagery.foreground
                ));
            }
        }
        if let Some(background) = &state.background {
            if *background != imagery.background {
                problems.push(format!(
                    "background is {} in the engine but {} in the document",
                    background, imagery.background
                ));
            }
        }
        if let Some(opacity) = state.foreground_opacity {
            if !close(opacity, imagery.foreground_alpha) {
                problems.push(format!(
                    "foreground opacity is {} in the engine but {} in the document",
                    opacity, imagery.foreground_alpha
                ));
            }
        }

        if let Some((ra, dec, fov)) = state.center {
            if !(close(ra, view.ra) && close(dec, view.dec) && close(fov, view.fov)) {
                let engine = format!("({}, {}, fov {})", ra, dec, fov);
                let document = format!("({}, {}, fov {})", view.ra, view.dec, view.fov);
                problems.push(format!(
                    "camera is at {} in the engine but {} in the document",
                    engine, document
                ));
            }
        }
        if let Some(code) = view.tracked_object_id {
            if state.tracked != Some(code as u64) {
                problems.push(format!("document tracks object {} but the engine does not", code));
            }
        }

        let doc_annotations: Vec<&str> = doc.annotations.iter().map(|a| a.id.as_str()).collect();
        if doc_annotations != state.annotation_order {
            problems.push(format!(
                "annotations {:?} in the engine but {:?} in the document",
                state.annotation_order, doc_annotations
            ));
        }
        for entry in &doc.annotations {
            let Some(mirrored) = state.annotations.get(&entry.id) else {
                continue;
            };
            let owner = format!("annotation {}", entry.id);
            if mirrored.shape != entry.shape {
                problems.push(format!(
                    "{}: shape {} in the engine but {} in the document",
                    owner, mirrored.shape, entry.shape
                ));
            }
            check_settings(&owner, &mirrored.settings, &entry.settings, |_| false, &mut problems);
            let centers_agree = match (&mirrored.center, &entry.center) {
                (Some(a), Some(b)) => coords_match(a, b),
                (None, None) => true,
                _ => false,
            };
            if !centers_agree {
                problems.push(format!("{}: centers differ", owner));
            }
            let points = entry.points.as_deref().unwrap_or(&[]);
            if points.len() != mirrored.points.len()
                || !points.iter().zip(&mirrored.points).all(|(a, b)| coords_match(a, b))
            {
                problems.push(format!("{}: points differ", owner));
            }
        }

        let doc_layers: Vec<&str> = doc.layers.iter().map(|l| l.id.as_str()).collect();
        if doc_layers != state.layer_order {
            problems.push(format!(
                "layers {:?} in the engine but {:?} in the document",
                state.layer_order, doc_layers
            ));
        }
        for entry in &doc.layers {
            let Some(mirrored) = state.layers.get(&entry.id) else {
                continue;
            };
            let owner = format!("layer {}", entry.id);
            if mirrored.layer_type != entry.layer_type {
                problems.push(format!(
                    "{}: type {} in the engine but {} in the document",
                    owner, mirrored.layer_type, entry.layer_type
                ));
            }
            if let Some(frame) = &mirrored.frame {
                if *frame != entry.frame {
                    problems.push(format!(
                        "{}: frame {} in the engine but {} in the document",
                        owner, frame, entry.frame
                    ));
                }
            }
            check_settings(&owner, &mirrored.settings, &entry.settings, |_| false, &mut problems);
            if let Some(info) = &entry.stretch_info {
                let stretch = &mirrored.stretch;
                let agrees = stretch.stretch == stretch_index(&info.stretch).map(|i| i as u64)
                    && stretch.vmin.map_or(false, |v| close(v, info.vmin))
                    && stretch.vmax.map_or(false, |v| close(v, info.vmax))
                    && stretch.cmap.as_deref() == Some(info.cmap.as_str());
                if !agrees {
                    problems.push(format!("{}: stretch differs", owner));
                }
            }
        }

        problems
    }

    /// Whether the mirrored state agrees with `doc`
    pub fn agrees_with(&self, doc: &StateDocument) -> bool {
        self.disagreements(doc).is_empty()
    }
}

impl EngineState {
    fn apply(&mut self, message: &Message) {
        let id = message.id().map(str::to_string);
        match (message.event.as_str(), id) {
            ("setting_set", _) => {
                if let (Some(setting), Some(value)) =
                    (message.get_str("setting"), message.get("value"))
                {
                    self.settings.insert(setting.to_string(), value.clone());
                }
            }
            ("set_viewer_mode", _) => self.mode = message.get_str("mode").map(str::to_string),
            ("set_foreground_by_name", _) => {
                self.foreground = message.get_str("name").map(str::to_string)
            }
            ("set_background_by_name", _) => {
                self.background = message.get_str("name").map(str::to_string)
            }
            ("set_foreground_opacity", _) => self.foreground_opacity = number(message, "value"),
            ("center_on_coordinates", _) => {
                if let (Some(ra), Some(dec), Some(fov)) =
                    (number(message, "ra"), number(message, "dec"), number(message, "fov"))
                {
                    self.center = Some((ra, dec, fov));
                }
            }
            ("track_object", _) => self.tracked = message.get("code").and_then(Value::as_u64),
            ("set_datetime", _) => self.datetime = message.get_str("isot").map(str::to_string),
            (
                "pause_time" | "resume_time" | "load_tour" | "pause_tour" | "resume_tour"
                | "load_image_collection",
                _,
            ) => {}
            ("annotation_create", Some(id)) => {
                let shape = message.get_str("shape").unwrap_or_default().to_string();
                self.annotations.insert(
                    id.clone(),
                    MirroredAnnotation {
                        shape,
                        ..MirroredAnnotation::default()
                    },
                );
                self.annotation_order.push(id);
            }
            ("annotation_set", Some(id)) => {
                if let (Some(annotation), Some(setting), Some(value)) = (
                    self.annotations.get_mut(&id),
                    message.get_str("setting"),
                    message.get("value"),
                ) {
                    annotation.settings.insert(setting.to_string(), value.clone());
                }
            }
            ("circle_set_center", Some(id)) => {
                if let Some(annotation) = self.annotations.get_mut(&id) {
                    annotation.center = coord(message);
                }
            }
            ("polygon_add_point" | "line_add_point" | "circle_collection_add_point", Some(id)) => {
                if let (Some(annotation), Some(point)) =
                    (self.annotations.get_mut(&id), coord(message))
                {
                    annotation.points.push(point);
                }
            }
            ("remove_annotation", Some(id)) => {
                self.annotations.remove(&id);
                self.annotation_order.retain(|a| *a != id);
            }
            ("clear_annotations", _) => {
                self.annotations.clear();
                self.annotation_order.clear();
            }
            ("table_layer_create" | "image_layer_create", Some(id)) => {
                let layer_type = if message.event == "image_layer_create" {
                    "image"
                } else {
                    "table"
                };
                self.layers.insert(
                    id.clone(),
                    MirroredLayer {
                        layer_type: layer_type.to_string(),
                        frame: message
                            .get_str("frame")
                            .map(str::to_string)
                            .or_else(|| (layer_type == "image").then(|| "Sky".to_string())),
                        ..MirroredLayer::default()
                    },
                );
                self.layer_order.push(id);
            }
            ("table_layer_update" | "image_layer_update", _) => {}
            ("table_layer_set" | "image_layer_set", Some(id)) => {
                if let (Some(layer), Some(setting), Some(value)) =
                    (self.layers.get_mut(&id), message.get_str("setting"), message.get("value"))
                {
                    layer.settings.insert(setting.to_string(), value.clone());
                }
            }
            ("image_layer_stretch", Some(id)) => {
                if let Some(layer) = self.layers.get_mut(&id) {
                    layer.stretch.stretch = message.get("stretch").and_then(Value::as_u64);
                    layer.stretch.vmin = number(message, "vmin");
                    layer.stretch.vmax = number(message, "vmax");
                }
            }
            ("image_layer_cmap", Some(id)) => {
                if let Some(layer) = self.layers.get_mut(&id) {
                    layer.stretch.cmap = message.get_str("cmap").map(str::to_string);
                }
            }
            ("table_layer_remove" | "image_layer_remove", Some(id)) => {
                self.layers.remove(&id);
                self.layer_order.retain(|l| *l != id);
            }
            (event, _) => {
                tracing::warn!("engine mirror ignored {}", event);
                self.unknown.push(event.to_string());
            }
        }
    }
}

impl Transport for EngineMirror {
    fn send(&mut self, message: &Message) -> WwtResult<()> {
        self.state.borrow_mut().apply(message);
        Ok(())
    }

    fn read_view_field(
        &mut self,
        field: ViewField,
        _timeout: Option<Duration>,
    ) -> WwtResult<Value> {
        let state = self.state.borrow();
        let value = match field {
            ViewField::Ra => state.center.map(|(ra, _, _)| Value::from(ra)),
            ViewField::Dec => state.center.map(|(_, dec, _)| Value::from(dec)),
            ViewField::Fov => state.center.map(|(_, _, fov)| Value::from(fov)),
            ViewField::Datetime => state.datetime.clone().map(Value::from),
        };
        value.ok_or_else(|| WwtError::Transport(format!("engine has no '{}' yet", field.as_str())))
    }
}
