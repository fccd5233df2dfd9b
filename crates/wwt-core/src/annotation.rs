//! Annotation entities
//!
//! Circles, polygons, lines and circle collections drawn over the sky. Each
//! annotation owns a typed attribute model whose remote attributes are
//! mirrored as `annotation_set` messages, plus its geometry in ICRS degrees.
//!
//! Annotations are created and removed through the client, which keeps the
//! live set; see [`crate::client::WwtClient::add_circle`] and friends.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::attributes::{
    validate_color, validate_opacity, AttrType, AttrValue, AttributeSpec, Attrs, Model, Validated,
};
use crate::coords::SkyCoord;
use crate::dispatch::{Dispatcher, SetContext};
use crate::error::{WwtError, WwtResult};
use crate::state::{AnnotationEntry, CoordEntry};
use crate::transport::{Message, MessageSender};
use crate::units::{Dimension, Quantity, Unit};

/// Identifier correlating an annotation with its engine counterpart
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationId(String);

impl AnnotationId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Annotation shape
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Circle,
    Polygon,
    Line,
    CircleCollection,
}

impl Shape {
    /// Shape name carried by `annotation_create`
    pub fn wire_name(&self) -> &'static str {
        match self {
            Shape::Circle => "circle",
            Shape::Polygon => "polygon",
            Shape::Line => "line",
            Shape::CircleCollection => "circle_collection",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Shape> {
        match name {
            "circle" => Some(Shape::Circle),
            "polygon" => Some(Shape::Polygon),
            "line" => Some(Shape::Line),
            "circle_collection" => Some(Shape::CircleCollection),
            _ => None,
        }
    }

    /// Entity name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Circle => "Circle",
            Shape::Polygon => "Polygon",
            Shape::Line => "Line",
            Shape::CircleCollection => "CircleCollection",
        }
    }

    /// Declared attributes for this shape
    pub fn specs(&self) -> &'static [AttributeSpec] {
        match self {
            Shape::Circle | Shape::CircleCollection => &CIRCLE_ATTRIBUTES[..],
            Shape::Polygon => &POLYGON_ATTRIBUTES[..],
            Shape::Line => &LINE_ATTRIBUTES[..],
        }
    }

    /// Event that appends one vertex or center
    fn point_event(&self) -> Option<&'static str> {
        match self {
            Shape::Circle => None,
            Shape::Polygon => Some("polygon_add_point"),
            Shape::Line => Some("line_add_point"),
            Shape::CircleCollection => Some("circle_collection_add_point"),
        }
    }
}

fn shared_attributes() -> Vec<AttributeSpec> {
    vec![
        AttributeSpec::new("label", AttrType::Str, "").remote("label"),
        AttributeSpec::new("hover_label", AttrType::Bool, false).remote("showHoverLabel"),
        AttributeSpec::new("tag", AttrType::Str, "").remote("tag"),
        AttributeSpec::new("opacity", AttrType::Float, 1.0)
            .remote("opacity")
            .validator(validate_opacity),
    ]
}

fn outline_attributes() -> Vec<AttributeSpec> {
    vec![
        AttributeSpec::new("fill", AttrType::Bool, false).remote("fill"),
        AttributeSpec::new("fill_color", AttrType::Color, "#ffffff")
            .remote("fillColor")
            .validator(validate_color),
        AttributeSpec::new("line_color", AttrType::Color, "#ffffff")
            .remote("lineColor")
            .validator(validate_color),
        AttributeSpec::new("line_width", AttrType::Quantity, Quantity::px(1.0))
            .remote("lineWidth")
            .validator(validate_line_width),
    ]
}

lazy_static! {
    static ref CIRCLE_ATTRIBUTES: Vec<AttributeSpec> = {
        let mut specs = shared_attributes();
        specs.extend(outline_attributes());
        specs.push(
            AttributeSpec::new("radius", AttrType::Quantity, Quantity::px(80.0))
                .remote("radius")
                .validator(validate_radius),
        );
        specs
    };
    static ref POLYGON_ATTRIBUTES: Vec<AttributeSpec> = {
        let mut specs = shared_attributes();
        specs.extend(outline_attributes());
        specs
    };
    static ref LINE_ATTRIBUTES: Vec<AttributeSpec> = {
        let mut specs = shared_attributes();
        specs.push(
            AttributeSpec::new("color", AttrType::Color, "#ffffff")
                .remote("lineColor")
                .validator(validate_color),
        );
        specs.push(
            AttributeSpec::new("width", AttrType::Quantity, Quantity::px(1.0))
                .remote("lineWidth")
                .validator(validate_width),
        );
        specs
    };
}

fn pixels(value: &AttrValue, message: &str) -> Result<Validated, String> {
    value
        .as_quantity()
        .and_then(|q| q.to(&Unit::px()))
        .map(Validated::value)
        .ok_or_else(|| message.to_string())
}

fn validate_line_width(value: &AttrValue) -> Result<Validated, String> {
    pixels(value, "line_width must be in pixel equivalent units")
}

fn validate_width(value: &AttrValue) -> Result<Validated, String> {
    pixels(value, "width must be in pixel equivalent units")
}

/// Radii are kept in pixels or degrees
fn validate_radius(value: &AttrValue) -> Result<Validated, String> {
    const MESSAGE: &str = "radius must be in pixel or angle equivalent units";
    let quantity = value.as_quantity().ok_or_else(|| MESSAGE.to_string())?;
    let target = match quantity.unit.dimension() {
        Dimension::Pixel => Unit::px(),
        Dimension::Angle => Unit::deg(),
        _ => return Err(MESSAGE.to_string()),
    };
    quantity
        .to(&target)
        .map(Validated::value)
        .ok_or_else(|| MESSAGE.to_string())
}

/// A live annotation
#[derive(Debug)]
pub struct Annotation {
    id: AnnotationId,
    shape: Shape,
    model: Model,
    /// Circle: its center; polygon/line: vertices; collection: centers
    geometry: Vec<SkyCoord>,
    sender: MessageSender,
}

impl Annotation {
    /// Validate `attrs`, announce the annotation, then apply each attribute in order
    pub(crate) fn create(shape: Shape, sender: &MessageSender, attrs: &Attrs) -> WwtResult<Self> {
        let mut model = Model::new(shape.kind(), shape.specs());
        model.check_attrs(attrs)?;

        let id = AnnotationId::generate();
        sender.send(
            Message::new("annotation_create")
                .with("id", id.as_str())
                .with("shape", shape.wire_name()),
        )?;
        tracing::info!("created {} annotation {}", shape.wire_name(), id);

        model.observe(Box::new(Dispatcher::for_entity(
            SetContext::Annotation,
            id.as_str(),
            sender.clone(),
        )));

        let mut annotation = Self {
            id,
            shape,
            model,
            geometry: Vec::new(),
            sender: sender.clone(),
        };
        for (name, value) in attrs.iter() {
            annotation.set(name, value.clone())?;
        }
        Ok(annotation)
    }

    pub fn id(&self) -> &AnnotationId {
        &self.id
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.model.get(name)
    }

    /// Write one attribute
    ///
    /// A radius write is followed by a `skyRelative` setting telling the
    /// engine whether the radius is an angle or a pixel size.
    pub fn set(&mut self, name: &str, value: impl Into<AttrValue>) -> WwtResult<()> {
        self.model.set(name, value)?;
        if name == "radius" {
            if let Some(sky_relative) = self.sky_relative() {
                self.sender.send(SetContext::Annotation.message(
                    Some(self.id.as_str()),
                    "skyRelative",
                    sky_relative.into(),
                ))?;
            }
        }
        Ok(())
    }

    /// Whether the radius is measured on the sky (circles only)
    pub fn sky_relative(&self) -> Option<bool> {
        self.model
            .get_quantity("radius")
            .map(|r| r.unit.dimension() == Dimension::Angle)
    }

    /// Circle center
    pub fn center(&self) -> Option<SkyCoord> {
        match self.shape {
            Shape::Circle => self.geometry.first().copied(),
            _ => None,
        }
    }

    /// Polygon/line vertices or collection centers
    pub fn points(&self) -> &[SkyCoord] {
        match self.shape {
            Shape::Circle => &[],
            _ => &self.geometry,
        }
    }

    /// Move a circle
    pub fn set_center(&mut self, center: SkyCoord) -> WwtResult<()> {
        if self.shape != Shape::Circle {
            return Err(WwtError::validation(
                "center",
                format!("{} annotations have no center", self.shape.wire_name()),
            ));
        }

        self.sender.send(
            Message::new("circle_set_center")
                .with("id", self.id.as_str())
                .with("ra", center.ra)
                .with("dec", center.dec),
        )?;
        self.geometry = vec![center];
        Ok(())
    }

    /// Append one vertex to a polygon or line
    pub fn add_point(&mut self, point: SkyCoord) -> WwtResult<()> {
        match self.shape {
            Shape::Polygon | Shape::Line => self.push_point(point),
            _ => Err(WwtError::validation(
                "points",
                format!("cannot add points to a {}", self.shape.wire_name()),
            )),
        }
    }

    /// Append vertices in order, one message each
    pub fn add_points(&mut self, points: &[SkyCoord]) -> WwtResult<()> {
        for point in points {
            self.add_point(*point)?;
        }
        Ok(())
    }

    pub(crate) fn add_collection_centers(&mut self, centers: &[SkyCoord]) -> WwtResult<()> {
        for center in centers {
            self.push_point(*center)?;
        }
        Ok(())
    }

    fn push_point(&mut self, point: SkyCoord) -> WwtResult<()> {
        if let Some(event) = self.shape.point_event() {
            self.sender.send(
                Message::new(event)
                    .with("id", self.id.as_str())
                    .with("ra", point.ra)
                    .with("dec", point.dec),
            )?;
        }
        self.geometry.push(point);
        Ok(())
    }

    /// Announce removal; the annotation is consumed
    pub(crate) fn remove(self) -> WwtResult<()> {
        self.sender
            .send(Message::new("remove_annotation").with("id", self.id.as_str()))?;
        tracing::info!("removed {} annotation {}", self.shape.wire_name(), self.id);
        Ok(())
    }

    /// Engine-facing settings, including the derived `skyRelative` flag
    pub fn wire_settings(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut settings = self.model.remote_settings();
        if let Some(sky_relative) = self.sky_relative() {
            settings.insert("skyRelative".to_string(), sky_relative.into());
        }
        settings
    }

    /// State-document entry
    pub fn serialize(&self) -> AnnotationEntry {
        let coords = |points: &[SkyCoord]| points.iter().map(CoordEntry::from).collect::<Vec<_>>();
        AnnotationEntry {
            id: self.id.to_string(),
            shape: self.shape.wire_name().to_string(),
            settings: self.wire_settings(),
            center: self.center().map(|c| CoordEntry::from(&c)),
            points: match self.shape {
                Shape::Circle => None,
                _ => Some(coords(&self.geometry)),
            },
        }
    }
}
