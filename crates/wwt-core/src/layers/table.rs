//! Table layers
//!
//! A table layer plots one marker per row. Column mappings name the table
//! columns holding longitude, latitude, altitude, color and size values;
//! they must always name existing columns.
//!
//! Creation sends `table_layer_create` with the table as base64-encoded CSV,
//! then announces the column mapping, the forced defaults and every keyword
//! the caller passed, in that order.

use base64::{engine::general_purpose::STANDARD, Engine};
use lazy_static::lazy_static;
use serde_json::{Map, Value};
use std::fmt;
use wwt_io::Table;

use crate::attributes::{
    validate_color, validate_non_negative, validate_opacity, AttrType, AttrValue, AttributeSpec,
    Attrs, Model, Validated,
};
use crate::dispatch::{Dispatcher, SetContext};
use crate::error::{WwtError, WwtResult};
use crate::layers::columns::guess_lon_lat_columns;
use crate::layers::{Frame, LayerId, COLORMAPS};
use crate::transport::{Message, MessageSender};
use crate::units::{Dimension, Quantity, Unit, UnitChoice, ALT_UNITS, LON_UNITS};

const COORD_TYPES: &[&str] = &["spherical", "rectangular"];
const ALT_TYPES: &[&str] = &["depth", "altitude", "distance", "seaLevel", "terrain"];
const MARKER_TYPES: &[&str] = &["gaussian", "point", "circle", "square", "pushpin"];
const MARKER_SCALES: &[&str] = &["screen", "world"];

/// Attributes that name a table column
const COLUMN_ATTRIBUTES: &[&str] = &[
    "lon_att", "lat_att", "alt_att", "x_att", "y_att", "z_att", "cmap_att", "size_att", "time_att",
];

/// Re-announced right after creation whether or not the caller set them
const FORCED_DEFAULTS: &[&str] = &[
    "alt_type",
    "size_scale",
    "color",
    "opacity",
    "marker_type",
    "marker_scale",
    "far_side_visible",
];

fn column(name: &'static str, remote: &'static str) -> AttributeSpec {
    AttributeSpec::new(name, AttrType::OptStr, AttrValue::None)
        .remote(remote)
        .encoder(encode_column)
}

lazy_static! {
    static ref TABLE_LAYER_ATTRIBUTES: Vec<AttributeSpec> = vec![
        AttributeSpec::new("coord_type", AttrType::Choice(COORD_TYPES), "spherical")
            .remote("coordinatesType"),
        column("lon_att", "lngColumn"),
        column("lat_att", "latColumn"),
        column("alt_att", "altColumn"),
        AttributeSpec::new("lon_unit", AttrType::Unit, Unit::deg())
            .remote("raUnits")
            .validator(validate_lon_unit)
            .encoder(encode_lon_unit),
        AttributeSpec::new(
            "alt_unit",
            AttrType::Unit,
            Unit::custom("km", Dimension::Length, 1000.0),
        )
        .remote("altUnit")
        .validator(validate_alt_unit)
        .encoder(encode_alt_unit),
        AttributeSpec::new("alt_type", AttrType::Choice(ALT_TYPES), "depth").remote("altType"),
        column("x_att", "xAxisColumn"),
        column("y_att", "yAxisColumn"),
        column("z_att", "zAxisColumn"),
        column("cmap_att", "colorMapColumn"),
        column("size_att", "sizeColumn"),
        AttributeSpec::new("size_scale", AttrType::Float, 10.0)
            .remote("scaleFactor")
            .validator(validate_non_negative),
        AttributeSpec::new("color", AttrType::Color, "#ffffff")
            .remote("color")
            .validator(validate_color),
        AttributeSpec::new("opacity", AttrType::Float, 1.0)
            .remote("opacity")
            .validator(validate_opacity),
        AttributeSpec::new("marker_type", AttrType::Choice(MARKER_TYPES), "gaussian")
            .remote("plotType"),
        AttributeSpec::new("marker_scale", AttrType::Choice(MARKER_SCALES), "screen")
            .remote("markerScale"),
        AttributeSpec::new("far_side_visible", AttrType::Bool, false).remote("showFarSide"),
        AttributeSpec::new("time_series", AttrType::Bool, false).remote("timeSeries"),
        column("time_att", "startDateColumn"),
        AttributeSpec::new("time_decay", AttrType::Quantity, Quantity::new(16.0, Unit::day()))
            .remote("decay")
            .validator(validate_time_decay),
        AttributeSpec::new("cmap_vmin", AttrType::OptFloat, AttrValue::None),
        AttributeSpec::new("cmap_vmax", AttrType::OptFloat, AttrValue::None),
        AttributeSpec::new("cmap", AttrType::Choice(COLORMAPS), "viridis"),
        AttributeSpec::new("size_vmin", AttrType::OptFloat, AttrValue::None),
        AttributeSpec::new("size_vmax", AttrType::OptFloat, AttrValue::None),
    ];
}

fn encode_column(value: &AttrValue) -> Value {
    Value::String(value.as_str().unwrap_or_default().to_string())
}

fn canonical_unit(choice: &UnitChoice, value: &AttrValue) -> Result<Validated, String> {
    let unit = value
        .as_unit()
        .ok_or_else(|| format!("{} must be a unit", choice.attribute))?;
    choice
        .canonicalize(unit)
        .map(Validated::value)
        .map_err(|e| e.to_string())
}

fn validate_lon_unit(value: &AttrValue) -> Result<Validated, String> {
    canonical_unit(&LON_UNITS, value)
}

fn validate_alt_unit(value: &AttrValue) -> Result<Validated, String> {
    canonical_unit(&ALT_UNITS, value)
}

fn wire_unit(choice: &UnitChoice, value: &AttrValue) -> Value {
    match value.as_unit() {
        Some(unit) => Value::from(choice.wire_name(unit).unwrap_or(unit.symbol())),
        None => Value::Null,
    }
}

fn encode_lon_unit(value: &AttrValue) -> Value {
    wire_unit(&LON_UNITS, value)
}

fn encode_alt_unit(value: &AttrValue) -> Value {
    wire_unit(&ALT_UNITS, value)
}

/// Decay times are kept in days
fn validate_time_decay(value: &AttrValue) -> Result<Validated, String> {
    value
        .as_quantity()
        .and_then(|q| q.to(&Unit::day()))
        .map(Validated::value)
        .ok_or_else(|| "time_decay must be in time equivalent units".to_string())
}

fn check_column(table: &Table, name: &str, value: &AttrValue) -> WwtResult<()> {
    if !COLUMN_ATTRIBUTES.contains(&name) {
        return Ok(());
    }
    match value {
        AttrValue::Str(column) if !table.has_column(column) => {
            let mut names = table.column_names();
            names.sort_unstable();
            Err(WwtError::validation(
                name,
                format!("{} should be one of {}", name, names.join("/")),
            ))
        }
        _ => Ok(()),
    }
}

/// CSV with CRLF newlines, base64-encoded
fn encode_table(table: &Table) -> WwtResult<String> {
    let csv = wwt_io::csv_reader::write_csv(table)?;
    Ok(STANDARD.encode(csv.as_bytes()))
}

/// A live table layer
#[derive(Debug)]
pub struct TableLayer {
    id: LayerId,
    frame: Frame,
    table: Table,
    model: Model,
    sender: MessageSender,
}

impl TableLayer {
    pub(crate) fn create(
        table: Table,
        frame: Frame,
        sender: &MessageSender,
        attrs: &Attrs,
    ) -> WwtResult<Self> {
        let model = Model::new("TableLayer", &TABLE_LAYER_ATTRIBUTES);
        model.check_attrs(attrs)?;
        for (name, value) in attrs.iter() {
            check_column(&table, name, value)?;
        }

        let mut layer = Self {
            id: LayerId::generate(),
            frame,
            table,
            model,
            sender: sender.clone(),
        };

        // No observers yet: these writes only settle local state
        layer.resolve_mapping(attrs)?;
        for (name, value) in attrs.iter() {
            layer.model.set(name, value.clone())?;
        }
        let unscaled = |att: &str, vmin: &str, vmax: &str| {
            attrs.contains(att) && !attrs.contains(vmin) && !attrs.contains(vmax)
        };
        if unscaled("cmap_att", "cmap_vmin", "cmap_vmax") {
            layer.autoscale("cmap_att", "cmap_vmin", "cmap_vmax")?;
        }
        if unscaled("size_att", "size_vmin", "size_vmax") {
            layer.autoscale("size_att", "size_vmin", "size_vmax")?;
        }

        layer.sender.send(
            Message::new("table_layer_create")
                .with("id", layer.id.as_str())
                .with("table", encode_table(&layer.table)?)
                .with("frame", layer.frame.name()),
        )?;
        tracing::info!(
            "created table layer {} ({} rows, frame {})",
            layer.id,
            layer.table.num_rows(),
            layer.frame
        );

        layer.model.observe(Box::new(Dispatcher::for_entity(
            SetContext::TableLayer,
            layer.id.as_str(),
            sender.clone(),
        )));

        let mut announce: Vec<&str> = vec!["lon_att", "lat_att", "lon_unit"];
        if layer.model.get_str("alt_att").is_some() || attrs.contains("alt_unit") {
            announce.extend(["alt_att", "alt_unit"]);
        }
        announce.extend(FORCED_DEFAULTS);
        announce.extend(attrs.iter().map(|(name, _)| name));

        let mut announced: Vec<&str> = Vec::new();
        for name in announce {
            if !announced.contains(&name) {
                layer.model.touch(name)?;
                announced.push(name);
            }
        }
        layer.send_colormap_state()?;
        layer.send_size_state()?;

        Ok(layer)
    }

    pub fn id(&self) -> &LayerId {
        &self.id
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.model.get(name)
    }

    /// Write one attribute
    ///
    /// Column attributes must name an existing column. Choosing a color or
    /// size column rescales the mapping to that column's finite range.
    pub fn set(&mut self, name: &str, value: impl Into<AttrValue>) -> WwtResult<()> {
        let value = value.into();
        check_column(&self.table, name, &value)?;
        self.model.set(name, value)?;

        match name {
            "cmap_att" => {
                self.autoscale("cmap_att", "cmap_vmin", "cmap_vmax")?;
                self.send_colormap_state()
            }
            "cmap" | "cmap_vmin" | "cmap_vmax" => self.send_colormap_state(),
            "size_att" => {
                self.autoscale("size_att", "size_vmin", "size_vmax")?;
                self.send_size_state()
            }
            "size_vmin" | "size_vmax" => self.send_size_state(),
            _ => Ok(()),
        }
    }

    /// Re-bind the layer to a new table
    ///
    /// Longitude/latitude mappings that still name a column are kept,
    /// otherwise they are detected again; other mappings to vanished columns
    /// are cleared. Units are re-derived and re-sent.
    pub fn update_data(&mut self, table: Table) -> WwtResult<()> {
        let payload = encode_table(&table)?;
        self.table = table;
        self.sender.send(
            Message::new("table_layer_update")
                .with("id", self.id.as_str())
                .with("table", payload),
        )?;
        tracing::info!("updated table layer {} ({} rows)", self.id, self.table.num_rows());

        let names: Vec<String> = self.table.column_names().iter().map(|s| s.to_string()).collect();
        let (lon_guess, lat_guess) = guess_lon_lat_columns(&names);
        let keep = |current: Option<&str>| {
            current
                .filter(|c| names.iter().any(|n| n == c))
                .map(str::to_string)
        };

        let lon = keep(self.model.get_str("lon_att"))
            .or(lon_guess)
            .or_else(|| names.first().cloned());
        let lat = keep(self.model.get_str("lat_att"))
            .or(lat_guess)
            .or_else(|| names.get(1).cloned());
        self.model.set("lon_att", lon.as_deref())?;
        self.model.set("lat_att", lat.as_deref())?;

        for name in COLUMN_ATTRIBUTES.iter().skip(2) {
            let stale = self
                .model
                .get_str(name)
                .map(|c| !self.table.has_column(c))
                .unwrap_or(false);
            if stale {
                self.set(name, AttrValue::None)?;
            }
        }

        self.adopt_column_unit("lon_att", "lon_unit", &LON_UNITS)?;
        if self.model.get_str("alt_att").is_some() {
            self.adopt_column_unit("alt_att", "alt_unit", &ALT_UNITS)?;
        }
        Ok(())
    }

    /// Engine-facing settings, including the derived colormap and size state
    pub fn wire_settings(&self) -> Map<String, Value> {
        let mut settings = self.model.remote_settings();
        for (name, value) in self.colormap_settings().into_iter().chain(self.size_settings()) {
            settings.insert(name.to_string(), value);
        }
        settings
    }

    pub(crate) fn remove(self) -> WwtResult<()> {
        self.sender
            .send(Message::new("table_layer_remove").with("id", self.id.as_str()))?;
        tracing::info!("removed table layer {}", self.id);
        Ok(())
    }

    fn resolve_mapping(&mut self, attrs: &Attrs) -> WwtResult<()> {
        let names: Vec<String> = self.table.column_names().iter().map(|s| s.to_string()).collect();
        let (lon_guess, lat_guess) = guess_lon_lat_columns(&names);

        if !attrs.contains("lon_att") {
            let lon = lon_guess.or_else(|| names.first().cloned());
            self.model.set("lon_att", lon.as_deref())?;
        }
        if !attrs.contains("lat_att") {
            let lat = lat_guess.or_else(|| names.get(1).cloned());
            self.model.set("lat_att", lat.as_deref())?;
        }
        // Units below are read from these columns
        for name in ["lon_att", "alt_att"] {
            if let Some(value) = attrs.get(name) {
                self.model.set(name, value.clone())?;
            }
        }

        if !attrs.contains("lon_unit") {
            self.adopt_column_unit("lon_att", "lon_unit", &LON_UNITS)?;
        }
        if !attrs.contains("alt_unit") && self.model.get_str("alt_att").is_some() {
            self.adopt_column_unit("alt_att", "alt_unit", &ALT_UNITS)?;
        }
        Ok(())
    }

    /// Take a unit attribute from the mapped column's metadata
    ///
    /// Columns without a unit keep the current value; columns with a unit
    /// outside the accepted set fall back to the attribute's default.
    fn adopt_column_unit(
        &mut self,
        column_attr: &str,
        unit_attr: &str,
        choice: &UnitChoice,
    ) -> WwtResult<()> {
        let current = self.model.get(unit_attr).cloned().unwrap_or(AttrValue::None);
        let symbol = self
            .model
            .get_str(column_attr)
            .and_then(|column| self.table.unit(column))
            .map(str::to_string);

        let Some(symbol) = symbol else {
            return self.model.set(unit_attr, current);
        };

        match Unit::lookup(&symbol).map(|unit| choice.canonicalize(&unit)) {
            Some(Ok(unit)) => self.model.set(unit_attr, unit),
            _ => {
                let default = self.model.spec(unit_attr)?.default.clone();
                tracing::warn!(
                    "column unit '{}' is not valid for {} (should be one of {}), using {}",
                    symbol,
                    unit_attr,
                    choice.allowed(),
                    default
                );
                self.model.set(unit_attr, default)
            }
        }
    }

    fn autoscale(&mut self, column_attr: &str, vmin_attr: &str, vmax_attr: &str) -> WwtResult<()> {
        let range = self
            .model
            .get_str(column_attr)
            .and_then(|column| self.table.column(column))
            .and_then(|data| data.finite_range());
        if let Some((lo, hi)) = range {
            self.model.set(vmin_attr, lo)?;
            self.model.set(vmax_attr, hi)?;
        }
        Ok(())
    }

    fn colormap_settings(&self) -> Vec<(&'static str, Value)> {
        let mapped = self.model.get_str("cmap_att").is_some();
        let bound =
            |name: &str| self.model.get(name).map(AttrValue::to_json).unwrap_or(Value::Null);
        vec![
            ("_colorMap", Value::from(if mapped { 3 } else { 0 })),
            ("colorMapperName", Value::from(self.model.get_str("cmap").unwrap_or("viridis"))),
            ("normalizeColorMap", Value::Bool(mapped)),
            ("normalizeColorMapMin", bound("cmap_vmin")),
            ("normalizeColorMapMax", bound("cmap_vmax")),
        ]
    }

    fn size_settings(&self) -> Vec<(&'static str, Value)> {
        let mapped = self.model.get_str("size_att").is_some();
        let bound =
            |name: &str| self.model.get(name).map(AttrValue::to_json).unwrap_or(Value::Null);
        vec![
            ("pointScaleType", Value::from(if mapped { 0 } else { 4 })),
            ("normalizeSize", Value::Bool(mapped)),
            ("normalizeSizeClip", Value::Bool(false)),
            ("normalizeSizeMin", bound("size_vmin")),
            ("normalizeSizeMax", bound("size_vmax")),
        ]
    }

    fn send_settings(&self, settings: Vec<(&'static str, Value)>) -> WwtResult<()> {
        for (name, value) in settings {
            self.sender
                .send(SetContext::TableLayer.message(Some(self.id.as_str()), name, value))?;
        }
        Ok(())
    }

    fn send_colormap_state(&self) -> WwtResult<()> {
        self.send_settings(self.colormap_settings())
    }

    fn send_size_state(&self) -> WwtResult<()> {
        self.send_settings(self.size_settings())
    }
}

impl fmt::Display for TableLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<TableLayer with {} markers>", self.table.num_rows())
    }
}
