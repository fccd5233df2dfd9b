//! The WWT client
//!
//! [`WwtClient`] is the root of a view. It owns:
//! - the root settings model, mirrored as `setting_set` messages
//! - the solar system settings used by the 3-D modes
//! - the live annotations and fields of view
//! - the layer manager
//! - a cached copy of the camera and imagery state, so serializing never
//!   talks to the engine
//!
//! Every entity shares the client's [`MessageSender`], so messages reach the
//! engine in exactly the order the calls were made.

use chrono::{DateTime, NaiveDateTime, Utc};
use lazy_static::lazy_static;

use crate::annotation::{Annotation, AnnotationId, Shape};
use crate::attributes::{
    validate_color, AttrType, AttrValue, AttributeSpec, Attrs, Model, Validated,
};
use crate::config::WwtConfig;
use crate::coords::SkyCoord;
use crate::dispatch::{Dispatcher, SetContext};
use crate::error::{WwtError, WwtResult};
use crate::fov::{BuiltinFootprints, FieldOfView, FootprintCatalog, FovId};
use crate::imagery::{parse_wtml, AvailableImagery, ImageryCatalog, SOLAR_SYSTEM_IMAGERY};
use crate::layers::LayerManager;
use crate::solar_system::SolarSystem;
use crate::state::{ForegroundSettings, HtmlSettings, StateDocument, ViewSettings};
use crate::transport::{Message, MessageSender, Transport, ViewField};
use crate::units::{Quantity, Unit};

/// Mode recorded when the camera looks at a planet
pub const PLANET_MODE: &str = "planet";

/// Modes shown by the 2-D engine; everything except `sky` and `panorama` is a planet
pub const VIEW_MODES_2D: &[&str] = &[
    "sky", "sun", "mercury", "venus", "earth", "moon", "mars", "jupiter", "callisto", "europa",
    "ganymede", "io", "saturn", "uranus", "neptune", "pluto", "panorama",
];

/// Modes shown by the 3-D engine
pub const VIEW_MODES_3D: &[&str] = &["solar system", "milky way", "universe"];

pub fn is_3d_mode(mode: &str) -> bool {
    VIEW_MODES_3D.contains(&mode)
}

fn quantity_in(value: &AttrValue, unit: Unit, message: &str) -> Result<Validated, String> {
    value
        .as_quantity()
        .and_then(|q| q.to(&unit))
        .map(Validated::value)
        .ok_or_else(|| message.to_string())
}

fn validate_altitude(value: &AttrValue) -> Result<Validated, String> {
    quantity_in(value, Unit::m(), "location_altitude must be a length")
}

fn validate_latitude(value: &AttrValue) -> Result<Validated, String> {
    quantity_in(value, Unit::deg(), "location_latitude must be an angle")
}

fn validate_longitude(value: &AttrValue) -> Result<Validated, String> {
    quantity_in(value, Unit::deg(), "location_longitude must be an angle")
}

fn validate_fraction(value: &AttrValue) -> Result<Validated, String> {
    match value.as_f64() {
        Some(v) if (0.0..=1.0).contains(&v) => Ok(Validated::value(v)),
        _ => Err(format!("foreground_opacity must be between 0 and 1, got {}", value)),
    }
}

fn flag(name: &'static str, remote: &'static str) -> AttributeSpec {
    AttributeSpec::new(name, AttrType::Bool, false).remote(remote).reset_flag()
}

fn color(name: &'static str, remote: &'static str, default: &'static str) -> AttributeSpec {
    AttributeSpec::new(name, AttrType::Color, default)
        .remote(remote)
        .validator(validate_color)
        .reset_flag()
}

lazy_static! {
    static ref ROOT_ATTRIBUTES: Vec<AttributeSpec> = vec![
        flag("actual_planet_scale", "actualPlanetScale"),
        flag("alt_az_grid", "showAltAzGrid"),
        color("alt_az_grid_color", "altAzGridColor", "#800080"),
        flag("alt_az_text", "showAltAzGridText"),
        flag("constellation_boundaries", "showConstellationBoundries"),
        color("constellation_boundary_color", "constellationBoundryColor", "#0000ff"),
        flag("constellation_figures", "showConstellationFigures"),
        color("constellation_figure_color", "constellationFigureColor", "#ff0000"),
        flag("constellation_labels", "showConstellationLabels"),
        flag("constellation_pictures", "showConstellationPictures"),
        flag("constellation_selection", "showConstellationSelection"),
        color("constellation_selection_color", "constellationSelectionColor", "#ffff00"),
        flag("crosshairs", "showCrosshairs"),
        color("crosshairs_color", "crosshairsColor", "#ffffff"),
        flag("ecliptic", "showEcliptic"),
        color("ecliptic_color", "eclipticColor", "#0000ff"),
        flag("ecliptic_grid", "showEclipticGrid"),
        color("ecliptic_grid_color", "eclipticGridColor", "#008000"),
        flag("ecliptic_text", "showEclipticGridText"),
        flag("galactic_grid", "showGalacticGrid"),
        color("galactic_grid_color", "galacticGridColor", "#ffff00"),
        flag("galactic_mode", "galacticMode"),
        flag("galactic_text", "showGalacticGridText"),
        flag("grid", "showGrid"),
        color("grid_color", "equatorialGridColor", "#ffffff"),
        flag("grid_text", "showEquatorialGridText"),
        flag("local_horizon_mode", "localHorizonMode"),
        AttributeSpec::new("location_altitude", AttrType::Quantity, Quantity::new(0.0, Unit::m()))
            .remote("locationAltitude")
            .validator(validate_altitude)
            .reset_flag(),
        AttributeSpec::new("location_latitude", AttrType::Quantity, Quantity::deg(47.633))
            .remote("locationLat")
            .validator(validate_latitude)
            .reset_flag(),
        AttributeSpec::new("location_longitude", AttrType::Quantity, Quantity::deg(122.1333))
            .remote("locationLng")
            .validator(validate_longitude)
            .reset_flag(),
        flag("precession_chart", "showPrecessionChart"),
        color("precession_chart_color", "precessionChartColor", "#ffa500"),
        AttributeSpec::new("foreground_opacity", AttrType::Float, 0.8).validator(validate_fraction),
    ];
}

/// Cached camera state
#[derive(Clone, Debug, PartialEq)]
struct ViewState {
    mode: String,
    body: Option<String>,
    center: SkyCoord,
    fov: f64,
}

/// Root of a WWT view
pub struct WwtClient {
    config: WwtConfig,
    sender: MessageSender,
    settings: Model,
    solar_system: SolarSystem,
    layers: LayerManager,
    annotations: Vec<Annotation>,
    fovs: Vec<FieldOfView>,
    footprints: Box<dyn FootprintCatalog>,
    imagery: AvailableImagery,
    view: ViewState,
    foreground: String,
    background: String,
}

impl WwtClient {
    /// Create a client; nothing is sent until the first operation
    pub fn new(transport: Box<dyn Transport>, config: WwtConfig) -> WwtResult<Self> {
        config.validate()?;
        let sender = MessageSender::new(transport, !config.transport.queue_until_ready);

        let mut settings = Model::new("WWT", &ROOT_ATTRIBUTES);
        settings.set("foreground_opacity", config.view.default_foreground_opacity)?;
        settings.observe(Box::new(Dispatcher::global(SetContext::Setting, sender.clone())));

        let layers = LayerManager::new(sender.clone(), config.export.data_dir_name.clone());
        Ok(Self {
            solar_system: SolarSystem::new(&sender),
            layers,
            annotations: Vec::new(),
            fovs: Vec::new(),
            footprints: Box::new(BuiltinFootprints),
            imagery: AvailableImagery::default(),
            view: ViewState {
                mode: "sky".to_string(),
                body: None,
                center: SkyCoord::default(),
                fov: config.view.default_fov_deg,
            },
            foreground: config.view.default_foreground.clone(),
            background: config.view.default_background.clone(),
            settings,
            sender,
            config,
        })
    }

    /// Use another source of instrument footprints
    pub fn with_footprints(mut self, catalog: Box<dyn FootprintCatalog>) -> Self {
        self.footprints = catalog;
        self
    }

    pub fn config(&self) -> &WwtConfig {
        &self.config
    }

    /// The engine is up; flush everything queued so far
    pub fn signal_ready(&self) -> WwtResult<()> {
        self.sender.signal_ready()
    }

    pub fn is_ready(&self) -> bool {
        self.sender.is_ready()
    }

    // ===== Root settings =====

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.settings.get(name)
    }

    /// Write a root setting
    ///
    /// `foreground_opacity` is sent as its own message carrying a percentage.
    pub fn set(&mut self, name: &str, value: impl Into<AttrValue>) -> WwtResult<()> {
        self.settings.set(name, value)?;
        if name == "foreground_opacity" {
            self.sender.send(
                Message::new("set_foreground_opacity")
                    .with("value", self.foreground_opacity() * 100.0),
            )?;
        }
        Ok(())
    }

    pub fn settings(&self) -> &Model {
        &self.settings
    }

    /// Clear annotations, restore reset-flagged settings and recenter
    pub fn reset(&mut self) -> WwtResult<()> {
        self.clear_annotations()?;
        self.settings.reset()?;
        let fov = self.config.view.default_fov_deg;
        self.center_on_coordinates(SkyCoord::default(), Some(fov), true)
    }

    // ===== Camera =====

    /// Point the camera; `fov` in degrees, `None` keeps the current one
    pub fn center_on_coordinates(
        &mut self,
        center: SkyCoord,
        fov: Option<f64>,
        instant: bool,
    ) -> WwtResult<()> {
        let fov = fov.unwrap_or(self.view.fov);
        if !(fov.is_finite() && fov > 0.0) {
            return Err(WwtError::validation(
                "fov",
                format!("fov must be a positive angle, got {}", fov),
            ));
        }

        self.sender.send(
            Message::new("center_on_coordinates")
                .with("ra", center.ra)
                .with("dec", center.dec)
                .with("fov", fov)
                .with("instant", instant),
        )?;
        self.view.center = center;
        self.view.fov = fov;
        Ok(())
    }

    /// Read the camera center back from the engine
    pub fn get_center(&mut self) -> WwtResult<SkyCoord> {
        let ra = self.read_number(ViewField::Ra)?;
        let dec = self.read_number(ViewField::Dec)?;
        self.view.center = SkyCoord::new(ra, dec);
        Ok(self.view.center)
    }

    /// Read the field of view back from the engine, degrees
    pub fn get_fov(&mut self) -> WwtResult<f64> {
        self.view.fov = self.read_number(ViewField::Fov)?;
        Ok(self.view.fov)
    }

    /// Read the engine clock
    pub fn get_current_time(&self) -> WwtResult<DateTime<Utc>> {
        let value = self
            .sender
            .read_view_field(ViewField::Datetime, self.config.transport.request_timeout())?;
        let text = value
            .as_str()
            .ok_or_else(|| {
                WwtError::Transport(format!("engine returned a non-string datetime: {}", value))
            })?;
        parse_engine_time(text)
    }

    /// Last known center, without asking the engine
    pub fn cached_center(&self) -> SkyCoord {
        self.view.center
    }

    pub fn cached_fov(&self) -> f64 {
        self.view.fov
    }

    fn read_number(&self, field: ViewField) -> WwtResult<f64> {
        let value = self
            .sender
            .read_view_field(field, self.config.transport.request_timeout())?;
        value.as_f64().ok_or_else(|| {
            WwtError::Transport(format!(
                "engine returned a non-numeric '{}': {}",
                field.as_str(),
                value
            ))
        })
    }

    // ===== Time and tours =====

    /// Set the engine clock; `None` means now
    pub fn set_current_time(&self, time: Option<DateTime<Utc>>) -> WwtResult<()> {
        let time = time.unwrap_or_else(Utc::now);
        let isot = time.format("%Y-%m-%dT%H:%M:%S%.3f").to_string();
        self.sender.send(Message::new("set_datetime").with("isot", isot))
    }

    pub fn pause_time(&self) -> WwtResult<()> {
        self.sender.send(Message::new("pause_time"))
    }

    /// Run the clock at `rate` times real time
    pub fn play_time(&self, rate: f64) -> WwtResult<()> {
        self.sender.send(Message::new("resume_time").with("rate", rate))
    }

    pub fn load_tour(&self, url: &str) -> WwtResult<()> {
        self.sender.send(Message::new("load_tour").with("url", url))
    }

    pub fn pause_tour(&self) -> WwtResult<()> {
        self.sender.send(Message::new("pause_tour"))
    }

    pub fn resume_tour(&self) -> WwtResult<()> {
        self.sender.send(Message::new("resume_tour"))
    }

    // ===== Imagery =====

    /// Load a WTML collection and offer its imagery; returns how many names were new
    pub fn load_image_collection(
        &mut self,
        url: &str,
        catalog: &dyn ImageryCatalog,
    ) -> WwtResult<usize> {
        let entries = parse_wtml(&catalog.fetch_wtml(url)?)?;
        self.sender.send(Message::new("load_image_collection").with("url", url))?;
        let added = self.imagery.merge(entries);
        tracing::info!("loaded image collection {} ({} new)", url, added);
        Ok(added)
    }

    pub fn available_imagery(&self) -> &AvailableImagery {
        &self.imagery
    }

    pub fn foreground(&self) -> &str {
        &self.foreground
    }

    pub fn background(&self) -> &str {
        &self.background
    }

    /// Foreground opacity, 0 to 1
    pub fn foreground_opacity(&self) -> f64 {
        self.settings.get_f64("foreground_opacity").unwrap_or(0.8)
    }

    pub fn set_foreground(&mut self, name: &str) -> WwtResult<()> {
        self.check_imagery("foreground", name)?;
        self.sender
            .send(Message::new("set_foreground_by_name").with("name", name))?;
        self.foreground = name.to_string();
        Ok(())
    }

    pub fn set_background(&mut self, name: &str) -> WwtResult<()> {
        self.check_imagery("background", name)?;
        self.sender
            .send(Message::new("set_background_by_name").with("name", name))?;
        self.background = name.to_string();
        Ok(())
    }

    /// Opacity as a percentage, like the engine takes it
    pub fn set_foreground_opacity(&mut self, percent: f64) -> WwtResult<()> {
        self.set("foreground_opacity", percent / 100.0)
    }

    fn check_imagery(&self, attribute: &str, name: &str) -> WwtResult<()> {
        if self.imagery.contains(name) {
            Ok(())
        } else {
            Err(WwtError::validation(
                attribute,
                format!("'{}' is not in the available imagery", name),
            ))
        }
    }

    // ===== View modes =====

    /// Switch the viewer between sky, planet, panorama and 3-D modes
    pub fn set_view(&mut self, mode: &str) -> WwtResult<()> {
        let mode = mode.to_lowercase();
        if is_3d_mode(&mode) {
            self.sender
                .send(Message::new("set_viewer_mode").with("mode", "sky"))?;
            self.sender
                .send(Message::new("set_foreground_by_name").with("name", SOLAR_SYSTEM_IMAGERY))?;
            self.foreground = SOLAR_SYSTEM_IMAGERY.to_string();
            self.view.body = None;
        } else if VIEW_MODES_2D.contains(&mode.as_str()) {
            self.sender
                .send(Message::new("set_viewer_mode").with("mode", mode.as_str()))?;
            if mode != "sky" && mode != "panorama" {
                tracing::debug!("viewing planet {}", mode);
                self.view.body = Some(mode);
                self.view.mode = PLANET_MODE.to_string();
                return Ok(());
            }
            self.view.body = None;
        } else {
            let modes: Vec<&str> = VIEW_MODES_2D.iter().chain(VIEW_MODES_3D).copied().collect();
            return Err(WwtError::validation(
                "mode",
                format!("mode should be one of {}", modes.join("/")),
            ));
        }
        self.view.mode = mode;
        Ok(())
    }

    /// Recorded view mode: `sky`, `panorama`, `planet` or a 3-D mode
    pub fn view_mode(&self) -> &str {
        &self.view.mode
    }

    // ===== Annotations =====

    /// Circle at `center`, or at the camera center
    pub fn add_circle(
        &mut self,
        center: Option<SkyCoord>,
        attrs: &Attrs,
    ) -> WwtResult<AnnotationId> {
        let mut circle = Annotation::create(Shape::Circle, &self.sender, attrs)?;
        circle.set_center(center.unwrap_or(self.view.center))?;
        Ok(self.push_annotation(circle))
    }

    pub fn add_polygon(&mut self, points: &[SkyCoord], attrs: &Attrs) -> WwtResult<AnnotationId> {
        let mut polygon = Annotation::create(Shape::Polygon, &self.sender, attrs)?;
        polygon.add_points(points)?;
        Ok(self.push_annotation(polygon))
    }

    pub fn add_line(&mut self, points: &[SkyCoord], attrs: &Attrs) -> WwtResult<AnnotationId> {
        let mut line = Annotation::create(Shape::Line, &self.sender, attrs)?;
        line.add_points(points)?;
        Ok(self.push_annotation(line))
    }

    /// Many circles sharing one style; needs at least two centers
    pub fn add_circle_collection(
        &mut self,
        centers: &[SkyCoord],
        attrs: &Attrs,
    ) -> WwtResult<AnnotationId> {
        if centers.len() < 2 {
            return Err(WwtError::validation(
                "centers",
                format!("a circle collection needs at least 2 centers, got {}", centers.len()),
            ));
        }
        let mut collection = Annotation::create(Shape::CircleCollection, &self.sender, attrs)?;
        collection.add_collection_centers(centers)?;
        Ok(self.push_annotation(collection))
    }

    fn push_annotation(&mut self, annotation: Annotation) -> AnnotationId {
        let id = annotation.id().clone();
        self.annotations.push(annotation);
        id
    }

    /// Live annotations, in creation order
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotation(&self, id: &AnnotationId) -> WwtResult<&Annotation> {
        self.annotations
            .iter()
            .find(|a| a.id() == id)
            .ok_or_else(|| WwtError::stale("Annotation", id.as_str()))
    }

    pub fn annotation_mut(&mut self, id: &AnnotationId) -> WwtResult<&mut Annotation> {
        self.annotations
            .iter_mut()
            .find(|a| a.id() == id)
            .ok_or_else(|| WwtError::stale("Annotation", id.as_str()))
    }

    /// Remove one annotation; later use of its id fails as stale
    pub fn remove_annotation(&mut self, id: &AnnotationId) -> WwtResult<()> {
        let index = self
            .annotations
            .iter()
            .position(|a| a.id() == id)
            .ok_or_else(|| WwtError::stale("Annotation", id.as_str()))?;
        self.annotations.remove(index).remove()?;
        for fov in self.fovs.iter_mut() {
            fov.panels.retain(|panel| panel != id);
        }
        Ok(())
    }

    /// Drop every annotation and field of view with one message
    pub fn clear_annotations(&mut self) -> WwtResult<()> {
        self.sender.send(Message::new("clear_annotations"))?;
        tracing::info!(
            "cleared {} annotation(s) and {} field(s) of view",
            self.annotations.len(),
            self.fovs.len()
        );
        self.annotations.clear();
        self.fovs.clear();
        Ok(())
    }

    // ===== Fields of view =====

    /// Draw an instrument footprint; `rotation` is the position angle in degrees
    pub fn add_fov(
        &mut self,
        telescope: &str,
        center: Option<SkyCoord>,
        rotation: f64,
        attrs: &Attrs,
    ) -> WwtResult<FovId> {
        let footprint = self.footprints.footprint(telescope)?;
        Model::new(Shape::Polygon.kind(), Shape::Polygon.specs()).check_attrs(attrs)?;

        let center = center.unwrap_or(self.view.center);
        let mut panels = Vec::with_capacity(footprint.panels.len());
        for corners in footprint.corners_at(center, rotation) {
            match self.add_polygon(&corners, attrs) {
                Ok(panel) => panels.push(panel),
                Err(err) => return Err(self.abandon_panels(&panels, err)),
            }
        }

        let fov = FieldOfView {
            id: FovId::generate(),
            footprint,
            center,
            rotation,
            panels,
        };
        let id = fov.id.clone();
        tracing::info!("added {} field of view {}", fov.telescope(), id);
        self.fovs.push(fov);
        Ok(id)
    }

    pub fn fovs(&self) -> &[FieldOfView] {
        &self.fovs
    }

    pub fn fov(&self, id: &FovId) -> WwtResult<&FieldOfView> {
        self.fovs
            .iter()
            .find(|f| f.id() == id)
            .ok_or_else(|| WwtError::stale("FieldOfView", id.as_str()))
    }

    /// Move a field of view, rebuilding its panels
    pub fn fov_set_center(&mut self, id: &FovId, center: SkyCoord) -> WwtResult<()> {
        let rotation = self.fov(id)?.rotation;
        self.rebuild_fov(id, center, rotation)
    }

    /// Turn a field of view, rebuilding its panels
    pub fn fov_set_rotation(&mut self, id: &FovId, rotation: f64) -> WwtResult<()> {
        let center = self.fov(id)?.center;
        self.rebuild_fov(id, center, rotation)
    }

    /// New panels are drawn before the old ones go, so a failure leaves the
    /// field of view as it was
    fn rebuild_fov(&mut self, id: &FovId, center: SkyCoord, rotation: f64) -> WwtResult<()> {
        let index = self
            .fovs
            .iter()
            .position(|f| f.id() == id)
            .ok_or_else(|| WwtError::stale("FieldOfView", id.as_str()))?;
        let corners = self.fovs[index].footprint.corners_at(center, rotation);
        let old_panels = self.fovs[index].panels.clone();

        let mut panels = Vec::with_capacity(old_panels.len());
        for (panel_id, corners) in old_panels.iter().zip(corners) {
            let Ok(styling) = self.annotation(panel_id).map(|a| a.model().non_default()) else {
                continue;
            };
            match self.add_polygon(&corners, &styling) {
                Ok(panel) => panels.push(panel),
                Err(err) => return Err(self.abandon_panels(&panels, err)),
            }
        }

        let fov = &mut self.fovs[index];
        fov.panels = panels;
        fov.center = center;
        fov.rotation = rotation;
        self.remove_panels(&old_panels)
    }

    /// Remove a field of view and all of its panels
    pub fn remove_fov(&mut self, id: &FovId) -> WwtResult<()> {
        let index = self
            .fovs
            .iter()
            .position(|f| f.id() == id)
            .ok_or_else(|| WwtError::stale("FieldOfView", id.as_str()))?;
        let fov = self.fovs.remove(index);
        tracing::info!("removed field of view {}", id);
        self.remove_panels(&fov.panels)
    }

    /// Drop panel annotations, carrying on past failed sends; the first error wins
    fn remove_panels(&mut self, panels: &[AnnotationId]) -> WwtResult<()> {
        let mut first_error = None;
        for panel in panels {
            if let Some(position) = self.annotations.iter().position(|a| a.id() == panel) {
                if let Err(err) = self.annotations.remove(position).remove() {
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Undo a partly drawn set of panels and hand back the error that stopped it
    fn abandon_panels(&mut self, panels: &[AnnotationId], err: WwtError) -> WwtError {
        if let Err(cleanup) = self.remove_panels(panels) {
            tracing::warn!("could not remove {} partial panel(s): {}", panels.len(), cleanup);
        }
        err
    }

    // ===== Layers and solar system =====

    pub fn layers(&self) -> &LayerManager {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut LayerManager {
        &mut self.layers
    }

    pub fn solar_system(&self) -> &SolarSystem {
        &self.solar_system
    }

    pub fn solar_system_mut(&mut self) -> &mut SolarSystem {
        &mut self.solar_system
    }

    // ===== Serialization =====

    /// Snapshot of the whole view from mirrored state
    pub fn serialize(&self, html: HtmlSettings) -> StateDocument {
        let in_3d = is_3d_mode(&self.view.mode);

        let mut wwt_settings = self.settings.remote_settings();
        if in_3d {
            wwt_settings.extend(self.solar_system.wire_settings());
        }

        StateDocument {
            html_settings: html,
            wwt_settings,
            view_settings: ViewSettings {
                mode: self.view.mode.clone(),
                body: self.view.body.clone(),
                ra: self.view.center.ra,
                dec: self.view.center.dec,
                fov: self.view.fov,
                tracked_object_id: if in_3d { self.solar_system.tracked_object() } else { None },
            },
            foreground_settings: ForegroundSettings {
                foreground: self.foreground.clone(),
                background: self.background.clone(),
                foreground_alpha: self.foreground_opacity() * 100.0,
            },
            layers: self.layers.serialize(),
            annotations: self.annotations.iter().map(Annotation::serialize).collect(),
        }
    }
}

/// Engine datetimes are ISO 8601, with or without an offset
fn parse_engine_time(text: &str) -> WwtResult<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Ok(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| {
            WwtError::Transport(format!("engine returned an invalid datetime '{}': {}", text, e))
        })
}
