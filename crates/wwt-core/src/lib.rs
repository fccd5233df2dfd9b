//! wwt-core - State synchronization for WorldWide Telescope clients
//!
//! This crate keeps a typed, validated mirror of a WWT view on the host side
//! and turns every change into a declarative message for the rendering
//! engine. The same mirrored state serializes to a JSON state document that
//! rebuilds the view without the original session.
//!
//! # Key Components
//!
//! - **WwtClient**: root settings, camera, imagery, time and view modes
//! - **Model / AttributeSpec**: static attribute tables with validation and units
//! - **MessageSender / Transport**: readiness-aware, order-preserving delivery
//! - **Annotation / FieldOfView**: circles, polygons, lines, collections and
//!   instrument footprints
//! - **LayerManager**: table and image data layers
//! - **StateDocument**: serialized view, replayable as messages
//! - **EngineMirror**: in-memory engine for checking live and serialized state
//!
//! # Ordering
//!
//! Messages are sent synchronously in call order. Before the engine signals
//! readiness they are queued and later flushed as one batch.

pub mod annotation;
pub mod attributes;
pub mod client;
pub mod color;
pub mod config;
pub mod coords;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod fov;
pub mod imagery;
pub mod layers;
pub mod logging;
pub mod mirror;
pub mod solar_system;
pub mod state;
pub mod transport;
pub mod units;

pub use annotation::{Annotation, AnnotationId, Shape};
pub use attributes::{AttrType, AttrValue, AttributeSpec, Attrs, Model};
pub use client::WwtClient;
pub use color::Color;
pub use config::WwtConfig;
pub use coords::SkyCoord;
pub use error::{WwtError, WwtResult};
pub use export::{save_html_bundle, BundleOptions, BundleResult};
pub use fov::{BuiltinFootprints, FieldOfView, Footprint, FootprintCatalog, FovId};
pub use imagery::{parse_wtml, ImageryCatalog, ImageryEntry, InMemoryCatalog};
pub use layers::{Frame, ImageLayer, ImageSource, Layer, LayerId, LayerManager, TableLayer};
pub use logging::init_logging;
pub use mirror::EngineMirror;
pub use solar_system::SolarSystem;
pub use state::{HtmlSettings, StateDocument};
pub use transport::{
    ChannelTransport, HostRequest, Message, MessageSender, RecordingTransport, Transport,
    ViewField,
};
pub use units::{Dimension, Quantity, Unit};

// Re-exported so hosts can build tables and images without a direct dependency
pub use wwt_io;
