//! wwt-io - Data I/O for WWT layers
//!
//! This crate provides the data containers that table and image layers bind
//! to, plus readers for the formats those layers are usually fed from:
//!
//! - **Tables**: named columns with optional physical units
//! - **CSV**: comma-separated values with type inference and `name [unit]` headers
//! - **FITS**: primary-HDU 2-D images with a simple celestial WCS (`fits` feature)
//!
//! # Design
//!
//! Tabular readers implement the `DataReader` trait for uniform access.
//! Tables are serialized for the engine as CRLF-terminated CSV.

pub mod image;
pub mod reader;
pub mod schema;
pub mod table;

#[cfg(feature = "csv")]
pub mod csv_reader;

#[cfg(feature = "fits")]
pub mod fits;

pub use image::*;
pub use reader::*;
pub use schema::*;
pub use table::*;
