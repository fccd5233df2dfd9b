//! Imagery catalogs
//!
//! The engine knows imagery by name. The client keeps the names it can
//! offer for foreground and background, seeded with the standard surveys
//! and extended by WTML collections fetched through the host.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

use crate::error::{WwtError, WwtResult};

/// Foreground used by the 3-D view modes
pub const SOLAR_SYSTEM_IMAGERY: &str = "3D Solar System View";

/// Surveys every engine ships with
pub const BUILTIN_SURVEYS: &[&str] = &[
    "2Mass: Imagery (Infrared)",
    "Digitized Sky Survey (Color)",
    "Fermi LAT 8-year (gamma)",
    "GALEX (Ultraviolet)",
    "Hydrogen Alpha Full Sky Map",
    "Planck CMB",
    "SDSS: Sloan Digital Sky Survey (Optical)",
    "Tycho (Synthetic, Optical)",
    "USNOB: US Naval Observatory B 1.0 (Synthetic, Optical)",
    "WISE All Sky (Infrared)",
    "WMAP ILC 5-Year Cosmic Microwave Background",
    SOLAR_SYSTEM_IMAGERY,
];

/// One named imagery set
#[derive(Clone, Debug, PartialEq)]
pub struct ImageryEntry {
    pub name: String,
    pub thumbnail: Option<String>,
}

/// Host-side access to WTML documents
pub trait ImageryCatalog {
    /// Fetch the WTML document at `url`
    fn fetch_wtml(&self, url: &str) -> WwtResult<String>;
}

/// Catalog serving documents registered ahead of time
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    documents: HashMap<String, String>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: impl Into<String>, xml: impl Into<String>) -> Self {
        self.documents.insert(url.into(), xml.into());
        self
    }
}

impl ImageryCatalog for InMemoryCatalog {
    fn fetch_wtml(&self, url: &str) -> WwtResult<String> {
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| WwtError::Transport(format!("no imagery collection at {}", url)))
    }
}

fn name_attribute(element: &BytesStart<'_>) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == b"Name")
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.to_string()))
}

/// Extract `ImageSet` names and thumbnails from a WTML document
pub fn parse_wtml(xml: &str) -> WwtResult<Vec<ImageryEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut entries = Vec::new();
    let mut buf = Vec::new();
    let mut current: Option<ImageryEntry> = None;
    let mut in_thumbnail = false;
    let mut unnamed = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"ImageSet" => match name_attribute(e) {
                    Some(name) => current = Some(ImageryEntry { name, thumbnail: None }),
                    None => unnamed += 1,
                },
                b"ThumbnailUrl" => in_thumbnail = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"ImageSet" {
                    match name_attribute(e) {
                        Some(name) => entries.push(ImageryEntry { name, thumbnail: None }),
                        None => unnamed += 1,
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if in_thumbnail {
                    if let Some(entry) = current.as_mut() {
                        let text = e.unescape().unwrap_or_default().to_string();
                        entry.thumbnail = Some(text);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"ImageSet" => entries.extend(current.take()),
                b"ThumbnailUrl" => in_thumbnail = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(WwtError::Wtml(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    if unnamed > 0 {
        tracing::warn!("skipped {} ImageSet element(s) without a Name", unnamed);
    }
    Ok(entries)
}

/// Imagery names available for foreground and background
#[derive(Clone, Debug)]
pub struct AvailableImagery {
    entries: Vec<ImageryEntry>,
}

impl Default for AvailableImagery {
    fn default() -> Self {
        Self {
            entries: BUILTIN_SURVEYS
                .iter()
                .map(|name| ImageryEntry {
                    name: name.to_string(),
                    thumbnail: None,
                })
                .collect(),
        }
    }
}

impl AvailableImagery {
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&ImageryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Add entries; a known name keeps its place and gains a thumbnail if it had none
    pub fn merge(&mut self, entries: Vec<ImageryEntry>) -> usize {
        let mut added = 0;
        for entry in entries {
            match self.entries.iter_mut().find(|e| e.name == entry.name) {
                Some(existing) => {
                    if existing.thumbnail.is_none() {
                        existing.thumbnail = entry.thumbnail;
                    }
                }
                None => {
                    self.entries.push(entry);
                    added += 1;
                }
            }
        }
        added
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
