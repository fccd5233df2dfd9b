//! Shared clients, tables and images for integration tests

#![allow(dead_code)]

use ndarray::Array2;
use serde_json::Value;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use wwt_core::{
    EngineMirror, Message, RecordingTransport, Transport, ViewField, WwtClient, WwtConfig, WwtError,
    WwtResult,
};
use wwt_io::{DataColumn, ImageData, Table, Wcs};

/// Recording transport that drops one delivery on request
#[derive(Clone)]
pub struct FlakyTransport {
    recorder: RecordingTransport,
    fail_after: Rc<Cell<Option<usize>>>,
}

impl FlakyTransport {
    pub fn new(recorder: RecordingTransport) -> Self {
        Self {
            recorder,
            fail_after: Rc::new(Cell::new(None)),
        }
    }

    /// Let `successes` deliveries through, then fail exactly one
    pub fn fail_after(&self, successes: usize) {
        self.fail_after.set(Some(successes));
    }

    fn check(&self) -> WwtResult<()> {
        match self.fail_after.get() {
            Some(0) => {
                self.fail_after.set(None);
                Err(WwtError::Transport("connection dropped".to_string()))
            }
            Some(left) => {
                self.fail_after.set(Some(left - 1));
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Transport for FlakyTransport {
    fn send(&mut self, message: &Message) -> WwtResult<()> {
        self.check()?;
        self.recorder.send(message)
    }

    fn send_batch(&mut self, messages: &[Message]) -> WwtResult<()> {
        self.check()?;
        self.recorder.send_batch(messages)
    }

    fn read_view_field(&mut self, field: ViewField, timeout: Option<Duration>) -> WwtResult<Value> {
        self.recorder.read_view_field(field, timeout)
    }
}

/// Client over a transport that can be told to fail
pub fn flaky_client(ready: bool) -> (WwtClient, FlakyTransport, RecordingTransport) {
    let recorder = RecordingTransport::new();
    let flaky = FlakyTransport::new(recorder.clone());
    let client = WwtClient::new(Box::new(flaky.clone()), WwtConfig::default()).unwrap();
    if ready {
        client.signal_ready().unwrap();
    }
    (client, flaky, recorder)
}

/// Ready client over a recording transport
pub fn recording_client() -> (WwtClient, RecordingTransport) {
    let recorder = RecordingTransport::new()
        .with_view_field(ViewField::Ra, 83.82)
        .with_view_field(ViewField::Dec, -5.39)
        .with_view_field(ViewField::Fov, 1.5);
    let client = WwtClient::new(Box::new(recorder.clone()), WwtConfig::default()).unwrap();
    client.signal_ready().unwrap();
    (client, recorder)
}

/// Client that has not been told the engine is ready
pub fn pending_client() -> (WwtClient, RecordingTransport) {
    let recorder = RecordingTransport::new();
    let client = WwtClient::new(Box::new(recorder.clone()), WwtConfig::default()).unwrap();
    (client, recorder)
}

/// Ready client over an in-memory engine
pub fn mirrored_client() -> (WwtClient, EngineMirror) {
    let mirror = EngineMirror::new();
    let client = WwtClient::new(Box::new(mirror.clone()), WwtConfig::default()).unwrap();
    client.signal_ready().unwrap();
    (client, mirror)
}

/// Small star catalog with ra/dec/flux/distance columns
pub fn star_table(rows: usize) -> Table {
    let ra: Vec<f64> = (0..rows).map(|i| 80.0 + i as f64).collect();
    let dec: Vec<f64> = (0..rows).map(|i| -5.0 + 0.5 * i as f64).collect();
    let flux: Vec<f64> = (0..rows).map(|i| 1.0 + (i % 4) as f64).collect();
    let dist: Vec<f64> = (0..rows).map(|i| 100.0 * (i + 1) as f64).collect();
    Table::new()
        .with_column("flux", Some("Jy"), DataColumn::Float64(flux))
        .unwrap()
        .with_column("ra", Some("deg"), DataColumn::Float64(ra))
        .unwrap()
        .with_column("dec", Some("deg"), DataColumn::Float64(dec))
        .unwrap()
        .with_column("dist", Some("pc"), DataColumn::Float64(dist))
        .unwrap()
}

/// 16x8 gradient centered on Orion
pub fn gradient_image() -> ImageData {
    let data = Array2::from_shape_fn((8, 16), |(y, x)| (x + 16 * y) as f64);
    ImageData::new(data, Wcs::tan(83.82, -5.39, 0.001, [8.0, 4.0]))
}

/// Event names in delivery order
pub fn events(recorder: &RecordingTransport) -> Vec<String> {
    recorder.messages().into_iter().map(|m| m.event).collect()
}
