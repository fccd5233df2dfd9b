//! Solar system settings for the 3-D view modes

use lazy_static::lazy_static;
use serde_json::{Map, Value};

use crate::attributes::{AttrType, AttrValue, AttributeSpec, Model, Validated};
use crate::dispatch::{Dispatcher, SetContext};
use crate::error::{WwtError, WwtResult};
use crate::transport::{Message, MessageSender};

/// Engine codes for objects the camera can follow
pub const OBJECT_CODES: &[(&str, u32)] = &[
    ("sun", 0),
    ("mercury", 1),
    ("venus", 2),
    ("mars", 3),
    ("jupiter", 4),
    ("saturn", 5),
    ("uranus", 6),
    ("neptune", 7),
    ("pluto", 8),
    ("moon", 9),
    ("io", 10),
    ("europa", 11),
    ("ganymede", 12),
    ("callisto", 13),
    ("ioShadow", 14),
    ("europaShadow", 15),
    ("ganymedeShadow", 16),
    ("callistoShadow", 17),
    ("sunEclipsed", 18),
    ("earth", 19),
    ("custom", 20),
    ("undefined", 65536),
];

/// Code for a trackable object name
pub fn object_code(name: &str) -> Option<u32> {
    OBJECT_CODES.iter().find(|(n, _)| *n == name).map(|(_, code)| *code)
}

fn validate_scale(value: &AttrValue) -> Result<Validated, String> {
    match value.as_i64() {
        Some(scale) if (1..=100).contains(&scale) => Ok(Validated::value(scale)),
        _ => Err(format!("scale must be an integer between 1 and 100, got {}", value)),
    }
}

lazy_static! {
    static ref SOLAR_SYSTEM_ATTRIBUTES: Vec<AttributeSpec> = vec![
        AttributeSpec::new("asteroids", AttrType::Bool, false).remote("solarSystemMinorPlanets"),
        AttributeSpec::new("cosmos", AttrType::Bool, false).remote("solarSystemCosmos"),
        AttributeSpec::new("lighting", AttrType::Bool, true).remote("solarSystemLighting"),
        AttributeSpec::new("milky_way", AttrType::Bool, true).remote("solarSystemMilkyWay"),
        AttributeSpec::new("orbits", AttrType::Bool, true).remote("solarSystemOrbits"),
        AttributeSpec::new("scale", AttrType::Int, 1)
            .remote("solarSystemScale")
            .validator(validate_scale),
        AttributeSpec::new("stars", AttrType::Bool, true).remote("solarSystemStars"),
    ];
}

/// Solar system display options and the tracked object
#[derive(Debug)]
pub struct SolarSystem {
    model: Model,
    tracked: Option<u32>,
    sender: MessageSender,
}

impl SolarSystem {
    pub(crate) fn new(sender: &MessageSender) -> Self {
        let mut model = Model::new("SolarSystem", &SOLAR_SYSTEM_ATTRIBUTES);
        model.observe(Box::new(Dispatcher::global(SetContext::Setting, sender.clone())));
        Self {
            model,
            tracked: None,
            sender: sender.clone(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.model.get(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<AttrValue>) -> WwtResult<()> {
        self.model.set(name, value)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Keep the camera on a named object
    pub fn track_object(&mut self, name: &str) -> WwtResult<()> {
        let code = object_code(name).ok_or_else(|| {
            let mut names: Vec<&str> = OBJECT_CODES.iter().map(|(n, _)| *n).collect();
            names.sort_unstable();
            WwtError::validation("obj", format!("obj should be one of {}", names.join("/")))
        })?;
        self.sender.send(Message::new("track_object").with("code", code))?;
        self.tracked = Some(code);
        Ok(())
    }

    /// Code of the tracked object, if any
    pub fn tracked_object(&self) -> Option<u32> {
        self.tracked
    }

    pub fn wire_settings(&self) -> Map<String, Value> {
        self.model.remote_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;

    fn solar_system() -> (SolarSystem, RecordingTransport) {
        let recorder = RecordingTransport::new();
        let sender = MessageSender::new(Box::new(recorder.clone()), true);
        (SolarSystem::new(&sender), recorder)
    }

    #[test]
    fn test_settings_mirror_as_setting_set() {
        let (mut solar, recorder) = solar_system();
        solar.set("orbits", false).unwrap();
        let message = &recorder.messages()[0];
        assert_eq!(message.event, "setting_set");
        assert_eq!(message.get_str("setting"), Some("solarSystemOrbits"));
        assert_eq!(message.get("value"), Some(&Value::Bool(false)));
        assert!(message.id().is_none());
    }

    #[test]
    fn test_scale_range() {
        let (mut solar, recorder) = solar_system();
        assert!(solar.set("scale", 0).is_err());
        assert!(solar.set("scale", 101).is_err());
        assert!(recorder.messages().is_empty());
        solar.set("scale", 50).unwrap();
        assert_eq!(solar.wire_settings()["solarSystemScale"], Value::from(50));
    }

    #[test]
    fn test_track_object() {
        let (mut solar, recorder) = solar_system();
        solar.track_object("jupiter").unwrap();
        assert_eq!(solar.tracked_object(), Some(4));
        assert_eq!(recorder.events("track_object")[0].get("code"), Some(&Value::from(4)));

        let err = solar.track_object("vulcan").unwrap_err().to_string();
        let sorted_start = "obj should be one of callisto/callistoShadow/custom/earth/europa/";
        assert!(err.starts_with(sorted_start));
        assert!(err.ends_with("/sun/sunEclipsed/undefined/uranus/venus"));
        assert_eq!(solar.tracked_object(), Some(4));
        assert_eq!(object_code("undefined"), Some(65536));
    }
}
