//! Typed attribute model
//!
//! Every entity (the root widget, the solar system, annotations, layers)
//! declares its attributes once in a static table of [`AttributeSpec`]s. A
//! [`Model`] holds the current values for one table plus the observers that
//! are told about every successful write.
//!
//! Writes go through three steps:
//! 1. Type coercion (`Int` into `Float`, unit symbols into [`Unit`], ...)
//! 2. The attribute's validator, which may normalize the value and may redirect a
//!    part of it into a sibling attribute (a 4-tuple color's alpha goes to
//!    `opacity`)
//! 3. Storage and notification; observers fire on every write, including
//!    writes of an equal value
//!
//! Validation of the main value and the sibling both happen before anything
//! is stored, so a rejected write leaves the model untouched.

use serde_json::{Map, Value};
use std::fmt;

use crate::color::{Color, COLOR_TYPE_ERROR};
use crate::error::{WwtError, WwtResult};
use crate::units::{Quantity, Unit};

/// Declared type of an attribute
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AttrType {
    Bool,
    Float,
    /// Float or unset
    OptFloat,
    Int,
    Str,
    /// String or unset (column names)
    OptStr,
    /// One of a fixed set of strings
    Choice(&'static [&'static str]),
    /// Color string or 3/4-tuple
    Color,
    Quantity,
    Unit,
}

impl AttrType {
    fn describe(&self) -> &'static str {
        match self {
            AttrType::Bool => "a boolean",
            AttrType::Float | AttrType::OptFloat => "a number",
            AttrType::Int => "an integer",
            AttrType::Str | AttrType::OptStr | AttrType::Choice(_) => "a string",
            AttrType::Color => "a color",
            AttrType::Quantity => "a quantity with units",
            AttrType::Unit => "a unit",
        }
    }
}

/// Runtime attribute value
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    None,
    Bool(bool),
    Float(f64),
    Int(i64),
    Str(String),
    Tuple(Vec<f64>),
    Quantity(Quantity),
    Unit(Unit),
}

impl AttrValue {
    pub fn is_none(&self) -> bool {
        matches!(self, AttrValue::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value; integers widen to floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_quantity(&self) -> Option<&Quantity> {
        match self {
            AttrValue::Quantity(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_unit(&self) -> Option<&Unit> {
        match self {
            AttrValue::Unit(v) => Some(v),
            _ => None,
        }
    }

    /// Plain JSON form: quantities reduce to their magnitude, units to their symbol
    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::None => Value::Null,
            AttrValue::Bool(v) => Value::Bool(*v),
            AttrValue::Float(v) => Value::from(*v),
            AttrValue::Int(v) => Value::from(*v),
            AttrValue::Str(v) => Value::String(v.clone()),
            AttrValue::Tuple(v) => Value::from(v.clone()),
            AttrValue::Quantity(q) => Value::from(q.value),
            AttrValue::Unit(u) => Value::String(u.symbol().to_string()),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::None => write!(f, "None"),
            AttrValue::Bool(v) => write!(f, "{}", v),
            AttrValue::Float(v) => write!(f, "{}", v),
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Str(v) => write!(f, "'{}'", v),
            AttrValue::Tuple(v) => write!(f, "{:?}", v),
            AttrValue::Quantity(q) => write!(f, "{}", q),
            AttrValue::Unit(u) => write!(f, "{}", u),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<Option<&str>> for AttrValue {
    fn from(v: Option<&str>) -> Self {
        v.map(AttrValue::from).unwrap_or(AttrValue::None)
    }
}

impl From<Option<f64>> for AttrValue {
    fn from(v: Option<f64>) -> Self {
        v.map(AttrValue::Float).unwrap_or(AttrValue::None)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(v: Vec<f64>) -> Self {
        AttrValue::Tuple(v)
    }
}

impl From<[f64; 3]> for AttrValue {
    fn from(v: [f64; 3]) -> Self {
        AttrValue::Tuple(v.to_vec())
    }
}

impl From<[f64; 4]> for AttrValue {
    fn from(v: [f64; 4]) -> Self {
        AttrValue::Tuple(v.to_vec())
    }
}

impl From<Quantity> for AttrValue {
    fn from(v: Quantity) -> Self {
        AttrValue::Quantity(v)
    }
}

impl From<Unit> for AttrValue {
    fn from(v: Unit) -> Self {
        AttrValue::Unit(v)
    }
}

/// Outcome of a successful validation
#[derive(Clone, Debug, PartialEq)]
pub struct Validated {
    /// Normalized value to store
    pub value: AttrValue,
    /// Value redirected into another attribute of the same model
    pub sibling: Option<(&'static str, AttrValue)>,
}

impl Validated {
    pub fn value(value: impl Into<AttrValue>) -> Self {
        Self {
            value: value.into(),
            sibling: None,
        }
    }

    pub fn with_sibling(mut self, name: &'static str, value: impl Into<AttrValue>) -> Self {
        self.sibling = Some((name, value.into()));
        self
    }
}

/// Validator: normalized value or a readable reason
pub type Validator = fn(&AttrValue) -> Result<Validated, String>;

/// Encoder producing the engine's representation of a stored value
pub type Encoder = fn(&AttrValue) -> Value;

/// Declaration of one attribute
#[derive(Clone, Debug)]
pub struct AttributeSpec {
    /// Attribute name (e.g. "fill_color")
    pub name: &'static str,

    /// Declared type
    pub ty: AttrType,

    /// Default value
    pub default: AttrValue,

    /// Engine setting name; `None` keeps the attribute local
    pub remote_name: Option<&'static str>,

    /// Optional validator run after type coercion
    pub validator: Option<Validator>,

    /// Optional encoder for the engine representation
    pub encoder: Option<Encoder>,

    /// Restored to its default by a widget reset
    pub reset: bool,
}

impl AttributeSpec {
    pub fn new(name: &'static str, ty: AttrType, default: impl Into<AttrValue>) -> Self {
        Self {
            name,
            ty,
            default: default.into(),
            remote_name: None,
            validator: None,
            encoder: None,
            reset: false,
        }
    }

    pub fn remote(mut self, remote_name: &'static str) -> Self {
        self.remote_name = Some(remote_name);
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn encoder(mut self, encoder: Encoder) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn reset_flag(mut self) -> Self {
        self.reset = true;
        self
    }

    /// Coerce and validate a candidate value
    pub fn validate(&self, value: &AttrValue) -> WwtResult<Validated> {
        let value = self.coerce(value)?;
        match self.validator {
            Some(validator) => {
                validator(&value).map_err(|message| WwtError::validation(self.name, message))
            }
            None => Ok(Validated::value(value)),
        }
    }

    /// Engine representation of a value
    pub fn encode(&self, value: &AttrValue) -> Value {
        match self.encoder {
            Some(encoder) => encoder(value),
            None => value.to_json(),
        }
    }

    fn coerce(&self, value: &AttrValue) -> WwtResult<AttrValue> {
        let coerced = match (self.ty, value) {
            (AttrType::Bool, AttrValue::Bool(_)) => Some(value.clone()),
            (AttrType::Float | AttrType::OptFloat, AttrValue::Float(_)) => Some(value.clone()),
            (AttrType::Float | AttrType::OptFloat, AttrValue::Int(v)) => {
                Some(AttrValue::Float(*v as f64))
            }
            (AttrType::OptFloat, AttrValue::None) => Some(AttrValue::None),
            (AttrType::Int, AttrValue::Int(_)) => Some(value.clone()),
            (AttrType::Int, AttrValue::Float(v)) if v.fract() == 0.0 => {
                Some(AttrValue::Int(*v as i64))
            }
            (AttrType::Str | AttrType::OptStr, AttrValue::Str(_)) => Some(value.clone()),
            (AttrType::OptStr, AttrValue::None) => Some(AttrValue::None),
            (AttrType::Choice(options), AttrValue::Str(s)) => {
                let wanted = s.to_lowercase();
                match options.iter().find(|o| o.to_lowercase() == wanted) {
                    Some(option) => Some(AttrValue::Str(option.to_string())),
                    None => return Err(self.choice_error(options)),
                }
            }
            (AttrType::Color, AttrValue::Str(_) | AttrValue::Tuple(_)) => Some(value.clone()),
            (AttrType::Color, _) => {
                return Err(WwtError::validation(self.name, COLOR_TYPE_ERROR));
            }
            (AttrType::Quantity, AttrValue::Quantity(_)) => Some(value.clone()),
            (AttrType::Unit, AttrValue::Unit(_)) => Some(value.clone()),
            (AttrType::Unit, AttrValue::Str(s)) => match Unit::lookup(s) {
                Some(unit) => Some(AttrValue::Unit(unit)),
                None => {
                    return Err(WwtError::validation(
                        self.name,
                        format!("{}: unknown unit '{}'", self.name, s),
                    ))
                }
            },
            _ => None,
        };

        coerced.ok_or_else(|| {
            WwtError::validation(
                self.name,
                format!("{} must be {}, got {}", self.name, self.ty.describe(), value),
            )
        })
    }

    fn choice_error(&self, options: &[&str]) -> WwtError {
        let mut sorted = options.to_vec();
        sorted.sort_unstable();
        WwtError::validation(
            self.name,
            format!("{} should be one of {}", self.name, sorted.join("/")),
        )
    }
}

/// Keyword arguments for entity factories, in call order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attrs {
    entries: Vec<(String, AttrValue)>,
}

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; a repeated name replaces the earlier value in place
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove and return an entry
    pub fn take(&mut self, name: &str) -> Option<AttrValue> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One attribute write as seen by observers
#[derive(Debug)]
pub struct AttributeChange<'a> {
    pub spec: &'a AttributeSpec,
    pub old: &'a AttrValue,
    pub new: &'a AttrValue,
}

/// Synchronous subscriber to attribute writes
pub trait ChangeObserver {
    fn attribute_changed(&mut self, change: &AttributeChange<'_>) -> WwtResult<()>;
}

/// Current values for one attribute table plus its observers
pub struct Model {
    kind: &'static str,
    specs: &'static [AttributeSpec],
    values: Vec<AttrValue>,
    observers: Vec<Box<dyn ChangeObserver>>,
}

impl Model {
    /// Create a model holding every attribute's default
    pub fn new(kind: &'static str, specs: &'static [AttributeSpec]) -> Self {
        Self {
            kind,
            specs,
            values: specs.iter().map(|s| s.default.clone()).collect(),
            observers: Vec::new(),
        }
    }

    /// Entity kind used in error messages (e.g. "Circle")
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn specs(&self) -> &'static [AttributeSpec] {
        self.specs
    }

    /// Subscribe to every subsequent write
    pub fn observe(&mut self, observer: Box<dyn ChangeObserver>) {
        self.observers.push(observer);
    }

    /// Declared spec for a name
    pub fn spec(&self, name: &str) -> WwtResult<&'static AttributeSpec> {
        let index = self.index_of(name)?;
        Ok(&self.specs[index])
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.specs.iter().any(|s| s.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.specs
            .iter()
            .position(|s| s.name == name)
            .map(|i| &self.values[i])
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(AttrValue::as_bool)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(AttrValue::as_f64)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttrValue::as_str)
    }

    pub fn get_quantity(&self, name: &str) -> Option<&Quantity> {
        self.get(name).and_then(AttrValue::as_quantity)
    }

    pub fn get_unit(&self, name: &str) -> Option<&Unit> {
        self.get(name).and_then(AttrValue::as_unit)
    }

    /// Validate a write without storing it
    pub fn check(&self, name: &str, value: &AttrValue) -> WwtResult<Validated> {
        let spec = self.spec(name)?;
        let mut validated = spec.validate(value)?;

        if let Some((sibling, sibling_value)) = validated.sibling.take() {
            let sibling_spec = self
                .specs
                .iter()
                .find(|s| s.name == sibling)
                .ok_or_else(|| {
                    WwtError::validation(
                        name,
                        format!("{} must be a string or a tuple of 3 floats", name),
                    )
                })?;
            let checked = sibling_spec.validate(&sibling_value)?;
            validated.sibling = Some((sibling, checked.value));
        }

        Ok(validated)
    }

    /// Validate every entry of a keyword set: unknown names first, then values
    pub fn check_attrs(&self, attrs: &Attrs) -> WwtResult<()> {
        let mut unknown: Vec<String> = attrs
            .iter()
            .filter(|(name, _)| !self.has_attribute(name))
            .map(|(name, _)| name.to_string())
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(WwtError::KeyMismatch {
                entity: self.kind.to_string(),
                keys: unknown,
            });
        }

        for (name, value) in attrs.iter() {
            self.check(name, value)?;
        }
        Ok(())
    }

    /// Validate, store and notify
    pub fn set(&mut self, name: &str, value: impl Into<AttrValue>) -> WwtResult<()> {
        let value = value.into();
        let validated = self.check(name, &value)?;

        let mut sibling_before = None;
        if let Some((sibling, sibling_value)) = validated.sibling {
            let index = self.index_of(sibling)?;
            let previous = self.values[index].clone();
            self.store(index, sibling_value)?;
            sibling_before = Some((index, previous));
        }

        let index = self.index_of(name)?;
        let stored = self.store(index, validated.value);
        if stored.is_err() {
            if let Some((index, previous)) = sibling_before {
                self.values[index] = previous;
            }
        }
        stored
    }

    /// Re-announce the current value of an attribute
    pub fn touch(&mut self, name: &str) -> WwtResult<()> {
        let index = self.index_of(name)?;
        let current = self.values[index].clone();
        self.store(index, current)
    }

    /// Restore every reset-flagged attribute to its default, notifying each
    pub fn reset(&mut self) -> WwtResult<()> {
        for index in 0..self.specs.len() {
            if self.specs[index].reset {
                self.store(index, self.specs[index].default.clone())?;
            }
        }
        Ok(())
    }

    /// Encoded values of every remote attribute, keyed by remote name
    pub fn remote_settings(&self) -> Map<String, Value> {
        self.specs
            .iter()
            .zip(&self.values)
            .filter_map(|(spec, value)| {
                spec.remote_name
                    .map(|remote| (remote.to_string(), spec.encode(value)))
            })
            .collect()
    }

    /// Attributes whose value differs from the declared default
    pub fn non_default(&self) -> Attrs {
        let mut attrs = Attrs::new();
        for (spec, value) in self.specs.iter().zip(&self.values) {
            if *value != spec.default {
                attrs.insert(spec.name, value.clone());
            }
        }
        attrs
    }

    /// Iterate specs with their current values
    pub fn iter(&self) -> impl Iterator<Item = (&'static AttributeSpec, &AttrValue)> {
        self.specs.iter().zip(self.values.iter())
    }

    fn index_of(&self, name: &str) -> WwtResult<usize> {
        self.specs
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| WwtError::KeyMismatch {
                entity: self.kind.to_string(),
                keys: vec![name.to_string()],
            })
    }

    /// Commit a value and notify observers; a failed notification restores the old value
    fn store(&mut self, index: usize, value: AttrValue) -> WwtResult<()> {
        let old = std::mem::replace(&mut self.values[index], value);
        let spec = &self.specs[index];
        let new = &self.values[index];
        tracing::trace!("{}.{} = {}", self.kind, spec.name, new);

        let notified = self.observers.iter_mut().try_for_each(|observer| {
            observer.attribute_changed(&AttributeChange {
                spec,
                old: &old,
                new,
            })
        });
        if let Err(err) = notified {
            tracing::debug!("{}.{} rolled back: {}", self.kind, spec.name, err);
            self.values[index] = old;
            return Err(err);
        }
        Ok(())
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("kind", &self.kind)
            .field("values", &self.values)
            .field("observers", &self.observers.len())
            .finish()
    }
}

// ===== Shared validators =====

/// Colors normalize to lowercase hex; a 4-tuple's alpha goes to `opacity`
pub fn validate_color(value: &AttrValue) -> Result<Validated, String> {
    match value {
        AttrValue::Str(s) => Color::parse(s)
            .map(|c| Validated::value(c.to_hex()))
            .ok_or_else(|| format!("'{}' is not a recognized color", s)),
        AttrValue::Tuple(components) => {
            let (color, alpha) = Color::from_components(components)?;
            let validated = Validated::value(color.to_hex());
            Ok(match alpha {
                Some(alpha) => validated.with_sibling("opacity", alpha),
                None => validated,
            })
        }
        _ => Err(COLOR_TYPE_ERROR.to_string()),
    }
}

/// Opacity is a fraction in `[0, 1]`
pub fn validate_opacity(value: &AttrValue) -> Result<Validated, String> {
    match value.as_f64() {
        Some(v) if (0.0..=1.0).contains(&v) => Ok(Validated::value(v)),
        _ => Err(format!("opacity must be between 0 and 1, got {}", value)),
    }
}

/// Finite, non-negative numbers
pub fn validate_non_negative(value: &AttrValue) -> Result<Validated, String> {
    match value.as_f64() {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(Validated::value(v)),
        _ => Err(format!("value must be a non-negative number, got {}", value)),
    }
}
