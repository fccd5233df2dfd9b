//! Color parsing and normalization
//!
//! Color attributes accept:
//! - Named colors: single-letter base colors (`r`, `g`, `b`, ...) and common CSS names
//! - Hex strings: `#rgb`, `#rrggbb`, `#rrggbbaa` (alpha ignored)
//! - Grayscale strings: a float in `[0, 1]`, e.g. `"0.5"`
//! - 3-tuples of floats in `[0, 1]`; 4-tuples additionally carry an alpha
//!
//! Every accepted color is normalized to a lowercase `#rrggbb` string.

use serde::{Deserialize, Serialize};

/// Error reported for anything that is not a recognizable color
pub const COLOR_TYPE_ERROR: &str = "color must be a string or a tuple of 3 or 4 floats";

/// A color in RGBA format (0.0 to 1.0)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

const NAMED_COLORS: &[(&str, &str)] = &[
    // Single-letter base colors
    ("b", "#0000ff"),
    ("g", "#008000"),
    ("r", "#ff0000"),
    ("c", "#00bfbf"),
    ("m", "#bf00bf"),
    ("y", "#bfbf00"),
    ("k", "#000000"),
    ("w", "#ffffff"),
    // CSS names
    ("black", "#000000"),
    ("white", "#ffffff"),
    ("red", "#ff0000"),
    ("green", "#008000"),
    ("blue", "#0000ff"),
    ("yellow", "#ffff00"),
    ("orange", "#ffa500"),
    ("purple", "#800080"),
    ("cyan", "#00ffff"),
    ("magenta", "#ff00ff"),
    ("gray", "#808080"),
    ("grey", "#808080"),
    ("lightgray", "#d3d3d3"),
    ("darkgray", "#a9a9a9"),
    ("silver", "#c0c0c0"),
    ("pink", "#ffc0cb"),
    ("brown", "#a52a2a"),
    ("lime", "#00ff00"),
    ("navy", "#000080"),
    ("teal", "#008080"),
    ("olive", "#808000"),
    ("maroon", "#800000"),
    ("gold", "#ffd700"),
    ("violet", "#ee82ee"),
    ("indigo", "#4b0082"),
    ("skyblue", "#87ceeb"),
];

impl Color {
    /// Create a new color
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a color from RGB (alpha = 1.0)
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color from a hex string: `#rgb`, `#rrggbb` or `#rrggbbaa`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
                Some(Self::rgb(expand(0)?, expand(1)?, expand(2)?))
            }
            6 | 8 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            _ => None,
        }
    }

    /// Look up a named color (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        NAMED_COLORS
            .iter()
            .find(|(n, _)| {
                if n.len() == 1 {
                    *n == name
                } else {
                    n.eq_ignore_ascii_case(name)
                }
            })
            .and_then(|(_, hex)| Self::from_hex(hex))
    }

    /// Parse any accepted string form
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.starts_with('#') {
            return Self::from_hex(text);
        }
        if let Some(color) = Self::from_name(text) {
            return Some(color);
        }
        match text.parse::<f32>() {
            Ok(level) if (0.0..=1.0).contains(&level) => Some(Self::rgb(level, level, level)),
            _ => None,
        }
    }

    /// Build a color from a 3- or 4-tuple of floats in `[0, 1]`
    ///
    /// Returns the color and, for 4-tuples, the alpha component separately;
    /// the alpha is range-checked by whichever attribute receives it.
    pub fn from_components(components: &[f64]) -> Result<(Self, Option<f64>), String> {
        if !matches!(components.len(), 3 | 4) {
            return Err(COLOR_TYPE_ERROR.to_string());
        }
        if let Some(bad) = components[..3].iter().find(|c| !(0.0..=1.0).contains(*c)) {
            return Err(format!("color components must be between 0 and 1, got {}", bad));
        }

        let color = Self::rgb(
            components[0] as f32,
            components[1] as f32,
            components[2] as f32,
        );
        Ok((color, components.get(3).copied()))
    }

    /// Convert to lowercase `#rrggbb`
    pub fn to_hex(&self) -> String {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
    }

    /// Convert to array [r, g, b, a]
    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::rgb(1.0, 1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_colors() {
        assert_eq!(Color::parse("red").unwrap().to_hex(), "#ff0000");
        assert_eq!(Color::parse("Orange").unwrap().to_hex(), "#ffa500");
        assert_eq!(Color::parse("k").unwrap().to_hex(), "#000000");
        assert!(Color::parse("K").is_none());
    }

    #[test]
    fn test_hex_forms() {
        assert_eq!(Color::parse("#F0A").unwrap().to_hex(), "#ff00aa");
        assert_eq!(Color::parse("#12AB34").unwrap().to_hex(), "#12ab34");
        assert_eq!(Color::parse("#12ab34cc").unwrap().to_hex(), "#12ab34");
        assert!(Color::parse("#12ab3").is_none());
        assert!(Color::parse("#zzzzzz").is_none());
    }

    #[test]
    fn test_grayscale_string() {
        assert_eq!(Color::parse("0.5").unwrap().to_hex(), "#808080");
        assert!(Color::parse("1.5").is_none());
    }

    #[test]
    fn test_components() {
        let (color, alpha) = Color::from_components(&[1.0, 0.0, 0.0]).unwrap();
        assert_eq!(color.to_hex(), "#ff0000");
        assert_eq!(alpha, None);

        let (color, alpha) = Color::from_components(&[0.0, 0.0, 1.0, 0.25]).unwrap();
        assert_eq!(color.to_hex(), "#0000ff");
        assert_eq!(alpha, Some(0.25));

        assert_eq!(
            Color::from_components(&[0.1, 0.2]).unwrap_err(),
            COLOR_TYPE_ERROR
        );
        assert!(Color::from_components(&[0.1, 0.2, 2.0]).is_err());
    }
}
