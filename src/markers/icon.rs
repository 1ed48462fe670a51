//! Marker colours and the filled-circle icon drawn for each marker.

use std::fmt;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MARKER_COLOR: &str = "#ff3b30";
pub const DEFAULT_ICON_DIAMETER: u32 = 16;

/// A `#rrggbb` colour, normalised to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MarkerColor(String);

impl MarkerColor {
    /// Parse `#rgb` or `#rrggbb` (leading `#` optional).
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let digits = input.trim().trim_start_matches('#');
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let expanded = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect::<String>(),
            6 => digits.to_string(),
            _ => return None,
        };
        Some(Self(format!("#{}", expanded.to_ascii_lowercase())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn rgb(&self) -> [u8; 3] {
        let channel = |i: usize| u8::from_str_radix(&self.0[i..i + 2], 16).unwrap_or(0);
        [channel(1), channel(3), channel(5)]
    }
}

impl Default for MarkerColor {
    fn default() -> Self {
        Self(DEFAULT_MARKER_COLOR.to_string())
    }
}

impl fmt::Display for MarkerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MarkerColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid marker color: {value}"))
    }
}

impl From<MarkerColor> for String {
    fn from(color: MarkerColor) -> Self {
        color.0
    }
}

/// Bitmap icon: an opaque disc of the marker colour on a transparent square.
#[derive(Debug, Clone)]
pub struct MarkerIcon {
    pub color: MarkerColor,
    pub image: RgbaImage,
}

impl MarkerIcon {
    #[must_use]
    pub fn filled_circle(color: &MarkerColor, diameter: u32) -> Self {
        let diameter = diameter.max(1);
        let [r, g, b] = color.rgb();
        let radius = f64::from(diameter) / 2.0;

        let image = RgbaImage::from_fn(diameter, diameter, |x, y| {
            let dx = f64::from(x) + 0.5 - radius;
            let dy = f64::from(y) + 0.5 - radius;
            if dx * dx + dy * dy <= radius * radius {
                Rgba([r, g, b, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });

        Self { color: color.clone(), image }
    }
}

#[cfg(test)]
#[path = "icon_test.rs"]
mod tests;
