//! Animatable properties and their values.
//!
//! This module defines:
//! - `Property`: the geometric core (transform parts, size, offsets, opacity)
//!   plus arbitrary named style properties
//! - `PropValue`: a captured value, parsed from its CSS text
//! - `Interpolate`: blending between two values of the same kind
//!
//! Colors are parsed with `csscolorparser` and interpolated per RGBA channel.

use std::fmt;
use std::str::FromStr;

use csscolorparser::Color as CssColor;
use serde::{Deserialize, Serialize};

/// A property the flip engine can read from elements and states, and tween.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    X,
    Y,
    Rotation,
    SkewX,
    ScaleX,
    ScaleY,
    Width,
    Height,
    Left,
    Top,
    Opacity,
    /// Any other style property, by its CSS name.
    Style(String),
}

impl Property {
    /// Resolve a property name. Unknown names become `Property::Style`.
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "x" => Self::X,
            "y" => Self::Y,
            "rotation" | "rotate" => Self::Rotation,
            "skewX" | "skew-x" => Self::SkewX,
            "scaleX" | "scale-x" => Self::ScaleX,
            "scaleY" | "scale-y" => Self::ScaleY,
            "width" => Self::Width,
            "height" => Self::Height,
            "left" => Self::Left,
            "top" => Self::Top,
            "opacity" => Self::Opacity,
            other => Self::Style(other.to_string()),
        }
    }

    /// Split a comma-delimited property list.
    pub fn parse_list(list: &str) -> Vec<Property> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse)
            .collect()
    }

    pub fn name(&self) -> &str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Rotation => "rotation",
            Self::SkewX => "skewX",
            Self::ScaleX => "scaleX",
            Self::ScaleY => "scaleY",
            Self::Width => "width",
            Self::Height => "height",
            Self::Left => "left",
            Self::Top => "top",
            Self::Opacity => "opacity",
            Self::Style(name) => name,
        }
    }

    /// Part of the decomposed transform.
    pub fn is_transform(&self) -> bool {
        matches!(
            self,
            Self::X | Self::Y | Self::Rotation | Self::SkewX | Self::ScaleX | Self::ScaleY
        )
    }

    /// Angles take the shorter way round when interpolated.
    pub fn is_angle(&self) -> bool {
        matches!(self, Self::Rotation | Self::SkewX)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A captured or interpolated property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropValue {
    /// Plain number; CSS lengths and angles lose their unit.
    Number(f64),
    /// RGBA, each channel in `0.0..=1.0`.
    Color([f32; 4]),
    /// Anything that does not tween; switches at the end.
    Text(String),
}

impl PropValue {
    /// Parse computed CSS text: number (with optional `px`/`deg`/`%` unit), color, or text.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let numeric = ["px", "deg", "%"]
            .iter()
            .find_map(|unit| raw.strip_suffix(unit))
            .unwrap_or(raw);
        if let Some(v) = numeric.trim().parse::<f64>().ok().filter(|v| v.is_finite()) {
            return Self::Number(v);
        }
        if let Ok(c) = CssColor::from_str(raw) {
            return Self::Color([c.r as f32, c.g as f32, c.b as f32, c.a as f32]);
        }
        Self::Text(raw.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<[f32; 4]> {
        match self {
            Self::Color(rgba) => Some(*rgba),
            _ => None,
        }
    }

    /// CSS text for writing back into an inline style.
    pub fn to_css(&self) -> String {
        match self {
            Self::Number(v) => format_number(*v),
            Self::Color([r, g, b, a]) => {
                let channel = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
                if (*a - 1.0).abs() < 1e-6 {
                    format!("#{:02x}{:02x}{:02x}", channel(*r), channel(*g), channel(*b))
                } else {
                    format!(
                        "rgba({},{},{},{})",
                        channel(*r),
                        channel(*g),
                        channel(*b),
                        format_number(*a as f64)
                    )
                }
            }
            Self::Text(s) => s.clone(),
        }
    }

    /// Equal within `epsilon` for numbers and colors, exactly for text.
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => (a - b).abs() < epsilon,
            (Self::Color(a), Self::Color(b)) => a
                .iter()
                .zip(b.iter())
                .all(|(x, y)| ((x - y) as f64).abs() < epsilon),
            _ => self == other,
        }
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

fn format_number(v: f64) -> String {
    let rounded = (v * 10_000.0).round() / 10_000.0;
    format!("{rounded}")
}

/// Trait for types that can be interpolated between two values.
///
/// When `t = 0.0` the result is `self`; when `t = 1.0` it is `to`.
pub trait Interpolate: Sized {
    fn interpolate(&self, to: &Self, t: f64) -> Self;
}

#[inline]
fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

impl Interpolate for f64 {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        lerp(*self, *to, t)
    }
}

impl Interpolate for [f32; 4] {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        let t = t as f32;
        [
            self[0] + (to[0] - self[0]) * t,
            self[1] + (to[1] - self[1]) * t,
            self[2] + (to[2] - self[2]) * t,
            self[3] + (to[3] - self[3]) * t,
        ]
    }
}

impl Interpolate for PropValue {
    /// Mismatched kinds and text values hold `self` until `t` reaches 1.
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        match (self, to) {
            (Self::Number(a), Self::Number(b)) => Self::Number(a.interpolate(b, t)),
            (Self::Color(a), Self::Color(b)) => Self::Color(a.interpolate(b, t)),
            _ => {
                if t < 1.0 {
                    self.clone()
                } else {
                    to.clone()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_parse_roundtrip() {
        for name in ["x", "y", "rotation", "skewX", "scaleX", "scaleY", "width", "opacity"] {
            assert_eq!(Property::parse(name).name(), name);
        }
        assert_eq!(
            Property::parse("background-color"),
            Property::Style("background-color".into())
        );
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            Property::parse_list("backgroundColor, opacity,,color"),
            vec![
                Property::Style("backgroundColor".into()),
                Property::Opacity,
                Property::Style("color".into()),
            ]
        );
    }

    #[test]
    fn test_value_parse() {
        assert_eq!(PropValue::parse("12px"), PropValue::Number(12.0));
        assert_eq!(PropValue::parse(" 0.5 "), PropValue::Number(0.5));
        assert_eq!(PropValue::parse("45deg"), PropValue::Number(45.0));
        assert_eq!(PropValue::parse("#ff0000"), PropValue::Color([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(PropValue::parse("solid"), PropValue::Text("solid".into()));
    }

    #[test]
    fn test_color_interpolation() {
        let from = PropValue::parse("#000000");
        let to = PropValue::parse("#ffffff");
        let mid = from.interpolate(&to, 0.5).as_color().unwrap();
        assert!((mid[0] - 0.5).abs() < 1e-4);
        assert!((mid[3] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_text_switches_at_end() {
        let from = PropValue::Text("a".into());
        let to = PropValue::Text("b".into());
        assert_eq!(from.interpolate(&to, 0.99), from);
        assert_eq!(from.interpolate(&to, 1.0), to);
    }

    #[test]
    fn test_to_css() {
        assert_eq!(PropValue::Number(12.5).to_css(), "12.5");
        assert_eq!(PropValue::Color([1.0, 0.0, 0.0, 1.0]).to_css(), "#ff0000");
        assert_eq!(PropValue::Color([0.0, 0.0, 1.0, 0.5]).to_css(), "rgba(0,0,255,0.5)");
    }
}
