//! Style values and their resolution per shape and zoom.
//!
//! Sizes and colors can be given as plain values or as callbacks of the
//! zoom level and the thing being drawn. Both cases are a [`StyleValue`], so
//! there is no runtime type sniffing at draw time.

use crate::cluster::Cluster;
use crate::config::LayerOptions;
use crate::error::{Result, ShapeLayerError};
use crate::feature::Feature;
use crate::index::ShapeRecord;
use crate::projection::scale_between;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Fill color used when neither the layer nor the feature sets one.
pub const DEFAULT_FILL_COLOR: Color = Color::rgba(0, 255, 0, 204);

/// Outer border color of outlined squares.
pub const SQUARE_OUTER_STROKE: Color = Color::rgb(0xbe, 0xbd, 0x7f);

/// Inner border color of outlined squares.
pub const SQUARE_INNER_STROKE: Color = Color::rgb(0xac, 0xb7, 0x8e);

/// An 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }
}

impl FromStr for Color {
    type Err = ShapeLayerError;

    /// Parses `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`, `rgba(r, g, b, a)`
    /// (alpha in `0..=1`) and a handful of CSS names.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ShapeLayerError::InvalidColor(s.to_string());
        let text = s.trim().to_ascii_lowercase();

        if let Some(hex) = text.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(invalid);
        }

        if let Some(body) = text
            .strip_prefix("rgba(")
            .or_else(|| text.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return parse_rgb(body).ok_or_else(invalid);
        }

        match text.as_str() {
            "transparent" => Ok(Color::TRANSPARENT),
            "black" => Ok(Color::rgb(0, 0, 0)),
            "white" => Ok(Color::rgb(255, 255, 255)),
            "red" => Ok(Color::rgb(255, 0, 0)),
            "green" => Ok(Color::rgb(0, 128, 0)),
            "lime" => Ok(Color::rgb(0, 255, 0)),
            "blue" => Ok(Color::rgb(0, 0, 255)),
            _ => Err(invalid()),
        }
    }
}

fn parse_rgb(body: &str) -> Option<Color> {
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    let channel = |p: &str| p.parse::<u8>().ok();

    match parts.as_slice() {
        &[r, g, b] => Some(Color::rgb(channel(r)?, channel(g)?, channel(b)?)),
        &[r, g, b, a] => {
            let alpha = a.parse::<f64>().ok().filter(|a| (0.0..=1.0).contains(a))?;
            Some(Color::rgba(
                channel(r)?,
                channel(g)?,
                channel(b)?,
                (alpha * 255.0).round() as u8,
            ))
        }
        _ => None,
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    let nibble = |i: usize| u8::from_str_radix(hex.get(i..=i)?, 16).ok();
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();

    match hex.len() {
        3 => Some(Color::rgb(nibble(0)? * 17, nibble(1)? * 17, nibble(2)? * 17)),
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rgba({}, {}, {}, {:.3})",
            self.r,
            self.g,
            self.b,
            f64::from(self.a) / 255.0
        )
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// What a style callback is asked about.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Feature(&'a Feature),
    Cluster(&'a Cluster),
}

/// Arguments handed to a [`StyleValue::Derived`] callback.
#[derive(Debug, Clone, Copy)]
pub struct StyleContext<'a> {
    /// Zoom level the shape is being drawn at.
    pub zoom: u8,
    pub subject: Subject<'a>,
}

impl<'a> StyleContext<'a> {
    pub fn feature(&self) -> Option<&'a Feature> {
        match self.subject {
            Subject::Feature(feature) => Some(feature),
            Subject::Cluster(_) => None,
        }
    }

    pub fn cluster(&self) -> Option<&'a Cluster> {
        match self.subject {
            Subject::Cluster(cluster) => Some(cluster),
            Subject::Feature(_) => None,
        }
    }
}

type StyleFn<T> = dyn Fn(&StyleContext<'_>) -> T + Send + Sync;

/// A style option that is either a constant or computed per shape and zoom.
pub enum StyleValue<T> {
    Literal(T),
    Derived(Arc<StyleFn<T>>),
}

impl<T: Clone> StyleValue<T> {
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&StyleContext<'_>) -> T + Send + Sync + 'static,
    {
        Self::Derived(Arc::new(f))
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, Self::Derived(_))
    }

    pub fn evaluate(&self, context: &StyleContext<'_>) -> T {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Derived(f) => f(context),
        }
    }
}

impl<T: Clone> Clone for StyleValue<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Literal(value) => Self::Literal(value.clone()),
            Self::Derived(f) => Self::Derived(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StyleValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

impl From<f64> for StyleValue<f64> {
    fn from(value: f64) -> Self {
        Self::Literal(value)
    }
}

impl From<Color> for StyleValue<Color> {
    fn from(value: Color) -> Self {
        Self::Literal(value)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for StyleValue<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        T::deserialize(deserializer).map(Self::Literal)
    }
}

pub(crate) fn check_size(key: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ShapeLayerError::InvalidSize { key, value })
    }
}

/// Resolves size and fill color of indexed shapes.
///
/// Clusters only honour layer-level callbacks; anything else falls back to the
/// cluster defaults (cell size, default color). Single features prefer their
/// own options over the layer's.
#[derive(Debug, Clone, Copy)]
pub struct StyleResolver<'a> {
    options: &'a LayerOptions,
}

impl<'a> StyleResolver<'a> {
    pub fn new(options: &'a LayerOptions) -> Self {
        Self { options }
    }

    pub fn resolve_size(&self, record: &ShapeRecord, zoom: u8) -> Result<f64> {
        match record {
            ShapeRecord::Single(shape) => self.feature_size(&shape.feature, zoom),
            ShapeRecord::Cluster(cluster) => self.cluster_size(cluster, zoom),
        }
    }

    pub fn resolve_color(&self, record: &ShapeRecord, zoom: u8) -> Color {
        match record {
            ShapeRecord::Single(shape) => self.feature_color(&shape.feature, zoom),
            ShapeRecord::Cluster(cluster) => self.cluster_color(cluster, zoom),
        }
    }

    pub fn feature_size(&self, feature: &Feature, zoom: u8) -> Result<f64> {
        let context = StyleContext {
            zoom,
            subject: Subject::Feature(feature),
        };
        let size = feature
            .options
            .size
            .as_ref()
            .or(self.options.size.as_ref())
            .map_or(0.0, |value| value.evaluate(&context));
        check_size("size", size)
    }

    pub fn feature_color(&self, feature: &Feature, zoom: u8) -> Color {
        let context = StyleContext {
            zoom,
            subject: Subject::Feature(feature),
        };
        feature
            .options
            .fill_color
            .as_ref()
            .or(self.options.fill_color.as_ref())
            .map_or(DEFAULT_FILL_COLOR, |value| value.evaluate(&context))
    }

    pub fn cluster_size(&self, cluster: &Cluster, zoom: u8) -> Result<f64> {
        let size = match &self.options.size {
            Some(value) if value.is_derived() => value.evaluate(&StyleContext {
                zoom,
                subject: Subject::Cluster(cluster),
            }),
            _ => cluster.bbox.width() * scale_between(cluster.zoom, zoom),
        };
        check_size("size", size)
    }

    pub fn cluster_color(&self, cluster: &Cluster, zoom: u8) -> Color {
        match &self.options.fill_color {
            Some(value) if value.is_derived() => value.evaluate(&StyleContext {
                zoom,
                subject: Subject::Cluster(cluster),
            }),
            _ => DEFAULT_FILL_COLOR,
        }
    }
}
