//! Layer configuration
//!
//! Literal options are plain serde fields so a layer can be configured from
//! JSON (or TOML with the `toml` feature). Callback-valued options are set
//! through the `with_*` builder methods.

use crate::error::{Result, ShapeLayerError};
use crate::style::{Color, StyleValue, check_size};
use serde::{Deserialize, Deserializer};
use shapelayer_types::tile::DEFAULT_TILE_SIZE;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use crate::cluster::CentroidMode;

/// Option keys that carry a [`ShapeForm`].
const SHAPE_FORM_KEYS: [&str; 2] = ["shape_form", "shapeForm"];

/// Geometric form of drawn shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShapeForm {
    #[default]
    Circles,
    Squares,
}

impl FromStr for ShapeForm {
    type Err = ShapeLayerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "circles" | "circle" => Ok(Self::Circles),
            "squares" | "square" => Ok(Self::Squares),
            other => Err(ShapeLayerError::UnsupportedShapeForm(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for ShapeForm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// How grid cells behave when the zoom level changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridMode {
    /// Cells cover a constant geographic area; their on-screen size doubles
    /// with every zoom step and the index is reused across zooms.
    #[default]
    Fixed,
    /// Cells keep a constant on-screen size; clusters are recomputed on every
    /// zoom change.
    Flexible,
}

/// Grid cell size in pixels at the build zoom.
///
/// In [`GridMode::Fixed`] the layer builds at zoom 0, so the value is in
/// zoom-0 pixels: `1/256` means one pixel cells at zoom 8.
#[derive(Clone)]
pub enum GridSize {
    Fixed(f64),
    PerZoom(Arc<dyn Fn(u8) -> f64 + Send + Sync>),
}

impl GridSize {
    pub fn per_zoom<F>(f: F) -> Self
    where
        F: Fn(u8) -> f64 + Send + Sync + 'static,
    {
        Self::PerZoom(Arc::new(f))
    }

    /// Grid size at `zoom`, rejecting non-positive or non-finite values.
    pub fn at(&self, zoom: u8) -> Result<f64> {
        let size = match self {
            Self::Fixed(size) => *size,
            Self::PerZoom(f) => f(zoom),
        };
        if size.is_finite() && size > 0.0 {
            Ok(size)
        } else {
            Err(ShapeLayerError::InvalidGridSize(size))
        }
    }
}

impl fmt::Debug for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(size) => f.debug_tuple("Fixed").field(size).finish(),
            Self::PerZoom(_) => f.write_str("PerZoom(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for GridSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Self::Fixed)
    }
}

/// Options of a [`ShapeLayer`](crate::layer::ShapeLayer).
///
/// # Example
///
/// ```rust
/// use shapelayer::{GridMode, LayerOptions, ShapeForm};
///
/// let json = r#"{
///     "shape_form": "squares",
///     "clusterize": true,
///     "grid_mode": "flexible",
///     "grid_size": 32
/// }"#;
/// let options = LayerOptions::from_json_str(json)?;
/// assert_eq!(options.shape_form, ShapeForm::Squares);
/// assert_eq!(options.grid_mode, GridMode::Flexible);
/// # Ok::<(), shapelayer::ShapeLayerError>(())
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayerOptions {
    #[serde(alias = "shapeForm")]
    pub shape_form: ShapeForm,

    /// Aggregate features into grid clusters before indexing.
    pub clusterize: bool,

    #[serde(alias = "gridMode")]
    pub grid_mode: GridMode,

    #[serde(alias = "centroidMode")]
    pub centroid_mode: CentroidMode,

    /// Cell size; `None` picks the grid mode default.
    #[serde(alias = "gridSize")]
    pub grid_size: Option<GridSize>,

    /// Shape size in pixels. Clusters only honour derived values.
    pub size: Option<StyleValue<f64>>,

    #[serde(alias = "fillColor", alias = "color")]
    pub fill_color: Option<StyleValue<Color>>,

    /// Logical tile edge length.
    #[serde(alias = "tileSize")]
    pub tile_size: u32,

    /// Physical pixels per logical pixel.
    #[serde(alias = "devicePixelRatio")]
    pub device_pixel_ratio: f64,
}

impl LayerOptions {
    /// Default cell size in flexible mode: 64 px on screen at every zoom.
    pub const DEFAULT_FLEXIBLE_GRID_SIZE: f64 = 64.0;

    /// Default cell size in fixed mode, in zoom-0 pixels.
    pub const DEFAULT_FIXED_GRID_SIZE: f64 = 1.0 / 256.0;

    /// Load options from JSON. An unknown `shapeForm` is reported as
    /// [`ShapeLayerError::UnsupportedShapeForm`], not as a JSON error.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        for key in SHAPE_FORM_KEYS {
            if let Some(form) = value.get(key).and_then(serde_json::Value::as_str) {
                form.parse::<ShapeForm>()?;
            }
        }

        let options: Self = serde_json::from_value(value)?;
        options.validate()?;
        Ok(options)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(text)?;
        for key in SHAPE_FORM_KEYS {
            if let Some(form) = table.get(key).and_then(toml::Value::as_str) {
                form.parse::<ShapeForm>()?;
            }
        }

        let options: Self = toml::Value::Table(table).try_into()?;
        options.validate()?;
        Ok(options)
    }

    pub fn with_shape_form(mut self, form: ShapeForm) -> Self {
        self.shape_form = form;
        self
    }

    pub fn with_clusterize(mut self, clusterize: bool) -> Self {
        self.clusterize = clusterize;
        self
    }

    pub fn with_grid_mode(mut self, mode: GridMode) -> Self {
        self.grid_mode = mode;
        self
    }

    pub fn with_centroid_mode(mut self, mode: CentroidMode) -> Self {
        self.centroid_mode = mode;
        self
    }

    pub fn with_grid_size(mut self, size: GridSize) -> Self {
        self.grid_size = Some(size);
        self
    }

    pub fn with_size(mut self, size: StyleValue<f64>) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_fill_color(mut self, color: StyleValue<Color>) -> Self {
        self.fill_color = Some(color);
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_device_pixel_ratio(mut self, ratio: f64) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }

    /// Grid size option, falling back to the default of the grid mode.
    pub fn effective_grid_size(&self) -> GridSize {
        self.grid_size.clone().unwrap_or(match self.grid_mode {
            GridMode::Fixed => GridSize::Fixed(Self::DEFAULT_FIXED_GRID_SIZE),
            GridMode::Flexible => GridSize::Fixed(Self::DEFAULT_FLEXIBLE_GRID_SIZE),
        })
    }

    /// Whether every zoom change requires a fresh index.
    ///
    /// Only clustered layers on a fixed grid can reuse one index for all zooms.
    pub fn rebuild_on_zoom_change(&self) -> bool {
        !self.clusterize || self.grid_mode == GridMode::Flexible
    }

    /// Zoom at which the index is built when `requested` is asked for.
    pub fn build_zoom(&self, requested: u8) -> u8 {
        if self.rebuild_on_zoom_change() {
            requested
        } else {
            0
        }
    }

    /// Physical edge length of rendered tiles.
    pub fn physical_tile_size(&self) -> u32 {
        (f64::from(self.tile_size) * self.device_pixel_ratio).round() as u32
    }

    /// Reject option combinations that can never render.
    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(ShapeLayerError::InvalidConfig(
                "tile_size must be positive".into(),
            ));
        }

        if !self.device_pixel_ratio.is_finite() || self.device_pixel_ratio < 1.0 {
            return Err(ShapeLayerError::InvalidConfig(format!(
                "device_pixel_ratio must be a finite number >= 1, got {}",
                self.device_pixel_ratio
            )));
        }

        if let Some(GridSize::Fixed(size)) = &self.grid_size {
            GridSize::Fixed(*size).at(0)?;
        }

        if let Some(StyleValue::Literal(size)) = &self.size {
            check_size("size", *size)?;
        }

        Ok(())
    }
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            shape_form: ShapeForm::default(),
            clusterize: false,
            grid_mode: GridMode::default(),
            centroid_mode: CentroidMode::default(),
            grid_size: None,
            size: None,
            fill_color: None,
            tile_size: DEFAULT_TILE_SIZE,
            device_pixel_ratio: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = LayerOptions::default();
        assert_eq!(options.shape_form, ShapeForm::Circles);
        assert!(!options.clusterize);
        assert_eq!(options.grid_mode, GridMode::Fixed);
        assert_eq!(options.centroid_mode, CentroidMode::Fixed);
        assert_eq!(options.tile_size, 256);
        assert_eq!(options.physical_tile_size(), 256);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_default_grid_size_per_mode() {
        let fixed = LayerOptions::default().effective_grid_size();
        assert_eq!(fixed.at(0).unwrap(), 1.0 / 256.0);

        let flexible = LayerOptions::default()
            .with_grid_mode(GridMode::Flexible)
            .effective_grid_size();
        assert_eq!(flexible.at(12).unwrap(), 64.0);
    }

    #[test]
    fn test_grid_size_per_zoom() {
        let grid = GridSize::per_zoom(|zoom| f64::from(zoom) * 2.0);
        assert_eq!(grid.at(5).unwrap(), 10.0);
        assert!(matches!(grid.at(0), Err(ShapeLayerError::InvalidGridSize(_))));
    }

    #[test]
    fn test_rebuild_policy() {
        let plain = LayerOptions::default();
        assert!(plain.rebuild_on_zoom_change());
        assert_eq!(plain.build_zoom(7), 7);

        let fixed = LayerOptions::default().with_clusterize(true);
        assert!(!fixed.rebuild_on_zoom_change());
        assert_eq!(fixed.build_zoom(7), 0);

        let flexible = fixed.with_grid_mode(GridMode::Flexible);
        assert!(flexible.rebuild_on_zoom_change());
        assert_eq!(flexible.build_zoom(7), 7);
    }

    #[test]
    fn test_from_json_with_aliases() {
        let json = r##"{
            "shapeForm": "circles",
            "clusterize": true,
            "centroidMode": "avg",
            "gridSize": 16,
            "fillColor": "#102030",
            "tileSize": 512,
            "devicePixelRatio": 2
        }"##;
        let options = LayerOptions::from_json_str(json).unwrap();

        assert_eq!(options.centroid_mode, CentroidMode::Avg);
        assert_eq!(options.effective_grid_size().at(3).unwrap(), 16.0);
        assert!(matches!(
            options.fill_color,
            Some(StyleValue::Literal(c)) if c == Color::rgb(0x10, 0x20, 0x30)
        ));
        assert_eq!(options.physical_tile_size(), 1024);
    }

    #[test]
    fn test_unsupported_shape_form() {
        assert!(matches!(
            "triangles".parse::<ShapeForm>(),
            Err(ShapeLayerError::UnsupportedShapeForm(_))
        ));

        for json in [
            r#"{ "shape_form": "triangles" }"#,
            r#"{ "shapeForm": "triangles", "clusterize": true }"#,
        ] {
            let err = LayerOptions::from_json_str(json).unwrap_err();
            assert!(matches!(err, ShapeLayerError::UnsupportedShapeForm(ref form) if form == "triangles"));
            assert!(err.is_configuration());
        }

        // Wrong types are still plain JSON errors.
        let err = LayerOptions::from_json_str(r#"{ "shapeForm": 3 }"#).unwrap_err();
        assert!(matches!(err, ShapeLayerError::Json(_)));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_unsupported_shape_form_from_toml() {
        let err = LayerOptions::from_toml_str(r#"shape_form = "hexagons""#).unwrap_err();
        assert!(matches!(err, ShapeLayerError::UnsupportedShapeForm(_)));
        assert!(err.is_configuration());

        let options = LayerOptions::from_toml_str(r#"shapeForm = "square""#).unwrap();
        assert_eq!(options.shape_form, ShapeForm::Squares);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_dpr = LayerOptions::default().with_device_pixel_ratio(0.5);
        assert!(matches!(bad_dpr.validate(), Err(ShapeLayerError::InvalidConfig(_))));

        let bad_tile = LayerOptions::default().with_tile_size(0);
        assert!(bad_tile.validate().is_err());

        let bad_grid = LayerOptions::default().with_grid_size(GridSize::Fixed(-4.0));
        assert!(matches!(bad_grid.validate(), Err(ShapeLayerError::InvalidGridSize(_))));

        let bad_size = LayerOptions::default().with_size(StyleValue::Literal(f64::INFINITY));
        assert!(matches!(bad_size.validate(), Err(ShapeLayerError::InvalidSize { .. })));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_from_toml() {
        let text = r#"
            shape_form = "squares"
            clusterize = true
            grid_mode = "flexible"
            grid_size = 48.0
        "#;
        let options = LayerOptions::from_toml_str(text).unwrap();
        assert_eq!(options.shape_form, ShapeForm::Squares);
        assert_eq!(options.effective_grid_size().at(1).unwrap(), 48.0);
    }
}
