//! Error types for layer construction, style resolution and input parsing.

use thiserror::Error;

/// Failure reported by a [`Projection`](crate::projection::Projection) implementation.
pub type ProjectionError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ShapeLayerError {
    #[error("Unsupported shape form: {0} (expected \"circles\" or \"squares\")")]
    UnsupportedShapeForm(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid {key}: {value} (must be finite and non-negative)")]
    InvalidSize { key: &'static str, value: f64 },

    #[error("Invalid grid size: {0} (must be finite and positive)")]
    InvalidGridSize(f64),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Invalid feature: {0}")]
    InvalidFeature(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "toml")]
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Projection failed: {0}")]
    Projection(#[source] ProjectionError),
}

impl ShapeLayerError {
    /// True for errors caused by layer options rather than by input data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedShapeForm(_)
                | Self::InvalidConfig(_)
                | Self::InvalidSize { .. }
                | Self::InvalidGridSize(_)
                | Self::InvalidColor(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ShapeLayerError>;
