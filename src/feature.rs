//! Input point features and GeoJSON loading.
//!
//! A feature is a geographic point plus optional style overrides. Features are
//! shared as `Arc<Feature>` so indexed shapes and clusters can refer to them
//! without copying.

use crate::error::{Result, ShapeLayerError};
use crate::style::{Color, StyleValue};
use geo::Point;
use geojson::{GeoJson, JsonObject, JsonValue, Value};
use std::sync::Arc;

/// Per-feature style overrides. Unset fields fall back to the layer options.
#[derive(Debug, Clone, Default)]
pub struct FeatureOptions {
    pub size: Option<StyleValue<f64>>,
    pub fill_color: Option<StyleValue<Color>>,
}

impl FeatureOptions {
    /// Read `size` and `fillColor` from a GeoJSON `options` object.
    ///
    /// Entries of the wrong type are skipped with a warning; a single bad
    /// feature must not fail a whole dataset.
    pub fn from_json(object: &JsonObject) -> Self {
        let mut options = Self::default();

        match object.get("size") {
            Some(JsonValue::Number(n)) => options.size = n.as_f64().map(StyleValue::Literal),
            Some(other) => log::warn!("Ignoring non-numeric feature size: {}", other),
            None => {}
        }

        let color = object.get("fillColor").or_else(|| object.get("fill_color"));
        match color {
            Some(JsonValue::String(text)) => match text.parse::<Color>() {
                Ok(color) => options.fill_color = Some(StyleValue::Literal(color)),
                Err(e) => log::warn!("Ignoring feature fill color: {}", e),
            },
            Some(other) => log::warn!("Ignoring non-string feature fill color: {}", other),
            None => {}
        }

        options
    }
}

/// A geographic point to be drawn. `position` is (longitude, latitude).
#[derive(Debug, Clone)]
pub struct Feature {
    pub id: Option<geojson::feature::Id>,
    pub position: Point<f64>,
    pub options: FeatureOptions,
    pub properties: Option<JsonObject>,
}

impl Feature {
    pub fn new(position: Point<f64>) -> Self {
        Self {
            id: None,
            position,
            options: FeatureOptions::default(),
            properties: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(geojson::feature::Id::String(id.into()));
        self
    }

    pub fn with_size(mut self, size: impl Into<StyleValue<f64>>) -> Self {
        self.options.size = Some(size.into());
        self
    }

    pub fn with_fill_color(mut self, color: impl Into<StyleValue<Color>>) -> Self {
        self.options.fill_color = Some(color.into());
        self
    }

    /// Look up a GeoJSON property by name.
    pub fn property(&self, key: &str) -> Option<&JsonValue> {
        self.properties.as_ref()?.get(key)
    }
}

impl TryFrom<geojson::Feature> for Feature {
    type Error = ShapeLayerError;

    fn try_from(feature: geojson::Feature) -> Result<Self> {
        let geometry = feature
            .geometry
            .ok_or_else(|| ShapeLayerError::InvalidFeature("feature has no geometry".into()))?;

        let position = match geometry.value {
            Value::Point(ref coords) if coords.len() >= 2 => Point::new(coords[0], coords[1]),
            Value::Point(_) => {
                return Err(ShapeLayerError::InvalidFeature(
                    "point needs at least two coordinates".into(),
                ));
            }
            other => {
                return Err(ShapeLayerError::InvalidFeature(format!(
                    "expected Point geometry, got {}",
                    geometry_name(&other)
                )));
            }
        };

        // `options` is a foreign member in the input format, but tools that
        // only round-trip properties tend to move it there.
        let options = feature
            .foreign_members
            .as_ref()
            .and_then(|members| members.get("options"))
            .or_else(|| {
                feature
                    .properties
                    .as_ref()
                    .and_then(|props| props.get("options"))
            })
            .and_then(JsonValue::as_object)
            .map(FeatureOptions::from_json)
            .unwrap_or_default();

        Ok(Self {
            id: feature.id,
            position,
            options,
            properties: feature.properties,
        })
    }
}

fn geometry_name(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Parse a dataset given as a FeatureCollection, a single Feature, or a bare
/// JSON array of features.
///
/// # Examples
///
/// ```
/// use shapelayer::feature::parse_features;
///
/// let json = r##"{
///     "type": "FeatureCollection",
///     "features": [{
///         "type": "Feature",
///         "geometry": { "type": "Point", "coordinates": [37.6, 55.7] },
///         "properties": {},
///         "options": { "size": 6, "fillColor": "#ff0000" }
///     }]
/// }"##;
/// let features = parse_features(json)?;
/// assert_eq!(features.len(), 1);
/// # Ok::<(), shapelayer::ShapeLayerError>(())
/// ```
pub fn parse_features(json: &str) -> Result<Vec<Arc<Feature>>> {
    let value: JsonValue = serde_json::from_str(json)?;

    let raw: Vec<geojson::Feature> = match value {
        JsonValue::Array(items) => items
            .into_iter()
            .map(|item| geojson::Feature::from_json_value(item).map_err(ShapeLayerError::from))
            .collect::<Result<_>>()?,
        other => match GeoJson::from_json_value(other)? {
            GeoJson::FeatureCollection(collection) => collection.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(_) => {
                return Err(ShapeLayerError::InvalidFeature(
                    "expected features, got a bare geometry".into(),
                ));
            }
        },
    };

    let features = raw
        .into_iter()
        .map(|f| Feature::try_from(f).map(Arc::new))
        .collect::<Result<Vec<_>>>()?;

    log::debug!("Parsed {} features", features.len());
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collection_with_options() {
        let json = r##"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "id": "a",
                    "geometry": { "type": "Point", "coordinates": [10.0, 20.0] },
                    "properties": { "name": "first" },
                    "options": { "size": 12, "fillColor": "#00ff00" }
                },
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [-5.5, 1.25] },
                    "properties": null
                }
            ]
        }"##;

        let features = parse_features(json).unwrap();
        assert_eq!(features.len(), 2);

        let first = &features[0];
        assert_eq!(first.position, Point::new(10.0, 20.0));
        assert!(matches!(first.options.size, Some(StyleValue::Literal(s)) if s == 12.0));
        assert!(matches!(
            first.options.fill_color,
            Some(StyleValue::Literal(c)) if c == Color::rgb(0, 255, 0)
        ));
        assert_eq!(first.property("name"), Some(&JsonValue::from("first")));

        let second = &features[1];
        assert!(second.options.size.is_none());
        assert!(second.id.is_none());
    }

    #[test]
    fn test_parse_bare_array_and_properties_options() {
        let json = r#"[
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [1.0, 2.0] },
                "properties": { "options": { "size": 3 } }
            }
        ]"#;

        let features = parse_features(json).unwrap();
        assert_eq!(features.len(), 1);
        assert!(matches!(features[0].options.size, Some(StyleValue::Literal(s)) if s == 3.0));
    }

    #[test]
    fn test_bad_options_are_ignored() {
        let json = r#"{
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [1.0, 2.0] },
            "properties": {},
            "options": { "size": "big", "fillColor": "not-a-color" }
        }"#;

        let features = parse_features(json).unwrap();
        assert!(features[0].options.size.is_none());
        assert!(features[0].options.fill_color.is_none());
    }

    #[test]
    fn test_non_point_geometry_is_rejected() {
        let json = r#"{
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 1]] },
            "properties": {}
        }"#;

        let err = parse_features(json).unwrap_err();
        assert!(matches!(err, ShapeLayerError::InvalidFeature(_)));
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_features("{not json").unwrap_err();
        assert!(matches!(err, ShapeLayerError::Json(_)));
    }
}
