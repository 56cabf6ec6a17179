//! Geographic to global pixel mapping.
//!
//! The layer never owns a coordinate system. It asks a [`Projection`] for the
//! global pixel position of a feature at a zoom level, and expects that
//! doubling the zoom doubles the pixel magnitude for the same point.

use crate::error::ProjectionError;
use geo::{Coord, Point, coord};
use shapelayer_types::tile::DEFAULT_TILE_SIZE;
use std::f64::consts::PI;

/// Latitude limit of the square spherical mercator world.
const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

/// Maps a geographic position (x = longitude, y = latitude) to global pixels.
pub trait Projection: Send + Sync {
    fn to_global_pixels(
        &self,
        position: Point<f64>,
        zoom: u8,
    ) -> Result<Coord<f64>, ProjectionError>;
}

#[inline]
pub(crate) fn zoom_scale(zoom: u8) -> f64 {
    2f64.powi(i32::from(zoom))
}

/// Scale factor that moves pixel coordinates from zoom `from` to zoom `to`.
#[inline]
pub fn scale_between(from: u8, to: u8) -> f64 {
    2f64.powi(i32::from(to) - i32::from(from))
}

/// Spherical (web) mercator, the projection of OSM-style tile schemes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebMercator {
    /// Width of the whole world in pixels at zoom 0.
    pub tile_size: u32,
}

impl WebMercator {
    pub fn new(tile_size: u32) -> Self {
        Self { tile_size }
    }
}

impl Default for WebMercator {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_SIZE)
    }
}

impl Projection for WebMercator {
    fn to_global_pixels(
        &self,
        position: Point<f64>,
        zoom: u8,
    ) -> Result<Coord<f64>, ProjectionError> {
        let (lon, lat) = (position.x(), position.y());
        if !lon.is_finite() || !lat.is_finite() {
            return Err(format!("non-finite coordinates ({lon}, {lat})").into());
        }

        let lat = lat.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
        let world = f64::from(self.tile_size) * zoom_scale(zoom);
        let sin_lat = lat.to_radians().sin();

        let x = (lon + 180.0) / 360.0 * world;
        let y = (0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * PI)) * world;

        Ok(coord! { x: x, y: y })
    }
}

/// Flat projection where coordinates already are zoom-0 pixels.
///
/// Handy for synthetic data and for tests that need exact pixel positions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cartesian;

impl Projection for Cartesian {
    fn to_global_pixels(
        &self,
        position: Point<f64>,
        zoom: u8,
    ) -> Result<Coord<f64>, ProjectionError> {
        let scale = zoom_scale(zoom);
        Ok(coord! { x: position.x() * scale, y: position.y() * scale })
    }
}
