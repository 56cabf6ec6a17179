use crate::bbox::PixelBox;
use geo::{Coord, coord};
use serde::{Deserialize, Serialize};

/// Logical tile edge length used by most web map tile schemes.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Address of a square raster tile.
///
/// `x` grows eastwards and `y` southwards, both counted in tiles from the
/// top-left corner of the world at `zoom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Global pixel position of the tile's top-left corner at its own zoom.
    pub fn pixel_origin(&self, tile_size: u32) -> Coord<f64> {
        coord! {
            x: f64::from(self.x) * f64::from(tile_size),
            y: f64::from(self.y) * f64::from(tile_size),
        }
    }

    /// Global pixel extent of the tile at its own zoom.
    ///
    /// # Examples
    ///
    /// ```
    /// use shapelayer_types::tile::TileCoord;
    ///
    /// let bounds = TileCoord::new(1, 2, 3).pixel_bounds(256);
    /// assert_eq!(bounds.min_x, 256.0);
    /// assert_eq!(bounds.max_y, 768.0);
    /// ```
    pub fn pixel_bounds(&self, tile_size: u32) -> PixelBox {
        PixelBox::square(self.pixel_origin(tile_size), f64::from(tile_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbouring_tiles_share_no_pixels() {
        let left = TileCoord::new(4, 4, 5).pixel_bounds(DEFAULT_TILE_SIZE);
        let right = TileCoord::new(5, 4, 5).pixel_bounds(DEFAULT_TILE_SIZE);

        assert_eq!(left.max_x, right.min_x);
        assert!(!left.intersects(&right));
    }

    #[test]
    fn test_serde_roundtrip() {
        let tile = TileCoord::new(3, 7, 4);
        let json = serde_json::to_string(&tile).unwrap();
        assert_eq!(json, r#"{"x":3,"y":7,"zoom":4}"#);
    }
}
