//! # shapelayer-types
//!
//! Pixel-space geometry shared by the `shapelayer` crate:
//!
//! - **Boxes**: [`bbox::PixelBox`], a half-open axis-aligned box in global pixels
//! - **Tiles**: [`tile::TileCoord`], `(x, y, zoom)` raster tile addressing
//!
//! ## Examples
//!
//! ```rust
//! use shapelayer_types::bbox::PixelBox;
//! use shapelayer_types::tile::TileCoord;
//!
//! let tile = TileCoord::new(0, 0, 0).pixel_bounds(256);
//! let shape = PixelBox::new(250.0, 250.0, 260.0, 260.0);
//! assert!(tile.intersects(&shape));
//! ```

pub mod bbox;
pub mod tile;
