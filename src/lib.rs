//! Raster tile layer for very large point datasets, with grid clustering and
//! an R-tree over pixel-space shape boxes.
//!
//! ```rust
//! use shapelayer::projection::Cartesian;
//! use shapelayer::{Feature, LayerOptions, Point, ShapeLayer, StyleValue, TileCoord};
//! use std::sync::Arc;
//!
//! let features = vec![
//!     Arc::new(Feature::new(Point::new(0.0, 0.0))),
//!     Arc::new(Feature::new(Point::new(1.0, 1.0))),
//!     Arc::new(Feature::new(Point::new(100.0, 100.0))),
//! ];
//!
//! let options = LayerOptions::default().with_size(StyleValue::Literal(8.0));
//! let layer = ShapeLayer::new(features, options, Cartesian)?;
//!
//! let tile = layer.render_tile(TileCoord::new(0, 0, 0))?;
//! assert_eq!(tile.dimensions(), (256, 256));
//! assert_eq!(layer.objects_at(Point::new(100.0, 100.0), 0)?.len(), 1);
//! # Ok::<(), shapelayer::ShapeLayerError>(())
//! ```

pub mod cluster;
pub mod config;
pub mod error;
pub mod feature;
pub mod hit;
pub mod index;
pub mod layer;
pub mod projection;
pub mod raster;
pub mod style;

pub use config::{CentroidMode, GridMode, GridSize, LayerOptions, ShapeForm};
pub use error::{Result, ShapeLayerError};
pub use feature::{Feature, FeatureOptions, parse_features};
pub use layer::{BuildState, Generation, ShapeLayer};
pub use style::{Color, StyleContext, StyleValue, Subject};

pub use cluster::Cluster;
pub use index::{ShapeIndex, ShapeRecord};
pub use projection::{Cartesian, Projection, WebMercator};
pub use raster::{Canvas, TileRenderer};

pub use shapelayer_types::bbox::PixelBox;
pub use shapelayer_types::tile::{DEFAULT_TILE_SIZE, TileCoord};

pub use geo::{Coord, Point};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Result, ShapeLayer, ShapeLayerError};

    pub use crate::{Feature, LayerOptions, TileCoord};

    pub use crate::{CentroidMode, Color, GridMode, GridSize, ShapeForm, StyleValue};

    pub use crate::{Cartesian, Projection, WebMercator};

    pub use geo::Point;
}
