//! The shape layer: dataset, options and the current index generation.
//!
//! A [`ShapeLayer`] starts [`BuildState::Uninitialized`]. The first tile or
//! explicit build request at some zoom builds a [`Generation`]; later requests
//! at other zooms either reuse it (clustered layers on a fixed grid) or replace
//! it wholesale. Replacing the dataset drops the generation.
//!
//! Readers clone the `Arc<Generation>` out of a short read lock, so a query in
//! flight keeps working on the generation it started with while a rebuild
//! swaps in the next one.

use crate::cluster::cluster;
use crate::config::LayerOptions;
use crate::error::{Result, ShapeLayerError};
use crate::feature::{Feature, parse_features};
use crate::hit;
use crate::index::{ShapeIndex, ShapeRecord, SingleShape, shape_bbox};
use crate::projection::Projection;
use crate::raster::TileRenderer;
use crate::style::StyleResolver;
use geo::Point;
use image::RgbaImage;
use parking_lot::{Mutex, RwLock};
use shapelayer_types::tile::TileCoord;
use std::sync::Arc;

/// One complete build: the index plus the parameters it was built with.
#[derive(Debug)]
pub struct Generation {
    index: ShapeIndex,
    grid_size: Option<f64>,
}

impl Generation {
    pub fn index(&self) -> &ShapeIndex {
        &self.index
    }

    /// Zoom the index boxes are expressed in.
    pub fn zoom(&self) -> u8 {
        self.index.zoom()
    }

    /// Grid size used for clustering, `None` for unclustered layers.
    pub fn grid_size(&self) -> Option<f64> {
        self.grid_size
    }
}

/// Build state of a layer.
#[derive(Debug, Clone, Default)]
pub enum BuildState {
    #[default]
    Uninitialized,
    Built {
        /// Last zoom a build was requested for.
        zoom: u8,
        generation: Arc<Generation>,
    },
}

impl BuildState {
    pub fn is_built(&self) -> bool {
        matches!(self, Self::Built { .. })
    }
}

/// A large point dataset rendered as raster tiles.
///
/// # Examples
///
/// ```rust
/// use shapelayer::{LayerOptions, ShapeLayer, TileCoord};
/// use shapelayer::projection::Cartesian;
///
/// let json = r#"{
///     "type": "FeatureCollection",
///     "features": [
///         { "type": "Feature", "geometry": { "type": "Point", "coordinates": [10.0, 10.0] }, "properties": null }
///     ]
/// }"#;
///
/// let options = LayerOptions::default().with_clusterize(true);
/// let layer = ShapeLayer::from_geojson_str(json, options, Cartesian)?;
///
/// let tile = layer.render_tile(TileCoord::new(0, 0, 0))?;
/// assert_eq!(tile.dimensions(), (256, 256));
///
/// let hits = layer.objects_at(geo::Point::new(10.0, 10.0), 0)?;
/// assert_eq!(hits.len(), 1);
/// # Ok::<(), shapelayer::ShapeLayerError>(())
/// ```
pub struct ShapeLayer {
    features: RwLock<Arc<Vec<Arc<Feature>>>>,
    options: LayerOptions,
    projection: Arc<dyn Projection>,
    state: RwLock<BuildState>,
    rebuild_lock: Mutex<()>,
}

impl ShapeLayer {
    /// Create a layer over `features`. Options are validated up front.
    pub fn new<P>(features: Vec<Arc<Feature>>, options: LayerOptions, projection: P) -> Result<Self>
    where
        P: Projection + 'static,
    {
        options.validate()?;

        Ok(Self {
            features: RwLock::new(Arc::new(features)),
            options,
            projection: Arc::new(projection),
            state: RwLock::new(BuildState::Uninitialized),
            rebuild_lock: Mutex::new(()),
        })
    }

    /// Create a layer from GeoJSON text.
    pub fn from_geojson_str<P>(json: &str, options: LayerOptions, projection: P) -> Result<Self>
    where
        P: Projection + 'static,
    {
        Self::new(parse_features(json)?, options, projection)
    }

    pub fn options(&self) -> &LayerOptions {
        &self.options
    }

    pub fn projection(&self) -> &dyn Projection {
        self.projection.as_ref()
    }

    /// Current dataset.
    pub fn features(&self) -> Arc<Vec<Arc<Feature>>> {
        Arc::clone(&self.features.read())
    }

    /// Replace the dataset. The next request rebuilds from scratch.
    pub fn set_features(&self, features: Vec<Arc<Feature>>) {
        let _guard = self.rebuild_lock.lock();
        *self.features.write() = Arc::new(features);
        *self.state.write() = BuildState::Uninitialized;
        log::debug!("Dataset replaced, layer reset");
    }

    pub fn state(&self) -> BuildState {
        self.state.read().clone()
    }

    /// The live generation, if any.
    pub fn current(&self) -> Option<Arc<Generation>> {
        match &*self.state.read() {
            BuildState::Built { generation, .. } => Some(Arc::clone(generation)),
            BuildState::Uninitialized => None,
        }
    }

    /// Generation to serve `zoom` with, building or rebuilding as needed.
    pub fn ensure_built(&self, zoom: u8) -> Result<Arc<Generation>> {
        if let Some(generation) = self.reusable(zoom) {
            return Ok(generation);
        }

        let _guard = self.rebuild_lock.lock();

        // Another caller may have built while we waited.
        if let Some(generation) = self.reusable(zoom) {
            return Ok(generation);
        }

        let reuse = match &*self.state.read() {
            BuildState::Built { generation, .. } if !self.options.rebuild_on_zoom_change() => {
                Some(Arc::clone(generation))
            }
            _ => None,
        };

        if let Some(generation) = reuse {
            log::trace!("Reusing zoom {} index for zoom {}", generation.zoom(), zoom);
            *self.state.write() = BuildState::Built {
                zoom,
                generation: Arc::clone(&generation),
            };
            return Ok(generation);
        }

        self.build_and_swap(zoom)
    }

    /// Unconditionally build a new generation for `zoom`.
    pub fn rebuild(&self, zoom: u8) -> Result<Arc<Generation>> {
        let _guard = self.rebuild_lock.lock();
        self.build_and_swap(zoom)
    }

    /// Render one tile, building the index for the tile's zoom if needed.
    pub fn render_tile(&self, tile: TileCoord) -> Result<RgbaImage> {
        let generation = self.ensure_built(tile.zoom)?;
        TileRenderer::new(&self.options, self.projection.as_ref()).render(generation.index(), tile)
    }

    /// Features under `position` at `view_zoom`.
    ///
    /// Answers from the live generation and never triggers a build; before the
    /// first build the result is empty.
    pub fn objects_at(&self, position: Point<f64>, view_zoom: u8) -> Result<Vec<Arc<Feature>>> {
        match self.current() {
            Some(generation) => hit::objects_at(
                generation.index(),
                self.projection.as_ref(),
                position,
                view_zoom,
            ),
            None => Ok(Vec::new()),
        }
    }

    fn reusable(&self, zoom: u8) -> Option<Arc<Generation>> {
        match &*self.state.read() {
            BuildState::Built {
                zoom: last,
                generation,
            } if *last == zoom => Some(Arc::clone(generation)),
            _ => None,
        }
    }

    /// Must be called with `rebuild_lock` held.
    fn build_and_swap(&self, zoom: u8) -> Result<Arc<Generation>> {
        let generation = Arc::new(self.build_generation(zoom)?);
        *self.state.write() = BuildState::Built {
            zoom,
            generation: Arc::clone(&generation),
        };
        Ok(generation)
    }

    fn build_generation(&self, requested: u8) -> Result<Generation> {
        let features = self.features();
        let zoom = self.options.build_zoom(requested);
        let projection = self.projection.as_ref();

        let (records, grid_size) = if self.options.clusterize {
            let grid_size = self.options.effective_grid_size().at(zoom)?;
            let records = cluster(
                &features,
                projection,
                zoom,
                grid_size,
                self.options.centroid_mode,
            )?
            .into_iter()
            .map(ShapeRecord::Cluster)
            .collect();
            (records, Some(grid_size))
        } else {
            let resolver = StyleResolver::new(&self.options);
            let mut records = Vec::with_capacity(features.len());
            for feature in features.iter() {
                let position = projection
                    .to_global_pixels(feature.position, zoom)
                    .map_err(ShapeLayerError::Projection)?;
                let size = resolver.feature_size(feature, zoom)?;

                match shape_bbox(self.options.shape_form, position, size) {
                    Some(bbox) => records.push(ShapeRecord::Single(SingleShape {
                        feature: Arc::clone(feature),
                        position,
                        bbox,
                    })),
                    None => log::debug!("Skipping sub-pixel {:?} of size {}", self.options.shape_form, size),
                }
            }
            (records, None)
        };

        log::debug!(
            "Building generation at zoom {} (requested {}): {} features, {} records",
            zoom,
            requested,
            features.len(),
            records.len()
        );

        Ok(Generation {
            index: ShapeIndex::build(records, zoom),
            grid_size,
        })
    }
}

impl std::fmt::Debug for ShapeLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeLayer")
            .field("features", &self.features.read().len())
            .field("options", &self.options)
            .field("state", &*self.state.read())
            .finish()
    }
}
