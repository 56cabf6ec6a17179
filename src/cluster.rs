//! Grid clustering of point features.
//!
//! Features are projected to global pixels at the build zoom and bucketed into
//! square cells of `grid_size` pixels. Each non-empty cell becomes one
//! [`Cluster`]; every feature ends up in exactly one cluster.
//!
//! The cluster box is always the cell itself, whatever the centroid policy,
//! so indexed boxes stay aligned to the grid at every zoom.

use crate::error::{Result, ShapeLayerError};
use crate::feature::Feature;
use crate::projection::{Projection, scale_between};
use geo::{Coord, coord};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use shapelayer_types::bbox::PixelBox;
use std::sync::Arc;

/// Where a cluster's shape is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CentroidMode {
    /// Center of the grid cell. Stable while panning.
    #[default]
    Fixed,
    /// Mean of member positions. Follows point density.
    Avg,
}

/// Integer address of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub x: i64,
    pub y: i64,
}

impl CellKey {
    pub fn containing(position: Coord<f64>, grid_size: f64) -> Self {
        Self {
            x: (position.x / grid_size).floor() as i64,
            y: (position.y / grid_size).floor() as i64,
        }
    }

    pub fn bounds(&self, grid_size: f64) -> PixelBox {
        PixelBox::new(
            self.x as f64 * grid_size,
            self.y as f64 * grid_size,
            (self.x + 1) as f64 * grid_size,
            (self.y + 1) as f64 * grid_size,
        )
    }

    pub fn center(&self, grid_size: f64) -> Coord<f64> {
        coord! {
            x: (self.x as f64 + 0.5) * grid_size,
            y: (self.y as f64 + 0.5) * grid_size,
        }
    }
}

/// Features sharing one grid cell.
///
/// This is also the descriptor handed to style callbacks: `centroid` and
/// `bbox` are pixels at `zoom`. Use [`Cluster::centroid_at`] to move the
/// centroid to another zoom.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub objects: Vec<Arc<Feature>>,
    /// Rendered anchor in global pixels at `zoom`.
    pub centroid: Coord<f64>,
    pub bbox: PixelBox,
    /// Zoom the geometry was computed for.
    pub zoom: u8,
    pub cell: CellKey,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Centroid rescaled to `zoom`: `centroid * 2^(zoom - self.zoom)`.
    pub fn centroid_at(&self, zoom: u8) -> Coord<f64> {
        self.centroid * scale_between(self.zoom, zoom)
    }
}

#[derive(Default)]
struct CellAccumulator {
    sum: Coord<f64>,
    objects: Vec<Arc<Feature>>,
}

/// Partition `features` into grid clusters at `zoom`.
///
/// Clusters are ordered by cell key (x, then y); members keep input order.
/// Projection failures are returned unchanged.
pub fn cluster(
    features: &[Arc<Feature>],
    projection: &dyn Projection,
    zoom: u8,
    grid_size: f64,
    centroid_mode: CentroidMode,
) -> Result<Vec<Cluster>> {
    if !grid_size.is_finite() || grid_size <= 0.0 {
        return Err(ShapeLayerError::InvalidGridSize(grid_size));
    }

    let mut grid: FxHashMap<CellKey, CellAccumulator> = FxHashMap::default();

    for feature in features {
        let position = projection
            .to_global_pixels(feature.position, zoom)
            .map_err(ShapeLayerError::Projection)?;

        let cell = grid
            .entry(CellKey::containing(position, grid_size))
            .or_default();
        cell.sum = cell.sum + position;
        cell.objects.push(Arc::clone(feature));
    }

    let mut clusters: Vec<Cluster> = grid
        .into_iter()
        .map(|(key, cell)| {
            let centroid = match centroid_mode {
                CentroidMode::Fixed => key.center(grid_size),
                CentroidMode::Avg => cell.sum / cell.objects.len() as f64,
            };
            Cluster {
                objects: cell.objects,
                centroid,
                bbox: key.bounds(grid_size),
                zoom,
                cell: key,
            }
        })
        .collect();

    clusters.sort_unstable_by_key(|c| c.cell);

    log::debug!(
        "Clustered {} features into {} cells (zoom {}, grid {})",
        features.len(),
        clusters.len(),
        zoom,
        grid_size
    );

    Ok(clusters)
}
