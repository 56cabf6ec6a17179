//! Point hit testing against the current index generation.

use crate::error::{Result, ShapeLayerError};
use crate::feature::Feature;
use crate::index::ShapeIndex;
use crate::projection::{Projection, scale_between};
use geo::Point;
use shapelayer_types::bbox::PixelBox;
use std::sync::Arc;

/// Features of every indexed shape under `position`, viewed at `view_zoom`.
///
/// The position is projected at the index zoom. The hit box covers one view
/// pixel, i.e. `2^(index_zoom - view_zoom)` index pixels, so a fixed-grid index
/// built at zoom 0 can still be queried precisely at deep zooms.
///
/// Results come in index order. A cluster contributes all of its members.
pub fn objects_at(
    index: &ShapeIndex,
    projection: &dyn Projection,
    position: Point<f64>,
    view_zoom: u8,
) -> Result<Vec<Arc<Feature>>> {
    let pixel = projection
        .to_global_pixels(position, index.zoom())
        .map_err(ShapeLayerError::Projection)?;

    let side = scale_between(view_zoom, index.zoom());
    let hit_box = PixelBox::new(pixel.x, pixel.y, pixel.x + side, pixel.y + side);

    let objects: Vec<Arc<Feature>> = index
        .query(&hit_box)
        .into_iter()
        .flat_map(|record| record.objects().iter().cloned())
        .collect();

    log::trace!(
        "Hit test at zoom {} matched {} objects",
        view_zoom,
        objects.len()
    );

    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{CentroidMode, cluster};
    use crate::index::{ShapeRecord, SingleShape};
    use crate::projection::Cartesian;
    use geo::coord;

    fn cluster_index(points: &[(f64, f64)], grid: f64) -> ShapeIndex {
        let features: Vec<Arc<Feature>> = points
            .iter()
            .map(|&(x, y)| Arc::new(Feature::new(Point::new(x, y))))
            .collect();
        let records = cluster(&features, &Cartesian, 0, grid, CentroidMode::Fixed)
            .unwrap()
            .into_iter()
            .map(ShapeRecord::Cluster)
            .collect();
        ShapeIndex::build(records, 0)
    }

    #[test]
    fn test_hit_returns_all_cluster_members() {
        let index = cluster_index(&[(0.0, 0.0), (1.0, 1.0), (100.0, 100.0)], 10.0);

        let hits = objects_at(&index, &Cartesian, Point::new(5.0, 5.0), 0).unwrap();
        assert_eq!(hits.len(), 2);

        let hits = objects_at(&index, &Cartesian, Point::new(105.0, 105.0), 0).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_miss_returns_empty() {
        let index = cluster_index(&[(0.0, 0.0)], 10.0);
        let hits = objects_at(&index, &Cartesian, Point::new(50.0, 50.0), 0).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_hit_box_shrinks_with_view_zoom() {
        // Cell [0,4) at zoom 0; at zoom 3 one view pixel is 1/8 index pixel.
        let index = cluster_index(&[(1.0, 1.0)], 4.0);

        let inside = objects_at(&index, &Cartesian, Point::new(3.9, 3.9), 3).unwrap();
        assert_eq!(inside.len(), 1);

        let outside = objects_at(&index, &Cartesian, Point::new(4.0, 1.0), 3).unwrap();
        assert!(outside.is_empty());
    }

    #[test]
    fn test_single_shape_hit() {
        let feature = Arc::new(Feature::new(Point::new(10.0, 10.0)).with_id("a"));
        let index = ShapeIndex::build(
            vec![ShapeRecord::Single(SingleShape {
                feature: Arc::clone(&feature),
                position: coord! { x: 10.0, y: 10.0 },
                bbox: PixelBox::new(6.0, 6.0, 14.0, 14.0),
            })],
            0,
        );

        let hits = objects_at(&index, &Cartesian, Point::new(12.0, 8.0), 0).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(Arc::ptr_eq(&hits[0], &feature));
    }
}
