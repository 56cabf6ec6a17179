//! Bulk-loaded R-tree over pixel-space shape boxes.
//!
//! The index is built once per generation with `RTree::bulk_load` (OMT
//! packing) and never mutated afterwards, so any number of readers can query
//! it concurrently.
//!
//! ## Intersection semantics
//!
//! Boxes are half-open. The R-tree envelope test is closed (touching boxes
//! match), so candidates from `locate_in_envelope_intersecting` go through
//! [`PixelBox::intersects`] before being returned. A shape that only touches
//! a tile edge is therefore never reported for that tile.

use crate::cluster::Cluster;
use crate::config::ShapeForm;
use crate::feature::Feature;
use geo::Coord;
use rstar::{AABB, RTree, RTreeObject};
use shapelayer_types::bbox::PixelBox;
use std::sync::Arc;

/// One feature drawn as its own shape.
#[derive(Debug, Clone)]
pub struct SingleShape {
    pub feature: Arc<Feature>,
    /// Global pixel position at the build zoom.
    pub position: Coord<f64>,
    pub bbox: PixelBox,
}

/// Unit stored in the index.
#[derive(Debug, Clone)]
pub enum ShapeRecord {
    Single(SingleShape),
    Cluster(Cluster),
}

impl ShapeRecord {
    pub fn bbox(&self) -> &PixelBox {
        match self {
            Self::Single(shape) => &shape.bbox,
            Self::Cluster(cluster) => &cluster.bbox,
        }
    }

    /// Features represented by this record.
    pub fn objects(&self) -> &[Arc<Feature>] {
        match self {
            Self::Single(shape) => std::slice::from_ref(&shape.feature),
            Self::Cluster(cluster) => &cluster.objects,
        }
    }
}

impl RTreeObject for ShapeRecord {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        let bbox = self.bbox();
        AABB::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y])
    }
}

/// Index box of a single shape of `size` logical pixels centered on `center`.
///
/// The box covers every pixel the rasterizer may paint for the shape: the
/// drawn center is snapped to the device grid, so the extent is padded by one
/// pixel on each side. Circles smaller than two pixels still paint one pixel
/// and keep a box; squares smaller than one pixel paint nothing and yield
/// `None`.
pub fn shape_bbox(form: ShapeForm, center: Coord<f64>, size: f64) -> Option<PixelBox> {
    let half = match form {
        ShapeForm::Circles => (size / 2.0).floor(),
        ShapeForm::Squares if size >= 1.0 => size / 2.0,
        ShapeForm::Squares => return None,
    };

    let bbox = PixelBox::new(
        center.x - half,
        center.y - half,
        center.x + half,
        center.y + half,
    )
    .expand(1.0);

    (!bbox.is_degenerate()).then_some(bbox)
}

/// Immutable spatial index of one build generation.
pub struct ShapeIndex {
    tree: RTree<ShapeRecord>,
    zoom: u8,
}

impl ShapeIndex {
    /// Bulk-load `records` computed at `zoom`.
    ///
    /// Records with a degenerate box (no area or non-finite) are dropped here
    /// and only reported in the log.
    pub fn build(records: Vec<ShapeRecord>, zoom: u8) -> Self {
        let total = records.len();
        let records: Vec<ShapeRecord> = records
            .into_iter()
            .filter(|record| !record.bbox().is_degenerate())
            .collect();

        let dropped = total - records.len();
        if dropped > 0 {
            log::debug!("Dropped {} degenerate shapes at zoom {}", dropped, zoom);
        }

        let tree = RTree::bulk_load(records);
        log::debug!("Built shape index: {} records at zoom {}", tree.size(), zoom);

        Self { tree, zoom }
    }

    /// Every record whose box intersects `query` (half-open).
    pub fn query(&self, query: &PixelBox) -> Vec<&ShapeRecord> {
        if self.tree.size() == 0 {
            return Vec::new();
        }

        let envelope = AABB::from_corners([query.min_x, query.min_y], [query.max_x, query.max_y]);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|record| record.bbox().intersects(query))
            .collect()
    }

    /// Zoom the stored boxes are expressed in.
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShapeRecord> {
        self.tree.iter()
    }
}

impl std::fmt::Debug for ShapeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeIndex")
            .field("records", &self.tree.size())
            .field("zoom", &self.zoom)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Point, coord};
    use proptest::prelude::*;

    fn single(bbox: PixelBox) -> ShapeRecord {
        ShapeRecord::Single(SingleShape {
            feature: Arc::new(Feature::new(Point::new(0.0, 0.0))),
            position: bbox.center(),
            bbox,
        })
    }

    #[test]
    fn test_empty_index_answers_empty() {
        let index = ShapeIndex::build(Vec::new(), 3);
        assert!(index.is_empty());
        assert_eq!(index.zoom(), 3);
        assert!(index.query(&PixelBox::new(-1e9, -1e9, 1e9, 1e9)).is_empty());
    }

    #[test]
    fn test_abutting_box_is_excluded() {
        let index = ShapeIndex::build(vec![single(PixelBox::new(0.0, 0.0, 10.0, 10.0))], 0);

        assert!(index.query(&PixelBox::new(10.0, 0.0, 20.0, 10.0)).is_empty());
        assert!(index.query(&PixelBox::new(-10.0, -10.0, 0.0, 0.0)).is_empty());
        assert_eq!(index.query(&PixelBox::new(9.0, 9.0, 20.0, 20.0)).len(), 1);
    }

    #[test]
    fn test_degenerate_records_are_dropped() {
        let index = ShapeIndex::build(
            vec![
                single(PixelBox::new(0.0, 0.0, 0.0, 10.0)),
                single(PixelBox::new(0.0, 0.0, 4.0, 4.0)),
            ],
            0,
        );
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_circle_bbox_single_pixel_fallback() {
        let center = coord! { x: 10.2, y: 20.7 };
        let bbox = shape_bbox(ShapeForm::Circles, center, 0.0).unwrap();
        assert!(!bbox.is_degenerate());
        assert!(bbox.contains(center));

        let big = shape_bbox(ShapeForm::Circles, center, 9.0).unwrap();
        assert_eq!(big.width(), 10.0);
    }

    #[test]
    fn test_square_bbox() {
        let center = coord! { x: 0.0, y: 0.0 };
        assert!(shape_bbox(ShapeForm::Squares, center, 0.5).is_none());

        let bbox = shape_bbox(ShapeForm::Squares, center, 8.0).unwrap();
        assert_eq!(bbox, PixelBox::new(-5.0, -5.0, 5.0, 5.0));
    }

    fn arb_box() -> impl Strategy<Value = PixelBox> {
        (-1000.0f64..1000.0, -1000.0f64..1000.0, 1.0f64..80.0, 1.0f64..80.0)
            .prop_map(|(x, y, w, h)| PixelBox::new(x, y, x + w, y + h))
    }

    proptest! {
        /// Property: the index returns exactly what a linear scan returns.
        #[test]
        fn prop_query_matches_linear_scan(
            boxes in prop::collection::vec(arb_box(), 0..300),
            query in (-1100.0f64..1100.0, -1100.0f64..1100.0, 0.0f64..400.0, 0.0f64..400.0),
        ) {
            let (qx, qy, qw, qh) = query;
            let query = PixelBox::new(qx, qy, qx + qw, qy + qh);

            let index = ShapeIndex::build(boxes.iter().copied().map(single).collect(), 0);

            let mut expected: Vec<[u64; 4]> = boxes
                .iter()
                .filter(|b| b.intersects(&query))
                .map(key)
                .collect();
            let mut actual: Vec<[u64; 4]> = index
                .query(&query)
                .into_iter()
                .map(|r| key(r.bbox()))
                .collect();

            expected.sort_unstable();
            actual.sort_unstable();
            prop_assert_eq!(expected, actual);
        }

        /// Property: boxes sharing an edge with the query never match.
        #[test]
        fn prop_edge_neighbours_excluded(
            x in -500i32..500,
            y in -500i32..500,
            w in 1i32..50,
        ) {
            let (x, y, w) = (f64::from(x), f64::from(y), f64::from(w));
            let query = PixelBox::new(x, y, x + w, y + w);
            let neighbours = vec![
                single(PixelBox::new(x + w, y, x + 2.0 * w, y + w)),
                single(PixelBox::new(x - w, y, x, y + w)),
                single(PixelBox::new(x, y + w, x + w, y + 2.0 * w)),
                single(PixelBox::new(x, y - w, x + w, y)),
            ];
            let index = ShapeIndex::build(neighbours, 0);
            prop_assert!(index.query(&query).is_empty());
        }
    }

    fn key(b: &PixelBox) -> [u64; 4] {
        [b.min_x.to_bits(), b.min_y.to_bits(), b.max_x.to_bits(), b.max_y.to_bits()]
    }
}
