use geo::{Coord, coord};
use serde::{Deserialize, Serialize};

/// A pixel-space axis-aligned box with half-open extent `[min, max)`.
///
/// Two boxes that merely share an edge do not intersect. This keeps adjacent
/// tiles and adjacent grid cells from claiming the same record twice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelBox {
    /// Minimum x coordinate (inclusive)
    pub min_x: f64,
    /// Minimum y coordinate (inclusive)
    pub min_y: f64,
    /// Maximum x coordinate (exclusive)
    pub max_x: f64,
    /// Maximum y coordinate (exclusive)
    pub max_y: f64,
}

impl PixelBox {
    /// Create a box from its bounds. Bounds are swapped if given in reverse.
    ///
    /// # Examples
    ///
    /// ```
    /// use shapelayer_types::bbox::PixelBox;
    ///
    /// let bbox = PixelBox::new(10.0, 10.0, 0.0, 0.0);
    /// assert_eq!(bbox.min_x, 0.0);
    /// assert_eq!(bbox.max_y, 10.0);
    /// ```
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
        }
    }

    /// Create a square box of side `side` whose top-left corner is `origin`.
    pub fn square(origin: Coord<f64>, side: f64) -> Self {
        Self::new(origin.x, origin.y, origin.x + side, origin.y + side)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Geometric center of the box.
    pub fn center(&self) -> Coord<f64> {
        coord! {
            x: (self.min_x + self.max_x) / 2.0,
            y: (self.min_y + self.max_y) / 2.0,
        }
    }

    /// A box is degenerate when it has no area or a non-finite bound.
    pub fn is_degenerate(&self) -> bool {
        let finite = [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite());
        !finite || self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Half-open intersection test: `[a, b)` meets `[c, d)` iff `a < d && b > c`.
    pub fn intersects(&self, other: &PixelBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Half-open containment test for a point.
    pub fn contains(&self, point: Coord<f64>) -> bool {
        point.x >= self.min_x && point.x < self.max_x && point.y >= self.min_y && point.y < self.max_y
    }

    /// Multiply every bound by `factor`, e.g. to move a box between zoom levels.
    pub fn scale(&self, factor: f64) -> Self {
        Self::new(
            self.min_x * factor,
            self.min_y * factor,
            self.max_x * factor,
            self.max_y * factor,
        )
    }

    /// Expand the box by a given amount in all directions.
    pub fn expand(&self, amount: f64) -> Self {
        Self::new(
            self.min_x - amount,
            self.min_y - amount,
            self.max_x + amount,
            self.max_y + amount,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abutting_boxes_do_not_intersect() {
        let a = PixelBox::new(0.0, 0.0, 10.0, 10.0);
        let right = PixelBox::new(10.0, 0.0, 20.0, 10.0);
        let below = PixelBox::new(0.0, 10.0, 10.0, 20.0);

        assert!(!a.intersects(&right));
        assert!(!right.intersects(&a));
        assert!(!a.intersects(&below));
    }

    #[test]
    fn test_overlapping_boxes_intersect() {
        let a = PixelBox::new(0.0, 0.0, 10.0, 10.0);
        let b = PixelBox::new(9.5, 9.5, 12.0, 12.0);
        let inner = PixelBox::new(2.0, 2.0, 3.0, 3.0);

        assert!(a.intersects(&b));
        assert!(a.intersects(&inner));
        assert!(inner.intersects(&a));
    }

    #[test]
    fn test_degenerate() {
        assert!(PixelBox::new(0.0, 0.0, 0.0, 4.0).is_degenerate());
        assert!(PixelBox::new(0.0, 0.0, f64::NAN, 4.0).is_degenerate());
        assert!(!PixelBox::new(0.0, 0.0, 1.0 / 256.0, 1.0 / 256.0).is_degenerate());
    }

    #[test]
    fn test_contains_is_half_open() {
        let bbox = PixelBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(bbox.contains(coord! { x: 0.0, y: 0.0 }));
        assert!(!bbox.contains(coord! { x: 10.0, y: 5.0 }));
    }

    #[test]
    fn test_scale_and_expand() {
        let bbox = PixelBox::new(1.0, 2.0, 3.0, 4.0).scale(2.0);
        assert_eq!(bbox, PixelBox::new(2.0, 4.0, 6.0, 8.0));
        assert_eq!(bbox.center(), coord! { x: 4.0, y: 6.0 });

        let grown = bbox.expand(1.0);
        assert_eq!(grown, PixelBox::new(1.0, 3.0, 7.0, 9.0));
        assert_eq!(grown.width(), 6.0);
    }
}
