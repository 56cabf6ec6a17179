//! Tile rasterization.
//!
//! A tile is rendered by querying the index with the tile's box expressed at
//! the index zoom, resolving style for every hit and painting the shapes into
//! a buffer of `tile_size * device_pixel_ratio` physical pixels.
//!
//! Painting goes through the [`Canvas`] trait. The provided implementation is
//! a `tiny_skia::Pixmap` drawn without anti-aliasing, so every primitive covers
//! exactly the device pixels whose centers it contains.

use crate::config::{LayerOptions, ShapeForm};
use crate::error::{Result, ShapeLayerError};
use crate::index::{ShapeIndex, ShapeRecord};
use crate::projection::{Projection, scale_between};
use crate::style::{Color, SQUARE_INNER_STROKE, SQUARE_OUTER_STROKE, StyleResolver};
use geo::{Coord, coord};
use image::{Rgba, RgbaImage};
use shapelayer_types::tile::TileCoord;
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

/// Squares at least this large (in logical pixels) get the outlined style.
pub const OUTLINE_MIN_SIZE: f64 = 8.0;

/// Clipped geometry keeps this many pixels of slack around the canvas so a
/// clipped edge never lands on a visible pixel.
const CLIP_MARGIN: f64 = 2.0;

/// A pixel buffer shapes can be painted into.
///
/// Coordinates are device pixels. Rectangles are half-open,
/// `[x, x + width) × [y, y + height)`.
pub trait Canvas {
    fn dimensions(&self) -> (u32, u32);

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color);

    /// One pixel wide outline along the inside of the rectangle.
    fn stroke_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color);

    /// Fill every pixel whose center lies within `radius` of `center`.
    fn fill_circle(&mut self, center: Coord<f64>, radius: f64, color: Color);
}

fn solid(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = false;
    paint
}

/// Clip `[start, start + len)` to `[-CLIP_MARGIN, limit + CLIP_MARGIN)`.
///
/// Done in `f64` so shapes far larger than the canvas still cover it after
/// narrowing to `f32`.
fn clip_span(start: f64, len: f64, limit: u32) -> Option<(f32, f32)> {
    let lo = start.max(-CLIP_MARGIN);
    let hi = (start + len).min(f64::from(limit) + CLIP_MARGIN);
    (hi > lo).then(|| (lo as f32, (hi - lo) as f32))
}

fn clip_rect(x: f64, y: f64, width: f64, height: f64, (w, h): (u32, u32)) -> Option<Rect> {
    let (x, width) = clip_span(x, width, w)?;
    let (y, height) = clip_span(y, height, h)?;
    Rect::from_xywh(x, y, width, height)
}

impl Canvas for Pixmap {
    fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color) {
        if let Some(rect) = clip_rect(x, y, width, height, Canvas::dimensions(self)) {
            self.as_mut()
                .fill_rect(rect, &solid(color), Transform::identity(), None);
        }
    }

    fn stroke_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color) {
        if width <= 2.0 || height <= 2.0 {
            // No interior left.
            Canvas::fill_rect(self, x, y, width, height, color);
            return;
        }

        // A 1 px stroke centered on the border pixels' centers covers exactly
        // those pixels.
        let size = Canvas::dimensions(self);
        let Some(rect) = clip_rect(x + 0.5, y + 0.5, width - 1.0, height - 1.0, size) else {
            return;
        };
        let path = PathBuilder::from_rect(rect);
        let stroke = Stroke {
            width: 1.0,
            ..Stroke::default()
        };
        self.as_mut()
            .stroke_path(&path, &solid(color), &stroke, Transform::identity(), None);
    }

    fn fill_circle(&mut self, center: Coord<f64>, radius: f64, color: Color) {
        let (w, h) = Canvas::dimensions(self);
        let (width, height) = (f64::from(w), f64::from(h));

        let near = center
            - coord! {
                x: center.x.clamp(0.0, width),
                y: center.y.clamp(0.0, height),
            };
        if near.x.hypot(near.y) > radius {
            return;
        }

        let far = center
            - coord! {
                x: if center.x < width / 2.0 { width } else { 0.0 },
                y: if center.y < height / 2.0 { height } else { 0.0 },
            };
        if far.x.hypot(far.y) <= radius {
            Canvas::fill_rect(self, 0.0, 0.0, width, height, color);
            return;
        }

        if radius <= width.max(height) {
            let (cx, cy, r) = (center.x as f32, center.y as f32, radius as f32);
            if let Some(path) = PathBuilder::from_circle(cx, cy, r) {
                self.as_mut().fill_path(
                    &path,
                    &solid(color),
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            }
            return;
        }

        // Discs much larger than the canvas lose precision as f32 paths; draw
        // their rows as spans instead.
        for row in 0..h {
            let dy = f64::from(row) + 0.5 - center.y;
            if dy.abs() > radius {
                continue;
            }
            let half = (radius * radius - dy * dy).sqrt();
            let x0 = (center.x - half - 0.5).ceil();
            let x1 = (center.x + half - 0.5).floor();
            if x1 >= x0 {
                Canvas::fill_rect(self, x0, f64::from(row), x1 - x0 + 1.0, 1.0, color);
            }
        }
    }
}

/// Straight-alpha copy of a premultiplied pixmap.
fn to_image(pixmap: &Pixmap) -> RgbaImage {
    RgbaImage::from_fn(pixmap.width(), pixmap.height(), |x, y| {
        pixmap.pixel(x, y).map_or(Rgba([0, 0, 0, 0]), |pixel| {
            let color = pixel.demultiply();
            Rgba([color.red(), color.green(), color.blue(), color.alpha()])
        })
    })
}

/// Renders tiles of one index generation.
pub struct TileRenderer<'a> {
    options: &'a LayerOptions,
    projection: &'a dyn Projection,
    resolver: StyleResolver<'a>,
}

impl<'a> TileRenderer<'a> {
    pub fn new(options: &'a LayerOptions, projection: &'a dyn Projection) -> Self {
        Self {
            options,
            projection,
            resolver: StyleResolver::new(options),
        }
    }

    /// Render `tile` into a fresh transparent buffer.
    pub fn render(&self, index: &ShapeIndex, tile: TileCoord) -> Result<RgbaImage> {
        let side = self.options.physical_tile_size();
        let mut canvas = Pixmap::new(side, side).ok_or_else(|| {
            ShapeLayerError::InvalidConfig(format!("cannot allocate a {side}x{side} tile"))
        })?;
        self.render_into(index, tile, &mut canvas)?;
        Ok(to_image(&canvas))
    }

    /// Paint every shape of `tile` onto `canvas`. Returns the number of shapes
    /// drawn.
    pub fn render_into<C: Canvas>(
        &self,
        index: &ShapeIndex,
        tile: TileCoord,
        canvas: &mut C,
    ) -> Result<usize> {
        let tile_size = self.options.tile_size;
        let query = tile
            .pixel_bounds(tile_size)
            .scale(scale_between(tile.zoom, index.zoom()));

        let hits = index.query(&query);
        log::trace!(
            "Tile {}/{}/{}: {} shapes (index zoom {})",
            tile.zoom,
            tile.x,
            tile.y,
            hits.len(),
            index.zoom()
        );

        let origin = tile.pixel_origin(tile_size);
        for record in &hits {
            let size = self.resolver.resolve_size(record, tile.zoom)?;
            let color = self.resolver.resolve_color(record, tile.zoom);
            let global = self.position(record, index.zoom(), tile.zoom)?;
            let local = (global - origin) * self.options.device_pixel_ratio;

            self.draw_shape(canvas, local, size, color);
        }

        Ok(hits.len())
    }

    /// Global pixel position of a record at `zoom`.
    fn position(&self, record: &ShapeRecord, index_zoom: u8, zoom: u8) -> Result<Coord<f64>> {
        match record {
            ShapeRecord::Cluster(cluster) => Ok(cluster.centroid_at(zoom)),
            ShapeRecord::Single(shape) if index_zoom == zoom => Ok(shape.position),
            ShapeRecord::Single(shape) => self
                .projection
                .to_global_pixels(shape.feature.position, zoom)
                .map_err(ShapeLayerError::Projection),
        }
    }

    /// Paint one shape of logical `size` at device position `at`.
    fn draw_shape<C: Canvas>(&self, canvas: &mut C, at: Coord<f64>, size: f64, color: Color) {
        let dpr = self.options.device_pixel_ratio;

        match self.options.shape_form {
            ShapeForm::Circles => {
                let radius = (size / 2.0).floor();
                if radius > 0.0 {
                    let center = coord! { x: at.x.round(), y: at.y.round() };
                    canvas.fill_circle(center, radius * dpr, color);
                } else {
                    // Sub-pixel circles degrade to one logical pixel.
                    let block = dpr.floor();
                    canvas.fill_rect(at.x.floor(), at.y.floor(), block, block, color);
                }
            }
            ShapeForm::Squares => {
                let left = (at.x - size * dpr / 2.0).floor();
                let top = (at.y - size * dpr / 2.0).floor();

                if size >= OUTLINE_MIN_SIZE && size < f64::from(self.options.tile_size) {
                    let inset = (2.0 * dpr).round();
                    let border = dpr.round();
                    let inner = (dpr * (size - 2.0)).round();
                    let outer = (dpr * (size - 1.0)).round();

                    canvas.fill_rect(left + inset, top + inset, inner, inner, color);
                    canvas.stroke_rect(left + border, top + border, outer, outer, SQUARE_INNER_STROKE);
                    canvas.stroke_rect(left, top, inner, inner, SQUARE_OUTER_STROKE);
                } else {
                    let side = (dpr * size).round();
                    canvas.fill_rect(left, top, side, side, color);
                }
            }
        }
    }
}
