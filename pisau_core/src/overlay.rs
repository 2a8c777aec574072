//! Rasterized hatch + boundary overlay.

use crate::zone::{Point, point_in_zone};
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;

pub const HATCH_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const OUTER_STROKE: Rgba<u8> = Rgba([255, 255, 0, 255]);
pub const INNER_STROKE: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Transparent layer with the hatch and both zone outlines.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    layer: RgbaImage,
}

impl Overlay {
    pub fn dimensions(&self) -> (u32, u32) {
        self.layer.dimensions()
    }

    /// Opaque overlay color at `(x, y)`, `None` where the layer is clear.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb<u8>> {
        let p = self.layer.get_pixel_checked(x, y)?;
        (p[3] != 0).then_some(Rgb([p[0], p[1], p[2]]))
    }

    /// Paint every opaque overlay pixel onto `frame`.
    pub fn composite(&self, frame: &mut RgbImage) {
        if frame.dimensions() != self.layer.dimensions() {
            tracing::debug!(
                frame = ?frame.dimensions(),
                overlay = ?self.layer.dimensions(),
                "overlay size mismatch; skipping composite"
            );
            return;
        }
        for (dst, src) in frame.pixels_mut().zip(self.layer.pixels()) {
            if src[3] != 0 {
                *dst = Rgb([src[0], src[1], src[2]]);
            }
        }
    }
}

fn stroke(layer: &mut RgbaImage, poly: &[Point], color: Rgba<u8>) {
    let n = poly.len();
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        // two pixels wide
        for d in [0.0_f32, 1.0] {
            draw_line_segment_mut(
                layer,
                (a.x as f32, a.y as f32 + d),
                (b.x as f32, b.y as f32 + d),
                color,
            );
        }
    }
}

/// Rasterize the overlay for a `w` x `h` frame.
///
/// Diagonal hatch lines run every `spacing` pixels across the whole frame and
/// are then cleared inside `outer`; the outer boundary is stroked yellow and
/// the inner one red.
pub fn generate_overlay(w: u32, h: u32, outer: &[Point], inner: &[Point], spacing: i32) -> Overlay {
    let mut layer = RgbaImage::new(w, h);
    let spacing = usize::try_from(spacing.max(1)).unwrap_or(1);
    let hi = i32::try_from(h).unwrap_or(i32::MAX);
    let wi = i32::try_from(w).unwrap_or(i32::MAX);
    for i in (-hi..wi).step_by(spacing) {
        draw_line_segment_mut(
            &mut layer,
            (i as f32, 0.0),
            ((i + hi) as f32, hi as f32),
            HATCH_COLOR,
        );
    }
    for (x, y, px) in layer.enumerate_pixels_mut() {
        if px[3] == 0 {
            continue;
        }
        let p = Point::new(
            i32::try_from(x).unwrap_or(i32::MAX),
            i32::try_from(y).unwrap_or(i32::MAX),
        );
        if point_in_zone(p, outer) {
            *px = Rgba([0, 0, 0, 0]);
        }
    }
    stroke(&mut layer, outer, OUTER_STROKE);
    stroke(&mut layer, inner, INNER_STROKE);
    Overlay { layer }
}
