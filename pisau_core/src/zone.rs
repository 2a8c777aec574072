//! Safety-zone geometry and the cached overlay.
//!
//! Both zones are trapezoids centered on the frame center plus the configured
//! offset: the top edge spans the full zone width, the bottom edge half of it.
//! Polygon vertices are ordered bottom-left, bottom-right, top-right, top-left
//! in image coordinates (y grows downward).

use crate::config::ZoneCfg;
use crate::overlay::{Overlay, generate_overlay};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Zones {
    pub outer: Vec<Point>,
    pub inner: Vec<Point>,
}

fn trapezoid(cx: i32, cy: i32, w: i32, h: i32) -> Vec<Point> {
    vec![
        Point::new(cx - w / 2, cy + h / 2),
        Point::new(cx + w / 2, cy + h / 2),
        Point::new(cx + w / 4, cy - h / 2),
        Point::new(cx - w / 4, cy - h / 2),
    ]
}

/// Outer and inner polygons for a frame of `frame_w` x `frame_h`.
pub fn compute_zones(frame_w: u32, frame_h: u32, cfg: &ZoneCfg) -> Zones {
    let cx = i32::try_from(frame_w / 2).unwrap_or(i32::MAX) + cfg.offset_x;
    let cy = i32::try_from(frame_h / 2).unwrap_or(i32::MAX) + cfg.offset_y;
    Zones {
        outer: trapezoid(cx, cy, cfg.outer_width, cfg.outer_height),
        inner: trapezoid(cx, cy, cfg.inner_width, cfg.inner_height),
    }
}

fn on_segment(p: Point, a: Point, b: Point) -> bool {
    let cross = i64::from(b.x - a.x) * i64::from(p.y - a.y) - i64::from(b.y - a.y) * i64::from(p.x - a.x);
    cross == 0
        && p.x >= a.x.min(b.x)
        && p.x <= a.x.max(b.x)
        && p.y >= a.y.min(b.y)
        && p.y <= a.y.max(b.y)
}

/// Point-in-polygon test; points on an edge or vertex count as inside.
pub fn point_in_zone(p: Point, poly: &[Point]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (poly[i], poly[j]);
        if on_segment(p, a, b) {
            return true;
        }
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = f64::from(a.x)
                + f64::from(p.y - a.y) * f64::from(b.x - a.x) / f64::from(b.y - a.y);
            if f64::from(p.x) < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Shared "geometry changed" flag.
///
/// Clones observe the same flag; the coordinator marks it on reset and the
/// detector consumes it on the next frame.
#[derive(Debug, Clone, Default)]
pub struct DirtyFlag(Rc<Cell<bool>>);

impl DirtyFlag {
    pub fn mark(&self) {
        self.0.set(true);
    }
    pub fn is_dirty(&self) -> bool {
        self.0.get()
    }
    fn take(&self) -> bool {
        self.0.replace(false)
    }
}

/// Zones plus overlay for one frame size.
#[derive(Debug, Clone)]
pub struct ZoneCache {
    pub size: (u32, u32),
    pub zones: Zones,
    pub overlay: Overlay,
}

/// Owns the zone config and the cached zones/overlay derived from it.
#[derive(Debug)]
pub struct ZoneDetector {
    cfg: ZoneCfg,
    dirty: DirtyFlag,
    cache: Option<ZoneCache>,
    regenerations: u64,
}

impl ZoneDetector {
    pub fn new(cfg: ZoneCfg) -> Self {
        let dirty = DirtyFlag::default();
        dirty.mark();
        Self {
            cfg: clamp_logged(cfg),
            dirty,
            cache: None,
            regenerations: 0,
        }
    }

    pub fn config(&self) -> &ZoneCfg {
        &self.cfg
    }

    /// Replace the geometry. Marks the cache dirty when anything changed.
    pub fn set_config(&mut self, cfg: ZoneCfg) {
        let cfg = clamp_logged(cfg);
        if cfg != self.cfg {
            tracing::debug!(?cfg, "zone config changed");
            self.cfg = cfg;
            self.dirty.mark();
        }
    }

    pub fn dirty_flag(&self) -> DirtyFlag {
        self.dirty.clone()
    }

    /// Number of overlay rebuilds so far.
    pub fn regenerations(&self) -> u64 {
        self.regenerations
    }

    /// Last prepared cache, if any frame has been seen.
    pub fn cached(&self) -> Option<&ZoneCache> {
        self.cache.as_ref()
    }

    /// Zones and overlay for a `w` x `h` frame, rebuilding only when the
    /// dirty flag is set or the frame size changed.
    pub fn prepare(&mut self, w: u32, h: u32) -> &ZoneCache {
        let was_dirty = self.dirty.take();
        if was_dirty || self.cache.as_ref().is_some_and(|c| c.size != (w, h)) {
            self.cache = None;
        }
        let cfg = &self.cfg;
        let regenerations = &mut self.regenerations;
        self.cache.get_or_insert_with(|| {
            *regenerations += 1;
            let zones = compute_zones(w, h, cfg);
            let overlay = generate_overlay(w, h, &zones.outer, &zones.inner, cfg.hatch_spacing);
            tracing::debug!(w, h, generation = *regenerations, "zone overlay regenerated");
            ZoneCache {
                size: (w, h),
                zones,
                overlay,
            }
        })
    }
}

fn clamp_logged(cfg: ZoneCfg) -> ZoneCfg {
    match cfg.clamped() {
        Some(fixed) => {
            tracing::warn!(
                inner_width = cfg.inner_width,
                inner_height = cfg.inner_height,
                outer_width = cfg.outer_width,
                outer_height = cfg.outer_height,
                "inner zone exceeds outer zone; clamping"
            );
            fixed
        }
        None => cfg,
    }
}
