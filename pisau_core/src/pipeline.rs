//! Per-frame intrusion detection.
//!
//! Frames alternate between FULL (detection + annotation) and LIGHT (overlay
//! only), starting with FULL. In FULL mode the skin stage runs first; the
//! motion stage only runs when no hand was found in the inner zone.

use crate::config::DetectionCfg;
use crate::zone::{Point, ZoneDetector, Zones, point_in_zone};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::contour_area;
use imageproc::morphology::dilate;
use imageproc::rect::Rect;
use pisau_traits::Frame;
use std::time::{Duration, Instant};

pub const TEXT_HAND: &str = "WARNING: HAND DETECTED IN CUTTING AREA";
pub const TEXT_MOTION_INNER: &str = "WARNING: Moving Item IN Cutting Board Area";
pub const TEXT_MOTION_OUTER: &str = "WARNING: Moving Item NEAR Cutting Board Area";
pub const TEXT_CLEAR: &str = "Cutting Board is Clear";

const BOX_INNER: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_OUTER: Rgb<u8> = Rgb([255, 255, 0]);
const BOX_ELSEWHERE: Rgb<u8> = Rgb([255, 255, 255]);

const FLASH_PHASES: u32 = 6;
const FLASH_PHASE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrusionKind {
    Hand,
    MotionInner,
    MotionOuter,
}

impl IntrusionKind {
    pub fn status_text(self) -> &'static str {
        match self {
            Self::Hand => TEXT_HAND,
            Self::MotionInner => TEXT_MOTION_INNER,
            Self::MotionOuter => TEXT_MOTION_OUTER,
        }
    }

    pub(crate) fn reason(self) -> &'static str {
        match self {
            Self::Hand => "hand in inner zone",
            Self::MotionInner => "motion in inner zone",
            Self::MotionOuter => "motion in outer zone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntrusionEvent {
    pub kind: IntrusionKind,
    /// Bounding-box center in full-resolution pixels.
    pub centroid: Point,
    pub timestamp: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    Full,
    Light,
}

impl FrameMode {
    fn toggled(self) -> Self {
        match self {
            Self::Full => Self::Light,
            Self::Light => Self::Full,
        }
    }
}

/// Everything the display needs for one processed frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub annotated: RgbImage,
    pub mode: FrameMode,
    pub event: Option<IntrusionEvent>,
    pub warning_active: bool,
    pub status_text: &'static str,
    /// Hand-alert flash phase (background red when `true`).
    pub flash_on: bool,
}

#[derive(Debug)]
pub struct IntrusionPipeline {
    cfg: DetectionCfg,
    next_mode: FrameMode,
    prev_small: Option<GrayImage>,
    last_event: Option<(Instant, IntrusionKind)>,
    flash_started: Option<Instant>,
}

impl IntrusionPipeline {
    pub fn new(cfg: DetectionCfg) -> Self {
        Self {
            cfg,
            next_mode: FrameMode::Full,
            prev_small: None,
            last_event: None,
            flash_started: None,
        }
    }

    pub fn config(&self) -> &DetectionCfg {
        &self.cfg
    }

    pub fn set_config(&mut self, cfg: DetectionCfg) {
        if cfg.downsample != self.cfg.downsample {
            self.prev_small = None;
        }
        self.cfg = cfg;
    }

    /// Forget the reference frame and warning state.
    pub fn reset(&mut self) {
        self.next_mode = FrameMode::Full;
        self.prev_small = None;
        self.last_event = None;
        self.flash_started = None;
    }

    /// Warning window still open at `now`.
    pub fn warning_active(&self, now: Instant) -> bool {
        self.last_event
            .is_some_and(|(at, _)| now.saturating_duration_since(at) <= self.cfg.warning_duration)
    }

    pub fn process(&mut self, frame: Frame, zones: &mut ZoneDetector, now: Instant) -> FrameReport {
        let (w, h) = frame.dimensions();
        let mode = self.next_mode;
        self.next_mode = mode.toggled();
        let cache = zones.prepare(w, h);

        let mut annotated = frame;
        let event = match mode {
            FrameMode::Full => self.detect(&mut annotated, &cache.zones, now),
            FrameMode::Light => None,
        };
        cache.overlay.composite(&mut annotated);

        if let Some(ev) = &event {
            tracing::debug!(kind = ?ev.kind, x = ev.centroid.x, y = ev.centroid.y, "intrusion");
            self.last_event = Some((now, ev.kind));
            if ev.kind == IntrusionKind::Hand && !self.flashing(now) {
                self.flash_started = Some(now);
            }
        }
        let warning_active = self.warning_active(now);
        let status_text = match (warning_active, self.last_event) {
            (true, Some((_, kind))) => kind.status_text(),
            _ => TEXT_CLEAR,
        };
        let flash_on = self.flash_on(now);
        tracing::trace!(?mode, warning_active, "frame processed");

        FrameReport {
            annotated,
            mode,
            event,
            warning_active,
            status_text,
            flash_on,
        }
    }

    fn flash_phase(&self, now: Instant) -> Option<u32> {
        let started = self.flash_started?;
        let phase = now.saturating_duration_since(started).as_millis() / FLASH_PHASE.as_millis();
        u32::try_from(phase).ok().filter(|p| *p < FLASH_PHASES)
    }

    fn flashing(&self, now: Instant) -> bool {
        self.flash_phase(now).is_some()
    }

    fn flash_on(&self, now: Instant) -> bool {
        self.flash_phase(now).is_some_and(|p| p % 2 == 0)
    }

    fn detect(&mut self, frame: &mut RgbImage, zones: &Zones, now: Instant) -> Option<IntrusionEvent> {
        let small = self.motion_frame(frame);
        let event = match self.find_hand(frame, zones) {
            Some(centroid) => Some(IntrusionEvent {
                kind: IntrusionKind::Hand,
                centroid,
                timestamp: now,
            }),
            None => self.find_motion(frame, &small, zones, now),
        };
        self.prev_small = Some(small);
        event
    }

    /// First large skin blob whose center sits in the inner zone.
    fn find_hand(&self, frame: &RgbImage, zones: &Zones) -> Option<Point> {
        let mask = skin_mask(frame, self.cfg.skin_lower, self.cfg.skin_upper);
        find_contours::<i32>(&mask)
            .into_iter()
            .filter(is_external)
            .filter(|c| contour_area(&c.points).abs() >= self.cfg.min_hand_area)
            .map(|c| bounds(&c).center())
            .find(|p| point_in_zone(*p, &zones.inner))
    }

    /// Downsampled, grayscale, blurred copy for differencing.
    fn motion_frame(&self, frame: &RgbImage) -> GrayImage {
        let ratio = self.cfg.downsample.max(1);
        let gray = if ratio == 1 {
            imageops::grayscale(frame)
        } else {
            let (w, h) = frame.dimensions();
            let small = imageops::resize(
                frame,
                (w / ratio).max(1),
                (h / ratio).max(1),
                FilterType::Triangle,
            );
            imageops::grayscale(&small)
        };
        gaussian_blur_f32(&gray, self.cfg.blur_sigma)
    }

    fn find_motion(
        &self,
        frame: &mut RgbImage,
        small: &GrayImage,
        zones: &Zones,
        now: Instant,
    ) -> Option<IntrusionEvent> {
        let prev = self.prev_small.as_ref()?;
        if prev.dimensions() != small.dimensions() {
            return None;
        }
        let ratio = self.cfg.downsample.max(1);
        let ratio_i = i32::try_from(ratio).unwrap_or(1);
        let min_area = self.cfg.min_motion_area / f64::from(ratio * ratio);

        let mut diff = GrayImage::new(small.width(), small.height());
        for ((d, a), b) in diff.pixels_mut().zip(prev.pixels()).zip(small.pixels()) {
            let delta = a[0].abs_diff(b[0]);
            *d = Luma([if delta > self.cfg.diff_threshold { 255 } else { 0 }]);
        }
        let dilated = dilate(&diff, Norm::LInf, self.cfg.dilate_iterations);

        let mut event = None;
        let mut decided = false;
        for contour in find_contours::<i32>(&dilated).iter().filter(|c| is_external(c)) {
            if contour_area(&contour.points).abs() < min_area {
                continue;
            }
            let b = bounds(contour).scaled(ratio_i);
            let center = b.center();
            let kind = if point_in_zone(center, &zones.inner) {
                Some(IntrusionKind::MotionInner)
            } else if point_in_zone(center, &zones.outer) {
                Some(IntrusionKind::MotionOuter)
            } else {
                None
            };
            let color = match kind {
                Some(IntrusionKind::MotionInner) => BOX_INNER,
                Some(_) => BOX_OUTER,
                None => BOX_ELSEWHERE,
            };
            b.draw(frame, color);
            if !decided {
                decided = true;
                event = kind.map(|kind| IntrusionEvent {
                    kind,
                    centroid: center,
                    timestamp: now,
                });
            }
        }
        event
    }
}

fn is_external(c: &Contour<i32>) -> bool {
    c.border_type == BorderType::Outer && c.parent.is_none()
}

/// Inclusive pixel bounds of a contour.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
}

impl Bounds {
    fn width(&self) -> i32 {
        self.x1 - self.x0 + 1
    }
    fn height(&self) -> i32 {
        self.y1 - self.y0 + 1
    }
    fn center(&self) -> Point {
        Point::new(self.x0 + self.width() / 2, self.y0 + self.height() / 2)
    }
    fn scaled(&self, k: i32) -> Self {
        Self {
            x0: self.x0 * k,
            y0: self.y0 * k,
            x1: (self.x1 + 1) * k - 1,
            y1: (self.y1 + 1) * k - 1,
        }
    }
    fn draw(&self, frame: &mut RgbImage, color: Rgb<u8>) {
        let (w, h) = (self.width().unsigned_abs(), self.height().unsigned_abs());
        for inset in 0..2 {
            if w <= 2 * inset || h <= 2 * inset {
                break;
            }
            let rect = Rect::at(self.x0 + inset as i32, self.y0 + inset as i32)
                .of_size(w - 2 * inset, h - 2 * inset);
            draw_hollow_rect_mut(frame, rect, color);
        }
    }
}

fn bounds(c: &Contour<i32>) -> Bounds {
    let mut b = Bounds {
        x0: i32::MAX,
        y0: i32::MAX,
        x1: i32::MIN,
        y1: i32::MIN,
    };
    for p in &c.points {
        b.x0 = b.x0.min(p.x);
        b.y0 = b.y0.min(p.y);
        b.x1 = b.x1.max(p.x);
        b.y1 = b.y1.max(p.y);
    }
    b
}

/// RGB to HSV in the OpenCV 8-bit convention (H halved into 0..180).
pub fn rgb_to_hsv(px: Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = px.0.map(f32::from);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let s = if max == 0.0 { 0.0 } else { 255.0 * delta / max };
    let mut hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if hue < 0.0 {
        hue += 360.0;
    }
    let h8 = (hue / 2.0).round() as u8 % 180;
    [h8, s.round() as u8, max as u8]
}

/// Binary mask of pixels whose HSV value lies in `[lower, upper]`.
pub fn skin_mask(frame: &RgbImage, lower: [u8; 3], upper: [u8; 3]) -> GrayImage {
    let mut mask = GrayImage::new(frame.width(), frame.height());
    for (m, px) in mask.pixels_mut().zip(frame.pixels()) {
        let hsv = rgb_to_hsv(*px);
        let inside = (0..3).all(|i| (lower[i]..=upper[i]).contains(&hsv[i]));
        *m = Luma([if inside { 255 } else { 0 }]);
    }
    mask
}
