//! Frame sources: a synthetic scene generator and an image-directory replay.

use crate::error::{HwError, Result};
use image::{Rgb, RgbImage};
use pisau_traits::{Camera, Frame};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Solid rectangle painted into a synthetic frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blob {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
    pub color: [u8; 3],
}

impl Blob {
    /// Blob centered on `(cx, cy)`.
    pub fn centered(cx: i32, cy: i32, w: u32, h: u32, color: [u8; 3]) -> Self {
        Self {
            x: cx - (w / 2) as i32,
            y: cy - (h / 2) as i32,
            w,
            h,
            color,
        }
    }
}

#[derive(Debug, Default)]
struct Scene {
    blobs: Vec<Blob>,
    // per-read blob displacement
    sweep: Option<(i32, i32)>,
    fail_next: bool,
}

/// Handle for editing the scene a [`SimulatedCamera`] renders.
#[derive(Debug, Clone, Default)]
pub struct SceneHandle(Rc<RefCell<Scene>>);

impl SceneHandle {
    pub fn set_blobs(&self, blobs: Vec<Blob>) {
        self.0.borrow_mut().blobs = blobs;
    }
    pub fn clear(&self) {
        self.0.borrow_mut().blobs.clear();
    }
    /// Next `read_frame` returns an error.
    pub fn fail_next_read(&self) {
        self.0.borrow_mut().fail_next = true;
    }
}

/// Synthetic camera: flat background plus the blobs in the shared scene.
#[derive(Debug)]
pub struct SimulatedCamera {
    width: u32,
    height: u32,
    background: [u8; 3],
    scene: SceneHandle,
}

impl SimulatedCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            background: [90, 90, 90],
            scene: SceneHandle::default(),
        }
    }

    pub fn with_background(mut self, rgb: [u8; 3]) -> Self {
        self.background = rgb;
        self
    }

    /// Move every blob by `(dx, dy)` after each read, wrapping around the frame.
    pub fn with_sweep(self, dx: i32, dy: i32) -> Self {
        self.scene.0.borrow_mut().sweep = Some((dx, dy));
        self
    }

    pub fn scene(&self) -> SceneHandle {
        self.scene.clone()
    }

    fn render(&self, blobs: &[Blob]) -> RgbImage {
        let mut img = RgbImage::from_pixel(self.width, self.height, Rgb(self.background));
        for b in blobs {
            let x0 = b.x.max(0) as u32;
            let y0 = b.y.max(0) as u32;
            let x1 = (b.x + b.w as i32).clamp(0, self.width as i32) as u32;
            let y1 = (b.y + b.h as i32).clamp(0, self.height as i32) as u32;
            for y in y0..y1 {
                for x in x0..x1 {
                    img.put_pixel(x, y, Rgb(b.color));
                }
            }
        }
        img
    }
}

impl Camera for SimulatedCamera {
    fn read_frame(&mut self) -> std::result::Result<Frame, Box<dyn std::error::Error + Send + Sync>> {
        let mut scene = self.scene.0.borrow_mut();
        if scene.fail_next {
            scene.fail_next = false;
            return Err(Box::new(HwError::Camera("simulated dropout".into())));
        }
        let frame = self.render(&scene.blobs);
        if let Some((dx, dy)) = scene.sweep {
            let (w, h) = (self.width as i32, self.height as i32);
            for b in scene.blobs.iter_mut() {
                b.x = (b.x + dx).rem_euclid(w);
                b.y = (b.y + dy).rem_euclid(h);
            }
        }
        Ok(frame)
    }
}

/// Replays still images from a directory in name order, looping forever.
#[derive(Debug)]
pub struct ImageDirCamera {
    frames: Vec<PathBuf>,
    next: usize,
}

impl ImageDirCamera {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
                    .unwrap_or(false)
            })
            .collect();
        if frames.is_empty() {
            return Err(HwError::NoFrames(dir.display().to_string()));
        }
        frames.sort();
        tracing::info!(count = frames.len(), dir = %dir.display(), "replay camera ready");
        Ok(Self { frames, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Camera for ImageDirCamera {
    fn read_frame(&mut self) -> std::result::Result<Frame, Box<dyn std::error::Error + Send + Sync>> {
        let path = &self.frames[self.next];
        self.next = (self.next + 1) % self.frames.len();
        let img = image::open(path).map_err(HwError::from)?;
        Ok(img.to_rgb8())
    }
}
