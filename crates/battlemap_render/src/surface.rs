//! Offscreen surfaces reused across frames

use image::RgbaImage;
use std::collections::HashMap;

/// What an offscreen surface is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfacePurpose {
    /// Per-layer alpha mask for effects
    LayerMask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceKey {
    pub purpose: SurfacePurpose,
    pub width: u32,
    pub height: u32,
}

/// Arena of reusable offscreen surfaces keyed by `(purpose, width, height)`.
///
/// Surfaces are cleared when handed out. A viewport resize leaves stale
/// sizes behind until [`SurfacePool::retain_size`] drops them.
#[derive(Debug, Default)]
pub struct SurfacePool {
    surfaces: HashMap<SurfaceKey, RgbaImage>,
}

impl SurfacePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transparent surface of the requested size
    pub fn acquire(&mut self, purpose: SurfacePurpose, width: u32, height: u32) -> &mut RgbaImage {
        let key = SurfaceKey {
            purpose,
            width,
            height,
        };
        let surface = self
            .surfaces
            .entry(key)
            .or_insert_with(|| RgbaImage::new(width, height));
        for px in surface.pixels_mut() {
            px.0 = [0; 4];
        }
        surface
    }

    /// Drop every surface not of the given size
    pub fn retain_size(&mut self, width: u32, height: u32) {
        self.surfaces
            .retain(|key, _| key.width == width && key.height == height);
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn clear(&mut self) {
        self.surfaces.clear();
    }
}
