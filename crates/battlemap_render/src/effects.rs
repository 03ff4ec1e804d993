//! Per-layer alpha-mask effects: shadow, outline, tint and shade
//!
//! A layer's tiles are first drawn into an offscreen surface with the same
//! screen transform as the main pass; its alpha channel becomes an
//! [`AlphaMask`]. Every effect is then a mask operation followed by a
//! composite into the frame.

use crate::raster::{blend_multiply, blend_over};
use battlemap_core::{Camera, ScreenPos};
use image::RgbaImage;
use rayon::prelude::*;

/// Coverage in `[0, 1]` per pixel
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaMask {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl AlphaMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize],
        }
    }

    pub fn from_image_alpha(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: image.pixels().map(|p| p[3] as f32 / 255.0).collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// True for zero-sized masks and masks with no coverage at all
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|a| *a <= 0.0)
    }

    /// Separable gaussian blur
    pub fn blurred(&self, sigma: f32) -> AlphaMask {
        let w = self.width as usize;
        let h = self.height as usize;
        if w == 0 || h == 0 || sigma <= 0.0 {
            return self.clone();
        }
        let kernel = build_gaussian_kernel(sigma);
        let radius = kernel.len() as isize / 2;

        let mut horizontal = vec![0.0f32; w * h];
        horizontal.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            let src = &self.data[y * w..(y + 1) * w];
            for (x, out) in row.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = x as isize + k as isize - radius;
                    if sx >= 0 && (sx as usize) < w {
                        acc += src[sx as usize] * weight;
                    }
                }
                *out = acc;
            }
        });

        let mut vertical = vec![0.0f32; w * h];
        vertical.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sy = y as isize + k as isize - radius;
                    if sy >= 0 && (sy as usize) < h {
                        acc += horizontal[sy as usize * w + x] * weight;
                    }
                }
                *out = acc;
            }
        });

        AlphaMask {
            width: self.width,
            height: self.height,
            data: vertical,
        }
    }

    /// Maximum coverage within a disk of `radius` pixels: the union of the
    /// mask shifted by every offset in the disk
    pub fn dilated(&self, radius: u32) -> AlphaMask {
        let w = self.width as usize;
        let h = self.height as usize;
        if w == 0 || h == 0 || radius == 0 {
            return self.clone();
        }
        let r = radius as isize;
        let offsets: Vec<(isize, isize)> = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .filter(|(dx, dy)| dx * dx + dy * dy <= r * r)
            .collect();

        let data: Vec<f32> = (0..w * h)
            .into_par_iter()
            .map(|idx| {
                let x = (idx % w) as isize;
                let y = (idx / w) as isize;
                let mut max = 0.0f32;
                for (dx, dy) in &offsets {
                    let sx = x + dx;
                    let sy = y + dy;
                    if sx >= 0 && sy >= 0 && (sx as usize) < w && (sy as usize) < h {
                        max = max.max(self.data[sy as usize * w + sx as usize]);
                        if max >= 1.0 {
                            break;
                        }
                    }
                }
                max
            })
            .collect();

        AlphaMask {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// `self - other`, clamped at zero
    pub fn minus(&self, other: &AlphaMask) -> AlphaMask {
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).max(0.0))
            .collect();
        AlphaMask {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

/// 1-D gaussian kernel truncated at `ceil(3 * sigma)`, normalized
fn build_gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil() as usize;
    if radius == 0 {
        return vec![1.0];
    }
    let s2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..radius * 2 + 1)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / s2).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Falloff ring outside the shape: blur the mask over `distance_px` and
/// remove the original coverage. `None` when there is nothing to draw.
pub fn shadow_ring(mask: &AlphaMask, distance_px: f32) -> Option<AlphaMask> {
    if mask.width == 0 || mask.height == 0 || distance_px < 0.5 || mask.is_empty() {
        return None;
    }
    let ring = mask.blurred(distance_px / 3.0).minus(mask);
    Some(ring)
}

/// Thin ring around the shape, `width_px` wide
pub fn outline_ring(mask: &AlphaMask, width_px: f32) -> Option<AlphaMask> {
    if mask.width == 0 || mask.height == 0 || mask.is_empty() {
        return None;
    }
    let radius = width_px.round().max(1.0) as u32;
    Some(mask.dilated(radius).minus(mask))
}

fn same_size(dst: &RgbaImage, mask: &AlphaMask) -> bool {
    dst.width() == mask.width && dst.height() == mask.height && mask.width > 0 && mask.height > 0
}

/// Multiply `color` into `dst` through the mask at `opacity`
pub fn composite_multiply(dst: &mut RgbaImage, mask: &AlphaMask, color: [u8; 3], opacity: f32) {
    if !same_size(dst, mask) || opacity <= 0.0 {
        return;
    }
    let w = mask.width as usize;
    dst.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let a = mask.data[y * w + x];
            if a > 0.0 {
                blend_multiply(&mut row[x * 4..x * 4 + 4], color, a * opacity);
            }
        }
    });
}

/// Paint a solid color through the mask
pub fn composite_fill(dst: &mut RgbaImage, mask: &AlphaMask, color: [u8; 4]) {
    if !same_size(dst, mask) {
        return;
    }
    let w = mask.width as usize;
    dst.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let a = mask.data[y * w + x];
            if a > 0.0 {
                blend_over(&mut row[x * 4..x * 4 + 4], color, a);
            }
        }
    });
}

#[inline]
fn hash_u32(mut x: u32) -> u32 {
    x = x.wrapping_mul(0x9E37_79B9);
    x ^= x >> 16;
    x = x.wrapping_mul(0x85EB_CA6B);
    x ^= x >> 13;
    x = x.wrapping_mul(0xC2B2_AE35);
    x ^= x >> 16;
    x
}

fn lattice(x: i64, y: i64) -> f32 {
    let h = hash_u32((x as u32).wrapping_mul(0x27d4_eb2d) ^ hash_u32(y as u32));
    h as f32 / u32::MAX as f32
}

/// World pixels between shade noise lattice points
const SHADE_SCALE: f64 = 24.0;

/// Smooth value noise in world space; the texture stays put under pan and
/// zoom. Returns a darkness factor in `[0, 1]`.
pub fn shade_noise(world_x: f64, world_y: f64) -> f32 {
    let gx = world_x / SHADE_SCALE;
    let gy = world_y / SHADE_SCALE;
    let x0 = gx.floor();
    let y0 = gy.floor();
    let fx = (gx - x0) as f32;
    let fy = (gy - y0) as f32;
    let sx = fx * fx * (3.0 - 2.0 * fx);
    let sy = fy * fy * (3.0 - 2.0 * fy);
    let (ix, iy) = (x0 as i64, y0 as i64);
    let top = lattice(ix, iy) * (1.0 - sx) + lattice(ix + 1, iy) * sx;
    let bottom = lattice(ix, iy + 1) * (1.0 - sx) + lattice(ix + 1, iy + 1) * sx;
    top * (1.0 - sy) + bottom * sy
}

/// Multiply a procedural shading texture into `dst` through the mask
pub fn composite_shade(dst: &mut RgbaImage, mask: &AlphaMask, camera: &Camera, opacity: f32) {
    if !same_size(dst, mask) || opacity <= 0.0 {
        return;
    }
    let w = mask.width as usize;
    dst.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let a = mask.data[y * w + x];
            if a <= 0.0 {
                continue;
            }
            let world = camera.screen_to_world(ScreenPos::new(x as f64 + 0.5, y as f64 + 0.5));
            let n = shade_noise(world.x, world.y);
            let level = (255.0 * (0.55 + 0.45 * n)) as u8;
            blend_multiply(&mut row[x * 4..x * 4 + 4], [level; 3], a * opacity);
        }
    });
}
