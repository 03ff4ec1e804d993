//! Ray-traced point lights and the darkness overlay
//!
//! Each light casts a fan of rays through the cell grid; a ray stops at the
//! first cell covered by a light-blocking tile. A pixel is lit by a light
//! when it lies within the light's radius and no further from the light than
//! the ray pointing at it. The darkness overlay is then punched through by
//! the accumulated light.

use battlemap_core::{Camera, CellCenter, CellPos, PlacedTile};
use image::RgbaImage;
use rayon::prelude::*;
use std::collections::HashSet;
use std::f64::consts::TAU;

/// A point light in cell units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSource {
    pub center: CellCenter,
    pub radius: f64,
    pub color: [u8; 3],
    pub intensity: f32,
}

/// Cells that stop light
#[derive(Debug, Clone, Default)]
pub struct Occluders {
    cells: HashSet<CellPos>,
}

impl Occluders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every cell covered by a light-blocking tile
    pub fn from_tiles<'a>(tiles: impl IntoIterator<Item = &'a PlacedTile>) -> Self {
        let mut cells = HashSet::new();
        for tile in tiles {
            if tile.blocks_light {
                cells.extend(tile.bounds().cells());
            }
        }
        Self { cells }
    }

    pub fn block(&mut self, cell: CellPos) {
        self.cells.insert(cell);
    }

    pub fn is_blocked(&self, cell: CellPos) -> bool {
        self.cells.contains(&cell)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Distance (cells) a ray from `origin` along `angle` travels before it
/// enters a blocked cell, capped at `max`.
///
/// Grid traversal visits every cell the ray crosses, so thin walls are never
/// skipped. The origin cell itself never blocks.
pub fn cast_ray(origin: CellCenter, angle: f64, max: f64, occluders: &Occluders) -> f64 {
    let (dy, dx) = angle.sin_cos();
    let mut cell = CellPos::new(origin.x.floor() as i32, origin.y.floor() as i32);
    let step_x = if dx > 0.0 { 1 } else { -1 };
    let step_y = if dy > 0.0 { 1 } else { -1 };

    let boundary = |pos: f64, cell: i32, step: i32| {
        if step > 0 {
            (cell + 1) as f64 - pos
        } else {
            pos - cell as f64
        }
    };
    let mut t_max_x = if dx.abs() < 1e-12 {
        f64::INFINITY
    } else {
        boundary(origin.x, cell.x, step_x) / dx.abs()
    };
    let mut t_max_y = if dy.abs() < 1e-12 {
        f64::INFINITY
    } else {
        boundary(origin.y, cell.y, step_y) / dy.abs()
    };
    let t_delta_x = if dx.abs() < 1e-12 { f64::INFINITY } else { 1.0 / dx.abs() };
    let t_delta_y = if dy.abs() < 1e-12 { f64::INFINITY } else { 1.0 / dy.abs() };

    loop {
        let t = if t_max_x < t_max_y {
            let t = t_max_x;
            t_max_x += t_delta_x;
            cell.x += step_x;
            t
        } else {
            let t = t_max_y;
            t_max_y += t_delta_y;
            cell.y += step_y;
            t
        };
        if t >= max {
            return max;
        }
        if occluders.is_blocked(cell) {
            return t;
        }
    }
}

/// Ray lengths for `ray_count` evenly spaced angles starting at 0
pub fn cast_rays(light: &LightSource, occluders: &Occluders, ray_count: usize) -> Vec<f64> {
    let count = ray_count.max(4);
    (0..count)
        .map(|i| {
            let angle = i as f64 / count as f64 * TAU;
            cast_ray(light.center, angle, light.radius, occluders)
        })
        .collect()
}

/// Accumulated light per screen pixel
#[derive(Debug, Clone)]
pub struct LightMap {
    width: u32,
    height: u32,
    /// `[intensity, r, g, b]`, color weighted by intensity
    data: Vec<[f32; 4]>,
}

impl LightMap {
    pub fn intensity(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize][0]
    }

    pub fn build(
        width: u32,
        height: u32,
        camera: &Camera,
        lights: &[LightSource],
        occluders: &Occluders,
        ray_count: usize,
    ) -> Self {
        let w = width as usize;
        let mut data = vec![[0.0f32; 4]; w * height as usize];
        if w == 0 || height == 0 {
            return Self {
                width,
                height,
                data,
            };
        }
        let cell_px = camera.cell_pixels();

        for light in lights {
            if light.radius <= 0.0 || light.intensity <= 0.0 {
                continue;
            }
            let rays = cast_rays(light, occluders, ray_count);
            let center = camera.world_to_screen(light.center.to_world());
            let radius_px = light.radius * cell_px;
            let y0 = (center.y - radius_px).floor().max(0.0) as usize;
            let y1 = ((center.y + radius_px).ceil().max(0.0) as usize).min(height as usize);
            let x0 = (center.x - radius_px).floor().max(0.0) as usize;
            let x1 = ((center.x + radius_px).ceil().max(0.0) as usize).min(w);
            if y0 >= y1 || x0 >= x1 {
                continue;
            }
            let color = light.color.map(|c| c as f32 / 255.0);

            data.par_chunks_mut(w)
                .enumerate()
                .skip(y0)
                .take(y1 - y0)
                .for_each(|(y, row)| {
                    for (x, texel) in row.iter_mut().enumerate().take(x1).skip(x0) {
                        let dx = (x as f64 + 0.5 - center.x) / cell_px;
                        let dy = (y as f64 + 0.5 - center.y) / cell_px;
                        let dist = (dx * dx + dy * dy).sqrt();
                        if dist >= light.radius {
                            continue;
                        }
                        let angle = dy.atan2(dx).rem_euclid(TAU);
                        let index = (angle / TAU * rays.len() as f64).round() as usize % rays.len();
                        if dist > rays[index] {
                            continue;
                        }
                        let falloff = (1.0 - dist / light.radius) as f32;
                        let amount = falloff * light.intensity;
                        texel[0] += amount;
                        texel[1] += color[0] * amount;
                        texel[2] += color[1] * amount;
                        texel[3] += color[2] * amount;
                    }
                });
        }

        Self {
            width,
            height,
            data,
        }
    }
}

/// How strongly lit pixels pick up the light's color
const LIGHT_TINT: f32 = 0.35;

/// Darken `dst` by `darkness` except where light reaches
pub fn composite_darkness(dst: &mut RgbaImage, light: &LightMap, darkness: f32) {
    if dst.width() != light.width || dst.height() != light.height || dst.width() == 0 {
        return;
    }
    let w = light.width as usize;
    dst.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let [amount, r, g, b] = light.data[y * w + x];
            let lit = amount.clamp(0.0, 1.0);
            let shadow = darkness.clamp(0.0, 1.0) * (1.0 - lit);
            let px = &mut row[x * 4..x * 4 + 4];
            let tint = if amount > 0.0 {
                [r / amount, g / amount, b / amount]
            } else {
                [1.0; 3]
            };
            for c in 0..3 {
                let toward = 1.0 - LIGHT_TINT * lit + LIGHT_TINT * lit * tint[c];
                let value = px[c] as f32 * toward * (1.0 - shadow);
                px[c] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    });
}
