//! Software rasterization onto `RgbaImage` surfaces

use battlemap_core::{Camera, PlacedTile, ScreenPos};
use image::RgbaImage;
use rayon::prelude::*;

/// Screen-space placement of one tile image: translate to `center`, rotate
/// by `angle`, mirror, then scale the image to `width` x `height` pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileTransform {
    pub center: ScreenPos,
    pub width: f64,
    pub height: f64,
    pub angle: f64,
    pub mirror_x: bool,
    pub mirror_y: bool,
}

impl TileTransform {
    pub fn for_tile(tile: &PlacedTile, camera: &Camera) -> Self {
        let span = tile.footprint();
        let cell = camera.cell_pixels() * tile.scale;
        Self {
            center: camera.world_to_screen(tile.center().to_world()),
            width: span.w as f64 * cell,
            height: span.h as f64 * cell,
            angle: tile.angle(),
            mirror_x: tile.mirror_x,
            mirror_y: tile.mirror_y,
        }
    }

    /// Normalized image coordinates under a screen point, or `None` when the
    /// point falls outside the image
    pub fn to_local(&self, point: ScreenPos) -> Option<(f64, f64)> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let dx = point.x - self.center.x;
        let dy = point.y - self.center.y;
        let (sin, cos) = self.angle.sin_cos();
        let mut lx = dx * cos + dy * sin;
        let mut ly = -dx * sin + dy * cos;
        if self.mirror_x {
            lx = -lx;
        }
        if self.mirror_y {
            ly = -ly;
        }
        let u = lx / self.width + 0.5;
        let v = ly / self.height + 0.5;
        if (0.0..1.0).contains(&u) && (0.0..1.0).contains(&v) {
            Some((u, v))
        } else {
            None
        }
    }

    /// Screen positions of the image corners
    pub fn corners(&self) -> [ScreenPos; 4] {
        let (sin, cos) = self.angle.sin_cos();
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(x, y)| {
            ScreenPos::new(
                self.center.x + x * cos - y * sin,
                self.center.y + x * sin + y * cos,
            )
        })
    }

    /// Axis-aligned screen bounds `(min_x, min_y, max_x, max_y)`
    pub fn screen_bounds(&self) -> (f64, f64, f64, f64) {
        let corners = self.corners();
        let mut bounds = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for c in corners {
            bounds.0 = bounds.0.min(c.x);
            bounds.1 = bounds.1.min(c.y);
            bounds.2 = bounds.2.max(c.x);
            bounds.3 = bounds.3.max(c.y);
        }
        bounds
    }

    /// Whether any part of the image lands inside a `w` x `h` surface
    pub fn is_on_surface(&self, w: u32, h: u32) -> bool {
        let (x0, y0, x1, y1) = self.screen_bounds();
        x1 >= 0.0 && y1 >= 0.0 && x0 < w as f64 && y0 < h as f64
    }
}

/// Integer pixel span clipped to a surface, as half-open ranges
fn clip_span(min: f64, max: f64, limit: u32) -> Option<(usize, usize)> {
    let start = min.floor().max(0.0) as i64;
    let end = (max.ceil() as i64).min(limit as i64);
    if start >= end {
        None
    } else {
        Some((start as usize, end as usize))
    }
}

/// Source-over blend of a non-premultiplied color into one pixel
#[inline]
pub fn blend_over(dst: &mut [u8], src: [u8; 4], opacity: f32) {
    let sa = src[3] as f32 / 255.0 * opacity;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let value = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        dst[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Multiply blend: moves `dst` toward `dst * color` by `amount`
#[inline]
pub fn blend_multiply(dst: &mut [u8], color: [u8; 3], amount: f32) {
    if amount <= 0.0 {
        return;
    }
    let amount = amount.min(1.0);
    for c in 0..3 {
        let factor = 1.0 - amount + amount * color[c] as f32 / 255.0;
        dst[c] = (dst[c] as f32 * factor).round().clamp(0.0, 255.0) as u8;
    }
}

/// Draw `image` through `transform` with nearest-neighbour sampling
pub fn draw_image(dst: &mut RgbaImage, image: &RgbaImage, transform: &TileTransform, opacity: f32) {
    let (w, h) = dst.dimensions();
    if w == 0 || h == 0 || image.width() == 0 || image.height() == 0 || opacity <= 0.0 {
        return;
    }
    let (x0, y0, x1, y1) = transform.screen_bounds();
    let (Some((xs, xe)), Some((ys, ye))) = (clip_span(x0, x1, w), clip_span(y0, y1, h)) else {
        return;
    };
    let (iw, ih) = image.dimensions();
    let stride = w as usize * 4;

    dst
        .par_chunks_mut(stride)
        .enumerate()
        .skip(ys)
        .take(ye - ys)
        .for_each(|(y, row)| {
            for x in xs..xe {
                let point = ScreenPos::new(x as f64 + 0.5, y as f64 + 0.5);
                let Some((u, v)) = transform.to_local(point) else {
                    continue;
                };
                let sx = ((u * iw as f64) as u32).min(iw - 1);
                let sy = ((v * ih as f64) as u32).min(ih - 1);
                let src = image.get_pixel(sx, sy).0;
                blend_over(&mut row[x * 4..x * 4 + 4], src, opacity);
            }
        });
}

/// Blend a solid axis-aligned rectangle in screen space
pub fn fill_rect(dst: &mut RgbaImage, min: ScreenPos, max: ScreenPos, color: [u8; 4]) {
    let (w, h) = dst.dimensions();
    let (Some((xs, xe)), Some((ys, ye))) = (clip_span(min.x, max.x, w), clip_span(min.y, max.y, h))
    else {
        return;
    };
    for y in ys..ye {
        for x in xs..xe {
            let px = dst.get_pixel_mut(x as u32, y as u32);
            blend_over(&mut px.0, color, 1.0);
        }
    }
}

/// Integer pixel line, one pixel per step along the major axis
pub struct PixelLine {
    dx: i64,
    dy: i64,
    x: i64,
    y: i64,
    error: i64,
    end_x: i64,
    steep: bool,
    y_step: i64,
}

impl PixelLine {
    pub fn new(from: (i64, i64), to: (i64, i64)) -> Self {
        let ((mut x0, mut y0), (mut x1, mut y1)) = (from, to);
        let steep = (y1 - y0).abs() > (x1 - x0).abs();
        if steep {
            std::mem::swap(&mut x0, &mut y0);
            std::mem::swap(&mut x1, &mut y1);
        }
        if x0 > x1 {
            std::mem::swap(&mut x0, &mut x1);
            std::mem::swap(&mut y0, &mut y1);
        }
        let dx = x1 - x0;
        Self {
            dx,
            dy: (y1 - y0).abs(),
            x: x0,
            y: y0,
            error: dx / 2,
            end_x: x1,
            steep,
            y_step: if y0 < y1 { 1 } else { -1 },
        }
    }
}

impl Iterator for PixelLine {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<(i64, i64)> {
        if self.x > self.end_x {
            return None;
        }
        let point = if self.steep {
            (self.y, self.x)
        } else {
            (self.x, self.y)
        };
        self.x += 1;
        self.error -= self.dy;
        if self.error < 0 {
            self.y += self.y_step;
            self.error += self.dx;
        }
        Some(point)
    }
}

/// Stroke a line segment with a square pen `thickness` pixels wide
pub fn draw_line(dst: &mut RgbaImage, from: ScreenPos, to: ScreenPos, color: [u8; 4], thickness: f32) {
    let (w, h) = (dst.width() as i64, dst.height() as i64);
    if w == 0 || h == 0 {
        return;
    }
    // Segments reaching absurdly far off-surface are not walked
    let limit = 32.0 * w.max(h) as f64;
    if [from.x, from.y, to.x, to.y].iter().any(|v| !v.is_finite() || v.abs() > limit) {
        return;
    }
    let half = (thickness.max(1.0) / 2.0).floor() as i64;
    let start = (from.x.floor() as i64, from.y.floor() as i64);
    let end = (to.x.floor() as i64, to.y.floor() as i64);
    for (x, y) in PixelLine::new(start, end) {
        for py in y - half..=y + half {
            for px in x - half..=x + half {
                if px >= 0 && py >= 0 && px < w && py < h {
                    blend_over(&mut dst.get_pixel_mut(px as u32, py as u32).0, color, 1.0);
                }
            }
        }
    }
}

/// Stroke the outline of an axis-aligned rectangle
pub fn stroke_rect(dst: &mut RgbaImage, min: ScreenPos, max: ScreenPos, color: [u8; 4], thickness: f32) {
    let tr = ScreenPos::new(max.x, min.y);
    let bl = ScreenPos::new(min.x, max.y);
    draw_line(dst, min, tr, color, thickness);
    draw_line(dst, tr, max, color, thickness);
    draw_line(dst, max, bl, color, thickness);
    draw_line(dst, bl, min, color, thickness);
}

/// Blend a filled circle
pub fn fill_circle(dst: &mut RgbaImage, center: ScreenPos, radius: f64, color: [u8; 4]) {
    let (w, h) = dst.dimensions();
    let (Some((xs, xe)), Some((ys, ye))) = (
        clip_span(center.x - radius, center.x + radius, w),
        clip_span(center.y - radius, center.y + radius, h),
    ) else {
        return;
    };
    let r2 = radius * radius;
    for y in ys..ye {
        for x in xs..xe {
            let dx = x as f64 + 0.5 - center.x;
            let dy = y as f64 + 0.5 - center.y;
            if dx * dx + dy * dy <= r2 {
                blend_over(&mut dst.get_pixel_mut(x as u32, y as u32).0, color, 1.0);
            }
        }
    }
}
