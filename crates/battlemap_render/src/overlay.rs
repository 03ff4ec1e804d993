//! Grid, tool previews, measurement, fog and map bounds

use crate::raster::{draw_line, fill_circle, fill_rect, stroke_rect};
use crate::settings::RenderSettings;
use battlemap_core::{Camera, CellPos, CellRect, FogCellSet, ScreenPos};
use image::RgbaImage;

/// Grid lines are skipped when cells get smaller than this on screen
const MIN_GRID_CELL_PX: f64 = 4.0;

/// Transient tool feedback drawn above the map
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    /// Rectangle being dragged by the rectangle or fog tool
    RectPreview(CellRect),
    /// Polyline vertices so far, plus the cell under the pointer
    Polyline {
        points: Vec<CellPos>,
        cursor: Option<CellPos>,
    },
    /// Marquee selection in screen space
    SelectionBox { from: ScreenPos, to: ScreenPos },
    /// Footprint of a selected tile
    Highlight(CellRect),
    /// Two-point distance measurement
    Measurement { from: CellPos, to: CellPos },
}

impl Overlay {
    pub fn is_measurement(&self) -> bool {
        matches!(self, Overlay::Measurement { .. })
    }
}

/// Screen corners of a cell rectangle (outer edges)
pub fn cell_rect_to_screen(rect: &CellRect, camera: &Camera) -> (ScreenPos, ScreenPos) {
    let min = camera.world_to_screen(rect.min.to_world());
    let max = camera.world_to_screen(rect.max.offset(1, 1).to_world());
    (min, max)
}

/// Cells at least partly inside a `width` x `height` viewport
pub fn visible_cells(camera: &Camera, width: u32, height: u32) -> CellRect {
    let a = camera.screen_to_cell(ScreenPos::new(0.0, 0.0));
    let b = camera.screen_to_cell(ScreenPos::new(width as f64, height as f64));
    CellRect::from_corners(a, b)
}

/// Clamp the visible range to the map, if the map is finite
fn drawable_cells(camera: &Camera, width: u32, height: u32, bounds: Option<CellRect>) -> Option<CellRect> {
    let visible = visible_cells(camera, width, height);
    match bounds {
        None => Some(visible),
        Some(b) if b.intersects(&visible) => Some(CellRect {
            min: CellPos::new(b.min.x.max(visible.min.x), b.min.y.max(visible.min.y)),
            max: CellPos::new(b.max.x.min(visible.max.x), b.max.y.min(visible.max.y)),
        }),
        Some(_) => None,
    }
}

pub fn draw_grid(
    frame: &mut RgbaImage,
    camera: &Camera,
    bounds: Option<CellRect>,
    settings: &RenderSettings,
) {
    if camera.cell_pixels() < MIN_GRID_CELL_PX {
        return;
    }
    let Some(cells) = drawable_cells(camera, frame.width(), frame.height(), bounds) else {
        return;
    };
    let (top_left, bottom_right) = cell_rect_to_screen(&cells, camera);
    for x in cells.min.x..=cells.max.x + 1 {
        let sx = camera.world_to_screen(CellPos::new(x, 0).to_world()).x;
        draw_line(
            frame,
            ScreenPos::new(sx, top_left.y),
            ScreenPos::new(sx, bottom_right.y),
            settings.grid_color,
            settings.grid_line_width,
        );
    }
    for y in cells.min.y..=cells.max.y + 1 {
        let sy = camera.world_to_screen(CellPos::new(0, y).to_world()).y;
        draw_line(
            frame,
            ScreenPos::new(top_left.x, sy),
            ScreenPos::new(bottom_right.x, sy),
            settings.grid_color,
            settings.grid_line_width,
        );
    }
}

/// Tool previews (everything but measurement)
pub fn draw_previews(frame: &mut RgbaImage, camera: &Camera, overlays: &[Overlay], settings: &RenderSettings) {
    let cell_center = |cell: CellPos| {
        let (min, max) = cell_rect_to_screen(&CellRect::from_corners(cell, cell), camera);
        ScreenPos::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0)
    };
    for overlay in overlays {
        match overlay {
            Overlay::RectPreview(rect) => {
                let (min, max) = cell_rect_to_screen(rect, camera);
                let mut fill = settings.preview_color;
                fill[3] /= 3;
                fill_rect(frame, min, max, fill);
                stroke_rect(frame, min, max, settings.preview_color, 2.0);
            }
            Overlay::Polyline { points, cursor } => {
                let mut guide: Vec<ScreenPos> = points.iter().map(|p| cell_center(*p)).collect();
                if let Some(cursor) = cursor {
                    guide.push(cell_center(*cursor));
                }
                for pair in guide.windows(2) {
                    draw_line(frame, pair[0], pair[1], settings.preview_color, 2.0);
                }
                for point in points {
                    fill_circle(frame, cell_center(*point), 4.0, settings.preview_color);
                }
            }
            Overlay::SelectionBox { from, to } => {
                let min = ScreenPos::new(from.x.min(to.x), from.y.min(to.y));
                let max = ScreenPos::new(from.x.max(to.x), from.y.max(to.y));
                let mut fill = settings.selection_color;
                fill[3] /= 5;
                fill_rect(frame, min, max, fill);
                stroke_rect(frame, min, max, settings.selection_color, 1.0);
            }
            Overlay::Highlight(rect) => {
                let (min, max) = cell_rect_to_screen(rect, camera);
                stroke_rect(frame, min, max, settings.selection_color, 2.0);
            }
            Overlay::Measurement { .. } => {}
        }
    }
}

/// Measurement line with end markers
pub fn draw_measurements(frame: &mut RgbaImage, camera: &Camera, overlays: &[Overlay], settings: &RenderSettings) {
    for overlay in overlays {
        if let Overlay::Measurement { from, to } = overlay {
            let center = |cell: &CellPos| {
                let (min, max) = cell_rect_to_screen(&CellRect::from_corners(*cell, *cell), camera);
                ScreenPos::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0)
            };
            let (a, b) = (center(from), center(to));
            draw_line(frame, a, b, settings.measure_color, 3.0);
            fill_circle(frame, a, 5.0, settings.measure_color);
            fill_circle(frame, b, 5.0, settings.measure_color);
        }
    }
}

/// Obscure every drawable cell missing from the revealed set
pub fn draw_fog(
    frame: &mut RgbaImage,
    camera: &Camera,
    fog: &FogCellSet,
    bounds: Option<CellRect>,
    settings: &RenderSettings,
) {
    let Some(cells) = drawable_cells(camera, frame.width(), frame.height(), bounds) else {
        return;
    };
    for cell in cells.cells() {
        if !fog.is_visible(cell) {
            let (min, max) = cell_rect_to_screen(&CellRect::from_corners(cell, cell), camera);
            fill_rect(frame, min, max, settings.fog_color);
        }
    }
}

/// Paint everything outside the map bounds
pub fn clip_to_bounds(frame: &mut RgbaImage, camera: &Camera, bounds: CellRect, color: [u8; 4]) {
    let (w, h) = (frame.width() as f64, frame.height() as f64);
    let (min, max) = cell_rect_to_screen(&bounds, camera);
    let opaque = [color[0], color[1], color[2], 255];
    fill_rect(frame, ScreenPos::new(0.0, 0.0), ScreenPos::new(w, min.y), opaque);
    fill_rect(frame, ScreenPos::new(0.0, max.y), ScreenPos::new(w, h), opaque);
    fill_rect(frame, ScreenPos::new(0.0, min.y), ScreenPos::new(min.x, max.y), opaque);
    fill_rect(frame, ScreenPos::new(max.x, min.y), ScreenPos::new(w, max.y), opaque);
}
