//! Cell, world and screen coordinate spaces
//!
//! - **cell**: integer grid units (continuous centers are `f64` cell units)
//! - **world**: `GRID_ORIGIN + cell * CELL_SIZE`
//! - **screen**: `world * zoom + pan`
//!
//! The snapping helpers follow a parity rule: a span that is odd on an axis
//! is centered on a cell center (`k + 0.5`), an even span on a cell boundary
//! (`k`). This keeps an N x M tile from straddling a cell edge on its short
//! axis.

use serde::{Deserialize, Serialize};

/// World-space pixels per cell
pub const CELL_SIZE: f64 = 64.0;

/// Number of cells along each axis of the fixed backing grid
pub const GRID_CELLS: i32 = 2000;

/// World position of cell (0, 0); centers the backing grid on world origin
pub const GRID_ORIGIN: f64 = -(GRID_CELLS as f64) * CELL_SIZE / 2.0;

/// Cell index sitting on world origin
pub const GRID_CENTER_CELL: i32 = GRID_CELLS / 2;

pub const MIN_ZOOM: f64 = 0.2;
pub const MAX_ZOOM: f64 = 3.0;

/// Integer cell coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct CellPos {
    pub x: i32,
    pub y: i32,
}

impl CellPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// World-space position of this cell's top-left corner
    pub fn to_world(self) -> WorldPos {
        WorldPos::new(cell_to_world(self.x as f64), cell_to_world(self.y as f64))
    }
}

/// Continuous position in world pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f64,
    pub y: f64,
}

impl WorldPos {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Continuous cell-space coordinates of this point
    pub fn to_cell_space(self) -> (f64, f64) {
        (world_to_cell(self.x), world_to_cell(self.y))
    }

    /// The cell containing this point
    pub fn to_cell(self) -> CellPos {
        let (cx, cy) = self.to_cell_space();
        CellPos::new(cx.floor() as i32, cy.floor() as i32)
    }
}

/// Position in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPos {
    pub x: f64,
    pub y: f64,
}

impl ScreenPos {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Footprint span in cells (width, height)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub w: u32,
    pub h: u32,
}

impl Span {
    pub const ONE: Span = Span { w: 1, h: 1 };

    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// Span after `rotation_index` clockwise quarter turns
    pub fn rotated(self, rotation_index: u8) -> Self {
        if rotation_index % 2 == 1 {
            Self::new(self.h, self.w)
        } else {
            self
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Span::ONE
    }
}

/// Continuous center in cell units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CellCenter {
    pub x: f64,
    pub y: f64,
}

impl CellCenter {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_world(self) -> WorldPos {
        WorldPos::new(cell_to_world(self.x), cell_to_world(self.y))
    }
}

/// Inclusive rectangle of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRect {
    pub min: CellPos,
    pub max: CellPos,
}

impl CellRect {
    /// Rectangle spanning two opposite corners in any order
    pub fn from_corners(a: CellPos, b: CellPos) -> Self {
        Self {
            min: CellPos::new(a.x.min(b.x), a.y.min(b.y)),
            max: CellPos::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Rectangle covering `span` cells starting at `top_left`
    pub fn from_top_left(top_left: CellPos, span: Span) -> Self {
        Self {
            min: top_left,
            max: CellPos::new(
                top_left.x + span.w.max(1) as i32 - 1,
                top_left.y + span.h.max(1) as i32 - 1,
            ),
        }
    }

    pub fn width(&self) -> u32 {
        (self.max.x - self.min.x + 1) as u32
    }

    pub fn height(&self) -> u32 {
        (self.max.y - self.min.y + 1) as u32
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn contains(&self, cell: CellPos) -> bool {
        cell.x >= self.min.x && cell.x <= self.max.x && cell.y >= self.min.y && cell.y <= self.max.y
    }

    pub fn contains_rect(&self, other: &CellRect) -> bool {
        self.contains(other.min) && self.contains(other.max)
    }

    pub fn intersects(&self, other: &CellRect) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &CellRect) -> CellRect {
        CellRect {
            min: CellPos::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: CellPos::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// All cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = CellPos> + '_ {
        (self.min.y..=self.max.y)
            .flat_map(move |y| (self.min.x..=self.max.x).map(move |x| CellPos::new(x, y)))
    }
}

/// Declared map size in cells; the map is centered on the backing grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSize {
    pub w: u32,
    pub h: u32,
}

impl MapSize {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// Cell bounds of the map
    pub fn bounds(&self) -> CellRect {
        let min = CellPos::new(
            GRID_CENTER_CELL - (self.w / 2) as i32,
            GRID_CENTER_CELL - (self.h / 2) as i32,
        );
        CellRect::from_top_left(min, Span::new(self.w, self.h))
    }
}

pub fn cell_to_world(cell: f64) -> f64 {
    GRID_ORIGIN + cell * CELL_SIZE
}

pub fn world_to_cell(world: f64) -> f64 {
    (world - GRID_ORIGIN) / CELL_SIZE
}

fn snap_axis(cell: f64, span: u32) -> f64 {
    if span % 2 == 1 {
        cell.floor() + 0.5
    } else {
        cell.round()
    }
}

/// Snap a world point to the cell-center position whose footprint best
/// covers it
pub fn snap_world_to_center(world: WorldPos, span: Span) -> CellCenter {
    let (cx, cy) = world.to_cell_space();
    CellCenter::new(snap_axis(cx, span.w), snap_axis(cy, span.h))
}

/// Re-snap an existing continuous center to the parity of `span`
pub fn snap_center(center: CellCenter, span: Span) -> CellCenter {
    CellCenter::new(snap_axis(center.x, span.w), snap_axis(center.y, span.h))
}

/// Integer top-left cell of a footprint centered at `center`
pub fn center_and_span_to_top_left(center: CellCenter, span: Span) -> CellPos {
    let x = (center.x - span.w as f64 / 2.0 + 0.5).floor();
    let y = (center.y - span.h as f64 / 2.0 + 0.5).floor();
    CellPos::new(x as i32, y as i32)
}

/// Center of a footprint whose top-left cell is `top_left`
pub fn top_left_and_span_to_center(top_left: CellPos, span: Span) -> CellCenter {
    CellCenter::new(
        top_left.x as f64 + span.w as f64 / 2.0,
        top_left.y as f64 + span.h as f64 / 2.0,
    )
}

/// Affine world -> screen mapping
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pan_x: 0.0,
            pan_y: 0.0,
            zoom: 1.0,
        }
    }
}

impl Camera {
    pub fn new(pan_x: f64, pan_y: f64, zoom: f64) -> Self {
        Self {
            pan_x,
            pan_y,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
        }
    }

    /// Camera with world origin at the middle of a viewport, zoom 1
    pub fn centered(viewport_w: f64, viewport_h: f64) -> Self {
        Self::new(viewport_w / 2.0, viewport_h / 2.0, 1.0)
    }

    pub fn world_to_screen(&self, world: WorldPos) -> ScreenPos {
        ScreenPos::new(
            world.x * self.zoom + self.pan_x,
            world.y * self.zoom + self.pan_y,
        )
    }

    pub fn screen_to_world(&self, screen: ScreenPos) -> WorldPos {
        WorldPos::new(
            (screen.x - self.pan_x) / self.zoom,
            (screen.y - self.pan_y) / self.zoom,
        )
    }

    pub fn screen_to_cell(&self, screen: ScreenPos) -> CellPos {
        self.screen_to_world(screen).to_cell()
    }

    /// Screen-space size of one cell
    pub fn cell_pixels(&self) -> f64 {
        CELL_SIZE * self.zoom
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    /// Multiply zoom by `factor`, keeping the world point under `anchor` fixed
    pub fn zoom_about(&mut self, anchor: ScreenPos, factor: f64) {
        let before = self.screen_to_world(anchor);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan_x = anchor.x - before.x * self.zoom;
        self.pan_y = anchor.y - before.y * self.zoom;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_parity() {
        let p = CellPos::new(10, 20).to_world();
        let p = WorldPos::new(p.x + 10.0, p.y + 50.0);

        let odd = snap_world_to_center(p, Span::new(1, 3));
        assert_eq!(odd, CellCenter::new(10.5, 20.5));

        let even = snap_world_to_center(p, Span::new(2, 2));
        assert_eq!(even, CellCenter::new(10.0, 21.0));
    }

    #[test]
    fn test_snap_round_trip() {
        let spans = [
            Span::new(1, 1),
            Span::new(2, 1),
            Span::new(1, 2),
            Span::new(3, 2),
            Span::new(4, 4),
            Span::new(5, 3),
        ];
        let mut wx = -913.37;
        for _ in 0..200 {
            wx += 37.91;
            let world = WorldPos::new(wx, -wx * 0.61 + 12.5);
            for span in spans {
                let center = snap_world_to_center(world, span);
                let top_left = center_and_span_to_top_left(center, span);
                assert_eq!(top_left_and_span_to_center(top_left, span), center);
            }
        }
    }

    #[test]
    fn test_top_left_round_trip_integers() {
        for x in -5..5 {
            for y in -5..5 {
                for (w, h) in [(1, 1), (2, 3), (4, 1)] {
                    let span = Span::new(w, h);
                    let tl = CellPos::new(x, y);
                    let center = top_left_and_span_to_center(tl, span);
                    assert_eq!(center_and_span_to_top_left(center, span), tl);
                }
            }
        }
    }

    #[test]
    fn test_camera_round_trip_and_clamp() {
        let mut cam = Camera::new(100.0, -40.0, 2.0);
        let w = WorldPos::new(12.0, 34.0);
        let back = cam.screen_to_world(cam.world_to_screen(w));
        assert!((back.x - w.x).abs() < 1e-9 && (back.y - w.y).abs() < 1e-9);

        let anchor = ScreenPos::new(300.0, 200.0);
        let fixed = cam.screen_to_world(anchor);
        cam.zoom_about(anchor, 100.0);
        assert_eq!(cam.zoom, MAX_ZOOM);
        let after = cam.screen_to_world(anchor);
        assert!((after.x - fixed.x).abs() < 1e-9);

        cam.zoom_about(anchor, 0.0001);
        assert_eq!(cam.zoom, MIN_ZOOM);
    }

    #[test]
    fn test_grid_center_on_world_origin() {
        let cell = WorldPos::new(0.5, 0.5).to_cell();
        assert_eq!(cell, CellPos::new(GRID_CENTER_CELL, GRID_CENTER_CELL));
    }

    #[test]
    fn test_map_bounds_centered() {
        let bounds = MapSize::new(10, 6).bounds();
        assert_eq!(bounds.width(), 10);
        assert_eq!(bounds.height(), 6);
        assert!(bounds.contains(CellPos::new(GRID_CENTER_CELL, GRID_CENTER_CELL)));
    }
}
