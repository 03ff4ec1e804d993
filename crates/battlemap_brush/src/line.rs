//! Line, polyline and closed polygon paths
//!
//! Paths are always 4-connected: a diagonal Bresenham step is expanded into
//! a horizontal then a vertical step, because corner art only exists for
//! axis-aligned turns.

use crate::rng::{DeterministicRng, VariantSelector};
use crate::stroke::StrokeContext;
use battlemap_core::{BrushDescriptor, CellPos, PathPool, PlacedTile, TileAsset};
use std::collections::HashSet;

/// Axis-aligned step direction. The discriminant doubles as the quarter
/// turn that makes upward-facing art face this way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

impl Direction {
    /// Direction of a unit step from `from` to `to`
    pub fn between(from: CellPos, to: CellPos) -> Option<Self> {
        match (to.x - from.x, to.y - from.y) {
            (0, -1) => Some(Direction::Up),
            (1, 0) => Some(Direction::Right),
            (0, 1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn opposite(self) -> Self {
        Self::from_index(self.index() + 2)
    }

    pub fn from_index(index: u8) -> Self {
        match index % 4 {
            0 => Direction::Up,
            1 => Direction::Right,
            2 => Direction::Down,
            _ => Direction::Left,
        }
    }
}

/// Cells on the line from `a` to `b`, inclusive, 4-connected
pub fn line_cells(a: CellPos, b: CellPos) -> Vec<CellPos> {
    let dx = (b.x - a.x).abs();
    let dy = -(b.y - a.y).abs();
    let sx = if a.x < b.x { 1 } else { -1 };
    let sy = if a.y < b.y { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (a.x, a.y);

    let mut cells = Vec::with_capacity((dx - dy + 1) as usize);
    loop {
        cells.push(CellPos::new(x, y));
        if x == b.x && y == b.y {
            break;
        }
        let e2 = 2 * err;
        let step_x = e2 >= dy;
        let step_y = e2 <= dx;
        if step_x {
            err += dy;
            x += sx;
        }
        if step_y {
            if step_x {
                // Stair-step the diagonal
                cells.push(CellPos::new(x, y));
            }
            err += dx;
            y += sy;
        }
    }
    cells
}

/// Cells along consecutive segments through `points`, joints not repeated
pub fn polyline_cells(points: &[CellPos]) -> Vec<CellPos> {
    let mut cells: Vec<CellPos> = Vec::new();
    let Some(first) = points.first() else {
        return cells;
    };
    cells.push(*first);
    for pair in points.windows(2) {
        cells.extend(line_cells(pair[0], pair[1]).into_iter().skip(1));
    }
    cells
}

/// Cells around a closed polygon. The seam cell appears once, first; the
/// returned direction is the step arriving at it from the last cell.
pub fn polygon_cells(points: &[CellPos]) -> (Vec<CellPos>, Option<Direction>) {
    let mut ring: Vec<CellPos> = points.to_vec();
    if let Some(first) = points.first() {
        if points.last() != Some(first) {
            ring.push(*first);
        }
    }
    let mut cells = polyline_cells(&ring);
    if cells.len() > 1 {
        cells.pop();
    }
    let incoming = match (cells.last(), cells.first()) {
        (Some(last), Some(first)) if cells.len() > 1 => Direction::between(*last, *first),
        _ => None,
    };
    (cells, incoming)
}

/// How a path cell is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Endpoint,
    Corner { clockwise: bool },
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathCell {
    pub cell: CellPos,
    pub kind: PathKind,
    pub rotation: u8,
}

/// Classify each cell of a 4-connected path.
///
/// With `endpoints`, the first and last cells of an open path face outward.
/// `closing` is the direction into the first cell for a closed path; the
/// last cell then continues into the first.
pub fn classify(cells: &[CellPos], endpoints: bool, closing: Option<Direction>) -> Vec<PathCell> {
    let n = cells.len();
    let closed = closing.is_some();
    let mut out = Vec::with_capacity(n);

    for i in 0..n {
        let cell = cells[i];
        let dir_in = if i > 0 {
            Direction::between(cells[i - 1], cell)
        } else {
            closing
        };
        let dir_out = if i + 1 < n {
            Direction::between(cell, cells[i + 1])
        } else if closed {
            Direction::between(cell, cells[0])
        } else {
            None
        };

        let classified = if endpoints && !closed && n > 1 && i == 0 {
            let facing = dir_out.map_or(0, |d| d.opposite().index());
            PathCell { cell, kind: PathKind::Endpoint, rotation: facing }
        } else if endpoints && !closed && n > 1 && i == n - 1 {
            let facing = dir_in.map_or(0, Direction::index);
            PathCell { cell, kind: PathKind::Endpoint, rotation: facing }
        } else {
            match (dir_in, dir_out) {
                (Some(din), Some(dout)) if din != dout => {
                    let turn = (dout.index() + 4 - din.index()) % 4;
                    match turn {
                        1 => PathCell {
                            cell,
                            kind: PathKind::Corner { clockwise: true },
                            rotation: din.index(),
                        },
                        3 => PathCell {
                            cell,
                            kind: PathKind::Corner { clockwise: false },
                            rotation: (din.index() + 1) % 4,
                        },
                        _ => body(cell, Some(din)),
                    }
                }
                (din, dout) => body(cell, din.or(dout)),
            }
        };
        out.push(classified);
    }
    out
}

/// Straight art is vertical at rotation 0; a horizontal run turns it once
fn body(cell: CellPos, travel: Option<Direction>) -> PathCell {
    PathCell {
        cell,
        kind: PathKind::Body,
        rotation: travel.map_or(0, |d| d.index() % 2),
    }
}

/// Path pools for a brush; a brush without path art draws its fill pool as
/// the body
pub fn path_pool(brush: &BrushDescriptor) -> PathPool {
    brush.path.clone().unwrap_or_else(|| PathPool {
        body: brush.fill.clone(),
        ..Default::default()
    })
}

/// Stamp tiles for classified path cells. Corner and endpoint cells fall back
/// to body art when their pools are empty. Revisited cells are skipped.
pub fn place_path(
    pool: &PathPool,
    selector: &VariantSelector,
    path: &[PathCell],
    ctx: &mut StrokeContext,
) -> Vec<PlacedTile> {
    let mut seen = HashSet::new();
    let mut tiles = Vec::with_capacity(path.len());
    for step in path {
        if !seen.insert(step.cell) {
            continue;
        }
        let (candidates, key): (&[TileAsset], &str) = match step.kind {
            PathKind::Endpoint if !pool.endpoint.is_empty() => (&pool.endpoint, "endpoint"),
            PathKind::Corner { .. } if !pool.corner.is_empty() => (&pool.corner, "corner"),
            _ => (&pool.body, "body"),
        };
        if candidates.is_empty() {
            continue;
        }
        let index = selector.sub_key(key).stream(step.cell).next_index(candidates.len());
        tiles.push(ctx.stamp(&candidates[index], step.cell, step.rotation));
    }
    tiles
}

/// Draw an open polyline through `points`
pub fn place_polyline(
    brush: &BrushDescriptor,
    selector: &VariantSelector,
    points: &[CellPos],
    endpoints: bool,
    ctx: &mut StrokeContext,
) -> Vec<PlacedTile> {
    let cells = polyline_cells(points);
    let path = classify(&cells, endpoints, None);
    place_path(&path_pool(brush), selector, &path, ctx)
}

/// Draw a closed polygon through `points`
pub fn place_polygon(
    brush: &BrushDescriptor,
    selector: &VariantSelector,
    points: &[CellPos],
    ctx: &mut StrokeContext,
) -> Vec<PlacedTile> {
    let (cells, closing) = polygon_cells(points);
    let path = classify(&cells, false, closing);
    place_path(&path_pool(brush), selector, &path, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use uuid::Uuid;

    fn c(x: i32, y: i32) -> CellPos {
        CellPos::new(x, y)
    }

    fn assert_four_connected(cells: &[CellPos]) {
        for pair in cells.windows(2) {
            let step = (pair[1].x - pair[0].x).abs() + (pair[1].y - pair[0].y).abs();
            assert_eq!(step, 1, "non-unit step {:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_line_cells_random_endpoints() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..500 {
            let a = c(rng.gen_range(-40..40), rng.gen_range(-40..40));
            let b = c(rng.gen_range(-40..40), rng.gen_range(-40..40));
            let cells = line_cells(a, b);
            assert_eq!(cells.first(), Some(&a));
            assert_eq!(cells.last(), Some(&b));
            assert_four_connected(&cells);
            let manhattan = (b.x - a.x).abs() + (b.y - a.y).abs();
            assert_eq!(cells.len() as i32, manhattan + 1);
        }
    }

    #[test]
    fn test_diagonal_is_stair_stepped_horizontal_first() {
        assert_eq!(line_cells(c(0, 0), c(2, 2)), vec![c(0, 0), c(1, 0), c(1, 1), c(2, 1), c(2, 2)]);
        assert_eq!(line_cells(c(3, 3), c(3, 3)), vec![c(3, 3)]);
    }

    #[test]
    fn test_polyline_joints_not_repeated() {
        let cells = polyline_cells(&[c(0, 0), c(3, 0), c(3, 2)]);
        assert_eq!(cells.len(), 6);
        assert_four_connected(&cells);
    }

    #[test]
    fn test_classify_open_path() {
        let cells = polyline_cells(&[c(0, 2), c(0, 0), c(2, 0)]);
        let path = classify(&cells, true, None);

        assert_eq!(path[0].kind, PathKind::Endpoint);
        // Leaving upward, the start endpoint faces down
        assert_eq!(path[0].rotation, 2);
        assert_eq!(path[1].kind, PathKind::Body);
        assert_eq!(path[1].rotation, 0);
        // Up then right is a clockwise turn; rotation equals the incoming direction
        assert_eq!(path[2].kind, PathKind::Corner { clockwise: true });
        assert_eq!(path[2].rotation, 0);
        assert_eq!(path[3].rotation, 1);
        assert_eq!(path[4].kind, PathKind::Endpoint);
        assert_eq!(path[4].rotation, 1);
    }

    #[test]
    fn test_counter_clockwise_corner() {
        let path = classify(&[c(1, 1), c(1, 0), c(0, 0)], false, None);
        assert_eq!(path[1].kind, PathKind::Corner { clockwise: false });
        assert_eq!(path[1].rotation, 1);
        assert_eq!(path[0].kind, PathKind::Body);
    }

    #[test]
    fn test_polygon_seam() {
        let (cells, closing) = polygon_cells(&[c(0, 0), c(2, 0), c(2, 2), c(0, 2)]);
        assert_eq!(cells.len(), 8);
        assert_eq!(cells[0], c(0, 0));
        assert_eq!(closing, Some(Direction::Up));

        let path = classify(&cells, false, closing);
        let corners = path
            .iter()
            .filter(|p| matches!(p.kind, PathKind::Corner { clockwise: true }))
            .count();
        assert_eq!(corners, 4);
        assert_eq!(path[0].rotation, 0);
    }

    #[test]
    fn test_place_polyline_uses_pools() {
        let brush = BrushDescriptor {
            key: "road".into(),
            path: Some(PathPool {
                body: vec![TileAsset::new("road/straight.png")],
                corner: vec![TileAsset::new("road/bend.png")],
                endpoint: Vec::new(),
            }),
            ..Default::default()
        };
        let selector = VariantSelector::new("abc", "road");
        let mut ctx = StrokeContext::new(Uuid::new_v4(), 0);
        let tiles = place_polyline(&brush, &selector, &[c(0, 0), c(3, 0), c(3, 3)], true, &mut ctx);

        assert_eq!(tiles.len(), 7);
        assert_eq!(tiles.iter().filter(|t| t.src == "road/bend.png").count(), 1);
        assert!(tiles.iter().all(|t| t.stroke_id == Some(ctx.stroke_id)));
    }
}
