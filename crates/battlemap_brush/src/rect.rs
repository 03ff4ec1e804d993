//! Rectangle placement: stochastic fill and corner/edge borders

use crate::rng::{DeterministicRng, VariantSelector};
use crate::stroke::StrokeContext;
use battlemap_core::{
    BrushDescriptor, CellPos, CellRect, DecorationParams, PlacedTile, Span, TileAsset,
};
use std::collections::HashSet;
use tracing::debug;

/// Salt for the decoration grid offset, well past any per-cell draw
const DECORATION_OFFSET_SALT: u32 = 0x00de_c000;

/// Jitter must stay under half a cell so the integer bounding box holds
const MAX_POSITION_JITTER: f64 = 0.49;
const MAX_SIZE_JITTER: f64 = 0.9;

/// How a dragged rectangle is filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RectMode {
    #[default]
    Fill,
    Border,
}

/// Place a rectangle in either mode
pub fn place_rect(
    brush: &BrushDescriptor,
    selector: &VariantSelector,
    rect: CellRect,
    mode: RectMode,
    ctx: &mut StrokeContext,
) -> Vec<PlacedTile> {
    match mode {
        RectMode::Fill => fill_rect(brush, selector, rect, ctx),
        RectMode::Border => border_rect(brush, selector, rect, ctx),
    }
}

/// Draws for one fill cell, taken in a fixed order so a cell's variant and
/// rotation do not depend on which randomness options are enabled
struct FillDraw {
    index: usize,
    quarter: u8,
    mirror: bool,
    jitter_x: f64,
    jitter_y: f64,
    size: f64,
}

impl FillDraw {
    fn roll(selector: &impl DeterministicRng, cell: CellPos, pool_len: usize) -> Self {
        let mut stream = selector.stream(cell);
        Self {
            index: stream.next_index(pool_len),
            quarter: stream.next_quarter(),
            mirror: stream.next_bool(0.5),
            jitter_x: stream.next_signed(),
            jitter_y: stream.next_signed(),
            size: stream.next_signed(),
        }
    }
}

/// Stochastically tile the rectangle with the brush's fill pool.
///
/// Decoration tiles (if configured) are laid first on a sparse grid; fill
/// tiles then cover the remaining cells. A fill variant that would overflow
/// the rectangle or overlap an earlier tile falls back to a 1x1 variant, or
/// leaves the cell empty if the pool has none. A single-cell rectangle
/// stamps whatever variant is drawn.
pub fn fill_rect(
    brush: &BrushDescriptor,
    selector: &VariantSelector,
    rect: CellRect,
    ctx: &mut StrokeContext,
) -> Vec<PlacedTile> {
    let mut tiles = Vec::new();
    if brush.fill.is_empty() {
        return tiles;
    }

    let single_cell = rect.area() == 1;
    let mut occupied: HashSet<CellPos> = HashSet::new();

    if !single_cell {
        if let Some(decoration) = &brush.decoration {
            place_decorations(brush, selector, rect, ctx, &mut occupied, &mut tiles, decoration);
        }
    }

    let unit_pool: Vec<&TileAsset> = brush
        .fill
        .iter()
        .filter(|a| a.footprint() == Span::ONE)
        .collect();
    let position_jitter = brush.position_jitter.clamp(0.0, MAX_POSITION_JITTER);
    let size_jitter = brush.size_jitter.clamp(0.0, MAX_SIZE_JITTER);

    for cell in rect.cells() {
        if occupied.contains(&cell) {
            continue;
        }
        let draw = FillDraw::roll(selector, cell, brush.fill.len());
        let mut asset = &brush.fill[draw.index];
        let mut rotation = fill_rotation(brush, asset, draw.quarter);

        if !single_cell {
            let footprint = CellRect::from_top_left(cell, asset.footprint().rotated(rotation));
            if !fits(&rect, &footprint, &occupied) {
                let Some(&unit) = unit_pool.get(draw.index % unit_pool.len().max(1)) else {
                    continue;
                };
                asset = unit;
                rotation = fill_rotation(brush, asset, draw.quarter);
            }
        }

        let mut tile = ctx.stamp(asset, cell, rotation);
        occupied.extend(tile.bounds().cells());

        if brush.random_mirror {
            tile.mirror_x = draw.mirror;
        }
        if position_jitter > 0.0 {
            let mut center = tile.center();
            center.x += draw.jitter_x * position_jitter;
            center.y += draw.jitter_y * position_jitter;
            tile.set_center(center);
        }
        if size_jitter > 0.0 {
            tile.scale = 1.0 + draw.size * size_jitter;
        }
        tiles.push(tile);
    }

    debug!(
        brush = %brush.key,
        cells = rect.area(),
        placed = tiles.len(),
        "filled rectangle"
    );
    tiles
}

/// Quarter turns only apply to square art; anything else would change the
/// footprint under the cursor
fn fill_rotation(brush: &BrushDescriptor, asset: &TileAsset, quarter: u8) -> u8 {
    let span = asset.footprint();
    if brush.random_rotation && span.w == span.h {
        quarter
    } else {
        0
    }
}

fn fits(rect: &CellRect, footprint: &CellRect, occupied: &HashSet<CellPos>) -> bool {
    rect.contains_rect(footprint) && footprint.cells().all(|c| !occupied.contains(&c))
}

fn place_decorations(
    brush: &BrushDescriptor,
    selector: &VariantSelector,
    rect: CellRect,
    ctx: &mut StrokeContext,
    occupied: &mut HashSet<CellPos>,
    tiles: &mut Vec<PlacedTile>,
    decoration: &DecorationParams,
) {
    if decoration.pool.is_empty() {
        return;
    }
    let spacing = decoration.spacing_for_area(rect.area()) as i32;
    let deco = selector.sub_key("decoration");

    // Offset the grid per rectangle so repeated rectangles do not line up
    let offset_x = (deco.draw(rect.min, DECORATION_OFFSET_SALT) % spacing as u32) as i32;
    let offset_y = (deco.draw(rect.min, DECORATION_OFFSET_SALT + 1) % spacing as u32) as i32;

    let mut y = rect.min.y + offset_y;
    while y <= rect.max.y {
        let mut x = rect.min.x + offset_x;
        while x <= rect.max.x {
            let cell = CellPos::new(x, y);
            let mut stream = deco.stream(cell);
            let index = stream.next_index(decoration.pool.len());
            let quarter = stream.next_quarter();
            if stream.next_bool(decoration.density) && !occupied.contains(&cell) {
                let asset = &decoration.pool[index];
                let rotation = fill_rotation(brush, asset, quarter);
                let footprint = CellRect::from_top_left(cell, asset.footprint().rotated(rotation));
                if fits(&rect, &footprint, occupied) {
                    let tile = ctx.stamp(asset, cell, rotation);
                    occupied.extend(footprint.cells());
                    tiles.push(tile);
                }
            }
            x += spacing;
        }
        y += spacing;
    }
}

/// Corner cells clockwise from the top-left, with the quarter turn that
/// orients the corner art for each
fn corner_slots(rect: &CellRect) -> Vec<(CellPos, u8)> {
    let candidates = [
        (rect.min, 0),
        (CellPos::new(rect.max.x, rect.min.y), 1),
        (rect.max, 2),
        (CellPos::new(rect.min.x, rect.max.y), 3),
    ];
    let mut slots: Vec<(CellPos, u8)> = Vec::with_capacity(4);
    for (cell, rotation) in candidates {
        if !slots.iter().any(|(c, _)| *c == cell) {
            slots.push((cell, rotation));
        }
    }
    slots
}

/// Edge cells (excluding corners) with the side index each belongs to:
/// 0 top, 1 right, 2 bottom, 3 left
fn edge_slots(rect: &CellRect) -> Vec<(CellPos, usize)> {
    let mut slots = Vec::new();
    for x in rect.min.x + 1..rect.max.x {
        slots.push((CellPos::new(x, rect.min.y), 0));
    }
    if rect.max.x > rect.min.x {
        for y in rect.min.y + 1..rect.max.y {
            slots.push((CellPos::new(rect.max.x, y), 1));
        }
    }
    if rect.max.y > rect.min.y {
        for x in rect.min.x + 1..rect.max.x {
            slots.push((CellPos::new(x, rect.max.y), 2));
        }
    }
    for y in rect.min.y + 1..rect.max.y {
        slots.push((CellPos::new(rect.min.x, y), 3));
    }
    slots
}

/// Place corner tiles and outward-facing edge tiles around the rectangle.
///
/// Corner orientation comes only from the corner's index; edge tiles face
/// outward on sides with auto-rotate enabled and otherwise keep the art's
/// own orientation. The interior is left empty.
pub fn border_rect(
    brush: &BrushDescriptor,
    selector: &VariantSelector,
    rect: CellRect,
    ctx: &mut StrokeContext,
) -> Vec<PlacedTile> {
    let edge_pool: &[TileAsset] = if brush.edges.tiles.is_empty() {
        &brush.fill
    } else {
        &brush.edges.tiles
    };
    let corner_pool: &[TileAsset] = if brush.corners.is_empty() {
        edge_pool
    } else {
        &brush.corners
    };

    let mut tiles = Vec::new();
    if corner_pool.is_empty() {
        return tiles;
    }

    let corners = selector.sub_key("corner");
    for (cell, rotation) in corner_slots(&rect) {
        let index = corners.stream(cell).next_index(corner_pool.len());
        tiles.push(ctx.stamp(&corner_pool[index], cell, rotation));
    }

    // One mirror roll per border, so all edges read the same way
    let mirror = brush.edges.random_mirror
        && selector.sub_key("edge-mirror").stream(rect.min).next_bool(0.5);
    let edges = selector.sub_key("edge");
    for (cell, side) in edge_slots(&rect) {
        let index = edges.stream(cell).next_index(edge_pool.len());
        let rotation = if brush.edges.auto_rotate[side] {
            side as u8
        } else {
            0
        };
        let mut tile = ctx.stamp(&edge_pool[index], cell, rotation);
        // Local x runs along the edge once the art is turned to face out
        tile.mirror_x = mirror;
        tiles.push(tile);
    }

    debug!(brush = %brush.key, placed = tiles.len(), "placed border");
    tiles
}
