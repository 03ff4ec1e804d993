//! Rotate, mirror and nudge
//!
//! Every operation returns a new tile; nothing is edited in place. Screen y
//! points down, so a clockwise quarter turn maps an offset `(dx, dy)` to
//! `(-dy, dx)`.

use crate::selection::is_editable;
use battlemap_core::{CellCenter, LayerStack, PlacedTile};
use std::f64::consts::{FRAC_PI_2, PI};
use uuid::Uuid;

/// Step used when grid snapping is off
pub const FREE_ROTATION_STEP: f64 = PI / 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Clockwise,
    CounterClockwise,
}

impl Turn {
    fn sign(self) -> f64 {
        match self {
            Turn::Clockwise => 1.0,
            Turn::CounterClockwise => -1.0,
        }
    }

    fn quarters(self) -> u8 {
        match self {
            Turn::Clockwise => 1,
            Turn::CounterClockwise => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorAxis {
    /// Flip left to right
    Horizontal,
    /// Flip top to bottom
    Vertical,
}

/// Quarter turn about `pivot`: the tile turns and its offset from the pivot
/// turns with it
pub fn rotate_about(tile: &PlacedTile, pivot: CellCenter, turn: Turn) -> PlacedTile {
    let mut out = tile.clone();
    let center = tile.center();
    let (dx, dy) = (center.x - pivot.x, center.y - pivot.y);
    let (rx, ry) = match turn {
        Turn::Clockwise => (-dy, dx),
        Turn::CounterClockwise => (dy, -dx),
    };
    out.rotation_index = (tile.rotation_index + turn.quarters()) % 4;
    out.rotation_radians = tile
        .rotation_radians
        .map(|r| r + turn.sign() * FRAC_PI_2);
    out.set_center(CellCenter::new(pivot.x + rx, pivot.y + ry));
    out
}

/// Free rotation by one step about the tile's own center; the tile does not
/// move
pub fn rotate_free(tile: &PlacedTile, turn: Turn) -> PlacedTile {
    let mut out = tile.clone();
    out.rotation_radians = Some(tile.angle() + turn.sign() * FREE_ROTATION_STEP);
    out
}

/// Mirror across the axis through `pivot`.
///
/// The local flag toggled depends on the quarter turn so the flip reads
/// correctly on screen. A free-rotated tile also has its angle negated.
pub fn mirror_about(tile: &PlacedTile, pivot: CellCenter, axis: MirrorAxis) -> PlacedTile {
    let mut out = tile.clone();
    let center = tile.center();
    let odd = tile.rotation_index % 2 == 1;
    if tile.is_quarter_aligned() {
        match (axis, odd) {
            (MirrorAxis::Horizontal, false) | (MirrorAxis::Vertical, true) => out.mirror_x = !out.mirror_x,
            (MirrorAxis::Horizontal, true) | (MirrorAxis::Vertical, false) => out.mirror_y = !out.mirror_y,
        }
    } else {
        out.rotation_radians = Some(-tile.angle());
        match axis {
            MirrorAxis::Horizontal => out.mirror_x = !out.mirror_x,
            MirrorAxis::Vertical => out.mirror_y = !out.mirror_y,
        }
    }
    let mirrored = match axis {
        MirrorAxis::Horizontal => CellCenter::new(2.0 * pivot.x - center.x, center.y),
        MirrorAxis::Vertical => CellCenter::new(center.x, 2.0 * pivot.y - center.y),
    };
    out.set_center(mirrored);
    out
}

pub fn nudge(tile: &PlacedTile, dx: f64, dy: f64) -> PlacedTile {
    let mut out = tile.clone();
    let center = tile.center();
    out.set_center(CellCenter::new(center.x + dx, center.y + dy));
    out
}

/// Editable tiles among `ids`
fn targets<'a>(tiles: &'a [PlacedTile], layers: &'a LayerStack, ids: &'a [Uuid]) -> impl Iterator<Item = &'a PlacedTile> {
    tiles
        .iter()
        .filter(move |t| ids.contains(&t.id) && is_editable(layers, t))
}

/// Whether a tile may take a free (non-quarter) rotation
pub fn allows_free_rotation(layers: &LayerStack, tile: &PlacedTile) -> bool {
    !layers
        .resolve_tile_layer(tile)
        .and_then(|id| layers.get(id))
        .is_some_and(|node| node.is_pinned())
}

/// Rotate the selected tiles. With snapping they turn a quarter about the
/// pivot; without, each turns one free step in place, except tiles on
/// pinned layers which never take a free rotation.
pub fn rotate_selection(
    tiles: &[PlacedTile],
    layers: &LayerStack,
    ids: &[Uuid],
    pivot: CellCenter,
    turn: Turn,
    snap: bool,
) -> Vec<PlacedTile> {
    targets(tiles, layers, ids)
        .filter_map(|tile| {
            if snap {
                Some(rotate_about(tile, pivot, turn))
            } else if allows_free_rotation(layers, tile) {
                Some(rotate_free(tile, turn))
            } else {
                None
            }
        })
        .collect()
}

pub fn mirror_selection(
    tiles: &[PlacedTile],
    layers: &LayerStack,
    ids: &[Uuid],
    pivot: CellCenter,
    axis: MirrorAxis,
) -> Vec<PlacedTile> {
    targets(tiles, layers, ids)
        .map(|tile| mirror_about(tile, pivot, axis))
        .collect()
}

pub fn nudge_selection(tiles: &[PlacedTile], layers: &LayerStack, ids: &[Uuid], dx: f64, dy: f64) -> Vec<PlacedTile> {
    targets(tiles, layers, ids)
        .map(|tile| nudge(tile, dx, dy))
        .collect()
}

/// Copies of the selected tiles with fresh ids, offset by one cell
pub fn duplicate_selection(tiles: &[PlacedTile], layers: &LayerStack, ids: &[Uuid]) -> Vec<PlacedTile> {
    let stroke = Uuid::new_v4();
    targets(tiles, layers, ids)
        .map(|tile| {
            let mut copy = nudge(tile, 1.0, 1.0);
            copy.id = Uuid::new_v4();
            copy.stroke_id = Some(stroke);
            copy
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestMap;
    use battlemap_core::{CellPos, LayerRole};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_four_quarter_turns_are_identity() {
        let map = TestMap::new();
        let mut rng = SmallRng::seed_from_u64(11);
        let sources = ["stone.png", "table_2x1.png", "rug_3x2.png"];
        for _ in 0..200 {
            let src = sources[rng.gen_range(0..sources.len())];
            let tile = PlacedTile::new(src, CellPos::new(rng.gen_range(-50..50), rng.gen_range(-50..50)), map.floor)
                .with_rotation(rng.gen_range(0..4));
            let pivot = CellCenter::new(rng.gen_range(-40..40) as f64 * 0.5, rng.gen_range(-40..40) as f64 * 0.5);
            let turn = if rng.gen_bool(0.5) { Turn::Clockwise } else { Turn::CounterClockwise };

            let mut out = tile.clone();
            for _ in 0..4 {
                out = rotate_about(&out, pivot, turn);
            }
            assert_eq!(out.rotation_index, tile.rotation_index);
            assert_eq!((out.cell_x, out.cell_y), (tile.cell_x, tile.cell_y));
            assert_eq!(out.center(), tile.center());
        }
    }

    #[test]
    fn test_group_rotation_keeps_arrangement() {
        let map = TestMap::new();
        let a = PlacedTile::new("stone.png", CellPos::new(0, 0), map.floor);
        let b = PlacedTile::new("stone.png", CellPos::new(2, 0), map.floor);
        let pivot = CellCenter::new(1.5, 0.5);
        let a2 = rotate_about(&a, pivot, Turn::Clockwise);
        let b2 = rotate_about(&b, pivot, Turn::Clockwise);
        assert_eq!(a2.top_left(), CellPos::new(1, -1));
        assert_eq!(b2.top_left(), CellPos::new(1, 1));
        assert_eq!(a2.rotation_index, 1);
    }

    #[test]
    fn test_rotation_swaps_footprint_in_place() {
        let map = TestMap::new();
        let table = PlacedTile::new("table_2x1.png", CellPos::new(0, 0), map.props);
        let turned = rotate_about(&table, table.center(), Turn::Clockwise);
        assert_eq!(turned.bounds().width(), 1);
        assert_eq!(turned.bounds().height(), 2);
        assert_eq!(turned.center(), table.center());
    }

    #[test]
    fn test_free_rotation_steps_without_moving() {
        let map = TestMap::new();
        let tile = PlacedTile::new("stone.png", CellPos::new(3, 4), map.props);
        let turned = rotate_free(&tile, Turn::Clockwise);
        assert!((turned.angle() - FREE_ROTATION_STEP).abs() < 1e-12);
        assert_eq!(turned.top_left(), tile.top_left());
        assert!(!turned.is_quarter_aligned());
    }

    #[test]
    fn test_free_rotation_skips_pinned_layers() {
        let map = TestMap::new();
        let lighting = map.layers.role_layer(LayerRole::Lighting).unwrap().id;
        let torch = PlacedTile::new("torch.png", CellPos::new(0, 0), lighting);
        let prop = PlacedTile::new("crate.png", CellPos::new(1, 0), map.props);
        let ids = [torch.id, prop.id];
        let tiles = vec![torch, prop];

        let free = rotate_selection(&tiles, &map.layers, &ids, CellCenter::new(1.0, 0.5), Turn::Clockwise, false);
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].id, ids[1]);

        let snapped = rotate_selection(&tiles, &map.layers, &ids, CellCenter::new(1.0, 0.5), Turn::Clockwise, true);
        assert_eq!(snapped.len(), 2);
    }

    #[test]
    fn test_mirror_flag_follows_quarter_turn() {
        let map = TestMap::new();
        let upright = PlacedTile::new("stone.png", CellPos::new(0, 0), map.floor);
        let turned = upright.clone().with_rotation(1);
        let pivot = upright.center();

        let a = mirror_about(&upright, pivot, MirrorAxis::Horizontal);
        assert!(a.mirror_x && !a.mirror_y);
        let b = mirror_about(&turned, pivot, MirrorAxis::Horizontal);
        assert!(!b.mirror_x && b.mirror_y);
        assert_eq!(b.rotation_index, 1);
    }

    #[test]
    fn test_mirror_moves_about_pivot() {
        let map = TestMap::new();
        let tile = PlacedTile::new("stone.png", CellPos::new(0, 0), map.floor);
        let mirrored = mirror_about(&tile, CellCenter::new(2.0, 0.0), MirrorAxis::Horizontal);
        assert_eq!(mirrored.top_left(), CellPos::new(3, 0));
        let twice = mirror_about(&mirrored, CellCenter::new(2.0, 0.0), MirrorAxis::Horizontal);
        assert_eq!(twice.top_left(), tile.top_left());
        assert!(!twice.mirror_x);
    }

    #[test]
    fn test_locked_tiles_are_not_transformed() {
        let mut map = TestMap::new();
        let tile = PlacedTile::new("stone.png", CellPos::new(0, 0), map.floor);
        let ids = [tile.id];
        let tiles = vec![tile];
        map.layers.toggle_locked(map.floor).unwrap();
        assert!(nudge_selection(&tiles, &map.layers, &ids, 1.0, 0.0).is_empty());
    }

    #[test]
    fn test_duplicate_gets_new_ids() {
        let map = TestMap::new();
        let tile = PlacedTile::new("stone.png", CellPos::new(0, 0), map.floor);
        let ids = [tile.id];
        let copies = duplicate_selection(std::slice::from_ref(&tile), &map.layers, &ids);
        assert_eq!(copies.len(), 1);
        assert_ne!(copies[0].id, tile.id);
        assert_eq!(copies[0].top_left(), CellPos::new(1, 1));
    }
}
