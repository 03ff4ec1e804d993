//! Hit testing and the tile selection
//!
//! Hits are alpha-exact: the pointer is mapped into the tile's unrotated,
//! unmirrored image space and the pixel there must be more opaque than the
//! threshold. Tiles without pixel data yet fall back to their transformed
//! rectangle.

use battlemap_core::coords::top_left_and_span_to_center;
use battlemap_core::{Camera, CellCenter, CellRect, LayerStack, PlacedTile, ScreenPos, Span};
use battlemap_render::{ImageCache, TileTransform};
use uuid::Uuid;

/// Per-image pixel lookup used for hit testing
pub trait PixelSource {
    /// Alpha at normalized image coordinates; `None` when no pixel data is
    /// available for `src`
    fn alpha_at(&self, src: &str, u: f64, v: f64) -> Option<u8>;
}

impl PixelSource for ImageCache {
    fn alpha_at(&self, src: &str, u: f64, v: f64) -> Option<u8> {
        ImageCache::alpha_at(self, src, u, v)
    }
}

/// Tiles that can be hit, selected or edited: on a visible, unlocked layer
pub fn is_editable(layers: &LayerStack, tile: &PlacedTile) -> bool {
    layers
        .resolve_tile_layer(tile)
        .is_some_and(|layer| layers.is_visible(layer) && !layers.is_locked(layer))
}

/// Indices of `tiles` in paint order, bottom first
fn paint_sorted(tiles: &[PlacedTile], layers: &LayerStack) -> Vec<usize> {
    let index = layers.paint_index();
    let mut order: Vec<usize> = (0..tiles.len()).collect();
    order.sort_by_key(|i| {
        let tile = &tiles[*i];
        let layer = layers
            .resolve_tile_layer(tile)
            .and_then(|l| index.get(&l).copied())
            .unwrap_or(0);
        (layer, tile.order)
    });
    order
}

/// Whether `point` lands on an opaque pixel of `tile`
pub fn hits_tile(tile: &PlacedTile, camera: &Camera, pixels: &dyn PixelSource, point: ScreenPos, threshold: u8) -> bool {
    let Some((u, v)) = TileTransform::for_tile(tile, camera).to_local(point) else {
        return false;
    };
    pixels.alpha_at(&tile.src, u, v).map_or(true, |alpha| alpha > threshold)
}

/// Topmost editable tile under a screen point
pub fn hit_test(
    tiles: &[PlacedTile],
    layers: &LayerStack,
    camera: &Camera,
    pixels: &dyn PixelSource,
    point: ScreenPos,
    threshold: u8,
) -> Option<Uuid> {
    paint_sorted(tiles, layers)
        .into_iter()
        .rev()
        .map(|i| &tiles[i])
        .filter(|tile| is_editable(layers, tile))
        .find(|tile| hits_tile(tile, camera, pixels, point, threshold))
        .map(|tile| tile.id)
}

/// Topmost editable tiles covering a cell, top first
pub fn tiles_at_cell(tiles: &[PlacedTile], layers: &LayerStack, cell: battlemap_core::CellPos) -> Vec<Uuid> {
    paint_sorted(tiles, layers)
        .into_iter()
        .rev()
        .map(|i| &tiles[i])
        .filter(|tile| tile.covers(cell) && is_editable(layers, tile))
        .map(|tile| tile.id)
        .collect()
}

/// Editable tiles whose footprint overlaps `rect`
pub fn box_select(tiles: &[PlacedTile], layers: &LayerStack, rect: CellRect) -> Vec<Uuid> {
    tiles
        .iter()
        .filter(|tile| tile.bounds().intersects(&rect) && is_editable(layers, tile))
        .map(|tile| tile.id)
        .collect()
}

/// Cell rectangle covered by a screen-space marquee
pub fn marquee_cells(camera: &Camera, from: ScreenPos, to: ScreenPos) -> CellRect {
    CellRect::from_corners(camera.screen_to_cell(from), camera.screen_to_cell(to))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectMode {
    #[default]
    Replace,
    Toggle,
}

/// Selected tile ids with a cached transform pivot.
///
/// The pivot is computed once per selection so repeated rotations compose
/// around the same point; it is dropped whenever the set changes.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    ids: Vec<Uuid>,
    pivot: Option<CellCenter>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[Uuid] {
        &self.ids
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.pivot = None;
    }

    pub fn set(&mut self, ids: impl IntoIterator<Item = Uuid>) {
        self.ids.clear();
        for id in ids {
            if !self.ids.contains(&id) {
                self.ids.push(id);
            }
        }
        self.pivot = None;
    }

    pub fn toggle(&mut self, id: Uuid) {
        if let Some(pos) = self.ids.iter().position(|s| *s == id) {
            self.ids.remove(pos);
        } else {
            self.ids.push(id);
        }
        self.pivot = None;
    }

    /// Plain click replaces the selection; a modifier click toggles the hit
    /// tile. Clicking empty space without a modifier clears.
    pub fn click(&mut self, hit: Option<Uuid>, additive: bool) {
        match (hit, additive) {
            (Some(id), true) => self.toggle(id),
            (Some(id), false) => self.set([id]),
            (None, true) => {}
            (None, false) => self.clear(),
        }
    }

    /// Apply a marquee result
    pub fn apply_box(&mut self, ids: Vec<Uuid>, mode: SelectMode) {
        match mode {
            SelectMode::Replace => self.set(ids),
            SelectMode::Toggle => {
                for id in ids {
                    self.toggle(id);
                }
            }
        }
    }

    /// Drop ids that no longer exist (after undo or delete)
    pub fn retain_existing(&mut self, tiles: &[PlacedTile]) {
        let before = self.ids.len();
        self.ids.retain(|id| tiles.iter().any(|t| t.id == *id));
        if self.ids.len() != before {
            self.pivot = None;
        }
    }

    /// Selected tiles, in selection order
    pub fn tiles<'a>(&self, tiles: &'a [PlacedTile]) -> Vec<&'a PlacedTile> {
        self.ids
            .iter()
            .filter_map(|id| tiles.iter().find(|t| t.id == *id))
            .collect()
    }

    /// Union of the selected footprints
    pub fn bounds(&self, tiles: &[PlacedTile]) -> Option<CellRect> {
        self.tiles(tiles)
            .into_iter()
            .map(PlacedTile::bounds)
            .reduce(|a, b| a.union(&b))
    }

    /// Transform pivot: a lone tile's own center, otherwise the snapped
    /// center of the combined bounds. Cached until the selection changes.
    pub fn pivot(&mut self, tiles: &[PlacedTile]) -> Option<CellCenter> {
        if let Some(pivot) = self.pivot {
            return Some(pivot);
        }
        let selected = self.tiles(tiles);
        let pivot = match selected.as_slice() {
            [] => return None,
            [single] => single.center(),
            _ => {
                let bounds = self.bounds(tiles)?;
                top_left_and_span_to_center(bounds.min, Span::new(bounds.width(), bounds.height()))
            }
        };
        self.pivot = Some(pivot);
        Some(pivot)
    }

    /// Forget the cached pivot; the next transform derives it afresh
    pub fn reset_pivot(&mut self) {
        self.pivot = None;
    }

    /// Move a cached pivot along with a nudge or drag
    pub fn shift_pivot(&mut self, dx: f64, dy: f64) {
        if let Some(pivot) = &mut self.pivot {
            pivot.x += dx;
            pivot.y += dy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedAlpha, TestMap};
    use battlemap_core::coords::GRID_ORIGIN;
    use battlemap_core::CellPos;

    fn origin_camera() -> Camera {
        Camera::new(-GRID_ORIGIN, -GRID_ORIGIN, 1.0)
    }

    #[test]
    fn test_hit_is_alpha_exact() {
        let map = TestMap::new();
        let tile = PlacedTile::new("ring.png", CellPos::new(0, 0), map.floor);
        let id = tile.id;
        let tiles = vec![tile];
        // Opaque only in the left half of the image
        let pixels = FixedAlpha::new().with_left_half("ring.png");
        let camera = origin_camera();

        assert_eq!(
            hit_test(&tiles, &map.layers, &camera, &pixels, ScreenPos::new(10.0, 32.0), 8),
            Some(id)
        );
        assert_eq!(
            hit_test(&tiles, &map.layers, &camera, &pixels, ScreenPos::new(50.0, 32.0), 8),
            None
        );
    }

    #[test]
    fn test_hit_follows_mirroring() {
        let map = TestMap::new();
        let tile = PlacedTile::new("ring.png", CellPos::new(0, 0), map.floor).with_mirror(true, false);
        let tiles = vec![tile];
        let pixels = FixedAlpha::new().with_left_half("ring.png");
        let camera = origin_camera();
        assert!(hit_test(&tiles, &map.layers, &camera, &pixels, ScreenPos::new(10.0, 32.0), 8).is_none());
        assert!(hit_test(&tiles, &map.layers, &camera, &pixels, ScreenPos::new(50.0, 32.0), 8).is_some());
    }

    #[test]
    fn test_unloaded_image_uses_rectangle() {
        let map = TestMap::new();
        let tile = PlacedTile::new("pending.png", CellPos::new(0, 0), map.floor);
        let tiles = vec![tile];
        let camera = origin_camera();
        let hit = hit_test(&tiles, &map.layers, &camera, &FixedAlpha::new(), ScreenPos::new(60.0, 60.0), 8);
        assert!(hit.is_some());
        let miss = hit_test(&tiles, &map.layers, &camera, &FixedAlpha::new(), ScreenPos::new(70.0, 10.0), 8);
        assert!(miss.is_none());
    }

    #[test]
    fn test_topmost_wins_and_locked_is_skipped() {
        let mut map = TestMap::new();
        let floor_tile = PlacedTile::new("stone.png", CellPos::new(0, 0), map.floor);
        let prop = PlacedTile::new("crate.png", CellPos::new(0, 0), map.props);
        let (floor_id, prop_id) = (floor_tile.id, prop.id);
        let tiles = vec![prop, floor_tile];
        let camera = origin_camera();
        let point = ScreenPos::new(32.0, 32.0);
        let pixels = FixedAlpha::new();

        assert_eq!(hit_test(&tiles, &map.layers, &camera, &pixels, point, 8), Some(prop_id));
        map.layers.toggle_locked(map.props).unwrap();
        assert_eq!(hit_test(&tiles, &map.layers, &camera, &pixels, point, 8), Some(floor_id));
        map.layers.set_visible(map.floor, false).unwrap();
        assert_eq!(hit_test(&tiles, &map.layers, &camera, &pixels, point, 8), None);
    }

    #[test]
    fn test_box_select_by_footprint() {
        let map = TestMap::new();
        let table = PlacedTile::new("table_2x1.png", CellPos::new(0, 0), map.props);
        let far = PlacedTile::new("stone.png", CellPos::new(5, 5), map.floor);
        let table_id = table.id;
        let tiles = vec![table, far];
        let rect = CellRect::from_corners(CellPos::new(1, 0), CellPos::new(2, 2));
        assert_eq!(box_select(&tiles, &map.layers, rect), vec![table_id]);
    }

    #[test]
    fn test_click_and_toggle() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut selection = Selection::new();
        selection.click(Some(a), false);
        selection.click(Some(b), true);
        assert_eq!(selection.ids(), &[a, b]);
        selection.click(Some(a), true);
        assert_eq!(selection.ids(), &[b]);
        selection.click(None, true);
        assert_eq!(selection.len(), 1);
        selection.click(None, false);
        assert!(selection.is_empty());

        selection.apply_box(vec![a, b], SelectMode::Replace);
        selection.apply_box(vec![b], SelectMode::Toggle);
        assert_eq!(selection.ids(), &[a]);
    }

    #[test]
    fn test_pivot_single_and_group() {
        let map = TestMap::new();
        let table = PlacedTile::new("table_2x1.png", CellPos::new(0, 0), map.props);
        let stone = PlacedTile::new("stone.png", CellPos::new(2, 2), map.floor);
        let tiles = vec![table.clone(), stone.clone()];

        let mut selection = Selection::new();
        selection.set([table.id]);
        assert_eq!(selection.pivot(&tiles), Some(CellCenter::new(1.0, 0.5)));

        selection.set([table.id, stone.id]);
        assert_eq!(selection.pivot(&tiles), Some(CellCenter::new(1.5, 1.5)));

        // Cached even when the tiles move
        let moved = vec![table.with_rotation(1), stone];
        assert_eq!(selection.pivot(&moved), Some(CellCenter::new(1.5, 1.5)));
    }
}
