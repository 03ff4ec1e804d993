//! Per-gesture stroke ids and paint order

use battlemap_core::coords::top_left_and_span_to_center;
use battlemap_core::{CellPos, PlacedTile, TileAsset};
use uuid::Uuid;

/// Shared state for every tile produced by one tool gesture
#[derive(Debug, Clone)]
pub struct StrokeContext {
    pub layer_id: Uuid,
    pub stroke_id: Uuid,
    next_order: i64,
}

impl StrokeContext {
    /// Create a context with a fresh stroke id; orders start at `first_order`
    pub fn new(layer_id: Uuid, first_order: i64) -> Self {
        Self::with_stroke_id(layer_id, Uuid::new_v4(), first_order)
    }

    /// Reuse an existing stroke id, for recomputing a preview in place
    pub fn with_stroke_id(layer_id: Uuid, stroke_id: Uuid, first_order: i64) -> Self {
        Self {
            layer_id,
            stroke_id,
            next_order: first_order,
        }
    }

    pub fn next_order(&self) -> i64 {
        self.next_order
    }

    /// Create a tile for `asset` at `top_left` carrying this stroke's layer,
    /// stroke id and the next paint order
    pub fn stamp(&mut self, asset: &TileAsset, top_left: CellPos, rotation_index: u8) -> PlacedTile {
        let mut tile = PlacedTile::from_asset(asset, top_left, self.layer_id)
            .with_stroke(self.stroke_id)
            .with_order(self.next_order);
        // The rotated footprint keeps `top_left` as its top-left cell
        tile.rotation_index = rotation_index % 4;
        tile.set_center(top_left_and_span_to_center(top_left, tile.effective_footprint()));
        self.next_order += 1;
        tile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_assigns_stroke_and_order() {
        let layer = Uuid::new_v4();
        let mut ctx = StrokeContext::new(layer, 10);
        let a = ctx.stamp(&TileAsset::new("a.png"), CellPos::new(0, 0), 0);
        let b = ctx.stamp(&TileAsset::new("bed_1x2.png"), CellPos::new(3, 3), 1);

        assert_eq!(a.stroke_id, Some(ctx.stroke_id));
        assert_eq!(b.stroke_id, Some(ctx.stroke_id));
        assert_eq!((a.order, b.order), (10, 11));
        assert_eq!(b.layer_id, Some(layer));
        assert_eq!(b.top_left(), CellPos::new(3, 3));
        assert_eq!(b.bounds().max, CellPos::new(4, 3));
        assert_eq!(b.rotation_index, 1);
        assert_eq!(ctx.next_order(), 12);
    }
}
