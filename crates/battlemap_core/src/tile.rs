//! Placed tile instances and tile asset descriptors

use crate::coords::{
    center_and_span_to_top_left, top_left_and_span_to_center, CellCenter, CellPos, CellRect, Span,
};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use uuid::Uuid;

/// Point light carried by a light-source asset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileLight {
    /// Light color (RGB)
    #[serde(default = "TileLight::default_color")]
    pub color: [u8; 3],
    /// Multiplier on the lighting layer's intensity
    #[serde(default = "TileLight::default_intensity")]
    pub intensity: f32,
}

impl TileLight {
    fn default_color() -> [u8; 3] {
        [255, 214, 160]
    }

    fn default_intensity() -> f32 {
        1.0
    }
}

impl Default for TileLight {
    fn default() -> Self {
        Self {
            color: Self::default_color(),
            intensity: Self::default_intensity(),
        }
    }
}

/// Parse the `_WxH` footprint suffix from an asset filename.
///
/// `"dungeon/table_2x1.png"` -> 2x1. Names without a suffix, or with a
/// zero dimension, are 1x1.
pub fn footprint_from_src(src: &str) -> Span {
    let file = src.rsplit(['/', '\\']).next().unwrap_or(src);
    let stem = match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    };
    let Some(suffix) = stem.rsplit('_').next() else {
        return Span::ONE;
    };
    let mut parts = suffix.split(['x', 'X']);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(w), Some(h), None) => match (w.parse::<u32>(), h.parse::<u32>()) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => Span::new(w, h),
            _ => Span::ONE,
        },
        _ => Span::ONE,
    }
}

/// A placeable tile image as handed out by tileset discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileAsset {
    /// Asset path; the filename encodes the footprint
    pub src: String,
    /// Light emitted when placed, if this is a light source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<TileLight>,
    /// Whether tiles of this asset occlude light
    #[serde(default)]
    pub blocks_light: bool,
}

impl TileAsset {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            light: None,
            blocks_light: false,
        }
    }

    pub fn with_light(mut self, light: TileLight) -> Self {
        self.light = Some(light);
        self
    }

    pub fn with_blocks_light(mut self, blocks: bool) -> Self {
        self.blocks_light = blocks;
        self
    }

    pub fn footprint(&self) -> Span {
        footprint_from_src(&self.src)
    }

    pub fn is_light_source(&self) -> bool {
        self.light.is_some()
    }
}

/// A tile instance on the map.
///
/// The continuous center is authoritative; `cell_x`/`cell_y` are the derived
/// integer top-left of the on-grid bounding box and are kept in sync by every
/// constructor and transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedTile {
    pub id: Uuid,
    pub src: String,
    #[serde(default)]
    pub cell_x: i32,
    #[serde(default)]
    pub cell_y: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_y: Option<f64>,
    /// Clockwise quarter turns
    #[serde(default)]
    pub rotation_index: u8,
    /// Continuous rotation, set only in free rotation mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_radians: Option<f64>,
    #[serde(default)]
    pub mirror_x: bool,
    #[serde(default)]
    pub mirror_y: bool,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_id: Option<Uuid>,
    /// Legacy role key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_id: Option<Uuid>,
    /// Paint order within the layer
    #[serde(default)]
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<TileLight>,
    #[serde(default)]
    pub blocks_light: bool,
}

fn default_scale() -> f64 {
    1.0
}

impl PlacedTile {
    /// Create a tile whose footprint starts at `top_left`
    pub fn new(src: impl Into<String>, top_left: CellPos, layer_id: Uuid) -> Self {
        let src = src.into();
        let center = top_left_and_span_to_center(top_left, footprint_from_src(&src));
        Self {
            id: Uuid::new_v4(),
            src,
            cell_x: top_left.x,
            cell_y: top_left.y,
            center_x: Some(center.x),
            center_y: Some(center.y),
            rotation_index: 0,
            rotation_radians: None,
            mirror_x: false,
            mirror_y: false,
            scale: 1.0,
            stroke_id: None,
            layer: None,
            layer_id: Some(layer_id),
            order: 0,
            light: None,
            blocks_light: false,
        }
    }

    /// Create a tile for an asset, copying its light flags
    pub fn from_asset(asset: &TileAsset, top_left: CellPos, layer_id: Uuid) -> Self {
        let mut tile = Self::new(asset.src.clone(), top_left, layer_id);
        tile.light = asset.light;
        tile.blocks_light = asset.blocks_light;
        tile
    }

    pub fn with_rotation(mut self, rotation_index: u8) -> Self {
        let center = self.center();
        self.rotation_index = rotation_index % 4;
        self.set_center(center);
        self
    }

    pub fn with_stroke(mut self, stroke_id: Uuid) -> Self {
        self.stroke_id = Some(stroke_id);
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn with_mirror(mut self, mirror_x: bool, mirror_y: bool) -> Self {
        self.mirror_x = mirror_x;
        self.mirror_y = mirror_y;
        self
    }

    /// Unrotated footprint from the asset filename
    pub fn footprint(&self) -> Span {
        footprint_from_src(&self.src)
    }

    /// Footprint after quarter-turn rotation
    pub fn effective_footprint(&self) -> Span {
        self.footprint().rotated(self.rotation_index)
    }

    /// Authoritative center; derived from the top-left when absent
    pub fn center(&self) -> CellCenter {
        match (self.center_x, self.center_y) {
            (Some(x), Some(y)) => CellCenter::new(x, y),
            _ => top_left_and_span_to_center(self.top_left(), self.effective_footprint()),
        }
    }

    pub fn top_left(&self) -> CellPos {
        CellPos::new(self.cell_x, self.cell_y)
    }

    /// Move the center and re-derive the integer top-left
    pub fn set_center(&mut self, center: CellCenter) {
        let top_left = center_and_span_to_top_left(center, self.effective_footprint());
        self.center_x = Some(center.x);
        self.center_y = Some(center.y);
        self.cell_x = top_left.x;
        self.cell_y = top_left.y;
    }

    /// Fill in a missing center and make the top-left agree with it
    pub fn normalize(&mut self) {
        self.rotation_index %= 4;
        if !(self.scale.is_finite() && self.scale > 0.0) {
            self.scale = 1.0;
        }
        let center = self.center();
        self.set_center(center);
    }

    /// Integer-aligned on-grid bounding box
    pub fn bounds(&self) -> CellRect {
        CellRect::from_top_left(self.top_left(), self.effective_footprint())
    }

    pub fn covers(&self, cell: CellPos) -> bool {
        self.bounds().contains(cell)
    }

    /// Rotation in radians used for drawing
    pub fn angle(&self) -> f64 {
        self.rotation_radians
            .unwrap_or(self.rotation_index as f64 * FRAC_PI_2)
    }

    /// Whether the rotation is a whole number of quarter turns
    pub fn is_quarter_aligned(&self) -> bool {
        match self.rotation_radians {
            None => true,
            Some(r) => {
                let quarters = r / FRAC_PI_2;
                (quarters - quarters.round()).abs() < 1e-9
            }
        }
    }

    /// Drop any free rotation, keeping the nearest quarter turn
    pub fn snap_rotation_to_quarter(&mut self) {
        if let Some(r) = self.rotation_radians.take() {
            let quarters = (r / FRAC_PI_2).round().rem_euclid(4.0) as u8;
            let center = self.center();
            self.rotation_index = quarters;
            self.set_center(center);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footprint_from_src() {
        assert_eq!(footprint_from_src("props/table_2x1.png"), Span::new(2, 1));
        assert_eq!(footprint_from_src("a\\b\\rug_3X4.webp"), Span::new(3, 4));
        assert_eq!(footprint_from_src("floor/stone.png"), Span::ONE);
        assert_eq!(footprint_from_src("floor/stone_0x2.png"), Span::ONE);
        assert_eq!(footprint_from_src("floor/stone_axb.png"), Span::ONE);
        assert_eq!(footprint_from_src("big_2x2"), Span::new(2, 2));
    }

    #[test]
    fn test_effective_footprint_swaps_on_odd_rotation() {
        let tile = PlacedTile::new("bed_1x2.png", CellPos::new(0, 0), Uuid::nil());
        assert_eq!(tile.effective_footprint(), Span::new(1, 2));
        let turned = tile.with_rotation(1);
        assert_eq!(turned.effective_footprint(), Span::new(2, 1));
    }

    #[test]
    fn test_center_authoritative() {
        let mut tile = PlacedTile::new("rug_2x1.png", CellPos::new(4, 7), Uuid::nil());
        assert_eq!(tile.center(), CellCenter::new(5.0, 7.5));
        tile.set_center(CellCenter::new(9.0, 2.5));
        assert_eq!(tile.top_left(), CellPos::new(8, 2));
        assert_eq!(tile.bounds(), CellRect::from_corners(CellPos::new(8, 2), CellPos::new(9, 2)));
    }

    #[test]
    fn test_normalize_derives_center_from_legacy_top_left() {
        let json = r#"{"id":"00000000-0000-0000-0000-000000000001","src":"a_2x2.png","cellX":3,"cellY":4}"#;
        let mut tile: PlacedTile = serde_json::from_str(json).unwrap();
        assert_eq!(tile.scale, 1.0);
        tile.normalize();
        assert_eq!(tile.center(), CellCenter::new(4.0, 5.0));
        assert_eq!(tile.top_left(), CellPos::new(3, 4));
    }

    #[test]
    fn test_snap_rotation_to_quarter() {
        let mut tile = PlacedTile::new("a.png", CellPos::new(0, 0), Uuid::nil());
        tile.rotation_radians = Some(std::f64::consts::PI * 0.9);
        assert!(!tile.is_quarter_aligned());
        tile.snap_rotation_to_quarter();
        assert_eq!(tile.rotation_index, 2);
        assert!(tile.rotation_radians.is_none());
    }
}
