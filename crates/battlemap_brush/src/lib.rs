//! Placement tools for battlemap
//!
//! Everything here is a pure function of a brush, a seeded
//! [`VariantSelector`] and the gesture geometry, so a preview computed while
//! dragging is identical to the tiles committed on release.
//!
//! - [`rect`]: rectangle fill with decoration carving, and corner/edge borders
//! - [`line`]: 4-connected lines, polylines and closed polygons
//! - [`freehand`]: a drag that fills each newly visited cell once
//! - [`target`]: target layer and clear set resolution
//!
//! # Example
//!
//! ```rust,ignore
//! use battlemap_brush::{fill_rect, StrokeContext, VariantSelector};
//! use battlemap_core::{BrushDescriptor, CellPos, CellRect, TileAsset};
//!
//! let brush = BrushDescriptor::fill_only("cave", vec![TileAsset::new("cave/floor.png")]);
//! let selector = VariantSelector::new("abc", &brush.key);
//! let mut ctx = StrokeContext::new(floor_layer_id, 0);
//! let area = CellRect::from_corners(CellPos::new(0, 0), CellPos::new(2, 2));
//! let tiles = fill_rect(&brush, &selector, area, &mut ctx);
//! assert_eq!(tiles.len(), 9);
//! ```

pub mod freehand;
pub mod line;
pub mod rect;
pub mod rng;
mod stroke;
pub mod target;

pub use freehand::FreehandStroke;
pub use line::{
    classify, line_cells, place_path, place_polygon, place_polyline, polygon_cells,
    polyline_cells, Direction, PathCell, PathKind,
};
pub use rect::{border_rect, fill_rect, place_rect, RectMode};
pub use rng::{DeterministicRng, VariantSelector, VariantStream};
pub use stroke::StrokeContext;
pub use target::{
    overlapping_tiles, resolve_clear_set, resolve_target_layer, ClearPolicy, PlacementRefusal,
    NO_TARGET_LAYER_MESSAGE,
};
