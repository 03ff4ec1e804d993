//! Core data structures for battlemap
//!
//! This crate provides the fundamental types for a grid-based battlemap scene:
//! - `coords` - cell/world/screen conversion and parity-aware snapping
//! - `PlacedTile` - a tile instance with footprint, rotation and mirroring
//! - `LayerStack` - the layer tree with roles and per-layer effects
//! - `Camera` - world to screen mapping
//! - `FogCellSet` - revealed cells for fog of war
//! - `BrushDescriptor` / `TileAsset` - assets consumed from tileset discovery

mod brush;
pub mod coords;
mod error;
mod fog;
mod layer;
mod tile;

pub use brush::{BrushDescriptor, DecorationParams, EdgePool, PathPool};
pub use coords::{Camera, CellCenter, CellPos, CellRect, MapSize, ScreenPos, Span, WorldPos};
pub use error::LayerError;
pub use fog::{FogCellSet, FogMode};
pub use layer::{
    EffectOpacity, GroupProps, LayerEffects, LayerKind, LayerNode, LayerProps, LayerRole,
    LayerStack, NodePlacement, Tint,
};
pub use tile::{footprint_from_src, PlacedTile, TileAsset, TileLight};
