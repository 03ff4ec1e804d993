//! Brush descriptors handed to the engine by tileset discovery

use crate::tile::TileAsset;
use serde::{Deserialize, Serialize};

/// Sparse decoration sub-pool scattered over rectangle fills
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecorationParams {
    pub pool: Vec<TileAsset>,
    /// Lower bound on the adaptive decoration grid spacing, in cells
    #[serde(default = "DecorationParams::default_min_spacing")]
    pub min_spacing: u32,
    /// Upper bound on the adaptive decoration grid spacing, in cells
    #[serde(default = "DecorationParams::default_max_spacing")]
    pub max_spacing: u32,
    /// Probability that a decoration grid point receives a decoration
    #[serde(default = "DecorationParams::default_density")]
    pub density: f64,
}

impl DecorationParams {
    fn default_min_spacing() -> u32 {
        2
    }

    fn default_max_spacing() -> u32 {
        6
    }

    fn default_density() -> f64 {
        1.0
    }

    pub fn new(pool: Vec<TileAsset>) -> Self {
        Self {
            pool,
            min_spacing: Self::default_min_spacing(),
            max_spacing: Self::default_max_spacing(),
            density: Self::default_density(),
        }
    }

    /// Adaptive spacing: `clamp(round(sqrt(area / 9)), min, max)`
    pub fn spacing_for_area(&self, area: u64) -> u32 {
        let min = self.min_spacing.max(1);
        let max = self.max_spacing.max(min);
        let raw = ((area as f64) / 9.0).sqrt().round() as u32;
        raw.clamp(min, max)
    }
}

/// Edge pool for border rectangles
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgePool {
    pub tiles: Vec<TileAsset>,
    /// Face outward per side (top, right, bottom, left); unset sides keep
    /// the art's own orientation
    #[serde(default = "EdgePool::default_auto_rotate")]
    pub auto_rotate: [bool; 4],
    /// Randomly mirror edge tiles along the edge for variety
    #[serde(default)]
    pub random_mirror: bool,
}

impl EdgePool {
    fn default_auto_rotate() -> [bool; 4] {
        [true; 4]
    }

    pub fn new(tiles: Vec<TileAsset>) -> Self {
        Self {
            tiles,
            auto_rotate: Self::default_auto_rotate(),
            random_mirror: false,
        }
    }
}

/// Tile pools for line and polyline paths
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathPool {
    pub body: Vec<TileAsset>,
    #[serde(default)]
    pub corner: Vec<TileAsset>,
    #[serde(default)]
    pub endpoint: Vec<TileAsset>,
}

/// A resolved brush: fill, corner and edge pools plus randomness settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrushDescriptor {
    /// Tileset/brush key mixed into the deterministic variant stream
    pub key: String,
    #[serde(default)]
    pub fill: Vec<TileAsset>,
    #[serde(default)]
    pub corners: Vec<TileAsset>,
    #[serde(default)]
    pub edges: EdgePool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathPool>,
    /// Randomize quarter-turn rotation of square fill tiles
    #[serde(default)]
    pub random_rotation: bool,
    /// Randomly mirror fill tiles
    #[serde(default)]
    pub random_mirror: bool,
    /// Maximum sub-cell offset of fill tile centers, in cells
    #[serde(default)]
    pub position_jitter: f64,
    /// Maximum relative scale deviation of fill tiles
    #[serde(default)]
    pub size_jitter: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoration: Option<DecorationParams>,
}

impl BrushDescriptor {
    /// Brush that fills with the given assets and nothing else
    pub fn fill_only(key: impl Into<String>, fill: Vec<TileAsset>) -> Self {
        Self {
            key: key.into(),
            fill,
            ..Default::default()
        }
    }

    /// Brush placing a single asset
    pub fn single(asset: TileAsset) -> Self {
        Self::fill_only(asset.src.clone(), vec![asset])
    }

    /// Whether any asset in the brush emits light
    pub fn has_light_source(&self) -> bool {
        self.fill.iter().any(TileAsset::is_light_source)
    }
}
