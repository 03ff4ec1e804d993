//! Fixtures shared by the unit tests in this crate

use crate::selection::PixelSource;
use crate::store::MapStore;
use battlemap_core::{BrushDescriptor, LayerRole, LayerStack, TileAsset, TileLight};
use std::collections::HashSet;
use uuid::Uuid;

/// Default layer stack with the ids tests reach for most
pub struct TestMap {
    pub layers: LayerStack,
    pub floor: Uuid,
    pub props: Uuid,
    pub lighting: Uuid,
}

impl TestMap {
    pub fn new() -> Self {
        let layers = LayerStack::new_default();
        let floor = layers.floor_id().expect("default stack has a floor");
        let props = layers
            .nodes()
            .iter()
            .find(|n| n.name == "Props")
            .map(|n| n.id)
            .expect("default stack has a props layer");
        let lighting = layers
            .role_layer(LayerRole::Lighting)
            .map(|n| n.id)
            .expect("default stack has a lighting layer");
        Self {
            layers,
            floor,
            props,
            lighting,
        }
    }
}

/// Pixel source with hand-written alpha masks. Unknown images report no
/// pixel data.
#[derive(Default)]
pub struct FixedAlpha {
    left_half: HashSet<String>,
}

impl FixedAlpha {
    pub fn new() -> Self {
        Self::default()
    }

    /// `src` is opaque on its left half and transparent on the right
    pub fn with_left_half(mut self, src: &str) -> Self {
        self.left_half.insert(src.to_string());
        self
    }
}

impl PixelSource for FixedAlpha {
    fn alpha_at(&self, src: &str, u: f64, _v: f64) -> Option<u8> {
        self.left_half
            .contains(src)
            .then_some(if u < 0.5 { 255 } else { 0 })
    }
}

/// Fresh store seeded with "abc"
pub fn store() -> MapStore {
    MapStore::new("test-map", "abc")
}

/// Two interchangeable 1x1 floor variants
pub fn two_variant_brush() -> BrushDescriptor {
    BrushDescriptor::fill_only(
        "cave",
        vec![TileAsset::new("cave/floor_a.png"), TileAsset::new("cave/floor_b.png")],
    )
}

pub fn torch() -> TileAsset {
    TileAsset::new("light/torch.png").with_light(TileLight::default())
}
