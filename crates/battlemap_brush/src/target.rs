//! Target layer and clear set resolution shared by all placement tools

use battlemap_core::{LayerRole, LayerStack, PlacedTile};
use uuid::Uuid;

/// Transient warning shown when there is nowhere to paint
pub const NO_TARGET_LAYER_MESSAGE: &str = "Select a layer before painting";

/// Why a placement was refused. No state changes in either case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementRefusal {
    /// Nothing paintable selected and the asset is not a light source
    NoTargetLayer,
    /// The selected layer is locked; refused silently
    LockedLayer,
}

impl PlacementRefusal {
    /// User-facing message, if the refusal should be surfaced
    pub fn message(&self) -> Option<&'static str> {
        match self {
            PlacementRefusal::NoTargetLayer => Some(NO_TARGET_LAYER_MESSAGE),
            PlacementRefusal::LockedLayer => None,
        }
    }
}

/// Pick the layer new tiles go to.
///
/// The selected concrete layer wins if it is paintable. Otherwise light
/// source assets are forced onto the lighting layer (its lock does not
/// apply). Anything else is refused.
pub fn resolve_target_layer(
    layers: &LayerStack,
    selected: Option<Uuid>,
    is_light_source: bool,
) -> Result<Uuid, PlacementRefusal> {
    if let Some(id) = selected {
        if let Some(role) = layers.get(id).and_then(|n| n.role()) {
            if role.is_paintable() {
                if layers.is_locked(id) {
                    return Err(PlacementRefusal::LockedLayer);
                }
                return Ok(id);
            }
        }
    }
    if is_light_source {
        if let Some(lighting) = layers.role_layer(LayerRole::Lighting) {
            return Ok(lighting.id);
        }
    }
    Err(PlacementRefusal::NoTargetLayer)
}

/// Which layers lose overlapping tiles when new tiles land
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClearPolicy {
    /// Clear the floor layer, and only when painting onto it
    #[default]
    Floor,
    /// Always clear the target layer
    Target,
    /// Clear exactly these layers
    Layers(Vec<Uuid>),
    /// Let tiles stack freely
    Nothing,
}

/// Layers whose tiles overlapping a new footprint are deleted first
pub fn resolve_clear_set(layers: &LayerStack, target: Uuid, policy: &ClearPolicy) -> Vec<Uuid> {
    match policy {
        ClearPolicy::Floor => match layers.floor_id() {
            Some(floor) if floor == target => vec![floor],
            _ => Vec::new(),
        },
        ClearPolicy::Target => vec![target],
        ClearPolicy::Layers(ids) => ids.clone(),
        ClearPolicy::Nothing => Vec::new(),
    }
}

/// Ids of existing tiles on `clear_layers` overlapping any of `incoming`
pub fn overlapping_tiles(
    layers: &LayerStack,
    existing: &[PlacedTile],
    incoming: &[PlacedTile],
    clear_layers: &[Uuid],
) -> Vec<Uuid> {
    if clear_layers.is_empty() || incoming.is_empty() {
        return Vec::new();
    }
    let footprints: Vec<_> = incoming.iter().map(PlacedTile::bounds).collect();
    existing
        .iter()
        .filter(|tile| {
            layers
                .resolve_tile_layer(tile)
                .is_some_and(|layer| clear_layers.contains(&layer))
        })
        .filter(|tile| {
            let bounds = tile.bounds();
            footprints.iter().any(|f| f.intersects(&bounds))
        })
        .map(|tile| tile.id)
        .collect()
}
