//! Dropping tile assets onto the map
//!
//! A drag carries `{"src": "..."}` under [`TILE_MIME`]. Some hosts only
//! expose plain text while dragging, and some expose nothing until the drop,
//! so the payload is looked up in three places: the custom type, then
//! `text/plain`, then a [`DragRelay`] the drag source filled in when the
//! drag started.

use crate::store::MapStore;
use battlemap_brush::{resolve_clear_set, ClearPolicy, StrokeContext};
use battlemap_core::coords::{center_and_span_to_top_left, snap_world_to_center};
use battlemap_core::{Camera, PlacedTile, ScreenPos, TileAsset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

pub const TILE_MIME: &str = "application/x-battlemap-tile";
pub const TEXT_MIME: &str = "text/plain";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropPayload {
    pub src: String,
}

impl DropPayload {
    pub fn new(src: impl Into<String>) -> Self {
        Self { src: src.into() }
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({ "src": self.src }).to_string()
    }

    fn parse(text: &str) -> Option<Self> {
        serde_json::from_str::<Self>(text)
            .ok()
            .filter(|p| !p.src.is_empty())
    }
}

/// Typed data attached to a drag by the host
pub trait DataTransfer {
    fn get_data(&self, mime: &str) -> Option<String>;
}

impl DataTransfer for HashMap<String, String> {
    fn get_data(&self, mime: &str) -> Option<String> {
        self.get(mime).cloned()
    }
}

/// Payload slot filled by the drag source, for hosts that hide drag data
/// until drop
#[derive(Debug, Clone, Default)]
pub struct DragRelay {
    current: Option<DropPayload>,
}

impl DragRelay {
    pub fn start(&mut self, payload: DropPayload) {
        self.current = Some(payload);
    }

    pub fn current(&self) -> Option<&DropPayload> {
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

/// Find the payload of a drag
pub fn read_payload(transfer: &dyn DataTransfer, relay: &DragRelay) -> Option<DropPayload> {
    if let Some(payload) = transfer.get_data(TILE_MIME).as_deref().and_then(DropPayload::parse) {
        return Some(payload);
    }
    if let Some(text) = transfer.get_data(TEXT_MIME) {
        if let Some(payload) = DropPayload::parse(&text) {
            return Some(payload);
        }
    }
    relay.current().cloned()
}

/// Known assets by source path, so dropped tiles keep their light flags
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    assets: HashMap<String, TileAsset>,
}

impl AssetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: TileAsset) {
        self.assets.insert(asset.src.clone(), asset);
    }

    pub fn extend(&mut self, assets: impl IntoIterator<Item = TileAsset>) {
        for asset in assets {
            self.insert(asset);
        }
    }

    /// The registered asset, or a plain one for an unknown source
    pub fn resolve(&self, src: &str) -> TileAsset {
        self.assets
            .get(src)
            .cloned()
            .unwrap_or_else(|| TileAsset::new(src))
    }
}

/// Where a dropped asset lands: its footprint snapped around the pointer
fn snapped_top_left(asset: &TileAsset, camera: &Camera, screen: ScreenPos) -> battlemap_core::CellPos {
    let span = asset.footprint();
    center_and_span_to_top_left(snap_world_to_center(camera.screen_to_world(screen), span), span)
}

/// Preview of the tile a drop at `screen` would place
pub fn drop_ghost(store: &MapStore, asset: &TileAsset, screen: ScreenPos) -> PlacedTile {
    let layer = store.selected_layer().unwrap_or_else(Uuid::nil);
    PlacedTile::from_asset(asset, snapped_top_left(asset, store.camera(), screen), layer)
}

/// Place a dropped asset as one history step. Returns the new tile's id, or
/// `None` when the drop was refused.
pub fn drop_tile(
    store: &mut MapStore,
    asset: &TileAsset,
    screen: ScreenPos,
    policy: &ClearPolicy,
    now: Instant,
) -> Option<Uuid> {
    let layer = store.target_layer(asset.is_light_source(), now).ok()?;
    let clear = resolve_clear_set(store.layers(), layer, policy);
    let mut ctx = StrokeContext::new(layer, store.next_order(layer));
    let tile = ctx.stamp(asset, snapped_top_left(asset, store.camera(), screen), 0);
    let id = tile.id;
    store.place(vec![tile], &clear, "Drop tile").then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{store, torch};
    use battlemap_core::{CellCenter, CellPos, LayerRole};

    fn transfer(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_payload_lookup_order() {
        let mut relay = DragRelay::default();
        relay.start(DropPayload::new("relay.png"));

        let both = transfer(&[
            (TILE_MIME, r#"{"src":"custom.png"}"#),
            (TEXT_MIME, r#"{"src":"text.png"}"#),
        ]);
        assert_eq!(read_payload(&both, &relay).unwrap().src, "custom.png");

        let text_only = transfer(&[(TEXT_MIME, r#"{"src":"text.png"}"#)]);
        assert_eq!(read_payload(&text_only, &relay).unwrap().src, "text.png");

        let garbage = transfer(&[(TILE_MIME, "nope"), (TEXT_MIME, "hello")]);
        assert_eq!(read_payload(&garbage, &relay).unwrap().src, "relay.png");

        relay.clear();
        assert_eq!(read_payload(&garbage, &relay), None);
    }

    #[test]
    fn test_payload_json_shape() {
        let payload = DropPayload::new("props/table_2x1.png");
        assert_eq!(DropPayload::parse(&payload.to_json()), Some(payload));
    }

    #[test]
    fn test_drop_snaps_multi_cell_asset() {
        let mut store = store();
        let asset = TileAsset::new("props/table_2x1.png");
        let point = store
            .camera()
            .world_to_screen(CellCenter::new(5.9, 3.5).to_world());

        let id = drop_tile(&mut store, &asset, point, &ClearPolicy::Floor, Instant::now()).unwrap();
        let tile = store.tile(id).unwrap();
        assert_eq!(tile.top_left(), CellPos::new(5, 3));
        assert_eq!(tile.bounds().width(), 2);
        assert_eq!(drop_ghost(&store, &asset, point).top_left(), tile.top_left());
        assert_eq!(store.history().undo_description(), Some("Drop tile"));
    }

    #[test]
    fn test_dropped_light_keeps_flags() {
        let mut store = store();
        let tokens = store.layers().role_layer(LayerRole::Tokens).unwrap().id;
        store.select_layer(Some(tokens));
        let mut catalog = AssetCatalog::new();
        catalog.insert(torch());

        let asset = catalog.resolve("light/torch.png");
        let id = drop_tile(&mut store, &asset, ScreenPos::new(0.0, 0.0), &ClearPolicy::Floor, Instant::now()).unwrap();
        let tile = store.tile(id).unwrap();
        assert!(tile.light.is_some());
        assert_eq!(tile.layer_id, store.layers().role_layer(LayerRole::Lighting).map(|n| n.id));
        assert!(!catalog.resolve("unknown.png").is_light_source());
    }
}
