//! Map state behind a command interface
//!
//! The store owns the placed tiles, layer tree, camera and fog for one map.
//! Tools write *staged* tile changes while a gesture is in progress and call
//! [`MapStore::commit`] once when it completes; staged changes can always be
//! dropped with [`MapStore::cancel_staged`], which restores the last
//! committed snapshot.

use crate::history::{History, HistorySnapshot};
use battlemap_brush::{overlapping_tiles, resolve_target_layer, PlacementRefusal, VariantSelector};
use battlemap_core::{
    Camera, CellRect, FogCellSet, FogMode, LayerError, LayerStack, MapSize, NodePlacement,
    PlacedTile, ScreenPos,
};
use battlemap_render::{FrameRequest, Overlay, Scene};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// Default lifetime of a transient notice
pub const NOTICE_DURATION: Duration = Duration::from_secs(2);

/// Transient user-facing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub expires_at: Instant,
}

#[derive(Debug)]
pub struct MapStore {
    map_id: String,
    seed: String,
    tiles: Vec<PlacedTile>,
    layers: LayerStack,
    camera: Camera,
    fog: FogCellSet,
    fog_mode: FogMode,
    map_size: Option<MapSize>,
    selected_layer: Option<Uuid>,
    history: History,
    notice: Option<Notice>,
    notice_duration: Duration,
    redraw: Arc<FrameRequest>,
    dirty: bool,
}

impl MapStore {
    /// Empty map with the default layer stack and the floor layer selected
    pub fn new(map_id: impl Into<String>, seed: impl Into<String>) -> Self {
        let layers = LayerStack::new_default();
        let selected_layer = layers.floor_id();
        let camera = Camera::default();
        Self {
            map_id: map_id.into(),
            seed: seed.into(),
            tiles: Vec::new(),
            layers,
            camera,
            fog: FogCellSet::new(),
            fog_mode: FogMode::default(),
            map_size: None,
            selected_layer,
            history: History::new(HistorySnapshot {
                tiles: Vec::new(),
                camera,
            }),
            notice: None,
            notice_duration: NOTICE_DURATION,
            redraw: Arc::new(FrameRequest::new()),
            dirty: false,
        }
    }

    /// Replace the whole map state, e.g. after loading. History restarts at
    /// the given state.
    pub fn restore(
        &mut self,
        tiles: Vec<PlacedTile>,
        layers: LayerStack,
        fog: FogCellSet,
        fog_mode: FogMode,
        map_size: Option<MapSize>,
        camera: Camera,
    ) {
        self.selected_layer = layers.floor_id();
        self.history.reset(HistorySnapshot {
            tiles: tiles.clone(),
            camera,
        });
        self.tiles = tiles;
        self.layers = layers;
        self.fog = fog;
        self.fog_mode = fog_mode;
        self.map_size = map_size;
        self.camera = camera;
        self.dirty = false;
        self.redraw.request();
    }

    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn set_seed(&mut self, seed: impl Into<String>) {
        self.seed = seed.into();
        self.mark_dirty();
    }

    /// Variant selector for a brush on this map
    pub fn selector(&self, brush_key: &str) -> VariantSelector {
        VariantSelector::new(self.seed.as_str(), brush_key)
    }

    pub fn tiles(&self) -> &[PlacedTile] {
        &self.tiles
    }

    pub fn tile(&self, id: Uuid) -> Option<&PlacedTile> {
        self.tiles.iter().find(|t| t.id == id)
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn fog(&self) -> &FogCellSet {
        &self.fog
    }

    pub fn fog_mode(&self) -> FogMode {
        self.fog_mode
    }

    pub fn map_size(&self) -> Option<MapSize> {
        self.map_size
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Shared redraw flag; the render loop takes it once per frame
    pub fn redraw_handle(&self) -> Arc<FrameRequest> {
        Arc::clone(&self.redraw)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the unsaved flag, returning whether it was set
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
        self.redraw.request();
    }

    // ─── Notices ─────────────────────────────────────────────────────────────

    pub fn set_notice_duration(&mut self, duration: Duration) {
        self.notice_duration = duration;
    }

    pub fn notify(&mut self, message: impl Into<String>, now: Instant) {
        self.notice = Some(Notice {
            message: message.into(),
            expires_at: now + self.notice_duration,
        });
        self.redraw.request();
    }

    /// Current notice, if it has not expired
    pub fn notice(&self, now: Instant) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|n| now < n.expires_at)
            .map(|n| n.message.as_str())
    }

    // ─── Target layer ────────────────────────────────────────────────────────

    pub fn selected_layer(&self) -> Option<Uuid> {
        self.selected_layer
    }

    pub fn select_layer(&mut self, id: Option<Uuid>) {
        self.selected_layer = id.filter(|id| self.layers.get(*id).is_some());
    }

    /// Layer new tiles go to. A missing target posts the warning notice; a
    /// locked one is refused silently.
    pub fn target_layer(&mut self, is_light_source: bool, now: Instant) -> Result<Uuid, PlacementRefusal> {
        let result = resolve_target_layer(&self.layers, self.selected_layer, is_light_source);
        if let Err(refusal) = result {
            if let Some(message) = refusal.message() {
                self.notify(message, now);
            }
        }
        result
    }

    /// Paint order for the next tile placed on `layer`
    pub fn next_order(&self, layer: Uuid) -> i64 {
        self.tiles
            .iter()
            .filter(|t| self.layers.resolve_tile_layer(t) == Some(layer))
            .map(|t| t.order + 1)
            .max()
            .unwrap_or(0)
    }

    // ─── Staging and history ─────────────────────────────────────────────────

    /// Lay `incoming` over the committed tiles as stroke `stroke_id`.
    ///
    /// Recomputing the same stroke replaces it rather than adding to it, so
    /// previews can be restaged on every pointer move. Committed tiles on
    /// `clear_layers` under the new footprints are removed.
    pub fn stage_stroke(&mut self, stroke_id: Uuid, incoming: Vec<PlacedTile>, clear_layers: &[Uuid]) {
        let committed = &self.history.current().tiles;
        let cleared: HashSet<Uuid> = overlapping_tiles(&self.layers, committed, &incoming, clear_layers)
            .into_iter()
            .collect();
        let mut tiles: Vec<PlacedTile> = committed
            .iter()
            .filter(|t| t.stroke_id != Some(stroke_id) && !cleared.contains(&t.id))
            .cloned()
            .collect();
        tiles.extend(incoming);
        self.tiles = tiles;
        self.redraw.request();
    }

    /// Replace the working tiles wholesale (drag and erase gestures)
    pub fn stage_tiles(&mut self, tiles: Vec<PlacedTile>) {
        self.tiles = tiles;
        self.redraw.request();
    }

    pub fn has_staged_changes(&self) -> bool {
        self.tiles != self.history.current().tiles
    }

    /// Record the working state as one history step. Returns false when
    /// nothing changed.
    pub fn commit(&mut self, label: &str) -> bool {
        if !self.has_staged_changes() {
            return false;
        }
        self.history.commit(
            label,
            HistorySnapshot {
                tiles: self.tiles.clone(),
                camera: self.camera,
            },
        );
        debug!(map = %self.map_id, label, tiles = self.tiles.len(), "committed edit");
        self.mark_dirty();
        true
    }

    /// Drop staged changes and return to the last committed state
    pub fn cancel_staged(&mut self) {
        if self.has_staged_changes() {
            self.tiles = self.history.current().tiles.clone();
            self.redraw.request();
        }
    }

    pub fn undo(&mut self) -> bool {
        self.cancel_staged();
        let Some(snapshot) = self.history.undo().cloned() else {
            return false;
        };
        self.apply_snapshot(snapshot);
        true
    }

    pub fn redo(&mut self) -> bool {
        self.cancel_staged();
        let Some(snapshot) = self.history.redo().cloned() else {
            return false;
        };
        self.apply_snapshot(snapshot);
        true
    }

    fn apply_snapshot(&mut self, snapshot: HistorySnapshot) {
        self.tiles = snapshot.tiles;
        self.camera = snapshot.camera;
        self.mark_dirty();
    }

    // ─── Commands ────────────────────────────────────────────────────────────

    /// Place tiles as one stroke and commit
    pub fn place(&mut self, tiles: Vec<PlacedTile>, clear_layers: &[Uuid], label: &str) -> bool {
        let stroke_id = tiles
            .first()
            .and_then(|t| t.stroke_id)
            .unwrap_or_else(Uuid::new_v4);
        self.stage_stroke(stroke_id, tiles, clear_layers);
        self.commit(label)
    }

    /// Remove tiles by id and commit
    pub fn erase(&mut self, ids: &[Uuid], label: &str) -> bool {
        let doomed: HashSet<Uuid> = ids.iter().copied().collect();
        let tiles = self
            .tiles
            .iter()
            .filter(|t| !doomed.contains(&t.id))
            .cloned()
            .collect();
        self.stage_tiles(tiles);
        self.commit(label)
    }

    /// Swap in new versions of existing tiles (matched by id) and commit
    pub fn transform(&mut self, updated: Vec<PlacedTile>, label: &str) -> bool {
        if updated.is_empty() {
            return false;
        }
        let tiles = replace_by_id(&self.tiles, &updated);
        self.stage_tiles(tiles);
        self.commit(label)
    }

    // ─── Layers ──────────────────────────────────────────────────────────────

    /// Mutate the layer tree. Layers are not part of undo history.
    pub fn edit_layers<T>(
        &mut self,
        edit: impl FnOnce(&mut LayerStack) -> Result<T, LayerError>,
    ) -> Result<T, LayerError> {
        let result = edit(&mut self.layers);
        if result.is_ok() {
            self.mark_dirty();
        }
        result
    }

    pub fn move_layer(&mut self, id: Uuid, placement: NodePlacement) -> Result<(), LayerError> {
        self.edit_layers(|layers| layers.move_node(id, placement))
            .inspect_err(|err| debug!(node = %id, "rejected layer reorder: {err}"))
    }

    /// Delete a layer or group along with every tile on it.
    ///
    /// Layer edits are not undoable, so the tiles are purged from the whole
    /// history too; undo never brings back tiles without a layer.
    pub fn delete_layer(&mut self, id: Uuid) -> Result<(), LayerError> {
        self.cancel_staged();
        self.edit_layers(|layers| layers.delete(id))?;
        let layers = &self.layers;
        self.history
            .retain_tiles(|t| layers.resolve_tile_layer(t).is_some());
        self.tiles = self.history.current().tiles.clone();
        if self.selected_layer.is_some_and(|s| self.layers.get(s).is_none()) {
            self.selected_layer = self.layers.floor_id();
        }
        self.mark_dirty();
        Ok(())
    }

    // ─── Fog ─────────────────────────────────────────────────────────────────

    pub fn set_fog_mode(&mut self, mode: FogMode) {
        self.fog_mode = mode;
        self.mark_dirty();
    }

    /// Merge a rectangle into the fog using the current mode. Fog is saved
    /// but not part of undo history.
    pub fn apply_fog(&mut self, rect: CellRect) {
        self.fog.apply_rect(rect, self.fog_mode);
        self.mark_dirty();
    }

    // ─── Camera ──────────────────────────────────────────────────────────────

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
        self.redraw.request();
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.camera.pan_by(dx, dy);
        self.redraw.request();
    }

    pub fn zoom_about(&mut self, anchor: ScreenPos, factor: f64) {
        self.camera.zoom_about(anchor, factor);
        self.redraw.request();
    }

    /// Frame world origin in the middle of the viewport at zoom 1
    pub fn center_camera(&mut self, viewport: (u32, u32)) {
        self.set_camera(Camera::centered(viewport.0 as f64, viewport.1 as f64));
    }

    pub fn set_map_size(&mut self, size: Option<MapSize>) {
        self.map_size = size;
        self.mark_dirty();
    }

    /// Everything the renderer needs for one frame
    pub fn scene<'a>(
        &'a self,
        viewport: (u32, u32),
        overlays: &'a [Overlay],
        ghosts: &'a [PlacedTile],
    ) -> Scene<'a> {
        Scene {
            tiles: &self.tiles,
            layers: &self.layers,
            camera: &self.camera,
            fog: &self.fog,
            map_size: self.map_size,
            ghosts,
            overlays,
            viewport,
        }
    }
}

/// Copy of `tiles` with entries replaced by same-id entries from `updated`
pub(crate) fn replace_by_id(tiles: &[PlacedTile], updated: &[PlacedTile]) -> Vec<PlacedTile> {
    tiles
        .iter()
        .map(|t| {
            updated
                .iter()
                .find(|u| u.id == t.id)
                .unwrap_or(t)
                .clone()
        })
        .collect()
}
