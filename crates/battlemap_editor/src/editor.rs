//! The editor facade: one map's store plus tools, selection, input,
//! rendering and autosave

use crate::config::EditorConfig;
use crate::dnd::{drop_ghost, drop_tile, read_payload, AssetCatalog, DataTransfer, DragRelay};
use crate::input::{Action, InputController, KeyEvent};
use crate::persistence::{open_map, Autosave, MapStorage};
use crate::selection::{is_editable, Selection};
use crate::store::MapStore;
use crate::tools::{Measurement, PointerEvent, Tool, ToolContext, Tools};
use crate::transform::{self, MirrorAxis, Turn};
use battlemap_core::{BrushDescriptor, PlacedTile, ScreenPos};
use battlemap_render::{ImageCache, ImageSource, PrefetchOutcome, RenderOutcome, Renderer};
use image::RgbaImage;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

pub struct Editor {
    config: EditorConfig,
    store: MapStore,
    selection: Selection,
    tools: Tools,
    input: InputController,
    renderer: Renderer,
    images: ImageCache,
    image_source: Box<dyn ImageSource>,
    storage: Box<dyn MapStorage + Send + Sync>,
    autosave: Autosave,
    catalog: AssetCatalog,
    relay: DragRelay,
    drop_preview: Option<PlacedTile>,
    viewport: (u32, u32),
    snap: bool,
}

impl Editor {
    /// Open `map_id` from `storage` and attach keyboard input
    pub fn new(
        config: EditorConfig,
        storage: Box<dyn MapStorage + Send + Sync>,
        image_source: Box<dyn ImageSource>,
        map_id: &str,
        viewport: (u32, u32),
    ) -> Self {
        let mut input = InputController::new(&config.keybindings);
        input.attach();
        let mut editor = Self {
            store: MapStore::new(map_id, config.default_seed.as_str()),
            selection: Selection::new(),
            tools: Tools::new(),
            input,
            renderer: Renderer::new(config.render.clone()),
            images: ImageCache::new(),
            image_source,
            storage,
            autosave: Autosave::new(config.autosave_debounce()),
            catalog: AssetCatalog::new(),
            relay: DragRelay::default(),
            drop_preview: None,
            viewport,
            snap: config.snap_to_grid,
            config,
        };
        editor.load(map_id);
        editor
    }

    fn load(&mut self, map_id: &str) {
        let mut store = MapStore::new(map_id, self.config.default_seed.as_str());
        store.set_notice_duration(self.config.notice_duration());
        open_map(&mut store, self.storage.as_ref(), self.viewport, &self.config.default_seed);
        info!(map = %map_id, tiles = store.tiles().len(), "opened map");
        self.store = store;
        self.selection.clear();
        self.drop_preview = None;
    }

    /// Save the current map if needed and switch to another
    pub fn open(&mut self, map_id: &str) {
        self.tools.cancel(&mut self.store);
        if let Err(err) = self.autosave.flush(&mut self.store, self.storage.as_mut()) {
            warn!(map = %self.store.map_id(), "Failed to save before switching maps: {err}");
        }
        self.load(map_id);
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &MapStore {
        &self.store
    }

    /// Direct access for layer panels and other external views
    pub fn store_mut(&mut self) -> &mut MapStore {
        &mut self.store
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn tools(&self) -> &Tools {
        &self.tools
    }

    pub fn input_mut(&mut self) -> &mut InputController {
        &mut self.input
    }

    pub fn images_mut(&mut self) -> &mut ImageCache {
        &mut self.images
    }

    pub fn catalog_mut(&mut self) -> &mut AssetCatalog {
        &mut self.catalog
    }

    pub fn relay_mut(&mut self) -> &mut DragRelay {
        &mut self.relay
    }

    pub fn snap(&self) -> bool {
        self.snap
    }

    pub fn set_viewport(&mut self, viewport: (u32, u32)) {
        self.viewport = viewport;
        self.request_redraw();
    }

    fn request_redraw(&self) {
        self.store.redraw_handle().request();
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tools.set_tool(tool, &mut self.store);
        self.request_redraw();
    }

    /// Make `brush` active; its assets become known for drops too
    pub fn set_brush(&mut self, brush: Option<BrushDescriptor>) {
        if let Some(brush) = &brush {
            self.catalog.extend(brush.fill.iter().cloned());
        }
        self.tools.set_brush(brush);
    }

    pub fn measurement(&self) -> Option<Measurement> {
        self.tools.measurement()
    }

    /// Transient notice to show, if any
    pub fn notice(&self, now: Instant) -> Option<&str> {
        self.store.notice(now)
    }

    // ─── Pointer ─────────────────────────────────────────────────────────────

    fn with_tools<T>(&mut self, f: impl FnOnce(&mut Tools, &mut ToolContext<'_>) -> T) -> T {
        let mut ctx = ToolContext {
            store: &mut self.store,
            selection: &mut self.selection,
            pixels: &self.images,
            alpha_threshold: self.config.alpha_threshold,
            snap: self.snap,
        };
        let result = f(&mut self.tools, &mut ctx);
        self.store.redraw_handle().request();
        result
    }

    pub fn pointer_down(&mut self, event: PointerEvent) {
        self.with_tools(|tools, ctx| tools.pointer_down(ctx, event));
    }

    pub fn pointer_move(&mut self, event: PointerEvent) {
        self.with_tools(|tools, ctx| tools.pointer_move(ctx, event));
    }

    pub fn pointer_up(&mut self, event: PointerEvent) -> bool {
        let committed = self.with_tools(|tools, ctx| tools.pointer_up(ctx, event));
        self.selection.retain_existing(self.store.tiles());
        committed
    }

    /// Wheel zoom about the pointer
    pub fn zoom(&mut self, anchor: ScreenPos, factor: f64) {
        self.store.zoom_about(anchor, factor);
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.store.pan_by(dx, dy);
    }

    pub fn recenter(&mut self) {
        self.store.center_camera(self.viewport);
    }

    // ─── Keyboard ────────────────────────────────────────────────────────────

    /// Handle a key press; returns the action it triggered
    pub fn key_down(&mut self, event: &KeyEvent) -> Option<Action> {
        let action = self.input.handle_key(event)?;
        self.perform(action);
        Some(action)
    }

    pub fn perform(&mut self, action: Action) {
        match action {
            Action::Undo => self.undo(),
            Action::Redo => self.redo(),
            Action::RotateClockwise => {
                self.rotate_selection(Turn::Clockwise);
            }
            Action::RotateCounterClockwise => {
                self.rotate_selection(Turn::CounterClockwise);
            }
            Action::MirrorHorizontal => {
                self.mirror_selection(MirrorAxis::Horizontal);
            }
            Action::MirrorVertical => {
                self.mirror_selection(MirrorAxis::Vertical);
            }
            Action::NudgeUp => {
                self.nudge_selection(0.0, -1.0);
            }
            Action::NudgeDown => {
                self.nudge_selection(0.0, 1.0);
            }
            Action::NudgeLeft => {
                self.nudge_selection(-1.0, 0.0);
            }
            Action::NudgeRight => {
                self.nudge_selection(1.0, 0.0);
            }
            Action::Delete => {
                self.delete_selection();
            }
            Action::Duplicate => {
                self.duplicate_selection();
            }
            Action::Cancel => {
                if self.tools.is_idle() {
                    self.selection.clear();
                } else {
                    self.tools.cancel(&mut self.store);
                }
            }
            Action::ToggleSnap => self.snap = !self.snap,
            Action::FinishPolyline => {
                self.tools.finish_polyline(&mut self.store);
            }
        }
        self.request_redraw();
    }

    /// Step back one edit. Restored tiles may sit elsewhere, so the cached
    /// pivot is recomputed on the next transform.
    pub fn undo(&mut self) {
        self.tools.cancel(&mut self.store);
        if self.store.undo() {
            self.selection.retain_existing(self.store.tiles());
            self.selection.reset_pivot();
        }
    }

    pub fn redo(&mut self) {
        self.tools.cancel(&mut self.store);
        if self.store.redo() {
            self.selection.retain_existing(self.store.tiles());
            self.selection.reset_pivot();
        }
    }

    // ─── Selection commands ──────────────────────────────────────────────────

    pub fn rotate_selection(&mut self, turn: Turn) -> bool {
        self.tools.cancel(&mut self.store);
        let Some(pivot) = self.selection.pivot(self.store.tiles()) else {
            return false;
        };
        let updated = transform::rotate_selection(
            self.store.tiles(),
            self.store.layers(),
            self.selection.ids(),
            pivot,
            turn,
            self.snap,
        );
        self.store.transform(updated, "Rotate")
    }

    pub fn mirror_selection(&mut self, axis: MirrorAxis) -> bool {
        self.tools.cancel(&mut self.store);
        let Some(pivot) = self.selection.pivot(self.store.tiles()) else {
            return false;
        };
        let updated = transform::mirror_selection(
            self.store.tiles(),
            self.store.layers(),
            self.selection.ids(),
            pivot,
            axis,
        );
        self.store.transform(updated, "Mirror")
    }

    pub fn nudge_selection(&mut self, dx: f64, dy: f64) -> bool {
        self.tools.cancel(&mut self.store);
        let updated = transform::nudge_selection(
            self.store.tiles(),
            self.store.layers(),
            self.selection.ids(),
            dx,
            dy,
        );
        let moved = self.store.transform(updated, "Nudge");
        if moved {
            self.selection.shift_pivot(dx, dy);
        }
        moved
    }

    /// Remove the selected tiles that are not on locked or hidden layers
    pub fn delete_selection(&mut self) -> bool {
        self.tools.cancel(&mut self.store);
        let doomed: Vec<Uuid> = self
            .selection
            .tiles(self.store.tiles())
            .into_iter()
            .filter(|t| is_editable(self.store.layers(), t))
            .map(|t| t.id)
            .collect();
        let erased = self.store.erase(&doomed, "Delete");
        self.selection.retain_existing(self.store.tiles());
        erased
    }

    /// Copy the selection one cell down-right and select the copies
    pub fn duplicate_selection(&mut self) -> bool {
        self.tools.cancel(&mut self.store);
        let copies = transform::duplicate_selection(self.store.tiles(), self.store.layers(), self.selection.ids());
        let ids: Vec<Uuid> = copies.iter().map(|t| t.id).collect();
        if copies.is_empty() || !self.store.place(copies, &[], "Duplicate") {
            return false;
        }
        self.selection.set(ids);
        true
    }

    // ─── Drag and drop ───────────────────────────────────────────────────────

    /// Update the drop preview while an asset is dragged over the map
    pub fn drag_over(&mut self, transfer: &dyn DataTransfer, screen: ScreenPos) {
        self.drop_preview = read_payload(transfer, &self.relay).map(|payload| {
            let asset = self.catalog.resolve(&payload.src);
            drop_ghost(&self.store, &asset, screen)
        });
        self.request_redraw();
    }

    pub fn drag_leave(&mut self) {
        self.drop_preview = None;
        self.request_redraw();
    }

    /// Place the dragged asset and select it
    pub fn drop(&mut self, transfer: &dyn DataTransfer, screen: ScreenPos, now: Instant) -> Option<Uuid> {
        self.drop_preview = None;
        let payload = read_payload(transfer, &self.relay);
        self.relay.clear();
        let asset = self.catalog.resolve(&payload?.src);
        let id = drop_tile(&mut self.store, &asset, screen, self.tools.clear_policy(), now)?;
        self.selection.set([id]);
        Some(id)
    }

    // ─── Frame loop ──────────────────────────────────────────────────────────

    /// Autosave poll; call once per frame
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.autosave.tick(now, &mut self.store, self.storage.as_mut()) {
            Ok(saved) => saved,
            Err(err) => {
                warn!(map = %self.store.map_id(), "Autosave failed: {err}");
                false
            }
        }
    }

    /// Save now if anything is unsaved
    pub fn flush(&mut self) -> bool {
        match self.autosave.flush(&mut self.store, self.storage.as_mut()) {
            Ok(saved) => saved,
            Err(err) => {
                warn!(map = %self.store.map_id(), "Save failed: {err}");
                false
            }
        }
    }

    /// Draw a frame if one was requested since the last call
    pub fn render_frame(&mut self) -> Option<RgbaImage> {
        if !self.store.redraw_handle().take() {
            return None;
        }
        let overlays = self.tools.overlays(&self.store, &self.selection);
        let mut ghosts = self.tools.ghosts(&self.store);
        ghosts.extend(self.drop_preview.clone());
        let scene = self.store.scene(self.viewport, &overlays, &ghosts);

        let token = self.renderer.begin_frame();
        let srcs = self.renderer.required_images(&scene);
        if let PrefetchOutcome::Superseded = self.images.prefetch(srcs, self.image_source.as_ref(), &token) {
            self.store.redraw_handle().request();
            return None;
        }
        match self.renderer.render(&scene, &self.images, &token) {
            RenderOutcome::Complete(frame) => Some(frame),
            RenderOutcome::Superseded => {
                self.store.redraw_handle().request();
                None
            }
        }
    }
}
