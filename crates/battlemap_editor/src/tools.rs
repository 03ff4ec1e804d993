//! Pointer gestures for the editing tools
//!
//! Each gesture stages its result in the store on every pointer move and
//! commits exactly once when it completes, so one gesture is one undo step.
//! [`Tools::cancel`] drops whatever is staged.

use crate::selection::{box_select, hit_test, is_editable, marquee_cells, tiles_at_cell, PixelSource, SelectMode, Selection};
use crate::store::{replace_by_id, MapStore};
use crate::transform::nudge;
use battlemap_brush::{
    line_cells, place_polygon, place_polyline, place_rect, resolve_clear_set, ClearPolicy,
    FreehandStroke, RectMode, StrokeContext, VariantSelector,
};
use battlemap_core::coords::{center_and_span_to_top_left, snap_world_to_center};
use battlemap_core::{BrushDescriptor, CellPos, CellRect, PlacedTile, ScreenPos, WorldPos};
use battlemap_render::Overlay;
use std::collections::HashSet;
use std::time::Instant;
use uuid::Uuid;

/// Feet per cell for the measurement readout
pub const FEET_PER_CELL: u32 = 5;

/// Screen distance under which a marquee counts as a click
const CLICK_SLOP_PX: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    /// Freehand painting with the active brush
    Brush,
    Rect(RectMode),
    Polyline {
        closed: bool,
    },
    Erase {
        top_only: bool,
    },
    Fog,
    Measure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    /// Modifier that makes a click add to the selection
    pub fn additive(&self) -> bool {
        self.shift || self.ctrl
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub screen: ScreenPos,
    pub modifiers: Modifiers,
    pub now: Instant,
}

impl PointerEvent {
    pub fn new(screen: ScreenPos) -> Self {
        Self {
            screen,
            modifiers: Modifiers::default(),
            now: Instant::now(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Two-point measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub from: CellPos,
    pub to: CellPos,
}

impl Measurement {
    /// Distance in cells; diagonal steps count as one
    pub fn cells(&self) -> u32 {
        let dx = self.from.x.abs_diff(self.to.x);
        let dy = self.from.y.abs_diff(self.to.y);
        dx.max(dy)
    }

    pub fn feet(&self) -> u32 {
        self.cells() * FEET_PER_CELL
    }
}

/// What the borrowed editor state a gesture works against
pub struct ToolContext<'a> {
    pub store: &'a mut MapStore,
    pub selection: &'a mut Selection,
    pub pixels: &'a dyn PixelSource,
    pub alpha_threshold: u8,
    pub snap: bool,
}

/// Target, stroke and clear set fixed when a placement gesture starts
#[derive(Debug, Clone)]
struct Placement {
    layer: Uuid,
    stroke_id: Uuid,
    first_order: i64,
    clear: Vec<Uuid>,
}

impl Placement {
    fn begin(store: &mut MapStore, brush: &BrushDescriptor, policy: &ClearPolicy, now: Instant) -> Option<Self> {
        let layer = store.target_layer(brush.has_light_source(), now).ok()?;
        Some(Self {
            layer,
            stroke_id: Uuid::new_v4(),
            first_order: store.next_order(layer),
            clear: resolve_clear_set(store.layers(), layer, policy),
        })
    }

    fn context(&self) -> StrokeContext {
        StrokeContext::with_stroke_id(self.layer, self.stroke_id, self.first_order)
    }
}

#[derive(Debug, Default)]
enum Gesture {
    #[default]
    Idle,
    Freehand {
        stroke: FreehandStroke,
        clear: Vec<Uuid>,
    },
    Rect {
        placement: Placement,
        anchor: CellPos,
        current: CellPos,
    },
    Polyline {
        placement: Placement,
        points: Vec<CellPos>,
        cursor: Option<CellPos>,
    },
    Erase {
        last: CellPos,
        visited: HashSet<CellPos>,
    },
    Fog {
        anchor: CellPos,
        current: CellPos,
    },
    Measure(Measurement),
    Drag {
        origin: (f64, f64),
        offset: (f64, f64),
        originals: Vec<PlacedTile>,
    },
    Marquee {
        from: ScreenPos,
        to: ScreenPos,
        mode: SelectMode,
    },
}

/// Active tool, brush and in-progress gesture
#[derive(Debug, Default)]
pub struct Tools {
    tool: Tool,
    brush: Option<BrushDescriptor>,
    clear_policy: ClearPolicy,
    gesture: Gesture,
    hover: Option<WorldPos>,
}

impl Tools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Switch tools, dropping any unfinished gesture
    pub fn set_tool(&mut self, tool: Tool, store: &mut MapStore) {
        self.cancel(store);
        self.tool = tool;
    }

    pub fn brush(&self) -> Option<&BrushDescriptor> {
        self.brush.as_ref()
    }

    pub fn set_brush(&mut self, brush: Option<BrushDescriptor>) {
        self.brush = brush;
    }

    pub fn clear_policy(&self) -> &ClearPolicy {
        &self.clear_policy
    }

    pub fn set_clear_policy(&mut self, policy: ClearPolicy) {
        self.clear_policy = policy;
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.gesture, Gesture::Idle)
    }

    /// Live measurement, while the measure tool is dragging
    pub fn measurement(&self) -> Option<Measurement> {
        match self.gesture {
            Gesture::Measure(m) => Some(m),
            _ => None,
        }
    }

    pub fn pointer_down(&mut self, ctx: &mut ToolContext<'_>, event: PointerEvent) {
        let cell = ctx.store.camera().screen_to_cell(event.screen);
        match self.tool {
            Tool::Select => self.begin_select(ctx, event),
            Tool::Brush => {
                let Some(brush) = &self.brush else { return };
                let Some(placement) = Placement::begin(ctx.store, brush, &self.clear_policy, event.now) else {
                    return;
                };
                let mut stroke = FreehandStroke::new(placement.context());
                stroke.visit(brush, &ctx.store.selector(&brush.key), cell);
                ctx.store
                    .stage_stroke(stroke.stroke_id(), stroke.tiles().to_vec(), &placement.clear);
                self.gesture = Gesture::Freehand {
                    stroke,
                    clear: placement.clear,
                };
            }
            Tool::Rect(mode) => {
                let Some(brush) = &self.brush else { return };
                let Some(placement) = Placement::begin(ctx.store, brush, &self.clear_policy, event.now) else {
                    return;
                };
                stage_rect(ctx.store, brush, &placement, CellRect::from_corners(cell, cell), mode);
                self.gesture = Gesture::Rect {
                    placement,
                    anchor: cell,
                    current: cell,
                };
            }
            Tool::Polyline { closed } => {
                let Some(brush) = &self.brush else { return };
                if let Gesture::Polyline { placement, points, .. } = &mut self.gesture {
                    if points.last() != Some(&cell) {
                        points.push(cell);
                    }
                    stage_path(ctx.store, brush, placement, points, closed);
                    return;
                }
                let Some(placement) = Placement::begin(ctx.store, brush, &self.clear_policy, event.now) else {
                    return;
                };
                let points = vec![cell];
                stage_path(ctx.store, brush, &placement, &points, closed);
                self.gesture = Gesture::Polyline {
                    placement,
                    points,
                    cursor: None,
                };
            }
            Tool::Erase { top_only } => {
                let mut visited = HashSet::new();
                erase_cells(ctx.store, [cell], top_only, &mut visited);
                self.gesture = Gesture::Erase { last: cell, visited };
            }
            Tool::Fog => {
                self.gesture = Gesture::Fog {
                    anchor: cell,
                    current: cell,
                };
            }
            Tool::Measure => {
                self.gesture = Gesture::Measure(Measurement { from: cell, to: cell });
            }
        }
    }

    fn begin_select(&mut self, ctx: &mut ToolContext<'_>, event: PointerEvent) {
        let additive = event.modifiers.additive();
        let store = &*ctx.store;
        let hit = hit_test(
            store.tiles(),
            store.layers(),
            store.camera(),
            ctx.pixels,
            event.screen,
            ctx.alpha_threshold,
        );
        match hit {
            Some(id) if additive => ctx.selection.toggle(id),
            Some(id) => {
                if !ctx.selection.contains(id) {
                    ctx.selection.set([id]);
                }
                let originals = ctx
                    .selection
                    .tiles(store.tiles())
                    .into_iter()
                    .filter(|t| is_editable(store.layers(), t))
                    .cloned()
                    .collect();
                self.gesture = Gesture::Drag {
                    origin: store.camera().screen_to_world(event.screen).to_cell_space(),
                    offset: (0.0, 0.0),
                    originals,
                };
            }
            None => {
                self.gesture = Gesture::Marquee {
                    from: event.screen,
                    to: event.screen,
                    mode: if additive { SelectMode::Toggle } else { SelectMode::Replace },
                };
            }
        }
    }

    pub fn pointer_move(&mut self, ctx: &mut ToolContext<'_>, event: PointerEvent) {
        let camera = *ctx.store.camera();
        let cell = camera.screen_to_cell(event.screen);
        self.hover = Some(camera.screen_to_world(event.screen));

        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Freehand { stroke, clear } => {
                let Some(brush) = &self.brush else { return };
                if stroke.visit(brush, &ctx.store.selector(&brush.key), cell) > 0 {
                    ctx.store
                        .stage_stroke(stroke.stroke_id(), stroke.tiles().to_vec(), clear);
                }
            }
            Gesture::Rect { placement, anchor, current } => {
                let Some(brush) = &self.brush else { return };
                let Tool::Rect(mode) = self.tool else { return };
                if cell == *current {
                    return;
                }
                *current = cell;
                stage_rect(ctx.store, brush, placement, CellRect::from_corners(*anchor, cell), mode);
            }
            Gesture::Polyline { placement, points, cursor } => {
                let Some(brush) = &self.brush else { return };
                let Tool::Polyline { closed } = self.tool else { return };
                if *cursor == Some(cell) {
                    return;
                }
                *cursor = Some(cell);
                let mut preview = points.clone();
                if preview.last() != Some(&cell) {
                    preview.push(cell);
                }
                stage_path(ctx.store, brush, placement, &preview, closed);
            }
            Gesture::Erase { last, visited } => {
                let Tool::Erase { top_only } = self.tool else { return };
                if cell == *last {
                    return;
                }
                let cells = line_cells(*last, cell);
                *last = cell;
                erase_cells(ctx.store, cells, top_only, visited);
            }
            Gesture::Fog { current, .. } => *current = cell,
            Gesture::Measure(m) => m.to = cell,
            Gesture::Drag { origin, offset, originals } => {
                let (x, y) = camera.screen_to_world(event.screen).to_cell_space();
                let (mut dx, mut dy) = (x - origin.0, y - origin.1);
                if ctx.snap {
                    dx = dx.round();
                    dy = dy.round();
                }
                if (dx, dy) == *offset {
                    return;
                }
                *offset = (dx, dy);
                let moved: Vec<PlacedTile> = originals.iter().map(|t| nudge(t, dx, dy)).collect();
                let tiles = replace_by_id(&ctx.store.history().current().tiles, &moved);
                ctx.store.stage_tiles(tiles);
            }
            Gesture::Marquee { to, .. } => *to = event.screen,
        }
    }

    /// Finish the current gesture. Returns whether a history step was
    /// recorded. Polylines keep collecting points until
    /// [`Tools::finish_polyline`].
    pub fn pointer_up(&mut self, ctx: &mut ToolContext<'_>, event: PointerEvent) -> bool {
        if matches!(self.gesture, Gesture::Polyline { .. }) {
            return false;
        }
        self.pointer_move(ctx, event);
        match std::mem::take(&mut self.gesture) {
            Gesture::Idle | Gesture::Polyline { .. } | Gesture::Measure(_) => false,
            Gesture::Freehand { .. } => ctx.store.commit("Paint"),
            Gesture::Rect { .. } => {
                let label = match self.tool {
                    Tool::Rect(RectMode::Border) => "Border",
                    _ => "Rectangle",
                };
                ctx.store.commit(label)
            }
            Gesture::Erase { .. } => ctx.store.commit("Erase"),
            Gesture::Fog { anchor, current } => {
                ctx.store.apply_fog(CellRect::from_corners(anchor, current));
                false
            }
            Gesture::Drag { offset, .. } => {
                let committed = ctx.store.commit("Move");
                if committed {
                    ctx.selection.shift_pivot(offset.0, offset.1);
                }
                committed
            }
            Gesture::Marquee { from, to, mode } => {
                let store = &*ctx.store;
                if (to.x - from.x).hypot(to.y - from.y) < CLICK_SLOP_PX {
                    ctx.selection.click(None, mode == SelectMode::Toggle);
                } else {
                    let rect = marquee_cells(store.camera(), from, to);
                    ctx.selection
                        .apply_box(box_select(store.tiles(), store.layers(), rect), mode);
                }
                false
            }
        }
    }

    /// Commit the polyline collected so far
    pub fn finish_polyline(&mut self, store: &mut MapStore) -> bool {
        let Gesture::Polyline { placement, points, .. } = std::mem::take(&mut self.gesture) else {
            return false;
        };
        let (Some(brush), Tool::Polyline { closed }) = (&self.brush, self.tool) else {
            store.cancel_staged();
            return false;
        };
        stage_path(store, brush, &placement, &points, closed);
        store.commit(if closed { "Polygon" } else { "Polyline" })
    }

    /// Abort the current gesture without committing
    pub fn cancel(&mut self, store: &mut MapStore) {
        match std::mem::take(&mut self.gesture) {
            Gesture::Freehand { .. }
            | Gesture::Rect { .. }
            | Gesture::Polyline { .. }
            | Gesture::Erase { .. }
            | Gesture::Drag { .. } => store.cancel_staged(),
            Gesture::Idle | Gesture::Fog { .. } | Gesture::Measure(_) | Gesture::Marquee { .. } => {}
        }
    }

    /// Tool feedback for the renderer
    pub fn overlays(&self, store: &MapStore, selection: &Selection) -> Vec<Overlay> {
        let mut overlays: Vec<Overlay> = selection
            .tiles(store.tiles())
            .into_iter()
            .map(|t| Overlay::Highlight(t.bounds()))
            .collect();
        match &self.gesture {
            Gesture::Rect { anchor, current, .. } | Gesture::Fog { anchor, current } => {
                overlays.push(Overlay::RectPreview(CellRect::from_corners(*anchor, *current)));
            }
            Gesture::Polyline { points, cursor, .. } => overlays.push(Overlay::Polyline {
                points: points.clone(),
                cursor: *cursor,
            }),
            Gesture::Measure(m) => overlays.push(Overlay::Measurement { from: m.from, to: m.to }),
            Gesture::Marquee { from, to, .. } => overlays.push(Overlay::SelectionBox { from: *from, to: *to }),
            _ => {}
        }
        overlays
    }

    /// Translucent preview of the brush under the pointer
    pub fn ghosts(&self, store: &MapStore) -> Vec<PlacedTile> {
        let (Tool::Brush, Gesture::Idle, Some(world), Some(brush)) = (self.tool, &self.gesture, self.hover, &self.brush) else {
            return Vec::new();
        };
        let Some(asset) = brush.fill.first() else {
            return Vec::new();
        };
        let span = asset.footprint();
        let top_left = center_and_span_to_top_left(snap_world_to_center(world, span), span);
        let layer = store.selected_layer().unwrap_or_else(Uuid::nil);
        vec![PlacedTile::from_asset(asset, top_left, layer)]
    }
}

fn stage_rect(store: &mut MapStore, brush: &BrushDescriptor, placement: &Placement, rect: CellRect, mode: RectMode) {
    let selector = store.selector(&brush.key);
    let tiles = place_rect(brush, &selector, rect, mode, &mut placement.context());
    store.stage_stroke(placement.stroke_id, tiles, &placement.clear);
}

fn path_tiles(
    brush: &BrushDescriptor,
    selector: &VariantSelector,
    placement: &Placement,
    points: &[CellPos],
    closed: bool,
) -> Vec<PlacedTile> {
    let mut ctx = placement.context();
    if closed && points.len() >= 3 {
        place_polygon(brush, selector, points, &mut ctx)
    } else {
        place_polyline(brush, selector, points, true, &mut ctx)
    }
}

fn stage_path(store: &mut MapStore, brush: &BrushDescriptor, placement: &Placement, points: &[CellPos], closed: bool) {
    let selector = store.selector(&brush.key);
    let tiles = path_tiles(brush, &selector, placement, points, closed);
    store.stage_stroke(placement.stroke_id, tiles, &placement.clear);
}

/// Remove editable tiles under each cell not yet visited by this gesture
fn erase_cells(
    store: &mut MapStore,
    cells: impl IntoIterator<Item = CellPos>,
    top_only: bool,
    visited: &mut HashSet<CellPos>,
) {
    let mut doomed = HashSet::new();
    for cell in cells {
        if !visited.insert(cell) {
            continue;
        }
        let hits: Vec<Uuid> = tiles_at_cell(store.tiles(), store.layers(), cell)
            .into_iter()
            .filter(|id| !doomed.contains(id))
            .take(if top_only { 1 } else { usize::MAX })
            .collect();
        doomed.extend(hits);
    }
    if doomed.is_empty() {
        return;
    }
    let tiles = store
        .tiles()
        .iter()
        .filter(|t| !doomed.contains(&t.id))
        .cloned()
        .collect();
    store.stage_tiles(tiles);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{store, torch, two_variant_brush, FixedAlpha};
    use battlemap_brush::NO_TARGET_LAYER_MESSAGE;
    use battlemap_core::{CellCenter, FogMode, LayerRole, TileAsset};

    fn at(store: &MapStore, x: i32, y: i32) -> PointerEvent {
        let center = CellCenter::new(x as f64 + 0.5, y as f64 + 0.5).to_world();
        PointerEvent::new(store.camera().world_to_screen(center))
    }

    fn drag(tools: &mut Tools, store: &mut MapStore, selection: &mut Selection, path: &[(i32, i32)]) -> bool {
        let pixels = FixedAlpha::new();
        let mut ctx = ToolContext {
            store,
            selection,
            pixels: &pixels,
            alpha_threshold: 8,
            snap: true,
        };
        let (first, rest) = path.split_first().unwrap();
        let down = at(ctx.store, first.0, first.1);
        tools.pointer_down(&mut ctx, down);
        let mut last = down;
        for &(x, y) in rest {
            last = at(ctx.store, x, y);
            tools.pointer_move(&mut ctx, last);
        }
        tools.pointer_up(&mut ctx, last)
    }

    fn props_layer(store: &MapStore) -> Uuid {
        store.layers().nodes().iter().find(|n| n.name == "Props").unwrap().id
    }

    fn brush_tools(tool: Tool) -> Tools {
        let mut tools = Tools::new();
        tools.tool = tool;
        tools.set_brush(Some(two_variant_brush()));
        tools
    }

    #[test]
    fn test_freehand_fills_skipped_cells_once() {
        let mut store = store();
        let mut selection = Selection::new();
        let mut tools = brush_tools(Tool::Brush);

        assert!(drag(&mut tools, &mut store, &mut selection, &[(0, 0), (3, 0), (3, 0), (0, 0)]));
        assert_eq!(store.tiles().len(), 4);
        assert_eq!(store.history().len(), 2);
        assert!(tools.is_idle());
    }

    #[test]
    fn test_rect_fill_and_cancel() {
        let mut store = store();
        let mut selection = Selection::new();
        let mut tools = brush_tools(Tool::Rect(RectMode::Fill));
        let pixels = FixedAlpha::new();
        let mut ctx = ToolContext {
            store: &mut store,
            selection: &mut selection,
            pixels: &pixels,
            alpha_threshold: 8,
            snap: true,
        };

        let down = at(ctx.store, 0, 0);
        tools.pointer_down(&mut ctx, down);
        let corner = at(ctx.store, 2, 2);
        tools.pointer_move(&mut ctx, corner);
        assert_eq!(ctx.store.tiles().len(), 9);
        let overlays = tools.overlays(ctx.store, ctx.selection);
        assert!(matches!(overlays.as_slice(), [Overlay::RectPreview(_)]));

        tools.cancel(ctx.store);
        assert!(ctx.store.tiles().is_empty());
        assert!(!ctx.store.history().can_undo());
    }

    #[test]
    fn test_border_commits_one_step() {
        let mut store = store();
        let mut selection = Selection::new();
        let mut tools = brush_tools(Tool::Rect(RectMode::Border));
        assert!(drag(&mut tools, &mut store, &mut selection, &[(0, 0), (3, 3)]));
        assert_eq!(store.tiles().len(), 12);
        assert_eq!(store.history().undo_description(), Some("Border"));
    }

    #[test]
    fn test_no_target_layer_warns() {
        let mut store = store();
        let grid = store.layers().role_layer(LayerRole::Grid).unwrap().id;
        store.select_layer(Some(grid));
        let mut selection = Selection::new();
        let mut tools = brush_tools(Tool::Brush);

        assert!(!drag(&mut tools, &mut store, &mut selection, &[(0, 0), (1, 0)]));
        assert!(store.tiles().is_empty());
        assert_eq!(store.notice(Instant::now()), Some(NO_TARGET_LAYER_MESSAGE));
    }

    #[test]
    fn test_locked_layer_is_silent() {
        let mut store = store();
        let floor = store.layers().floor_id().unwrap();
        store.edit_layers(|l| l.toggle_locked(floor)).unwrap();
        let mut selection = Selection::new();
        let mut tools = brush_tools(Tool::Brush);

        assert!(!drag(&mut tools, &mut store, &mut selection, &[(0, 0)]));
        assert!(store.tiles().is_empty());
        assert_eq!(store.notice(Instant::now()), None);
    }

    #[test]
    fn test_light_source_goes_to_lighting_layer() {
        let mut store = store();
        let grid = store.layers().role_layer(LayerRole::Grid).unwrap().id;
        let lighting = store.layers().role_layer(LayerRole::Lighting).unwrap().id;
        store.select_layer(Some(grid));
        let mut selection = Selection::new();
        let mut tools = Tools::new();
        tools.tool = Tool::Brush;
        tools.set_brush(Some(BrushDescriptor::single(torch())));

        assert!(drag(&mut tools, &mut store, &mut selection, &[(2, 2)]));
        let tile = &store.tiles()[0];
        assert_eq!(tile.layer_id, Some(lighting));
        assert!(tile.light.is_some());
    }

    #[test]
    fn test_floor_paint_clears_floor_only() {
        let mut store = store();
        let props = props_layer(&store);
        let floor = store.layers().floor_id().unwrap();
        let old_floor = PlacedTile::new("old.png", CellPos::new(1, 1), floor);
        let prop = PlacedTile::new("barrel.png", CellPos::new(1, 1), props);
        store.place(vec![old_floor.clone(), prop.clone()], &[], "Setup");

        let mut selection = Selection::new();
        let mut tools = brush_tools(Tool::Rect(RectMode::Fill));
        drag(&mut tools, &mut store, &mut selection, &[(0, 0), (2, 2)]);

        assert!(store.tile(old_floor.id).is_none());
        assert!(store.tile(prop.id).is_some());
        assert_eq!(store.tiles().len(), 10);
    }

    #[test]
    fn test_erase_top_only() {
        let mut store = store();
        let floor = store.layers().floor_id().unwrap();
        let floor_tile = PlacedTile::new("stone.png", CellPos::new(0, 0), floor);
        let prop = PlacedTile::new("barrel.png", CellPos::new(0, 0), props_layer(&store));
        store.place(vec![floor_tile.clone(), prop.clone()], &[], "Setup");

        let mut selection = Selection::new();
        let mut tools = Tools::new();
        tools.tool = Tool::Erase { top_only: true };
        assert!(drag(&mut tools, &mut store, &mut selection, &[(0, 0)]));
        assert!(store.tile(prop.id).is_none());
        assert!(store.tile(floor_tile.id).is_some());
    }

    #[test]
    fn test_measurement_clears_on_release() {
        let mut store = store();
        let mut selection = Selection::new();
        let pixels = FixedAlpha::new();
        let mut tools = Tools::new();
        tools.tool = Tool::Measure;
        let mut ctx = ToolContext {
            store: &mut store,
            selection: &mut selection,
            pixels: &pixels,
            alpha_threshold: 8,
            snap: true,
        };

        let down = at(ctx.store, 0, 0);
        tools.pointer_down(&mut ctx, down);
        let to = at(ctx.store, 3, 4);
        tools.pointer_move(&mut ctx, to);
        let m = tools.measurement().unwrap();
        assert_eq!((m.cells(), m.feet()), (4, 20));

        tools.pointer_up(&mut ctx, to);
        assert_eq!(tools.measurement(), None);
    }

    #[test]
    fn test_fog_drag_skips_history() {
        let mut store = store();
        store.set_fog_mode(FogMode::Add);
        let mut selection = Selection::new();
        let mut tools = Tools::new();
        tools.tool = Tool::Fog;
        drag(&mut tools, &mut store, &mut selection, &[(0, 0), (1, 1)]);
        assert_eq!(store.fog().len(), 4);
        assert!(!store.history().can_undo());
    }

    #[test]
    fn test_drag_moves_selection_in_whole_cells() {
        let mut store = store();
        let floor = store.layers().floor_id().unwrap();
        let stone = PlacedTile::new("stone.png", CellPos::new(0, 0), floor);
        store.place(vec![stone.clone()], &[], "Setup");

        let mut selection = Selection::new();
        let mut tools = Tools::new();
        assert!(drag(&mut tools, &mut store, &mut selection, &[(0, 0), (2, 1)]));
        assert!(selection.contains(stone.id));
        assert_eq!(store.tile(stone.id).unwrap().top_left(), CellPos::new(2, 1));

        store.undo();
        assert_eq!(store.tile(stone.id).unwrap().top_left(), CellPos::new(0, 0));
    }

    #[test]
    fn test_marquee_and_empty_click() {
        let mut store = store();
        let floor = store.layers().floor_id().unwrap();
        let near = PlacedTile::new("stone.png", CellPos::new(0, 0), floor);
        let far = PlacedTile::new("stone.png", CellPos::new(5, 5), floor);
        store.place(vec![near.clone(), far], &[], "Setup");

        let mut selection = Selection::new();
        let mut tools = Tools::new();
        drag(&mut tools, &mut store, &mut selection, &[(-2, -2), (1, 1)]);
        assert_eq!(selection.ids(), &[near.id]);

        drag(&mut tools, &mut store, &mut selection, &[(-3, -3)]);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_polyline_waits_for_finish() {
        let mut store = store();
        let mut selection = Selection::new();
        let mut tools = brush_tools(Tool::Polyline { closed: false });

        assert!(!drag(&mut tools, &mut store, &mut selection, &[(0, 0)]));
        assert!(!drag(&mut tools, &mut store, &mut selection, &[(3, 0)]));
        assert!(!store.history().can_undo());
        assert!(tools.finish_polyline(&mut store));
        assert_eq!(store.tiles().len(), 4);

        drag(&mut tools, &mut store, &mut selection, &[(0, 5)]);
        tools.cancel(&mut store);
        assert_eq!(store.tiles().len(), 4);
    }

    #[test]
    fn test_ghost_follows_snapped_pointer() {
        let mut store = store();
        let mut selection = Selection::new();
        let pixels = FixedAlpha::new();
        let mut tools = Tools::new();
        tools.tool = Tool::Brush;
        tools.set_brush(Some(BrushDescriptor::single(TileAsset::new("props/table_2x1.png"))));
        let mut ctx = ToolContext {
            store: &mut store,
            selection: &mut selection,
            pixels: &pixels,
            alpha_threshold: 8,
            snap: true,
        };
        let hover = at(ctx.store, 4, 4);
        tools.pointer_move(&mut ctx, hover);
        let ghosts = tools.ghosts(&store);
        assert_eq!(ghosts.len(), 1);
        assert_eq!(ghosts[0].bounds().width(), 2);
        assert!(ghosts[0].covers(CellPos::new(4, 4)));
    }
}
