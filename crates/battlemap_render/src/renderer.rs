//! Frame composition
//!
//! Pass order, bottom to top:
//! 1. clear color
//! 2. background texture (when the background layer is visible)
//! 3. tile layers: shadow, tiles, outline, tint and shade
//! 4. grid lines
//! 5. tool previews
//! 6. tokens
//! 7. measurement
//! 8. lighting and darkness
//! 9. fog of war
//!
//! Everything outside a finite map is then painted over.

use crate::effects::{
    composite_fill, composite_multiply, composite_shade, outline_ring, shadow_ring, AlphaMask,
};
use crate::generation::{FrameToken, RenderGeneration};
use crate::images::ImageCache;
use crate::lighting::{composite_darkness, LightMap, LightSource, Occluders};
use crate::overlay::{
    cell_rect_to_screen, clip_to_bounds, draw_fog, draw_grid, draw_measurements, draw_previews,
    visible_cells, Overlay,
};
use crate::raster::{draw_image, TileTransform};
use crate::settings::RenderSettings;
use crate::surface::{SurfacePool, SurfacePurpose};
use battlemap_core::{
    Camera, CellRect, EffectOpacity, FogCellSet, LayerEffects, LayerRole, LayerStack, MapSize,
    PlacedTile, ScreenPos,
};
use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Everything a frame is drawn from
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub tiles: &'a [PlacedTile],
    pub layers: &'a LayerStack,
    pub camera: &'a Camera,
    pub fog: &'a FogCellSet,
    pub map_size: Option<MapSize>,
    /// Uncommitted placement preview
    pub ghosts: &'a [PlacedTile],
    pub overlays: &'a [Overlay],
    pub viewport: (u32, u32),
}

#[derive(Debug)]
pub enum RenderOutcome {
    Complete(RgbaImage),
    /// A newer frame started while this one was drawing
    Superseded,
}

impl RenderOutcome {
    pub fn into_image(self) -> Option<RgbaImage> {
        match self {
            RenderOutcome::Complete(image) => Some(image),
            RenderOutcome::Superseded => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Renderer {
    settings: RenderSettings,
    pool: SurfacePool,
    generation: RenderGeneration,
    last_viewport: (u32, u32),
}

/// Tiles grouped per concrete layer, each group in paint order
fn tiles_by_layer<'a>(tiles: &'a [PlacedTile], layers: &LayerStack) -> HashMap<Uuid, Vec<&'a PlacedTile>> {
    let mut groups: HashMap<Uuid, Vec<&PlacedTile>> = HashMap::new();
    for tile in tiles {
        if let Some(layer) = layers.resolve_tile_layer(tile) {
            groups.entry(layer).or_default().push(tile);
        }
    }
    for group in groups.values_mut() {
        group.sort_by_key(|t| t.order);
    }
    groups
}

fn draw_tile(dst: &mut RgbaImage, tile: &PlacedTile, camera: &Camera, images: &ImageCache, opacity: f32) {
    let transform = TileTransform::for_tile(tile, camera);
    if !transform.is_on_surface(dst.width(), dst.height()) {
        return;
    }
    if let Some(image) = images.image(&tile.src) {
        draw_image(dst, &image, &transform, opacity);
    }
}

impl Renderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: RenderSettings) {
        self.settings = settings;
    }

    /// Counter shared with async work belonging to this renderer's frames
    pub fn generation(&self) -> &RenderGeneration {
        &self.generation
    }

    /// Start a new frame, superseding any frame still in flight
    pub fn begin_frame(&self) -> FrameToken {
        self.generation.begin()
    }

    /// Image sources a scene needs, for prefetching
    pub fn required_images<'a>(&'a self, scene: &Scene<'a>) -> Vec<&'a str> {
        let mut srcs: Vec<&str> = scene
            .tiles
            .iter()
            .chain(scene.ghosts.iter())
            .map(|t| t.src.as_str())
            .collect();
        if let Some(texture) = &self.settings.background_texture {
            srcs.push(texture.as_str());
        }
        srcs.sort_unstable();
        srcs.dedup();
        srcs
    }

    /// Draw a frame. Returns [`RenderOutcome::Superseded`] as soon as
    /// `token` is no longer the current generation.
    pub fn render(&mut self, scene: &Scene<'_>, images: &ImageCache, token: &FrameToken) -> RenderOutcome {
        let (width, height) = scene.viewport;
        if self.last_viewport != (width, height) {
            self.pool.retain_size(width, height);
            self.last_viewport = (width, height);
        }

        let mut frame = RgbaImage::from_pixel(width, height, Rgba(self.settings.clear_color));
        if width == 0 || height == 0 {
            return RenderOutcome::Complete(frame);
        }
        let camera = scene.camera;
        let layers = scene.layers;
        let bounds = scene.map_size.map(|m| m.bounds());
        let role_visible = |role: LayerRole| {
            layers
                .role_layer(role)
                .is_some_and(|node| layers.is_visible(node.id))
        };
        let by_layer = tiles_by_layer(scene.tiles, layers);

        if role_visible(LayerRole::Background) {
            self.draw_background_texture(&mut frame, camera, images, bounds);
        }

        for node in layers.paint_order() {
            let Some(role) = node.role() else {
                continue;
            };
            if role.is_overlay() || !layers.is_visible(node.id) {
                continue;
            }
            let Some(tiles) = by_layer.get(&node.id) else {
                continue;
            };
            let effects = node.effects().copied().unwrap_or_default();
            draw_layer(
                &mut frame,
                &mut self.pool,
                &self.settings,
                tiles,
                &effects,
                layers.opacity(node.id),
                camera,
                images,
            );
            if !token.is_current() {
                debug!(generation = token.generation(), layer = %node.name, "render superseded");
                return RenderOutcome::Superseded;
            }
        }

        if role_visible(LayerRole::Grid) {
            draw_grid(&mut frame, camera, bounds, &self.settings);
        }

        for ghost in scene.ghosts {
            draw_tile(&mut frame, ghost, camera, images, self.settings.ghost_opacity);
        }
        draw_previews(&mut frame, camera, scene.overlays, &self.settings);

        if let Some(tokens) = layers.role_layer(LayerRole::Tokens) {
            if layers.is_visible(tokens.id) {
                for tile in by_layer.get(&tokens.id).into_iter().flatten() {
                    draw_tile(&mut frame, tile, camera, images, 1.0);
                }
            }
        }

        draw_measurements(&mut frame, camera, scene.overlays, &self.settings);

        self.draw_lighting(&mut frame, scene, &by_layer);
        if !token.is_current() {
            debug!(generation = token.generation(), "render superseded after lighting");
            return RenderOutcome::Superseded;
        }

        if role_visible(LayerRole::Fog) {
            draw_fog(&mut frame, camera, scene.fog, bounds, &self.settings);
        }

        if let Some(bounds) = bounds {
            clip_to_bounds(&mut frame, camera, bounds, self.settings.out_of_bounds_color);
        }
        RenderOutcome::Complete(frame)
    }

    fn draw_background_texture(
        &self,
        frame: &mut RgbaImage,
        camera: &Camera,
        images: &ImageCache,
        bounds: Option<CellRect>,
    ) {
        let Some(src) = &self.settings.background_texture else {
            return;
        };
        let Some(texture) = images.image(src) else {
            return;
        };
        let mut cells = visible_cells(camera, frame.width(), frame.height());
        if let Some(b) = bounds {
            if !b.intersects(&cells) {
                return;
            }
            cells.min.x = cells.min.x.max(b.min.x);
            cells.min.y = cells.min.y.max(b.min.y);
            cells.max.x = cells.max.x.min(b.max.x);
            cells.max.y = cells.max.y.min(b.max.y);
        }
        let size = camera.cell_pixels();
        for cell in cells.cells() {
            let (min, max) = cell_rect_to_screen(&CellRect::from_corners(cell, cell), camera);
            let transform = TileTransform {
                center: ScreenPos::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0),
                width: size,
                height: size,
                angle: 0.0,
                mirror_x: false,
                mirror_y: false,
            };
            draw_image(frame, &texture, &transform, 1.0);
        }
    }

    /// Light sources are the lighting layer's tiles that carry a light;
    /// occluders are light-blocking tiles on every other visible layer
    fn draw_lighting(&self, frame: &mut RgbaImage, scene: &Scene<'_>, by_layer: &HashMap<Uuid, Vec<&PlacedTile>>) {
        let layers = scene.layers;
        let Some(lighting) = layers.role_layer(LayerRole::Lighting) else {
            return;
        };
        if !layers.is_visible(lighting.id) {
            return;
        }
        let effects = lighting.effects().copied().unwrap_or_default();
        let lights: Vec<LightSource> = by_layer
            .get(&lighting.id)
            .into_iter()
            .flatten()
            .filter_map(|tile| {
                let light = tile.light?;
                Some(LightSource {
                    center: tile.center(),
                    radius: effects.light_radius as f64,
                    color: light.color,
                    intensity: effects.light_intensity * light.intensity,
                })
            })
            .collect();
        if lights.is_empty() {
            return;
        }

        let occluders = Occluders::from_tiles(
            by_layer
                .iter()
                .filter(|(id, _)| **id != lighting.id && layers.is_visible(**id))
                .flat_map(|(_, tiles)| tiles.iter().copied()),
        );
        let map = LightMap::build(
            frame.width(),
            frame.height(),
            scene.camera,
            &lights,
            &occluders,
            self.settings.light_rays,
        );
        composite_darkness(frame, &map, self.settings.darkness_opacity);
    }
}

/// One tile layer with its effects. The alpha mask is drawn with the same
/// transforms as the tiles so effects line up exactly.
fn draw_layer(
    frame: &mut RgbaImage,
    pool: &mut SurfacePool,
    settings: &RenderSettings,
    tiles: &[&PlacedTile],
    effects: &LayerEffects,
    opacity: EffectOpacity,
    camera: &Camera,
    images: &ImageCache,
) {
    let needs_mask = effects.has_shadow || effects.has_outline || effects.has_tint();
    let mask = if needs_mask {
        let surface = pool.acquire(SurfacePurpose::LayerMask, frame.width(), frame.height());
        for tile in tiles {
            draw_tile(surface, tile, camera, images, 1.0);
        }
        Some(AlphaMask::from_image_alpha(surface))
    } else {
        None
    };

    if let Some(mask) = mask.as_ref().filter(|_| effects.has_shadow) {
        let distance_px = effects.shadow_distance * camera.cell_pixels() as f32;
        if let Some(ring) = shadow_ring(mask, distance_px) {
            composite_multiply(frame, &ring, settings.shadow_color, opacity.shadow);
        }
    }

    for tile in tiles {
        draw_tile(frame, tile, camera, images, 1.0);
    }

    let Some(mask) = mask else {
        return;
    };
    if effects.has_outline {
        let width_px = effects.outline_width * camera.zoom as f32;
        if let Some(ring) = outline_ring(&mask, width_px) {
            composite_fill(frame, &ring, settings.outline_color);
        }
    }
    // Shade replaces the solid tint color
    if effects.shade {
        composite_shade(frame, &mask, camera, opacity.shade);
    } else if effects.has_tint() {
        composite_multiply(frame, &mask, effects.tint.color, effects.tint.alpha);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battlemap_core::coords::GRID_ORIGIN;
    use battlemap_core::{CellPos, TileLight};

    fn origin_camera() -> Camera {
        Camera::new(-GRID_ORIGIN, -GRID_ORIGIN, 1.0)
    }

    fn layer_id(layers: &LayerStack, name: &str) -> Uuid {
        layers.nodes().iter().find(|n| n.name == name).unwrap().id
    }

    fn solid(color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(8, 8, Rgba(color))
    }

    fn scene<'a>(
        tiles: &'a [PlacedTile],
        layers: &'a LayerStack,
        camera: &'a Camera,
        fog: &'a FogCellSet,
        viewport: (u32, u32),
    ) -> Scene<'a> {
        Scene {
            tiles,
            layers,
            camera,
            fog,
            map_size: None,
            ghosts: &[],
            overlays: &[],
            viewport,
        }
    }

    fn no_lighting(layers: &mut LayerStack) {
        let lighting = layer_id(layers, "Lighting");
        layers.set_visible(lighting, false).unwrap();
    }

    #[test]
    fn test_layers_paint_bottom_to_top() {
        let mut layers = LayerStack::new_default();
        no_lighting(&mut layers);
        let floor = layer_id(&layers, "Floor");
        let props = layer_id(&layers, "Props");
        let tiles = vec![
            PlacedTile::new("crate.png", CellPos::new(0, 0), props),
            PlacedTile::new("stone.png", CellPos::new(0, 0), floor),
        ];
        let mut images = ImageCache::new();
        images.insert("stone.png", solid([0, 0, 255, 255]));
        images.insert("crate.png", solid([255, 0, 0, 255]));

        let camera = origin_camera();
        let fog = FogCellSet::new();
        let mut renderer = Renderer::default();
        let token = renderer.begin_frame();
        let frame = renderer
            .render(&scene(&tiles, &layers, &camera, &fog, (64, 64)), &images, &token)
            .into_image()
            .unwrap();
        assert_eq!(frame.get_pixel(32, 32).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_hidden_layer_and_clear_color() {
        let mut layers = LayerStack::new_default();
        no_lighting(&mut layers);
        let props = layer_id(&layers, "Props");
        layers.set_visible(props, false).unwrap();
        let tiles = vec![PlacedTile::new("crate.png", CellPos::new(0, 0), props)];
        let mut images = ImageCache::new();
        images.insert("crate.png", solid([255, 0, 0, 255]));

        let camera = origin_camera();
        let fog = FogCellSet::new();
        let mut renderer = Renderer::default();
        let token = renderer.begin_frame();
        let frame = renderer
            .render(&scene(&tiles, &layers, &camera, &fog, (64, 64)), &images, &token)
            .into_image()
            .unwrap();
        assert_eq!(frame.get_pixel(32, 32).0, renderer.settings().clear_color);
    }

    #[test]
    fn test_stale_token_is_superseded() {
        let layers = LayerStack::new_default();
        let floor = layer_id(&layers, "Floor");
        let tiles = vec![PlacedTile::new("stone.png", CellPos::new(0, 0), floor)];
        let camera = origin_camera();
        let fog = FogCellSet::new();
        let mut renderer = Renderer::default();
        let stale = renderer.begin_frame();
        let _newer = renderer.begin_frame();
        let outcome = renderer.render(
            &scene(&tiles, &layers, &camera, &fog, (64, 64)),
            &ImageCache::new(),
            &stale,
        );
        assert!(matches!(outcome, RenderOutcome::Superseded));
    }

    #[test]
    fn test_fog_drawn_over_tiles_when_visible() {
        let mut layers = LayerStack::new_default();
        no_lighting(&mut layers);
        let floor = layer_id(&layers, "Floor");
        let fog_layer = layer_id(&layers, "Fog");
        layers.set_visible(fog_layer, true).unwrap();
        let tiles = vec![
            PlacedTile::new("stone.png", CellPos::new(0, 0), floor),
            PlacedTile::new("stone.png", CellPos::new(1, 0), floor),
        ];
        let mut images = ImageCache::new();
        images.insert("stone.png", solid([0, 0, 255, 255]));
        let mut fog = FogCellSet::new();
        fog.reveal(CellPos::new(0, 0));

        let camera = origin_camera();
        let mut renderer = Renderer::default();
        let token = renderer.begin_frame();
        let frame = renderer
            .render(&scene(&tiles, &layers, &camera, &fog, (128, 64)), &images, &token)
            .into_image()
            .unwrap();
        assert_eq!(frame.get_pixel(32, 32).0, [0, 0, 255, 255]);
        assert_eq!(frame.get_pixel(96, 32).0, renderer.settings().fog_color);
    }

    #[test]
    fn test_tint_limited_to_layer_alpha() {
        let mut layers = LayerStack::new_default();
        no_lighting(&mut layers);
        let floor = layer_id(&layers, "Floor");
        if let Some(effects) = layers.effects_mut(floor) {
            effects.tint.color = [0, 0, 0];
            effects.tint.alpha = 0.5;
        }
        let tiles = vec![PlacedTile::new("stone.png", CellPos::new(0, 0), floor)];
        let mut images = ImageCache::new();
        images.insert("stone.png", solid([200, 200, 200, 255]));

        let camera = origin_camera();
        let fog = FogCellSet::new();
        let mut renderer = Renderer::default();
        let token = renderer.begin_frame();
        let frame = renderer
            .render(&scene(&tiles, &layers, &camera, &fog, (128, 64)), &images, &token)
            .into_image()
            .unwrap();
        assert_eq!(frame.get_pixel(32, 32).0, [100, 100, 100, 255]);
        assert_eq!(frame.get_pixel(96, 32).0, renderer.settings().clear_color);
    }

    #[test]
    fn test_shadow_falls_outside_tiles() {
        let mut layers = LayerStack::new_default();
        no_lighting(&mut layers);
        let floor = layer_id(&layers, "Floor");
        if let Some(effects) = layers.effects_mut(floor) {
            effects.has_shadow = true;
        }
        let tiles = vec![PlacedTile::new("stone.png", CellPos::new(1, 0), floor)];
        let mut images = ImageCache::new();
        images.insert("stone.png", solid([200, 200, 200, 255]));

        let camera = origin_camera();
        let fog = FogCellSet::new();
        let mut renderer = Renderer::default();
        let token = renderer.begin_frame();
        let frame = renderer
            .render(&scene(&tiles, &layers, &camera, &fog, (192, 64)), &images, &token)
            .into_image()
            .unwrap();
        let clear = renderer.settings().clear_color;
        assert!(frame.get_pixel(60, 32)[0] < clear[0]);
        assert_eq!(frame.get_pixel(96, 32).0, [200, 200, 200, 255]);
        assert_eq!(frame.get_pixel(2, 32).0, clear);
    }

    #[test]
    fn test_light_punches_darkness() {
        let layers = LayerStack::new_default();
        let floor = layer_id(&layers, "Floor");
        let lighting = layer_id(&layers, "Lighting");
        let mut tiles: Vec<PlacedTile> = (0..4)
            .map(|x| PlacedTile::new("stone.png", CellPos::new(x, 0), floor))
            .collect();
        let mut torch = PlacedTile::new("torch.png", CellPos::new(0, 0), lighting);
        torch.light = Some(TileLight::default());
        tiles.push(torch);

        let mut images = ImageCache::new();
        images.insert("stone.png", solid([200, 200, 200, 255]));
        images.insert("torch.png", RgbaImage::new(8, 8));

        let camera = origin_camera();
        let fog = FogCellSet::new();
        let mut renderer = Renderer::default();
        let token = renderer.begin_frame();
        let frame = renderer
            .render(&scene(&tiles, &layers, &camera, &fog, (256, 64)), &images, &token)
            .into_image()
            .unwrap();
        let near = frame.get_pixel(32, 32)[0];
        let far = frame.get_pixel(250, 32)[0];
        assert!(near > far);
    }

    #[test]
    fn test_finite_map_clipped() {
        let mut layers = LayerStack::new_default();
        no_lighting(&mut layers);
        let camera = Camera::centered(64.0, 64.0);
        let fog = FogCellSet::new();
        let mut s = scene(&[], &layers, &camera, &fog, (64, 64));
        s.map_size = Some(MapSize::new(1, 1));
        let mut renderer = Renderer::default();
        let token = renderer.begin_frame();
        let frame = renderer.render(&s, &ImageCache::new(), &token).into_image().unwrap();
        let oob = renderer.settings().out_of_bounds_color;
        assert_eq!(frame.get_pixel(2, 2).0, oob);
        assert_eq!(frame.get_pixel(40, 40).0, renderer.settings().clear_color);
    }
}
