//! Render tunables

use serde::{Deserialize, Serialize};

/// Colors and tunables for the render pipeline.
///
/// Lives in the editor configuration file as the `[render]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Frame clear color behind everything
    pub clear_color: [u8; 4],
    /// Tile asset repeated across the background layer
    pub background_texture: Option<String>,
    pub grid_color: [u8; 4],
    pub grid_line_width: f32,
    /// Opacity of the darkness overlay where no light reaches
    pub darkness_opacity: f32,
    /// Rays cast per light source
    pub light_rays: usize,
    pub fog_color: [u8; 4],
    /// Fill outside a finite map
    pub out_of_bounds_color: [u8; 4],
    pub shadow_color: [u8; 3],
    pub outline_color: [u8; 4],
    pub selection_color: [u8; 4],
    pub preview_color: [u8; 4],
    pub measure_color: [u8; 4],
    /// Opacity of placement previews
    pub ghost_opacity: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            clear_color: [28, 28, 32, 255],
            background_texture: None,
            grid_color: [255, 255, 255, 48],
            grid_line_width: 1.0,
            darkness_opacity: 0.85,
            light_rays: 360,
            fog_color: [12, 12, 16, 255],
            out_of_bounds_color: [16, 16, 18, 255],
            shadow_color: [0, 0, 0],
            outline_color: [0, 0, 0, 255],
            selection_color: [80, 160, 255, 255],
            preview_color: [90, 210, 130, 200],
            measure_color: [255, 200, 60, 255],
            ghost_opacity: 0.5,
        }
    }
}
