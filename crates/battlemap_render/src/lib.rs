//! Software render pipeline for battlemap
//!
//! Draws a scene into an RGBA frame on the CPU. Per-layer effects (drop
//! shadow, outline, tint and procedural shade) are computed from an alpha
//! mask of each layer, lighting is ray traced on the cell grid, and fog and
//! map bounds are painted last.
//!
//! A frame is tagged with a [`FrameToken`]; starting a newer frame makes
//! older ones bail out between passes instead of finishing stale work.
//!
//! # Example
//!
//! ```rust,ignore
//! use battlemap_render::{ImageCache, Renderer, RenderSettings, Scene};
//!
//! let mut renderer = Renderer::new(RenderSettings::default());
//! let token = renderer.begin_frame();
//! if let Some(frame) = renderer.render(&scene, &images, &token).into_image() {
//!     present(frame);
//! }
//! ```

pub mod effects;
mod error;
mod generation;
mod images;
pub mod lighting;
pub mod overlay;
pub mod raster;
mod renderer;
mod settings;
mod surface;

pub use error::RenderError;
pub use generation::{FrameRequest, FrameToken, RenderGeneration};
pub use images::{
    CachedImage, FileImageSource, ImageCache, ImageSource, MemoryImageSource, PrefetchOutcome,
};
pub use lighting::{LightMap, LightSource, Occluders};
pub use overlay::Overlay;
pub use raster::TileTransform;
pub use renderer::{RenderOutcome, Renderer, Scene};
pub use settings::RenderSettings;
pub use surface::{SurfaceKey, SurfacePool, SurfacePurpose};
