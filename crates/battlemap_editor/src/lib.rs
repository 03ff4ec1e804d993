//! battlemap_editor - interactive editing of a battlemap scene
//!
//! This crate ties the placement, rendering and layer crates into an editor:
//! - `MapStore` - committed and staged tiles, layers, fog and camera for one map
//! - `Tools` - pointer gestures for painting, erasing, fog, measuring and selecting
//! - `Selection` - alpha-exact hit testing and the selected tile set
//! - `transform` - rotate, mirror, nudge and duplicate about a cached pivot
//! - `History` - bounded undo/redo of committed tile snapshots
//! - `persistence` - JSON map blobs, storage backends and debounced autosave
//! - `dnd` - dropping assets from a tile palette
//! - `InputController` - configurable keyboard shortcuts
//! - `Editor` - all of the above for one open map
//!
//! # Usage
//!
//! ```rust,ignore
//! use battlemap_editor::{Editor, EditorConfig, FileStorage, PointerEvent};
//! use battlemap_render::FileImageSource;
//!
//! let config = EditorConfig::load();
//! let storage = FileStorage::new(config.resolved_storage_dir().unwrap());
//! let mut editor = Editor::new(config, Box::new(storage), Box::new(FileImageSource::new("assets")), "tavern", (1280, 720));
//! editor.pointer_down(PointerEvent::new(pointer));
//! if let Some(frame) = editor.render_frame() {
//!     present(frame);
//! }
//! ```

mod config;
pub mod dnd;
mod editor;
mod error;
mod history;
pub mod input;
pub mod persistence;
pub mod selection;
mod store;
pub mod tools;
pub mod transform;

#[cfg(feature = "bevy")]
mod plugin;
#[cfg(test)]
mod testing;

pub use config::{config_path, default_storage_dir, EditorConfig};
pub use dnd::{AssetCatalog, DataTransfer, DragRelay, DropPayload};
pub use editor::Editor;
pub use error::{ConfigError, PersistError};
pub use history::{History, HistorySnapshot};
pub use input::{Action, InputController, KeyCombo, KeyEvent};
pub use persistence::{Autosave, FileStorage, MapBlob, MapStorage, MemoryStorage};
pub use selection::{PixelSource, SelectMode, Selection};
pub use store::{MapStore, Notice};
pub use tools::{Measurement, Modifiers, PointerEvent, Tool, ToolContext, Tools};
pub use transform::{MirrorAxis, Turn};

#[cfg(feature = "bevy")]
pub use plugin::{BattlemapPlugin, EditorResource};

pub use battlemap_brush;
pub use battlemap_core;
pub use battlemap_render;
