//! Bevy integration: the editor as a resource plus its per-frame upkeep

use crate::config::EditorConfig;
use crate::editor::Editor;
use crate::persistence::{FileStorage, MapStorage, MemoryStorage};
use battlemap_render::FileImageSource;
use bevy::prelude::*;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// The open editor, shared with UI systems
#[derive(Resource)]
pub struct EditorResource(pub Editor);

/// Adds an [`EditorResource`] for `map_id` and polls autosave every frame
pub struct BattlemapPlugin {
    pub map_id: String,
    pub assets_root: PathBuf,
    pub viewport: (u32, u32),
}

impl Default for BattlemapPlugin {
    fn default() -> Self {
        Self {
            map_id: "default".to_string(),
            assets_root: PathBuf::from("assets"),
            viewport: (1280, 720),
        }
    }
}

impl BattlemapPlugin {
    pub fn new(map_id: impl Into<String>) -> Self {
        Self {
            map_id: map_id.into(),
            ..Default::default()
        }
    }

    pub fn with_assets_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.assets_root = root.into();
        self
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }
}

impl Plugin for BattlemapPlugin {
    fn build(&self, app: &mut App) {
        let config = EditorConfig::load();
        let storage: Box<dyn MapStorage + Send + Sync> = match config.resolved_storage_dir() {
            Some(dir) => {
                info!("BattlemapPlugin: storing maps in {:?}", dir);
                Box::new(FileStorage::new(dir))
            }
            None => {
                warn!("BattlemapPlugin: no data directory, maps will not persist");
                Box::new(MemoryStorage::new())
            }
        };
        let images = Box::new(FileImageSource::new(self.assets_root.clone()));
        let editor = Editor::new(config, storage, images, &self.map_id, self.viewport);

        app.insert_resource(EditorResource(editor))
            .add_systems(Update, autosave_tick);
    }
}

fn autosave_tick(mut editor: ResMut<EditorResource>) {
    editor.0.tick(Instant::now());
}
