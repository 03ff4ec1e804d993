//! Map save/load and debounced autosave
//!
//! A map is stored as one JSON blob per map id:
//!
//! ```json
//! { "placedTiles": [...], "layers": {...}, "fogCells": [{"x":0,"y":0}],
//!   "fogMode": "add", "mapSize": {"w":30,"h":20}, "seed": "abc" }
//! ```
//!
//! Older blobs may carry a `fogRect` instead of `fogCells`; it is expanded
//! into cells on load. A blob that cannot be read or parsed loads as an
//! empty map.

use crate::error::PersistError;
use crate::store::MapStore;
use battlemap_core::{
    Camera, CellPos, CellRect, FogCellSet, FogMode, LayerStack, MapSize, PlacedTile,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Persisted form of one map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapBlob {
    #[serde(default)]
    pub placed_tiles: Vec<PlacedTile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<LayerStack>,
    #[serde(default)]
    pub fog_cells: Vec<CellPos>,
    /// Legacy single-rectangle fog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fog_rect: Option<CellRect>,
    #[serde(default)]
    pub fog_mode: FogMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_size: Option<MapSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
}

/// Map state rebuilt from a blob, ready for [`MapStore::restore`]
#[derive(Debug, Clone)]
pub struct LoadedMap {
    pub tiles: Vec<PlacedTile>,
    pub layers: LayerStack,
    pub fog: FogCellSet,
    pub fog_mode: FogMode,
    pub map_size: Option<MapSize>,
    pub seed: Option<String>,
}

impl MapBlob {
    /// Snapshot the committed state of a store; staged gesture previews are
    /// never written
    pub fn capture(store: &MapStore) -> Self {
        let mut fog_cells: Vec<CellPos> = store.fog().iter().copied().collect();
        fog_cells.sort();
        Self {
            placed_tiles: store.history().current().tiles.clone(),
            layers: Some(store.layers().clone()),
            fog_cells,
            fog_rect: None,
            fog_mode: store.fog_mode(),
            map_size: store.map_size(),
            seed: Some(store.seed().to_string()),
        }
    }

    /// Validate and normalize the blob.
    ///
    /// An invalid layer tree is replaced by the default stack. Every tile
    /// gets a consistent center and top-left, and tiles on pinned layers lose
    /// any free rotation.
    pub fn into_loaded(self, map_id: &str) -> LoadedMap {
        let layers = match self.layers {
            Some(layers) => match layers.validate() {
                Ok(()) => layers,
                Err(err) => {
                    warn!(map = %map_id, "Discarding invalid layer tree: {err}");
                    LayerStack::new_default()
                }
            },
            None => LayerStack::new_default(),
        };

        let tiles = self
            .placed_tiles
            .into_iter()
            .map(|mut tile| {
                tile.normalize();
                let pinned = layers
                    .resolve_tile_layer(&tile)
                    .and_then(|id| layers.get(id))
                    .is_some_and(|node| node.is_pinned());
                if pinned && !tile.is_quarter_aligned() {
                    tile.snap_rotation_to_quarter();
                }
                tile
            })
            .collect();

        let fog = match (self.fog_cells.is_empty(), self.fog_rect) {
            (true, Some(rect)) => FogCellSet::from_rect(rect),
            _ => FogCellSet::from(self.fog_cells),
        };

        LoadedMap {
            tiles,
            layers,
            fog,
            fog_mode: self.fog_mode,
            map_size: self.map_size,
            seed: self.seed,
        }
    }
}

/// Where map blobs live
pub trait MapStorage {
    /// Raw blob for `map_id`, or `None` if it was never saved
    fn read(&self, map_id: &str) -> Result<Option<String>, PersistError>;

    fn write(&mut self, map_id: &str, blob: &str) -> Result<(), PersistError>;
}

/// One `<map id>.json` file per map in a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, map_id: &str) -> PathBuf {
        let name: String = map_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl MapStorage for FileStorage {
    fn read(&self, map_id: &str) -> Result<Option<String>, PersistError> {
        match std::fs::read_to_string(self.path_for(map_id)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistError::Io {
                map_id: map_id.to_string(),
                source,
            }),
        }
    }

    fn write(&mut self, map_id: &str, blob: &str) -> Result<(), PersistError> {
        let io = |source: std::io::Error| PersistError::Io {
            map_id: map_id.to_string(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(io)?;
        let path = self.path_for(map_id);
        // Write beside the target and rename so a crash never leaves half a blob
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, blob).map_err(io)?;
        std::fs::rename(&tmp, &path).map_err(io)
    }
}

/// In-process storage, for tests and hosts that persist elsewhere
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    blobs: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, map_id: &str) -> Option<&str> {
        self.blobs.get(map_id).map(String::as_str)
    }

    pub fn insert(&mut self, map_id: impl Into<String>, blob: impl Into<String>) {
        self.blobs.insert(map_id.into(), blob.into());
    }
}

impl MapStorage for MemoryStorage {
    fn read(&self, map_id: &str) -> Result<Option<String>, PersistError> {
        Ok(self.blobs.get(map_id).cloned())
    }

    fn write(&mut self, map_id: &str, blob: &str) -> Result<(), PersistError> {
        self.blobs.insert(map_id.to_string(), blob.to_string());
        Ok(())
    }
}

/// Read a map. Missing, unreadable and corrupt blobs all load as an empty
/// map; the last two are logged.
pub fn load_map(storage: &dyn MapStorage, map_id: &str) -> LoadedMap {
    let blob = match storage.read(map_id) {
        Ok(Some(text)) => match serde_json::from_str::<MapBlob>(&text) {
            Ok(blob) => blob,
            Err(source) => {
                let err = PersistError::Json {
                    map_id: map_id.to_string(),
                    source,
                };
                warn!(map = %map_id, "Treating corrupt map as empty: {err}");
                MapBlob::default()
            }
        },
        Ok(None) => MapBlob::default(),
        Err(err) => {
            warn!(map = %map_id, "Treating unreadable map as empty: {err}");
            MapBlob::default()
        }
    };
    blob.into_loaded(map_id)
}

/// Load `map_id` into `store`, framing world origin in `viewport`
pub fn open_map(store: &mut MapStore, storage: &dyn MapStorage, viewport: (u32, u32), default_seed: &str) {
    let map_id = store.map_id().to_string();
    let loaded = load_map(storage, &map_id);
    store.set_seed(loaded.seed.unwrap_or_else(|| default_seed.to_string()));
    store.restore(
        loaded.tiles,
        loaded.layers,
        loaded.fog,
        loaded.fog_mode,
        loaded.map_size,
        Camera::centered(viewport.0 as f64, viewport.1 as f64),
    );
}

/// Write the committed state of `store`
pub fn save_map(store: &MapStore, storage: &mut dyn MapStorage) -> Result<(), PersistError> {
    let blob = MapBlob::capture(store);
    let json = serde_json::to_string(&blob).map_err(|source| PersistError::Json {
        map_id: store.map_id().to_string(),
        source,
    })?;
    storage.write(store.map_id(), &json)?;
    debug!(
        map = %store.map_id(),
        tiles = blob.placed_tiles.len(),
        bytes = json.len(),
        "autosaved map"
    );
    Ok(())
}

/// Debounced autosave: every change restarts the quiet period, and the map
/// is written once it elapses
#[derive(Debug, Clone)]
pub struct Autosave {
    debounce: Duration,
    due: Option<Instant>,
    writes: u64,
}

impl Autosave {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            due: None,
            writes: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    /// Number of successful writes so far
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Restart the quiet period
    pub fn schedule(&mut self, now: Instant) {
        self.due = Some(now + self.debounce);
    }

    /// Poll once per frame. Picks up new changes from the store and writes
    /// when the quiet period has passed. A failed write is retried after
    /// another quiet period. Returns whether a write happened.
    pub fn tick(&mut self, now: Instant, store: &mut MapStore, storage: &mut dyn MapStorage) -> Result<bool, PersistError> {
        if store.take_dirty() {
            self.schedule(now);
        }
        match self.due {
            Some(due) if now >= due => {}
            _ => return Ok(false),
        }
        // Mid-gesture previews are not saved; wait for the commit or cancel
        if store.has_staged_changes() {
            return Ok(false);
        }
        self.due = None;
        if let Err(err) = save_map(store, storage) {
            self.schedule(now);
            return Err(err);
        }
        self.writes += 1;
        Ok(true)
    }

    /// Write immediately if anything is pending
    pub fn flush(&mut self, store: &mut MapStore, storage: &mut dyn MapStorage) -> Result<bool, PersistError> {
        if store.take_dirty() || self.due.is_some() {
            self.due = None;
            save_map(store, storage)?;
            self.writes += 1;
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestMap;
    use battlemap_core::LayerRole;

    fn saved_store() -> (MapStore, MemoryStorage) {
        let mut store = MapStore::new("cellar", "abc");
        let floor = store.layers().floor_id().unwrap();
        store.place(
            vec![PlacedTile::new("stone.png", CellPos::new(1, 2), floor)],
            &[floor],
            "Paint",
        );
        store.apply_fog(CellRect::from_corners(CellPos::new(0, 0), CellPos::new(1, 0)));
        store.set_map_size(Some(MapSize::new(10, 8)));
        let mut storage = MemoryStorage::new();
        save_map(&store, &mut storage).unwrap();
        (store, storage)
    }

    #[test]
    fn test_blob_uses_camel_case_keys() {
        let (_, storage) = saved_store();
        let json: serde_json::Value = serde_json::from_str(storage.get("cellar").unwrap()).unwrap();
        assert_eq!(json["placedTiles"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["fogCells"], serde_json::json!([{"x": 0, "y": 0}, {"x": 1, "y": 0}]));
        assert_eq!(json["fogMode"], "add");
        assert_eq!(json["mapSize"], serde_json::json!({"w": 10, "h": 8}));
        assert_eq!(json["seed"], "abc");
        assert!(json.get("fogRect").is_none());
    }

    #[test]
    fn test_reload_recenters_camera() {
        let (mut store, storage) = saved_store();
        store.pan_by(500.0, 0.0);
        let tiles = store.tiles().to_vec();

        let mut reopened = MapStore::new("cellar", "other");
        open_map(&mut reopened, &storage, (800, 600), "battlemap");
        assert_eq!(reopened.tiles(), tiles.as_slice());
        assert_eq!(reopened.seed(), "abc");
        assert_eq!(reopened.fog().len(), 2);
        assert_eq!(reopened.map_size(), Some(MapSize::new(10, 8)));
        assert_eq!(*reopened.camera(), Camera::centered(800.0, 600.0));
        assert!(!reopened.history().can_undo());
        assert!(!reopened.is_dirty());
    }

    #[test]
    fn test_corrupt_blob_loads_empty() {
        let mut storage = MemoryStorage::new();
        storage.insert("broken", "{ not json");
        let mut store = MapStore::new("broken", "x");
        open_map(&mut store, &storage, (100, 100), "battlemap");
        assert!(store.tiles().is_empty());
        assert_eq!(store.seed(), "battlemap");
        assert!(store.layers().role_layer(LayerRole::Lighting).is_some());
    }

    #[test]
    fn test_legacy_fog_rect_expands() {
        let json = r#"{
            "placedTiles": [],
            "fogRect": {"min": {"x": 0, "y": 0}, "max": {"x": 2, "y": 1}},
            "fogMode": "subtract"
        }"#;
        let blob: MapBlob = serde_json::from_str(json).unwrap();
        let loaded = blob.into_loaded("legacy");
        assert_eq!(loaded.fog.len(), 6);
        assert!(loaded.fog.is_visible(CellPos::new(2, 1)));
        assert_eq!(loaded.fog_mode, FogMode::Subtract);
    }

    #[test]
    fn test_free_rotation_snapped_on_pinned_layers() {
        let map = TestMap::new();
        let mut torch = PlacedTile::new("torch.png", CellPos::new(0, 0), map.lighting);
        torch.rotation_radians = Some(1.2);
        let mut crate_tile = PlacedTile::new("crate.png", CellPos::new(1, 0), map.props);
        crate_tile.rotation_radians = Some(1.2);

        let blob = MapBlob {
            placed_tiles: vec![torch, crate_tile],
            layers: Some(map.layers),
            ..Default::default()
        };
        let loaded = blob.into_loaded("pinned");
        assert_eq!(loaded.tiles[0].rotation_radians, None);
        assert_eq!(loaded.tiles[0].rotation_index, 1);
        assert_eq!(loaded.tiles[1].rotation_radians, Some(1.2));
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().join("maps"));
        assert_eq!(storage.read("a/b").unwrap(), None);
        storage.write("a/b", "{}").unwrap();
        assert_eq!(storage.read("a/b").unwrap().as_deref(), Some("{}"));
        assert!(storage.path_for("a/b").ends_with("a_b.json"));
    }

    #[test]
    fn test_autosave_debounces() {
        let start = Instant::now();
        let mut store = MapStore::new("debounce", "abc");
        let mut storage = MemoryStorage::new();
        let mut autosave = Autosave::new(Duration::from_millis(500));
        let floor = store.layers().floor_id().unwrap();

        store.place(vec![PlacedTile::new("a.png", CellPos::new(0, 0), floor)], &[], "Paint");
        assert!(!autosave.tick(start, &mut store, &mut storage).unwrap());
        store.place(vec![PlacedTile::new("b.png", CellPos::new(1, 0), floor)], &[], "Paint");
        let later = start + Duration::from_millis(300);
        assert!(!autosave.tick(later, &mut store, &mut storage).unwrap());

        // 600ms after the first edit but only 300ms after the second
        assert!(!autosave.tick(start + Duration::from_millis(600), &mut store, &mut storage).unwrap());
        assert!(storage.get("debounce").is_none());

        assert!(autosave.tick(later + Duration::from_millis(500), &mut store, &mut storage).unwrap());
        assert_eq!(autosave.writes(), 1);
        assert!(!autosave.is_pending());
        assert!(!autosave.tick(later + Duration::from_secs(5), &mut store, &mut storage).unwrap());
    }

    #[test]
    fn test_autosave_waits_for_gesture() {
        let start = Instant::now();
        let mut store = MapStore::new("gesture", "abc");
        let mut storage = MemoryStorage::new();
        let mut autosave = Autosave::new(Duration::from_millis(10));
        let floor = store.layers().floor_id().unwrap();

        store.set_seed("changed");
        autosave.tick(start, &mut store, &mut storage).unwrap();
        store.stage_tiles(vec![PlacedTile::new("a.png", CellPos::new(0, 0), floor)]);
        let due = start + Duration::from_millis(20);
        assert!(!autosave.tick(due, &mut store, &mut storage).unwrap());
        store.cancel_staged();
        assert!(autosave.tick(due, &mut store, &mut storage).unwrap());
    }
}
