//! Snapshot undo/redo

use battlemap_core::{Camera, PlacedTile};

/// Default number of snapshots kept
pub const DEFAULT_HISTORY_CAP: usize = 200;

/// Immutable copy of the undoable scene state
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    pub tiles: Vec<PlacedTile>,
    pub camera: Camera,
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    label: String,
    snapshot: HistorySnapshot,
}

/// Linear snapshot history.
///
/// The entry at `index` is the committed state. Committing drops everything
/// after it, so redo is only available until the next edit. When the cap is
/// hit the oldest edits go first; the bottom entry is always a valid floor.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<HistoryEntry>,
    index: usize,
    cap: usize,
}

impl History {
    pub fn new(initial: HistorySnapshot) -> Self {
        Self::with_cap(initial, DEFAULT_HISTORY_CAP)
    }

    pub fn with_cap(initial: HistorySnapshot, cap: usize) -> Self {
        Self {
            entries: vec![HistoryEntry {
                label: String::new(),
                snapshot: initial,
            }],
            index: 0,
            cap: cap.max(2),
        }
    }

    /// Forget everything and start from `initial`
    pub fn reset(&mut self, initial: HistorySnapshot) {
        self.entries.clear();
        self.entries.push(HistoryEntry {
            label: String::new(),
            snapshot: initial,
        });
        self.index = 0;
    }

    /// The state undo and cancel return to
    pub fn current(&self) -> &HistorySnapshot {
        &self.entries[self.index].snapshot
    }

    /// Record a completed edit
    pub fn commit(&mut self, label: impl Into<String>, snapshot: HistorySnapshot) {
        self.entries.truncate(self.index + 1);
        self.entries.push(HistoryEntry {
            label: label.into(),
            snapshot,
        });
        if self.entries.len() > self.cap {
            let excess = self.entries.len() - self.cap;
            self.entries.drain(..excess);
        }
        self.index = self.entries.len() - 1;
    }

    /// Step back; returns the state to restore
    pub fn undo(&mut self) -> Option<&HistorySnapshot> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        Some(self.current())
    }

    /// Step forward again after an undo
    pub fn redo(&mut self) -> Option<&HistorySnapshot> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        Some(self.current())
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// Label of the edit undo would revert
    pub fn undo_description(&self) -> Option<&str> {
        self.can_undo().then(|| self.entries[self.index].label.as_str())
    }

    /// Label of the edit redo would reapply
    pub fn redo_description(&self) -> Option<&str> {
        self.can_redo()
            .then(|| self.entries[self.index + 1].label.as_str())
    }

    /// Drop tiles failing `keep` from every snapshot. Steps left identical
    /// to the one before them are merged away so undo never lands on a
    /// no-op.
    pub fn retain_tiles(&mut self, mut keep: impl FnMut(&PlacedTile) -> bool) {
        let current = self.index;
        let mut merged: Vec<HistoryEntry> = Vec::with_capacity(self.entries.len());
        for (i, mut entry) in self.entries.drain(..).enumerate() {
            entry.snapshot.tiles.retain(&mut keep);
            let duplicate = merged
                .last()
                .is_some_and(|prev| prev.snapshot == entry.snapshot);
            if !duplicate {
                merged.push(entry);
            }
            if i == current {
                self.index = merged.len() - 1;
            }
        }
        self.entries = merged;
    }

    /// Number of stored snapshots, including the initial one
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battlemap_core::CellPos;
    use uuid::Uuid;

    fn snapshot(n: usize) -> HistorySnapshot {
        let layer = Uuid::nil();
        HistorySnapshot {
            tiles: (0..n)
                .map(|i| PlacedTile::new("floor.png", CellPos::new(i as i32, 0), layer))
                .collect(),
            camera: Camera::default(),
        }
    }

    #[test]
    fn test_undo_redo() {
        let mut history = History::new(snapshot(0));
        history.commit("Paint", snapshot(1));
        history.commit("Paint", snapshot(2));
        assert_eq!(history.undo_description(), Some("Paint"));

        assert_eq!(history.undo().map(|s| s.tiles.len()), Some(1));
        assert_eq!(history.undo().map(|s| s.tiles.len()), Some(0));
        assert!(history.undo().is_none());

        assert_eq!(history.redo().map(|s| s.tiles.len()), Some(1));
        assert!(history.can_redo());
    }

    #[test]
    fn test_commit_truncates_redo() {
        let mut history = History::new(snapshot(0));
        history.commit("Paint", snapshot(1));
        history.undo();
        history.commit("Erase", snapshot(3));
        assert!(!history.can_redo());
        assert_eq!(history.current().tiles.len(), 3);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_retain_tiles_merges_emptied_steps() {
        let kept = Uuid::new_v4();
        let doomed = Uuid::new_v4();
        let a = PlacedTile::new("floor.png", CellPos::new(0, 0), kept);
        let b = PlacedTile::new("crate.png", CellPos::new(1, 0), doomed);
        let camera = Camera::default();
        let mut history = History::new(HistorySnapshot { tiles: vec![], camera });
        history.commit("Paint", HistorySnapshot { tiles: vec![a.clone()], camera });
        history.commit("Drop tile", HistorySnapshot { tiles: vec![a.clone(), b.clone()], camera });
        history.commit("Nudge", HistorySnapshot { tiles: vec![a.clone(), b.clone()], camera: Camera { pan_x: 5.0, ..camera } });

        history.retain_tiles(|t| t.layer_id != Some(doomed));
        assert_eq!(history.len(), 3);
        assert_eq!(history.current().tiles, vec![a.clone()]);
        assert_eq!(history.undo_description(), Some("Nudge"));
        assert_eq!(history.undo().map(|s| s.tiles.clone()), Some(vec![a]));
        assert!(history.undo().is_some_and(|s| s.tiles.is_empty()));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_cap_drops_oldest() {
        let mut history = History::with_cap(snapshot(0), 3);
        for n in 1..=5 {
            history.commit("Paint", snapshot(n));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.undo().map(|s| s.tiles.len()), Some(4));
        assert_eq!(history.undo().map(|s| s.tiles.len()), Some(3));
        assert!(history.undo().is_none());
    }
}
