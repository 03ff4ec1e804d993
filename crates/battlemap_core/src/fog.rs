//! Fog of war: the set of cells revealed to players

use crate::coords::{CellPos, CellRect};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a rectangular fog gesture merges into the revealed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FogMode {
    /// Replace the revealed set with the rectangle
    Set,
    /// Reveal the rectangle
    #[default]
    Add,
    /// Hide the rectangle again
    Subtract,
}

/// Cells marked visible; absent cells are obscured
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<CellPos>", into = "Vec<CellPos>")]
pub struct FogCellSet {
    cells: HashSet<CellPos>,
}

impl FogCellSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand a legacy min/max rectangle into explicit cells
    pub fn from_rect(rect: CellRect) -> Self {
        Self {
            cells: rect.cells().collect(),
        }
    }

    pub fn is_visible(&self, cell: CellPos) -> bool {
        self.cells.contains(&cell)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn reveal(&mut self, cell: CellPos) {
        self.cells.insert(cell);
    }

    pub fn hide(&mut self, cell: CellPos) {
        self.cells.remove(&cell);
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &CellPos> {
        self.cells.iter()
    }

    /// Merge a rectangular gesture according to `mode`
    pub fn apply_rect(&mut self, rect: CellRect, mode: FogMode) {
        match mode {
            FogMode::Set => {
                self.cells = rect.cells().collect();
            }
            FogMode::Add => {
                self.cells.extend(rect.cells());
            }
            FogMode::Subtract => {
                for cell in rect.cells() {
                    self.cells.remove(&cell);
                }
            }
        }
    }
}

impl From<Vec<CellPos>> for FogCellSet {
    fn from(cells: Vec<CellPos>) -> Self {
        Self {
            cells: cells.into_iter().collect(),
        }
    }
}

impl From<FogCellSet> for Vec<CellPos> {
    fn from(set: FogCellSet) -> Self {
        let mut cells: Vec<CellPos> = set.cells.into_iter().collect();
        cells.sort_by_key(|c| (c.y, c.x));
        cells
    }
}
