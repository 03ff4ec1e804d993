//! Freehand painting

use crate::line::line_cells;
use crate::rect::fill_rect;
use crate::rng::VariantSelector;
use crate::stroke::StrokeContext;
use battlemap_core::{BrushDescriptor, CellPos, CellRect, PlacedTile};
use std::collections::HashSet;
use uuid::Uuid;

/// A freehand brush drag in progress.
///
/// Every newly visited cell gets a single-cell fill. Cells skipped between
/// two pointer samples are visited along a 4-connected line, and a cell
/// already covered by this stroke is never rolled again.
#[derive(Debug, Clone)]
pub struct FreehandStroke {
    ctx: StrokeContext,
    visited: HashSet<CellPos>,
    last: Option<CellPos>,
    tiles: Vec<PlacedTile>,
}

impl FreehandStroke {
    pub fn new(ctx: StrokeContext) -> Self {
        Self {
            ctx,
            visited: HashSet::new(),
            last: None,
            tiles: Vec::new(),
        }
    }

    pub fn stroke_id(&self) -> Uuid {
        self.ctx.stroke_id
    }

    pub fn layer_id(&self) -> Uuid {
        self.ctx.layer_id
    }

    /// Tiles placed so far
    pub fn tiles(&self) -> &[PlacedTile] {
        &self.tiles
    }

    pub fn is_visited(&self, cell: CellPos) -> bool {
        self.visited.contains(&cell)
    }

    /// Move the brush to `cell`; returns how many tiles were added
    pub fn visit(&mut self, brush: &BrushDescriptor, selector: &VariantSelector, cell: CellPos) -> usize {
        let path = match self.last {
            Some(last) if last == cell => return 0,
            Some(last) => line_cells(last, cell).into_iter().skip(1).collect(),
            None => vec![cell],
        };
        self.last = Some(cell);

        let before = self.tiles.len();
        for step in path {
            if !self.visited.insert(step) {
                continue;
            }
            let placed = fill_rect(brush, selector, CellRect::from_corners(step, step), &mut self.ctx);
            for tile in &placed {
                self.visited.extend(tile.bounds().cells());
            }
            self.tiles.extend(placed);
        }
        self.tiles.len() - before
    }

    /// End the stroke and hand over its tiles
    pub fn finish(self) -> Vec<PlacedTile> {
        self.tiles
    }
}
