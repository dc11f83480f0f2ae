//! Spatial index over trail wall cells
//!
//! Collision queries and owner-wide teardown both have to be cheap: cells are
//! keyed by their "x|y" grid key, and a reverse map from owner to cell keys
//! makes removing every wall of a dead hero proportional to that hero's wall
//! count, not the world's.

use std::collections::{HashMap, HashSet};

use crate::geom::Vector2;
use crate::scene::NodeId;

/// Build the canonical "x|y" key for a grid cell
pub fn cell_key(cell: Vector2) -> String {
    format!("{}|{}", cell.x, cell.y)
}

/// One indexed wall cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallEntry {
    pub owner: i64,
    pub node: NodeId,
    pub cell: Vector2,
}

#[derive(Debug, Default)]
pub struct SpatialTrailIndex {
    by_cell: HashMap<String, WallEntry>,
    by_owner: HashMap<i64, HashSet<String>>,
}

impl SpatialTrailIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a wall cell for an owner. A cell has at most one wall: if the
    /// cell was already occupied the displaced entry is returned so the
    /// caller can retire its scene node.
    pub fn insert(&mut self, cell: Vector2, owner: i64, node: NodeId) -> Option<WallEntry> {
        let key = cell_key(cell);
        let displaced = self.detach(&key);
        self.by_cell.insert(key.clone(), WallEntry { owner, node, cell });
        self.by_owner.entry(owner).or_default().insert(key);
        displaced
    }

    /// Drop the wall at a cell, if any
    pub fn remove_at(&mut self, cell: Vector2) -> Option<WallEntry> {
        self.detach(&cell_key(cell))
    }

    /// Drop every wall an owner has placed. Cost is proportional to the
    /// owner's wall count.
    pub fn remove_walls_for_hero(&mut self, owner: i64) -> Vec<WallEntry> {
        let Some(keys) = self.by_owner.remove(&owner) else {
            return Vec::new();
        };
        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.by_cell.remove(&key) {
                removed.push(entry);
            }
        }
        removed
    }

    pub fn has_wall_at(&self, cell: Vector2) -> bool {
        self.by_cell.contains_key(&cell_key(cell))
    }

    pub fn entry_at(&self, cell: Vector2) -> Option<&WallEntry> {
        self.by_cell.get(&cell_key(cell))
    }

    pub fn owner_of(&self, cell: Vector2) -> Option<i64> {
        self.entry_at(cell).map(|entry| entry.owner)
    }

    pub fn wall_count(&self) -> usize {
        self.by_cell.len()
    }

    pub fn clear(&mut self) {
        self.by_cell.clear();
        self.by_owner.clear();
    }

    fn detach(&mut self, key: &str) -> Option<WallEntry> {
        let entry = self.by_cell.remove(key)?;
        if let Some(cells) = self.by_owner.get_mut(&entry.owner) {
            cells.remove(key);
            if cells.is_empty() {
                self.by_owner.remove(&entry.owner);
            }
        }
        Some(entry)
    }
}
