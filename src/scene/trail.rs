//! Trail wall payloads and the emission rule

use crate::geom::{Vector2, GRID_CELL};

/// A hero must travel this far from its last anchor before the next wall drops
pub const TRAIL_EMIT_DISTANCE: f64 = 2.0 * GRID_CELL as f64;

/// One segment of a hero's light trail
#[derive(Debug, Clone, PartialEq)]
pub struct TrailWall {
    pub owner: i64,
    pub cell: Vector2,
    /// Server-assigned id once the wall has been acknowledged. Local walls
    /// carry None until the server echoes them back.
    pub wall_id: Option<i64>,
    pub color: Option<String>,
}

impl TrailWall {
    pub fn local(owner: i64, cell: Vector2, color: Option<String>) -> Self {
        Self {
            owner,
            cell,
            wall_id: None,
            color,
        }
    }

    pub fn acknowledged(owner: i64, cell: Vector2, wall_id: i64, color: Option<String>) -> Self {
        Self {
            owner,
            cell,
            wall_id: Some(wall_id),
            color,
        }
    }
}

/// Has the hero moved far enough from its last anchor to drop a wall?
pub fn due_for_emission(last_emission: Vector2, position: Vector2) -> bool {
    last_emission.distance_to(position) >= TRAIL_EMIT_DISTANCE
}

/// Where the wall lands: the previous anchor, grid-snapped, so the segment
/// trails behind the hero instead of appearing at its leading edge
pub fn emission_anchor(last_emission: Vector2) -> Vector2 {
    last_emission.snapped_to_grid()
}
