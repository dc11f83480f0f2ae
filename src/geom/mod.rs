//! Grid geometry primitives shared across the simulation

use serde::{Deserialize, Serialize};

/// Side length of one grid cell, in world units
pub const GRID_CELL: i32 = 16;

/// Integer 2D point in world units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: i32,
    pub y: i32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: Vector2) -> f64 {
        let dx = (other.x - self.x) as f64;
        let dy = (other.y - self.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Nearest grid-aligned point
    pub fn snapped_to_grid(&self) -> Vector2 {
        Vector2 {
            x: round_to_cell(self.x),
            y: round_to_cell(self.y),
        }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Vector2 {
        Vector2 {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

fn round_to_cell(v: i32) -> i32 {
    // div_euclid floors, so adding half a cell rounds to nearest for
    // negative coordinates too
    (v + GRID_CELL / 2).div_euclid(GRID_CELL) * GRID_CELL
}

/// Cardinal facing of a character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit step in world units for this direction. Screen-space Y grows downward.
    pub fn step(&self) -> Vector2 {
        match self {
            Direction::Up => Vector2::new(0, -1),
            Direction::Down => Vector2::new(0, 1),
            Direction::Left => Vector2::new(-1, 0),
            Direction::Right => Vector2::new(1, 0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// Dominant-axis facing for a displacement. Returns None for a zero delta.
    pub fn of_delta(from: Vector2, to: Vector2) -> Option<Direction> {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        if dx == 0 && dy == 0 {
            return None;
        }
        if dx.abs() >= dy.abs() {
            Some(if dx >= 0 {
                Direction::Right
            } else {
                Direction::Left
            })
        } else {
            Some(if dy >= 0 {
                Direction::Down
            } else {
                Direction::Up
            })
        }
    }
}
