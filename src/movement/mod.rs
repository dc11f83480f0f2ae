//! Movement stepping, remote prediction, and server reconciliation

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::geom::{Direction, Vector2, GRID_CELL};
use crate::util::time::SIMULATION_TPS;

/// Divergence beyond which a server correction snaps instead of blending
pub const CORRECTION_SNAP_DISTANCE: f64 = 1.5 * GRID_CELL as f64;
/// Duration of a blended server correction
pub const CORRECTION_DURATION_MS: u64 = 200;
/// How far ahead remote motion is extrapolated
pub const PREDICTION_HORIZON_SECS: f64 = 2.0;
/// Predicted points older than this are ignored
pub const PREDICTION_STALE_MS: u64 = 2_500;

/// Advance `position` toward `destination` by `speed` units (one tick).
/// Returns the new position and the distance still remaining; a remaining
/// distance of zero signals arrival. Once the gap is within one step the
/// position lands exactly on the destination, so a walker can never
/// oscillate around its goal.
pub fn move_towards(position: Vector2, destination: Vector2, speed: i32) -> (Vector2, f64) {
    if speed <= 0 {
        return (position, position.distance_to(destination));
    }
    let remaining = position.distance_to(destination);
    if remaining <= speed as f64 {
        return (destination, 0.0);
    }
    let dx = (destination.x - position.x) as f64;
    let dy = (destination.y - position.y) as f64;
    let scale = speed as f64 / remaining;
    let next = Vector2::new(
        position.x + (dx * scale).round() as i32,
        position.y + (dy * scale).round() as i32,
    );
    let left = next.distance_to(destination);
    (next, left)
}

/// Run the step-towards walk for `seconds` worth of simulation ticks and
/// return where it ends up. Used to project where a remote entity will be
/// by the time the next snapshot arrives.
pub fn project_towards(from: Vector2, destination: Vector2, speed: i32, seconds: f64) -> Vector2 {
    let steps = (seconds * SIMULATION_TPS as f64).round() as u32;
    let mut position = from;
    for _ in 0..steps {
        let (next, remaining) = move_towards(position, destination, speed);
        position = next;
        if remaining == 0.0 {
            break;
        }
    }
    position
}

/// A point a remote entity is expected to occupy in the near future
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedPoint {
    pub point: Vector2,
    pub computed_ms: u64,
}

impl PredictedPoint {
    pub fn is_stale(&self, now: u64) -> bool {
        now.saturating_sub(self.computed_ms) > PREDICTION_STALE_MS
    }
}

/// An in-flight blend from a displayed position to an authoritative one
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub from: Vector2,
    pub to: Vector2,
    pub started_ms: u64,
}

impl Correction {
    pub fn finished(&self, now: u64) -> bool {
        now.saturating_sub(self.started_ms) >= CORRECTION_DURATION_MS
    }

    /// Linear position along the blend at `now`
    pub fn sample(&self, now: u64) -> Vector2 {
        let elapsed = now.saturating_sub(self.started_ms);
        if elapsed >= CORRECTION_DURATION_MS {
            return self.to;
        }
        let t = elapsed as f64 / CORRECTION_DURATION_MS as f64;
        Vector2::new(
            self.from.x + ((self.to.x - self.from.x) as f64 * t).round() as i32,
            self.from.y + ((self.to.y - self.from.y) as f64 * t).round() as i32,
        )
    }
}

/// What the caller should do with a displayed position after an
/// authoritative observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionUpdate {
    /// Divergence too large to hide; move straight to this point
    Snap(Vector2),
    /// A short blend toward the authoritative point has started
    Blend,
    /// Displayed position already matches
    InPlace,
}

/// Per-tick movement intent for a remote entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepPlan {
    /// Mid-correction: position comes straight off the blend curve
    Glide(Vector2),
    /// Walk toward this point with the step-towards rule
    Seek(Vector2),
}

/// Prediction and correction state for one remote entity
#[derive(Debug, Clone)]
pub struct RemoteMotion {
    pub last_server_pos: Vector2,
    predicted: Option<PredictedPoint>,
    correction: Option<Correction>,
}

impl RemoteMotion {
    fn at(position: Vector2) -> Self {
        Self {
            last_server_pos: position,
            predicted: None,
            correction: None,
        }
    }

    /// Fold in an authoritative position. Renews the forward prediction when
    /// the entity moved since the last snapshot, and reconciles the displayed
    /// position: snap when the gap exceeds the threshold, otherwise start a
    /// short blend from the currently displayed point. At most one correction
    /// is active; a new one replaces the old starting from wherever the old
    /// blend had reached, never from its origin.
    fn observe(
        &mut self,
        displayed: Vector2,
        server_pos: Vector2,
        speed: i32,
        now: u64,
    ) -> (MotionUpdate, bool) {
        let moved = server_pos != self.last_server_pos;
        if moved {
            let heading = Vector2::new(
                server_pos.x * 2 - self.last_server_pos.x,
                server_pos.y * 2 - self.last_server_pos.y,
            );
            self.predicted = Some(PredictedPoint {
                point: project_towards(server_pos, heading, speed, PREDICTION_HORIZON_SECS),
                computed_ms: now,
            });
        }
        self.last_server_pos = server_pos;

        let divergence = displayed.distance_to(server_pos);
        let update = if divergence > CORRECTION_SNAP_DISTANCE {
            self.correction = None;
            MotionUpdate::Snap(server_pos)
        } else if divergence > 0.0 {
            self.correction = Some(Correction {
                from: displayed,
                to: server_pos,
                started_ms: now,
            });
            MotionUpdate::Blend
        } else {
            MotionUpdate::InPlace
        };
        (update, moved)
    }

    /// Decide where the entity should head this tick. Corrections take
    /// priority and suppress prediction; stale predictions fall back to the
    /// last authoritative point.
    fn plan(&mut self, now: u64) -> StepPlan {
        if let Some(correction) = self.correction {
            if correction.finished(now) {
                self.correction = None;
            } else {
                return StepPlan::Glide(correction.sample(now));
            }
        }
        match &self.predicted {
            Some(predicted) if !predicted.is_stale(now) => StepPlan::Seek(predicted.point),
            _ => StepPlan::Seek(self.last_server_pos),
        }
    }
}

/// Motion bookkeeping for every remote entity, keyed by hero id.
///
/// `headings` outlives the per-entity state on purpose: whether a hero has
/// ever been seen moving (and which way) must survive its despawn, so a
/// respawn can be nudged along the old facing instead of teleport-sliding.
#[derive(Debug, Default)]
pub struct MotionRegistry {
    states: HashMap<i64, RemoteMotion>,
    headings: HashMap<i64, Direction>,
}

impl MotionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an authoritative snapshot position into the entity's state.
    /// First sight of an id just seeds the bookkeeping.
    pub fn observe(
        &mut self,
        id: i64,
        displayed: Vector2,
        server_pos: Vector2,
        speed: i32,
        now: u64,
    ) -> MotionUpdate {
        match self.states.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(RemoteMotion::at(server_pos));
                MotionUpdate::InPlace
            }
            Entry::Occupied(mut slot) => {
                let previous = slot.get().last_server_pos;
                let (update, moved) = slot.get_mut().observe(displayed, server_pos, speed, now);
                if moved {
                    if let Some(heading) = Direction::of_delta(previous, server_pos) {
                        self.headings.insert(id, heading);
                    }
                }
                update
            }
        }
    }

    pub fn plan(&mut self, id: i64, now: u64) -> Option<StepPlan> {
        self.states.get_mut(&id).map(|state| state.plan(now))
    }

    /// Forget a despawned entity. Its movement history is kept.
    pub fn purge(&mut self, id: i64) {
        self.states.remove(&id);
    }

    pub fn has_ever_moved(&self, id: i64) -> bool {
        self.headings.contains_key(&id)
    }

    pub fn last_heading(&self, id: i64) -> Option<Direction> {
        self.headings.get(&id).copied()
    }

    pub fn is_tracked(&self, id: i64) -> bool {
        self.states.contains_key(&id)
    }

    pub fn reset(&mut self) {
        self.states.clear();
        self.headings.clear();
    }
}
