//! Simulation world: scene, trail index, motion bookkeeping, session state
//!
//! Everything here runs on one logical thread. The update pass steps every
//! character, the scheduler delivers deferred transitions, and reconciliation
//! helpers apply authoritative server data. Mutation order matters in the
//! teardown paths: a hero's trail index entries and prediction bookkeeping
//! go away in the same pass as its node, so a later poll tick cannot
//! resurrect them.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::events::{EventBus, GameSignal, Subscription, Topic};
use crate::game::schedule::{DeferredAction, Scheduler};
use crate::geom::{Direction, Vector2, GRID_CELL};
use crate::movement::{move_towards, MotionRegistry, StepPlan};
use crate::net::protocol::{HeroSnapshot, WorldDelta};
use crate::render::{draw_frame, DrawSurface};
use crate::scene::character::{ARRIVAL_DISTANCE, DEATH_EFFECT_MS};
use crate::scene::{
    trail, Character, DrawLayer, Effect, EffectKind, Node, NodeId, NodeKind, Scene, TrailWall,
};
use crate::spatial::SpatialTrailIndex;

/// Per-session flags and counters shared by polling and reconciliation
#[derive(Debug, Clone)]
pub struct SessionState {
    pub level: String,
    pub time_on_level_secs: u64,
    pub score: i64,
    pub walls_placed: i64,
    pub kills: i64,
    pub consecutive_failures: u32,
    pub server_down: bool,
    /// Last known good position, captured when the outage was declared
    pub saved_position: Option<Vector2>,
    /// Locally created wall cells awaiting upload
    pub pending_walls: Vec<Vector2>,
    /// Wall cells created while the server was down; rolled back on recovery
    pub offline_walls: Vec<Vector2>,
}

impl SessionState {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            time_on_level_secs: 0,
            score: 0,
            walls_placed: 0,
            kills: 0,
            consecutive_failures: 0,
            server_down: false,
            saved_position: None,
            pending_walls: Vec::new(),
            offline_walls: Vec::new(),
        }
    }
}

pub struct World {
    pub scene: Scene,
    pub spatial: SpatialTrailIndex,
    pub bus: Rc<EventBus>,
    pub scheduler: Scheduler,
    pub motion: MotionRegistry,
    pub session: SessionState,
    /// Hero id to scene node, local hero included
    pub heroes: HashMap<i64, NodeId>,
    pub local_id: Option<i64>,
    camera: Rc<Cell<Vector2>>,
    camera_sub: Option<Subscription>,
}

impl World {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            scene: Scene::new(),
            spatial: SpatialTrailIndex::new(),
            bus: Rc::new(EventBus::new()),
            scheduler: Scheduler::new(),
            motion: MotionRegistry::new(),
            session: SessionState::new(level),
            heroes: HashMap::new(),
            local_id: None,
            camera: Rc::new(Cell::new(Vector2::ZERO)),
            camera_sub: None,
        }
    }

    pub fn camera(&self) -> Vector2 {
        self.camera.get()
    }

    pub fn local_node(&self) -> Option<NodeId> {
        self.local_id.and_then(|id| self.heroes.get(&id).copied())
    }

    pub fn local_position(&self) -> Option<Vector2> {
        self.local_node()
            .and_then(|node| self.scene.get(node))
            .map(|node| node.position)
    }

    /// Instantiate the hero this client controls and point the camera at it.
    /// Rebinding replaces any previous local hero.
    pub fn bind_local_hero(&mut self, snapshot: &HeroSnapshot) -> NodeId {
        if let Some(previous) = self.local_id.take() {
            if let Some(node) = self.heroes.get(&previous).copied() {
                self.destroy_node(node);
            }
        }
        if let Some(subscription) = self.camera_sub.take() {
            self.bus.unsubscribe(subscription);
        }

        let mut character = Character::new(
            snapshot.id,
            snapshot.name.clone(),
            snapshot.position,
            snapshot.speed,
        );
        character.user_controlled = true;
        character.color = snapshot.color.clone();
        character.mask = snapshot.mask;
        character.kills = snapshot.kills;
        let node = self.scene.spawn(Node::character(snapshot.position, character));
        self.heroes.insert(snapshot.id, node);
        self.local_id = Some(snapshot.id);
        if let Some(level) = &snapshot.level {
            self.session.level = level.clone();
        }

        self.camera.set(snapshot.position);
        let camera = Rc::clone(&self.camera);
        let local = snapshot.id;
        self.camera_sub = Some(self.bus.subscribe(Topic::CharacterMoved, move |signal| {
            if let GameSignal::CharacterMoved { id, position } = signal {
                if *id == local {
                    camera.set(*position);
                }
            }
        }));
        node
    }

    /// Instantiate a remote hero from a snapshot. A hero that has been seen
    /// moving spawns one cell ahead along its last heading, so the first
    /// prediction does not read as a teleport; one that never moved spawns
    /// exactly where reported.
    pub fn spawn_remote_hero(&mut self, snapshot: &HeroSnapshot) -> NodeId {
        let mut position = snapshot.position;
        let mut facing = Direction::Down;
        if let Some(heading) = self.motion.last_heading(snapshot.id) {
            let step = heading.step();
            position = position.offset(step.x * GRID_CELL, step.y * GRID_CELL);
            facing = heading;
        }

        let mut character = Character::new(
            snapshot.id,
            snapshot.name.clone(),
            position,
            snapshot.speed,
        );
        character.color = snapshot.color.clone();
        character.mask = snapshot.mask;
        character.kills = snapshot.kills;
        character.facing = facing;
        let node = self.scene.spawn(Node::character(position, character));
        self.heroes.insert(snapshot.id, node);
        debug!(hero_id = snapshot.id, x = position.x, y = position.y, "spawned remote hero");
        node
    }

    /// Quietly remove a hero that dropped out of the authoritative snapshot
    /// list: no death effect, trail gone, prediction bookkeeping purged.
    /// Returns the server ids of any acknowledged walls that were culled.
    pub fn despawn_hero(&mut self, id: i64) -> Vec<i64> {
        let culled = self.remove_hero_trail(id);
        if let Some(node) = self.heroes.remove(&id) {
            if let Some(character) = self.scene.character_mut(node) {
                character.prevent_destroy_animation = true;
            }
            self.destroy_node(node);
        }
        self.motion.purge(id);
        culled
    }

    /// Kill a hero where it stands: lock it, play the death effect, free the
    /// node once the effect ends, and drop its trail in one bulk pass.
    /// Returns the server ids of any acknowledged walls that were culled.
    pub fn kill_hero(&mut self, id: i64, now: u64) -> Vec<i64> {
        let Some(&node_id) = self.heroes.get(&id) else {
            return Vec::new();
        };
        let Some(character) = self.scene.character(node_id) else {
            return Vec::new();
        };
        if character.dying {
            return Vec::new();
        }
        let animate = !character.prevent_destroy_animation;
        let position = self
            .scene
            .get(node_id)
            .map(|node| node.position)
            .unwrap_or(Vector2::ZERO);

        let culled = self.remove_hero_trail(id);
        if let Some(character) = self.scene.character_mut(node_id) {
            character.begin_death();
        }
        if animate {
            let effect = self.scene.spawn(Node::effect(
                position,
                DrawLayer::Base,
                Effect {
                    kind: EffectKind::Explosion,
                    started_ms: now,
                },
            ));
            self.scheduler
                .schedule_after(now, DEATH_EFFECT_MS, DeferredAction::FreeNode(effect));
            self.scheduler
                .schedule_after(now, DEATH_EFFECT_MS, DeferredAction::FreeNode(node_id));
        } else {
            self.destroy_node(node_id);
        }
        self.bus.emit(&GameSignal::HeroDied { id });
        culled
    }

    /// Remove every trail wall an owner has placed, quietly. Returns the
    /// culled walls' server ids.
    pub fn remove_hero_trail(&mut self, owner: i64) -> Vec<i64> {
        let mut acked = Vec::new();
        for entry in self.spatial.remove_walls_for_hero(owner) {
            for removed in self.scene.destroy(entry.node) {
                if let NodeKind::TrailWall(wall) = removed.kind {
                    if let Some(wall_id) = wall.wall_id {
                        acked.push(wall_id);
                    }
                }
            }
        }
        acked
    }

    /// Render a wall reported by the server. If the cell already holds a
    /// local pending wall from the same owner, that node adopts the server
    /// id instead of being duplicated.
    pub fn render_server_wall(&mut self, wall_id: i64, owner: i64, cell: Vector2) -> NodeId {
        if let Some(entry) = self.spatial.entry_at(cell).copied() {
            if entry.owner == owner {
                if let Some(node) = self.scene.get_mut(entry.node) {
                    if let NodeKind::TrailWall(wall) = &mut node.kind {
                        wall.wall_id = Some(wall_id);
                        return entry.node;
                    }
                }
            }
        }
        let color = self
            .heroes
            .get(&owner)
            .and_then(|&node| self.scene.character(node))
            .and_then(|character| character.color.clone());
        let node = self
            .scene
            .spawn(Node::trail_wall(cell, TrailWall::acknowledged(owner, cell, wall_id, color)));
        if let Some(displaced) = self.spatial.insert(cell, owner, node) {
            if displaced.node != node {
                self.scene.destroy(displaced.node);
            }
        }
        node
    }

    /// Show a chat message above a hero's head. Returns false when the hero
    /// is unknown or the message is a stale redelivery.
    pub fn post_chat(&mut self, id: i64, text: &str, posted_ms: u64, now: u64) -> bool {
        let Some(&node_id) = self.heroes.get(&id) else {
            return false;
        };
        let Some(node) = self.scene.get_mut(node_id) else {
            return false;
        };
        let Some(character) = node.as_character_mut() else {
            return false;
        };
        let shown = character.say(node_id, text.to_string(), posted_ms, now, &mut self.scheduler);
        if shown {
            self.bus.emit(&GameSignal::ChatPosted {
                id,
                text: text.to_string(),
            });
        }
        shown
    }

    /// Point the local hero at a destination. Refused while locked.
    pub fn set_local_destination(&mut self, destination: Vector2) -> bool {
        let Some(node_id) = self.local_node() else {
            return false;
        };
        let Some(character) = self.scene.character_mut(node_id) else {
            return false;
        };
        if character.locked {
            return false;
        }
        character.destination = destination;
        true
    }

    /// Copy run totals off an authoritative delta into the session HUD state
    pub fn apply_run_stats(&mut self, delta: &WorldDelta) {
        if delta.current_score != self.session.score {
            self.session.score = delta.current_score;
            self.bus.emit(&GameSignal::ScoreChanged {
                score: delta.current_score,
            });
        }
        self.session.time_on_level_secs = delta.time_on_level_seconds;
        self.session.walls_placed = delta.walls_placed_for_run;
        self.session.kills = delta.hero_kills;
    }

    /// Tear the world down to the local hero and switch levels: every remote
    /// node goes away, the trail index and prediction maps reset, and the
    /// local hero starts a fresh trail.
    pub fn change_level(&mut self, level: &str, _now: u64) {
        self.session.level = level.to_string();
        self.session.pending_walls.clear();
        self.session.offline_walls.clear();
        self.spatial.clear();
        self.motion.reset();

        let keep = self.local_node();
        let ids: Vec<NodeId> = self.scene.iter().map(|(id, _)| id).collect();
        for id in ids {
            if Some(id) == keep {
                continue;
            }
            self.destroy_node(id);
        }
        self.heroes.retain(|id, _| Some(*id) == self.local_id);

        if let Some(node_id) = keep {
            if let Some(node) = self.scene.get_mut(node_id) {
                let position = node.position;
                if let Some(character) = node.as_character_mut() {
                    character.destination = position;
                    character.last_emission = position;
                }
            }
        }
        self.bus.emit(&GameSignal::LevelChanged {
            level: level.to_string(),
        });
    }

    /// Destroy a node and release everything it owns: timers, hero map and
    /// prediction entries, trail index cells. Safe to call with a stale id.
    pub fn destroy_node(&mut self, id: NodeId) {
        for removed in self.scene.destroy(id) {
            self.release(removed);
        }
    }

    fn release(&mut self, mut node: Node) {
        match &mut node.kind {
            NodeKind::Character(character) => {
                character.cancel_tasks(&mut self.scheduler);
                let hero_id = character.id;
                let mapped_gone = self
                    .heroes
                    .get(&hero_id)
                    .map_or(false, |&mapped| !self.scene.contains(mapped));
                if mapped_gone {
                    self.heroes.remove(&hero_id);
                }
                self.motion.purge(hero_id);
                if self.local_id == Some(hero_id) && !self.heroes.contains_key(&hero_id) {
                    self.local_id = None;
                }
            }
            NodeKind::TrailWall(wall) => {
                let entry_gone = self
                    .spatial
                    .entry_at(wall.cell)
                    .map_or(false, |entry| !self.scene.contains(entry.node));
                if entry_gone {
                    self.spatial.remove_at(wall.cell);
                }
            }
            NodeKind::Effect(_) => {}
        }
    }

    /// Deliver every scheduled action that has come due
    pub fn run_due(&mut self, now: u64) {
        for action in self.scheduler.drain_due(now) {
            match action {
                DeferredAction::SetStand(node) => {
                    if let Some(character) = self.scene.character_mut(node) {
                        character.settle(now);
                    }
                }
                DeferredAction::ClearBubble { node, signature } => {
                    if let Some(character) = self.scene.character_mut(node) {
                        character.expire_bubble(&signature);
                    }
                }
                DeferredAction::FreeNode(node) => self.destroy_node(node),
            }
        }
    }

    /// One fixed simulation step: walk every unlocked character toward its
    /// target, fire movement signals, and drop trail walls behind the local
    /// hero.
    pub fn update(&mut self, now: u64) {
        let mut emissions: Vec<(i64, Vector2, Option<String>)> = Vec::new();

        for id in self.scene.character_ids() {
            let Some(node) = self.scene.get_mut(id) else { continue };
            let before = node.position;
            let Some(character) = node.as_character_mut() else { continue };
            if character.locked {
                continue;
            }
            let hero_id = character.id;
            let user_controlled = character.user_controlled;
            let speed = character.speed;

            let mut glide = None;
            let mut target = character.destination;
            if !user_controlled {
                match self.motion.plan(hero_id, now) {
                    Some(StepPlan::Glide(point)) => glide = Some(point),
                    Some(StepPlan::Seek(point)) => {
                        character.destination = point;
                        target = point;
                    }
                    None => {}
                }
            }

            let (next, arrived) = match glide {
                Some(point) => (point, false),
                None => {
                    if before.distance_to(target) <= ARRIVAL_DISTANCE {
                        (before, false)
                    } else {
                        let (next, remaining) = move_towards(before, target, speed);
                        (next, remaining == 0.0)
                    }
                }
            };

            if next != before {
                let facing = Direction::of_delta(before, next).unwrap_or(character.facing);
                character.begin_walk(facing, now, &mut self.scheduler);
                if user_controlled && trail::due_for_emission(character.last_emission, next) {
                    let anchor = trail::emission_anchor(character.last_emission);
                    character.last_emission = next;
                    emissions.push((hero_id, anchor, character.color.clone()));
                }
            }
            if arrived {
                character.note_arrival(id, now, &mut self.scheduler);
            }
            node.position = next;
            if next != before {
                self.bus.emit(&GameSignal::CharacterMoved {
                    id: hero_id,
                    position: next,
                });
            }
        }

        for (owner, anchor, color) in emissions {
            self.place_local_wall(owner, anchor, color);
        }
    }

    /// Drop a locally emitted wall: scene node, index cell, upload queue
    /// (or the offline list during an outage), and the spawn signal.
    fn place_local_wall(&mut self, owner: i64, cell: Vector2, color: Option<String>) {
        let node = self
            .scene
            .spawn(Node::trail_wall(cell, TrailWall::local(owner, cell, color)));
        if let Some(displaced) = self.spatial.insert(cell, owner, node) {
            if displaced.node != node {
                self.scene.destroy(displaced.node);
            }
        }
        if self.session.server_down {
            self.session.offline_walls.push(cell);
        } else {
            self.session.pending_walls.push(cell);
        }
        self.bus.emit(&GameSignal::TrailWallSpawned { owner, cell });
    }

    /// Draw the world through the camera
    pub fn render(&self, now: u64, surface: &mut dyn DrawSurface) {
        draw_frame(&self.scene, &self.session, self.camera(), now, surface);
    }
}
