//! Poll-cycle state machine: delta application, outage handling, recovery
//!
//! The async plumbing (intervals, spawned fetches, aborts) lives in the
//! session loop. This module is the synchronous core it drives: each cycle
//! gets a generation number, and only the result matching the latest
//! generation may touch state, so a slow response can never overwrite fresher
//! data. Results return as a list of follow-up actions for the caller to
//! execute against the backend.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::events::GameSignal;
use crate::game::world::World;
use crate::geom::Vector2;
use crate::movement::MotionUpdate;
use crate::net::api::ApiError;
use crate::net::protocol::{DeathReport, HeroState, RemoteEvent, UpdateRequest, WorldDelta};
use crate::scene::NodeId;

/// Consecutive fetch failures before the server is declared down
pub const FAILURE_THRESHOLD: u32 = 3;

/// Backend work a completed cycle asks the caller to perform
#[derive(Debug)]
pub enum SyncAction {
    /// Compensate for walls created during an outage: they were never
    /// acknowledged and must not come back as ghosts
    DeleteWalls(Vec<Vector2>),
    /// Restore the hero's pre-outage position server-side
    RestorePosition(Vector2),
    /// Rebuild the whole client world rather than reconcile in place
    ForceReload,
    /// Report the local hero's final run stats
    RecordDeath(DeathReport),
}

#[derive(Debug, Default)]
pub struct NetworkSync {
    generation: u64,
    /// Wall batch sent with the latest cycle's request. Held until that
    /// cycle succeeds; handed back to the upload queue otherwise.
    inflight_walls: Vec<Vector2>,
    /// Highest wall id already processed; walls at or below it are not
    /// re-spawned
    wall_watermark: Option<i64>,
    /// Server wall id to the node currently rendering it
    rendered_walls: HashMap<i64, NodeId>,
    /// Event ids applied from the previous delta
    last_event_ids: HashSet<i64>,
}

impl NetworkSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new poll cycle: invalidate every earlier cycle and assemble
    /// the fetch body. The pending wall batch moves into the request but is
    /// retained until this cycle succeeds; if a previous cycle never did,
    /// its batch rides along here so a transient failure or an abort can
    /// never drop a placed wall. None until a local hero is bound.
    pub fn begin_cycle(&mut self, world: &mut World) -> Option<(u64, UpdateRequest)> {
        let hero_id = world.local_id?;
        let position = world.local_position()?;
        self.restore_inflight_batch(world);
        self.generation += 1;
        self.inflight_walls = world.session.pending_walls.drain(..).collect();
        let request = UpdateRequest {
            hero: HeroState {
                id: hero_id,
                position,
                level: world.session.level.clone(),
            },
            pending_walls: if self.inflight_walls.is_empty() {
                None
            } else {
                Some(self.inflight_walls.clone())
            },
            since_wall_id: self.wall_watermark,
        };
        Some((self.generation, request))
    }

    /// Hand an unacknowledged wall batch back to the upload queue, ahead of
    /// anything placed since.
    fn restore_inflight_batch(&mut self, world: &mut World) {
        if self.inflight_walls.is_empty() {
            return;
        }
        let mut batch = std::mem::take(&mut self.inflight_walls);
        batch.append(&mut world.session.pending_walls);
        world.session.pending_walls = batch;
    }

    /// Fold a finished fetch back into the world. Stale generations are
    /// no-ops: an aborted request neither applies data nor counts as a
    /// failure.
    pub fn complete_cycle(
        &mut self,
        generation: u64,
        outcome: Result<WorldDelta, ApiError>,
        world: &mut World,
        now: u64,
    ) -> Vec<SyncAction> {
        if generation != self.generation {
            debug!(generation, latest = self.generation, "dropping stale poll result");
            return Vec::new();
        }

        match outcome {
            Err(error) => {
                self.restore_inflight_batch(world);
                world.session.consecutive_failures += 1;
                warn!(
                    %error,
                    failures = world.session.consecutive_failures,
                    "world delta fetch failed"
                );
                if world.session.consecutive_failures >= FAILURE_THRESHOLD
                    && !world.session.server_down
                {
                    world.session.server_down = true;
                    world.session.saved_position = world.local_position();
                    world.bus.emit(&GameSignal::ServerStatus { down: true });
                    info!("server down; hero position captured for recovery");
                }
                Vec::new()
            }
            Ok(delta) => {
                self.inflight_walls.clear();
                world.session.consecutive_failures = 0;
                if world.session.server_down {
                    return self.plan_recovery(world);
                }
                self.apply_delta(world, &delta, now)
            }
        }
    }

    /// Wall tracking starts over (level changes, full reloads)
    pub fn reset_wall_tracking(&mut self) {
        self.wall_watermark = None;
        self.rendered_walls.clear();
        self.inflight_walls.clear();
    }

    /// First successful fetch after an outage. The delta payload itself is
    /// deliberately ignored: offline walls are rolled back, the hero's
    /// pre-outage position is restored, and the client reloads from scratch.
    fn plan_recovery(&mut self, world: &mut World) -> Vec<SyncAction> {
        world.session.server_down = false;
        world.bus.emit(&GameSignal::ServerStatus { down: false });
        info!(
            offline_walls = world.session.offline_walls.len(),
            "server back up; rolling back offline state and reloading"
        );

        let mut actions = Vec::new();
        let offline: Vec<Vector2> = world.session.offline_walls.drain(..).collect();
        if !offline.is_empty() {
            actions.push(SyncAction::DeleteWalls(offline));
        }
        if let Some(position) = world.session.saved_position.take() {
            actions.push(SyncAction::RestorePosition(position));
        }
        actions.push(SyncAction::ForceReload);
        actions
    }

    fn apply_delta(&mut self, world: &mut World, delta: &WorldDelta, now: u64) -> Vec<SyncAction> {
        let mut actions = Vec::new();
        world.apply_run_stats(delta);

        if let Some(level) = &delta.current_level {
            if *level != world.session.level {
                info!(level = %level, "level changed by server");
                world.change_level(level, now);
                self.reset_wall_tracking();
            }
        }

        self.reconcile_heroes(world, delta, now);
        self.reconcile_walls(world, delta);
        self.apply_events(world, delta, now, &mut actions);
        actions
    }

    /// Fold every remote hero snapshot into the scene: correct known ones,
    /// spawn new ones, despawn those no longer reported.
    fn reconcile_heroes(&mut self, world: &mut World, delta: &WorldDelta, now: u64) {
        let local = world.local_id;
        let mut present: HashSet<i64> = HashSet::new();

        for snapshot in &delta.heroes {
            if Some(snapshot.id) == local {
                continue;
            }
            present.insert(snapshot.id);
            match world.heroes.get(&snapshot.id).copied() {
                Some(node) => {
                    let displayed = world
                        .scene
                        .get(node)
                        .map(|n| n.position)
                        .unwrap_or(snapshot.position);
                    let update = world.motion.observe(
                        snapshot.id,
                        displayed,
                        snapshot.position,
                        snapshot.speed,
                        now,
                    );
                    if let MotionUpdate::Snap(point) = update {
                        if let Some(n) = world.scene.get_mut(node) {
                            n.position = point;
                        }
                    }
                    if let Some(character) = world.scene.character_mut(node) {
                        character.kills = snapshot.kills;
                        character.speed = snapshot.speed;
                    }
                }
                None => {
                    let node = world.spawn_remote_hero(snapshot);
                    let displayed = world
                        .scene
                        .get(node)
                        .map(|n| n.position)
                        .unwrap_or(snapshot.position);
                    world
                        .motion
                        .observe(snapshot.id, displayed, snapshot.position, snapshot.speed, now);
                }
            }
        }

        let known: Vec<i64> = world
            .heroes
            .keys()
            .copied()
            .filter(|id| Some(*id) != local)
            .collect();
        for id in known {
            if !present.contains(&id) {
                debug!(hero_id = id, "remote hero left the level");
                for wall_id in world.despawn_hero(id) {
                    self.rendered_walls.remove(&wall_id);
                }
            }
        }
    }

    /// Spawn walls past the watermark and cull rendered walls the server no
    /// longer lists. Culling is quiet and O(1) per removed wall.
    fn reconcile_walls(&mut self, world: &mut World, delta: &WorldDelta) {
        let mut listed: HashSet<i64> = HashSet::with_capacity(delta.recent_walls.len());
        for wall in &delta.recent_walls {
            listed.insert(wall.id);
            let beyond = self.wall_watermark.map_or(true, |w| wall.id > w);
            if beyond {
                let node = world.render_server_wall(wall.id, wall.hero_id, wall.position);
                self.rendered_walls.insert(wall.id, node);
                self.wall_watermark =
                    Some(self.wall_watermark.map_or(wall.id, |w| w.max(wall.id)));
            }
        }

        let stale: Vec<i64> = self
            .rendered_walls
            .keys()
            .copied()
            .filter(|id| !listed.contains(id))
            .collect();
        for id in stale {
            if let Some(node) = self.rendered_walls.remove(&id) {
                world.destroy_node(node);
            }
        }
    }

    /// Apply chat and death events exactly once, by id. The previous
    /// response's ids are skipped by identity, not by time window, so
    /// duplicated or out-of-order delivery stays correct.
    fn apply_events(
        &mut self,
        world: &mut World,
        delta: &WorldDelta,
        now: u64,
        actions: &mut Vec<SyncAction>,
    ) {
        let mut seen: HashSet<i64> = HashSet::with_capacity(delta.events.len());
        for envelope in &delta.events {
            seen.insert(envelope.id);
            if self.last_event_ids.contains(&envelope.id) {
                continue;
            }
            match &envelope.event {
                RemoteEvent::Chat {
                    hero_id: Some(id),
                    text,
                    sent_at,
                } => {
                    world.post_chat(*id, text, sent_at.unwrap_or(now), now);
                }
                RemoteEvent::HeroDeath {
                    hero_id: Some(id), ..
                } => {
                    let is_local = Some(*id) == world.local_id;
                    for wall_id in world.kill_hero(*id, now) {
                        self.rendered_walls.remove(&wall_id);
                    }
                    if is_local {
                        actions.push(SyncAction::RecordDeath(DeathReport {
                            hero_id: *id,
                            score: world.session.score,
                            time_on_level_seconds: world.session.time_on_level_secs,
                            walls_placed: world.session.walls_placed,
                            level: world.session.level.clone(),
                        }));
                    }
                }
                // Events without a hero identity are dropped, not thrown.
                RemoteEvent::Chat { hero_id: None, .. } => {}
                RemoteEvent::HeroDeath { hero_id: None, .. } => {}
                RemoteEvent::Unknown => {}
            }
        }
        self.last_event_ids = seen;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Topic;
    use crate::net::protocol::{EventEnvelope, HeroSnapshot, WallSnapshot};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn hero_snapshot(id: i64, position: Vector2) -> HeroSnapshot {
        HeroSnapshot {
            id,
            name: format!("hero-{id}"),
            position,
            speed: 2,
            color: None,
            mask: None,
            level: Some("grid-1".into()),
            kills: 0,
            created: None,
        }
    }

    fn bound_world() -> World {
        let mut world = World::new("grid-1");
        world.bind_local_hero(&hero_snapshot(1, Vector2::ZERO));
        world
    }

    fn chat_event(id: i64, hero: i64, text: &str) -> EventEnvelope {
        EventEnvelope {
            id,
            event: RemoteEvent::Chat {
                hero_id: Some(hero),
                text: text.into(),
                sent_at: Some(1_000),
            },
        }
    }

    fn delta_with_events(events: Vec<EventEnvelope>) -> WorldDelta {
        WorldDelta {
            events,
            ..WorldDelta::default()
        }
    }

    fn fail(sync: &mut NetworkSync, world: &mut World, now: u64) {
        let (generation, _) = sync.begin_cycle(world).unwrap();
        let actions = sync.complete_cycle(generation, Err(ApiError::EmptyResponse), world, now);
        assert!(actions.is_empty());
    }

    #[test]
    fn duplicate_event_ids_apply_once() {
        let mut sync = NetworkSync::new();
        let mut world = bound_world();
        let posts: Rc<RefCell<u32>> = Rc::new(RefCell::new(0));
        {
            let posts = Rc::clone(&posts);
            world.bus.subscribe(Topic::ChatPosted, move |_| *posts.borrow_mut() += 1);
        }

        let (generation, _) = sync.begin_cycle(&mut world).unwrap();
        sync.complete_cycle(
            generation,
            Ok(delta_with_events(vec![chat_event(42, 1, "gg")])),
            &mut world,
            0,
        );
        // The next delta redelivers the same event id.
        let (generation, _) = sync.begin_cycle(&mut world).unwrap();
        sync.complete_cycle(
            generation,
            Ok(delta_with_events(vec![chat_event(42, 1, "gg")])),
            &mut world,
            1_000,
        );

        assert_eq!(*posts.borrow(), 1);
    }

    #[test]
    fn stale_generation_is_dropped_entirely() {
        let mut sync = NetworkSync::new();
        let mut world = bound_world();

        let (first, _) = sync.begin_cycle(&mut world).unwrap();
        let (second, _) = sync.begin_cycle(&mut world).unwrap();

        // The superseded cycle's response arrives late, carrying a hero.
        let mut late = WorldDelta::default();
        late.heroes.push(hero_snapshot(7, Vector2::new(50, 50)));
        let actions = sync.complete_cycle(first, Ok(late), &mut world, 0);
        assert!(actions.is_empty());
        assert!(!world.heroes.contains_key(&7));

        // The current cycle's response applies.
        let mut fresh = WorldDelta::default();
        fresh.heroes.push(hero_snapshot(7, Vector2::new(60, 60)));
        sync.complete_cycle(second, Ok(fresh), &mut world, 0);
        assert!(world.heroes.contains_key(&7));
    }

    #[test]
    fn aborted_fetch_never_counts_toward_outage() {
        let mut sync = NetworkSync::new();
        let mut world = bound_world();

        let (first, _) = sync.begin_cycle(&mut world).unwrap();
        let _ = sync.begin_cycle(&mut world).unwrap();
        sync.complete_cycle(first, Err(ApiError::EmptyResponse), &mut world, 0);
        assert_eq!(world.session.consecutive_failures, 0);
    }

    #[test]
    fn failed_fetch_hands_the_wall_batch_back() {
        let mut sync = NetworkSync::new();
        let mut world = bound_world();
        world.session.pending_walls.push(Vector2::new(16, 0));

        let (generation, request) = sync.begin_cycle(&mut world).unwrap();
        assert_eq!(request.pending_walls, Some(vec![Vector2::new(16, 0)]));
        assert!(world.session.pending_walls.is_empty());

        sync.complete_cycle(generation, Err(ApiError::EmptyResponse), &mut world, 0);
        assert_eq!(world.session.pending_walls, vec![Vector2::new(16, 0)]);
    }

    #[test]
    fn superseded_wall_batch_rides_with_the_next_cycle() {
        let mut sync = NetworkSync::new();
        let mut world = bound_world();
        world.session.pending_walls.push(Vector2::new(16, 0));

        let (first, _) = sync.begin_cycle(&mut world).unwrap();
        // A wall lands between polls; the next cycle carries both, in
        // placement order.
        world.session.pending_walls.push(Vector2::new(32, 0));
        let (second, request) = sync.begin_cycle(&mut world).unwrap();
        assert_eq!(
            request.pending_walls,
            Some(vec![Vector2::new(16, 0), Vector2::new(32, 0)])
        );

        // The aborted cycle's late failure touches nothing: the live cycle
        // owns the batch now.
        sync.complete_cycle(first, Err(ApiError::EmptyResponse), &mut world, 0);
        assert!(world.session.pending_walls.is_empty());
        assert_eq!(world.session.consecutive_failures, 0);

        // Only the live cycle's failure hands it back.
        sync.complete_cycle(second, Err(ApiError::EmptyResponse), &mut world, 100);
        assert_eq!(
            world.session.pending_walls,
            vec![Vector2::new(16, 0), Vector2::new(32, 0)]
        );
    }

    #[test]
    fn acknowledged_wall_batch_is_not_resent() {
        let mut sync = NetworkSync::new();
        let mut world = bound_world();
        world.session.pending_walls.push(Vector2::new(16, 0));

        let (generation, _) = sync.begin_cycle(&mut world).unwrap();
        sync.complete_cycle(generation, Ok(WorldDelta::default()), &mut world, 0);

        let (_, request) = sync.begin_cycle(&mut world).unwrap();
        assert_eq!(request.pending_walls, None);
    }

    #[test]
    fn three_failures_capture_position_and_recovery_reloads() {
        let mut sync = NetworkSync::new();
        let mut world = bound_world();
        world.set_local_destination(Vector2::new(2, 0));
        world.update(0);
        let status: Rc<RefCell<Vec<bool>>> = Rc::new(RefCell::new(Vec::new()));
        {
            let status = Rc::clone(&status);
            world.bus.subscribe(Topic::ServerStatus, move |signal| {
                if let GameSignal::ServerStatus { down } = signal {
                    status.borrow_mut().push(*down);
                }
            });
        }

        fail(&mut sync, &mut world, 100);
        fail(&mut sync, &mut world, 200);
        assert!(!world.session.server_down);
        fail(&mut sync, &mut world, 300);
        assert!(world.session.server_down);
        assert_eq!(world.session.saved_position, Some(Vector2::new(2, 0)));

        // Walls placed while down go to the offline list.
        world.session.offline_walls.push(Vector2::new(16, 0));
        world.session.offline_walls.push(Vector2::new(48, 0));

        // Recovery ignores the payload: this delta carries a hero that must
        // not be applied.
        let mut payload = WorldDelta::default();
        payload.heroes.push(hero_snapshot(9, Vector2::new(10, 10)));
        let (generation, _) = sync.begin_cycle(&mut world).unwrap();
        let actions = sync.complete_cycle(generation, Ok(payload), &mut world, 400);

        assert!(!world.session.server_down);
        assert!(!world.heroes.contains_key(&9));
        assert_eq!(actions.len(), 3);
        assert!(
            matches!(&actions[0], SyncAction::DeleteWalls(cells) if cells == &vec![Vector2::new(16, 0), Vector2::new(48, 0)])
        );
        assert!(
            matches!(&actions[1], SyncAction::RestorePosition(position) if *position == Vector2::new(2, 0))
        );
        assert!(matches!(&actions[2], SyncAction::ForceReload));
        assert_eq!(*status.borrow(), vec![true, false]);
        assert!(world.session.offline_walls.is_empty());
        assert!(world.session.saved_position.is_none());
    }

    #[test]
    fn heroes_spawn_and_despawn_with_deltas() {
        let mut sync = NetworkSync::new();
        let mut world = bound_world();

        let mut delta = WorldDelta::default();
        delta.heroes.push(hero_snapshot(2, Vector2::new(80, 0)));
        let (generation, _) = sync.begin_cycle(&mut world).unwrap();
        sync.complete_cycle(generation, Ok(delta), &mut world, 0);
        assert!(world.heroes.contains_key(&2));
        assert!(world.motion.is_tracked(2));

        // Hero 2 vanishes from the next snapshot.
        let (generation, _) = sync.begin_cycle(&mut world).unwrap();
        sync.complete_cycle(generation, Ok(WorldDelta::default()), &mut world, 1_000);
        assert!(!world.heroes.contains_key(&2));
        assert!(!world.motion.is_tracked(2));
    }

    #[test]
    fn local_snapshot_is_not_instantiated_as_remote() {
        let mut sync = NetworkSync::new();
        let mut world = bound_world();

        let mut delta = WorldDelta::default();
        delta.heroes.push(hero_snapshot(1, Vector2::new(500, 500)));
        let (generation, _) = sync.begin_cycle(&mut world).unwrap();
        sync.complete_cycle(generation, Ok(delta), &mut world, 0);

        assert_eq!(world.heroes.len(), 1);
        // The local hero's displayed position stays locally authoritative.
        assert_eq!(world.local_position(), Some(Vector2::ZERO));
    }

    #[test]
    fn large_divergence_snaps_known_remote() {
        let mut sync = NetworkSync::new();
        let mut world = bound_world();

        let mut delta = WorldDelta::default();
        delta.heroes.push(hero_snapshot(2, Vector2::new(100, 0)));
        let (generation, _) = sync.begin_cycle(&mut world).unwrap();
        sync.complete_cycle(generation, Ok(delta), &mut world, 0);

        let mut delta = WorldDelta::default();
        delta.heroes.push(hero_snapshot(2, Vector2::new(200, 0)));
        let (generation, _) = sync.begin_cycle(&mut world).unwrap();
        sync.complete_cycle(generation, Ok(delta), &mut world, 1_000);

        let node = world.heroes[&2];
        assert_eq!(world.scene.get(node).unwrap().position, Vector2::new(200, 0));
    }

    #[test]
    fn walls_respect_watermark_and_get_culled() {
        let mut sync = NetworkSync::new();
        let mut world = bound_world();

        let wall = WallSnapshot {
            id: 5,
            hero_id: 1,
            position: Vector2::new(16, 16),
        };
        let mut delta = WorldDelta::default();
        delta.recent_walls.push(wall.clone());
        let (generation, _) = sync.begin_cycle(&mut world).unwrap();
        sync.complete_cycle(generation, Ok(delta), &mut world, 0);
        assert!(world.spatial.has_wall_at(Vector2::new(16, 16)));
        let count = world.scene.len();

        // Redelivery below the watermark spawns nothing new.
        let mut delta = WorldDelta::default();
        delta.recent_walls.push(wall);
        let (generation, _) = sync.begin_cycle(&mut world).unwrap();
        sync.complete_cycle(generation, Ok(delta), &mut world, 1_000);
        assert_eq!(world.scene.len(), count);

        // The request for the next cycle carries the watermark.
        let (_, request) = sync.begin_cycle(&mut world).unwrap();
        assert_eq!(request.since_wall_id, Some(5));

        // A delta without the wall culls it quietly.
        let (generation, _) = sync.begin_cycle(&mut world).unwrap();
        sync.complete_cycle(generation, Ok(WorldDelta::default()), &mut world, 2_000);
        assert!(!world.spatial.has_wall_at(Vector2::new(16, 16)));
    }

    #[test]
    fn local_death_event_produces_report() {
        let mut sync = NetworkSync::new();
        let mut world = bound_world();

        let mut delta = WorldDelta::default();
        delta.current_score = 77;
        delta.time_on_level_seconds = 41;
        delta.walls_placed_for_run = 6;
        delta.events.push(EventEnvelope {
            id: 9,
            event: RemoteEvent::HeroDeath {
                hero_id: Some(1),
                by_hero_id: Some(2),
            },
        });
        let (generation, _) = sync.begin_cycle(&mut world).unwrap();
        let actions = sync.complete_cycle(generation, Ok(delta), &mut world, 0);

        assert_eq!(actions.len(), 1);
        match &actions[0] {
            SyncAction::RecordDeath(report) => {
                assert_eq!(report.hero_id, 1);
                assert_eq!(report.score, 77);
                assert_eq!(report.time_on_level_seconds, 41);
                assert_eq!(report.walls_placed, 6);
            }
            other => panic!("unexpected action {:?}", other),
        }
        let node = world.local_node().unwrap();
        assert!(world.scene.character(node).unwrap().dying);
    }

    #[test]
    fn death_event_without_identity_is_dropped() {
        let mut sync = NetworkSync::new();
        let mut world = bound_world();

        let delta = delta_with_events(vec![EventEnvelope {
            id: 3,
            event: RemoteEvent::HeroDeath {
                hero_id: None,
                by_hero_id: None,
            },
        }]);
        let (generation, _) = sync.begin_cycle(&mut world).unwrap();
        let actions = sync.complete_cycle(generation, Ok(delta), &mut world, 0);
        assert!(actions.is_empty());
        assert!(world.heroes.contains_key(&1));
    }

    #[test]
    fn server_level_switch_resets_wall_tracking() {
        let mut sync = NetworkSync::new();
        let mut world = bound_world();

        let mut delta = WorldDelta::default();
        delta.recent_walls.push(WallSnapshot {
            id: 12,
            hero_id: 1,
            position: Vector2::new(32, 32),
        });
        let (generation, _) = sync.begin_cycle(&mut world).unwrap();
        sync.complete_cycle(generation, Ok(delta), &mut world, 0);
        assert_eq!(sync.begin_cycle(&mut world).unwrap().1.since_wall_id, Some(12));

        let mut delta = WorldDelta::default();
        delta.current_level = Some("grid-2".into());
        let (generation, _) = sync.begin_cycle(&mut world).unwrap();
        sync.complete_cycle(generation, Ok(delta), &mut world, 1_000);

        assert_eq!(world.session.level, "grid-2");
        assert_eq!(sync.begin_cycle(&mut world).unwrap().1.since_wall_id, None);
        assert!(!world.spatial.has_wall_at(Vector2::new(32, 32)));
    }
}
