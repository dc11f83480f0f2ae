//! Session lifecycle and the fixed-step game loop
//!
//! One session is one bound hero in one world. The loop runs at the
//! simulation tick rate on a single logical thread; the only other tasks are
//! spawned world-delta fetches, which report back over a channel tagged with
//! their poll generation. A fetch superseded by a newer poll tick is aborted,
//! and its result (if it raced the abort) is dropped by the generation check
//! in `NetworkSync`.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::Config;
use crate::game::world::World;
use crate::geom::GRID_CELL;
use crate::net::api::{ApiClient, ApiError};
use crate::net::protocol::WorldDelta;
use crate::net::sync::{NetworkSync, SyncAction};
use crate::render::DrawSurface;
use crate::util::time::{unix_millis, TICK_DURATION_MICROS};

/// How a session's run loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Process shutdown was requested
    Shutdown,
    /// Outage recovery asked for a full rebuild of the client world
    Reload,
}

type PollResult = (u64, Result<WorldDelta, ApiError>);

/// Seeded random walk for the local hero. A headless client still has to
/// move to exercise trail emission and polling; the bot picks a fresh
/// grid-aligned destination every few seconds.
pub struct WanderBot {
    rng: ChaCha8Rng,
    next_pick_ms: u64,
}

impl WanderBot {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_pick_ms: 0,
        }
    }

    pub fn drive(&mut self, world: &mut World, now: u64) {
        if now < self.next_pick_ms {
            return;
        }
        let Some(position) = world.local_position() else {
            return;
        };
        let cells = self.rng.gen_range(1..=5);
        let (dx, dy) = match self.rng.gen_range(0..4) {
            0 => (1, 0),
            1 => (-1, 0),
            2 => (0, 1),
            _ => (0, -1),
        };
        let destination = position
            .offset(dx * cells * GRID_CELL, dy * cells * GRID_CELL)
            .snapped_to_grid();
        world.set_local_destination(destination);
        self.next_pick_ms = now + self.rng.gen_range(2_000..4_000);
    }
}

pub struct GameSession {
    world: World,
    sync: NetworkSync,
    api: ApiClient,
    poll_interval_ms: u64,
    last_poll_ms: Option<u64>,
    bot: Option<WanderBot>,
    inflight: Option<JoinHandle<()>>,
    results_tx: mpsc::UnboundedSender<PollResult>,
    results_rx: mpsc::UnboundedReceiver<PollResult>,
}

impl GameSession {
    /// Fetch or create the hero for this user and build the world around it
    pub async fn bootstrap(config: &Config, api: ApiClient) -> Result<Self, ApiError> {
        let snapshot = api.fetch_or_create_hero(config.user_id).await?;
        info!(
            hero_id = snapshot.id,
            x = snapshot.position.x,
            y = snapshot.position.y,
            "hero bound"
        );

        let level = snapshot.level.clone().unwrap_or_else(|| "grid-1".to_string());
        let mut world = World::new(level);
        world.bind_local_hero(&snapshot);

        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Ok(Self {
            world,
            sync: NetworkSync::new(),
            api,
            poll_interval_ms: config.poll_interval_ms,
            last_poll_ms: None,
            bot: config
                .wander_enabled
                .then(|| WanderBot::new(config.bot_seed)),
            inflight: None,
            results_tx,
            results_rx,
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Run the fixed-step loop until shutdown or a forced reload
    pub async fn run(
        mut self,
        surface: &mut dyn DrawSurface,
        mut shutdown: watch::Receiver<bool>,
    ) -> SessionOutcome {
        let mut ticker = interval(Duration::from_micros(TICK_DURATION_MICROS));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let outcome = loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown too.
                    if changed.is_err() || *shutdown.borrow() {
                        break SessionOutcome::Shutdown;
                    }
                    continue;
                }
            }
            if let Some(outcome) = self.step(unix_millis(), surface).await {
                break outcome;
            }
        };

        if let Some(handle) = self.inflight.take() {
            handle.abort();
        }
        outcome
    }

    /// One tick: drain finished fetches, start a poll when one is due, let
    /// the bot steer, deliver due scheduled actions, step the scene, render.
    /// Some(outcome) ends the session: a forced reload from outage recovery,
    /// or the local hero's node being freed after its death effect (a fresh
    /// hero has to be bound, so the session unwinds the same way).
    async fn step(&mut self, now: u64, surface: &mut dyn DrawSurface) -> Option<SessionOutcome> {
        while let Ok((generation, result)) = self.results_rx.try_recv() {
            let actions = self.sync.complete_cycle(generation, result, &mut self.world, now);
            if self.execute(actions).await {
                return Some(SessionOutcome::Reload);
            }
        }

        let due = self
            .last_poll_ms
            .map_or(true, |last| now.saturating_sub(last) >= self.poll_interval_ms);
        if due {
            self.last_poll_ms = Some(now);
            self.begin_poll();
        }

        if let Some(bot) = &mut self.bot {
            bot.drive(&mut self.world, now);
        }

        self.world.run_due(now);
        if self.world.local_id.is_none() {
            info!("local hero released; rebuilding the session");
            return Some(SessionOutcome::Reload);
        }
        self.world.update(now);
        self.world.render(now, surface);
        None
    }

    /// Kick off a world-delta fetch for a fresh generation. The previous
    /// fetch, if still in flight, is aborted: at most one outstanding
    /// request at a time.
    fn begin_poll(&mut self) {
        if let Some(previous) = self.inflight.take() {
            previous.abort();
        }
        let Some((generation, request)) = self.sync.begin_cycle(&mut self.world) else {
            return;
        };
        let api = self.api.clone();
        let tx = self.results_tx.clone();
        self.inflight = Some(tokio::spawn(async move {
            let result = api.fetch_updates(&request).await;
            let _ = tx.send((generation, result));
        }));
    }

    /// Carry out the backend work a completed cycle asked for. All of it is
    /// best-effort: the server's state is the source of truth, and a failed
    /// compensation call is logged, not retried.
    async fn execute(&mut self, actions: Vec<SyncAction>) -> bool {
        let mut reload = false;
        for action in actions {
            match action {
                SyncAction::DeleteWalls(cells) => {
                    if let Some(hero_id) = self.world.local_id {
                        if let Err(error) = self.api.delete_walls(hero_id, &cells).await {
                            warn!(%error, "failed to delete offline walls");
                        }
                    }
                }
                SyncAction::RestorePosition(position) => {
                    if let Some(hero_id) = self.world.local_id {
                        if let Err(error) = self.api.set_hero_position(hero_id, position).await {
                            warn!(%error, "failed to restore hero position");
                        }
                    }
                }
                SyncAction::RecordDeath(report) => {
                    if let Err(error) = self.api.record_death(&report).await {
                        warn!(%error, "failed to record death");
                    }
                }
                SyncAction::ForceReload => reload = true,
            }
        }
        reload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vector2;
    use crate::net::protocol::HeroSnapshot;
    use crate::render::NullSurface;
    use crate::scene::character::DEATH_EFFECT_MS;

    fn world_with_local() -> World {
        let mut world = World::new("grid-1");
        world.bind_local_hero(&HeroSnapshot {
            id: 1,
            name: "bot".into(),
            position: Vector2::new(64, 64),
            speed: 2,
            color: None,
            mask: None,
            level: Some("grid-1".into()),
            kills: 0,
            created: None,
        });
        world
    }

    fn local_destination(world: &World) -> Vector2 {
        let node = world.local_node().unwrap();
        world.scene.character(node).unwrap().destination
    }

    #[test]
    fn bot_picks_grid_aligned_destinations() {
        let mut world = world_with_local();
        let mut bot = WanderBot::new(7);

        bot.drive(&mut world, 0);
        let destination = local_destination(&world);
        assert_ne!(destination, Vector2::new(64, 64));
        assert_eq!(destination.x % GRID_CELL, 0);
        assert_eq!(destination.y % GRID_CELL, 0);
    }

    #[test]
    fn bot_is_deterministic_for_a_seed() {
        let mut first = world_with_local();
        let mut second = world_with_local();

        WanderBot::new(99).drive(&mut first, 0);
        WanderBot::new(99).drive(&mut second, 0);
        assert_eq!(local_destination(&first), local_destination(&second));
    }

    #[test]
    fn bot_waits_between_picks() {
        let mut world = world_with_local();
        let mut bot = WanderBot::new(7);

        bot.drive(&mut world, 0);
        let chosen = local_destination(&world);

        // Well inside the minimum 2s gap: no re-pick.
        bot.drive(&mut world, 500);
        assert_eq!(local_destination(&world), chosen);
    }

    fn test_session() -> GameSession {
        // Port 1 refuses connections, so any poll that does fire fails fast.
        let config = Config {
            server_url: "http://127.0.0.1:1".into(),
            user_id: 1,
            log_level: "info".into(),
            poll_interval_ms: 1_000,
            request_timeout_ms: 250,
            wander_enabled: false,
            bot_seed: 0,
        };
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        GameSession {
            world: world_with_local(),
            sync: NetworkSync::new(),
            api: ApiClient::new(&config),
            poll_interval_ms: config.poll_interval_ms,
            last_poll_ms: None,
            bot: None,
            inflight: None,
            results_tx,
            results_rx,
        }
    }

    #[test]
    fn local_death_ends_the_session_with_a_reload() {
        tokio_test::block_on(async {
            let mut session = test_session();
            let mut surface = NullSurface;

            session.world.kill_hero(1, 0);
            // The death effect still plays; the loop keeps ticking.
            assert_eq!(session.step(0, &mut surface).await, None);

            // Once the effect frees the hero node, the session unwinds so
            // a fresh hero can be bound.
            let outcome = session.step(DEATH_EFFECT_MS, &mut surface).await;
            assert_eq!(outcome, Some(SessionOutcome::Reload));
        });
    }

    #[test]
    fn locked_hero_ignores_the_bot() {
        let mut world = world_with_local();
        let node = world.local_node().unwrap();
        world.scene.character_mut(node).unwrap().locked = true;

        WanderBot::new(7).drive(&mut world, 0);
        assert_eq!(local_destination(&world), Vector2::new(64, 64));
    }
}
