//! Character animation and chat state
//!
//! A character is either standing, walking, or playing a one-shot animation,
//! always with a cardinal facing. Transitions that happen "later" (settling
//! into stand after arrival, clearing a chat bubble) go through the
//! scheduler so they can be cancelled when superseded or on destroy.

use sha2::{Digest, Sha256};

use crate::game::schedule::{DeferredAction, Scheduler, TaskHandle};
use crate::geom::{Direction, Vector2};
use crate::scene::NodeId;

/// Distance at which a walker counts as arrived
pub const ARRIVAL_DISTANCE: f64 = 1.0;
/// Delay before the local hero settles into stand after arriving
pub const STAND_DELAY_LOCAL_MS: u64 = 1_000;
/// Delay before a remote hero settles; longer to ride out polling gaps
pub const STAND_DELAY_REMOTE_MS: u64 = 1_500;
/// Arrivals closer together than this keep the earlier stand timer
pub const STAND_DEBOUNCE_MS: u64 = 300;
/// How long a chat bubble stays up
pub const BUBBLE_CLEAR_MS: u64 = 5_000;
/// Death effect duration before the node is freed
pub const DEATH_EFFECT_MS: u64 = 1_200;
/// One-shot animation lengths
pub const PICKUP_MS: u64 = 500;
pub const ATTACK_MS: u64 = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Animation {
    Stand,
    Walk,
    PickUp,
    Attack,
}

/// A message shown above a character's head
#[derive(Debug, Clone, PartialEq)]
pub struct ChatBubble {
    pub text: String,
    pub posted_ms: u64,
}

impl ChatBubble {
    pub fn signature(&self) -> String {
        message_signature(&self.text, self.posted_ms)
    }
}

/// Content+timestamp signature of a chat message. Used to tell a redelivered
/// copy of an already-expired message apart from a genuinely new one.
pub fn message_signature(text: &str, posted_ms: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(b"|");
    hasher.update(posted_ms.to_le_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug)]
pub struct Character {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
    pub mask: Option<i32>,
    /// True only for the hero this client controls
    pub user_controlled: bool,
    /// World units per simulation tick
    pub speed: i32,
    pub destination: Vector2,
    pub facing: Direction,
    pub animation: Animation,
    pub animation_started_ms: u64,
    /// Locked characters neither move nor re-evaluate animation
    pub locked: bool,
    pub dying: bool,
    /// Skip the death effect when the entity was already animated remotely
    pub prevent_destroy_animation: bool,
    pub kills: i64,
    pub bubble: Option<ChatBubble>,
    pub bubble_task: Option<TaskHandle>,
    pub stand_task: Option<TaskHandle>,
    pub last_arrival_ms: Option<u64>,
    /// Anchor of the most recent trail emission
    pub last_emission: Vector2,
    /// Signature of the last auto-cleared bubble, so a redelivery of the
    /// same message does not resurrect it
    pub cleared_signature: Option<String>,
}

impl Character {
    pub fn new(id: i64, name: impl Into<String>, position: Vector2, speed: i32) -> Self {
        Self {
            id,
            name: name.into(),
            color: None,
            mask: None,
            user_controlled: false,
            speed,
            destination: position,
            facing: Direction::Down,
            animation: Animation::Stand,
            animation_started_ms: 0,
            locked: false,
            dying: false,
            prevent_destroy_animation: false,
            kills: 0,
            bubble: None,
            bubble_task: None,
            stand_task: None,
            last_arrival_ms: None,
            last_emission: position,
            cleared_signature: None,
        }
    }

    pub fn is_walking(&self) -> bool {
        self.animation == Animation::Walk
    }

    /// Enter (or keep) the walk animation toward `facing`. Returns false
    /// when locked. A pending stand transition is cancelled: the character
    /// is moving again.
    pub fn begin_walk(&mut self, facing: Direction, now: u64, scheduler: &mut Scheduler) -> bool {
        if self.locked {
            return false;
        }
        if let Some(task) = self.stand_task.take() {
            scheduler.cancel(task);
        }
        if self.animation != Animation::Walk || self.facing != facing {
            self.animation = Animation::Walk;
            self.animation_started_ms = now;
            self.facing = facing;
        }
        true
    }

    /// Note that the character reached its destination. Schedules the
    /// delayed walk-to-stand transition; arrivals inside the debounce
    /// window keep the earlier timer instead of restarting it.
    pub fn note_arrival(&mut self, node: NodeId, now: u64, scheduler: &mut Scheduler) {
        let within_debounce = self
            .last_arrival_ms
            .map_or(false, |prev| now.saturating_sub(prev) < STAND_DEBOUNCE_MS);
        self.last_arrival_ms = Some(now);
        if within_debounce && self.stand_task.is_some() {
            return;
        }
        if let Some(task) = self.stand_task.take() {
            scheduler.cancel(task);
        }
        let delay = if self.user_controlled {
            STAND_DELAY_LOCAL_MS
        } else {
            STAND_DELAY_REMOTE_MS
        };
        self.stand_task = Some(scheduler.schedule_after(now, delay, DeferredAction::SetStand(node)));
    }

    /// The scheduled stand transition fired
    pub fn settle(&mut self, now: u64) {
        self.stand_task = None;
        if self.locked {
            return;
        }
        self.animation = Animation::Stand;
        self.animation_started_ms = now;
    }

    /// Show a chat bubble. Returns false when the identical message was
    /// already cleared (a stale redelivery) or is already showing.
    pub fn say(
        &mut self,
        node: NodeId,
        text: String,
        posted_ms: u64,
        now: u64,
        scheduler: &mut Scheduler,
    ) -> bool {
        let signature = message_signature(&text, posted_ms);
        if self.cleared_signature.as_deref() == Some(signature.as_str()) {
            return false;
        }
        if let Some(current) = &self.bubble {
            if current.signature() == signature {
                return false;
            }
        }
        if let Some(task) = self.bubble_task.take() {
            scheduler.cancel(task);
        }
        self.bubble = Some(ChatBubble { text, posted_ms });
        self.bubble_task = Some(scheduler.schedule_after(
            now,
            BUBBLE_CLEAR_MS,
            DeferredAction::ClearBubble { node, signature },
        ));
        true
    }

    /// The scheduled auto-clear fired. Only clears if the bubble still
    /// shows the message the timer was armed for.
    pub fn expire_bubble(&mut self, signature: &str) {
        self.bubble_task = None;
        let matches = self
            .bubble
            .as_ref()
            .map_or(false, |bubble| bubble.signature() == signature);
        if matches {
            self.bubble = None;
            self.cleared_signature = Some(signature.to_string());
        }
    }

    /// One-shot pickup animation; refused while locked
    pub fn pick_up(&mut self, node: NodeId, now: u64, scheduler: &mut Scheduler) -> bool {
        if self.locked {
            return false;
        }
        if let Some(task) = self.stand_task.take() {
            scheduler.cancel(task);
        }
        self.animation = Animation::PickUp;
        self.animation_started_ms = now;
        self.facing = Direction::Down;
        self.stand_task =
            Some(scheduler.schedule_after(now, PICKUP_MS, DeferredAction::SetStand(node)));
        true
    }

    /// One-shot attack animation toward `facing`; refused while locked
    pub fn attack(
        &mut self,
        node: NodeId,
        facing: Direction,
        now: u64,
        scheduler: &mut Scheduler,
    ) -> bool {
        if self.locked {
            return false;
        }
        if let Some(task) = self.stand_task.take() {
            scheduler.cancel(task);
        }
        self.animation = Animation::Attack;
        self.animation_started_ms = now;
        self.facing = facing;
        self.stand_task =
            Some(scheduler.schedule_after(now, ATTACK_MS, DeferredAction::SetStand(node)));
        true
    }

    /// Enter the dying state: locked, no further input or movement
    pub fn begin_death(&mut self) {
        self.locked = true;
        self.dying = true;
    }

    /// Cancel every timer this character owns. Called on destroy.
    pub fn cancel_tasks(&mut self, scheduler: &mut Scheduler) {
        if let Some(task) = self.stand_task.take() {
            scheduler.cancel(task);
        }
        if let Some(task) = self.bubble_task.take() {
            scheduler.cancel(task);
        }
    }
}
