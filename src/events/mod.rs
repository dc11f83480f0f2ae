//! Typed in-process event bus for simulation systems
//!
//! Subscriptions are keyed by generational tokens, so dropping one is O(1)
//! and a stale token is a harmless no-op. Dispatch walks a snapshot of the
//! subscriber list: handlers may emit, subscribe, or unsubscribe re-entrantly
//! without invalidating the walk.

use std::cell::RefCell;

use slotmap::{new_key_type, SlotMap};

use crate::geom::Vector2;

new_key_type! {
    /// Token identifying one subscription
    pub struct Subscription;
}

/// Topics a handler can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    CharacterMoved,
    TrailWallSpawned,
    HeroDied,
    LevelChanged,
    ChatPosted,
    ScoreChanged,
    ServerStatus,
}

/// Payloads published on the bus
#[derive(Debug, Clone, PartialEq)]
pub enum GameSignal {
    /// A character's world position changed this tick
    CharacterMoved { id: i64, position: Vector2 },
    /// The local hero dropped a trail wall at a grid cell
    TrailWallSpawned { owner: i64, cell: Vector2 },
    HeroDied { id: i64 },
    LevelChanged { level: String },
    ChatPosted { id: i64, text: String },
    ScoreChanged { score: i64 },
    /// Backend reachability flipped; `down` is the new state
    ServerStatus { down: bool },
}

impl GameSignal {
    pub fn topic(&self) -> Topic {
        match self {
            GameSignal::CharacterMoved { .. } => Topic::CharacterMoved,
            GameSignal::TrailWallSpawned { .. } => Topic::TrailWallSpawned,
            GameSignal::HeroDied { .. } => Topic::HeroDied,
            GameSignal::LevelChanged { .. } => Topic::LevelChanged,
            GameSignal::ChatPosted { .. } => Topic::ChatPosted,
            GameSignal::ScoreChanged { .. } => Topic::ScoreChanged,
            GameSignal::ServerStatus { .. } => Topic::ServerStatus,
        }
    }
}

type Handler = Box<dyn FnMut(&GameSignal)>;

struct Registration {
    topic: Topic,
    // Taken out while the handler runs, so a nested emit cannot re-enter it
    handler: Option<Handler>,
}

#[derive(Default)]
struct Inner {
    subs: SlotMap<Subscription, Registration>,
    order: Vec<Subscription>,
}

/// Single-threaded pub/sub hub
pub struct EventBus {
    inner: RefCell<Inner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(Inner::default()),
        }
    }

    /// Register a handler for one topic. Dispatch order follows registration order.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: FnMut(&GameSignal) + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let token = inner.subs.insert(Registration {
            topic,
            handler: Some(Box::new(handler)),
        });
        inner.order.push(token);
        token
    }

    /// Drop a subscription. Returns false if the token was already gone.
    pub fn unsubscribe(&self, token: Subscription) -> bool {
        self.inner.borrow_mut().subs.remove(token).is_some()
    }

    /// Deliver a signal to every live subscriber of its topic.
    pub fn emit(&self, signal: &GameSignal) {
        let topic = signal.topic();
        let targets: Vec<Subscription> = {
            let mut inner = self.inner.borrow_mut();
            if inner.order.len() > inner.subs.len() * 2 {
                let Inner { subs, order } = &mut *inner;
                order.retain(|token| subs.contains_key(*token));
            }
            inner
                .order
                .iter()
                .copied()
                .filter(|token| {
                    inner
                        .subs
                        .get(*token)
                        .map_or(false, |reg| reg.topic == topic)
                })
                .collect()
        };

        for token in targets {
            let taken = {
                let mut inner = self.inner.borrow_mut();
                inner.subs.get_mut(token).and_then(|reg| reg.handler.take())
            };
            // None when a prior handler unsubscribed this one mid-dispatch
            let Some(mut handler) = taken else { continue };
            handler(signal);
            let mut inner = self.inner.borrow_mut();
            if let Some(reg) = inner.subs.get_mut(token) {
                reg.handler = Some(handler);
            }
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner
            .borrow()
            .subs
            .values()
            .filter(|reg| reg.topic == topic)
            .count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn moved(id: i64) -> GameSignal {
        GameSignal::CharacterMoved {
            id,
            position: Vector2::ZERO,
        }
    }

    #[test]
    fn delivers_in_registration_order() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in [1, 2, 3] {
            let log = Rc::clone(&log);
            bus.subscribe(Topic::CharacterMoved, move |_| log.borrow_mut().push(tag));
        }
        bus.emit(&moved(7));

        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn only_matching_topic_is_notified() {
        let bus = EventBus::new();
        let hits = Rc::new(RefCell::new(0));

        let hits2 = Rc::clone(&hits);
        bus.subscribe(Topic::HeroDied, move |_| *hits2.borrow_mut() += 1);
        bus.emit(&moved(1));
        assert_eq!(*hits.borrow(), 0);

        bus.emit(&GameSignal::HeroDied { id: 1 });
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery_and_is_idempotent() {
        let bus = EventBus::new();
        let hits = Rc::new(RefCell::new(0));

        let hits2 = Rc::clone(&hits);
        let token = bus.subscribe(Topic::CharacterMoved, move |_| *hits2.borrow_mut() += 1);
        bus.emit(&moved(1));
        assert!(bus.unsubscribe(token));
        assert!(!bus.unsubscribe(token));
        bus.emit(&moved(1));

        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn handler_unsubscribed_mid_dispatch_is_skipped() {
        let bus = Rc::new(EventBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        // First handler tears down the second before it runs.
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        {
            let bus2 = Rc::clone(&bus);
            let victim = Rc::clone(&victim);
            let log = Rc::clone(&log);
            bus.subscribe(Topic::CharacterMoved, move |_| {
                log.borrow_mut().push("first");
                if let Some(token) = victim.borrow_mut().take() {
                    bus2.unsubscribe(token);
                }
            });
        }
        {
            let log = Rc::clone(&log);
            let token =
                bus.subscribe(Topic::CharacterMoved, move |_| log.borrow_mut().push("second"));
            *victim.borrow_mut() = Some(token);
        }

        bus.emit(&moved(1));
        assert_eq!(*log.borrow(), vec!["first"]);
    }

    #[test]
    fn subscriber_added_mid_dispatch_misses_inflight_signal() {
        let bus = Rc::new(EventBus::new());
        let late_hits = Rc::new(RefCell::new(0));

        {
            let bus2 = Rc::clone(&bus);
            let late_hits = Rc::clone(&late_hits);
            bus.subscribe(Topic::CharacterMoved, move |_| {
                let late_hits = Rc::clone(&late_hits);
                bus2.subscribe(Topic::CharacterMoved, move |_| {
                    *late_hits.borrow_mut() += 1;
                });
            });
        }

        bus.emit(&moved(1));
        assert_eq!(*late_hits.borrow(), 0);
        bus.emit(&moved(1));
        assert_eq!(*late_hits.borrow(), 1);
    }

    #[test]
    fn nested_emit_reaches_other_subscribers() {
        let bus = Rc::new(EventBus::new());
        let deaths = Rc::new(RefCell::new(Vec::new()));

        {
            let deaths = Rc::clone(&deaths);
            bus.subscribe(Topic::HeroDied, move |signal| {
                if let GameSignal::HeroDied { id } = signal {
                    deaths.borrow_mut().push(*id);
                }
            });
        }
        {
            let bus2 = Rc::clone(&bus);
            bus.subscribe(Topic::CharacterMoved, move |_| {
                bus2.emit(&GameSignal::HeroDied { id: 42 });
            });
        }

        bus.emit(&moved(1));
        assert_eq!(*deaths.borrow(), vec![42]);
    }
}
