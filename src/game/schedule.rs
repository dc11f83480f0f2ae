//! Deferred simulation work with cancellable handles
//!
//! Arrival debounces, bubble expiry, and death cleanup all run "later" in
//! simulation time. Each scheduled action gets a generational handle;
//! cancelling an already-fired or already-cancelled handle is a no-op, so
//! owners can cancel unconditionally on teardown.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use slotmap::{new_key_type, SlotMap};

use crate::scene::NodeId;

new_key_type! {
    /// Handle to one scheduled action
    pub struct TaskHandle;
}

/// Work the scheduler hands back once due
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredAction {
    /// Rest a character into its stand animation
    SetStand(NodeId),
    /// Clear a chat bubble if it still shows the same signed message
    ClearBubble { node: NodeId, signature: String },
    /// Remove a node from the scene
    FreeNode(NodeId),
}

struct Scheduled {
    action: DeferredAction,
}

#[derive(Default)]
pub struct Scheduler {
    tasks: SlotMap<TaskHandle, Scheduled>,
    queue: BinaryHeap<Reverse<(u64, u64, TaskHandle)>>,
    seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an action to fire at an absolute simulation time
    pub fn schedule_at(&mut self, due_ms: u64, action: DeferredAction) -> TaskHandle {
        let handle = self.tasks.insert(Scheduled { action });
        self.seq += 1;
        self.queue.push(Reverse((due_ms, self.seq, handle)));
        handle
    }

    /// Schedule an action `delay_ms` from `now`
    pub fn schedule_after(&mut self, now: u64, delay_ms: u64, action: DeferredAction) -> TaskHandle {
        self.schedule_at(now + delay_ms, action)
    }

    /// Cancel a pending action. Returns false if it already fired or was
    /// already cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.tasks.remove(handle).is_some()
    }

    /// Pop every action due at or before `now`, in due order (FIFO among
    /// equal timestamps). Cancelled entries are skipped.
    pub fn drain_due(&mut self, now: u64) -> Vec<DeferredAction> {
        let mut due = Vec::new();
        while let Some(Reverse((due_ms, _, handle))) = self.queue.peek().copied() {
            if due_ms > now {
                break;
            }
            self.queue.pop();
            if let Some(scheduled) = self.tasks.remove(handle) {
                due.push(scheduled.action);
            }
        }
        due
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_only_once_due() {
        let mut scheduler = Scheduler::new();
        let node = NodeId::default();
        scheduler.schedule_at(1_000, DeferredAction::FreeNode(node));

        assert!(scheduler.drain_due(999).is_empty());
        assert_eq!(
            scheduler.drain_due(1_000),
            vec![DeferredAction::FreeNode(node)]
        );
        assert!(scheduler.drain_due(2_000).is_empty());
    }

    #[test]
    fn equal_deadlines_fire_in_schedule_order() {
        let mut scheduler = Scheduler::new();
        let a = DeferredAction::SetStand(NodeId::default());
        let b = DeferredAction::FreeNode(NodeId::default());
        scheduler.schedule_at(500, a.clone());
        scheduler.schedule_at(500, b.clone());

        assert_eq!(scheduler.drain_due(500), vec![a, b]);
    }

    #[test]
    fn cancelled_actions_never_fire() {
        let mut scheduler = Scheduler::new();
        let keep = scheduler.schedule_at(100, DeferredAction::SetStand(NodeId::default()));
        let drop = scheduler.schedule_at(100, DeferredAction::FreeNode(NodeId::default()));

        assert!(scheduler.cancel(drop));
        assert!(!scheduler.cancel(drop));
        let fired = scheduler.drain_due(100);
        assert_eq!(fired, vec![DeferredAction::SetStand(NodeId::default())]);
        assert!(!scheduler.cancel(keep));
    }

    #[test]
    fn stale_handle_cannot_cancel_newer_task() {
        let mut scheduler = Scheduler::new();
        let old = scheduler.schedule_at(100, DeferredAction::SetStand(NodeId::default()));
        scheduler.cancel(old);

        // The slot may be reused; the stale handle must not reach the new task.
        scheduler.schedule_at(200, DeferredAction::FreeNode(NodeId::default()));
        assert!(!scheduler.cancel(old));
        assert_eq!(scheduler.drain_due(200).len(), 1);
    }

    #[test]
    fn schedule_after_offsets_from_now() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_after(5_000, 300, DeferredAction::SetStand(NodeId::default()));
        assert!(scheduler.drain_due(5_299).is_empty());
        assert_eq!(scheduler.drain_due(5_300).len(), 1);
    }
}
