//! One-shot delayed actions ("wait N seconds, then ...").
//!
//! Timers advance only when the scheduler ticks the network. A timer is
//! cancelled by destroying the host it belongs to.

use crate::fixed::{Fixed64, Seconds};
use crate::id::{HostId, TimerId};
use slotmap::SlotMap;

/// What happens to the host when its timer expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedAction {
    /// Stop behaviours and refuse deposits; contents are kept.
    Deactivate,
    /// Remove the host and everything attached to it.
    Destroy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayedAction {
    pub host: HostId,
    pub remaining: Seconds,
    pub action: TimedAction,
    /// Scheduling order, for deterministic firing.
    sequence: u64,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    timers: SlotMap<TimerId, DelayedAction>,
    next_sequence: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, host: HostId, delay: Seconds, action: TimedAction) -> TimerId {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.timers.insert(DelayedAction {
            host,
            remaining: delay,
            action,
            sequence,
        })
    }

    pub fn get(&self, id: TimerId) -> Option<&DelayedAction> {
        self.timers.get(id)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Advance every timer by `dt` and remove the expired ones, returned in
    /// scheduling order.
    pub fn advance(&mut self, dt: Seconds) -> Vec<DelayedAction> {
        let mut expired: Vec<TimerId> = Vec::new();
        for (id, timer) in &mut self.timers {
            timer.remaining -= dt;
            if timer.remaining <= Fixed64::ZERO {
                expired.push(id);
            }
        }
        let mut fired: Vec<DelayedAction> = expired
            .into_iter()
            .filter_map(|id| self.timers.remove(id))
            .collect();
        fired.sort_by_key(|t| t.sequence);
        fired
    }

    /// Drop every timer owned by `host`.
    pub fn cancel_host(&mut self, host: HostId) -> usize {
        let before = self.timers.len();
        self.timers.retain(|_, t| t.host != host);
        before - self.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64 as q;

    fn hosts(n: usize) -> Vec<HostId> {
        let mut sm = SlotMap::<HostId, ()>::with_key();
        (0..n).map(|_| sm.insert(())).collect()
    }

    #[test]
    fn fires_once_after_delay() {
        let h = hosts(1);
        let mut queue = TimerQueue::new();
        queue.schedule(h[0], q(2.0), TimedAction::Destroy);

        assert!(queue.advance(q(1.5)).is_empty());
        let fired = queue.advance(q(0.5));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].action, TimedAction::Destroy);
        assert!(queue.is_empty());
        assert!(queue.advance(q(10.0)).is_empty());
    }

    #[test]
    fn simultaneous_timers_fire_in_schedule_order() {
        let h = hosts(2);
        let mut queue = TimerQueue::new();
        queue.schedule(h[1], q(1.0), TimedAction::Deactivate);
        queue.schedule(h[0], q(0.5), TimedAction::Destroy);
        let fired = queue.advance(q(1.0));
        assert_eq!(fired.iter().map(|t| t.host).collect::<Vec<_>>(), vec![h[1], h[0]]);
    }

    #[test]
    fn cancel_host_drops_its_timers() {
        let h = hosts(2);
        let mut queue = TimerQueue::new();
        queue.schedule(h[0], q(1.0), TimedAction::Destroy);
        queue.schedule(h[0], q(2.0), TimedAction::Deactivate);
        let kept = queue.schedule(h[1], q(1.0), TimedAction::Destroy);

        assert_eq!(queue.cancel_host(h[0]), 2);
        assert_eq!(queue.len(), 1);
        assert!(queue.get(kept).is_some());
    }
}
