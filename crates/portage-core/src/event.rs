//! Typed event system with pre-allocated ring buffers.
//!
//! The network emits events as material moves and behaviours fire. They are
//! buffered per [`EventKind`] and delivered in batch to external listeners
//! (debug overlays, achievement hooks, audio) at the end of each tick, or on
//! demand through [`EventBus::deliver`].
//!
//! Internal reactions (distributors, upgrade gates, links) do not go through
//! the bus; the network runs them from its own signal queue so that they
//! fire within the same call as the deposit that triggered them.
//!
//! Listener registration returns a [`SubscriptionId`]; pass it to
//! [`EventBus::unsubscribe`] to stop receiving events.

use crate::fixed::{Quantity, Ticks};
use crate::id::*;
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A network event. All events carry the tick during which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Ports --
    ItemAdded {
        host: HostId,
        port: PortIndex,
        kind: ResourceKind,
        amount: Quantity,
        tick: Ticks,
    },
    ItemRemoved {
        host: HostId,
        port: PortIndex,
        kind: ResourceKind,
        amount: Quantity,
        tick: Ticks,
    },

    // -- Production --
    CraftStarted {
        host: HostId,
        tick: Ticks,
    },
    CraftCompleted {
        host: HostId,
        tick: Ticks,
    },
    OutputDiscarded {
        host: HostId,
        kind: ResourceKind,
        amount: Quantity,
        tick: Ticks,
    },
    UnitDisabled {
        host: HostId,
        tick: Ticks,
    },

    // -- Upgrades --
    UpgradeApplied {
        host: HostId,
        level: usize,
        tick: Ticks,
    },

    // -- Lifecycle --
    HostSpawned {
        host: HostId,
        tick: Ticks,
    },
    HostDestroyed {
        host: HostId,
        tick: Ticks,
    },
    HostDeactivated {
        host: HostId,
        tick: Ticks,
    },
    LinkAdded {
        link: LinkId,
        from: HostId,
        to: HostId,
        tick: Ticks,
    },
    LinkRemoved {
        link: LinkId,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for subscription and suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ItemAdded,
    ItemRemoved,
    CraftStarted,
    CraftCompleted,
    OutputDiscarded,
    UnitDisabled,
    UpgradeApplied,
    HostSpawned,
    HostDestroyed,
    HostDeactivated,
    LinkAdded,
    LinkRemoved,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 12;

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ItemAdded { .. } => EventKind::ItemAdded,
            Event::ItemRemoved { .. } => EventKind::ItemRemoved,
            Event::CraftStarted { .. } => EventKind::CraftStarted,
            Event::CraftCompleted { .. } => EventKind::CraftCompleted,
            Event::OutputDiscarded { .. } => EventKind::OutputDiscarded,
            Event::UnitDisabled { .. } => EventKind::UnitDisabled,
            Event::UpgradeApplied { .. } => EventKind::UpgradeApplied,
            Event::HostSpawned { .. } => EventKind::HostSpawned,
            Event::HostDestroyed { .. } => EventKind::HostDestroyed,
            Event::HostDeactivated { .. } => EventKind::HostDeactivated,
            Event::LinkAdded { .. } => EventKind::LinkAdded,
            Event::LinkRemoved { .. } => EventKind::LinkRemoved,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer: pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    /// Push an event. If full, the oldest event is dropped.
    pub fn push(&mut self, event: Event) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        let start = if self.len < self.capacity() { 0 } else { self.head };
        (0..self.len).filter_map(move |offset| {
            self.events[(start + offset) % self.capacity()].as_ref()
        })
    }

    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

/// A listener receives events read-only.
pub type Listener = Box<dyn FnMut(&Event)>;

/// Optional predicate that filters events for a listener.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

/// Priority level for listeners. Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriberPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

struct SubscriberEntry {
    kind: EventKind,
    listener: Listener,
    priority: SubscriberPriority,
    filter: Option<EventFilter>,
    insertion_order: u64,
}

impl std::fmt::Debug for SubscriberEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberEntry")
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("filtered", &self.filter.is_some())
            .field("insertion_order", &self.insertion_order)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// One ring buffer per event kind, the listener table, and suppression flags.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    subscribers: SlotMap<SubscriptionId, SubscriberEntry>,
    default_capacity: usize,
    next_insertion_order: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("subscribers", &self.subscribers.len())
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a bus whose per-kind buffers hold `default_capacity` events.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            subscribers: SlotMap::with_key(),
            default_capacity,
            next_insertion_order: 0,
        }
    }

    /// Suppressed kinds are never buffered or delivered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Register a listener with normal priority and no filter.
    pub fn subscribe(&mut self, kind: EventKind, listener: Listener) -> SubscriptionId {
        self.subscribe_filtered(kind, SubscriberPriority::Normal, None, listener)
    }

    pub fn subscribe_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: Listener,
    ) -> SubscriptionId {
        let insertion_order = self.next_insertion_order;
        self.next_insertion_order += 1;
        self.subscribers.insert(SubscriberEntry {
            kind,
            listener,
            priority,
            filter,
            insertion_order,
        })
    }

    /// Remove a listener. Returns `false` if the handle was already released.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver every buffered event to its listeners, ordered by
    /// `(priority, registration order)`, then clear the buffers.
    pub fn deliver(&mut self) {
        let mut order: Vec<(SubscriberPriority, u64, SubscriptionId)> = self
            .subscribers
            .iter()
            .map(|(id, entry)| (entry.priority, entry.insertion_order, id))
            .collect();
        order.sort();

        for idx in 0..EVENT_KIND_COUNT {
            let Some(buffer) = self.buffers[idx].as_mut() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }
            // Copy out so listeners never observe the buffer being cleared.
            let events: Vec<Event> = buffer.iter().cloned().collect();
            buffer.clear();

            for (_, _, id) in &order {
                let Some(entry) = self.subscribers.get_mut(*id) else {
                    continue;
                };
                if entry.kind.index() != idx {
                    continue;
                }
                for event in &events {
                    if let Some(filter) = &entry.filter
                        && !filter(event)
                    {
                        continue;
                    }
                    (entry.listener)(event);
                }
            }
        }
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffers[kind.index()]
            .as_ref()
            .map(|b| b.len())
            .unwrap_or(0)
    }

    /// Total events ever emitted for a kind (including dropped).
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffers[kind.index()]
            .as_ref()
            .map(|b| b.total_written())
            .unwrap_or(0)
    }

    /// Clear all buffers. Listeners and suppression settings are kept.
    pub fn clear_all(&mut self) {
        for buffer in self.buffers.iter_mut().flatten() {
            buffer.clear();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
