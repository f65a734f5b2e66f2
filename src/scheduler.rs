/// Deterministic event queue.
///
/// Uses a `BinaryHeap` with reversed `Ord` on `Event` to act as a
/// min-heap keyed by `(due, event_id)`. Because event IDs are strictly
/// increasing, events due at the same instant come out in insertion
/// order, and two runs with the same inputs produce the same dispatch
/// order.
///
/// Cancellation is lazy: a cancelled event stays in the heap but is no
/// longer in the pending set, and is skipped when it reaches the top.

use std::collections::{BTreeSet, BinaryHeap};

use crate::event::{Event, EventId, EventIdGen};
use crate::time::VirtualTime;

/// The core deterministic event queue.
///
/// Owns the heap and the ID generator. All insertions go through this
/// struct to ensure monotonic IDs and deterministic ordering.
#[derive(Debug, Clone)]
pub struct Scheduler<A> {
    /// Min-heap (via reversed Ord on Event).
    queue: BinaryHeap<Event<A>>,

    /// IDs of events that are scheduled and neither fired nor cancelled.
    pending: BTreeSet<EventId>,

    /// Monotonic event-ID generator.
    id_gen: EventIdGen,
}

impl<A> Scheduler<A> {
    /// Create a new, empty scheduler.
    pub fn new() -> Self {
        Scheduler {
            queue: BinaryHeap::new(),
            pending: BTreeSet::new(),
            id_gen: EventIdGen::new(),
        }
    }

    /// Insert an event due at the given virtual time.
    ///
    /// Returns the `EventId` assigned to this event.
    pub fn schedule(&mut self, due: VirtualTime, action: A) -> EventId {
        let id = self.id_gen.next_id();
        self.queue.push(Event::new(id, due, action));
        self.pending.insert(id);
        id
    }

    /// Cancel a pending event.
    ///
    /// Returns `false` if the event already fired, was already cancelled,
    /// or was never issued.
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.pending.remove(&id)
    }

    /// Returns `true` if `id` is still waiting to fire.
    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains(&id)
    }

    /// Pop the next live event (earliest time, lowest ID).
    ///
    /// Returns `None` when no live events remain.
    pub fn pop_next(&mut self) -> Option<Event<A>> {
        while let Some(event) = self.queue.pop() {
            if self.pending.remove(&event.id) {
                return Some(event);
            }
        }
        None
    }

    /// Due time of the next live event, discarding cancelled heads.
    pub fn peek_time(&mut self) -> Option<VirtualTime> {
        while let Some(top) = self.queue.peek() {
            if self.pending.contains(&top.id) {
                return Some(top.due);
            }
            self.queue.pop();
        }
        None
    }

    /// Returns `true` if no live events remain.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of live events.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Drain all live events in dispatch order into a `Vec`.
    pub fn drain_ordered(&mut self) -> Vec<Event<A>> {
        let mut events = Vec::with_capacity(self.pending.len());
        while let Some(e) = self.pop_next() {
            events.push(e);
        }
        events
    }
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}
