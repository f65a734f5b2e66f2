/// Event records for the simulation clock.
///
/// Every wake-up in the kernel is an `Event`: an action paired with the
/// virtual time at which it is due and a sequence number assigned at
/// insertion. The scheduler orders events by `(due_time, id)`.

use std::cmp::Ordering;

use crate::time::VirtualTime;

// ── Event ID ──────────────────────────────────────────────────────────

/// A globally unique, strictly-increasing event identifier.
///
/// Doubles as the event's sequence number: two events due at the same
/// `VirtualTime` are ordered by their `EventId`, which corresponds to
/// insertion order. It is also the handle used to cancel an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(u64);

impl EventId {
    /// Wrap a raw u64 into an `EventId`.
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
    }

    /// Return the raw value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

// ── Event ID Generator ───────────────────────────────────────────────

/// Deterministic, strictly-increasing event-ID generator.
///
/// Each clock owns exactly one of these.
#[derive(Debug, Clone, Default)]
pub struct EventIdGen {
    next: u64,
}

impl EventIdGen {
    /// Create a generator starting at 0.
    pub fn new() -> Self {
        EventIdGen { next: 0 }
    }

    /// Mint the next event ID.
    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }
}

// ── Event ─────────────────────────────────────────────────────────────

/// A single pending wake-up.
///
/// Generic over the action payload so the clock can be exercised on its
/// own with plain data, while the kernel stores its process wake-ups.
#[derive(Debug, Clone)]
pub struct Event<A> {
    /// Unique identifier and tie-break sequence number.
    pub id: EventId,

    /// The virtual time at which this event is dispatched.
    pub due: VirtualTime,

    /// What to do when the event fires.
    pub action: A,
}

impl<A> Event<A> {
    /// Convenience constructor.
    pub fn new(id: EventId, due: VirtualTime, action: A) -> Self {
        Event { id, due, action }
    }

    /// The ordering key.
    #[inline]
    pub fn key(&self) -> (VirtualTime, EventId) {
        (self.due, self.id)
    }
}

impl<A> PartialEq for Event<A> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<A> Eq for Event<A> {}

/// Ordering: smallest `(due, id)` first.
///
/// `BinaryHeap` is a max-heap, so the natural ordering is reversed here.
impl<A> Ord for Event<A> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl<A> PartialOrd for Event<A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
