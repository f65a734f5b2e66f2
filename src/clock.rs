/// Virtual clock and dispatch loop.
///
/// Owns the event queue and the current virtual time. Pops due events,
/// advances time, and hands each one to a dispatcher. The loop is purely
/// synchronous and single-threaded: an action runs to completion before
/// the next event is considered.

use tracing::trace;

use crate::error::{KernelError, KernelResult};
use crate::event::{Event, EventId};
use crate::scheduler::Scheduler;
use crate::time::{Delay, VirtualTime};

// ── Dispatch trait ────────────────────────────────────────────────────

/// Receives every event the clock dispatches.
///
/// The dispatcher gets the clock back mutably so it can schedule or
/// cancel follow-up events; those only affect future dispatch.
pub trait Dispatch<A> {
    /// Called once per dispatched event, with the clock already set to
    /// the event's due time.
    fn dispatch(&mut self, clock: &mut Clock<A>, event: Event<A>);
}

/// A dispatcher backed by a closure, useful for tests and small drivers.
impl<A, F> Dispatch<A> for F
where
    F: FnMut(&mut Clock<A>, Event<A>),
{
    fn dispatch(&mut self, clock: &mut Clock<A>, event: Event<A>) {
        (self)(clock, event);
    }
}

// ── Clock ─────────────────────────────────────────────────────────────

/// The simulation clock.
#[derive(Debug, Clone)]
pub struct Clock<A> {
    scheduler: Scheduler<A>,
    now: VirtualTime,
    events_processed: u64,
}

impl<A> Clock<A> {
    /// Create a clock at time zero with an empty queue.
    pub fn new() -> Self {
        Clock {
            scheduler: Scheduler::new(),
            now: VirtualTime::ZERO,
            events_processed: 0,
        }
    }

    /// Current virtual time.
    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// Total events dispatched so far.
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Number of live pending events.
    pub fn pending(&self) -> usize {
        self.scheduler.len()
    }

    /// Returns `true` if nothing is left to dispatch.
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_empty()
    }

    /// Due time of the next live event.
    pub fn peek_time(&mut self) -> Option<VirtualTime> {
        self.scheduler.peek_time()
    }

    /// Schedule `action` to run `delay` units after now.
    ///
    /// Fails with [`KernelError::InvalidDelay`] for negative or
    /// non-finite delays; the queue is left untouched in that case.
    pub fn schedule(&mut self, delay: f64, action: A) -> KernelResult<EventId> {
        let delay = Delay::new(delay)?;
        self.schedule_after(delay, action)
    }

    /// Schedule with an already-validated delay.
    ///
    /// Fails with [`KernelError::InvalidTime`] if the due time would
    /// overflow past the largest finite time.
    pub fn schedule_after(&mut self, delay: Delay, action: A) -> KernelResult<EventId> {
        let due = self
            .now
            .plus(delay)
            .ok_or(KernelError::InvalidTime(self.now.as_f64() + delay.as_f64()))?;
        let id = self.scheduler.schedule(due, action);
        trace!(event = %id, due = %due, "scheduled");
        Ok(id)
    }

    /// Schedule `action` at the current instant, behind everything
    /// already due now.
    pub fn schedule_now(&mut self, action: A) -> EventId {
        let id = self.scheduler.schedule(self.now, action);
        trace!(event = %id, due = %self.now, "scheduled");
        id
    }

    /// Schedule `action` at an absolute time.
    ///
    /// Fails with [`KernelError::InvalidTime`] if `at` is in the past.
    pub fn schedule_at(&mut self, at: VirtualTime, action: A) -> KernelResult<EventId> {
        if at < self.now {
            return Err(KernelError::InvalidTime(at.as_f64()));
        }
        Ok(self.scheduler.schedule(at, action))
    }

    /// Cancel a pending event. A no-op (returning `false`) if it has
    /// already fired or was already cancelled.
    pub fn cancel(&mut self, id: EventId) -> bool {
        let cancelled = self.scheduler.cancel(id);
        if cancelled {
            trace!(event = %id, "cancelled");
        }
        cancelled
    }

    /// Returns `true` if `id` has neither fired nor been cancelled.
    pub fn is_pending(&self, id: EventId) -> bool {
        self.scheduler.is_pending(id)
    }

    /// Pop the next event if it is due at or before `end`, advancing the
    /// clock to its due time.
    pub fn pop_due(&mut self, end: VirtualTime) -> Option<Event<A>> {
        if self.scheduler.peek_time()? > end {
            return None;
        }
        let event = self.scheduler.pop_next()?;

        // Virtual time must never go backward.
        debug_assert!(
            event.due >= self.now,
            "time went backward: now={}, event={}",
            self.now,
            event.due
        );
        self.now = self.now.max(event.due);
        self.events_processed += 1;
        Some(event)
    }

    /// Move the clock forward to `end` without dispatching anything.
    ///
    /// Only ever moves forward; used once a run reaches its horizon.
    pub fn advance_to(&mut self, end: VirtualTime) {
        self.now = self.now.max(end);
    }

    /// Dispatch exactly one event, whatever its due time.
    ///
    /// Returns `false` if the queue was empty.
    pub fn step(&mut self, dispatcher: &mut dyn Dispatch<A>) -> bool {
        let Some(due) = self.peek_time() else {
            return false;
        };
        match self.pop_due(due) {
            Some(event) => {
                dispatcher.dispatch(self, event);
                true
            }
            None => false,
        }
    }

    /// Dispatch every event due at or before `end`, then leave the clock
    /// reading `end` (or later, if it already was).
    ///
    /// Returns the number of events dispatched by this call.
    pub fn run_until(&mut self, end: VirtualTime, dispatcher: &mut dyn Dispatch<A>) -> u64 {
        let start = self.events_processed;
        while let Some(event) = self.pop_due(end) {
            dispatcher.dispatch(self, event);
        }
        self.advance_to(end);
        self.events_processed - start
    }
}

impl<A> Default for Clock<A> {
    fn default() -> Self {
        Self::new()
    }
}
