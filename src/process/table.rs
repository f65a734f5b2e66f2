//! `ProcessTable`: the kernel's exclusive registry of live processes.

use std::collections::BTreeMap;

use crate::event::EventId;
use crate::resource::{JointId, RequestId};

use super::{Process, ProcessId};

/// What a live process is currently parked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspension {
    /// Executing a step right now.
    Running,
    /// A `Yield::Timeout` wake-up is pending.
    Timer(EventId),
    /// Waiting for a grant.
    Request(RequestId),
    /// Waiting for a grant, with a fallback timer.
    RequestWithin { request: RequestId, timer: EventId },
    /// Waiting for every member of a joint.
    Joint(JointId),
    /// The wait is over and a resume event is queued (also used for the
    /// deferred start of processes spawned by other processes).
    Waking(EventId),
}

impl Suspension {
    /// The queued event that will resume the process, if any.
    pub fn pending_event(&self) -> Option<EventId> {
        match *self {
            Suspension::Timer(id) | Suspension::Waking(id) => Some(id),
            Suspension::RequestWithin { timer, .. } => Some(timer),
            Suspension::Running | Suspension::Request(_) | Suspension::Joint(_) => None,
        }
    }
}

/// One row of the table.
pub struct ProcessEntry<W> {
    /// `None` while the process is executing a step (the kernel holds it).
    pub(crate) process: Option<Box<dyn Process<W>>>,
    pub(crate) name: String,
    pub(crate) suspension: Suspension,
}

/// Lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessStats {
    pub spawned: u64,
    pub completed: u64,
    pub faulted: u64,
    pub cancelled: u64,
}

impl ProcessStats {
    /// Processes spawned and not yet gone.
    pub fn live(&self) -> u64 {
        self.spawned - self.completed - self.faulted - self.cancelled
    }
}

/// Live processes keyed by ID.
///
/// No reference to a process survives its removal: completion, fault
/// and cancellation all drop the row.
pub struct ProcessTable<W> {
    entries: BTreeMap<ProcessId, ProcessEntry<W>>,
    next_id: u64,
    pub(crate) stats: ProcessStats,
}

impl<W> ProcessTable<W> {
    /// Create an empty table.
    pub fn new() -> Self {
        ProcessTable {
            entries: BTreeMap::new(),
            next_id: 0,
            stats: ProcessStats::default(),
        }
    }

    /// Register a process in the `Running` state and return its ID.
    pub(crate) fn insert(&mut self, process: Box<dyn Process<W>>) -> ProcessId {
        let id = ProcessId::new(self.next_id);
        self.next_id += 1;
        self.stats.spawned += 1;
        let name = process.name().to_string();
        self.entries.insert(
            id,
            ProcessEntry {
                process: Some(process),
                name,
                suspension: Suspension::Running,
            },
        );
        id
    }

    pub(crate) fn get_mut(&mut self, id: ProcessId) -> Option<&mut ProcessEntry<W>> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: ProcessId) -> Option<ProcessEntry<W>> {
        self.entries.remove(&id)
    }

    /// Returns `true` if the process has not finished.
    pub fn contains(&self, id: ProcessId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Current suspension of a live process.
    pub fn suspension(&self, id: ProcessId) -> Option<Suspension> {
        self.entries.get(&id).map(|e| e.suspension)
    }

    /// Name a live process was spawned under.
    pub fn name(&self, id: ProcessId) -> Option<&str> {
        self.entries.get(&id).map(|e| e.name.as_str())
    }

    /// Number of live processes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no process is live.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if `event` is the wake-up the process is parked on.
    /// Anything else is stale and must be ignored.
    pub(crate) fn expects(&self, id: ProcessId, event: EventId) -> bool {
        self.entries
            .get(&id)
            .and_then(|e| e.suspension.pending_event())
            == Some(event)
    }

    /// Lifetime counters.
    pub fn stats(&self) -> ProcessStats {
        self.stats
    }
}

impl<W> Default for ProcessTable<W> {
    fn default() -> Self {
        Self::new()
    }
}
