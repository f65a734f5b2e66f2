//! Cooperative processes.
//!
//! A process is a state machine that the kernel resumes at each of its
//! suspension points. Every call to [`Process::resume`] runs one step:
//! the process reads why it woke up, does some work through the
//! [`ProcessContext`], and returns the [`Yield`] describing what it waits
//! for next. Local state lives in the implementing struct, so nothing is
//! lost across suspensions.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`context`] | [`ProcessContext`]: the kernel API a running step sees |
//! | [`table`] | [`ProcessTable`], [`Suspension`], [`ProcessStats`] |
//! | [`fault`] | [`FaultRecord`], [`FaultObserver`] |

pub mod context;
pub mod fault;
pub mod table;

pub use context::ProcessContext;
pub use fault::{FaultObserver, FaultRecord};
pub use table::{ProcessEntry, ProcessStats, ProcessTable, Suspension};

use crate::error::ProcessFault;
use crate::resource::{JointId, RequestId};
use crate::time::Delay;

// ── ProcessId ─────────────────────────────────────────────────────────

/// Identifies a process for its whole lifetime. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessId(u64);

impl ProcessId {
    /// Create a process ID from a raw integer.
    #[inline]
    pub fn new(id: u64) -> Self {
        ProcessId(id)
    }

    /// Return the underlying integer.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

// ── Wake / Yield ──────────────────────────────────────────────────────

/// Why a process is being resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Wake {
    /// First step after spawning.
    Start,
    /// A `Yield::Timeout` elapsed.
    Timer,
    /// The awaited request now holds capacity.
    Granted(RequestId),
    /// A `Yield::RequestWithin` timer fired before the grant. The
    /// request is still queued; the process decides what to do with it.
    TimedOut(RequestId),
    /// Every member of the awaited joint request is granted.
    JointGranted(JointId),
}

/// What a process waits for when it hands control back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Yield {
    /// Resume after the delay elapses.
    Timeout(Delay),
    /// Resume once the request is granted. Continues without suspending
    /// if it already is.
    Request(RequestId),
    /// Resume on the grant or after the delay, whichever comes first.
    RequestWithin(RequestId, Delay),
    /// Resume once every member of the joint request is granted.
    Joint(JointId),
    /// Finish. Anything still held is released.
    Complete,
}

// ── Process ───────────────────────────────────────────────────────────

/// Trait implemented by every simulated process.
///
/// # Contract
///
/// Implementations must:
/// - Route all side effects through `ctx`.
/// - Be deterministic for equal inputs (draw randomness from `ctx.rng()`).
/// - Release what they acquire before completing; the kernel cleans up
///   leftovers but logs a warning.
///
/// Returning `Err` aborts only this process: its holds are released and
/// the fault is reported to the simulation's observer.
pub trait Process<W> {
    /// Run one step.
    fn resume(&mut self, ctx: &mut ProcessContext<'_, W>, wake: Wake) -> Result<Yield, ProcessFault>;

    /// Label used in logs and fault records.
    fn name(&self) -> &str {
        "process"
    }
}

/// A process backed by a closure. Built with [`from_fn`].
pub struct FromFn<F> {
    name: String,
    step: F,
}

/// Turn a closure into a process.
///
/// ```rust
/// use asclepius::process::{from_fn, ProcessContext, Wake, Yield};
/// use asclepius::{KernelConfig, Simulation};
///
/// let mut sim = Simulation::new(&KernelConfig::default(), ()).unwrap();
/// let mut woke = 0;
/// sim.spawn(from_fn("ticker", move |ctx: &mut ProcessContext<'_, ()>, wake| {
///     if wake == Wake::Timer {
///         woke += 1;
///     }
///     if woke < 3 {
///         ctx.suspend_for(1.0).map_err(Into::into)
///     } else {
///         Ok(Yield::Complete)
///     }
/// }));
/// sim.run_until(10.0).unwrap();
/// assert_eq!(sim.stats().completed, 1);
/// ```
pub fn from_fn<W, F>(name: impl Into<String>, step: F) -> FromFn<F>
where
    F: FnMut(&mut ProcessContext<'_, W>, Wake) -> Result<Yield, ProcessFault>,
{
    FromFn {
        name: name.into(),
        step,
    }
}

impl<W, F> Process<W> for FromFn<F>
where
    F: FnMut(&mut ProcessContext<'_, W>, Wake) -> Result<Yield, ProcessFault>,
{
    fn resume(&mut self, ctx: &mut ProcessContext<'_, W>, wake: Wake) -> Result<Yield, ProcessFault> {
        (self.step)(ctx, wake)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
