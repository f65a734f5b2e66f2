//! Fault records and the observer hook they are reported to.

use crate::error::ProcessFault;
use crate::time::VirtualTime;

use super::ProcessId;

/// A process that aborted with an unhandled fault.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultRecord {
    /// The aborted process.
    pub process: ProcessId,
    /// Its [`Process::name`](super::Process::name) at spawn time.
    pub name: String,
    /// Virtual time of the failing step.
    pub time: VirtualTime,
    /// What went wrong.
    pub fault: ProcessFault,
}

impl std::fmt::Display for FaultRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {} {}] {}", self.time, self.process, self.name, self.fault)
    }
}

/// Receives every fault as it happens.
///
/// By the time the observer runs, the process is gone and its holds
/// have been released; the simulation carries on afterwards.
pub trait FaultObserver {
    /// Called once per aborted process.
    fn on_fault(&mut self, record: &FaultRecord);
}

impl<F> FaultObserver for F
where
    F: FnMut(&FaultRecord),
{
    fn on_fault(&mut self, record: &FaultRecord) {
        (self)(record);
    }
}
