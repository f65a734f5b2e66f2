//! Structured error types for the kernel.
//!
//! All fallible public APIs return `Result<T, KernelError>`. Errors are
//! detected eagerly at the call that introduces them and are fatal to
//! that call only: a rejected call never leaves the clock, the process
//! table or any pool in a modified state.
//!
//! `ProcessFault` is the failure type of process step logic. The
//! runtime catches it at the process boundary instead of letting it
//! halt the run.

use thiserror::Error;

use crate::process::ProcessId;
use crate::resource::{JointId, PoolId, RequestId};

/// Configuration and programmer errors raised by kernel operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    // ── Time ──────────────────────────────────────────────

    /// A negative or non-finite wait was requested.
    #[error("invalid delay {0}: delays must be finite and non-negative")]
    InvalidDelay(f64),

    /// An absolute time was negative, non-finite, or in the past.
    #[error("invalid virtual time {0}")]
    InvalidTime(f64),

    // ── Configuration ─────────────────────────────────────

    /// A pool was configured with capacity below one.
    #[error("pool `{pool}` has invalid capacity {capacity}: capacity must be at least 1")]
    InvalidCapacity { pool: String, capacity: usize },

    /// Two pools were registered under the same name.
    #[error("pool `{0}` is already registered")]
    DuplicatePool(String),

    /// Any other rejected configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Broker ────────────────────────────────────────────

    /// A pool ID or name does not refer to a registered pool.
    #[error("unknown pool {0}")]
    UnknownPool(String),

    /// The request ID was never issued.
    #[error("request {0} was never issued")]
    UnknownRequest(RequestId),

    /// The request was issued but has already been released or withdrawn.
    #[error("request {0} has already been released")]
    AlreadyReleased(RequestId),

    /// A process tried to act on a request or joint it does not own.
    #[error("{process} does not own {resource}")]
    NotOwner { process: ProcessId, resource: String },

    /// The joint request ID is not live.
    #[error("joint request {0} is not active")]
    UnknownJoint(JointId),

    /// A joint member was addressed directly instead of through its joint.
    #[error("request {0} belongs to a joint acquisition; release the joint instead")]
    JointMember(RequestId),

    /// A joint acquisition named no pools.
    #[error("joint acquisition needs at least one pool")]
    EmptyJoint,

    /// A joint acquisition named the same pool twice.
    #[error("joint acquisition names pool {0} more than once")]
    RepeatedPool(PoolId),

    // ── Processes ─────────────────────────────────────────

    /// A process ID does not refer to a live process.
    #[error("process {0} is not running")]
    UnknownProcess(ProcessId),

    /// A running process tried to cancel itself.
    #[error("process {0} cannot cancel itself; yield Complete instead")]
    SelfCancel(ProcessId),
}

/// Convenience alias for `Result<T, KernelError>`.
pub type KernelResult<T> = Result<T, KernelError>;

/// An unhandled failure inside a process's step logic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessFault {
    /// A kernel call made by the process was rejected.
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// The workload logic itself gave up.
    #[error("{0}")]
    Workload(String),
}

impl ProcessFault {
    /// Build a workload fault from any displayable message.
    pub fn workload(msg: impl Into<String>) -> Self {
        ProcessFault::Workload(msg.into())
    }
}
