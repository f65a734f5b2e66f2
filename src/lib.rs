//! # Asclepius Deterministic Process Simulation Kernel
//!
//! A discrete-event simulation kernel for queueing systems: processes
//! that wait on virtual time and compete for capacity-limited resource
//! pools under strict priorities. No async, no threads, no wall-clock
//! time. Just state machines driven by a virtual clock.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────┐
//! │           Simulation             │ ← owns everything below
//! │  ┌───────────┐  ┌─────────────┐ │
//! │  │   Clock    │  │ ProcessTable│ │ ← virtual time + live processes
//! │  │ ┌───────┐ │  └─────────────┘ │
//! │  │ │Sched. │ │  ┌─────────────┐ │
//! │  │ └───────┘ │  │   Broker    │ │ ← pools, requests, joints
//! │  └───────────┘  └─────────────┘ │
//! │  ┌───────────┐  ┌─────────────┐ │
//! │  │  Sampler   │  │ Fault log   │ │
//! │  └───────────┘  └─────────────┘ │
//! └─────────────────────────────────┘
//! ```
//!
//! The [`workload`] module instantiates the kernel as an emergency
//! department.

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod process;
pub mod report;
pub mod resource;
pub mod sampler;
pub mod scheduler;
pub mod simulation;
pub mod time;
pub mod workload;

// Re-exports for convenience.
pub use clock::{Clock, Dispatch};
pub use config::{KernelConfig, PoolConfig, SamplingConfig};
pub use error::{KernelError, KernelResult, ProcessFault};
pub use event::{Event, EventId, EventIdGen};
pub use process::{from_fn, FaultObserver, FaultRecord, Process, ProcessContext, ProcessId, Wake, Yield};
pub use report::{RunReport, RunSummary};
pub use resource::{Broker, JointId, PoolId, Priority, RequestId, ResourcePool};
pub use sampler::{Sampler, UtilizationSample};
pub use scheduler::Scheduler;
pub use simulation::Simulation;
pub use time::{Delay, VirtualTime};
