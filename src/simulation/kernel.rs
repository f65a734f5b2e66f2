//! `Kernel`: the state a running process step may touch.
//!
//! Split out of [`Simulation`](super::Simulation) so that a
//! [`ProcessContext`](crate::process::ProcessContext) can borrow it while
//! the simulation keeps the process being resumed out of the table.

use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::error::{KernelError, KernelResult};
use crate::process::{Process, ProcessId, ProcessTable, Suspension, Wake, Yield};
use crate::resource::{Broker, PendingRequest, RequestId};
use crate::sampler::UtilizationSample;

use super::Simulation;

/// What a queued event does when it fires.
pub(crate) enum Action<W> {
    /// Resume a suspended process.
    Resume { process: ProcessId, wake: Wake },
    /// Run a callback against the whole simulation.
    Call(Box<dyn FnOnce(&mut Simulation<W>)>),
}

/// Outcome of handing a [`Yield`] to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Parked {
    /// The process waits; store it with this suspension.
    Suspended(Suspension),
    /// The condition already holds; resume inline with this wake.
    Continue(Wake),
    /// The process yielded `Complete`.
    Finished,
}

pub(crate) struct Kernel<W> {
    pub(crate) clock: Clock<Action<W>>,
    pub(crate) broker: Broker,
    pub(crate) table: ProcessTable<W>,
    pub(crate) samples: Vec<UtilizationSample>,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) world: W,
}

impl<W: 'static> Kernel<W> {
    pub(crate) fn new(broker: Broker, rng: ChaCha8Rng, world: W) -> Self {
        Kernel {
            clock: Clock::new(),
            broker,
            table: ProcessTable::new(),
            samples: Vec::new(),
            rng,
            world,
        }
    }

    /// Register a process whose first step runs at the current instant,
    /// after whatever is executing now has suspended.
    pub(crate) fn spawn_deferred(&mut self, process: Box<dyn Process<W>>) -> ProcessId {
        let pid = self.table.insert(process);
        debug!(process = %pid, name = self.table.name(pid).unwrap_or_default(), "spawned");
        self.wake(pid, Wake::Start);
        pid
    }

    /// Queue a resume event at the current instant.
    fn wake(&mut self, pid: ProcessId, wake: Wake) {
        let event = self.clock.schedule_now(Action::Resume { process: pid, wake });
        if let Some(entry) = self.table.get_mut(pid) {
            entry.suspension = Suspension::Waking(event);
        }
    }

    /// Wake the owners of freshly granted requests that are parked on
    /// them. Owners parked on a joint wake only once every member holds.
    pub(crate) fn notify(&mut self, granted: Vec<PendingRequest>) {
        for request in granted {
            let owner = request.owner;
            let Some(suspension) = self.table.suspension(owner) else {
                continue;
            };
            match self.broker.joint_of(request.id) {
                Some(joint) => {
                    if suspension == Suspension::Joint(joint)
                        && self.broker.joint_granted(joint).unwrap_or(false)
                    {
                        debug!(process = %owner, joint = %joint, "joint complete");
                        self.wake(owner, Wake::JointGranted(joint));
                    }
                }
                None => match suspension {
                    Suspension::Request(awaited) if awaited == request.id => {
                        self.wake(owner, Wake::Granted(awaited));
                    }
                    Suspension::RequestWithin { request: awaited, timer } if awaited == request.id => {
                        self.clock.cancel(timer);
                        self.wake(owner, Wake::Granted(awaited));
                    }
                    _ => trace!(process = %owner, request = %request.id, "grant not awaited yet"),
                },
            }
        }
    }

    fn check_request(&self, pid: ProcessId, request: RequestId) -> KernelResult<()> {
        if self.broker.owner_of(request)? != pid {
            return Err(KernelError::NotOwner {
                process: pid,
                resource: request.to_string(),
            });
        }
        if self.broker.joint_of(request).is_some() {
            return Err(KernelError::JointMember(request));
        }
        Ok(())
    }

    /// Turn a yield into a suspension, or into an inline continuation
    /// when the awaited condition already holds.
    pub(crate) fn park(&mut self, pid: ProcessId, outcome: Yield) -> KernelResult<Parked> {
        let suspension = match outcome {
            Yield::Complete => return Ok(Parked::Finished),
            Yield::Timeout(delay) => {
                let wake = Action::Resume {
                    process: pid,
                    wake: Wake::Timer,
                };
                Suspension::Timer(self.clock.schedule_after(delay, wake)?)
            }
            Yield::Request(request) => {
                self.check_request(pid, request)?;
                if self.broker.is_granted(request)? {
                    return Ok(Parked::Continue(Wake::Granted(request)));
                }
                Suspension::Request(request)
            }
            Yield::RequestWithin(request, delay) => {
                self.check_request(pid, request)?;
                if self.broker.is_granted(request)? {
                    return Ok(Parked::Continue(Wake::Granted(request)));
                }
                let wake = Action::Resume {
                    process: pid,
                    wake: Wake::TimedOut(request),
                };
                let timer = self.clock.schedule_after(delay, wake)?;
                Suspension::RequestWithin { request, timer }
            }
            Yield::Joint(joint) => {
                if self.broker.joint(joint)?.owner != pid {
                    return Err(KernelError::NotOwner {
                        process: pid,
                        resource: joint.to_string(),
                    });
                }
                if self.broker.joint_granted(joint)? {
                    return Ok(Parked::Continue(Wake::JointGranted(joint)));
                }
                Suspension::Joint(joint)
            }
        };
        trace!(process = %pid, ?suspension, "parked");
        Ok(Parked::Suspended(suspension))
    }

    /// Drop a process from the table, cancel its pending wake-up and give
    /// back everything it holds or waits for.
    ///
    /// Returns how many requests and joints were still live.
    pub(crate) fn retire(&mut self, pid: ProcessId) -> KernelResult<usize> {
        let entry = self.table.remove(pid).ok_or(KernelError::UnknownProcess(pid))?;
        if let Some(event) = entry.suspension.pending_event() {
            self.clock.cancel(event);
        }
        let held = self.broker.requests_of(pid).len() + self.broker.joints_of(pid).len();
        let granted = self.broker.release_all_of(pid)?;
        self.notify(granted);
        Ok(held)
    }

    /// Cancel a suspended process.
    pub(crate) fn abort(&mut self, pid: ProcessId) -> KernelResult<()> {
        match self.table.suspension(pid) {
            None => return Err(KernelError::UnknownProcess(pid)),
            Some(Suspension::Running) => return Err(KernelError::SelfCancel(pid)),
            Some(_) => {}
        }
        let held = self.retire(pid)?;
        self.table.stats.cancelled += 1;
        debug!(process = %pid, released = held, "cancelled");
        Ok(())
    }
}
