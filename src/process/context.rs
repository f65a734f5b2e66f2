//! `ProcessContext`: the kernel API visible to a running process step.

use rand_chacha::ChaCha8Rng;

use crate::error::{KernelError, KernelResult};
use crate::resource::{JointId, PoolId, Priority, RequestId};
use crate::sampler::UtilizationSample;
use crate::simulation::Kernel;
use crate::time::{Delay, VirtualTime};

use super::{Process, ProcessId, Suspension};

/// Mutable context passed to [`Process::resume`].
///
/// Provides the running process with:
/// - the current virtual time and its own ID
/// - the seeded random generator and the workload's shared state
/// - resource requests, releases and joint acquisitions
/// - spawning and cancelling other processes
///
/// Pool internals stay behind the broker: a process sees its own
/// requests and the occupancy figures, nothing else.
pub struct ProcessContext<'a, W> {
    kernel: &'a mut Kernel<W>,
    pid: ProcessId,
}

impl<'a, W: 'static> ProcessContext<'a, W> {
    pub(crate) fn new(kernel: &'a mut Kernel<W>, pid: ProcessId) -> Self {
        ProcessContext { kernel, pid }
    }

    /// The running process.
    #[inline]
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Current virtual time.
    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.kernel.clock.now()
    }

    /// The simulation's seeded generator.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.kernel.rng
    }

    /// Workload state shared by every process of this simulation.
    pub fn world(&mut self) -> &mut W {
        &mut self.kernel.world
    }

    /// Workload state and generator together, for draws that depend on
    /// tables kept in the workload state.
    pub fn world_and_rng(&mut self) -> (&mut W, &mut ChaCha8Rng) {
        (&mut self.kernel.world, &mut self.kernel.rng)
    }

    // ── Timers ────────────────────────────────────────────

    /// Build the yield that parks this process for `delay` units.
    ///
    /// Fails with [`KernelError::InvalidDelay`] if `delay` is negative.
    pub fn suspend_for(&self, delay: f64) -> KernelResult<super::Yield> {
        Ok(super::Yield::Timeout(Delay::new(delay)?))
    }

    // ── Resources ─────────────────────────────────────────

    /// Resolve a pool name.
    pub fn pool(&self, name: &str) -> KernelResult<PoolId> {
        self.kernel.broker.pool_id(name)
    }

    /// Units of `pool` currently granted.
    pub fn occupancy(&self, pool: PoolId) -> KernelResult<usize> {
        Ok(self.kernel.broker.pool(pool)?.occupancy())
    }

    /// Requests waiting on `pool`.
    pub fn queue_depth(&self, pool: PoolId) -> KernelResult<usize> {
        Ok(self.kernel.broker.pool(pool)?.queue_depth())
    }

    /// Request one unit of `pool`. Yield [`Yield::Request`] on the
    /// returned ID to wait for the grant.
    ///
    /// [`Yield::Request`]: super::Yield::Request
    pub fn request(&mut self, pool: PoolId, priority: Priority) -> KernelResult<RequestId> {
        let request = self.kernel.broker.request(pool, self.pid, priority)?;
        Ok(request.id)
    }

    /// Whether one of this process's requests holds capacity.
    pub fn is_granted(&self, request: RequestId) -> KernelResult<bool> {
        self.check_owner(request)?;
        self.kernel.broker.is_granted(request)
    }

    /// Release a granted request, or withdraw a waiting one. The pool
    /// re-evaluates its queue right away; promoted waiters resume at the
    /// current instant once this step suspends.
    pub fn release(&mut self, request: RequestId) -> KernelResult<()> {
        self.check_owner(request)?;
        let granted = self.kernel.broker.release(request)?;
        self.kernel.notify(granted);
        Ok(())
    }

    /// Request one unit from each pool as a single step. Yield
    /// [`Yield::Joint`] on the returned ID to wait until all are held.
    ///
    /// [`Yield::Joint`]: super::Yield::Joint
    pub fn acquire_joint(&mut self, wants: &[(PoolId, Priority)]) -> KernelResult<JointId> {
        self.kernel.broker.acquire_joint(self.pid, wants)
    }

    /// Whether every member of one of this process's joints is granted.
    pub fn joint_granted(&self, joint: JointId) -> KernelResult<bool> {
        self.check_joint_owner(joint)?;
        self.kernel.broker.joint_granted(joint)
    }

    /// Release every member of a joint.
    pub fn release_joint(&mut self, joint: JointId) -> KernelResult<()> {
        self.check_joint_owner(joint)?;
        let granted = self.kernel.broker.release_joint(joint)?;
        self.kernel.notify(granted);
        Ok(())
    }

    fn check_owner(&self, request: RequestId) -> KernelResult<()> {
        let owner = self.kernel.broker.owner_of(request)?;
        if owner != self.pid {
            return Err(KernelError::NotOwner {
                process: self.pid,
                resource: request.to_string(),
            });
        }
        Ok(())
    }

    fn check_joint_owner(&self, joint: JointId) -> KernelResult<()> {
        if self.kernel.broker.joint(joint)?.owner != self.pid {
            return Err(KernelError::NotOwner {
                process: self.pid,
                resource: joint.to_string(),
            });
        }
        Ok(())
    }

    // ── Other processes ───────────────────────────────────

    /// Spawn a process. It starts at the current instant, after this
    /// step suspends.
    pub fn spawn(&mut self, process: impl Process<W> + 'static) -> ProcessId {
        self.kernel.spawn_deferred(Box::new(process))
    }

    /// Abort another process, withdrawing its queued requests and
    /// releasing its grants.
    pub fn cancel(&mut self, process: ProcessId) -> KernelResult<()> {
        if process == self.pid {
            return Err(KernelError::SelfCancel(process));
        }
        self.kernel.abort(process)
    }

    /// Returns `true` if `process` has not finished.
    pub fn is_alive(&self, process: ProcessId) -> bool {
        self.kernel.table.contains(process)
    }

    /// Current suspension of a live process.
    pub fn suspension_of(&self, process: ProcessId) -> Option<Suspension> {
        self.kernel.table.suspension(process)
    }

    // ── Sampling ──────────────────────────────────────────

    /// Append one sample per pool (all pools when `pools` is `None`).
    pub(crate) fn record_utilization(&mut self, pools: Option<&[PoolId]>) {
        let now = self.now();
        let kernel = &mut *self.kernel;
        let selected: Vec<PoolId> = match pools {
            Some(ids) => ids.to_vec(),
            None => kernel.broker.pools().map(|p| p.id()).collect(),
        };
        for id in selected {
            if let Ok(pool) = kernel.broker.pool(id) {
                kernel.samples.push(UtilizationSample {
                    time: now,
                    pool: id,
                    pool_name: pool.name().to_string(),
                    occupied: pool.occupancy(),
                    queued: pool.queue_depth(),
                });
            }
        }
    }
}
