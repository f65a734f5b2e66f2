//! `Simulation`: the explicitly owned simulation context.
//!
//! Ties the clock, the process table, the resource broker, the sampler
//! series, the fault log and the seeded generator together. Nothing is
//! global: two simulations built from the same config and seed produce
//! identical runs.
//!
//! The loop is single-threaded. An event fires, the process (or
//! callback) it targets runs until its next suspension, and only then
//! is the next event considered.

mod kernel;

#[cfg(test)]
mod tests;

pub(crate) use kernel::{Action, Kernel, Parked};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, error, info, trace, warn};

use crate::config::KernelConfig;
use crate::error::{KernelResult, ProcessFault};
use crate::event::{Event, EventId};
use crate::process::{
    FaultObserver, FaultRecord, Process, ProcessContext, ProcessId, ProcessStats, Suspension, Wake,
};
use crate::resource::{Broker, PoolId, ResourcePool};
use crate::sampler::{Sampler, UtilizationSample};
use crate::time::{Delay, VirtualTime};

/// A discrete-event simulation over workload state `W`.
pub struct Simulation<W = ()> {
    kernel: Kernel<W>,
    horizon: Option<VirtualTime>,
    faults: Vec<FaultRecord>,
    observer: Option<Box<dyn FaultObserver>>,
    sampler: Option<ProcessId>,
}

impl<W: 'static> Simulation<W> {
    /// Build a simulation from `config`, seeding the generator from
    /// `config.seed`.
    pub fn new(config: &KernelConfig, world: W) -> KernelResult<Self> {
        Self::with_rng(config, world, ChaCha8Rng::seed_from_u64(config.seed))
    }

    /// Build a simulation with an explicit generator.
    ///
    /// Registers the configured pools and, when sampling is configured,
    /// spawns the sampler so its first sample lands at `t = period`.
    pub fn with_rng(config: &KernelConfig, world: W, rng: ChaCha8Rng) -> KernelResult<Self> {
        config.validate()?;

        let mut broker = Broker::new();
        for pool in &config.pools {
            broker.add_pool(pool.name.clone(), pool.capacity)?;
        }
        let horizon = config.horizon.map(VirtualTime::try_new).transpose()?;

        let mut sim = Simulation {
            kernel: Kernel::new(broker, rng, world),
            horizon,
            faults: Vec::new(),
            observer: None,
            sampler: None,
        };

        if let Some(sampling) = &config.sampling {
            let pools = match &sampling.pools {
                Some(names) => Some(
                    names
                        .iter()
                        .map(|name| sim.pool_id(name))
                        .collect::<KernelResult<Vec<_>>>()?,
                ),
                None => None,
            };
            let sampler = Sampler::new(Delay::new(sampling.period)?, pools);
            sim.sampler = Some(sim.spawn(sampler));
        }

        info!(
            pools = config.pools.len(),
            horizon = ?config.horizon,
            seed = config.seed,
            sampling = config.sampling.is_some(),
            "simulation ready"
        );
        Ok(sim)
    }

    // ── Introspection ─────────────────────────────────────

    /// Current virtual time.
    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.kernel.clock.now()
    }

    /// Configured run horizon, if any.
    pub fn horizon(&self) -> Option<VirtualTime> {
        self.horizon
    }

    /// Events dispatched so far.
    pub fn events_processed(&self) -> u64 {
        self.kernel.clock.events_processed()
    }

    /// Live queued events.
    pub fn pending_events(&self) -> usize {
        self.kernel.clock.pending()
    }

    /// Process lifetime counters.
    pub fn stats(&self) -> ProcessStats {
        self.kernel.table.stats()
    }

    /// Returns `true` if `pid` has not finished.
    pub fn is_alive(&self, pid: ProcessId) -> bool {
        self.kernel.table.contains(pid)
    }

    /// What a live process is parked on.
    pub fn suspension(&self, pid: ProcessId) -> Option<Suspension> {
        self.kernel.table.suspension(pid)
    }

    /// The sampler process, if sampling is configured.
    pub fn sampler(&self) -> Option<ProcessId> {
        self.sampler
    }

    /// Workload state.
    pub fn world(&self) -> &W {
        &self.kernel.world
    }

    /// Mutable workload state.
    pub fn world_mut(&mut self) -> &mut W {
        &mut self.kernel.world
    }

    /// Consume the simulation, keeping the workload state.
    pub fn into_world(self) -> W {
        self.kernel.world
    }

    /// The seeded generator, for drivers that draw outside processes.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.kernel.rng
    }

    // ── Resources ─────────────────────────────────────────

    /// Register an extra pool after construction.
    pub fn add_pool(&mut self, name: impl Into<String>, capacity: usize) -> KernelResult<PoolId> {
        self.kernel.broker.add_pool(name, capacity)
    }

    /// Resolve a pool name.
    pub fn pool_id(&self, name: &str) -> KernelResult<PoolId> {
        self.kernel.broker.pool_id(name)
    }

    /// Read-only view of a pool.
    pub fn pool(&self, id: PoolId) -> KernelResult<&ResourcePool> {
        self.kernel.broker.pool(id)
    }

    /// Read-only view of the broker.
    pub fn broker(&self) -> &Broker {
        &self.kernel.broker
    }

    // ── Series and faults ─────────────────────────────────

    /// Every utilization sample taken so far, in time order.
    pub fn samples(&self) -> &[UtilizationSample] {
        &self.kernel.samples
    }

    /// The time series of one pool.
    pub fn samples_for(&self, pool: PoolId) -> impl Iterator<Item = &UtilizationSample> + '_ {
        self.kernel.samples.iter().filter(move |s| s.pool == pool)
    }

    /// Every fault recorded so far.
    pub fn faults(&self) -> &[FaultRecord] {
        &self.faults
    }

    /// Register the observer notified on every fault. Replaces any
    /// previous one.
    pub fn set_fault_observer(&mut self, observer: impl FaultObserver + 'static) {
        self.observer = Some(Box::new(observer));
    }

    // ── Processes and events ──────────────────────────────

    /// Spawn a process and run it to its first suspension.
    pub fn spawn(&mut self, process: impl Process<W> + 'static) -> ProcessId {
        let pid = self.kernel.table.insert(Box::new(process));
        debug!(process = %pid, name = self.kernel.table.name(pid).unwrap_or_default(), "spawned");
        self.drive(pid, Wake::Start);
        pid
    }

    /// Abort a process: its wake-up is cancelled, waiting requests are
    /// withdrawn and granted ones released.
    pub fn cancel(&mut self, pid: ProcessId) -> KernelResult<()> {
        self.kernel.abort(pid)
    }

    /// Run `callback` against the simulation `delay` units from now.
    ///
    /// Fails with [`KernelError::InvalidDelay`](crate::KernelError::InvalidDelay)
    /// for negative or non-finite delays.
    pub fn schedule<F>(&mut self, delay: f64, callback: F) -> KernelResult<EventId>
    where
        F: FnOnce(&mut Simulation<W>) + 'static,
    {
        self.kernel.clock.schedule(delay, Action::Call(Box::new(callback)))
    }

    /// Cancel a scheduled callback. Returns `false` if it already ran.
    pub fn cancel_event(&mut self, id: EventId) -> bool {
        self.kernel.clock.cancel(id)
    }

    // ── Running ───────────────────────────────────────────

    /// Dispatch every event due at or before `end`. The clock reads
    /// `end` afterwards.
    ///
    /// Returns the number of events dispatched.
    pub fn run_until(&mut self, end: f64) -> KernelResult<u64> {
        let end = VirtualTime::try_new(end)?;
        let start = self.events_processed();
        info!(from = %self.now(), to = %end, "run started");
        while let Some(event) = self.kernel.clock.pop_due(end) {
            self.dispatch(event);
        }
        self.kernel.clock.advance_to(end);
        let dispatched = self.events_processed() - start;
        let stats = self.stats();
        info!(
            now = %self.now(),
            dispatched,
            live = stats.live(),
            completed = stats.completed,
            faulted = stats.faulted,
            "run finished"
        );
        Ok(dispatched)
    }

    /// Run to the configured horizon, or until the queue drains when
    /// there is none.
    pub fn run(&mut self) -> KernelResult<u64> {
        if let Some(horizon) = self.horizon {
            return self.run_until(horizon.as_f64());
        }
        let start = self.events_processed();
        while self.step() {}
        Ok(self.events_processed() - start)
    }

    /// Dispatch exactly one event. Returns `false` if none is queued.
    pub fn step(&mut self) -> bool {
        let Some(due) = self.kernel.clock.peek_time() else {
            return false;
        };
        match self.kernel.clock.pop_due(due) {
            Some(event) => {
                self.dispatch(event);
                true
            }
            None => false,
        }
    }

    fn dispatch(&mut self, event: Event<Action<W>>) {
        let Event { id, due, action } = event;
        match action {
            Action::Resume { process, wake } => {
                if self.kernel.table.expects(process, id) {
                    trace!(event = %id, due = %due, process = %process, ?wake, "resume");
                    self.drive(process, wake);
                } else {
                    trace!(event = %id, process = %process, "stale wake-up ignored");
                }
            }
            Action::Call(callback) => {
                trace!(event = %id, due = %due, "callback");
                callback(self);
            }
        }
    }

    /// Resume `pid` and keep stepping it until it suspends, completes or
    /// faults.
    fn drive(&mut self, pid: ProcessId, mut wake: Wake) {
        let Some(mut process) = self.kernel.table.get_mut(pid).and_then(|entry| {
            entry.suspension = Suspension::Running;
            entry.process.take()
        }) else {
            return;
        };

        loop {
            let outcome = {
                let mut ctx = ProcessContext::new(&mut self.kernel, pid);
                process.resume(&mut ctx, wake)
            };
            let parked = match outcome {
                Ok(next) => self.kernel.park(pid, next).map_err(ProcessFault::from),
                Err(fault) => Err(fault),
            };
            match parked {
                Ok(Parked::Continue(next)) => wake = next,
                Ok(Parked::Suspended(suspension)) => {
                    if let Some(entry) = self.kernel.table.get_mut(pid) {
                        entry.process = Some(process);
                        entry.suspension = suspension;
                    }
                    return;
                }
                Ok(Parked::Finished) => return self.complete(pid),
                Err(fault) => return self.fault(pid, fault),
            }
        }
    }

    fn complete(&mut self, pid: ProcessId) {
        match self.kernel.retire(pid) {
            Ok(0) => debug!(process = %pid, "completed"),
            Ok(held) => warn!(process = %pid, held, "completed while still holding resources; released"),
            Err(err) => error!(process = %pid, error = %err, "cleanup after completion failed"),
        }
        self.kernel.table.stats.completed += 1;
    }

    fn fault(&mut self, pid: ProcessId, fault: ProcessFault) {
        let name = self.kernel.table.name(pid).unwrap_or_default().to_string();
        let released = match self.kernel.retire(pid) {
            Ok(held) => held,
            Err(err) => {
                error!(process = %pid, error = %err, "cleanup after fault failed");
                0
            }
        };
        self.kernel.table.stats.faulted += 1;

        let record = FaultRecord {
            process: pid,
            name,
            time: self.now(),
            fault,
        };
        warn!(
            process = %pid,
            name = %record.name,
            released,
            fault = %record.fault,
            "process aborted"
        );
        if let Some(observer) = self.observer.as_mut() {
            observer.on_fault(&record);
        }
        self.faults.push(record);
    }
}
