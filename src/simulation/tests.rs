use std::cell::RefCell;
use std::rc::Rc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing_test::traced_test;

use super::*;
use crate::config::PoolConfig;
use crate::error::KernelError;
use crate::process::{from_fn, Yield};
use crate::resource::{Priority, RequestId};

// ── Helpers ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Grant {
    who: String,
    at: f64,
    occupancy: usize,
}

type Log = Vec<Grant>;

fn sim_with(pools: &[(&str, usize)]) -> Simulation<Log> {
    let config = pools
        .iter()
        .fold(KernelConfig::new(), |c, (name, cap)| c.with_pool(PoolConfig::new(*name, *cap)));
    Simulation::new(&config, Vec::new()).unwrap()
}

fn order(sim: &Simulation<Log>) -> Vec<(&str, f64)> {
    sim.world().iter().map(|g| (g.who.as_str(), g.at)).collect()
}

/// Arrive, wait for one unit, hold it, release it, leave.
struct Visit {
    who: String,
    pool: PoolId,
    priority: Priority,
    arrive: f64,
    hold: f64,
    request: Option<RequestId>,
}

impl Visit {
    fn new(who: &str, pool: PoolId, priority: Priority, hold: f64) -> Self {
        Visit {
            who: who.to_string(),
            pool,
            priority,
            arrive: 0.0,
            hold,
            request: None,
        }
    }

    fn arriving_at(mut self, at: f64) -> Self {
        self.arrive = at;
        self
    }
}

impl Process<Log> for Visit {
    fn resume(&mut self, ctx: &mut ProcessContext<'_, Log>, wake: Wake) -> Result<Yield, ProcessFault> {
        match (wake, self.request) {
            (Wake::Start, _) if self.arrive > 0.0 => Ok(ctx.suspend_for(self.arrive)?),
            (Wake::Start | Wake::Timer, None) => {
                let request = ctx.request(self.pool, self.priority)?;
                self.request = Some(request);
                Ok(Yield::Request(request))
            }
            (Wake::Granted(_), Some(_)) => {
                let grant = Grant {
                    who: self.who.clone(),
                    at: ctx.now().as_f64(),
                    occupancy: ctx.occupancy(self.pool)?,
                };
                ctx.world().push(grant);
                Ok(ctx.suspend_for(self.hold)?)
            }
            (Wake::Timer, Some(request)) => {
                ctx.release(request)?;
                Ok(Yield::Complete)
            }
            (other, _) => Err(ProcessFault::workload(format!("unexpected wake {other:?}"))),
        }
    }

    fn name(&self) -> &str {
        &self.who
    }
}

// ── Priority ordering ─────────────────────────────────────────────────

#[test]
fn test_priority_then_arrival_order() {
    let mut sim = sim_with(&[("bay", 1)]);
    let bay = sim.pool_id("bay").unwrap();

    sim.spawn(Visit::new("h", bay, 0, 5.0));
    sim.spawn(Visit::new("a", bay, 2, 1.0));
    sim.spawn(Visit::new("b", bay, 1, 1.0));
    sim.spawn(Visit::new("c", bay, 1, 1.0));
    sim.run().unwrap();

    assert_eq!(order(&sim), vec![("h", 0.0), ("b", 5.0), ("c", 6.0), ("a", 7.0)]);
    assert_eq!(sim.stats().completed, 4);
}

#[test]
fn test_equal_priority_is_fifo() {
    let mut sim = sim_with(&[("bay", 1)]);
    let bay = sim.pool_id("bay").unwrap();

    sim.spawn(Visit::new("first", bay, 3, 2.0));
    sim.spawn(Visit::new("second", bay, 3, 2.0).arriving_at(0.5));
    sim.spawn(Visit::new("third", bay, 3, 2.0).arriving_at(1.0));
    sim.run().unwrap();

    assert_eq!(order(&sim), vec![("first", 0.0), ("second", 2.0), ("third", 4.0)]);
}

#[test]
fn test_release_promotes_one_waiter() {
    let mut sim = sim_with(&[("bay", 1)]);
    let bay = sim.pool_id("bay").unwrap();

    sim.spawn(Visit::new("h", bay, 0, 5.0));
    sim.spawn(Visit::new("a", bay, 1, 10.0));
    sim.spawn(Visit::new("b", bay, 1, 10.0));
    sim.run_until(5.0).unwrap();

    let pool = sim.pool(bay).unwrap();
    assert_eq!(pool.occupancy(), 1);
    assert_eq!(pool.queue_depth(), 1);
    assert_eq!(order(&sim), vec![("h", 0.0), ("a", 5.0)]);
}

// ── Capacity bound ────────────────────────────────────────────────────

fn random_run(seed: u64) -> (Log, ProcessStats) {
    let mut sim = sim_with(&[("beds", 3)]);
    let beds = sim.pool_id("beds").unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for n in 0..40 {
        let visit = Visit::new(&format!("v{n}"), beds, rng.gen_range(0..4), rng.gen_range(1.0..10.0))
            .arriving_at(rng.gen_range(0.0..50.0));
        sim.spawn(visit);
    }
    sim.run().unwrap();
    assert_eq!(sim.pool(beds).unwrap().occupancy(), 0);
    let stats = sim.stats();
    (sim.into_world(), stats)
}

#[test]
fn test_occupancy_never_exceeds_capacity() {
    let (log, stats) = random_run(42);
    assert_eq!(log.len(), 40);
    assert!(log.iter().all(|g| g.occupancy <= 3));
    assert!(log.iter().any(|g| g.occupancy == 3));
    assert_eq!(stats.completed, 40);
    assert_eq!(stats.live(), 0);
}

#[test]
fn test_same_seed_same_run() {
    assert_eq!(random_run(7), random_run(7));
}

// ── Joint acquisition ─────────────────────────────────────────────────

#[test]
fn test_joint_waits_for_every_member() {
    let mut sim = sim_with(&[("doctors", 1), ("nurses", 1)]);
    let doctors = sim.pool_id("doctors").unwrap();
    let nurses = sim.pool_id("nurses").unwrap();

    sim.spawn(Visit::new("exam", doctors, 0, 10.0));

    let treated = sim.spawn(from_fn("treatment", move |ctx: &mut ProcessContext<'_, Log>, wake| {
        match wake {
            Wake::Start => {
                let id = ctx.acquire_joint(&[(doctors, 1), (nurses, 1)])?;
                Ok(Yield::Joint(id))
            }
            Wake::JointGranted(id) => {
                let grant = Grant {
                    who: "treatment".into(),
                    at: ctx.now().as_f64(),
                    occupancy: ctx.occupancy(doctors)? + ctx.occupancy(nurses)?,
                };
                ctx.world().push(grant);
                ctx.release_joint(id)?;
                Ok(Yield::Complete)
            }
            other => Err(ProcessFault::workload(format!("unexpected wake {other:?}"))),
        }
    }));

    sim.run_until(5.0).unwrap();
    let pending = sim.broker().joints_of(treated);
    assert_eq!(pending.len(), 1);
    assert_eq!(sim.suspension(treated), Some(Suspension::Joint(pending[0])));
    assert_eq!(sim.broker().joint_granted(pending[0]), Ok(false));
    // The free member is held while the other is awaited.
    assert_eq!(sim.pool(nurses).unwrap().occupancy(), 1);
    let joint = sim.broker().joint(pending[0]).unwrap();
    let (doctor, nurse) = (joint.members[0].request, joint.members[1].request);
    assert!(joint.contains(doctor) && joint.contains(nurse));
    assert!(sim.pool(doctors).unwrap().is_waiting(doctor));
    let holders: Vec<RequestId> = sim.pool(nurses).unwrap().holders().map(|r| r.id).collect();
    assert_eq!(holders, vec![nurse]);

    sim.run().unwrap();
    assert_eq!(order(&sim), vec![("exam", 0.0), ("treatment", 10.0)]);
    assert_eq!(sim.world()[1].occupancy, 2);
    assert!(!sim.is_alive(treated));
    assert_eq!(sim.pool(doctors).unwrap().occupancy(), 0);
    assert_eq!(sim.pool(nurses).unwrap().occupancy(), 0);
}

#[test]
fn test_joint_already_free_continues_inline() {
    let mut sim = sim_with(&[("doctors", 1), ("nurses", 1)]);
    let doctors = sim.pool_id("doctors").unwrap();
    let nurses = sim.pool_id("nurses").unwrap();

    let pid = sim.spawn(from_fn("treatment", move |ctx: &mut ProcessContext<'_, Log>, wake| {
        match wake {
            Wake::Start => Ok(Yield::Joint(ctx.acquire_joint(&[(doctors, 0), (nurses, 0)])?)),
            Wake::JointGranted(id) => {
                assert!(ctx.joint_granted(id)?);
                ctx.release_joint(id)?;
                Ok(Yield::Complete)
            }
            other => Err(ProcessFault::workload(format!("unexpected wake {other:?}"))),
        }
    }));

    assert!(!sim.is_alive(pid));
    assert_eq!(sim.stats().completed, 1);
    assert_eq!(sim.pending_events(), 0);
}

// ── Cancellation ──────────────────────────────────────────────────────

#[test]
fn test_cancel_waiting_keeps_queue_order() {
    let mut sim = sim_with(&[("bay", 1)]);
    let bay = sim.pool_id("bay").unwrap();

    sim.spawn(Visit::new("h", bay, 0, 5.0));
    sim.spawn(Visit::new("a", bay, 1, 1.0));
    let b = sim.spawn(Visit::new("b", bay, 1, 1.0));
    sim.spawn(Visit::new("c", bay, 1, 1.0));

    sim.run_until(2.0).unwrap();
    sim.cancel(b).unwrap();
    assert_eq!(sim.pool(bay).unwrap().queue_depth(), 2);

    sim.run().unwrap();
    assert_eq!(order(&sim), vec![("h", 0.0), ("a", 5.0), ("c", 6.0)]);
    assert_eq!(sim.stats().cancelled, 1);
    assert_eq!(sim.cancel(b), Err(KernelError::UnknownProcess(b)));
}

#[test]
fn test_cancel_holder_hands_capacity_on() {
    let mut sim = sim_with(&[("bay", 1)]);
    let bay = sim.pool_id("bay").unwrap();

    let h = sim.spawn(Visit::new("h", bay, 0, 50.0));
    sim.spawn(Visit::new("a", bay, 1, 1.0));

    sim.schedule(2.0, move |sim: &mut Simulation<Log>| {
        sim.cancel(h).unwrap();
    })
    .unwrap();
    sim.run().unwrap();

    assert_eq!(order(&sim), vec![("h", 0.0), ("a", 2.0)]);
    // The holder's own timer at t=50 was cancelled with it.
    assert_eq!(sim.now().as_f64(), 3.0);
}

#[test]
fn test_process_cannot_cancel_itself() {
    let mut sim = sim_with(&[]);
    sim.spawn(from_fn("selfish", |ctx: &mut ProcessContext<'_, Log>, _wake| {
        let me = ctx.pid();
        assert_eq!(ctx.cancel(me), Err(KernelError::SelfCancel(me)));
        Ok(Yield::Complete)
    }));
    assert_eq!(sim.stats().completed, 1);
}

// ── Release errors ────────────────────────────────────────────────────

#[test]
fn test_double_release_is_rejected() {
    let config = KernelConfig::new().with_pool(PoolConfig::new("bay", 2));
    let mut sim = Simulation::new(&config, None::<KernelError>).unwrap();
    let bay = sim.pool_id("bay").unwrap();

    sim.spawn(from_fn("twice", move |ctx: &mut ProcessContext<'_, Option<KernelError>>, wake| {
        match wake {
            Wake::Start => Ok(Yield::Request(ctx.request(bay, 0)?)),
            Wake::Granted(request) => {
                ctx.release(request)?;
                let second = ctx.release(request).err();
                *ctx.world() = second;
                Ok(Yield::Complete)
            }
            other => Err(ProcessFault::workload(format!("unexpected wake {other:?}"))),
        }
    }));

    assert_eq!(sim.world(), &Some(KernelError::AlreadyReleased(RequestId::new(0))));
    assert_eq!(sim.pool(bay).unwrap().occupancy(), 0);
    assert!(sim.faults().is_empty());
}

#[test]
fn test_release_of_foreign_request_faults() {
    let mut sim = sim_with(&[("bay", 1)]);
    let bay = sim.pool_id("bay").unwrap();

    sim.spawn(Visit::new("owner", bay, 0, 10.0));
    sim.spawn(from_fn("thief", |ctx: &mut ProcessContext<'_, Log>, _wake| {
        ctx.release(RequestId::new(0))?;
        Ok(Yield::Complete)
    }));

    assert_eq!(sim.faults().len(), 1);
    assert!(matches!(
        sim.faults()[0].fault,
        ProcessFault::Kernel(KernelError::NotOwner { .. })
    ));
    assert_eq!(sim.pool(bay).unwrap().occupancy(), 1);
}

// ── Faults ────────────────────────────────────────────────────────────

#[test]
#[traced_test]
fn test_fault_aborts_only_that_process() {
    let mut sim = sim_with(&[("bay", 1)]);
    let bay = sim.pool_id("bay").unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let observed = Rc::clone(&seen);
    sim.set_fault_observer(move |record: &FaultRecord| {
        observed.borrow_mut().push((record.name.clone(), record.time.as_f64()));
    });

    sim.spawn(from_fn("crasher", move |ctx: &mut ProcessContext<'_, Log>, wake| match wake {
        Wake::Start => Ok(Yield::Request(ctx.request(bay, 0)?)),
        Wake::Granted(_) => Ok(ctx.suspend_for(3.0)?),
        _ => Err(ProcessFault::workload("equipment failure")),
    }));
    sim.spawn(Visit::new("next", bay, 1, 1.0));
    sim.run().unwrap();

    assert_eq!(*seen.borrow(), vec![("crasher".to_string(), 3.0)]);
    assert_eq!(sim.faults().len(), 1);
    assert_eq!(sim.faults()[0].fault, ProcessFault::workload("equipment failure"));
    assert_eq!(sim.stats().faulted, 1);
    assert_eq!(sim.stats().completed, 1);
    assert_eq!(order(&sim), vec![("next", 3.0)]);
    assert!(logs_contain("process aborted"));
}

#[test]
fn test_negative_delay_faults_eagerly() {
    let mut sim = sim_with(&[]);
    sim.spawn(from_fn("impatient", |ctx: &mut ProcessContext<'_, Log>, _wake| {
        Ok(ctx.suspend_for(-1.0)?)
    }));

    assert_eq!(
        sim.faults()[0].fault,
        ProcessFault::Kernel(KernelError::InvalidDelay(-1.0))
    );
    assert_eq!(sim.pending_events(), 0);
}

#[test]
fn test_context_sees_other_suspensions() {
    let mut sim = sim_with(&[]);
    let sleeper = sim.spawn(from_fn("sleeper", |ctx: &mut ProcessContext<'_, Log>, wake| match wake {
        Wake::Start => Ok(ctx.suspend_for(5.0)?),
        _ => Ok(Yield::Complete),
    }));

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    sim.spawn(from_fn("watcher", move |ctx: &mut ProcessContext<'_, Log>, wake| {
        sink.borrow_mut().push((ctx.suspension_of(ctx.pid()), ctx.suspension_of(sleeper)));
        match wake {
            Wake::Start => Ok(ctx.suspend_for(10.0)?),
            _ => Ok(Yield::Complete),
        }
    }));
    sim.run().unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, Some(Suspension::Running));
    assert!(matches!(seen[0].1, Some(Suspension::Timer(_))));
    assert_eq!(seen[1], (Some(Suspension::Running), None));
}

#[test]
fn test_time_overflow_faults_the_sleeper() {
    let mut sim = sim_with(&[]);
    let mut naps = [1.0, f64::MAX, f64::MAX].into_iter();
    sim.spawn(from_fn("sleeper", move |ctx: &mut ProcessContext<'_, Log>, _wake| {
        match naps.next() {
            Some(nap) => Ok(ctx.suspend_for(nap)?),
            None => Ok(Yield::Complete),
        }
    }));
    sim.run().unwrap();

    assert_eq!(sim.faults().len(), 1);
    assert!(matches!(
        sim.faults()[0].fault,
        ProcessFault::Kernel(KernelError::InvalidTime(_))
    ));
    assert!(sim.now().as_f64().is_finite());
    assert_eq!(sim.pending_events(), 0);
}

#[test]
#[traced_test]
fn test_completion_releases_leftover_grants() {
    let mut sim = sim_with(&[("bay", 1)]);
    let bay = sim.pool_id("bay").unwrap();

    sim.spawn(from_fn("forgetful", move |ctx: &mut ProcessContext<'_, Log>, wake| match wake {
        Wake::Start => Ok(Yield::Request(ctx.request(bay, 0)?)),
        Wake::Granted(_) => Ok(ctx.suspend_for(2.0)?),
        _ => Ok(Yield::Complete),
    }));
    sim.spawn(Visit::new("next", bay, 0, 1.0));
    sim.run().unwrap();

    assert_eq!(order(&sim), vec![("next", 2.0)]);
    assert_eq!(sim.pool(bay).unwrap().occupancy(), 0);
    assert!(logs_contain("completed while still holding resources"));
}

// ── Bounded waits and stale wake-ups ──────────────────────────────────

fn impatient(bay: PoolId, patience: f64) -> impl Process<Log> {
    from_fn("impatient", move |ctx: &mut ProcessContext<'_, Log>, wake| match wake {
        Wake::Start => {
            let request = ctx.request(bay, 0)?;
            Ok(Yield::RequestWithin(request, Delay::new(patience)?))
        }
        Wake::TimedOut(request) => {
            ctx.release(request)?;
            let grant = Grant {
                who: "gave up".into(),
                at: ctx.now().as_f64(),
                occupancy: 0,
            };
            ctx.world().push(grant);
            Ok(Yield::Complete)
        }
        Wake::Granted(request) => {
            let grant = Grant {
                who: "served".into(),
                at: ctx.now().as_f64(),
                occupancy: 1,
            };
            ctx.world().push(grant);
            ctx.release(request)?;
            // Outlive the original timeout to prove it was cancelled.
            Ok(ctx.suspend_for(patience * 2.0)?)
        }
        Wake::Timer => Ok(Yield::Complete),
        other => Err(ProcessFault::workload(format!("unexpected wake {other:?}"))),
    })
}

#[test]
fn test_request_within_times_out() {
    let mut sim = sim_with(&[("bay", 1)]);
    let bay = sim.pool_id("bay").unwrap();

    sim.spawn(Visit::new("h", bay, 0, 10.0));
    sim.spawn(impatient(bay, 3.0));
    sim.run_until(4.0).unwrap();

    assert_eq!(order(&sim), vec![("h", 0.0), ("gave up", 3.0)]);
    assert_eq!(sim.pool(bay).unwrap().queue_depth(), 0);
}

#[test]
fn test_request_within_granted_first_cancels_timer() {
    let mut sim = sim_with(&[("bay", 1)]);
    let bay = sim.pool_id("bay").unwrap();

    sim.spawn(Visit::new("h", bay, 0, 2.0));
    sim.spawn(impatient(bay, 5.0));
    sim.run().unwrap();

    assert_eq!(order(&sim), vec![("h", 0.0), ("served", 2.0)]);
    assert!(sim.faults().is_empty());
    assert_eq!(sim.stats().completed, 2);
}

// ── Spawning and callbacks ────────────────────────────────────────────

#[test]
fn test_child_starts_after_parent_suspends() {
    let mut sim = sim_with(&[]);

    fn note(ctx: &mut ProcessContext<'_, Log>, who: &str) {
        let grant = Grant {
            who: who.into(),
            at: ctx.now().as_f64(),
            occupancy: 0,
        };
        ctx.world().push(grant);
    }

    sim.spawn(from_fn("parent", |ctx: &mut ProcessContext<'_, Log>, wake| match wake {
        Wake::Start => Ok(ctx.suspend_for(3.0)?),
        _ => {
            let child = ctx.spawn(from_fn("child", |ctx: &mut ProcessContext<'_, Log>, _wake| {
                note(ctx, "child");
                Ok(Yield::Complete)
            }));
            assert!(ctx.is_alive(child));
            note(ctx, "parent");
            Ok(Yield::Complete)
        }
    }));
    sim.run().unwrap();

    assert_eq!(order(&sim), vec![("parent", 3.0), ("child", 3.0)]);
    assert_eq!(sim.stats().spawned, 2);
}

#[test]
fn test_cancelled_callback_never_runs() {
    let mut sim = sim_with(&[]);
    let keep = sim
        .schedule(1.0, |sim: &mut Simulation<Log>| {
            let at = sim.now().as_f64();
            sim.world_mut().push(Grant {
                who: "kept".into(),
                at,
                occupancy: 0,
            });
        })
        .unwrap();
    let dropped = sim
        .schedule(2.0, |sim: &mut Simulation<Log>| sim.world_mut().clear())
        .unwrap();

    assert!(sim.cancel_event(dropped));
    assert!(!sim.cancel_event(dropped));
    sim.run().unwrap();

    assert_ne!(keep, dropped);
    assert_eq!(order(&sim), vec![("kept", 1.0)]);
    assert!(matches!(
        sim.schedule(-0.5, |_: &mut Simulation<Log>| {}),
        Err(KernelError::InvalidDelay(_))
    ));
}

#[test]
fn test_run_until_leaves_clock_at_end() {
    let mut sim = sim_with(&[]);
    assert_eq!(sim.run_until(12.5).unwrap(), 0);
    assert_eq!(sim.now().as_f64(), 12.5);
    assert!(sim.run_until(-1.0).is_err());
}
