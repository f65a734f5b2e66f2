//! Periodic utilization sampling.
//!
//! The sampler is an ordinary process: it sleeps for one period, records
//! one [`UtilizationSample`] per monitored pool, and sleeps again. It
//! never completes, so it stops when the run reaches its horizon.

use crate::error::ProcessFault;
use crate::process::{Process, ProcessContext, Wake, Yield};
use crate::resource::PoolId;
use crate::time::{Delay, VirtualTime};

/// One observation of one pool.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct UtilizationSample {
    /// When the sample was taken.
    pub time: VirtualTime,
    /// Observed pool.
    pub pool: PoolId,
    /// Its name, for reporting.
    pub pool_name: String,
    /// Units granted at `time`.
    pub occupied: usize,
    /// Requests waiting at `time`.
    pub queued: usize,
}

impl UtilizationSample {
    /// Everything the pool is dealing with: in service plus waiting.
    pub fn load(&self) -> usize {
        self.occupied + self.queued
    }
}

/// Samples pool occupancy every `period`.
#[derive(Debug, Clone)]
pub struct Sampler {
    period: Delay,
    pools: Option<Vec<PoolId>>,
}

impl Sampler {
    /// Monitor `pools`, or every registered pool when `None`.
    pub fn new(period: Delay, pools: Option<Vec<PoolId>>) -> Self {
        Sampler { period, pools }
    }

    /// Sampling period.
    pub fn period(&self) -> Delay {
        self.period
    }
}

impl<W: 'static> Process<W> for Sampler {
    fn resume(&mut self, ctx: &mut ProcessContext<'_, W>, wake: Wake) -> Result<Yield, ProcessFault> {
        if wake == Wake::Timer {
            ctx.record_utilization(self.pools.as_deref());
        }
        Ok(Yield::Timeout(self.period))
    }

    fn name(&self) -> &str {
        "sampler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KernelConfig, PoolConfig, SamplingConfig};
    use crate::process::from_fn;
    use crate::Simulation;

    fn config(period: f64, pools: Option<Vec<String>>) -> KernelConfig {
        KernelConfig::new()
            .with_pool(PoolConfig::new("beds", 2))
            .with_pool(PoolConfig::new("staff", 1))
            .with_horizon(1_000.0)
            .with_sampling(SamplingConfig::new(period).with_pools(pools))
    }

    #[test]
    fn test_first_sample_at_one_period() {
        let mut sim = Simulation::new(&config(10.0, None), ()).unwrap();
        sim.run_until(35.0).unwrap();

        let beds = sim.pool_id("beds").unwrap();
        let times: Vec<f64> = sim.samples_for(beds).map(|s| s.time.as_f64()).collect();
        assert_eq!(times, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_default_monitors_every_pool() {
        let mut sim = Simulation::new(&config(5.0, None), ()).unwrap();
        sim.run_until(5.0).unwrap();

        let names: Vec<&str> = sim.samples().iter().map(|s| s.pool_name.as_str()).collect();
        assert_eq!(names, vec!["beds", "staff"]);
    }

    #[test]
    fn test_selected_pools_only() {
        let mut sim = Simulation::new(&config(5.0, Some(vec!["staff".into()])), ()).unwrap();
        sim.run_until(20.0).unwrap();

        assert_eq!(sim.samples().len(), 4);
        assert!(sim.samples().iter().all(|s| s.pool_name == "staff"));
    }

    #[test]
    fn test_sample_sees_occupancy_and_queue() {
        let mut sim = Simulation::new(&config(10.0, Some(vec!["staff".into()])), ()).unwrap();
        let staff = sim.pool_id("staff").unwrap();

        for _ in 0..3 {
            let mut held = None;
            sim.spawn(from_fn("holder", move |ctx: &mut ProcessContext<'_, ()>, wake| match wake {
                Wake::Start => {
                    let request = ctx.request(staff, 0)?;
                    held = Some(request);
                    Ok(Yield::Request(request))
                }
                Wake::Granted(_) => ctx.suspend_for(100.0).map_err(Into::into),
                _ => {
                    if let Some(request) = held.take() {
                        ctx.release(request)?;
                    }
                    Ok(Yield::Complete)
                }
            }));
        }
        sim.run_until(10.0).unwrap();

        let sample = &sim.samples()[0];
        assert_eq!(sample.occupied, 1);
        assert_eq!(sample.queued, 2);
        assert_eq!(sample.load(), 3);
    }

    #[test]
    fn test_sampler_is_a_live_process() {
        let sim = Simulation::new(&config(10.0, None), ()).unwrap();
        let sampler = sim.sampler().unwrap();
        assert!(sim.is_alive(sampler));
        assert_eq!(sim.stats().spawned, 1);
    }
}
