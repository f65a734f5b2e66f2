//! Configuration types for a simulation run.

use std::collections::BTreeSet;

use crate::error::{KernelError, KernelResult};

/// One resource pool to register at construction.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfig {
    /// Unique pool name.
    pub name: String,

    /// Number of units (at least one).
    pub capacity: usize,
}

impl PoolConfig {
    /// Create a pool configuration.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }
}

/// Periodic utilization sampling.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SamplingConfig {
    /// Time between samples; the first one is taken at `t = period`.
    pub period: f64,

    /// Pools to monitor by name. `None` monitors every pool.
    pub pools: Option<Vec<String>>,
}

impl SamplingConfig {
    /// Sample every pool each `period`.
    pub fn new(period: f64) -> Self {
        Self { period, pools: None }
    }

    /// Restrict sampling to the named pools.
    pub fn with_pools(mut self, pools: Option<Vec<String>>) -> Self {
        self.pools = pools;
        self
    }
}

/// Configuration for a [`Simulation`](crate::Simulation).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct KernelConfig {
    /// Pools registered at construction, in order.
    pub pools: Vec<PoolConfig>,

    /// Utilization sampling, if wanted.
    pub sampling: Option<SamplingConfig>,

    /// Where [`Simulation::run`](crate::Simulation::run) stops. Without a
    /// horizon it runs until the queue drains.
    pub horizon: Option<f64>,

    /// Seed for the simulation's generator.
    pub seed: u64,
}

impl KernelConfig {
    /// No pools, no sampling, no horizon, seed zero.
    pub fn new() -> Self {
        Self {
            pools: Vec::new(),
            sampling: None,
            horizon: None,
            seed: 0,
        }
    }

    /// Add a pool.
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pools.push(pool);
        self
    }

    /// Enable sampling.
    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = Some(sampling);
        self
    }

    /// Set the run horizon.
    pub fn with_horizon(mut self, horizon: f64) -> Self {
        self.horizon = Some(horizon);
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check the configuration before anything is built.
    pub fn validate(&self) -> KernelResult<()> {
        let mut seen = BTreeSet::new();
        for pool in &self.pools {
            if pool.capacity < 1 {
                return Err(KernelError::InvalidCapacity {
                    pool: pool.name.clone(),
                    capacity: pool.capacity,
                });
            }
            if !seen.insert(pool.name.as_str()) {
                return Err(KernelError::DuplicatePool(pool.name.clone()));
            }
        }

        if let Some(horizon) = self.horizon {
            if !horizon.is_finite() || horizon <= 0.0 {
                return Err(KernelError::InvalidConfig(format!(
                    "horizon must be positive and finite, got {horizon}"
                )));
            }
        }

        if let Some(sampling) = &self.sampling {
            if !sampling.period.is_finite() || sampling.period <= 0.0 {
                return Err(KernelError::InvalidConfig(format!(
                    "sampling period must be positive and finite, got {}",
                    sampling.period
                )));
            }
            // The sampler never completes, so an open-ended run would not stop.
            if self.horizon.is_none() {
                return Err(KernelError::InvalidConfig(
                    "sampling requires a horizon".to_string(),
                ));
            }
            for name in sampling.pools.iter().flatten() {
                if !seen.contains(name.as_str()) {
                    return Err(KernelError::UnknownPool(name.clone()));
                }
            }
        }
        Ok(())
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
