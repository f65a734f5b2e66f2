//! The department: staffing, arrivals and the run driver.

use rand_distr::{Distribution, Exp};
use tracing::{debug, info};

use crate::config::{KernelConfig, PoolConfig, SamplingConfig};
use crate::error::{KernelError, KernelResult, ProcessFault};
use crate::process::{Process, ProcessContext, Wake, Yield};
use crate::report::{RunReport, RunSummary};
use crate::simulation::Simulation;

use super::journey::PatientJourney;
use super::record::PatientRecord;
use super::severity::{DayType, SeverityMix, SEVERITY_WEIGHTS};

pub const REGISTRATION: &str = "registration";
pub const NURSES: &str = "nurses";
pub const DOCTORS: &str = "doctors";
pub const LAB_TECHS: &str = "lab_techs";
pub const XRAY_MACHINES: &str = "xray_machines";

/// Monthly cost of one unit, in USD.
pub const NURSE_COST: f64 = 3_500.0;
pub const DOCTOR_COST: f64 = 15_000.0;
pub const LAB_TECH_COST: f64 = 2_500.0;
pub const XRAY_MACHINE_COST: f64 = 5_000.0;

/// Configuration for a department run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DepartmentConfig {
    /// Nurses on shift (triage and treatment).
    pub nurses: usize,

    /// Doctors on shift (examination and severe treatment).
    pub doctors: usize,

    /// Lab technicians.
    pub lab_techs: usize,

    /// X-ray machines.
    pub xray_machines: usize,

    /// Day type, which sets the arrival rate.
    pub day_type: DayType,

    /// Simulated minutes.
    pub horizon: f64,

    /// Minutes between utilization samples.
    pub sampling_period: f64,

    /// Random seed for deterministic runs.
    pub seed: u64,
}

impl DepartmentConfig {
    /// Default staffing on a weekday, over 24 hours.
    pub fn new() -> Self {
        Self {
            nurses: 2,
            doctors: 2,
            lab_techs: 1,
            xray_machines: 1,
            day_type: DayType::Weekday,
            horizon: 24.0 * 60.0,
            sampling_period: 10.0,
            seed: 10,
        }
    }

    /// Set every staffing count at once.
    pub fn with_staffing(mut self, nurses: usize, doctors: usize, lab_techs: usize, xray_machines: usize) -> Self {
        self.nurses = nurses;
        self.doctors = doctors;
        self.lab_techs = lab_techs;
        self.xray_machines = xray_machines;
        self
    }

    /// Set the day type.
    pub fn with_day_type(mut self, day_type: DayType) -> Self {
        self.day_type = day_type;
        self
    }

    /// Set the simulated duration.
    pub fn with_horizon(mut self, minutes: f64) -> Self {
        self.horizon = minutes;
        self
    }

    /// Set the sampling period.
    pub fn with_sampling_period(mut self, minutes: f64) -> Self {
        self.sampling_period = minutes;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Monthly staffing cost, in USD.
    pub fn monthly_cost(&self) -> f64 {
        self.nurses as f64 * NURSE_COST
            + self.doctors as f64 * DOCTOR_COST
            + self.lab_techs as f64 * LAB_TECH_COST
            + self.xray_machines as f64 * XRAY_MACHINE_COST
    }

    /// Convert to the kernel configuration. Staff pools are sampled; the
    /// registration desk is not.
    pub fn to_kernel_config(&self) -> KernelConfig {
        let sampled = [NURSES, DOCTORS, LAB_TECHS, XRAY_MACHINES]
            .iter()
            .map(|name| name.to_string())
            .collect();
        KernelConfig::new()
            .with_pool(PoolConfig::new(REGISTRATION, 1))
            .with_pool(PoolConfig::new(NURSES, self.nurses))
            .with_pool(PoolConfig::new(DOCTORS, self.doctors))
            .with_pool(PoolConfig::new(LAB_TECHS, self.lab_techs))
            .with_pool(PoolConfig::new(XRAY_MACHINES, self.xray_machines))
            .with_sampling(SamplingConfig::new(self.sampling_period).with_pools(Some(sampled)))
            .with_horizon(self.horizon)
            .with_seed(self.seed)
    }
}

impl Default for DepartmentConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Workload state shared by every patient.
#[derive(Debug, Clone)]
pub struct Department {
    severity_mix: SeverityMix,
    arrivals: u64,
    records: Vec<PatientRecord>,
}

impl Department {
    /// An empty department with the standard severity mix.
    pub fn new() -> KernelResult<Self> {
        Ok(Department {
            severity_mix: SeverityMix::new(SEVERITY_WEIGHTS)?,
            arrivals: 0,
            records: Vec::new(),
        })
    }

    pub fn severity_mix(&self) -> &SeverityMix {
        &self.severity_mix
    }

    /// Patients that have arrived so far.
    pub fn arrivals(&self) -> u64 {
        self.arrivals
    }

    /// Discharged patients, in discharge order.
    pub fn records(&self) -> &[PatientRecord] {
        &self.records
    }

    pub(crate) fn discharge(&mut self, record: PatientRecord) {
        self.records.push(record);
    }

    pub(crate) fn into_records(self) -> Vec<PatientRecord> {
        self.records
    }
}

/// Spawns patients with exponential inter-arrival gaps.
///
/// The first patient arrives one gap after the start; IDs count from 1.
#[derive(Debug, Clone)]
pub struct ArrivalGenerator {
    gap: Exp<f64>,
    next_patient: u64,
}

impl ArrivalGenerator {
    /// Arrivals at `rate` patients per minute.
    pub fn new(rate: f64) -> KernelResult<Self> {
        let gap = Exp::new(rate)
            .map_err(|e| KernelError::InvalidConfig(format!("arrival rate {rate}: {e}")))?;
        Ok(ArrivalGenerator { gap, next_patient: 1 })
    }
}

impl Process<Department> for ArrivalGenerator {
    fn resume(&mut self, ctx: &mut ProcessContext<'_, Department>, wake: Wake) -> Result<Yield, ProcessFault> {
        if wake == Wake::Timer {
            let patient = ctx.spawn(PatientJourney::new(self.next_patient));
            debug!(patient = self.next_patient, process = %patient, "patient spawned");
            self.next_patient += 1;
            ctx.world().arrivals += 1;
        }
        let gap = self.gap.sample(ctx.rng());
        Ok(ctx.suspend_for(gap)?)
    }

    fn name(&self) -> &str {
        "arrivals"
    }
}

/// Build the department simulation with its arrival generator running.
pub fn build_department(config: &DepartmentConfig) -> KernelResult<Simulation<Department>> {
    let mut sim = Simulation::new(&config.to_kernel_config(), Department::new()?)?;
    sim.spawn(ArrivalGenerator::new(config.day_type.arrival_rate())?);
    Ok(sim)
}

/// Run one department configuration to its horizon.
pub fn run_department(config: &DepartmentConfig) -> KernelResult<RunReport> {
    let mut sim = build_department(config)?;
    info!(
        nurses = config.nurses,
        doctors = config.doctors,
        lab_techs = config.lab_techs,
        xray_machines = config.xray_machines,
        day_type = %config.day_type,
        seed = config.seed,
        "department run"
    );
    let events = sim.run()?;

    let end_time = sim.now();
    let faults = sim.faults().len();
    let utilization = sim.samples().to_vec();
    let department = sim.into_world();
    let arrivals = department.arrivals();
    let patients = department.into_records();
    let summary = RunSummary::new(config, &patients);

    Ok(RunReport {
        config: config.clone(),
        summary,
        patients,
        utilization,
        arrivals,
        faults,
        events,
        end_time,
    })
}
