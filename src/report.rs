//! End-of-run results, handed to whatever reports on them.

use crate::sampler::UtilizationSample;
use crate::time::VirtualTime;
use crate::workload::{DayType, DepartmentConfig, PatientRecord};

/// Headline figures of one run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RunSummary {
    pub day_type: DayType,
    /// Discharged patients.
    pub patient_count: usize,
    /// Mean queuing time per discharged patient (0 when none).
    pub avg_wait_time: f64,
    /// Mean time in the department per discharged patient (0 when none).
    pub avg_total_time: f64,
    /// Monthly staffing cost, in USD.
    pub monthly_cost: f64,
    /// `None` when nobody was discharged.
    pub cost_per_patient: Option<f64>,
}

impl RunSummary {
    /// Summarize the records of a run of `config`.
    pub fn new(config: &DepartmentConfig, patients: &[PatientRecord]) -> Self {
        let patient_count = patients.len();
        let mean = |f: fn(&PatientRecord) -> f64| {
            if patient_count == 0 {
                0.0
            } else {
                patients.iter().map(f).sum::<f64>() / patient_count as f64
            }
        };
        let monthly_cost = config.monthly_cost();
        RunSummary {
            day_type: config.day_type,
            patient_count,
            avg_wait_time: mean(|p| p.wait_time),
            avg_total_time: mean(|p| p.total_time),
            monthly_cost,
            cost_per_patient: (patient_count > 0).then(|| monthly_cost / patient_count as f64),
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} patients, avg wait {:.1} min, avg stay {:.1} min, ${:.0}/month",
            self.day_type, self.patient_count, self.avg_wait_time, self.avg_total_time, self.monthly_cost
        )
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RunReport {
    pub config: DepartmentConfig,
    pub summary: RunSummary,
    /// Discharged patients, in discharge order.
    pub patients: Vec<PatientRecord>,
    /// Sampler series for the staff pools.
    pub utilization: Vec<UtilizationSample>,
    /// Patients that arrived, discharged or not.
    pub arrivals: u64,
    /// Processes aborted by a fault.
    pub faults: usize,
    /// Events dispatched.
    pub events: u64,
    /// Clock reading when the run stopped.
    pub end_time: VirtualTime,
}

impl RunReport {
    /// Samples of one pool, by name.
    pub fn utilization_of<'a>(&'a self, pool: &'a str) -> impl Iterator<Item = &'a UtilizationSample> + 'a {
        self.utilization.iter().filter(move |s| s.pool_name == pool)
    }

    /// Highest load (in service plus queued) seen on a pool.
    pub fn peak_load(&self, pool: &str) -> usize {
        self.utilization_of(pool).map(UtilizationSample::load).max().unwrap_or(0)
    }

    /// Serialize the whole report.
    #[cfg(feature = "serialize")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
