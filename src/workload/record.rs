//! Per-patient records.

use crate::time::VirtualTime;

use super::severity::Severity;

/// A step of the patient journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Stage {
    Registration,
    Triage,
    DoctorExam,
    Lab,
    Xray,
    Treatment,
}

impl Stage {
    /// Label used in logs and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Registration => "registration",
            Stage::Triage => "triage",
            Stage::DoctorExam => "doctor_exam",
            Stage::Lab => "lab",
            Stage::Xray => "xray",
            Stage::Treatment => "treatment",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When one stage was requested, started and finished.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StageTiming {
    pub stage: Stage,
    /// Resources requested.
    pub requested_at: VirtualTime,
    /// Resources granted; service starts.
    pub started_at: VirtualTime,
    /// Service over; resources released.
    pub ended_at: VirtualTime,
}

impl StageTiming {
    /// Time spent queuing for this stage.
    pub fn wait(&self) -> f64 {
        self.started_at.duration_since(self.requested_at).unwrap_or(0.0)
    }

    /// Time spent in service.
    pub fn service(&self) -> f64 {
        self.ended_at.duration_since(self.started_at).unwrap_or(0.0)
    }
}

/// A discharged patient.
///
/// Written once, at discharge. Patients still inside when the run stops
/// have no record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PatientRecord {
    pub id: u64,
    pub severity: Severity,
    pub arrival_time: VirtualTime,
    /// Completed stages in journey order.
    pub stages: Vec<StageTiming>,
    /// Sum of the per-stage queuing times.
    pub wait_time: f64,
    /// Discharge time minus arrival time.
    pub total_time: f64,
}

impl PatientRecord {
    /// Close a journey at `discharged_at`.
    pub fn discharge(
        id: u64,
        severity: Severity,
        arrival_time: VirtualTime,
        stages: Vec<StageTiming>,
        discharged_at: VirtualTime,
    ) -> Self {
        let wait_time = stages.iter().map(StageTiming::wait).sum();
        let total_time = discharged_at.duration_since(arrival_time).unwrap_or(0.0);
        PatientRecord {
            id,
            severity,
            arrival_time,
            stages,
            wait_time,
            total_time,
        }
    }

    /// Timing of `stage`, if the patient went through it.
    pub fn stage(&self, stage: Stage) -> Option<&StageTiming> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(v: f64) -> VirtualTime {
        VirtualTime::new(v)
    }

    fn timing(stage: Stage, requested: f64, started: f64, ended: f64) -> StageTiming {
        StageTiming {
            stage,
            requested_at: t(requested),
            started_at: t(started),
            ended_at: t(ended),
        }
    }

    #[test]
    fn test_wait_is_sum_of_queueing() {
        let stages = vec![
            timing(Stage::Registration, 1.0, 3.0, 8.0),
            timing(Stage::Triage, 8.0, 8.0, 16.0),
            timing(Stage::Treatment, 16.0, 20.5, 50.5),
        ];
        let record = PatientRecord::discharge(7, Severity::new(3).unwrap(), t(1.0), stages, t(50.5));

        assert_eq!(record.wait_time, 6.5);
        assert_eq!(record.total_time, 49.5);
        assert_eq!(record.stage(Stage::Triage).map(StageTiming::service), Some(8.0));
        assert!(record.stage(Stage::Lab).is_none());
    }
}
