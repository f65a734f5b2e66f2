//! Emergency-department workload.
//!
//! Patients arrive with exponential gaps, get a severity class, and walk
//! through registration, triage, a doctor's exam, optional lab work and
//! x-ray, and treatment. Every stage competes for staff pools through the
//! kernel's priority broker; severe cases need a doctor and a nurse at
//! once for treatment.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`severity`] | [`Severity`], [`DayType`], service and branching tables |
//! | [`journey`] | [`PatientJourney`]: the per-patient state machine |
//! | [`department`] | [`DepartmentConfig`], [`ArrivalGenerator`], [`run_department`] |
//! | [`record`] | [`PatientRecord`], [`StageTiming`], [`Stage`] |

pub mod department;
pub mod journey;
pub mod record;
pub mod severity;


pub use department::{build_department, run_department, ArrivalGenerator, Department, DepartmentConfig};
pub use journey::PatientJourney;
pub use record::{PatientRecord, Stage, StageTiming};
pub use severity::{DayType, Severity, SeverityMix};
