//! `PatientJourney`: one patient's path through the department.
//!
//! registration → triage → doctor exam → [lab] → [x-ray] → treatment
//!
//! Each stage requests its pool(s), waits for the grant, holds for the
//! severity's service time and releases before the next stage starts.

use rand::Rng;
use tracing::debug;

use crate::error::ProcessFault;
use crate::process::{Process, ProcessContext, Wake, Yield};
use crate::resource::{JointId, Priority, RequestId};
use crate::time::VirtualTime;

use super::department::{Department, DOCTORS, LAB_TECHS, NURSES, REGISTRATION, XRAY_MACHINES};
use super::record::{PatientRecord, Stage, StageTiming};
use super::severity::{Severity, REGISTRATION_TIME};

/// Pool a single-pool stage draws from.
fn pool_for(stage: Stage) -> &'static str {
    match stage {
        Stage::Registration => REGISTRATION,
        Stage::Triage | Stage::Treatment => NURSES,
        Stage::DoctorExam => DOCTORS,
        Stage::Lab => LAB_TECHS,
        Stage::Xray => XRAY_MACHINES,
    }
}

/// What a stage is holding or waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hold {
    Single(RequestId),
    Joint(JointId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Arriving,
    Waiting { stage: Stage, hold: Hold, requested_at: VirtualTime },
    InService { stage: Stage, hold: Hold, requested_at: VirtualTime, started_at: VirtualTime },
}

/// A patient process.
#[derive(Debug, Clone)]
pub struct PatientJourney {
    id: u64,
    name: String,
    severity: Severity,
    arrival_time: VirtualTime,
    stages: Vec<StageTiming>,
    step: Step,
}

impl PatientJourney {
    /// A patient that arrives when first resumed.
    pub fn new(id: u64) -> Self {
        PatientJourney {
            id,
            name: format!("patient-{id}"),
            severity: Severity::CRITICAL,
            arrival_time: VirtualTime::ZERO,
            stages: Vec::new(),
            step: Step::Arriving,
        }
    }

    /// The registration desk is first come first served.
    fn priority_at(&self, stage: Stage) -> Priority {
        match stage {
            Stage::Registration => 0,
            _ => self.severity.priority(),
        }
    }

    fn service_time(&self, stage: Stage) -> f64 {
        match stage {
            Stage::Registration => REGISTRATION_TIME,
            Stage::Triage => self.severity.triage_time(),
            Stage::DoctorExam => self.severity.doctor_time(),
            Stage::Lab => self.severity.lab_time(),
            Stage::Xray => self.severity.xray_time(),
            Stage::Treatment => self.severity.treatment_time(),
        }
    }

    /// Request what `stage` needs and wait for it.
    fn begin(
        &mut self,
        ctx: &mut ProcessContext<'_, Department>,
        stage: Stage,
    ) -> Result<Yield, ProcessFault> {
        let requested_at = ctx.now();
        let (hold, wait) = if stage == Stage::Treatment && self.severity.needs_joint_treatment() {
            let priority = self.severity.priority();
            let wants = [(ctx.pool(DOCTORS)?, priority), (ctx.pool(NURSES)?, priority)];
            let joint = ctx.acquire_joint(&wants)?;
            (Hold::Joint(joint), Yield::Joint(joint))
        } else {
            let pool = ctx.pool(pool_for(stage))?;
            let request = ctx.request(pool, self.priority_at(stage))?;
            (Hold::Single(request), Yield::Request(request))
        };
        debug!(patient = self.id, %stage, "requested");
        self.step = Step::Waiting {
            stage,
            hold,
            requested_at,
        };
        Ok(wait)
    }

    /// Stage that follows `finished`, drawing the lab and x-ray branches.
    fn next_stage<R: Rng + ?Sized>(&self, rng: &mut R, finished: Stage) -> Option<Stage> {
        let severity = self.severity;
        let xray_or_treatment = |rng: &mut R| {
            if rng.gen::<f64>() < severity.xray_probability() {
                Stage::Xray
            } else {
                Stage::Treatment
            }
        };
        match finished {
            Stage::Registration => Some(Stage::Triage),
            Stage::Triage => Some(Stage::DoctorExam),
            Stage::DoctorExam if rng.gen::<f64>() < severity.lab_probability() => Some(Stage::Lab),
            Stage::DoctorExam | Stage::Lab => Some(xray_or_treatment(rng)),
            Stage::Xray => Some(Stage::Treatment),
            Stage::Treatment => None,
        }
    }

    fn serve(
        &mut self,
        ctx: &mut ProcessContext<'_, Department>,
        stage: Stage,
        hold: Hold,
        requested_at: VirtualTime,
    ) -> Result<Yield, ProcessFault> {
        let started_at = ctx.now();
        debug!(patient = self.id, %stage, waited = started_at.as_f64() - requested_at.as_f64(), "in service");
        self.step = Step::InService {
            stage,
            hold,
            requested_at,
            started_at,
        };
        Ok(ctx.suspend_for(self.service_time(stage))?)
    }

    fn discharge(&mut self, ctx: &mut ProcessContext<'_, Department>) -> Result<Yield, ProcessFault> {
        let record = PatientRecord::discharge(
            self.id,
            self.severity,
            self.arrival_time,
            std::mem::take(&mut self.stages),
            ctx.now(),
        );
        debug!(
            patient = self.id,
            severity = %self.severity,
            total = record.total_time,
            wait = record.wait_time,
            "discharged"
        );
        ctx.world().discharge(record);
        Ok(Yield::Complete)
    }
}

impl Process<Department> for PatientJourney {
    fn resume(
        &mut self,
        ctx: &mut ProcessContext<'_, Department>,
        wake: Wake,
    ) -> Result<Yield, ProcessFault> {
        match (self.step, wake) {
            (Step::Arriving, Wake::Start) => {
                let (department, rng) = ctx.world_and_rng();
                self.severity = department.severity_mix().draw(rng);
                self.arrival_time = ctx.now();
                debug!(patient = self.id, severity = %self.severity, "arrived");
                self.begin(ctx, Stage::Registration)
            }

            (
                Step::Waiting {
                    stage,
                    hold: Hold::Single(awaited),
                    requested_at,
                },
                Wake::Granted(request),
            ) if awaited == request => self.serve(ctx, stage, Hold::Single(awaited), requested_at),

            (
                Step::Waiting {
                    stage,
                    hold: Hold::Joint(awaited),
                    requested_at,
                },
                Wake::JointGranted(joint),
            ) if awaited == joint => self.serve(ctx, stage, Hold::Joint(awaited), requested_at),

            (
                Step::InService {
                    stage,
                    hold,
                    requested_at,
                    started_at,
                },
                Wake::Timer,
            ) => {
                match hold {
                    Hold::Single(request) => ctx.release(request)?,
                    Hold::Joint(joint) => ctx.release_joint(joint)?,
                }
                self.stages.push(StageTiming {
                    stage,
                    requested_at,
                    started_at,
                    ended_at: ctx.now(),
                });
                match self.next_stage(ctx.rng(), stage) {
                    Some(next) => self.begin(ctx, next),
                    None => self.discharge(ctx),
                }
            }

            (step, wake) => Err(ProcessFault::workload(format!(
                "patient {} woken by {wake:?} while {step:?}",
                self.id
            ))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
