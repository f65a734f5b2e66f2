//! Severity classes, day types and the per-severity service tables.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::error::{KernelError, KernelResult};
use crate::resource::Priority;

/// Share of arrivals per severity level, most urgent first.
pub const SEVERITY_WEIGHTS: [f64; 5] = [0.05, 0.15, 0.30, 0.30, 0.20];

/// Minutes at the registration desk, whatever the severity.
pub const REGISTRATION_TIME: f64 = 5.0;

const TRIAGE_TIME: [f64; 5] = [3.0, 5.0, 8.0, 10.0, 12.0];
const DOCTOR_TIME: [f64; 5] = [20.0, 25.0, 15.0, 12.0, 10.0];
const LAB_TIME: [f64; 5] = [15.0, 20.0, 25.0, 25.0, 30.0];
const XRAY_TIME: [f64; 5] = [10.0, 15.0, 20.0, 20.0, 25.0];
const TREATMENT_TIME: [f64; 5] = [60.0, 45.0, 30.0, 20.0, 15.0];

const NEEDS_LAB: [f64; 5] = [0.9, 0.8, 0.7, 0.5, 0.3];
const NEEDS_XRAY: [f64; 5] = [0.7, 0.6, 0.5, 0.3, 0.2];

/// Which calendar day is simulated. Only the arrival rate changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum DayType {
    #[default]
    Weekday,
    Weekend,
    Holiday,
}

impl DayType {
    /// Mean arrivals per minute.
    pub fn arrival_rate(self) -> f64 {
        match self {
            DayType::Weekday => 1.0 / 12.0,
            DayType::Weekend => 1.0 / 6.0,
            DayType::Holiday => 1.0 / 4.0,
        }
    }
}

impl std::fmt::Display for DayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DayType::Weekday => "weekday",
            DayType::Weekend => "weekend",
            DayType::Holiday => "holiday",
        };
        f.write_str(name)
    }
}

impl TryFrom<u8> for Severity {
    type Error = KernelError;

    fn try_from(level: u8) -> KernelResult<Self> {
        Severity::new(level)
            .ok_or_else(|| KernelError::InvalidConfig(format!("severity {level} outside 1..=5")))
    }
}

/// Triage class from 1 (life-threatening) to 5 (non-urgent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(try_from = "u8"))]
pub struct Severity(u8);

impl Severity {
    /// Most urgent class.
    pub const CRITICAL: Severity = Severity(1);

    /// Validate a level in `1..=5`.
    pub fn new(level: u8) -> Option<Self> {
        (1..=5).contains(&level).then_some(Severity(level))
    }

    /// The raw level.
    pub fn level(self) -> u8 {
        self.0
    }

    fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// Queue priority: the level itself, so level 1 is served first.
    pub fn priority(self) -> Priority {
        Priority::from(self.0)
    }

    pub fn triage_time(self) -> f64 {
        TRIAGE_TIME[self.index()]
    }

    pub fn doctor_time(self) -> f64 {
        DOCTOR_TIME[self.index()]
    }

    pub fn lab_time(self) -> f64 {
        LAB_TIME[self.index()]
    }

    pub fn xray_time(self) -> f64 {
        XRAY_TIME[self.index()]
    }

    pub fn treatment_time(self) -> f64 {
        TREATMENT_TIME[self.index()]
    }

    /// Chance that a patient of this class is sent to the lab.
    pub fn lab_probability(self) -> f64 {
        NEEDS_LAB[self.index()]
    }

    /// Chance that a patient of this class is sent to x-ray.
    pub fn xray_probability(self) -> f64 {
        NEEDS_XRAY[self.index()]
    }

    /// Severe cases are treated by a doctor and a nurse together.
    pub fn needs_joint_treatment(self) -> bool {
        self.0 <= 2
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Draws severities according to [`SEVERITY_WEIGHTS`].
#[derive(Debug, Clone)]
pub struct SeverityMix {
    index: WeightedIndex<f64>,
}

impl SeverityMix {
    /// Build the mix from five weights, most urgent first.
    pub fn new(weights: [f64; 5]) -> KernelResult<Self> {
        let index = WeightedIndex::new(weights)
            .map_err(|e| KernelError::InvalidConfig(format!("severity weights: {e}")))?;
        Ok(SeverityMix { index })
    }

    /// Draw one severity.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Severity {
        // The index is in 0..5, so the level always fits.
        Severity(self.index.sample(rng) as u8 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_level_bounds() {
        assert!(Severity::new(0).is_none());
        assert!(Severity::new(6).is_none());
        assert_eq!(Severity::new(3).map(Severity::level), Some(3));
        assert_eq!(Severity::CRITICAL.priority(), 1);
    }

    #[test]
    fn test_tables_follow_level() {
        let critical = Severity::CRITICAL;
        let minor = Severity::new(5).unwrap();
        assert_eq!(critical.treatment_time(), 60.0);
        assert_eq!(minor.treatment_time(), 15.0);
        assert_eq!(critical.triage_time(), 3.0);
        assert_eq!(minor.lab_time(), 30.0);
        assert!(critical.lab_probability() > minor.lab_probability());
        assert!(critical.needs_joint_treatment());
        assert!(Severity::new(2).unwrap().needs_joint_treatment());
        assert!(!Severity::new(3).unwrap().needs_joint_treatment());
    }

    #[test]
    fn test_arrival_rates() {
        assert!(DayType::Holiday.arrival_rate() > DayType::Weekend.arrival_rate());
        assert!(DayType::Weekend.arrival_rate() > DayType::Weekday.arrival_rate());
        assert_eq!(DayType::default(), DayType::Weekday);
        assert_eq!(DayType::Weekend.to_string(), "weekend");
    }

    #[test]
    fn test_mix_roughly_matches_weights() {
        let mix = SeverityMix::new(SEVERITY_WEIGHTS).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut counts = [0usize; 5];
        for _ in 0..10_000 {
            counts[usize::from(mix.draw(&mut rng).level() - 1)] += 1;
        }
        for (count, weight) in counts.iter().zip(SEVERITY_WEIGHTS) {
            let share = *count as f64 / 10_000.0;
            assert!((share - weight).abs() < 0.02, "share {share} vs weight {weight}");
        }
    }

    #[test]
    fn test_mix_rejects_bad_weights() {
        assert!(SeverityMix::new([0.0; 5]).is_err());
    }

    #[test]
    fn test_try_from_checks_range() {
        assert_eq!(Severity::try_from(3u8), Ok(Severity::new(3).unwrap()));
        assert!(Severity::try_from(0u8).is_err());
        assert!(Severity::try_from(6u8).is_err());
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn test_deserialize_checks_range() {
        let ok: Severity = serde_json::from_str("2").unwrap();
        assert_eq!(ok.level(), 2);
        assert!(serde_json::from_str::<Severity>("0").is_err());
        assert!(serde_json::from_str::<Severity>("9").is_err());
    }
}
