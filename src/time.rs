/// Virtual time for the simulation kernel.
///
/// Represents a point on the simulation's continuous timeline with no
/// dependency on `std::time`. Time advances only when the clock
/// dispatches events, never from wall-clock observation.

use std::cmp::Ordering;

use crate::error::{KernelError, KernelResult};

/// A point in simulation time.
///
/// Wraps a finite, non-negative `f64`. Every constructor rejects NaN,
/// infinities and negative values, which is what makes the total
/// order below sound.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(try_from = "f64"))]
pub struct VirtualTime(f64);

impl VirtualTime {
    /// The zero-point of simulation time.
    pub const ZERO: VirtualTime = VirtualTime(0.0);

    /// Create a `VirtualTime` from a raw value.
    ///
    /// # Panics
    /// Panics if `units` is negative or not finite. Use [`try_new`]
    /// for values that did not come from a literal.
    ///
    /// [`try_new`]: VirtualTime::try_new
    #[inline]
    pub fn new(units: f64) -> Self {
        assert!(
            units.is_finite() && units >= 0.0,
            "VirtualTime must be finite and non-negative, got {}",
            units
        );
        VirtualTime(units)
    }

    /// Fallible constructor.
    pub fn try_new(units: f64) -> KernelResult<Self> {
        if units.is_finite() && units >= 0.0 {
            Ok(VirtualTime(units))
        } else {
            Err(KernelError::InvalidTime(units))
        }
    }

    /// Return the raw value.
    #[inline]
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Compute the absolute time that is `delay` after `self`.
    /// Returns `None` if the sum overflows to infinity.
    #[inline]
    pub fn plus(self, delay: Delay) -> Option<VirtualTime> {
        let due = self.0 + delay.0;
        due.is_finite().then_some(VirtualTime(due))
    }

    /// Returns `true` if `self` is strictly before `other`.
    #[inline]
    pub fn is_before(self, other: VirtualTime) -> bool {
        self < other
    }

    /// Returns the span between two points in time.
    /// Returns `None` if `earlier` is after `self`.
    #[inline]
    pub fn duration_since(self, earlier: VirtualTime) -> Option<f64> {
        if earlier > self {
            None
        } else {
            Some(self.0 - earlier.0)
        }
    }
}

impl PartialEq for VirtualTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VirtualTime {}

impl PartialOrd for VirtualTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VirtualTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T={:.3}", self.0)
    }
}

// ── Delay ─────────────────────────────────────────────────────────────

/// A validated, non-negative span of virtual time.
///
/// Processes can only suspend on a `Delay`, so a negative wait is
/// rejected at the call that introduces it rather than when the
/// scheduler tries to honour it.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(try_from = "f64"))]
pub struct Delay(f64);

impl Delay {
    /// A zero-length delay: yields to everything already due now.
    pub const ZERO: Delay = Delay(0.0);

    /// Validate a raw span.
    pub fn new(units: f64) -> KernelResult<Self> {
        if units.is_finite() && units >= 0.0 {
            Ok(Delay(units))
        } else {
            Err(KernelError::InvalidDelay(units))
        }
    }

    /// Return the raw value.
    #[inline]
    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for VirtualTime {
    type Error = KernelError;

    fn try_from(units: f64) -> KernelResult<Self> {
        VirtualTime::try_new(units)
    }
}

impl TryFrom<f64> for Delay {
    type Error = KernelError;

    fn try_from(units: f64) -> KernelResult<Self> {
        Delay::new(units)
    }
}
