//! Correction output of one control cycle

use core::fmt;

#[cfg(feature = "ser")]
use serde::{Deserialize, Serialize};

/// Corrections produced by one cycle of the correction manager.
///
/// A field is `None` when it was not computed this cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub struct CorrectionRecord {
    /// Multiplicative idle air/fuel factor in [0, 2]
    pub idle_correction: Option<f64>,

    /// Multiplicative fuel factor, bounded by the fuel-trim limits
    pub fuel_correction: Option<f64>,

    /// Ignition timing change in degrees, zero or negative
    pub knock_retard_deg: Option<f64>,
}

impl CorrectionRecord {
    /// A record with no corrections
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.idle_correction.is_none()
            && self.fuel_correction.is_none()
            && self.knock_retard_deg.is_none()
    }

    /// Names of the channels written by [`CorrectionRecord::write_vals`], in order
    pub fn channel_names() -> Vec<String> {
        vec![
            "idle_correction".to_owned(),
            "fuel_correction".to_owned(),
            "knock_retard_deg".to_owned(),
        ]
    }

    pub const N_CHANNELS: usize = 3;

    /// Write correction values, using NaN for corrections that were not computed
    pub fn write_vals(&self, dst: &mut [f64]) {
        dst[0] = self.idle_correction.unwrap_or(f64::NAN);
        dst[1] = self.fuel_correction.unwrap_or(f64::NAN);
        dst[2] = self.knock_retard_deg.unwrap_or(f64::NAN);
    }
}

/// Why a cycle produced no corrections
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub enum SkipReason {
    /// The sample's timestamp did not advance past the previous one
    NonPositiveDt { dt_s: f64 },

    /// A channel used by the corrections was NaN or infinite
    NonFiniteInput { channel: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveDt { dt_s } => write!(f, "non-positive time step ({dt_s} s)"),
            Self::NonFiniteInput { channel } => write!(f, "non-finite `{channel}` reading"),
        }
    }
}

/// Result of one correction manager cycle
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub enum CycleOutcome {
    /// First sample seen; it only establishes the timing baseline
    Warmup,

    /// All three corrections were computed
    Computed(CorrectionRecord),

    /// Controller state was left untouched
    Skipped(SkipReason),
}

impl CycleOutcome {
    /// The correction record, empty unless the cycle was computed
    pub fn record(&self) -> CorrectionRecord {
        match self {
            Self::Computed(record) => *record,
            Self::Warmup | Self::Skipped(_) => CorrectionRecord::empty(),
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed(_))
    }

    /// Numeric status for flat data sinks: 0 warm-up, 1 computed, 2 skipped
    pub fn status_code(&self) -> f64 {
        match self {
            Self::Warmup => 0.0,
            Self::Computed(_) => 1.0,
            Self::Skipped(_) => 2.0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_record_only_present_when_computed() {
        let computed = CycleOutcome::Computed(CorrectionRecord {
            idle_correction: Some(1.0),
            fuel_correction: Some(1.0),
            knock_retard_deg: Some(0.0),
        });
        assert!(!computed.record().is_empty());
        assert!(CycleOutcome::Warmup.record().is_empty());
        assert!(CycleOutcome::Skipped(SkipReason::NonPositiveDt { dt_s: 0.0 })
            .record()
            .is_empty());
    }

    #[test]
    fn test_absent_corrections_written_as_nan() {
        let mut vals = [0.0; CorrectionRecord::N_CHANNELS];
        CorrectionRecord {
            fuel_correction: Some(0.95),
            ..Default::default()
        }
        .write_vals(&mut vals);
        assert!(vals[0].is_nan());
        assert_eq!(vals[1], 0.95);
        assert!(vals[2].is_nan());
    }
}
