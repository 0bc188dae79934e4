//! Runs the three corrections once per cycle and derives the time step
//! from consecutive sample timestamps.

use tracing::{debug, warn};

use trimloop_shared::{CorrectionRecord, CycleOutcome, EngineSample, SkipReason};

use super::{FuelTrimCorrection, IdleCorrection, KnockCorrection};
use crate::config::CorrectionConfig;
use crate::error::ConfigError;

/// Owns the idle, fuel-trim and knock controllers and the timing baseline.
///
/// Samples must arrive in increasing timestamp order from a single caller.
/// The first sample only sets the baseline. A sample whose timestamp does not
/// advance produces a skipped cycle and changes nothing.
#[derive(Clone, Debug)]
pub struct CorrectionManager {
    idle: IdleCorrection,
    fuel_trim: FuelTrimCorrection,
    knock: KnockCorrection,

    last_timestamp: Option<f64>,
}

impl CorrectionManager {
    pub fn new(cfg: &CorrectionConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            idle: IdleCorrection::new(&cfg.idle)?,
            fuel_trim: FuelTrimCorrection::new(&cfg.fuel_trim)?,
            knock: KnockCorrection::new(&cfg.knock)?,
            last_timestamp: None,
        })
    }

    /// Run one correction cycle for `sample`
    pub fn update(&mut self, sample: &EngineSample) -> CycleOutcome {
        let Some(last) = self.last_timestamp else {
            if sample.timestamp.is_finite() {
                self.last_timestamp = Some(sample.timestamp);
                debug!("Correction baseline set at t = {} s", sample.timestamp);
                return CycleOutcome::Warmup;
            }
            return self.skip(SkipReason::NonFiniteInput {
                channel: "timestamp".to_owned(),
            });
        };

        // Negated comparison also catches a NaN timestamp
        let dt = sample.timestamp - last;
        if !(dt > 0.0 && dt.is_finite()) {
            return self.skip(SkipReason::NonPositiveDt { dt_s: dt });
        }

        // The baseline still moves forward so the next dt is measured from this sample
        self.last_timestamp = Some(sample.timestamp);

        let knock_level = sample.knock_level();
        for (channel, value) in [
            ("rpm", sample.rpm),
            ("lambda", sample.lambda),
            ("lambda_target", sample.lambda_target),
            ("knock", knock_level),
        ] {
            if !value.is_finite() {
                return self.skip(SkipReason::NonFiniteInput {
                    channel: channel.to_owned(),
                });
            }
        }

        let record = CorrectionRecord {
            idle_correction: Some(self.idle.correct(sample.rpm, dt)),
            fuel_correction: Some(
                self.fuel_trim
                    .correct(sample.lambda, sample.lambda_target, dt),
            ),
            knock_retard_deg: Some(self.knock.correct(knock_level, dt)),
        };

        CycleOutcome::Computed(record)
    }

    fn skip(&self, reason: SkipReason) -> CycleOutcome {
        warn!("Skipping correction cycle: {reason}");
        CycleOutcome::Skipped(reason)
    }

    /// Timestamp of the last sample accepted as a timing baseline
    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }

    pub fn idle(&self) -> &IdleCorrection {
        &self.idle
    }

    pub fn fuel_trim(&self) -> &FuelTrimCorrection {
        &self.fuel_trim
    }

    pub fn knock(&self) -> &KnockCorrection {
        &self.knock
    }
}
