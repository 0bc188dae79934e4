//! Merged per-cycle row handed to data sinks

#[cfg(feature = "ser")]
use serde::{Deserialize, Serialize};

use crate::{CorrectionRecord, CycleOutcome, EngineSample};

/// A sample merged with the base injection time and the corrections
/// computed for it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub struct CycleReport {
    pub sample: EngineSample,
    pub injection_ms: f64,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    pub fn new(sample: EngineSample, injection_ms: f64, outcome: CycleOutcome) -> Self {
        Self {
            sample,
            injection_ms,
            outcome,
        }
    }

    pub fn corrections(&self) -> CorrectionRecord {
        self.outcome.record()
    }

    /// Sample timestamp as integer nanoseconds
    pub fn timestamp_ns(&self) -> i64 {
        (self.sample.timestamp * 1e9).round() as i64
    }

    /// Total number of channels in a flattened report
    pub const N_CHANNELS: usize = EngineSample::N_CHANNELS + 2 + CorrectionRecord::N_CHANNELS;

    /// Flat channel names: sample channels, injection time, corrections, cycle status
    pub fn channel_names() -> Vec<String> {
        let mut names = EngineSample::channel_names();
        names.push("inj_ms".to_owned());
        names.extend(CorrectionRecord::channel_names());
        names.push("cycle_status".to_owned());
        names
    }

    /// Write values in the order given by [`CycleReport::channel_names`]
    pub fn write_vals(&self, dst: &mut [f64]) {
        let n = EngineSample::N_CHANNELS;
        self.sample.write_vals(&mut dst[..n]);
        dst[n] = self.injection_ms;
        self.corrections()
            .write_vals(&mut dst[n + 1..n + 1 + CorrectionRecord::N_CHANNELS]);
        dst[Self::N_CHANNELS - 1] = self.outcome.status_code();
    }

    pub fn to_vals(&self) -> Vec<f64> {
        let mut vals = vec![0.0; Self::N_CHANNELS];
        self.write_vals(&mut vals);
        vals
    }
}
