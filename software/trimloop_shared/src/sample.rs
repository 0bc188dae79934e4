//! Sensor readings consumed by one control cycle

#[cfg(feature = "ser")]
use serde::{Deserialize, Serialize};

use crate::{DEFAULT_KNOCK_LEVEL, LAMBDA_STOICH};

/// One timestamped set of engine sensor readings.
///
/// `timestamp` is monotonic seconds. Only `rpm`, `lambda`, `lambda_target`
/// and `knock` feed the corrections; the auxiliary channels are carried
/// through to data sinks untouched.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub struct EngineSample {
    pub timestamp: f64,
    pub rpm: f64,
    pub lambda: f64,
    pub lambda_target: f64,

    /// Knock sensor level, if the source provides one
    #[cfg_attr(feature = "ser", serde(default))]
    pub knock: Option<f64>,

    #[cfg_attr(feature = "ser", serde(default))]
    pub aux: AuxChannels,
}

impl EngineSample {
    pub fn new(timestamp: f64, rpm: f64, lambda: f64, lambda_target: f64) -> Self {
        Self {
            timestamp,
            rpm,
            lambda,
            lambda_target,
            knock: None,
            aux: AuxChannels::default(),
        }
    }

    /// Attach a knock sensor reading
    pub fn with_knock(mut self, knock: f64) -> Self {
        self.knock = Some(knock);
        self
    }

    /// Knock level, substituting [`DEFAULT_KNOCK_LEVEL`] when absent
    pub fn knock_level(&self) -> f64 {
        self.knock.unwrap_or(DEFAULT_KNOCK_LEVEL)
    }

    /// Names of the channels written by [`EngineSample::write_vals`], in order
    pub fn channel_names() -> Vec<String> {
        [
            "rpm",
            "lambda",
            "lambda_target",
            "knock",
            "tps",
            "map_kpa",
            "iat_c",
            "ect_c",
            "battery_v",
            "ve_percent",
        ]
        .iter()
        .map(|s| (*s).to_owned())
        .collect()
    }

    /// Number of channels written by [`EngineSample::write_vals`]
    pub const N_CHANNELS: usize = 10;

    /// Write channel values in the order given by [`EngineSample::channel_names`]
    pub fn write_vals(&self, dst: &mut [f64]) {
        let vals = [
            self.rpm,
            self.lambda,
            self.lambda_target,
            self.knock_level(),
            self.aux.tps,
            self.aux.map_kpa,
            self.aux.iat_c,
            self.aux.ect_c,
            self.aux.battery_v,
            self.aux.ve_percent,
        ];
        dst[..Self::N_CHANNELS].copy_from_slice(&vals);
    }
}

impl Default for EngineSample {
    fn default() -> Self {
        Self::new(0.0, 0.0, LAMBDA_STOICH, LAMBDA_STOICH)
    }
}

/// Readings that are logged alongside the corrections but do not drive them
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub struct AuxChannels {
    /// Throttle position, percent
    pub tps: f64,
    /// Manifold absolute pressure
    pub map_kpa: f64,
    /// Intake air temperature
    pub iat_c: f64,
    /// Engine coolant temperature
    pub ect_c: f64,
    pub battery_v: f64,
    /// Volumetric efficiency, percent
    pub ve_percent: f64,
}

impl Default for AuxChannels {
    fn default() -> Self {
        // Key-on, engine cold
        Self {
            tps: 0.0,
            map_kpa: 90.0,
            iat_c: 25.0,
            ect_c: 25.0,
            battery_v: 12.0,
            ve_percent: 0.0,
        }
    }
}
