//! Closed-loop lambda correction

use super::PidUnit;
use crate::config::{Bounds, FuelTrimConfig};
use crate::error::ConfigError;

/// Trims fuel delivery toward the lambda target
#[derive(Clone, Debug)]
pub struct FuelTrimCorrection {
    pid: PidUnit,
    correction_limits: Bounds,

    // Last value returned, kept for telemetry
    current_correction: f64,
}

impl FuelTrimCorrection {
    pub fn new(cfg: &FuelTrimConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            pid: PidUnit::new(&cfg.pid, "fuel_trim")?,
            correction_limits: cfg.correction_limits,
            current_correction: 1.0,
        })
    }

    /// Multiplicative fuel factor within the correction limits ([0.8, 1.2] by default)
    pub fn correct(&mut self, lambda_measured: f64, lambda_target: f64, dt: f64) -> f64 {
        let error = lambda_target - lambda_measured;
        let y = self.pid.calculate(error, dt);

        self.current_correction = self.correction_limits.clamp(1.0 + y);
        self.current_correction
    }

    /// The most recent correction, 1.0 before the first cycle
    pub fn current_correction(&self) -> f64 {
        self.current_correction
    }

    pub fn pid(&self) -> &PidUnit {
        &self.pid
    }
}
