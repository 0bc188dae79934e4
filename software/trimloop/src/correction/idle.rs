//! Idle speed correction

use super::PidUnit;
use crate::config::IdleConfig;
use crate::error::ConfigError;

/// Holds the engine at its idle target by scaling idle air/fuel delivery
#[derive(Clone, Debug)]
pub struct IdleCorrection {
    pid: PidUnit,
    target_rpm: f64,
    error_scale_rpm: f64,
}

impl IdleCorrection {
    pub fn new(cfg: &IdleConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            pid: PidUnit::new(&cfg.pid, "idle")?,
            target_rpm: cfg.target_rpm,
            error_scale_rpm: cfg.error_scale_rpm,
        })
    }

    /// Multiplicative idle factor in `1 ± output_limit`, i.e. [0, 2] by default
    pub fn correct(&mut self, rpm_measured: f64, dt: f64) -> f64 {
        // Scale so that errors of a few hundred RPM land in the tuned range of the gains
        let error = (self.target_rpm - rpm_measured) / self.error_scale_rpm;
        1.0 + self.pid.calculate(error, dt)
    }

    pub fn target_rpm(&self) -> f64 {
        self.target_rpm
    }

    pub fn pid(&self) -> &PidUnit {
        &self.pid
    }
}
