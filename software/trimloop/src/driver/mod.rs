//! Engine cycle driver and the run loop built around it

pub mod context;
mod simulation;

pub use context::RunCtx;
pub use simulation::{RunSummary, Simulation};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use trimloop_shared::CycleReport;

use crate::config::EcuConfig;
use crate::correction::CorrectionManager;
use crate::error::{ConfigError, EcuError, EcuResult};
use crate::injection::InjectionModel;
use crate::sensor::SensorSource;

/// The engine cycle driver: one sensor read, one correction cycle and one
/// base injection computation per call to [`Ecu::cycle`].
///
/// Serializes as its configuration and collaborators; correction state is
/// rebuilt fresh on deserialization.
#[derive(Serialize)]
pub struct Ecu {
    config: EcuConfig,
    source: Box<dyn SensorSource>,
    injection: Box<dyn InjectionModel>,

    #[serde(skip_serializing)]
    manager: CorrectionManager,
}

impl Ecu {
    /// Validate `config` and build fresh controllers
    pub fn new(
        config: EcuConfig,
        source: Box<dyn SensorSource>,
        injection: Box<dyn InjectionModel>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let manager = CorrectionManager::new(&config.corrections)?;
        Ok(Self {
            config,
            source,
            injection,
            manager,
        })
    }

    /// Run one full cycle at `current_time` seconds since the start of the run.
    ///
    /// Nothing is retried or cached. A sensor failure aborts the cycle before
    /// any controller state changes.
    pub fn cycle(&mut self, current_time: f64) -> EcuResult<CycleReport> {
        let sample = self.source.read(current_time).map_err(EcuError::Sensor)?;
        let injection_ms = self.injection.injection_ms(&sample);
        let outcome = self.manager.update(&sample);

        debug!(
            "Cycle at t = {current_time} s: rpm {:.0}, lambda {:.3}, {:?}",
            sample.rpm, sample.lambda, outcome
        );

        Ok(CycleReport::new(sample, injection_ms, outcome))
    }

    pub fn config(&self) -> &EcuConfig {
        &self.config
    }

    pub fn manager(&self) -> &CorrectionManager {
        &self.manager
    }
}

/// Serialized form of [`Ecu`]
#[derive(Deserialize)]
struct EcuParts {
    config: EcuConfig,
    source: Box<dyn SensorSource>,
    injection: Box<dyn InjectionModel>,
}

impl<'de> Deserialize<'de> for Ecu {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parts = EcuParts::deserialize(deserializer)?;
        Self::new(parts.config, parts.source, parts.injection).map_err(serde::de::Error::custom)
    }
}
