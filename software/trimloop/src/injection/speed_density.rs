//! Speed-density fueling from manifold pressure, intake temperature and VE

use serde::{Deserialize, Serialize};

use trimloop_shared::EngineSample;

use super::InjectionModel;
use crate::config::{EngineConfig, InjectorConfig};
use crate::error::ConfigError;

/// Specific gas constant of dry air, J/(kg K)
const R_AIR: f64 = 287.05;

/// Stoichiometric air-fuel mass ratio of gasoline
const AFR_STOICH: f64 = 14.7;

const ZERO_C_IN_K: f64 = 273.15;

/// Pulse width from the ideal-gas air charge of one cylinder:
///
/// ```text
/// m_air  = MAP * V_cyl * VE / (R * T_iat)
/// m_fuel = m_air / (AFR_stoich * lambda_target)
/// pulse  = m_fuel / injector mass flow + dead time
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct SpeedDensity {
    cylinder_volume_m3: f64,
    injector: InjectorConfig,
    fallback_lambda_target: f64,
}

impl SpeedDensity {
    pub fn new(engine: &EngineConfig) -> Result<Self, ConfigError> {
        engine.validate()?;
        Ok(Self {
            cylinder_volume_m3: engine.cylinder_volume_m3,
            injector: engine.injector,
            fallback_lambda_target: engine.lambda_target,
        })
    }

    /// Injector mass flow in grams per millisecond
    fn flow_g_per_ms(&self) -> f64 {
        self.injector.flow_cc_per_min * self.injector.fuel_density_g_per_cc / 60_000.0
    }
}

#[typetag::serde]
impl InjectionModel for SpeedDensity {
    fn injection_ms(&self, sample: &EngineSample) -> f64 {
        let aux = &sample.aux;
        let lambda_target = if sample.lambda_target.is_finite() && sample.lambda_target > 0.0 {
            sample.lambda_target
        } else {
            self.fallback_lambda_target
        };

        let map_pa = aux.map_kpa.max(0.0) * 1e3;
        let ve = aux.ve_percent.max(0.0) / 100.0;
        let t_k = aux.iat_c + ZERO_C_IN_K;

        let air_g = 1e3 * map_pa * self.cylinder_volume_m3 * ve / (R_AIR * t_k);
        let fuel_g = air_g / (AFR_STOICH * lambda_target);

        fuel_g / self.flow_g_per_ms() + self.injector.dead_time_ms
    }
}
