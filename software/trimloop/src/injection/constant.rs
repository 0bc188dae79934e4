//! A fixed base pulse width

use serde::{Deserialize, Serialize};

use trimloop_shared::EngineSample;

use super::InjectionModel;

/// Same pulse width every cycle, for bench testing the correction loop
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct ConstantInjection {
    pub ms: f64,
}

impl ConstantInjection {
    pub fn new(ms: f64) -> Self {
        Self { ms }
    }
}

impl Default for ConstantInjection {
    fn default() -> Self {
        Self::new(5.0)
    }
}

#[typetag::serde]
impl InjectionModel for ConstantInjection {
    fn injection_ms(&self, _: &EngineSample) -> f64 {
        self.ms
    }
}
