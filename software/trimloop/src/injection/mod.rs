//! Base injection time models.
//!
//! The base pulse width is computed outside the correction loop; the cycle
//! driver only asks an [`InjectionModel`] for it once per cycle.

mod constant;
mod speed_density;

pub use constant::ConstantInjection;
pub use speed_density::SpeedDensity;

use trimloop_shared::EngineSample;

/// Base injector pulse width, in milliseconds, for one sample
#[typetag::serde(tag = "type")]
pub trait InjectionModel: Send + Sync {
    fn injection_ms(&self, sample: &EngineSample) -> f64;
}
