//! Sources of engine sensor samples.
//!
//! The correction engine does not know whether samples are simulated, replayed
//! from a log, or read from a vehicle bus; it only sees [`SensorSource`].

mod replay;
mod simulated;

pub use replay::ReplaySource;
pub use simulated::SimulatedEngine;

use trimloop_shared::EngineSample;

/// Anything that can produce one engine sample per control cycle
#[typetag::serde(tag = "type")]
pub trait SensorSource: Send + Sync {
    /// Read all sensors for the cycle at `t_s` seconds since the start of the run
    fn read(&mut self, t_s: f64) -> Result<EngineSample, String>;
}
