//! A software engine that produces plausible sensor readings without hardware

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use trimloop_shared::{AuxChannels, EngineSample};

use super::SensorSource;
use crate::config::{Bounds, EcuConfig};

/// Simulated engine driven by a slow sinusoidal throttle sweep.
///
/// Below 5 % throttle the engine idles with Gaussian RPM noise; above it,
/// RPM climbs in proportion to throttle up to the rev limit. Lambda drifts as
/// a random walk within the sensor range, coolant warms toward 90 C, and
/// knock is reported near full load.
#[derive(Serialize, Deserialize, Debug)]
pub struct SimulatedEngine {
    // User inputs
    seed: Option<u64>,
    idle_rpm: f64,
    rpm_max: f64,
    lambda_range: Bounds,
    lambda_target: f64,
    idle_rpm_noise: f64,
    lambda_noise: f64,

    /// Throttle sweep `offset + amplitude * sin(rate * t)`, percent
    tps_offset: f64,
    tps_amplitude: f64,
    tps_rate_rad_per_s: f64,

    /// Throttle position above which the engine reports knock
    knock_tps_threshold: f64,
    knock_level_at_load: f64,

    // Internal state, rebuilt at key-on
    #[serde(skip)]
    state: EngineState,

    #[serde(skip)]
    rng: Option<StdRng>,
}

#[derive(Debug, Clone, Copy)]
struct EngineState {
    rpm: f64,
    lambda: f64,
    ect_c: f64,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            rpm: 800.0,
            lambda: 1.0,
            ect_c: 25.0,
        }
    }
}

impl SimulatedEngine {
    /// Build a simulator matching the engine and lambda sensor in `cfg`.
    /// A `seed` makes the noise reproducible.
    pub fn new(cfg: &EcuConfig, seed: Option<u64>) -> Self {
        let idle_rpm = cfg.corrections.idle.target_rpm;
        Self {
            seed,
            idle_rpm,
            rpm_max: cfg.engine.rpm_max,
            lambda_range: cfg.engine.lambda_range,
            lambda_target: cfg.engine.lambda_target,
            idle_rpm_noise: 50.0,
            lambda_noise: 0.02,
            tps_offset: 50.0,
            tps_amplitude: 40.0,
            tps_rate_rad_per_s: 0.7,
            knock_tps_threshold: 85.0,
            knock_level_at_load: 6.0,

            state: EngineState::default(),
            rng: None,
        }
    }

    /// Replace the throttle sweep
    pub fn with_throttle(mut self, offset: f64, amplitude: f64, rate_rad_per_s: f64) -> Self {
        self.tps_offset = offset;
        self.tps_amplitude = amplitude;
        self.tps_rate_rad_per_s = rate_rad_per_s;
        self
    }

    /// Cold engine at idle with a freshly seeded generator
    fn key_on(&mut self) {
        self.state = EngineState {
            rpm: self.idle_rpm,
            ..Default::default()
        };
        self.rng = Some(seeded_rng(self.seed));
    }

    fn rng(&mut self) -> &mut StdRng {
        let seed = self.seed;
        self.rng.get_or_insert_with(|| seeded_rng(seed))
    }

    fn normal(&mut self, std_dev: f64) -> Result<f64, String> {
        let dist =
            Normal::new(0.0, std_dev).map_err(|e| format!("Invalid noise level {std_dev}: {e}"))?;
        Ok(dist.sample(self.rng()))
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

#[typetag::serde]
impl SensorSource for SimulatedEngine {
    fn read(&mut self, t_s: f64) -> Result<EngineSample, String> {
        if self.rng.is_none() {
            self.key_on();
        }

        let tps = (self.tps_offset + self.tps_amplitude * (self.tps_rate_rad_per_s * t_s).sin())
            .clamp(0.0, 100.0);

        if tps < 5.0 {
            self.state.rpm = self.idle_rpm + self.normal(self.idle_rpm_noise)?;
        } else {
            let rpm_delta = (tps / 100.0) * 500.0;
            self.state.rpm = (self.state.rpm + rpm_delta).min(self.rpm_max);
        }

        self.state.ect_c = (self.state.ect_c + 0.1).min(90.0);
        let map_kpa = 90.0 + tps * 0.5;

        let drift = self.normal(self.lambda_noise)?;
        self.state.lambda = self.lambda_range.clamp(self.state.lambda + drift);

        // Base volumetric efficiency rises with both speed and load
        let rpm_frac = ((self.state.rpm - 1000.0) / 6000.0).clamp(0.0, 1.0);
        let ve_percent = 60.0 + 20.0 * rpm_frac + 20.0 * tps / 100.0;

        let knock = if tps > self.knock_tps_threshold {
            self.knock_level_at_load
        } else {
            0.0
        };

        Ok(EngineSample {
            timestamp: t_s,
            rpm: self.state.rpm,
            lambda: self.state.lambda,
            lambda_target: self.lambda_target,
            knock: Some(knock),
            aux: AuxChannels {
                tps,
                map_kpa,
                ect_c: self.state.ect_c,
                ve_percent,
                ..Default::default()
            },
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_readings_stay_in_physical_ranges() {
        let cfg = EcuConfig::default();
        let mut sim = SimulatedEngine::new(&cfg, Some(7));

        for i in 0..2000 {
            let t = i as f64 * 0.05;
            let s = sim.read(t).unwrap();
            assert_eq!(s.timestamp, t);
            assert!((0.0..=100.0).contains(&s.aux.tps));
            assert!(s.rpm <= cfg.engine.rpm_max);
            assert!((0.7..=1.3).contains(&s.lambda));
            assert!(s.aux.ect_c <= 90.0);
            assert!(s.knock.is_some());
        }
    }

    #[test]
    fn test_closed_throttle_idles_near_target() {
        let cfg = EcuConfig::default();
        let mut sim = SimulatedEngine::new(&cfg, Some(3)).with_throttle(0.0, 0.0, 0.0);
        let mean = (0..500)
            .map(|i| sim.read(i as f64 * 0.1).unwrap().rpm)
            .sum::<f64>()
            / 500.0;
        assert!((mean - 800.0).abs() < 20.0, "mean idle rpm {mean}");
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let cfg = EcuConfig::default();
        let mut a = SimulatedEngine::new(&cfg, Some(42));
        let mut b = SimulatedEngine::new(&cfg, Some(42));
        for i in 0..100 {
            let t = i as f64 * 0.5;
            assert_eq!(a.read(t).unwrap(), b.read(t).unwrap());
        }
    }

    #[test]
    fn test_serde_roundtrip_restarts_from_key_on() {
        let cfg = EcuConfig::default();
        let sim: Box<dyn SensorSource> = Box::new(SimulatedEngine::new(&cfg, Some(1)));
        let s = serde_json::to_string(&sim).unwrap();
        let mut back: Box<dyn SensorSource> = serde_json::from_str(&s).unwrap();

        let mut fresh = SimulatedEngine::new(&cfg, Some(1));
        assert_eq!(back.read(0.0).unwrap(), fresh.read(0.0).unwrap());
    }

    #[test]
    fn test_deserialized_engine_starts_at_configured_idle() {
        let mut cfg = EcuConfig::default();
        cfg.corrections.idle.target_rpm = 1000.0;

        // Open, steady throttle so the first rpm builds on the key-on idle speed
        let sim = SimulatedEngine::new(&cfg, Some(9)).with_throttle(50.0, 0.0, 0.0);
        let s = serde_json::to_string(&sim).unwrap();
        let mut back: SimulatedEngine = serde_json::from_str(&s).unwrap();
        let mut fresh = SimulatedEngine::new(&cfg, Some(9)).with_throttle(50.0, 0.0, 0.0);

        for i in 0..10 {
            let t = i as f64 * 0.1;
            assert_eq!(back.read(t).unwrap(), fresh.read(t).unwrap());
        }
        let mut again: SimulatedEngine = serde_json::from_str(&s).unwrap();
        assert_eq!(again.read(0.0).unwrap().rpm, 1250.0);
    }
}
