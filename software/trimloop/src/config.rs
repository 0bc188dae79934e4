//! Engine and controller configuration.
//!
//! All values are supplied once at construction and are fixed for the
//! lifetime of the controllers that consume them. Defaults reproduce the
//! calibration of a 2.0 l four-cylinder engine idling at 800 RPM.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{
    ConfigError, EcuResult, require_bounds, require_finite, require_non_negative,
    require_positive, require_within,
};

/// Widest allowed PID integral and output limit
pub const PID_LIMIT_MAX: f64 = 1.0;

/// Widest allowed fuel correction range
pub const FUEL_CORRECTION_RANGE: Bounds = Bounds::new(0.8, 1.2);

/// Closed interval `[min, max]`
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, x: f64) -> f64 {
        x.max(self.min).min(self.max)
    }

    fn validate(&self, controller: &'static str, name: &'static str) -> Result<(), ConfigError> {
        require_bounds(controller, name, self.min, self.max)
    }
}

/// Gains and symmetric saturation limits for one PID unit
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct PidConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,

    /// Integral accumulator is held within `±integral_limit`, at most 1.0
    pub integral_limit: f64,

    /// Output is held within `±output_limit`, at most 1.0
    pub output_limit: f64,
}

impl PidConfig {
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral_limit: 1.0,
            output_limit: 1.0,
        }
    }

    pub fn validate(&self, controller: &'static str) -> Result<(), ConfigError> {
        for (gain, value) in [("kp", self.kp), ("ki", self.ki), ("kd", self.kd)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidGain {
                    controller,
                    gain,
                    value,
                });
            }
        }

        for (limit, value) in [
            ("integral_limit", self.integral_limit),
            ("output_limit", self.output_limit),
        ] {
            if !(value.is_finite() && value > 0.0 && value <= PID_LIMIT_MAX) {
                return Err(ConfigError::InvalidLimit {
                    controller,
                    limit,
                    value,
                });
            }
        }

        Ok(())
    }
}

impl Default for PidConfig {
    fn default() -> Self {
        Self::new(0.1, 0.05, 0.02)
    }
}

/// Idle speed correction
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct IdleConfig {
    pub pid: PidConfig,

    /// Idle speed to hold
    pub target_rpm: f64,

    /// RPM error is divided by this before it reaches the PID unit
    pub error_scale_rpm: f64,
}

impl IdleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pid.validate("idle")?;
        require_positive("idle", "target_rpm", self.target_rpm)?;
        require_positive("idle", "error_scale_rpm", self.error_scale_rpm)?;
        Ok(())
    }
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            pid: PidConfig::new(0.2, 0.1, 0.05),
            target_rpm: 800.0,
            error_scale_rpm: 1000.0,
        }
    }
}

/// Closed-loop lambda (fuel trim) correction
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct FuelTrimConfig {
    pub pid: PidConfig,

    /// Range of the multiplicative fuel correction, within [0.8, 1.2]
    pub correction_limits: Bounds,
}

impl FuelTrimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pid.validate("fuel_trim")?;
        self.correction_limits
            .validate("fuel_trim", "correction_limits")?;
        for (name, value) in [
            ("correction_limits.min", self.correction_limits.min),
            ("correction_limits.max", self.correction_limits.max),
        ] {
            require_within("fuel_trim", name, value, FUEL_CORRECTION_RANGE)?;
        }
        Ok(())
    }
}

impl Default for FuelTrimConfig {
    fn default() -> Self {
        Self {
            pid: PidConfig::new(0.1, 0.05, 0.01),
            correction_limits: FUEL_CORRECTION_RANGE,
        }
    }
}

/// Knock retard
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct KnockConfig {
    /// Knock sensor level above which a cycle counts as knocking
    pub threshold: f64,

    /// Retard added on each knocking cycle
    pub retard_step_deg: f64,

    pub max_retard_deg: f64,

    /// Linear recovery toward zero retard while not knocking
    pub recovery_rate_deg_per_s: f64,
}

impl KnockConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_finite("knock", "threshold", self.threshold)?;
        require_non_negative("knock", "retard_step_deg", self.retard_step_deg)?;
        require_non_negative("knock", "max_retard_deg", self.max_retard_deg)?;
        require_non_negative(
            "knock",
            "recovery_rate_deg_per_s",
            self.recovery_rate_deg_per_s,
        )?;
        Ok(())
    }
}

impl Default for KnockConfig {
    fn default() -> Self {
        Self {
            threshold: 5.0,
            retard_step_deg: 2.0,
            max_retard_deg: 10.0,
            recovery_rate_deg_per_s: 0.5,
        }
    }
}

/// Configuration for all three feedback corrections
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
#[serde(default)]
pub struct CorrectionConfig {
    pub idle: IdleConfig,
    pub fuel_trim: FuelTrimConfig,
    pub knock: KnockConfig,
}

impl CorrectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.idle.validate()?;
        self.fuel_trim.validate()?;
        self.knock.validate()?;
        Ok(())
    }
}

/// Fuel injector hardware
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct InjectorConfig {
    /// Static flow rate at rated pressure
    pub flow_cc_per_min: f64,

    /// Opening delay added to every pulse
    pub dead_time_ms: f64,

    pub pressure_bar: f64,

    /// Gasoline by default
    pub fuel_density_g_per_cc: f64,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            flow_cc_per_min: 280.0,
            dead_time_ms: 1.0,
            pressure_bar: 3.0,
            fuel_density_g_per_cc: 0.789,
        }
    }
}

/// Static description of the engine
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub cylinders: u32,
    pub displacement_l: f64,
    pub cylinder_volume_m3: f64,
    pub rpm_min: f64,
    pub rpm_max: f64,
    pub injector: InjectorConfig,

    /// Measurement range of the wideband lambda sensor
    pub lambda_range: Bounds,

    /// Lambda target used when a sensor source has no target of its own
    pub lambda_target: f64,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cylinders == 0 {
            return Err(ConfigError::NonPositive {
                controller: "engine",
                name: "cylinders",
                value: 0.0,
            });
        }
        require_positive("engine", "displacement_l", self.displacement_l)?;
        require_positive("engine", "cylinder_volume_m3", self.cylinder_volume_m3)?;
        require_bounds("engine", "rpm", self.rpm_min, self.rpm_max)?;
        require_positive("engine", "injector.flow_cc_per_min", self.injector.flow_cc_per_min)?;
        require_non_negative("engine", "injector.dead_time_ms", self.injector.dead_time_ms)?;
        require_positive("engine", "injector.pressure_bar", self.injector.pressure_bar)?;
        require_positive(
            "engine",
            "injector.fuel_density_g_per_cc",
            self.injector.fuel_density_g_per_cc,
        )?;
        self.lambda_range.validate("engine", "lambda_range")?;
        require_positive("engine", "lambda_range.min", self.lambda_range.min)?;
        require_positive("engine", "lambda_target", self.lambda_target)?;
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cylinders: 4,
            displacement_l: 2.0,
            cylinder_volume_m3: 0.0005,
            rpm_min: 800.0,
            rpm_max: 7000.0,
            injector: InjectorConfig::default(),
            lambda_range: Bounds::new(0.7, 1.3),
            lambda_target: 1.0,
        }
    }
}

/// Complete configuration accepted by the engine cycle driver
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
#[serde(default)]
pub struct EcuConfig {
    pub engine: EngineConfig,
    pub corrections: CorrectionConfig,
}

impl EcuConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.corrections.validate()?;
        Ok(())
    }

    /// Read and validate a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> EcuResult<Self> {
        let text = fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&text)?;
        cfg.validate()?;
        info!("Loaded ECU config from {}", path.display());
        Ok(cfg)
    }

    /// Write as pretty-printed JSON
    pub fn save(&self, path: &Path) -> EcuResult<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        EcuConfig::default().validate().unwrap();
    }

    #[test]
    fn test_negative_gain_rejected() {
        let mut cfg = CorrectionConfig::default();
        cfg.idle.pid.ki = -0.1;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidGain {
                controller: "idle",
                gain: "ki",
                ..
            })
        ));

        let mut cfg = CorrectionConfig::default();
        cfg.fuel_trim.pid.kd = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut cfg = FuelTrimConfig::default();
        cfg.correction_limits = Bounds::new(1.2, 0.8);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidBounds { .. })
        ));

        let mut cfg = EngineConfig::default();
        cfg.lambda_range = Bounds::new(1.3, 0.7);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_limits_may_only_tighten() {
        let mut pid = PidConfig::default();
        pid.integral_limit = 0.5;
        pid.output_limit = 1.0;
        pid.validate("test").unwrap();

        pid.output_limit = 1.5;
        assert!(matches!(
            pid.validate("test"),
            Err(ConfigError::InvalidLimit {
                limit: "output_limit",
                ..
            })
        ));

        let mut trim = FuelTrimConfig::default();
        trim.correction_limits = Bounds::new(0.9, 1.1);
        trim.validate().unwrap();

        trim.correction_limits = Bounds::new(0.5, 1.2);
        assert!(matches!(
            trim.validate(),
            Err(ConfigError::OutOfRange {
                name: "correction_limits.min",
                ..
            })
        ));
        trim.correction_limits = Bounds::new(0.8, 1.5);
        assert!(trim.validate().is_err());
    }

    #[test]
    fn test_limits_and_scalars_rejected() {
        let mut pid = PidConfig::default();
        pid.output_limit = 0.0;
        assert!(matches!(
            pid.validate("test"),
            Err(ConfigError::InvalidLimit { .. })
        ));

        let mut idle = IdleConfig::default();
        idle.target_rpm = 0.0;
        assert!(idle.validate().is_err());

        let mut knock = KnockConfig::default();
        knock.recovery_rate_deg_per_s = -0.5;
        assert!(knock.validate().is_err());

        let mut engine = EngineConfig::default();
        engine.cylinders = 0;
        assert!(engine.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip_and_partial_file() {
        let cfg = EcuConfig::default();
        let s = serde_json::to_string(&cfg).unwrap();
        let back: EcuConfig = serde_json::from_str(&s).unwrap();
        assert_eq!(cfg, back);

        let partial: EcuConfig =
            serde_json::from_str(r#"{"corrections": {"idle": {"target_rpm": 850.0}}}"#).unwrap();
        assert_eq!(partial.corrections.idle.target_rpm, 850.0);
        assert_eq!(partial.corrections.idle.pid, IdleConfig::default().pid);
        assert_eq!(partial.engine, EngineConfig::default());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = std::env::temp_dir().join("trimloop_config_test");
        fs::create_dir_all(&dir).unwrap();

        let good = dir.join("good.json");
        EcuConfig::default().save(&good).unwrap();
        assert_eq!(EcuConfig::load(&good).unwrap(), EcuConfig::default());

        let bad = dir.join("bad.json");
        fs::write(&bad, r#"{"corrections": {"knock": {"max_retard_deg": -1.0}}}"#).unwrap();
        assert!(matches!(
            EcuConfig::load(&bad),
            Err(crate::EcuError::Config(_))
        ));
    }
}
