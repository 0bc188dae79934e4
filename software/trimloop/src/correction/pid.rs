//! A PID unit with simple saturation for anti-windup

use crate::config::PidConfig;
use crate::error::ConfigError;

/// A PID unit with saturation of both the integral and the output.
///
/// State advances on every call to [`PidUnit::calculate`] and is never
/// reset implicitly.
#[derive(Clone, Debug)]
pub struct PidUnit {
    // User inputs
    kp: f64,
    ki: f64,
    kd: f64,
    integral_limit: f64,
    output_limit: f64,

    // Internal state
    integral: f64,
    previous_error: f64,
}

impl PidUnit {
    /// Build a unit from validated gains. `controller` names the owner in errors.
    pub fn new(cfg: &PidConfig, controller: &'static str) -> Result<Self, ConfigError> {
        cfg.validate(controller)?;

        Ok(Self {
            kp: cfg.kp,
            ki: cfg.ki,
            kd: cfg.kd,
            integral_limit: cfg.integral_limit,
            output_limit: cfg.output_limit,

            integral: 0.0,
            previous_error: 0.0,
        })
    }

    /// Get the next output given the latest error and the time since the last call.
    ///
    /// A non-positive or non-finite `dt` has no defined derivative, so the call
    /// returns 0.0 and leaves the state as it was.
    pub fn calculate(&mut self, error: f64, dt: f64) -> f64 {
        if !(dt.is_finite() && dt > 0.0) {
            return 0.0;
        }

        // Anti-windup saturation
        self.integral += error * dt;
        self.integral = self
            .integral
            .min(self.integral_limit)
            .max(-self.integral_limit);

        let derivative = (error - self.previous_error) / dt;
        self.previous_error = error;

        let y = self.kp * error + self.ki * self.integral + self.kd * derivative;
        y.min(self.output_limit).max(-self.output_limit)
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn previous_error(&self) -> f64 {
        self.previous_error
    }

    /// Gains as `(kp, ki, kd)`
    pub fn gains(&self) -> (f64, f64, f64) {
        (self.kp, self.ki, self.kd)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn unit(kp: f64, ki: f64, kd: f64) -> PidUnit {
        PidUnit::new(&PidConfig::new(kp, ki, kd), "test").unwrap()
    }

    #[test]
    fn test_first_step_from_fresh_state() {
        let mut pid = unit(0.2, 0.1, 0.05);
        let y = pid.calculate(0.2, 1.0);

        assert!((pid.integral() - 0.2).abs() < 1e-12);
        assert_eq!(pid.previous_error(), 0.2);
        // 0.2*0.2 + 0.2*0.1 + 0.2*0.05
        assert!((y - 0.07).abs() < 1e-12, "got {y}");
    }

    #[test]
    fn test_integral_and_output_stay_saturated() {
        let mut pid = unit(5.0, 3.0, 2.0);
        let errors = [50.0, -80.0, 1e6, -1e6, 0.3, 12.0, -0.01, 0.0];
        let dts = [0.01, 2.0, 0.5, 1e-3, 10.0];

        for (i, e) in errors.iter().cycle().take(200).enumerate() {
            let y = pid.calculate(*e, dts[i % dts.len()]);
            assert!((-1.0..=1.0).contains(&y), "output {y} out of range");
            assert!(
                (-1.0..=1.0).contains(&pid.integral()),
                "integral {} out of range",
                pid.integral()
            );
        }
    }

    #[test]
    fn test_integral_limit_is_configurable() {
        let mut cfg = PidConfig::new(0.0, 1.0, 0.0);
        cfg.integral_limit = 0.25;
        cfg.output_limit = 0.5;
        let mut pid = PidUnit::new(&cfg, "test").unwrap();

        for _ in 0..10 {
            let y = pid.calculate(1.0, 1.0);
            assert!(y <= 0.25 + 1e-12);
        }
        assert_eq!(pid.integral(), 0.25);
    }

    #[test]
    fn test_non_positive_dt_leaves_state_untouched() {
        let mut pid = unit(0.2, 0.1, 0.05);
        pid.calculate(0.1, 1.0);
        let (integral, prev) = (pid.integral(), pid.previous_error());

        for dt in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert_eq!(pid.calculate(0.5, dt), 0.0);
            assert_eq!(pid.integral(), integral);
            assert_eq!(pid.previous_error(), prev);
        }

        // Next valid step continues from the stored state
        let y = pid.calculate(0.1, 1.0);
        assert!((pid.integral() - 0.2).abs() < 1e-12);
        assert!((y - (0.02 + 0.02)).abs() < 1e-12, "got {y}");
    }

    #[test]
    fn test_zero_error_is_a_fixed_point() {
        let mut pid = unit(0.2, 0.1, 0.05);
        for _ in 0..100 {
            assert_eq!(pid.calculate(0.0, 0.1), 0.0);
        }
    }

    #[test]
    fn test_rejects_negative_gain() {
        assert!(PidUnit::new(&PidConfig::new(-0.1, 0.0, 0.0), "test").is_err());
    }
}
