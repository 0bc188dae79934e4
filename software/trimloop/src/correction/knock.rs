//! Knock retard with fast reaction and slow linear recovery.
//!
//! This is not a PID loop. Each knocking cycle adds a fixed retard step,
//! bounded by the maximum; each quiet cycle removes `recovery_rate * dt`,
//! bounded by zero. Only the retard itself is carried between cycles, so
//! knocking and recovering are re-decided from the instantaneous knock level.

use crate::config::KnockConfig;
use crate::error::ConfigError;

#[derive(Clone, Debug)]
pub struct KnockCorrection {
    threshold: f64,
    retard_step_deg: f64,
    max_retard_deg: f64,
    recovery_rate_deg_per_s: f64,

    /// Always in `[0, max_retard_deg]`
    retard_deg: f64,
}

impl KnockCorrection {
    pub fn new(cfg: &KnockConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            threshold: cfg.threshold,
            retard_step_deg: cfg.retard_step_deg,
            max_retard_deg: cfg.max_retard_deg,
            recovery_rate_deg_per_s: cfg.recovery_rate_deg_per_s,
            retard_deg: 0.0,
        })
    }

    /// Ignition timing change in degrees; zero or negative
    pub fn correct(&mut self, knock_level: f64, dt: f64) -> f64 {
        if knock_level > self.threshold {
            self.retard_deg = (self.retard_deg + self.retard_step_deg).min(self.max_retard_deg);
        } else {
            self.retard_deg = (self.retard_deg - self.recovery_rate_deg_per_s * dt).max(0.0);
        }

        // Subtraction keeps zero retard as +0.0 in logs
        0.0 - self.retard_deg
    }

    /// Current retard in degrees, non-negative
    pub fn retard(&self) -> f64 {
        self.retard_deg
    }

    pub fn is_retarded(&self) -> bool {
        self.retard_deg > 0.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fresh() -> KnockCorrection {
        KnockCorrection::new(&KnockConfig::default()).unwrap()
    }

    #[test]
    fn test_step_then_recover() {
        let mut k = fresh();
        assert_eq!(k.correct(6.0, 1.0), -2.0);
        assert_eq!(k.retard(), 2.0);
        assert_eq!(k.correct(0.0, 1.0), -1.5);
        assert_eq!(k.retard(), 1.5);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let mut k = fresh();
        assert_eq!(k.correct(5.0, 1.0), 0.0);
        assert!(!k.is_retarded());
    }

    #[test]
    fn test_no_retard_is_positive_zero() {
        let mut k = fresh();
        let y = k.correct(0.0, 1.0);
        assert!(y.is_sign_positive());
        assert_eq!(format!("{y}"), "0");

        k.correct(6.0, 1.0);
        let y = k.correct(0.0, 10.0);
        assert!(y.is_sign_positive(), "got {y}");
    }

    #[test]
    fn test_retard_saturates_at_max() {
        let mut k = fresh();
        for _ in 0..20 {
            let y = k.correct(100.0, 0.01);
            assert!(y <= 0.0);
            assert!(k.retard() <= 10.0);
        }
        assert_eq!(k.retard(), 10.0);
    }

    #[test]
    fn test_linear_recovery_reaches_zero_in_bounded_time() {
        let mut k = fresh();
        for _ in 0..5 {
            k.correct(9.0, 0.1);
        }
        assert_eq!(k.retard(), 10.0);

        // max_retard / recovery_rate = 20 s
        let dt = 0.1;
        let mut prev = k.retard();
        let mut t = 0.0;
        while t < 20.0 - 1e-9 {
            k.correct(1.0, dt);
            t += dt;
            assert!(k.retard() <= prev);
            assert!(k.retard() >= 0.0);
            prev = k.retard();
        }
        assert!(k.retard() < 1e-9, "retard {} after {t} s", k.retard());

        for _ in 0..50 {
            assert_eq!(k.correct(0.0, dt), 0.0);
        }
    }

    #[test]
    fn test_rejects_negative_max() {
        let cfg = KnockConfig {
            max_retard_deg: -1.0,
            ..Default::default()
        };
        assert!(KnockCorrection::new(&cfg).is_err());
    }
}
