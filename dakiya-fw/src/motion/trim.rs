//! Tilt-based differential trim for straight moves

use crate::config::TrimConfig;

/// Proportional trim from accelerometer tilt
///
/// A chassis that leans right drifts right, so the left motor is boosted
/// (and vice versa). Both outputs are clamped to the safe PWM range.
#[derive(Debug, Clone)]
pub struct TiltTrim {
    config: TrimConfig,
}

impl TiltTrim {
    pub fn new(config: TrimConfig) -> Self {
        Self { config }
    }

    /// Signed correction in PWM for a tilt reading
    ///
    /// Positive boosts the left motor, negative boosts the right motor.
    pub fn correction(&self, tilt_deg: f32) -> i16 {
        let deviation = tilt_deg - self.config.level_reference;
        if !deviation.is_finite() || deviation.abs() <= self.config.deadband {
            return 0;
        }
        let limit = self.config.max_correction.abs() as f32;
        (self.config.gain * deviation).clamp(-limit, limit).round() as i16
    }

    /// Left/right PWM for a straight move at `base` with the given tilt
    pub fn apply(&self, base: i16, tilt_deg: f32) -> (i16, i16) {
        let correction = self.correction(tilt_deg);
        let left = base.saturating_add(correction.max(0));
        let right = base.saturating_add((-correction).max(0));
        (self.clamp(left), self.clamp(right))
    }

    /// Left/right PWM when no tilt reading is available
    pub fn uncorrected(&self, base: i16) -> (i16, i16) {
        let pwm = self.clamp(base);
        (pwm, pwm)
    }

    fn clamp(&self, pwm: i16) -> i16 {
        pwm.max(self.config.min_pwm).min(self.config.max_pwm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trim() -> TiltTrim {
        TiltTrim::new(TrimConfig {
            level_reference: 0.5,
            deadband: 0.5,
            gain: 10.0,
            max_correction: 30,
            min_pwm: 60,
            max_pwm: 220,
        })
    }

    #[test]
    fn test_deadband_leaves_speeds_equal() {
        let trim = trim();
        assert_eq!(trim.apply(150, 0.5), (150, 150));
        assert_eq!(trim.apply(150, 0.9), (150, 150));
        assert_eq!(trim.apply(150, 0.0), (150, 150));
    }

    #[test]
    fn test_lean_boosts_opposite_motor() {
        let trim = trim();
        // Leaning right by 2° -> boost left by 20
        assert_eq!(trim.apply(150, 2.5), (170, 150));
        // Leaning left by 1.5° -> boost right by 15
        assert_eq!(trim.apply(150, -1.0), (150, 165));
    }

    #[test]
    fn test_correction_is_bounded() {
        let trim = trim();
        assert_eq!(trim.correction(20.0), 30);
        assert_eq!(trim.correction(-20.0), -30);
    }

    #[test]
    fn test_outputs_clamped_to_pwm_range() {
        let trim = trim();
        assert_eq!(trim.apply(210, 10.0), (220, 210));
        assert_eq!(trim.uncorrected(20), (60, 60));
    }

    #[test]
    fn test_non_finite_tilt_ignored() {
        assert_eq!(trim().correction(f32::NAN), 0);
    }
}
