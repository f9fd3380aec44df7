//! Motion calibration shared by host duration estimates and firmware timing.
//!
//! Both sides convert distances and angles to time with the same numbers:
//! the host to know how long to wait before issuing the next primitive, the
//! firmware to know when a primitive is complete. The defaults come from the
//! reference calibration run (24 inches in 6 seconds, 90° in 500 ms).

use crate::error::{Result, WireError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reference straight run used for the default calibration (inches)
pub const REFERENCE_DISTANCE_IN: f32 = 24.0;
/// Time taken by the reference straight run (ms)
pub const REFERENCE_DISTANCE_MS: u32 = 6000;
/// Reference turn used for the default calibration (degrees)
pub const REFERENCE_ANGLE_DEG: f32 = 90.0;
/// Time taken by the reference turn (ms)
pub const REFERENCE_ANGLE_MS: u32 = 500;

/// Default PWM for legacy primitives and turns
pub const DEFAULT_BASE_SPEED_PWM: u8 = 200;
/// Default PWM for calibrated distance moves
pub const DEFAULT_PRECISION_SPEED_PWM: u8 = 150;

/// Motion calibration constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionCalibration {
    /// Straight-line speed at `precision_speed_pwm`
    #[serde(default = "default_inches_per_second")]
    pub inches_per_second: f32,
    /// In-place turn rate at `base_speed_pwm`
    #[serde(default = "default_degrees_per_second")]
    pub degrees_per_second: f32,
    /// PWM used for turns and legacy primitives
    #[serde(default = "default_base_speed_pwm")]
    pub base_speed_pwm: u8,
    /// PWM used for `MOVE_DISTANCE`
    #[serde(default = "default_precision_speed_pwm")]
    pub precision_speed_pwm: u8,
}

fn default_inches_per_second() -> f32 {
    REFERENCE_DISTANCE_IN / (REFERENCE_DISTANCE_MS as f32 / 1000.0)
}
fn default_degrees_per_second() -> f32 {
    REFERENCE_ANGLE_DEG / (REFERENCE_ANGLE_MS as f32 / 1000.0)
}
fn default_base_speed_pwm() -> u8 {
    DEFAULT_BASE_SPEED_PWM
}
fn default_precision_speed_pwm() -> u8 {
    DEFAULT_PRECISION_SPEED_PWM
}

impl MotionCalibration {
    /// Derive rates from a measured straight run and a measured turn
    pub fn from_reference(
        distance_in: f32,
        distance_ms: u32,
        angle_deg: f32,
        angle_ms: u32,
    ) -> Result<Self> {
        if distance_ms == 0 || angle_ms == 0 {
            return Err(WireError::InvalidCalibration(
                "reference duration must be non-zero".to_string(),
            ));
        }
        let calibration = Self {
            inches_per_second: distance_in / (distance_ms as f32 / 1000.0),
            degrees_per_second: angle_deg.abs() / (angle_ms as f32 / 1000.0),
            ..Self::default()
        };
        calibration.validate()?;
        Ok(calibration)
    }

    /// Check that both rates are finite and positive
    pub fn validate(&self) -> Result<()> {
        if !self.inches_per_second.is_finite() || self.inches_per_second <= 0.0 {
            return Err(WireError::InvalidCalibration(format!(
                "inches_per_second must be positive, got {}",
                self.inches_per_second
            )));
        }
        if !self.degrees_per_second.is_finite() || self.degrees_per_second <= 0.0 {
            return Err(WireError::InvalidCalibration(format!(
                "degrees_per_second must be positive, got {}",
                self.degrees_per_second
            )));
        }
        Ok(())
    }

    /// Time needed to drive `inches` at the calibrated speed
    pub fn move_duration(&self, inches: f32) -> Duration {
        Duration::from_millis(self.move_duration_ms(inches))
    }

    /// Time needed to turn `degrees` (sign ignored)
    pub fn turn_duration(&self, degrees: f32) -> Duration {
        Duration::from_millis(self.turn_duration_ms(degrees))
    }

    /// [`move_duration`](Self::move_duration) in whole milliseconds, rounded up
    pub fn move_duration_ms(&self, inches: f32) -> u64 {
        (inches.abs() / self.inches_per_second * 1000.0).ceil() as u64
    }

    /// [`turn_duration`](Self::turn_duration) in whole milliseconds, rounded up
    pub fn turn_duration_ms(&self, degrees: f32) -> u64 {
        (degrees.abs() / self.degrees_per_second * 1000.0).ceil() as u64
    }
}

impl Default for MotionCalibration {
    fn default() -> Self {
        Self {
            inches_per_second: default_inches_per_second(),
            degrees_per_second: default_degrees_per_second(),
            base_speed_pwm: DEFAULT_BASE_SPEED_PWM,
            precision_speed_pwm: DEFAULT_PRECISION_SPEED_PWM,
        }
    }
}
