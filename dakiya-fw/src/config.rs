//! Firmware configuration
//!
//! Every field has a default so an empty file (or no file) yields the stock
//! tuning. Sections mirror the firmware components.

use crate::error::{FirmwareError, Result};
use dakiya_wire::MotionCalibration;
use serde::Deserialize;
use std::path::Path;

/// Top-level firmware configuration
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FirmwareConfig {
    /// Motion calibration used until the host sends `CALIBRATE`
    #[serde(default)]
    pub calibration: MotionCalibration,

    #[serde(default)]
    pub trim: TrimConfig,

    #[serde(default)]
    pub obstacle: ObstacleConfig,

    #[serde(default)]
    pub legacy: LegacyConfig,

    #[serde(default)]
    pub board: BoardConfig,

    /// Simulated board tuning (ignored on real hardware)
    #[serde(default)]
    pub sim: SimConfig,
}

/// Tilt-based straight-line trim
#[derive(Clone, Debug, Deserialize)]
pub struct TrimConfig {
    /// Tilt reading (degrees) when the chassis is level
    #[serde(default)]
    pub level_reference: f32,

    /// Deviation (degrees) ignored as noise
    #[serde(default = "default_deadband")]
    pub deadband: f32,

    /// PWM added per degree of deviation
    #[serde(default = "default_gain")]
    pub gain: f32,

    /// Largest correction applied to one motor (PWM)
    #[serde(default = "default_max_correction")]
    pub max_correction: i16,

    /// Lowest PWM a trimmed motor may receive
    #[serde(default = "default_min_pwm")]
    pub min_pwm: i16,

    /// Highest PWM a trimmed motor may receive
    #[serde(default = "default_max_pwm")]
    pub max_pwm: i16,
}

/// Ultrasonic obstacle detection
#[derive(Clone, Debug, Deserialize)]
pub struct ObstacleConfig {
    /// Any sensor below this distance counts as a hit (cm)
    #[serde(default = "default_trigger_cm")]
    pub trigger_cm: f32,

    /// Extra clearance required before the latch releases (cm)
    #[serde(default = "default_clear_margin_cm")]
    pub clear_margin_cm: f32,

    /// Consecutive cycles required to latch or clear
    #[serde(default = "default_debounce_cycles")]
    pub debounce_cycles: u8,

    /// Raw echo samples per reading (median filtered)
    #[serde(default = "default_samples_per_reading")]
    pub samples_per_reading: usize,

    /// Distance reported for an echo timeout (cm)
    #[serde(default = "default_max_range_cm")]
    pub max_range_cm: f32,

    /// Echo round-trip time per centimetre (µs)
    #[serde(default = "default_us_per_cm")]
    pub us_per_cm: f32,

    /// Time between sampling cycles (ms)
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

/// Fixed durations of the legacy primitives
#[derive(Clone, Debug, Deserialize)]
pub struct LegacyConfig {
    /// `FORWARD` drive time (ms)
    #[serde(default = "default_forward_ms")]
    pub forward_ms: u64,

    /// `LEFT` / `RIGHT` turn time (ms)
    #[serde(default = "default_turn_ms")]
    pub turn_ms: u64,
}

/// Board-level settings
#[derive(Clone, Debug, Deserialize)]
pub struct BoardConfig {
    /// Number of tables with notification LEDs
    #[serde(default = "default_table_count")]
    pub table_count: u8,

    /// Sleep between control ticks in [`Firmware::run`](crate::Firmware::run) (ms)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Simulated board noise and environment
#[derive(Clone, Debug, Deserialize)]
pub struct SimConfig {
    /// RNG seed (0 = entropy)
    #[serde(default)]
    pub seed: u64,

    /// Constant tilt offset while driving (degrees)
    #[serde(default = "default_tilt_bias_deg")]
    pub tilt_bias_deg: f32,

    /// Tilt noise standard deviation (degrees)
    #[serde(default = "default_tilt_noise_deg")]
    pub tilt_noise_deg: f32,

    /// Probability that a tilt read fails
    #[serde(default)]
    pub tilt_failure_rate: f32,

    /// Range noise standard deviation (cm)
    #[serde(default = "default_range_noise_cm")]
    pub range_noise_cm: f32,

    /// Probability that an echo times out
    #[serde(default = "default_echo_dropout")]
    pub echo_dropout: f32,

    /// Distance every sensor sees when nothing is in front (cm)
    #[serde(default = "default_open_floor_cm")]
    pub open_floor_cm: f32,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            level_reference: 0.0,
            deadband: default_deadband(),
            gain: default_gain(),
            max_correction: default_max_correction(),
            min_pwm: default_min_pwm(),
            max_pwm: default_max_pwm(),
        }
    }
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            trigger_cm: default_trigger_cm(),
            clear_margin_cm: default_clear_margin_cm(),
            debounce_cycles: default_debounce_cycles(),
            samples_per_reading: default_samples_per_reading(),
            max_range_cm: default_max_range_cm(),
            us_per_cm: default_us_per_cm(),
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            forward_ms: default_forward_ms(),
            turn_ms: default_turn_ms(),
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            table_count: default_table_count(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            tilt_bias_deg: default_tilt_bias_deg(),
            tilt_noise_deg: default_tilt_noise_deg(),
            tilt_failure_rate: 0.0,
            range_noise_cm: default_range_noise_cm(),
            echo_dropout: default_echo_dropout(),
            open_floor_cm: default_open_floor_cm(),
        }
    }
}

// Trim defaults
fn default_deadband() -> f32 {
    0.5
}
fn default_gain() -> f32 {
    6.0
}
fn default_max_correction() -> i16 {
    40
}
fn default_min_pwm() -> i16 {
    60
}
fn default_max_pwm() -> i16 {
    255
}

// Obstacle defaults (HC-SR04 class sensors)
fn default_trigger_cm() -> f32 {
    20.0
}
fn default_clear_margin_cm() -> f32 {
    5.0
}
fn default_debounce_cycles() -> u8 {
    3
}
fn default_samples_per_reading() -> usize {
    5
}
fn default_max_range_cm() -> f32 {
    400.0
}
fn default_us_per_cm() -> f32 {
    58.0
}
fn default_sample_interval_ms() -> u64 {
    50
}

// Legacy primitive defaults
fn default_forward_ms() -> u64 {
    1000
}
fn default_turn_ms() -> u64 {
    500
}

fn default_table_count() -> u8 {
    4
}
fn default_tick_interval_ms() -> u64 {
    5
}

// Simulation defaults
fn default_tilt_bias_deg() -> f32 {
    0.8
}
fn default_tilt_noise_deg() -> f32 {
    0.2
}
fn default_range_noise_cm() -> f32 {
    1.5
}
fn default_echo_dropout() -> f32 {
    0.02
}
fn default_open_floor_cm() -> f32 {
    250.0
}

impl FirmwareConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FirmwareError::Config(format!("Failed to read config file: {}", e)))?;
        let config: FirmwareConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the controller cannot run with
    pub fn validate(&self) -> Result<()> {
        self.calibration
            .validate()
            .map_err(|e| FirmwareError::Config(e.to_string()))?;
        if self.obstacle.debounce_cycles == 0 {
            return Err(FirmwareError::Config(
                "obstacle.debounce_cycles must be at least 1".to_string(),
            ));
        }
        if self.obstacle.samples_per_reading == 0 {
            return Err(FirmwareError::Config(
                "obstacle.samples_per_reading must be at least 1".to_string(),
            ));
        }
        if self.obstacle.us_per_cm <= 0.0 {
            return Err(FirmwareError::Config(
                "obstacle.us_per_cm must be positive".to_string(),
            ));
        }
        if self.trim.min_pwm > self.trim.max_pwm {
            return Err(FirmwareError::Config(format!(
                "trim.min_pwm ({}) exceeds trim.max_pwm ({})",
                self.trim.min_pwm, self.trim.max_pwm
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = FirmwareConfig::default();
        assert_eq!(config.obstacle.trigger_cm, 20.0);
        assert_eq!(config.obstacle.debounce_cycles, 3);
        assert_eq!(config.obstacle.samples_per_reading, 5);
        assert_eq!(config.legacy.forward_ms, 1000);
        assert_eq!(config.board.table_count, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[obstacle]\ntrigger_cm = 30.0\n\n[calibration]\ninches_per_second = 5.0"
        )
        .unwrap();

        let config = FirmwareConfig::load(file.path()).unwrap();
        assert_eq!(config.obstacle.trigger_cm, 30.0);
        assert_eq!(config.obstacle.clear_margin_cm, 5.0);
        assert_eq!(config.calibration.inches_per_second, 5.0);
        assert_eq!(config.calibration.degrees_per_second, 180.0);
    }

    #[test]
    fn test_rejects_zero_debounce() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[obstacle]\ndebounce_cycles = 0").unwrap();
        assert!(matches!(
            FirmwareConfig::load(file.path()),
            Err(FirmwareError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = FirmwareConfig::load(Path::new("/nonexistent/dakiya-fw.toml"));
        assert!(matches!(result, Err(FirmwareError::Config(_))));
    }
}
