//! Ultrasonic obstacle monitor
//!
//! Each sampling cycle reads the three range sensors (median of several
//! echo pulses each) and feeds the readings through a debounced latch with a
//! hysteresis band: the latch engages after N consecutive cycles with any
//! sensor below the trigger distance, and releases after N consecutive
//! cycles with every sensor at or beyond trigger + margin.

use crate::config::ObstacleConfig;
use crate::error::PlatformError;
use crate::platform::{RangeSensorId, RangeSensors};

/// Debounce state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObstacleLatch {
    pub is_latched: bool,
    pub consecutive_hit_count: u8,
    pub consecutive_clear_count: u8,
}

/// Latch edge produced by a sampling cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleTransition {
    Detected,
    Cleared,
}

/// Obstacle detector with median filtering and a debounced latch
pub struct ObstacleMonitor {
    config: ObstacleConfig,
    latch: ObstacleLatch,
    last_readings_cm: [f32; 3],
    samples: Vec<f32>,
}

impl ObstacleMonitor {
    pub fn new(config: ObstacleConfig) -> Self {
        let samples = Vec::with_capacity(config.samples_per_reading.max(1));
        let max_range = config.max_range_cm;
        Self {
            config,
            latch: ObstacleLatch::default(),
            last_readings_cm: [max_range; 3],
            samples,
        }
    }

    pub fn latch(&self) -> ObstacleLatch {
        self.latch
    }

    pub fn is_latched(&self) -> bool {
        self.latch.is_latched
    }

    /// Filtered distances from the last cycle, indexed by [`RangeSensorId::index`]
    pub fn last_readings_cm(&self) -> [f32; 3] {
        self.last_readings_cm
    }

    /// Run one sampling cycle against the sensors
    pub fn sample<R: RangeSensors>(&mut self, sensors: &mut R) -> Option<ObstacleTransition> {
        let mut readings = [self.config.max_range_cm; 3];
        for sensor in RangeSensorId::ALL {
            readings[sensor.index()] = self.read_distance_cm(sensors, sensor);
        }
        self.observe(readings)
    }

    /// Median-filtered distance for one sensor in centimetres
    ///
    /// Echo timeouts count as max range. Other read failures are treated the
    /// same way but logged.
    pub fn read_distance_cm<R: RangeSensors>(
        &mut self,
        sensors: &mut R,
        sensor: RangeSensorId,
    ) -> f32 {
        self.samples.clear();
        for _ in 0..self.config.samples_per_reading.max(1) {
            let cm = match sensors.echo_pulse_us(sensor) {
                Ok(pulse_us) => pulse_us as f32 / self.config.us_per_cm,
                Err(PlatformError::Timeout) => self.config.max_range_cm,
                Err(e) => {
                    log::warn!("Range sensor {:?} read failed: {}", sensor, e);
                    self.config.max_range_cm
                }
            };
            self.samples.push(cm.min(self.config.max_range_cm));
        }
        median(&mut self.samples)
    }

    /// Feed one cycle of filtered readings into the latch
    pub fn observe(&mut self, readings_cm: [f32; 3]) -> Option<ObstacleTransition> {
        self.last_readings_cm = readings_cm;
        let required = self.config.debounce_cycles.max(1);

        if self.latch.is_latched {
            let clear_at = self.config.trigger_cm + self.config.clear_margin_cm;
            if readings_cm.iter().all(|&cm| cm >= clear_at) {
                self.latch.consecutive_clear_count =
                    self.latch.consecutive_clear_count.saturating_add(1);
            } else {
                self.latch.consecutive_clear_count = 0;
            }

            if self.latch.consecutive_clear_count >= required {
                self.latch = ObstacleLatch::default();
                log::info!("Obstacle cleared (readings {:?} cm)", readings_cm);
                return Some(ObstacleTransition::Cleared);
            }
        } else {
            if readings_cm.iter().any(|&cm| cm < self.config.trigger_cm) {
                self.latch.consecutive_hit_count =
                    self.latch.consecutive_hit_count.saturating_add(1);
            } else {
                self.latch.consecutive_hit_count = 0;
            }

            if self.latch.consecutive_hit_count >= required {
                self.latch = ObstacleLatch {
                    is_latched: true,
                    ..ObstacleLatch::default()
                };
                log::info!("Obstacle detected (readings {:?} cm)", readings_cm);
                return Some(ObstacleTransition::Detected);
            }
        }

        None
    }
}

fn median(values: &mut [f32]) -> f32 {
    values.sort_by(|a, b| a.total_cmp(b));
    values[values.len() / 2]
}
